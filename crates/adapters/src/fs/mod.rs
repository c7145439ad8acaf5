mod assets;
mod clock;
mod scanner;
mod storage;

pub use assets::FsAssetStore;
pub use clock::SystemClock;
pub use scanner::WalkdirFileScanner;
pub use storage::PageStorage;
