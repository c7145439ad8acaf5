pub mod codec;
pub mod export;
pub mod fs;
pub mod migrations;
pub mod paths;
pub mod pool;
pub mod presenters;
pub mod probe;
pub mod render;
pub mod sqlite;

pub use export::PdfExportWriter;
pub use fs::{FsAssetStore, PageStorage, SystemClock, WalkdirFileScanner};
pub use paths::AssetPathResolver;
pub use pool::{build_pool, BackgroundJobs, RenderPool};
pub use presenters::{
    present_document_row, present_edit, present_folder_row, present_import_summary,
    present_job_report, present_page_row, present_render_outcome,
};
pub use probe::ImageCrateProbe;
pub use render::RenderEngine;
pub use sqlite::SqliteCatalogRepository;
