mod engine;
pub mod filters;
mod generation;

pub use engine::{apply_operations, sample_size, RenderEngine};
pub use generation::{Generation, GenerationGuard};
