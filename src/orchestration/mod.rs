pub mod pipeline;

pub use pipeline::{allowed_file, PipelineOrchestrator};
