use thiserror::Error;

/// Failure anywhere in the analyze → paginate → index pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("viewport {width}x{height} has no usable area")]
    InvalidViewport { width: f32, height: f32 },
    #[error("pagination produced an inconsistent book: {0}")]
    Inconsistent(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("reader has no book loaded")]
    NotInitialized,
}
