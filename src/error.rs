use thiserror::Error;

/// Errors produced while scoring images or configuring a detector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BlurError {
    /// Malformed input: zero-sized image, unsupported channel layout, short buffer.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The convolution/statistics pipeline could not produce a score.
    #[error("image processing failed: {0}")]
    ImageProcessing(String),

    /// Rejected detector or settings parameters.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failure reported by an injected scorer.
    #[error("scorer failed: {0}")]
    Scorer(String),
}

pub type Result<T> = std::result::Result<T, BlurError>;
