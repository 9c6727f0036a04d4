use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The caller handed in something that cannot be analysed at all.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },
    #[error("Unrecognised color {input:?}")]
    ParseColor { input: String },
    #[error("Unrecognised {kind} {input:?}")]
    ParseOption { kind: &'static str, input: String },
    #[error("Unable to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}
