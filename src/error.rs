use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of the external vision model, kept apart from a successful
/// answer that simply did not match any label.
#[derive(thiserror::Error, Debug)]
pub enum InferenceError {
    #[error("vision model unavailable: {0}")]
    Unavailable(String),

    #[error("vision model rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("malformed vision model response: {0}")]
    BadResponse(String),

    #[error("failed to encode image for vision model: {0}")]
    Encode(String),
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("base asset not found at {}", .0.display())]
    AssetMissing(PathBuf),

    #[error("invalid label {label:?} for {layer} layer")]
    InvalidLabel { layer: &'static str, label: String },

    #[error("invalid upload: {0}")]
    InvalidUpload(String),

    #[error("uploaded file is not a decodable image: {0}")]
    InvalidImage(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_upload(msg: impl Into<String>) -> Self {
        Self::InvalidUpload(msg.into())
    }

    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }

    /// True when the failure was caused by the caller's input rather than
    /// the service or its collaborators.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidUpload(_) | Self::InvalidImage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(Error::invalid_upload("x")
            .to_string()
            .contains("invalid upload:"));
        assert!(Error::invalid_image("x")
            .to_string()
            .contains("not a decodable image"));
        assert!(Error::AssetMissing(PathBuf::from("assets/base_body/trainer_base.png"))
            .to_string()
            .contains("trainer_base.png"));
    }

    #[test]
    fn inference_error_is_transparent() {
        let err = Error::from(InferenceError::Rejected {
            status: 503,
            body: "loading".to_string(),
        });
        assert_eq!(
            err.to_string(),
            "vision model rejected request with status 503: loading"
        );
        assert!(!err.is_client_error());
    }

    #[test]
    fn client_errors_are_classified() {
        assert!(Error::invalid_image("garbage").is_client_error());
        assert!(Error::invalid_upload("no file").is_client_error());
        assert!(!Error::AssetMissing(PathBuf::new()).is_client_error());
    }
}
