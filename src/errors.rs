use std::path::{Path, PathBuf};
use thiserror::Error;

/// Structured error types for the LungSight pipeline.
///
/// Each variant carries the context of its domain (filesystem, image processing,
/// model operations, validation), so the presentation boundary can report a single
/// message while logs keep the full source chain.
#[derive(Error, Debug)]
pub enum LungSightError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },
}

pub type Result<T> = std::result::Result<T, LungSightError>;

impl LungSightError {
    pub(crate) fn model<E>(operation: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Model {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Model error for a tensor whose shape the pipeline cannot use.
    pub(crate) fn unexpected_shape(operation: impl Into<String>, shape: &[usize]) -> Self {
        Self::model(
            operation,
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("unexpected tensor shape {shape:?}"),
            ),
        )
    }

    /// A model path given on the command line that does not point at a file.
    pub(crate) fn missing_model(role: &str, path: &Path) -> Self {
        Self::Configuration {
            message: format!("{role} model does not exist: {}", path.display()),
        }
    }

    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Bare I/O failures, for callers that have no path at hand. The error kind
/// stands in for the operation.
impl From<std::io::Error> for LungSightError {
    fn from(source: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::new(),
            operation: source.kind().to_string(),
            source,
        }
    }
}

impl From<ort::Error> for LungSightError {
    fn from(err: ort::Error) -> Self {
        Self::model("ort operation", err)
    }
}

/// Shape errors come out of tensor reshaping around inference, so they are
/// reported as model errors.
impl From<ndarray::ShapeError> for LungSightError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::model("tensor shape conversion", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_validation_message() {
        let err = LungSightError::validation("mask", "has 3 pixels, expected 4");
        assert_eq!(
            err.to_string(),
            "Validation error: mask has 3 pixels, expected 4"
        );
    }

    #[test]
    fn test_io_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = LungSightError::from(io);
        assert!(matches!(err, LungSightError::FileSystem { .. }));
        assert!(err.to_string().starts_with("Filesystem error: entity not found failed"));
        assert_eq!(err.source().map(|s| s.to_string()).as_deref(), Some("missing"));
    }

    #[test]
    fn test_missing_model_message() {
        let err = LungSightError::missing_model("Segmentation", Path::new("resource/seg.onnx"));
        assert_eq!(
            err.to_string(),
            "Configuration error: Segmentation model does not exist: resource/seg.onnx"
        );
    }

    #[test]
    fn test_unexpected_shape_is_model_error() {
        let err = LungSightError::unexpected_shape("segmentation output", &[1, 3, 3]);
        assert_eq!(err.to_string(), "Model error: segmentation output failed");
        let source = err.source().map(|s| s.to_string()).unwrap_or_default();
        assert!(source.contains("[1, 3, 3]"));
    }
}
