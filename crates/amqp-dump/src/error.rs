//! Error types for the dump library.

use thiserror::Error;

/// Main error type for dump operations.
#[derive(Error, Debug)]
pub enum DumpError {
    /// Configuration error (invalid YAML, bad endpoint URI, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source failed while producing or pushing items
    #[error("Source error: {0}")]
    Source(String),

    /// Destination writer failed while accepting, writing or settling items
    #[error("Destination error: {0}")]
    Destination(String),

    /// An encoded header property could not be decoded
    #[error("Failed to decode header property {property}: {message}")]
    HeaderDecode { property: String, message: String },

    /// A pipeline channel was closed by a downstream stage
    #[error("Pipeline closed by downstream stage")]
    PipelineClosed,

    /// A pipeline stage task died without reporting a fault of its own
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// AMQP connection or protocol error
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// IO error (archive file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error (archive records)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error (config files)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl DumpError {
    /// Create a Source error
    pub fn source(message: impl Into<String>) -> Self {
        DumpError::Source(message.into())
    }

    /// Create a Destination error
    pub fn destination(message: impl Into<String>) -> Self {
        DumpError::Destination(message.into())
    }

    /// Create a Transfer error
    pub fn transfer(message: impl Into<String>) -> Self {
        DumpError::Transfer(message.into())
    }

    /// Create a HeaderDecode error
    pub fn header_decode(property: impl Into<String>, message: impl Into<String>) -> Self {
        DumpError::HeaderDecode {
            property: property.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// Every caught failure maps to the generic error code; success is 0.
    pub fn exit_code(&self) -> u8 {
        1
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for dump operations.
pub type Result<T> = std::result::Result<T, DumpError>;
