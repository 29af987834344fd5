//! Error handling for packetscope
//!
//! This module defines the crate error type and a Result alias used
//! throughout the capture pipeline. Lifecycle errors are turned into boolean
//! failures by [`PipelineController`](crate::pipeline::PipelineController);
//! everything else is propagated with `?`.

use thiserror::Error;

/// Main error type for packetscope operations
#[derive(Error, Debug)]
pub enum PacketScopeError {
    /// A capture was started without a frame sink
    #[error("Capture error: no frame sink registered")]
    NoFrameSink,

    /// A capture is already active on this source
    #[error("Capture error: already capturing on '{device}'")]
    AlreadyCapturing { device: String },

    /// The requested device does not exist
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The device exists but could not be opened
    #[error("Failed to open device '{device}': {message}")]
    DeviceOpen { device: String, message: String },

    /// The capture mechanism refused to start
    #[error("Failed to start capture on '{device}': {message}")]
    CaptureStart { device: String, message: String },

    /// Packet lookup outside the stored range
    #[error("Packet id {id} out of range (store holds {count} packets)")]
    OutOfRange { id: u64, count: usize },

    /// Frame metadata inconsistent with its byte buffer
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors from libpcap
    #[cfg(feature = "live-capture")]
    #[error("Pcap error: {0}")]
    Pcap(#[from] pcap::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PacketScopeError>,
    },
}

impl PacketScopeError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PacketScopeError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error is a lookup miss rather than a real failure
    pub fn is_out_of_range(&self) -> bool {
        match self {
            PacketScopeError::OutOfRange { .. } => true,
            PacketScopeError::WithContext { source, .. } => source.is_out_of_range(),
            _ => false,
        }
    }
}

/// Result type alias for packetscope operations
pub type Result<T> = std::result::Result<T, PacketScopeError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PacketScopeError::DeviceNotFound("eth7".to_string());
        assert_eq!(err.to_string(), "Device not found: eth7");
    }

    #[test]
    fn test_error_with_context() {
        let err = PacketScopeError::NoFrameSink;
        let with_ctx = err.with_context("Failed to start pipeline");
        assert!(with_ctx.to_string().contains("Failed to start pipeline"));
    }

    #[test]
    fn test_out_of_range_message() {
        let err = PacketScopeError::OutOfRange { id: 12, count: 3 };
        assert!(err.to_string().contains("12"));
        assert!(err.to_string().contains("3 packets"));
        assert!(err.is_out_of_range());
    }

    #[test]
    fn test_out_of_range_through_context() {
        let result: Result<()> = Err(PacketScopeError::OutOfRange { id: 0, count: 0 });
        let err = result.with_context(|| "lookup".to_string()).unwrap_err();
        assert!(err.is_out_of_range());
        assert!(!PacketScopeError::NoFrameSink.is_out_of_range());
    }
}
