use std::fmt;

/// Errors produced by the depth-plane pipeline and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum DepthPlaneError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid orientation response: {0:?}")]
    InvalidResponse(String),

    #[error("Raster size mismatch: expected {expected} cells, got {actual}")]
    RasterSize { expected: usize, actual: usize },

    #[error("Invalid dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Depth and color frames disagree: {0}")]
    FrameMismatch(String),

    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(String),

    #[error("Snapshot stream stopped")]
    StreamStopped,

    #[error("Timeout waiting for data")]
    Timeout,
}

/// Thread-safe last-error storage for the C FFI layer.
pub(crate) struct LastError {
    message: std::sync::Mutex<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: std::sync::Mutex::new(String::new()),
        }
    }

    pub fn set(&self, err: &DepthPlaneError) {
        if let Ok(mut msg) = self.message.lock() {
            *msg = fmt::format(format_args!("{}\0", err));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut msg) = self.message.lock() {
            msg.clear();
        }
    }

    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        match self.message.lock() {
            Ok(msg) if !msg.is_empty() => msg.as_ptr() as *const std::ffi::c_char,
            _ => std::ptr::null(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_error_roundtrip() {
        let last = LastError::new();
        assert!(last.as_ptr().is_null());

        last.set(&DepthPlaneError::Timeout);
        let msg = unsafe { std::ffi::CStr::from_ptr(last.as_ptr()) };
        assert_eq!(msg.to_str().unwrap(), "Timeout waiting for data");

        last.clear();
        assert!(last.as_ptr().is_null());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: DepthPlaneError = io.into();
        assert!(matches!(err, DepthPlaneError::Io(_)));
    }
}
