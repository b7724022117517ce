//! # GPU Error Types
//!
//! Failures of device bring-up, pipeline allocation and diagnostics reads.
//! Encoding a frame never fails.

use meadow_core::CullError;
use thiserror::Error;

/// Errors raised by the device pipeline.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Sizing or configuration error from the core.
    #[error(transparent)]
    Cull(#[from] CullError),

    /// No adapter matched the request.
    #[error("no compatible GPU adapter found")]
    NoAdapter,

    /// The adapter refused the device request.
    #[error("device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    /// Mapping a staging buffer failed.
    #[error("buffer readback failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    /// The map callback was dropped before it reported.
    #[error("buffer readback callback never fired")]
    ReadbackDisconnected,

    /// The layout needs more than the device offers.
    #[error("device limit {what}: need {required}, device allows {available}")]
    DeviceLimit {
        /// Name of the limit.
        what: &'static str,
        /// Value the layout needs.
        required: u64,
        /// Value the device reports.
        available: u64,
    },
}

/// Result type for device operations.
pub type GpuResult<T> = Result<T, GpuError>;
