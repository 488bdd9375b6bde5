//! Motion source trait

use crate::core::types::MotionSample;
use crate::error::Result;

/// Per-sample delivery callback.
///
/// Invoked on a worker thread owned by the source, once per captured sample,
/// in capture order.
pub type SampleCallback = Box<dyn FnMut(MotionSample) + Send>;

/// Head-motion capture driver with callback-based delivery.
///
/// Implementations are selected at construction time; callers hold a
/// `Box<dyn MotionSource>` and never branch on the concrete kind.
pub trait MotionSource: Send {
    /// Start capture and begin delivering samples to `callback`.
    ///
    /// Fails with [`crate::Error::SourceUnavailable`] when the capture
    /// capability is absent on this host (no device, no permission). The
    /// reason string is operator-facing.
    fn start(&mut self, callback: SampleCallback) -> Result<()>;

    /// Stop capture and join the worker thread.
    ///
    /// Idempotent and safe to call before `start`. After return no further
    /// callbacks are delivered.
    fn stop(&mut self);

    /// Short stable identifier for logs ("synthetic", "serial_imu")
    fn name(&self) -> &'static str;

    /// True while the worker thread is delivering samples
    fn is_active(&self) -> bool;
}
