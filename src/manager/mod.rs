//! Per-output-device managers.
//!
//! A manager owns one presentation surface and the thread that feeds it.
//! The core talks to managers exclusively through [`VideoOutputManager`], so
//! fan-out code never depends on a concrete backend; the generic engine in
//! [`engine`] implements the trait on top of any [`FrameDisplay`]
//! (crate::backend::FrameDisplay) backend.

mod engine;

pub use engine::RenderManager;

use crate::event::ManagerId;
use crate::info::DisplayInfo;

/// The contract between the core and a registered output manager.
///
/// All methods are callable from any thread and must not block on rendering;
/// frame delivery hands off to the manager's own thread.
pub trait VideoOutputManager: Send + Sync {
    /// Identity assigned at registration.
    fn id(&self) -> ManagerId;

    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Bring the manager's rendering machinery up. Idempotent.
    fn open(&self);

    /// Tear the surface down and return to the idle state. Idempotent.
    fn close(&self);

    /// Deliver one I420 frame.
    ///
    /// `local` selects the stream, `devices` is the number of output devices
    /// the producing pipeline currently serves; fewer than two forces a
    /// single-stream layout regardless of the configured mode.
    fn set_frame_data(&self, data: &[u8], width: u32, height: u32, local: bool, devices: u32);

    /// Merge a configuration update. Partial: only the halves the source
    /// marks as populated are taken.
    fn set_display_info(&self, info: &DisplayInfo);

    /// Frames overwritten before they could be presented.
    fn frames_dropped(&self) -> u64 {
        0
    }
}
