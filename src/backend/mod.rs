//! Backend surface contracts and drivers.
//!
//! Two layers, mirroring the split between the generic rendering engine and
//! the native windowing code:
//!
//! - [`FrameDisplay`] is the per-backend manager contract the engine talks
//!   to: surface setup/teardown with the hardware → software → no-video
//!   fallback chain, frame presentation, and the vsync commit.
//! - [`SurfaceDriver`] is one concrete presentation path over a native
//!   window: an overlay driver hands planar YUV straight to the hardware, a
//!   software driver scales and converts on the CPU.
//!
//! The actual platform plumbing (X11/XVideo, DirectDraw) sits behind the
//! [`WindowSystem`] / [`NativeWindow`] seam; this crate ships an in-memory
//! [`SoftwareWindowSystem`](software::SoftwareWindowSystem) for headless use
//! and tests, and platform integrations implement the seam out of crate.

pub mod dx;
pub mod null;
pub mod port;
pub mod software;
pub mod x11;

use thiserror::Error;

use crate::convert::ScaleAlgorithm;
use crate::event::FullscreenToggle;
use crate::frame::{UpdateRequired, YuvFrame};
use crate::geometry::Rect;
use crate::info::{AccelLevel, EmbedTarget, VideoMode, Zoom};

pub use dx::DxBackend;
pub use port::{OverlayPort, OverlayPortRegistry};
pub use software::SoftwareWindowSystem;
pub use x11::X11Backend;

// ============================================================================
// Errors
// ============================================================================

/// Coarse classification of a surface error, carried in events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceErrorKind {
    /// Hardware overlay capability absent.
    HardwareUnavailable,
    /// Hardware present but negotiation failed.
    NegotiationFailed,
    /// Software path failed; terminal for this surface.
    SoftwareFailed,
    /// Operation on a surface that is not open.
    NotOpen,
    /// Frame dimensions do not match the surface.
    DimensionMismatch,
    /// Unsupported operation or format.
    Unsupported,
}

/// Backend surface failure.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// No hardware overlay capability on this display.
    #[error("hardware overlay unavailable")]
    HardwareUnavailable,

    /// Hardware is present but could not be negotiated.
    #[error("hardware negotiation failed: {0}")]
    NegotiationFailed(String),

    /// The software path failed too; video is disabled for this surface.
    #[error("software path failed: {0}")]
    SoftwareFailed(String),

    /// The surface is not open.
    #[error("surface not open")]
    NotOpen,

    /// Dynamic resolution change without reinitialization is not supported.
    #[error("frame size {got_width}x{got_height} does not match surface {want_width}x{want_height}")]
    DimensionMismatch {
        /// Width of the offered frame.
        got_width: u32,
        /// Height of the offered frame.
        got_height: u32,
        /// Width negotiated at setup.
        want_width: u32,
        /// Height negotiated at setup.
        want_height: u32,
    },

    /// Unsupported operation or pixel format.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl SurfaceError {
    /// The coarse kind of this error.
    pub fn kind(&self) -> SurfaceErrorKind {
        match self {
            Self::HardwareUnavailable => SurfaceErrorKind::HardwareUnavailable,
            Self::NegotiationFailed(_) => SurfaceErrorKind::NegotiationFailed,
            Self::SoftwareFailed(_) => SurfaceErrorKind::SoftwareFailed,
            Self::NotOpen => SurfaceErrorKind::NotOpen,
            Self::DimensionMismatch { .. } => SurfaceErrorKind::DimensionMismatch,
            Self::Unsupported(_) => SurfaceErrorKind::Unsupported,
        }
    }
}

// ============================================================================
// Native window seam
// ============================================================================

/// Events drained from a native window's queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The window was resized.
    Resized {
        /// New width.
        width: u32,
        /// New height.
        height: u32,
    },
    /// The user requested a fullscreen change (key or window-manager hint).
    FullscreenRequested(FullscreenToggle),
    /// The user requested flipping the stay-on-top hint.
    OnTopRequested,
    /// The user requested flipping the window decorations.
    DecorationRequested,
}

/// Parameters for opening a native window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRequest {
    /// Existing drawable to embed into; `None` creates an owned top-level
    /// window.
    pub embed: Option<EmbedTarget>,
    /// Horizontal placement.
    pub x: i32,
    /// Vertical placement.
    pub y: i32,
    /// Window width.
    pub width: u32,
    /// Window height.
    pub height: u32,
    /// Open fullscreen.
    pub fullscreen: bool,
    /// Keep above other windows.
    pub on_top: bool,
}

/// One native drawable with a back and a front buffer.
///
/// Implementations wrap the platform windowing API. All drawing goes to the
/// back buffer; [`NativeWindow::flip`] commits it and may block until
/// vertical blank.
pub trait NativeWindow: Send {
    /// Current window size.
    fn size(&self) -> (u32, u32);

    /// Blit packed BGRA pixels into the back buffer at `dst`.
    fn blit_bgra(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        dst: Rect,
    ) -> Result<(), SurfaceError>;

    /// Hand a planar YUV frame to the hardware overlay for `dst`.
    fn blit_overlay(
        &mut self,
        port: &OverlayPort,
        frame: &YuvFrame,
        dst: Rect,
    ) -> Result<(), SurfaceError>;

    /// Commit the back buffer to the screen. May block until vblank; must be
    /// callable without any manager lock held.
    fn flip(&mut self) -> Result<(), SurfaceError>;

    /// Drain the native event queue.
    fn poll_events(&mut self) -> Vec<SurfaceEvent>;

    /// Window-manager fullscreen hint.
    fn set_fullscreen(&mut self, on: bool);

    /// Whether the window is currently fullscreen.
    fn is_fullscreen(&self) -> bool;

    /// Window-manager stay-on-top hint.
    fn set_on_top(&mut self, on: bool);

    /// Window-manager decoration hint.
    fn set_decorated(&mut self, on: bool);
}

impl core::fmt::Debug for dyn NativeWindow {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("NativeWindow")
    }
}

/// Connection to a windowing system: opens windows and grabs overlay ports.
pub trait WindowSystem: Send {
    /// Open (or embed into) a native window.
    fn open_window(&mut self, req: &WindowRequest) -> Result<Box<dyn NativeWindow>, SurfaceError>;

    /// Acquire a hardware overlay port. Fails with
    /// [`SurfaceError::HardwareUnavailable`] when the display has none free.
    fn grab_overlay_port(&mut self) -> Result<OverlayPort, SurfaceError>;
}

// ============================================================================
// Surface driver contract
// ============================================================================

/// Configuration a driver is initialized with. Image dimensions are fixed
/// for the driver's lifetime; a resolution change requires teardown and
/// reinitialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Primary image width.
    pub image_width: u32,
    /// Primary image height.
    pub image_height: u32,
    /// PIP inset image dimensions, when the layout has one.
    pub pip_image: Option<(u32, u32)>,
    /// Presenting fullscreen (selects the inset ratio).
    pub fullscreen: bool,
    /// Scaling algorithm for software paths.
    pub algorithm: ScaleAlgorithm,
}

/// One presentation path over a native window.
pub trait SurfaceDriver: Send {
    /// Capability level this driver achieves.
    fn accel(&self) -> AccelLevel;

    /// Copy/convert one frame into the back buffer. `pip` selects the inset
    /// position; dimensions must match those given at initialization.
    fn put_frame(&mut self, frame: &YuvFrame, pip: bool) -> Result<(), SurfaceError>;

    /// Commit the back buffer to the screen.
    fn sync(&mut self) -> Result<(), SurfaceError>;

    /// Drain the native event queue.
    fn process_events(&mut self) -> Vec<SurfaceEvent>;

    /// Flip the fullscreen state.
    fn toggle_fullscreen(&mut self);

    /// Flip the stay-on-top hint.
    fn toggle_on_top(&mut self);

    /// Flip the decoration hint.
    fn toggle_decoration(&mut self);
}

// ============================================================================
// Per-backend manager contract
// ============================================================================

/// What the engine asks a backend to display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayRequest {
    /// Layout to present.
    pub mode: VideoMode,
    /// Zoom of the composition.
    pub zoom: Zoom,
    /// Embedding target for embedded layouts.
    pub embed: Option<EmbedTarget>,
    /// Primary stream width.
    pub primary_width: u32,
    /// Primary stream height.
    pub primary_height: u32,
    /// Inset stream dimensions for dual layouts.
    pub pip_image: Option<(u32, u32)>,
    /// Keep the window above others.
    pub on_top: bool,
    /// Never attempt hardware overlays.
    pub disable_hw_accel: bool,
    /// Allow a software inset when only the primary got an overlay.
    pub allow_pip_sw_scaling: bool,
    /// Software scaling algorithm.
    pub algorithm: ScaleAlgorithm,
}

/// Outcome of a successful surface setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySetup {
    /// Capability level actually achieved.
    pub accel: AccelLevel,
    /// Realized window width.
    pub width: u32,
    /// Realized window height.
    pub height: u32,
}

/// The contract a per-backend manager implements for the generic engine.
///
/// The engine owns exactly one `FrameDisplay` and drives it only from the
/// render thread. `setup_frame_display` performs the full fallback chain
/// internally (hardware overlay, then software scaling); only the terminal
/// outcome crosses back to the engine.
pub trait FrameDisplay: Send {
    /// Called once when the render thread transitions from idle to active.
    fn init(&mut self) {}

    /// Called once when the render thread transitions back to idle.
    fn uninit(&mut self) {}

    /// Open (or reopen) the surface for the requested composition. An
    /// already-open surface is torn down first; at most one native surface
    /// exists per backend.
    fn setup_frame_display(&mut self, req: &DisplayRequest) -> Result<DisplaySetup, SurfaceError>;

    /// Tear down the surface. Returns whether a surface was open.
    fn close_frame_display(&mut self) -> bool;

    /// Present a single-stream frame into the back buffer.
    fn display_frame(&mut self, frame: &YuvFrame) -> Result<(), SurfaceError>;

    /// Present both streams, remote as primary, local as inset.
    fn display_pip_frames(
        &mut self,
        local: &YuvFrame,
        remote: &YuvFrame,
    ) -> Result<(), SurfaceError>;

    /// Commit the back buffer. May block until vblank; the engine guarantees
    /// no frame lock is held across this call.
    fn sync(&mut self, required: UpdateRequired);

    /// Drain native events; polled every render-loop iteration.
    fn process_events(&mut self) -> Vec<SurfaceEvent> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            SurfaceError::HardwareUnavailable.kind(),
            SurfaceErrorKind::HardwareUnavailable
        );
        assert_eq!(
            SurfaceError::SoftwareFailed("x".into()).kind(),
            SurfaceErrorKind::SoftwareFailed
        );
        assert_eq!(
            SurfaceError::DimensionMismatch {
                got_width: 1,
                got_height: 2,
                want_width: 3,
                want_height: 4
            }
            .kind(),
            SurfaceErrorKind::DimensionMismatch
        );
    }
}
