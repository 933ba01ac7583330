//! Tagged events re-emitted from managers to the GUI layer.
//!
//! Managers run render threads; the GUI consumes their signals on its own
//! thread. Rather than capturing manager pointers in callbacks, every signal
//! is an explicit [`VideoOutputEvent`] tagged with the originating
//! [`ManagerId`] and pushed onto a channel owned by the core.

use std::fmt;

use crate::backend::SurfaceErrorKind;
use crate::info::{AccelLevel, VideoMode, Zoom};

/// Identity of a registered manager, assigned by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ManagerId(pub usize);

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "manager#{}", self.0)
    }
}

/// Direction of a fullscreen change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullscreenToggle {
    /// Enter fullscreen.
    On,
    /// Leave fullscreen.
    Off,
    /// Flip the current state.
    Toggle,
}

/// Signal payloads emitted by a manager.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VideoOutputEventKind {
    /// A surface was (re)opened.
    DeviceOpened {
        /// Capability level actually achieved.
        accel: AccelLevel,
        /// Layout being presented.
        mode: VideoMode,
        /// Zoom of the composition.
        zoom: Zoom,
        /// Whether both streams are composited.
        both_streams: bool,
    },
    /// The surface was closed.
    DeviceClosed,
    /// Terminal surface failure; video disabled until configuration changes.
    DeviceError(SurfaceErrorKind),
    /// Fullscreen was toggled (user input or mode change).
    FullscreenChanged(FullscreenToggle),
    /// The presentation window was resized.
    SizeChanged {
        /// New window width.
        width: u32,
        /// New window height.
        height: u32,
    },
}

/// A manager signal tagged with its origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoOutputEvent {
    /// Originating manager.
    pub manager: ManagerId,
    /// Signal payload.
    pub kind: VideoOutputEventKind,
}

/// Sending half handed to a manager at registration; tags every event with
/// the manager's identity.
#[derive(Debug, Clone)]
pub struct EventSender {
    id: ManagerId,
    tx: kanal::Sender<VideoOutputEvent>,
}

impl EventSender {
    pub(crate) fn new(id: ManagerId, tx: kanal::Sender<VideoOutputEvent>) -> Self {
        Self { id, tx }
    }

    /// The identity this sender tags events with.
    pub fn id(&self) -> ManagerId {
        self.id
    }

    /// Emit an event. A disconnected receiver is not an error; the GUI may
    /// simply have gone away first during shutdown.
    pub fn emit(&self, kind: VideoOutputEventKind) {
        if self
            .tx
            .send(VideoOutputEvent {
                manager: self.id,
                kind,
            })
            .is_err()
        {
            tracing::trace!(manager = %self.id, "event receiver disconnected");
        }
    }
}
