//! # Viewport
//!
//! The video-output subsystem of a conferencing client: fan-out of decoded
//! I420 frames to any number of presentation surfaces, each driven by its
//! own render thread over a pluggable windowing backend.
//!
//! ## Architecture
//!
//! - [`core::VideoOutputCore`] duplicates frames and configuration to every
//!   registered manager and reference-counts start/stop.
//! - [`manager::RenderManager`] is the generic per-surface engine: one named
//!   render thread, divergence-driven surface renegotiation, and vertical
//!   sync kept strictly off the frame-delivery path.
//! - [`backend`] holds the surface drivers: an XVideo-style backend with a
//!   per-stream hardware/software split, a DirectDraw-style flip-chain
//!   backend, and an in-process software backend used as the universal
//!   fallback and as the test substrate. Hardware overlay negotiation
//!   degrades per surface: full overlay, remote-only overlay, software,
//!   and finally no video at all.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use viewport::prelude::*;
//!
//! let core = VideoOutputCore::new();
//! let backend = X11Backend::new(SoftwareWindowSystem::new());
//! let manager = RenderManager::new("main", backend, core.event_sender())?;
//! core.add_manager(std::sync::Arc::new(manager));
//! core.start();
//! core.set_frame_data(&frame, 320, 240, false, 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod convert;
pub mod core;
pub mod error;
pub mod event;
pub mod frame;
pub mod geometry;
pub mod info;
pub mod manager;
pub mod settings;
pub mod stats;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::backend::{DxBackend, FrameDisplay, SoftwareWindowSystem, X11Backend};
    pub use crate::core::VideoOutputCore;
    pub use crate::error::{Error, Result};
    pub use crate::event::{VideoOutputEvent, VideoOutputEventKind};
    pub use crate::info::{AccelLevel, DisplayInfo, VideoMode, Zoom};
    pub use crate::manager::{RenderManager, VideoOutputManager};
    pub use crate::settings::DisplaySettings;
    pub use crate::stats::VideoOutputStats;
}

pub use error::{Error, Result};
