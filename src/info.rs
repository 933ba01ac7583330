//! Display configuration and frame geometry records.
//!
//! [`DisplayInfo`] is the cross-thread configuration snapshot written by the
//! GUI layer; it has two independently-populated halves (widget realization
//! vs. configuration load) converging on one shared struct. [`FrameInfo`] is
//! the per-manager record of the currently/previously displayed geometry;
//! divergence between the two live instances triggers reconfiguration.

use crate::convert::ScaleAlgorithm;

/// Presentation layout for the video area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoMode {
    /// Only the local stream.
    Local,
    /// Only the remote stream.
    Remote,
    /// Remote with a local inset, embedded in the main window.
    Pip,
    /// Remote with a local inset, in a separate window.
    PipWindow,
    /// Remote with a local inset, fullscreen.
    Fullscreen,
    /// Not yet configured.
    #[default]
    Unset,
}

impl VideoMode {
    /// Map a persisted `video_view` index to a mode. Out-of-range values
    /// fall back to index 0 (local).
    pub fn from_index(index: u32) -> Self {
        match index {
            0 => Self::Local,
            1 => Self::Remote,
            2 => Self::Pip,
            3 => Self::PipWindow,
            4 => Self::Fullscreen,
            _ => Self::Local,
        }
    }

    /// The persisted index for this mode; `Unset` has none.
    pub fn index(self) -> Option<u32> {
        match self {
            Self::Local => Some(0),
            Self::Remote => Some(1),
            Self::Pip => Some(2),
            Self::PipWindow => Some(3),
            Self::Fullscreen => Some(4),
            Self::Unset => None,
        }
    }

    /// Whether this layout presents the local stream.
    pub fn wants_local(self) -> bool {
        matches!(
            self,
            Self::Local | Self::Pip | Self::PipWindow | Self::Fullscreen
        )
    }

    /// Whether this layout presents the remote stream.
    pub fn wants_remote(self) -> bool {
        matches!(
            self,
            Self::Remote | Self::Pip | Self::PipWindow | Self::Fullscreen
        )
    }

    /// Whether this layout composites both streams.
    pub fn is_dual(self) -> bool {
        matches!(self, Self::Pip | Self::PipWindow | Self::Fullscreen)
    }

    /// Whether this layout covers the whole screen.
    pub fn is_fullscreen(self) -> bool {
        matches!(self, Self::Fullscreen)
    }
}

/// Degree of hardware offload achieved for a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccelLevel {
    /// Software scaling for every presented stream.
    #[default]
    None,
    /// Hardware overlay for the remote/primary stream only.
    RemoteOnly,
    /// Hardware overlay for every presented stream.
    All,
    /// Both hardware and software paths failed; surface disabled.
    NoVideo,
}

/// Zoom factor in percent. Zero means "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Zoom(pub u32);

impl Zoom {
    /// Unset zoom.
    pub const UNSET: Self = Self(0);

    /// Whether the zoom has been configured.
    #[inline]
    pub fn is_set(self) -> bool {
        self.0 != 0
    }

    /// Zoom percentage, treating unset as 100.
    #[inline]
    pub fn percent(self) -> u32 {
        if self.0 == 0 { 100 } else { self.0 }
    }

    /// Clamp a persisted zoom value to the supported set {50, 100, 200},
    /// falling back to 100.
    pub fn clamped(value: u32) -> Self {
        match value {
            50 | 100 | 200 => Self(value),
            _ => Self(100),
        }
    }
}

/// Native embedding target for the video area: an opaque window handle plus
/// graphics context and placement inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmbedTarget {
    /// Native window/drawable handle.
    pub window: u64,
    /// Native graphics-context handle.
    pub gc: u64,
    /// Horizontal placement inside the embedding widget.
    pub x: i32,
    /// Vertical placement inside the embedding widget.
    pub y: i32,
}

/// Requested display configuration, set by the GUI thread.
///
/// Two independent writers populate this struct: widget realization fills
/// the widget half, configuration load fills the config half. [`DisplayInfo::merge`]
/// only overwrites the halves whose "set" flag is true in the source, so the
/// writers never clobber each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayInfo {
    /// Whether the widget half below is populated.
    pub widget_info_set: bool,
    /// Embedding target (widget half).
    pub embed: EmbedTarget,

    /// Whether the config half below is populated.
    pub config_info_set: bool,
    /// Requested layout.
    pub mode: VideoMode,
    /// Requested zoom.
    pub zoom: Zoom,
    /// Keep the video window above others. Changing this on an open surface
    /// takes effect when the surface is next renegotiated (mode, zoom or
    /// geometry change).
    pub on_top: bool,
    /// Never attempt hardware overlays.
    pub disable_hw_accel: bool,
    /// Allow a software-scaled PIP inset when the overlay path covers only
    /// the primary stream.
    pub allow_pip_sw_scaling: bool,
    /// Software scaling algorithm choice.
    pub sw_scaling_algorithm: ScaleAlgorithm,
}

impl Default for DisplayInfo {
    fn default() -> Self {
        Self {
            widget_info_set: false,
            embed: EmbedTarget::default(),
            config_info_set: false,
            mode: VideoMode::Unset,
            zoom: Zoom::UNSET,
            on_top: false,
            disable_hw_accel: false,
            allow_pip_sw_scaling: true,
            sw_scaling_algorithm: ScaleAlgorithm::default(),
        }
    }
}

impl DisplayInfo {
    /// Partial update: copy only the halves of `src` whose "set" flag is
    /// true, preserving previously-set fields of the other half.
    pub fn merge(&mut self, src: &DisplayInfo) {
        if src.widget_info_set {
            self.widget_info_set = true;
            self.embed = src.embed;
        }
        if src.config_info_set {
            self.config_info_set = true;
            self.mode = src.mode;
            self.zoom = src.zoom;
            self.on_top = src.on_top;
            self.disable_hw_accel = src.disable_hw_accel;
            self.allow_pip_sw_scaling = src.allow_pip_sw_scaling;
            self.sw_scaling_algorithm = src.sw_scaling_algorithm;
        }
    }

    /// Whether enough configuration has arrived to set up a surface.
    pub fn is_ready(&self) -> bool {
        self.widget_info_set
            && self.config_info_set
            && self.mode != VideoMode::Unset
            && self.zoom.is_set()
    }
}

/// Geometry and mode of a displayed (or to-be-displayed) composition.
///
/// Each manager keeps two: `current` (being built from incoming frames and
/// configuration) and `last` (most recently displayed). Their divergence is
/// what [`frame_display_change_needed`](crate::manager) detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    /// Layout of the composition.
    pub mode: VideoMode,
    /// Capability actually achieved for the open surface.
    pub accel: AccelLevel,
    /// Both streams have delivered a frame since the last reconfiguration.
    pub both_streams_active: bool,
    /// Local stream width.
    pub local_width: u32,
    /// Local stream height.
    pub local_height: u32,
    /// Remote stream width.
    pub remote_width: u32,
    /// Remote stream height.
    pub remote_height: u32,
    /// Zoom of the composition.
    pub zoom: Zoom,
    /// Horizontal embedding placement.
    pub embedded_x: i32,
    /// Vertical embedding placement.
    pub embedded_y: i32,
}
