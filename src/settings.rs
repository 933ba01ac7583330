//! Bridge between persisted configuration and [`DisplayInfo`].
//!
//! Persisted values come from whatever configuration store the application
//! uses; out-of-range values are clamped to defaults on load and the caller
//! is told to write the corrected value back.

use serde::{Deserialize, Serialize};

use crate::convert::ScaleAlgorithm;
use crate::info::{DisplayInfo, VideoMode, Zoom};

/// Persisted display preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Layout index, valid range [0, 4].
    pub video_view: u32,
    /// Zoom percent, valid set {50, 100, 200}.
    pub zoom: u32,
    /// Keep the video window above others.
    pub stay_on_top: bool,
    /// Never attempt hardware overlays.
    pub disable_hw_accel: bool,
    /// Allow a software-scaled PIP inset alongside a hardware primary.
    pub allow_pip_sw_scaling: bool,
    /// Software scaling algorithm index, valid range [0, 3].
    pub scaling_algorithm: u32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            video_view: 0,
            zoom: 100,
            stay_on_top: false,
            disable_hw_accel: false,
            allow_pip_sw_scaling: true,
            scaling_algorithm: 0,
        }
    }
}

impl DisplaySettings {
    /// Clamp out-of-range values to defaults. Returns the corrected settings
    /// and whether anything changed (caller persists the correction).
    pub fn clamped(&self) -> (Self, bool) {
        let mut out = *self;
        if out.video_view > 4 {
            out.video_view = 0;
        }
        if !matches!(out.zoom, 50 | 100 | 200) {
            out.zoom = 100;
        }
        if out.scaling_algorithm > 3 {
            out.scaling_algorithm = 0;
        }
        let corrected = out != *self;
        (out, corrected)
    }

    /// Build the config half of a [`DisplayInfo`] from these settings.
    /// The widget half is left unset.
    pub fn to_display_info(&self) -> DisplayInfo {
        let (clamped, _) = self.clamped();
        DisplayInfo {
            config_info_set: true,
            mode: VideoMode::from_index(clamped.video_view),
            zoom: Zoom::clamped(clamped.zoom),
            on_top: clamped.stay_on_top,
            disable_hw_accel: clamped.disable_hw_accel,
            allow_pip_sw_scaling: clamped.allow_pip_sw_scaling,
            sw_scaling_algorithm: ScaleAlgorithm::from_index(clamped.scaling_algorithm),
            ..DisplayInfo::default()
        }
    }
}
