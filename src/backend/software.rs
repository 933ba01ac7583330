//! In-memory window system and the CPU presentation path.
//!
//! [`SoftwareWindowSystem`] stands in for a platform windowing API: windows
//! are double-buffered BGRA framebuffers, overlay ports are a configurable
//! candidate list routed through the process-wide registry. It backs the
//! test suite and headless operation; real platform integrations implement
//! the same [`WindowSystem`] seam.
//!
//! [`SoftwareDriver`] is the software-scaled presentation path shared by
//! every backend's fallback chain: scale the planar frame to the destination
//! rectangle, convert to packed BGRA, blit into the back buffer.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::trace;

use crate::convert::{i420_buffer_size, i420_to_bgra, ScaleAlgorithm, SoftwareScaler};
use crate::frame::YuvFrame;
use crate::geometry::{aspect_fit, pip_inset, Rect, PIP_RATIO_FULLSCREEN, PIP_RATIO_WINDOW};
use crate::info::AccelLevel;

use super::{
    DriverConfig, NativeWindow, OverlayPort, OverlayPortRegistry, SurfaceDriver, SurfaceError,
    SurfaceEvent, WindowRequest, WindowSystem,
};

// ============================================================================
// Probe
// ============================================================================

/// Observable state shared by every window a [`SoftwareWindowSystem`] opens.
#[derive(Debug, Default)]
pub struct WindowProbe {
    /// Windows opened so far.
    pub opened: u32,
    /// Windows dropped so far.
    pub closed: u32,
    /// Back-to-front commits.
    pub flips: u64,
    /// Software blits performed.
    pub bgra_blits: u64,
    /// Overlay blits performed.
    pub overlay_blits: u64,
    /// Destination rectangle of the most recent blit.
    pub last_blit: Option<Rect>,
    /// Most recent stay-on-top hint set on any window.
    pub last_on_top: Option<bool>,
    /// Most recent decoration hint set on any window.
    pub last_decorated: Option<bool>,
}

// ============================================================================
// Window system
// ============================================================================

/// An in-memory [`WindowSystem`].
pub struct SoftwareWindowSystem {
    overlay_ports: Vec<u32>,
    fail_open: bool,
    vsync_delay: Duration,
    probe: Arc<Mutex<WindowProbe>>,
    injected: Arc<Mutex<VecDeque<SurfaceEvent>>>,
}

impl Default for SoftwareWindowSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareWindowSystem {
    /// A window system with no overlay capability.
    pub fn new() -> Self {
        Self {
            overlay_ports: Vec::new(),
            fail_open: false,
            vsync_delay: Duration::ZERO,
            probe: Arc::new(Mutex::new(WindowProbe::default())),
            injected: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Advertise hardware overlay ports (allocated through the registry).
    pub fn with_overlay_ports(mut self, ports: Vec<u32>) -> Self {
        self.overlay_ports = ports;
        self
    }

    /// Make every window-open attempt fail (terminal-failure testing).
    pub fn with_failing_windows(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Simulate a vblank wait of `delay` on every flip.
    pub fn with_vsync_delay(mut self, delay: Duration) -> Self {
        self.vsync_delay = delay;
        self
    }

    /// Shared observation handle for windows opened by this system.
    pub fn probe(&self) -> Arc<Mutex<WindowProbe>> {
        Arc::clone(&self.probe)
    }

    /// Queue a native event for the next `poll_events` of any window.
    pub fn inject_event(&self, event: SurfaceEvent) {
        self.injected
            .lock()
            .expect("event queue poisoned")
            .push_back(event);
    }
}

impl WindowSystem for SoftwareWindowSystem {
    fn open_window(&mut self, req: &WindowRequest) -> Result<Box<dyn NativeWindow>, SurfaceError> {
        if self.fail_open {
            return Err(SurfaceError::SoftwareFailed(
                "window creation refused".into(),
            ));
        }
        if req.width == 0 || req.height == 0 {
            return Err(SurfaceError::SoftwareFailed(format!(
                "degenerate window size {}x{}",
                req.width, req.height
            )));
        }
        let mut probe = self.probe.lock().expect("probe poisoned");
        probe.opened += 1;
        Ok(Box::new(SoftwareWindow {
            width: req.width,
            height: req.height,
            back: vec![0; (req.width * req.height * 4) as usize],
            front: vec![0; (req.width * req.height * 4) as usize],
            fullscreen: req.fullscreen,
            on_top: req.on_top,
            decorated: !req.fullscreen,
            vsync_delay: self.vsync_delay,
            probe: Arc::clone(&self.probe),
            injected: Arc::clone(&self.injected),
        }))
    }

    fn grab_overlay_port(&mut self) -> Result<OverlayPort, SurfaceError> {
        OverlayPortRegistry::grab(&self.overlay_ports).ok_or(SurfaceError::HardwareUnavailable)
    }
}

// ============================================================================
// Window
// ============================================================================

struct SoftwareWindow {
    width: u32,
    height: u32,
    back: Vec<u8>,
    front: Vec<u8>,
    fullscreen: bool,
    on_top: bool,
    decorated: bool,
    vsync_delay: Duration,
    probe: Arc<Mutex<WindowProbe>>,
    injected: Arc<Mutex<VecDeque<SurfaceEvent>>>,
}

impl SoftwareWindow {
    fn copy_rows(&mut self, pixels: &[u8], width: u32, height: u32, dst: Rect) {
        let win_w = self.width as i64;
        let win_h = self.height as i64;
        for row in 0..height as i64 {
            let dst_y = dst.y as i64 + row;
            if dst_y < 0 || dst_y >= win_h {
                continue;
            }
            let src_start = (row * width as i64 * 4) as usize;
            // Horizontal clip.
            let x0 = dst.x.max(0) as i64;
            let x1 = ((dst.x as i64) + width as i64).min(win_w);
            if x1 <= x0 {
                continue;
            }
            let skip = (x0 - dst.x as i64) as usize;
            let count = (x1 - x0) as usize;
            let src = &pixels[src_start + skip * 4..src_start + (skip + count) * 4];
            let dst_start = ((dst_y * win_w + x0) * 4) as usize;
            self.back[dst_start..dst_start + count * 4].copy_from_slice(src);
        }
    }
}

impl NativeWindow for SoftwareWindow {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn blit_bgra(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        dst: Rect,
    ) -> Result<(), SurfaceError> {
        if pixels.len() < (width * height * 4) as usize {
            return Err(SurfaceError::SoftwareFailed(format!(
                "blit buffer too small for {width}x{height}"
            )));
        }
        self.copy_rows(pixels, width, height, dst);
        let mut probe = self.probe.lock().expect("probe poisoned");
        probe.bgra_blits += 1;
        probe.last_blit = Some(dst);
        Ok(())
    }

    fn blit_overlay(
        &mut self,
        port: &OverlayPort,
        frame: &YuvFrame,
        dst: Rect,
    ) -> Result<(), SurfaceError> {
        trace!(port = port.id(), ?dst, "overlay blit");
        // Stand-in for the hardware path: nearest scale plus conversion.
        let sw = (dst.width & !1).max(2);
        let sh = (dst.height & !1).max(2);
        let mut scaled = vec![0u8; i420_buffer_size(sw, sh)];
        SoftwareScaler::new(ScaleAlgorithm::NearestNeighbor)
            .scale_i420(frame.data(), frame.width(), frame.height(), &mut scaled, sw, sh)
            .map_err(|e| SurfaceError::NegotiationFailed(e.to_string()))?;
        let mut packed = vec![0u8; (sw * sh * 4) as usize];
        i420_to_bgra(&scaled, sw, sh, &mut packed)
            .map_err(|e| SurfaceError::NegotiationFailed(e.to_string()))?;
        self.copy_rows(&packed, sw, sh, Rect::new(dst.x, dst.y, sw, sh));
        let mut probe = self.probe.lock().expect("probe poisoned");
        probe.overlay_blits += 1;
        probe.last_blit = Some(dst);
        Ok(())
    }

    fn flip(&mut self) -> Result<(), SurfaceError> {
        self.front.copy_from_slice(&self.back);
        if !self.vsync_delay.is_zero() {
            std::thread::sleep(self.vsync_delay);
        }
        self.probe.lock().expect("probe poisoned").flips += 1;
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<SurfaceEvent> {
        let mut queue = self.injected.lock().expect("event queue poisoned");
        let events: Vec<_> = queue.drain(..).collect();
        for ev in &events {
            if let SurfaceEvent::Resized { width, height } = *ev {
                self.width = width;
                self.height = height;
                self.back.resize((width * height * 4) as usize, 0);
                self.front.resize((width * height * 4) as usize, 0);
            }
        }
        events
    }

    fn set_fullscreen(&mut self, on: bool) {
        self.fullscreen = on;
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn set_on_top(&mut self, on: bool) {
        self.on_top = on;
        self.probe.lock().expect("probe poisoned").last_on_top = Some(on);
    }

    fn set_decorated(&mut self, on: bool) {
        self.decorated = on;
        self.probe.lock().expect("probe poisoned").last_decorated = Some(on);
    }
}

impl Drop for SoftwareWindow {
    fn drop(&mut self) {
        self.probe.lock().expect("probe poisoned").closed += 1;
    }
}

// ============================================================================
// Software pixel path
// ============================================================================

/// Reusable scale-convert-blit path with scratch buffers, shared by the
/// software driver and by hardware drivers that fall back to a software
/// inset.
pub(crate) struct SoftwarePath {
    scaler: SoftwareScaler,
    scaled: Vec<u8>,
    packed: Vec<u8>,
}

impl SoftwarePath {
    pub(crate) fn new(algorithm: ScaleAlgorithm) -> Self {
        Self {
            scaler: SoftwareScaler::new(algorithm),
            scaled: Vec::new(),
            packed: Vec::new(),
        }
    }

    /// Scale `frame` to `dst`, convert to BGRA and blit into the window's
    /// back buffer.
    pub(crate) fn blit(
        &mut self,
        window: &mut dyn NativeWindow,
        frame: &YuvFrame,
        dst: Rect,
    ) -> Result<(), SurfaceError> {
        // The planar scaler needs even dimensions.
        let sw = (dst.width & !1).max(2);
        let sh = (dst.height & !1).max(2);
        self.scaled.resize(i420_buffer_size(sw, sh), 0);
        self.scaler
            .scale_i420(frame.data(), frame.width(), frame.height(), &mut self.scaled, sw, sh)
            .map_err(|e| SurfaceError::SoftwareFailed(e.to_string()))?;
        self.packed.resize((sw * sh * 4) as usize, 0);
        i420_to_bgra(&self.scaled, sw, sh, &mut self.packed)
            .map_err(|e| SurfaceError::SoftwareFailed(e.to_string()))?;
        window.blit_bgra(&self.packed, sw, sh, Rect::new(dst.x, dst.y, sw, sh))
    }
}

/// Validate frame dimensions against the driver configuration.
pub(crate) fn check_frame_dims(
    config: &DriverConfig,
    frame: &YuvFrame,
    pip: bool,
) -> Result<(), SurfaceError> {
    let want = if pip {
        config
            .pip_image
            .ok_or_else(|| SurfaceError::Unsupported("no PIP inset configured".into()))?
    } else {
        (config.image_width, config.image_height)
    };
    if (frame.width(), frame.height()) != want {
        return Err(SurfaceError::DimensionMismatch {
            got_width: frame.width(),
            got_height: frame.height(),
            want_width: want.0,
            want_height: want.1,
        });
    }
    Ok(())
}

/// Destination rectangle for a stream in the given window.
pub(crate) fn stream_rect(config: &DriverConfig, window: &dyn NativeWindow, pip: bool) -> Rect {
    let (win_w, win_h) = window.size();
    if pip {
        let ratio = if window.is_fullscreen() {
            PIP_RATIO_FULLSCREEN
        } else {
            PIP_RATIO_WINDOW
        };
        pip_inset(win_w, win_h, ratio)
    } else {
        aspect_fit(win_w, win_h, config.image_width, config.image_height)
    }
}

// ============================================================================
// Software driver
// ============================================================================

/// CPU presentation path: scale, convert, blit.
pub struct SoftwareDriver {
    window: Box<dyn NativeWindow>,
    config: DriverConfig,
    path: SoftwarePath,
    on_top: bool,
    decorated: bool,
}

impl SoftwareDriver {
    /// Wrap a native window with the software path.
    pub fn new(window: Box<dyn NativeWindow>, config: DriverConfig) -> Self {
        Self {
            window,
            path: SoftwarePath::new(config.algorithm),
            config,
            on_top: false,
            decorated: true,
        }
    }
}

impl SurfaceDriver for SoftwareDriver {
    fn accel(&self) -> AccelLevel {
        AccelLevel::None
    }

    fn put_frame(&mut self, frame: &YuvFrame, pip: bool) -> Result<(), SurfaceError> {
        check_frame_dims(&self.config, frame, pip)?;
        let dst = stream_rect(&self.config, self.window.as_ref(), pip);
        self.path.blit(self.window.as_mut(), frame, dst)
    }

    fn sync(&mut self) -> Result<(), SurfaceError> {
        self.window.flip()
    }

    fn process_events(&mut self) -> Vec<SurfaceEvent> {
        self.window.poll_events()
    }

    fn toggle_fullscreen(&mut self) {
        let on = !self.window.is_fullscreen();
        self.window.set_fullscreen(on);
    }

    fn toggle_on_top(&mut self) {
        self.on_top = !self.on_top;
        self.window.set_on_top(self.on_top);
    }

    fn toggle_decoration(&mut self) {
        self.decorated = !self.decorated;
        self.window.set_decorated(self.decorated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(ws: &mut SoftwareWindowSystem, w: u32, h: u32) -> Box<dyn NativeWindow> {
        ws.open_window(&WindowRequest {
            embed: None,
            x: 0,
            y: 0,
            width: w,
            height: h,
            fullscreen: false,
            on_top: false,
        })
        .unwrap()
    }

    fn test_frame(w: u32, h: u32) -> YuvFrame {
        let mut f = YuvFrame::new();
        let data = vec![128u8; i420_buffer_size(w, h)];
        f.write(&data, w, h).unwrap();
        f
    }

    #[test]
    fn test_driver_puts_and_flips() {
        let mut ws = SoftwareWindowSystem::new();
        let probe = ws.probe();
        let window = open(&mut ws, 640, 480);
        let mut driver = SoftwareDriver::new(
            window,
            DriverConfig {
                image_width: 320,
                image_height: 240,
                pip_image: None,
                fullscreen: false,
                algorithm: ScaleAlgorithm::NearestNeighbor,
            },
        );

        driver.put_frame(&test_frame(320, 240), false).unwrap();
        driver.sync().unwrap();

        let p = probe.lock().unwrap();
        assert_eq!(p.bgra_blits, 1);
        assert_eq!(p.flips, 1);
        // 320x240 fits 640x480 exactly.
        assert_eq!(p.last_blit.unwrap().width, 640);
    }

    #[test]
    fn test_driver_rejects_resolution_change() {
        let mut ws = SoftwareWindowSystem::new();
        let window = open(&mut ws, 640, 480);
        let mut driver = SoftwareDriver::new(
            window,
            DriverConfig {
                image_width: 320,
                image_height: 240,
                pip_image: None,
                fullscreen: false,
                algorithm: ScaleAlgorithm::default(),
            },
        );

        let err = driver.put_frame(&test_frame(160, 120), false).unwrap_err();
        assert!(matches!(err, SurfaceError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_pip_inset_rect_bottom_right() {
        let mut ws = SoftwareWindowSystem::new();
        let probe = ws.probe();
        let window = open(&mut ws, 600, 300);
        let mut driver = SoftwareDriver::new(
            window,
            DriverConfig {
                image_width: 320,
                image_height: 240,
                pip_image: Some((160, 120)),
                fullscreen: false,
                algorithm: ScaleAlgorithm::default(),
            },
        );

        driver.put_frame(&test_frame(160, 120), true).unwrap();
        let p = probe.lock().unwrap();
        let r = p.last_blit.unwrap();
        assert_eq!((r.width, r.height), (200, 100));
        assert_eq!((r.x, r.y), (400, 200));
    }

    #[test]
    fn test_failing_window_system() {
        let mut ws = SoftwareWindowSystem::new().with_failing_windows();
        let err = ws
            .open_window(&WindowRequest {
                embed: None,
                x: 0,
                y: 0,
                width: 100,
                height: 100,
                fullscreen: false,
                on_top: false,
            })
            .unwrap_err();
        assert!(matches!(err, SurfaceError::SoftwareFailed(_)));
    }

    #[test]
    fn test_no_ports_means_hardware_unavailable() {
        let mut ws = SoftwareWindowSystem::new();
        assert!(matches!(
            ws.grab_overlay_port().unwrap_err(),
            SurfaceError::HardwareUnavailable
        ));
    }

    #[test]
    fn test_resize_event_resizes_window() {
        let mut ws = SoftwareWindowSystem::new();
        ws.inject_event(SurfaceEvent::Resized {
            width: 800,
            height: 600,
        });
        let mut window = open(&mut ws, 640, 480);
        let events = window.poll_events();
        assert_eq!(events.len(), 1);
        assert_eq!(window.size(), (800, 600));
    }
}
