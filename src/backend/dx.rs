//! DirectDraw-flavored backend.
//!
//! One primary surface with an attached back buffer: frames are blitted
//! into the back buffer (overlay hardware when available, CPU conversion
//! otherwise) and `sync` performs the explicit back-to-front flip. Unlike
//! the X11 backend there is no per-stream overlay split; the composition
//! either runs fully accelerated or fully in software.

use tracing::{debug, info, warn};

use crate::frame::{UpdateRequired, YuvFrame};
use crate::geometry::zoomed;
use crate::info::{AccelLevel, VideoMode};

use super::software::{check_frame_dims, stream_rect, SoftwarePath};
use super::{
    DisplayRequest, DisplaySetup, DriverConfig, FrameDisplay, NativeWindow, OverlayPort,
    SurfaceDriver, SurfaceError, SurfaceEvent, WindowRequest, WindowSystem,
};

/// DirectDraw-style driver: one window, hardware overlay for the whole
/// composition when a port is available, CPU path otherwise.
pub struct DxDriver {
    window: Box<dyn NativeWindow>,
    overlay: Option<OverlayPort>,
    path: SoftwarePath,
    config: DriverConfig,
    on_top: bool,
    decorated: bool,
}

impl DxDriver {
    fn new(window: Box<dyn NativeWindow>, overlay: Option<OverlayPort>, config: DriverConfig) -> Self {
        Self {
            window,
            overlay,
            path: SoftwarePath::new(config.algorithm),
            config,
            on_top: false,
            decorated: true,
        }
    }
}

impl SurfaceDriver for DxDriver {
    fn accel(&self) -> AccelLevel {
        if self.overlay.is_some() {
            AccelLevel::All
        } else {
            AccelLevel::None
        }
    }

    fn put_frame(&mut self, frame: &YuvFrame, pip: bool) -> Result<(), SurfaceError> {
        check_frame_dims(&self.config, frame, pip)?;
        let dst = stream_rect(&self.config, self.window.as_ref(), pip);
        match &self.overlay {
            Some(port) => self.window.blit_overlay(port, frame, dst),
            None => self.path.blit(self.window.as_mut(), frame, dst),
        }
    }

    fn sync(&mut self) -> Result<(), SurfaceError> {
        // Back buffer to primary surface; may wait for vblank.
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

/// DirectDraw-flavored per-backend manager.
pub struct DxBackend {
    window_system: Box<dyn WindowSystem>,
    driver: Option<DxDriver>,
}

impl DxBackend {
    /// Bind the backend to a windowing-system connection.
    pub fn new(window_system: impl WindowSystem + 'static) -> Self {
        Self {
            window_system: Box::new(window_system),
            driver: None,
        }
    }
}

impl FrameDisplay for DxBackend {
    fn setup_frame_display(&mut self, req: &DisplayRequest) -> Result<DisplaySetup, SurfaceError> {
        self.close_frame_display();

        let (win_w, win_h) = zoomed(req.primary_width, req.primary_height, req.zoom.percent());
        let embed = match req.mode {
            VideoMode::PipWindow | VideoMode::Fullscreen => None,
            _ => req.embed,
        };
        let window = self.window_system.open_window(&WindowRequest {
            embed,
            x: embed.map_or(0, |e| e.x),
            y: embed.map_or(0, |e| e.y),
            width: win_w,
            height: win_h,
            fullscreen: req.mode.is_fullscreen(),
            on_top: req.on_top,
        })?;

        let overlay = if req.disable_hw_accel {
            None
        } else {
            match self.window_system.grab_overlay_port() {
                Ok(port) => Some(port),
                Err(e) => {
                    debug!("overlay unavailable ({e}), using CPU blits");
                    None
                }
            }
        };

        let driver = DxDriver::new(
            window,
            overlay,
            DriverConfig {
                image_width: req.primary_width,
                image_height: req.primary_height,
                pip_image: req.pip_image,
                fullscreen: req.mode.is_fullscreen(),
                algorithm: req.algorithm,
            },
        );
        let setup = DisplaySetup {
            accel: driver.accel(),
            width: win_w,
            height: win_h,
        };
        info!(accel = ?setup.accel, mode = ?req.mode, "surface opened");
        self.driver = Some(driver);
        Ok(setup)
    }

    fn close_frame_display(&mut self) -> bool {
        if self.driver.take().is_some() {
            info!("surface closed");
            true
        } else {
            false
        }
    }

    fn display_frame(&mut self, frame: &YuvFrame) -> Result<(), SurfaceError> {
        self.driver
            .as_mut()
            .ok_or(SurfaceError::NotOpen)?
            .put_frame(frame, false)
    }

    fn display_pip_frames(
        &mut self,
        local: &YuvFrame,
        remote: &YuvFrame,
    ) -> Result<(), SurfaceError> {
        let driver = self.driver.as_mut().ok_or(SurfaceError::NotOpen)?;
        driver.put_frame(remote, false)?;
        driver.put_frame(local, true)
    }

    fn sync(&mut self, required: UpdateRequired) {
        if let Some(driver) = self.driver.as_mut() {
            if required.any() {
                if let Err(e) = driver.sync() {
                    warn!("flip failed: {e}");
                }
            }
        }
    }

    fn process_events(&mut self) -> Vec<SurfaceEvent> {
        let Some(driver) = self.driver.as_mut() else {
            return Vec::new();
        };
        let events = driver.process_events();
        for ev in &events {
            match ev {
                SurfaceEvent::FullscreenRequested(_) => driver.toggle_fullscreen(),
                SurfaceEvent::OnTopRequested => driver.toggle_on_top(),
                SurfaceEvent::DecorationRequested => driver.toggle_decoration(),
                SurfaceEvent::Resized { .. } => {}
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::port::test_guard;
    use crate::backend::software::SoftwareWindowSystem;
    use crate::backend::OverlayPortRegistry;
    use crate::convert::{i420_buffer_size, ScaleAlgorithm};
    use crate::info::Zoom;

    fn request() -> DisplayRequest {
        DisplayRequest {
            mode: VideoMode::Remote,
            zoom: Zoom(100),
            embed: None,
            primary_width: 320,
            primary_height: 240,
            pip_image: None,
            on_top: false,
            disable_hw_accel: false,
            allow_pip_sw_scaling: true,
            algorithm: ScaleAlgorithm::NearestNeighbor,
        }
    }

    #[test]
    fn test_software_fallback() {
        let mut backend = DxBackend::new(SoftwareWindowSystem::new());
        let setup = backend.setup_frame_display(&request()).unwrap();
        assert_eq!(setup.accel, AccelLevel::None);
    }

    #[test]
    fn test_overlay_when_port_free() {
        let _guard = test_guard();
        OverlayPortRegistry::reset();
        let ws = SoftwareWindowSystem::new().with_overlay_ports(vec![90]);
        let mut backend = DxBackend::new(ws);
        let setup = backend.setup_frame_display(&request()).unwrap();
        assert_eq!(setup.accel, AccelLevel::All);
        backend.close_frame_display();
        assert!(!OverlayPortRegistry::is_grabbed(90));
    }

    #[test]
    fn test_window_hint_requests_toggle_the_window() {
        let ws = SoftwareWindowSystem::new();
        let probe = ws.probe();
        ws.inject_event(SurfaceEvent::OnTopRequested);
        ws.inject_event(SurfaceEvent::DecorationRequested);
        let mut backend = DxBackend::new(ws);
        backend.setup_frame_display(&request()).unwrap();

        backend.process_events();
        let p = probe.lock().unwrap();
        assert_eq!(p.last_on_top, Some(true));
        assert_eq!(p.last_decorated, Some(false));
    }

    #[test]
    fn test_flip_only_on_sync() {
        let ws = SoftwareWindowSystem::new();
        let probe = ws.probe();
        let mut backend = DxBackend::new(ws);
        backend.setup_frame_display(&request()).unwrap();

        let mut f = YuvFrame::new();
        f.write(&vec![128u8; i420_buffer_size(320, 240)], 320, 240)
            .unwrap();
        backend.display_frame(&f).unwrap();
        assert_eq!(probe.lock().unwrap().flips, 0);

        backend.sync(UpdateRequired {
            local: false,
            remote: true,
        });
        assert_eq!(probe.lock().unwrap().flips, 1);
    }
}
