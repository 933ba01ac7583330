//! X11-flavored backend: XVideo overlay first, software scaling second.
//!
//! The backend composes one surface per setup out of the paths the display
//! actually offers. For dual layouts the inset is a logically separate
//! plane rendered into the same drawable at the bottom-right inset
//! rectangle; when the display has a second free overlay port the inset
//! goes through hardware too, otherwise it drops to the software path (if
//! permitted by configuration).

use tracing::{debug, info, warn};

use crate::frame::{UpdateRequired, YuvFrame};
use crate::geometry::zoomed;
use crate::info::{AccelLevel, VideoMode};

use super::software::{check_frame_dims, stream_rect, SoftwareDriver, SoftwarePath};
use super::{
    DisplayRequest, DisplaySetup, DriverConfig, FrameDisplay, NativeWindow, OverlayPort,
    SurfaceDriver, SurfaceError, SurfaceEvent, WindowRequest, WindowSystem,
};

/// How the PIP inset is presented by the overlay driver.
enum PipPath {
    /// No inset in this layout, or inset disabled by configuration.
    None,
    /// Second hardware overlay port.
    Overlay(OverlayPort),
    /// Software-scaled inset alongside the hardware primary.
    Software(SoftwarePath),
}

/// Hardware overlay driver: the primary stream always goes through an
/// overlay port, the inset through whatever [`PipPath`] was negotiated.
pub struct XvDriver {
    window: Box<dyn NativeWindow>,
    primary_port: OverlayPort,
    pip: PipPath,
    config: DriverConfig,
    on_top: bool,
    decorated: bool,
}

impl XvDriver {
    fn new(
        window: Box<dyn NativeWindow>,
        primary_port: OverlayPort,
        pip: PipPath,
        config: DriverConfig,
    ) -> Self {
        Self {
            window,
            primary_port,
            pip,
            config,
            on_top: false,
            decorated: true,
        }
    }
}

impl SurfaceDriver for XvDriver {
    fn accel(&self) -> AccelLevel {
        if self.config.pip_image.is_none() {
            AccelLevel::All
        } else {
            match self.pip {
                PipPath::Overlay(_) => AccelLevel::All,
                PipPath::Software(_) | PipPath::None => AccelLevel::RemoteOnly,
            }
        }
    }

    fn put_frame(&mut self, frame: &YuvFrame, pip: bool) -> Result<(), SurfaceError> {
        check_frame_dims(&self.config, frame, pip)?;
        let dst = stream_rect(&self.config, self.window.as_ref(), pip);
        if !pip {
            return self.window.blit_overlay(&self.primary_port, frame, dst);
        }
        match &mut self.pip {
            PipPath::Overlay(port) => self.window.blit_overlay(port, frame, dst),
            PipPath::Software(path) => path.blit(self.window.as_mut(), frame, dst),
            // Inset disabled: the primary stream alone fills the surface.
            PipPath::None => Ok(()),
        }
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

/// X11-flavored per-backend manager.
pub struct X11Backend {
    window_system: Box<dyn WindowSystem>,
    driver: Option<Box<dyn SurfaceDriver>>,
}

impl X11Backend {
    /// Bind the backend to a windowing-system connection.
    pub fn new(window_system: impl WindowSystem + 'static) -> Self {
        Self {
            window_system: Box::new(window_system),
            driver: None,
        }
    }

    fn driver_mut(&mut self) -> Result<&mut Box<dyn SurfaceDriver>, SurfaceError> {
        self.driver.as_mut().ok_or(SurfaceError::NotOpen)
    }
}

impl FrameDisplay for X11Backend {
    fn setup_frame_display(&mut self, req: &DisplayRequest) -> Result<DisplaySetup, SurfaceError> {
        // At most one native surface per backend.
        self.close_frame_display();

        let (win_w, win_h) = zoomed(req.primary_width, req.primary_height, req.zoom.percent());
        // Separate-window layouts ignore the embedding target.
        let embed = match req.mode {
            VideoMode::PipWindow | VideoMode::Fullscreen => None,
            _ => req.embed,
        };
        let window_req = WindowRequest {
            embed,
            x: embed.map_or(0, |e| e.x),
            y: embed.map_or(0, |e| e.y),
            width: win_w,
            height: win_h,
            fullscreen: req.mode.is_fullscreen(),
            on_top: req.on_top,
        };
        // A window is needed by every path; failure here is terminal.
        let window = self.window_system.open_window(&window_req)?;

        let config = DriverConfig {
            image_width: req.primary_width,
            image_height: req.primary_height,
            pip_image: req.pip_image,
            fullscreen: req.mode.is_fullscreen(),
            algorithm: req.algorithm,
        };

        let driver: Box<dyn SurfaceDriver> = if req.disable_hw_accel {
            debug!("hardware acceleration disabled by configuration");
            Box::new(SoftwareDriver::new(window, config))
        } else {
            match self.window_system.grab_overlay_port() {
                Ok(primary) => {
                    let pip = if req.pip_image.is_none() {
                        PipPath::None
                    } else {
                        match self.window_system.grab_overlay_port() {
                            Ok(port) => PipPath::Overlay(port),
                            Err(e) if req.allow_pip_sw_scaling => {
                                debug!("no overlay port for inset ({e}), scaling in software");
                                PipPath::Software(SoftwarePath::new(req.algorithm))
                            }
                            Err(e) => {
                                debug!("no overlay port for inset ({e}), inset disabled");
                                PipPath::None
                            }
                        }
                    };
                    Box::new(XvDriver::new(window, primary, pip, config))
                }
                Err(e) => {
                    debug!("overlay unavailable ({e}), falling back to software scaling");
                    Box::new(SoftwareDriver::new(window, config))
                }
            }
        };

        let setup = DisplaySetup {
            accel: driver.accel(),
            width: win_w,
            height: win_h,
        };
        info!(
            accel = ?setup.accel,
            mode = ?req.mode,
            width = win_w,
            height = win_h,
            "surface opened"
        );
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
        self.driver_mut()?.put_frame(frame, false)
    }

    fn display_pip_frames(
        &mut self,
        local: &YuvFrame,
        remote: &YuvFrame,
    ) -> Result<(), SurfaceError> {
        let driver = self.driver_mut()?;
        driver.put_frame(remote, false)?;
        driver.put_frame(local, true)
    }

    fn sync(&mut self, required: UpdateRequired) {
        if let Some(driver) = self.driver.as_mut() {
            if required.any() {
                if let Err(e) = driver.sync() {
                    warn!("sync failed: {e}");
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
