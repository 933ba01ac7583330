//! Recording backend for tests.
//!
//! Records every contract call with its arguments and timing, and can be
//! scripted to fail at either stage of the fallback chain or to stall in
//! `setup_frame_display`/`sync`. Shared state lives behind an `Arc` so a
//! test keeps a handle after the backend moves onto the render thread.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::frame::{UpdateRequired, YuvFrame};
use crate::info::AccelLevel;

use super::{DisplayRequest, DisplaySetup, FrameDisplay, SurfaceError, SurfaceEvent};

/// Everything a [`NullBackend`] has observed.
#[derive(Debug, Default)]
pub struct NullBackendState {
    /// `init` calls.
    pub init_calls: u32,
    /// `uninit` calls.
    pub uninit_calls: u32,
    /// Every setup request, in order.
    pub setup_calls: Vec<DisplayRequest>,
    /// `close_frame_display` calls that found a surface open.
    pub close_calls: u32,
    /// Whether a surface is currently open.
    pub surface_open: bool,
    /// Highest number of simultaneously open surfaces observed.
    pub max_open_surfaces: u32,
    /// Dimensions of every single-stream present.
    pub displayed: Vec<(u32, u32)>,
    /// Dimensions of every dual present as `(local, remote)`.
    pub pip_displayed: Vec<((u32, u32), (u32, u32))>,
    /// Flags of every sync call.
    pub sync_calls: Vec<UpdateRequired>,
    /// Start/end instants of every sync call.
    pub sync_spans: Vec<(Instant, Instant)>,
    /// Instant of every display call (made under the frame lock).
    pub display_instants: Vec<Instant>,
    /// Events to be returned from the next `process_events`.
    pub pending_events: VecDeque<SurfaceEvent>,
}

/// A scriptable, recording [`FrameDisplay`].
pub struct NullBackend {
    state: Arc<Mutex<NullBackendState>>,
    fail_hardware: bool,
    fail_all: bool,
    setup_delay: Duration,
    sync_delay: Duration,
}

impl NullBackend {
    /// A backend that succeeds at the hardware level.
    pub fn new() -> (Self, Arc<Mutex<NullBackendState>>) {
        let state = Arc::new(Mutex::new(NullBackendState::default()));
        (
            Self {
                state: Arc::clone(&state),
                fail_hardware: false,
                fail_all: false,
                setup_delay: Duration::ZERO,
                sync_delay: Duration::ZERO,
            },
            state,
        )
    }

    /// Simulate absent overlay hardware (setup degrades to software).
    pub fn with_failing_hardware(mut self) -> Self {
        self.fail_hardware = true;
        self
    }

    /// Simulate terminal failure of both paths.
    pub fn with_failing_everything(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Stall inside `setup_frame_display` (slow-backend scenarios).
    pub fn with_setup_delay(mut self, delay: Duration) -> Self {
        self.setup_delay = delay;
        self
    }

    /// Stall inside `sync` (vblank-wait scenarios).
    pub fn with_sync_delay(mut self, delay: Duration) -> Self {
        self.sync_delay = delay;
        self
    }

    fn state(&self) -> MutexGuard<'_, NullBackendState> {
        self.state.lock().expect("null backend state poisoned")
    }
}

impl FrameDisplay for NullBackend {
    fn init(&mut self) {
        self.state().init_calls += 1;
    }

    fn uninit(&mut self) {
        self.state().uninit_calls += 1;
    }

    fn setup_frame_display(&mut self, req: &DisplayRequest) -> Result<DisplaySetup, SurfaceError> {
        if !self.setup_delay.is_zero() {
            std::thread::sleep(self.setup_delay);
        }
        let mut state = self.state();
        state.setup_calls.push(*req);
        // Reopening tears down the previous surface first.
        if state.surface_open {
            state.close_calls += 1;
            state.surface_open = false;
        }
        if self.fail_all {
            return Err(SurfaceError::SoftwareFailed("scripted failure".into()));
        }
        state.surface_open = true;
        state.max_open_surfaces = state.max_open_surfaces.max(1);
        let accel = if self.fail_hardware || req.disable_hw_accel {
            AccelLevel::None
        } else {
            AccelLevel::All
        };
        Ok(DisplaySetup {
            accel,
            width: req.primary_width,
            height: req.primary_height,
        })
    }

    fn close_frame_display(&mut self) -> bool {
        let mut state = self.state();
        if state.surface_open {
            state.surface_open = false;
            state.close_calls += 1;
            true
        } else {
            false
        }
    }

    fn display_frame(&mut self, frame: &YuvFrame) -> Result<(), SurfaceError> {
        let mut state = self.state();
        state.displayed.push((frame.width(), frame.height()));
        state.display_instants.push(Instant::now());
        Ok(())
    }

    fn display_pip_frames(
        &mut self,
        local: &YuvFrame,
        remote: &YuvFrame,
    ) -> Result<(), SurfaceError> {
        let mut state = self.state();
        state.pip_displayed.push((
            (local.width(), local.height()),
            (remote.width(), remote.height()),
        ));
        state.display_instants.push(Instant::now());
        Ok(())
    }

    fn sync(&mut self, required: UpdateRequired) {
        let start = Instant::now();
        if !self.sync_delay.is_zero() {
            std::thread::sleep(self.sync_delay);
        }
        let mut state = self.state();
        state.sync_calls.push(required);
        state.sync_spans.push((start, Instant::now()));
    }

    fn process_events(&mut self) -> Vec<SurfaceEvent> {
        self.state().pending_events.drain(..).collect()
    }
}
