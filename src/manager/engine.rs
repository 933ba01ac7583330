//! Generic render-thread engine.
//!
//! [`RenderManager`] runs any [`FrameDisplay`] backend on a dedicated named
//! thread and implements [`VideoOutputManager`] on top of it. Producer
//! threads only ever copy bytes under a short-held frame lock and wake the
//! render thread; everything that can block (surface negotiation, window
//! events, vertical sync) happens on the render thread, and the final sync
//! step runs strictly outside the frame lock so frame delivery is never
//! stalled behind a vblank wait.
//!
//! Reconfiguration is divergence-driven: the thread keeps the geometry of
//! the last surface it opened and compares it against the geometry implied
//! by incoming frames and configuration. When the two disagree in a way the
//! open surface cannot absorb, the surface is torn down and renegotiated.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backend::{DisplayRequest, FrameDisplay, SurfaceEvent};
use crate::error::Result;
use crate::event::{EventSender, ManagerId, VideoOutputEventKind};
use crate::frame::{UpdateRequired, YuvFrame};
use crate::info::{AccelLevel, DisplayInfo, FrameInfo, VideoMode};
use crate::manager::VideoOutputManager;

/// Upper bound on one pass of the render loop while a surface is active;
/// window events are polled at least this often even with no new frames.
const ACTIVE_WAIT: Duration = Duration::from_millis(250);

// ============================================================================
// Shared state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Initializing,
    Active,
    Uninitializing,
}

#[derive(Debug, Default)]
struct Control {
    phase: Phase,
    init_requested: bool,
    uninit_requested: bool,
    end_requested: bool,
}

/// Everything under the frame lock: the stream buffers, their pending-update
/// flags, and the geometry records driving reconfiguration.
#[derive(Default)]
struct FrameState {
    local: YuvFrame,
    remote: YuvFrame,
    current: FrameInfo,
    last: FrameInfo,
    local_seen: bool,
    remote_seen: bool,
    update: UpdateRequired,
    error_emitted: bool,
    last_devices: u32,
}

struct Shared {
    ctl: Mutex<Control>,
    /// Producer-to-render-thread wakeup.
    wake: Condvar,
    /// Render-thread-to-caller handshake for open/close.
    ack: Condvar,
    frame: Mutex<FrameState>,
    display_info: Mutex<DisplayInfo>,
    events: EventSender,
    frames_dropped: AtomicU64,
}

impl Shared {
    fn lock_ctl(&self) -> MutexGuard<'_, Control> {
        self.ctl.lock().expect("render control poisoned")
    }

    fn lock_frame(&self) -> MutexGuard<'_, FrameState> {
        self.frame.lock().expect("frame state poisoned")
    }

    fn lock_info(&self) -> MutexGuard<'_, DisplayInfo> {
        self.display_info.lock().expect("display info poisoned")
    }
}

// ============================================================================
// Manager
// ============================================================================

/// A [`VideoOutputManager`] driving one backend on its own render thread.
pub struct RenderManager {
    name: String,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl RenderManager {
    /// Spawn the render thread for `backend`. The thread idles until
    /// [`open`](VideoOutputManager::open) is called.
    pub fn new(
        name: impl Into<String>,
        backend: impl FrameDisplay + 'static,
        events: EventSender,
    ) -> Result<Self> {
        let name = name.into();
        let shared = Arc::new(Shared {
            ctl: Mutex::new(Control::default()),
            wake: Condvar::new(),
            ack: Condvar::new(),
            frame: Mutex::new(FrameState::default()),
            display_info: Mutex::new(DisplayInfo::default()),
            events,
            frames_dropped: AtomicU64::new(0),
        });
        let thread_shared = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name(format!("render-{name}"))
            .spawn(move || render_loop(backend, thread_shared))?;
        Ok(Self {
            name,
            shared,
            thread: Some(thread),
        })
    }

    /// Snapshot of the geometry currently being displayed.
    pub fn current_frame_info(&self) -> FrameInfo {
        self.shared.lock_frame().current
    }
}

impl VideoOutputManager for RenderManager {
    fn id(&self) -> ManagerId {
        self.shared.events.id()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) {
        let mut ctl = self.shared.lock_ctl();
        if ctl.phase == Phase::Active {
            return;
        }
        ctl.init_requested = true;
        self.shared.wake.notify_all();
        while ctl.phase != Phase::Active && !ctl.end_requested {
            ctl = self.shared.ack.wait(ctl).expect("render control poisoned");
        }
    }

    fn close(&self) {
        let mut ctl = self.shared.lock_ctl();
        if ctl.phase == Phase::Idle && !ctl.init_requested {
            return;
        }
        ctl.uninit_requested = true;
        self.shared.wake.notify_all();
        while ctl.phase != Phase::Idle && !ctl.end_requested {
            ctl = self.shared.ack.wait(ctl).expect("render control poisoned");
        }
    }

    fn set_frame_data(&self, data: &[u8], width: u32, height: u32, local: bool, devices: u32) {
        let info = *self.shared.lock_info();
        let mut fs = self.shared.lock_frame();

        let write = if local {
            fs.local.write(data, width, height)
        } else {
            fs.remote.write(data, width, height)
        };
        if let Err(e) = write {
            warn!(manager = %self.id(), local, "rejected frame: {e}");
            return;
        }

        // The previous frame of this stream was never presented.
        let pending = if local { fs.update.local } else { fs.update.remote };
        if pending {
            self.shared.frames_dropped.fetch_add(1, Ordering::Relaxed);
        }

        if local {
            fs.local_seen = true;
            fs.current.local_width = width;
            fs.current.local_height = height;
            fs.update.local = true;
        } else {
            fs.remote_seen = true;
            fs.current.remote_width = width;
            fs.current.remote_height = height;
            fs.update.remote = true;
        }
        fs.last_devices = devices;

        if devices < 2 {
            // One capture device cannot feed a dual layout; the delivered
            // stream is the only one there is.
            fs.current.both_streams_active = false;
            fs.current.mode = if local {
                VideoMode::Local
            } else {
                VideoMode::Remote
            };
            if local {
                fs.remote_seen = false;
            } else {
                fs.local_seen = false;
            }
        } else {
            if info.mode != VideoMode::Unset {
                fs.current.mode = info.mode;
            }
            fs.current.both_streams_active = fs.local_seen && fs.remote_seen;
        }
        fs.current.zoom = info.zoom;
        fs.current.embedded_x = info.embed.x;
        fs.current.embedded_y = info.embed.y;

        let wanted = if local {
            fs.current.mode.wants_local()
        } else {
            fs.current.mode.wants_remote()
        };
        drop(fs);

        if wanted && info.is_ready() {
            self.shared.wake.notify_all();
        }
    }

    fn set_display_info(&self, info: &DisplayInfo) {
        self.shared.lock_info().merge(info);
        self.shared.wake.notify_all();
    }

    fn frames_dropped(&self) -> u64 {
        self.shared.frames_dropped.load(Ordering::Relaxed)
    }
}

impl Drop for RenderManager {
    fn drop(&mut self) {
        {
            let mut ctl = self.shared.lock_ctl();
            ctl.end_requested = true;
        }
        self.shared.wake.notify_all();
        self.shared.ack.notify_all();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!(manager = %self.name, "render thread panicked");
            }
        }
    }
}

// ============================================================================
// Render thread
// ============================================================================

fn render_loop<B: FrameDisplay>(mut backend: B, shared: Arc<Shared>) {
    let mut ctl = shared.lock_ctl();
    loop {
        // Wait for frames, a control request, or the periodic poll tick.
        while !(ctl.end_requested || ctl.init_requested || ctl.uninit_requested) {
            if ctl.phase == Phase::Active {
                let (guard, timeout) = shared
                    .wake
                    .wait_timeout(ctl, ACTIVE_WAIT)
                    .expect("render control poisoned");
                ctl = guard;
                if timeout.timed_out() {
                    break;
                }
                // A frame wakeup lands here; fall through to the redraw.
                if !(ctl.end_requested || ctl.init_requested || ctl.uninit_requested) {
                    break;
                }
            } else {
                ctl = shared.wake.wait(ctl).expect("render control poisoned");
            }
        }

        if ctl.end_requested {
            break;
        }

        if ctl.init_requested {
            ctl.init_requested = false;
            ctl.phase = Phase::Initializing;
            drop(ctl);
            backend.init();
            ctl = shared.lock_ctl();
            ctl.phase = Phase::Active;
            shared.ack.notify_all();
            debug!(manager = %shared.events.id(), "render thread active");
        }

        if ctl.uninit_requested {
            ctl.uninit_requested = false;
            ctl.phase = Phase::Uninitializing;
            drop(ctl);
            {
                let mut fs = shared.lock_frame();
                if backend.close_frame_display() {
                    shared.events.emit(VideoOutputEventKind::DeviceClosed);
                }
                *fs = FrameState::default();
            }
            backend.uninit();
            ctl = shared.lock_ctl();
            ctl.phase = Phase::Idle;
            shared.ack.notify_all();
            debug!(manager = %shared.events.id(), "render thread idle");
            continue;
        }

        if ctl.phase == Phase::Active {
            drop(ctl);

            for event in backend.process_events() {
                match event {
                    SurfaceEvent::Resized { width, height } => {
                        shared
                            .events
                            .emit(VideoOutputEventKind::SizeChanged { width, height });
                    }
                    SurfaceEvent::FullscreenRequested(toggle) => {
                        shared
                            .events
                            .emit(VideoOutputEventKind::FullscreenChanged(toggle));
                    }
                    // Applied at the window level by the backend; nothing to
                    // re-emit.
                    SurfaceEvent::OnTopRequested | SurfaceEvent::DecorationRequested => {}
                }
            }

            let update = {
                let mut fs = shared.lock_frame();
                redraw(&mut backend, &mut fs, &shared)
            };
            // Vertical sync may block; the frame lock must be free by now so
            // producers keep delivering while we wait.
            if update.any() {
                backend.sync(update);
            }

            ctl = shared.lock_ctl();
        }
    }
    drop(ctl);

    if backend.close_frame_display() {
        shared.events.emit(VideoOutputEventKind::DeviceClosed);
    }
}

/// One decision pass: reconfigure the surface if the displayed geometry has
/// diverged from the incoming one, then hand the fresh frames to the
/// backend. Returns the streams that need a sync.
fn redraw<B: FrameDisplay>(
    backend: &mut B,
    fs: &mut FrameState,
    shared: &Shared,
) -> UpdateRequired {
    let info = *shared.lock_info();
    if !info.is_ready() {
        return UpdateRequired::default();
    }

    // Configuration changes arriving between frames are folded in here; the
    // forced single-stream mode stays in effect while only one device runs.
    if fs.last_devices >= 2 && info.mode != VideoMode::Unset {
        fs.current.mode = info.mode;
    }
    fs.current.zoom = info.zoom;
    fs.current.embedded_x = info.embed.x;
    fs.current.embedded_y = info.embed.y;

    let mut reconfigured = false;
    if frame_display_change_needed(&fs.current, &fs.last) {
        let Some(request) = display_request(fs, &info) else {
            // The primary stream has not delivered yet; keep the old surface
            // until it does.
            return UpdateRequired::default();
        };
        if backend.close_frame_display() {
            shared.events.emit(VideoOutputEventKind::DeviceClosed);
        }
        match backend.setup_frame_display(&request) {
            Ok(setup) => {
                fs.current.accel = setup.accel;
                info!(
                    manager = %shared.events.id(),
                    mode = ?request.mode,
                    accel = ?setup.accel,
                    "surface configured"
                );
                shared.events.emit(VideoOutputEventKind::DeviceOpened {
                    accel: setup.accel,
                    mode: fs.current.mode,
                    zoom: fs.current.zoom,
                    both_streams: fs.current.both_streams_active,
                });
                shared.events.emit(VideoOutputEventKind::SizeChanged {
                    width: setup.width,
                    height: setup.height,
                });
                fs.last = fs.current;
                fs.error_emitted = false;
                reconfigured = true;
            }
            Err(e) => {
                warn!(manager = %shared.events.id(), "surface setup failed: {e}");
                fs.current.accel = AccelLevel::NoVideo;
                if !fs.error_emitted {
                    shared
                        .events
                        .emit(VideoOutputEventKind::DeviceError(e.kind()));
                    fs.error_emitted = true;
                }
                // Remember the failed geometry so the attempt is not retried
                // until something actually changes.
                fs.last = fs.current;
                fs.update.clear();
                return UpdateRequired::default();
            }
        }
    } else if fs.current.both_streams_active != fs.last.both_streams_active {
        // Stream activation alone does not force a renegotiation, but the
        // GUI wants to know the composition changed.
        shared.events.emit(VideoOutputEventKind::DeviceOpened {
            accel: fs.current.accel,
            mode: fs.current.mode,
            zoom: fs.current.zoom,
            both_streams: fs.current.both_streams_active,
        });
        fs.last.both_streams_active = fs.current.both_streams_active;
    }

    if fs.current.accel == AccelLevel::NoVideo {
        fs.update.clear();
        return UpdateRequired::default();
    }

    let mut update = fs.update;
    if reconfigured {
        // The new surface starts blank; repaint whatever we already hold.
        update.local |= fs.current.mode.wants_local() && !fs.local.is_empty();
        update.remote |= fs.current.mode.wants_remote() && !fs.remote.is_empty();
    }

    if update.any() {
        let result = if fs.current.mode.is_dual()
            && fs.current.both_streams_active
            && !fs.local.is_empty()
            && !fs.remote.is_empty()
        {
            backend.display_pip_frames(&fs.local, &fs.remote)
        } else if fs.current.mode.wants_remote() && !fs.remote.is_empty() {
            backend.display_frame(&fs.remote)
        } else if fs.current.mode.wants_local() && !fs.local.is_empty() {
            backend.display_frame(&fs.local)
        } else {
            update.clear();
            Ok(())
        };
        if let Err(e) = result {
            warn!(manager = %shared.events.id(), "display failed: {e}");
        }
    }
    fs.update.clear();
    update
}

/// Whether the open surface can absorb the divergence between the incoming
/// geometry and the displayed one, per layout.
fn frame_display_change_needed(current: &FrameInfo, last: &FrameInfo) -> bool {
    if current.mode != last.mode || current.zoom != last.zoom {
        return true;
    }
    let local_changed = current.local_width != last.local_width
        || current.local_height != last.local_height;
    let remote_changed = current.remote_width != last.remote_width
        || current.remote_height != last.remote_height;
    let embed_moved =
        current.embedded_x != last.embedded_x || current.embedded_y != last.embedded_y;
    match current.mode {
        VideoMode::Local => local_changed || embed_moved,
        VideoMode::Remote => remote_changed || embed_moved,
        VideoMode::Pip => local_changed || remote_changed || embed_moved,
        // Own-window layouts do not embed; widget moves are irrelevant.
        VideoMode::PipWindow | VideoMode::Fullscreen => local_changed || remote_changed,
        VideoMode::Unset => false,
    }
}

/// Build the negotiation request for the current geometry, or `None` when
/// the primary stream has no frame yet.
fn display_request(fs: &FrameState, info: &DisplayInfo) -> Option<DisplayRequest> {
    let mode = fs.current.mode;
    let (primary_width, primary_height) = if mode.wants_remote() {
        (fs.current.remote_width, fs.current.remote_height)
    } else {
        (fs.current.local_width, fs.current.local_height)
    };
    if primary_width == 0 || primary_height == 0 {
        return None;
    }
    let pip_image = (mode.is_dual()
        && fs.current.both_streams_active
        && fs.current.local_width != 0)
        .then_some((fs.current.local_width, fs.current.local_height));
    Some(DisplayRequest {
        mode,
        zoom: fs.current.zoom,
        embed: info.widget_info_set.then_some(info.embed),
        primary_width,
        primary_height,
        pip_image,
        on_top: info.on_top,
        disable_hw_accel: info.disable_hw_accel,
        allow_pip_sw_scaling: info.allow_pip_sw_scaling,
        algorithm: info.sw_scaling_algorithm,
    })
}
