//! End-to-end scenarios through the fan-out core and the render engine.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use viewport::backend::null::{NullBackend, NullBackendState};
use viewport::backend::SurfaceErrorKind;
use viewport::convert::i420_buffer_size;
use viewport::core::VideoOutputCore;
use viewport::event::{VideoOutputEvent, VideoOutputEventKind};
use viewport::info::{AccelLevel, DisplayInfo, EmbedTarget, VideoMode, Zoom};
use viewport::manager::RenderManager;

const WAIT: Duration = Duration::from_secs(3);

fn ready_info(mode: VideoMode) -> DisplayInfo {
    let mut info = DisplayInfo::default();
    info.widget_info_set = true;
    info.embed = EmbedTarget {
        window: 0x100,
        gc: 0x101,
        x: 0,
        y: 0,
    };
    info.config_info_set = true;
    info.mode = mode;
    info.zoom = Zoom(100);
    info
}

fn frame_bytes(width: u32, height: u32) -> Vec<u8> {
    vec![128u8; i420_buffer_size(width, height)]
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Core with one recording manager attached, already started.
fn running_core(backend: NullBackend) -> (VideoOutputCore, kanal::Receiver<VideoOutputEvent>) {
    init_tracing();
    let core = VideoOutputCore::new();
    let events = core.events();
    let manager = RenderManager::new("scenario", backend, core.event_sender()).unwrap();
    core.add_manager(Arc::new(manager));
    core.start();
    (core, events)
}

fn next_event(rx: &kanal::Receiver<VideoOutputEvent>) -> VideoOutputEvent {
    let deadline = Instant::now() + WAIT;
    loop {
        if let Some(ev) = rx.try_recv().unwrap() {
            return ev;
        }
        assert!(Instant::now() < deadline, "no event before timeout");
        std::thread::sleep(Duration::from_millis(5));
    }
}

fn wait_until(state: &Arc<Mutex<NullBackendState>>, pred: impl Fn(&NullBackendState) -> bool) {
    let deadline = Instant::now() + WAIT;
    loop {
        if pred(&state.lock().unwrap()) {
            return;
        }
        assert!(Instant::now() < deadline, "backend condition not reached");
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// A webcam preview: one device, local-only layout, QQVGA frames.
#[test]
fn test_local_preview_scenario() {
    let (backend, state) = NullBackend::new();
    let (core, events) = running_core(backend);
    core.set_display_info(&ready_info(VideoMode::Local));
    core.set_frame_data(&frame_bytes(160, 120), 160, 120, true, 1);

    loop {
        if let VideoOutputEventKind::DeviceOpened { accel, mode, .. } = next_event(&events).kind {
            assert_eq!(accel, AccelLevel::All);
            assert_eq!(mode, VideoMode::Local);
            break;
        }
    }
    wait_until(&state, |s| s.displayed.contains(&(160, 120)));
    let stats = core.stats();
    assert_eq!(stats.tx_frames, 1);
    assert_eq!((stats.tx_width, stats.tx_height), (160, 120));
}

/// An established call: remote QVGA primary with a local QQVGA inset.
#[test]
fn test_pip_call_scenario() {
    let (backend, state) = NullBackend::new();
    let (core, events) = running_core(backend);
    core.set_display_info(&ready_info(VideoMode::Pip));

    core.set_frame_data(&frame_bytes(320, 240), 320, 240, false, 2);
    loop {
        if matches!(
            next_event(&events).kind,
            VideoOutputEventKind::DeviceOpened { .. }
        ) {
            break;
        }
    }

    core.set_frame_data(&frame_bytes(160, 120), 160, 120, true, 2);
    wait_until(&state, |s| !s.pip_displayed.is_empty());
    assert_eq!(
        state.lock().unwrap().pip_displayed[0],
        ((160, 120), (320, 240))
    );

    // The local stream appearing renegotiates the surface with an inset and
    // announces the dual composition.
    loop {
        if let VideoOutputEventKind::DeviceOpened { both_streams, .. } = next_event(&events).kind {
            if both_streams {
                break;
            }
        }
    }
    let stats = core.stats();
    assert_eq!(stats.rx_frames, 1);
    assert_eq!(stats.tx_frames, 1);
}

/// Stopping while the backend is stuck in surface negotiation must complete
/// without deadlock and leave no surface behind.
#[test]
fn test_stop_during_slow_setup() {
    let (backend, state) = NullBackend::new();
    let backend = backend.with_setup_delay(Duration::from_millis(300));
    let (core, _events) = running_core(backend);
    core.set_display_info(&ready_info(VideoMode::Local));
    core.set_frame_data(&frame_bytes(160, 120), 160, 120, true, 1);

    // Give the render thread time to enter the slow setup.
    std::thread::sleep(Duration::from_millis(50));
    core.stop();
    assert!(!core.is_running());
    assert!(!state.lock().unwrap().surface_open);
    assert_eq!(state.lock().unwrap().uninit_calls, 1);
}

/// A blocking vertical sync must not stall frame delivery: the sync runs
/// with no frame lock held, so producers keep writing meanwhile.
#[test]
fn test_sync_does_not_block_frame_delivery() {
    let (backend, state) = NullBackend::new();
    let backend = backend.with_sync_delay(Duration::from_millis(500));
    let (core, _events) = running_core(backend);
    core.set_display_info(&ready_info(VideoMode::Local));
    core.set_frame_data(&frame_bytes(160, 120), 160, 120, true, 1);

    wait_until(&state, |s| !s.displayed.is_empty());
    // The render thread is now inside the 500 ms sync.
    std::thread::sleep(Duration::from_millis(50));
    let start = Instant::now();
    core.set_frame_data(&frame_bytes(160, 120), 160, 120, true, 1);
    assert!(
        start.elapsed() < Duration::from_millis(250),
        "frame delivery blocked behind sync"
    );

    // And every present happened outside every sync span.
    wait_until(&state, |s| s.sync_spans.len() >= 2);
    let s = state.lock().unwrap();
    for &instant in &s.display_instants {
        for &(begin, end) in &s.sync_spans {
            assert!(instant <= begin || instant >= end);
        }
    }
}

/// Two independent users of the output overlap; the device closes only when
/// the last one stops.
#[test]
fn test_refcounted_start_stop() {
    let (backend, state) = NullBackend::new();
    let (core, events) = running_core(backend);
    core.start(); // second user
    core.set_display_info(&ready_info(VideoMode::Local));
    core.set_frame_data(&frame_bytes(160, 120), 160, 120, true, 1);
    wait_until(&state, |s| !s.displayed.is_empty());

    core.stop();
    std::thread::sleep(Duration::from_millis(50));
    assert!(state.lock().unwrap().surface_open);

    core.stop();
    assert!(!state.lock().unwrap().surface_open);
    let deadline = Instant::now() + WAIT;
    loop {
        let ev = next_event(&events);
        if ev.kind == VideoOutputEventKind::DeviceClosed {
            break;
        }
        assert!(Instant::now() < deadline);
    }
}

/// Both surface paths failing disables video until configuration changes;
/// the error is reported exactly once.
#[test]
fn test_terminal_failure_reports_once() {
    let (backend, state) = NullBackend::new();
    let backend = backend.with_failing_everything();
    let (core, events) = running_core(backend);
    core.set_display_info(&ready_info(VideoMode::Remote));
    core.set_frame_data(&frame_bytes(320, 240), 320, 240, false, 1);

    loop {
        if let VideoOutputEventKind::DeviceError(kind) = next_event(&events).kind {
            assert_eq!(kind, SurfaceErrorKind::SoftwareFailed);
            break;
        }
    }

    // More frames at the same geometry: no retry, no repeated error.
    core.set_frame_data(&frame_bytes(320, 240), 320, 240, false, 1);
    core.set_frame_data(&frame_bytes(320, 240), 320, 240, false, 1);
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(state.lock().unwrap().setup_calls.len(), 1);
    assert!(state.lock().unwrap().displayed.is_empty());
    assert!(events.try_recv().unwrap().is_none());

    // A geometry change re-attempts (and fails again, with a fresh report).
    core.set_frame_data(&frame_bytes(640, 480), 640, 480, false, 1);
    loop {
        if matches!(
            next_event(&events).kind,
            VideoOutputEventKind::DeviceError(_)
        ) {
            break;
        }
    }
    assert_eq!(state.lock().unwrap().setup_calls.len(), 2);
}

/// One device forces a single-stream layout even when the user configured a
/// dual one; a second device restores the configured layout.
#[test]
fn test_device_count_forces_layout() {
    let (backend, state) = NullBackend::new();
    let (core, events) = running_core(backend);
    core.set_display_info(&ready_info(VideoMode::Fullscreen));

    core.set_frame_data(&frame_bytes(320, 240), 320, 240, false, 1);
    loop {
        if let VideoOutputEventKind::DeviceOpened { mode, .. } = next_event(&events).kind {
            assert_eq!(mode, VideoMode::Remote);
            break;
        }
    }

    core.set_frame_data(&frame_bytes(320, 240), 320, 240, false, 2);
    core.set_frame_data(&frame_bytes(160, 120), 160, 120, true, 2);
    loop {
        if let VideoOutputEventKind::DeviceOpened { mode, .. } = next_event(&events).kind {
            if mode == VideoMode::Fullscreen {
                break;
            }
        }
    }
    wait_until(&state, |s| !s.pip_displayed.is_empty());
}

/// Frames delivered faster than they are presented are counted as dropped.
#[test]
fn test_drop_accounting_surfaces_in_stats() {
    let (backend, _state) = NullBackend::new();
    let backend = backend.with_sync_delay(Duration::from_millis(200));
    let (core, _events) = running_core(backend);
    core.set_display_info(&ready_info(VideoMode::Local));
    for _ in 0..20 {
        core.set_frame_data(&frame_bytes(160, 120), 160, 120, true, 1);
        std::thread::sleep(Duration::from_millis(10));
    }
    let stats = core.stats();
    assert_eq!(stats.tx_frames, 20);
    assert!(stats.frames_dropped > 0);
}
