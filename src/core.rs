//! Fan-out coordination across registered output managers.
//!
//! [`VideoOutputCore`] is the single entry point the capture/decode side
//! talks to: it duplicates every frame and configuration update to all
//! registered managers, reference-counts start/stop so independent callers
//! can overlap, aggregates throughput statistics, and owns the event channel
//! every manager's signals arrive on.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::event::{EventSender, ManagerId, VideoOutputEvent};
use crate::info::DisplayInfo;
use crate::manager::VideoOutputManager;
use crate::stats::{StatsAccumulator, VideoOutputStats};

type Managers = SmallVec<[Arc<dyn VideoOutputManager>; 2]>;

/// The process-wide video-output coordinator.
pub struct VideoOutputCore {
    managers: Mutex<Managers>,
    start_count: Mutex<u32>,
    stats: Mutex<StatsAccumulator>,
    next_id: AtomicUsize,
    events_tx: kanal::Sender<VideoOutputEvent>,
    events_rx: kanal::Receiver<VideoOutputEvent>,
}

impl Default for VideoOutputCore {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoOutputCore {
    /// An empty core with no managers and a stopped output.
    pub fn new() -> Self {
        let (events_tx, events_rx) = kanal::unbounded();
        Self {
            managers: Mutex::new(SmallVec::new()),
            start_count: Mutex::new(0),
            stats: Mutex::new(StatsAccumulator::new()),
            next_id: AtomicUsize::new(0),
            events_tx,
            events_rx,
        }
    }

    fn lock_managers(&self) -> MutexGuard<'_, Managers> {
        self.managers.lock().expect("manager list poisoned")
    }

    fn lock_count(&self) -> MutexGuard<'_, u32> {
        self.start_count.lock().expect("start count poisoned")
    }

    /// Allocate an identity and the tagged sending half a new manager emits
    /// events through.
    pub fn event_sender(&self) -> EventSender {
        let id = ManagerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        EventSender::new(id, self.events_tx.clone())
    }

    /// The receiving half of the event channel; clone freely.
    pub fn events(&self) -> kanal::Receiver<VideoOutputEvent> {
        self.events_rx.clone()
    }

    /// Register a manager. If output is already running the manager is
    /// opened immediately so it joins the live fan-out.
    pub fn add_manager(&self, manager: Arc<dyn VideoOutputManager>) {
        let count = self.lock_count();
        if *count > 0 {
            manager.open();
        }
        debug!(manager = %manager.id(), name = manager.name(), "manager registered");
        self.lock_managers().push(manager);
    }

    /// Reference-counted start: the first caller opens every manager,
    /// subsequent callers only bump the count.
    pub fn start(&self) {
        let mut count = self.lock_count();
        *count += 1;
        if *count == 1 {
            debug!("video output starting");
            for manager in self.lock_managers().iter() {
                manager.open();
            }
        }
    }

    /// Reference-counted stop: the last caller closes every manager and
    /// resets statistics. Unbalanced calls are ignored.
    pub fn stop(&self) {
        let mut count = self.lock_count();
        if *count == 0 {
            warn!("stop without matching start");
            return;
        }
        *count -= 1;
        if *count == 0 {
            debug!("video output stopping");
            for manager in self.lock_managers().iter() {
                manager.close();
            }
            self.stats.lock().expect("stats poisoned").reset();
        }
    }

    /// Whether any start is outstanding.
    pub fn is_running(&self) -> bool {
        *self.lock_count() > 0
    }

    /// Duplicate one I420 frame to every registered manager.
    ///
    /// Accounting happens under a short-held lock; the managers are called
    /// with no core lock held so a slow manager never blocks registration
    /// or statistics readers.
    pub fn set_frame_data(&self, data: &[u8], width: u32, height: u32, local: bool, devices: u32) {
        self.stats
            .lock()
            .expect("stats poisoned")
            .record_frame(local, width, height);
        let managers: Managers = self.lock_managers().clone();
        for manager in managers.iter() {
            manager.set_frame_data(data, width, height, local, devices);
        }
    }

    /// Fan a partial configuration update out to every manager.
    pub fn set_display_info(&self, info: &DisplayInfo) {
        let managers: Managers = self.lock_managers().clone();
        for manager in managers.iter() {
            manager.set_display_info(info);
        }
    }

    /// Aggregated statistics, folding in every manager's drop count.
    pub fn stats(&self) -> VideoOutputStats {
        let dropped: u64 = self
            .lock_managers()
            .iter()
            .map(|m| m.frames_dropped())
            .sum();
        self.stats.lock().expect("stats poisoned").snapshot(dropped)
    }
}
