//! Frame-rate and throughput accounting for the fan-out core.

use std::time::{Duration, Instant};

/// Minimum measurement window before an fps value is computed.
const FPS_WINDOW: Duration = Duration::from_millis(2000);

/// Snapshot of aggregated video-output statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VideoOutputStats {
    /// Total remote (received) frames accepted.
    pub rx_frames: u64,
    /// Total local (transmitted) frames accepted.
    pub tx_frames: u64,
    /// Instantaneous remote fps over the last measurement window.
    pub rx_fps: f64,
    /// Instantaneous local fps over the last measurement window.
    pub tx_fps: f64,
    /// Most recent remote frame width.
    pub rx_width: u32,
    /// Most recent remote frame height.
    pub rx_height: u32,
    /// Most recent local frame width.
    pub tx_width: u32,
    /// Most recent local frame height.
    pub tx_height: u32,
    /// Frames overwritten before the render thread presented them.
    pub frames_dropped: u64,
}

/// Internal accumulator behind the core's statistics lock.
#[derive(Debug)]
pub(crate) struct StatsAccumulator {
    stats: VideoOutputStats,
    window_start: Instant,
    window_rx: u64,
    window_tx: u64,
}

impl StatsAccumulator {
    pub(crate) fn new() -> Self {
        Self {
            stats: VideoOutputStats::default(),
            window_start: Instant::now(),
            window_rx: 0,
            window_tx: 0,
        }
    }

    /// Record one accepted frame; recomputes fps once per window.
    pub(crate) fn record_frame(&mut self, local: bool, width: u32, height: u32) {
        if local {
            self.stats.tx_frames += 1;
            self.window_tx += 1;
            self.stats.tx_width = width;
            self.stats.tx_height = height;
        } else {
            self.stats.rx_frames += 1;
            self.window_rx += 1;
            self.stats.rx_width = width;
            self.stats.rx_height = height;
        }

        let elapsed = self.window_start.elapsed();
        if elapsed >= FPS_WINDOW {
            let secs = elapsed.as_secs_f64();
            self.stats.rx_fps = self.window_rx as f64 / secs;
            self.stats.tx_fps = self.window_tx as f64 / secs;
            self.window_rx = 0;
            self.window_tx = 0;
            self.window_start = Instant::now();
        }
    }

    /// Snapshot with an externally-tallied drop count folded in.
    pub(crate) fn snapshot(&self, frames_dropped: u64) -> VideoOutputStats {
        VideoOutputStats {
            frames_dropped,
            ..self.stats
        }
    }

    /// Reset all counters (core stop).
    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let mut acc = StatsAccumulator::new();
        acc.record_frame(false, 320, 240);
        acc.record_frame(false, 320, 240);
        acc.record_frame(true, 160, 120);
        let s = acc.snapshot(0);
        assert_eq!(s.rx_frames, 2);
        assert_eq!(s.tx_frames, 1);
        assert_eq!((s.rx_width, s.rx_height), (320, 240));
        assert_eq!((s.tx_width, s.tx_height), (160, 120));
    }

    #[test]
    fn test_fps_not_computed_before_window() {
        let mut acc = StatsAccumulator::new();
        for _ in 0..50 {
            acc.record_frame(false, 320, 240);
        }
        // Window is 2 s; a fast test never crosses it.
        assert_eq!(acc.snapshot(0).rx_fps, 0.0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut acc = StatsAccumulator::new();
        acc.record_frame(false, 320, 240);
        acc.reset();
        assert_eq!(acc.snapshot(0), VideoOutputStats::default());
    }

    #[test]
    fn test_snapshot_folds_drop_count() {
        let acc = StatsAccumulator::new();
        assert_eq!(acc.snapshot(7).frames_dropped, 7);
    }
}
