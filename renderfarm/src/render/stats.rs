use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::{Duration, Instant},
};

use parking_lot::Mutex;

/// Progress counters shared by the sampling threads and the heartbeat
#[derive(Debug, Default)]
pub struct RenderStatistics {
    started: Mutex<Option<Instant>>,
    samples: AtomicU64,
    pixels: AtomicU64,
    ready: AtomicBool,
}

/// Values of [`RenderStatistics`] at one moment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub elapsed: Duration,
    pub total_samples: u64,
    pub samples_per_sec: f64,
    pub samples_per_pixel: f64,
    pub scene_ready: bool,
}

impl RenderStatistics {
    pub fn new() -> RenderStatistics {
        RenderStatistics::default()
    }

    /// Scene is ready, counting starts from zero
    pub fn begin(&self, pixels: u64) {
        *self.started.lock() = Some(Instant::now());
        self.samples.store(0, Ordering::Relaxed);
        self.pixels.store(pixels, Ordering::Relaxed);
        self.ready.store(true, Ordering::Release);
    }

    /// Rendering stopped
    pub fn end(&self) {
        self.ready.store(false, Ordering::Release);
    }

    pub fn add_samples(&self, count: u64) {
        self.samples.fetch_add(count, Ordering::Relaxed);
    }

    pub fn scene_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let started = *self.started.lock();
        let elapsed = started.map(|start| start.elapsed()).unwrap_or_default();
        let total_samples = self.samples.load(Ordering::Relaxed);
        let pixels = self.pixels.load(Ordering::Relaxed);

        let ready = self.scene_ready();

        // No throughput once rendering stopped
        let secs = elapsed.as_secs_f64();
        let samples_per_sec = if ready && secs > 0.0 {
            total_samples as f64 / secs
        } else {
            0.0
        };
        let samples_per_pixel = if pixels > 0 {
            total_samples as f64 / pixels as f64
        } else {
            0.0
        };

        StatsSnapshot {
            elapsed,
            total_samples,
            samples_per_sec,
            samples_per_pixel,
            scene_ready: ready,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counts_from_begin() {
        let stats = RenderStatistics::new();
        assert_eq!(stats.snapshot().samples_per_sec, 0.0);
        assert!(!stats.scene_ready());

        stats.add_samples(10);
        stats.begin(4);
        stats.add_samples(8);
        std::thread::sleep(Duration::from_millis(5));

        let snap = stats.snapshot();
        assert!(snap.scene_ready);
        assert_eq!(snap.total_samples, 8);
        assert_eq!(snap.samples_per_pixel, 2.0);
        assert!(snap.samples_per_sec > 0.0);

        stats.end();
        assert!(!stats.scene_ready());
    }

    #[test]
    fn no_throughput_after_end() {
        let stats = RenderStatistics::new();
        stats.begin(4);
        stats.add_samples(1000);
        std::thread::sleep(Duration::from_millis(5));
        assert!(stats.snapshot().samples_per_sec > 0.0);

        stats.end();
        let snap = stats.snapshot();
        assert!(!snap.scene_ready);
        assert_eq!(snap.samples_per_sec, 0.0);
        assert_eq!(snap.total_samples, 1000);
        assert_eq!(snap.samples_per_pixel, 250.0);
    }
}
