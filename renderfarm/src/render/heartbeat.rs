use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use log::{info, warn};

use super::RenderStatistics;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// `HH:MM:SS`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Heartbeat line, `None` while nothing is being rendered
pub fn progress_line(stats: &RenderStatistics) -> Option<String> {
    let snap = stats.snapshot();
    if !snap.scene_ready || snap.samples_per_sec <= 0.0 {
        return None;
    }
    Some(format!(
        "{}  {:.0} samples/sec  {:.1} samples/pix",
        format_elapsed(snap.elapsed),
        snap.samples_per_sec,
        snap.samples_per_pixel
    ))
}

/// Periodic progress report
///
/// Lives until stopped or dropped.
pub struct Heartbeat {
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    pub fn start(stats: Arc<RenderStatistics>, interval: Duration) -> Heartbeat {
        let (shutdown, rec) = channel::bounded::<()>(1);
        let spawned = thread::Builder::new()
            .name("heartbeat".into())
            .spawn(move || loop {
                match rec.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Some(line) = progress_line(&stats) {
                            info!("{line}");
                        }
                    }
                    // Message or sender dropped
                    _ => break,
                }
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Cannot start heartbeat thread ({e})");
                None
            }
        };

        Heartbeat {
            shutdown: Some(shutdown),
            handle,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop and join, idempotent
    pub fn stop(&mut self) {
        // Dropping the sender wakes the thread
        self.shutdown.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Heartbeat thread panicked");
            }
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::time::Instant;

    #[test]
    fn elapsed_format() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(3725)), "01:02:05");
        assert_eq!(format_elapsed(Duration::from_secs(100 * 3600)), "100:00:00");
    }

    #[test]
    fn progress_only_while_rendering() {
        let stats = RenderStatistics::new();
        assert!(progress_line(&stats).is_none());

        stats.begin(10);
        assert!(progress_line(&stats).is_none());

        stats.add_samples(50);
        std::thread::sleep(Duration::from_millis(5));
        let line = progress_line(&stats).unwrap();
        assert!(line.starts_with("00:00:00  "));
        assert!(line.ends_with("samples/sec  5.0 samples/pix"));

        stats.end();
        assert!(progress_line(&stats).is_none());
    }

    #[test]
    fn stops_promptly() {
        let stats = Arc::new(RenderStatistics::new());
        let mut heartbeat = Heartbeat::start(stats, Duration::from_secs(60));
        assert!(heartbeat.is_running());

        let start = Instant::now();
        heartbeat.stop();
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(!heartbeat.is_running());
        heartbeat.stop();
    }
}
