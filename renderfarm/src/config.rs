use std::{path::PathBuf, sync::Arc, time::Duration};

use crate::{
    error::{FarmError, Result},
    render::{Integrator, PreviewIntegrator, HEARTBEAT_INTERVAL},
    DEFAULT_PORT,
};

/// Settings of one worker
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Listening port, `0` picks a free one
    pub port: u16,
    /// Render threads, engine thread included
    pub threads: usize,
    /// Persist film as resume file before sending it
    pub write_film: bool,
    /// Directory for received files and resume files
    pub work_dir: PathBuf,
    pub heartbeat_interval: Duration,
    pub integrator: Arc<dyn Integrator>,
}

impl WorkerConfig {
    pub fn builder() -> WorkerConfigBuilder {
        WorkerConfigBuilder::default()
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        WorkerConfigBuilder::default().build_unchecked()
    }
}

#[derive(Debug, Default)]
pub struct WorkerConfigBuilder {
    port: Option<u16>,
    threads: Option<usize>,
    write_film: Option<bool>,
    work_dir: Option<PathBuf>,
    heartbeat_interval: Option<Duration>,
    integrator: Option<Arc<dyn Integrator>>,
}

impl WorkerConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    pub fn write_film(mut self, write_film: bool) -> Self {
        self.write_film = Some(write_film);
        self
    }

    pub fn work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = Some(interval);
        self
    }

    pub fn integrator(mut self, integrator: Arc<dyn Integrator>) -> Self {
        self.integrator = Some(integrator);
        self
    }

    /// Build and validate
    pub fn build(self) -> Result<WorkerConfig> {
        if self.threads == Some(0) {
            return Err(FarmError::Config("at least one render thread is needed".into()));
        }
        if self.heartbeat_interval == Some(Duration::ZERO) {
            return Err(FarmError::Config("heartbeat interval must not be zero".into()));
        }
        if let Some(dir) = &self.work_dir {
            if !dir.is_dir() {
                return Err(FarmError::Config(format!(
                    "work directory {} does not exist",
                    dir.display()
                )));
            }
        }
        Ok(self.build_unchecked())
    }

    /// Build, missing values get defaults
    pub fn build_unchecked(self) -> WorkerConfig {
        WorkerConfig {
            port: self.port.unwrap_or(DEFAULT_PORT),
            threads: self.threads.unwrap_or_else(default_threads).max(1),
            write_film: self.write_film.unwrap_or(false),
            work_dir: self.work_dir.unwrap_or_else(|| PathBuf::from(".")),
            heartbeat_interval: self.heartbeat_interval.unwrap_or(HEARTBEAT_INTERVAL),
            integrator: self
                .integrator
                .unwrap_or_else(|| Arc::new(PreviewIntegrator)),
        }
    }
}

/// Available parallelism, 1 when unknown
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
