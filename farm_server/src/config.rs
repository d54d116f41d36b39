use std::path::PathBuf;

use clap::ArgMatches;
use renderfarm::{config::default_threads, WorkerConfig};

/// App configuration
/// Config is built from args parsed by `clap`
#[derive(Debug)]
pub struct Config {
    /// Run as worker
    pub server: bool,
    pub port: u16,
    /// Render threads, engine thread included
    pub threads: usize,
    /// Persist film before sending it
    pub write_film: bool,
    /// Received files and resume files go here
    pub work_dir: PathBuf,
    /// Log debug messages
    pub verbose: bool,
}

impl Config {
    pub fn from_args(args: ArgMatches) -> Result<Config, String> {
        let server = args.is_present("server");

        // Validated by parser, has default value
        let port = match args.value_of("serverport").map(str::parse) {
            Some(Ok(port)) => port,
            _ => return Err("Invalid port".into()),
        };

        let threads = match args.value_of("threads") {
            Some(t) => t.parse().map_err(|_| format!("Invalid thread count '{t}'"))?,
            None => default_threads(),
        };

        let write_film = args.is_present("serverwriteflm");

        let work_dir: PathBuf = args
            .value_of_os("workdir")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        if !work_dir.is_dir() {
            return Err(format!("Work directory {} does not exist", work_dir.display()));
        }

        let verbose = args.is_present("verbose");

        Ok(Config {
            server,
            port,
            threads,
            write_film,
            work_dir,
            verbose,
        })
    }

    pub fn worker_config(&self) -> renderfarm::Result<WorkerConfig> {
        WorkerConfig::builder()
            .port(self.port)
            .threads(self.threads)
            .write_film(self.write_film)
            .work_dir(&self.work_dir)
            .build()
    }
}
