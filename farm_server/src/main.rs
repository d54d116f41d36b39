use anyhow::{bail, Context};
use config::Config;
use log::{info, LevelFilter};
use renderfarm::Worker;

mod args;
mod config;

use crate::args::get_command;

pub fn main() -> anyhow::Result<()> {
    let cmd = get_command();
    let args = cmd.get_matches();

    let cfg = Config::from_args(args).map_err(anyhow::Error::msg)?;

    let mut logger =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cfg.verbose {
        logger.filter_level(LevelFilter::Debug);
    }
    logger.init();

    if !cfg.server {
        bail!("Nothing to do, run with --server to start a render worker");
    }

    let worker_config = cfg.worker_config().context("Invalid worker configuration")?;
    info!("{:?}", cfg);

    let mut worker = Worker::new(worker_config);
    worker
        .start()
        .with_context(|| format!("Cannot start worker on port {}", cfg.port))?;
    worker.join();

    Ok(())
}
