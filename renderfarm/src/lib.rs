//! Distributed rendering over TCP
//!
//! A master pushes a scene to worker processes, each worker renders it
//! locally and sends back its accumulated film on request.
//!
//! Worker side: [`server::Worker`], master side: [`master::MasterConnection`].

pub mod command;
pub mod config;
pub mod error;
pub mod film;
pub mod master;
pub mod protocol;
pub mod relay;
pub mod render;
pub mod scene;
pub mod server;
pub mod session;
pub mod test_helpers;
pub mod wire;

pub use config::WorkerConfig;
pub use error::{FarmError, Result};
pub use master::{MasterConnection, RenderFarm};
pub use server::Worker;

/// Port a worker listens on unless told otherwise
pub const DEFAULT_PORT: u16 = 18018;
