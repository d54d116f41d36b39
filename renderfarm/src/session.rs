//! Worker lifecycle and session bookkeeping

use std::fmt;

use log::{error, info, warn};

/// Lifecycle of a worker
///
/// `Unstarted -> Ready <-> Busy -> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Unstarted,
    /// Listening, no session
    Ready,
    /// Serving a session
    Busy,
    Stopped,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Unstarted => "unstarted",
            WorkerState::Ready => "ready",
            WorkerState::Busy => "busy",
            WorkerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Session id, `NNNN_NNNN_NNNN_NNNN`
///
/// Only distinguishes sessions, not a secret.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate(rng: &mut fastrand::Rng) -> SessionId {
        let groups: Vec<String> = (0..4)
            .map(|_| format!("{:04}", rng.u32(0..9999)))
            .collect();
        SessionId(groups.join("_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId(s.to_owned())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Answer to `ServerConnect`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectReply {
    Accepted(SessionId),
    Busy,
}

/// State of one worker and its (at most one) session
#[derive(Debug)]
pub struct SessionTable {
    state: WorkerState,
    current: Option<SessionId>,
    rng: fastrand::Rng,
}

impl SessionTable {
    pub fn new() -> SessionTable {
        SessionTable::with_rng(fastrand::Rng::new())
    }

    /// Table with seeded id generator
    pub fn with_rng(rng: fastrand::Rng) -> SessionTable {
        SessionTable {
            state: WorkerState::Unstarted,
            current: None,
            rng,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn current(&self) -> Option<&SessionId> {
        self.current.as_ref()
    }

    /// `Unstarted -> Ready`
    /// Returns `false` and logs if the worker was already started
    pub fn start(&mut self) -> bool {
        if self.state != WorkerState::Unstarted {
            error!("Cannot start worker in state {}", self.state);
            return false;
        }
        self.state = WorkerState::Ready;
        true
    }

    /// `Ready | Busy -> Stopped`, drops any session
    pub fn stop(&mut self) -> bool {
        match self.state {
            WorkerState::Ready | WorkerState::Busy => {
                self.state = WorkerState::Stopped;
                self.current = None;
                true
            }
            state => {
                error!("Cannot stop worker in state {state}");
                false
            }
        }
    }

    /// Open a session if the worker is free
    ///
    /// While busy the existing session is kept.
    pub fn connect(&mut self) -> ConnectReply {
        match self.state {
            WorkerState::Ready => {
                let sid = SessionId::generate(&mut self.rng);
                info!("Master connected, session {sid}");
                self.current = Some(sid.clone());
                self.state = WorkerState::Busy;
                ConnectReply::Accepted(sid)
            }
            WorkerState::Busy => {
                warn!("Connection request while busy with another session");
                ConnectReply::Busy
            }
            state => {
                error!("Connection request in state {state}");
                ConnectReply::Busy
            }
        }
    }

    /// `sid` names the active session
    pub fn validate(&self, sid: &str) -> bool {
        matches!(&self.current, Some(current) if current.as_str() == sid)
    }

    /// End the session named by `sid`
    ///
    /// Unknown or stale `sid` changes nothing.
    pub fn release(&mut self, sid: &str) -> bool {
        if !self.validate(sid) {
            return false;
        }
        info!("Session {sid} ended");
        self.current = None;
        self.state = WorkerState::Ready;
        true
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}
