//! Normalized run state of the managed servers.

use std::fmt;

/// Run state reported in the `process-state` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    Running,
    ReloadRequired,
    RestartRequired,
    Unknown,
}

impl RunState {
    /// Maps a `process-state` header value. Unrecognized values become `Unknown`.
    pub fn from_header(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "running" | "ok" => RunState::Running,
            "reload-required" => RunState::ReloadRequired,
            "restart-required" => RunState::RestartRequired,
            _ => RunState::Unknown,
        }
    }

    fn severity(self) -> u8 {
        match self {
            RunState::Running => 0,
            RunState::Unknown => 1,
            RunState::ReloadRequired => 2,
            RunState::RestartRequired => 3,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RunState::Running => "running",
            RunState::ReloadRequired => "reload-required",
            RunState::RestartRequired => "restart-required",
            RunState::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

/// State of one server. Host and server are empty for a standalone server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerState {
    pub host: String,
    pub server: String,
    pub state: RunState,
}

impl ServerState {
    pub fn new(host: impl Into<String>, server: impl Into<String>, state: RunState) -> Self {
        Self {
            host: host.into(),
            server: server.into(),
            state,
        }
    }
}

/// Process state published after a response carrying state headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessState {
    pub servers: Vec<ServerState>,
}

impl ProcessState {
    pub fn add(&mut self, server_state: ServerState) {
        self.servers.push(server_state);
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// The most severe state across all servers; `Running` when empty.
    pub fn summary(&self) -> RunState {
        self.servers
            .iter()
            .map(|server_state| server_state.state)
            .max_by_key(|state| state.severity())
            .unwrap_or(RunState::Running)
    }

    pub fn needs_reload(&self) -> bool {
        self.summary() == RunState::ReloadRequired
    }

    pub fn needs_restart(&self) -> bool {
        self.summary() == RunState::RestartRequired
    }
}
