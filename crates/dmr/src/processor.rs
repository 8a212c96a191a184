//! Topology specific post-processing of successful responses.
//!
//! Management responses can carry `process-state` headers telling the console
//! that servers need a reload or restart. Where those headers live depends on
//! the topology, so one of two strategies is chosen when the session starts.

use hal_types::ModelNode;
use hal_types::constants::{HOST, PROCESS_STATE, RESPONSE, RESPONSE_HEADERS, SERVER_GROUPS};
use tracing::trace;

use crate::endpoints::Topology;
use crate::process_state::{ProcessState, RunState, ServerState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseProcessor {
    /// `response-headers.process-state` on the response itself.
    Standalone,
    /// `server-groups.<group>.host.<host>.<server>.response.response-headers.process-state`.
    Domain,
}

impl ResponseProcessor {
    pub fn for_topology(topology: Topology) -> Self {
        match topology {
            Topology::Standalone => ResponseProcessor::Standalone,
            Topology::Domain => ResponseProcessor::Domain,
        }
    }

    /// Cheap shape check run on every successful response.
    pub fn accepts(&self, response: &ModelNode) -> bool {
        match self {
            ResponseProcessor::Standalone => {
                response.has_defined(RESPONSE_HEADERS) && response.get(RESPONSE_HEADERS).has_defined(PROCESS_STATE)
            }
            ResponseProcessor::Domain => response.has_defined(SERVER_GROUPS),
        }
    }

    /// Extracts the process state. Shapes it does not understand contribute
    /// nothing instead of failing.
    pub fn process(&self, response: &ModelNode) -> ProcessState {
        match self {
            ResponseProcessor::Standalone => standalone_state(response),
            ResponseProcessor::Domain => domain_state(response),
        }
    }
}

fn standalone_state(response: &ModelNode) -> ProcessState {
    let mut process_state = ProcessState::default();
    let header = response.at(&[RESPONSE_HEADERS, PROCESS_STATE]);
    if header.is_defined() {
        process_state.add(ServerState::new("", "", RunState::from_header(&header.as_string())));
    }
    process_state
}

fn domain_state(response: &ModelNode) -> ProcessState {
    let mut process_state = ProcessState::default();
    let server_groups = response.get(SERVER_GROUPS);

    for group in server_groups.keys() {
        let hosts = server_groups.at(&[group, HOST]);
        for host in hosts.keys() {
            let servers = hosts.get(host);
            for server in servers.keys() {
                let header = servers.at(&[server, RESPONSE, RESPONSE_HEADERS, PROCESS_STATE]);
                if header.is_defined() {
                    process_state.add(ServerState::new(host, server, RunState::from_header(&header.as_string())));
                } else {
                    trace!(group, host, server, "server response without process state");
                }
            }
        }
    }
    process_state
}
