//! Management endpoint locations and the runtime environment.

use std::fmt;

use crate::config::validate_base_url;
use crate::error::ConfigError;

const DMR_PATH: &str = "/management";
const UPLOAD_PATH: &str = "/management-upload";

/// URLs of the management interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    dmr: String,
    upload: String,
}

impl Endpoints {
    /// Derives the DMR and upload endpoints from the interface base URL.
    pub fn from_base_url(base_url: &str) -> Result<Self, ConfigError> {
        validate_base_url(base_url)?;
        let base = base_url.trim_end_matches('/');
        Ok(Self {
            dmr: format!("{base}{DMR_PATH}"),
            upload: format!("{base}{UPLOAD_PATH}"),
        })
    }

    /// Explicit endpoints, used when the interface sits behind a proxy with
    /// non-standard paths.
    pub fn new(dmr: impl Into<String>, upload: impl Into<String>) -> Self {
        Self {
            dmr: dmr.into(),
            upload: upload.into(),
        }
    }

    pub fn dmr(&self) -> &str {
        &self.dmr
    }

    pub fn upload(&self) -> &str {
        &self.upload
    }
}

/// Whether the managed runtime is a single server or a multi-server domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Standalone,
    Domain,
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::Standalone => f.write_str("standalone"),
            Topology::Domain => f.write_str("domain"),
        }
    }
}

/// Facts about the managed runtime discovered at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    standalone: bool,
}

impl Environment {
    pub fn new(topology: Topology) -> Self {
        Self {
            standalone: topology == Topology::Standalone,
        }
    }

    pub fn is_standalone(&self) -> bool {
        self.standalone
    }

    pub fn set_standalone(&mut self, standalone: bool) {
        self.standalone = standalone;
    }

    pub fn topology(&self) -> Topology {
        if self.standalone { Topology::Standalone } else { Topology::Domain }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new(Topology::Standalone)
    }
}
