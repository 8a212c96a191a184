//! Session selection state that address templates are resolved against.

use std::collections::HashMap;
use std::fmt;

use hal_types::constants::{HOST, PROFILE, SERVER, SERVER_CONFIG, SERVER_GROUP};

/// Well known placeholders and the resource type each one stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tuple {
    DomainController,
    SelectedProfile,
    SelectedGroup,
    SelectedHost,
    SelectedServerConfig,
    SelectedServer,
}

impl Tuple {
    pub const ALL: [Tuple; 6] = [
        Tuple::DomainController,
        Tuple::SelectedProfile,
        Tuple::SelectedGroup,
        Tuple::SelectedHost,
        Tuple::SelectedServerConfig,
        Tuple::SelectedServer,
    ];

    /// Placeholder name without braces, e.g. `selected.profile`.
    pub fn name(self) -> &'static str {
        match self {
            Tuple::DomainController => "domain.controller",
            Tuple::SelectedProfile => "selected.profile",
            Tuple::SelectedGroup => "selected.group",
            Tuple::SelectedHost => "selected.host",
            Tuple::SelectedServerConfig => "selected.server-config",
            Tuple::SelectedServer => "selected.server",
        }
    }

    /// Resource type the placeholder expands to, e.g. `profile`.
    pub fn resource(self) -> &'static str {
        match self {
            Tuple::DomainController | Tuple::SelectedHost => HOST,
            Tuple::SelectedProfile => PROFILE,
            Tuple::SelectedGroup => SERVER_GROUP,
            Tuple::SelectedServerConfig => SERVER_CONFIG,
            Tuple::SelectedServer => SERVER,
        }
    }

    /// Placeholder as written in templates, e.g. `{selected.profile}`.
    pub fn variable(self) -> String {
        format!("{{{}}}", self.name())
    }

    /// Looks a tuple up by name. Surrounding braces are optional.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = strip_braces(name);
        Tuple::ALL.into_iter().find(|tuple| tuple.name() == name)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.variable())
    }
}

/// A tuple placeholder resolved to a `(resource, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTuple {
    pub resource: String,
    pub value: String,
}

/// Read contract over the current selection.
///
/// Implementations answer from whatever state is current at call time and
/// never block. A tuple without a selection yields `None`.
pub trait StatementContext {
    fn value(&self, tuple: Tuple) -> Option<String>;

    /// Resolves a placeholder (with or without braces) to its current value.
    fn resolve(&self, placeholder: &str) -> Option<String> {
        Tuple::from_name(placeholder).and_then(|tuple| self.value(tuple))
    }

    /// Resolves a placeholder to the resource type it stands for plus its value.
    fn resolve_tuple(&self, placeholder: &str) -> Option<ResolvedTuple> {
        let tuple = Tuple::from_name(placeholder)?;
        self.value(tuple).map(|value| ResolvedTuple {
            resource: tuple.resource().to_string(),
            value,
        })
    }

    fn domain_controller(&self) -> Option<String> {
        self.value(Tuple::DomainController)
    }

    fn selected_profile(&self) -> Option<String> {
        self.value(Tuple::SelectedProfile)
    }

    fn selected_server_group(&self) -> Option<String> {
        self.value(Tuple::SelectedGroup)
    }

    fn selected_host(&self) -> Option<String> {
        self.value(Tuple::SelectedHost)
    }

    fn selected_server_config(&self) -> Option<String> {
        self.value(Tuple::SelectedServerConfig)
    }

    fn selected_server(&self) -> Option<String> {
        self.value(Tuple::SelectedServer)
    }
}

/// Context without any selection. Templates resolved against it keep their
/// placeholders, which makes it usable before the session is set up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStatementContext;

impl StatementContext for NoopStatementContext {
    fn value(&self, _tuple: Tuple) -> Option<String> {
        None
    }
}

/// Mutable selection store for one console session.
///
/// Setters take `&mut self`; resolution borrows the context immutably, so the
/// selection can only change between resolutions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionContext {
    values: HashMap<Tuple, String>,
}

impl SelectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or clears (`None`) the value of a tuple.
    pub fn set(&mut self, tuple: Tuple, value: Option<String>) -> &mut Self {
        match value.filter(|value| !value.trim().is_empty()) {
            Some(value) => {
                self.values.insert(tuple, value);
            }
            None => {
                self.values.remove(&tuple);
            }
        }
        self
    }

    pub fn with(mut self, tuple: Tuple, value: impl Into<String>) -> Self {
        self.set(tuple, Some(value.into()));
        self
    }

    pub fn select_domain_controller(&mut self, host: impl Into<String>) -> &mut Self {
        self.set(Tuple::DomainController, Some(host.into()))
    }

    pub fn select_profile(&mut self, profile: impl Into<String>) -> &mut Self {
        self.set(Tuple::SelectedProfile, Some(profile.into()))
    }

    pub fn select_server_group(&mut self, group: impl Into<String>) -> &mut Self {
        self.set(Tuple::SelectedGroup, Some(group.into()))
    }

    pub fn select_host(&mut self, host: impl Into<String>) -> &mut Self {
        self.set(Tuple::SelectedHost, Some(host.into()))
    }

    pub fn select_server_config(&mut self, server_config: impl Into<String>) -> &mut Self {
        self.set(Tuple::SelectedServerConfig, Some(server_config.into()))
    }

    pub fn select_server(&mut self, server: impl Into<String>) -> &mut Self {
        self.set(Tuple::SelectedServer, Some(server.into()))
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl StatementContext for SelectionContext {
    fn value(&self, tuple: Tuple) -> Option<String> {
        self.values.get(&tuple).cloned()
    }
}

pub(crate) fn strip_braces(placeholder: &str) -> &str {
    placeholder
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
        .unwrap_or(placeholder)
}
