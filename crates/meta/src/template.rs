//! Parameterized resource paths and their resolution against a [`StatementContext`].
//!
//! A template is written like an address, with placeholders in two positions:
//!
//! ```text
//! /{selected.host}/server-config=*              whole segment tuple
//! /profile={selected.profile}/subsystem=logging value placeholder
//! ```
//!
//! Resolution walks the segments in order and never reorders them.

use std::fmt;
use std::str::FromStr;

use hal_types::ResourceAddress;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::statement_context::{ResolvedTuple, StatementContext, Tuple, strip_braces};

/// Matches a whole `{placeholder}` token.
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\{([A-Za-z0-9_.\-]+)\}$").expect("valid placeholder regex"));

const WILDCARD: &str = "*";

/// Errors raised while parsing or strictly resolving a template.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("malformed address template segment '{segment}'")]
    Malformed { segment: String },

    #[error("unknown tuple placeholder '{placeholder}'")]
    UnknownTuple { placeholder: String },

    #[error("unresolved placeholder '{placeholder}'")]
    UnresolvedPlaceholder { placeholder: String },
}

/// How resolution treats placeholders without a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolutionPolicy {
    /// Keep the placeholder text in the resolved address.
    #[default]
    Permissive,
    /// Fail with [`TemplateError::UnresolvedPlaceholder`].
    Strict,
}

/// One template segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// `name=value`, copied verbatim.
    Literal { name: String, value: String },
    /// `name={placeholder}`, the value comes from the context.
    Placeholder { name: String, placeholder: String },
    /// `{tuple}`, both resource type and value come from the tuple.
    Tuple(Tuple),
}

impl Segment {
    fn parse(raw: &str) -> Result<Self, TemplateError> {
        if let Some(captures) = PLACEHOLDER.captures(raw) {
            let name = &captures[1];
            return Tuple::from_name(name).map(Segment::Tuple).ok_or_else(|| TemplateError::UnknownTuple {
                placeholder: raw.to_string(),
            });
        }

        let (name, value) = raw.split_once('=').ok_or_else(|| TemplateError::Malformed { segment: raw.to_string() })?;
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() || value.is_empty() {
            return Err(TemplateError::Malformed { segment: raw.to_string() });
        }

        if PLACEHOLDER.is_match(value) {
            Ok(Segment::Placeholder {
                name: name.to_string(),
                placeholder: value.to_string(),
            })
        } else {
            Ok(Segment::Literal {
                name: name.to_string(),
                value: value.to_string(),
            })
        }
    }

    /// Resource type of the segment, as far as it is known without a context.
    pub fn name(&self) -> &str {
        match self {
            Segment::Literal { name, .. } | Segment::Placeholder { name, .. } => name,
            Segment::Tuple(tuple) => tuple.resource(),
        }
    }

    /// Value or placeholder text of the segment.
    pub fn value(&self) -> String {
        match self {
            Segment::Literal { value, .. } => value.clone(),
            Segment::Placeholder { placeholder, .. } => placeholder.clone(),
            Segment::Tuple(tuple) => tuple.variable(),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Literal { name, value } => write!(f, "{name}={value}"),
            Segment::Placeholder { name, placeholder } => write!(f, "{name}={placeholder}"),
            Segment::Tuple(tuple) => write!(f, "{tuple}"),
        }
    }
}

/// An ordered sequence of template segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressTemplate {
    segments: Vec<Segment>,
}

impl AddressTemplate {
    /// The empty template, resolving to the root address.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses the textual form. Leading, trailing and doubled slashes are ignored.
    pub fn of(template: &str) -> Result<Self, TemplateError> {
        let segments = template
            .split('/')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(Segment::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Returns a new template with the segments of `template` appended.
    pub fn append(&self, template: &str) -> Result<Self, TemplateError> {
        let appended = Self::of(template)?;
        let mut segments = self.segments.clone();
        segments.extend(appended.segments);
        Ok(Self { segments })
    }

    /// The template without its last segment. The root's parent is the root.
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    pub fn last_name(&self) -> Option<&str> {
        self.segments.last().map(Segment::name)
    }

    pub fn last_value(&self) -> Option<String> {
        self.segments.last().map(Segment::value)
    }

    /// Permissive resolution without wildcards.
    pub fn resolve(&self, context: &dyn StatementContext) -> ResourceAddress {
        let mut address = ResourceAddress::root();
        for segment in &self.segments {
            let (name, value) = resolve_segment(segment, context).unwrap_or_else(|unresolved| unresolved);
            address.add(name, value);
        }
        address
    }

    /// Resolves the template under `policy`, substituting `*` values with
    /// `wildcards` in order. Surplus wildcard segments stay `*`.
    pub fn resolve_with(
        &self,
        context: &dyn StatementContext,
        policy: ResolutionPolicy,
        wildcards: &[&str],
    ) -> Result<ResourceAddress, TemplateError> {
        let mut wildcards = wildcards.iter();
        let mut address = ResourceAddress::root();

        for segment in &self.segments {
            let (name, value) = match resolve_segment(segment, context) {
                Ok(pair) => pair,
                Err(unresolved) => match policy {
                    ResolutionPolicy::Permissive => unresolved,
                    ResolutionPolicy::Strict => {
                        return Err(TemplateError::UnresolvedPlaceholder {
                            placeholder: segment.value(),
                        });
                    }
                },
            };

            let value = if value == WILDCARD {
                wildcards.next().map(|wildcard| (*wildcard).to_string()).unwrap_or(value)
            } else {
                value
            };
            address.add(name, value);
        }
        Ok(address)
    }
}

/// Resolves a tuple placeholder to its resource type and current value,
/// without building an address.
pub fn resolve_tuple(placeholder: &str, context: &dyn StatementContext) -> Option<ResolvedTuple> {
    context.resolve_tuple(placeholder)
}

/// Resolves one segment. The error side carries the pass-through pair used
/// when the placeholder has no value.
fn resolve_segment(segment: &Segment, context: &dyn StatementContext) -> Result<(String, String), (String, String)> {
    match segment {
        Segment::Literal { name, value } => Ok((name.clone(), value.clone())),
        Segment::Placeholder { name, placeholder } => match context.resolve(strip_braces(placeholder)) {
            Some(value) => Ok((name.clone(), value)),
            None => Err((name.clone(), placeholder.clone())),
        },
        Segment::Tuple(tuple) => match context.resolve_tuple(tuple.name()) {
            Some(resolved) => Ok((resolved.resource, resolved.value)),
            None => Err((tuple.resource().to_string(), tuple.variable())),
        },
    }
}

impl FromStr for AddressTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::of(s)
    }
}

impl fmt::Display for AddressTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}
