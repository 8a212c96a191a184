//! Address templates and the session selection they are resolved against.
//!
//! Operation targets are written as [`AddressTemplate`]s containing tuple
//! placeholders such as `{selected.profile}`. Before an operation is
//! dispatched the template is resolved against a [`StatementContext`], which
//! reports the current selection (profile, host, server, server group).

pub mod statement_context;
pub mod template;

pub use statement_context::{NoopStatementContext, ResolvedTuple, SelectionContext, StatementContext, Tuple};
pub use template::{AddressTemplate, ResolutionPolicy, Segment, TemplateError, resolve_tuple};
