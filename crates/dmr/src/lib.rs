//! Dispatching of management operations.
//!
//! [`Dispatcher`] turns [`hal_types::Operation`]s into HTTP requests against the
//! management interface, classifies what comes back and delivers exactly one
//! outcome per operation. Responses that report servers needing a reload or
//! restart are published on the [`EventBus`] as [`ProcessState`].

pub mod config;
pub mod dispatcher;
pub mod endpoints;
pub mod error;
pub mod events;
pub mod payload;
pub mod process_state;
pub mod processor;
pub mod request;
pub mod transport;

pub use config::{DispatchConfig, default_config_path};
pub use dispatcher::{Callbacks, DispatchOutcome, Dispatcher, ExceptionHandler, FailedHandler, status_error};
pub use endpoints::{Endpoints, Environment, Topology};
pub use error::{ConfigError, DispatchError};
pub use events::EventBus;
pub use payload::PayloadProcessor;
pub use process_state::{ProcessState, RunState, ServerState};
pub use processor::ResponseProcessor;
pub use request::{DMR_ENCODED, build_request, build_upload_request};
pub use transport::{DmrRequest, HttpTransport, RawResponse, Transport, UploadFile, UploadRequest};
