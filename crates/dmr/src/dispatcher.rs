//! Executes management operations and reports exactly one outcome per
//! operation.
//!
//! The [`Dispatcher`] shapes the request (see [`crate::request`]), hands it to a
//! [`Transport`], classifies the status, decodes the payload and, for
//! successful responses carrying process state headers, publishes the state on
//! the [`EventBus`] before the result is delivered.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use hal_types::constants::RESULT;
use hal_types::{ModelNode, Operation};
use reqwest::Method;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::config::DispatchConfig;
use crate::endpoints::{Endpoints, Environment};
use crate::error::{ConfigError, DispatchError};
use crate::events::EventBus;
use crate::payload::PayloadProcessor;
use crate::processor::ResponseProcessor;
use crate::request::{build_request, build_upload_request};
use crate::transport::{HttpTransport, RawResponse, Transport, UploadFile};

/// What a single dispatch ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The `result` of a successful response.
    Success(ModelNode),
    /// The server rejected the operation.
    Failed { operation: Operation, failure: String },
    /// No usable response: transport error or a non-200 status.
    Exception { operation: Operation, error: DispatchError },
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success(_))
    }
}

type SuccessCallback = Box<dyn FnOnce(ModelNode) + Send>;
type FailedCallback = Box<dyn FnOnce(Operation, String) + Send>;
type ExceptionCallback = Box<dyn FnOnce(Operation, DispatchError) + Send>;

/// Handler used for failed dispatches without a per-call callback.
pub type FailedHandler = Arc<dyn Fn(Operation, String) + Send + Sync>;
/// Handler used for exceptions without a per-call callback.
pub type ExceptionHandler = Arc<dyn Fn(Operation, DispatchError) + Send + Sync>;

/// Per-call callbacks. Only the success callback is mandatory; the others fall
/// back to the dispatcher's defaults.
pub struct Callbacks {
    on_success: SuccessCallback,
    on_failed: Option<FailedCallback>,
    on_exception: Option<ExceptionCallback>,
}

impl Callbacks {
    pub fn new(on_success: impl FnOnce(ModelNode) + Send + 'static) -> Self {
        Self {
            on_success: Box::new(on_success),
            on_failed: None,
            on_exception: None,
        }
    }

    pub fn on_failed(mut self, on_failed: impl FnOnce(Operation, String) + Send + 'static) -> Self {
        self.on_failed = Some(Box::new(on_failed));
        self
    }

    pub fn on_exception(mut self, on_exception: impl FnOnce(Operation, DispatchError) + Send + 'static) -> Self {
        self.on_exception = Some(Box::new(on_exception));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_failed", &self.on_failed.is_some())
            .field("on_exception", &self.on_exception.is_some())
            .finish_non_exhaustive()
    }
}

struct DefaultCallbacks {
    failed: FailedHandler,
    exception: ExceptionHandler,
}

impl Default for DefaultCallbacks {
    fn default() -> Self {
        Self {
            failed: Arc::new(|operation, failure| {
                error!(%operation, %failure, "management operation failed");
            }),
            exception: Arc::new(|operation, dispatch_error| {
                error!(
                    %operation,
                    error = %dispatch_error,
                    status = dispatch_error.status_code(),
                    "management operation raised an exception"
                );
            }),
        }
    }
}

struct Inner {
    endpoints: Endpoints,
    transport: Arc<dyn Transport>,
    response_processor: ResponseProcessor,
    events: EventBus,
    defaults: RwLock<DefaultCallbacks>,
}

/// Sends operations to the management interface.
///
/// Cheap to clone; clones share the transport, the event bus and the default
/// callbacks.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// The response post-processing strategy is picked from `environment` here
    /// and stays fixed for the lifetime of the dispatcher.
    pub fn new(endpoints: Endpoints, transport: Arc<dyn Transport>, environment: &Environment) -> Self {
        let response_processor = ResponseProcessor::for_topology(environment.topology());
        debug!(
            dmr = endpoints.dmr(),
            upload = endpoints.upload(),
            topology = %environment.topology(),
            "dispatcher created"
        );
        Self {
            inner: Arc::new(Inner {
                endpoints,
                transport,
                response_processor,
                events: EventBus::new(),
                defaults: RwLock::new(DefaultCallbacks::default()),
            }),
        }
    }

    /// Builds a dispatcher backed by [`HttpTransport`].
    pub fn from_config(config: &DispatchConfig) -> Result<Self, ConfigError> {
        let endpoints = Endpoints::from_base_url(&config.base_url)?;
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(endpoints, Arc::new(transport), &Environment::new(config.topology())))
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.endpoints
    }

    pub fn response_processor(&self) -> ResponseProcessor {
        self.inner.response_processor
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn set_failed_callback(&self, handler: impl Fn(Operation, String) + Send + Sync + 'static) {
        self.inner.defaults.write().unwrap_or_else(PoisonError::into_inner).failed = Arc::new(handler);
    }

    pub fn set_exception_callback(&self, handler: impl Fn(Operation, DispatchError) + Send + Sync + 'static) {
        self.inner.defaults.write().unwrap_or_else(PoisonError::into_inner).exception = Arc::new(handler);
    }

    /// Spawns the dispatch of `operation`; exactly one of the callbacks fires
    /// once it completes.
    pub fn execute(&self, operation: Operation, callbacks: Callbacks) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let outcome = dispatcher.dispatch(&operation).await;
            dispatcher.deliver(outcome, callbacks);
        })
    }

    /// Spawns an upload of `file` along with `operation`.
    pub fn upload(&self, file: UploadFile, operation: Operation, callbacks: Callbacks) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let outcome = dispatcher.dispatch_upload(file, &operation).await;
            dispatcher.deliver(outcome, callbacks);
        })
    }

    pub async fn dispatch(&self, operation: &Operation) -> DispatchOutcome {
        debug!(%operation, "dispatching operation");
        let request = match build_request(&self.inner.endpoints, operation) {
            Ok(request) => request,
            Err(dispatch_error) => return exception(operation, dispatch_error),
        };

        let method = request.method.clone();
        let url = request.url.clone();
        match self.inner.transport.send(request).await {
            Ok(response) => self.process_response(operation, &method, &url, PayloadProcessor::Dmr, response),
            Err(dispatch_error) => exception(operation, dispatch_error),
        }
    }

    pub async fn dispatch_upload(&self, file: UploadFile, operation: &Operation) -> DispatchOutcome {
        debug!(%operation, file = %file.file_name, "dispatching upload");
        let request = build_upload_request(&self.inner.endpoints, file, operation);
        let url = request.url.clone();
        match self.inner.transport.upload(request).await {
            Ok(response) => self.process_response(operation, &Method::POST, &url, PayloadProcessor::Upload, response),
            Err(dispatch_error) => exception(operation, dispatch_error),
        }
    }

    fn process_response(
        &self,
        operation: &Operation,
        method: &Method,
        url: &str,
        payload_processor: PayloadProcessor,
        response: RawResponse,
    ) -> DispatchOutcome {
        if let Some(dispatch_error) = status_error(response.status, url) {
            return exception(operation, dispatch_error);
        }

        let mut node = payload_processor.process(method, &response.body);
        if node.is_failure() {
            return DispatchOutcome::Failed {
                operation: operation.clone(),
                failure: node.failure_description(),
            };
        }

        let response_processor = self.inner.response_processor;
        if response_processor.accepts(&node) {
            self.inner.events.publish(response_processor.process(&node));
        }
        DispatchOutcome::Success(std::mem::take(node.get_mut(RESULT)))
    }

    fn deliver(&self, outcome: DispatchOutcome, callbacks: Callbacks) {
        match outcome {
            DispatchOutcome::Success(result) => (callbacks.on_success)(result),
            DispatchOutcome::Failed { operation, failure } => match callbacks.on_failed {
                Some(on_failed) => on_failed(operation, failure),
                None => {
                    let handler = self.inner.defaults.read().unwrap_or_else(PoisonError::into_inner).failed.clone();
                    handler(operation, failure);
                }
            },
            DispatchOutcome::Exception { operation, error } => match callbacks.on_exception {
                Some(on_exception) => on_exception(operation, error),
                None => {
                    let handler = self.inner.defaults.read().unwrap_or_else(PoisonError::into_inner).exception.clone();
                    handler(operation, error);
                }
            },
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("endpoints", &self.inner.endpoints)
            .field("response_processor", &self.inner.response_processor)
            .finish_non_exhaustive()
    }
}

/// Maps a non-200 status to the error reported for it. `url` is the request URL.
pub fn status_error(status: u16, url: &str) -> Option<DispatchError> {
    let message = match status {
        200 => return None,
        0 | 401 | 403 => "Authentication required.".to_string(),
        404 => format!("Management interface at '{url}' not found."),
        503 => "Service temporarily unavailable. Is the server still booting?".to_string(),
        _ => format!("Unexpected status code {status}"),
    };
    Some(DispatchError::status(message, status))
}

fn exception(operation: &Operation, error: DispatchError) -> DispatchOutcome {
    DispatchOutcome::Exception {
        operation: operation.clone(),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoints::Topology;
    use crate::process_state::{RunState, ServerState};
    use crate::transport::{DmrRequest, UploadRequest};
    use async_trait::async_trait;
    use hal_types::ResourceAddress;
    use hal_types::constants::{
        FAILED, FAILURE_DESCRIPTION, HOST, OUTCOME, PROCESS_STATE, RESPONSE, RESPONSE_HEADERS, SERVER_GROUPS, SUCCESS,
    };
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    /// Answers every request with the same response and records what was sent.
    struct ScriptedTransport {
        reply: Result<RawResponse, DispatchError>,
        requests: Mutex<Vec<DmrRequest>>,
    }

    impl ScriptedTransport {
        fn replying(status: u16, body: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(RawResponse::new(status, body)),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Err(DispatchError::transport(message)),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<DmrRequest> {
            self.requests.lock().expect("requests").clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: DmrRequest) -> Result<RawResponse, DispatchError> {
            self.requests.lock().expect("requests").push(request);
            self.reply.clone()
        }

        async fn upload(&self, _request: UploadRequest) -> Result<RawResponse, DispatchError> {
            self.reply.clone()
        }
    }

    fn endpoints() -> Endpoints {
        Endpoints::from_base_url("http://localhost:9990").expect("endpoints")
    }

    fn dispatcher(transport: Arc<ScriptedTransport>) -> Dispatcher {
        Dispatcher::new(endpoints(), transport, &Environment::default())
    }

    fn read_resource() -> Operation {
        Operation::builder(ResourceAddress::from_segments([("subsystem", "logging")]), "read-resource").build()
    }

    fn encoded_success(result: impl Into<ModelNode>) -> String {
        let mut response = ModelNode::object();
        response.get_mut(OUTCOME).set(SUCCESS);
        response.get_mut(RESULT).set(result);
        response.to_base64_string().expect("encode")
    }

    #[test]
    fn status_classification_matches_messages() {
        let url = "http://localhost:9990/management";
        assert!(status_error(200, url).is_none());
        for status in [0, 401, 403] {
            let error = status_error(status, url).expect("error");
            assert_eq!(error.to_string(), "Authentication required.");
            assert_eq!(error.status_code(), Some(status));
        }
        assert_eq!(
            status_error(404, url).expect("error").to_string(),
            "Management interface at 'http://localhost:9990/management' not found."
        );
        assert_eq!(
            status_error(503, url).expect("error").to_string(),
            "Service temporarily unavailable. Is the server still booting?"
        );
        assert_eq!(status_error(999, url).expect("error").to_string(), "Unexpected status code 999");
    }

    #[tokio::test]
    async fn successful_response_delivers_result() {
        let transport = ScriptedTransport::replying(200, encoded_success("INFO"));
        let outcome = dispatcher(transport.clone()).dispatch(&read_resource()).await;

        assert_eq!(outcome, DispatchOutcome::Success(ModelNode::from("INFO")));
        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, Method::POST);
    }

    #[tokio::test]
    async fn failed_outcome_carries_failure_description() {
        let mut response = ModelNode::object();
        response.get_mut(OUTCOME).set(FAILED);
        response.get_mut(FAILURE_DESCRIPTION).set("WFLYCTL0216: not found");
        let transport = ScriptedTransport::replying(200, response.to_base64_string().expect("encode"));

        let operation = read_resource();
        let outcome = dispatcher(transport).dispatch(&operation).await;
        assert_eq!(
            outcome,
            DispatchOutcome::Failed {
                operation,
                failure: "WFLYCTL0216: not found".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn undecodable_body_is_reported_as_failed() {
        let transport = ScriptedTransport::replying(200, "%%%");
        let outcome = dispatcher(transport).dispatch(&read_resource()).await;
        match outcome {
            DispatchOutcome::Failed { failure, .. } => assert!(failure.starts_with("Failed to decode response: ")),
            other => panic!("expected failed outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_200_statuses_become_exceptions() {
        for status in [0u16, 401, 403, 404, 503, 999] {
            let transport = ScriptedTransport::replying(status, "");
            let outcome = dispatcher(transport).dispatch(&read_resource()).await;
            match outcome {
                DispatchOutcome::Exception { error, .. } => assert_eq!(error.status_code(), Some(status)),
                other => panic!("expected exception for {status}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn transport_errors_become_exceptions_without_status() {
        let transport = ScriptedTransport::failing("Network error: connection refused");
        let outcome = dispatcher(transport).dispatch(&read_resource()).await;
        match outcome {
            DispatchOutcome::Exception { error, .. } => {
                assert_eq!(error.to_string(), "Network error: connection refused");
                assert_eq!(error.status_code(), None);
            }
            other => panic!("expected exception, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn description_reads_are_sent_as_get_and_wrapped() {
        let mut description = ModelNode::object();
        description.get_mut("description").set("The logging subsystem");
        let transport = ScriptedTransport::replying(200, description.to_base64_string().expect("encode"));

        let operation =
            Operation::builder(ResourceAddress::from_segments([("subsystem", "logging")]), "read-resource-description")
                .param("recursive", true)
                .build();
        let outcome = dispatcher(transport.clone()).dispatch(&operation).await;

        assert_eq!(outcome, DispatchOutcome::Success(description));
        let sent = transport.sent();
        assert_eq!(sent[0].method, Method::GET);
        assert_eq!(
            sent[0].url,
            "http://localhost:9990/management/subsystem/logging?operation=resource-description&recursive=true"
        );
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Fired {
        Success,
        Failed,
        Exception,
    }

    fn encoded_failure() -> String {
        let mut response = ModelNode::object();
        response.get_mut(OUTCOME).set(FAILED);
        response.get_mut(FAILURE_DESCRIPTION).set("WFLYCTL0216: not found");
        response.to_base64_string().expect("encode")
    }

    #[tokio::test]
    async fn exactly_one_callback_fires() {
        let cases = vec![
            ("success", ScriptedTransport::replying(200, encoded_success("INFO")), Fired::Success),
            ("failed", ScriptedTransport::replying(200, encoded_failure()), Fired::Failed),
            ("undecodable", ScriptedTransport::replying(200, "%%%"), Fired::Failed),
            ("status 0", ScriptedTransport::replying(0, ""), Fired::Exception),
            ("status 401", ScriptedTransport::replying(401, ""), Fired::Exception),
            ("status 403", ScriptedTransport::replying(403, ""), Fired::Exception),
            ("status 404", ScriptedTransport::replying(404, ""), Fired::Exception),
            ("status 503", ScriptedTransport::replying(503, ""), Fired::Exception),
            ("status 999", ScriptedTransport::replying(999, ""), Fired::Exception),
            ("transport", ScriptedTransport::failing("Network error: connection reset"), Fired::Exception),
        ];

        for (name, transport, expected) in cases {
            let dispatcher = dispatcher(transport);
            let counts = Arc::new([AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)]);
            let (success, failed, exception) = (counts.clone(), counts.clone(), counts.clone());
            let callbacks = Callbacks::new(move |_| {
                success[Fired::Success as usize].fetch_add(1, Ordering::SeqCst);
            })
            .on_failed(move |_, _| {
                failed[Fired::Failed as usize].fetch_add(1, Ordering::SeqCst);
            })
            .on_exception(move |_, _| {
                exception[Fired::Exception as usize].fetch_add(1, Ordering::SeqCst);
            });

            dispatcher.execute(read_resource(), callbacks).await.expect("task");

            let fired: Vec<usize> = counts.iter().map(|count| count.load(Ordering::SeqCst)).collect();
            assert_eq!(fired.iter().sum::<usize>(), 1, "{name}: {fired:?}");
            assert_eq!(fired[expected as usize], 1, "{name}: expected {expected:?}, got {fired:?}");
        }
    }

    #[tokio::test]
    async fn deeply_nested_body_is_reported_as_failed() {
        let mut nested = ModelNode::Undefined;
        for _ in 0..1_000 {
            nested = ModelNode::List(vec![nested]);
        }
        let mut response = ModelNode::object();
        response.get_mut(OUTCOME).set(SUCCESS);
        response.get_mut(RESULT).set(nested);
        let transport = ScriptedTransport::replying(200, response.to_base64_string().expect("encode"));

        let outcome = dispatcher(transport).dispatch(&read_resource()).await;
        match outcome {
            DispatchOutcome::Failed { failure, .. } => {
                assert!(failure.starts_with("Failed to decode response: "), "{failure}");
                assert!(failure.contains("nesting deeper than"), "{failure}");
            }
            other => panic!("expected failed outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn default_callbacks_handle_omitted_ones() {
        let transport = ScriptedTransport::replying(503, "");
        let dispatcher = dispatcher(transport);
        let (sender, receiver) = std::sync::mpsc::channel();
        dispatcher.set_exception_callback(move |operation, error| {
            let _ = sender.send((operation.name().to_string(), error.to_string()));
        });

        dispatcher
            .execute(read_resource(), Callbacks::new(|_| panic!("no success expected")))
            .await
            .expect("task");
        let (name, message) = receiver.recv().expect("default exception callback");
        assert_eq!(name, "read-resource");
        assert_eq!(message, "Service temporarily unavailable. Is the server still booting?");
    }

    #[tokio::test]
    async fn process_state_is_published_before_success() {
        let mut response = ModelNode::object();
        response.get_mut(OUTCOME).set(SUCCESS);
        response.get_mut(RESULT);
        response.get_mut(RESPONSE_HEADERS).get_mut(PROCESS_STATE).set("reload-required");
        let transport = ScriptedTransport::replying(200, response.to_base64_string().expect("encode"));

        let dispatcher = dispatcher(transport);
        let mut events = dispatcher.events().subscribe();
        let (sender, receiver) = oneshot::channel();
        let mut early = dispatcher.events().subscribe();
        dispatcher
            .execute(
                read_resource(),
                Callbacks::new(move |_| {
                    // The state must already be on the bus when the result arrives.
                    let _ = sender.send(early.try_recv().is_ok());
                }),
            )
            .await
            .expect("task");

        assert!(receiver.await.expect("success callback"));
        let state = events.recv().await.expect("process state");
        assert_eq!(state.summary(), RunState::ReloadRequired);
    }

    #[tokio::test]
    async fn domain_process_state_is_aggregated_and_published_before_success() {
        let mut response = ModelNode::object();
        response.get_mut(OUTCOME).set(SUCCESS);
        response.get_mut(RESULT).set("done");
        let hosts = response.get_mut(SERVER_GROUPS).get_mut("main-server-group").get_mut(HOST);
        hosts
            .get_mut("primary")
            .get_mut("server-one")
            .get_mut(RESPONSE)
            .get_mut(RESPONSE_HEADERS)
            .get_mut(PROCESS_STATE)
            .set("reload-required");
        hosts
            .get_mut("secondary")
            .get_mut("server-two")
            .get_mut(RESPONSE)
            .get_mut(RESPONSE_HEADERS)
            .get_mut(PROCESS_STATE)
            .set("restart-required");
        let transport = ScriptedTransport::replying(200, response.to_base64_string().expect("encode"));

        let dispatcher = Dispatcher::new(endpoints(), transport, &Environment::new(Topology::Domain));
        let mut early = dispatcher.events().subscribe();
        let (sender, receiver) = oneshot::channel();
        dispatcher
            .execute(
                read_resource(),
                Callbacks::new(move |result| {
                    let _ = sender.send((result, early.try_recv().ok()));
                }),
            )
            .await
            .expect("task");

        let (result, state) = receiver.await.expect("success callback");
        assert_eq!(result, ModelNode::from("done"));
        let state = state.expect("process state published before success");
        assert_eq!(
            state.servers,
            vec![
                ServerState::new("primary", "server-one", RunState::ReloadRequired),
                ServerState::new("secondary", "server-two", RunState::RestartRequired),
            ]
        );
        assert_eq!(state.summary(), RunState::RestartRequired);
    }

    #[test]
    fn topology_is_fixed_at_construction() {
        let mut environment = Environment::new(Topology::Domain);
        let dispatcher = Dispatcher::new(endpoints(), ScriptedTransport::replying(200, ""), &environment);
        environment.set_standalone(true);
        assert_eq!(dispatcher.response_processor(), ResponseProcessor::Domain);
    }

    #[tokio::test]
    async fn upload_uses_json_payload_processing() {
        let transport = ScriptedTransport::replying(200, r#"{"outcome":"success","result":"deployed"}"#);
        let operation = Operation::builder(ResourceAddress::from_segments([("deployment", "app.war")]), "add").build();

        let outcome = dispatcher(transport)
            .dispatch_upload(UploadFile::new("input", "app.war", vec![0xCA, 0xFE]), &operation)
            .await;
        assert_eq!(outcome, DispatchOutcome::Success(ModelNode::from("deployed")));
    }
}
