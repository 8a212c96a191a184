//! Converts raw response bodies into value trees.
//!
//! Decoding problems never escape as errors. They turn into a synthetic failed
//! response so the dispatcher reports them through the failed path.

use hal_types::ModelNode;
use hal_types::constants::{FAILED, FAILURE_DESCRIPTION, OUTCOME, RESULT, SUCCESS};
use reqwest::Method;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadProcessor {
    /// Base64 encoded DMR from the management endpoint.
    Dmr,
    /// JSON from the upload endpoint.
    Upload,
}

impl PayloadProcessor {
    /// Turns `body` into a response tree with an `outcome`.
    ///
    /// GET responses carry the bare description and are wrapped as a
    /// successful response. POST responses are complete already.
    pub fn process(&self, method: &Method, body: &str) -> ModelNode {
        match self {
            PayloadProcessor::Dmr => match ModelNode::from_base64(body) {
                Ok(node) if *method == Method::GET => success(node),
                Ok(node) => node,
                Err(error) => decode_failure(error),
            },
            PayloadProcessor::Upload => {
                if body.trim().is_empty() {
                    return success(ModelNode::Undefined);
                }
                match ModelNode::from_json_str(body) {
                    Ok(node) if node.has(OUTCOME) => node,
                    Ok(node) => success(node),
                    Err(error) => decode_failure(error),
                }
            }
        }
    }
}

fn success(result: ModelNode) -> ModelNode {
    let mut response = ModelNode::object();
    response.get_mut(OUTCOME).set(SUCCESS);
    if result.is_defined() {
        response.get_mut(RESULT).set(result);
    }
    response
}

fn decode_failure(error: impl std::fmt::Display) -> ModelNode {
    warn!(%error, "could not decode management response");
    let mut response = ModelNode::object();
    response.get_mut(OUTCOME).set(FAILED);
    response
        .get_mut(FAILURE_DESCRIPTION)
        .set(format!("Failed to decode response: {error}"));
    response
}
