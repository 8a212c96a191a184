//! # HAL types
//!
//! Shared building blocks for talking to a management endpoint:
//!
//! - [`ModelNode`]: the detyped value tree used for requests and responses
//! - the binary DMR codec and its base64 transport form ([`codec`])
//! - [`Operation`] and [`ResourceAddress`]
//! - attribute and operation names ([`constants`])

pub mod codec;
pub mod constants;
pub mod model_node;
pub mod operation;

pub use codec::CodecError;
pub use model_node::{ModelNode, ModelType, Property};
pub use operation::{Operation, OperationBuilder, OperationError, ResourceAddress};
