//! Attribute, operation and resource names of the management model.

pub const ADDRESS: &str = "address";
pub const OP: &str = "operation";
pub const OUTCOME: &str = "outcome";
pub const RESULT: &str = "result";
pub const SUCCESS: &str = "success";
pub const FAILED: &str = "failed";
pub const FAILURE_DESCRIPTION: &str = "failure-description";
pub const RESPONSE: &str = "response";
pub const RESPONSE_HEADERS: &str = "response-headers";
pub const PROCESS_STATE: &str = "process-state";
pub const SERVER_GROUPS: &str = "server-groups";

pub const READ_RESOURCE_OPERATION: &str = "read-resource";
pub const READ_RESOURCE_DESCRIPTION_OPERATION: &str = "read-resource-description";
pub const RESOURCE_DESCRIPTION: &str = "resource-description";

pub const RECURSIVE: &str = "recursive";
pub const PROXIES: &str = "proxies";
pub const OPERATIONS: &str = "operations";
pub const INHERITED: &str = "inherited";
pub const LOCALE: &str = "locale";
pub const INCLUDE_RUNTIME: &str = "include-runtime";

pub const HOST: &str = "host";
pub const PROFILE: &str = "profile";
pub const SERVER: &str = "server";
pub const SERVER_CONFIG: &str = "server-config";
pub const SERVER_GROUP: &str = "server-group";
