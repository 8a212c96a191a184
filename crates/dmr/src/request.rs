//! Turns operations into transport requests.
//!
//! `read-resource-description` is sent as a GET against a URL that spells out
//! the address, so descriptions are addressable and cacheable by the browser
//! or any proxy in between. Everything else is a POST carrying the encoded
//! operation.

use hal_types::Operation;
use hal_types::constants::{INHERITED, LOCALE, OPERATIONS, PROXIES, READ_RESOURCE_DESCRIPTION_OPERATION, RECURSIVE, RESOURCE_DESCRIPTION};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::endpoints::Endpoints;
use crate::error::DispatchError;
use crate::transport::{DmrRequest, UploadFile, UploadRequest};

/// Media type of base64 encoded DMR payloads.
pub const DMR_ENCODED: &str = "application/dmr-encoded";

/// Optional `read-resource-description` parameters forwarded as query
/// parameters, in this order. Others are dropped.
pub const DESCRIPTION_PARAMETERS: [&str; 5] = [RECURSIVE, PROXIES, OPERATIONS, INHERITED, LOCALE];

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const QUERY_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'<')
    .add(b'=')
    .add(b'>');

/// Whether the operation goes out as a GET.
pub fn is_description_read(operation: &Operation) -> bool {
    operation.name() == READ_RESOURCE_DESCRIPTION_OPERATION
}

/// Shapes a DMR request for `operation`.
pub fn build_request(endpoints: &Endpoints, operation: &Operation) -> Result<DmrRequest, DispatchError> {
    let headers = dmr_headers();
    if is_description_read(operation) {
        let endpoint = endpoints.dmr().trim_end_matches('/');
        Ok(DmrRequest {
            method: Method::GET,
            url: format!("{endpoint}{}", description_path(operation)),
            headers,
            body: None,
        })
    } else {
        let body = operation.node().to_base64_string().map_err(|error| DispatchError::Encode {
            message: error.to_string(),
        })?;
        Ok(DmrRequest {
            method: Method::POST,
            url: endpoints.dmr().to_string(),
            headers,
            body: Some(body),
        })
    }
}

/// Shapes a multipart upload of `file` together with `operation`.
pub fn build_upload_request(endpoints: &Endpoints, file: UploadFile, operation: &Operation) -> UploadRequest {
    UploadRequest {
        url: endpoints.upload().to_string(),
        file,
        operation: operation.node().to_json_string(true),
    }
}

/// `/name/value/...?operation=resource-description&recursive=true...`
fn description_path(operation: &Operation) -> String {
    let mut path = String::new();
    for (name, value) in operation.address().segments() {
        path.push('/');
        path.extend(utf8_percent_encode(name, PATH_SEGMENT));
        path.push('/');
        path.extend(utf8_percent_encode(value, PATH_SEGMENT));
    }

    path.push_str("?operation=");
    path.push_str(RESOURCE_DESCRIPTION);
    for parameter in DESCRIPTION_PARAMETERS {
        if let Some(value) = operation.parameter(parameter) {
            path.push('&');
            path.push_str(parameter);
            path.push('=');
            path.extend(utf8_percent_encode(&value.as_string(), QUERY_VALUE));
        }
    }
    path
}

fn dmr_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(DMR_ENCODED));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(DMR_ENCODED));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use hal_types::{ModelNode, ResourceAddress};

    fn endpoints() -> Endpoints {
        Endpoints::new("http://localhost:9990/management/", "http://localhost:9990/management-upload")
    }

    #[test]
    fn description_read_becomes_get_with_address_path() {
        let operation = Operation::builder(
            ResourceAddress::from_segments([("profile", "full"), ("subsystem", "logging")]),
            "read-resource-description",
        )
        .param("recursive", true)
        .param("locale", "de")
        .param("operations", true)
        .param("include-defaults", true)
        .build();

        let request = build_request(&endpoints(), &operation).expect("request");
        assert_eq!(request.method, Method::GET);
        assert_eq!(
            request.url,
            "http://localhost:9990/management/profile/full/subsystem/logging\
             ?operation=resource-description&recursive=true&operations=true&locale=de"
        );
        assert!(request.body.is_none());
    }

    #[test]
    fn description_path_encodes_reserved_characters() {
        let operation = Operation::builder(
            ResourceAddress::from_segments([("deployment", "my app.war"), ("subdeployment", "a/b")]),
            "read-resource-description",
        )
        .build();

        let request = build_request(&endpoints(), &operation).expect("request");
        assert!(request.url.ends_with("/deployment/my%20app.war/subdeployment/a%2Fb?operation=resource-description"));
    }

    #[test]
    fn other_operations_become_post_with_encoded_body() {
        let operation = Operation::builder(ResourceAddress::from_segments([("subsystem", "logging")]), "read-resource")
            .param("recursive", true)
            .build();

        let request = build_request(&endpoints(), &operation).expect("request");
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, "http://localhost:9990/management/");

        let body = request.body.expect("body");
        assert_eq!(&ModelNode::from_base64(&body).expect("decode"), operation.node());
    }

    #[test]
    fn every_request_declares_dmr_media_type() {
        for name in ["read-resource-description", "read-resource", "add"] {
            let operation = Operation::builder(ResourceAddress::root(), name).build();
            let request = build_request(&endpoints(), &operation).expect("request");
            assert_eq!(request.headers.get(ACCEPT).and_then(|value| value.to_str().ok()), Some(DMR_ENCODED));
            assert_eq!(request.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok()), Some(DMR_ENCODED));
        }
    }

    #[test]
    fn upload_request_carries_operation_as_json() {
        let operation = Operation::builder(ResourceAddress::from_segments([("deployment", "app.war")]), "add").build();
        let file = UploadFile::new("input", "app.war", vec![1, 2, 3]);

        let request = build_upload_request(&endpoints(), file.clone(), &operation);
        assert_eq!(request.url, "http://localhost:9990/management-upload");
        assert_eq!(request.file, file);
        assert_eq!(request.operation, r#"{"operation":"add","address":[{"deployment":"app.war"}]}"#);
    }
}
