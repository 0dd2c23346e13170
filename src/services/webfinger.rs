//! WebFinger discovery handler.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::dispatch::CallContext;
use crate::proto::{WebFingerLink, WebFingerRequest, WebFingerResponse};
use crate::routing::{Handler, HandlerError};

/// Answers WebFinger lookups with the advertised web port.
#[derive(Debug, Clone, Copy)]
pub struct WebFingerHandler {
    port: u16,
}

impl WebFingerHandler {
    pub fn new(port: u16) -> Self {
        Self { port }
    }
}

#[async_trait]
impl Handler for WebFingerHandler {
    type Request = WebFingerRequest;
    type Response = WebFingerResponse;

    async fn handle(
        &self,
        _ctx: CallContext,
        request: WebFingerRequest,
    ) -> Result<WebFingerResponse, HandlerError> {
        info!(resource = %request.resource, "WebFinger request");
        Ok(WebFingerResponse {
            resource: request.resource,
            port: u32::from(self.port),
            links: Vec::new(),
        })
    }
}

/// JSON form of [`WebFingerResponse`] served over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebFingerDocument {
    pub resource: String,
    pub port: u32,
    pub links: Vec<WebFingerLinkDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebFingerLinkDocument {
    pub rel: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub href: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub r#type: String,
}

impl From<WebFingerResponse> for WebFingerDocument {
    fn from(response: WebFingerResponse) -> Self {
        Self {
            resource: response.resource,
            port: response.port,
            links: response.links.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<WebFingerLink> for WebFingerLinkDocument {
    fn from(link: WebFingerLink) -> Self {
        Self {
            rel: link.rel,
            href: link.href,
            r#type: link.r#type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_shape() {
        let doc = WebFingerDocument::from(WebFingerResponse {
            resource: "acct:user@example.com".into(),
            port: 8080,
            links: Vec::new(),
        });
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "resource": "acct:user@example.com",
                "port": 8080,
                "links": []
            })
        );
    }

    #[test]
    fn link_omits_empty_fields() {
        let doc = WebFingerLinkDocument::from(WebFingerLink {
            rel: "self".into(),
            href: String::new(),
            r#type: "application/activity+json".into(),
        });
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"rel": "self", "type": "application/activity+json"})
        );
    }
}
