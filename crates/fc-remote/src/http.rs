//! `RemoteSync` over the console's REST API.

use crate::api::*;
use crate::config::RemoteConfig;
use crate::error::RemoteError;
use crate::remote::RemoteSync;
use async_trait::async_trait;
use fc_core::{GraphSnapshot, NodeId};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

const ORG_HEADER: &str = "x-org-slug";

/// JSON-over-HTTP client for the backend.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base: Url,
}

impl HttpRemote {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let base = parse_base(&config.base_url)?;

        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| RemoteError::Config(format!("token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(org) = &config.org {
            let value = HeaderValue::from_str(org)
                .map_err(|e| RemoteError::Config(format!("org: {e}")))?;
            headers.insert(ORG_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self { client, base })
    }

    /// Build an endpoint URL from path segments; each segment is
    /// percent-encoded and the path keeps the backend's trailing slash.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        build_endpoint(&self.base, segments)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, RemoteError> {
        let url = self.endpoint(segments)?;
        log::debug!("{method} {url}");
        Ok(self.client.request(method, url))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let bytes = self.send_raw(request).await?;
        decode_body(&bytes)
    }

    async fn send_raw(&self, request: RequestBuilder) -> Result<Vec<u8>, RemoteError> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes.to_vec())
    }
}

fn parse_base(raw: &str) -> Result<Url, RemoteError> {
    let mut base = Url::parse(raw).map_err(|e| RemoteError::Config(format!("base url: {e}")))?;
    if base.cannot_be_a_base() {
        return Err(RemoteError::Config(format!("base url '{raw}' cannot hold paths")));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

fn build_endpoint(base: &Url, segments: &[&str]) -> Result<Url, RemoteError> {
    let mut url = base.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| RemoteError::Config(format!("base url '{base}' cannot hold paths")))?;
        path.pop_if_empty();
        path.extend(segments);
        path.push("");
    }
    Ok(url)
}

/// Decode a JSON body; an empty body decodes as JSON `null`.
pub fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RemoteError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_str("null")?);
    }
    Ok(serde_json::from_slice(bytes)?)
}

#[async_trait]
impl RemoteSync for HttpRemote {
    async fn fetch_graph(&self, project: &str) -> Result<GraphSnapshot, RemoteError> {
        let req = self.request(Method::GET, &["transform", "projects", project, "graph"])?;
        self.send(req).await
    }

    async fn create_operation_node(
        &self,
        payload: &CreateOperationPayload,
    ) -> Result<CanvasNodeResponse, RemoteError> {
        let req = self.request(Method::POST, &["transform", "operations"])?;
        self.send(req.json(payload)).await
    }

    async fn edit_operation_node(
        &self,
        id: NodeId,
        payload: &EditOperationPayload,
    ) -> Result<CanvasNodeResponse, RemoteError> {
        let req = self.request(Method::PUT, &["transform", "operations", id.as_str()])?;
        self.send(req.json(payload)).await
    }

    async fn delete_node(&self, id: NodeId) -> Result<(), RemoteError> {
        let req = self.request(Method::DELETE, &["transform", "nodes", id.as_str()])?;
        self.send_raw(req).await.map(|_| ())
    }

    async fn terminate_chain_and_create_model(
        &self,
        payload: &TerminateChainPayload,
    ) -> Result<CanvasNodeResponse, RemoteError> {
        let req = self.request(
            Method::POST,
            &["transform", "operations", payload.node.as_str(), "terminate"],
        )?;
        self.send(req.json(payload)).await
    }

    async fn run_sql(&self, sql: &str, limit: u32, offset: u32) -> Result<SqlResult, RemoteError> {
        let req = self.request(Method::POST, &["warehouse", "sql"])?;
        self.send(req.json(&SqlQuery { sql, limit, offset })).await
    }

    async fn sync_sources(&self, project: &str) -> Result<TaskHandle, RemoteError> {
        let req = self.request(Method::POST, &["transform", "projects", project, "sync-sources"])?;
        self.send(req).await
    }

    async fn sync_lock_status(&self, task: &TaskHandle) -> Result<TaskProgress, RemoteError> {
        let req = self.request(Method::GET, &["tasks", task.task_id.as_str()])?;
        let progress: Option<TaskProgress> = self.send(req).await?;
        Ok(progress.unwrap_or_default())
    }

    async fn run_workflow(&self, project: &str) -> Result<RunHandle, RemoteError> {
        let req = self.request(Method::POST, &["transform", "projects", project, "run"])?;
        self.send(req).await
    }

    async fn fetch_run_logs(&self, run: &RunHandle, offset: usize) -> Result<LogPage, RemoteError> {
        let req = self.request(Method::GET, &["runs", run.run_id.as_str(), "logs"])?;
        self.send(req.query(&[("offset", offset)])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn base_gains_trailing_slash() {
        let base = parse_base("https://console.test/api").unwrap();
        assert_eq!(base.as_str(), "https://console.test/api/");
    }

    #[test]
    fn endpoints_encode_segments() {
        let base = parse_base("https://console.test/api/").unwrap();
        let url = build_endpoint(&base, &["transform", "nodes", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "https://console.test/api/transform/nodes/a%20b%2Fc/");
    }

    #[test]
    fn non_http_base_is_rejected() {
        assert!(matches!(
            parse_base("mailto:ops@example.com"),
            Err(RemoteError::Config(_))
        ));
        assert!(matches!(parse_base("not a url"), Err(RemoteError::Config(_))));
    }

    #[test]
    fn empty_body_decodes_as_absent() {
        let progress: Option<TaskProgress> = decode_body(b"").unwrap();
        assert_eq!(progress, None);
        let progress: Option<TaskProgress> = decode_body(br#"{"status": "running"}"#).unwrap();
        assert_eq!(progress.unwrap().status, Some(LockStatus::Running));
    }

    #[test]
    fn bad_json_is_a_decode_error() {
        let result: Result<LogPage, _> = decode_body(b"<html>");
        assert!(matches!(result, Err(RemoteError::Decode(_))));
    }

    #[test]
    fn headers_reject_control_characters() {
        let config = RemoteConfig {
            token: Some("bad\ntoken".into()),
            ..RemoteConfig::default()
        };
        assert!(matches!(HttpRemote::new(&config), Err(RemoteError::Config(_))));
    }
}
