//! HTTP clients for the scheduler and the service-discovery agent.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use evalwatch_events::{Allocation, AllocationStub, HealthCheck};
use evalwatch_reconcile::{AllocationSource, HealthSource, QueryError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{ConsulArgs, NomadArgs};

const NOMAD_TOKEN_HEADER: &str = "x-nomad-token";
const CONSUL_TOKEN_HEADER: &str = "x-consul-token";

/// Read-only client for the Nomad HTTP API.
#[derive(Debug, Clone)]
pub struct NomadClient {
    http: HttpClient,
    params: Vec<(&'static str, String)>,
}

impl NomadClient {
    pub fn new(args: &NomadArgs) -> Result<Self> {
        let http = HttpClient::new(&args.addr, NOMAD_TOKEN_HEADER, args.token.as_deref())
            .context("Failed to create Nomad client")?;

        let mut params = Vec::new();
        if let Some(region) = &args.region {
            params.push(("region", region.clone()));
        }
        if let Some(namespace) = &args.namespace {
            params.push(("namespace", namespace.clone()));
        }

        Ok(Self { http, params })
    }
}

#[async_trait]
impl AllocationSource for NomadClient {
    async fn evaluation_allocations(
        &self,
        evaluation_id: &str,
    ) -> Result<Vec<AllocationStub>, QueryError> {
        self.http
            .get(&["v1", "evaluation", evaluation_id, "allocations"], &self.params)
            .await
    }

    async fn allocation(&self, alloc_id: &str) -> Result<Allocation, QueryError> {
        self.http
            .get(&["v1", "allocation", alloc_id], &self.params)
            .await
    }
}

/// Read-only client for the Consul HTTP API.
#[derive(Debug, Clone)]
pub struct ConsulClient {
    http: HttpClient,
    params: Vec<(&'static str, String)>,
}

impl ConsulClient {
    pub fn new(args: &ConsulArgs) -> Result<Self> {
        let http = HttpClient::new(&args.addr, CONSUL_TOKEN_HEADER, args.token.as_deref())
            .context("Failed to create Consul client")?;

        let params = args
            .datacenter
            .iter()
            .map(|dc| ("dc", dc.clone()))
            .collect();

        Ok(Self { http, params })
    }
}

#[async_trait]
impl HealthSource for ConsulClient {
    async fn service_checks(&self, service: &str) -> Result<Vec<HealthCheck>, QueryError> {
        self.http
            .get(&["v1", "health", "checks", service], &self.params)
            .await
    }
}

/// JSON-over-HTTP plumbing shared by both clients.
#[derive(Debug, Clone)]
struct HttpClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpClient {
    fn new(base_url: &str, token_header: &'static str, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(token).context("Invalid token format")?;
            value.set_sensitive(true);
            headers.insert(HeaderName::from_static(token_header), value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid API address {base_url:?}"))?;
        if base_url.cannot_be_a_base() {
            bail!("Invalid API address {base_url}");
        }

        Ok(Self { client, base_url })
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: the base URL always has path segments.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        params: &[(&'static str, String)],
    ) -> Result<T, QueryError> {
        let url = self.url(segments);
        debug!(path = url.path(), "GET");
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| QueryError::Transport(transport_message(&e)))?;

        handle_response(response).await
    }
}

/// Decode a success body or map the status to a [`QueryError`].
async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, QueryError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| QueryError::Transport(transport_message(&e)))?;

    if status.is_success() {
        serde_json::from_str(&body).map_err(|e| QueryError::Decode(e.to_string()))
    } else if status == reqwest::StatusCode::NOT_FOUND {
        Err(QueryError::NotFound(body.trim().to_string()))
    } else {
        Err(QueryError::Status {
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}

/// reqwest's top-level message omits the cause ("error sending request").
fn transport_message(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let client = HttpClient::new("http://127.0.0.1:4646/", NOMAD_TOKEN_HEADER, None).unwrap();
        assert_eq!(
            client.url(&["v1", "allocation", "a1"]).as_str(),
            "http://127.0.0.1:4646/v1/allocation/a1"
        );
    }

    #[test]
    fn test_url_segments_are_encoded() {
        let client = HttpClient::new("http://127.0.0.1:8500/consul/", CONSUL_TOKEN_HEADER, None).unwrap();
        assert_eq!(
            client.url(&["v1", "health", "checks", "web http/../admin?x"]).as_str(),
            "http://127.0.0.1:8500/consul/v1/health/checks/web%20http%2F..%2Fadmin%3Fx"
        );
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        assert!(HttpClient::new("not a url", NOMAD_TOKEN_HEADER, None).is_err());
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        assert!(HttpClient::new("http://127.0.0.1:4646", NOMAD_TOKEN_HEADER, Some("bad\ntoken")).is_err());
    }

    #[test]
    fn test_query_params() {
        let mut args = NomadArgs::new("http://127.0.0.1:4646");
        args.region = Some("eu".into());
        let client = NomadClient::new(&args).unwrap();
        assert_eq!(client.params, vec![("region", "eu".to_string())]);

        let mut args = ConsulArgs::new("http://127.0.0.1:8500");
        args.datacenter = Some("dc2".into());
        let client = ConsulClient::new(&args).unwrap();
        assert_eq!(client.params, vec![("dc", "dc2".to_string())]);
    }
}
