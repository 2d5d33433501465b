use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::ApiError;
use super::ControlApi;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound for control calls (`id`, swarm, bootstrap, `pin/rm`).
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// `pin/add` blocks until the whole DAG is fetched, so it gets longer.
pub const PIN_ADD_TIMEOUT: Duration = Duration::from_secs(600);

/// A single Kubo RPC call. Kubo takes every argument as a repeated `arg`
/// query parameter on a bodyless POST.
pub trait ApiRequest {
    type Response: DeserializeOwned;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError>;
}

fn rpc(
    base_url: &Url,
    client: &Client,
    endpoint: &str,
    arg: Option<&str>,
) -> Result<RequestBuilder, ApiError> {
    let full_url = base_url.join(&format!("/api/v0/{}", endpoint))?;
    let request = client.post(full_url);
    Ok(match arg {
        Some(arg) => request.query(&[("arg", arg)]),
        None => request,
    })
}

/// Response of `/api/v0/id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "AgentVersion", default)]
    pub agent_version: String,
    #[serde(rename = "Addresses", default)]
    pub addresses: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct IdRequest;

impl ApiRequest for IdRequest {
    type Response = Identity;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        rpc(base_url, client, "id", None)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PinsResponse {
    #[serde(rename = "Pins", default)]
    pub pins: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct PinAddRequest {
    pub path: String,
}

impl ApiRequest for PinAddRequest {
    type Response = PinsResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        Ok(rpc(base_url, client, "pin/add", Some(&self.path))?.timeout(PIN_ADD_TIMEOUT))
    }
}

#[derive(Debug, Clone)]
pub struct PinRmRequest {
    pub path: String,
}

impl ApiRequest for PinRmRequest {
    type Response = PinsResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        rpc(base_url, client, "pin/rm", Some(&self.path))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StringsResponse {
    #[serde(rename = "Strings", default)]
    pub strings: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct SwarmConnectRequest {
    pub address: String,
}

impl ApiRequest for SwarmConnectRequest {
    type Response = StringsResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        rpc(base_url, client, "swarm/connect", Some(&self.address))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeersResponse {
    #[serde(rename = "Peers", default)]
    pub peers: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct BootstrapAddRequest {
    pub address: String,
}

impl ApiRequest for BootstrapAddRequest {
    type Response = PeersResponse;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        rpc(base_url, client, "bootstrap/add", Some(&self.address))
    }
}

#[derive(Debug, Clone)]
pub struct PeeringAddRequest {
    pub address: String,
}

impl ApiRequest for PeeringAddRequest {
    type Response = serde_json::Value;

    fn build_request(self, base_url: &Url, client: &Client) -> Result<RequestBuilder, ApiError> {
        rpc(base_url, client, "swarm/peering/add", Some(&self.address))
    }
}

/// HTTP client for a Kubo node's RPC API (usually `http://127.0.0.1:5001`).
#[derive(Debug, Clone)]
pub struct KuboClient {
    pub remote: Url,
    client: Client,
}

impl KuboClient {
    pub fn new(remote: &Url) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            remote: remote.clone(),
            client,
        })
    }

    pub async fn call<T: ApiRequest>(&self, request: T) -> Result<T::Response, ApiError> {
        let request_builder = request.build_request(&self.remote, &self.client)?;
        let response = request_builder.send().await?;

        if response.status().is_success() {
            Ok(response.json::<T::Response>().await?)
        } else {
            let status = response.status();
            Err(ApiError::from_status(status, response.text().await?))
        }
    }
}

#[async_trait]
impl ControlApi for KuboClient {
    async fn identity_self(&self) -> Result<Identity, ApiError> {
        self.call(IdRequest).await
    }

    async fn pin_add(&self, path: &str) -> Result<(), ApiError> {
        let response = self
            .call(PinAddRequest {
                path: path.to_string(),
            })
            .await?;
        tracing::debug!(path, pins = ?response.pins, "pin/add");
        Ok(())
    }

    async fn pin_remove(&self, path: &str) -> Result<(), ApiError> {
        let response = self
            .call(PinRmRequest {
                path: path.to_string(),
            })
            .await?;
        tracing::debug!(path, pins = ?response.pins, "pin/rm");
        Ok(())
    }

    async fn swarm_connect(&self, address: &str) -> Result<(), ApiError> {
        let response = self
            .call(SwarmConnectRequest {
                address: address.to_string(),
            })
            .await?;
        tracing::debug!(address, result = ?response.strings, "swarm/connect");
        Ok(())
    }

    async fn bootstrap_add(&self, address: &str) -> Result<(), ApiError> {
        let response = self
            .call(BootstrapAddRequest {
                address: address.to_string(),
            })
            .await?;
        tracing::debug!(address, peers = ?response.peers, "bootstrap/add");
        Ok(())
    }

    async fn peering_add(&self, address: &str) -> Result<(), ApiError> {
        self.call(PeeringAddRequest {
            address: address.to_string(),
        })
        .await?;
        Ok(())
    }
}
