//! Hetzner Cloud implementation of the compute provider interface.
//!
//! The client speaks to the Instances API directly over `reqwest`; each
//! operation is one request/response exchange with bearer-token
//! authentication and a typed error envelope decode on failure.

mod error;
mod types;

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::compute::{ComputeApi, ComputeFuture, ComputeResource, ServerSpec, SshKeyId};
use types::{
    ApiErrorEnvelope, CreateServerRequest, Labels, ServerEnvelope, ServerListEnvelope,
    SshKeyListEnvelope,
};

pub use error::HcloudError;

const HCLOUD_API_BASE: &str = "https://api.hetzner.cloud/v1";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Client for the Hetzner Cloud Instances API.
#[derive(Clone, Debug)]
pub struct HcloudApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HcloudApi {
    /// Constructs a client using the given API token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: String::from(HCLOUD_API_BASE),
            token: token.into(),
        }
    }

    async fn decode_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, HcloudError> {
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return serde_json::from_slice(&body)
                .map_err(|err| HcloudError::Decode(err.to_string()));
        }

        if let Ok(envelope) = serde_json::from_slice::<ApiErrorEnvelope>(&body) {
            return Err(HcloudError::Api {
                code: envelope.error.code,
                message: envelope.error.message,
            });
        }

        Err(HcloudError::Http(format!(
            "status {status}: {}",
            String::from_utf8_lossy(&body)
        )))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, HcloudError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;
        Self::decode_response(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        payload: &impl Serialize,
    ) -> Result<T, HcloudError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;
        Self::decode_response(response).await
    }
}

impl ComputeApi for HcloudApi {
    type Error = HcloudError;

    fn server_exists<'a>(&'a self, name: &'a str) -> ComputeFuture<'a, bool, Self::Error> {
        Box::pin(async move {
            let listing: ServerListEnvelope =
                self.get_json("/servers", &[("name", name)]).await?;
            Ok(listing.servers.iter().any(|server| server.name == name))
        })
    }

    fn resolve_ssh_key<'a>(
        &'a self,
        name: &'a str,
    ) -> ComputeFuture<'a, Option<SshKeyId>, Self::Error> {
        Box::pin(async move {
            let listing: SshKeyListEnvelope =
                self.get_json("/ssh_keys", &[("name", name)]).await?;
            Ok(listing
                .ssh_keys
                .into_iter()
                .find(|key| key.name == name)
                .map(|key| SshKeyId(key.id)))
        })
    }

    fn create_server<'a>(
        &'a self,
        spec: &'a ServerSpec,
    ) -> ComputeFuture<'a, ComputeResource, Self::Error> {
        Box::pin(async move {
            let payload = CreateServerRequest {
                name: spec.name.clone(),
                server_type: spec.server_type.clone(),
                image: spec.image.clone(),
                location: spec.location.clone(),
                ssh_keys: vec![spec.ssh_key.0],
                labels: Labels {
                    managed_by: "magicbox",
                },
            };
            let envelope: ServerEnvelope = self.post_json("/servers", &payload).await?;
            Ok(ComputeResource::from(envelope.server))
        })
    }

    fn server_status<'a>(
        &'a self,
        id: &'a str,
    ) -> ComputeFuture<'a, ComputeResource, Self::Error> {
        Box::pin(async move {
            let envelope: ServerEnvelope = self.get_json(&format!("/servers/{id}"), &[]).await?;
            Ok(ComputeResource::from(envelope.server))
        })
    }
}
