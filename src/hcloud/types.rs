//! Wire payloads for the Hetzner Cloud Instances API.

use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::compute::{ComputeResource, ServerStatus};

#[derive(Debug, Deserialize)]
pub(crate) struct ServerEnvelope {
    pub(crate) server: Server,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerListEnvelope {
    pub(crate) servers: Vec<Server>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SshKeyListEnvelope {
    pub(crate) ssh_keys: Vec<SshKey>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Server {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) public_net: PublicNet,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PublicNet {
    pub(crate) ipv4: Option<Ipv4Info>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Ipv4Info {
    pub(crate) ip: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SshKey {
    pub(crate) id: u64,
    pub(crate) name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateServerRequest {
    pub(crate) name: String,
    pub(crate) server_type: String,
    pub(crate) image: String,
    pub(crate) location: String,
    pub(crate) ssh_keys: Vec<u64>,
    pub(crate) labels: Labels,
}

#[derive(Debug, Serialize)]
pub(crate) struct Labels {
    #[serde(rename = "managed-by")]
    pub(crate) managed_by: &'static str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorEnvelope {
    pub(crate) error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub(crate) code: String,
    pub(crate) message: String,
}

impl From<Server> for ComputeResource {
    fn from(value: Server) -> Self {
        let public_ip = value
            .public_net
            .ipv4
            .as_ref()
            .and_then(|info| IpAddr::from_str(&info.ip).ok());
        Self {
            id: value.id.to_string(),
            name: value.name,
            status: ServerStatus::from_provider(&value.status),
            public_ip,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;
    use std::str::FromStr;

    use super::{Server, ServerEnvelope};
    use crate::compute::{ComputeResource, ServerStatus};

    const SERVER_JSON: &str = r#"{
        "server": {
            "id": 42,
            "name": "magicbox-acme",
            "status": "running",
            "public_net": { "ipv4": { "ip": "203.0.113.5" } }
        }
    }"#;

    #[test]
    fn decodes_server_envelope_into_resource() {
        let envelope: ServerEnvelope =
            serde_json::from_str(SERVER_JSON).expect("envelope should decode");
        let resource = ComputeResource::from(envelope.server);

        assert_eq!(resource.id, "42");
        assert_eq!(resource.name, "magicbox-acme");
        assert_eq!(resource.status, ServerStatus::Running);
        assert_eq!(
            resource.public_ip,
            Some(IpAddr::from_str("203.0.113.5").expect("fixture ip"))
        );
    }

    #[test]
    fn tolerates_missing_public_net() {
        let server: Server = serde_json::from_str(
            r#"{"id": 7, "name": "magicbox-n", "status": "initializing"}"#,
        )
        .expect("server should decode");
        let resource = ComputeResource::from(server);

        assert_eq!(resource.status, ServerStatus::Pending);
        assert_eq!(resource.public_ip, None);
    }
}
