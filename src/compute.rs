//! Compute provider abstraction for provisioning customer servers.

use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;

/// Lifecycle state of a compute resource, collapsed to the three states the
/// orchestrator cares about.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServerStatus {
    /// The provider is still bringing the server up.
    Pending,
    /// The server is booted and reachable from the provider's point of view.
    Running,
    /// The provider reported an unrecoverable boot failure.
    Failed,
}

impl ServerStatus {
    /// Maps a provider status string onto the orchestrator's states.
    ///
    /// Anything that is neither `running` nor `error` counts as pending;
    /// providers report a variety of transitional states during boot.
    #[must_use]
    pub fn from_provider(status: &str) -> Self {
        match status {
            "running" => Self::Running,
            "error" => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Returns the lowercase state name for display.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Failed => "failed",
        }
    }
}

/// Provider-side identifier of an uploaded SSH public key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SshKeyId(pub u64);

/// Snapshot of a compute resource as reported by the provider.
///
/// `status` and `public_ip` are refreshed by polling and never mutated
/// locally.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ComputeResource {
    /// Provider-specific identifier for the server.
    pub id: String,
    /// Server name derived from the customer name.
    pub name: String,
    /// Lifecycle state at the time of the snapshot.
    pub status: ServerStatus,
    /// Public IPv4 address once the provider has assigned one.
    pub public_ip: Option<IpAddr>,
}

/// Parameters for a single server creation call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerSpec {
    /// Name for the new server; must be unique within the project.
    pub name: String,
    /// Commercial server type (for example `cx22`).
    pub server_type: String,
    /// Boot image name or identifier (for example `ubuntu-24.04`).
    pub image: String,
    /// Provider location (for example `fsn1`).
    pub location: String,
    /// SSH key installed for the bootstrap identity.
    pub ssh_key: SshKeyId,
}

/// Future returned by compute API operations.
pub type ComputeFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Minimal interface the orchestrator needs from a compute provider.
///
/// Every operation is a single request/response exchange; retry and backoff
/// live in the polling layer, never here.
pub trait ComputeApi {
    /// Provider specific error type returned by the API client.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reports whether a server with the given name already exists.
    fn server_exists<'a>(&'a self, name: &'a str) -> ComputeFuture<'a, bool, Self::Error>;

    /// Looks up an uploaded SSH key by name.
    fn resolve_ssh_key<'a>(
        &'a self,
        name: &'a str,
    ) -> ComputeFuture<'a, Option<SshKeyId>, Self::Error>;

    /// Creates a server. Returns as soon as the provider accepts the request;
    /// the server is usually still booting.
    fn create_server<'a>(
        &'a self,
        spec: &'a ServerSpec,
    ) -> ComputeFuture<'a, ComputeResource, Self::Error>;

    /// Fetches a fresh snapshot of a server by identifier.
    fn server_status<'a>(
        &'a self,
        id: &'a str,
    ) -> ComputeFuture<'a, ComputeResource, Self::Error>;
}
