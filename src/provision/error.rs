//! Error taxonomy for the provisioning orchestration.

use std::fmt::{self, Display};
use std::net::IpAddr;

use thiserror::Error;

use crate::compute::ComputeResource;
use crate::remote::RemoteError;
use crate::request::RequestError;

use super::Stage;

/// Identity of a created server, echoed by post-creation failures so the
/// operator knows exactly what was left behind.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerIdentity {
    /// Provider-side server name.
    pub name: String,
    /// Provider server identifier.
    pub id: String,
    /// Public IPv4 address, once one was observed.
    pub public_ip: Option<IpAddr>,
}

impl ServerIdentity {
    /// Captures the identity of a server snapshot.
    #[must_use]
    pub fn new(resource: &ComputeResource) -> Self {
        Self {
            name: resource.name.clone(),
            id: resource.id.clone(),
            public_ip: resource.public_ip,
        }
    }
}

impl Display for ServerIdentity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "'{}' (id {}", self.name, self.id)?;
        if let Some(ip) = self.public_ip {
            write!(formatter, ", ip {ip}")?;
        }
        formatter.write_str(")")
    }
}

/// Errors surfaced while executing a provisioning run.
///
/// Every variant is fatal; the orchestrator never retries across stage
/// boundaries and performs no teardown of already-created resources. The
/// generic parameter is the compute API's error type, mirroring how the
/// orchestrator stays provider-agnostic.
#[derive(Debug, Error)]
pub enum ProvisionError<E>
where
    E: std::error::Error + 'static,
{
    /// The request failed validation; no external call was made.
    #[error("invalid provisioning request: {0}")]
    Validation(#[from] RequestError),
    /// The idempotency guard tripped: a server with this name exists.
    #[error("server '{name}' already exists; refusing to provision a duplicate")]
    AlreadyExists {
        /// Name that is already taken.
        name: String,
    },
    /// The named SSH key is not uploaded to the compute project.
    #[error("SSH key '{name}' not found in the compute project")]
    SshKeyNotFound {
        /// Key name passed by the caller.
        name: String,
    },
    /// The compute API returned an error for a single call.
    #[error("compute API call '{operation}' failed: {source}")]
    Api {
        /// Short name of the failed API operation.
        operation: &'static str,
        /// Stage the run was in when the call failed.
        stage: Stage,
        /// Provider-specific error.
        #[source]
        source: E,
    },
    /// The provider moved the server into its failed state during boot.
    #[error("server {id} entered the failed state during boot")]
    ServerFailed {
        /// Provider server identifier, reported for manual cleanup.
        id: String,
    },
    /// The server reported running but never exposed a public IPv4 address.
    #[error("server {id} is running but has no public IPv4 address")]
    MissingPublicIp {
        /// Provider server identifier, reported for manual cleanup.
        id: String,
    },
    /// A stage's poll loop exceeded its deadline.
    #[error("timed out waiting for {description} after {elapsed_secs}s")]
    Timeout {
        /// Stage the run was in when the deadline passed.
        stage: Stage,
        /// Description of the awaited condition.
        description: &'static str,
        /// Seconds spent polling before giving up.
        elapsed_secs: u64,
    },
    /// The host rejected the bootstrap identity's credentials. Retrying
    /// cannot help, and continuing would mask a real misconfiguration.
    #[error("SSH authentication rejected for {user}@{host}: {detail}")]
    AuthRejected {
        /// Identity the probe connected as.
        user: String,
        /// Host that rejected the connection.
        host: String,
        /// Stderr detail captured from the SSH client.
        detail: String,
    },
    /// The local remote-shell machinery failed (spawn or configuration).
    #[error("remote channel failure: {source}")]
    Remote {
        /// Stage the run was in when the channel failed.
        stage: Stage,
        /// Underlying channel error.
        #[source]
        source: RemoteError,
    },
    /// The deployment payload exited non-zero on the host.
    #[error("deployment script exited with status {status_text}: {stderr}")]
    Deploy {
        /// Exit status as reported by the remote command, if available.
        status: Option<i32>,
        /// Human readable representation of the exit status.
        status_text: String,
        /// Stderr captured from the deployment script.
        stderr: String,
    },
    /// A failure after the server was created. No rollback is performed, so
    /// the server's identity is echoed for manual cleanup.
    #[error("{source}; server {server} was created and is left in place for manual cleanup")]
    Abandoned {
        /// Identity of the server left behind.
        server: ServerIdentity,
        /// Underlying stage failure.
        ///
        /// The parentheses in the type keep thiserror from spotting the
        /// generic parameter and inferring a `Box<ProvisionError<E>>:
        /// Display + Error` bound, which is cyclic and makes the derived
        /// impls unusable outside this crate.
        #[source]
        #[expect(
            unused_parens,
            reason = "parens defeat thiserror's cyclic bound inference"
        )]
        source: Box<(ProvisionError<E>)>,
    },
}

impl<E> ProvisionError<E>
where
    E: std::error::Error + 'static,
{
    /// Stage the run failed in, for `Failed {stage, error}` style reporting.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::Validation(_) => Stage::Validated,
            Self::AlreadyExists { .. } | Self::SshKeyNotFound { .. } => Stage::ResourceAbsent,
            Self::ServerFailed { .. } | Self::MissingPublicIp { .. } => Stage::Created,
            Self::AuthRejected { .. } => Stage::GuestReady,
            Self::Deploy { .. } => Stage::Deployed,
            Self::Api { stage, .. } | Self::Timeout { stage, .. } | Self::Remote { stage, .. } => {
                *stage
            }
            Self::Abandoned { source, .. } => source.stage(),
        }
    }

    /// Wraps this error with the identity of the server the run created.
    #[must_use]
    pub fn abandoning(self, server: ServerIdentity) -> Self {
        Self::Abandoned {
            server,
            source: Box::new(self),
        }
    }
}
