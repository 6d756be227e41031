//! Sequential provisioning state machine.
//!
//! The orchestrator drives `Validated → ResourceAbsent → Created → NetworkUp
//! → GuestReady → Deployed → HealthVerified | HealthUnknown`, one stage at a
//! time. A stage only starts after the previous one succeeded; the first
//! fatal error short-circuits the run. Nothing already created is torn down
//! on failure; the error carries the resource identity so an operator can
//! clean up by hand.

use std::convert::Infallible;
use std::fmt::{self, Display};
use std::net::IpAddr;
use std::time::Duration;

use crate::compute::{ComputeApi, ComputeResource, ServerSpec, ServerStatus};
use crate::poll::{PollError, WaitPolicy, poll};
use crate::probe::{HealthProbe, tcp_port_open};
use crate::remote::{CommandRunner, RemoteCommandOutput, RemoteShell, deployment_script};
use crate::request::ProvisionRequest;

mod error;

pub use error::{ProvisionError, ServerIdentity};

/// Privileged identity installed by the provider at boot; used for guest
/// probes and deployment until the admin account exists.
pub const BOOTSTRAP_USER: &str = "root";

/// Marker written by cloud-init when the guest-side bootstrap has finished.
pub const GUEST_INIT_SENTINEL: &str = "/var/lib/cloud/instance/boot-finished";

const DEFAULT_SSH_PORT: u16 = 22;
const HEALTH_PATH: &str = "/health";
const SERVER_POLL_INTERVAL: Duration = Duration::from_secs(5);

const NETWORK_POLICY: WaitPolicy = WaitPolicy::new(
    Duration::from_secs(5),
    Duration::from_secs(300),
    "the SSH port to accept connections",
);
const GUEST_INIT_POLICY: WaitPolicy = WaitPolicy::new(
    Duration::from_secs(10),
    Duration::from_secs(600),
    "the guest bootstrap to finish",
);
const HEALTH_POLICY: WaitPolicy = WaitPolicy::new(
    Duration::from_secs(5),
    Duration::from_secs(150),
    "the service health endpoint to answer",
);

/// Named step of the provisioning state machine, in strict forward order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    /// Request and configuration checks passed.
    Validated,
    /// The idempotency pre-check confirmed no server with this name exists.
    ResourceAbsent,
    /// The provider accepted the creation request.
    Created,
    /// The SSH port on the new host accepts TCP connections.
    NetworkUp,
    /// The guest-side bootstrap wrote its completion sentinel.
    GuestReady,
    /// The deployment payload ran to completion.
    Deployed,
    /// The health endpoint confirmed the stack is serving.
    HealthVerified,
    /// Terminal state of a run whose health check never confirmed; reported
    /// as a degraded success.
    HealthUnknown,
}

impl Stage {
    /// Returns the stage name as it appears in reports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validated => "Validated",
            Self::ResourceAbsent => "ResourceAbsent",
            Self::Created => "Created",
            Self::NetworkUp => "NetworkUp",
            Self::GuestReady => "GuestReady",
            Self::Deployed => "Deployed",
            Self::HealthVerified => "HealthVerified",
            Self::HealthUnknown => "HealthUnknown",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Final result of a successful (possibly degraded) provisioning run.
///
/// Produced once by the orchestrator and consumed only by the reporter.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeploymentOutcome {
    /// Last snapshot of the provisioned server.
    pub server: ComputeResource,
    /// Public IPv4 address the stages connected to.
    pub public_ip: IpAddr,
    /// Admin account created on the host.
    pub admin_user: String,
    /// Ready-to-paste SSH invocation for the admin account.
    pub ssh_command: String,
    /// Whether the health endpoint confirmed within its deadline.
    pub healthy: bool,
    /// Furthest stage the run confirmed; `Deployed` for degraded runs.
    pub stage_reached: Stage,
}

/// Drives the provisioning stages against injected collaborators.
#[derive(Debug)]
pub struct ProvisionOrchestrator<C, R: CommandRunner, H> {
    compute: C,
    remote: RemoteShell<R>,
    health: H,
    ssh_port: u16,
    server_poll_interval: Duration,
    network_policy: WaitPolicy,
    guest_init_policy: WaitPolicy,
    health_policy: WaitPolicy,
}

impl<C, R, H> ProvisionOrchestrator<C, R, H>
where
    C: ComputeApi,
    R: CommandRunner,
    H: HealthProbe,
{
    /// Creates an orchestrator with the production polling cadence.
    #[must_use]
    pub const fn new(compute: C, remote: RemoteShell<R>, health: H) -> Self {
        Self {
            compute,
            remote,
            health,
            ssh_port: DEFAULT_SSH_PORT,
            server_poll_interval: SERVER_POLL_INTERVAL,
            network_policy: NETWORK_POLICY,
            guest_init_policy: GUEST_INIT_POLICY,
            health_policy: HEALTH_POLICY,
        }
    }

    /// Overrides the probed SSH port.
    ///
    /// This is primarily used by tests to point probes at local listeners.
    #[must_use]
    pub const fn with_ssh_port(mut self, port: u16) -> Self {
        self.ssh_port = port;
        self
    }

    /// Overrides the server status polling interval.
    #[must_use]
    pub const fn with_server_poll_interval(mut self, interval: Duration) -> Self {
        self.server_poll_interval = interval;
        self
    }

    /// Overrides the network readiness policy.
    #[must_use]
    pub const fn with_network_policy(mut self, policy: WaitPolicy) -> Self {
        self.network_policy = policy;
        self
    }

    /// Overrides the guest bootstrap policy.
    #[must_use]
    pub const fn with_guest_init_policy(mut self, policy: WaitPolicy) -> Self {
        self.guest_init_policy = policy;
        self
    }

    /// Overrides the health verification policy.
    #[must_use]
    pub const fn with_health_policy(mut self, policy: WaitPolicy) -> Self {
        self.health_policy = policy;
        self
    }

    /// Runs every stage in order and returns the final outcome.
    ///
    /// A failed health check does not fail the run: the outcome is returned
    /// with `healthy = false` and `stage_reached = Deployed` so callers can
    /// flag the degraded result.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError`] for the first fatal stage failure; earlier
    /// side effects (a created server, a partial deployment) are left in
    /// place.
    pub async fn execute(
        &self,
        request: &ProvisionRequest,
    ) -> Result<DeploymentOutcome, ProvisionError<C::Error>> {
        request.validate()?;
        let vm_name = request.vm_name();

        let exists = self
            .compute
            .server_exists(&vm_name)
            .await
            .map_err(|source| ProvisionError::Api {
                operation: "server lookup",
                stage: Stage::ResourceAbsent,
                source,
            })?;
        if exists {
            return Err(ProvisionError::AlreadyExists { name: vm_name });
        }

        let ssh_key = self
            .compute
            .resolve_ssh_key(&request.ssh_key_name)
            .await
            .map_err(|source| ProvisionError::Api {
                operation: "ssh key lookup",
                stage: Stage::ResourceAbsent,
                source,
            })?
            .ok_or_else(|| ProvisionError::SshKeyNotFound {
                name: request.ssh_key_name.clone(),
            })?;

        let spec = ServerSpec {
            name: vm_name,
            server_type: request.server_type.clone(),
            image: request.image.clone(),
            location: request.location.clone(),
            ssh_key,
        };
        let created = self
            .compute
            .create_server(&spec)
            .await
            .map_err(|source| ProvisionError::Api {
                operation: "server create",
                stage: Stage::Created,
                source,
            })?;

        // From here on the server exists and nothing rolls it back; every
        // failure carries its identity for manual cleanup.
        let created_identity = ServerIdentity::new(&created);
        let server = self
            .wait_for_running(&created.id, request.wait_timeout)
            .await
            .map_err(|err| err.abandoning(created_identity.clone()))?;
        let public_ip = server.public_ip.ok_or_else(|| {
            ProvisionError::MissingPublicIp {
                id: server.id.clone(),
            }
            .abandoning(created_identity)
        })?;

        let identity = ServerIdentity::new(&server);
        self.wait_for_network(public_ip)
            .await
            .map_err(|err| err.abandoning(identity.clone()))?;
        self.wait_for_guest_init(public_ip)
            .await
            .map_err(|err| err.abandoning(identity.clone()))?;
        self.deploy_stack(public_ip, &request.admin_user)
            .map_err(|err| err.abandoning(identity))?;
        let healthy = self.verify_health(public_ip).await;

        Ok(DeploymentOutcome {
            server,
            public_ip,
            admin_user: request.admin_user.clone(),
            ssh_command: format!("ssh {}@{public_ip}", request.admin_user),
            healthy,
            stage_reached: if healthy {
                Stage::HealthVerified
            } else {
                Stage::Deployed
            },
        })
    }

    async fn wait_for_running(
        &self,
        id: &str,
        wait_timeout: Duration,
    ) -> Result<ComputeResource, ProvisionError<C::Error>> {
        let policy = WaitPolicy::new(
            self.server_poll_interval,
            wait_timeout,
            "the server to report running",
        );
        poll(&policy, move || async move {
            let snapshot = self.fetch_status(id).await?;
            match snapshot.status {
                ServerStatus::Failed => Err(ProvisionError::ServerFailed { id: snapshot.id }),
                ServerStatus::Running => Ok(snapshot.public_ip.is_some()),
                ServerStatus::Pending => Ok(false),
            }
        })
        .await
        .map_err(|err| flatten(err, Stage::Created))?;

        self.fetch_status(id).await
    }

    async fn fetch_status(&self, id: &str) -> Result<ComputeResource, ProvisionError<C::Error>> {
        self.compute
            .server_status(id)
            .await
            .map_err(|source| ProvisionError::Api {
                operation: "server status",
                stage: Stage::Created,
                source,
            })
    }

    async fn wait_for_network(&self, ip: IpAddr) -> Result<(), ProvisionError<C::Error>> {
        let port = self.ssh_port;
        poll(&self.network_policy, move || async move {
            Ok::<_, ProvisionError<C::Error>>(tcp_port_open(ip, port).await)
        })
        .await
        .map_err(|err| flatten(err, Stage::NetworkUp))
    }

    async fn wait_for_guest_init(&self, ip: IpAddr) -> Result<(), ProvisionError<C::Error>> {
        let command = format!("test -f {GUEST_INIT_SENTINEL}");
        let probe = command.as_str();
        poll(&self.guest_init_policy, move || async move {
            self.probe_sentinel(ip, probe)
        })
        .await
        .map_err(|err| flatten(err, Stage::GuestReady))
    }

    /// Single guest-init probe attempt with the fatal-versus-transient
    /// classification: an absent sentinel and an unreachable channel both
    /// keep polling, while a rejected authentication aborts at once.
    fn probe_sentinel(
        &self,
        ip: IpAddr,
        command: &str,
    ) -> Result<bool, ProvisionError<C::Error>> {
        let output =
            self.remote
                .run(BOOTSTRAP_USER, ip, command)
                .map_err(|source| ProvisionError::Remote {
                    stage: Stage::GuestReady,
                    source,
                })?;

        match classify_sentinel_probe(&output) {
            SentinelProbe::Present => Ok(true),
            SentinelProbe::Absent | SentinelProbe::Unreachable => Ok(false),
            SentinelProbe::AuthRejected(detail) => Err(ProvisionError::AuthRejected {
                user: BOOTSTRAP_USER.to_owned(),
                host: ip.to_string(),
                detail,
            }),
        }
    }

    fn deploy_stack(
        &self,
        ip: IpAddr,
        admin_user: &str,
    ) -> Result<(), ProvisionError<C::Error>> {
        let script = deployment_script(admin_user);
        let output =
            self.remote
                .run(BOOTSTRAP_USER, ip, &script)
                .map_err(|source| ProvisionError::Remote {
                    stage: Stage::Deployed,
                    source,
                })?;

        if output.is_success() {
            return Ok(());
        }

        let status_text = output
            .exit_code
            .map_or_else(|| String::from("unknown"), |code| code.to_string());
        Err(ProvisionError::Deploy {
            status: output.exit_code,
            status_text,
            stderr: output.stderr.trim().to_owned(),
        })
    }

    async fn verify_health(&self, ip: IpAddr) -> bool {
        let endpoint = format!("http://{ip}{HEALTH_PATH}");
        let target = endpoint.as_str();
        poll(&self.health_policy, move || async move {
            Ok::<_, Infallible>(self.health.check(target).await)
        })
        .await
        .is_ok()
    }
}

/// Outcome of one guest-init probe attempt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum SentinelProbe {
    /// The sentinel file exists; guest bootstrap is done.
    Present,
    /// The command ran but the sentinel is not there yet.
    Absent,
    /// The channel could not be reached; worth retrying.
    Unreachable,
    /// The host rejected our credentials; retrying cannot help.
    AuthRejected(String),
}

/// Classifies a sentinel probe from the SSH client's exit status and stderr.
///
/// The SSH client reports its own transport failures as exit 255, which
/// covers both a not-yet-listening daemon and a rejected key; only the
/// stderr text tells them apart.
pub(crate) fn classify_sentinel_probe(output: &RemoteCommandOutput) -> SentinelProbe {
    match output.exit_code {
        Some(0) => SentinelProbe::Present,
        Some(255) | None => {
            let stderr = output.stderr.trim();
            let lowered = stderr.to_lowercase();
            if lowered.contains("permission denied") || lowered.contains("authentication") {
                SentinelProbe::AuthRejected(stderr.to_owned())
            } else {
                SentinelProbe::Unreachable
            }
        }
        Some(_) => SentinelProbe::Absent,
    }
}

fn flatten<E>(err: PollError<ProvisionError<E>>, stage: Stage) -> ProvisionError<E>
where
    E: std::error::Error + 'static,
{
    match err {
        PollError::Fatal(inner) => inner,
        PollError::Timeout {
            description,
            elapsed,
        } => ProvisionError::Timeout {
            stage,
            description,
            elapsed_secs: elapsed.as_secs(),
        },
    }
}
