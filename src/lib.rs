//! Core library for the MagicBox provisioning tool.
//!
//! The crate exposes a compute provider abstraction, a Hetzner Cloud
//! implementation, and the orchestrator that drives a customer server from
//! creation through gated readiness checks to a deployed, health-verified
//! application stack.

pub mod compute;
pub mod config;
pub mod hcloud;
pub mod poll;
pub mod probe;
pub mod provision;
pub mod remote;
pub mod report;
pub mod request;

pub use compute::{ComputeApi, ComputeResource, ServerSpec, ServerStatus, SshKeyId};
pub use config::{ConfigError, HcloudConfig};
pub use hcloud::{HcloudApi, HcloudError};
pub use poll::{PollError, WaitPolicy, poll};
pub use probe::{HealthProbe, HttpHealthProbe, tcp_port_open};
pub use provision::{
    BOOTSTRAP_USER, DeploymentOutcome, GUEST_INIT_SENTINEL, ProvisionError,
    ProvisionOrchestrator, ServerIdentity, Stage,
};
pub use remote::{
    CommandOutput, CommandRunner, ProcessCommandRunner, RemoteCommandOutput, RemoteConfig,
    RemoteError, RemoteShell, STACK_DIR, deployment_script,
};
pub use report::{ErrorReport, OutputFormat, SuccessReport, render_error, render_success};
pub use request::{
    ProvisionRequest, ProvisionRequestBuilder, RequestError, VM_NAME_PREFIX,
};
