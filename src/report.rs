//! Result assembly and rendering in human or machine-readable form.
//!
//! Scripted callers parse the JSON shape and never human prose, so the JSON
//! field set is fixed: `status`, `vm_name`, `vm_id`, `ip`, `ssh_user`,
//! `ssh_command`, `size`, `location`, and `next_steps`. Errors use
//! `{"status": "error", "message": ...}`.

use std::fmt::Write as _;

use serde::Serialize;

use crate::provision::DeploymentOutcome;
use crate::remote::STACK_DIR;
use crate::request::ProvisionRequest;

/// Requested rendering of the final result.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OutputFormat {
    /// Human-readable summary on stdout, one-line errors on stderr.
    #[default]
    Text,
    /// Machine-readable JSON on stdout for both success and error.
    Json,
}

/// Machine-readable shape of a successful (possibly degraded) run.
#[derive(Debug, Serialize)]
pub struct SuccessReport {
    /// Always `success`; degraded health is signalled via `next_steps`.
    pub status: &'static str,
    /// Provider-side server name.
    pub vm_name: String,
    /// Provider-side server identifier.
    pub vm_id: String,
    /// Public IPv4 address of the server.
    pub ip: String,
    /// Admin account to connect as.
    pub ssh_user: String,
    /// Ready-to-paste SSH invocation.
    pub ssh_command: String,
    /// Commercial server type that was provisioned.
    pub size: String,
    /// Provider location of the server.
    pub location: String,
    /// Suggested follow-up actions for the operator.
    pub next_steps: Vec<String>,
}

impl SuccessReport {
    /// Assembles the report from the request and the orchestrator's outcome.
    #[must_use]
    pub fn new(request: &ProvisionRequest, outcome: &DeploymentOutcome) -> Self {
        let mut next_steps = vec![
            format!("Connect with: {}", outcome.ssh_command),
            format!("Inspect the stack: docker compose -f {STACK_DIR}/docker-compose.yml ps"),
        ];
        if !outcome.healthy {
            next_steps.push(format!(
                "Health check did not pass within the timeout; verify the stack manually at http://{}/health",
                outcome.public_ip
            ));
        }

        Self {
            status: "success",
            vm_name: outcome.server.name.clone(),
            vm_id: outcome.server.id.clone(),
            ip: outcome.public_ip.to_string(),
            ssh_user: outcome.admin_user.clone(),
            ssh_command: outcome.ssh_command.clone(),
            size: request.server_type.clone(),
            location: request.location.clone(),
            next_steps,
        }
    }
}

/// Machine-readable shape of a failed run.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    /// Always `error`.
    pub status: &'static str,
    /// Single-line description of the failure.
    pub message: String,
}

impl ErrorReport {
    /// Wraps a failure message in the machine-readable error shape.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
        }
    }
}

/// Renders the final result in the requested format.
#[must_use]
pub fn render_success(
    format: OutputFormat,
    request: &ProvisionRequest,
    outcome: &DeploymentOutcome,
) -> String {
    let report = SuccessReport::new(request, outcome);
    match format {
        OutputFormat::Text => render_success_text(outcome, &report),
        OutputFormat::Json => to_json(&report),
    }
}

/// Renders a failure message in the requested format.
///
/// In text mode this is the bare message (the caller routes it to stderr);
/// in JSON mode it is the error shape for stdout.
#[must_use]
pub fn render_error(format: OutputFormat, message: &str) -> String {
    match format {
        OutputFormat::Text => message.to_owned(),
        OutputFormat::Json => to_json(&ErrorReport::new(message)),
    }
}

fn render_success_text(outcome: &DeploymentOutcome, report: &SuccessReport) -> String {
    let mut text = String::new();
    writeln!(
        text,
        "Provisioned {} (id {}) at {}",
        report.vm_name, report.vm_id, report.ip
    )
    .ok();
    writeln!(text, "  size {}, location {}", report.size, report.location).ok();
    writeln!(text, "  stage reached: {}", outcome.stage_reached).ok();
    if !outcome.healthy {
        writeln!(
            text,
            "Warning: the stack did not confirm healthy before the timeout."
        )
        .ok();
    }
    writeln!(text, "Next steps:").ok();
    for step in &report.next_steps {
        writeln!(text, "  - {step}").ok();
    }
    text
}

fn to_json(value: &impl Serialize) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|err| format!("{{\"status\":\"error\",\"message\":\"{err}\"}}"))
}

#[cfg(test)]
mod tests {
    use std::net::IpAddr;
    use std::str::FromStr;
    use std::time::Duration;

    use serde_json::json;

    use super::{OutputFormat, SuccessReport, render_error, render_success};
    use crate::compute::{ComputeResource, ServerStatus};
    use crate::provision::{DeploymentOutcome, Stage};
    use crate::request::ProvisionRequest;

    fn request() -> ProvisionRequest {
        ProvisionRequest::builder()
            .customer_name("acme")
            .ssh_key_name("ops-key")
            .server_type("cx22")
            .location("fsn1")
            .image("ubuntu-24.04")
            .admin_user("magicbox")
            .wait_timeout(Duration::from_secs(300))
            .output(OutputFormat::Json)
            .build()
            .expect("fixture request")
    }

    fn outcome(healthy: bool) -> DeploymentOutcome {
        let ip = IpAddr::from_str("203.0.113.5").expect("fixture ip");
        DeploymentOutcome {
            server: ComputeResource {
                id: String::from("42"),
                name: String::from("magicbox-acme"),
                status: ServerStatus::Running,
                public_ip: Some(ip),
            },
            public_ip: ip,
            admin_user: String::from("magicbox"),
            ssh_command: String::from("ssh magicbox@203.0.113.5"),
            healthy,
            stage_reached: if healthy {
                Stage::HealthVerified
            } else {
                Stage::Deployed
            },
        }
    }

    #[test]
    fn json_success_matches_schema_exactly() {
        let rendered = render_success(OutputFormat::Json, &request(), &outcome(true));
        let value: serde_json::Value =
            serde_json::from_str(&rendered).expect("report should be valid JSON");

        assert_eq!(
            value,
            json!({
                "status": "success",
                "vm_name": "magicbox-acme",
                "vm_id": "42",
                "ip": "203.0.113.5",
                "ssh_user": "magicbox",
                "ssh_command": "ssh magicbox@203.0.113.5",
                "size": "cx22",
                "location": "fsn1",
                "next_steps": [
                    "Connect with: ssh magicbox@203.0.113.5",
                    "Inspect the stack: docker compose -f /opt/magicbox/docker-compose.yml ps",
                ],
            })
        );
    }

    #[test]
    fn degraded_outcome_stays_success_with_note() {
        let report = SuccessReport::new(&request(), &outcome(false));

        assert_eq!(report.status, "success");
        assert!(
            report
                .next_steps
                .iter()
                .any(|step| step.contains("Health check did not pass")),
            "missing degraded note: {:?}",
            report.next_steps
        );
    }

    #[test]
    fn degraded_text_mentions_stage_and_warning() {
        let rendered = render_success(OutputFormat::Text, &request(), &outcome(false));

        assert!(rendered.contains("stage reached: Deployed"));
        assert!(rendered.contains("Warning:"));
    }

    #[test]
    fn json_error_shape() {
        let rendered = render_error(OutputFormat::Json, "server 'magicbox-acme' already exists");
        let value: serde_json::Value =
            serde_json::from_str(&rendered).expect("error should be valid JSON");

        assert_eq!(
            value,
            json!({
                "status": "error",
                "message": "server 'magicbox-acme' already exists",
            })
        );
    }

    #[test]
    fn text_error_is_bare_message() {
        assert_eq!(render_error(OutputFormat::Text, "boom"), "boom");
    }
}
