//! Binary entry point for the MagicBox provisioning CLI.

use std::io::{self, Write};
use std::process;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use magicbox_provision::{
    HcloudApi, HcloudConfig, HcloudError, HttpHealthProbe, OutputFormat, ProvisionError,
    ProvisionOrchestrator, ProvisionRequest, RemoteConfig, RemoteShell, RequestError,
    render_error, render_success,
};

mod cli;

use cli::{Cli, OutputFormatArg};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid provisioning request: {0}")]
    Request(#[from] RequestError),
    #[error("remote shell error: {0}")]
    Remote(String),
    #[error("{0}")]
    Provision(#[from] ProvisionError<HcloudError>),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = output_format(cli.output);
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(format, &err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    let config =
        HcloudConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;

    let request = build_request(&cli, &config)?;

    if cli.dry_run {
        print_plan(&request);
        return Ok(0);
    }

    let remote_config =
        RemoteConfig::load_without_cli_args().map_err(|err| CliError::Remote(err.to_string()))?;
    let shell = RemoteShell::with_process_runner(remote_config)
        .map_err(|err| CliError::Remote(err.to_string()))?;
    let compute = HcloudApi::new(config.token.clone());
    let orchestrator = ProvisionOrchestrator::new(compute, shell, HttpHealthProbe::new());

    let outcome = orchestrator.execute(&request).await?;

    let rendered = render_success(request.output, &request, &outcome);
    let mut stdout = io::stdout();
    write!(stdout, "{rendered}").ok();
    if !rendered.ends_with('\n') {
        writeln!(stdout).ok();
    }
    Ok(0)
}

fn build_request(cli: &Cli, config: &HcloudConfig) -> Result<ProvisionRequest, CliError> {
    let request = ProvisionRequest::builder()
        .customer_name(cli.customer.clone())
        .ssh_key_name(cli.ssh_key.clone())
        .server_type(
            cli.size
                .clone()
                .unwrap_or_else(|| config.default_server_type.clone()),
        )
        .location(
            cli.location
                .clone()
                .unwrap_or_else(|| config.default_location.clone()),
        )
        .image(
            cli.image
                .clone()
                .unwrap_or_else(|| config.default_image.clone()),
        )
        .admin_user(
            cli.admin_user
                .clone()
                .unwrap_or_else(|| config.default_admin_user.clone()),
        )
        .wait_timeout(Duration::from_secs(cli.timeout))
        .output(output_format(cli.output))
        .build()?;
    Ok(request)
}

const fn output_format(arg: OutputFormatArg) -> OutputFormat {
    match arg {
        OutputFormatArg::Text => OutputFormat::Text,
        OutputFormatArg::Json => OutputFormat::Json,
    }
}

/// Dry runs always print the human-readable plan; there is nothing for a
/// script to consume because nothing was created.
fn print_plan(request: &ProvisionRequest) {
    let mut stdout = io::stdout();
    writeln!(stdout, "Dry run; no resources will be created.").ok();
    writeln!(stdout, "  server name: {}", request.vm_name()).ok();
    writeln!(stdout, "  server type: {}", request.server_type).ok();
    writeln!(stdout, "  location:    {}", request.location).ok();
    writeln!(stdout, "  image:       {}", request.image).ok();
    writeln!(stdout, "  ssh key:     {}", request.ssh_key_name).ok();
    writeln!(stdout, "  admin user:  {}", request.admin_user).ok();
}

fn report_error(format: OutputFormat, err: &CliError) {
    let rendered = render_error(format, &err.to_string());
    match format {
        OutputFormat::Text => {
            writeln!(io::stderr(), "{rendered}").ok();
        }
        OutputFormat::Json => {
            writeln!(io::stdout(), "{rendered}").ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_config() -> HcloudConfig {
        HcloudConfig {
            token: String::from("secret"),
            default_server_type: String::from("cx22"),
            default_location: String::from("fsn1"),
            default_image: String::from("ubuntu-24.04"),
            default_admin_user: String::from("magicbox"),
        }
    }

    fn fixture_cli() -> Cli {
        Cli::parse_from(["provision", "--customer", "acme", "--ssh-key", "ops-key"])
    }

    #[test]
    fn request_falls_back_to_configured_defaults() {
        let request =
            build_request(&fixture_cli(), &fixture_config()).expect("request should build");

        assert_eq!(request.vm_name(), "magicbox-acme");
        assert_eq!(request.server_type, "cx22");
        assert_eq!(request.location, "fsn1");
        assert_eq!(request.image, "ubuntu-24.04");
        assert_eq!(request.admin_user, "magicbox");
        assert_eq!(request.wait_timeout, Duration::from_secs(300));
    }

    #[test]
    fn cli_overrides_beat_configured_defaults() {
        let cli = Cli::parse_from([
            "provision",
            "--customer",
            "acme",
            "--ssh-key",
            "ops-key",
            "--size",
            "cx32",
            "--location",
            "nbg1",
            "--timeout",
            "60",
        ]);
        let request = build_request(&cli, &fixture_config()).expect("request should build");

        assert_eq!(request.server_type, "cx32");
        assert_eq!(request.location, "nbg1");
        assert_eq!(request.wait_timeout, Duration::from_secs(60));
    }

    #[test]
    fn invalid_customer_is_rejected_at_build_time() {
        let cli = Cli::parse_from(["provision", "--customer", "acme corp", "--ssh-key", "k"]);
        let err = build_request(&cli, &fixture_config()).expect_err("unsafe name must fail");

        assert!(matches!(err, CliError::Request(_)));
    }
}
