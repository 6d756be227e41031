//! Behavioural smoke tests for the CLI entrypoint.
//!
//! Everything here stays on the near side of the compute API: dry runs and
//! argument errors never open a network connection, so the tests can run
//! anywhere.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;

#[test]
fn help_lists_the_provisioning_flags() {
    let mut cmd = cargo_bin_cmd!("provision");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(contains("--customer"))
        .stdout(contains("--ssh-key"))
        .stdout(contains("--dry-run"))
        .stdout(contains("--output"));
}

#[test]
fn missing_required_arguments_fail_with_usage() {
    let mut cmd = cargo_bin_cmd!("provision");
    cmd.env("HCLOUD_TOKEN", "test-token");
    cmd.args(["--customer", "acme"]);

    cmd.assert().failure().stderr(contains("--ssh-key"));
}

#[test]
fn dry_run_prints_the_plan_and_creates_nothing() {
    let mut cmd = cargo_bin_cmd!("provision");
    cmd.env("HCLOUD_TOKEN", "test-token");
    cmd.args(["--customer", "acme", "--ssh-key", "ops-key", "--dry-run"]);

    cmd.assert()
        .success()
        .stdout(contains("Dry run"))
        .stdout(contains("magicbox-acme"));
}

#[test]
fn invalid_customer_name_fails_on_stderr_in_text_mode() {
    let mut cmd = cargo_bin_cmd!("provision");
    cmd.env("HCLOUD_TOKEN", "test-token");
    cmd.args(["--customer", "acme corp", "--ssh-key", "ops-key", "--dry-run"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("customer name"));
}

#[test]
fn invalid_customer_name_reports_json_error_on_stdout() {
    let mut cmd = cargo_bin_cmd!("provision");
    cmd.env("HCLOUD_TOKEN", "test-token");
    cmd.args([
        "--customer",
        "acme corp",
        "--ssh-key",
        "ops-key",
        "--dry-run",
        "--output",
        "json",
    ]);

    cmd.assert()
        .failure()
        .code(1)
        .stdout(contains("\"status\":\"error\""));
}

#[test]
fn missing_token_names_the_environment_variable() {
    let mut cmd = cargo_bin_cmd!("provision");
    cmd.env_remove("HCLOUD_TOKEN");
    cmd.args(["--customer", "acme", "--ssh-key", "ops-key", "--dry-run"]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("HCLOUD_TOKEN"));
}
