//! Compute provider configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Hetzner Cloud configuration derived from environment variables and
/// configuration files.
///
/// The prefix maps the credential onto the conventional `HCLOUD_TOKEN`
/// variable; its absence is a fatal error before any stage begins.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "HCLOUD")]
pub struct HcloudConfig {
    /// API token used for authentication. Defaults to empty so that loading
    /// succeeds without it; [`HcloudConfig::validate`] rejects the empty
    /// value with a message naming `HCLOUD_TOKEN`.
    #[ortho_config(default = String::new())]
    pub token: String,
    /// Commercial server type for new servers.
    #[ortho_config(default = "cx22".to_owned())]
    pub default_server_type: String,
    /// Location for new servers.
    #[ortho_config(default = "fsn1".to_owned())]
    pub default_location: String,
    /// Boot image for new servers.
    #[ortho_config(default = "ubuntu-24.04".to_owned())]
    pub default_image: String,
    /// Admin account created on provisioned hosts.
    #[ortho_config(default = "magicbox".to_owned())]
    pub default_admin_user: String,
}

impl HcloudConfig {
    fn require_field(value: &str, description: &str, env_var: &str) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {description}: set {env_var}"
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("provision")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Performs semantic validation on required fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(&self.token, "Hetzner Cloud API token", "HCLOUD_TOKEN")?;
        Self::require_field(
            &self.default_server_type,
            "server type",
            "HCLOUD_DEFAULT_SERVER_TYPE",
        )?;
        Self::require_field(
            &self.default_location,
            "location",
            "HCLOUD_DEFAULT_LOCATION",
        )?;
        Self::require_field(&self.default_image, "boot image", "HCLOUD_DEFAULT_IMAGE")?;
        Self::require_field(
            &self.default_admin_user,
            "admin user",
            "HCLOUD_DEFAULT_ADMIN_USER",
        )?;
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, HcloudConfig};

    fn config() -> HcloudConfig {
        HcloudConfig {
            token: String::from("secret"),
            default_server_type: String::from("cx22"),
            default_location: String::from("fsn1"),
            default_image: String::from("ubuntu-24.04"),
            default_admin_user: String::from("magicbox"),
        }
    }

    #[test]
    fn validates_complete_configuration() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn missing_token_names_the_env_var() {
        let mut cfg = config();
        cfg.token = String::from("  ");
        let err = cfg.validate().expect_err("token should be required");
        assert!(
            matches!(err, ConfigError::MissingField(ref message) if message.contains("HCLOUD_TOKEN")),
            "unexpected error: {err}"
        );
    }
}
