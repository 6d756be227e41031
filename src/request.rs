//! Immutable provisioning request and its validation rules.

use std::time::Duration;

use thiserror::Error;

use crate::report::OutputFormat;

/// Prefix used to derive server names from customer names.
pub const VM_NAME_PREFIX: &str = "magicbox";

/// Validated inputs for one provisioning run.
///
/// Built once through [`ProvisionRequestBuilder`] and passed by reference
/// through every stage; no stage mutates it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProvisionRequest {
    /// Customer identifier; constrained to `[A-Za-z0-9-]+` because it feeds
    /// directly into the provider-side server name.
    pub customer_name: String,
    /// Name of the SSH key already uploaded to the compute project.
    pub ssh_key_name: String,
    /// Commercial server type to request.
    pub server_type: String,
    /// Provider location for the new server.
    pub location: String,
    /// Boot image for the new server.
    pub image: String,
    /// Unix account created on the host for day-to-day administration.
    pub admin_user: String,
    /// Deadline for the server to report running after creation.
    pub wait_timeout: Duration,
    /// Requested result rendering.
    pub output: OutputFormat,
}

impl ProvisionRequest {
    /// Starts a builder for a [`ProvisionRequest`].
    #[must_use]
    pub fn builder() -> ProvisionRequestBuilder {
        ProvisionRequestBuilder::new()
    }

    /// Derives the provider-side server name for this request.
    #[must_use]
    pub fn vm_name(&self) -> String {
        format!("{VM_NAME_PREFIX}-{}", self.customer_name)
    }

    /// Checks every field against the rules in [`RequestError`].
    ///
    /// # Errors
    ///
    /// Returns the first rule violation found.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.customer_name.is_empty() || !is_safe_identifier(&self.customer_name) {
            return Err(RequestError::InvalidCustomerName {
                name: self.customer_name.clone(),
            });
        }
        if self.admin_user.is_empty() || !is_safe_username(&self.admin_user) {
            return Err(RequestError::InvalidAdminUser {
                name: self.admin_user.clone(),
            });
        }
        for (value, field) in [
            (&self.ssh_key_name, "ssh_key_name"),
            (&self.server_type, "server_type"),
            (&self.location, "location"),
            (&self.image, "image"),
        ] {
            if value.is_empty() {
                return Err(RequestError::MissingField(field));
            }
        }
        if self.wait_timeout.is_zero() {
            return Err(RequestError::ZeroTimeout);
        }
        Ok(())
    }
}

/// True when every character is ASCII alphanumeric or `-`.
fn is_safe_identifier(value: &str) -> bool {
    value
        .chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '-')
}

/// True for names `useradd` accepts without surprises: a lowercase letter or
/// underscore followed by lowercase letters, digits, `_`, or `-`.
fn is_safe_username(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_lowercase() || first == '_')
        && chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-')
}

/// Builder for [`ProvisionRequest`] that defers trimming and validation to
/// construction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProvisionRequestBuilder {
    customer_name: String,
    ssh_key_name: String,
    server_type: String,
    location: String,
    image: String,
    admin_user: String,
    wait_timeout: Duration,
    output: OutputFormat,
}

impl ProvisionRequestBuilder {
    /// Creates an empty builder; fields must be populated before build.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the customer identifier.
    #[must_use]
    pub fn customer_name(mut self, value: impl Into<String>) -> Self {
        self.customer_name = value.into();
        self
    }

    /// Sets the SSH key name.
    #[must_use]
    pub fn ssh_key_name(mut self, value: impl Into<String>) -> Self {
        self.ssh_key_name = value.into();
        self
    }

    /// Sets the server type.
    #[must_use]
    pub fn server_type(mut self, value: impl Into<String>) -> Self {
        self.server_type = value.into();
        self
    }

    /// Sets the provider location.
    #[must_use]
    pub fn location(mut self, value: impl Into<String>) -> Self {
        self.location = value.into();
        self
    }

    /// Sets the boot image.
    #[must_use]
    pub fn image(mut self, value: impl Into<String>) -> Self {
        self.image = value.into();
        self
    }

    /// Sets the admin account name.
    #[must_use]
    pub fn admin_user(mut self, value: impl Into<String>) -> Self {
        self.admin_user = value.into();
        self
    }

    /// Sets the running-state wait deadline.
    #[must_use]
    pub const fn wait_timeout(mut self, value: Duration) -> Self {
        self.wait_timeout = value;
        self
    }

    /// Sets the result rendering format.
    #[must_use]
    pub const fn output(mut self, value: OutputFormat) -> Self {
        self.output = value;
        self
    }

    /// Builds and validates the [`ProvisionRequest`], trimming string inputs.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] when any field violates its rule.
    pub fn build(self) -> Result<ProvisionRequest, RequestError> {
        let request = ProvisionRequest {
            customer_name: self.customer_name.trim().to_owned(),
            ssh_key_name: self.ssh_key_name.trim().to_owned(),
            server_type: self.server_type.trim().to_owned(),
            location: self.location.trim().to_owned(),
            image: self.image.trim().to_owned(),
            admin_user: self.admin_user.trim().to_owned(),
            wait_timeout: self.wait_timeout,
            output: self.output,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Rule violations detected while building or validating a request.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// The customer name is empty or contains characters outside
    /// `[A-Za-z0-9-]`.
    #[error("customer name '{name}' must be non-empty and contain only letters, digits, or '-'")]
    InvalidCustomerName {
        /// Offending value as supplied.
        name: String,
    },
    /// The admin account name is not a safe Unix username.
    #[error("admin user '{name}' is not a valid Unix account name")]
    InvalidAdminUser {
        /// Offending value as supplied.
        name: String,
    },
    /// A required field is empty after trimming.
    #[error("missing or empty field: {0}")]
    MissingField(&'static str),
    /// The wait timeout is zero.
    #[error("wait timeout must be greater than zero")]
    ZeroTimeout,
}
