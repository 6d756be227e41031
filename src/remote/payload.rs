//! Deployment payload builder for the MagicBox stack.
//!
//! The payload is a single shell script executed on the host as the
//! bootstrap identity. It creates the admin account, grants passwordless
//! sudo, propagates the bootstrap authorized keys, materialises the stack
//! files under the workspace directory, and starts the stack. The only
//! parameter is the admin user name, shell-escaped at the one interpolation
//! point.

use shell_escape::unix::escape;

/// Workspace directory created on the host for the stack files.
pub const STACK_DIR: &str = "/opt/magicbox";

const SCRIPT_BODY: &str = r#"export DEBIAN_FRONTEND=noninteractive

if ! id "$ADMIN" >/dev/null 2>&1; then
    useradd --create-home --shell /bin/bash "$ADMIN"
fi
usermod -aG sudo "$ADMIN"
if getent group docker >/dev/null 2>&1; then
    usermod -aG docker "$ADMIN"
fi

printf '%s ALL=(ALL) NOPASSWD:ALL\n' "$ADMIN" > /etc/sudoers.d/90-magicbox-admin
chmod 0440 /etc/sudoers.d/90-magicbox-admin

install -d -m 700 -o "$ADMIN" -g "$ADMIN" "/home/$ADMIN/.ssh"
cp /root/.ssh/authorized_keys "/home/$ADMIN/.ssh/authorized_keys"
chown "$ADMIN:$ADMIN" "/home/$ADMIN/.ssh/authorized_keys"
chmod 600 "/home/$ADMIN/.ssh/authorized_keys"

install -d -o "$ADMIN" -g "$ADMIN" /opt/magicbox
cat > /opt/magicbox/docker-compose.yml <<'COMPOSE'
services:
  app:
    image: ghcr.io/magicbox/magicbox:latest
    restart: unless-stopped
    ports:
      - "80:8080"
    environment:
      MAGICBOX_DATA_DIR: /data
    volumes:
      - magicbox-data:/data
volumes:
  magicbox-data:
COMPOSE
chown "$ADMIN:$ADMIN" /opt/magicbox/docker-compose.yml

cd /opt/magicbox
docker compose up -d
"#;

/// Renders the deployment script for the given admin account.
///
/// The returned payload is executed verbatim as one remote command; the
/// admin user name is the only interpolated value and is shell-escaped.
#[must_use]
pub fn deployment_script(admin_user: &str) -> String {
    let admin = escape(admin_user.into());
    format!("set -euo pipefail\nADMIN={admin}\n{SCRIPT_BODY}")
}

#[cfg(test)]
mod tests {
    use super::deployment_script;

    #[test]
    fn script_provisions_admin_and_starts_stack() {
        let script = deployment_script("magicbox");

        assert!(script.starts_with("set -euo pipefail\nADMIN=magicbox\n"));
        assert!(script.contains("useradd --create-home"));
        assert!(script.contains("NOPASSWD:ALL"));
        assert!(script.contains("cp /root/.ssh/authorized_keys"));
        assert!(script.contains("/opt/magicbox/docker-compose.yml"));
        assert!(script.contains("docker compose up -d"));
    }

    #[test]
    fn escapes_hostile_admin_names() {
        let script = deployment_script("magic box");
        assert!(script.contains("ADMIN='magic box'"));
    }
}
