//! CLI interface for tutor-control

use anyhow::Result;
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};

use crate::config::{self, Config};
use crate::store::TutorStore;

#[derive(Parser)]
#[command(name = "tutor-control")]
#[command(about = "Tutoring tracking backend with auto-generated progress journals", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
    },
    /// Provision the admin account (explicit, idempotent)
    ProvisionAdmin {
        /// Admin username (defaults to config value)
        #[arg(long)]
        username: Option<String>,
        /// Admin password (or set TUTOR_ADMIN_PASSWORD)
        #[arg(long, env = "TUTOR_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        /// Allow provisioning even when disabled in config
        #[arg(long)]
        force: bool,
    },
    /// Show the current configuration
    Config,
}

/// Run the CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host } => {
            let mut config = Config::load()?;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            crate::server::start(config).await
        }
        Commands::ProvisionAdmin {
            username,
            password,
            force,
        } => provision_admin(username, &password, force).await,
        Commands::Config => config::show_config(),
    }
}

/// Create the admin account if it does not exist. Guarded so it never runs
/// implicitly: either the config enables bootstrap or --force is passed.
async fn provision_admin(username: Option<String>, password: &str, force: bool) -> Result<()> {
    let config = Config::load()?;

    let env_enabled = std::env::var("TUTOR_ADMIN_BOOTSTRAP")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if !config.admin.bootstrap_enabled && !force && !env_enabled {
        anyhow::bail!(
            "admin bootstrap is disabled; enable it in the config or pass --force \
             (or set TUTOR_ADMIN_BOOTSTRAP=1)"
        );
    }
    if password.trim().is_empty() {
        anyhow::bail!("admin password must not be empty");
    }

    let username = username.unwrap_or_else(|| config.admin.username.clone());
    let store = TutorStore::new(&config.database.path).await?;

    let hash = hash_password(password);
    let created = store.provision_admin(&username, &hash).await?;
    if created {
        println!("Admin account '{}' provisioned.", username);
    } else {
        println!("Admin account '{}' already exists, nothing to do.", username);
    }
    Ok(())
}

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_is_deterministic() {
        assert_eq!(hash_password("secret"), hash_password("secret"));
        assert_ne!(hash_password("secret"), hash_password("other"));
        // 32 bytes hex-encoded
        assert_eq!(hash_password("secret").len(), 64);
    }
}
