//! # issue-token
//!
//! Prints a bearer token for an existing, active user. Reads the same
//! configuration as the server so the token verifies against it.
//!
//! ## Usage
//! ```bash
//! cargo run -p shopdesk-api --bin issue-token -- <user-id>
//! cargo run -p shopdesk-api --bin issue-token -- <user-id> --config ./shopdesk.toml
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use shopdesk_api::{JwtManager, ServiceConfig};
use shopdesk_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let mut user_id = None;
    let mut config_path = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or_else(|| anyhow!("--config needs a path"))?;
                config_path = Some(PathBuf::from(path));
            }
            other if other.starts_with('-') => bail!("Unknown argument: {}", other),
            other => user_id = Some(other.to_string()),
        }
    }
    let user_id = user_id.ok_or_else(|| anyhow!("usage: issue-token <user-id> [--config <path>]"))?;

    let config = ServiceConfig::load(config_path).context("Failed to load configuration")?;
    let db = Database::new(DbConfig::new(config.database.path.clone()).max_connections(1))
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path.display()))?;

    let user = db
        .users()
        .find_active(&user_id)
        .await?
        .ok_or_else(|| anyhow!("No active user with id {}", user_id))?;
    db.close().await;

    let jwt = JwtManager::new(config.auth.jwt_secret, config.auth.token_lifetime_secs);
    let token = jwt.generate_access_token(&user.id)?;

    eprintln!("Token for {} ({:?}), valid {}s:", user.username, user.role, config.auth.token_lifetime_secs);
    println!("{}", token);
    Ok(())
}
