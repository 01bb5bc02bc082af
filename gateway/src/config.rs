use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::oauth::{OAuthClient, OAuthClients};

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// 64 hex chars; sealed tokens are unreadable under any other key.
    pub encryption_key: String,
    pub clients: OAuthClients,
    /// Overall per-request timeout for cluster calls.
    /// Set via HTTP_CLIENT_TIMEOUT_IN_SECS. Default: 30.
    pub http_timeout: Duration,
    /// Connect timeout for cluster calls.
    /// Set via HTTP_CONNECTION_TIMEOUT_IN_SECS. Default: 10.
    pub http_connect_timeout: Duration,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Builds the configuration from an arbitrary variable source.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let encryption_key = match var("ENCRYPTION_KEY") {
        Some(key) => key,
        None => {
            let volume = var("ENCRYPTION_KEY_VOLUME").context(
                "neither ENCRYPTION_KEY nor ENCRYPTION_KEY_VOLUME/ENCRYPTION_KEY_FILENAME is set",
            )?;
            let filename = var("ENCRYPTION_KEY_FILENAME")
                .context("ENCRYPTION_KEY_VOLUME is set but ENCRYPTION_KEY_FILENAME is not")?;
            read_key_file(PathBuf::from(volume).join(filename))?
        }
    };
    // Fail at startup rather than on the first token write.
    crate::vault::builtin::parse_master_key(&encryption_key)?;

    let hce_token_endpoint = var("HCP_IDENTITY_HOST").map(|host| {
        let scheme = var("HCP_IDENTITY_SCHEME").unwrap_or_else(|| "https".into());
        match var("HCP_IDENTITY_PORT") {
            Some(port) => format!("{}://{}:{}", scheme, host, port),
            None => format!("{}://{}", scheme, host),
        }
    });

    Ok(Config {
        port: var("CNSI_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(8443),
        database_url: var("DATABASE_URL").unwrap_or_else(|| "postgres://localhost/cnsi".into()),
        encryption_key,
        clients: OAuthClients {
            hcf: OAuthClient {
                client_id: var("HCF_CLIENT").unwrap_or_else(|| "cf".into()),
                client_secret: var("HCF_CLIENT_SECRET").unwrap_or_default(),
                token_endpoint: None,
            },
            hce: OAuthClient {
                client_id: var("HCE_CLIENT").unwrap_or_else(|| "hce".into()),
                client_secret: var("HCE_CLIENT_SECRET").unwrap_or_default(),
                token_endpoint: hce_token_endpoint,
            },
        },
        http_timeout: Duration::from_secs(
            var("HTTP_CLIENT_TIMEOUT_IN_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        ),
        http_connect_timeout: Duration::from_secs(
            var("HTTP_CONNECTION_TIMEOUT_IN_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        ),
    })
}

fn read_key_file(path: PathBuf) -> anyhow::Result<String> {
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("unable to read encryption key from {}", path.display()))?;
    Ok(contents.trim().to_string())
}
