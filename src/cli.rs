//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::db::Database;
use crate::jwt::{DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS};
use clap::Parser;
use tracing::{error, info};
use url::Url;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;

/// Environment variable holding the access token signing secret.
pub const ACCESS_SECRET_VAR: &str = "ACCESS_TOKEN_SECRET";

/// Environment variable holding the refresh token signing secret.
pub const REFRESH_SECRET_VAR: &str = "REFRESH_TOKEN_SECRET";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "Gatehouse", about = "Token-based authentication service")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "gatehouse.db")]
    pub database: String,

    /// Public origin the service is reached at (full URL). The Secure cookie
    /// flag is derived from its scheme
    #[arg(long, default_value = "http://localhost:8000")]
    pub public_origin: String,

    /// Access token lifetime in seconds
    #[arg(long, env = "ACCESS_TOKEN_TTL", default_value_t = DEFAULT_ACCESS_TTL_SECS)]
    pub access_token_ttl: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "REFRESH_TOKEN_TTL", default_value_t = DEFAULT_REFRESH_TTL_SECS)]
    pub refresh_token_ttl: u64,

    /// Path to file containing the access token secret. Prefer using the
    /// ACCESS_TOKEN_SECRET env var instead
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer using the
    /// REFRESH_TOKEN_SECRET env var instead
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Load a token secret from an environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_token_secret(var: &str, secret_file: Option<&str>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(var) };
        secret
    } else if let Some(path) = secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "Token secret is required. Set the {} environment variable (recommended) or use a secret file",
            var
        );
        return None;
    };

    if secret.len() < MIN_TOKEN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            var, MIN_TOKEN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both signing secrets. The two must differ, otherwise a leaked access
/// secret would be enough to forge refresh tokens.
pub fn load_token_secrets(args: &Args) -> Option<(String, String)> {
    let access = load_token_secret(ACCESS_SECRET_VAR, args.access_secret_file.as_deref())?;
    let refresh = load_token_secret(REFRESH_SECRET_VAR, args.refresh_secret_file.as_deref())?;

    if access == refresh {
        error!("Access and refresh token secrets must not be identical");
        return None;
    }

    Some((access, refresh))
}

/// Parse and validate the public origin URL.
/// Returns None and logs an error if validation fails.
pub fn validate_public_origin(origin: &str) -> Option<Url> {
    let url = match Url::parse(origin) {
        Ok(url) => url,
        Err(e) => {
            error!(origin = %origin, error = %e, "Invalid public origin URL");
            return None;
        }
    };

    let is_https = url.scheme() == "https";
    let is_localhost = url.host_str() == Some("localhost");

    if !is_https && !is_localhost {
        error!("Public origin must use HTTPS for non-localhost deployments");
        return None;
    }

    Some(url)
}

/// Build ServerConfig from validated arguments.
pub fn build_config(
    args: &Args,
    db: Database,
    public_origin: &Url,
    access_secret: String,
    refresh_secret: String,
) -> ServerConfig {
    let secure_cookies = public_origin.scheme() == "https";

    ServerConfig {
        db,
        access_secret: access_secret.into_bytes(),
        refresh_secret: refresh_secret.into_bytes(),
        access_ttl_secs: args.access_token_ttl,
        refresh_ttl_secs: args.refresh_token_ttl,
        secure_cookies,
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_public_origin() {
        assert!(validate_public_origin("https://auth.example.com").is_some());
        assert!(validate_public_origin("http://localhost:8000").is_some());
        assert!(validate_public_origin("http://auth.example.com").is_none());
        assert!(validate_public_origin("not a url").is_none());
    }
}
