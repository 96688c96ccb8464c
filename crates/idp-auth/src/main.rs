//! validate-token
//!
//! Reads a bearer token from stdin and validates it against the configured
//! identity provider. Prints the resulting identity as JSON and exits 0, or
//! prints the failing stage and exits 1.
//!
//! When client credentials are configured, a locally valid token is also
//! introspected so that revoked tokens are reported as `inactive`.

use idp_auth::{Config, IdpClient, TokenValidator};
use std::io::Read;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Logs go to stderr so stdout carries only the result
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "idp_auth=info,auth=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let mut input = String::new();
    std::io::stdin().read_to_string(&mut input)?;
    let token = input.trim();

    let validator = TokenValidator::from_config(&config);

    let context = match validator.validate(token).await {
        Ok(context) => context,
        Err(e) => {
            println!("{}", e.kind());
            return Ok(ExitCode::FAILURE);
        }
    };

    if let Some(client) = IdpClient::from_config(&config) {
        match client.introspect(token).await {
            Ok(true) => {}
            Ok(false) => {
                println!("inactive");
                return Ok(ExitCode::FAILURE);
            }
            Err(e) => {
                println!("{}", e.kind());
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&context)?);
    Ok(ExitCode::SUCCESS)
}
