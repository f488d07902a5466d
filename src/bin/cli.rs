//! CLI for talking to a running node

use anyhow::{bail, Context};
use beaconkv::common::encode_segment;
use clap::{Parser, Subcommand};
use reqwest::{header, redirect, StatusCode};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "beaconkv")]
#[command(about = "beaconkv client CLI")]
#[command(version)]
struct Cli {
    /// Node URL
    #[arg(long, default_value = "http://localhost:7000")]
    node: String,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a value (follows one redirect to the leader)
    Put {
        /// Key
        key: String,

        /// Value
        value: String,
    },

    /// Read a value from this node's local copy
    Get {
        /// Key
        key: String,
    },

    /// Show the node's view of the cluster
    Status,

    /// Check that the node answers
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let base = cli.node.trim_end_matches('/').to_string();

    // Redirects are followed by hand so the leader hop is visible
    let client = reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .timeout(Duration::from_millis(cli.timeout_ms))
        .build()?;

    match cli.command {
        Commands::Put { key, value } => {
            let url = format!(
                "{}/data/{}/{}",
                base,
                encode_segment(&key),
                encode_segment(&value)
            );
            let mut resp = client.post(&url).send().await?;

            if resp.status().is_redirection() {
                let location = resp
                    .headers()
                    .get(header::LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .context("redirect without a Location header")?
                    .to_string();
                println!("Redirected to leader: {}", location);
                resp = client.post(&location).send().await?;
            }

            let status = resp.status();
            let body = resp.text().await?;
            if !status.is_success() {
                bail!("PUT failed ({}): {}", status, body);
            }
            println!("{}", body);
        }

        Commands::Get { key } => {
            let url = format!("{}/data/{}", base, encode_segment(&key));
            let resp = client.get(&url).send().await?;
            let status = resp.status();
            let body = resp.text().await?;
            match status {
                StatusCode::OK => println!("{}", body),
                StatusCode::NOT_FOUND => bail!("{}", body),
                other => bail!("GET failed ({}): {}", other, body),
            }
        }

        Commands::Status => {
            let resp = client
                .get(format!("{}/status", base))
                .send()
                .await?
                .error_for_status()?;
            let status: serde_json::Value = resp.json().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Commands::Ping => {
            let resp = client
                .get(format!("{}/ping", base))
                .send()
                .await?
                .error_for_status()?;
            println!("{}", resp.text().await?);
        }
    }

    Ok(())
}
