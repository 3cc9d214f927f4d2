use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use remote_guard::admin::handlers::RemoteStatus;

#[derive(Parser)]
#[command(name = "guard-cli")]
#[command(about = "Management CLI for remote-guard", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status
    Status,
    /// One line per remote: name, status, remaining block
    Remotes,
    /// Full status of one remote
    Show { name: String },
    /// HEAD a remote through its guard
    Check { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Remotes => {
            let res = client.get(format!("{}/admin/remotes", cli.url))
                .headers(headers)
                .send()
                .await?;
            if !res.status().is_success() {
                return print_response(res).await;
            }
            let remotes: Vec<RemoteStatus> = res.json().await?;
            for remote in remotes {
                let blocked = remote
                    .status
                    .blocked_for_ms
                    .map(|ms| format!(" (blocked for {}s)", ms / 1000))
                    .unwrap_or_default();
                let reason = remote
                    .status
                    .reason
                    .map(|r| format!(" - {}", r))
                    .unwrap_or_default();
                println!("{:<24} {}{}{}", remote.name, remote.status.kind, blocked, reason);
            }
        }
        Commands::Show { name } => {
            let res = client.get(format!("{}/admin/remotes/{}", cli.url, name))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Check { name } => {
            let res = client.post(format!("{}/admin/remotes/{}/check", cli.url, name))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
