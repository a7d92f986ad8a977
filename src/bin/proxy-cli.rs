use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for the config proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:19090")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pending requests, subscriptions and sources
    Status,
    /// List cached configs
    Cache,
    /// Fetch one config, waiting for a change like a client would
    Get {
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        def_checksum: String,
        /// Generation the caller already holds
        #[arg(long, default_value_t = 0)]
        generation: i64,
        #[arg(long, default_value = "")]
        content_checksum: String,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{}/status", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Cache => {
            let res = client.get(format!("{}/cache", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Get {
            namespace,
            name,
            def_checksum,
            generation,
            content_checksum,
            timeout_ms,
        } => {
            let mut body = json!({
                "namespace": namespace,
                "name": name,
                "def_checksum": def_checksum,
                "generation": generation,
                "content_checksum": content_checksum,
            });
            if let Some(timeout_ms) = timeout_ms {
                body["timeout_ms"] = json!(timeout_ms);
            }
            let res = client
                .post(format!("{}/config/v1/get", base))
                .json(&body)
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
        eprintln!("Error: proxy returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Details: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
