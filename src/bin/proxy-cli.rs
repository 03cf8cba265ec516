use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for the round-robin proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "PROXY_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxy system status
    Status,
    /// List backends in selection order with their weights
    Backends,
    /// Add a backend or change its weight
    Upsert {
        address: String,
        /// Omit to use the proxy's default weight
        #[arg(short, long, allow_negative_numbers = true)]
        weight: Option<i64>,
    },
    /// Remove a backend
    Remove { address: String },
    /// Show the weight of a backend
    Weight { address: String },
    /// Set the weight used for backends added without one
    DefaultWeight {
        #[arg(allow_negative_numbers = true)]
        weight: i64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    let client = reqwest::Client::builder().default_headers(headers).build()?;

    let base = cli.url.trim_end_matches('/');
    let request = match cli.command {
        Commands::Status => client.get(format!("{base}/admin/status")),
        Commands::Backends => client.get(format!("{base}/admin/backends")),
        Commands::Upsert { address, weight } => client
            .put(format!("{base}/admin/backends"))
            .json(&json!({ "address": address, "weight": weight })),
        Commands::Remove { address } => client
            .delete(format!("{base}/admin/backends"))
            .query(&[("address", address)]),
        Commands::Weight { address } => client
            .get(format!("{base}/admin/backends/weight"))
            .query(&[("address", address)]),
        Commands::DefaultWeight { weight } => client
            .put(format!("{base}/admin/default-weight"))
            .json(&json!({ "weight": weight })),
    };

    print_response(request.send().await?).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if !text.is_empty() {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    if text.is_empty() {
        println!("OK ({})", status);
        return Ok(());
    }

    let json: Value = serde_json::from_str(&text)?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
