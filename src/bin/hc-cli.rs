use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "hc-cli")]
#[command(about = "Management CLI for the health-checking proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show local health and health-check cache state
    Status,
    /// List clusters and host health
    Clusters,
    /// Fail local health checks (drain this node)
    Fail,
    /// Restore local health checks
    Ok,
    /// Override the health of one host
    SetHost {
        cluster: String,
        address: String,
        /// healthy, degraded or unhealthy
        health: String,
    },
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

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Clusters => client.get(format!("{}/admin/clusters", cli.url)),
        Commands::Fail => client.post(format!("{}/healthcheck/fail", cli.url)),
        Commands::Ok => client.post(format!("{}/healthcheck/ok", cli.url)),
        Commands::SetHost {
            cluster,
            address,
            health,
        } => client
            .put(format!("{}/admin/clusters/{}/hosts/{}", cli.url, cluster, address))
            .json(&serde_json::json!({ "health": health })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
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
