use clap::{Parser, Subcommand};
use reqwest::{Client, Response};
use serde_json::json;
use std::error::Error;

#[derive(Parser)]
#[command(name = "message-ingest-cli")]
#[command(about = "Message Ingest CLI", long_about = None)]
struct Cli {
    #[arg(short, long, env = "MESSAGE_INGEST_ENDPOINT", default_value = "http://localhost:8080")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish a message
    Send {
        #[arg(value_name = "TEXT")]
        message: String,
    },

    /// List stored messages, newest first
    List {
        #[arg(short, long, default_value = "0")]
        page: u32,

        #[arg(short, long, default_value = "10")]
        size: u32,
    },

    /// Get message details
    Get {
        #[arg(value_name = "MESSAGE_ID")]
        id: String,
    },

    /// Find messages containing a term, ignoring case
    Search {
        #[arg(value_name = "TERM")]
        term: String,
    },

    /// Count stored messages
    Count,

    /// Per-status counts and pipeline counters
    Stats,

    /// Delete one message
    Delete {
        #[arg(value_name = "MESSAGE_ID")]
        id: String,
    },

    /// Delete every stored message
    Clear,

    /// Check server health
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let client = Client::new();
    let api = format!("{}/api/messages", cli.endpoint);

    let response = match cli.command {
        Commands::Send { message } => {
            client
                .post(format!("{}/send-json", api))
                .json(&json!({ "message": message }))
                .send()
                .await?
        }

        Commands::List { page, size } => {
            client
                .get(format!("{}/paged", api))
                .query(&[("page", page), ("size", size)])
                .send()
                .await?
        }

        Commands::Get { id } => client.get(format!("{}/{}", api, id)).send().await?,

        Commands::Search { term } => {
            client
                .get(format!("{}/search", api))
                .query(&[("term", term)])
                .send()
                .await?
        }

        Commands::Count => client.get(format!("{}/count", api)).send().await?,

        Commands::Stats => client.get(format!("{}/stats", api)).send().await?,

        Commands::Delete { id } => client.delete(format!("{}/{}", api, id)).send().await?,

        Commands::Clear => client.delete(&api).send().await?,

        Commands::Health => client.get(format!("{}/health", cli.endpoint)).send().await?,
    };

    print_response(response).await
}

async fn print_response(response: Response) -> Result<(), Box<dyn Error>> {
    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        return Err(format!("server responded with {}", status).into());
    }
    Ok(())
}
