#![forbid(unsafe_code)]

//! Operator CLI for a running `facility-presence` server.
//!
//! Talks to the HTTP API and prints the `data` field of each response.

use clap::{Parser, Subcommand};
use reqwest::{Client, Method, StatusCode};

#[derive(Debug, Parser)]
#[command(
    name = "facility-presence-ctl",
    about = "Operator CLI for the facility-presence server",
    version,
    long_about = None
)]
struct Cli {
    /// Base URL of the server.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Account identity forwarded in `x-account-id`.
    #[arg(long, default_value_t = 0)]
    account_id: i64,

    /// Staff identity forwarded in `x-staff-id`.
    #[arg(long)]
    staff_id: Option<i64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the server is up.
    Health,

    /// List running groups without a supervisor.
    Unclaimed,

    /// Execute all due scheduled checkouts now.
    ProcessDue,

    /// Show current totals.
    Counts,
}

impl Command {
    fn request(&self) -> (Method, &'static str) {
        match self {
            Self::Health => (Method::GET, "/health"),
            Self::Unclaimed => (Method::GET, "/active/unclaimed"),
            Self::ProcessDue => (Method::POST, "/checkouts/process-due"),
            Self::Counts => (Method::GET, "/active/analytics/counts"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Cli::parse();

    match send(&args).await {
        Ok((status, body)) => {
            print_body(&body);
            // 207 means the batch ran but some items failed.
            if !status.is_success() || status == StatusCode::MULTI_STATUS {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("Failed to reach server at {}: {err}", args.url);
            std::process::exit(1);
        }
    }
}

async fn send(args: &Cli) -> Result<(StatusCode, String), reqwest::Error> {
    let (method, path) = args.command.request();
    let url = format!("{}{path}", args.url.trim_end_matches('/'));

    let mut request = Client::new()
        .request(method, url)
        .header("x-account-id", args.account_id.to_string());
    if let Some(staff_id) = args.staff_id {
        request = request.header("x-staff-id", staff_id.to_string());
    }

    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    Ok((status, body))
}

fn print_body(body: &str) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        println!("{body}");
        return;
    };

    let success = value
        .get("success")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);
    if success {
        let data = value.get("data").unwrap_or(&serde_json::Value::Null);
        println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
    } else {
        let message = value
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown error");
        eprintln!("Error: {message}");
    }
}
