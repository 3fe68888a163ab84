use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Map, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use devtrace::rpc::{Request, Response};

#[derive(Parser)]
#[command(name = "devtrace-cli")]
#[command(about = "Query a running DevTrace gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:4318")]
    url: String,

    /// WebSocket path on the gateway.
    #[arg(long, default_value = "/ws")]
    ws_path: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Liveness check over plain HTTP
    Health,
    /// Store sizes, uptime and observer count
    Status,
    /// List traces, newest first
    Traces {
        #[arg(long)]
        method: Option<String>,
        #[arg(long)]
        status: Option<u16>,
        #[arg(long)]
        min_duration: Option<f64>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List log entries, newest first
    Logs {
        #[arg(long)]
        level: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Drop every stored trace
    ClearTraces,
    /// Drop every stored log entry
    ClearLogs,
    /// Dump all traces
    Export {
        #[arg(long, default_value = "json")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (method, params) = match cli.command {
        Commands::Health => {
            let res = reqwest::get(format!("{}/health", cli.url)).await?;
            return print_http(res).await;
        }
        Commands::Status => ("status", None),
        Commands::Traces {
            method,
            status,
            min_duration,
            limit,
        } => {
            let mut filters = Map::new();
            insert_some(&mut filters, "method", method);
            insert_some(&mut filters, "statusCode", status);
            insert_some(&mut filters, "minDuration", min_duration);
            insert_some(&mut filters, "limit", limit);
            ("traces/list", Some(Value::Object(filters)))
        }
        Commands::Logs { level, search, limit } => {
            let mut filters = Map::new();
            insert_some(&mut filters, "level", level);
            insert_some(&mut filters, "search", search);
            insert_some(&mut filters, "limit", limit);
            ("logs/list", Some(Value::Object(filters)))
        }
        Commands::ClearTraces => ("traces/clear", None),
        Commands::ClearLogs => ("logs/clear", None),
        Commands::Export { format } => ("traces/export", Some(json!({ "format": format }))),
    };

    let ws_url = format!("{}{}", websocket_base(&cli.url), cli.ws_path);
    let result = call(&ws_url, method, params).await?;

    // export data is already serialized; print it raw
    if let Some(data) = result.get("data").and_then(Value::as_str) {
        println!("{}", data);
    } else {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

fn insert_some<T: Into<Value>>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value.into());
    }
}

fn websocket_base(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        url.to_string()
    }
}

/// One request over a fresh observer connection; pushes are skipped.
async fn call(url: &str, method: &str, params: Option<Value>) -> Result<Value, Box<dyn std::error::Error>> {
    let (mut socket, _) = connect_async(url).await?;
    socket
        .send(Message::text(Request::new(1, method, params).to_text()))
        .await?;

    while let Some(message) = socket.next().await {
        let Message::Text(text) = message? else {
            continue;
        };
        let frame: Value = serde_json::from_str(text.as_str())?;
        if frame.get("method").is_some() {
            continue;
        }
        let response = Response::decode(text.as_str())?;
        if response.id != json!(1) {
            continue;
        }
        let _ = socket.close(None).await;
        return Ok(response.into_result()?);
    }
    Err("connection closed before a response arrived".into())
}

async fn print_http(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
