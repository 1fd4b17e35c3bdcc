//! ai-gateway: drive the caching gateway core from the command line
//!
//! Usage:
//!   ai-gateway handle [--method <verb>] [--config <file>] [<body.json>|-]   One request
//!   ai-gateway serve [--config <file>]                                     NDJSON bodies on stdin
//!   ai-gateway check-config [--config <file>]                              Validate configuration

use anyhow::{bail, Context};
use chat_cache_gateway::{Gateway, GatewayConfig, GatewayReply};
use serde_json::{json, Value};
use std::io::Read;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "handle" => cmd_handle(&args[2..]).await,
        "serve" => cmd_serve(&args[2..]).await,
        "check-config" => cmd_check_config(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("ai-gateway {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"ai-gateway: caching gateway for chat completions

USAGE:
    ai-gateway <COMMAND> [OPTIONS]

COMMANDS:
    handle [--method <verb>] [<file>|-]   Process one JSON body and print the reply
    serve                                  Read one JSON body per line from stdin,
                                           write one {{status, body}} line per request
    check-config                           Load and validate the configuration
    version                                Show version information
    help                                   Show this help message

OPTIONS:
    --config <file>                        YAML configuration file

ENVIRONMENT:
    OPENAI_API_KEY                         Provider credential (required for upstream calls)
    AI_GATEWAY_BASE_URL                    Provider base URL (default https://api.openai.com/v1)
    AI_HTTP_TIMEOUT_SECS                   Upstream timeout in seconds (default 30)
    AI_PROXY_URL                           Proxy for upstream calls
    AI_GATEWAY_CACHE_MAX_ENTRIES           Cache capacity (default 500)
    AI_GATEWAY_CACHE_TTL_SECS              Cache TTL in seconds (default 30 days)
    AI_GATEWAY_MAX_RETRIES                 Retries for transient upstream failures (default 0)
    RUST_LOG                               Log filter (default info)"#
    );
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Arguments that are neither flags nor flag values.
fn positional(args: &[String]) -> Vec<&str> {
    let mut out = Vec::new();
    let mut skip = false;
    for arg in args {
        if skip {
            skip = false;
            continue;
        }
        if arg == "--method" || arg == "--config" {
            skip = true;
            continue;
        }
        out.push(arg.as_str());
    }
    out
}

fn load_config(args: &[String]) -> anyhow::Result<GatewayConfig> {
    match flag_value(args, "--config") {
        Some(path) => {
            // file settings, environment overrides on top
            let cfg = GatewayConfig::from_yaml_file(PathBuf::from(path))
                .with_context(|| format!("loading {}", path))?;
            Ok(cfg.with_overrides(|name| std::env::var(name).ok()))
        }
        None => Ok(GatewayConfig::from_env()),
    }
}

/// Empty input is treated as an empty body, like a request without payload.
fn parse_body(text: &str) -> serde_json::Result<Value> {
    if text.trim().is_empty() {
        Ok(Value::Null)
    } else {
        serde_json::from_str(text)
    }
}

fn invalid_json_reply(e: &serde_json::Error) -> GatewayReply {
    GatewayReply {
        status: 400,
        body: json!({ "error": "Invalid JSON body", "details": e.to_string() }),
    }
}

async fn cmd_handle(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let gateway = Gateway::from_config(&config)?;
    let method = flag_value(args, "--method").unwrap_or("POST");

    let text = match positional(args).first() {
        Some(&"-") | None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading request body from stdin")?;
            buf
        }
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?
        }
    };

    let reply = match parse_body(&text) {
        Ok(body) => gateway.respond(method, &body).await,
        Err(e) => invalid_json_reply(&e),
    };
    println!("{}", serde_json::to_string_pretty(&reply.body)?);
    if !reply.is_success() {
        eprintln!("status: {}", reply.status);
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_serve(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let gateway = Gateway::from_config(&config)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut handled = 0u64;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = match parse_body(&line) {
            Ok(body) => gateway.respond("POST", &body).await,
            Err(e) => invalid_json_reply(&e),
        };
        let mut out = serde_json::to_vec(&reply)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
        handled += 1;
    }

    let stats = gateway.cache().stats();
    info!(
        requests = handled,
        hits = stats.hits,
        misses = stats.misses,
        evictions = stats.evictions,
        hit_ratio = stats.hit_ratio(),
        "input closed, shutting down"
    );
    Ok(())
}

fn cmd_check_config(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    config.validate()?;
    if config.api_key.is_none() {
        bail!("configuration is valid but OPENAI_API_KEY is not set");
    }
    println!("{:#?}", config);
    Ok(())
}
