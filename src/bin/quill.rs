//! quill: command-line front for the gateway
//!
//! Runs one gateway request from the shell, or checks a config file.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use quill::{Config, OperationKind, Secrets, Source};

/// Quill CLI
#[derive(Parser)]
#[command(name = "quill")]
#[command(version)]
#[command(about = "Cached, schema-enforcing AI gateway for resume drafting")]
struct Args {
    /// Config file (default: ~/.quill/config.toml, then /etc/quill/config.toml)
    #[arg(short, long, env = "QUILL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one request and print the enforced JSON
    Request {
        /// Operation: generate-draft, generate-followups, finalize, improve
        operation: OperationKind,
        /// Input text (or omit to read from stdin)
        text: Option<String>,
        /// Context field as key=value (repeatable)
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
        /// Override the configured model
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Validate the config file and report the effective settings
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::CheckConfig => {
            config.validate()?;
            let secrets = Secrets::load()?;
            println!(
                "cache:    ttl {}s, max {} entries",
                config.cache.ttl_secs, config.cache.max_entries
            );
            let r = &config.retry;
            println!(
                "retry:    {} attempts, base {}ms, jitter {}ms, timeout {}s",
                r.max_attempts, r.base_delay_ms, r.jitter_ms, r.attempt_timeout_secs
            );
            let endpoint = match &config.provider.base_url {
                Some(url) => url.as_str(),
                None => "default endpoint",
            };
            println!("provider: {} ({endpoint})", config.provider.model);
            let api_key = match secrets.api_key("openai") {
                Some(_) => "found",
                None => "missing",
            };
            println!("api key:  {api_key}");
            for (kind, _) in config.schema_overrides()? {
                println!("schema:   {kind} overridden");
            }
            println!("ok");
        }

        Command::Request {
            operation,
            text,
            fields,
            model,
        } => {
            let text = resolve_text(text, "request")?;
            let secrets = Secrets::load()?;
            let gateway = config.gateway_builder(&secrets)?.build()?;

            let mut input = gateway.input(text);
            if let Some(model) = model {
                input.params = input.params.model(model);
            }
            for (key, value) in fields {
                input = input.field(key, value);
            }

            let response = gateway.request_default(operation, &input).await?;
            println!("{}", serde_json::to_string_pretty(&response.value)?);
            let source = match response.source {
                Source::Cache => "cache",
                Source::Fresh => "fresh",
            };
            eprintln!(
                "source: {source}, truncated: {}, fingerprint: {}",
                response.was_truncated,
                response.fingerprint.short()
            );
        }
    }

    Ok(())
}

fn parse_field(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got {s:?}"))
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_is_pipe = !io::stdin().is_terminal();
    let stdin_text = if stdin_is_pipe {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    } else {
        None
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}
