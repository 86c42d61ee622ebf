use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context};
use colored::Colorize;
use kvlink_client::{
    BlockingClient, ClientConfig, HttpTransport, HttpTransportConfig, ReadOptions, Transport,
};
use serde_json::Value;

use crate::cli::*;

/// Build a blocking HTTP client from command-line settings.
///
/// Precedence for the endpoint: `--endpoint`, then the config file, then
/// the environment.
pub fn connect(cli: &Cli) -> anyhow::Result<BlockingClient<HttpTransport>> {
    let config = client_config(cli)?;
    let transport_config = HttpTransportConfig {
        timeout: cli.timeout.map(Duration::from_secs),
        ..Default::default()
    };
    let transport = HttpTransport::with_config(&transport_config)?;
    BlockingClient::new(transport, config).context("failed to create client")
}

fn client_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = Some(endpoint.clone());
    }
    if cli.no_cache {
        config.cache_by_default = false;
    }
    Ok(config.or_env())
}

pub fn run_command<T: Transport, W: Write>(
    db: &mut BlockingClient<T>,
    command: Command,
    format: OutputFormat,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::Get(args) => cmd_get(db, args, format, out),
        Command::Set(args) => cmd_set(db, args, format, out),
        Command::Delete(args) => cmd_delete(db, args, format, out),
        Command::Has(args) => cmd_has(db, args, format, out),
        Command::Keys => cmd_keys(db, format, out),
        Command::Size => cmd_size(db, format, out),
        Command::Dump => cmd_dump(db, format, out),
        Command::Clear(args) => cmd_clear(db, args, format, out),
    }
}

fn cmd_get<T: Transport, W: Write>(
    db: &mut BlockingClient<T>,
    args: GetArgs,
    format: OutputFormat,
    out: &mut W,
) -> anyhow::Result<()> {
    if args.raw {
        match db.get_raw_with(&args.key, ReadOptions::forced())? {
            Some(raw) => writeln!(out, "{raw}")?,
            None => not_found(&args.key, format, out)?,
        }
        return Ok(());
    }

    match db.get_with(&args.key, ReadOptions::forced())? {
        Some(value) => match format {
            OutputFormat::Json => writeln!(out, "{value}")?,
            OutputFormat::Text => writeln!(out, "{}", display_value(&value))?,
        },
        None => not_found(&args.key, format, out)?,
    }
    Ok(())
}

fn cmd_set<T: Transport, W: Write>(
    db: &mut BlockingClient<T>,
    args: SetArgs,
    format: OutputFormat,
    out: &mut W,
) -> anyhow::Result<()> {
    let value = parse_value(&args.value);
    db.set(&args.key, &value)?;
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::json!({ "key": args.key, "value": value }))?
        }
        OutputFormat::Text => {
            writeln!(out, "{} Set {}", "✓".green().bold(), args.key.yellow())?
        }
    }
    Ok(())
}

fn cmd_delete<T: Transport, W: Write>(
    db: &mut BlockingClient<T>,
    args: DeleteArgs,
    format: OutputFormat,
    out: &mut W,
) -> anyhow::Result<()> {
    let existed = db.delete(&args.key)?;
    match (format, existed) {
        (OutputFormat::Json, _) => writeln!(out, "{existed}")?,
        (OutputFormat::Text, true) => {
            writeln!(out, "{} Deleted {}", "✓".green().bold(), args.key.yellow())?
        }
        (OutputFormat::Text, false) => writeln!(out, "{} had no value", args.key.yellow())?,
    }
    Ok(())
}

fn cmd_has<T: Transport, W: Write>(
    db: &mut BlockingClient<T>,
    args: HasArgs,
    format: OutputFormat,
    out: &mut W,
) -> anyhow::Result<()> {
    let present = db.has_with(&args.key, ReadOptions::forced())?;
    match format {
        OutputFormat::Json => {
            writeln!(out, "{}", serde_json::json!({ "key": args.key, "present": present }))?
        }
        OutputFormat::Text if present => writeln!(out, "{} has a value", args.key.yellow())?,
        OutputFormat::Text => writeln!(out, "{} has no value", args.key.yellow())?,
    }
    Ok(())
}

fn cmd_size<T: Transport, W: Write>(
    db: &mut BlockingClient<T>,
    format: OutputFormat,
    out: &mut W,
) -> anyhow::Result<()> {
    let size = db.size()?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::json!({ "size": size }))?,
        OutputFormat::Text => writeln!(out, "{size}")?,
    }
    Ok(())
}

fn cmd_keys<T: Transport, W: Write>(
    db: &mut BlockingClient<T>,
    format: OutputFormat,
    out: &mut W,
) -> anyhow::Result<()> {
    let keys = db.keys()?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&keys)?)?,
        OutputFormat::Text => {
            for key in keys {
                writeln!(out, "{key}")?;
            }
        }
    }
    Ok(())
}

fn cmd_dump<T: Transport, W: Write>(
    db: &mut BlockingClient<T>,
    format: OutputFormat,
    out: &mut W,
) -> anyhow::Result<()> {
    let map = db.to_map()?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&map)?)?,
        OutputFormat::Text => {
            for (key, value) in &map {
                writeln!(out, "{}: {}", key.bold(), display_value(value))?;
            }
        }
    }
    Ok(())
}

fn cmd_clear<T: Transport, W: Write>(
    db: &mut BlockingClient<T>,
    args: ClearArgs,
    format: OutputFormat,
    out: &mut W,
) -> anyhow::Result<()> {
    if !args.yes {
        bail!("refusing to delete every key without --yes");
    }
    let before = db.size()?;
    db.clear()?;
    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::json!({ "deleted": before }))?,
        OutputFormat::Text => writeln!(out, "{} Cleared {} keys", "✓".green().bold(), before)?,
    }
    Ok(())
}

fn not_found<W: Write>(key: &str, format: OutputFormat, out: &mut W) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => writeln!(out, "null")?,
        OutputFormat::Text => writeln!(out, "{} no value for {}", "✗".red(), key.yellow())?,
    }
    Ok(())
}

/// Interpret a command-line value as JSON, falling back to a plain string.
fn parse_value(input: &str) -> Value {
    serde_json::from_str(input).unwrap_or_else(|_| Value::String(input.to_string()))
}

/// Strings print without quotes; everything else as compact JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
