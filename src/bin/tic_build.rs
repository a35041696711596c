//! tic-build: rebuild tree-form TIC 4.0 messages from their flat
//! dotted-path form.
//!
//! Usage:
//!   # One flat message, an array of them, or a flatten result envelope
//!   tic-build flat.json
//!
//!   # Pipe a tic-flatten envelope straight back
//!   tic-flatten message.json | tic-build

// MiMalloc allocator (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use ticflat::{Builder, RawConfig, TicConfig, TicResult, ValueRules};

#[derive(Parser, Debug)]
#[command(name = "tic-build")]
#[command(about = "Rebuild tree-form TIC 4.0 messages from flat form", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Field identifying array elements (default from configuration)
    #[arg(long = "id-field")]
    id_field: Option<String>,

    /// JSON config file; environment variables override it
    #[arg(long)]
    config: Option<String>,

    /// JSON file mapping field names to pipe-separated allowed values;
    /// needed to decode bare close key-field segments
    #[arg(long)]
    rules: Option<String>,

    /// Pretty-print the result envelope
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();

    let rules = load_rules(args.rules.as_deref())?;
    let config = load_config(args.config.as_deref(), &rules)?;
    let input = read_input(args.input.as_deref())?;

    let builder = Builder::new(&config);
    let mut result = TicResult::ok();
    match builder.build_messages(&input, args.id_field.as_deref()) {
        Ok(reports) => {
            for report in reports {
                for key in &report.skipped {
                    result.add_error(format!("skipped malformed flat key: {key}"));
                }
                result.add_message(report.message);
            }
        }
        Err(e) => {
            result.set_ko();
            result.add_error(e.to_string());
        }
    }

    print_result(&result, args.pretty)
}

fn print_result(result: &TicResult, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{rendered}");
    Ok(())
}

fn load_rules(path: Option<&str>) -> Result<ValueRules> {
    let mut rules = ValueRules::new();
    if let Some(path) = path {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file: {path}"))?;
        let table: HashMap<String, String> =
            serde_json::from_str(&text).context("Failed to parse rules file")?;
        for (field, values) in table {
            rules.set_values(field, &values);
        }
    }
    Ok(rules)
}

fn load_config(path: Option<&str>, rules: &ValueRules) -> Result<TicConfig> {
    let mut raw = RawConfig::default();
    if let Some(path) = path {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        raw = serde_json::from_str(&text).context("Failed to parse config file")?;
    }
    let raw = raw.merge(RawConfig::from_env());
    Ok(TicConfig::new(raw, rules)?)
}

/// Read one JSON document, trying SIMD parsing first and falling back to
/// serde_json for input simd-json rejects.
fn read_input(path: Option<&str>) -> Result<Value> {
    let mut content = Vec::new();
    match path {
        Some(path) => {
            std::fs::File::open(path)
                .with_context(|| format!("Failed to open input file: {path}"))?
                .read_to_end(&mut content)?;
        }
        None => {
            std::io::stdin().read_to_end(&mut content)?;
        }
    }

    let mut simd_buf = content.clone();
    match simd_json::to_owned_value(&mut simd_buf) {
        Ok(value) => {
            let json = simd_json::to_string(&value)?;
            Ok(serde_json::from_str(&json)?)
        }
        Err(_) => serde_json::from_slice(&content).context("Failed to parse JSON input"),
    }
}
