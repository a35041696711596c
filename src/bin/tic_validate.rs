//! tic-validate: check a tree-form TIC 4.0 message for structural
//! problems — duplicated array elements, missing timestamps, disallowed
//! scalar values.
//!
//! Usage:
//!   tic-validate message.json
//!   cat message.json | tic-validate --rules rules.json
//!
//! Exits non-zero when the message is not compliant.

// MiMalloc allocator (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use ticflat::{ErrorCatalog, RawConfig, TicConfig, ValueRules, Validator};

#[derive(Parser, Debug)]
#[command(name = "tic-validate")]
#[command(about = "Validate TIC 4.0 messages", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted); one message or an array of them
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// JSON config file; environment variables override it
    #[arg(long)]
    config: Option<String>,

    /// JSON file mapping field names to pipe-separated allowed values
    #[arg(long)]
    rules: Option<String>,

    /// Pretty-print the result envelopes
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
    let catalog = ErrorCatalog::new();
    let validator = Validator::new(&config, &rules, &catalog);

    let input = read_input(args.input.as_deref())?;
    let inputs: Vec<&Value> = match &input {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut compliant = true;
    for message in inputs {
        let result = validator.validate(message);
        compliant = compliant && result.is_ok();
        let rendered = if args.pretty {
            serde_json::to_string_pretty(&result)?
        } else {
            serde_json::to_string(&result)?
        };
        println!("{rendered}");
    }

    if !compliant {
        std::process::exit(1);
    }
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
