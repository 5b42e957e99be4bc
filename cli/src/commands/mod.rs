// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the MAPE-K CLI

pub mod config;
pub mod cycle;
pub mod watch;

pub use self::config::ConfigCommand;
pub use self::cycle::CycleArgs;
pub use self::watch::WatchArgs;

/// Split a `NAME=VALUE` argument.
fn split_pair(raw: &str) -> Result<(&str, &str), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing name in '{raw}'"));
    }
    Ok((name, value.trim()))
}

/// Parse `--metric NAME=VALUE` into a numeric reading.
pub fn parse_metric(raw: &str) -> Result<(String, f64), String> {
    let (name, value) = split_pair(raw)?;
    let value = value
        .parse::<f64>()
        .map_err(|_| format!("metric '{name}' is not a number: '{value}'"))?;
    Ok((name.to_string(), value))
}

/// Parse `--context NAME=VALUE`. Values that read as JSON keep their type,
/// anything else is taken as a plain string.
pub fn parse_context(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (name, value) = split_pair(raw)?;
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_metric() {
        assert_eq!(parse_metric("health=0.9").unwrap(), ("health".to_string(), 0.9));
        assert_eq!(parse_metric(" cpu = 75 ").unwrap(), ("cpu".to_string(), 75.0));
        assert!(parse_metric("health").is_err());
        assert!(parse_metric("=0.5").is_err());
        assert!(parse_metric("health=good").is_err());
    }

    #[test]
    fn test_parse_metric_accepts_non_finite_literals() {
        // Passed through unchanged; the threshold comparisons decide what NaN means.
        let (_, value) = parse_metric("health=NaN").unwrap();
        assert!(value.is_nan());
    }

    #[test]
    fn test_parse_context_keeps_json_types() {
        assert_eq!(parse_context("retries=3").unwrap().1, json!(3));
        assert_eq!(parse_context("dry_run=true").unwrap().1, json!(true));
        assert_eq!(parse_context("source=manual").unwrap().1, json!("manual"));
        assert_eq!(parse_context("note=a=b").unwrap().1, json!("a=b"));
    }
}
