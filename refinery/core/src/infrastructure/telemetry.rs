// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Logging setup for binaries and test harnesses embedding the refinery.

use anyhow::{Context, Result};

/// Initialize tracing subscriber for logging
///
/// `RUST_LOG` takes precedence over `level`. With `json` set, events are
/// emitted as one JSON object per line.
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails_cleanly() {
        let _ = init_logging("info", false);
        assert!(init_logging("debug", true).is_err());
    }
}
