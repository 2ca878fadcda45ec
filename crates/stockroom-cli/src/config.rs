//! Bot configuration.
//!
//! Reads the `[bot]` section from `config/default.toml` and falls back
//! to defaults when the file or section is missing. The operator
//! allow-list can be overridden on the command line.

/// Settings loaded from the `[bot]` section of `config/default.toml`.
pub struct BotConfig {
    /// Operator IDs permitted to use the bot. Empty means nobody.
    pub operators: Vec<i64>,
    /// Path of the SQLite database file.
    pub db_path: String,
    /// Seconds between retention sweeps.
    pub sweep_interval_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            operators: Vec::new(),
            db_path: "data/stockroom.db".to_string(),
            sweep_interval_secs: 24 * 60 * 60,
        }
    }
}

/// Load bot configuration from `config/default.toml`.
pub fn load_bot_config() -> BotConfig {
    let defaults = BotConfig::default();

    let content = match std::fs::read_to_string("config/default.toml") {
        Ok(c) => c,
        Err(_) => return defaults,
    };

    let table: toml::Table = match content.parse() {
        Ok(t) => t,
        Err(_) => return defaults,
    };

    let bot = match table.get("bot") {
        Some(toml::Value::Table(b)) => b,
        _ => return defaults,
    };

    BotConfig {
        operators: bot
            .get("operators")
            .and_then(|v| v.as_array())
            .map(|ids| ids.iter().filter_map(|v| v.as_integer()).collect())
            .unwrap_or(defaults.operators),
        db_path: bot
            .get("db_path")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or(defaults.db_path),
        sweep_interval_secs: bot
            .get("sweep_interval_secs")
            .and_then(|v| v.as_integer())
            .map(|v| v.max(60) as u64)
            .unwrap_or(defaults.sweep_interval_secs),
    }
}

/// Parse a comma-separated operator list from the command line.
pub fn parse_operators(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|id| id.trim().parse::<i64>().ok())
        .collect()
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_config_missing() {
        let cfg = BotConfig::default();
        assert!(cfg.operators.is_empty());
        assert_eq!(cfg.db_path, "data/stockroom.db");
        assert_eq!(cfg.sweep_interval_secs, 86_400);
    }

    #[test]
    fn parse_operators_skips_garbage() {
        assert_eq!(parse_operators("1, 2,three,4"), vec![1, 2, 4]);
        assert!(parse_operators("").is_empty());
    }
}
