use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{FixedOffset, Local, Offset};

use crate::{errors::Error, Result};

/// `/list` never shows more than this many records.
pub const MAX_LIST_LIMIT: usize = 10;

/// Which `RecordStore` implementation the binary wires in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Sqlite,
}

/// Typed configuration, read from the environment (plus an optional `.env`).
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub telegram_allowed_users: Vec<i64>,

    // Storage
    pub store: StoreKind,
    pub database_path: PathBuf,

    // Behavior
    pub utc_offset: FixedOffset,
    pub unrecognized_hint: bool,
    pub list_limit: usize,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,

    // Keepalive
    pub keepalive_enabled: bool,
    pub keepalive_port: u16,
    pub external_url: Option<String>,
    pub keepalive_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process env in
    /// production, a map in tests).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| get(key).and_then(non_empty);

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("BOT_TOKEN"))
            .ok_or_else(|| {
                Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;
        let telegram_allowed_users = parse_csv_i64(get("TELEGRAM_ALLOWED_USERS"))?;

        let store = match get("STORE").map(|s| s.trim().to_lowercase()).as_deref() {
            None | Some("memory") => StoreKind::Memory,
            Some("sqlite") => StoreKind::Sqlite,
            Some(other) => {
                return Err(Error::Config(format!(
                    "STORE must be 'memory' or 'sqlite', got '{other}'"
                )))
            }
        };
        let database_path = PathBuf::from(get("DATABASE_PATH").unwrap_or("tally.db".to_string()));

        let utc_offset = match parse_num::<i32>(&get, "UTC_OFFSET_MINUTES")? {
            Some(minutes) => FixedOffset::east_opt(minutes * 60).ok_or_else(|| {
                Error::Config(format!("UTC_OFFSET_MINUTES out of range: {minutes}"))
            })?,
            None => Local::now().offset().fix(),
        };
        let unrecognized_hint = parse_bool(&get, "UNRECOGNIZED_HINT")?.unwrap_or(false);
        let list_limit = parse_num::<usize>(&get, "LIST_LIMIT")?
            .unwrap_or(MAX_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);

        let rate_limit_enabled = parse_bool(&get, "RATE_LIMIT_ENABLED")?.unwrap_or(false);
        let rate_limit_requests = parse_num::<u32>(&get, "RATE_LIMIT_REQUESTS")?.unwrap_or(30);
        if rate_limit_requests == 0 {
            return Err(Error::Config(
                "RATE_LIMIT_REQUESTS must be at least 1".to_string(),
            ));
        }
        let rate_limit_window = parse_num::<u64>(&get, "RATE_LIMIT_WINDOW")?.unwrap_or(60);
        if rate_limit_window == 0 {
            return Err(Error::Config(
                "RATE_LIMIT_WINDOW must be at least 1 second".to_string(),
            ));
        }
        let rate_limit_window = Duration::from_secs(rate_limit_window);

        let keepalive_enabled = parse_bool(&get, "KEEPALIVE_ENABLED")?.unwrap_or(false);
        let keepalive_port = parse_num::<u16>(&get, "PORT")?.unwrap_or(8080);
        let external_url = get("EXTERNAL_URL")
            .or_else(|| get("RENDER_EXTERNAL_URL"))
            .map(|u| u.trim().trim_end_matches('/').to_string());
        let keepalive_interval = Duration::from_secs(
            parse_num::<u64>(&get, "KEEPALIVE_INTERVAL_SECS")?
                .unwrap_or(600)
                .max(1),
        );

        Ok(Self {
            telegram_bot_token,
            telegram_allowed_users,
            store,
            database_path,
            utc_offset,
            unrecognized_hint,
            list_limit,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
            keepalive_enabled,
            keepalive_port,
            external_url,
            keepalive_interval,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_bool(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(Error::Config(format!("{key} must be a boolean, got '{raw}'"))),
    }
}

fn parse_num<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = get(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a number, got '{raw}'")))
}

fn parse_csv_i64(v: Option<String>) -> Result<Vec<i64>> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("invalid user id in TELEGRAM_ALLOWED_USERS: '{s}'")))
        })
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn token_is_required() {
        assert!(matches!(load(&[]), Err(Error::Config(_))));
        assert!(matches!(
            load(&[("TELEGRAM_BOT_TOKEN", "  ")]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn defaults() {
        let cfg = load(&[("BOT_TOKEN", "abc")]).unwrap();
        assert_eq!(cfg.telegram_bot_token, "abc");
        assert!(cfg.telegram_allowed_users.is_empty());
        assert_eq!(cfg.store, StoreKind::Memory);
        assert_eq!(cfg.database_path, PathBuf::from("tally.db"));
        assert_eq!(cfg.list_limit, 10);
        assert!(!cfg.unrecognized_hint);
        assert!(!cfg.rate_limit_enabled);
        assert!(!cfg.keepalive_enabled);
        assert_eq!(cfg.keepalive_port, 8080);
        assert_eq!(cfg.external_url, None);
        assert_eq!(cfg.keepalive_interval, Duration::from_secs(600));
    }

    #[test]
    fn reads_overrides() {
        let cfg = load(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("BOT_TOKEN", "ignored"),
            ("TELEGRAM_ALLOWED_USERS", "1, 2,,3"),
            ("STORE", "SQLite"),
            ("DATABASE_PATH", "/var/lib/tally.db"),
            ("UTC_OFFSET_MINUTES", "480"),
            ("UNRECOGNIZED_HINT", "yes"),
            ("LIST_LIMIT", "500"),
            ("RATE_LIMIT_REQUESTS", "5"),
            ("RATE_LIMIT_WINDOW", "10"),
            ("RENDER_EXTERNAL_URL", "https://bot.example.com/"),
        ])
        .unwrap();
        assert_eq!(cfg.telegram_bot_token, "t");
        assert_eq!(cfg.telegram_allowed_users, vec![1, 2, 3]);
        assert_eq!(cfg.store, StoreKind::Sqlite);
        assert_eq!(cfg.utc_offset, FixedOffset::east_opt(8 * 3600).unwrap());
        assert!(cfg.unrecognized_hint);
        assert_eq!(cfg.list_limit, MAX_LIST_LIMIT);
        assert_eq!(cfg.rate_limit_requests, 5);
        assert_eq!(cfg.rate_limit_window, Duration::from_secs(10));
        assert_eq!(cfg.external_url.as_deref(), Some("https://bot.example.com"));

        let cfg = load(&[("BOT_TOKEN", "t"), ("LIST_LIMIT", "3")]).unwrap();
        assert_eq!(cfg.list_limit, 3);
    }

    #[test]
    fn rejects_bad_values() {
        for (k, v) in [
            ("STORE", "redis"),
            ("PORT", "http"),
            ("RATE_LIMIT_ENABLED", "maybe"),
            ("TELEGRAM_ALLOWED_USERS", "1,bob"),
            ("UTC_OFFSET_MINUTES", "100000"),
            ("RATE_LIMIT_REQUESTS", "0"),
            ("RATE_LIMIT_WINDOW", "0"),
        ] {
            assert!(
                matches!(load(&[("BOT_TOKEN", "t"), (k, v)]), Err(Error::Config(_))),
                "{k}={v}"
            );
        }
        assert!(matches!(
            load(&[
                ("BOT_TOKEN", "t"),
                ("RATE_LIMIT_ENABLED", "true"),
                ("RATE_LIMIT_REQUESTS", "0"),
            ]),
            Err(Error::Config(_))
        ));
    }
}
