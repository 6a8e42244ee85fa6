use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::ChatId, errors::Error, i18n::Lang, Result};

pub const DEFAULT_TIMEOUT_MINUTES: u64 = 1440;
/// Ten years.
pub const MAX_TIMEOUT_MINUTES: u64 = 10 * 365 * 24 * 60;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Settings-table keys.
pub mod keys {
    pub const MODERATION_GROUP_ID: &str = "MODERATION_GROUP_ID";
    pub const APPROVED_GROUP_ID: &str = "APPROVED_GROUP_ID";
    pub const TIMEOUT_MINUTES: &str = "TIMEOUT_MINUTES";
    pub const APPROVED_TOPIC_ID: &str = "APPROVED_TOPIC_ID";
}

/// Typed process configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub moderation_chat: ChatId,
    pub approved_chat: ChatId,
    pub approved_topic_id: Option<i32>,
    pub admins: Vec<i64>,
    pub lang: Lang,

    /// `None` when `TIMEOUT_MINUTES` is unset; the settings table then keeps its value.
    pub timeout_minutes: Option<u64>,
    pub database_path: PathBuf,

    pub sweep_interval: Option<Duration>,
    pub sweep_budget: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN")
            .or_else(|| env_str("TELEGRAM_TOKEN"))
            .and_then(non_empty)
            .ok_or_else(|| {
                Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
            })?;

        let moderation_chat = ChatId(required_i64("MODERATION_GROUP_ID")?);
        let approved_chat = ChatId(required_i64("APPROVED_GROUP_ID")?);

        let approved_topic_id = match env_str("APPROVED_TOPIC_ID").and_then(non_empty) {
            Some(raw) => Some(raw.trim().parse::<i32>().map_err(|e| {
                Error::Config(format!("invalid APPROVED_TOPIC_ID {raw:?}: {e}"))
            })?),
            None => None,
        };

        let admins = parse_csv_i64(env_str("ADMINS"));

        let lang = Lang::from_locale(
            env_str("BOT_LANG")
                .or_else(|| env_str("LANG"))
                .as_deref()
                .unwrap_or("en"),
        );

        let timeout_minutes = match env_str("TIMEOUT_MINUTES").and_then(non_empty) {
            Some(raw) => Some(parse_timeout_minutes(&raw)?),
            None => None,
        };

        let database_path = env_str("DATABASE_PATH")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/salebot.db"));

        let sweep_interval = env_u64("SWEEP_INTERVAL_SECS")
            .filter(|s| *s > 0)
            .map(Duration::from_secs);
        let sweep_budget = Duration::from_secs(env_u64("SWEEP_BUDGET_SECS").unwrap_or(10).max(1));

        Ok(Self {
            telegram_bot_token,
            moderation_chat,
            approved_chat,
            approved_topic_id,
            admins,
            lang,
            timeout_minutes,
            database_path,
            sweep_interval,
            sweep_budget,
        })
    }

    /// Sweep cadence: explicit override, otherwise the TTL clamped to a sane range.
    pub fn effective_sweep_interval(&self, ttl_minutes: u64) -> Duration {
        self.sweep_interval
            .unwrap_or_else(|| sweep_interval_for_ttl(ttl_minutes))
    }
}

pub fn sweep_interval_for_ttl(ttl_minutes: u64) -> Duration {
    Duration::from_secs(ttl_minutes.saturating_mul(60)).clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL)
}

pub fn parse_timeout_minutes(raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(v) if (1..=MAX_TIMEOUT_MINUTES).contains(&v) => Ok(v),
        _ => Err(Error::Config(format!(
            "invalid TIMEOUT_MINUTES {raw:?}: expected 1..={MAX_TIMEOUT_MINUTES}"
        ))),
    }
}

fn required_i64(key: &str) -> Result<i64> {
    let raw = env_str(key)
        .and_then(non_empty)
        .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))?;
    raw.trim()
        .parse::<i64>()
        .map_err(|e| Error::Config(format!("invalid {key} {raw:?}: {e}")))
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
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

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

pub(crate) fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
