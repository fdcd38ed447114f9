use std::env;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite://vitaldesk.db?mode=rwc";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_TYPING_DELAY_MS: u64 = 600;
const DEFAULT_SPEECH_LANG: &str = "en-IN";

/// Runtime settings, read once at startup after `.env` has been loaded.
#[derive(Debug, Clone)]
pub struct Settings {
    /// `sqlite://...` or the literal `memory`.
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub typing_delay: Duration,
    pub speech_lang: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            typing_delay: Duration::from_millis(DEFAULT_TYPING_DELAY_MS),
            speech_lang: DEFAULT_SPEECH_LANG.to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Settings::default();
        Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            host: lookup("VITALDESK_HOST").unwrap_or(defaults.host),
            port: parse_or("VITALDESK_PORT", lookup("VITALDESK_PORT"), defaults.port),
            typing_delay: Duration::from_millis(parse_or(
                "VITALDESK_TYPING_DELAY_MS",
                lookup("VITALDESK_TYPING_DELAY_MS"),
                DEFAULT_TYPING_DELAY_MS,
            )),
            speech_lang: lookup("VITALDESK_SPEECH_LANG").unwrap_or(defaults.speech_lang),
        }
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == "memory"
    }
}

fn parse_or<T: std::str::FromStr + Copy>(key: &str, raw: Option<String>, fallback: T) -> T {
    match raw {
        None => fallback,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            log::warn!("⚠️ {} has unparsable value {:?}, using default", key, value);
            fallback
        }),
    }
}
