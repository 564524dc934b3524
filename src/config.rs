use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::models::ScoringWeights;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    /// Shared fast tier; an in-process tier is used when unset
    pub redis_url: Option<String>,
    pub l1_cache_size: Option<u64>,
}

/// Raw matching settings; every field falls back to `MatchingConfig::default()`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MatchingSettings {
    pub default_page_size: Option<u32>,
    pub min_page_size: Option<u32>,
    pub max_page_size: Option<u32>,
    pub mutual_like_bonus: Option<u8>,
    pub one_way_like_bonus: Option<u8>,
    pub fallback_score: Option<u8>,
    pub online_window_secs: Option<u64>,
    pub score_ttl_secs: Option<u64>,
    pub repository_timeout_ms: Option<u64>,
    pub cache_timeout_ms: Option<u64>,
}

/// Immutable matching configuration handed to the ranker at construction
#[derive(Debug, Clone, PartialEq)]
pub struct MatchingConfig {
    pub default_page_size: u32,
    pub min_page_size: u32,
    pub max_page_size: u32,
    pub mutual_like_bonus: u8,
    pub one_way_like_bonus: u8,
    /// Substituted when a single candidate cannot be scored
    pub fallback_score: u8,
    /// Users active within this window count as online
    pub online_window: Duration,
    /// Fast-tier TTL for cached scores
    pub score_ttl: Duration,
    pub repository_timeout: Duration,
    pub cache_timeout: Duration,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            min_page_size: 1,
            max_page_size: 50,
            mutual_like_bonus: 6,
            one_way_like_bonus: 2,
            fallback_score: 25,
            online_window: Duration::from_secs(15 * 60),
            score_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            repository_timeout: Duration::from_secs(5),
            cache_timeout: Duration::from_millis(250),
        }
    }
}

impl From<&MatchingSettings> for MatchingConfig {
    fn from(s: &MatchingSettings) -> Self {
        let d = MatchingConfig::default();
        let min_page_size = s.min_page_size.unwrap_or(d.min_page_size).max(1);
        let max_page_size = s.max_page_size.unwrap_or(d.max_page_size).max(min_page_size);

        Self {
            default_page_size: s
                .default_page_size
                .unwrap_or(d.default_page_size)
                .clamp(min_page_size, max_page_size),
            min_page_size,
            max_page_size,
            mutual_like_bonus: s.mutual_like_bonus.unwrap_or(d.mutual_like_bonus),
            one_way_like_bonus: s.one_way_like_bonus.unwrap_or(d.one_way_like_bonus),
            fallback_score: s.fallback_score.unwrap_or(d.fallback_score),
            online_window: s
                .online_window_secs
                .map(Duration::from_secs)
                .unwrap_or(d.online_window),
            score_ttl: s.score_ttl_secs.map(Duration::from_secs).unwrap_or(d.score_ttl),
            repository_timeout: s
                .repository_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(d.repository_timeout),
            cache_timeout: s
                .cache_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(d.cache_timeout),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_values_weight")]
    pub values: f64,
    #[serde(default = "default_intent_weight")]
    pub intent: f64,
    #[serde(default = "default_lifestyle_weight")]
    pub lifestyle: f64,
    #[serde(default = "default_personality_weight")]
    pub personality: f64,
    #[serde(default = "default_interests_weight")]
    pub interests: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            values: default_values_weight(),
            intent: default_intent_weight(),
            lifestyle: default_lifestyle_weight(),
            personality: default_personality_weight(),
            interests: default_interests_weight(),
        }
    }
}

/// Upper bound on the summed sub-score weights
pub const MAX_TOTAL_WEIGHT: f64 = 97.0;

impl WeightsConfig {
    /// Reject weights that would push scores negative or past the ceiling
    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("values", self.values),
            ("intent", self.intent),
            ("lifestyle", self.lifestyle),
            ("personality", self.personality),
            ("interests", self.interests),
        ];

        for (name, weight) in named {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::Message(format!(
                    "scoring.weights.{} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }

        let total: f64 = named.iter().map(|(_, w)| w).sum();
        if total > MAX_TOTAL_WEIGHT + 1e-9 {
            return Err(ConfigError::Message(format!(
                "scoring.weights sum to {}, above the maximum of {}",
                total, MAX_TOTAL_WEIGHT
            )));
        }

        Ok(())
    }
}

impl From<&WeightsConfig> for ScoringWeights {
    fn from(w: &WeightsConfig) -> Self {
        Self {
            values: w.values,
            intent: w.intent,
            lifestyle: w.lifestyle,
            personality: w.personality,
            interests: w.interests,
        }
    }
}

fn default_values_weight() -> f64 { 32.0 }
fn default_intent_weight() -> f64 { 18.0 }
fn default_lifestyle_weight() -> f64 { 18.0 }
fn default_personality_weight() -> f64 { 17.0 }
fn default_interests_weight() -> f64 { 12.0 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Default values in the struct
    /// 2. Configuration file (config/default.toml)
    /// 3. Environment variables (prefixed with COMPAT_)
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., COMPAT__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("COMPAT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings = substitute_env_vars(settings)?;

        let settings: Settings = settings.try_deserialize()?;
        settings.scoring.weights.validate()?;
        Ok(settings)
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("COMPAT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = settings.try_deserialize()?;
        settings.scoring.weights.validate()?;
        Ok(settings)
    }

    pub fn matching_config(&self) -> MatchingConfig {
        MatchingConfig::from(&self.matching)
    }

    pub fn scoring_weights(&self) -> ScoringWeights {
        ScoringWeights::from(&self.scoring.weights)
    }
}

/// Apply the conventional `DATABASE_URL` / `REDIS_URL` variables on top of the config
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(database_url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", database_url)?;
    }
    if let Ok(redis_url) = env::var("REDIS_URL") {
        builder = builder.set_override("cache.redis_url", redis_url)?;
    }

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let weights = ScoringWeights::from(&WeightsConfig::default());
        assert_eq!(weights.values, 32.0);
        assert_eq!(weights.intent, 18.0);
        assert_eq!(weights.lifestyle, 18.0);
        assert_eq!(weights.personality, 17.0);
        assert_eq!(weights.interests, 12.0);
    }

    #[test]
    fn test_weight_validation() {
        assert!(WeightsConfig::default().validate().is_ok());

        let negative = WeightsConfig { intent: -1.0, ..Default::default() };
        assert!(negative.validate().is_err());

        let nan = WeightsConfig { values: f64::NAN, ..Default::default() };
        assert!(nan.validate().is_err());

        // defaults sum to 97
        let too_heavy = WeightsConfig { interests: 13.0, ..Default::default() };
        assert!(too_heavy.validate().is_err());

        let lighter = WeightsConfig { interests: 0.0, ..Default::default() };
        assert!(lighter.validate().is_ok());
    }

    #[test]
    fn test_load_from_rejects_bad_weights() {
        let path = std::env::temp_dir().join(format!("compat-match-weights-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [database]
            url = "postgres://localhost/compat_match"

            [scoring.weights]
            values = 60.0
            intent = 40.0
            "#,
        )
        .unwrap();

        let result = Settings::load_from(&path);
        std::fs::remove_file(&path).unwrap();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("above the maximum"), "{}", err);
    }

    #[test]
    fn test_default_logging() {
        let logging = LoggingSettings::default();
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, "json");
    }

    #[test]
    fn test_empty_matching_settings_use_defaults() {
        let config = MatchingConfig::from(&MatchingSettings::default());
        assert_eq!(config, MatchingConfig::default());
        assert_eq!(config.score_ttl, Duration::from_secs(604_800));
    }

    #[test]
    fn test_page_bounds_are_consistent() {
        let settings = MatchingSettings {
            default_page_size: Some(500),
            min_page_size: Some(0),
            max_page_size: Some(40),
            ..Default::default()
        };
        let config = MatchingConfig::from(&settings);
        assert_eq!(config.min_page_size, 1);
        assert_eq!(config.max_page_size, 40);
        assert_eq!(config.default_page_size, 40);
    }
}
