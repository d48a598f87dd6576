//! TripAgent configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use chrono::NaiveDate;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main TripAgent configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Planning pipeline knobs
    pub planner: PlannerConfig,

    /// External data providers (map, routing)
    pub providers: ProvidersConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Budget accounting defaults
    pub budget: BudgetConfig,

    /// Per-client rate limiting
    #[serde(rename = "rate-limit")]
    pub rate_limit: RateLimitConfig,

    /// Session store sizing
    pub session: SessionConfig,

    /// POI/route cache sizing
    pub cache: CacheConfig,

    /// Where the effective configuration came from, for the run fingerprint
    #[serde(skip)]
    pub env_source: String,
}

impl Config {
    /// Load configuration with fallback chain, then apply env overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            let mut config = Self::load_from_file(path)
                .context(format!("Failed to load config from {}", path.display()))?;
            config.env_source = path.display().to_string();
            return Ok(config);
        }

        // Try project-local config: ./tripagent.yml
        let local_config = PathBuf::from("tripagent.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(mut config) => {
                    config.env_source = "tripagent.yml".to_string();
                    return Ok(config);
                }
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/tripagent/tripagent.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("tripagent").join("tripagent.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(mut config) => {
                        config.env_source = user_config.display().to_string();
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        let mut config = Self::default();
        config.env_source = "defaults".to_string();
        Ok(config)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Operational knobs can be overridden from the environment without a
    /// config file. Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Some(value) = env_flag("STRICT_EXTERNAL_DATA") {
            self.providers.strict_external_data = value;
        }
        if let Ok(raw) = std::env::var("ROUTING_PROVIDER") {
            match raw.trim().to_lowercase().parse::<RoutingMode>() {
                Ok(mode) => self.providers.routing = mode,
                Err(_) => tracing::warn!(%raw, "Ignoring invalid ROUTING_PROVIDER"),
            }
        }
        if let Ok(raw) = std::env::var("FOOD_MIN_PER_PERSON_PER_DAY") {
            match raw.trim().parse::<f64>() {
                Ok(value) => self.budget.food_min_per_person_per_day = value.max(30.0),
                Err(_) => tracing::warn!(%raw, "Ignoring invalid FOOD_MIN_PER_PERSON_PER_DAY"),
            }
        }
        if let Ok(raw) = std::env::var("DEFAULT_SPRING_FESTIVAL_DATE") {
            match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
                Ok(date) => self.planner.spring_festival_date = date,
                Err(_) => tracing::warn!(%raw, "Ignoring invalid DEFAULT_SPRING_FESTIVAL_DATE"),
            }
        }
        if let Ok(raw) = std::env::var("MAX_REPAIR_ROUNDS") {
            match raw.trim().parse::<u32>() {
                Ok(value) => self.planner.max_repair_rounds = value,
                Err(_) => tracing::warn!(%raw, "Ignoring invalid MAX_REPAIR_ROUNDS"),
            }
        }
        if let Ok(raw) = std::env::var("RATE_LIMIT_MAX") {
            if let Ok(value) = raw.trim().parse::<u32>() {
                self.rate_limit.max_requests = value.max(1);
            }
        }
        if let Ok(raw) = std::env::var("RATE_LIMIT_WINDOW") {
            if let Ok(value) = raw.trim().parse::<u64>() {
                self.rate_limit.window_secs = value.max(1);
            }
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = std::env::var(name).ok()?;
    Some(matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

/// Planning pipeline knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Bound on validate -> repair -> validate rounds
    #[serde(rename = "max-repair-rounds")]
    pub max_repair_rounds: u32,

    /// Per-request deadline in milliseconds
    #[serde(rename = "request-deadline-ms")]
    pub request_deadline_ms: u64,

    /// Activity + travel budget per day, in hours
    #[serde(rename = "daily-activity-hours")]
    pub daily_activity_hours: f64,

    /// Anchor for the peak-season window (window is +/- `peak-window-days`)
    #[serde(rename = "spring-festival-date")]
    pub spring_festival_date: NaiveDate,

    #[serde(rename = "peak-window-days")]
    pub peak_window_days: i64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_repair_rounds: 3,
            request_deadline_ms: 60_000,
            daily_activity_hours: 8.0,
            spring_festival_date: NaiveDate::from_ymd_opt(2026, 2, 17).expect("valid date"),
            peak_window_days: 7,
        }
    }
}

impl PlannerConfig {
    /// Whether any trip day falls within the configured peak window
    pub fn in_peak_window(&self, date: NaiveDate) -> bool {
        let delta = (date - self.spring_festival_date).num_days().abs();
        delta <= self.peak_window_days
    }
}

/// Routing provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Always call the real route provider
    Real,
    /// Always use the deterministic fixture
    Fixture,
    /// Real when a map key is configured, fixture otherwise
    #[default]
    Auto,
}

impl std::str::FromStr for RoutingMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "real" => Ok(Self::Real),
            "fixture" => Ok(Self::Fixture),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown routing mode: {other}")),
        }
    }
}

/// External provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Environment variable containing the map provider API key
    #[serde(rename = "map-api-key-env")]
    pub map_api_key_env: String,

    /// Map provider base URL
    #[serde(rename = "map-base-url")]
    pub map_base_url: String,

    /// Map call timeout in milliseconds
    #[serde(rename = "map-timeout-ms")]
    pub map_timeout_ms: u64,

    pub routing: RoutingMode,

    /// Fail fast instead of degrading when required external data is missing
    #[serde(rename = "strict-external-data")]
    pub strict_external_data: bool,

    /// Path to a curated POI dataset file; embedded dataset when unset
    #[serde(rename = "poi-dataset-path")]
    pub poi_dataset_path: Option<PathBuf>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            map_api_key_env: "MAP_API_KEY".to_string(),
            map_base_url: "https://restapi.map.example.com/v3".to_string(),
            map_timeout_ms: 5_000,
            routing: RoutingMode::Auto,
            strict_external_data: false,
            poi_dataset_path: None,
        }
    }
}

impl ProvidersConfig {
    /// The configured map API key, if present and non-empty
    pub fn map_api_key(&self) -> Option<String> {
        std::env::var(&self.map_api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
    }
}

/// LLM provider configuration. An empty provider means template mode: no LLM
/// calls are made and deterministic fallbacks are used everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" compatible endpoints) or "" for template mode
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            model: "qwen-plus".to_string(),
            api_key_env: "LLM_API_KEY".to_string(),
            base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
            max_tokens: 2048,
            timeout_ms: 30_000,
        }
    }
}

impl LlmConfig {
    pub fn get_api_key(&self) -> Result<String> {
        let key = std::env::var(&self.api_key_env)
            .context(format!("API key env var {} not set", self.api_key_env))?;
        let key = key.trim().to_string();
        if key.is_empty() {
            eyre::bail!("API key env var {} is empty", self.api_key_env);
        }
        Ok(key)
    }
}

/// Budget accounting defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Minimum daily food spend per person
    #[serde(rename = "food-min-per-person-per-day")]
    pub food_min_per_person_per_day: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            food_min_per_person_per_day: 60.0,
        }
    }
}

/// Per-client rate limiting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Tokens available per window
    #[serde(rename = "max-requests")]
    pub max_requests: u32,

    /// Window length in seconds
    #[serde(rename = "window-secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_secs: 60,
        }
    }
}

/// Session store sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    #[serde(rename = "ttl-secs")]
    pub ttl_secs: u64,

    #[serde(rename = "max-sessions")]
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 1_800,
            max_sessions: 1_000,
        }
    }
}

/// POI/route cache sizing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,

    #[serde(rename = "ttl-secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl_secs: 3_600,
        }
    }
}

/// Mutable runtime flags, read once per request.
///
/// Unlike `Config`, these may be flipped while the process runs.
#[derive(Debug, Default)]
pub struct RuntimeFlags {
    strict_required_fields: AtomicBool,
    engine_version: AtomicU32,
}

impl RuntimeFlags {
    pub fn strict_required_fields(&self) -> bool {
        self.strict_required_fields.load(Ordering::Relaxed)
    }

    pub fn set_strict_required_fields(&self, value: bool) {
        self.strict_required_fields.store(value, Ordering::Relaxed);
    }

    pub fn engine_version(&self) -> u32 {
        self.engine_version.load(Ordering::Relaxed)
    }

    pub fn set_engine_version(&self, value: u32) {
        self.engine_version.store(value, Ordering::Relaxed);
    }
}
