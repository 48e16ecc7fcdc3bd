use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub store: StoreConfig,
    pub ingestion: IngestionConfig,
    pub vector: VectorConfig,
    pub query: QueryConfig,
    pub answer: AnswerConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

/// Store selection (spec §6 "Configuration"): two SQLite DSNs with disjoint
/// `global_profile_id` ranges fixed at store-creation time.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub dev_dsn: String,
    pub live_dsn: String,
    pub dev_id_range: (i64, i64),
    pub live_id_range: (i64, i64),
    /// Path to the one-writer-per-store lock file guarding the live store
    /// during ingestion (spec §5).
    pub live_lock_path: String,
}

/// Ingestion tick parameters (spec §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub remote_root_url: String,
    pub accept_globs: Vec<String>,
    pub file_budget_per_tick: usize,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub per_file_timeout_s: u64,
    pub retry_max: u32,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub backoff_base_s: u64,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub tick_wall_clock_s: u64,
    pub error_rate_tolerance: f64,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub tick_interval_s: u64,
    pub fingerprint_map_path: String,
    /// Consecutive write-fault limit before a tick aborts with `error`
    /// (spec §7).
    pub max_consecutive_write_faults: i64,
}

/// Vector index parameters (spec §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    pub qdrant_url: String,
    pub collection_name: String,
    pub embedding_dim: u64,
    pub top_k_default: u64,
}

/// Query-time parameters (spec §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub row_cap: i64,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub sql_timeout_s: u64,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub cache_ttl_s: u64,
    pub cache_max_entries: usize,
    /// Depth-bin width for aggregated queries (Open Question 3), in meters.
    pub depth_bin_width_m: f64,
    pub max_depth_m: f64,
}

/// Answer synthesizer rendering budget (spec §6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnswerConfig {
    pub max_sentences_informational: usize,
    pub max_sentences_data: usize,
}

/// Embedding capability configuration (spec §4.4, §9). When `api_base` is
/// empty the embedding client falls back to a deterministic stub so
/// ingestion and query-time semantic search remain usable without a live
/// provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub api_base: String,
    pub api_key: String,
    pub model_name: String,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub timeout_s: u64,
}

/// Narration capability configuration (spec §4.9, §9). Same degrade-to-stub
/// behavior as embeddings when unconfigured.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model_name: String,
    #[serde(deserialize_with = "deserialize_duration_secs")]
    pub timeout_s: u64,
}

/// Command line arguments for configuration overrides
#[derive(Parser, Debug, Clone)]
#[command(name = "floatchat")]
#[command(version, about = "FloatChat - Argo ocean data ingestion and query service")]
pub struct CommandLineArgs {
    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<String>,

    /// Server host (overrides config file)
    #[arg(long, value_name = "HOST")]
    pub server_host: Option<String>,

    /// Server port (overrides config file)
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Logging level (overrides config file, e.g., "info,floatchat_core=debug")
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Live store DSN (overrides config file)
    #[arg(long, value_name = "DSN")]
    pub live_dsn: Option<String>,

    /// Ingestion tick interval (overrides config file, e.g., "1h", "3600")
    #[arg(long, value_name = "DURATION")]
    pub tick_interval: Option<String>,

    /// Disable the ingestion scheduled task entirely (one-shot server mode)
    #[arg(long)]
    pub no_ingestion: bool,
}

impl Config {
    /// Load configuration with command line, environment variable, and file
    /// support.
    ///
    /// Loading order (priority from highest to lowest):
    /// 1. Command line arguments
    /// 2. Environment variables (prefixed with APP_)
    /// 3. Configuration file (config.toml)
    /// 4. Default values
    pub fn load() -> Result<Self, anyhow::Error> {
        let cli_args = CommandLineArgs::parse();

        let config_path = cli_args.config.clone().or_else(Self::find_config_file);
        let mut config = if let Some(config_path) = config_path {
            Self::from_toml(&config_path)?
        } else {
            tracing::warn!("Configuration file not found, using defaults");
            Config::default()
        };

        config.apply_env_overrides();
        config.apply_cli_overrides(&cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported environment variables:
    /// - APP_SERVER_HOST / APP_SERVER_PORT
    /// - APP_LOG_LEVEL
    /// - APP_LIVE_DSN / APP_DEV_DSN
    /// - APP_REMOTE_ROOT_URL
    /// - APP_TICK_INTERVAL_S (accepts "1h", "3600")
    /// - APP_QDRANT_URL
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("APP_SERVER_HOST") {
            self.server.host = host;
            tracing::info!("Override server.host from env: {}", self.server.host);
        }

        if let Ok(port) = std::env::var("APP_SERVER_PORT")
            && let Ok(port) = port.parse()
        {
            self.server.port = port;
            tracing::info!("Override server.port from env: {}", self.server.port);
        }

        if let Ok(level) = std::env::var("APP_LOG_LEVEL") {
            self.logging.level = level;
            tracing::info!("Override logging.level from env: {}", self.logging.level);
        }

        if let Ok(dsn) = std::env::var("APP_LIVE_DSN") {
            self.store.live_dsn = dsn;
            tracing::info!("Override store.live_dsn from env");
        }

        if let Ok(dsn) = std::env::var("APP_DEV_DSN") {
            self.store.dev_dsn = dsn;
            tracing::info!("Override store.dev_dsn from env");
        }

        if let Ok(url) = std::env::var("APP_REMOTE_ROOT_URL") {
            self.ingestion.remote_root_url = url;
            tracing::info!("Override ingestion.remote_root_url from env");
        }

        if let Ok(interval) = std::env::var("APP_TICK_INTERVAL_S") {
            match parse_duration_to_secs(&interval) {
                Ok(val) => {
                    self.ingestion.tick_interval_s = val;
                    tracing::info!("Override ingestion.tick_interval_s from env: {}", val);
                },
                Err(e) => tracing::warn!(
                    "Invalid APP_TICK_INTERVAL_S '{}': {} (keep {})",
                    interval,
                    e,
                    self.ingestion.tick_interval_s
                ),
            }
        }

        if let Ok(url) = std::env::var("APP_QDRANT_URL") {
            self.vector.qdrant_url = url;
            tracing::info!("Override vector.qdrant_url from env");
        }

        if let Ok(key) = std::env::var("APP_EMBEDDING_API_KEY") {
            self.embedding.api_key = key;
            tracing::info!("Override embedding.api_key from env");
        }

        if let Ok(key) = std::env::var("APP_LLM_API_KEY") {
            self.llm.api_key = key;
            tracing::info!("Override llm.api_key from env");
        }
    }

    /// Apply command line argument overrides (highest priority)
    fn apply_cli_overrides(&mut self, args: &CommandLineArgs) {
        if let Some(host) = &args.server_host {
            self.server.host = host.clone();
            tracing::info!("Override server.host from CLI: {}", self.server.host);
        }

        if let Some(port) = args.server_port {
            self.server.port = port;
            tracing::info!("Override server.port from CLI: {}", self.server.port);
        }

        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
            tracing::info!("Override logging.level from CLI: {}", self.logging.level);
        }

        if let Some(dsn) = &args.live_dsn {
            self.store.live_dsn = dsn.clone();
            tracing::info!("Override store.live_dsn from CLI");
        }

        if let Some(interval) = &args.tick_interval {
            match parse_duration_to_secs(interval) {
                Ok(val) => {
                    self.ingestion.tick_interval_s = val;
                    tracing::info!("Override ingestion.tick_interval_s from CLI: {}", val);
                },
                Err(e) => tracing::warn!(
                    "Invalid --tick-interval '{}': {} (keep {})",
                    interval,
                    e,
                    self.ingestion.tick_interval_s
                ),
            }
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.server.port == 0 {
            anyhow::bail!("Server port cannot be 0");
        }

        if self.store.dev_dsn.is_empty() || self.store.live_dsn.is_empty() {
            anyhow::bail!("store.dev_dsn and store.live_dsn cannot be empty");
        }

        if self.store.dev_id_range.1 <= self.store.dev_id_range.0 {
            anyhow::bail!("store.dev_id_range must be non-empty (start < end)");
        }
        if self.store.live_id_range.1 <= self.store.live_id_range.0 {
            anyhow::bail!("store.live_id_range must be non-empty (start < end)");
        }
        let (dev_lo, dev_hi) = self.store.dev_id_range;
        let (live_lo, live_hi) = self.store.live_id_range;
        if dev_lo < dev_hi && live_lo < live_hi && dev_hi > live_lo && live_hi > dev_lo {
            anyhow::bail!(
                "store.dev_id_range and store.live_id_range must be disjoint (spec §3 invariant)"
            );
        }

        if self.ingestion.tick_interval_s < 3600 {
            tracing::warn!(
                "ingestion.tick_interval_s ({}) is below the spec's one-hour floor",
                self.ingestion.tick_interval_s
            );
        }

        if self.query.row_cap <= 0 {
            anyhow::bail!("query.row_cap must be > 0");
        }
        if self.query.depth_bin_width_m <= 0.0 {
            anyhow::bail!("query.depth_bin_width_m must be > 0");
        }

        Ok(())
    }

    fn find_config_file() -> Option<String> {
        let possible_paths = ["conf/config.toml", "config.toml", "./conf/config.toml", "./config.toml"];

        for path in &possible_paths {
            if Path::new(path).exists() {
                return Some(path.to_string());
            }
        }
        None
    }

    fn from_toml(path: &str) -> Result<Self, anyhow::Error> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info,floatchat_core=debug".to_string(),
            file: Some("logs/floatchat.log".to_string()),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dev_dsn: "sqlite://data/dev.db".to_string(),
            live_dsn: "sqlite://data/live.db".to_string(),
            dev_id_range: (1, 1_000_000_000),
            live_id_range: (1_000_000_000, 2_000_000_000),
            live_lock_path: "data/live.lock".to_string(),
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            remote_root_url: "https://data-argo.ifremer.fr/dac".to_string(),
            accept_globs: vec!["*_prof.nc".to_string(), "*_prof.bin".to_string()],
            file_budget_per_tick: 500,
            per_file_timeout_s: 30,
            retry_max: 3,
            backoff_base_s: 2,
            tick_wall_clock_s: 1800,
            error_rate_tolerance: 0.1,
            tick_interval_s: 3600,
            fingerprint_map_path: "data/fingerprints.json".to_string(),
            max_consecutive_write_faults: 5,
        }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6334".to_string(),
            collection_name: "argo_profiles".to_string(),
            embedding_dim: 384,
            top_k_default: 20,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            row_cap: 500,
            sql_timeout_s: 10,
            cache_ttl_s: 300,
            cache_max_entries: 1000,
            depth_bin_width_m: 50.0,
            max_depth_m: 2000.0,
        }
    }
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self { max_sentences_informational: 4, max_sentences_data: 4 }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model_name: "text-embedding-3-small".to_string(),
            timeout_s: 30,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model_name: "gpt-4o-mini".to_string(),
            timeout_s: 60,
        }
    }
}

// =========================
// Helpers for parsing values
// =========================

fn parse_duration_to_secs(input: &str) -> Result<u64, String> {
    if let Ok(val) = input.parse::<u64>() {
        return Ok(val);
    }

    let s = input.trim().to_lowercase();
    let (num_str, unit) = s.split_at(s.chars().take_while(|c| c.is_ascii_digit()).count());
    if num_str.is_empty() || unit.is_empty() {
        return Err("missing number or unit".into());
    }
    let n: u64 = num_str.parse().map_err(|_| "invalid number".to_string())?;
    match unit {
        "s" | "sec" | "secs" | "second" | "seconds" => Ok(n),
        "m" | "min" | "mins" | "minute" | "minutes" => Ok(n * 60),
        "h" | "hr" | "hour" | "hours" => Ok(n * 60 * 60),
        "d" | "day" | "days" => Ok(n * 60 * 60 * 24),
        _ => Err(format!("unsupported unit: {}", unit)),
    }
}

fn deserialize_duration_secs<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct Visitor;
    impl<'de> serde::de::Visitor<'de> for Visitor {
        type Value = u64;
        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "a number of seconds or a string like '30s', '5m', '1h'")
        }
        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(v)
        }
        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if v >= 0 { Ok(v as u64) } else { Err(E::custom("negative not allowed")) }
        }
        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(v).map_err(E::custom)
        }
        fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            parse_duration_to_secs(&v).map_err(E::custom)
        }
    }
    deserializer.deserialize_any(Visitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn overlapping_id_ranges_are_rejected() {
        let mut config = Config::default();
        config.store.live_id_range = (0, 2_000_000_000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_duration_suffixes() {
        assert_eq!(parse_duration_to_secs("30s").unwrap(), 30);
        assert_eq!(parse_duration_to_secs("5m").unwrap(), 300);
        assert_eq!(parse_duration_to_secs("1h").unwrap(), 3600);
        assert_eq!(parse_duration_to_secs("3600").unwrap(), 3600);
    }
}
