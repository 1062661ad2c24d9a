use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::models::{DimensionPenalty, PenaltyTable, ProximityBucket, RankingWeights};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub matching: MatchingSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub watcher: WatcherSettings,
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

#[derive(Debug, Clone, Deserialize)]
pub struct CacheSettings {
    pub redis_url: String,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
}

impl CacheSettings {
    /// Lifetime of cached entries in both tiers
    ///
    /// Preferred categories are read through this cache, so a new favorite
    /// or rental shows up in recommendations at most this late.
    pub fn entry_ttl_secs(&self) -> u64 {
        self.ttl_secs.unwrap_or(30)
    }

    pub fn l1_size(&self) -> u64 {
        self.l1_cache_size.unwrap_or(1000)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingSettings {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// Recommendation candidates fetched per requested result
    #[serde(default = "default_over_fetch")]
    pub recommendation_over_fetch: usize,
    #[serde(default = "default_professional_radius")]
    pub professional_radius_km: f64,
    #[serde(default = "default_professional_limit")]
    pub professional_limit: usize,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            recommendation_over_fetch: default_over_fetch(),
            professional_radius_km: default_professional_radius(),
            professional_limit: default_professional_limit(),
        }
    }
}

impl MatchingSettings {
    /// Requested limit, defaulted and clamped
    pub fn limit(&self, requested: Option<u16>) -> usize {
        requested
            .map(usize::from)
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit)
    }
}

fn default_limit() -> usize { 20 }
fn default_max_limit() -> usize { 100 }
fn default_over_fetch() -> usize { 3 }
fn default_professional_radius() -> f64 { 50.0 }
fn default_professional_limit() -> usize { 10 }

/// Penalty per unit of difference and its cap, for one dimension
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PenaltyConfig {
    pub per_unit: f64,
    pub cap: f64,
}

impl From<PenaltyConfig> for DimensionPenalty {
    fn from(value: PenaltyConfig) -> Self {
        DimensionPenalty::new(value.per_unit, value.cap)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PenaltiesConfig {
    pub shoulder_width: PenaltyConfig,
    pub chest: PenaltyConfig,
    pub waist: PenaltyConfig,
    pub hip: PenaltyConfig,
    pub inseam: PenaltyConfig,
    pub shoe_size: PenaltyConfig,
}

impl Default for PenaltiesConfig {
    fn default() -> Self {
        let table = PenaltyTable::default();
        let cfg = |p: DimensionPenalty| PenaltyConfig { per_unit: p.per_unit, cap: p.cap };
        Self {
            shoulder_width: cfg(table.shoulder_width),
            chest: cfg(table.chest),
            waist: cfg(table.waist),
            hip: cfg(table.hip),
            inseam: cfg(table.inseam),
            shoe_size: cfg(table.shoe_size),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BucketConfig {
    pub max_km: f64,
    pub points: f64,
}

/// Ranking constants; every default reproduces the marketplace's weights
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringSettings {
    #[serde(default = "default_baseline")]
    pub baseline: f64,
    #[serde(default = "default_compatibility_weight")]
    pub compatibility_weight: f64,
    #[serde(default)]
    pub penalties: PenaltiesConfig,
    #[serde(default = "default_proximity")]
    pub proximity: Vec<BucketConfig>,
    #[serde(default = "default_rating_points")]
    pub rating_points: f64,
    #[serde(default = "default_rating_scale")]
    pub rating_scale: f64,
    #[serde(default = "default_popularity_cap")]
    pub popularity_cap: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            baseline: default_baseline(),
            compatibility_weight: default_compatibility_weight(),
            penalties: PenaltiesConfig::default(),
            proximity: default_proximity(),
            rating_points: default_rating_points(),
            rating_scale: default_rating_scale(),
            popularity_cap: default_popularity_cap(),
        }
    }
}

impl ScoringSettings {
    pub fn to_weights(&self) -> RankingWeights {
        let mut proximity: Vec<ProximityBucket> = self
            .proximity
            .iter()
            .map(|b| ProximityBucket { max_km: b.max_km, points: b.points })
            .collect();
        proximity.sort_by(|a, b| a.max_km.total_cmp(&b.max_km));

        RankingWeights {
            baseline: self.baseline,
            penalties: PenaltyTable {
                shoulder_width: self.penalties.shoulder_width.into(),
                chest: self.penalties.chest.into(),
                waist: self.penalties.waist.into(),
                hip: self.penalties.hip.into(),
                inseam: self.penalties.inseam.into(),
                shoe_size: self.penalties.shoe_size.into(),
            },
            compatibility: self.compatibility_weight,
            proximity,
            rating_points: self.rating_points,
            rating_scale: self.rating_scale,
            popularity_cap: self.popularity_cap,
        }
    }
}

fn default_baseline() -> f64 { 100.0 }
fn default_compatibility_weight() -> f64 { 0.6 }
fn default_rating_points() -> f64 { 10.0 }
fn default_rating_scale() -> f64 { 5.0 }
fn default_popularity_cap() -> f64 { 5.0 }

fn default_proximity() -> Vec<BucketConfig> {
    RankingWeights::default()
        .proximity
        .into_iter()
        .map(|b| BucketConfig { max_km: b.max_km, points: b.points })
        .collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatcherSettings {
    #[serde(default = "default_ceiling_secs")]
    pub ceiling_secs: u64,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_marker_ttl_secs")]
    pub marker_ttl_secs: u64,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            ceiling_secs: default_ceiling_secs(),
            interval_secs: default_interval_secs(),
            marker_ttl_secs: default_marker_ttl_secs(),
        }
    }
}

impl WatcherSettings {
    pub fn ceiling(&self) -> Duration {
        Duration::from_secs(self.ceiling_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn marker_ttl(&self) -> Duration {
        Duration::from_secs(self.marker_ttl_secs)
    }
}

fn default_ceiling_secs() -> u64 { 25 }
fn default_interval_secs() -> u64 { 2 }
fn default_marker_ttl_secs() -> u64 { 60 }

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
    /// 2. Configuration file (config/default.toml, then config/local.toml)
    /// 3. Environment variables (prefixed with CLOSET__)
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., CLOSET__SERVER__PORT -> server.port
            .add_source(
                Environment::with_prefix("CLOSET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }

    /// Load configuration from a custom path instead of `config/`
    ///
    /// Environment overrides still apply on top of the file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("CLOSET")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        substitute_env_vars(settings)?.try_deserialize()
    }
}

/// Apply the conventional unprefixed variables on top of the layered config
fn substitute_env_vars(settings: Config) -> Result<Config, ConfigError> {
    use std::env;

    let mut builder = Config::builder().add_source(settings);

    if let Ok(database_url) = env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", database_url)?;
    }
    if let Ok(redis_url) = env::var("REDIS_URL") {
        builder = builder.set_override("cache.redis_url", redis_url)?;
    }
    if let Ok(secret) = env::var("JWT_SECRET") {
        builder = builder.set_override("auth.jwt_secret", secret)?;
    }

    builder.build()
}
