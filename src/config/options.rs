// src/config/options.rs
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::consts::*;

/// Everything a run needs, built once and handed to each component.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct AppOptions {
    pub fetch: FetchOptions,
    pub http: HttpOptions,
    pub store: StoreOptions,
    pub endpoints: SourceEndpoints,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DatasetKind {
    Vaccination,
    DailyStats,
    Regional,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [Self::Vaccination, Self::DailyStats, Self::Regional];

    /// Stable name; also the cache file stem.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vaccination => "vaccination",
            Self::DailyStats  => "daily_stats",
            Self::Regional    => "regional",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Vaccination => "Vaccination",
            Self::DailyStats  => "Daily stats",
            Self::Regional    => "Regional",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DatasetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "vaccination" | "vax" => Ok(Self::Vaccination),
            "daily_stats" | "daily" | "stats" => Ok(Self::DailyStats),
            "regional" | "region" => Ok(Self::Regional),
            other => Err(format!("Unknown dataset: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchOptions {
    /// Consult the cache before touching the network.
    pub use_cache: bool,
    /// A cache younger than this many days is fresh.
    pub cache_days: u32,
    /// Whole-run attempts (not per source).
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_days: DEFAULT_CACHE_DAYS,
            retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_secs(RETRY_DELAY_SECS),
        }
    }
}

impl FetchOptions {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(u64::from(self.cache_days) * 24 * 60 * 60)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpOptions {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
            user_agent: s!(USER_AGENT),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    /// Cache snapshots + debug log.
    pub dir: PathBuf,
    /// Processed tables and summary.
    pub out_dir: PathBuf,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(STORE_DIR),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
        }
    }
}

impl StoreOptions {
    pub fn with_dir(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf(), ..Self::default() }
    }

    pub fn debug_log_path(&self) -> PathBuf {
        self.dir.join(DEBUG_LOG_FILE)
    }
}

/// Remote endpoints per source. Defaults point at the public services.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceEndpoints {
    pub kdca_vaccine_stat: String,
    pub kdca_inf_state: String,
    pub mohw_vaccination: String,
    pub mohw_daily: String,
    pub owid_vaccination: String,
    pub owid_daily: String,
    pub jhu_confirmed: String,
    pub jhu_deaths: String,
    pub who_daily: String,
    pub community_daily: String,
    pub community_regional: String,
    pub kdca_dashboard: String,
    pub news: Vec<String>,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        Self {
            kdca_vaccine_stat: s!(KDCA_VACCINE_STAT_URL),
            kdca_inf_state: s!(KDCA_INF_STATE_URL),
            mohw_vaccination: s!(MOHW_VACCINATION_URL),
            mohw_daily: s!(MOHW_DAILY_URL),
            owid_vaccination: s!(OWID_VACCINATION_URL),
            owid_daily: s!(OWID_DAILY_URL),
            jhu_confirmed: s!(JHU_CONFIRMED_URL),
            jhu_deaths: s!(JHU_DEATHS_URL),
            who_daily: s!(WHO_DAILY_URL),
            community_daily: s!(COMMUNITY_DAILY_URL),
            community_regional: s!(COMMUNITY_REGIONAL_URL),
            kdca_dashboard: s!(KDCA_DASHBOARD_URL),
            news: NEWS_URLS.iter().map(|u| s!(*u)).collect(),
        }
    }
}
