use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{self, Category};
use crate::cache::CachePolicy;
use crate::feed::{self, FeedSettings};
use crate::news::NewsSettings;

const DEFAULT_ENV_PREFIX: &str = "HN_FEEDS";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    api::HN_API_BASE.to_string()
}

fn default_user_agent() -> String {
    format!("hn-feeds/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedsConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_load_delay", with = "humantime_serde")]
    pub load_delay: Duration,
    #[serde(default = "default_comment_fanout")]
    pub comment_fanout: usize,
    #[serde(default)]
    pub stories_category: Category,
    #[serde(default = "default_poll_ids")]
    pub poll_ids: Vec<i64>,
    #[serde(default)]
    pub stories_cache: CachePolicy,
    #[serde(default = "default_jobs_cache")]
    pub jobs_cache: CachePolicy,
    #[serde(default)]
    pub polls_cache: CachePolicy,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            load_delay: default_load_delay(),
            comment_fanout: default_comment_fanout(),
            stories_category: Category::Top,
            poll_ids: default_poll_ids(),
            stories_cache: CachePolicy::Retain,
            jobs_cache: default_jobs_cache(),
            polls_cache: CachePolicy::Retain,
        }
    }
}

impl FeedsConfig {
    pub fn settings(&self, cache_policy: CachePolicy) -> FeedSettings {
        FeedSettings {
            batch_size: self.batch_size,
            load_delay: self.load_delay,
            cache_policy,
        }
    }
}

fn default_batch_size() -> usize {
    feed::DEFAULT_BATCH_SIZE
}

fn default_load_delay() -> Duration {
    feed::DEFAULT_LOAD_DELAY
}

fn default_comment_fanout() -> usize {
    crate::comments::DEFAULT_FANOUT
}

fn default_poll_ids() -> Vec<i64> {
    feed::DEFAULT_POLL_IDS.to_vec()
}

fn default_jobs_cache() -> CachePolicy {
    CachePolicy::ClearOnCollapse
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsConfig {
    #[serde(default = "default_refresh_interval", with = "humantime_serde")]
    pub refresh_interval: Duration,
    #[serde(default = "default_banner_ttl", with = "humantime_serde")]
    pub banner_ttl: Duration,
    #[serde(default = "default_news_count")]
    pub count: usize,
    #[serde(default = "default_scan_limit")]
    pub scan_limit: usize,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            banner_ttl: default_banner_ttl(),
            count: default_news_count(),
            scan_limit: default_scan_limit(),
        }
    }
}

impl NewsConfig {
    pub fn settings(&self) -> NewsSettings {
        NewsSettings {
            refresh_interval: self.refresh_interval,
            banner_ttl: self.banner_ttl,
            count: self.count,
            scan_limit: self.scan_limit,
        }
    }
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_banner_ttl() -> Duration {
    Duration::from_secs(3)
}

fn default_news_count() -> usize {
    5
}

fn default_scan_limit() -> usize {
    api::DEFAULT_SCAN_LIMIT
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    validate(&cfg)?;
    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn validate(cfg: &Config) -> Result<()> {
    url::Url::parse(&cfg.api.base_url)
        .with_context(|| format!("config: api.base_url {:?} is not a URL", cfg.api.base_url))?;
    anyhow::ensure!(
        !cfg.api.user_agent.trim().is_empty(),
        "config: api.user_agent is required"
    );
    anyhow::ensure!(cfg.feeds.batch_size > 0, "config: feeds.batch_size must be positive");
    anyhow::ensure!(
        cfg.feeds.comment_fanout > 0,
        "config: feeds.comment_fanout must be positive"
    );
    anyhow::ensure!(
        !cfg.news.refresh_interval.is_zero(),
        "config: news.refresh_interval must be positive"
    );
    Ok(())
}

/// Copies every value of `other` that differs from the built-in default.
fn merge_config(mut base: Config, other: Config) -> Config {
    let defaults = Config::default();

    take(&mut base.api.base_url, other.api.base_url, &defaults.api.base_url);
    take(&mut base.api.user_agent, other.api.user_agent, &defaults.api.user_agent);
    take(&mut base.api.timeout, other.api.timeout, &defaults.api.timeout);

    take(&mut base.feeds.batch_size, other.feeds.batch_size, &defaults.feeds.batch_size);
    take(&mut base.feeds.load_delay, other.feeds.load_delay, &defaults.feeds.load_delay);
    take(
        &mut base.feeds.comment_fanout,
        other.feeds.comment_fanout,
        &defaults.feeds.comment_fanout,
    );
    take(
        &mut base.feeds.stories_category,
        other.feeds.stories_category,
        &defaults.feeds.stories_category,
    );
    take(&mut base.feeds.poll_ids, other.feeds.poll_ids, &defaults.feeds.poll_ids);
    take(
        &mut base.feeds.stories_cache,
        other.feeds.stories_cache,
        &defaults.feeds.stories_cache,
    );
    take(&mut base.feeds.jobs_cache, other.feeds.jobs_cache, &defaults.feeds.jobs_cache);
    take(&mut base.feeds.polls_cache, other.feeds.polls_cache, &defaults.feeds.polls_cache);

    take(
        &mut base.news.refresh_interval,
        other.news.refresh_interval,
        &defaults.news.refresh_interval,
    );
    take(&mut base.news.banner_ttl, other.news.banner_ttl, &defaults.news.banner_ttl);
    take(&mut base.news.count, other.news.count, &defaults.news.count);
    take(&mut base.news.scan_limit, other.news.scan_limit, &defaults.news.scan_limit);

    take(&mut base.log.level, other.log.level, &defaults.log.level);
    if other.log.file.is_some() {
        base.log.file = other.log.file;
    }

    base
}

fn take<T: PartialEq>(slot: &mut T, value: T, default: &T) {
    if &value != default {
        *slot = value;
    }
}

/// Applies `<PREFIX>_SECTION__KEY` variables on top of `cfg`. A variable that
/// is set always wins, even when it names the built-in default.
fn apply_env(cfg: &mut Config, prefix: &str) {
    let upper_prefix = format!("{}_", prefix.to_uppercase());
    let mut overrides: Vec<(String, String)> = env::vars()
        .filter_map(|(key, value)| {
            let stripped = key.strip_prefix(&upper_prefix)?;
            Some((stripped.to_ascii_lowercase().replace("__", "."), value))
        })
        .collect();
    overrides.sort();

    for (key, value) in overrides {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "feeds.batch_size" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feeds.batch_size = parsed;
            }
        }
        "feeds.load_delay" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.feeds.load_delay = duration;
            }
        }
        "feeds.comment_fanout" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.feeds.comment_fanout = parsed;
            }
        }
        "feeds.stories_category" => {
            if let Some(category) = Category::parse(&value) {
                cfg.feeds.stories_category = category;
            }
        }
        "feeds.poll_ids" => {
            cfg.feeds.poll_ids = value
                .split(',')
                .filter_map(|s| s.trim().parse::<i64>().ok())
                .collect();
        }
        "feeds.stories_cache" | "feeds.jobs_cache" | "feeds.polls_cache" => {
            if let Some(policy) = CachePolicy::parse(&value) {
                match key {
                    "feeds.stories_cache" => cfg.feeds.stories_cache = policy,
                    "feeds.jobs_cache" => cfg.feeds.jobs_cache = policy,
                    _ => cfg.feeds.polls_cache = policy,
                }
            }
        }
        "news.refresh_interval" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.news.refresh_interval = duration;
            }
        }
        "news.banner_ttl" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.news.banner_ttl = duration;
            }
        }
        "news.count" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.news.count = parsed;
            }
        }
        "news.scan_limit" => {
            if let Ok(parsed) = value.parse::<usize>() {
                cfg.news.scan_limit = parsed;
            }
        }
        "log.level" => cfg.log.level = value,
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("hn-feeds").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    fn isolated(prefix: &str) -> (tempfile::TempDir, LoadOptions) {
        let dir = tempdir().unwrap();
        let options = LoadOptions {
            config_file: Some(dir.path().join("config.yaml")),
            env_prefix: Some(prefix.to_string()),
        };
        (dir, options)
    }

    #[test]
    fn load_defaults_without_files() {
        let (_dir, options) = isolated("HN_FEEDS_TEST_DEFAULTS");
        let cfg = load(options).unwrap();
        assert_eq!(cfg.api.base_url, api::HN_API_BASE);
        assert_eq!(cfg.feeds.batch_size, 5);
        assert_eq!(cfg.feeds.load_delay, Duration::from_secs(5));
        assert_eq!(cfg.feeds.jobs_cache, CachePolicy::ClearOnCollapse);
        assert_eq!(cfg.feeds.stories_cache, CachePolicy::Retain);
        assert_eq!(cfg.news.scan_limit, 500);
        assert_eq!(cfg.feeds.poll_ids.len(), 10);
    }

    #[test]
    fn file_values_override_defaults() {
        let (dir, options) = isolated("HN_FEEDS_TEST_FILE");
        fs::write(
            dir.path().join("config.yaml"),
            "feeds:\n  batch_size: 8\n  load_delay: 2s\n  stories_category: best\n  poll_ids: [1, 2]\nnews:\n  banner_ttl: 1s\n",
        )
        .unwrap();
        let cfg = load(options).unwrap();
        assert_eq!(cfg.feeds.batch_size, 8);
        assert_eq!(cfg.feeds.load_delay, Duration::from_secs(2));
        assert_eq!(cfg.feeds.stories_category, Category::Best);
        assert_eq!(cfg.feeds.poll_ids, vec![1, 2]);
        assert_eq!(cfg.news.banner_ttl, Duration::from_secs(1));
        assert_eq!(cfg.news.refresh_interval, Duration::from_secs(5));
    }

    #[test]
    fn env_overrides() {
        let (_dir, options) = isolated("HN_FEEDS_TEST_ENV");
        env::set_var("HN_FEEDS_TEST_ENV_FEEDS__POLL_IDS", "7, 8,x");
        env::set_var("HN_FEEDS_TEST_ENV_FEEDS__STORIES_CACHE", "clear_on_collapse");
        env::set_var("HN_FEEDS_TEST_ENV_NEWS__REFRESH_INTERVAL", "10s");
        let cfg = load(options).unwrap();
        env::remove_var("HN_FEEDS_TEST_ENV_FEEDS__POLL_IDS");
        env::remove_var("HN_FEEDS_TEST_ENV_FEEDS__STORIES_CACHE");
        env::remove_var("HN_FEEDS_TEST_ENV_NEWS__REFRESH_INTERVAL");
        assert_eq!(cfg.feeds.poll_ids, vec![7, 8]);
        assert_eq!(cfg.feeds.stories_cache, CachePolicy::ClearOnCollapse);
        assert_eq!(cfg.news.refresh_interval, Duration::from_secs(10));
    }

    #[test]
    fn env_default_value_overrides_file() {
        let (dir, options) = isolated("HN_FEEDS_TEST_ENV_DEFAULT");
        fs::write(
            dir.path().join("config.yaml"),
            "feeds:\n  batch_size: 8\n  jobs_cache: retain\n",
        )
        .unwrap();
        env::set_var("HN_FEEDS_TEST_ENV_DEFAULT_FEEDS__BATCH_SIZE", "5");
        env::set_var("HN_FEEDS_TEST_ENV_DEFAULT_FEEDS__JOBS_CACHE", "clear_on_collapse");
        let cfg = load(options).unwrap();
        env::remove_var("HN_FEEDS_TEST_ENV_DEFAULT_FEEDS__BATCH_SIZE");
        env::remove_var("HN_FEEDS_TEST_ENV_DEFAULT_FEEDS__JOBS_CACHE");
        assert_eq!(cfg.feeds.batch_size, 5);
        assert_eq!(cfg.feeds.jobs_cache, CachePolicy::ClearOnCollapse);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let (dir, options) = isolated("HN_FEEDS_TEST_INVALID");
        fs::write(dir.path().join("config.yaml"), "api:\n  base_url: not a url\n").unwrap();
        assert!(load(options).is_err());
    }

    #[test]
    fn unreadable_yaml_is_reported_with_path() {
        let (dir, options) = isolated("HN_FEEDS_TEST_BAD_YAML");
        fs::write(dir.path().join("config.yaml"), "feeds: [").unwrap();
        let err = load(options).unwrap_err();
        assert!(format!("{err:#}").contains("config.yaml"));
    }
}
