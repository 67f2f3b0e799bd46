use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::api::{self, Category};
use crate::config;
use crate::feed::{FeedController, FeedSource, SectionKind};
use crate::logging;
use crate::news::NewsTicker;
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_file: Option<PathBuf>,
}

pub fn run(options: RunOptions) -> Result<()> {
    let config_path = options.config_file.clone().or_else(config::default_path);
    let cfg = config::load(config::LoadOptions {
        config_file: options.config_file,
        env_prefix: None,
    })
    .context("load config")?;

    let log_path = logging::init(&cfg.log).context("init logging")?;
    info!(version = crate::VERSION, "starting");

    let client = api::Client::new(api::ClientConfig {
        base_url: cfg.api.base_url.clone(),
        user_agent: cfg.api.user_agent.clone(),
        timeout: cfg.api.timeout,
        http_client: None,
    })
    .context("create hackernews client")?;

    let feeds = vec![
        FeedController::new(
            SectionKind::Stories,
            FeedSource::Category(cfg.feeds.stories_category),
            cfg.feeds.settings(cfg.feeds.stories_cache),
        ),
        FeedController::new(
            SectionKind::Jobs,
            FeedSource::Category(Category::Job),
            cfg.feeds.settings(cfg.feeds.jobs_cache),
        ),
        FeedController::new(
            SectionKind::Polls,
            FeedSource::Fixed(cfg.feeds.poll_ids.clone()),
            cfg.feeds.settings(cfg.feeds.polls_cache),
        ),
    ];

    let mut status = format!("Config: {}", friendly_path(config_path.as_ref()));
    if let Some(path) = log_path.as_ref() {
        status.push_str(&format!(" · Log: {}", friendly_path(Some(path))));
    }

    let mut model = ui::Model::new(ui::Options {
        source: Arc::new(client),
        feeds,
        news: NewsTicker::new(cfg.news.settings()),
        comment_fanout: cfg.feeds.comment_fanout,
        status_message: status,
    });
    model.run()?;

    info!("exiting");
    Ok(())
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/hn-feeds/config.yaml".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_path_collapses_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let path = home.join(".config/hn-feeds/config.yaml");
        assert_eq!(
            friendly_path(Some(&path)),
            "~/.config/hn-feeds/config.yaml"
        );
        assert_eq!(friendly_path(Some(&home)), "~");
    }

    #[test]
    fn friendly_path_defaults_when_missing() {
        assert_eq!(friendly_path(None), "~/.config/hn-feeds/config.yaml");
        let outside = PathBuf::from("/definitely/not/home/config.yaml");
        assert_eq!(
            friendly_path(Some(&outside)),
            "/definitely/not/home/config.yaml"
        );
    }
}
