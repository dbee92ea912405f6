//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/cmon.sqlite"
//!
//! [scheduler]
//! buckets_hours = [8, 24, 168]
//!
//! [fetcher]
//! timeout_secs = 60
//!
//! [extractor]
//! interpreter = "python3"
//! html_script = "scripts/crawl_html.py"
//! script_script = "scripts/crawl_js.py"
//!
//! [repositories]
//! root = "./repos"
//!
//! [alerts]
//! public_base_url = "${PUBLIC_URL}"
//! discord_token = "${DISCORD_TOKEN}"
//! channel_id = "${MONITOR_THREAD}"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{MonitorError, Result};

/// Browser-like user agent sent with every endpoint fetch.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub repositories: RepositoriesConfig,
    pub alerts: AlertsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_buckets")]
    pub buckets_hours: Vec<u32>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            buckets_hours: default_buckets(),
        }
    }
}

fn default_buckets() -> Vec<u32> {
    vec![8, 24, 24 * 7]
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetcherConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// No deadline when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: None,
        }
    }
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractorConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Extractor for the `html` profile; receives the selector as argument.
    #[serde(default)]
    pub html_script: Option<PathBuf>,
    /// Extractor for every other profile.
    #[serde(default)]
    pub script_script: Option<PathBuf>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            html_script: None,
            script_script: None,
        }
    }
}

fn default_interpreter() -> String {
    "python3".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepositoriesConfig {
    #[serde(default = "default_repos_root")]
    pub root: PathBuf,
}

impl Default for RepositoriesConfig {
    fn default() -> Self {
        Self {
            root: default_repos_root(),
        }
    }
}

fn default_repos_root() -> PathBuf {
    PathBuf::from("./repos")
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    /// Base URL used to build links to stored diffs.
    pub public_base_url: String,
    #[serde(default)]
    pub discord_token: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
}

impl AlertsConfig {
    /// Discord credentials, when both are present and non-empty.
    pub fn discord(&self) -> Option<(&str, &str)> {
        match (self.discord_token.as_deref(), self.channel_id.as_deref()) {
            (Some(token), Some(channel)) if !token.is_empty() && !channel.is_empty() => {
                Some((token, channel))
            }
            _ => None,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        MonitorError::config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_config(&content)
}

/// Parse, expand and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content)
        .map_err(|e| MonitorError::config(format!("failed to parse config: {}", e)))?;

    config.alerts.public_base_url = expand_env_vars(&config.alerts.public_base_url);
    config.alerts.discord_token = config.alerts.discord_token.as_deref().map(expand_env_vars);
    config.alerts.channel_id = config.alerts.channel_id.as_deref().map(expand_env_vars);

    if config.alerts.public_base_url.trim().is_empty() {
        return Err(MonitorError::config("alerts.public_base_url is empty"));
    }
    if config.scheduler.buckets_hours.is_empty() {
        return Err(MonitorError::config("scheduler.buckets_hours is empty"));
    }
    if config.scheduler.buckets_hours.contains(&0) {
        return Err(MonitorError::config("scheduler.buckets_hours must be > 0"));
    }
    if config.fetcher.user_agent.trim().is_empty() {
        return Err(MonitorError::config("fetcher.user_agent is empty"));
    }
    if config.fetcher.timeout_secs == Some(0) {
        return Err(MonitorError::config("fetcher.timeout_secs must be > 0"));
    }

    let cwd = std::env::current_dir()
        .map_err(|e| MonitorError::config(format!("cannot resolve working directory: {}", e)))?;
    config.extractor.html_script = config.extractor.html_script.map(|p| absolutize(&cwd, p));
    config.extractor.script_script = config.extractor.script_script.map(|p| absolutize(&cwd, p));

    Ok(config)
}

fn absolutize(base: &Path, p: PathBuf) -> PathBuf {
    if p.is_absolute() {
        p
    } else {
        base.join(p)
    }
}

/// Expand `${VAR_NAME}` patterns from the process environment in one
/// left-to-right pass; substituted values are not expanded again.
/// Unset variables expand to the empty string.
pub(crate) fn expand_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + len];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + len + 1..];
    }
    result.push_str(rest);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[db]
path = "/tmp/cmon.sqlite"

[alerts]
public_base_url = "https://monitor.example.com"
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.scheduler.buckets_hours, vec![8, 24, 168]);
        assert_eq!(config.fetcher.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.fetcher.timeout_secs, None);
        assert_eq!(config.extractor.interpreter, "python3");
        assert!(config.alerts.discord().is_none());
    }

    #[test]
    fn test_missing_public_url_is_configuration_error() {
        let text = "[db]\npath = \"x\"\n[alerts]\npublic_base_url = \"\"\n";
        assert!(matches!(
            parse_config(text),
            Err(MonitorError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_alerts_section_is_configuration_error() {
        let text = "[db]\npath = \"x\"\n";
        assert!(matches!(
            parse_config(text),
            Err(MonitorError::Configuration(_))
        ));
    }

    #[test]
    fn test_rejects_zero_bucket() {
        let text = format!("{MINIMAL}\n[scheduler]\nbuckets_hours = [8, 0]\n");
        assert!(parse_config(&text).is_err());
    }

    #[test]
    fn test_relative_scripts_become_absolute() {
        let text = format!(
            "{MINIMAL}\n[extractor]\nhtml_script = \"scripts/crawl_html.py\"\nscript_script = \"/opt/crawl_js.py\"\n"
        );
        let config = parse_config(&text).unwrap();
        assert!(config.extractor.html_script.unwrap().is_absolute());
        assert_eq!(
            config.extractor.script_script.unwrap(),
            PathBuf::from("/opt/crawl_js.py")
        );
    }

    #[test]
    fn test_env_expansion() {
        std::env::set_var("CMON_TEST_CHANNEL", "12345");
        assert_eq!(expand_env_vars("id-${CMON_TEST_CHANNEL}"), "id-12345");
        assert_eq!(expand_env_vars("${CMON_TEST_UNSET_VAR}"), "");
        assert_eq!(expand_env_vars("no vars"), "no vars");
        assert_eq!(expand_env_vars("open ${CMON_TEST_CHANNEL"), "open ${CMON_TEST_CHANNEL");
    }

    #[test]
    fn test_env_values_are_not_expanded_again() {
        std::env::set_var("CMON_TEST_NESTED", "${CMON_TEST_NESTED}");
        assert_eq!(
            expand_env_vars("a-${CMON_TEST_NESTED}-b"),
            "a-${CMON_TEST_NESTED}-b"
        );
    }

    #[test]
    fn test_discord_requires_both_fields() {
        let text = MINIMAL.replace(
            "public_base_url = \"https://monitor.example.com\"",
            "public_base_url = \"https://m\"\ndiscord_token = \"tok\"",
        );
        let config = parse_config(&text).unwrap();
        assert!(config.alerts.discord().is_none());
    }
}
