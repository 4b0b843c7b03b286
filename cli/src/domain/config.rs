//! Domain types and validators for avdfleet configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::link;

// ── Constants ────────────────────────────────────────────────────────────────

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "template.base",
    "template.avd_home",
    "payload.artifact",
    "payload.package",
    "payload.link_template",
    "payload.run_time_secs",
    "readiness.discovery_timeout_secs",
    "readiness.boot_timeout_secs",
    "scheduling.concurrency",
    "scheduling.retention",
    "tools.adb",
    "tools.emulator",
    "tools.log_dir",
];

pub const VALID_RETENTION: &[&str] = &["keep", "terminate"];

/// Upper bound on simultaneous instances: one per even port in 5554..=5682.
pub const MAX_CONCURRENCY: usize = 65;

/// AVD names end up in file paths; reject anything that could traverse.
pub static AVD_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: this is a compile-time constant pattern; cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid regex")
});

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.avdfleet/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct FleetConfig {
    pub template: TemplateConfig,
    pub payload: PayloadConfig,
    pub readiness: ReadinessConfig,
    pub scheduling: SchedulingConfig,
    pub tools: ToolsConfig,
}

/// Where fresh copies come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TemplateConfig {
    /// AVD cloned for every instance. Must already exist.
    pub base: String,
    /// AVD home directory. Defaults to `~/.android/avd`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avd_home: Option<PathBuf>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            base: "MyAVD3".to_string(),
            avd_home: None,
        }
    }
}

/// What each instance does once booted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PayloadConfig {
    /// APK installed on every instance.
    pub artifact: PathBuf,
    /// Application id launched after install.
    pub package: String,
    /// Link opened before install; `{userId}` is replaced by a random id.
    pub link_template: String,
    pub user_id_min: u32,
    pub user_id_max: u32,
    /// How long the app is kept open.
    pub run_time_secs: u64,
    pub link_settle_secs: u64,
    pub install_settle_secs: u64,
    pub install_timeout_secs: u64,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            artifact: PathBuf::new(),
            package: String::new(),
            link_template: String::new(),
            user_id_min: 100_000,
            user_id_max: 200_000,
            run_time_secs: 180,
            link_settle_secs: 30,
            install_settle_secs: 10,
            install_timeout_secs: 300,
        }
    }
}

impl PayloadConfig {
    #[must_use]
    pub fn user_id_range(&self) -> RangeInclusive<u32> {
        self.user_id_min..=self.user_id_max
    }

    #[must_use]
    pub fn run_time(&self) -> Duration {
        Duration::from_secs(self.run_time_secs)
    }

    #[must_use]
    pub fn link_settle(&self) -> Duration {
        Duration::from_secs(self.link_settle_secs)
    }

    #[must_use]
    pub fn install_settle(&self) -> Duration {
        Duration::from_secs(self.install_settle_secs)
    }

    #[must_use]
    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }
}

/// Readiness polling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReadinessConfig {
    pub discovery_timeout_secs: u64,
    pub boot_timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            discovery_timeout_secs: 420,
            boot_timeout_secs: 420,
            poll_interval_secs: 2,
        }
    }
}

impl ReadinessConfig {
    #[must_use]
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_secs)
    }

    #[must_use]
    pub fn boot_timeout(&self) -> Duration {
        Duration::from_secs(self.boot_timeout_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// What happens to emulators once every worker is done.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Retention {
    /// Leave every emulator running.
    #[default]
    Keep,
    /// Ask each emulator to exit, killing the process if that fails.
    Terminate,
}

/// Worker scheduling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulingConfig {
    /// Maximum instances between launch and completion at once.
    pub concurrency: usize,
    /// Delay between consecutive worker starts.
    pub launch_stagger_ms: u64,
    pub retention: Retention,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            launch_stagger_ms: 1000,
            retention: Retention::Keep,
        }
    }
}

impl SchedulingConfig {
    #[must_use]
    pub fn launch_stagger(&self) -> Duration {
        Duration::from_millis(self.launch_stagger_ms)
    }
}

/// External tools and their output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    pub adb: String,
    pub emulator: String,
    /// Extra flags passed after `-avd <name> -port <port>`.
    pub emulator_args: Vec<String>,
    /// Per-instance emulator logs are appended here.
    pub log_dir: PathBuf,
    /// Default timeout for adb invocations.
    pub command_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            adb: "adb".to_string(),
            emulator: "emulator".to_string(),
            emulator_args: vec!["-no-snapshot-load".to_string()],
            log_dir: PathBuf::from("./emulator_logs"),
            command_timeout_secs: 30,
        }
    }
}

impl ToolsConfig {
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

// ── Validation ───────────────────────────────────────────────────────────────

impl FleetConfig {
    /// Check the settings needed to plan and launch instances.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate_scheduling(&self) -> Result<()> {
        validate_avd_name("template.base", &self.template.base)?;
        let concurrency = self.scheduling.concurrency;
        if !(1..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(invalid(
                "scheduling.concurrency",
                &concurrency.to_string(),
                &concurrency_range(),
            ));
        }
        for (key, secs) in [
            (
                "readiness.discovery_timeout_secs",
                self.readiness.discovery_timeout_secs,
            ),
            ("readiness.boot_timeout_secs", self.readiness.boot_timeout_secs),
            ("readiness.poll_interval_secs", self.readiness.poll_interval_secs),
        ] {
            if secs == 0 {
                return Err(invalid(key, "0", "a number of seconds >= 1"));
            }
        }
        Ok(())
    }

    /// Check everything a full run needs, including the payload.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid setting found.
    pub fn validate(&self) -> Result<()> {
        self.validate_scheduling()?;
        let payload = &self.payload;
        if payload.artifact.as_os_str().is_empty() {
            return Err(missing("payload.artifact"));
        }
        if payload.package.is_empty() {
            return Err(missing("payload.package"));
        }
        if payload.link_template.is_empty() {
            return Err(missing("payload.link_template"));
        }
        if !link::has_placeholder(&payload.link_template) {
            return Err(invalid(
                "payload.link_template",
                &payload.link_template,
                "a URL containing {userId}",
            ));
        }
        if payload.user_id_min > payload.user_id_max {
            return Err(invalid(
                "payload.user_id_min",
                &payload.user_id_min.to_string(),
                "a value <= payload.user_id_max",
            ));
        }
        Ok(())
    }

    /// Every settable key with its current value, in `VALID_CONFIG_KEYS` order.
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        let retention = match self.scheduling.retention {
            Retention::Keep => "keep",
            Retention::Terminate => "terminate",
        };
        let avd_home = self
            .template
            .avd_home
            .as_ref()
            .map_or_else(|| "(default)".to_string(), |p| p.display().to_string());
        vec![
            ("template.base", self.template.base.clone()),
            ("template.avd_home", avd_home),
            ("payload.artifact", self.payload.artifact.display().to_string()),
            ("payload.package", self.payload.package.clone()),
            ("payload.link_template", self.payload.link_template.clone()),
            ("payload.run_time_secs", self.payload.run_time_secs.to_string()),
            (
                "readiness.discovery_timeout_secs",
                self.readiness.discovery_timeout_secs.to_string(),
            ),
            (
                "readiness.boot_timeout_secs",
                self.readiness.boot_timeout_secs.to_string(),
            ),
            ("scheduling.concurrency", self.scheduling.concurrency.to_string()),
            ("scheduling.retention", retention.to_string()),
            ("tools.adb", self.tools.adb.clone()),
            ("tools.emulator", self.tools.emulator.clone()),
            ("tools.log_dir", self.tools.log_dir.display().to_string()),
        ]
    }

    /// Apply a single validated `key = value` setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_config_key(key)?;
        validate_config_value(key, value)?;
        match key {
            "template.base" => self.template.base = value.to_string(),
            "template.avd_home" => self.template.avd_home = Some(PathBuf::from(value)),
            "payload.artifact" => self.payload.artifact = PathBuf::from(value),
            "payload.package" => self.payload.package = value.to_string(),
            "payload.link_template" => self.payload.link_template = value.to_string(),
            "payload.run_time_secs" => self.payload.run_time_secs = parse_u64(key, value)?,
            "readiness.discovery_timeout_secs" => {
                self.readiness.discovery_timeout_secs = parse_u64(key, value)?;
            }
            "readiness.boot_timeout_secs" => {
                self.readiness.boot_timeout_secs = parse_u64(key, value)?;
            }
            "scheduling.concurrency" => {
                self.scheduling.concurrency = usize::try_from(parse_u64(key, value)?)
                    .map_err(|_| invalid(key, value, &concurrency_range()))?;
            }
            "scheduling.retention" => {
                self.scheduling.retention = if value == "terminate" {
                    Retention::Terminate
                } else {
                    Retention::Keep
                };
            }
            "tools.adb" => self.tools.adb = value.to_string(),
            "tools.emulator" => self.tools.emulator = value.to_string(),
            "tools.log_dir" => self.tools.log_dir = PathBuf::from(value),
            _ => anyhow::bail!("Unknown setting: {key}"),
        }
        Ok(())
    }
}

/// Validates an AVD name used as a template or copy name.
///
/// # Errors
///
/// Returns an error if the name is empty or contains path characters.
pub fn validate_avd_name(key: &str, name: &str) -> Result<()> {
    if !AVD_NAME_RE.is_match(name) {
        return Err(invalid(key, name, "letters, digits, '.', '_' or '-'"));
    }
    Ok(())
}

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    match key {
        "template.base" => validate_avd_name(key, value),
        "scheduling.retention" if !VALID_RETENTION.contains(&value) => {
            Err(invalid(key, value, &VALID_RETENTION.join(", ")))
        }
        "scheduling.concurrency" => match value.parse::<usize>() {
            Ok(n) if (1..=MAX_CONCURRENCY).contains(&n) => Ok(()),
            _ => Err(invalid(key, value, &concurrency_range())),
        },
        "readiness.discovery_timeout_secs" | "readiness.boot_timeout_secs" => {
            match value.parse::<u64>() {
                Ok(n) if n >= 1 => Ok(()),
                _ => Err(invalid(key, value, "an integer >= 1")),
            }
        }
        "payload.run_time_secs" => parse_u64(key, value).map(|_| ()),
        "payload.link_template" if !link::has_placeholder(value) => {
            Err(invalid(key, value, "a URL containing {userId}"))
        }
        _ if value.is_empty() => Err(invalid(key, value, "a non-empty value")),
        _ => Ok(()),
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value
        .parse()
        .map_err(|_| invalid(key, value, "a non-negative integer"))
}

fn invalid(key: &str, value: &str, expected: &str) -> anyhow::Error {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
    .into()
}

fn concurrency_range() -> String {
    format!("an integer in 1..={MAX_CONCURRENCY}")
}

fn missing(key: &str) -> anyhow::Error {
    ConfigError::Missing {
        key: key.to_string(),
    }
    .into()
}

// ── Unit tests ───────────────────────────────────────────────────────────────
