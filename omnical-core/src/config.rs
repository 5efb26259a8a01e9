//! omnical configuration.
//!
//! A single TOML file lists the accounts (each reached through a provider
//! binary) and the mappings between their calendars:
//!
//! ```toml
//! state_dir = "~/.local/share/omnical/state"
//! provider_timeout = "30s"
//!
//! [[accounts]]
//! name = "work"
//! provider = "caldav"
//! url = "https://dav.example.com/"
//!
//! [[mappings]]
//! source = { account = "work", calendar = "Work" }
//! target = { account = "home", calendar = "Personal" }
//! mode = "busy"
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OmnicalError, OmnicalResult};
use crate::remote::provider::DEFAULT_TIMEOUT;
use crate::remote::{Provider, ProviderRemote, RemoteConfig};
use crate::sync::{SyncMode, SyncPolicy};

pub const CONFIG_ENV: &str = "OMNICAL_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmnicalConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_timeout: Option<String>,

    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    pub name: String,
    pub provider: Provider,
    /// Everything else is handed to the provider as is
    #[serde(flatten)]
    pub params: HashMap<String, toml::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarRef {
    pub account: String,
    pub calendar: String,
}

impl fmt::Display for CalendarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.account, self.calendar)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingMode {
    /// Two-way mirror
    Full,
    /// Placeholders source → target, real events target → source
    Busy,
    /// Real events source → target
    Oneway,
}

impl fmt::Display for MappingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingMode::Full => write!(f, "full"),
            MappingMode::Busy => write!(f, "busy"),
            MappingMode::Oneway => write!(f, "oneway"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    pub source: CalendarRef,
    pub target: CalendarRef,
    pub mode: MappingMode,
    /// Busy mode: block out every source event, not only placeholders
    #[serde(default)]
    pub project_all: bool,
}

/// One pass to run for a mapping. `source` plays side A, `target` side B.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPass {
    pub source: CalendarRef,
    pub target: CalendarRef,
    pub policy: SyncPolicy,
}

impl SyncPass {
    /// File name of this pass's sync state, unique per calendar pair and mode.
    pub fn state_file_name(&self) -> String {
        let mode = match self.policy.mode {
            SyncMode::TwoWay => "full",
            SyncMode::BusyOnly => "busy",
            SyncMode::OneWayExcludingBusy => "oneway",
        };
        format!(
            "{}__{}__{}__{}__{}.json",
            slug::slugify(&self.source.account),
            slug::slugify(&self.source.calendar),
            slug::slugify(&self.target.account),
            slug::slugify(&self.target.calendar),
            mode
        )
    }
}

impl MappingConfig {
    /// The passes this mapping runs, in order.
    pub fn passes(&self) -> Vec<SyncPass> {
        let pass = |source: &CalendarRef, target: &CalendarRef, policy| SyncPass {
            source: source.clone(),
            target: target.clone(),
            policy,
        };

        match self.mode {
            MappingMode::Full => vec![pass(&self.source, &self.target, SyncPolicy::two_way())],
            MappingMode::Busy => {
                let busy = if self.project_all {
                    SyncPolicy::busy_only_projecting_all()
                } else {
                    SyncPolicy::busy_only()
                };
                vec![
                    pass(&self.source, &self.target, busy),
                    pass(
                        &self.target,
                        &self.source,
                        SyncPolicy::one_way_excluding_busy(),
                    ),
                ]
            }
            MappingMode::Oneway => vec![pass(
                &self.source,
                &self.target,
                SyncPolicy::one_way_excluding_busy(),
            )],
        }
    }
}

impl fmt::Display for MappingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.mode {
            MappingMode::Full => "<->",
            MappingMode::Busy | MappingMode::Oneway => "->",
        };
        write!(f, "{} {arrow} {} ({})", self.source, self.target, self.mode)
    }
}

impl OmnicalConfig {
    /// `$OMNICAL_CONFIG`, else `<config dir>/omnical/config.toml`.
    pub fn config_path() -> OmnicalResult<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| OmnicalError::Config("Could not determine config directory".into()))?
            .join("omnical");

        Ok(config_dir.join("config.toml"))
    }

    pub fn load() -> OmnicalResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> OmnicalResult<Self> {
        if !path.exists() {
            return Err(OmnicalError::Config(format!(
                "No config file at {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration text.
    pub fn parse(content: &str) -> OmnicalResult<Self> {
        let config: OmnicalConfig =
            toml::from_str(content).map_err(|e| OmnicalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OmnicalResult<()> {
        if self.accounts.is_empty() {
            return Err(OmnicalError::Config("No accounts configured".into()));
        }

        let mut names = HashSet::new();
        for account in &self.accounts {
            if account.name.trim().is_empty() {
                return Err(OmnicalError::Config("Account with an empty name".into()));
            }
            if !names.insert(account.name.as_str()) {
                return Err(OmnicalError::Config(format!(
                    "Account '{}' is defined twice",
                    account.name
                )));
            }
        }

        if self.mappings.is_empty() {
            return Err(OmnicalError::Config("No mappings configured".into()));
        }

        for mapping in &self.mappings {
            for side in [&mapping.source, &mapping.target] {
                if !names.contains(side.account.as_str()) {
                    return Err(OmnicalError::Config(format!(
                        "Mapping {mapping} refers to unknown account '{}'",
                        side.account
                    )));
                }
            }
            if mapping.source == mapping.target {
                return Err(OmnicalError::Config(format!(
                    "Mapping {mapping} syncs a calendar with itself"
                )));
            }
        }

        // Slugs fold case and punctuation, so distinct names can collide
        let mut state_files: HashMap<String, &MappingConfig> = HashMap::new();
        for mapping in &self.mappings {
            for pass in mapping.passes() {
                let name = pass.state_file_name();
                if let Some(other) = state_files.insert(name.clone(), mapping) {
                    return Err(OmnicalError::Config(format!(
                        "Mappings {other} and {mapping} would share the state file '{name}'"
                    )));
                }
            }
        }

        self.provider_timeout()?;
        Ok(())
    }

    /// Directory holding state files, with `~` expanded.
    pub fn state_dir(&self) -> OmnicalResult<PathBuf> {
        match &self.state_dir {
            Some(dir) => Ok(PathBuf::from(shellexpand::tilde(dir).into_owned())),
            None => Ok(dirs::data_dir()
                .ok_or_else(|| OmnicalError::Config("Could not determine data directory".into()))?
                .join("omnical")
                .join("state")),
        }
    }

    pub fn state_path(&self, pass: &SyncPass) -> OmnicalResult<PathBuf> {
        Ok(self.state_dir()?.join(pass.state_file_name()))
    }

    pub fn provider_timeout(&self) -> OmnicalResult<Duration> {
        match &self.provider_timeout {
            Some(text) => humantime::parse_duration(text).map_err(|e| {
                OmnicalError::Config(format!("Invalid provider_timeout '{text}': {e}"))
            }),
            None => Ok(DEFAULT_TIMEOUT),
        }
    }

    pub fn account(&self, name: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// Build the transport for one calendar.
    pub fn remote(&self, calendar: &CalendarRef) -> OmnicalResult<ProviderRemote> {
        let account = self.account(&calendar.account).ok_or_else(|| {
            OmnicalError::Config(format!("Unknown account '{}'", calendar.account))
        })?;

        Ok(ProviderRemote::new(
            account.name.clone(),
            account.provider.clone(),
            RemoteConfig::new(account.params.clone()),
            calendar.calendar.clone(),
        )
        .with_timeout(self.provider_timeout()?))
    }
}
