//! Provider subprocess transport.
//!
//! Each call spawns `omnical-provider-<name>`, writes one JSON request to
//! its stdin and reads one JSON response from its stdout. Providers own
//! their credentials; omnical only forwards the account's parameters.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{OmnicalError, OmnicalResult};
use crate::remote::protocol::{
    Command, CreateEvent, DeleteEvent, ErrorCode, ListEvents, ProviderCommand, Request, Response,
    UpdateEvent,
};
use crate::remote::{CalendarRemote, RawEvent, TransportError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider(String);

impl Provider {
    pub fn from_name(name: &str) -> Self {
        Provider(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn binary_name(&self) -> String {
        format!("omnical-provider-{}", self.0)
    }

    pub fn binary_path(&self) -> OmnicalResult<PathBuf> {
        which::which(self.binary_name())
            .map_err(|_| OmnicalError::ProviderNotInstalled(self.binary_name()))
    }
}

/// Provider-specific account parameters (URL, username, ...), passed through
/// to the provider untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteConfig(HashMap<String, toml::Value>);

impl RemoteConfig {
    pub fn new(params: HashMap<String, toml::Value>) -> Self {
        RemoteConfig(params)
    }

    pub fn get(&self, key: &str) -> Option<&toml::Value> {
        self.0.get(key)
    }

    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.0
            .iter()
            .filter_map(|(key, value)| {
                serde_json::to_value(value)
                    .ok()
                    .map(|json| (key.clone(), json))
            })
            .collect()
    }
}

/// One calendar on one account, reached through a provider binary.
#[derive(Clone, Debug)]
pub struct ProviderRemote {
    account: String,
    provider: Provider,
    config: RemoteConfig,
    calendar: String,
    timeout: Duration,
}

impl ProviderRemote {
    pub fn new(
        account: impl Into<String>,
        provider: Provider,
        config: RemoteConfig,
        calendar: impl Into<String>,
    ) -> Self {
        ProviderRemote {
            account: account.into(),
            provider,
            config,
            calendar: calendar.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Call a typed provider command, bounded by the configured timeout.
    async fn call<C: ProviderCommand>(&self, cmd: C) -> Result<C::Response, TransportError> {
        timeout(self.timeout, self.call_raw(C::command(), cmd))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout.as_secs()))?
    }

    async fn call_raw<P: Serialize, R: DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> Result<R, TransportError> {
        let params =
            serde_json::to_value(params).map_err(|e| TransportError::Rejected(e.to_string()))?;
        let request_json = serde_json::to_string(&Request { command, params })
            .map_err(|e| TransportError::Rejected(e.to_string()))?;

        let binary_path = self
            .provider
            .binary_path()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        debug!(provider = %self.provider.name(), ?command, "Calling provider");

        let mut child = TokioCommand::new(&binary_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TransportError::Unavailable(format!(
                    "failed to spawn {}: {e}",
                    binary_path.display()
                ))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Unavailable("provider stdin not piped".into()))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        drop(stdin);

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(TransportError::Unavailable(format!(
                "provider exited with status {}",
                output.status.code().unwrap_or(-1)
            )));
        }

        let response_str = String::from_utf8_lossy(&output.stdout);
        if response_str.trim().is_empty() {
            return Err(TransportError::Unavailable(
                "provider returned no response".into(),
            ));
        }

        let response: Response<R> = serde_json::from_str(&response_str)
            .map_err(|e| TransportError::Rejected(format!("unparseable response: {e}")))?;

        into_result(response)
    }
}

fn into_result<R>(response: Response<R>) -> Result<R, TransportError> {
    match response {
        Response::Success { data } => Ok(data),
        Response::Error { error, code } => Err(match code {
            Some(ErrorCode::NotFound) => TransportError::NotFound(error),
            Some(ErrorCode::AlreadyExists) => TransportError::AlreadyExists(error),
            None => TransportError::Rejected(error),
        }),
    }
}

#[async_trait]
impl CalendarRemote for ProviderRemote {
    fn label(&self) -> String {
        format!("{}:{}", self.account, self.calendar)
    }

    async fn list_events(&self) -> Result<Vec<RawEvent>, TransportError> {
        self.call(ListEvents {
            remote_config: self.config.to_json(),
            calendar: self.calendar.clone(),
        })
        .await
    }

    async fn create_event(&self, ics: &str) -> Result<String, TransportError> {
        self.call(CreateEvent {
            remote_config: self.config.to_json(),
            calendar: self.calendar.clone(),
            ics: ics.to_string(),
        })
        .await
    }

    async fn update_event(&self, uid: &str, ics: &str) -> Result<(), TransportError> {
        self.call(UpdateEvent {
            remote_config: self.config.to_json(),
            calendar: self.calendar.clone(),
            uid: uid.to_string(),
            ics: ics.to_string(),
        })
        .await
    }

    async fn delete_event(&self, uid: &str) -> Result<(), TransportError> {
        self.call(DeleteEvent {
            remote_config: self.config.to_json(),
            calendar: self.calendar.clone(),
            uid: uid.to_string(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_config_to_json() {
        let mut params = HashMap::new();
        params.insert("url".to_string(), toml::Value::String("https://dav".into()));
        params.insert("port".to_string(), toml::Value::Integer(8443));

        let json = RemoteConfig::new(params).to_json();
        assert_eq!(json["url"], "https://dav");
        assert_eq!(json["port"], 8443);
    }

    #[test]
    fn test_error_codes_map_to_transport_errors() {
        let not_found: Response<()> = Response::Error {
            error: "gone".into(),
            code: Some(ErrorCode::NotFound),
        };
        assert_eq!(
            into_result(not_found),
            Err(TransportError::NotFound("gone".into()))
        );

        let exists: Response<()> = Response::Error {
            error: "dup".into(),
            code: Some(ErrorCode::AlreadyExists),
        };
        assert_eq!(
            into_result(exists),
            Err(TransportError::AlreadyExists("dup".into()))
        );

        let other: Response<()> = Response::Error {
            error: "401".into(),
            code: None,
        };
        assert_eq!(
            into_result(other),
            Err(TransportError::Rejected("401".into()))
        );
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let remote = ProviderRemote::new(
            "work",
            Provider::from_name("does-not-exist-anywhere"),
            RemoteConfig::default(),
            "Work",
        );

        assert_eq!(remote.label(), "work:Work");
        let result = remote.list_events().await;
        assert!(matches!(result, Err(TransportError::Unavailable(_))));
    }
}
