//! Defines the JSON protocol used between omnical and provider binaries
//! over stdin/stdout.
//!
//! One request per process: the provider reads a single JSON line,
//! performs the command and prints a single JSON response.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::remote::RawEvent;

pub trait ProviderCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    ListEvents,
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
}

/// Request sent from omnical to a provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Machine-readable error codes a provider may attach to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    AlreadyExists,
}

/// Response sent from a provider to omnical.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success {
        data: T,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<ErrorCode>,
    },
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ListEvents {
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub calendar: String,
}

impl ProviderCommand for ListEvents {
    type Response = Vec<RawEvent>;
    fn command() -> Command {
        Command::ListEvents
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateEvent {
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub calendar: String,
    pub ics: String,
}

impl ProviderCommand for CreateEvent {
    /// The identifier the remote stored the event under
    type Response = String;
    fn command() -> Command {
        Command::CreateEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub calendar: String,
    pub uid: String,
    pub ics: String,
}

impl ProviderCommand for UpdateEvent {
    type Response = ();
    fn command() -> Command {
        Command::UpdateEvent
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteEvent {
    pub remote_config: serde_json::Map<String, serde_json::Value>,
    pub calendar: String,
    pub uid: String,
}

impl ProviderCommand for DeleteEvent {
    type Response = ();
    fn command() -> Command {
        Command::DeleteEvent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = Request {
            command: DeleteEvent::command(),
            params: serde_json::to_value(DeleteEvent {
                remote_config: serde_json::Map::new(),
                calendar: "Work".to_string(),
                uid: "u1".to_string(),
            })
            .unwrap(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["command"], "delete_event");
        assert_eq!(json["params"]["calendar"], "Work");
        assert_eq!(json["params"]["uid"], "u1");
    }

    #[test]
    fn test_error_response_with_code() {
        let json = r#"{"status":"error","error":"gone","code":"not_found"}"#;
        let response: Response<()> = serde_json::from_str(json).unwrap();

        match response {
            Response::Error { error, code } => {
                assert_eq!(error, "gone");
                assert_eq!(code, Some(ErrorCode::NotFound));
            }
            Response::Success { .. } => panic!("Expected error response"),
        }
    }

    #[test]
    fn test_error_response_without_code() {
        let json = r#"{"status":"error","error":"auth failed"}"#;
        let response: Response<()> = serde_json::from_str(json).unwrap();
        assert!(matches!(response, Response::Error { code: None, .. }));
    }

    #[test]
    fn test_list_events_response() {
        let json = r#"{"status":"success","data":[{"ics":"BEGIN:VCALENDAR"}]}"#;
        let response: Response<Vec<RawEvent>> = serde_json::from_str(json).unwrap();

        match response {
            Response::Success { data } => assert_eq!(data, vec![RawEvent::new("BEGIN:VCALENDAR")]),
            Response::Error { .. } => panic!("Expected success response"),
        }
    }
}
