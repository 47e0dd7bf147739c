//! Message catalog for the deck link
//!
//! Every wire message decodes into exactly one [`Message`] variant; all later
//! logic matches on the variant, never on raw type strings.

use serde::{Deserialize, Serialize};

/// One audio session as carried on the wire
///
/// `volume` is 0-100; values above 100 are clamped when applied to the
/// session table. `has_icon` tells the receiver how many icon transfers to
/// expect after the initial config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub name: String,
    pub volume: u8,
    pub muted: bool,
    #[serde(default)]
    pub has_icon: bool,
}

/// Incremental diff between two session snapshots
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppChanges {
    #[serde(default)]
    pub added: Vec<AppEntry>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub updated: Vec<AppEntry>,
}

impl AppChanges {
    /// True when the diff carries nothing (callers suppress empty diffs)
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.updated.is_empty()
    }
}

/// Result status of an icon transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconStatus {
    Ok,
    Error,
}

/// The full deck link message catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Liveness probe (device -> host)
    Test,
    /// Liveness reply (host -> device)
    TestResponse { status: String },
    /// Device requests the full session snapshot
    RequestInitialConfig,
    /// Host's full session snapshot
    InitialConfig { data: Vec<AppEntry> },
    /// Device ack with post-dedup session count
    ConfigReceived { status: String, unique_apps: usize },
    /// Icon transfer: sender announces one bitmap
    IconData { app: String },
    /// Icon transfer: receiver is ready for the announced bitmap
    ReadyForIcon { app: String },
    /// Icon transfer: base64 of exactly [`ICON_BYTE_SIZE`] bytes
    ///
    /// [`ICON_BYTE_SIZE`]: crate::wire::ICON_BYTE_SIZE
    IconDataB64 { app: String, data: String },
    /// Icon transfer: receiver verdict; sender may retry on `error`
    IconParsed {
        app: String,
        status: IconStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Incremental session diff (host -> device)
    AppChanges {
        #[serde(default)]
        added: Vec<AppEntry>,
        #[serde(default)]
        removed: Vec<String>,
        #[serde(default)]
        updated: Vec<AppEntry>,
    },
    /// Single-field volume push (host -> device)
    VolumeUpdate { app: String, volume: u8 },
    /// Single-field mute push (host -> device)
    MuteUpdate { app: String, muted: bool },
    /// Volume command (device -> host)
    SetVolume { app: String, volume: u8 },
    /// Mute toggle command (device -> host)
    ToggleMute { app: String },
    /// Host finished the initial sync push
    InitComplete,
    /// Device confirms full sync (only once all expected icons arrived)
    Ready,
    /// Reported failure
    Error { message: String },
}

impl Message {
    /// Convenience constructor for the standard ok test reply
    pub fn test_response_ok() -> Self {
        Message::TestResponse {
            status: "ok".to_string(),
        }
    }

    /// Convenience constructor for the config ack
    pub fn config_received(unique_apps: usize) -> Self {
        Message::ConfigReceived {
            status: "ok".to_string(),
            unique_apps,
        }
    }

    /// Successful icon verdict
    pub fn icon_ok(app: &str) -> Self {
        Message::IconParsed {
            app: app.to_string(),
            status: IconStatus::Ok,
            error: None,
        }
    }

    /// Failed icon verdict with reason
    pub fn icon_error(app: &str, reason: String) -> Self {
        Message::IconParsed {
            app: app.to_string(),
            status: IconStatus::Error,
            error: Some(reason),
        }
    }

    /// Serialize to one newline-terminated wire line
    pub fn to_line(&self) -> crate::error::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)
            .map_err(|e| crate::error::Error::Other(format!("encode failed: {}", e)))?;
        line.push(b'\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_discriminator() {
        let line = Message::Test.to_line().unwrap();
        assert_eq!(line, b"{\"type\":\"test\"}\n");
    }

    #[test]
    fn test_decode_test_response() {
        let msg: Message =
            serde_json::from_str(r#"{"type":"test_response","status":"ok"}"#).unwrap();
        assert_eq!(msg, Message::test_response_ok());
    }

    #[test]
    fn test_decode_initial_config() {
        let msg: Message = serde_json::from_str(
            r#"{"type":"initial_config","data":[{"name":"Chrome","volume":50,"muted":false,"has_icon":true}]}"#,
        )
        .unwrap();
        match msg {
            Message::InitialConfig { data } => {
                assert_eq!(data.len(), 1);
                assert_eq!(data[0].name, "Chrome");
                assert_eq!(data[0].volume, 50);
                assert!(data[0].has_icon);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_decode_app_changes_partial_fields() {
        // Senders omit empty lists; all three default.
        let msg: Message =
            serde_json::from_str(r#"{"type":"app_changes","removed":["Spotify"]}"#).unwrap();
        match msg {
            Message::AppChanges {
                added,
                removed,
                updated,
            } => {
                assert!(added.is_empty());
                assert_eq!(removed, vec!["Spotify".to_string()]);
                assert!(updated.is_empty());
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_icon_parsed_error_field_omitted_on_ok() {
        let line = Message::icon_ok("Chrome").to_line().unwrap();
        let text = String::from_utf8(line).unwrap();
        assert!(text.contains("\"status\":\"ok\""));
        assert!(!text.contains("\"error\""));
    }

    #[test]
    fn test_unknown_type_is_an_error() {
        let result: Result<Message, _> = serde_json::from_str(r#"{"type":"heartbeat"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_roundtrip_config_received() {
        let msg = Message::config_received(3);
        let line = msg.to_line().unwrap();
        let back: Message = serde_json::from_slice(&line[..line.len() - 1]).unwrap();
        assert_eq!(back, msg);
    }
}
