//! Payload definitions
//!
//! The `d` shapes of the session-control operations.

use crate::error::{EncodeError, EncodeResult};
use crate::intents::Intents;
use crate::snowflake::Snowflake;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Payload for op 10 (Hello)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }

    /// Heartbeat interval as a `Duration`
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval)
    }
}

/// Client connection properties sent with Identify
///
/// Older gateway versions used `$`-prefixed names; both are accepted on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProperties {
    /// Operating system
    #[serde(alias = "$os")]
    pub os: String,

    /// Library name
    #[serde(alias = "$browser")]
    pub browser: String,

    /// Library name
    #[serde(alias = "$device")]
    pub device: String,
}

impl ConnectionProperties {
    #[must_use]
    pub fn new(os: impl Into<String>, browser: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            browser: browser.into(),
            device: device.into(),
        }
    }
}

impl Default for ConnectionProperties {
    fn default() -> Self {
        Self::new(std::env::consts::OS, "gateway-client", "gateway-client")
    }
}

/// Presence status types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Online,
    #[serde(rename = "dnd")]
    DoNotDisturb,
    #[serde(rename = "idle")]
    Afk,
    Invisible,
    Offline,
}

/// Minimal activity shown alongside a presence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,

    /// Activity type (0 = playing, 1 = streaming, 2 = listening, ...)
    #[serde(rename = "type")]
    pub kind: u8,

    /// Stream URL, only meaningful for streaming activities
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Payload for op 3 (Presence Update), also used as the initial presence in Identify
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PresenceUpdatePayload {
    /// Unix time in milliseconds the client went idle, `null` if not idle
    pub since: Option<u64>,

    #[serde(default)]
    pub activities: Vec<Activity>,

    pub status: Status,

    pub afk: bool,
}

impl PresenceUpdatePayload {
    #[must_use]
    pub fn new(status: Status) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activities.push(activity);
        self
    }
}

/// Shard pair `[shard_id, num_shards]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardInfo {
    pub id: u32,
    pub count: u32,
}

impl ShardInfo {
    pub fn new(id: u32, count: u32) -> EncodeResult<Self> {
        let shard = Self { id, count };
        shard.validate()?;
        Ok(shard)
    }

    pub fn validate(&self) -> EncodeResult<()> {
        if self.count == 0 || self.id >= self.count {
            return Err(EncodeError::InvalidShard {
                id: self.id,
                count: self.count,
            });
        }
        Ok(())
    }
}

impl Serialize for ShardInfo {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        [self.id, self.count].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ShardInfo {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let [id, count] = <[u32; 2]>::deserialize(deserializer)?;
        Ok(Self { id, count })
    }
}

/// Payload for op 2 (Identify)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Authentication token
    pub token: String,

    pub properties: ConnectionProperties,

    /// Whether the client supports compressed packets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compress: Option<bool>,

    /// Member count above which offline members are not sent (50..=250)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub large_threshold: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard: Option<ShardInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence: Option<PresenceUpdatePayload>,

    pub intents: Intents,
}

impl IdentifyPayload {
    pub const LARGE_THRESHOLD_RANGE: std::ops::RangeInclusive<u16> = 50..=250;

    #[must_use]
    pub fn new(token: impl Into<String>, intents: Intents) -> Self {
        Self {
            token: token.into(),
            properties: ConnectionProperties::default(),
            compress: None,
            large_threshold: None,
            shard: None,
            presence: None,
            intents,
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: ConnectionProperties) -> Self {
        self.properties = properties;
        self
    }

    #[must_use]
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = Some(compress);
        self
    }

    #[must_use]
    pub fn with_large_threshold(mut self, threshold: u16) -> Self {
        self.large_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn with_shard(mut self, shard: ShardInfo) -> Self {
        self.shard = Some(shard);
        self
    }

    #[must_use]
    pub fn with_presence(mut self, presence: PresenceUpdatePayload) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Check the handshake before it goes anywhere near the wire
    pub fn validate(&self) -> EncodeResult<()> {
        self.intents.ensure_valid()?;

        if let Some(shard) = &self.shard {
            shard.validate()?;
        }

        if let Some(threshold) = self.large_threshold {
            if !Self::LARGE_THRESHOLD_RANGE.contains(&threshold) {
                return Err(EncodeError::InvalidLargeThreshold(threshold));
            }
        }

        Ok(())
    }
}

impl fmt::Debug for IdentifyPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifyPayload")
            .field("token", &"[redacted]")
            .field("properties", &self.properties)
            .field("compress", &self.compress)
            .field("large_threshold", &self.large_threshold)
            .field("shard", &self.shard)
            .field("presence", &self.presence)
            .field("intents", &self.intents)
            .finish()
    }
}

/// Payload for op 6 (Resume)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,

    /// Session ID to resume
    pub session_id: String,

    /// Last sequence number received
    pub seq: u64,
}

impl fmt::Debug for ResumePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumePayload")
            .field("token", &"[redacted]")
            .field("session_id", &self.session_id)
            .field("seq", &self.seq)
            .finish()
    }
}

/// Payload for op 8 (Request Guild Members)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestGuildMembersPayload {
    pub guild_id: Snowflake,

    /// Username prefix to match, empty string for all members
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    /// Maximum number of members to send, 0 for no limit
    pub limit: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presences: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ids: Option<Vec<Snowflake>>,

    /// Echoed back in the Guild Members Chunk response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Payload for op 4 (Voice State Update)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStateUpdatePayload {
    pub guild_id: Snowflake,

    /// Channel to join, `null` to disconnect
    pub channel_id: Option<Snowflake>,

    pub self_mute: bool,

    pub self_deaf: bool,
}

/// The parts of the `READY` dispatch the session needs to resume later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,

    /// Gateway URL to use when resuming
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_gateway_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hello_interval() {
        let hello: HelloPayload = serde_json::from_str(r#"{"heartbeat_interval":41250}"#).unwrap();
        assert_eq!(hello.interval(), Duration::from_millis(41_250));
    }

    #[test]
    fn test_identify_field_names() {
        let payload = IdentifyPayload::new("secret", Intents::GUILDS | Intents::GUILD_MESSAGES)
            .with_properties(ConnectionProperties::new("linux", "lib", "lib"))
            .with_large_threshold(250)
            .with_shard(ShardInfo::new(0, 2).unwrap());

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            json!({
                "token": "secret",
                "properties": {"os": "linux", "browser": "lib", "device": "lib"},
                "large_threshold": 250,
                "shard": [0, 2],
                "intents": 513
            })
        );
    }

    #[test]
    fn test_identify_omits_absent_optionals() {
        let payload = IdentifyPayload::new("secret", Intents::GUILDS);
        let value = serde_json::to_value(&payload).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("compress"));
        assert!(!object.contains_key("large_threshold"));
        assert!(!object.contains_key("shard"));
        assert!(!object.contains_key("presence"));
        assert_eq!(object["intents"], json!(1));
    }

    #[test]
    fn test_identify_accepts_legacy_property_names() {
        let payload: IdentifyPayload = serde_json::from_value(json!({
            "token": "t",
            "properties": {"$os": "linux", "$browser": "b", "$device": "d"},
            "intents": 0
        }))
        .unwrap();
        assert_eq!(payload.properties, ConnectionProperties::new("linux", "b", "d"));
    }

    #[test]
    fn test_identify_rejects_undefined_intent_bits() {
        let result = serde_json::from_value::<IdentifyPayload>(json!({
            "token": "t",
            "properties": {"os": "a", "browser": "b", "device": "c"},
            "intents": 32768
        }));
        assert!(result.is_err());

        let mut payload = IdentifyPayload::new("t", Intents::GUILDS);
        payload.intents = Intents::from_bits_retain(1 << 15);
        assert!(matches!(payload.validate(), Err(EncodeError::InvalidIntents(_))));
    }

    #[test]
    fn test_identify_validation() {
        let ok = IdentifyPayload::new("t", Intents::GUILDS).with_large_threshold(50);
        assert!(ok.validate().is_ok());

        let low = IdentifyPayload::new("t", Intents::GUILDS).with_large_threshold(49);
        assert!(matches!(
            low.validate(),
            Err(EncodeError::InvalidLargeThreshold(49))
        ));

        let mut bad_shard = IdentifyPayload::new("t", Intents::GUILDS);
        bad_shard.shard = Some(ShardInfo { id: 2, count: 2 });
        assert!(matches!(
            bad_shard.validate(),
            Err(EncodeError::InvalidShard { id: 2, count: 2 })
        ));
        assert!(ShardInfo::new(0, 0).is_err());
    }

    #[test]
    fn test_token_is_redacted() {
        let identify = IdentifyPayload::new("super-secret", Intents::GUILDS);
        assert!(!format!("{identify:?}").contains("super-secret"));

        let resume = ResumePayload {
            token: "super-secret".to_string(),
            session_id: "abc".to_string(),
            seq: 3,
        };
        let debug = format!("{resume:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("abc"));
    }

    #[test]
    fn test_resume_field_names() {
        let payload = ResumePayload {
            token: "t".to_string(),
            session_id: "s".to_string(),
            seq: 1337,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"token": "t", "session_id": "s", "seq": 1337})
        );
    }

    #[test]
    fn test_presence_status_names() {
        let presence = PresenceUpdatePayload::new(Status::DoNotDisturb).with_activity(Activity {
            name: "chess".to_string(),
            kind: 0,
            url: None,
        });
        assert_eq!(
            serde_json::to_value(&presence).unwrap(),
            json!({
                "since": null,
                "activities": [{"name": "chess", "type": 0}],
                "status": "dnd",
                "afk": false
            })
        );

        let idle: Status = serde_json::from_str("\"idle\"").unwrap();
        assert_eq!(idle, Status::Afk);
        let invisible: Status = serde_json::from_str("\"invisible\"").unwrap();
        assert_eq!(invisible, Status::Invisible);
    }

    #[test]
    fn test_request_guild_members_shape() {
        let payload = RequestGuildMembersPayload {
            guild_id: Snowflake::new(41_771_983_444_115_456),
            query: Some(String::new()),
            limit: 0,
            presences: None,
            user_ids: None,
            nonce: Some("n1".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"guild_id": "41771983444115456", "query": "", "limit": 0, "nonce": "n1"})
        );
    }

    #[test]
    fn test_voice_state_update_leave() {
        let payload = VoiceStateUpdatePayload {
            guild_id: Snowflake::new(1),
            channel_id: None,
            self_mute: false,
            self_deaf: true,
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"guild_id": "1", "channel_id": null, "self_mute": false, "self_deaf": true})
        );
    }

    #[test]
    fn test_ready_ignores_other_fields() {
        let ready: ReadyPayload = serde_json::from_value(json!({
            "v": 10,
            "user": {"id": "1"},
            "guilds": [],
            "session_id": "abc123",
            "resume_gateway_url": "wss://resume.example"
        }))
        .unwrap();
        assert_eq!(ready.session_id, "abc123");
        assert_eq!(ready.resume_gateway_url.as_deref(), Some("wss://resume.example"));
    }
}
