//! Gateway intents
//!
//! A 32-bit capability mask telling the gateway which event groups a session
//! wants. Defined bits are 0-14 and 16; bit 15 and everything above 16 are
//! unassigned and rejected by validation.

use crate::error::InvalidIntentBits;
use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

bitflags! {
    /// Gateway intent bitmask
    ///
    /// Serialized as a JSON integer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u32 {
        /// Guild, role, channel, thread and stage instance lifecycle
        const GUILDS                    = 1 << 0;
        /// Member add/update/remove (privileged)
        const GUILD_MEMBERS             = 1 << 1;
        /// Ban add/remove
        const GUILD_BANS                = 1 << 2;
        /// Emoji and sticker updates
        const GUILD_EMOJIS_AND_STICKERS = 1 << 3;
        /// Integration updates
        const GUILD_INTEGRATIONS        = 1 << 4;
        /// Webhook updates
        const GUILD_WEBHOOKS            = 1 << 5;
        /// Invite create/delete
        const GUILD_INVITES             = 1 << 6;
        /// Voice state updates
        const GUILD_VOICE_STATES        = 1 << 7;
        /// Presence updates (privileged)
        const GUILD_PRESENCES           = 1 << 8;
        /// Guild message create/update/delete
        const GUILD_MESSAGES            = 1 << 9;
        /// Guild message reactions
        const GUILD_MESSAGE_REACTIONS   = 1 << 10;
        /// Guild typing start
        const GUILD_MESSAGE_TYPING      = 1 << 11;
        /// Direct message create/update/delete and pins
        const DIRECT_MESSAGES           = 1 << 12;
        /// Direct message reactions
        const DIRECT_MESSAGE_REACTIONS  = 1 << 13;
        /// Direct message typing start
        const DIRECT_MESSAGE_TYPING     = 1 << 14;
        /// Scheduled event lifecycle and subscriptions
        const GUILD_SCHEDULED_EVENTS    = 1 << 16;
    }
}

/// A single named intent, identified by its bit position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum IntentFlag {
    Guilds = 0,
    GuildMembers = 1,
    GuildBans = 2,
    GuildEmojisAndStickers = 3,
    GuildIntegrations = 4,
    GuildWebhooks = 5,
    GuildInvites = 6,
    GuildVoiceStates = 7,
    GuildPresences = 8,
    GuildMessages = 9,
    GuildMessageReactions = 10,
    GuildMessageTyping = 11,
    DirectMessages = 12,
    DirectMessageReactions = 13,
    DirectMessageTyping = 14,
    GuildScheduledEvents = 16,
}

impl IntentFlag {
    /// Every defined flag, in bit order
    pub const ALL: [IntentFlag; 16] = [
        Self::Guilds,
        Self::GuildMembers,
        Self::GuildBans,
        Self::GuildEmojisAndStickers,
        Self::GuildIntegrations,
        Self::GuildWebhooks,
        Self::GuildInvites,
        Self::GuildVoiceStates,
        Self::GuildPresences,
        Self::GuildMessages,
        Self::GuildMessageReactions,
        Self::GuildMessageTyping,
        Self::DirectMessages,
        Self::DirectMessageReactions,
        Self::DirectMessageTyping,
        Self::GuildScheduledEvents,
    ];

    /// Bit position of this flag
    #[must_use]
    pub const fn position(self) -> u8 {
        self as u8
    }

    /// The mask with only this flag set
    #[must_use]
    pub const fn mask(self) -> Intents {
        Intents::from_bits_retain(1 << self.position())
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Guilds => "GUILDS",
            Self::GuildMembers => "GUILD_MEMBERS",
            Self::GuildBans => "GUILD_BANS",
            Self::GuildEmojisAndStickers => "GUILD_EMOJIS_AND_STICKERS",
            Self::GuildIntegrations => "GUILD_INTEGRATIONS",
            Self::GuildWebhooks => "GUILD_WEBHOOKS",
            Self::GuildInvites => "GUILD_INVITES",
            Self::GuildVoiceStates => "GUILD_VOICE_STATES",
            Self::GuildPresences => "GUILD_PRESENCES",
            Self::GuildMessages => "GUILD_MESSAGES",
            Self::GuildMessageReactions => "GUILD_MESSAGE_REACTIONS",
            Self::GuildMessageTyping => "GUILD_MESSAGE_TYPING",
            Self::DirectMessages => "DIRECT_MESSAGES",
            Self::DirectMessageReactions => "DIRECT_MESSAGE_REACTIONS",
            Self::DirectMessageTyping => "DIRECT_MESSAGE_TYPING",
            Self::GuildScheduledEvents => "GUILD_SCHEDULED_EVENTS",
        }
    }
}

impl fmt::Display for IntentFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<IntentFlag> for Intents {
    fn from(flag: IntentFlag) -> Self {
        flag.mask()
    }
}

impl Intents {
    /// Compose a mask from named flags
    pub fn build<I>(flags: I) -> Self
    where
        I: IntoIterator<Item = IntentFlag>,
    {
        flags
            .into_iter()
            .fold(Intents::empty(), |acc, flag| acc | flag.mask())
    }

    /// Validate raw bits, rejecting anything outside the defined flags
    pub fn validate(bits: u32) -> Result<Self, InvalidIntentBits> {
        Self::from_bits(bits).ok_or(InvalidIntentBits {
            bits,
            undefined: bits & !Self::all().bits(),
        })
    }

    /// Validate a mask that may have been built with retained unknown bits
    pub fn ensure_valid(self) -> Result<Self, InvalidIntentBits> {
        Self::validate(self.bits())
    }

    /// Split a mask back into its named flags, in bit order
    ///
    /// Undefined bits are ignored; use [`Intents::validate`] to detect them.
    #[must_use]
    pub fn decompose(&self) -> Vec<IntentFlag> {
        IntentFlag::ALL
            .into_iter()
            .filter(|flag| self.contains(flag.mask()))
            .collect()
    }

    /// Intents that must be enabled for the application before use
    #[must_use]
    pub const fn privileged() -> Self {
        Self::GUILD_MEMBERS.union(Self::GUILD_PRESENCES)
    }

    /// Every defined intent that does not need approval
    #[must_use]
    pub const fn non_privileged() -> Self {
        Self::all().difference(Self::privileged())
    }

    /// Check if this mask asks for any privileged intent
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        self.intersects(Self::privileged())
    }
}

impl Default for Intents {
    fn default() -> Self {
        Self::non_privileged()
    }
}

impl fmt::Display for Intents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

impl Serialize for Intents {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for Intents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Self::validate(bits).map_err(serde::de::Error::custom)
    }
}
