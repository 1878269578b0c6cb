//! Pub/sub topic addressing and dispatch.
//!
//! A topic is addressed on the wire as `"{wire_name}.{entity_id}"`, e.g.
//! `"video-playback-by-id.123456789"`. The wire name comes from a
//! [`TopicNameTable`] keyed by category and internal kind name.
//!
//! [`TopicAddress`] equality and hashing use only the rendered wire string, and
//! an address compares equal to that string. Together with the `Borrow<str>`
//! impl this lets handler tables keyed by address be queried with the raw
//! topic string received from the socket.

use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Internal kind names used with [`TopicNameTable::builtin`].
pub mod kinds {
    pub const PRESENCE: &str = "Presence";
    pub const DROPS: &str = "Drops";
    pub const NOTIFICATIONS: &str = "Notifications";
    pub const COMMUNITY_POINTS: &str = "CommunityPoints";
    pub const STREAM_STATE: &str = "StreamState";
    pub const STREAM_UPDATE: &str = "StreamUpdate";
}

/// Errors from building, rendering or resolving topic addresses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopicError {
    #[error("invalid entity id: {raw}")]
    InvalidEntityId { raw: String },
    #[error("unknown topic kind: {category}.{kind}")]
    UnknownTopicKind { category: TopicCategory, kind: String },
    #[error("unknown topic: {topic}")]
    UnknownTopic { topic: String },
    #[error("malformed topic string: {topic}")]
    MalformedTopic { topic: String },
    #[error("duplicate topic entry: {entry}")]
    DuplicateEntry { entry: String },
    #[error("unknown topic category: {raw}")]
    UnknownCategory { raw: String },
    #[error("invalid wire name: {wire}")]
    InvalidWireName { wire: String },
}

impl From<Infallible> for TopicError {
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

// ---------------------------------------------------------------------------
// TopicCategory
// ---------------------------------------------------------------------------

/// Which kind of entity a topic's id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TopicCategory {
    /// Topics keyed by user id.
    User,
    /// Topics keyed by channel id.
    Channel,
}

impl TopicCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Channel => "Channel",
        }
    }
}

impl fmt::Display for TopicCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TopicCategory {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "User" | "user" => Ok(Self::User),
            "Channel" | "channel" => Ok(Self::Channel),
            _ => Err(TopicError::UnknownCategory { raw: s.to_string() }),
        }
    }
}

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// Integer id of the user or channel a topic refers to.
///
/// Conversions from unsigned integers are infallible; everything else is
/// checked and rejects fractional, negative and non-numeric input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl EntityId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<u32> for EntityId {
    fn from(id: u32) -> Self {
        Self(u64::from(id))
    }
}

impl TryFrom<i64> for EntityId {
    type Error = TopicError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        u64::try_from(id)
            .map(Self)
            .map_err(|_| TopicError::InvalidEntityId { raw: id.to_string() })
    }
}

impl TryFrom<f64> for EntityId {
    type Error = TopicError;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn try_from(id: f64) -> Result<Self, Self::Error> {
        // exact integers only, within the range f64 represents without gaps
        if id.is_finite() && id.fract() == 0.0 && (0.0..=9_007_199_254_740_992.0).contains(&id) {
            Ok(Self(id as u64))
        } else {
            Err(TopicError::InvalidEntityId { raw: id.to_string() })
        }
    }
}

impl TryFrom<&str> for EntityId {
    type Error = TopicError;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TopicError::InvalidEntityId { raw: raw.to_string() });
        }
        raw.parse::<u64>()
            .map(Self)
            .map_err(|_| TopicError::InvalidEntityId { raw: raw.to_string() })
    }
}

impl TryFrom<&serde_json::Value> for EntityId {
    type Error = TopicError;

    fn try_from(value: &serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Number(n) => match (n.as_u64(), n.as_i64(), n.as_f64()) {
                (Some(id), _, _) => Ok(Self(id)),
                (None, Some(id), _) => Self::try_from(id),
                (None, None, Some(id)) => Self::try_from(id),
                _ => Err(TopicError::InvalidEntityId { raw: n.to_string() }),
            },
            serde_json::Value::String(s) => Self::try_from(s.as_str()),
            other => Err(TopicError::InvalidEntityId { raw: other.to_string() }),
        }
    }
}

impl FromStr for EntityId {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

// ---------------------------------------------------------------------------
// TopicNameTable
// ---------------------------------------------------------------------------

/// Maps `(category, kind)` pairs to protocol wire names, and back.
#[derive(Debug, Clone)]
pub struct TopicNameTable {
    wire_names: BTreeMap<(TopicCategory, String), String>,
    by_wire: HashMap<String, (TopicCategory, String)>,
}

/// A wire topic string parsed back into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTopic {
    pub category: TopicCategory,
    pub kind: String,
    pub entity_id: EntityId,
}

impl TopicNameTable {
    /// Builds a table from `(category, kind, wire name)` triples.
    ///
    /// # Errors
    ///
    /// Returns [`TopicError::DuplicateEntry`] if a `(category, kind)` pair or a
    /// wire name repeats, or [`TopicError::InvalidWireName`] for a wire name
    /// that [`TopicNameTable::resolve`] could not parse back.
    pub fn from_entries<I, K, W>(entries: I) -> Result<Self, TopicError>
    where
        I: IntoIterator<Item = (TopicCategory, K, W)>,
        K: Into<String>,
        W: Into<String>,
    {
        let mut wire_names = BTreeMap::new();
        let mut by_wire = HashMap::new();
        for (category, kind, wire) in entries {
            let (kind, wire) = (kind.into(), wire.into());
            if !WIRE_NAME.is_match(&wire) {
                return Err(TopicError::InvalidWireName { wire });
            }
            if wire_names.contains_key(&(category, kind.clone())) {
                return Err(TopicError::DuplicateEntry {
                    entry: format!("{category}.{kind}"),
                });
            }
            if by_wire.contains_key(&wire) {
                return Err(TopicError::DuplicateEntry { entry: wire });
            }
            wire_names.insert((category, kind.clone()), wire.clone());
            by_wire.insert(wire, (category, kind));
        }
        Ok(Self { wire_names, by_wire })
    }

    /// The protocol's topic names.
    ///
    /// # Panics
    ///
    /// Only if the entries below stop being unique or well-formed.
    #[must_use]
    pub fn builtin() -> Self {
        use kinds::{COMMUNITY_POINTS, DROPS, NOTIFICATIONS, PRESENCE, STREAM_STATE, STREAM_UPDATE};
        Self::from_entries([
            (TopicCategory::User, PRESENCE, "presence"),
            (TopicCategory::User, DROPS, "user-drop-events"),
            (TopicCategory::User, NOTIFICATIONS, "onsite-notifications"),
            (TopicCategory::User, COMMUNITY_POINTS, "community-points-user-v1"),
            (TopicCategory::Channel, DROPS, "channel-drop-events"),
            (TopicCategory::Channel, STREAM_STATE, "video-playback-by-id"),
            (TopicCategory::Channel, STREAM_UPDATE, "broadcast-settings-update"),
            (TopicCategory::Channel, COMMUNITY_POINTS, "community-points-channel-v1"),
        ])
        .expect("builtin topic table has unique, well-formed entries")
    }

    /// Wire name for a `(category, kind)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`TopicError::UnknownTopicKind`] if the pair is not in the table.
    pub fn wire_name(&self, category: TopicCategory, kind: &str) -> Result<&str, TopicError> {
        self.wire_names
            .get(&(category, kind.to_string()))
            .map(String::as_str)
            .ok_or_else(|| TopicError::UnknownTopicKind {
                category,
                kind: kind.to_string(),
            })
    }

    /// Renders `"{wire_name}.{entity_id}"`.
    ///
    /// # Errors
    ///
    /// Returns [`TopicError::UnknownTopicKind`] if the pair is not in the table.
    pub fn render(&self, category: TopicCategory, kind: &str, entity_id: EntityId) -> Result<String, TopicError> {
        Ok(format!("{}.{entity_id}", self.wire_name(category, kind)?))
    }

    /// Parses a wire topic string received from the socket.
    ///
    /// # Errors
    ///
    /// Returns [`TopicError::MalformedTopic`] if the string is not
    /// `name.id` with a canonical decimal id (no sign, no leading zeros), or
    /// [`TopicError::UnknownTopic`] for an unknown wire name.
    pub fn resolve(&self, topic: &str) -> Result<ResolvedTopic, TopicError> {
        let caps = TOPIC_PATTERN.captures(topic).ok_or_else(|| TopicError::MalformedTopic {
            topic: topic.to_string(),
        })?;
        let (category, kind) = self
            .by_wire
            .get(&caps["wire"])
            .ok_or_else(|| TopicError::UnknownTopic {
                topic: topic.to_string(),
            })?;
        Ok(ResolvedTopic {
            category: *category,
            kind: kind.clone(),
            entity_id: EntityId::try_from(&caps["id"])?,
        })
    }

    /// Internal kind names registered for a category.
    pub fn kinds(&self, category: TopicCategory) -> impl Iterator<Item = &str> {
        self.wire_names
            .keys()
            .filter(move |(c, _)| *c == category)
            .map(|(_, kind)| kind.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.wire_names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.wire_names.is_empty()
    }
}

// Wire names never contain '.', so the id is everything after the only dot.
// Ids must be canonical so a resolved topic renders back to the same string.
static TOPIC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<wire>[a-z0-9][a-z0-9-]*)\.(?P<id>0|[1-9][0-9]*)$").expect("topic pattern compiles")
});

static WIRE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9-]*$").expect("wire name pattern compiles"));

// ---------------------------------------------------------------------------
// TopicAddress
// ---------------------------------------------------------------------------

/// Callback invoked with the entity id and the decoded message payload.
pub type TopicHandler = Arc<dyn Fn(EntityId, &serde_json::Value) -> anyhow::Result<()> + Send + Sync>;

/// A subscribable resource bound to its message handler.
#[derive(Clone)]
pub struct TopicAddress {
    key: String,
    category: TopicCategory,
    kind: String,
    entity_id: EntityId,
    handler: TopicHandler,
}

impl TopicAddress {
    /// Validates the entity id, resolves the wire name and binds the handler.
    ///
    /// The id is converted before the table is consulted, so an invalid id is
    /// rejected before any wire string is produced.
    ///
    /// # Errors
    ///
    /// Returns [`TopicError::InvalidEntityId`] or [`TopicError::UnknownTopicKind`].
    pub fn new<I, F>(
        table: &TopicNameTable,
        category: TopicCategory,
        kind: &str,
        entity_id: I,
        handler: F,
    ) -> Result<Self, TopicError>
    where
        I: TryInto<EntityId>,
        TopicError: From<I::Error>,
        F: Fn(EntityId, &serde_json::Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let entity_id = entity_id.try_into()?;
        let key = table.render(category, kind, entity_id)?;
        Ok(Self {
            key,
            category,
            kind: kind.to_string(),
            entity_id,
            handler: Arc::new(handler),
        })
    }

    /// Canonical wire string, `"{wire_name}.{entity_id}"`.
    #[must_use]
    pub fn render(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn category(&self) -> TopicCategory {
        self.category
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// Passes `payload` untouched to the handler and returns its result.
    ///
    /// # Errors
    ///
    /// Whatever the handler returns.
    pub fn dispatch(&self, payload: &serde_json::Value) -> anyhow::Result<()> {
        (self.handler)(self.entity_id, payload)
    }
}

impl fmt::Debug for TopicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Topic({})", self.key)
    }
}

impl fmt::Display for TopicAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

impl PartialEq for TopicAddress {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for TopicAddress {}

impl PartialEq<str> for TopicAddress {
    fn eq(&self, other: &str) -> bool {
        self.key == other
    }
}

impl PartialEq<&str> for TopicAddress {
    fn eq(&self, other: &&str) -> bool {
        self.key == *other
    }
}

impl PartialEq<String> for TopicAddress {
    fn eq(&self, other: &String) -> bool {
        &self.key == other
    }
}

impl PartialEq<TopicAddress> for str {
    fn eq(&self, other: &TopicAddress) -> bool {
        self == other.key
    }
}

impl PartialEq<TopicAddress> for &str {
    fn eq(&self, other: &TopicAddress) -> bool {
        *self == other.key
    }
}

impl Hash for TopicAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // must match `str`'s hash for `Borrow<str>` lookups
        self.key.as_str().hash(state);
    }
}

impl Borrow<str> for TopicAddress {
    fn borrow(&self) -> &str {
        &self.key
    }
}
