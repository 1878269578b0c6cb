//! Subscription pool: places topics on socket connection slots and routes
//! inbound messages to their handlers.
//!
//! Capacity follows [`CapacityModel`]: each of the `pool_size` connections
//! takes at most `usable_topics_per_connection` topics. Topics are placed on
//! the first connection with room. Which topics to subscribe to is the
//! caller's decision; the pool only refuses what does not fit.

use std::collections::HashSet;

use dropwire_core::{CapacityModel, TopicAddress};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use crate::pubsub::{FrameError, MessageData};

/// Subscription refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("subscription pool exhausted: {capacity} topics in use")]
    Exhausted { capacity: usize },
    #[error("{requested} topics requested but only {available} slots remain")]
    InsufficientRoom { requested: usize, available: usize },
}

/// Inbound message could not be delivered.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no subscription for topic: {topic}")]
    UnknownTopic { topic: String },
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// Error returned by the topic handler, unchanged.
    #[error(transparent)]
    Handler(anyhow::Error),
}

/// Where a topic lives after [`SubscriptionPool::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Index of the connection slot.
    pub connection: usize,
    /// `false` if the topic was already subscribed.
    pub added: bool,
}

/// Thread-safe set of subscribed topics spread over connection slots.
pub struct SubscriptionPool {
    model: CapacityModel,
    connections: RwLock<Vec<HashSet<TopicAddress>>>,
}

impl SubscriptionPool {
    #[must_use]
    pub fn new(model: CapacityModel) -> Self {
        Self {
            model,
            connections: RwLock::new(vec![HashSet::new(); model.pool_size()]),
        }
    }

    #[must_use]
    pub fn model(&self) -> &CapacityModel {
        &self.model
    }

    /// Adds a topic to the first connection with room.
    ///
    /// Re-subscribing a topic that is already present keeps the existing
    /// handler and reports its slot.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Exhausted`] when every connection is full.
    pub fn subscribe(&self, topic: TopicAddress) -> Result<Placement, PoolError> {
        let mut connections = self.connections.write();
        if let Some(connection) = position_of(&connections, topic.render()) {
            return Ok(Placement { connection, added: false });
        }
        let per_connection = self.model.usable_topics_per_connection();
        let Some(connection) = connections.iter().position(|slot| slot.len() < per_connection) else {
            warn!(topic = %topic, capacity = self.model.total_usable_topics(), "subscription refused");
            return Err(PoolError::Exhausted {
                capacity: self.model.total_usable_topics(),
            });
        };
        debug!(topic = %topic, connection, "subscribed");
        connections[connection].insert(topic);
        Ok(Placement { connection, added: true })
    }

    /// Adds a group of topics, all or nothing.
    ///
    /// Used for a channel's topic group so a channel is never half-watched.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InsufficientRoom`] if the new topics do not all fit.
    pub fn subscribe_all(&self, topics: Vec<TopicAddress>) -> Result<Vec<Placement>, PoolError> {
        let mut connections = self.connections.write();
        let fresh: HashSet<&str> = topics
            .iter()
            .map(TopicAddress::render)
            .filter(|key| position_of(&connections, key).is_none())
            .collect();
        let in_use: usize = connections.iter().map(HashSet::len).sum();
        if !self.model.fits(in_use, fresh.len()) {
            let available = self.model.total_usable_topics().saturating_sub(in_use);
            warn!(requested = fresh.len(), available, "group subscription refused");
            return Err(PoolError::InsufficientRoom {
                requested: fresh.len(),
                available,
            });
        }

        let per_connection = self.model.usable_topics_per_connection();
        let mut placements = Vec::with_capacity(topics.len());
        for topic in topics {
            if let Some(connection) = position_of(&connections, topic.render()) {
                placements.push(Placement { connection, added: false });
                continue;
            }
            // total room was checked above, so some slot has space
            let Some(connection) = connections.iter().position(|slot| slot.len() < per_connection) else {
                return Err(PoolError::Exhausted {
                    capacity: self.model.total_usable_topics(),
                });
            };
            debug!(topic = %topic, connection, "subscribed");
            connections[connection].insert(topic);
            placements.push(Placement { connection, added: true });
        }
        Ok(placements)
    }

    /// Removes a topic by wire string, returning the slot it occupied.
    pub fn unsubscribe(&self, topic: &str) -> Option<usize> {
        let mut connections = self.connections.write();
        let connection = position_of(&connections, topic)?;
        connections[connection].remove(topic);
        debug!(topic, connection, "unsubscribed");
        Some(connection)
    }

    #[must_use]
    pub fn contains(&self, topic: &str) -> bool {
        position_of(&self.connections.read(), topic).is_some()
    }

    /// Total subscribed topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.read().iter().map(HashSet::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Topics that can still be added.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.model.total_usable_topics().saturating_sub(self.len())
    }

    /// Wire strings subscribed on one connection, sorted.
    #[must_use]
    pub fn topics_on(&self, connection: usize) -> Vec<String> {
        let connections = self.connections.read();
        let mut topics: Vec<String> = connections
            .get(connection)
            .map(|slot| slot.iter().map(|t| t.render().to_string()).collect())
            .unwrap_or_default();
        topics.sort();
        topics
    }

    /// Hands `payload` to the handler registered for `topic`.
    ///
    /// The handler runs after the lock is released.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownTopic`] if nothing is subscribed under
    /// `topic`, or [`DispatchError::Handler`] with the handler's own error.
    pub fn dispatch(&self, topic: &str, payload: &serde_json::Value) -> Result<(), DispatchError> {
        let address = {
            let connections = self.connections.read();
            connections.iter().find_map(|slot| slot.get(topic).cloned())
        };
        let Some(address) = address else {
            return Err(DispatchError::UnknownTopic {
                topic: topic.to_string(),
            });
        };
        trace!(topic, "dispatching");
        address.dispatch(payload).map_err(DispatchError::Handler)
    }

    /// Decodes a `MESSAGE` body and dispatches it.
    ///
    /// # Errors
    ///
    /// As [`SubscriptionPool::dispatch`], plus [`DispatchError::Frame`] for an
    /// undecodable payload.
    pub fn dispatch_message(&self, message: &MessageData) -> Result<(), DispatchError> {
        let payload = message.payload()?;
        self.dispatch(&message.topic, &payload)
    }
}

impl std::fmt::Debug for SubscriptionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionPool")
            .field("model", &self.model)
            .field("topics", &self.len())
            .finish()
    }
}

fn position_of(connections: &[HashSet<TopicAddress>], topic: &str) -> Option<usize> {
    connections.iter().position(|slot| slot.contains(topic))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use dropwire_core::{kinds, EntityId, TopicCategory, TopicNameTable};
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn channel_topic(table: &TopicNameTable, id: u64) -> TopicAddress {
        TopicAddress::new(table, TopicCategory::Channel, kinds::STREAM_STATE, id, |_, _| Ok(())).unwrap()
    }

    fn small_model() -> CapacityModel {
        // 2 connections x (5 - 3) usable = 4 topics
        CapacityModel::new(2, 5, 3, 2).unwrap()
    }

    // ---- Placement ----

    #[test]
    fn fills_connections_in_order() {
        let table = TopicNameTable::builtin();
        let pool = SubscriptionPool::new(small_model());
        let slots: Vec<usize> = (1..=4)
            .map(|id| pool.subscribe(channel_topic(&table, id)).unwrap().connection)
            .collect();
        assert_eq!(slots, vec![0, 0, 1, 1]);
        assert_eq!(pool.len(), 4);
        assert_eq!(pool.remaining(), 0);
        assert_eq!(pool.topics_on(1), vec!["video-playback-by-id.3", "video-playback-by-id.4"]);
    }

    #[test]
    fn refuses_beyond_capacity() {
        let table = TopicNameTable::builtin();
        let pool = SubscriptionPool::new(small_model());
        for id in 1..=4 {
            pool.subscribe(channel_topic(&table, id)).unwrap();
        }
        assert_eq!(
            pool.subscribe(channel_topic(&table, 5)).unwrap_err(),
            PoolError::Exhausted { capacity: 4 }
        );
    }

    #[test]
    fn resubscribe_is_a_no_op() {
        let table = TopicNameTable::builtin();
        let pool = SubscriptionPool::new(small_model());
        assert!(pool.subscribe(channel_topic(&table, 1)).unwrap().added);
        let again = pool.subscribe(channel_topic(&table, 1)).unwrap();
        assert_eq!(again, Placement { connection: 0, added: false });
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn unsubscribe_frees_the_slot() {
        let table = TopicNameTable::builtin();
        let pool = SubscriptionPool::new(small_model());
        for id in 1..=4 {
            pool.subscribe(channel_topic(&table, id)).unwrap();
        }
        assert_eq!(pool.unsubscribe("video-playback-by-id.2"), Some(0));
        assert_eq!(pool.unsubscribe("video-playback-by-id.2"), None);
        assert!(!pool.contains("video-playback-by-id.2"));
        assert_eq!(pool.subscribe(channel_topic(&table, 9)).unwrap().connection, 0);
    }

    #[test]
    fn group_is_all_or_nothing() {
        let table = TopicNameTable::builtin();
        let pool = SubscriptionPool::new(small_model());
        for id in 1..=3 {
            pool.subscribe(channel_topic(&table, id)).unwrap();
        }
        let group = vec![
            TopicAddress::new(&table, TopicCategory::Channel, kinds::STREAM_STATE, 10_u64, |_, _| Ok(())).unwrap(),
            TopicAddress::new(&table, TopicCategory::Channel, kinds::STREAM_UPDATE, 10_u64, |_, _| Ok(())).unwrap(),
        ];
        assert_eq!(
            pool.subscribe_all(group).unwrap_err(),
            PoolError::InsufficientRoom { requested: 2, available: 1 }
        );
        assert_eq!(pool.len(), 3);

        pool.unsubscribe("video-playback-by-id.3");
        let group = vec![
            TopicAddress::new(&table, TopicCategory::Channel, kinds::STREAM_STATE, 10_u64, |_, _| Ok(())).unwrap(),
            TopicAddress::new(&table, TopicCategory::Channel, kinds::STREAM_UPDATE, 10_u64, |_, _| Ok(())).unwrap(),
            channel_topic(&table, 1),
        ];
        let placements = pool.subscribe_all(group).unwrap();
        assert_eq!(placements.iter().filter(|p| p.added).count(), 2);
        assert_eq!(pool.remaining(), 0);
    }

    // ---- Dispatch ----

    #[test]
    fn dispatch_routes_by_wire_string() {
        let table = TopicNameTable::builtin();
        let pool = SubscriptionPool::new(CapacityModel::DEFAULT);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let topic = TopicAddress::new(&table, TopicCategory::User, kinds::DROPS, 99_u64, move |id, payload| {
            assert_eq!(id, EntityId(99));
            assert_eq!(payload["type"], "drop-claim");
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        pool.subscribe(topic).unwrap();

        pool.dispatch("user-drop-events.99", &json!({ "type": "drop-claim" })).unwrap();
        pool.dispatch_message(&MessageData {
            topic: "user-drop-events.99".to_string(),
            message: r#"{"type":"drop-claim"}"#.to_string(),
        })
        .unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dispatch_unknown_topic_fails() {
        let pool = SubscriptionPool::new(CapacityModel::DEFAULT);
        let err = pool.dispatch("presence.1", &json!({})).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownTopic { topic } if topic == "presence.1"));
    }

    #[test]
    fn handler_error_is_returned_unchanged() {
        let table = TopicNameTable::builtin();
        let pool = SubscriptionPool::new(CapacityModel::DEFAULT);
        pool.subscribe(
            TopicAddress::new(&table, TopicCategory::User, kinds::NOTIFICATIONS, 5_u64, |_, _| {
                Err(anyhow::anyhow!("bad notification"))
            })
            .unwrap(),
        )
        .unwrap();
        let err = pool.dispatch("onsite-notifications.5", &json!({})).unwrap_err();
        assert_eq!(err.to_string(), "bad notification");
        assert!(matches!(err, DispatchError::Handler(_)));
    }

    #[test]
    fn handler_may_reenter_the_pool() {
        let table = TopicNameTable::builtin();
        let pool = Arc::new(SubscriptionPool::new(CapacityModel::DEFAULT));
        let inner = Arc::clone(&pool);
        pool.subscribe(
            TopicAddress::new(&table, TopicCategory::Channel, kinds::STREAM_STATE, 1_u64, move |_, _| {
                inner.unsubscribe("video-playback-by-id.1");
                Ok(())
            })
            .unwrap(),
        )
        .unwrap();
        pool.dispatch("video-playback-by-id.1", &json!({})).unwrap();
        assert!(pool.is_empty());
    }

    // ---- Properties ----

    proptest! {
        #[test]
        fn never_exceeds_model_limits(ids in prop::collection::vec(0_u64..200, 0..120)) {
            let table = TopicNameTable::builtin();
            let model = CapacityModel::new(3, 10, 2, 2).unwrap();
            let pool = SubscriptionPool::new(model);
            for id in ids {
                let _ = pool.subscribe(channel_topic(&table, id));
            }
            prop_assert!(pool.len() <= model.total_usable_topics());
            for connection in 0..model.pool_size() {
                prop_assert!(pool.topics_on(connection).len() <= model.usable_topics_per_connection());
            }
        }
    }
}
