//! Read-only registry of persisted-query operation templates.
//!
//! Built once during process initialization (usually via
//! [`OperationRegistry::builtin`]) and shared by reference afterwards.

use std::collections::BTreeMap;

use serde_json::json;

use crate::operation::{OperationError, OperationTemplate, SpecializedOperation};
use crate::variables::{VarValue, VariableTree};

/// Logical operation names accepted by [`OperationRegistry::get`].
pub mod names {
    pub const PLAYBACK_ACCESS_TOKEN: &str = "PlaybackAccessToken";
    pub const GET_STREAM_INFO: &str = "GetStreamInfo";
    pub const CLAIM_COMMUNITY_POINTS: &str = "ClaimCommunityPoints";
    pub const CLAIM_DROP: &str = "ClaimDrop";
    pub const CHANNEL_POINTS_CONTEXT: &str = "ChannelPointsContext";
    pub const INVENTORY: &str = "Inventory";
    pub const CURRENT_DROP: &str = "CurrentDrop";
    pub const CAMPAIGNS: &str = "Campaigns";
    pub const CAMPAIGN_DETAILS: &str = "CampaignDetails";
    pub const AVAILABLE_DROPS: &str = "AvailableDrops";
    pub const GAME_DIRECTORY: &str = "GameDirectory";
    pub const NOTIFICATIONS_VIEW: &str = "NotificationsView";
    pub const NOTIFICATIONS_LIST: &str = "NotificationsList";
    pub const NOTIFICATIONS_DELETE: &str = "NotificationsDelete";
}

/// Maps logical operation names to their templates.
#[derive(Debug, Clone, Default)]
pub struct OperationRegistry {
    templates: BTreeMap<String, OperationTemplate>,
}

impl OperationRegistry {
    /// Builds a registry from `(logical name, template)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::DuplicateOperation`] if a logical name repeats.
    pub fn from_entries<I, K>(entries: I) -> Result<Self, OperationError>
    where
        I: IntoIterator<Item = (K, OperationTemplate)>,
        K: Into<String>,
    {
        let mut templates = BTreeMap::new();
        for (name, template) in entries {
            let name = name.into();
            if templates.contains_key(&name) {
                return Err(OperationError::DuplicateOperation { name });
            }
            templates.insert(name, template);
        }
        Ok(Self { templates })
    }

    /// Registry holding every operation the client knows how to send.
    ///
    /// # Panics
    ///
    /// Only if the builtin entries stop having unique logical names.
    #[must_use]
    pub fn builtin() -> Self {
        Self::from_entries(builtin_entries()).expect("builtin operations have unique names")
    }

    /// Looks up a template by logical name.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::UnknownOperation`] if no template is registered.
    pub fn get(&self, name: &str) -> Result<&OperationTemplate, OperationError> {
        self.templates.get(name).ok_or_else(|| OperationError::UnknownOperation {
            name: name.to_string(),
        })
    }

    /// Shorthand for `get(name)?.specialize(overlay)`.
    ///
    /// # Errors
    ///
    /// Returns an unknown-operation or merge error.
    pub fn specialize(&self, name: &str, overlay: &VariableTree) -> Result<SpecializedOperation, OperationError> {
        self.get(name)?.specialize(overlay)
    }

    /// Logical names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

fn template(operation_name: &'static str, sha256_hash: &'static str) -> OperationTemplate {
    OperationTemplate::new(operation_name, sha256_hash)
}

fn vars<const N: usize>(entries: [(&'static str, VarValue); N]) -> VariableTree {
    VariableTree::from(entries)
}

fn builtin_entries() -> Vec<(&'static str, OperationTemplate)> {
    use names::{
        AVAILABLE_DROPS, CAMPAIGNS, CAMPAIGN_DETAILS, CHANNEL_POINTS_CONTEXT, CLAIM_COMMUNITY_POINTS, CLAIM_DROP,
        CURRENT_DROP, GAME_DIRECTORY, GET_STREAM_INFO, INVENTORY, NOTIFICATIONS_DELETE, NOTIFICATIONS_LIST,
        NOTIFICATIONS_VIEW, PLAYBACK_ACCESS_TOKEN,
    };
    use VarValue::Unset;

    vec![
        (
            PLAYBACK_ACCESS_TOKEN,
            template(
                "PlaybackAccessToken",
                "ed230aa1e33e07eebb8928504583da78a5173989fadfb1ac94be06a04f3cdbe9",
            )
            .with_variables(vars([
                ("isLive", true.into()),
                ("login", Unset),
                ("platform", "web".into()),
                ("isVod", false.into()),
                ("vodID", "".into()),
                ("playerType", "site".into()),
            ])),
        ),
        (
            GET_STREAM_INFO,
            template(
                "VideoPlayerStreamInfoOverlayChannel",
                "e785b65ff71ad7b363b34878335f27dd9372869ad0c5740a130b9268bcdbe7e7",
            )
            .with_variables(vars([("channel", Unset)])),
        ),
        (
            CLAIM_COMMUNITY_POINTS,
            template(
                "ClaimCommunityPoints",
                "46aaeebe02c99afdf4fc97c7c0cba964124bf6b0af229395f1f6d1feed05b3d0",
            )
            .with_variables(vars([(
                "input",
                vars([("claimID", Unset), ("channelID", Unset)]).into(),
            )])),
        ),
        (
            CLAIM_DROP,
            template(
                "DropsPage_ClaimDropRewards",
                "a455deea71bdc9015b78eb49f4acfbce8baa7ccbedd28e549bb025bd0f751930",
            )
            .with_variables(vars([("input", vars([("dropInstanceID", Unset)]).into())])),
        ),
        (
            CHANNEL_POINTS_CONTEXT,
            template(
                "ChannelPointsContext",
                "374314de591e69925fce3ddc2bcf085796f56ebb8cad67a0daa3165c03adc345",
            )
            .with_variables(vars([("channelLogin", Unset)])),
        ),
        (
            INVENTORY,
            template(
                "Inventory",
                "d86775d0ef16a63a33ad52e80eaff963b2d5b72fada7c991504a57496e1d8e4b",
            ),
        ),
        (
            CURRENT_DROP,
            template(
                "DropCurrentSessionContext",
                "4d06b702d25d652afb9ef835d2a550031f1cf762b193523a92166f40ea3d142b",
            ),
        ),
        (
            CAMPAIGNS,
            template(
                "ViewerDropsDashboard",
                "5a4da2ab3d5b47c9f9ce864e727b2cb346af1e3ea8b897fe8f704a97ff017619",
            )
            .with_variables(vars([("fetchRewardCampaigns", false.into())])),
        ),
        (
            CAMPAIGN_DETAILS,
            template(
                "DropCampaignDetails",
                "039277bf98f3130929262cc7c6efd9c141ca3749cb6dca442fc8ead9a53f77c1",
            )
            .with_variables(vars([("channelLogin", Unset), ("dropID", Unset)])),
        ),
        (
            AVAILABLE_DROPS,
            template(
                "DropsHighlightService_AvailableDrops",
                "782dad0f032942260171d2d80a654f88bdd0c5a9dddc392e9bc92218a0f42d20",
            )
            .with_variables(vars([("channelID", Unset)])),
        ),
        (
            GAME_DIRECTORY,
            template(
                "DirectoryPage_Game",
                "c7c9d5aad09155c4161d2382092dc44610367f3536aac39019ec2582ae5065f9",
            )
            .with_variables(vars([
                ("limit", Unset),
                ("slug", Unset),
                ("includeIsDJ", false.into()),
                ("imageWidth", 50.into()),
                (
                    "options",
                    json!({
                        "broadcasterLanguages": [],
                        "freeformTags": null,
                        "includeRestricted": ["SUB_ONLY_LIVE"],
                        "recommendationsContext": { "platform": "web" },
                        "sort": "RELEVANCE",
                        "tags": [],
                        "requestID": "JIRA-VXP-2397",
                    })
                    .into(),
                ),
                ("sortTypeIsRecency", false.into()),
            ])),
        ),
        (
            NOTIFICATIONS_VIEW,
            template(
                "OnsiteNotifications_View",
                "db011164c7980ce0b90b04d8ecab0c27cfc8505170e2d6b1a5a51060a8e658df",
            )
            .with_variables(vars([("input", VariableTree::new().into())])),
        ),
        (
            NOTIFICATIONS_LIST,
            template(
                "OnsiteNotifications_ListNotifications",
                "65bdc7f01ed3082f4382a154d190e23ad5459771c61318265cfdb59f63aad492",
            )
            .with_variables(vars([
                ("cursor", "".into()),
                ("displayType", "VIEWER".into()),
                ("language", "en".into()),
                ("limit", 10.into()),
                ("shouldLoadLastBroadcast", false.into()),
            ])),
        ),
        (
            NOTIFICATIONS_DELETE,
            template(
                "OnsiteNotifications_DeleteNotification",
                "13d463c831f28ffe17dccf55b3148ed8b3edbbd0ebadd56352f1ff0160616816",
            )
            .with_variables(vars([("input", vars([("id", "".into())]).into())])),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::merge::MergeError;

    // ---- Lookup ----

    #[test]
    fn builtin_holds_every_operation() {
        let registry = OperationRegistry::builtin();
        assert_eq!(registry.len(), 14);
        for name in [
            names::PLAYBACK_ACCESS_TOKEN,
            names::GET_STREAM_INFO,
            names::CLAIM_COMMUNITY_POINTS,
            names::CLAIM_DROP,
            names::CHANNEL_POINTS_CONTEXT,
            names::INVENTORY,
            names::CURRENT_DROP,
            names::CAMPAIGNS,
            names::CAMPAIGN_DETAILS,
            names::AVAILABLE_DROPS,
            names::GAME_DIRECTORY,
            names::NOTIFICATIONS_VIEW,
            names::NOTIFICATIONS_LIST,
            names::NOTIFICATIONS_DELETE,
        ] {
            assert!(registry.get(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn logical_and_server_names_differ() {
        let registry = OperationRegistry::builtin();
        let template = registry.get(names::GET_STREAM_INFO).unwrap();
        assert_eq!(template.operation_name(), "VideoPlayerStreamInfoOverlayChannel");
        assert_eq!(
            template.sha256_hash(),
            "e785b65ff71ad7b363b34878335f27dd9372869ad0c5740a130b9268bcdbe7e7"
        );
    }

    #[test]
    fn unknown_operation_fails() {
        let err = OperationRegistry::builtin().get("NoSuchThing").unwrap_err();
        assert_eq!(err, OperationError::UnknownOperation { name: "NoSuchThing".into() });
        assert_eq!(err.to_string(), "unknown operation: NoSuchThing");
    }

    #[test]
    fn duplicate_entries_rejected() {
        let err = OperationRegistry::from_entries([
            ("A", OperationTemplate::new("A", "1")),
            ("A", OperationTemplate::new("B", "2")),
        ])
        .unwrap_err();
        assert_eq!(err, OperationError::DuplicateOperation { name: "A".into() });
    }

    #[test]
    fn names_are_sorted() {
        let registry = OperationRegistry::from_entries([
            ("b", OperationTemplate::new("B", "2")),
            ("a", OperationTemplate::new("A", "1")),
        ])
        .unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    // ---- Specialization through the registry ----

    #[test]
    fn claim_points_nested_placeholders() {
        let registry = OperationRegistry::builtin();
        let op = registry
            .specialize(
                names::CLAIM_COMMUNITY_POINTS,
                &VariableTree::try_from(json!({ "input": { "claimID": "c-1", "channelID": "42" } })).unwrap(),
            )
            .unwrap();
        assert_eq!(
            op.to_json().unwrap()["variables"],
            json!({ "input": { "claimID": "c-1", "channelID": "42" } })
        );

        let err = registry
            .specialize(
                names::CLAIM_COMMUNITY_POINTS,
                &VariableTree::try_from(json!({ "input": { "claimID": "c-1" } })).unwrap(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            OperationError::Merge(MergeError::Unresolved { path: "input.channelID".into() })
        );
    }

    #[test]
    fn game_directory_keeps_nested_defaults() {
        let registry = OperationRegistry::builtin();
        let op = registry
            .specialize(
                names::GAME_DIRECTORY,
                &VariableTree::try_from(json!({ "limit": 30, "slug": "some-game", "options": { "sort": "VIEWER_COUNT" } }))
                    .unwrap(),
            )
            .unwrap();
        let vars = op.to_json().unwrap()["variables"].clone();
        assert_eq!(vars["limit"], 30);
        assert_eq!(vars["options"]["sort"], "VIEWER_COUNT");
        assert_eq!(vars["options"]["includeRestricted"], json!(["SUB_ONLY_LIVE"]));
        assert_eq!(vars["options"]["freeformTags"], json!(null));
        assert_eq!(vars["imageWidth"], 50);
    }

    #[test]
    fn registry_template_survives_specialization() {
        let registry = OperationRegistry::builtin();
        let before = registry.get(names::CLAIM_DROP).unwrap().clone();
        let _ = registry
            .specialize(
                names::CLAIM_DROP,
                &VariableTree::try_from(json!({ "input": { "dropInstanceID": "x" } })).unwrap(),
            )
            .unwrap();
        assert_eq!(registry.get(names::CLAIM_DROP).unwrap(), &before);
        assert_eq!(
            registry.get(names::CLAIM_DROP).unwrap().default_variables().unwrap().first_unset_path().as_deref(),
            Some("input.dropInstanceID")
        );
    }

    #[test]
    fn inventory_sends_without_variables() {
        let op = OperationRegistry::builtin()
            .specialize(names::INVENTORY, &VariableTree::new())
            .unwrap();
        assert!(op.to_json().unwrap().get("variables").is_none());
    }
}
