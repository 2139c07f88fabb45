use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LabelState {
    #[default]
    Unlabeled,
    Labeled,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: i64,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub id: i64,
    pub name: String,
}

/// A trip the origin proposes for an item, with the destinations it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSuggestion {
    pub trip_id: i64,
    pub name: String,
    #[serde(default)]
    pub destinations: Vec<Destination>,
}

/// One post of the external feed, as served by the origin.
///
/// `external_id` orders and identifies the item everywhere; `internal_id` is only
/// meaningful for sub-resources such as media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub external_id: String,
    pub internal_id: i64,
    #[serde(default)]
    pub media: Vec<Media>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub taken_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub label_state: LabelState,
    #[serde(default)]
    pub destination_id: Option<i64>,
    #[serde(default)]
    pub trip_id: Option<i64>,
    #[serde(default)]
    pub is_aerial: bool,
    #[serde(default)]
    pub is_cover: bool,
    #[serde(default)]
    pub cover_media_id: Option<i64>,
    #[serde(default)]
    pub trip_suggestions: Vec<TripSuggestion>,
}

impl FeedItem {
    pub fn media_index(&self, media_id: i64) -> Option<usize> {
        self.media.iter().position(|m| m.id == media_id)
    }
}

/// Previous/next neighbours of one item in the origin's declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationEdge {
    #[serde(default)]
    pub prev_id: Option<String>,
    #[serde(default)]
    pub next_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedStats {
    pub total: u64,
    pub labeled: u64,
    pub skipped: u64,
    pub unlabeled: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct IdLookup {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchReport {
    #[serde(default)]
    pub fetched: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub trip_id: Option<i64>,
    pub destination_id: Option<i64>,
    pub is_aerial: bool,
    pub is_cover: bool,
    pub cover_media_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LabelDecision {
    Skip,
    Accept(Classification),
}

impl LabelDecision {
    pub fn is_skip(&self) -> bool {
        matches!(self, LabelDecision::Skip)
    }

    pub(crate) fn to_body(&self) -> LabelBody {
        match self {
            LabelDecision::Skip => LabelBody { skip: true, ..LabelBody::default() },
            LabelDecision::Accept(c) => LabelBody {
                skip: false,
                is_aerial: c.is_aerial,
                is_cover: c.is_cover,
                cover_media_id: c.cover_media_id,
                trip_id: c.trip_id,
                destination_id: c.destination_id,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct LabelBody {
    pub skip: bool,
    pub is_aerial: bool,
    pub is_cover: bool,
    pub cover_media_id: Option<i64>,
    pub trip_id: Option<i64>,
    pub destination_id: Option<i64>,
}

/// One message of the backfill stream: progress, `done`, or `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackfillMessage {
    #[serde(default)]
    pub fetched: u64,
    #[serde(default)]
    pub checked: u64,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_item_defaults_optional_fields() {
        let item: FeedItem = serde_json::from_str(r#"{"external_id":"abc","internal_id":7}"#).unwrap();
        assert_eq!(item.label_state, LabelState::Unlabeled);
        assert!(item.media.is_empty());
        assert!(item.trip_suggestions.is_empty());
        assert!(!item.is_cover);
    }

    #[test]
    fn skip_decision_serializes_skip_flag_only() {
        let body = serde_json::to_value(LabelDecision::Skip.to_body()).unwrap();
        assert_eq!(body["skip"], true);
        assert!(body["trip_id"].is_null());
        assert!(body["destination_id"].is_null());
    }

    #[test]
    fn accept_decision_carries_classification() {
        let decision = LabelDecision::Accept(Classification {
            trip_id: Some(4),
            destination_id: Some(9),
            is_aerial: true,
            is_cover: false,
            cover_media_id: None,
        });
        let body = serde_json::to_value(decision.to_body()).unwrap();
        assert_eq!(body["skip"], false);
        assert_eq!(body["trip_id"], 4);
        assert_eq!(body["destination_id"], 9);
        assert_eq!(body["is_aerial"], true);
    }

    #[test]
    fn backfill_message_variants_decode() {
        let progress: BackfillMessage = serde_json::from_str(r#"{"fetched":3,"checked":50,"page":1}"#).unwrap();
        assert!(!progress.done && progress.error.is_none());
        let done: BackfillMessage = serde_json::from_str(r#"{"done":true,"fetched":3}"#).unwrap();
        assert!(done.done);
        let failed: BackfillMessage = serde_json::from_str(r#"{"error":"upstream down"}"#).unwrap();
        assert_eq!(failed.error.as_deref(), Some("upstream down"));
    }
}
