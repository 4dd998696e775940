//! Conversation list held for the sidebar.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Alias used when automatic alias generation fails.
pub const FALLBACK_ALIAS: &str = "New chat";

/// One conversation summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub starred: bool,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub starred_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Alias generation in progress.
    #[serde(default, skip_serializing)]
    pub is_loading: bool,
}

impl Conversation {
    /// A freshly created conversation whose alias is still being generated.
    pub fn pending(conversation_id: impl Into<String>, created_at: Option<DateTime<Utc>>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            alias: String::new(),
            starred: false,
            starred_at: None,
            created_at,
            is_loading: true,
        }
    }
}

/// Accept RFC 3339 as well as offset-less ISO timestamps (read as UTC).
pub(crate) fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

/// The conversation list plus load status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationsState {
    pub conversations: Vec<Conversation>,
    /// A fetch is in flight.
    pub is_loading: bool,
    /// Last fetch failure, cleared on success.
    pub error: Option<String>,
}

impl ConversationsState {
    /// Replace the list with a fresh fetch result.
    pub fn replace(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
        self.error = None;
    }

    /// Append a conversation.
    pub fn add(&mut self, conversation: Conversation) {
        self.conversations.push(conversation);
    }

    /// Remove a conversation. Returns whether it was present.
    pub fn delete(&mut self, conversation_id: &str) -> bool {
        let before = self.conversations.len();
        self.conversations
            .retain(|c| c.conversation_id != conversation_id);
        self.conversations.len() != before
    }

    /// Remove every conversation.
    pub fn delete_all(&mut self) {
        self.conversations.clear();
    }

    /// Set the alias, and the loading flag when `is_loading` is given.
    pub fn update(&mut self, conversation_id: &str, alias: &str, is_loading: Option<bool>) {
        if let Some(conv) = self.get_mut(conversation_id) {
            conv.alias = alias.to_string();
            if let Some(loading) = is_loading {
                conv.is_loading = loading;
            }
        }
    }

    /// Star or unstar; `starred_at` is stamped locally.
    pub fn toggle_star(&mut self, conversation_id: &str, starred: bool) {
        if let Some(conv) = self.get_mut(conversation_id) {
            conv.starred = starred;
            conv.starred_at = starred.then(Utc::now);
        }
    }

    /// Look up a conversation.
    pub fn get(&self, conversation_id: &str) -> Option<&Conversation> {
        self.conversations
            .iter()
            .find(|c| c.conversation_id == conversation_id)
    }

    fn get_mut(&mut self, conversation_id: &str) -> Option<&mut Conversation> {
        self.conversations
            .iter_mut()
            .find(|c| c.conversation_id == conversation_id)
    }

    /// Display order: starred first (most recently starred first, missing
    /// `starred_at` last), then newest created.
    pub fn sorted(&self) -> Vec<&Conversation> {
        let mut list: Vec<&Conversation> = self.conversations.iter().collect();
        list.sort_by(|a, b| display_order(a, b));
        list
    }

    /// Sorted conversations whose alias contains `query` (case-insensitive).
    /// A blank query returns everything.
    pub fn search(&self, query: &str) -> Vec<&Conversation> {
        let query = query.trim().to_lowercase();
        let sorted = self.sorted();
        if query.is_empty() {
            return sorted;
        }
        sorted
            .into_iter()
            .filter(|c| c.alias.to_lowercase().contains(&query))
            .collect()
    }
}

fn display_order(a: &Conversation, b: &Conversation) -> Ordering {
    match (a.starred, b.starred) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => match (a.starred_at, b.starred_at) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => y.cmp(&x),
        },
        (false, false) => b.created_at.cmp(&a.created_at),
    }
}
