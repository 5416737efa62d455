use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::MessageRole;

/// One persisted turn. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned insertion sequence, breaks `created_at` ties.
    pub seq: i64,
    pub id: String,
    pub room_id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
