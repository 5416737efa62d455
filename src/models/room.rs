use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named conversation thread owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}
