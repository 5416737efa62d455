use serde::{Deserialize, Serialize};

/// Identity handed over by the external authentication provider.
/// Read-only from the chat service's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub email: Option<String>,
}

impl UserIdentity {
    pub fn new(user_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email,
        }
    }
}
