use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Identity;

/// A registered participant. Created once, never renamed or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Person {
    pub identity: Identity,
    pub display_name: String,
    /// When the registration was committed
    pub registered_at: DateTime<Utc>,
}

impl Person {
    pub(crate) fn new(
        identity: Identity,
        display_name: String,
        registered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            identity,
            display_name,
            registered_at,
        }
    }
}
