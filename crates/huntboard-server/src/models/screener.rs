//! Screener model.
//!
//! Screeners are external scoring services. This service never calls them
//! directly; an external dispatcher assigns jobs and screeners report
//! outcomes back through the API, authenticated by their identity key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Descriptor of an external scoring service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Screener {
    pub id: Uuid,
    pub name: String,
    /// Key the screener presents when reporting job outcomes.
    #[serde(skip_serializing)]
    pub identity_key: String,
    pub endpoint: String,
    pub active: bool,
    /// Higher priority screeners are preferred by the dispatcher.
    pub priority: i32,
    /// Maximum concurrent jobs the screener accepts.
    pub capacity: i32,
    /// Jobs currently assigned, maintained by the dispatcher.
    pub current_load: i32,
    pub created_at: DateTime<Utc>,
}

/// Data required to register a screener.
#[derive(Debug, Clone)]
pub struct NewScreener {
    pub name: String,
    pub identity_key: String,
    pub endpoint: String,
    pub priority: i32,
    pub capacity: i32,
}

impl Screener {
    pub fn has_capacity(&self) -> bool {
        self.active && self.current_load < self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Screener {
        Screener {
            id: Uuid::new_v4(),
            name: "acme-screener".to_string(),
            identity_key: "sk-screener-1".to_string(),
            endpoint: "https://screener.example.com".to_string(),
            active: true,
            priority: 10,
            capacity: 4,
            current_load: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_has_capacity() {
        let mut screener = sample();
        assert!(screener.has_capacity());

        screener.current_load = 4;
        assert!(!screener.has_capacity());

        screener.current_load = 0;
        screener.active = false;
        assert!(!screener.has_capacity());
    }

    #[test]
    fn test_identity_key_not_serialized() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(!json.contains("identity_key"));
        assert!(!json.contains("sk-screener-1"));
    }
}
