use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: u64,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user store is full ({capacity} users)")]
    Full { capacity: usize },
}

/// In-memory user list owned by one server process.
///
/// Holds the sequence counter used by the counter-based id schemes of the
/// optimized and fast endpoints.
pub struct UserStore {
    users: Mutex<Vec<User>>,
    sequence: AtomicU64,
    capacity: Option<usize>,
}

impl UserStore {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            users: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(0),
            capacity,
        }
    }

    /// Next value of the process-wide counter, starting at 1.
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn insert(&self, user: User) -> Result<User, StoreError> {
        let mut users = self.users.lock();
        if let Some(capacity) = self.capacity {
            if users.len() >= capacity {
                return Err(StoreError::Full { capacity });
            }
        }
        users.push(user.clone());
        Ok(user)
    }

    pub fn list(&self) -> Vec<User> {
        self.users.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.users.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(n: u64) -> User {
        User {
            id: format!("user_{n}"),
            username: format!("name{n}"),
            email: format!("name{n}@example.com"),
            created_at: n,
        }
    }

    #[test]
    fn sequence_starts_at_one() {
        let store = UserStore::new(None);
        assert_eq!(store.next_sequence(), 1);
        assert_eq!(store.next_sequence(), 2);
    }

    #[test]
    fn insert_and_list_preserve_order() {
        let store = UserStore::new(None);
        store.insert(user(1)).unwrap();
        store.insert(user(2)).unwrap();
        let ids: Vec<_> = store.list().into_iter().map(|u| u.id).collect();
        assert_eq!(ids, ["user_1", "user_2"]);
    }

    #[test]
    fn rejects_inserts_past_capacity() {
        let store = UserStore::new(Some(1));
        store.insert(user(1)).unwrap();
        let err = store.insert(user(2)).unwrap_err();
        assert!(matches!(err, StoreError::Full { capacity: 1 }));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn zero_capacity_rejects_everything() {
        let store = UserStore::new(Some(0));
        assert!(store.insert(user(1)).is_err());
        assert!(store.is_empty());
    }
}
