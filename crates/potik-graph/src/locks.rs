// SPDX-FileCopyrightText: 2026 Potik Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Striped per-chat locks serializing the LAST_EVENT repoint.
//!
//! Two concurrent persists for the same chat must not both read the old head
//! of the chronology list. A fixed stripe count bounds memory regardless of
//! how many chats the agent observes.

use std::hash::{DefaultHasher, Hash, Hasher};

use tokio::sync::{Mutex, MutexGuard};

/// Default stripe count; collisions only cost unnecessary serialization.
pub const DEFAULT_STRIPES: usize = 64;

/// A fixed set of mutexes, selected by hashing the chat id.
pub struct ChatLocks {
    stripes: Vec<Mutex<()>>,
}

impl ChatLocks {
    pub fn new(stripes: usize) -> Self {
        let stripes = stripes.max(1);
        Self {
            stripes: (0..stripes).map(|_| Mutex::new(())).collect(),
        }
    }

    /// Acquires the stripe covering `chat_id`, serializing writers for that
    /// chat (and any chat sharing the stripe).
    pub async fn lock(&self, chat_id: i64) -> MutexGuard<'_, ()> {
        self.stripes[self.index(chat_id)].lock().await
    }

    fn index(&self, chat_id: i64) -> usize {
        let mut hasher = DefaultHasher::new();
        chat_id.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }
}

impl Default for ChatLocks {
    fn default() -> Self {
        Self::new(DEFAULT_STRIPES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_chat_maps_to_same_stripe() {
        let locks = ChatLocks::new(8);
        assert_eq!(locks.index(42), locks.index(42));
    }

    #[tokio::test]
    async fn lock_is_exclusive_per_stripe() {
        let locks = ChatLocks::new(1);
        let guard = locks.lock(1).await;
        // A second lock on the same stripe must not be immediately available.
        assert!(locks.stripes[0].try_lock().is_err());
        drop(guard);
        assert!(locks.stripes[0].try_lock().is_ok());
    }

    #[tokio::test]
    async fn different_stripes_do_not_block() {
        let locks = ChatLocks::new(64);
        let (a, b) = (locks.index(1), locks.index(2));
        if a != b {
            let _guard = locks.lock(1).await;
            assert!(locks.stripes[b].try_lock().is_ok());
        }
    }
}
