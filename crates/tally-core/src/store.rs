//! Record store port and the in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    aggregate::{recent, Scope},
    domain::{ChatId, ExpenseRecord, NewRecord, RecordId},
    Result,
};

/// Hexagonal port for expense persistence.
///
/// Implementations must make `append` and `clear_chat` atomic so independent
/// chats can be served concurrently without interfering.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert one record and return it with its assigned id.
    async fn append(&self, rec: NewRecord) -> Result<ExpenseRecord>;

    /// All records matching `scope`, in insertion order.
    async fn records(&self, scope: &Scope) -> Result<Vec<ExpenseRecord>>;

    /// Newest-first records matching `scope`, at most `limit`.
    async fn recent(&self, scope: &Scope, limit: usize) -> Result<Vec<ExpenseRecord>> {
        let all = self.records(scope).await?;
        Ok(recent(&all, scope, limit))
    }

    /// Delete every record of `chat_id`; returns how many were removed.
    async fn clear_chat(&self, chat_id: ChatId) -> Result<usize>;
}

#[derive(Default)]
struct MemoryInner {
    next_id: i64,
    by_chat: HashMap<ChatId, Vec<ExpenseRecord>>,
}

/// Process-lifetime store keyed by chat. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        let inner = self.inner.lock().await;
        inner.by_chat.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn append(&self, rec: NewRecord) -> Result<ExpenseRecord> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let stored = ExpenseRecord::from_new(RecordId(inner.next_id), rec);
        inner
            .by_chat
            .entry(stored.chat_id)
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn records(&self, scope: &Scope) -> Result<Vec<ExpenseRecord>> {
        let inner = self.inner.lock().await;
        let out = match scope.chat_id {
            Some(chat_id) => inner
                .by_chat
                .get(&chat_id)
                .map(|v| v.iter().filter(|r| scope.matches(r)).cloned().collect())
                .unwrap_or_default(),
            None => {
                let mut all: Vec<ExpenseRecord> = inner
                    .by_chat
                    .values()
                    .flatten()
                    .filter(|r| scope.matches(r))
                    .cloned()
                    .collect();
                all.sort_by_key(|r| r.id);
                all
            }
        };
        Ok(out)
    }

    async fn clear_chat(&self, chat_id: ChatId) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        Ok(inner.by_chat.remove(&chat_id).map(|v| v.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::UserId;

    fn new_rec(user: i64, chat: i64, amount: f64) -> NewRecord {
        NewRecord {
            user_id: UserId(user),
            chat_id: ChatId(chat),
            username: format!("user{user}"),
            amount,
            category: None,
            description: None,
            date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let a = store.append(new_rec(1, 1, 1.0)).await.unwrap();
        let b = store.append(new_rec(2, 2, 2.0)).await.unwrap();
        assert!(b.id > a.id);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn records_respect_scope() {
        let store = MemoryStore::new();
        store.append(new_rec(1, 10, 1.0)).await.unwrap();
        store.append(new_rec(1, 20, 2.0)).await.unwrap();
        store.append(new_rec(2, 10, 3.0)).await.unwrap();

        let by_user = store.records(&Scope::user(UserId(1))).await.unwrap();
        assert_eq!(by_user.iter().map(|r| r.amount).collect::<Vec<_>>(), vec![1.0, 2.0]);
        assert_eq!(store.records(&Scope::chat(ChatId(10))).await.unwrap().len(), 2);
        assert_eq!(
            store
                .records(&Scope::member(UserId(2), ChatId(10)))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn clear_only_touches_one_chat() {
        let store = MemoryStore::new();
        store.append(new_rec(1, 10, 1.0)).await.unwrap();
        store.append(new_rec(2, 10, 1.0)).await.unwrap();
        store.append(new_rec(1, 20, 1.0)).await.unwrap();

        assert_eq!(store.clear_chat(ChatId(10)).await.unwrap(), 2);
        assert!(store.records(&Scope::chat(ChatId(10))).await.unwrap().is_empty());
        assert_eq!(store.records(&Scope::chat(ChatId(20))).await.unwrap().len(), 1);
        assert_eq!(store.clear_chat(ChatId(10)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_chats_do_not_interfere() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let mut handles = Vec::new();
        for chat in 0..8i64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    store.append(new_rec(chat, chat, i as f64)).await.unwrap();
                }
                if chat % 2 == 0 {
                    store.clear_chat(ChatId(chat)).await.unwrap();
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        for chat in 0..8i64 {
            let n = store.records(&Scope::chat(ChatId(chat))).await.unwrap().len();
            assert_eq!(n, if chat % 2 == 0 { 0 } else { 25 });
        }
    }
}
