pub mod models;

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use models::{RecordMutation, ServerId, ServerRecord, ServerStatus};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("server not found: {0}")]
    NotFound(ServerId),

    #[error("duplicate server id: {0}")]
    DuplicateId(ServerId),

    #[error("server {id} is already {status}")]
    AlreadyTerminal { id: ServerId, status: ServerStatus },

    #[error("invalid server id: {0}")]
    InvalidId(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Default)]
struct Inner {
    records: HashMap<ServerId, ServerRecord>,
    /// Insertion order, oldest first.
    order: Vec<ServerId>,
}

/// Authoritative in-memory collection of server records.
///
/// Cloning yields another handle to the same collection. Every operation
/// takes the lock once, so a reader never observes a half-applied update.
#[derive(Clone, Default)]
pub struct ServerRecordStore {
    inner: Arc<RwLock<Inner>>,
}

impl ServerRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new record. Fails if its id is already present.
    pub async fn insert(&self, record: ServerRecord) -> Result<ServerRecord> {
        let mut inner = self.inner.write().await;
        match inner.records.entry(record.id) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateId(record.id)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
            }
        }
        inner.order.push(record.id);
        Ok(record)
    }

    pub async fn get(&self, id: ServerId) -> Result<ServerRecord> {
        let inner = self.inner.read().await;
        inner.records.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    /// Apply `mutation` to a pending record and return the updated copy.
    ///
    /// The status check and the write happen under one write lock, so of two
    /// concurrent updates for the same id exactly one succeeds and the other
    /// sees `AlreadyTerminal`. The resource spec, owner and id are never touched.
    pub async fn update(&self, id: ServerId, mutation: RecordMutation) -> Result<ServerRecord> {
        let mut inner = self.inner.write().await;
        let record = inner.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        let status = record.status();
        if status.is_terminal() {
            return Err(StoreError::AlreadyTerminal { id, status });
        }

        record.state = mutation.into_state();
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    /// Snapshot of every record, oldest order first.
    pub async fn list(&self) -> Vec<ServerRecord> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .cloned()
            .collect()
    }

    pub async fn list_for_owner(&self, owner: Uuid) -> Vec<ServerRecord> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .filter(|r| r.owner == owner)
            .cloned()
            .collect()
    }

    pub async fn list_by_status(&self, status: ServerStatus) -> Vec<ServerRecord> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id))
            .filter(|r| r.status() == status)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use models::{Connection, ResourceSpec};

    fn spec() -> ResourceSpec {
        ResourceSpec {
            cores: 2,
            ram_gb: 4,
            storage_gb: 100,
        }
    }

    fn connection(ip: &str) -> Connection {
        Connection {
            ip: ip.into(),
            username: "u1".into(),
            password: "p1".into(),
        }
    }

    #[tokio::test]
    async fn insert_then_get_returns_record() {
        let store = ServerRecordStore::new();
        let record = ServerRecord::pending(Uuid::new_v4(), spec());

        store.insert(record.clone()).await.unwrap();

        assert_eq!(store.get(record.id).await.unwrap(), record);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_id() {
        let store = ServerRecordStore::new();
        let record = ServerRecord::pending(Uuid::new_v4(), spec());
        store.insert(record.clone()).await.unwrap();

        let err = store.insert(record.clone()).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == record.id));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn get_and_update_unknown_id_fail_with_not_found() {
        let store = ServerRecordStore::new();
        let id = ServerId::new();

        assert!(matches!(store.get(id).await, Err(StoreError::NotFound(_))));
        let err = store
            .update(id, RecordMutation::Fail("nope".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(missing) if missing == id));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn update_moves_pending_to_terminal_once() {
        let store = ServerRecordStore::new();
        let record = store
            .insert(ServerRecord::pending(Uuid::new_v4(), spec()))
            .await
            .unwrap();

        let active = store
            .update(record.id, RecordMutation::Activate(connection("10.0.0.5")))
            .await
            .unwrap();
        assert_eq!(active.status(), ServerStatus::Active);
        assert_eq!(active.spec, record.spec);
        assert_eq!(active.created_at, record.created_at);

        let err = store
            .update(record.id, RecordMutation::Fail("late".into()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::AlreadyTerminal {
                status: ServerStatus::Active,
                ..
            }
        ));
        assert_eq!(store.get(record.id).await.unwrap(), active);
    }

    #[tokio::test]
    async fn list_is_insertion_ordered_snapshot() {
        let store = ServerRecordStore::new();
        let owner = Uuid::new_v4();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let r = store.insert(ServerRecord::pending(owner, spec())).await.unwrap();
            ids.push(r.id);
        }

        let snapshot = store.list().await;
        store
            .update(ids[0], RecordMutation::Fail("boom".into()))
            .await
            .unwrap();

        let listed: Vec<_> = snapshot.iter().map(|r| r.id).collect();
        assert_eq!(listed, ids);
        assert!(snapshot.iter().all(|r| r.status() == ServerStatus::Pending));
        assert_eq!(store.list().await[0].status(), ServerStatus::Failed);
    }

    #[tokio::test]
    async fn list_filters_by_owner_and_status() {
        let store = ServerRecordStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let a1 = store.insert(ServerRecord::pending(alice, spec())).await.unwrap();
        store.insert(ServerRecord::pending(bob, spec())).await.unwrap();
        let a2 = store.insert(ServerRecord::pending(alice, spec())).await.unwrap();
        store
            .update(a2.id, RecordMutation::Activate(connection("10.0.0.9")))
            .await
            .unwrap();

        let mine: Vec<_> = store.list_for_owner(alice).await.iter().map(|r| r.id).collect();
        assert_eq!(mine, vec![a1.id, a2.id]);
        assert_eq!(store.list_by_status(ServerStatus::Pending).await.len(), 2);
        assert_eq!(store.list_by_status(ServerStatus::Active).await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_updates_on_same_id_apply_exactly_once() {
        let store = ServerRecordStore::new();
        let record = store
            .insert(ServerRecord::pending(Uuid::new_v4(), spec()))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let mutation = if i % 2 == 0 {
                    RecordMutation::Activate(connection(&format!("10.0.0.{i}")))
                } else {
                    RecordMutation::Fail(format!("attempt {i}"))
                };
                store.update(record.id, mutation).await
            }));
        }

        let mut applied = Vec::new();
        for handle in handles {
            if let Ok(updated) = handle.await.unwrap() {
                applied.push(updated);
            }
        }

        assert_eq!(applied.len(), 1);
        assert_eq!(store.get(record.id).await.unwrap(), applied[0]);
    }
}
