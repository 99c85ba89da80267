//! In-memory store backend with optimistic concurrency control.

use std::{sync::Arc, time::SystemTime};

use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::{
    models::{PlayerEntity, SessionEntity, SessionSettings, SessionStatus},
    session_store::{Mutation, MutationDecision, SessionStore, TransactOutcome},
    storage::{StorageError, StorageResult},
};

/// Per-session broadcast capacity; a lagging subscriber skips to newer
/// snapshots instead of blocking writers.
const FEED_CAPACITY: usize = 32;

/// In-memory session store backed by versioned documents.
///
/// Commits go through a compare-and-set on a per-document version counter, so
/// the `transact` retry loop behaves like the optimistic transactions of a
/// remote document store while staying entirely in-process.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    sessions: DashMap<Uuid, VersionedSession>,
    feeds: DashMap<Uuid, broadcast::Sender<SessionEntity>>,
}

struct VersionedSession {
    version: u64,
    doc: SessionEntity,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn publish(&self, doc: &SessionEntity) {
        if let Some(feed) = self.feeds.get(&doc.id) {
            // Delivery errors only mean nobody is subscribed right now.
            let _ = feed.send(doc.clone());
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn create_session(
        &self,
        settings: SessionSettings,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let now = SystemTime::now();
            let doc = SessionEntity {
                id: Uuid::new_v4(),
                settings,
                players: Vec::new(),
                status: SessionStatus::Waiting,
                current_round: 0,
                rounds: IndexMap::new(),
                created_at: now,
                updated_at: now,
            };
            let (sender, _receiver) = broadcast::channel(FEED_CAPACITY);
            inner.feeds.insert(doc.id, sender);
            inner.sessions.insert(
                doc.id,
                VersionedSession {
                    version: 0,
                    doc: doc.clone(),
                },
            );
            Ok(doc)
        })
    }

    fn read(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.sessions.get(&id).map(|entry| entry.doc.clone())) })
    }

    fn append_player(
        &self,
        id: Uuid,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let mut entry = inner
                .sessions
                .get_mut(&id)
                .ok_or(StorageError::SessionMissing(id))?;

            // Set-union: a duplicate id leaves the roster untouched.
            if entry.doc.players.iter().any(|known| known.id == player.id) {
                return Ok(entry.doc.clone());
            }

            let mut player = player;
            player.is_host = entry.doc.players.is_empty();
            entry.doc.players.push(player);
            entry.doc.updated_at = SystemTime::now();
            entry.version += 1;

            let doc = entry.doc.clone();
            drop(entry);
            inner.publish(&doc);
            Ok(doc)
        })
    }

    fn transact(
        &self,
        id: Uuid,
        mutation: Mutation,
    ) -> BoxFuture<'static, StorageResult<TransactOutcome>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            loop {
                let (version, snapshot) = {
                    let entry = inner
                        .sessions
                        .get(&id)
                        .ok_or(StorageError::SessionMissing(id))?;
                    (entry.version, entry.doc.clone())
                };

                match mutation(snapshot) {
                    MutationDecision::Skip => {
                        let entry = inner
                            .sessions
                            .get(&id)
                            .ok_or(StorageError::SessionMissing(id))?;
                        return Ok(TransactOutcome::Skipped(entry.doc.clone()));
                    }
                    MutationDecision::Commit(mut next) => {
                        let mut entry = inner
                            .sessions
                            .get_mut(&id)
                            .ok_or(StorageError::SessionMissing(id))?;
                        if entry.version != version {
                            // Concurrent commit landed first; re-run the
                            // mutation against a fresh snapshot.
                            continue;
                        }
                        next.updated_at = SystemTime::now();
                        entry.version += 1;
                        entry.doc = next.clone();
                        drop(entry);
                        inner.publish(&next);
                        return Ok(TransactOutcome::Committed(next));
                    }
                }
            }
        })
    }

    fn subscribe(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<broadcast::Receiver<SessionEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let feed = inner
                .feeds
                .get(&id)
                .ok_or(StorageError::SessionMissing(id))?;
            Ok(feed.subscribe())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
