//! The session store abstraction and its backends.

pub mod memory;

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dao::{
    models::{PlayerEntity, SessionEntity, SessionSettings},
    storage::StorageResult,
};

/// Decision returned by a transactional mutation.
pub enum MutationDecision {
    /// Commit the mutated document, replacing the current one.
    Commit(SessionEntity),
    /// Leave the document untouched. This is the idempotence barrier used by
    /// guarded transactions: a mutation whose completion marker already exists
    /// skips instead of committing a second time.
    Skip,
}

/// Pure mutation applied under optimistic concurrency control.
///
/// The store re-invokes the function with a fresh snapshot whenever a
/// concurrent commit is detected, so it must be side-effect-free and
/// idempotent with respect to repeated invocation.
pub type Mutation = Arc<dyn Fn(SessionEntity) -> MutationDecision + Send + Sync>;

/// Outcome of running a transaction to completion.
#[derive(Debug)]
pub enum TransactOutcome {
    /// The mutation committed; carries the document as written.
    Committed(SessionEntity),
    /// The mutation skipped; carries the latest observed document.
    Skipped(SessionEntity),
}

/// Abstraction over the shared session document store.
///
/// These four primitives (read, atomic append, optimistic transact, ordered
/// change subscription) are the only synchronization surface the round
/// protocol relies on; any backend offering compare-and-set plus change
/// notification can stand in for the in-memory implementation.
pub trait SessionStore: Send + Sync {
    /// Create a fresh waiting session and assign its identifier.
    fn create_session(
        &self,
        settings: SessionSettings,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>>;

    /// Read the latest committed snapshot, `None` when the session is unknown.
    fn read(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<SessionEntity>>>;

    /// Atomically append a player with set-union semantics: a duplicate player
    /// id leaves the roster unchanged. The first player ever appended becomes
    /// host; the flag is assigned inside the append so two racing first joins
    /// cannot both claim it.
    fn append_player(
        &self,
        id: Uuid,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<SessionEntity>>;

    /// Run a mutation under optimistic concurrency control, retrying it with a
    /// fresh snapshot on conflict until it commits or skips.
    fn transact(
        &self,
        id: Uuid,
        mutation: Mutation,
    ) -> BoxFuture<'static, StorageResult<TransactOutcome>>;

    /// Subscribe to committed snapshots of one session. Deliveries preserve
    /// commit order; a slow subscriber may lag and miss intermediate
    /// snapshots, never see them out of order.
    fn subscribe(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<broadcast::Receiver<SessionEntity>>>;

    /// Cheap liveness probe used by the health endpoint.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
