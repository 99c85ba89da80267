//! Persistence layer: session entities, storage errors, and store backends.

pub mod models;
pub mod session_store;
pub mod storage;
