//! Service layer orchestrating the store, the generator, and the SSE hubs.

pub mod documentation;
pub mod guess_service;
pub mod health_service;
pub mod host_service;
pub mod session_service;
pub mod sse_service;
