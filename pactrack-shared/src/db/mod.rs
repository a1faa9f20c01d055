/// Database layer: connection pooling and migrations
///
/// Queries live in [`crate::storage::postgres`].

pub mod migrations;
pub mod pool;
