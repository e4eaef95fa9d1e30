//! Backends execute validated reads against a concrete server.

mod memory;
mod mongo;

pub use memory::{MemoryBackend, MemoryCursor};
pub use mongo::{MongoBackend, MongoCursor};

use crate::errors::DbError;
use crate::query::FindRequest;
use crate::types::{Document, Namespace};
use async_trait::async_trait;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Round trip to the server; fails with `DbError::Connection` when unreachable.
    async fn ping(&self) -> Result<(), DbError>;

    async fn find_one(&self, ns: &Namespace, req: &FindRequest) -> Result<Option<Document>, DbError>;

    async fn open_cursor(&self, ns: &Namespace, req: &FindRequest) -> Result<Box<dyn CursorSource>, DbError>;

    /// Releases the connection. Called exactly once by `Connection::close`.
    async fn shutdown(&self) -> Result<(), DbError>;
}

/// A server-backed stream of documents.
#[async_trait]
pub trait CursorSource: Send {
    /// Next document, or `None` at end of sequence.
    async fn advance(&mut self) -> Result<Option<Document>, DbError>;

    /// Releases the server-side cursor.
    async fn close(&mut self) -> Result<(), DbError>;
}
