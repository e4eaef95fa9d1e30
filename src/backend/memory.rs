use super::{Backend, CursorSource};
use crate::errors::DbError;
use crate::query::FindRequest;
use crate::server::MemoryServer;
use crate::types::{Document, Namespace};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;

/// Backend over a `MemoryServer` living in this process.
pub struct MemoryBackend {
    server: Arc<MemoryServer>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new(server: Arc<MemoryServer>) -> Self {
        Self { server }
    }

    #[must_use]
    pub fn server(&self) -> &Arc<MemoryServer> {
        &self.server
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.server.ping()
    }

    async fn find_one(&self, ns: &Namespace, req: &FindRequest) -> Result<Option<Document>, DbError> {
        let mut single = req.clone();
        single.limit = Some(-1);
        let reply = self.server.query(ns, &single)?;
        Ok(reply.documents.into_iter().next())
    }

    async fn open_cursor(&self, ns: &Namespace, req: &FindRequest) -> Result<Box<dyn CursorSource>, DbError> {
        let reply = self.server.query(ns, req)?;
        Ok(Box::new(MemoryCursor {
            server: Arc::clone(&self.server),
            ns: ns.clone(),
            cursor_id: reply.cursor_id,
            buffer: reply.documents.into(),
            batch_size: req.batch_size,
        }))
    }

    async fn shutdown(&self) -> Result<(), DbError> {
        // The server is shared and outlives the connection; only this link goes away.
        log::debug!("memory backend released");
        Ok(())
    }
}

/// Client half of a server-side cursor: buffers one batch and pulls the next on demand.
pub struct MemoryCursor {
    server: Arc<MemoryServer>,
    ns: Namespace,
    cursor_id: i64,
    buffer: VecDeque<Document>,
    batch_size: Option<u32>,
}

impl MemoryCursor {
    /// Server-side id; zero once the server holds nothing more for this cursor.
    #[must_use]
    pub fn cursor_id(&self) -> i64 {
        self.cursor_id
    }

    fn release(&mut self) {
        if self.cursor_id != 0 {
            self.server.kill_cursors(&[self.cursor_id]);
            self.cursor_id = 0;
        }
        self.buffer.clear();
    }
}

#[async_trait]
impl CursorSource for MemoryCursor {
    async fn advance(&mut self) -> Result<Option<Document>, DbError> {
        if let Some(d) = self.buffer.pop_front() {
            return Ok(Some(d));
        }
        if self.cursor_id == 0 {
            return Ok(None);
        }
        let reply = self.server.get_more(&self.ns, self.cursor_id, self.batch_size).map_err(|e| match e {
            DbError::Cursor(m) => DbError::Cursor(m),
            other => DbError::Cursor(format!("lost server during iteration: {other}")),
        })?;
        self.cursor_id = reply.cursor_id;
        self.buffer.extend(reply.documents);
        Ok(self.buffer.pop_front())
    }

    async fn close(&mut self) -> Result<(), DbError> {
        self.release();
        Ok(())
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        if self.cursor_id != 0 {
            log::debug!("cursor {} on {} dropped without close", self.cursor_id, self.ns);
            self.release();
        }
    }
}
