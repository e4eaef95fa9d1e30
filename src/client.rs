use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::errors::DbError;
use crate::query::{FindOneOptions, FindOptions, FindRequest};
use crate::types::{Document, Namespace};
use std::time::Instant;

/// Reads against one collection over one open connection.
///
/// The shape of filter, sort and projection is checked before anything is sent, so
/// malformed input fails with `DbError::Query` without touching the server. Operators
/// themselves travel as written and are judged by the server.
pub struct QueryClient<'conn> {
    conn: &'conn Connection,
    ns: Namespace,
}

impl<'conn> QueryClient<'conn> {
    #[must_use]
    pub fn new(conn: &'conn Connection, ns: Namespace) -> Self {
        Self { conn, ns }
    }

    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    /// Returns the first match under `opts.sort`, restricted to `opts.projection`, or
    /// `None` when nothing matches.
    ///
    /// # Errors
    /// `DbError::Query` for malformed input, `DbError::Connection` when the server is unreachable.
    pub async fn find_one(&self, filter: Document, opts: FindOneOptions) -> Result<Option<Document>, DbError> {
        let req = FindRequest::new(filter, opts.into())?;
        let started = Instant::now();
        let out = self.conn.backend().find_one(&self.ns, &req).await;
        self.observe("findOne", started, out.as_ref().ok().map(|d| usize::from(d.is_some())));
        out
    }

    /// Fetches every match into memory. The returned vector is an independent copy;
    /// modifying it never touches the collection.
    ///
    /// # Errors
    /// Same as `find_one`, plus `DbError::Cursor` if the server drops the cursor midway.
    pub async fn find_all(&self, filter: Document, opts: FindOptions) -> Result<Vec<Document>, DbError> {
        let req = FindRequest::new(filter, opts)?;
        let started = Instant::now();
        let result = self.drain(&req).await;
        self.observe("find", started, result.as_ref().ok().map(Vec::len));
        result
    }

    async fn drain(&self, req: &FindRequest) -> Result<Vec<Document>, DbError> {
        let mut cursor = self.open(req).await?;
        let docs = cursor.collect_remaining().await;
        let closed = cursor.close().await;
        let docs = docs?;
        closed?;
        Ok(docs)
    }

    /// Opens a cursor over every match. The caller should `close` it when done; a dropped
    /// cursor is released as well.
    ///
    /// # Errors
    /// Same as `find_one`.
    pub async fn iterate(&self, filter: Document, opts: FindOptions) -> Result<Cursor<'conn>, DbError> {
        let req = FindRequest::new(filter, opts)?;
        let started = Instant::now();
        let cursor = self.open(&req).await;
        self.observe("openCursor", started, cursor.as_ref().ok().map(|_| 0));
        cursor
    }

    async fn open(&self, req: &FindRequest) -> Result<Cursor<'conn>, DbError> {
        let source = self.conn.backend().open_cursor(&self.ns, req).await?;
        Ok(Cursor::new(source, self.ns.clone()))
    }

    fn observe(&self, op: &str, started: Instant, returned: Option<usize>) {
        let (metrics, slow_ms) = self.conn.telemetry();
        metrics.record(op, &self.ns, started.elapsed(), slow_ms, returned);
    }
}
