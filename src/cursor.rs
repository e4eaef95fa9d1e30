use crate::backend::CursorSource;
use crate::connection::Connection;
use crate::errors::DbError;
use crate::types::{Document, Namespace};
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Created,
    Open,
    Closed,
}

/// A forward-only, server-backed cursor.
///
/// The `'conn` lifetime ties the cursor to the `Connection` it came from, so the
/// connection cannot be closed while the cursor is alive. A cursor moves
/// `Created -> Open` on its first `next`, and `-> Closed` on `close` or on any failure.
pub struct Cursor<'conn> {
    source: Box<dyn CursorSource>,
    ns: Namespace,
    state: CursorState,
    position: u64,
    _conn: PhantomData<&'conn Connection>,
}

impl<'conn> Cursor<'conn> {
    pub(crate) fn new(source: Box<dyn CursorSource>, ns: Namespace) -> Self {
        Self { source, ns, state: CursorState::Created, position: 0, _conn: PhantomData }
    }

    #[must_use]
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Number of documents yielded so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    #[must_use]
    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    /// Waits for the next document; `Ok(None)` marks the end of the sequence and is
    /// returned again on every further call.
    ///
    /// # Errors
    /// Returns `DbError::Cursor` if the cursor is closed or the server fails mid-iteration.
    pub async fn next(&mut self) -> Result<Option<Document>, DbError> {
        if self.state == CursorState::Closed {
            return Err(DbError::Cursor(format!("cursor on {} is closed", self.ns)));
        }
        self.state = CursorState::Open;
        match self.source.advance().await {
            Ok(Some(d)) => {
                self.position += 1;
                Ok(Some(d))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.state = CursorState::Closed;
                if let Err(close_err) = self.source.close().await {
                    log::debug!("releasing failed cursor on {}: {close_err}", self.ns);
                }
                log::warn!("cursor on {} failed after {} documents: {e}", self.ns, self.position);
                Err(match e {
                    DbError::Cursor(_) => e,
                    other => DbError::Cursor(other.to_string()),
                })
            }
        }
    }

    /// Drains every remaining document into memory.
    ///
    /// # Errors
    /// Same as `next`.
    pub async fn collect_remaining(&mut self) -> Result<Vec<Document>, DbError> {
        let mut out = Vec::new();
        while let Some(d) = self.next().await? {
            out.push(d);
        }
        Ok(out)
    }

    /// Releases the server-side cursor. Closing an already closed cursor does nothing.
    ///
    /// # Errors
    /// Propagates a failure to release the server-side cursor.
    pub async fn close(&mut self) -> Result<(), DbError> {
        if self.state == CursorState::Closed {
            return Ok(());
        }
        self.state = CursorState::Closed;
        log::debug!("closing cursor on {} after {} documents", self.ns, self.position);
        self.source.close().await
    }
}
