//! In-process document server.
//!
//! Holds collections in memory and serves reads the way a MongoDB server does: a query
//! returns a first batch plus a cursor id, further batches are pulled with `get_more`,
//! and abandoned cursors are released with `kill_cursors`.

mod cursor;
mod seed;

pub use cursor::ServerCursor;
pub use seed::read_seed_file;

use crate::errors::DbError;
use crate::query::{FindRequest, QueryPlan, apply_projection, compare_docs, eval_filter};
use crate::types::{Document, Namespace};
use bson::{Bson, oid::ObjectId};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Batch size used when a request does not name one.
pub const DEFAULT_RETURN_SIZE: usize = 1000;

/// One server round trip worth of results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    /// Zero when the server holds no further results for this query.
    pub cursor_id: i64,
    pub starting_from: usize,
    pub documents: Vec<Document>,
}

struct OpenCursor {
    ns: Namespace,
    cursor: ServerCursor,
}

#[derive(Default)]
pub struct MemoryServer {
    collections: RwLock<HashMap<Namespace, Vec<Document>>>,
    cursors: Mutex<HashMap<i64, OpenCursor>>,
    cursor_id_counter: AtomicI64,
    request_count: AtomicU64,
    down: AtomicBool,
}

impl MemoryServer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Inserts a document, assigning an `ObjectId` `_id` first when it has none.
    pub fn insert_one(&self, ns: &Namespace, doc: Document) -> Bson {
        let doc = if doc.contains_key("_id") {
            doc
        } else {
            let mut with_id = Document::new();
            with_id.insert("_id", ObjectId::new());
            for (k, v) in doc {
                with_id.insert(k, v);
            }
            with_id
        };
        let id = doc.get("_id").cloned().unwrap_or(Bson::Null);
        self.collections.write().entry(ns.clone()).or_default().push(doc);
        id
    }

    pub fn insert_many<I: IntoIterator<Item = Document>>(&self, ns: &Namespace, docs: I) -> usize {
        let mut n = 0;
        for d in docs {
            self.insert_one(ns, d);
            n += 1;
        }
        n
    }

    #[must_use]
    pub fn count(&self, ns: &Namespace) -> usize {
        self.collections.read().get(ns).map_or(0, Vec::len)
    }

    /// # Errors
    /// Returns `DbError::Connection` after `shutdown`.
    pub fn ping(&self) -> Result<(), DbError> {
        self.check_up()?;
        self.request_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Runs a query and returns its first batch.
    ///
    /// # Errors
    /// Returns `DbError::Connection` after `shutdown` and `DbError::Query` for operators
    /// the in-process evaluator does not support.
    pub fn query(&self, ns: &Namespace, req: &FindRequest) -> Result<Reply, DbError> {
        self.check_up()?;
        self.request_count.fetch_add(1, Ordering::Relaxed);
        let plan = QueryPlan::compile(req)?;

        let mut docs: Vec<Document> = self
            .collections
            .read()
            .get(ns)
            .map(|all| all.iter().filter(|d| eval_filter(d, &plan.filter)).cloned().collect())
            .unwrap_or_default();
        if !plan.sort.is_empty() {
            docs.sort_by(|a, b| compare_docs(a, b, &plan.sort));
        }
        if let Some(p) = &plan.projection {
            for d in &mut docs {
                *d = apply_projection(d, p);
            }
        }

        let limit = req.limit.filter(|l| *l != 0).map(|l| usize::try_from(l.unsigned_abs()).unwrap_or(usize::MAX));
        let single_batch = req.limit.is_some_and(|l| l < 0);
        let batch = if single_batch { limit.unwrap_or(DEFAULT_RETURN_SIZE) } else { batch_len(req.batch_size) };

        let mut cursor = ServerCursor::new(docs, limit);
        cursor.skip(req.skip.map_or(0, |s| usize::try_from(s).unwrap_or(usize::MAX)));
        let starting_from = cursor.position();
        let documents = cursor.next_batch(batch);

        let cursor_id = if single_batch || cursor.is_exhausted() {
            0
        } else {
            let id = self.cursor_id_counter.fetch_add(1, Ordering::Relaxed) + 1;
            self.cursors.lock().insert(id, OpenCursor { ns: ns.clone(), cursor });
            id
        };
        log::debug!("query {ns}: returned {} docs, cursor {cursor_id}", documents.len());
        Ok(Reply { cursor_id, starting_from, documents })
    }

    /// Pulls the next batch of an open cursor.
    ///
    /// # Errors
    /// Returns `DbError::Connection` after `shutdown` and `DbError::Cursor` for unknown ids.
    pub fn get_more(&self, ns: &Namespace, cursor_id: i64, batch_size: Option<u32>) -> Result<Reply, DbError> {
        self.check_up()?;
        self.request_count.fetch_add(1, Ordering::Relaxed);

        let mut cursors = self.cursors.lock();
        let open = cursors
            .get_mut(&cursor_id)
            .filter(|o| &o.ns == ns)
            .ok_or_else(|| DbError::Cursor(format!("cursor {cursor_id} not found on {ns}")))?;
        let starting_from = open.cursor.position();
        let documents = open.cursor.next_batch(batch_len(batch_size));
        let exhausted = open.cursor.is_exhausted();
        let next_id = if exhausted {
            cursors.remove(&cursor_id);
            0
        } else {
            cursor_id
        };
        log::debug!("getMore {ns} cursor {cursor_id}: returned {} docs", documents.len());
        Ok(Reply { cursor_id: next_id, starting_from, documents })
    }

    /// Releases cursors; unknown ids are ignored. Returns how many were removed.
    pub fn kill_cursors(&self, ids: &[i64]) -> usize {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        let mut cursors = self.cursors.lock();
        ids.iter().filter(|id| cursors.remove(*id).is_some()).count()
    }

    #[must_use]
    pub fn open_cursors(&self) -> usize {
        self.cursors.lock().len()
    }

    /// Number of requests served so far (pings, queries, get-mores and kills).
    #[must_use]
    pub fn requests(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Stops serving: every open cursor is dropped and later requests fail.
    pub fn shutdown(&self) {
        self.down.store(true, Ordering::SeqCst);
        self.cursors.lock().clear();
        log::info!("in-process server shut down");
    }

    #[must_use]
    pub fn is_down(&self) -> bool {
        self.down.load(Ordering::SeqCst)
    }

    fn check_up(&self) -> Result<(), DbError> {
        if self.is_down() {
            return Err(DbError::Connection("server is not accepting connections".into()));
        }
        Ok(())
    }
}

fn batch_len(batch_size: Option<u32>) -> usize {
    match batch_size {
        Some(n) if n > 0 => n as usize,
        _ => DEFAULT_RETURN_SIZE,
    }
}
