use bson::Document;

/// Server-side cursor over a materialized result set.
///
/// The result set is a snapshot taken when the query ran, so later writes to the
/// collection never show up in an open cursor.
#[derive(Debug, Clone)]
pub struct ServerCursor {
    docs: Vec<Document>,
    offset: usize,
    // Documents still allowed by the query's limit; `None` means unlimited.
    remaining: Option<usize>,
}

impl ServerCursor {
    #[must_use]
    pub fn new(docs: Vec<Document>, limit: Option<usize>) -> Self {
        Self { docs, offset: 0, remaining: limit }
    }

    pub fn next_doc(&mut self) -> Option<Document> {
        if self.is_exhausted() {
            return None;
        }
        let d = self.docs.get(self.offset)?.clone();
        self.offset += 1;
        if let Some(r) = self.remaining.as_mut() {
            *r -= 1;
        }
        Some(d)
    }

    pub fn skip(&mut self, n: usize) {
        self.offset = self.offset.saturating_add(n).min(self.docs.len());
    }

    /// Index of the next document to be returned.
    #[must_use]
    pub fn position(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.offset >= self.docs.len() || self.remaining == Some(0)
    }

    /// Pulls up to `n` documents.
    pub fn next_batch(&mut self, n: usize) -> Vec<Document> {
        let mut out = Vec::with_capacity(n.min(self.docs.len().saturating_sub(self.offset)));
        while out.len() < n {
            match self.next_doc() {
                Some(d) => out.push(d),
                None => break,
            }
        }
        out
    }
}
