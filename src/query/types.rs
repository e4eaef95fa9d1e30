use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

// Safety limits to prevent resource abuse
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 32;
pub(crate) const MAX_FILTER_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Nor(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
    /// `options` holds the server's flag letters (`i`, `m`, `s`, `x`).
    Regex { path: String, pattern: String, options: String },
}

/// A validated projection.
///
/// `_id` is kept unless `include_id` is false; inclusion and exclusion never mix for
/// other fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Include { fields: Vec<String>, include_id: bool },
    Exclude { fields: Vec<String>, include_id: bool },
}

/// Options for a single-document lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneOptions {
    pub sort: Option<Document>,
    pub projection: Option<Document>,
}

/// Options for multi-document reads.
///
/// `batch_size` only controls how many documents each server round trip carries; it never
/// changes the result. A negative `limit` asks for a single batch of at most `|limit|`
/// documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub batch_size: Option<u32>,
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
}

impl FindOptions {
    #[must_use]
    pub fn with_batch_size(batch_size: u32) -> Self {
        Self { batch_size: Some(batch_size), ..Self::default() }
    }
}

impl From<FindOneOptions> for FindOptions {
    fn from(o: FindOneOptions) -> Self {
        Self { sort: o.sort, projection: o.projection, limit: Some(-1), ..Self::default() }
    }
}

/// A read request whose documents passed the structural checks in `FindRequest::new`.
///
/// The documents are kept exactly as written so that a real server sees every operator it
/// understands. The in-process server compiles them into a `QueryPlan`.
#[derive(Debug, Clone, PartialEq)]
pub struct FindRequest {
    pub filter: Document,
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub batch_size: Option<u32>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
}

/// Parsed filter, sort and projection as evaluated by the in-process server.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub filter: Filter,
    pub sort: Vec<SortSpec>,
    pub projection: Option<Projection>,
}
