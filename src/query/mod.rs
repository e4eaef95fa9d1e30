// Validation and in-process evaluation of filter / sort / projection documents
mod eval;
mod parse;
mod types;

pub use eval::{apply_projection, compare_bson, compare_docs, eval_filter};
pub use parse::{parse_filter, parse_json_document, parse_projection, parse_sort};
pub use types::{
    CmpOp, Filter, FindOneOptions, FindOptions, FindRequest, Order, Projection, QueryPlan, SortSpec,
};
