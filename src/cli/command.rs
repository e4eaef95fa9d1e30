/// One CLI operation. JSON-valued arguments are kept as text and validated when run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// FindOne, FindAll and a capped cursor walk over the whole collection.
    Demo {
        max_items: usize,
        batch_size: u32,
    },
    FindOne {
        filter_json: String,
        sort: Option<String>,
        project: Option<String>,
    },
    Find {
        filter_json: String,
        batch_size: Option<u32>,
        limit: Option<i64>,
        skip: Option<u64>,
        sort: Option<String>,
        project: Option<String>,
    },
    Iterate {
        filter_json: String,
        batch_size: Option<u32>,
        // None streams to the end
        max_items: Option<usize>,
    },
}
