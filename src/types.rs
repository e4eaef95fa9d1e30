use crate::errors::DbError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A schemaless record. Values are the tagged `bson::Bson` variants.
pub type Document = bson::Document;

/// Identifies one collection inside one database (`database.collection`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    /// # Errors
    /// Returns `DbError::Config` when either part is empty or the database name contains a dot.
    pub fn new(database: &str, collection: &str) -> Result<Self, DbError> {
        if database.is_empty() || collection.is_empty() {
            return Err(DbError::Config("database and collection names must be non-empty".into()));
        }
        if database.contains('.') {
            return Err(DbError::Config(format!("invalid database name: {database}")));
        }
        Ok(Self { database: database.to_string(), collection: collection.to_string() })
    }

    /// Parses `database.collection`; the collection part may itself contain dots.
    ///
    /// # Errors
    /// Returns `DbError::Config` when there is no separator or a part is empty.
    pub fn parse(full: &str) -> Result<Self, DbError> {
        let (db, col) = full
            .split_once('.')
            .ok_or_else(|| DbError::Config(format!("namespace must be db.collection: {full}")))?;
        Self::new(db, col)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}
