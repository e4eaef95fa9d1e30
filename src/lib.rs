pub mod backend;
pub mod cli;
pub mod client;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod errors;
pub mod logger;
pub mod query;
pub mod server;
pub mod telemetry;
pub mod types;

pub use client::QueryClient;
pub use config::ClientConfig;
pub use connection::Connection;
pub use cursor::{Cursor, CursorState};
pub use errors::DbError;
pub use query::{FindOneOptions, FindOptions};
pub use types::{Document, Namespace};
