#![allow(dead_code)]

use bson::doc;
use docquery::backend::MemoryBackend;
use docquery::server::MemoryServer;
use docquery::{Connection, Namespace};
use std::sync::Arc;

pub const MOVIES: usize = 120;

pub fn ns() -> Namespace {
    Namespace::new("sample_mflix", "movies").unwrap()
}

/// `MOVIES` numbered films plus two releases titled "The Room".
pub fn movies() -> Arc<MemoryServer> {
    let server = MemoryServer::shared();
    let ns = ns();
    for n in 0..MOVIES as i32 {
        server.insert_one(
            &ns,
            doc! {"n": n, "title": format!("Movie {n}"), "rating": f64::from(n % 10), "year": 1990 + n % 30},
        );
    }
    server.insert_one(
        &ns,
        doc! {"n": 1000, "title": "The Room", "rating": 3.7, "year": 2003, "imdb": {"rating": 3.7, "votes": 5000}},
    );
    server.insert_one(
        &ns,
        doc! {"n": 1001, "title": "The Room", "rating": 8.1, "year": 2019, "imdb": {"rating": 8.1, "votes": 120}},
    );
    server
}

pub fn total() -> usize {
    MOVIES + 2
}

pub fn connect(server: &Arc<MemoryServer>) -> Connection {
    Connection::with_backend(Box::new(MemoryBackend::new(Arc::clone(server))), "memory://")
}
