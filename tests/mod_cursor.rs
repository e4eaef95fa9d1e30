mod common;

use bson::doc;
use docquery::server::MemoryServer;
use docquery::{CursorState, FindOptions};

#[tokio::test]
async fn cursor_yields_the_same_set_as_find_all() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    let all = client.find_all(doc! {}, FindOptions::with_batch_size(50)).await.unwrap();

    let mut cursor = client.iterate(doc! {}, FindOptions::with_batch_size(50)).await.unwrap();
    assert_eq!(cursor.state(), CursorState::Created);
    let mut seen = Vec::new();
    while let Some(d) = cursor.next().await.unwrap() {
        seen.push(d);
    }
    assert_eq!(cursor.state(), CursorState::Open);
    assert_eq!(seen, all);
    assert_eq!(cursor.position(), all.len() as u64);
    cursor.close().await.unwrap();
    assert_eq!(cursor.state(), CursorState::Closed);
}

#[tokio::test]
async fn capped_walk_then_close_releases_server_cursor() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    let mut cursor = client.iterate(doc! {}, FindOptions::with_batch_size(50)).await.unwrap();
    for _ in 0..100 {
        assert!(cursor.next().await.unwrap().is_some());
    }
    assert_eq!(server.open_cursors(), 1);
    cursor.close().await.unwrap();
    assert_eq!(server.open_cursors(), 0);
    cursor.close().await.unwrap();
    assert!(cursor.next().await.unwrap_err().is_cursor());
}

#[tokio::test]
async fn dropping_a_cursor_releases_it() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    {
        let mut cursor = client.iterate(doc! {}, FindOptions::with_batch_size(10)).await.unwrap();
        cursor.next().await.unwrap();
        assert_eq!(server.open_cursors(), 1);
    }
    assert_eq!(server.open_cursors(), 0);
}

#[tokio::test]
async fn exhausted_cursor_keeps_returning_none() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    let mut cursor = client.iterate(doc! {"title": "The Room"}, FindOptions::with_batch_size(1)).await.unwrap();
    assert!(cursor.next().await.unwrap().is_some());
    assert!(cursor.next().await.unwrap().is_some());
    assert!(cursor.next().await.unwrap().is_none());
    assert!(cursor.next().await.unwrap().is_none());
    assert_eq!(server.open_cursors(), 0);
    cursor.close().await.unwrap();
}

#[tokio::test]
async fn empty_collection_ends_immediately() {
    let server = MemoryServer::shared();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    let mut cursor = client.iterate(doc! {}, FindOptions::with_batch_size(50)).await.unwrap();
    assert!(cursor.next().await.unwrap().is_none());
    cursor.close().await.unwrap();
    assert!(client.find_all(doc! {}, FindOptions::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn server_shutdown_mid_iteration_is_a_cursor_error() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    let mut cursor = client.iterate(doc! {}, FindOptions::with_batch_size(2)).await.unwrap();
    assert!(cursor.next().await.unwrap().is_some());
    assert!(cursor.next().await.unwrap().is_some());
    server.shutdown();
    let err = cursor.next().await.unwrap_err();
    assert!(err.is_cursor(), "{err}");
    assert_eq!(cursor.state(), CursorState::Closed);
    assert!(cursor.next().await.unwrap_err().is_cursor());
}

#[tokio::test]
async fn killed_server_cursor_is_a_cursor_error() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    let mut cursor = client.iterate(doc! {}, FindOptions::with_batch_size(3)).await.unwrap();
    for _ in 0..3 {
        cursor.next().await.unwrap();
    }
    assert_eq!(server.open_cursors(), 1);
    server.kill_cursors(&[1]);
    assert!(cursor.next().await.unwrap_err().is_cursor());
}
