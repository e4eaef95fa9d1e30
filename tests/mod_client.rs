mod common;

use bson::doc;
use docquery::server::MemoryServer;
use docquery::{FindOneOptions, FindOptions};

fn room_opts() -> FindOneOptions {
    FindOneOptions { sort: Some(doc! {"rating": -1}), projection: Some(doc! {"_id": 0, "title": 1, "imdb": 1}) }
}

#[tokio::test]
async fn find_one_returns_highest_rated_projection() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    let d = client.find_one(doc! {"title": "The Room"}, room_opts()).await.unwrap().unwrap();
    let keys: Vec<&str> = d.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["title", "imdb"]);
    assert_eq!(d.get_str("title").unwrap(), "The Room");
    assert_eq!(d.get_document("imdb").unwrap().get_f64("rating").unwrap(), 8.1);
    assert_eq!(server.open_cursors(), 0);
}

#[tokio::test]
async fn find_one_without_match_is_none() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    assert!(client.find_one(doc! {"title": "Not A Film"}, room_opts()).await.unwrap().is_none());

    let empty = MemoryServer::shared();
    let conn = common::connect(&empty);
    let client = conn.query_client(common::ns());
    assert!(client.find_one(doc! {}, FindOneOptions::default()).await.unwrap().is_none());
}

#[tokio::test]
async fn find_all_copies_the_collection() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    let mut all = client.find_all(doc! {}, FindOptions::with_batch_size(50)).await.unwrap();
    assert_eq!(all.len(), common::total());
    let first = all[0].clone();
    let last = all.pop().unwrap();
    assert_eq!(first.get_i32("n").unwrap(), 0);
    assert_eq!(last.get_i32("n").unwrap(), 1001);

    let again = client.find_all(doc! {}, FindOptions::with_batch_size(50)).await.unwrap();
    assert_eq!(again.len(), common::total());
    assert_eq!(server.count(&common::ns()), common::total());
    assert_eq!(server.open_cursors(), 0);
}

#[tokio::test]
async fn batch_size_never_changes_the_result() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    let filter = doc! {"rating": {"$gte": 5}};
    let base = client.find_all(filter.clone(), FindOptions::default()).await.unwrap();
    assert!(!base.is_empty());
    for batch in [1, 7, 50, 5000] {
        let got = client.find_all(filter.clone(), FindOptions::with_batch_size(batch)).await.unwrap();
        assert_eq!(got, base, "batch size {batch}");
    }
}

#[tokio::test]
async fn limit_skip_and_sort() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    let opts = FindOptions {
        batch_size: Some(2),
        sort: Some(doc! {"n": 1}),
        projection: Some(doc! {"n": 1, "_id": 0}),
        limit: Some(5),
        skip: Some(10),
    };
    let got = client.find_all(doc! {"n": {"$lt": 1000}}, opts).await.unwrap();
    let ns: Vec<i32> = got.iter().map(|d| d.get_i32("n").unwrap()).collect();
    assert_eq!(ns, vec![10, 11, 12, 13, 14]);
}

#[tokio::test]
async fn negative_limit_is_a_single_batch() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    let opts = FindOptions { batch_size: Some(1), limit: Some(-3), ..FindOptions::default() };
    assert_eq!(client.find_all(doc! {}, opts).await.unwrap().len(), 3);
    assert_eq!(server.open_cursors(), 0);
}

#[tokio::test]
async fn malformed_input_fails_before_any_request() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    let before = server.requests();

    let err = client.find_all(doc! {"$and": 1}, FindOptions::default()).await.unwrap_err();
    assert!(err.is_query());
    let err = client
        .find_one(doc! {}, FindOneOptions { sort: Some(doc! {"rating": "up"}), projection: None })
        .await
        .unwrap_err();
    assert!(err.is_query());
    let err = client
        .find_one(doc! {}, FindOneOptions { sort: None, projection: Some(doc! {"title": 1, "year": 0}) })
        .await
        .unwrap_err();
    assert!(err.is_query());
    let err = client.iterate(doc! {"$or": [{"n": 1}, 2]}, FindOptions::default()).await.err().unwrap();
    assert!(err.is_query());

    assert_eq!(server.requests(), before);
}

#[tokio::test]
async fn unsupported_operators_are_rejected_by_the_memory_server() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    let before = server.requests();

    let err = client.find_all(doc! {"$where": "1"}, FindOptions::default()).await.unwrap_err();
    assert!(err.is_query());
    let err = client.iterate(doc! {"rating": {"$gt": 1, "$near": 2}}, FindOptions::default()).await.err().unwrap();
    assert!(err.is_query());
    assert_eq!(server.requests(), before + 2);
    assert_eq!(server.open_cursors(), 0);
}

#[tokio::test]
async fn regex_filters_run_on_the_memory_server() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    let opts = FindOptions { sort: Some(doc! {"year": 1}), ..FindOptions::default() };
    let got = client
        .find_all(doc! {"title": {"$regex": "^the room$", "$options": "i"}}, opts)
        .await
        .unwrap();
    let years: Vec<i32> = got.iter().map(|d| d.get_i32("year").unwrap()).collect();
    assert_eq!(years, vec![2003, 2019]);

    let got = client.find_all(doc! {"title": {"$regex": "^Movie 11\\d$"}}, FindOptions::default()).await.unwrap();
    assert_eq!(got.len(), 10);
    let err = client.find_all(doc! {"title": {"$regex": "(("}}, FindOptions::default()).await.unwrap_err();
    assert!(err.is_query());
}

#[tokio::test]
async fn dotted_paths_cross_arrays_of_documents() {
    let server = MemoryServer::shared();
    let ns = common::ns();
    server.insert_one(&ns, doc! {"title": "Heat", "awards": [{"wins": 3}, {"wins": 1}]});
    server.insert_one(&ns, doc! {"title": "Ran", "awards": [{"wins": 2}]});
    server.insert_one(&ns, doc! {"title": "Alien"});
    let conn = common::connect(&server);
    let client = conn.query_client(ns);

    let opts = FindOneOptions { sort: None, projection: Some(doc! {"awards.wins": 1, "_id": 0}) };
    let d = client.find_one(doc! {"awards.wins": 3}, opts).await.unwrap().unwrap();
    assert_eq!(d, doc! {"awards": [{"wins": 3}, {"wins": 1}]});

    let opts = FindOptions { sort: Some(doc! {"awards.wins": -1}), projection: Some(doc! {"title": 1, "_id": 0}), ..FindOptions::default() };
    let titles: Vec<String> = client
        .find_all(doc! {"awards.wins": {"$gte": 1}}, opts)
        .await
        .unwrap()
        .iter()
        .map(|d| d.get_str("title").unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["Heat", "Ran"]);
}

#[tokio::test]
async fn metrics_count_operations() {
    let server = common::movies();
    let conn = common::connect(&server);
    let client = conn.query_client(common::ns());
    client.find_one(doc! {"title": "The Room"}, room_opts()).await.unwrap();
    client.find_all(doc! {"n": {"$in": [1, 2, 3]}}, FindOptions::default()).await.unwrap();
    assert!(client.find_all(doc! {"$and": 1}, FindOptions::default()).await.is_err());
    let m = conn.metrics();
    assert_eq!(m.queries_total, 2);
    assert_eq!(m.documents_returned_total, 4);

    assert!(client.find_all(doc! {"$bogus": 1}, FindOptions::default()).await.is_err());
    assert_eq!(conn.metrics().queries_total, 3);
}
