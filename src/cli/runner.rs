use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::errors::DbError;
use crate::query::{FindOneOptions, FindOptions, parse_json_document};
use crate::types::Namespace;
use bson::doc;
use std::io::Write;

use super::command::Command;
use super::util::{parse_project_arg, parse_sort_arg, render_array, render_doc, render_opt};

/// Runs one command against `ns`, writing results to `out` one line each.
///
/// # Errors
/// Propagates query, cursor and connection failures and write errors on `out`.
pub async fn run<W: Write>(conn: &Connection, ns: &Namespace, cmd: Command, out: &mut W) -> Result<(), DbError> {
    let client = conn.query_client(ns.clone());
    match cmd {
        Command::Demo { max_items, batch_size } => {
            let opts = FindOneOptions {
                sort: Some(doc! {"rating": -1}),
                projection: Some(doc! {"_id": 0, "title": 1, "imdb": 1}),
            };
            let one = client.find_one(doc! {"title": "The Room"}, opts).await?;
            writeln!(out, "{}", render_opt(one.as_ref()))?;

            let mut all = client.find_all(doc! {}, FindOptions::with_batch_size(batch_size)).await?;
            writeln!(out, "{}", render_array(&all))?;
            let first = all.first().cloned();
            let last = all.pop();
            writeln!(out, "{} {}", render_opt(first.as_ref()), render_opt(last.as_ref()))?;

            let cursor = client.iterate(doc! {}, FindOptions::with_batch_size(batch_size)).await?;
            stream_and_close(cursor, Some(max_items), out).await?;
            writeln!(out, "Closed")?;
            Ok(())
        }
        Command::FindOne { filter_json, sort, project } => {
            let filter = parse_json_document(&filter_json)?;
            let opts = FindOneOptions {
                sort: sort.as_deref().map(parse_sort_arg).transpose()?,
                projection: project.as_deref().map(parse_project_arg).transpose()?,
            };
            let one = client.find_one(filter, opts).await?;
            writeln!(out, "{}", render_opt(one.as_ref()))?;
            Ok(())
        }
        Command::Find { filter_json, batch_size, limit, skip, sort, project } => {
            let filter = parse_json_document(&filter_json)?;
            let opts = FindOptions {
                batch_size,
                sort: sort.as_deref().map(parse_sort_arg).transpose()?,
                projection: project.as_deref().map(parse_project_arg).transpose()?,
                limit,
                skip,
            };
            // NDJSON
            for d in client.find_all(filter, opts).await? {
                writeln!(out, "{}", render_doc(&d))?;
            }
            Ok(())
        }
        Command::Iterate { filter_json, batch_size, max_items } => {
            let filter = parse_json_document(&filter_json)?;
            let opts = FindOptions { batch_size, ..FindOptions::default() };
            let cursor = client.iterate(filter, opts).await?;
            stream_and_close(cursor, max_items, out).await?;
            writeln!(out, "Closed")?;
            Ok(())
        }
    }
}

/// Prints documents until the sequence ends or `cap` is reached, then closes the cursor
/// whether or not streaming succeeded.
async fn stream_and_close<W: Write>(mut cursor: Cursor<'_>, cap: Option<usize>, out: &mut W) -> Result<(), DbError> {
    let streamed = stream(&mut cursor, cap, out).await;
    let closed = cursor.close().await;
    streamed?;
    closed
}

async fn stream<W: Write>(cursor: &mut Cursor<'_>, cap: Option<usize>, out: &mut W) -> Result<(), DbError> {
    let mut printed = 0usize;
    while cap.is_none_or(|c| printed < c) {
        let Some(d) = cursor.next().await? else { break };
        writeln!(out, "{}", render_doc(&d))?;
        printed += 1;
    }
    log::debug!("streamed {printed} documents from {}", cursor.namespace());
    Ok(())
}
