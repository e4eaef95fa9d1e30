use super::{Backend, CursorSource};
use crate::errors::DbError;
use crate::query::FindRequest;
use crate::types::{Document, Namespace};
use async_trait::async_trait;
use bson::doc;
use futures::TryStreamExt;
use mongodb::Client;
use mongodb::options::{ClientOptions, FindOneOptions, FindOptions};
use std::time::Duration;

/// Backend over the official MongoDB driver.
pub struct MongoBackend {
    client: Client,
}

impl MongoBackend {
    /// Builds a driver client for `uri`. The driver connects lazily; call `ping` to find
    /// out whether the endpoint is reachable.
    ///
    /// # Errors
    /// Returns `DbError::Config` when the URI cannot be parsed.
    pub async fn connect(
        uri: &str,
        app_name: Option<&str>,
        server_selection_timeout: Option<Duration>,
    ) -> Result<Self, DbError> {
        let mut opts = ClientOptions::parse(uri)
            .await
            .map_err(|e| DbError::Config(format!("invalid connection string: {e}")))?;
        if let Some(name) = app_name {
            opts.app_name = Some(name.to_string());
        }
        if server_selection_timeout.is_some() {
            opts.server_selection_timeout = server_selection_timeout;
        }
        let client = Client::with_options(opts).map_err(|e| DbError::Config(e.to_string()))?;
        Ok(Self { client })
    }

    fn collection(&self, ns: &Namespace) -> mongodb::Collection<Document> {
        self.client.database(&ns.database).collection::<Document>(&ns.collection)
    }
}

#[async_trait]
impl Backend for MongoBackend {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    async fn ping(&self) -> Result<(), DbError> {
        self.client.database("admin").run_command(doc! {"ping": 1}).await?;
        Ok(())
    }

    async fn find_one(&self, ns: &Namespace, req: &FindRequest) -> Result<Option<Document>, DbError> {
        let mut opts = FindOneOptions::default();
        opts.sort.clone_from(&req.sort);
        opts.projection.clone_from(&req.projection);
        opts.skip = req.skip;
        Ok(self.collection(ns).find_one(req.filter.clone()).with_options(opts).await?)
    }

    async fn open_cursor(&self, ns: &Namespace, req: &FindRequest) -> Result<Box<dyn CursorSource>, DbError> {
        let mut opts = FindOptions::default();
        opts.batch_size = req.batch_size;
        opts.sort.clone_from(&req.sort);
        opts.projection.clone_from(&req.projection);
        opts.limit = req.limit;
        opts.skip = req.skip;
        let cursor = self.collection(ns).find(req.filter.clone()).with_options(opts).await?;
        Ok(Box::new(MongoCursor { inner: Some(cursor) }))
    }

    async fn shutdown(&self) -> Result<(), DbError> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

pub struct MongoCursor {
    inner: Option<mongodb::Cursor<Document>>,
}

#[async_trait]
impl CursorSource for MongoCursor {
    async fn advance(&mut self) -> Result<Option<Document>, DbError> {
        match self.inner.as_mut() {
            Some(c) => c.try_next().await.map_err(|e| DbError::Cursor(e.to_string())),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<(), DbError> {
        // Dropping a live driver cursor issues killCursors in the background.
        self.inner.take();
        Ok(())
    }
}
