// src/store/mongo.rs
use bson::{doc, Document};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use tokio::sync::OnceCell;

use super::{IndicatorStore, InsertOutcome, StoreError};
use crate::config::StoreConfig;
use crate::ingest::types::{IndicatorRecord, INGESTED_AT_FIELD};

/// Server error code for a unique index violation.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB collection backend. The client is created on first use, so a run
/// with nothing to insert never opens a connection.
pub struct MongoStore {
    cfg: StoreConfig,
    collection: OnceCell<Collection<Document>>,
}

impl MongoStore {
    pub fn new(cfg: StoreConfig) -> Self {
        Self {
            cfg,
            collection: OnceCell::new(),
        }
    }

    async fn collection(&self) -> Result<&Collection<Document>, StoreError> {
        self.collection
            .get_or_try_init(|| async {
                let client = Client::with_uri_str(&self.cfg.uri)
                    .await
                    .map_err(|e| StoreError::Connect(e.to_string()))?;
                tracing::debug!(
                    target: "store",
                    database = %self.cfg.database,
                    collection = %self.cfg.collection,
                    "mongo client ready"
                );
                Ok::<_, StoreError>(
                    client
                        .database(&self.cfg.database)
                        .collection::<Document>(&self.cfg.collection),
                )
            })
            .await
    }
}

#[async_trait::async_trait]
impl IndicatorStore for MongoStore {
    async fn ensure_unique_id(&self) -> Result<(), StoreError> {
        let coll = self.collection().await?;
        // Default index name `id_1`, so re-runs match an existing index.
        let model = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        coll.create_index(model)
            .await
            .map_err(|e| StoreError::Index(e.to_string()))?;
        Ok(())
    }

    async fn insert(&self, record: &IndicatorRecord) -> Result<InsertOutcome, StoreError> {
        let coll = self.collection().await?;
        let doc = to_document(record)?;
        match coll.insert_one(doc).await {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(StoreError::Insert(e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "mongodb"
    }
}

/// BSON form of a record; `ingested_at` becomes a native BSON datetime.
pub fn to_document(record: &IndicatorRecord) -> Result<Document, StoreError> {
    let mut doc =
        bson::to_document(record.fields()).map_err(|e| StoreError::Encode(e.to_string()))?;
    doc.insert(
        INGESTED_AT_FIELD,
        bson::DateTime::from_chrono(record.ingested_at()),
    );
    Ok(doc)
}

fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}
