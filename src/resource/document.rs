//! Document resources
//!
//! Cloud Firestore documents of one collection, through the Firestore v1 REST
//! API on the `(default)` database.

use super::firestore_value::{decode_document, encode_fields, field_path};
use super::pager::{paginate, Page};
use super::{ParameterBag, ResourceClient, ResourceKind, Snapshot, SnapshotStream};
use crate::error::BackendError;
use crate::gcp::client::GcpClient;
use async_trait::async_trait;
use serde_json::json;

const ID_PARAM: &str = "docId";

/// Client for the documents of one Firestore collection
pub struct DocumentClient {
    client: GcpClient,
    collection: String,
    page_size: u32,
}

impl DocumentClient {
    pub fn new(client: GcpClient, collection: &str, page_size: u32) -> Self {
        Self {
            client,
            collection: collection.to_string(),
            page_size: page_size.max(1),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    async fn fetch_page(&self, token: Option<String>) -> Result<Page, BackendError> {
        let mut url = format!(
            "{}?pageSize={}",
            self.client.firestore_url(&self.collection),
            self.page_size
        );
        if let Some(token) = token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(&token)));
        }

        let response = self.client.get(&url).await?;
        // An empty collection answers `{}`
        let items = response
            .get("documents")
            .and_then(|v| v.as_array())
            .map(|docs| docs.iter().map(decode_document).collect::<Result<Vec<_>, _>>())
            .transpose()?
            .unwrap_or_default();
        let next_token = response
            .get("nextPageToken")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(Page::new(items, next_token))
    }
}

#[async_trait]
impl ResourceClient for DocumentClient {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Document
    }

    async fn create(&self, params: &ParameterBag) -> Result<Snapshot, BackendError> {
        let mut url = self.client.firestore_url(&self.collection);
        if let Some(id) = params.get(ID_PARAM) {
            url.push_str(&format!("?documentId={}", urlencoding::encode(id)));
        }
        let body = json!({ "fields": encode_fields(params.fields_except(&[ID_PARAM])) });

        let response = self.client.post(&url, &body).await?;
        let snapshot = decode_document(&response)?;

        tracing::info!("Created document {}/{}", self.collection, snapshot.id);
        Ok(snapshot)
    }

    async fn read(&self, id: &str) -> Result<Snapshot, BackendError> {
        let url = self.client.firestore_document_url(&self.collection, id);
        let response = self.client.get(&url).await?;
        decode_document(&response)
    }

    fn scan(&self) -> SnapshotStream<'_> {
        paginate(move |token| self.fetch_page(token))
    }

    /// Field-mask update: fields not named in the mask keep their values.
    /// Like a merge `set`, this creates the document when it does not exist.
    async fn update(&self, id: &str, params: &ParameterBag) -> Result<Snapshot, BackendError> {
        let fields: Vec<(&str, &str)> = params.fields_except(&[ID_PARAM]).collect();
        if fields.is_empty() {
            // A PATCH without a mask would replace the whole document
            tracing::warn!("No fields to update on {}/{}", self.collection, id);
            return self.read(id).await;
        }

        let mask: Vec<String> = fields
            .iter()
            .map(|(name, _)| {
                format!(
                    "updateMask.fieldPaths={}",
                    urlencoding::encode(&field_path(name))
                )
            })
            .collect();
        let url = format!(
            "{}?{}",
            self.client.firestore_document_url(&self.collection, id),
            mask.join("&")
        );
        let body = json!({ "fields": encode_fields(fields) });

        let response = self.client.patch(&url, &body).await?;
        tracing::info!("Updated document {}/{}", self.collection, id);
        decode_document(&response)
    }

    async fn delete(&self, id: &str) -> Result<(), BackendError> {
        // Firestore deletes are idempotent unless the document must exist
        let url = format!(
            "{}?currentDocument.exists=true",
            self.client.firestore_document_url(&self.collection, id)
        );
        self.client.delete(&url).await?;
        tracing::info!("Deleted document {}/{}", self.collection, id);
        Ok(())
    }
}
