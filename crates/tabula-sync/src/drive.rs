//! HTTP implementation of the remote drive boundary.
//!
//! One concrete client issuing requests directly against the drive REST API.
//! Every listing call decodes into the same typed response shape, and every
//! non-success status is classified through the error taxonomy, so callers
//! never branch on response shape or raw status codes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use tabula_core::defaults::{
    DRIVE_API_BASE, DRIVE_HTTP_TIMEOUT_SECS, DRIVE_LIST_PAGE_SIZE, DRIVE_UPLOAD_BASE,
};
use tabula_core::{CredentialStore, DriveObject, Error, RemoteDrive, Result};

const CONTAINER_MIME: &str = "application/vnd.google-apps.folder";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, modifiedTime)";
const FILE_FIELDS: &str = "id, name, modifiedTime";

/// Drive file resource as returned by metadata calls.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    id: String,
    name: String,
    modified_time: Option<DateTime<Utc>>,
}

impl From<FileResource> for DriveObject {
    fn from(file: FileResource) -> Self {
        DriveObject {
            id: file.id,
            name: file.name,
            modified_time: file.modified_time,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<FileResource>,
    next_page_token: Option<String>,
}

/// Escape a value for embedding into a drive search query string.
fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// HTTP drive client. The bearer token is read from the credential store
/// per request; a missing or expired credential surfaces `NotSignedIn`.
pub struct HttpDrive {
    client: Client,
    api_base: String,
    upload_base: String,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpDrive {
    /// Create a client against the production API endpoints.
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        Self::with_base_urls(
            DRIVE_API_BASE.to_string(),
            DRIVE_UPLOAD_BASE.to_string(),
            credentials,
        )
    }

    /// Create a client against custom endpoints (tests point this at a
    /// local mock server).
    pub fn with_base_urls(
        api_base: String,
        upload_base: String,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(DRIVE_HTTP_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            api_base,
            upload_base,
            credentials,
        }
    }

    async fn bearer(&self) -> Result<String> {
        self.credentials
            .get_valid()
            .await?
            .map(|c| c.access_token)
            .ok_or(Error::NotSignedIn)
    }

    /// Classify a non-success response through the error taxonomy.
    async fn ensure_success(
        response: reqwest::Response,
        context: &str,
    ) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::from_status(status.as_u16(), context, &body))
    }

    /// Upload object content. Kept separate from metadata creation so a
    /// failed upload leaves a listable object behind for the next sync to
    /// finish as an update, never a duplicate create.
    async fn upload_content(&self, object_id: &str, content: &[u8]) -> Result<()> {
        let token = self.bearer().await?;
        let response = self
            .client
            .patch(format!("{}/files/{}", self.upload_base, object_id))
            .query(&[("uploadType", "media")])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(content.to_vec())
            .send()
            .await?;
        Self::ensure_success(response, "upload content").await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteDrive for HttpDrive {
    async fn list_containers(&self, name: &str) -> Result<Vec<DriveObject>> {
        let token = self.bearer().await?;
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            escape_query(name),
            CONTAINER_MIME
        );
        let response = self
            .client
            .get(format!("{}/files", self.api_base))
            .query(&[("q", query.as_str()), ("fields", LIST_FIELDS)])
            .bearer_auth(token)
            .send()
            .await?;
        let list: FileList = Self::ensure_success(response, "list containers")
            .await?
            .json()
            .await?;
        Ok(list.files.into_iter().map(DriveObject::from).collect())
    }

    async fn create_container(&self, name: &str) -> Result<DriveObject> {
        let token = self.bearer().await?;
        let response = self
            .client
            .post(format!("{}/files", self.api_base))
            .query(&[("fields", FILE_FIELDS)])
            .bearer_auth(token)
            .json(&serde_json::json!({ "name": name, "mimeType": CONTAINER_MIME }))
            .send()
            .await?;
        let file: FileResource = Self::ensure_success(response, "create container")
            .await?
            .json()
            .await?;
        debug!(
            subsystem = "drive",
            op = "create_container",
            container_id = %file.id,
            "Created remote container"
        );
        Ok(file.into())
    }

    async fn list_objects(&self, container_id: &str) -> Result<Vec<DriveObject>> {
        let query = format!("'{}' in parents and trashed = false", escape_query(container_id));
        let page_size = DRIVE_LIST_PAGE_SIZE.to_string();
        let mut objects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.bearer().await?;
            let mut request = self
                .client
                .get(format!("{}/files", self.api_base))
                .query(&[
                    ("q", query.as_str()),
                    ("fields", LIST_FIELDS),
                    ("pageSize", page_size.as_str()),
                ])
                .bearer_auth(token);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page.as_str())]);
            }
            let list: FileList = Self::ensure_success(request.send().await?, "list objects")
                .await?
                .json()
                .await?;
            objects.extend(list.files.into_iter().map(DriveObject::from));
            match list.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(objects)
    }

    async fn create_object(
        &self,
        container_id: &str,
        name: &str,
        content: &[u8],
    ) -> Result<DriveObject> {
        let token = self.bearer().await?;
        let response = self
            .client
            .post(format!("{}/files", self.api_base))
            .query(&[("fields", FILE_FIELDS)])
            .bearer_auth(token)
            .json(&serde_json::json!({ "name": name, "parents": [container_id] }))
            .send()
            .await?;
        let file: FileResource = Self::ensure_success(response, "create object")
            .await?
            .json()
            .await?;
        self.upload_content(&file.id, content).await?;
        Ok(file.into())
    }

    async fn update_object(
        &self,
        object_id: &str,
        name: &str,
        content: &[u8],
    ) -> Result<DriveObject> {
        let token = self.bearer().await?;
        // Rename rides along with every update so remote names track the
        // latest title.
        let response = self
            .client
            .patch(format!("{}/files/{}", self.api_base, object_id))
            .query(&[("fields", FILE_FIELDS)])
            .bearer_auth(token)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;
        let file: FileResource = Self::ensure_success(response, "update object")
            .await?
            .json()
            .await?;
        self.upload_content(object_id, content).await?;
        Ok(file.into())
    }

    async fn get_object_content(&self, object_id: &str) -> Result<Vec<u8>> {
        let token = self.bearer().await?;
        let response = self
            .client
            .get(format!("{}/files/{}", self.api_base, object_id))
            .query(&[("alt", "media")])
            .bearer_auth(token)
            .send()
            .await?;
        let bytes = Self::ensure_success(response, "download object")
            .await?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    async fn delete_object(&self, object_id: &str) -> Result<()> {
        let token = self.bearer().await?;
        let response = self
            .client
            .delete(format!("{}/files/{}", self.api_base, object_id))
            .bearer_auth(token)
            .send()
            .await?;
        Self::ensure_success(response, "delete object").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_are_escaped() {
        assert_eq!(escape_query("Bob's Notes"), "Bob\\'s Notes");
        assert_eq!(escape_query(r"a\b"), r"a\\b");
    }
}
