// src/storage.rs
//
// Remote object store capability and its Firebase Storage implementation.
// List/download go through the Firebase Storage REST surface; rename has
// no native endpoint, so it is a server-side copy (GCS rewrite) followed
// by a delete, with an existence pre-check so a retried rename does not
// double-apply.

use crate::types::VideoTask;
use anyhow::{bail, Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

const FIREBASE_STORAGE_API: &str = "https://firebasestorage.googleapis.com/v0";
const GCS_API: &str = "https://storage.googleapis.com/storage/v1";
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Remote video store capability.
pub trait ObjectStore {
    /// All stored objects, read once per batch run.
    async fn list(&self) -> Result<Vec<VideoTask>>;
    /// Streamable download URL for an object name.
    fn fetch_url(&self, object_name: &str) -> String;
    async fn rename(&self, task: &VideoTask, new_name: &str) -> Result<()>;
    async fn delete(&self, task: &VideoTask) -> Result<()>;
}

pub struct FirebaseStorage {
    http_client: reqwest::Client,
    bucket: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListItem>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RewriteResponse {
    done: bool,
    #[serde(rename = "rewriteToken")]
    rewrite_token: Option<String>,
}

impl FirebaseStorage {
    pub fn new(bucket: String, api_key: String) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            bucket,
            api_key,
        })
    }

    fn key_params(&self) -> Vec<(&'static str, String)> {
        if self.api_key.is_empty() {
            Vec::new()
        } else {
            vec![("key", self.api_key.clone())]
        }
    }

    fn object_endpoint(&self, object_name: &str) -> String {
        format!(
            "{}/b/{}/o/{}",
            FIREBASE_STORAGE_API,
            self.bucket,
            encode_object_name(object_name)
        )
    }

    async fn exists(&self, object_name: &str) -> Result<bool> {
        let response = self
            .http_client
            .get(self.object_endpoint(object_name))
            .query(&self.key_params())
            .send()
            .await
            .context("Object metadata request failed")?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => bail!("Object metadata request returned {}", status),
        }
    }

    /// Server-side copy. The rewrite endpoint may answer in several
    /// rounds for large objects; keep calling with its token until done.
    async fn copy_object(&self, from: &str, to: &str) -> Result<()> {
        let url = format!(
            "{}/b/{}/o/{}/rewriteTo/b/{}/o/{}",
            GCS_API,
            self.bucket,
            encode_object_name(from),
            self.bucket,
            encode_object_name(to)
        );

        let mut rewrite_token: Option<String> = None;
        loop {
            let mut params = self.key_params();
            if let Some(ref token) = rewrite_token {
                params.push(("rewriteToken", token.clone()));
            }

            let response = self
                .http_client
                .post(&url)
                .query(&params)
                .header(reqwest::header::CONTENT_LENGTH, 0)
                .send()
                .await
                .context("Copy request failed")?;

            if !response.status().is_success() {
                bail!("Copy of {} returned {}", from, response.status());
            }

            let body: RewriteResponse = response
                .json()
                .await
                .context("Malformed copy response")?;
            if body.done {
                return Ok(());
            }
            rewrite_token = body.rewrite_token;
            debug!("Copy of {} continuing with rewrite token", from);
        }
    }

    async fn delete_object(&self, object_name: &str) -> Result<()> {
        let response = self
            .http_client
            .delete(self.object_endpoint(object_name))
            .query(&self.key_params())
            .send()
            .await
            .context("Delete request failed")?;

        match response.status() {
            // Already gone: a retried delete is a success.
            StatusCode::NOT_FOUND => {
                warn!("Delete of {}: object already absent", object_name);
                Ok(())
            }
            status if status.is_success() => Ok(()),
            status => bail!("Delete of {} returned {}", object_name, status),
        }
    }
}

impl ObjectStore for FirebaseStorage {
    async fn list(&self) -> Result<Vec<VideoTask>> {
        let url = format!("{}/b/{}/o", FIREBASE_STORAGE_API, self.bucket);
        let mut tasks = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = self.key_params();
            if let Some(ref token) = page_token {
                params.push(("pageToken", token.clone()));
            }

            let response = self
                .http_client
                .get(&url)
                .query(&params)
                .send()
                .await
                .context("List request failed")?;

            if !response.status().is_success() {
                bail!("List returned {}", response.status());
            }

            let body: ListResponse = response.json().await.context("Malformed list response")?;

            for item in body.items {
                let task = VideoTask::new(item.name);
                // Folder placeholders list with an empty base filename.
                if task.base_name().is_empty() {
                    continue;
                }
                tasks.push(task);
            }

            match body.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!("Found {} object(s) in bucket {}", tasks.len(), self.bucket);
        Ok(tasks)
    }

    fn fetch_url(&self, object_name: &str) -> String {
        format!("{}?alt=media", self.object_endpoint(object_name))
    }

    async fn rename(&self, task: &VideoTask, new_name: &str) -> Result<()> {
        if self.exists(new_name).await? {
            info!(
                "Rename target {} already exists, skipping copy",
                new_name
            );
        } else {
            self.copy_object(&task.object_name, new_name).await?;
        }
        self.delete_object(&task.object_name).await?;

        info!("Renamed {} -> {}", task.object_name, new_name);
        Ok(())
    }

    async fn delete(&self, task: &VideoTask) -> Result<()> {
        self.delete_object(&task.object_name).await?;
        info!("Deleted {}", task.object_name);
        Ok(())
    }
}

/// Percent-encode a full object name into a single URL path segment
/// (slashes in object names must become %2F).
fn encode_object_name(name: &str) -> String {
    let mut url = Url::parse("https://firebasestorage.googleapis.com")
        .expect("static base url");
    url.path_segments_mut()
        .expect("base url has a path")
        .pop_if_empty()
        .push(name);
    url.path()[1..].to_string()
}
