// src/reports.rs
//
// Report store capability (Firestore REST) and the emitter that turns a
// video verdict into its terminal side effect: rename + pending report
// for a violation, delete otherwise.

use crate::storage::ObjectStore;
use crate::types::VideoTask;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

const FIRESTORE_API: &str = "https://firestore.googleapis.com/v1";
const HTTP_TIMEOUT_SECS: u64 = 30;
/// Top-level collection holding one document per driver.
const DRIVERS_COLLECTION: &str = "drivers";

/// Pending-report sink capability. Returns the created report id.
pub trait ReportStore {
    async fn create_pending_report(&self, driver_id: &str, video_url: &str) -> Result<String>;
}

pub struct FirestoreReports {
    http_client: reqwest::Client,
    project_id: String,
    api_key: String,
    /// Reports carry wall-clock date/time in the operator's timezone.
    utc_offset: FixedOffset,
}

impl FirestoreReports {
    pub fn new(project_id: String, api_key: String, utc_offset_hours: i32) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        let utc_offset = FixedOffset::east_opt(utc_offset_hours * 3600)
            .context("Invalid UTC offset for report timestamps")?;

        Ok(Self {
            http_client,
            project_id,
            api_key,
            utc_offset,
        })
    }

    fn document_url(&self, path: &str) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents/{}",
            FIRESTORE_API, self.project_id, path
        )
    }

    async fn set_document(&self, path: &str, fields: serde_json::Value) -> Result<()> {
        let mut request = self
            .http_client
            .patch(self.document_url(path))
            .json(&json!({ "fields": fields }));
        if !self.api_key.is_empty() {
            request = request.query(&[("key", self.api_key.as_str())]);
        }

        let response = request.send().await.context("Firestore write failed")?;
        if !response.status().is_success() {
            bail!(
                "Firestore write to {} returned {}: {}",
                path,
                response.status(),
                response.text().await.unwrap_or_else(|_| "<no body>".into())
            );
        }
        Ok(())
    }
}

impl ReportStore for FirestoreReports {
    async fn create_pending_report(&self, driver_id: &str, video_url: &str) -> Result<String> {
        let report_id = Uuid::new_v4().to_string();
        let (date, time) = report_timestamp(Utc::now().with_timezone(&self.utc_offset));

        // status 0 marks the report as pending review; type and extra info
        // are filled in later by the reviewing side.
        let report_path = format!(
            "{}/{}/reports/{}",
            DRIVERS_COLLECTION, driver_id, report_id
        );
        self.set_document(
            &report_path,
            json!({
                "addInfo": { "stringValue": "null" },
                "id": { "stringValue": report_id },
                "status": { "integerValue": "0" },
                "v_type": { "stringValue": "null" },
                "date": { "stringValue": date },
                "time": { "stringValue": time },
            }),
        )
        .await?;

        let video_id = Uuid::new_v4().to_string();
        self.set_document(
            &format!("{}/video/{}", report_path, video_id),
            json!({
                "id": { "stringValue": video_id },
                "video_url": { "stringValue": video_url },
            }),
        )
        .await?;

        info!(
            "Created pending report {} for driver {}",
            report_id, driver_id
        );
        Ok(report_id)
    }
}

/// Report date/time strings: `YYYY:MM:DD` and `HH:MM:SS`.
fn report_timestamp(now: DateTime<FixedOffset>) -> (String, String) {
    (
        now.format("%Y:%m:%d").to_string(),
        now.format("%H:%M:%S").to_string(),
    )
}

/// Applies a video verdict to the external stores.
pub struct ReportEmitter<'a, S, R> {
    store: &'a S,
    reports: &'a R,
}

impl<'a, S: ObjectStore, R: ReportStore> ReportEmitter<'a, S, R> {
    pub fn new(store: &'a S, reports: &'a R) -> Self {
        Self { store, reports }
    }

    /// Positive verdict: mark the object processed via rename and file a
    /// pending report pointing at the renamed object. Negative verdict:
    /// delete the object.
    pub async fn apply(&self, task: &VideoTask, verdict: bool) -> Result<()> {
        if verdict {
            let new_name = task.marked_name();
            self.store.rename(task, &new_name).await?;

            let video_url = self.store.fetch_url(&new_name);
            let report_id = self
                .reports
                .create_pending_report(task.driver_id(), &video_url)
                .await?;

            info!(
                "Violation: {} marked as {} (report {})",
                task.object_name, new_name, report_id
            );
        } else {
            self.store.delete(task).await?;
            info!("Not a violation: {} deleted", task.object_name);
        }
        Ok(())
    }
}
