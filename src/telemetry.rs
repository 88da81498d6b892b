//! Telemetry capture and result card pipeline.
//!
//! A submission is redacted (when configured), given a fresh identifier and
//! inserted as one row. A card request fetches that row and renders it.

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::ids::IdGenerator;
use crate::models::{ClientContext, Submission, TelemetryRecord};
use crate::redaction::Redactor;
use crate::render::{RenderError, ResultRenderer};
use crate::storage::{RecordStore, StorageError, StorageResult};

#[derive(Debug, Error)]
pub enum CardError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CardError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CardError::Storage(err) if err.is_not_found())
    }
}

pub struct TelemetryService<S> {
    store: Arc<S>,
    ids: Arc<IdGenerator>,
    redactor: Redactor,
    renderer: Arc<ResultRenderer>,
}

impl<S: RecordStore> TelemetryService<S> {
    pub fn new(
        store: Arc<S>,
        ids: Arc<IdGenerator>,
        redactor: Redactor,
        renderer: Arc<ResultRenderer>,
    ) -> Self {
        Self {
            store,
            ids,
            redactor,
            renderer,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Turn a submission into the record that will be stored.
    ///
    /// The address, ISP blob and log are each scrubbed on their own; the
    /// measurements are copied verbatim.
    pub fn build_record(&self, submission: Submission, client: ClientContext) -> TelemetryRecord {
        TelemetryRecord {
            id: self.ids.next_string(),
            ip_address: self.redactor.redact_address(&client.ip_address),
            isp_info: self.redactor.redact(&submission.ispinfo),
            extra: submission.extra,
            user_agent: client.user_agent,
            language: client.language,
            download: submission.dl,
            upload: submission.ul,
            ping: submission.ping,
            jitter: submission.jitter,
            log: self.redactor.redact(&submission.log),
        }
    }

    /// Store a submission and return its identifier.
    pub async fn submit(&self, submission: Submission, client: ClientContext) -> StorageResult<String> {
        let record = self.build_record(submission, client);

        if let Err(err) = self.store.insert(&record).await {
            error!(record_id = %record.id, error = %err, "failed to store telemetry");
            return Err(err);
        }

        info!(record_id = %record.id, "stored telemetry");
        Ok(record.id)
    }

    pub async fn fetch(&self, id: &str) -> StorageResult<TelemetryRecord> {
        self.store.fetch_by_id(id).await.inspect_err(|err| {
            if !err.is_not_found() {
                error!(record_id = %id, error = %err, "failed to fetch telemetry");
            }
        })
    }

    /// Render the stored record `id` as a PNG result card.
    pub async fn render_card(&self, id: &str) -> Result<Vec<u8>, CardError> {
        let record = self.fetch(id).await?;

        let renderer = Arc::clone(&self.renderer);
        let png = tokio::task::spawn_blocking(move || renderer.render(&record))
            .await?
            .inspect_err(|err| error!(record_id = %id, error = %err, "failed to render result card"))?;

        Ok(png)
    }
}
