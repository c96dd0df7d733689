//! Applies the selected update options to every valid identifier.

use crate::error::{PipelineError, ServiceError};
use crate::pipeline::IdentifierSet;
use async_trait::async_trait;
use common::model::mass_update::{UpdateOutcome, UpdateRequest};
use log::{error, info};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Bulk update offered by the backing store.
///
/// Must apply `request.options` uniformly and touch no record outside
/// `request.ids`. A failure is whole-batch; whatever the store committed
/// before failing is not rolled back by the caller.
#[async_trait]
pub trait BulkUpdateService: Send + Sync {
    async fn update_records(&self, request: &UpdateRequest) -> Result<UpdateOutcome, ServiceError>;
}

pub struct BulkUpdater {
    service: Arc<dyn BulkUpdateService>,
    timeout: Duration,
}

impl BulkUpdater {
    pub fn new(service: Arc<dyn BulkUpdateService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Sends one update request covering all of `ids`.
    ///
    /// `ids` must not be empty; the orchestrator skips this stage when nothing
    /// is valid.
    pub async fn update(
        &self,
        ids: &IdentifierSet,
        options: &BTreeSet<String>,
    ) -> Result<UpdateOutcome, PipelineError> {
        debug_assert!(!ids.is_empty(), "bulk update requires at least one id");

        let request = UpdateRequest {
            ids: ids.as_slice().to_vec(),
            options: options.iter().cloned().collect(),
        };

        let outcome = tokio::time::timeout(self.timeout, self.service.update_records(&request))
            .await
            .map_err(|_| ServiceError::Timeout(self.timeout))
            .and_then(|result| result)
            .map_err(|e| {
                error!("Error updating EPOS records: {}", e);
                PipelineError::UpdateService(e)
            })?;

        info!(
            "Bulk update applied {:?} to {} of {} records",
            request.options,
            outcome.updated,
            request.ids.len()
        );
        Ok(outcome)
    }
}
