//! Classifies identifiers as valid or invalid against the backing store.

use crate::error::{PipelineError, ServiceError};
use crate::pipeline::{IdentifierSet, ValidationOutcome};
use async_trait::async_trait;
use common::model::mass_update::ValidationResponse;
use log::{debug, error};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Existence check offered by the backing store.
///
/// Receives the whole identifier list in one call and must either answer for
/// every identifier or fail.
#[async_trait]
pub trait IdentifierValidationService: Send + Sync {
    async fn validate_ids(&self, ids: &[String]) -> Result<ValidationResponse, ServiceError>;
}

pub struct IdentifierValidator {
    service: Arc<dyn IdentifierValidationService>,
    timeout: Duration,
}

impl IdentifierValidator {
    pub fn new(service: Arc<dyn IdentifierValidationService>, timeout: Duration) -> Self {
        Self { service, timeout }
    }

    /// Sends all of `ids` to the validation service in a single request.
    ///
    /// The response must be a total partition of the request; anything else is
    /// treated as a failed validation and no partial outcome is returned. Both
    /// halves of the outcome follow the order of `ids`.
    pub async fn validate(&self, ids: &IdentifierSet) -> Result<ValidationOutcome, PipelineError> {
        debug!("Validating {} identifiers", ids.len());
        tokio::time::timeout(self.timeout, self.service.validate_ids(ids.as_slice()))
            .await
            .map_err(|_| ServiceError::Timeout(self.timeout))
            .and_then(|result| result)
            .and_then(|response| partition(ids, &response))
            .map_err(|e| {
                error!("Error validating IDs: {}", e);
                PipelineError::ValidationService(e)
            })
    }
}

fn partition(
    ids: &IdentifierSet,
    response: &ValidationResponse,
) -> Result<ValidationOutcome, ServiceError> {
    let mut requested: HashMap<&str, usize> = HashMap::new();
    for id in ids {
        *requested.entry(id.as_str()).or_default() += 1;
    }

    let mut answered: HashMap<&str, usize> = HashMap::new();
    let mut valid_remaining: HashMap<&str, usize> = HashMap::new();
    for id in &response.valid_ids {
        *answered.entry(id.as_str()).or_default() += 1;
        *valid_remaining.entry(id.as_str()).or_default() += 1;
    }
    for id in &response.invalid_ids {
        *answered.entry(id.as_str()).or_default() += 1;
    }

    if let Some(unknown) = answered.keys().find(|id| !requested.contains_key(*id)) {
        return Err(ServiceError::MalformedResponse(format!(
            "identifier '{}' was not part of the request",
            unknown
        )));
    }
    if answered != requested {
        return Err(ServiceError::MalformedResponse(format!(
            "response covers {} of {} identifiers",
            response.valid_ids.len() + response.invalid_ids.len(),
            ids.len()
        )));
    }

    let mut valid = Vec::with_capacity(response.valid_ids.len());
    let mut invalid = Vec::with_capacity(response.invalid_ids.len());
    for id in ids {
        match valid_remaining.get_mut(id.as_str()) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                valid.push(id.clone());
            }
            _ => invalid.push(id.clone()),
        }
    }

    Ok(ValidationOutcome {
        valid: IdentifierSet::from_normalized(valid),
        invalid: IdentifierSet::from_normalized(invalid),
    })
}
