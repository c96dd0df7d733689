use crate::model::mass_update::{CycleFailure, CycleSummary, PipelineStage};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    InProgress(PipelineStage),
    Completed(CycleSummary),
    Failed(CycleFailure),
}
