use std::fmt;

use crate::error::EtlError;
use crate::pipeline::graph::Disposition;
use crate::pipeline::stage::Stage;
use crate::reconciliation::ComparisonOutcome;
use crate::types::TableName;

/// What happened to one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageStatus {
    Succeeded,
    Failed(EtlError),
    Skipped,
}

impl StageStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageStatus::Failed(_))
    }

    fn label(&self) -> &'static str {
        match self {
            StageStatus::Succeeded => "OK",
            StageStatus::Failed(_) => "FAILED",
            StageStatus::Skipped => "SKIPPED",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageRecord {
    pub stage: Stage,
    pub disposition: Disposition,
    pub status: StageStatus,
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    /// Every stage in execution order, skipped ones included.
    pub stages: Vec<StageRecord>,
    /// Reconciliation outcome of every compared table.
    pub tables: Vec<(TableName, ComparisonOutcome)>,
}

impl PipelineReport {
    /// Returns `true` when every executed stage succeeded.
    pub fn is_success(&self) -> bool {
        !self.stages.iter().any(|record| record.status.is_failed())
    }

    pub fn status(&self, stage: Stage) -> Option<&StageStatus> {
        self.stages
            .iter()
            .find(|record| record.stage == stage)
            .map(|record| &record.status)
    }

    pub fn failed_stages(&self) -> Vec<Stage> {
        self.stages
            .iter()
            .filter(|record| record.status.is_failed())
            .map(|record| record.stage)
            .collect()
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "### Stages")?;
        for record in &self.stages {
            write!(f, "{:<20} {}", record.stage.as_str(), record.status.label())?;
            if let Disposition::Forced { .. } = &record.disposition {
                write!(f, " ({})", record.disposition)?;
            }
            if let StageStatus::Failed(err) = &record.status {
                write!(f, ": {}", err.description())?;
                if let Some(detail) = err.detail() {
                    write!(f, " ({detail})")?;
                }
            }
            writeln!(f)?;
        }

        if !self.tables.is_empty() {
            writeln!(f, "### Reconciliation")?;
            for (table, outcome) in &self.tables {
                writeln!(f, "{table:<40} {outcome}")?;
            }
        }

        let overall = if self.is_success() { "SUCCEEDED" } else { "FAILED" };
        write!(f, "### Pipeline {overall}")
    }
}
