use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::catalog::{LoadedCatalog, TableDescriptor};
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::pipeline::{Stage, StageOutput, StageRunner};
use crate::reconciliation::ReconciliationReport;
use crate::types::TableName;

/// Scripted result of one stage.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    Succeed,
    Fail(ErrorKind),
    Catalog(LoadedCatalog),
    Reconciled(ReconciliationReport),
}

/// A stage run observed by a [`ScriptedStageRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCall {
    pub stage: Stage,
    /// Tables of the catalog handed to the stage.
    pub tables: Option<Vec<TableName>>,
}

/// Stage runner returning scripted outcomes and recording the stages it ran.
///
/// Stages without a script succeed. [`Stage::MetadataGeneration`] without a script produces an
/// empty catalog.
#[derive(Debug, Clone, Default)]
pub struct ScriptedStageRunner {
    outcomes: HashMap<Stage, ScriptedOutcome>,
    calls: Arc<Mutex<Vec<StageCall>>>,
}

impl ScriptedStageRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: Stage, outcome: ScriptedOutcome) -> Self {
        self.outcomes.insert(stage, outcome);
        self
    }

    /// Makes [`Stage::MetadataGeneration`] produce `tables`.
    pub fn with_catalog(self, tables: Vec<TableDescriptor>) -> Self {
        self.with(
            Stage::MetadataGeneration,
            ScriptedOutcome::Catalog(LoadedCatalog {
                tables,
                errors: Vec::new(),
            }),
        )
    }

    pub async fn calls(&self) -> Vec<StageCall> {
        self.calls.lock().await.clone()
    }

    pub async fn stages_run(&self) -> Vec<Stage> {
        self.calls
            .lock()
            .await
            .iter()
            .map(|call| call.stage)
            .collect()
    }
}

impl StageRunner for ScriptedStageRunner {
    async fn run_stage(
        &self,
        stage: Stage,
        catalog: Option<&[TableDescriptor]>,
    ) -> EtlResult<StageOutput> {
        self.calls.lock().await.push(StageCall {
            stage,
            tables: catalog.map(|tables| tables.iter().map(TableDescriptor::table_name).collect()),
        });

        match self.outcomes.get(&stage) {
            None if stage == Stage::MetadataGeneration => {
                Ok(StageOutput::Catalog(LoadedCatalog::default()))
            }
            None | Some(ScriptedOutcome::Succeed) => Ok(StageOutput::Completed),
            Some(ScriptedOutcome::Fail(kind)) => Err(EtlError::from((
                *kind,
                "Scripted stage failure",
                stage.to_string(),
            ))),
            Some(ScriptedOutcome::Catalog(catalog)) => Ok(StageOutput::Catalog(catalog.clone())),
            Some(ScriptedOutcome::Reconciled(report)) => {
                Ok(StageOutput::Reconciled(report.clone()))
            }
        }
    }
}
