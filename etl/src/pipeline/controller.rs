use std::sync::Arc;

use etl_config::shared::MaterializerConfig;
use tracing::{error, info, warn};

use crate::catalog::TableDescriptor;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
#[cfg(feature = "failpoints")]
use crate::failpoints::{PIPELINE_BEFORE_STAGE, etl_fail_point};
use crate::pipeline::graph::{Disposition, ExecutionPlan};
use crate::pipeline::report::{PipelineReport, StageRecord, StageStatus};
use crate::pipeline::runner::{StageOutput, StageRunner};
use crate::pipeline::stage::Stage;

/// Runs the stages of a materialization in order.
///
/// The execution plan is resolved from the configured switches before the first stage runs.
/// A failed stage either aborts the run or is recorded, depending on its abort policy. A stage
/// that needs the catalog when none was produced halts the run regardless of policy.
#[derive(Debug)]
pub struct PipelineController<S> {
    config: Arc<MaterializerConfig>,
    runner: S,
    plan: ExecutionPlan,
}

impl<S> PipelineController<S>
where
    S: StageRunner,
{
    pub fn new(config: Arc<MaterializerConfig>, runner: S) -> Self {
        let plan = ExecutionPlan::resolve(&config.pipeline.stages);

        Self {
            config,
            runner,
            plan,
        }
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn runner(&self) -> &S {
        &self.runner
    }

    /// Runs every stage of the plan and reports the outcome of each.
    ///
    /// Fails with [`ErrorKind::PipelineAborted`] when a stage that aborts on failure fails, with
    /// that stage's error as source, and with [`ErrorKind::MissingDependency`] when no catalog is
    /// available to a stage needing one.
    pub async fn run(&self) -> EtlResult<PipelineReport> {
        let mut report = PipelineReport::default();
        let mut catalog: Option<Vec<TableDescriptor>> = None;

        for (stage, disposition) in self.plan.steps() {
            let stage = *stage;

            if !disposition.runs() {
                info!(%stage, "stage skipped");
                report.stages.push(StageRecord {
                    stage,
                    disposition: disposition.clone(),
                    status: StageStatus::Skipped,
                });
                continue;
            }

            if let Disposition::Forced { by } = disposition {
                info!(%stage, forced_by = ?by, "stage forced on by later stages");
            }

            if stage.needs_catalog() && catalog.is_none() {
                error!(%stage, "no table catalog is available");
                return Err(etl_error!(
                    ErrorKind::MissingDependency,
                    "Stage needs the table catalog but none was produced",
                    stage
                ));
            }

            info!(%stage, "stage started");
            let result = self.run_stage(stage, catalog.as_deref()).await;

            let failure = match result {
                Ok(output) => self.absorb_output(stage, output, &mut catalog, &mut report),
                Err(err) => Some(err),
            };

            match failure {
                None => {
                    info!(%stage, "stage succeeded");
                    report.stages.push(StageRecord {
                        stage,
                        disposition: disposition.clone(),
                        status: StageStatus::Succeeded,
                    });
                }
                Some(err) => {
                    // A catalog document that cannot be parsed at all leaves nothing to work on.
                    let fatal = err.kind() == ErrorKind::CatalogParseError && catalog.is_none();
                    let abort = fatal || stage.aborts_on_failure(&self.config.pipeline.abort_on_failure);

                    error!(%stage, error = %err, abort, "stage failed");
                    report.stages.push(StageRecord {
                        stage,
                        disposition: disposition.clone(),
                        status: StageStatus::Failed(err.clone()),
                    });

                    if abort {
                        warn!("pipeline aborted\n{report}");
                        return Err(etl_error!(
                            ErrorKind::PipelineAborted,
                            "Pipeline aborted after a stage failed",
                            stage,
                            source: err
                        ));
                    }
                }
            }
        }

        if report.is_success() {
            info!("pipeline succeeded");
        } else {
            warn!(failed_stages = ?report.failed_stages(), "pipeline completed with failures");
        }

        Ok(report)
    }

    async fn run_stage(
        &self,
        stage: Stage,
        catalog: Option<&[TableDescriptor]>,
    ) -> EtlResult<StageOutput> {
        #[cfg(feature = "failpoints")]
        etl_fail_point(PIPELINE_BEFORE_STAGE)?;

        self.runner.run_stage(stage, catalog).await
    }

    /// Records what `stage` produced, returning the failure it represents, if any.
    fn absorb_output(
        &self,
        stage: Stage,
        output: StageOutput,
        catalog: &mut Option<Vec<TableDescriptor>>,
        report: &mut PipelineReport,
    ) -> Option<EtlError> {
        match output {
            StageOutput::Completed | StageOutput::Merged(_) => None,
            StageOutput::Catalog(loaded) => {
                let errors = loaded.errors;
                *catalog = Some(loaded.tables);

                if errors.is_empty() {
                    None
                } else {
                    Some(errors.into())
                }
            }
            StageOutput::Reconciled(reconciliation) => {
                let failed = reconciliation
                    .failed_tables()
                    .iter()
                    .map(|table| table.to_string())
                    .collect::<Vec<_>>();
                report.tables.extend(reconciliation.outcomes);

                if let Some(err) = reconciliation.interrupted_by {
                    Some(err)
                } else if failed.is_empty() {
                    None
                } else {
                    Some(etl_error!(
                        ErrorKind::ReconciliationMismatch,
                        "Materialized tables differ from the source",
                        format!("{stage}: {}", failed.join(", "))
                    ))
                }
            }
        }
    }
}
