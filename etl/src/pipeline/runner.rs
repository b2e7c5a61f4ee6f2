use std::future::Future;
use std::sync::Arc;

use etl_config::shared::MaterializerConfig;
use tracing::info;

use crate::catalog::{LoadedCatalog, TableDescriptor, TableFilter, load_catalog_file};
use crate::commands::{
    CommandRunner, DdlGenerationRequest, DdlKind, ProvisioningRequest, ScriptLoadRequest,
    require_success,
};
use crate::error::{ErrorKind, EtlResult};
use crate::merge::{MergeBackend, MergePlanner, MergeSummary, StagingLayout, merge_tables};
use crate::pipeline::stage::Stage;
use crate::reconciliation::{Comparator, ReconciliationDriver, ReconciliationReport};
use crate::{bail, etl_error};

/// What a stage produced.
#[derive(Debug, Clone)]
pub enum StageOutput {
    Completed,
    /// The loaded catalog, possibly with invalid entries.
    Catalog(LoadedCatalog),
    Merged(Vec<MergeSummary>),
    Reconciled(ReconciliationReport),
}

/// Performs the action of each stage.
///
/// `catalog` holds the tables produced by [`Stage::MetadataGeneration`] and is always present
/// for stages that need it.
pub trait StageRunner {
    fn run_stage(
        &self,
        stage: Stage,
        catalog: Option<&[TableDescriptor]>,
    ) -> impl Future<Output = EtlResult<StageOutput>> + Send;
}

/// Runs the stages with the external tools and merge backend described by the configuration.
#[derive(Debug)]
pub struct DefaultStageRunner<R, M, C> {
    config: Arc<MaterializerConfig>,
    runner: R,
    merge_backend: M,
    reconciliation: ReconciliationDriver<C>,
    planner: MergePlanner,
}

impl<R, M, C> DefaultStageRunner<R, M, C>
where
    R: CommandRunner + Send + Sync,
    M: MergeBackend + Send + Sync,
    C: Comparator + Send + Sync,
{
    pub fn new(
        config: Arc<MaterializerConfig>,
        runner: R,
        merge_backend: M,
        reconciliation: ReconciliationDriver<C>,
    ) -> Self {
        let planner = MergePlanner::new(StagingLayout::from(&config.merge.staging));

        Self {
            config,
            runner,
            merge_backend,
            reconciliation,
            planner,
        }
    }

    async fn generate_and_load_ddl(&self, kind: DdlKind) -> EtlResult<StageOutput> {
        let generator = &self.config.tools.ddl_generator;
        let request = DdlGenerationRequest::new(kind, &self.config.source, generator);

        let generate = request.to_command(generator);
        let output = self.runner.run(&generate).await?;
        require_success(&generate, &output)?;

        let load = ScriptLoadRequest::new(request.output.clone()).to_command(&self.config.warehouse.sql_cli);
        let output = self.runner.run(&load).await?;
        require_success(&load, &output)?;

        info!(script = %request.output.display(), ?kind, "definitions loaded");

        Ok(StageOutput::Completed)
    }

    async fn generate_catalog(&self) -> EtlResult<StageOutput> {
        let generator = &self.config.tools.ddl_generator;
        let metadata_path = self.config.pipeline.metadata_path.clone();
        let request = DdlGenerationRequest::with_output(
            DdlKind::Metadata,
            &self.config.source,
            generator,
            metadata_path.clone(),
        );

        let generate = request.to_command(generator);
        let output = self.runner.run(&generate).await?;
        require_success(&generate, &output)?;

        let mut catalog = load_catalog_file(&metadata_path).await?;
        let filter = TableFilter::from(&self.config.pipeline.table_filter);
        catalog.tables = filter.apply(catalog.tables);

        info!(
            path = %metadata_path.display(),
            tables = catalog.tables.len(),
            invalid_entries = catalog.errors.len(),
            "catalog generated"
        );

        Ok(StageOutput::Catalog(catalog))
    }

    async fn provision(&self) -> EtlResult<StageOutput> {
        let Some(command) = &self.config.pipeline.provisioning else {
            bail!(
                ErrorKind::ConfigError,
                "Provisioning is enabled but no provisioning command is configured"
            );
        };

        let command = ProvisioningRequest::new(command, self.config.pipeline.metadata_path.clone())
            .to_command();
        let output = self.runner.run(&command).await?;
        require_success(&command, &output)?;

        Ok(StageOutput::Completed)
    }

    async fn merge(&self, tables: &[TableDescriptor]) -> EtlResult<StageOutput> {
        let summaries = merge_tables(&self.merge_backend, &self.planner, tables).await?;

        Ok(StageOutput::Merged(summaries))
    }
}

impl<R, M, C> StageRunner for DefaultStageRunner<R, M, C>
where
    R: CommandRunner + Send + Sync,
    M: MergeBackend + Send + Sync,
    C: Comparator + Send + Sync,
{
    async fn run_stage(
        &self,
        stage: Stage,
        catalog: Option<&[TableDescriptor]>,
    ) -> EtlResult<StageOutput> {
        let tables = || {
            catalog.ok_or_else(|| {
                etl_error!(
                    ErrorKind::MissingDependency,
                    "Stage needs the table catalog",
                    stage
                )
            })
        };

        match stage {
            Stage::StagingDdl => self.generate_and_load_ddl(DdlKind::Staging).await,
            Stage::BaseDdl => self.generate_and_load_ddl(DdlKind::Base).await,
            Stage::MetadataGeneration => self.generate_catalog().await,
            Stage::Provisioning => self.provision().await,
            Stage::Merge => self.merge(tables()?).await,
            Stage::Reconciliation => {
                let report = self.reconciliation.reconcile(tables()?).await;
                Ok(StageOutput::Reconciled(report))
            }
        }
    }
}
