use std::fmt;
use std::future::Future;

use etl_config::shared::MergeEngine;
use tracing::{debug, error, info};

use crate::catalog::TableDescriptor;
use crate::error::{EtlError, EtlResult};
#[cfg(feature = "failpoints")]
use crate::failpoints::{MERGE_BEFORE_REPLACE, etl_fail_point};
use crate::merge::KeyTuple;
use crate::merge::partition::{partition_events, reduce_partitions};
use crate::merge::plan::{MergePlan, MergePlanner};
use crate::merge::reducer::ReduceStats;
use crate::types::TableName;
use crate::warehouse::Warehouse;

/// Outcome of merging one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    pub table: TableName,
    pub engine: MergeEngine,
    /// Reduce partitions used, when the executor chose them.
    pub partitions: Option<usize>,
    /// Reduce counters, when the engine reports them.
    pub stats: Option<ReduceStats>,
}

impl fmt::Display for MergeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} merged with {:?} engine", self.table, self.engine)?;
        if let Some(stats) = &self.stats {
            write!(
                f,
                " ({} events, {} rows, {} deleted keys)",
                stats.events, stats.rows_emitted, stats.keys_deleted
            )?;
        }

        Ok(())
    }
}

/// Something able to execute a [`MergePlan`].
///
/// On success the base table holds exactly the terminal state of every key found in the
/// staging table. On failure the base table is left as it was.
pub trait MergeBackend {
    fn merge(&self, plan: &MergePlan) -> impl Future<Output = EtlResult<MergeSummary>> + Send;
}

/// Plans and merges every table of `tables` in order.
///
/// A failed table does not stop the others. Fails with the errors of every failed table,
/// aggregated, when at least one table could not be planned or merged.
pub async fn merge_tables<M>(
    backend: &M,
    planner: &MergePlanner,
    tables: &[TableDescriptor],
) -> EtlResult<Vec<MergeSummary>>
where
    M: MergeBackend + Sync,
{
    let mut summaries = Vec::with_capacity(tables.len());
    let mut errors: Vec<EtlError> = Vec::new();

    for table in tables {
        info!(table = %table.table_name(), "executing merge");

        let result = match planner.plan(table) {
            Ok(plan) => backend.merge(&plan).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(summary) => {
                info!(%summary, "merge succeeded");
                summaries.push(summary);
            }
            Err(err) => {
                error!(table = %table.table_name(), error = %err, "merge failed");
                errors.push(err);
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors.into());
    }

    Ok(summaries)
}

/// Runs merges in process against a [`Warehouse`].
///
/// Staged events are split by key hash into partitions, each reduced on its own blocking task.
/// Rows are written ordered by key so repeated merges produce identical tables.
#[derive(Debug, Clone)]
pub struct MergeExecutor<W> {
    warehouse: W,
    partitions: usize,
}

impl<W> MergeExecutor<W> {
    pub fn new(warehouse: W, partitions: usize) -> Self {
        Self {
            warehouse,
            partitions: partitions.max(1),
        }
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    pub fn partitions(&self) -> usize {
        self.partitions
    }
}

impl<W> MergeBackend for MergeExecutor<W>
where
    W: Warehouse + Send + Sync,
{
    async fn merge(&self, plan: &MergePlan) -> EtlResult<MergeSummary> {
        let staged = self.warehouse.read_table(plan.staging_table()).await?;
        debug!(
            table = %plan.base_table(),
            staging = %plan.staging_table(),
            rows = staged.len(),
            warehouse = W::name(),
            "read staged rows"
        );

        let mut events = Vec::with_capacity(staged.len());
        let mut errors: Vec<EtlError> = Vec::new();
        for (position, row) in staged.into_iter().enumerate() {
            match plan.decode_event(position, row) {
                Ok(event) => events.push(event),
                Err(err) => errors.push(err),
            }
        }
        if !errors.is_empty() {
            error!(table = %plan.base_table(), failed_rows = errors.len(), "staged rows could not be decoded");
            return Err(errors.into());
        }

        let partitions = partition_events(events, plan.key_indices(), self.partitions)?;
        let (rows, stats) = reduce_partitions(partitions, plan.key_indices()).await?;

        let mut keyed = rows
            .into_iter()
            .map(|row| Ok((KeyTuple::from_row(&row, plan.key_indices())?, row)))
            .collect::<EtlResult<Vec<_>>>()?;
        keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
        let rows = keyed.into_iter().map(|(_, row)| row).collect();

        #[cfg(feature = "failpoints")]
        etl_fail_point(MERGE_BEFORE_REPLACE)?;

        self.warehouse
            .replace_table(plan.base_table(), plan.output_projection(), rows)
            .await?;

        info!(
            table = %plan.base_table(),
            events = stats.events,
            rows = stats.rows_emitted,
            deleted_keys = stats.keys_deleted,
            partitions = self.partitions,
            "table merged"
        );

        Ok(MergeSummary {
            table: plan.base_table().clone(),
            engine: MergeEngine::Local,
            partitions: Some(self.partitions),
            stats: Some(stats),
        })
    }
}
