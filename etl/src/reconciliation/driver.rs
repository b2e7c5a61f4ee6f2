use tracing::{error, info, warn};

use crate::catalog::TableDescriptor;
use crate::error::EtlError;
use crate::reconciliation::comparator::{
    Comparator, ComparisonEndpoint, ComparisonOutcome, ComparisonRequest,
};
use crate::types::TableName;

/// Outcome of every table compared by one reconciliation pass, in comparison order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationReport {
    pub outcomes: Vec<(TableName, ComparisonOutcome)>,
    /// Infrastructure error that stopped the pass. `outcomes` then holds the tables compared
    /// before it.
    pub interrupted_by: Option<EtlError>,
}

impl ReconciliationReport {
    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_passed())
    }

    /// Tables the comparator found differences in.
    pub fn failed_tables(&self) -> Vec<&TableName> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| !outcome.is_passed())
            .map(|(table, _)| table)
            .collect()
    }
}

/// Compares every materialized table with its source.
#[derive(Debug, Clone)]
pub struct ReconciliationDriver<C> {
    comparator: C,
    source: ComparisonEndpoint,
    target: ComparisonEndpoint,
}

impl<C> ReconciliationDriver<C>
where
    C: Comparator,
{
    pub fn new(comparator: C, source: ComparisonEndpoint, target: ComparisonEndpoint) -> Self {
        Self {
            comparator,
            source,
            target,
        }
    }

    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Compares `tables` in order.
    ///
    /// Mismatches are recorded in the report. The first infrastructure error stops the pass and
    /// is kept in [`ReconciliationReport::interrupted_by`] next to the outcomes gathered so far.
    pub async fn reconcile(&self, tables: &[TableDescriptor]) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();

        for table in tables {
            let request = ComparisonRequest::new(self.source.clone(), self.target.clone(), table);
            info!(table = %request.table, "comparing table");

            let outcome = match self.comparator.compare(&request).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(table = %request.table, error = %err, "comparison could not run");
                    report.interrupted_by = Some(err);
                    return report;
                }
            };

            match outcome {
                ComparisonOutcome::Passed => info!(table = %request.table, "compare succeeded"),
                ComparisonOutcome::Failed => warn!(table = %request.table, "compare failed"),
            }
            report.outcomes.push((request.table, outcome));
        }

        report
    }
}
