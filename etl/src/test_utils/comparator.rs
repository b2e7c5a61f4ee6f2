use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::reconciliation::{Comparator, ComparisonOutcome, ComparisonRequest};
use crate::types::TableName;

/// Comparator answering from a fixed table of outcomes.
///
/// Tables without an outcome pass. Tables marked unreachable fail with an infrastructure error.
#[derive(Debug, Clone, Default)]
pub struct ScriptedComparator {
    outcomes: HashMap<TableName, ComparisonOutcome>,
    unreachable: Vec<TableName>,
    compared: Arc<Mutex<Vec<TableName>>>,
}

impl ScriptedComparator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(mut self, table: TableName, outcome: ComparisonOutcome) -> Self {
        self.outcomes.insert(table, outcome);
        self
    }

    pub fn with_unreachable(mut self, table: TableName) -> Self {
        self.unreachable.push(table);
        self
    }

    pub async fn compared(&self) -> Vec<TableName> {
        self.compared.lock().await.clone()
    }
}

impl Comparator for ScriptedComparator {
    async fn compare(&self, request: &ComparisonRequest) -> EtlResult<ComparisonOutcome> {
        self.compared.lock().await.push(request.table.clone());

        if self.unreachable.contains(&request.table) {
            bail!(
                ErrorKind::ReconciliationInfrastructureError,
                "Comparator unreachable",
                request.table
            );
        }

        Ok(self
            .outcomes
            .get(&request.table)
            .copied()
            .unwrap_or(ComparisonOutcome::Passed))
    }
}
