use crate::catalog::ColumnDescriptor;
use crate::error::EtlResult;
use crate::merge::MergePlan;
use crate::types::{Cell, ChangeEvent, OperationCode, TableRow};
use crate::warehouse::Warehouse;

/// Builds a change event.
pub fn event(operation: OperationCode, sequence_number: u64, row_id: u64, payload: Vec<Cell>) -> ChangeEvent {
    ChangeEvent {
        operation,
        sequence_number,
        row_id,
        commit_timestamp: String::new(),
        payload: TableRow::new(payload),
    }
}

/// Lays `event` out as a staged row.
pub fn staged_row(event: &ChangeEvent) -> TableRow {
    let mut values = vec![
        Cell::String(event.operation.as_code().to_owned()),
        Cell::I64(event.sequence_number as i64),
        Cell::I64(event.row_id as i64),
        if event.commit_timestamp.is_empty() {
            Cell::Null
        } else {
            Cell::String(event.commit_timestamp.clone())
        },
    ];
    values.extend(event.payload.values().iter().cloned());

    TableRow::new(values)
}

/// Writes `events` as the staging table of `plan`, replacing what was staged before.
pub async fn stage_events<W>(warehouse: &W, plan: &MergePlan, events: &[ChangeEvent]) -> EtlResult<()>
where
    W: Warehouse,
{
    let columns: Vec<ColumnDescriptor> = plan
        .reduce_projection()
        .iter()
        .map(|name| ColumnDescriptor::new(name.as_str(), "string"))
        .collect();
    let rows = events.iter().map(staged_row).collect();

    warehouse
        .replace_table(plan.staging_table(), &columns, rows)
        .await
}
