use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::merge::KeyTuple;
use crate::types::{ChangeEvent, TableRow};

/// Counters of a reduce pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReduceStats {
    /// Events consumed.
    pub events: u64,
    /// Rows emitted, one per key whose last event is not a delete.
    pub rows_emitted: u64,
    /// Keys whose last event is a delete.
    pub keys_deleted: u64,
}

impl ReduceStats {
    pub fn merge(&mut self, other: ReduceStats) {
        self.events += other.events;
        self.rows_emitted += other.rows_emitted;
        self.keys_deleted += other.keys_deleted;
    }
}

/// Collapses a stream of change events sorted by key, sequence number and row id into the
/// current state of every key.
///
/// The reducer only remembers the last event of the current key. Events of one key must be
/// adjacent and ascending by `(sequence_number, row_id)`. Events sharing a position are applied
/// in input order, so the later one wins.
#[derive(Debug)]
pub struct Reducer {
    key_indices: Vec<usize>,
    current: Option<(KeyTuple, ChangeEvent)>,
    stats: ReduceStats,
}

impl Reducer {
    pub fn new(key_indices: Vec<usize>) -> Self {
        Self {
            key_indices,
            current: None,
            stats: ReduceStats::default(),
        }
    }

    /// Feeds the next event.
    ///
    /// Returns the terminal row of the previous key when `event` starts a new key and that key
    /// was not deleted.
    pub fn push(&mut self, event: ChangeEvent) -> EtlResult<Option<TableRow>> {
        let key = KeyTuple::from_row(&event.payload, &self.key_indices)?;
        self.stats.events += 1;

        match self.current.take() {
            Some((current_key, last)) if current_key == key => {
                if event.position() < last.position() {
                    let detail = format!(
                        "key {key}: position {:?} follows {:?}",
                        event.position(),
                        last.position()
                    );
                    self.current = Some((current_key, last));
                    bail!(
                        ErrorKind::MergeExecutionError,
                        "Change events are not sorted by sequence number and row id",
                        detail = detail
                    );
                }

                self.current = Some((key, event));
                Ok(None)
            }
            Some((_, last)) => {
                self.current = Some((key, event));
                Ok(self.terminal_state(last))
            }
            None => {
                self.current = Some((key, event));
                Ok(None)
            }
        }
    }

    /// Flushes the last key.
    pub fn finish(&mut self) -> Option<TableRow> {
        let (_, last) = self.current.take()?;
        self.terminal_state(last)
    }

    pub fn stats(&self) -> ReduceStats {
        self.stats
    }

    fn terminal_state(&mut self, last: ChangeEvent) -> Option<TableRow> {
        if last.operation.is_delete() {
            self.stats.keys_deleted += 1;
            return None;
        }

        self.stats.rows_emitted += 1;
        Some(last.payload)
    }
}

/// Reduces events already sorted by key and position into terminal rows.
pub fn reduce_sorted<I>(key_indices: Vec<usize>, events: I) -> EtlResult<(Vec<TableRow>, ReduceStats)>
where
    I: IntoIterator<Item = ChangeEvent>,
{
    let mut reducer = Reducer::new(key_indices);
    let mut rows = Vec::new();

    for event in events {
        if let Some(row) = reducer.push(event)? {
            rows.push(row);
        }
    }
    rows.extend(reducer.finish());

    Ok((rows, reducer.stats()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cell, OperationCode};

    fn event(op: OperationCode, seq: u64, row_id: u64, k: i64, v: &str) -> ChangeEvent {
        ChangeEvent {
            operation: op,
            sequence_number: seq,
            row_id,
            commit_timestamp: String::new(),
            payload: TableRow::new(vec![Cell::I64(k), Cell::from(v)]),
        }
    }

    #[test]
    fn last_event_of_each_key_wins() {
        let events = vec![
            event(OperationCode::Insert, 1, 1, 1, "a"),
            event(OperationCode::Update, 2, 1, 1, "b"),
            event(OperationCode::Insert, 1, 2, 2, "x"),
        ];

        let (rows, stats) = reduce_sorted(vec![0], events).unwrap();

        assert_eq!(
            rows,
            vec![
                TableRow::new(vec![Cell::I64(1), Cell::from("b")]),
                TableRow::new(vec![Cell::I64(2), Cell::from("x")]),
            ]
        );
        assert_eq!(stats.events, 3);
        assert_eq!(stats.rows_emitted, 2);
    }

    #[test]
    fn terminal_delete_emits_nothing() {
        let events = vec![
            event(OperationCode::Insert, 1, 1, 1, "a"),
            event(OperationCode::Delete, 2, 1, 1, "a"),
        ];

        let (rows, stats) = reduce_sorted(vec![0], events).unwrap();

        assert!(rows.is_empty());
        assert_eq!(stats.keys_deleted, 1);
    }

    #[test]
    fn delete_followed_by_insert_resurrects_the_key() {
        let events = vec![
            event(OperationCode::Delete, 1, 1, 1, "a"),
            event(OperationCode::Insert, 1, 2, 1, "c"),
        ];

        let (rows, _) = reduce_sorted(vec![0], events).unwrap();

        assert_eq!(rows, vec![TableRow::new(vec![Cell::I64(1), Cell::from("c")])]);
    }

    #[test]
    fn duplicate_position_keeps_the_later_event() {
        let events = vec![
            event(OperationCode::Update, 5, 1, 1, "first"),
            event(OperationCode::Update, 5, 1, 1, "second"),
        ];

        let (rows, _) = reduce_sorted(vec![0], events).unwrap();

        assert_eq!(rows, vec![TableRow::new(vec![Cell::I64(1), Cell::from("second")])]);
    }

    #[test]
    fn regression_within_a_key_is_rejected() {
        let mut reducer = Reducer::new(vec![0]);
        reducer.push(event(OperationCode::Insert, 3, 1, 1, "a")).unwrap();

        let err = reducer
            .push(event(OperationCode::Update, 2, 9, 1, "b"))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MergeExecutionError);
        assert_eq!(
            reducer.finish(),
            Some(TableRow::new(vec![Cell::I64(1), Cell::from("a")]))
        );
    }
}
