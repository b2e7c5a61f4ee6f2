use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::merge::KeyTuple;
use crate::merge::reducer::{ReduceStats, reduce_sorted};
use crate::types::{ChangeEvent, TableRow};

/// Events of one partition, each paired with its key.
pub type Partition = Vec<(KeyTuple, ChangeEvent)>;

/// Splits `events` into `partitions` buckets by key hash.
///
/// All events of a key land in the same bucket, in their input order.
pub fn partition_events(
    events: Vec<ChangeEvent>,
    key_indices: &[usize],
    partitions: usize,
) -> EtlResult<Vec<Partition>> {
    let partitions = partitions.max(1);
    let mut buckets: Vec<Partition> = (0..partitions).map(|_| Vec::new()).collect();

    for event in events {
        let key = KeyTuple::from_row(&event.payload, key_indices)?;
        buckets[key.partition(partitions)].push((key, event));
    }

    Ok(buckets)
}

/// Sorts one partition by key and position, then reduces it.
///
/// The sort is stable, so events sharing a key and position keep their input order.
pub fn reduce_partition(
    mut events: Partition,
    key_indices: Vec<usize>,
) -> EtlResult<(Vec<TableRow>, ReduceStats)> {
    events.sort_by(|(key_a, a), (key_b, b)| {
        key_a
            .cmp(key_b)
            .then_with(|| a.position().cmp(&b.position()))
    });

    reduce_sorted(key_indices, events.into_iter().map(|(_, event)| event))
}

/// Reduces every non-empty partition on its own blocking task.
///
/// Each partition is owned by exactly one task. Rows come back in no particular order. Failures
/// of several partitions are aggregated.
pub async fn reduce_partitions(
    partitions: Vec<Partition>,
    key_indices: &[usize],
) -> EtlResult<(Vec<TableRow>, ReduceStats)> {
    let mut join_set = JoinSet::new();
    for (index, partition) in partitions.into_iter().enumerate() {
        if partition.is_empty() {
            continue;
        }

        let key_indices = key_indices.to_vec();
        join_set.spawn_blocking(move || (index, reduce_partition(partition, key_indices)));
    }

    let mut rows = Vec::new();
    let mut stats = ReduceStats::default();
    let mut errors: Vec<EtlError> = Vec::new();

    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, Ok((partition_rows, partition_stats)))) => {
                debug!(partition = index, rows = partition_rows.len(), "partition reduced");
                rows.extend(partition_rows);
                stats.merge(partition_stats);
            }
            Ok((index, Err(err))) => {
                error!(partition = index, error = %err, "partition reduce failed");
                errors.push(err);
            }
            Err(join_err) => {
                errors.push(etl_error!(
                    ErrorKind::MergeExecutionError,
                    "Merge partition task panicked",
                    join_err.to_string(),
                    source: join_err
                ));
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors.into());
    }

    Ok((rows, stats))
}
