use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{ErrorKind, EtlResult};
use crate::etl_error;
use crate::types::{Cell, TableRow};

/// Values of the key columns of a row, in key order.
///
/// Groups the events of one logical entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyTuple {
    values: Vec<Cell>,
}

impl KeyTuple {
    pub fn new(values: Vec<Cell>) -> Self {
        Self { values }
    }

    /// Projects `row` onto the columns at `key_indices`.
    pub fn from_row(row: &TableRow, key_indices: &[usize]) -> EtlResult<KeyTuple> {
        let values = key_indices
            .iter()
            .map(|&index| {
                row.values().get(index).cloned().ok_or_else(|| {
                    etl_error!(
                        ErrorKind::InvalidData,
                        "Row is too short for its key columns",
                        format!("key column {index} of a row with {} values", row.len())
                    )
                })
            })
            .collect::<EtlResult<Vec<_>>>()?;

        Ok(KeyTuple { values })
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Returns the partition, out of `partitions`, owning this key.
    ///
    /// Stable across runs of the same binary, so one key always lands in the same partition.
    pub fn partition(&self, partitions: usize) -> usize {
        if partitions <= 1 {
            return 0;
        }

        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);

        (hasher.finish() % partitions as u64) as usize
    }
}

impl fmt::Display for KeyTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, value) in self.values.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_key_columns_in_key_order() {
        let row = TableRow::new(vec![Cell::I64(1), Cell::from("eu"), Cell::F64(9.5)]);

        let key = KeyTuple::from_row(&row, &[1, 0]).unwrap();

        assert_eq!(key.values(), &[Cell::from("eu"), Cell::I64(1)]);
        assert_eq!(key.to_string(), "(eu, 1)");
    }

    #[test]
    fn equal_keys_share_a_partition() {
        let a = KeyTuple::new(vec![Cell::I64(42), Cell::from("x")]);
        let b = KeyTuple::new(vec![Cell::I64(42), Cell::from("x")]);

        for partitions in 1..16 {
            assert_eq!(a.partition(partitions), b.partition(partitions));
            assert!(a.partition(partitions) < partitions);
        }
    }

    #[test]
    fn short_row_is_rejected() {
        let row = TableRow::new(vec![Cell::I64(1)]);

        assert!(KeyTuple::from_row(&row, &[3]).is_err());
    }
}
