//! Values, rows and change events handled by the merge.

mod cell;
mod event;
mod table_name;
mod table_row;

pub use cell::Cell;
pub use event::{CHANGE_METADATA_WIDTH, ChangeEvent, OperationCode};
pub use table_name::TableName;
pub use table_row::TableRow;
