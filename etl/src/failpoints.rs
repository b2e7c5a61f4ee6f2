//! Named fault injection points, active with the `failpoints` feature.

use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

/// Hit after a merge computed its output and before the materialized table is replaced.
pub const MERGE_BEFORE_REPLACE: &str = "merge.before_replace";

/// Hit after a local warehouse published a new table version and before it removed the
/// superseded files.
pub const WAREHOUSE_AFTER_PUBLISH: &str = "warehouse.after_publish";

/// Hit before a pipeline stage starts running.
pub const PIPELINE_BEFORE_STAGE: &str = "pipeline.before_stage";

/// Fails with [`ErrorKind::InjectedFailure`] when the fail point `name` is configured to `return`.
pub fn etl_fail_point(name: &str) -> EtlResult<()> {
    fail_point!(name, |parameter: Option<String>| {
        let detail = match parameter {
            Some(parameter) => format!("fail point `{name}` triggered with `{parameter}`"),
            None => format!("fail point `{name}` triggered"),
        };

        bail!(
            ErrorKind::InjectedFailure,
            "An injected failure occurred",
            detail = detail
        );
    });

    Ok(())
}
