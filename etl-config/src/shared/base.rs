use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A field holds a value outside its accepted range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// The provisioning stage is enabled but no command was configured for it.
    #[error("`pipeline.provisioning` must be set when the provisioning stage is enabled")]
    MissingProvisioningCommand,
    /// Two staging metadata columns share a name.
    #[error("staging column name `{0}` is used more than once")]
    DuplicateStagingColumn(String),
}

impl ValidationError {
    pub(crate) fn invalid(field: &str, constraint: &str) -> Self {
        ValidationError::InvalidFieldValue {
            field: field.to_owned(),
            constraint: constraint.to_owned(),
        }
    }
}

/// Fails with [`ValidationError::InvalidFieldValue`] when `value` is blank.
pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::invalid(field, "must not be empty"));
    }

    Ok(())
}
