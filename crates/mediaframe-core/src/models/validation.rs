use thiserror::Error;

/// Rejected form input, caught before any request is sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Please select a valid {expected} file")]
    UnsupportedFile { expected: &'static str },

    #[error("The selected file is empty")]
    EmptyFile,

    #[error("Invalid value for {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
}

pub(crate) fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Required(field))
    } else {
        Ok(())
    }
}

/// Loose shape check: one `@`, non-empty local part, dotted domain.
pub(crate) fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::Required("Email"));
    }
    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::InvalidEmail);
    };
    let domain_ok = !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.');
    if local.is_empty() || !domain_ok || email.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}
