//! Input validation utilities
//!
//! Common checks for command-line parameters and input paths, reported through
//! the structured error types in [`crate::errors`].

use crate::errors::{PkgqError, Result};
use crate::pkglist::is_stdin_path;
use std::fmt::Display;
use std::path::Path;

/// Validate that an input file exists. Stdin (`-`) always passes.
///
/// # Errors
/// Returns an error if the file does not exist
///
/// # Example
/// ```
/// use pkgq_lib::validation::validate_input_exists;
///
/// assert!(validate_input_exists("-", "Package list").is_ok());
/// assert!(validate_input_exists("/nonexistent/pkglist.classic", "Package list").is_err());
/// ```
pub fn validate_input_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !is_stdin_path(path_ref) && !path_ref.exists() {
        return Err(PkgqError::InvalidFileFormat {
            file_type: description.to_string(),
            path: path_ref.display().to_string(),
            reason: "File does not exist".to_string(),
        });
    }
    Ok(())
}

/// Validate that every input exists
///
/// # Errors
/// Returns an error for the first input that doesn't exist
pub fn validate_inputs_exist<P: AsRef<Path>>(paths: &[P], description: &str) -> Result<()> {
    for path in paths {
        validate_input_exists(path, description)?;
    }
    Ok(())
}

/// Validate that stdin is read at most once
///
/// # Errors
/// Returns an error if `-` appears more than once
pub fn validate_single_stdin<P: AsRef<Path>>(paths: &[P]) -> Result<()> {
    if paths.iter().filter(|p| is_stdin_path(p)).count() > 1 {
        return Err(PkgqError::InvalidParameter {
            parameter: "PKGLIST".to_string(),
            reason: "stdin ('-') may only be given once".to_string(),
        });
    }
    Ok(())
}

/// Validate that a value is positive (> 0)
///
/// # Errors
/// Returns an error if the value is not positive
///
/// # Example
/// ```
/// use pkgq_lib::validation::validate_positive;
///
/// validate_positive(8, "queue-capacity").unwrap();
/// assert!(validate_positive(0, "queue-capacity").is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_positive<T: PartialOrd + Display + Default>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(PkgqError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be positive (> 0), got: {value}"),
        });
    }
    Ok(())
}

/// Validate that a ratio is a finite number greater than zero
///
/// # Errors
/// Returns an error for zero, negative, infinite or NaN ratios
pub fn validate_ratio(ratio: f64, name: &str) -> Result<()> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(PkgqError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be a finite number > 0, got: {ratio}"),
        });
    }
    Ok(())
}
