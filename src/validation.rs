//! Small validation helpers shared by the gate model, the document store and configuration.

/// Definition codes accepted by a one-dimensional threshold gate.
pub const ONE_D_DEFINITIONS: [&str; 2] = ["+", "-"];

/// Definition codes accepted by a two-dimensional threshold gate.
pub const TWO_D_DEFINITIONS: [&str; 4] = ["++", "+-", "-+", "--"];

/// Validates a threshold child definition code against the gating mode.
///
/// # Arguments
///
/// * `definition` - The quadrant code, e.g. `"+"` or `"-+"`.
/// * `two_dimensional` - Whether the owning gate has a `y` axis.
///
/// # Returns
///
/// * `Ok(())` if the code is one of the accepted codes for that mode.
/// * `Err(&'static str)` listing the accepted codes otherwise.
pub fn is_valid_definition(definition: &str, two_dimensional: bool) -> Result<(), &'static str> {
    if two_dimensional {
        if TWO_D_DEFINITIONS.contains(&definition) {
            Ok(())
        } else {
            Err("'++', '+-', '-+', or '--'")
        }
    } else if ONE_D_DEFINITIONS.contains(&definition) {
        Ok(())
    } else {
        Err("'+' or '-'")
    }
}

/// Validates if a given string can be used as a document identifier on disk.
///
/// # Arguments
///
/// * `name` - The identifier to validate.
///
/// # Returns
///
/// * `Ok(())` if the identifier is usable as a file stem.
/// * `Err(&'static str)` if it is empty or contains separators or null bytes.
pub fn is_valid_document_id(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Identifier cannot be empty");
    }
    if name.contains('\0') {
        return Err("Identifier cannot contain null bytes");
    }
    if name.contains('/') || name.contains('\\') {
        return Err("Identifier cannot contain path separators");
    }
    if name == "." || name == ".." {
        return Err("Identifier cannot be a relative path component");
    }
    Ok(())
}

/// Validates if a given string is not empty.
///
/// # Arguments
///
/// * `value` - The string to validate.
///
/// # Returns
///
/// * `Ok(())` if the string is not empty.
/// * `Err(&'static str)` if the string is empty.
pub fn is_not_empty(value: &str) -> Result<(), &'static str> {
    if !value.trim().is_empty() {
        Ok(())
    } else {
        Err("Value cannot be empty")
    }
}

/// Validates that every value is a finite number.
pub fn is_finite(values: &[f64]) -> Result<(), &'static str> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err("Values must be finite numbers")
    }
}
