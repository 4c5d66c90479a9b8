//! Canonical serialization of signed content.

use serde::Serialize;

use crate::TokenError;

/// Serialize `value` into its canonical byte form.
///
/// The value is first lowered into a [`serde_json::Value`], whose object
/// maps are ordered by key, and then written without whitespace. Two
/// structures with the same content therefore produce the same bytes no
/// matter the order their fields or map entries were inserted in.
///
/// # Errors
///
/// Returns [`TokenError::Malformed`] if `value` cannot be represented as
/// JSON (e.g. a map with non-string keys).
pub fn canonicalize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, TokenError> {
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&value)?)
}
