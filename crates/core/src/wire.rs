//! Lenient field decoders for the print server's JSON.
//!
//! The server stores flags such as `file_pause` or `released` as `0`/`1`
//! integers, occasionally `null`, and newer code paths send real booleans.
//! Status strings may also be `null` while a printer is initialising.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFlag {
    Bool(bool),
    Int(i64),
    Float(f64),
}

/// Decode a flag, treating `null` as `false` and any non-zero number as `true`.
///
/// Use with `#[serde(default, deserialize_with = "printdeck_core::wire::flag")]`.
pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawFlag>::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawFlag::Bool(value)) => value,
        Some(RawFlag::Int(value)) => value != 0,
        Some(RawFlag::Float(value)) => value != 0.0,
        None => false,
    })
}

/// Decode `null` as `T::default()`.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
