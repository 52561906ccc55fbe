//! Foreign-language facades.
#[cfg(feature = "python")]
pub mod python;
