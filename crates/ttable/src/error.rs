//! Errors surfaced by the fallible table operations

use thiserror::Error;

/// Failure to set up the table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TtError {
    /// The requested size cannot be described as an allocation layout
    #[error("invalid allocation layout for {bytes} bytes")]
    Layout { bytes: usize },
    /// The allocator returned no memory
    #[error("failed to allocate {bytes} bytes for the transposition table")]
    OutOfMemory { bytes: usize },
    /// A replacement parameter lies outside its accepted range
    #[error("replacement parameter {name} = {value} is outside {min}..={max}")]
    InvalidParam {
        name: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },
}
