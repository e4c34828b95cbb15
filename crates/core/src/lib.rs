//! q3query Core - Error taxonomy and shared value types

mod error;
mod types;

pub use error::*;
pub use types::*;
