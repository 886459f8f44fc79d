//! The prelude exports the items which are useful in representing
//! things to do with the X-MP.  Providing this prelude is the main
//! purpose of the base crate.
pub use super::charset::{pack_bytes, Justification};
pub use super::float::{cray_to_f64, f64_to_cray, FloatRangeError};
pub use super::instruction::*;
pub use super::word::*;
