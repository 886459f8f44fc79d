//! The `base` crate defines the X-MP related things which are useful
//! to both the assembler and the tools that inspect its output.  The
//! idea is that a disassembler or loader would depend on the base
//! crate but would not need to depend on the assembler library
//! itself.
//!
//! The machine has 64-bit words, each divided into four 16-bit
//! parcels.  Bits are numbered from the most-significant end: bit 0
//! is the sign bit of a word and bit 63 is the least significant.

pub mod charset;
pub mod float;
pub mod instruction;
pub mod prelude;
pub mod word;
