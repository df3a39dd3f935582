//! Bag-of-Cells core: bitstrings, cells, the BoC wire format, and
//! dictionaries. Everything outside of these — friendly address strings,
//! TL-B schemas for specific message/transaction types, a TON client —
//! is deliberately left to other crates built on top of this one.

mod address;
mod bits;
mod boc;
mod cell;
mod dict;
mod error;

pub use address::{Address, InternalAddress, ADDRESS_HASH_BITS};
pub use bits::{BitBuilder, BitReader, BitString};
pub use boc::BagOfCells;
pub use cell::{Builder, Cell, CellRef, Slice, HASH_BYTES};
pub use dict::{coders, Dictionary};
pub use error::{CellError, Result};
