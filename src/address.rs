//! Internal address bit forms used by [`crate::bits`].
//!
//! This is deliberately narrow: only the three wire shapes the bit codec
//! cares about (none, internal, external-with-arbitrary-length). Friendly
//! (base64/bounceable) string formats, anycast resolution, and
//! contract-address derivation are external-collaborator concerns and live
//! outside this core.

use crate::bits::BitString;

pub const ADDRESS_HASH_BITS: usize = 256;

/// `addr_std` without anycast: an 8-bit signed workchain plus a 256-bit hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InternalAddress {
    pub workchain: i8,
    pub hash: [u8; 32],
}

impl InternalAddress {
    pub const fn new(workchain: i8, hash: [u8; 32]) -> Self {
        InternalAddress { workchain, hash }
    }
}

/// The full `MsgAddress` domain as the bit codec sees it: `addr_none`,
/// `addr_std` (no anycast), or `addr_extern`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    None,
    Internal(InternalAddress),
    External(BitString),
}
