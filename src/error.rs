use thiserror::Error;

/// Every failure this crate can produce. Construction, parsing, and BoC
/// (de)serialization are local and immediate: there is no retry or partial
/// result, a failure always surfaces to the caller as one of these variants.
#[derive(Error, Debug)]
pub enum CellError {
    #[error("bit overflow: tried to write {attempted} bits into {available} available")]
    BitOverflow { attempted: usize, available: usize },

    #[error("cell reference overflow: tried to add reference {index}, max is 4")]
    RefOverflow { index: usize },

    #[error("value {value} out of range for {bits}-bit {signed} integer")]
    RangeError {
        value: String,
        bits: usize,
        signed: &'static str,
    },

    #[error("out of bounds: requested [{offset}, {offset}+{length}) in a {len}-bit string")]
    OutOfBounds {
        offset: usize,
        length: usize,
        len: usize,
    },

    #[error("not byte-aligned: offset {offset}, length {length}")]
    NotAligned { offset: usize, length: usize },

    #[error("invalid exotic cell: {0}")]
    InvalidExoticCell(String),

    #[error("invalid BoC header: {0}")]
    InvalidBocHeader(String),

    #[error("invalid BoC CRC: expected {expected:08x}, computed {computed:08x}")]
    InvalidCrc { expected: u32, computed: u32 },

    #[error("invalid dictionary label: {0}")]
    InvalidDictLabel(String),

    #[error("dictionary value parse error: {0}")]
    DictValueParse(String),

    #[error("slice not empty: {remaining_bits} bits and {remaining_refs} refs remaining")]
    NotEmptySlice {
        remaining_bits: usize,
        remaining_refs: usize,
    },

    #[error("unsupported address tag: {0:#04b}")]
    UnsupportedAddressTag(u8),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CellError>;

impl CellError {
    pub(crate) fn range<V: ToString>(value: V, bits: usize, signed: &'static str) -> CellError {
        CellError::RangeError {
            value: value.to_string(),
            bits,
            signed,
        }
    }

    pub(crate) fn invalid_exotic<M: ToString>(msg: M) -> CellError {
        CellError::InvalidExoticCell(msg.to_string())
    }

    pub(crate) fn invalid_boc<M: ToString>(msg: M) -> CellError {
        CellError::InvalidBocHeader(msg.to_string())
    }

    pub(crate) fn invalid_dict_label<M: ToString>(msg: M) -> CellError {
        CellError::InvalidDictLabel(msg.to_string())
    }

    pub(crate) fn dict_value<M: ToString>(msg: M) -> CellError {
        CellError::DictValueParse(msg.to_string())
    }

    pub(crate) fn internal<M: ToString>(msg: M) -> CellError {
        CellError::Internal(msg.to_string())
    }
}
