use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use num_bigint::{BigInt, BigUint};

use ton_boc::coders::{key_reader_u16, key_writer_u16, value_reader_uint, value_writer_uint_min};
use ton_boc::{Address, BagOfCells, BitBuilder, BitReader, Builder, Dictionary, InternalAddress};

#[test]
fn signed_22_bit_value_round_trips() -> anyhow::Result<()> {
    let mut b = BitBuilder::new();
    b.write_int(&BigInt::from(-44028), 22)?;
    let bits = b.build()?;
    assert_eq!(bits.to_hex(), "FD5012_");

    let mut r = BitReader::new(bits);
    assert_eq!(r.load_int(22)?, BigInt::from(-44028));
    Ok(())
}

#[test]
fn coins_round_trip() -> anyhow::Result<()> {
    let mut b = BitBuilder::new();
    b.write_coins(&BigUint::from(187_657_898_555_727u64))?;
    let bits = b.build()?;
    assert_eq!(bits.to_hex(), "6AAAC8261F94F");

    let mut r = BitReader::new(bits);
    assert_eq!(r.load_coins()?, BigUint::from(187_657_898_555_727u64));
    Ok(())
}

/// Decodes the 36-byte friendly address payload (flags, workchain, 256-bit
/// hash, CRC16) out of its URL-safe base64 wrapper. Friendly-string parsing
/// is an external-collaborator concern, so this helper lives only in the
/// test, not in the crate itself.
fn internal_address_from_friendly(friendly: &str) -> InternalAddress {
    let raw = URL_SAFE_NO_PAD.decode(friendly).expect("valid base64");
    assert_eq!(raw.len(), 36, "friendly address payload must be 36 bytes");
    let workchain = raw[1] as i8;
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&raw[2..34]);
    InternalAddress::new(workchain, hash)
}

#[test]
fn address_round_trips_to_canonical_hex() -> anyhow::Result<()> {
    let address = internal_address_from_friendly("Ef89v3kFhPfyauFSn_PWq-F6HyiBSQDZRXjoDRWq5f5IZeTm");

    let mut b = BitBuilder::new();
    b.write_address(&Address::Internal(address))?;
    let bits = b.build()?;

    assert_eq!(
        bits.to_hex(),
        "9FE7B7EF20B09EFE4D5C2A53FE7AD57C2F43E51029201B28AF1D01A2B55CBFC90CB_"
    );
    Ok(())
}

#[test]
fn boc_with_shared_ref_round_trips() -> anyhow::Result<()> {
    let shared = Builder::new().store_u64(42, 32)?.end_cell()?.to_arc();

    let mut child1 = Builder::new();
    child1.store_u64(1, 8)?.store_ref(shared.clone())?;
    let child1 = child1.end_cell()?.to_arc();

    let mut child2 = Builder::new();
    child2.store_u64(2, 8)?.store_ref(shared.clone())?;
    let child2 = child2.end_cell()?.to_arc();

    let mut parent = Builder::new();
    parent.store_ref(child1)?.store_ref(child2)?;
    let parent = parent.end_cell()?;

    let boc = BagOfCells::from_root(parent);
    let bytes = boc.serialize(true, true)?;
    let parsed = BagOfCells::parse(&bytes)?;

    let root = parsed.single_root()?;
    let restored_child1 = root.reference(0)?;
    let restored_child2 = root.reference(1)?;
    let restored_shared1 = restored_child1.reference(0)?;
    let restored_shared2 = restored_child2.reference(0)?;

    assert_eq!(restored_shared1.hash(), restored_shared2.hash());

    let mut slice = ton_boc::Slice::new(restored_shared1.as_ref())?;
    assert_eq!(slice.load_u64(32)?, 42);
    Ok(())
}

#[test]
fn uint16_to_uint16_dictionary_round_trips() -> anyhow::Result<()> {
    let mut dict: Dictionary<u16, BigUint> = Dictionary::empty(
        16,
        Arc::new(key_writer_u16),
        Arc::new(key_reader_u16),
        Arc::new(value_writer_uint_min),
        Arc::new(value_reader_uint),
    );
    dict.set(13, BigUint::from(169u32));
    dict.set(17, BigUint::from(289u32));
    dict.set(239, BigUint::from(57121u32));
    assert_eq!(dict.size(), 3);

    let mut builder = Builder::new();
    dict.store_direct(&mut builder)?;
    let cell = builder.end_cell()?;

    let mut slice = ton_boc::Slice::new(&cell)?;
    let loaded: Dictionary<u16, BigUint> = Dictionary::load_direct(
        &mut slice,
        16,
        Arc::new(key_writer_u16),
        Arc::new(key_reader_u16),
        Arc::new(value_writer_uint_min),
        Arc::new(value_reader_uint),
    )?;

    assert_eq!(loaded.size(), 3);
    assert_eq!(loaded.get(&13), Some(&BigUint::from(169u32)));
    assert_eq!(loaded.get(&17), Some(&BigUint::from(289u32)));
    assert_eq!(loaded.get(&239), Some(&BigUint::from(57121u32)));
    Ok(())
}

#[test]
fn state_init_golden_round_trips() -> anyhow::Result<()> {
    let code = Builder::new().store_u64(1, 8)?.end_cell()?.to_arc();
    let data = Builder::new().store_u64(2, 8)?.end_cell()?.to_arc();

    // StateInit: split_depth:Maybe special:Maybe code:Maybe^Cell data:Maybe^Cell library:HashmapE
    let mut builder = Builder::new();
    builder
        .store_bit(false)? // no split_depth
        .store_bit(false)? // no special
        .store_dict(Some(&code))?
        .store_dict(Some(&data))?
        .store_dict(None)?; // empty library dict
    let state_init = builder.end_cell()?;

    let boc = BagOfCells::from_root(state_init);
    let base64 = boc.serialize_to_base64(false, true)?;
    assert_eq!(base64, "te6cckEBAwEACwACATQBAgACAQACAoN/wQo=");

    let parsed = BagOfCells::parse_base64(&base64)?;
    assert_eq!(
        parsed.single_root()?.hash(),
        boc.single_root()?.hash()
    );
    Ok(())
}
