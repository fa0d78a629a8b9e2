//! CryptoLib (-3): hashes, curve verification, BLS12-381 group ops.

use super::{arg, arg_bool, arg_bytes, arg_i64, NativeContract, NativeMethod};
use crate::application_engine::EngineHost;
use neo_core::{Hardfork, UInt160};
use neo_cryptography::{BlsPoint, CryptoError};
use neo_vm::{CallFlags, ExecutionEngine, StackItem, VmError, VmResult};

/// Contract id.
pub const ID: i32 = -3;

/// The interop name BLS points travel under.
pub const BLS_INTERFACE: &str = "Bls12381Point";

/// The CryptoLib hash.
pub fn hash() -> UInt160 {
    super::native_hash("CryptoLib")
}

fn crypto_error(error: CryptoError) -> VmError {
    VmError::invalid_argument(error.to_string())
}

fn pop_bls(args: &[StackItem], index: usize) -> VmResult<BlsPoint> {
    let item = arg(args, index)?;
    let StackItem::InteropInterface(handle) = item else {
        return Err(item.type_mismatch("InteropInterface"));
    };
    handle
        .with_value::<BlsPoint, _>(|point| point.clone())
        .ok_or_else(|| VmError::invalid_argument("not a BLS12-381 point"))
}

fn sha256(_: &mut EngineHost, _: &mut ExecutionEngine, args: Vec<StackItem>) -> VmResult<Option<StackItem>> {
    let data = arg_bytes(&args, 0)?;
    Ok(Some(StackItem::from_byte_string(
        neo_cryptography::sha256(&data).to_vec(),
    )))
}

fn ripemd160(_: &mut EngineHost, _: &mut ExecutionEngine, args: Vec<StackItem>) -> VmResult<Option<StackItem>> {
    let data = arg_bytes(&args, 0)?;
    Ok(Some(StackItem::from_byte_string(
        neo_cryptography::ripemd160(&data).to_vec(),
    )))
}

fn keccak256(_: &mut EngineHost, _: &mut ExecutionEngine, args: Vec<StackItem>) -> VmResult<Option<StackItem>> {
    let data = arg_bytes(&args, 0)?;
    Ok(Some(StackItem::from_byte_string(
        neo_cryptography::keccak256(&data).to_vec(),
    )))
}

fn murmur32(_: &mut EngineHost, _: &mut ExecutionEngine, args: Vec<StackItem>) -> VmResult<Option<StackItem>> {
    let data = arg_bytes(&args, 0)?;
    let seed = arg_i64(&args, 1)? as u32;
    let digest = neo_cryptography::murmur32(&data, seed);
    Ok(Some(StackItem::from_byte_string(digest.to_le_bytes().to_vec())))
}

fn verify_with_ecdsa(
    _: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let message = arg_bytes(&args, 0)?;
    let public_key = arg_bytes(&args, 1)?;
    let signature = arg_bytes(&args, 2)?;
    let selector = arg_i64(&args, 3)?;
    let (curve, hasher) =
        neo_cryptography::named_curve_hash(selector).map_err(crypto_error)?;
    let valid =
        neo_cryptography::verify_ecdsa(&message, &public_key, &signature, curve, hasher);
    Ok(Some(StackItem::from_bool(valid)))
}

fn verify_with_ed25519(
    _: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let message = arg_bytes(&args, 0)?;
    let public_key = arg_bytes(&args, 1)?;
    let signature = arg_bytes(&args, 2)?;
    Ok(Some(StackItem::from_bool(
        neo_cryptography::verify_ed25519(&message, &public_key, &signature),
    )))
}

fn recover_secp256k1(
    _: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let message_hash = arg_bytes(&args, 0)?;
    let signature = arg_bytes(&args, 1)?;
    match neo_cryptography::recover_secp256k1(&message_hash, &signature) {
        Some(public_key) => Ok(Some(StackItem::from_byte_string(public_key))),
        None => Ok(Some(StackItem::Null)),
    }
}

fn bls12381_serialize(
    _: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let point = pop_bls(&args, 0)?;
    let bytes = point.serialize().map_err(crypto_error)?;
    Ok(Some(StackItem::from_byte_string(bytes)))
}

fn bls12381_deserialize(
    _: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let bytes = arg_bytes(&args, 0)?;
    let point = BlsPoint::deserialize(&bytes).map_err(crypto_error)?;
    Ok(Some(StackItem::from_interop(BLS_INTERFACE, point)))
}

fn bls12381_equal(
    _: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let x = pop_bls(&args, 0)?;
    let y = pop_bls(&args, 1)?;
    Ok(Some(StackItem::from_bool(
        x.equals(&y).map_err(crypto_error)?,
    )))
}

fn bls12381_add(
    _: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let x = pop_bls(&args, 0)?;
    let y = pop_bls(&args, 1)?;
    let sum = x.add(&y).map_err(crypto_error)?;
    Ok(Some(StackItem::from_interop(BLS_INTERFACE, sum)))
}

fn bls12381_mul(
    _: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let x = pop_bls(&args, 0)?;
    let scalar = arg_bytes(&args, 1)?;
    let negate = arg_bool(&args, 2)?;
    let product = x.mul(&scalar, negate).map_err(crypto_error)?;
    Ok(Some(StackItem::from_interop(BLS_INTERFACE, product)))
}

fn bls12381_pairing(
    _: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let g1 = pop_bls(&args, 0)?;
    let g2 = pop_bls(&args, 1)?;
    let result = BlsPoint::pairing(&g1, &g2).map_err(crypto_error)?;
    Ok(Some(StackItem::from_interop(BLS_INTERFACE, result)))
}

const ONE_BYTES: &[(&str, &str)] = &[("data", "ByteArray")];

macro_rules! crypto_method {
    ($name:literal, $params:literal, $defs:expr, $ret:literal, $fee:expr, $handler:path) => {
        crypto_method!($name, $params, $defs, $ret, $fee, $handler, None)
    };
    ($name:literal, $params:literal, $defs:expr, $ret:literal, $fee:expr, $handler:path, $active:expr) => {
        NativeMethod {
            name: $name,
            parameters: $params,
            parameter_defs: $defs,
            return_type: $ret,
            cpu_fee: $fee,
            storage_fee: 0,
            required_flags: CallFlags::NONE,
            active_in: $active,
            deprecated_in: None,
            handler: $handler,
        }
    };
}

/// Builds the CryptoLib table.
pub fn contract() -> NativeContract {
    let methods = vec![
        crypto_method!(
            "bls12381Add",
            2,
            &[("x", "InteropInterface"), ("y", "InteropInterface")],
            "InteropInterface",
            1 << 19,
            bls12381_add
        ),
        crypto_method!(
            "bls12381Deserialize",
            1,
            ONE_BYTES,
            "InteropInterface",
            1 << 19,
            bls12381_deserialize
        ),
        crypto_method!(
            "bls12381Equal",
            2,
            &[("x", "InteropInterface"), ("y", "InteropInterface")],
            "Boolean",
            1 << 5,
            bls12381_equal
        ),
        crypto_method!(
            "bls12381Mul",
            3,
            &[
                ("x", "InteropInterface"),
                ("mul", "ByteArray"),
                ("neg", "Boolean")
            ],
            "InteropInterface",
            1 << 21,
            bls12381_mul
        ),
        crypto_method!(
            "bls12381Pairing",
            2,
            &[("g1", "InteropInterface"), ("g2", "InteropInterface")],
            "InteropInterface",
            1 << 23,
            bls12381_pairing
        ),
        crypto_method!(
            "bls12381Serialize",
            1,
            &[("g", "InteropInterface")],
            "ByteArray",
            1 << 19,
            bls12381_serialize
        ),
        crypto_method!("keccak256", 1, ONE_BYTES, "ByteArray", 1 << 15, keccak256, Some(Hardfork::Cockatrice)),
        crypto_method!(
            "murmur32",
            2,
            &[("data", "ByteArray"), ("seed", "Integer")],
            "ByteArray",
            1 << 13,
            murmur32
        ),
        crypto_method!(
            "recoverSecp256K1",
            2,
            &[("messageHash", "ByteArray"), ("signature", "ByteArray")],
            "ByteArray",
            1 << 15,
            recover_secp256k1,
            Some(Hardfork::Echidna)
        ),
        crypto_method!("ripemd160", 1, ONE_BYTES, "ByteArray", 1 << 15, ripemd160),
        crypto_method!("sha256", 1, ONE_BYTES, "ByteArray", 1 << 15, sha256),
        crypto_method!(
            "verifyWithECDsa",
            4,
            &[
                ("message", "ByteArray"),
                ("pubkey", "PublicKey"),
                ("signature", "ByteArray"),
                ("curveHash", "Integer")
            ],
            "Boolean",
            1 << 15,
            verify_with_ecdsa
        ),
        crypto_method!(
            "verifyWithEd25519",
            3,
            &[
                ("message", "ByteArray"),
                ("pubkey", "ByteArray"),
                ("signature", "ByteArray")
            ],
            "Boolean",
            1 << 15,
            verify_with_ed25519,
            Some(Hardfork::Echidna)
        ),
    ];

    NativeContract {
        id: ID,
        name: "CryptoLib",
        hash: hash(),
        active_in: None,
        supported_standards: &[],
        methods,
        events: Vec::new(),
        on_persist: None,
        post_persist: None,
    }
}
