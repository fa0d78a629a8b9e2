//! System.Crypto.* syscall handlers.

use super::EngineHost;
use neo_vm::{ExecutionEngine, StackItem, VmError, VmResult};

/// Base price of one signature check, in datoshi.
pub const CHECK_SIG_PRICE: i64 = 1 << 15;

/// The message signatures cover: network magic plus container hash.
fn sign_data(host: &EngineHost) -> VmResult<Vec<u8>> {
    let hash = host
        .container
        .hash()
        .ok_or_else(|| VmError::invalid_operation("signature checks need a container"))?;
    let mut data = Vec::with_capacity(36);
    data.extend_from_slice(&host.settings.network.to_le_bytes());
    data.extend_from_slice(hash.as_bytes());
    Ok(data)
}

pub fn check_sig(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let public_key = engine.pop()?.as_bytes()?;
    let signature = engine.pop()?.as_bytes()?;
    let data = sign_data(host)?;
    let valid = neo_cryptography::verify_ecdsa(
        &data,
        &public_key,
        &signature,
        neo_cryptography::EcCurve::Secp256r1,
        neo_cryptography::HashKind::Sha256,
    );
    engine.push(StackItem::from_bool(valid))
}

pub fn check_multisig(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let keys_item = engine.pop()?;
    let StackItem::Array(keys) = &keys_item else {
        return Err(keys_item.type_mismatch("Array"));
    };
    let signatures_item = engine.pop()?;
    let StackItem::Array(signatures) = &signatures_item else {
        return Err(signatures_item.type_mismatch("Array"));
    };
    let keys: Vec<Vec<u8>> = keys
        .borrow()
        .iter()
        .map(|k| k.as_bytes())
        .collect::<VmResult<_>>()?;
    let signatures: Vec<Vec<u8>> = signatures
        .borrow()
        .iter()
        .map(|s| s.as_bytes())
        .collect::<VmResult<_>>()?;
    if keys.is_empty() || signatures.is_empty() || signatures.len() > keys.len() {
        return Err(VmError::invalid_argument(
            "invalid multisig arity".to_string(),
        ));
    }
    host.add_gas(CHECK_SIG_PRICE * keys.len() as i64 * host.exec_fee_factor)?;

    let data = sign_data(host)?;
    let mut key_index = 0usize;
    let mut sig_index = 0usize;
    // Signatures must appear in key order; each key verifies at most once.
    while sig_index < signatures.len() && key_index < keys.len() {
        if neo_cryptography::verify_ecdsa(
            &data,
            &keys[key_index],
            &signatures[sig_index],
            neo_cryptography::EcCurve::Secp256r1,
            neo_cryptography::HashKind::Sha256,
        ) {
            sig_index += 1;
        }
        key_index += 1;
        if signatures.len() - sig_index > keys.len() - key_index {
            break;
        }
    }
    engine.push(StackItem::from_bool(sig_index == signatures.len()))
}
