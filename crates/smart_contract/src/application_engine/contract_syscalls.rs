//! System.Contract.* syscall handlers: inter-contract calls, native
//! dispatch, method tokens, account script helpers.

use super::{ContractFrame, EngineHost};
use crate::interop_service;
use crate::native;
use crate::trigger::TriggerType;
use neo_core::UInt160;
use neo_cryptography::hash160;
use neo_vm::{CallFlags, ExecutionEngine, Script, ScriptBuilder, StackItem, VmError, VmResult};
use num_traits::ToPrimitive;

/// Loads a script as a fresh contract frame: cloned snapshot layer,
/// notification checkpoint, narrowed call flags, arguments on the new
/// evaluation stack in ABI order (argument 0 deepest).
#[allow(clippy::too_many_arguments)]
pub fn load_frame(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    script: Script,
    position: usize,
    rvcount: i32,
    script_hash: UInt160,
    calling_hash: Option<UInt160>,
    call_flags: CallFlags,
    args: Vec<StackItem>,
    is_native: bool,
) -> VmResult<()> {
    let snapshot = host.snapshot()?.clone_cache();
    engine.load_script(script, rvcount, position)?;
    let context = engine
        .current_context_mut()
        .ok_or_else(|| VmError::invalid_operation("loaded context missing"))?;
    context.set_call_flags(call_flags);
    for arg in args {
        context.evaluation_stack_mut().push(arg);
    }
    host.frames.push(ContractFrame {
        base_depth: engine.invocation_stack().len(),
        snapshot,
        notification_checkpoint: host.notifications.len(),
        script_hash,
        calling_hash,
        is_native,
    });
    host.next_invocation_counter(&script_hash);
    Ok(())
}

/// `System.Contract.Call`.
pub fn call(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let hash_bytes = engine.pop()?.as_bytes()?;
    let target = UInt160::from_bytes(&hash_bytes).map_err(|_| VmError::BadScriptHash {
        expected: 20,
        actual: hash_bytes.len(),
    })?;
    let method = engine.pop()?.as_string()?;
    let flag_bits = engine.pop_int()?;
    let args_item = engine.pop()?;
    let StackItem::Array(args) = &args_item else {
        return Err(args_item.type_mismatch("Array"));
    };
    let args = args.borrow().clone();

    let flag_bits = flag_bits
        .to_u8()
        .ok_or_else(|| VmError::invalid_argument("call flags out of range"))?;
    let requested = CallFlags::from_bits(flag_bits)
        .ok_or_else(|| VmError::invalid_argument("undefined call flags"))?;

    call_contract(host, engine, &target, &method, requested, args)
}

/// Shared implementation of Contract.Call and CALLT.
pub fn call_contract(
    host: &mut EngineHost,
    engine: &mut ExecutionEngine,
    target: &UInt160,
    method: &str,
    requested_flags: CallFlags,
    args: Vec<StackItem>,
) -> VmResult<()> {
    if method.starts_with('_') {
        return Err(VmError::MethodNotFound(format!(
            "reserved method {method} cannot be called directly"
        )));
    }
    let contract = host
        .get_contract(target)?
        .ok_or_else(|| VmError::ContractNotFound(target.to_string()))?;
    let descriptor = contract
        .manifest
        .abi
        .get_method(method, args.len())
        .ok_or_else(|| {
            VmError::MethodNotFound(format!("{method} with {} parameters", args.len()))
        })?
        .clone();

    // The caller's manifest must permit the target contract and method.
    let calling_hash = host.current_script_hash()?;
    if let Some(caller) = host.get_contract(&calling_hash)? {
        if !caller
            .manifest
            .can_call(target, &contract.manifest.group_keys(), method)
        {
            return Err(VmError::PermissionDenied(format!(
                "{} may not call {}::{}",
                caller.manifest.name, contract.manifest.name, method
            )));
        }
    }

    let caller_flags = engine
        .current_context()
        .map(|c| c.call_flags())
        .unwrap_or(CallFlags::NONE);
    if !caller_flags.contains(CallFlags::ALLOW_CALL) {
        return Err(VmError::PermissionDenied(
            "frame may not perform contract calls".into(),
        ));
    }
    let effective = requested_flags.intersection(caller_flags);

    let rvcount = if descriptor.return_type == "Void" { 0 } else { 1 };

    if let Some(native) = native::registry().by_hash(target) {
        // Native targets run through their stub script; the CallNative
        // syscall inside it resolves and executes the method body.
        let block_index = host.block_index();
        let entries = native.active_method_entries(&host.settings, block_index);
        let position = entries
            .iter()
            .find(|entry| {
                entry.method.name == method && entry.method.parameters == args.len() as u8
            })
            .map(|entry| entry.descriptor_offset)
            .ok_or_else(|| VmError::InactiveMethod(format!("{method} is not active")))?;
        let stub = native::registry().stub_script(native.id, entries.len());
        return load_frame(
            host,
            engine,
            stub,
            position,
            rvcount,
            *target,
            Some(calling_hash),
            effective,
            args,
            true,
        );
    }

    load_frame(
        host,
        engine,
        Script::new(contract.nef.script.clone()),
        descriptor.offset as usize,
        rvcount,
        *target,
        Some(calling_hash),
        effective,
        args,
        false,
    )?;

    // A contract with an `_initialize` method runs it before the target.
    if let Some(init) = contract.manifest.abi.get_method("_initialize", 0) {
        let init_offset = init.offset as usize;
        let context = engine
            .current_context()
            .ok_or_else(|| VmError::invalid_operation("callee context missing"))?;
        let init_context = context.clone_at(init_offset, engine.reference_counter());
        engine.load_context(init_context)?;
    }
    Ok(())
}

/// `System.Contract.CallNative`: executes the native method addressed by
/// the stub instruction pointer.
pub fn call_native(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let version = engine.pop_int()?;
    if version != num_bigint::BigInt::from(0) {
        return Err(VmError::invalid_argument(format!(
            "unsupported CallNative version {version}"
        )));
    }
    let current_hash = host.current_script_hash()?;
    let native = native::registry()
        .by_hash(&current_hash)
        .ok_or_else(|| VmError::ContractNotFound("CallNative outside a native stub".into()))?;
    let block_index = host.block_index();
    if !native.is_active(&host.settings, block_index) {
        return Err(VmError::InactiveMethod(format!(
            "{} is not active at height {block_index}",
            native.name
        )));
    }

    let syscall_position = engine
        .current_context()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?
        .instruction_pointer();
    if syscall_position == 0 {
        return Err(VmError::invalid_operation("malformed native stub"));
    }
    let descriptor_offset = syscall_position - 1;
    let entries = native.active_method_entries(&host.settings, block_index);
    let entry = entries
        .iter()
        .find(|entry| entry.descriptor_offset == descriptor_offset)
        .ok_or_else(|| {
            VmError::MethodNotFound(format!(
                "no active native method at offset {descriptor_offset}"
            ))
        })?;
    let method = entry.method;

    let frame_flags = engine
        .current_context()
        .map(|c| c.call_flags())
        .unwrap_or(CallFlags::NONE);
    if !frame_flags.contains(method.required_flags) {
        return Err(VmError::PermissionDenied(format!(
            "{}::{} requires {:?}",
            native.name, method.name, method.required_flags
        )));
    }

    host.add_gas(method.cpu_fee * host.exec_fee_factor)?;
    if method.storage_fee > 0 {
        host.add_gas(method.storage_fee * host.storage_price)?;
    }

    let mut args = Vec::with_capacity(method.parameters as usize);
    for _ in 0..method.parameters {
        args.push(engine.pop()?);
    }
    // Pops surface the deepest-pushed argument last.
    args.reverse();

    let result = (method.handler)(host, engine, args)?;
    if let Some(item) = result {
        engine.push(item)?;
    }
    Ok(())
}

/// CALLT: dispatches through the current NEF's method-token table.
pub fn call_token(host: &mut EngineHost, engine: &mut ExecutionEngine, token_index: u16) -> VmResult<()> {
    // The CALLT opcode price was charged by the step loop.
    let current_hash = host.current_script_hash()?;
    let contract = host
        .get_contract(&current_hash)?
        .ok_or_else(|| VmError::ContractNotFound("CALLT outside a deployed contract".into()))?;
    let token = contract
        .nef
        .tokens
        .get(token_index as usize)
        .cloned()
        .ok_or_else(|| {
            VmError::out_of_range(format!(
                "method token {token_index} out of range {}",
                contract.nef.tokens.len()
            ))
        })?;

    let mut args = Vec::with_capacity(token.parameters_count as usize);
    for _ in 0..token.parameters_count {
        args.push(engine.pop()?);
    }
    args.reverse();

    call_contract(
        host,
        engine,
        &token.hash,
        &token.method,
        token.call_flags,
        args,
    )
}

pub fn get_call_flags(_host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let flags = engine
        .current_context()
        .map(|c| c.call_flags())
        .unwrap_or(CallFlags::NONE);
    engine.push(StackItem::from_int(i64::from(flags.bits())))
}

/// The single-signature verification script for a public key.
pub fn standard_account_script(public_key: &[u8]) -> Vec<u8> {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_bytes(public_key);
    builder.emit_syscall(interop_service::syscall_hash("System.Crypto.CheckSig"));
    builder.into_bytes()
}

/// The m-of-n verification script for a key set.
pub fn multisig_account_script(m: usize, public_keys: &[Vec<u8>]) -> VmResult<Vec<u8>> {
    if m == 0 || m > public_keys.len() || public_keys.len() > 1024 {
        return Err(VmError::invalid_argument(format!(
            "invalid multisig arity {m}-of-{}",
            public_keys.len()
        )));
    }
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(m as i64);
    for key in public_keys {
        builder.emit_push_bytes(key);
    }
    builder.emit_push_int(public_keys.len() as i64);
    builder.emit_syscall(interop_service::syscall_hash("System.Crypto.CheckMultisig"));
    Ok(builder.into_bytes())
}

pub fn create_standard_account(_host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let public_key = engine.pop()?.as_bytes()?;
    if public_key.len() != 33 {
        return Err(VmError::invalid_argument(format!(
            "public key must be 33 bytes, got {}",
            public_key.len()
        )));
    }
    let script = standard_account_script(&public_key);
    engine.push(StackItem::from_byte_string(hash160(&script).to_vec()))
}

pub fn create_multisig_account(_host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let m = engine.pop_int()?;
    let m = m
        .to_usize()
        .ok_or_else(|| VmError::invalid_argument("negative signature threshold"))?;
    let keys_item = engine.pop()?;
    let StackItem::Array(keys) = &keys_item else {
        return Err(keys_item.type_mismatch("Array"));
    };
    let keys: Vec<Vec<u8>> = keys
        .borrow()
        .iter()
        .map(|k| k.as_bytes())
        .collect::<VmResult<_>>()?;
    for key in &keys {
        if key.len() != 33 {
            return Err(VmError::invalid_argument("public keys must be 33 bytes"));
        }
    }
    let script = multisig_account_script(m, &keys)?;
    engine.push(StackItem::from_byte_string(hash160(&script).to_vec()))
}

pub fn native_on_persist(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    if host.trigger != TriggerType::OnPersist {
        return Err(VmError::invalid_operation(
            "NativeOnPersist requires the OnPersist trigger",
        ));
    }
    native::registry().on_persist(host, engine)
}

pub fn native_post_persist(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    if host.trigger != TriggerType::PostPersist {
        return Err(VmError::invalid_operation(
            "NativePostPersist requires the PostPersist trigger",
        ));
    }
    native::registry().post_persist(host, engine)
}
