//! System.Runtime.* syscall handlers.

use super::{EngineHost, ScriptContainer};
use neo_core::UInt160;
use neo_cryptography::hash160;
use neo_vm::{CallFlags, ExecutionEngine, Script, StackItem, VmError, VmResult};

/// The platform name every Neo node reports.
pub const PLATFORM: &str = "NEO";

fn push(engine: &mut ExecutionEngine, item: StackItem) -> VmResult<()> {
    engine.push(item)
}

pub fn platform(_host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    push(engine, StackItem::from_byte_string(PLATFORM.as_bytes().to_vec()))
}

pub fn get_network(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    push(engine, StackItem::from_int(i64::from(host.settings.network)))
}

pub fn get_address_version(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    push(
        engine,
        StackItem::from_int(i64::from(host.settings.address_version)),
    )
}

pub fn get_trigger(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    push(engine, StackItem::from_int(i64::from(host.trigger.as_byte())))
}

pub fn get_time(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let timestamp = host.block_timestamp()?;
    push(engine, StackItem::from_int(timestamp as i64))
}

pub fn get_script_container(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    match &host.container {
        ScriptContainer::None => Err(VmError::invalid_operation("no script container")),
        ScriptContainer::Transaction(tx) => {
            // The projection scripts consume: [hash, version, nonce,
            // sender, sysfee, netfee, validuntil, script].
            let item = StackItem::from_array(vec![
                StackItem::from_byte_string(tx.hash().to_vec()),
                StackItem::from_int(i64::from(tx.version)),
                StackItem::from_int(i64::from(tx.nonce)),
                StackItem::from_byte_string(tx.sender().to_vec()),
                StackItem::from_int(tx.system_fee),
                StackItem::from_int(tx.network_fee),
                StackItem::from_int(i64::from(tx.valid_until_block)),
                StackItem::from_byte_string(tx.script.clone()),
            ]);
            push(engine, item)
        }
        ScriptContainer::Block(block) => {
            let header = &block.header;
            let item = StackItem::from_array(vec![
                StackItem::from_byte_string(block.hash().to_vec()),
                StackItem::from_int(i64::from(header.version)),
                StackItem::from_byte_string(header.prev_hash.to_vec()),
                StackItem::from_byte_string(header.merkle_root.to_vec()),
                StackItem::from_int(header.timestamp as i64),
                StackItem::from_int(header.nonce as i64),
                StackItem::from_int(i64::from(header.index)),
                StackItem::from_int(i64::from(header.primary_index)),
                StackItem::from_byte_string(header.next_consensus.to_vec()),
                StackItem::from_int(block.transactions.len() as i64),
            ]);
            push(engine, item)
        }
    }
}

pub fn get_executing_script_hash(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let hash = host.current_script_hash()?;
    push(engine, StackItem::from_byte_string(hash.to_vec()))
}

pub fn get_calling_script_hash(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let hash = host.calling_script_hash()?;
    push(engine, StackItem::from_byte_string(hash.to_vec()))
}

pub fn get_entry_script_hash(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let hash = host.entry_script_hash()?;
    push(engine, StackItem::from_byte_string(hash.to_vec()))
}

/// Loads a dynamic script as a new frame with narrowed call flags.
pub fn load_script(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let script_bytes = engine.pop()?.as_bytes()?;
    let flag_bits = engine.pop_int()?;
    let args = engine.pop()?;
    let StackItem::Array(args) = args else {
        return Err(args.type_mismatch("Array"));
    };
    let flag_bits = num_traits::ToPrimitive::to_u8(&flag_bits)
        .ok_or_else(|| VmError::invalid_argument("call flags out of range"))?;
    let flags = CallFlags::from_bits(flag_bits)
        .ok_or_else(|| VmError::invalid_argument("undefined call flags"))?;

    let caller_flags = engine
        .current_context()
        .map(|c| c.call_flags())
        .unwrap_or(CallFlags::NONE);
    let effective = flags.intersection(caller_flags);

    let script_hash = UInt160::from(hash160(&script_bytes));
    let calling = host.current_script_hash()?;
    let args = args.borrow().clone();
    super::contract_syscalls::load_frame(
        host,
        engine,
        Script::new(script_bytes),
        0,
        -1,
        script_hash,
        Some(calling),
        effective,
        args,
        false,
    )
}

pub fn check_witness(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let hash_bytes = engine.pop()?.as_bytes()?;
    let result = match hash_bytes.len() {
        20 => {
            let hash = UInt160::from_bytes(&hash_bytes)
                .map_err(|e| VmError::invalid_argument(e.to_string()))?;
            host.check_witness(&hash)?
        }
        33 => {
            // A public key witnesses through its signature contract.
            let script = super::contract_syscalls::standard_account_script(&hash_bytes);
            host.check_witness(&UInt160::from(hash160(&script)))?
        }
        other => {
            return Err(VmError::BadScriptHash {
                expected: 20,
                actual: other,
            })
        }
    };
    push(engine, StackItem::from_bool(result))
}

pub fn get_invocation_counter(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let hash = host.current_script_hash()?;
    let counter = host.invocation_counter(&hash);
    push(engine, StackItem::from_int(i64::from(counter)))
}

pub fn get_random(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let value = host.next_random();
    push(engine, StackItem::Integer(value))
}

pub fn log(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let message = engine.pop()?.as_string()?;
    if message.len() > 1024 {
        return Err(VmError::invalid_argument("log message exceeds 1024 bytes"));
    }
    let hash = host.current_script_hash()?;
    host.log(hash, message);
    Ok(())
}

pub fn notify(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let event_name = engine.pop()?.as_string()?;
    let state = engine.pop()?;
    let StackItem::Array(state) = state else {
        return Err(state.type_mismatch("Array"));
    };
    // The payload must survive the VM boundary.
    let state = state.borrow().clone();
    for item in &state {
        crate::binary_serializer::serialize(item, crate::binary_serializer::DEFAULT_MAX_SIZE)
            .map_err(|e| VmError::invalid_argument(e.to_string()))?;
    }
    let hash = host.current_script_hash()?;
    host.notify(hash, event_name, state)
}

pub fn get_notifications(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let filter = engine.pop()?;
    let filter_hash = if filter.is_null() {
        None
    } else {
        let bytes = filter.as_bytes()?;
        Some(
            UInt160::from_bytes(&bytes)
                .map_err(|_| VmError::BadScriptHash {
                    expected: 20,
                    actual: bytes.len(),
                })?,
        )
    };
    let mut entries = Vec::new();
    for notification in &host.notifications {
        if let Some(filter) = &filter_hash {
            if notification.script_hash != *filter {
                continue;
            }
        }
        entries.push(StackItem::from_array(vec![
            StackItem::from_byte_string(notification.script_hash.to_vec()),
            StackItem::from_byte_string(notification.event_name.as_bytes().to_vec()),
            StackItem::from_array(notification.state.clone()),
        ]));
    }
    push(engine, StackItem::from_array(entries))
}

pub fn gas_left(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    push(engine, StackItem::from_int(host.gas_left()))
}

pub fn burn_gas(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    let amount = engine.pop_int()?;
    let amount = num_traits::ToPrimitive::to_i64(&amount)
        .filter(|a| *a > 0)
        .ok_or_else(|| VmError::invalid_argument("GAS must be positive"))?;
    host.add_gas(amount)
}

pub fn current_signers(host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
    match host.container.as_transaction() {
        Some(tx) => {
            let signers: Vec<StackItem> = tx
                .signers
                .iter()
                .map(|signer| {
                    StackItem::from_array(vec![
                        StackItem::from_byte_string(signer.account.to_vec()),
                        StackItem::from_int(i64::from(signer.scopes.bits())),
                    ])
                })
                .collect();
            push(engine, StackItem::from_array(signers))
        }
        None => push(engine, StackItem::Null),
    }
}
