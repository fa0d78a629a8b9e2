//! The syscall registry.
//!
//! Every syscall is identified by the low 32 bits of murmur32 over its
//! name. The registry is a static table; dispatch checks, in order:
//! existence, hardfork activation, call-flag subset, gas, then the handler.

use crate::application_engine::{
    contract_syscalls, crypto_syscalls, iterator_syscalls, runtime_syscalls, storage_syscalls,
    EngineHost,
};
use neo_core::Hardfork;
use neo_cryptography::murmur32;
use neo_vm::{CallFlags, ExecutionEngine, VmError, VmResult};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// A registered syscall.
pub struct InteropDescriptor {
    pub name: &'static str,
    /// Base price in datoshi, scaled by the execution fee factor.
    pub price: i64,
    pub required_flags: CallFlags,
    pub active_in: Option<Hardfork>,
    pub deprecated_in: Option<Hardfork>,
    pub handler: SyscallHandler,
}

/// A syscall implementation.
pub type SyscallHandler = fn(&mut EngineHost, &mut ExecutionEngine) -> VmResult<()>;

/// The syscall id: murmur32 of the ASCII name with seed zero.
pub fn syscall_hash(name: &str) -> u32 {
    murmur32(name.as_bytes(), 0)
}

macro_rules! descriptor {
    ($name:literal, $price:expr, $flags:expr, $handler:path) => {
        descriptor!($name, $price, $flags, $handler, None, None)
    };
    ($name:literal, $price:expr, $flags:expr, $handler:path, $active:expr, $deprecated:expr) => {
        InteropDescriptor {
            name: $name,
            price: $price,
            required_flags: $flags,
            active_in: $active,
            deprecated_in: $deprecated,
            handler: $handler,
        }
    };
}

static REGISTRY: Lazy<HashMap<u32, InteropDescriptor>> = Lazy::new(|| {
    let descriptors = vec![
        // System.Runtime.*
        descriptor!("System.Runtime.Platform", 1 << 3, CallFlags::NONE, runtime_syscalls::platform),
        descriptor!("System.Runtime.GetNetwork", 1 << 3, CallFlags::NONE, runtime_syscalls::get_network),
        descriptor!("System.Runtime.GetAddressVersion", 1 << 3, CallFlags::NONE, runtime_syscalls::get_address_version),
        descriptor!("System.Runtime.GetTrigger", 1 << 3, CallFlags::NONE, runtime_syscalls::get_trigger),
        descriptor!("System.Runtime.GetTime", 1 << 3, CallFlags::NONE, runtime_syscalls::get_time),
        descriptor!("System.Runtime.GetScriptContainer", 1 << 3, CallFlags::NONE, runtime_syscalls::get_script_container),
        descriptor!("System.Runtime.GetExecutingScriptHash", 1 << 4, CallFlags::NONE, runtime_syscalls::get_executing_script_hash),
        descriptor!("System.Runtime.GetCallingScriptHash", 1 << 4, CallFlags::NONE, runtime_syscalls::get_calling_script_hash),
        descriptor!("System.Runtime.GetEntryScriptHash", 1 << 4, CallFlags::NONE, runtime_syscalls::get_entry_script_hash),
        descriptor!("System.Runtime.LoadScript", 1 << 15, CallFlags::ALLOW_CALL, runtime_syscalls::load_script),
        descriptor!("System.Runtime.CheckWitness", 1 << 10, CallFlags::NONE, runtime_syscalls::check_witness),
        descriptor!("System.Runtime.GetInvocationCounter", 1 << 4, CallFlags::NONE, runtime_syscalls::get_invocation_counter),
        descriptor!("System.Runtime.GetRandom", 0, CallFlags::NONE, runtime_syscalls::get_random),
        descriptor!("System.Runtime.Log", 1 << 15, CallFlags::ALLOW_NOTIFY, runtime_syscalls::log),
        descriptor!("System.Runtime.Notify", 1 << 15, CallFlags::ALLOW_NOTIFY, runtime_syscalls::notify),
        descriptor!("System.Runtime.GetNotifications", 1 << 12, CallFlags::NONE, runtime_syscalls::get_notifications),
        descriptor!("System.Runtime.GasLeft", 1 << 4, CallFlags::NONE, runtime_syscalls::gas_left),
        descriptor!("System.Runtime.BurnGas", 1 << 4, CallFlags::NONE, runtime_syscalls::burn_gas),
        descriptor!(
            "System.Runtime.CurrentSigners",
            1 << 4,
            CallFlags::NONE,
            runtime_syscalls::current_signers,
            Some(Hardfork::Echidna),
            None
        ),
        // System.Storage.*
        descriptor!("System.Storage.GetContext", 1 << 4, CallFlags::READ_STATES, storage_syscalls::get_context),
        descriptor!("System.Storage.GetReadOnlyContext", 1 << 4, CallFlags::READ_STATES, storage_syscalls::get_read_only_context),
        descriptor!("System.Storage.AsReadOnly", 1 << 4, CallFlags::READ_STATES, storage_syscalls::as_read_only),
        descriptor!("System.Storage.Get", 1 << 15, CallFlags::READ_STATES, storage_syscalls::get),
        descriptor!("System.Storage.Put", 1 << 15, CallFlags::WRITE_STATES, storage_syscalls::put),
        descriptor!("System.Storage.Delete", 1 << 15, CallFlags::WRITE_STATES, storage_syscalls::delete),
        descriptor!("System.Storage.Find", 1 << 15, CallFlags::READ_STATES, storage_syscalls::find),
        descriptor!(
            "System.Storage.Local.GetContext",
            1 << 4,
            CallFlags::READ_STATES,
            storage_syscalls::get_context,
            Some(Hardfork::Echidna),
            None
        ),
        descriptor!(
            "System.Storage.Local.GetReadOnlyContext",
            1 << 4,
            CallFlags::READ_STATES,
            storage_syscalls::get_read_only_context,
            Some(Hardfork::Echidna),
            None
        ),
        // System.Contract.*
        descriptor!(
            "System.Contract.Call",
            1 << 15,
            CallFlags::READ_STATES.union(CallFlags::ALLOW_CALL),
            contract_syscalls::call
        ),
        descriptor!("System.Contract.CallNative", 0, CallFlags::NONE, contract_syscalls::call_native),
        descriptor!("System.Contract.GetCallFlags", 1 << 10, CallFlags::NONE, contract_syscalls::get_call_flags),
        descriptor!("System.Contract.CreateStandardAccount", 1 << 8, CallFlags::NONE, contract_syscalls::create_standard_account),
        descriptor!("System.Contract.CreateMultisigAccount", 1 << 8, CallFlags::NONE, contract_syscalls::create_multisig_account),
        descriptor!("System.Contract.NativeOnPersist", 0, CallFlags::STATES, contract_syscalls::native_on_persist),
        descriptor!("System.Contract.NativePostPersist", 0, CallFlags::STATES, contract_syscalls::native_post_persist),
        // System.Crypto.*
        descriptor!("System.Crypto.CheckSig", 1 << 15, CallFlags::NONE, crypto_syscalls::check_sig),
        descriptor!("System.Crypto.CheckMultisig", 0, CallFlags::NONE, crypto_syscalls::check_multisig),
        // System.Iterator.*
        descriptor!("System.Iterator.Next", 1 << 15, CallFlags::NONE, iterator_syscalls::next),
        descriptor!("System.Iterator.Value", 1 << 4, CallFlags::NONE, iterator_syscalls::value),
    ];
    descriptors
        .into_iter()
        .map(|descriptor| (syscall_hash(descriptor.name), descriptor))
        .collect()
});

/// Looks up a descriptor by syscall id.
pub fn descriptor(id: u32) -> Option<&'static InteropDescriptor> {
    REGISTRY.get(&id)
}

/// Looks up a descriptor by name.
pub fn descriptor_by_name(name: &str) -> Option<&'static InteropDescriptor> {
    REGISTRY.get(&syscall_hash(name))
}

/// Full dispatch: lookup, hardfork gate, call-flag subset, gas, handler.
pub fn invoke(host: &mut EngineHost, engine: &mut ExecutionEngine, id: u32) -> VmResult<()> {
    let descriptor = descriptor(id)
        .ok_or_else(|| VmError::invalid_operation(format!("unknown syscall {id:#010x}")))?;

    if let Some(hardfork) = descriptor.active_in {
        if !host.is_hardfork_enabled(hardfork) {
            return Err(VmError::InactiveMethod(format!(
                "{} activates at {:?}",
                descriptor.name, hardfork
            )));
        }
    }
    if let Some(hardfork) = descriptor.deprecated_in {
        if host.is_hardfork_enabled(hardfork) {
            return Err(VmError::InactiveMethod(format!(
                "{} deprecated at {:?}",
                descriptor.name, hardfork
            )));
        }
    }

    let frame_flags = engine
        .current_context()
        .map(|c| c.call_flags())
        .unwrap_or(CallFlags::NONE);
    if !frame_flags.contains(descriptor.required_flags) {
        return Err(VmError::PermissionDenied(format!(
            "{} requires flags {:?}, frame has {:?}",
            descriptor.name, descriptor.required_flags, frame_flags
        )));
    }

    host.add_gas(descriptor.price * host.exec_fee_factor)?;
    (descriptor.handler)(host, engine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_murmur_of_names() {
        let id = syscall_hash("System.Runtime.Platform");
        assert_eq!(descriptor(id).unwrap().name, "System.Runtime.Platform");
        assert!(descriptor_by_name("System.Contract.Call").is_some());
        assert!(descriptor_by_name("System.Nope").is_none());
    }

    #[test]
    fn distinct_names_have_distinct_ids() {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        for descriptor in REGISTRY.values() {
            assert!(seen.insert(syscall_hash(descriptor.name)));
        }
    }

    #[test]
    fn hardfork_gates_are_recorded() {
        let signers = descriptor_by_name("System.Runtime.CurrentSigners").unwrap();
        assert_eq!(signers.active_in, Some(Hardfork::Echidna));
        let call = descriptor_by_name("System.Contract.Call").unwrap();
        assert!(call.active_in.is_none());
    }
}
