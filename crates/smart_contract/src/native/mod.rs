//! The native contract framework and the eleven protocol contracts.
//!
//! A native contract is a static table of method metadata plus handlers.
//! Its hash derives from its name; its manifest is synthesized per block
//! height by filtering methods and events through their hardfork gates.
//! Dispatch runs through the 7-byte stub script (`PUSH0 SYSCALL CallNative
//! RET`) repeated once per active method.

pub mod contract_management;
pub mod crypto_lib;
pub mod gas_token;
pub mod ledger;
pub mod neo_token;
pub mod notary;
pub mod oracle_contract;
pub mod policy_contract;
pub mod role_management;
pub mod std_lib;
pub mod treasury;

use crate::application_engine::EngineHost;
use crate::contract_state::{ContractState, NefFile};
use crate::interop_service;
use crate::manifest::{
    ContractAbi, ContractEventDescriptor, ContractManifest, ContractMethodDescriptor,
    ContractParameterDefinition, ContractPermission, WildcardContainer,
};
use neo_core::{Hardfork, ProtocolSettings, UInt160};
use neo_cryptography::hash160;
use neo_vm::{CallFlags, ExecutionEngine, OpCode, Script, ScriptBuilder, StackItem, VmError, VmResult};
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Bytes of one native stub: PUSH0, SYSCALL, 4-byte id, RET.
pub const NATIVE_STUB_SIZE: usize = 7;

/// A native method implementation.
pub type NativeHandler =
    fn(&mut EngineHost, &mut ExecutionEngine, Vec<StackItem>) -> VmResult<Option<StackItem>>;

/// A block-persist hook.
pub type PersistHandler = fn(&mut EngineHost, &mut ExecutionEngine) -> VmResult<()>;

/// Metadata for one native method.
pub struct NativeMethod {
    pub name: &'static str,
    pub parameters: u8,
    /// ABI parameter names and types, for the synthesized manifest.
    pub parameter_defs: &'static [(&'static str, &'static str)],
    pub return_type: &'static str,
    /// CPU fee in datoshi, scaled by the execution fee factor.
    pub cpu_fee: i64,
    /// Storage fee in bytes, scaled by the storage price.
    pub storage_fee: i64,
    pub required_flags: CallFlags,
    pub active_in: Option<Hardfork>,
    pub deprecated_in: Option<Hardfork>,
    pub handler: NativeHandler,
}

impl NativeMethod {
    /// Safe methods need at most read access.
    pub fn is_safe(&self) -> bool {
        CallFlags::READ_ONLY.contains(self.required_flags)
    }

    fn is_active(&self, settings: &ProtocolSettings, block_index: u32) -> bool {
        if let Some(hardfork) = self.active_in {
            if !settings.is_hardfork_enabled(hardfork, block_index) {
                return false;
            }
        }
        if let Some(hardfork) = self.deprecated_in {
            if settings.is_hardfork_enabled(hardfork, block_index) {
                return false;
            }
        }
        true
    }
}

/// Metadata for one native event.
pub struct NativeEvent {
    pub name: &'static str,
    pub parameters: &'static [(&'static str, &'static str)],
    pub active_in: Option<Hardfork>,
    pub deprecated_in: Option<Hardfork>,
}

/// One native contract.
pub struct NativeContract {
    pub id: i32,
    pub name: &'static str,
    pub hash: UInt160,
    pub active_in: Option<Hardfork>,
    pub supported_standards: &'static [&'static str],
    /// Sorted by (name, parameter count); descriptor offsets follow this
    /// order in stub-size steps.
    pub methods: Vec<NativeMethod>,
    pub events: Vec<NativeEvent>,
    pub on_persist: Option<PersistHandler>,
    pub post_persist: Option<PersistHandler>,
}

/// An active method with its stub offsets.
pub struct ActiveMethodEntry<'a> {
    pub descriptor_offset: usize,
    pub method: &'a NativeMethod,
}

impl NativeContract {
    /// Whether the contract exists at the given height.
    pub fn is_active(&self, settings: &ProtocolSettings, block_index: u32) -> bool {
        match self.active_in {
            None => true,
            Some(hardfork) => settings.is_hardfork_enabled(hardfork, block_index),
        }
    }

    /// The methods active at a height, with their descriptor offsets.
    pub fn active_method_entries(
        &self,
        settings: &ProtocolSettings,
        block_index: u32,
    ) -> Vec<ActiveMethodEntry<'_>> {
        let mut entries = Vec::new();
        let mut offset = 0usize;
        for method in &self.methods {
            if !method.is_active(settings, block_index) {
                continue;
            }
            entries.push(ActiveMethodEntry {
                descriptor_offset: offset,
                method,
            });
            offset += NATIVE_STUB_SIZE;
        }
        entries
    }

    /// Finds an active method by name and parameter count.
    pub fn active_method(
        &self,
        settings: &ProtocolSettings,
        block_index: u32,
        name: &str,
        parameters: usize,
    ) -> Option<&NativeMethod> {
        self.active_method_entries(settings, block_index)
            .into_iter()
            .map(|entry| entry.method)
            .find(|method| method.name == name && method.parameters as usize == parameters)
    }

    /// The number of activation events (creation plus gated changes)
    /// crossed up to `block_index`.
    fn update_counter(&self, settings: &ProtocolSettings, block_index: u32) -> u16 {
        let creation_height = match self.active_in {
            None => 0,
            Some(hardfork) => match settings.hardfork_height(hardfork) {
                Some(height) if height <= block_index => height,
                _ => return 0,
            },
        };
        let mut heights = std::collections::BTreeSet::new();
        heights.insert(creation_height);
        let mut used = Vec::new();
        used.extend(self.active_in);
        for method in &self.methods {
            used.extend(method.active_in);
            used.extend(method.deprecated_in);
        }
        for event in &self.events {
            used.extend(event.active_in);
            used.extend(event.deprecated_in);
        }
        for hardfork in used {
            if let Some(height) = settings.hardfork_height(hardfork) {
                if height >= creation_height && height <= block_index {
                    heights.insert(height);
                }
            }
        }
        (heights.len() - 1) as u16
    }

    /// The synthesized contract state at a height.
    pub fn contract_state(&self, settings: &ProtocolSettings, block_index: u32) -> ContractState {
        let entries = self.active_method_entries(settings, block_index);
        let methods = entries
            .iter()
            .map(|entry| ContractMethodDescriptor {
                name: entry.method.name.to_string(),
                parameters: entry
                    .method
                    .parameter_defs
                    .iter()
                    .map(|(name, ty)| ContractParameterDefinition {
                        name: name.to_string(),
                        parameter_type: ty.to_string(),
                    })
                    .collect(),
                return_type: entry.method.return_type.to_string(),
                offset: entry.descriptor_offset as u32,
                safe: entry.method.is_safe(),
            })
            .collect();
        let events = self
            .events
            .iter()
            .filter(|event| {
                let active = event
                    .active_in
                    .map(|hf| settings.is_hardfork_enabled(hf, block_index))
                    .unwrap_or(true);
                let deprecated = event
                    .deprecated_in
                    .map(|hf| settings.is_hardfork_enabled(hf, block_index))
                    .unwrap_or(false);
                active && !deprecated
            })
            .map(|event| ContractEventDescriptor {
                name: event.name.to_string(),
                parameters: event
                    .parameters
                    .iter()
                    .map(|(name, ty)| ContractParameterDefinition {
                        name: name.to_string(),
                        parameter_type: ty.to_string(),
                    })
                    .collect(),
            })
            .collect();

        let manifest = ContractManifest {
            name: self.name.to_string(),
            groups: Vec::new(),
            features: serde_json::Value::Object(serde_json::Map::new()),
            supported_standards: self
                .supported_standards
                .iter()
                .map(|s| s.to_string())
                .collect(),
            abi: ContractAbi { methods, events },
            permissions: vec![ContractPermission::allow_all()],
            trusts: WildcardContainer::Wildcard,
            extra: serde_json::Value::Null,
        };

        let stub = registry().stub_script(self.id, entries.len());
        let nef = NefFile::new("neo-core-v3.9", stub.as_bytes().to_vec())
            .expect("native stub NEF construction cannot fail");

        ContractState {
            id: self.id,
            update_counter: self.update_counter(settings, block_index),
            hash: self.hash,
            nef,
            manifest,
        }
    }
}

/// Computes a native contract's hash from its name.
pub fn native_hash(name: &str) -> UInt160 {
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::ABORT);
    builder.emit_push_bytes(&[0u8; 20]);
    builder.emit_push_int(0);
    builder.emit_push_string(name);
    UInt160::from(hash160(builder.as_bytes()))
}

/// The registry of all native contracts.
pub struct NativeRegistry {
    contracts: Vec<NativeContract>,
    by_hash: HashMap<UInt160, usize>,
    by_id: HashMap<i32, usize>,
}

impl NativeRegistry {
    fn new() -> NativeRegistry {
        let contracts = vec![
            contract_management::contract(),
            std_lib::contract(),
            crypto_lib::contract(),
            ledger::contract(),
            neo_token::contract(),
            gas_token::contract(),
            policy_contract::contract(),
            role_management::contract(),
            oracle_contract::contract(),
            notary::contract(),
            treasury::contract(),
        ];
        let by_hash = contracts
            .iter()
            .enumerate()
            .map(|(index, contract)| (contract.hash, index))
            .collect();
        let by_id = contracts
            .iter()
            .enumerate()
            .map(|(index, contract)| (contract.id, index))
            .collect();
        NativeRegistry {
            contracts,
            by_hash,
            by_id,
        }
    }

    /// All native contracts.
    pub fn contracts(&self) -> &[NativeContract] {
        &self.contracts
    }

    /// Lookup by script hash.
    pub fn by_hash(&self, hash: &UInt160) -> Option<&NativeContract> {
        self.by_hash.get(hash).map(|index| &self.contracts[*index])
    }

    /// Lookup by contract id.
    pub fn by_id(&self, id: i32) -> Option<&NativeContract> {
        self.by_id.get(&id).map(|index| &self.contracts[*index])
    }

    /// Lookup by name.
    pub fn by_name(&self, name: &str) -> Option<&NativeContract> {
        self.contracts.iter().find(|c| c.name == name)
    }

    /// The stub script for a native: one 7-byte unit per active method.
    /// The id parameter exists only to keep per-contract stubs distinct
    /// in diagnostics; the bytes are identical across natives.
    pub fn stub_script(&self, _id: i32, active_methods: usize) -> Script {
        static STUB_UNIT: Lazy<Vec<u8>> = Lazy::new(|| {
            let mut unit = Vec::with_capacity(NATIVE_STUB_SIZE);
            unit.push(OpCode::PUSH0 as u8);
            unit.push(OpCode::SYSCALL as u8);
            unit.extend_from_slice(
                &interop_service::syscall_hash("System.Contract.CallNative").to_le_bytes(),
            );
            unit.push(OpCode::RET as u8);
            unit
        });
        let mut script = Vec::with_capacity(NATIVE_STUB_SIZE * active_methods.max(1));
        for _ in 0..active_methods.max(1) {
            script.extend_from_slice(&STUB_UNIT);
        }
        Script::new(script)
    }

    /// Runs every active native's OnPersist hook.
    pub fn on_persist(&self, host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
        let block_index = host.block_index();
        for contract in &self.contracts {
            if !contract.is_active(&host.settings, block_index) {
                continue;
            }
            if let Some(hook) = contract.on_persist {
                hook(host, engine)?;
            }
        }
        Ok(())
    }

    /// Runs every active native's PostPersist hook.
    pub fn post_persist(&self, host: &mut EngineHost, engine: &mut ExecutionEngine) -> VmResult<()> {
        let block_index = host.block_index();
        for contract in &self.contracts {
            if !contract.is_active(&host.settings, block_index) {
                continue;
            }
            if let Some(hook) = contract.post_persist {
                hook(host, engine)?;
            }
        }
        Ok(())
    }
}

static REGISTRY: Lazy<NativeRegistry> = Lazy::new(NativeRegistry::new);

/// The global native registry.
pub fn registry() -> &'static NativeRegistry {
    &REGISTRY
}

// Argument marshalling helpers shared by the native method handlers.

/// A 160-bit hash argument.
pub fn arg_uint160(args: &[StackItem], index: usize) -> VmResult<UInt160> {
    let bytes = arg(args, index)?.as_bytes()?;
    UInt160::from_bytes(&bytes).map_err(|_| VmError::BadScriptHash {
        expected: 20,
        actual: bytes.len(),
    })
}

/// A 256-bit hash argument.
pub fn arg_uint256(args: &[StackItem], index: usize) -> VmResult<neo_core::UInt256> {
    let bytes = arg(args, index)?.as_bytes()?;
    neo_core::UInt256::from_bytes(&bytes).map_err(|_| VmError::BadScriptHash {
        expected: 32,
        actual: bytes.len(),
    })
}

/// A raw argument.
pub fn arg(args: &[StackItem], index: usize) -> VmResult<&StackItem> {
    args.get(index)
        .ok_or_else(|| VmError::invalid_argument(format!("missing argument {index}")))
}

/// An integer argument.
pub fn arg_int(args: &[StackItem], index: usize) -> VmResult<BigInt> {
    arg(args, index)?.as_int()
}

/// An i64 argument.
pub fn arg_i64(args: &[StackItem], index: usize) -> VmResult<i64> {
    arg_int(args, index)?
        .to_i64()
        .ok_or_else(|| VmError::invalid_argument(format!("argument {index} out of i64 range")))
}

/// A byte-span argument.
pub fn arg_bytes(args: &[StackItem], index: usize) -> VmResult<Vec<u8>> {
    arg(args, index)?.as_bytes()
}

/// A UTF-8 string argument.
pub fn arg_string(args: &[StackItem], index: usize) -> VmResult<String> {
    arg(args, index)?.as_string()
}

/// A boolean argument.
pub fn arg_bool(args: &[StackItem], index: usize) -> VmResult<bool> {
    arg(args, index)?.as_bool()
}

/// An array argument, cloned out of its interior.
pub fn arg_array(args: &[StackItem], index: usize) -> VmResult<Vec<StackItem>> {
    let item = arg(args, index)?;
    match item {
        StackItem::Array(array) => Ok(array.borrow().clone()),
        StackItem::Struct(structure) => Ok(structure.borrow().clone()),
        other => Err(other.type_mismatch("Array")),
    }
}

/// Requires a committee witness, the gate on governance mutations.
pub fn require_committee(host: &EngineHost) -> VmResult<()> {
    if !host.check_committee()? {
        return Err(VmError::PermissionDenied(
            "committee signature required".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eleven_natives_with_fixed_ids() {
        let registry = registry();
        assert_eq!(registry.contracts().len(), 11);
        let expected = [
            ("ContractManagement", -1),
            ("StdLib", -2),
            ("CryptoLib", -3),
            ("LedgerContract", -4),
            ("NeoToken", -5),
            ("GasToken", -6),
            ("PolicyContract", -7),
            ("RoleManagement", -8),
            ("OracleContract", -9),
            ("Notary", -10),
            ("Treasury", -11),
        ];
        for (name, id) in expected {
            let contract = registry.by_name(name).unwrap_or_else(|| panic!("{name}"));
            assert_eq!(contract.id, id, "{name}");
            assert_eq!(registry.by_id(id).unwrap().name, name);
            assert_eq!(contract.hash, native_hash(name));
        }
    }

    #[test]
    fn methods_are_sorted_for_stable_offsets() {
        for contract in registry().contracts() {
            let names: Vec<(&str, u8)> = contract
                .methods
                .iter()
                .map(|m| (m.name, m.parameters))
                .collect();
            let mut sorted = names.clone();
            sorted.sort();
            assert_eq!(names, sorted, "{} methods out of order", contract.name);
        }
    }

    #[test]
    fn gated_natives_activate_with_their_hardfork() {
        let settings = ProtocolSettings::mainnet();
        let notary = registry().by_name("Notary").unwrap();
        assert!(!notary.is_active(&settings, 0));
        let echidna = settings.hardfork_height(Hardfork::Echidna).unwrap();
        assert!(notary.is_active(&settings, echidna));
        let treasury = registry().by_name("Treasury").unwrap();
        assert_eq!(treasury.active_in, Some(Hardfork::Faun));
    }

    #[test]
    fn stub_scripts_have_stub_granularity() {
        let stub = registry().stub_script(-2, 3);
        assert_eq!(stub.len(), 3 * NATIVE_STUB_SIZE);
        assert_eq!(stub.as_bytes()[0], OpCode::PUSH0 as u8);
        assert_eq!(stub.as_bytes()[NATIVE_STUB_SIZE - 1], OpCode::RET as u8);
    }
}
