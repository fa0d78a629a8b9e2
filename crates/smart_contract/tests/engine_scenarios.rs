//! Application-engine end-to-end scenarios.

use neo_core::{ProtocolSettings, Signer, Transaction, UInt160, Witness};
use neo_persistence::{DataCache, MemoryStore};
use neo_smart_contract::application_engine::{ApplicationEngine, ScriptContainer};
use neo_smart_contract::contract_state::{ContractState, NefFile};
use neo_smart_contract::interop_service;
use neo_smart_contract::manifest::{
    ContractManifest, ContractMethodDescriptor, ContractPermission, WildcardContainer,
};
use neo_smart_contract::native;
use neo_smart_contract::storage::StorageKey;
use neo_smart_contract::trigger::TriggerType;
use neo_vm::error::VmErrorKind;
use neo_vm::{CallFlags, OpCode, ScriptBuilder, VMState};

fn settings() -> ProtocolSettings {
    ProtocolSettings::default_with_magic(0x334F454E)
}

fn fresh_snapshot() -> DataCache {
    let mut snapshot = DataCache::new(MemoryStore::shared());
    native::policy_contract::initialize(&mut snapshot);
    snapshot
}

fn engine_with_container(
    snapshot: &DataCache,
    container: ScriptContainer,
    script: Vec<u8>,
) -> ApplicationEngine {
    let mut engine = ApplicationEngine::new(
        TriggerType::Application,
        container,
        snapshot,
        None,
        settings(),
        1_000_000_000,
    );
    engine.load_entry_script(script, CallFlags::ALL).unwrap();
    engine
}

fn run_script(snapshot: &DataCache, script: Vec<u8>) -> (VMState, ApplicationEngine) {
    let mut engine = engine_with_container(snapshot, ScriptContainer::None, script);
    let state = engine.execute();
    (state, engine)
}

/// Installs a deployed contract directly into the snapshot.
fn install_contract(snapshot: &mut DataCache, state: &ContractState) {
    let mut key = vec![native::contract_management::PREFIX_CONTRACT];
    key.extend_from_slice(state.hash.as_bytes());
    snapshot.put(
        &StorageKey::new(native::contract_management::ID, key).to_bytes(),
        &state.to_storage_bytes().unwrap(),
    );
}

fn method(name: &str, parameters: usize, offset: u32, return_type: &str) -> ContractMethodDescriptor {
    ContractMethodDescriptor {
        name: name.into(),
        parameters: (0..parameters)
            .map(|i| neo_smart_contract::manifest::ContractParameterDefinition {
                name: format!("arg{i}"),
                parameter_type: "Any".into(),
            })
            .collect(),
        return_type: return_type.into(),
        offset,
        safe: true,
    }
}

/// A deployed contract whose `answer` method pushes 42.
fn answer_contract(id: i32, permissions: Vec<ContractPermission>) -> ContractState {
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(42);
    builder.emit(OpCode::RET);
    let nef = NefFile::new("test-compiler", builder.into_bytes()).unwrap();
    let mut manifest = ContractManifest::new(&format!("answer{id}"));
    manifest.abi.methods.push(method("answer", 0, 0, "Integer"));
    manifest.permissions = permissions;
    let hash = ContractState::compute_hash(&UInt160::from([id as u8; 20]), nef.checksum, &manifest.name);
    ContractState {
        id,
        update_counter: 0,
        hash,
        nef,
        manifest,
    }
}

fn call_script(target: &UInt160, method_name: &str) -> Vec<u8> {
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::NEWARRAY0); // args
    builder.emit_push_int(i64::from(CallFlags::ALL.bits()));
    builder.emit_push_string(method_name);
    builder.emit_push_bytes(target.as_bytes());
    builder.emit_syscall(interop_service::syscall_hash("System.Contract.Call"));
    builder.into_bytes()
}

#[test]
fn native_symbol_via_contract_call() {
    let snapshot = fresh_snapshot();
    let gas_hash = native::gas_token::hash();
    let (state, engine) = run_script(&snapshot, call_script(&gas_hash, "symbol"));
    assert_eq!(state, VMState::HALT);
    let result = engine.finish(None);
    assert_eq!(result.stack[0].value, "0x474153"); // "GAS"
}

#[test]
fn deployed_contract_call_returns_result() {
    let mut snapshot = fresh_snapshot();
    let contract = answer_contract(10, vec![ContractPermission::allow_all()]);
    install_contract(&mut snapshot, &contract);
    let (state, engine) = run_script(&snapshot, call_script(&contract.hash, "answer"));
    assert_eq!(state, VMState::HALT);
    let result = engine.finish(None);
    assert_eq!(result.stack[0].value, "42");
}

#[test]
fn cross_call_permission_denied() {
    // Contract A's manifest excludes B; A calling B.answer faults at the
    // call site and B's script never runs.
    let mut snapshot = fresh_snapshot();
    let b = answer_contract(11, vec![ContractPermission::allow_all()]);
    // A's only permission targets an unrelated hash.
    let unrelated = UInt160::from([0xEEu8; 20]);
    let mut a = answer_contract(12, vec![ContractPermission {
        contract: unrelated.to_string(),
        methods: WildcardContainer::Wildcard,
    }]);
    // A's script calls B.answer.
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::NEWARRAY0);
    builder.emit_push_int(i64::from(CallFlags::ALL.bits()));
    builder.emit_push_string("answer");
    builder.emit_push_bytes(b.hash.as_bytes());
    builder.emit_syscall(interop_service::syscall_hash("System.Contract.Call"));
    a.nef = NefFile::new("test-compiler", builder.into_bytes()).unwrap();
    a.manifest.abi.methods = vec![method("go", 0, 0, "Any")];
    install_contract(&mut snapshot, &a);
    install_contract(&mut snapshot, &b);

    let (state, engine) = run_script(&snapshot, call_script(&a.hash, "go"));
    assert_eq!(state, VMState::FAULT);
    let reason = engine.vm().fault_reason().unwrap().to_string();
    assert!(reason.contains("may not call"), "got: {reason}");
}

#[test]
fn callee_fault_is_catchable_by_caller() {
    // Entry script TRYs around a call into a contract that aborts with a
    // stack underflow; the catch block recovers.
    let mut snapshot = fresh_snapshot();
    let mut faulty = answer_contract(13, vec![ContractPermission::allow_all()]);
    faulty.nef = NefFile::new("test-compiler", vec![OpCode::DROP as u8, OpCode::RET as u8]).unwrap();
    faulty.manifest.abi.methods = vec![method("boom", 0, 0, "Any")];
    install_contract(&mut snapshot, &faulty);

    // TRY with catch; offsets computed against the assembled layout.
    let call = call_script(&faulty.hash, "boom");
    let catch_offset = (3 + call.len() + 2) as u8; // past TRY, call, ENDTRY
    let mut script = vec![OpCode::TRY as u8, catch_offset, 0];
    script.extend_from_slice(&call);
    script.extend_from_slice(&[OpCode::ENDTRY as u8, 4]);
    script.push(OpCode::DROP as u8); // catch: drop the exception item
    script.push(OpCode::PUSH7 as u8);
    script.push(OpCode::RET as u8);
    let (state, engine) = run_script(&snapshot, script);
    assert_eq!(state, VMState::HALT);
    let result = engine.finish(None);
    assert_eq!(result.stack[0].value, "7");
}

#[test]
fn storage_put_rolls_back_on_fault() {
    // A deployed contract writes then aborts: the target snapshot stays
    // unchanged.
    let mut snapshot = fresh_snapshot();
    let mut writer = answer_contract(14, vec![ContractPermission::allow_all()]);
    let mut builder = ScriptBuilder::new();
    // Put pops context, key, value from the top down.
    builder.emit_push_bytes(b"v");
    builder.emit_push_bytes(b"k");
    builder.emit_syscall(interop_service::syscall_hash("System.Storage.GetContext"));
    builder.emit_syscall(interop_service::syscall_hash("System.Storage.Put"));
    builder.emit(OpCode::ABORT);
    writer.nef = NefFile::new("test-compiler", builder.into_bytes()).unwrap();
    writer.manifest.abi.methods = vec![method("write", 0, 0, "Void")];
    install_contract(&mut snapshot, &writer);

    let pending_before = snapshot.pending_changes();
    let (state, engine) = run_script(&snapshot, call_script(&writer.hash, "write"));
    assert_eq!(state, VMState::FAULT);
    let mut target = snapshot.clone_cache();
    engine.finish(Some(&mut target));
    assert_eq!(target.pending_changes(), pending_before);
}

#[test]
fn check_witness_honors_signer_scopes() {
    let snapshot = fresh_snapshot();
    let account = UInt160::from([5u8; 20]);
    let tx = Transaction {
        nonce: 9,
        valid_until_block: 10,
        signers: vec![Signer::called_by_entry(account)],
        script: vec![OpCode::RET as u8],
        witnesses: vec![Witness::default()],
        ..Transaction::default()
    };

    let mut builder = ScriptBuilder::new();
    builder.emit_push_bytes(account.as_bytes());
    builder.emit_syscall(interop_service::syscall_hash("System.Runtime.CheckWitness"));
    let mut engine = engine_with_container(
        &snapshot,
        ScriptContainer::Transaction(tx),
        builder.into_bytes(),
    );
    assert_eq!(engine.execute(), VMState::HALT);
    let result = engine.finish(None);
    assert_eq!(result.stack[0].value, "true");

    // A non-signer account does not witness.
    let other = UInt160::from([6u8; 20]);
    let tx = Transaction {
        nonce: 9,
        valid_until_block: 10,
        signers: vec![Signer::called_by_entry(account)],
        script: vec![OpCode::RET as u8],
        witnesses: vec![Witness::default()],
        ..Transaction::default()
    };
    let mut builder = ScriptBuilder::new();
    builder.emit_push_bytes(other.as_bytes());
    builder.emit_syscall(interop_service::syscall_hash("System.Runtime.CheckWitness"));
    let mut engine = engine_with_container(
        &snapshot,
        ScriptContainer::Transaction(tx),
        builder.into_bytes(),
    );
    assert_eq!(engine.execute(), VMState::HALT);
    let result = engine.finish(None);
    assert_eq!(result.stack[0].value, "false");
}

#[test]
fn unknown_syscall_faults() {
    let snapshot = fresh_snapshot();
    let mut builder = ScriptBuilder::new();
    builder.emit_syscall(0xDEAD_BEEF);
    let (state, engine) = run_script(&snapshot, builder.into_bytes());
    assert_eq!(state, VMState::FAULT);
    assert_eq!(
        engine.vm().fault_reason().unwrap().kind(),
        VmErrorKind::InvalidOperation
    );
}

#[test]
fn storage_round_trip_through_syscalls() {
    let mut snapshot = fresh_snapshot();
    let mut keeper = answer_contract(15, vec![ContractPermission::allow_all()]);
    let mut builder = ScriptBuilder::new();
    // Put k=v then Get k and return it.
    builder.emit_push_bytes(b"v");
    builder.emit_push_bytes(b"k");
    builder.emit_syscall(interop_service::syscall_hash("System.Storage.GetContext"));
    builder.emit_syscall(interop_service::syscall_hash("System.Storage.Put"));
    builder.emit_push_bytes(b"k");
    builder.emit_syscall(interop_service::syscall_hash("System.Storage.GetContext"));
    builder.emit_syscall(interop_service::syscall_hash("System.Storage.Get"));
    builder.emit(OpCode::RET);
    keeper.nef = NefFile::new("test-compiler", builder.into_bytes()).unwrap();
    keeper.manifest.abi.methods = vec![method("roundtrip", 0, 0, "ByteArray")];
    install_contract(&mut snapshot, &keeper);

    let (state, engine) = run_script(&snapshot, call_script(&keeper.hash, "roundtrip"));
    assert_eq!(state, VMState::HALT);
    let result = engine.finish(None);
    assert_eq!(result.stack[0].value, "0x76"); // "v"
}

#[test]
fn policy_defaults_and_live_values_are_distinct() {
    // Defaults first.
    let snapshot = fresh_snapshot();
    let policy = native::registry().by_name("PolicyContract").unwrap().hash;
    let (state, engine) = run_script(&snapshot, call_script(&policy, "getFeePerByte"));
    assert_eq!(state, VMState::HALT);
    assert_eq!(engine.finish(None).stack[0].value, "1000");

    // Live value: with no committee configured the committee address
    // degrades to zero, so a zero-account signer carries governance.
    let snapshot = fresh_snapshot();
    let committee_signer = Signer::global(UInt160::ZERO);
    let tx = Transaction {
        nonce: 1,
        valid_until_block: 10,
        signers: vec![committee_signer],
        script: vec![OpCode::RET as u8],
        witnesses: vec![Witness::default()],
        ..Transaction::default()
    };
    let mut builder = ScriptBuilder::new();
    // setFeePerByte(2000)
    builder.emit_push_int(2000);
    builder.emit_push_int(1);
    builder.emit(OpCode::PACK);
    builder.emit_push_int(i64::from(CallFlags::ALL.bits()));
    builder.emit_push_string("setFeePerByte");
    builder.emit_push_bytes(policy.as_bytes());
    builder.emit_syscall(interop_service::syscall_hash("System.Contract.Call"));
    // getFeePerByte()
    builder.emit(OpCode::NEWARRAY0);
    builder.emit_push_int(i64::from(CallFlags::ALL.bits()));
    builder.emit_push_string("getFeePerByte");
    builder.emit_push_bytes(policy.as_bytes());
    builder.emit_syscall(interop_service::syscall_hash("System.Contract.Call"));
    let mut engine = engine_with_container(
        &snapshot,
        ScriptContainer::Transaction(tx),
        builder.into_bytes(),
    );
    assert_eq!(engine.execute(), VMState::HALT);
    let result = engine.finish(None);
    assert_eq!(result.stack[0].value, "2000");
}

#[test]
fn gas_left_decreases() {
    let snapshot = fresh_snapshot();
    let mut builder = ScriptBuilder::new();
    builder.emit_syscall(interop_service::syscall_hash("System.Runtime.GasLeft"));
    let (state, engine) = run_script(&snapshot, builder.into_bytes());
    assert_eq!(state, VMState::HALT);
    let result = engine.finish(None);
    let left: i64 = result.stack[0].value.parse().unwrap();
    assert!(left > 0 && left < 1_000_000_000);
}
