//! The application engine: gas metering, frames, syscall routing.
//!
//! The engine owns a bare NeoVM plus the host state the protocol layers on
//! top of it. Each inter-contract call gets its own frame with a cloned
//! snapshot layer and a notification checkpoint; a faulting callee is
//! rolled back and surfaces to the caller as a catchable throw at the call
//! site. ABORT and gas exhaustion are never catchable.

pub mod contract_syscalls;
pub mod crypto_syscalls;
pub mod iterator_syscalls;
pub mod runtime_syscalls;
pub mod storage_syscalls;

use crate::contract_state::ContractState;
use crate::interop_service;
use crate::native;
use crate::storage::StorageKey;
use crate::trigger::TriggerType;
use neo_core::{Block, ProtocolSettings, Transaction, UInt160, UInt256, WitnessScope};
use neo_cryptography::{hash160, hash256};
use neo_persistence::{DataCache, SeekDirection};
use neo_vm::error::VmErrorKind;
use neo_vm::execution_engine::ExecutionHost;
use neo_vm::{
    CallFlags, ExecutionEngine, Instruction, Script, StackItem, VMState, VmError, VmResult,
};
use std::collections::HashMap;
use tracing::debug;

/// Fallback execution fee factor when the Policy contract has no value.
pub const DEFAULT_EXEC_FEE_FACTOR: i64 = 30;
/// Fallback price per storage byte, in datoshi.
pub const DEFAULT_STORAGE_PRICE: i64 = 100_000;
/// Maximum notifications retained per execution.
pub const MAX_NOTIFICATION_COUNT: usize = 512;
/// Maximum size of a notification event name.
pub const MAX_EVENT_NAME: usize = 32;

/// What the execution runs on behalf of.
#[derive(Debug, Clone, Default)]
pub enum ScriptContainer {
    #[default]
    None,
    Transaction(Transaction),
    Block(Block),
}

impl ScriptContainer {
    /// The container hash, when one exists.
    pub fn hash(&self) -> Option<UInt256> {
        match self {
            ScriptContainer::None => None,
            ScriptContainer::Transaction(tx) => Some(tx.hash()),
            ScriptContainer::Block(block) => Some(block.hash()),
        }
    }

    /// The transaction, when the container is one.
    pub fn as_transaction(&self) -> Option<&Transaction> {
        match self {
            ScriptContainer::Transaction(tx) => Some(tx),
            _ => None,
        }
    }
}

/// One emitted notification.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub script_hash: UInt160,
    pub event_name: String,
    pub state: Vec<StackItem>,
}

/// One emitted log line.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub script_hash: UInt160,
    pub message: String,
}

/// Host bookkeeping for one contract boundary on the invocation stack.
#[derive(Debug)]
pub struct ContractFrame {
    /// Invocation-stack depth of this frame's root context.
    pub base_depth: usize,
    /// Copy-on-write state layer for this call.
    pub snapshot: DataCache,
    /// Notifications emitted before this frame began.
    pub notification_checkpoint: usize,
    pub script_hash: UInt160,
    pub calling_hash: Option<UInt160>,
    /// Native stub frames charge no opcode gas.
    pub is_native: bool,
}

/// The host half of the application engine.
pub struct EngineHost {
    pub trigger: TriggerType,
    pub settings: ProtocolSettings,
    pub container: ScriptContainer,
    pub persisting_block: Option<Block>,
    gas_consumed: i64,
    gas_limit: i64,
    pub exec_fee_factor: i64,
    pub storage_price: i64,
    pub frames: Vec<ContractFrame>,
    pub notifications: Vec<NotificationEvent>,
    pub logs: Vec<LogEvent>,
    invocation_counters: HashMap<UInt160, u32>,
    random_state: Vec<u8>,
}

impl EngineHost {
    /// Gas consumed so far, in datoshi.
    pub fn gas_consumed(&self) -> i64 {
        self.gas_consumed
    }

    /// The configured gas limit.
    pub fn gas_limit(&self) -> i64 {
        self.gas_limit
    }

    /// Charges `amount` datoshi; exceeding the limit is a fault no TRY can
    /// catch.
    pub fn add_gas(&mut self, amount: i64) -> VmResult<()> {
        if amount < 0 {
            return Err(VmError::invalid_argument("negative gas amount"));
        }
        self.gas_consumed = self
            .gas_consumed
            .checked_add(amount)
            .ok_or(VmError::OutOfGas)?;
        if self.gas_limit >= 0 && self.gas_consumed > self.gas_limit {
            return Err(VmError::OutOfGas);
        }
        Ok(())
    }

    /// Remaining gas, or -1 when unlimited.
    pub fn gas_left(&self) -> i64 {
        if self.gas_limit < 0 {
            -1
        } else {
            self.gas_limit - self.gas_consumed
        }
    }

    /// The current frame.
    pub fn current_frame(&self) -> VmResult<&ContractFrame> {
        self.frames
            .last()
            .ok_or_else(|| VmError::invalid_operation("no active contract frame"))
    }

    /// The current frame, mutable.
    pub fn current_frame_mut(&mut self) -> VmResult<&mut ContractFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| VmError::invalid_operation("no active contract frame"))
    }

    /// The executing contract's hash.
    pub fn current_script_hash(&self) -> VmResult<UInt160> {
        Ok(self.current_frame()?.script_hash)
    }

    /// The immediate caller's hash (the entry hash at top level).
    pub fn calling_script_hash(&self) -> VmResult<UInt160> {
        let frame = self.current_frame()?;
        Ok(frame.calling_hash.unwrap_or(frame.script_hash))
    }

    /// The entry script hash.
    pub fn entry_script_hash(&self) -> VmResult<UInt160> {
        self.frames
            .first()
            .map(|f| f.script_hash)
            .ok_or_else(|| VmError::invalid_operation("no active contract frame"))
    }

    /// The live snapshot layer.
    pub fn snapshot(&self) -> VmResult<&DataCache> {
        Ok(&self.current_frame()?.snapshot)
    }

    /// The live snapshot layer, mutable.
    pub fn snapshot_mut(&mut self) -> VmResult<&mut DataCache> {
        Ok(&mut self.current_frame_mut()?.snapshot)
    }

    /// Point read of a contract storage entry.
    pub fn storage_get(&self, id: i32, key: &[u8]) -> VmResult<Option<Vec<u8>>> {
        Ok(self
            .snapshot()?
            .get(&StorageKey::new(id, key.to_vec()).to_bytes()))
    }

    /// Write of a contract storage entry (no gas accounting).
    pub fn storage_put(&mut self, id: i32, key: &[u8], value: &[u8]) -> VmResult<()> {
        let flat = StorageKey::new(id, key.to_vec()).to_bytes();
        self.snapshot_mut()?.put(&flat, value);
        Ok(())
    }

    /// Delete of a contract storage entry.
    pub fn storage_delete(&mut self, id: i32, key: &[u8]) -> VmResult<()> {
        let flat = StorageKey::new(id, key.to_vec()).to_bytes();
        self.snapshot_mut()?.delete(&flat);
        Ok(())
    }

    /// Prefix scan of a contract's storage.
    pub fn storage_find(
        &self,
        id: i32,
        prefix: &[u8],
        direction: SeekDirection,
    ) -> VmResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut flat_prefix = StorageKey::contract_prefix(id);
        flat_prefix.extend_from_slice(prefix);
        Ok(self
            .snapshot()?
            .find(&flat_prefix, direction)
            .into_iter()
            .map(|(key, value)| (key[4..].to_vec(), value))
            .collect())
    }

    /// Looks up a deployed or native contract by hash.
    pub fn get_contract(&self, hash: &UInt160) -> VmResult<Option<ContractState>> {
        if let Some(native) = native::registry().by_hash(hash) {
            let block_index = self.block_index();
            if !native.is_active(&self.settings, block_index) {
                return Ok(None);
            }
            return Ok(Some(native.contract_state(&self.settings, block_index)));
        }
        native::contract_management::get_contract(self, hash)
    }

    /// The persisting block index (0 outside block context).
    pub fn block_index(&self) -> u32 {
        self.persisting_block.as_ref().map(|b| b.index()).unwrap_or(0)
    }

    /// The persisting block timestamp in milliseconds.
    pub fn block_timestamp(&self) -> VmResult<u64> {
        self.persisting_block
            .as_ref()
            .map(|b| b.header.timestamp)
            .ok_or_else(|| VmError::invalid_operation("GetTime needs a persisting block"))
    }

    /// Whether `hardfork` is active at the current height.
    pub fn is_hardfork_enabled(&self, hardfork: neo_core::Hardfork) -> bool {
        self.settings.is_hardfork_enabled(hardfork, self.block_index())
    }

    /// Records a notification.
    pub fn notify(
        &mut self,
        script_hash: UInt160,
        event_name: String,
        state: Vec<StackItem>,
    ) -> VmResult<()> {
        if event_name.len() > MAX_EVENT_NAME {
            return Err(VmError::invalid_argument(format!(
                "event name exceeds {MAX_EVENT_NAME} bytes"
            )));
        }
        if self.notifications.len() >= MAX_NOTIFICATION_COUNT {
            return Err(VmError::LimitExceeded {
                what: "notifications",
                value: self.notifications.len() + 1,
                limit: MAX_NOTIFICATION_COUNT,
            });
        }
        self.notifications.push(NotificationEvent {
            script_hash,
            event_name,
            state,
        });
        Ok(())
    }

    /// Records a log line.
    pub fn log(&mut self, script_hash: UInt160, message: String) {
        debug!(contract = %script_hash, %message, "contract log");
        self.logs.push(LogEvent {
            script_hash,
            message,
        });
    }

    /// Bumps and returns the per-contract invocation counter.
    pub fn next_invocation_counter(&mut self, hash: &UInt160) -> u32 {
        let counter = self.invocation_counters.entry(*hash).or_insert(0);
        *counter += 1;
        *counter
    }

    /// The current invocation count of a contract (at least 1 while it
    /// executes).
    pub fn invocation_counter(&self, hash: &UInt160) -> u32 {
        self.invocation_counters.get(hash).copied().unwrap_or(1).max(1)
    }

    /// Deterministic per-call randomness derived from the container and
    /// network, re-hashed on every call.
    pub fn next_random(&mut self) -> num_bigint::BigInt {
        let digest = hash256(&self.random_state);
        self.random_state = digest.to_vec();
        num_bigint::BigInt::from_bytes_le(num_bigint::Sign::Plus, &digest[..16])
    }

    /// Checks whether `hash` has witnessed this execution under the signer
    /// scoping rules.
    pub fn check_witness(&self, hash: &UInt160) -> VmResult<bool> {
        // Calling scripts may always vouch for themselves.
        if let Ok(calling) = self.calling_script_hash() {
            if calling == *hash {
                return Ok(true);
            }
        }
        let Some(tx) = self.container.as_transaction() else {
            return Ok(false);
        };
        let Some(signer) = tx.signers.iter().find(|s| s.account == *hash) else {
            return Ok(false);
        };
        let current = self.current_script_hash()?;
        let calling = self.calling_script_hash()?;
        let entry = self.entry_script_hash()?;

        if signer.scopes.contains(WitnessScope::GLOBAL) {
            return Ok(true);
        }
        if signer.scopes.contains(WitnessScope::CALLED_BY_ENTRY)
            && (calling == entry || current == entry)
        {
            return Ok(true);
        }
        if signer.scopes.contains(WitnessScope::CUSTOM_CONTRACTS)
            && signer.allowed_contracts.contains(&current)
        {
            return Ok(true);
        }
        if signer.scopes.contains(WitnessScope::CUSTOM_GROUPS) {
            let groups = self.manifest_groups(&current)?;
            if signer
                .allowed_groups
                .iter()
                .any(|allowed| groups.iter().any(|g| g == allowed))
            {
                return Ok(true);
            }
        }
        if signer.scopes.contains(WitnessScope::WITNESS_RULES) {
            let current_groups = self.manifest_groups(&current)?;
            let calling_groups = self.manifest_groups(&calling)?;
            let ctx = neo_core::witness_rule::WitnessMatchContext {
                current,
                calling,
                entry,
                current_groups: &current_groups,
                calling_groups: &calling_groups,
                container: self.container.hash(),
            };
            for rule in &signer.rules {
                if rule.condition.matches(&ctx) {
                    return Ok(matches!(
                        rule.action,
                        neo_core::WitnessRuleAction::Allow
                    ));
                }
            }
        }
        Ok(false)
    }

    fn manifest_groups(&self, hash: &UInt160) -> VmResult<Vec<Vec<u8>>> {
        Ok(self
            .get_contract(hash)?
            .map(|c| c.manifest.group_keys())
            .unwrap_or_default())
    }

    /// Whether the committee has witnessed this execution.
    pub fn check_committee(&self) -> VmResult<bool> {
        let committee = native::neo_token::committee_address(self)?;
        self.check_witness(&committee)
    }
}

impl ExecutionHost for EngineHost {
    fn pre_instruction(
        &mut self,
        _engine: &mut ExecutionEngine,
        instruction: &Instruction,
    ) -> VmResult<()> {
        // Native stubs execute at the methods' CPU fee alone.
        if self.frames.last().map(|f| f.is_native).unwrap_or(false) {
            return Ok(());
        }
        self.add_gas(instruction.opcode().price() * self.exec_fee_factor)
    }

    fn on_syscall(&mut self, engine: &mut ExecutionEngine, id: u32) -> VmResult<()> {
        interop_service::invoke(self, engine, id)
    }

    fn on_call_token(&mut self, engine: &mut ExecutionEngine, token: u16) -> VmResult<()> {
        contract_syscalls::call_token(self, engine, token)
    }
}

/// A labeled projection of a result-stack item for receipts.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StackItemProjection {
    #[serde(rename = "type")]
    pub item_type: String,
    pub value: String,
}

impl StackItemProjection {
    /// Projects one item.
    pub fn of(item: &StackItem) -> StackItemProjection {
        StackItemProjection {
            item_type: item.item_type().name().to_string(),
            value: item.display_value(),
        }
    }
}

/// What an execution produced.
#[derive(Debug)]
pub struct ExecutionResult {
    pub state: VMState,
    pub gas_consumed: i64,
    /// Top-first result stack projections.
    pub stack: Vec<StackItemProjection>,
    pub notifications: Vec<NotificationEvent>,
    pub logs: Vec<LogEvent>,
    pub exception: Option<String>,
}

/// The host layer wrapping a NeoVM instance.
pub struct ApplicationEngine {
    vm: ExecutionEngine,
    host: EngineHost,
}

impl ApplicationEngine {
    /// Creates an engine over a cloned layer of `snapshot`; the caller's
    /// cache is untouched until [`ApplicationEngine::finish`] commits.
    pub fn new(
        trigger: TriggerType,
        container: ScriptContainer,
        snapshot: &DataCache,
        persisting_block: Option<Block>,
        settings: ProtocolSettings,
        gas_limit: i64,
    ) -> ApplicationEngine {
        let mut random_state = Vec::with_capacity(44);
        random_state.extend_from_slice(&settings.network.to_le_bytes());
        if let Some(block) = &persisting_block {
            random_state.extend_from_slice(&block.header.nonce.to_le_bytes());
        }
        if let Some(hash) = container.hash() {
            random_state.extend_from_slice(hash.as_bytes());
        }
        let exec_fee_factor =
            native::policy_contract::exec_fee_factor_of(snapshot).unwrap_or(DEFAULT_EXEC_FEE_FACTOR);
        let storage_price =
            native::policy_contract::storage_price_of(snapshot).unwrap_or(DEFAULT_STORAGE_PRICE);
        ApplicationEngine {
            vm: ExecutionEngine::new(),
            host: EngineHost {
                trigger,
                settings,
                container,
                persisting_block,
                gas_consumed: 0,
                gas_limit,
                exec_fee_factor,
                storage_price,
                frames: vec![ContractFrame {
                    base_depth: 0,
                    snapshot: snapshot.clone_cache(),
                    notification_checkpoint: 0,
                    script_hash: UInt160::ZERO,
                    calling_hash: None,
                    is_native: false,
                }],
                notifications: Vec::new(),
                logs: Vec::new(),
                invocation_counters: HashMap::new(),
                random_state,
            },
        }
    }

    /// The wrapped VM.
    pub fn vm(&self) -> &ExecutionEngine {
        &self.vm
    }

    /// The wrapped VM, mutable.
    pub fn vm_mut(&mut self) -> &mut ExecutionEngine {
        &mut self.vm
    }

    /// The host state.
    pub fn host(&self) -> &EngineHost {
        &self.host
    }

    /// The host state, mutable.
    pub fn host_mut(&mut self) -> &mut EngineHost {
        &mut self.host
    }

    /// Loads the entry script. Its hash identifies the entry frame.
    pub fn load_entry_script(&mut self, script: Vec<u8>, call_flags: CallFlags) -> VmResult<()> {
        let script_hash = UInt160::from(hash160(&script));
        self.vm.load_script(Script::new(script), -1, 0)?;
        let context = self
            .vm
            .current_context_mut()
            .ok_or_else(|| VmError::invalid_operation("entry context missing"))?;
        context.set_call_flags(call_flags);
        let base_frame = self
            .host
            .frames
            .first_mut()
            .expect("engine always has a base frame");
        base_frame.base_depth = 1;
        base_frame.script_hash = script_hash;
        self.host.next_invocation_counter(&script_hash);
        Ok(())
    }

    /// Runs to completion.
    pub fn execute(&mut self) -> VMState {
        if self.vm.state() == VMState::BREAK {
            self.vm.set_state(VMState::NONE);
        }
        while self.vm.state() != VMState::HALT && self.vm.state() != VMState::FAULT {
            match self.vm.execute_next(&mut self.host) {
                Ok(()) => self.reconcile_frames(),
                Err(error) => {
                    self.reconcile_frames();
                    if self.should_convert_to_throw(&error) {
                        self.convert_fault_to_throw(error);
                    } else {
                        self.vm.on_fault(error);
                    }
                }
            }
        }
        if self.vm.state() == VMState::FAULT {
            // Discard every call layer; the caller's snapshot is pristine.
            self.host.frames.truncate(1);
        }
        self.vm.state()
    }

    /// A callee contract's fault becomes a catchable throw at the call
    /// site; ABORT and gas exhaustion always fault the whole engine.
    fn should_convert_to_throw(&self, error: &VmError) -> bool {
        if self.host.frames.len() <= 1 {
            return false;
        }
        !matches!(error.kind(), VmErrorKind::OutOfGas | VmErrorKind::Abort)
    }

    fn convert_fault_to_throw(&mut self, error: VmError) {
        // Pop the faulting frame's contexts, discard its effects, then
        // rethrow at the caller's call site.
        let frame = self.host.frames.pop().expect("frames checked above");
        while self.vm.invocation_stack().len() >= frame.base_depth {
            self.vm.discard_context();
        }
        self.host.notifications.truncate(frame.notification_checkpoint);

        let message = StackItem::from_byte_string(error.to_string().into_bytes());
        if let Err(uncaught) = self.vm.execute_throw(message) {
            self.vm.on_fault(uncaught);
        }
        self.reconcile_frames();
    }

    /// Folds finished contract frames back into their parents after each
    /// step: RET merges the snapshot layer, exceptional unwinds discard it
    /// along with the frame's notifications.
    fn reconcile_frames(&mut self) {
        for event in self.vm.take_unload_events() {
            while self.host.frames.len() > 1 {
                let frame_depth = self
                    .host
                    .frames
                    .last()
                    .map(|f| f.base_depth)
                    .unwrap_or(0);
                if frame_depth != event.depth_before_pop {
                    break;
                }
                let frame = self.host.frames.pop().expect("frame present");
                if event.exceptional {
                    self.host
                        .notifications
                        .truncate(frame.notification_checkpoint);
                } else {
                    let parent = self
                        .host
                        .frames
                        .last_mut()
                        .expect("parent frame present");
                    parent.snapshot.merge(frame.snapshot);
                }
            }
        }
    }

    /// Finishes the run: projects results and, on HALT, merges the surviving
    /// layer back into `target`.
    pub fn finish(mut self, target: Option<&mut DataCache>) -> ExecutionResult {
        let state = self.vm.state();
        let stack: Vec<StackItemProjection> = self
            .vm
            .result_stack()
            .items()
            .iter()
            .rev()
            .map(StackItemProjection::of)
            .collect();
        let exception = self
            .vm
            .fault_reason()
            .map(|e| e.to_string())
            .or_else(|| self.vm.uncaught_exception().map(|i| i.display_value()));
        if state == VMState::HALT {
            if let Some(target) = target {
                let base = self.host.frames.swap_remove(0);
                target.merge(base.snapshot);
            }
        }
        ExecutionResult {
            state,
            gas_consumed: self.host.gas_consumed,
            stack,
            notifications: self.host.notifications,
            logs: self.host.logs,
            exception: if state == VMState::FAULT {
                exception
            } else {
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_persistence::{MemoryStore, Store};
    use neo_vm::{OpCode, ScriptBuilder};

    fn engine_for(script: Vec<u8>) -> ApplicationEngine {
        let snapshot = DataCache::new(MemoryStore::shared());
        let mut engine = ApplicationEngine::new(
            TriggerType::Application,
            ScriptContainer::None,
            &snapshot,
            None,
            ProtocolSettings::default_with_magic(0x4E454F00),
            1_000_000_000,
        );
        engine.load_entry_script(script, CallFlags::ALL).unwrap();
        engine
    }

    #[test]
    fn charges_gas_per_opcode() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(3);
        builder.emit_push_int(5);
        builder.emit(OpCode::ADD);
        let mut engine = engine_for(builder.into_bytes());
        assert_eq!(engine.execute(), VMState::HALT);
        let expected = (OpCode::PUSH3.price() + OpCode::PUSH5.price() + OpCode::ADD.price())
            * DEFAULT_EXEC_FEE_FACTOR;
        assert_eq!(engine.host().gas_consumed(), expected);
    }

    #[test]
    fn gas_limit_faults_with_out_of_gas() {
        let mut builder = ScriptBuilder::new();
        for _ in 0..100 {
            builder.emit_push_int(1);
            builder.emit(OpCode::DROP);
        }
        let snapshot = DataCache::new(MemoryStore::shared());
        let mut engine = ApplicationEngine::new(
            TriggerType::Application,
            ScriptContainer::None,
            &snapshot,
            None,
            ProtocolSettings::default(),
            10,
        );
        engine
            .load_entry_script(builder.into_bytes(), CallFlags::ALL)
            .unwrap();
        assert_eq!(engine.execute(), VMState::FAULT);
        assert_eq!(
            engine.vm().fault_reason().unwrap().kind(),
            VmErrorKind::OutOfGas
        );
    }

    #[test]
    fn fault_leaves_target_snapshot_untouched() {
        let store = MemoryStore::shared();
        store.put(b"sentinel", b"1");
        let mut target = DataCache::new(store);
        let mut engine = ApplicationEngine::new(
            TriggerType::Application,
            ScriptContainer::None,
            &target,
            None,
            ProtocolSettings::default(),
            1_000_000,
        );
        engine
            .load_entry_script(vec![OpCode::ABORT as u8], CallFlags::ALL)
            .unwrap();
        assert_eq!(engine.execute(), VMState::FAULT);
        let result = engine.finish(Some(&mut target));
        assert_eq!(result.state, VMState::FAULT);
        assert!(result.exception.is_some());
        assert_eq!(target.pending_changes(), 0);
    }
}
