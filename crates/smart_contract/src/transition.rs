//! State transition entry point.
//!
//! Takes an initial allocation, a block environment and a transaction
//! list; runs OnPersist, every transaction, then PostPersist; emits
//! per-transaction receipts and the post-state allocation. Faulting
//! transactions produce FAULT receipts without touching state; strict
//! mode stops at the first malformed transaction.

use crate::application_engine::{
    ApplicationEngine, NotificationEvent, ScriptContainer, StackItemProjection,
};
use crate::interop_service;
use crate::native;
use crate::storage::StorageKey;
use crate::trigger::TriggerType;
use crate::{ContractError, ContractResult};
use neo_core::{Block, BlockHeader, ProtocolSettings, Transaction, UInt160};
use neo_persistence::{DataCache, MemoryStore, SeekDirection};
use neo_vm::{ScriptBuilder, VMState};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Initial or final balances of one account, in indivisible units.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountAlloc {
    #[serde(default)]
    pub gas: i64,
    #[serde(default)]
    pub neo: i64,
}

/// The allocation document: `0x…` script hashes to balances.
pub type Alloc = BTreeMap<String, AccountAlloc>;

/// The block environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Env {
    pub index: u32,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub nonce: u64,
    pub primary_index: u8,
    pub network: u32,
}

/// One per-transaction receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: String,
    pub vm_state: String,
    pub gas_consumed: i64,
    pub stack: Vec<StackItemProjection>,
    pub notifications: Vec<ReceiptNotification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

/// A notification flattened for the receipt document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptNotification {
    pub contract: String,
    pub event_name: String,
    pub state: Vec<StackItemProjection>,
}

fn project_notifications(notifications: &[NotificationEvent]) -> Vec<ReceiptNotification> {
    notifications
        .iter()
        .map(|event| ReceiptNotification {
            contract: event.script_hash.to_string(),
            event_name: event.event_name.clone(),
            state: event.state.iter().map(StackItemProjection::of).collect(),
        })
        .collect()
}

/// The transition outcome.
#[derive(Debug)]
pub struct TransitionResult {
    pub receipts: Vec<Receipt>,
    pub post_state: Alloc,
    pub block_hash: String,
}

/// Seeds genesis state: policy defaults and the allocation balances.
pub fn seed_alloc(snapshot: &mut DataCache, alloc: &Alloc) -> ContractResult<()> {
    native::policy_contract::initialize(snapshot);
    for (address, account) in alloc {
        let hash = UInt160::from_hex(address)
            .map_err(|e| ContractError::InvalidContract(format!("alloc key {address}: {e}")))?;
        if account.gas > 0 {
            native::gas_token::initialize(snapshot, &hash, account.gas);
        }
        if account.neo > 0 {
            native::neo_token::initialize(snapshot, &hash, account.neo);
        }
    }
    Ok(())
}

fn dump_balances(snapshot: &DataCache) -> Alloc {
    let mut alloc: Alloc = BTreeMap::new();
    let gas_prefix = {
        let mut prefix = StorageKey::contract_prefix(native::gas_token::ID);
        prefix.push(native::gas_token::PREFIX_ACCOUNT);
        prefix
    };
    for (key, value) in snapshot.find(&gas_prefix, SeekDirection::Forward) {
        if key.len() != 4 + 1 + 20 {
            continue;
        }
        if let Ok(hash) = UInt160::from_bytes(&key[5..]) {
            let balance = crate::storage::StorageItem::new(value).as_int();
            alloc.entry(hash.to_string()).or_default().gas =
                balance.to_i64().unwrap_or(i64::MAX);
        }
    }
    let neo_prefix = {
        let mut prefix = StorageKey::contract_prefix(native::neo_token::ID);
        prefix.push(native::neo_token::PREFIX_ACCOUNT);
        prefix
    };
    for (key, value) in snapshot.find(&neo_prefix, SeekDirection::Forward) {
        if key.len() != 4 + 1 + 20 || value.len() < 32 {
            continue;
        }
        if let Ok(hash) = UInt160::from_bytes(&key[5..]) {
            let balance = num_bigint::BigInt::from_signed_bytes_le(&value[..32]);
            alloc.entry(hash.to_string()).or_default().neo =
                balance.to_i64().unwrap_or(i64::MAX);
        }
    }
    alloc
}

fn persist_script(name: &str) -> Vec<u8> {
    let mut builder = ScriptBuilder::new();
    builder.emit_syscall(interop_service::syscall_hash(name));
    builder.into_bytes()
}

fn run_persist_phase(
    trigger: TriggerType,
    syscall: &str,
    block: &Block,
    snapshot: &mut DataCache,
    settings: &ProtocolSettings,
) -> ContractResult<()> {
    let mut engine = ApplicationEngine::new(
        trigger,
        ScriptContainer::Block(block.clone()),
        snapshot,
        Some(block.clone()),
        settings.clone(),
        -1,
    );
    engine
        .load_entry_script(persist_script(syscall), neo_vm::CallFlags::ALL)
        .map_err(ContractError::Vm)?;
    let state = engine.execute();
    if state != VMState::HALT {
        let result = engine.finish(None);
        return Err(ContractError::InvalidContract(format!(
            "{syscall} faulted: {}",
            result.exception.unwrap_or_default()
        )));
    }
    engine.finish(Some(snapshot));
    Ok(())
}

/// Runs the full transition.
pub fn run_transition(
    alloc: &Alloc,
    transactions: Vec<Transaction>,
    env: &Env,
    settings: &ProtocolSettings,
    strict: bool,
) -> ContractResult<TransitionResult> {
    if transactions.len() > settings.max_transactions_per_block as usize {
        return Err(ContractError::InvalidContract(format!(
            "{} transactions exceed the block limit {}",
            transactions.len(),
            settings.max_transactions_per_block
        )));
    }

    let store = MemoryStore::shared();
    let mut snapshot = DataCache::new(store);
    seed_alloc(&mut snapshot, alloc)?;
    snapshot.commit();

    let block = Block {
        header: BlockHeader {
            version: 0,
            prev_hash: Default::default(),
            merkle_root: Default::default(),
            timestamp: env.timestamp,
            nonce: env.nonce,
            index: env.index,
            primary_index: env.primary_index,
            next_consensus: UInt160::ZERO,
            witness: Default::default(),
        },
        transactions: transactions.clone(),
    };

    run_persist_phase(
        TriggerType::OnPersist,
        "System.Contract.NativeOnPersist",
        &block,
        &mut snapshot,
        settings,
    )?;

    let mut receipts = Vec::with_capacity(transactions.len());
    for transaction in &transactions {
        let tx_hash = transaction.hash().to_string();
        if let Err(error) = transaction.validate_envelope() {
            receipts.push(Receipt {
                tx_hash,
                vm_state: VMState::FAULT.to_string(),
                gas_consumed: 0,
                stack: Vec::new(),
                notifications: Vec::new(),
                exception: Some(format!("invalid transaction: {error}")),
            });
            if strict {
                return Err(ContractError::InvalidContract(format!(
                    "strict mode: invalid transaction {error}"
                )));
            }
            continue;
        }

        let mut engine = ApplicationEngine::new(
            TriggerType::Application,
            ScriptContainer::Transaction(transaction.clone()),
            &snapshot,
            Some(block.clone()),
            settings.clone(),
            transaction.system_fee,
        );
        engine
            .load_entry_script(transaction.script.clone(), neo_vm::CallFlags::ALL)
            .map_err(ContractError::Vm)?;
        let state = engine.execute();
        let result = if state == VMState::HALT {
            engine.finish(Some(&mut snapshot))
        } else {
            engine.finish(None)
        };
        native::ledger::store_transaction(&mut snapshot, transaction, env.index, result.state);
        receipts.push(Receipt {
            tx_hash,
            vm_state: result.state.to_string(),
            gas_consumed: result.gas_consumed,
            stack: result.stack,
            notifications: project_notifications(&result.notifications),
            exception: result.exception,
        });
    }

    run_persist_phase(
        TriggerType::PostPersist,
        "System.Contract.NativePostPersist",
        &block,
        &mut snapshot,
        settings,
    )?;

    native::ledger::store_block(&mut snapshot, &block);
    snapshot.commit();

    Ok(TransitionResult {
        receipts,
        post_state: dump_balances(&snapshot),
        block_hash: block.hash().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use neo_core::Signer;
    use neo_core::Witness;

    fn simple_tx(script: Vec<u8>, sender: UInt160, system_fee: i64) -> Transaction {
        Transaction {
            nonce: 1,
            system_fee,
            valid_until_block: 100,
            signers: vec![Signer::called_by_entry(sender)],
            script,
            witnesses: vec![Witness::default()],
            ..Transaction::default()
        }
    }

    fn funded_alloc(sender: &UInt160) -> Alloc {
        let mut alloc = Alloc::new();
        alloc.insert(
            sender.to_string(),
            AccountAlloc {
                gas: 1_000_000_000,
                neo: 100,
            },
        );
        alloc
    }

    #[test]
    fn add_transaction_produces_receipt() {
        let sender = UInt160::from([7u8; 20]);
        let alloc = funded_alloc(&sender);
        let tx = simple_tx(vec![0x13, 0x15, 0x9E], sender, 10_000_000);
        let env = Env {
            index: 1,
            timestamp: 1_600_000_000_000,
            ..Env::default()
        };
        let settings = ProtocolSettings::default_with_magic(7);
        let result = run_transition(&alloc, vec![tx], &env, &settings, false).unwrap();
        assert_eq!(result.receipts.len(), 1);
        let receipt = &result.receipts[0];
        assert_eq!(receipt.vm_state, "HALT");
        assert_eq!(receipt.stack[0].value, "8");
        assert!(receipt.exception.is_none());
        // Fees burned on persist: the sender's GAS shrank.
        let post = result.post_state.get(&sender.to_string()).unwrap();
        assert!(post.gas < 1_000_000_000);
        assert_eq!(post.neo, 100);
    }

    #[test]
    fn malformed_transaction_faults_per_receipt() {
        let sender = UInt160::from([7u8; 20]);
        let alloc = funded_alloc(&sender);
        // Empty script is an envelope violation.
        let bad = simple_tx(Vec::new(), sender, 0);
        let env = Env::default();
        let settings = ProtocolSettings::default_with_magic(7);
        let result = run_transition(&alloc, vec![bad.clone()], &env, &settings, false).unwrap();
        assert_eq!(result.receipts[0].vm_state, "FAULT");
        assert!(result.receipts[0].exception.is_some());

        let strict = run_transition(&alloc, vec![bad], &env, &settings, true);
        assert!(strict.is_err());
    }

    #[test]
    fn faulting_script_leaves_balances_unchanged() {
        let sender = UInt160::from([7u8; 20]);
        let alloc = funded_alloc(&sender);
        // ABORT immediately.
        let tx = simple_tx(vec![0x38], sender, 10_000_000);
        let env = Env::default();
        let settings = ProtocolSettings::default_with_magic(7);
        let result = run_transition(&alloc, vec![tx], &env, &settings, false).unwrap();
        assert_eq!(result.receipts[0].vm_state, "FAULT");
        // System fee still burned by OnPersist; NEO untouched.
        assert_eq!(
            result.post_state.get(&sender.to_string()).unwrap().neo,
            100
        );
    }
}
