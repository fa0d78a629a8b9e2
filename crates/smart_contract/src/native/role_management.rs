//! RoleManagement (-8): committee-designated node roles.

use super::{arg_array, arg_i64, require_committee, NativeContract, NativeEvent, NativeMethod};
use crate::application_engine::EngineHost;
use neo_core::{Hardfork, UInt160};
use neo_persistence::SeekDirection;
use neo_vm::{CallFlags, ExecutionEngine, StackItem, VmError, VmResult};

/// Contract id.
pub const ID: i32 = -8;

pub const PREFIX_DESIGNATION: u8 = 11;

/// Designated node roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Role {
    StateValidator = 4,
    Oracle = 8,
    NeoFsAlphabetNode = 16,
    P2PNotary = 32,
}

impl Role {
    /// Decodes a role byte.
    pub fn from_i64(value: i64) -> Option<Role> {
        match value {
            4 => Some(Role::StateValidator),
            8 => Some(Role::Oracle),
            16 => Some(Role::NeoFsAlphabetNode),
            32 => Some(Role::P2PNotary),
            _ => None,
        }
    }
}

/// The RoleManagement hash.
pub fn hash() -> UInt160 {
    super::native_hash("RoleManagement")
}

fn designation_key(role: Role, index: u32) -> Vec<u8> {
    let mut key = Vec::with_capacity(6);
    key.push(PREFIX_DESIGNATION);
    key.push(role as u8);
    key.extend_from_slice(&index.to_le_bytes());
    key
}

fn serialize_nodes(nodes: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + nodes.len() * 33);
    bytes.push(nodes.len() as u8);
    for node in nodes {
        bytes.extend_from_slice(node);
    }
    bytes
}

fn deserialize_nodes(bytes: &[u8]) -> Vec<Vec<u8>> {
    let Some(count) = bytes.first().copied() else {
        return Vec::new();
    };
    let mut nodes = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let start = 1 + i * 33;
        if bytes.len() < start + 33 {
            break;
        }
        nodes.push(bytes[start..start + 33].to_vec());
    }
    nodes
}

/// The keys designated for `role` at or before `index`.
pub fn designated_by_role(host: &EngineHost, role: Role, index: u32) -> VmResult<Vec<Vec<u8>>> {
    let prefix = [PREFIX_DESIGNATION, role as u8];
    let mut best: Option<(u32, Vec<u8>)> = None;
    for (key, value) in host.storage_find(ID, &prefix, SeekDirection::Forward)? {
        if key.len() < 6 {
            continue;
        }
        let stored_index = u32::from_le_bytes([key[2], key[3], key[4], key[5]]);
        if stored_index <= index && best.as_ref().map(|(i, _)| stored_index > *i).unwrap_or(true) {
            best = Some((stored_index, value));
        }
    }
    Ok(best.map(|(_, value)| deserialize_nodes(&value)).unwrap_or_default())
}

// Handlers.

fn get_designated_by_role(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let role = Role::from_i64(arg_i64(&args, 0)?)
        .ok_or_else(|| VmError::invalid_argument("invalid role"))?;
    let index = arg_i64(&args, 1)?;
    if index < 0 {
        return Err(VmError::invalid_argument("index must be nonnegative"));
    }
    let nodes = designated_by_role(host, role, index as u32)?;
    Ok(Some(StackItem::from_array(
        nodes.into_iter().map(StackItem::from_byte_string).collect(),
    )))
}

fn designate_as_role(
    host: &mut EngineHost,
    _: &mut ExecutionEngine,
    args: Vec<StackItem>,
) -> VmResult<Option<StackItem>> {
    let role = Role::from_i64(arg_i64(&args, 0)?)
        .ok_or_else(|| VmError::invalid_argument("invalid role"))?;
    let nodes = arg_array(&args, 1)?;
    if nodes.is_empty() || nodes.len() > 32 {
        return Err(VmError::invalid_argument(
            "designation needs between 1 and 32 nodes".to_string(),
        ));
    }
    require_committee(host)?;

    let mut keys = Vec::with_capacity(nodes.len());
    for node in &nodes {
        let key = node.as_bytes()?;
        if key.len() != 33 {
            return Err(VmError::invalid_argument("public keys must be 33 bytes"));
        }
        keys.push(key);
    }
    keys.sort();

    let activation_index = host.block_index() + 1;
    let old_nodes = designated_by_role(host, role, activation_index)?;
    host.storage_put(
        ID,
        &designation_key(role, activation_index),
        &serialize_nodes(&keys),
    )?;

    let to_items = |nodes: Vec<Vec<u8>>| {
        StackItem::from_array(nodes.into_iter().map(StackItem::from_byte_string).collect())
    };
    let mut state = vec![
        StackItem::from_int(i64::from(role as u8)),
        StackItem::from_int(i64::from(host.block_index())),
    ];
    if host.is_hardfork_enabled(Hardfork::Echidna) {
        state.push(to_items(old_nodes));
        state.push(to_items(keys));
    }
    host.notify(hash(), "Designation".to_string(), state)?;
    Ok(None)
}

/// Builds the RoleManagement table.
pub fn contract() -> NativeContract {
    let methods = vec![
        NativeMethod {
            name: "designateAsRole",
            parameters: 2,
            parameter_defs: &[("role", "Integer"), ("nodes", "Array")],
            return_type: "Void",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::STATES.union(CallFlags::ALLOW_NOTIFY),
            active_in: None,
            deprecated_in: None,
            handler: designate_as_role,
        },
        NativeMethod {
            name: "getDesignatedByRole",
            parameters: 2,
            parameter_defs: &[("role", "Integer"), ("index", "Integer")],
            return_type: "Array",
            cpu_fee: 1 << 15,
            storage_fee: 0,
            required_flags: CallFlags::READ_STATES,
            active_in: None,
            deprecated_in: None,
            handler: get_designated_by_role,
        },
    ];

    NativeContract {
        id: ID,
        name: "RoleManagement",
        hash: hash(),
        active_in: None,
        supported_standards: &[],
        methods,
        events: vec![
            NativeEvent {
                name: "Designation",
                parameters: &[("Role", "Integer"), ("BlockIndex", "Integer")],
                active_in: None,
                deprecated_in: Some(Hardfork::Echidna),
            },
            NativeEvent {
                name: "Designation",
                parameters: &[
                    ("Role", "Integer"),
                    ("BlockIndex", "Integer"),
                    ("Old", "Array"),
                    ("New", "Array"),
                ],
                active_in: Some(Hardfork::Echidna),
                deprecated_in: None,
            },
        ],
        on_persist: None,
        post_persist: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_list_round_trip() {
        let nodes = vec![vec![2u8; 33], vec![3u8; 33]];
        assert_eq!(deserialize_nodes(&serialize_nodes(&nodes)), nodes);
        assert!(deserialize_nodes(&[]).is_empty());
    }
}
