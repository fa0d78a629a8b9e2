//! Contract manifest: ABI, permissions, groups, standards.

use neo_core::UInt160;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum serialized manifest length.
pub const MAX_MANIFEST_SIZE: usize = u16::MAX as usize;

/// One ABI parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractParameterDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub parameter_type: String,
}

/// One ABI method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMethodDescriptor {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ContractParameterDefinition>,
    #[serde(rename = "returntype")]
    pub return_type: String,
    pub offset: u32,
    #[serde(default)]
    pub safe: bool,
}

/// One ABI event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEventDescriptor {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ContractParameterDefinition>,
}

/// The contract ABI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAbi {
    #[serde(default)]
    pub methods: Vec<ContractMethodDescriptor>,
    #[serde(default)]
    pub events: Vec<ContractEventDescriptor>,
}

impl ContractAbi {
    /// Finds a method by name and parameter count.
    pub fn get_method(&self, name: &str, parameter_count: usize) -> Option<&ContractMethodDescriptor> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.parameters.len() == parameter_count)
    }

    /// Whether any overload of `name` exists.
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name == name)
    }
}

/// A group signature binding the contract to a public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractGroup {
    /// 33-byte compressed point, hex.
    #[serde(rename = "pubkey")]
    pub public_key: String,
    /// Base64 signature of the contract hash by that key.
    pub signature: String,
}

impl ContractGroup {
    /// The raw public key bytes, when the hex is well formed.
    pub fn public_key_bytes(&self) -> Option<Vec<u8>> {
        hex::decode(&self.public_key).ok()
    }
}

/// A wildcard-or-list field, serialized as `"*"` or a JSON array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WildcardContainer {
    Wildcard,
    List(Vec<String>),
}

impl WildcardContainer {
    /// Whether the entry is covered.
    pub fn covers(&self, entry: &str) -> bool {
        match self {
            WildcardContainer::Wildcard => true,
            WildcardContainer::List(entries) => entries.iter().any(|e| e == entry),
        }
    }
}

impl Default for WildcardContainer {
    fn default() -> Self {
        WildcardContainer::List(Vec::new())
    }
}

impl Serialize for WildcardContainer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WildcardContainer::Wildcard => serializer.serialize_str("*"),
            WildcardContainer::List(entries) => entries.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for WildcardContainer {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(s) if s == "*" => Ok(WildcardContainer::Wildcard),
            Value::Array(items) => {
                let mut entries = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => entries.push(s),
                        other => {
                            return Err(serde::de::Error::custom(format!(
                                "wildcard list entry must be a string, got {other}"
                            )))
                        }
                    }
                }
                Ok(WildcardContainer::List(entries))
            }
            other => Err(serde::de::Error::custom(format!(
                "expected \"*\" or an array, got {other}"
            ))),
        }
    }
}

/// One permission: which contract (hash, group, or any) and which methods
/// the declaring contract may call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractPermission {
    /// `"*"`, a `0x…` contract hash, or a hex group key.
    pub contract: String,
    pub methods: WildcardContainer,
}

impl ContractPermission {
    /// A permission allowing everything.
    pub fn allow_all() -> ContractPermission {
        ContractPermission {
            contract: "*".into(),
            methods: WildcardContainer::Wildcard,
        }
    }

    /// Whether this permission admits calling `method` on the target.
    pub fn is_allowed(&self, target: &UInt160, target_groups: &[Vec<u8>], method: &str) -> bool {
        let contract_matches = if self.contract == "*" {
            true
        } else if let Ok(hash) = UInt160::from_hex(&self.contract) {
            hash == *target
        } else if let Ok(group) = hex::decode(&self.contract) {
            target_groups.iter().any(|g| *g == group)
        } else {
            false
        };
        contract_matches && self.methods.covers(method)
    }
}

/// The deployed-contract manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractManifest {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<ContractGroup>,
    #[serde(default)]
    pub features: Value,
    #[serde(rename = "supportedstandards", default)]
    pub supported_standards: Vec<String>,
    pub abi: ContractAbi,
    #[serde(default)]
    pub permissions: Vec<ContractPermission>,
    #[serde(default)]
    pub trusts: WildcardContainer,
    #[serde(default)]
    pub extra: Value,
}

impl ContractManifest {
    /// A minimal manifest with the given name and allow-all permissions.
    pub fn new(name: &str) -> ContractManifest {
        ContractManifest {
            name: name.to_string(),
            groups: Vec::new(),
            features: Value::Object(serde_json::Map::new()),
            supported_standards: Vec::new(),
            abi: ContractAbi::default(),
            permissions: vec![ContractPermission::allow_all()],
            trusts: WildcardContainer::Wildcard,
            extra: Value::Null,
        }
    }

    /// Parses manifest JSON with the size bound.
    pub fn from_json(bytes: &[u8]) -> crate::ContractResult<ContractManifest> {
        if bytes.len() > MAX_MANIFEST_SIZE {
            return Err(crate::ContractError::InvalidContract(format!(
                "manifest exceeds {MAX_MANIFEST_SIZE} bytes"
            )));
        }
        let manifest: ContractManifest = serde_json::from_slice(bytes)
            .map_err(|e| crate::ContractError::InvalidContract(format!("manifest json: {e}")))?;
        if manifest.name.is_empty() {
            return Err(crate::ContractError::InvalidContract(
                "manifest needs a name".into(),
            ));
        }
        Ok(manifest)
    }

    /// Serializes to the canonical compact JSON.
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).expect("manifest serialization cannot fail")
    }

    /// The group public keys.
    pub fn group_keys(&self) -> Vec<Vec<u8>> {
        self.groups
            .iter()
            .filter_map(|g| g.public_key_bytes())
            .collect()
    }

    /// Whether this manifest permits calling `method` on the target.
    pub fn can_call(&self, target: &UInt160, target_groups: &[Vec<u8>], method: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_allowed(target, target_groups, method))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest_with_permission(contract: &str, methods: WildcardContainer) -> ContractManifest {
        let mut manifest = ContractManifest::new("caller");
        manifest.permissions = vec![ContractPermission {
            contract: contract.to_string(),
            methods,
        }];
        manifest
    }

    #[test]
    fn wildcard_permission_allows_everything() {
        let manifest = ContractManifest::new("x");
        assert!(manifest.can_call(&UInt160::from([1u8; 20]), &[], "anything"));
    }

    #[test]
    fn hash_permission_is_exact() {
        let target = UInt160::from([2u8; 20]);
        let manifest =
            manifest_with_permission(&target.to_string(), WildcardContainer::Wildcard);
        assert!(manifest.can_call(&target, &[], "m"));
        assert!(!manifest.can_call(&UInt160::from([3u8; 20]), &[], "m"));
    }

    #[test]
    fn method_list_permission() {
        let target = UInt160::from([2u8; 20]);
        let manifest = manifest_with_permission(
            &target.to_string(),
            WildcardContainer::List(vec!["transfer".into()]),
        );
        assert!(manifest.can_call(&target, &[], "transfer"));
        assert!(!manifest.can_call(&target, &[], "mint"));
    }

    #[test]
    fn group_permission_matches_target_groups() {
        let group_key = vec![0x02u8; 33];
        let manifest =
            manifest_with_permission(&hex::encode(&group_key), WildcardContainer::Wildcard);
        assert!(manifest.can_call(&UInt160::from([9u8; 20]), &[group_key.clone()], "m"));
        assert!(!manifest.can_call(&UInt160::from([9u8; 20]), &[], "m"));
    }

    #[test]
    fn json_round_trip() {
        let mut manifest = ContractManifest::new("token");
        manifest.abi.methods.push(ContractMethodDescriptor {
            name: "transfer".into(),
            parameters: vec![ContractParameterDefinition {
                name: "to".into(),
                parameter_type: "Hash160".into(),
            }],
            return_type: "Boolean".into(),
            offset: 0,
            safe: false,
        });
        let bytes = manifest.to_json();
        let parsed = ContractManifest::from_json(&bytes).unwrap();
        assert_eq!(parsed, manifest);
        assert!(parsed.abi.get_method("transfer", 1).is_some());
        assert!(parsed.abi.get_method("transfer", 2).is_none());
    }
}
