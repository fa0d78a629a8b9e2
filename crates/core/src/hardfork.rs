//! Named hardforks and their ordering.

use serde::{Deserialize, Serialize};

/// Height-gated protocol activation points, in activation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Hardfork {
    Aspidochelone = 0,
    Basilisk = 1,
    Cockatrice = 2,
    Domovoi = 3,
    Echidna = 4,
    Faun = 5,
}

impl Hardfork {
    /// All hardforks in activation order.
    pub const ALL: [Hardfork; 6] = [
        Hardfork::Aspidochelone,
        Hardfork::Basilisk,
        Hardfork::Cockatrice,
        Hardfork::Domovoi,
        Hardfork::Echidna,
        Hardfork::Faun,
    ];

    /// The canonical configuration name (`HF_…`).
    pub fn config_name(&self) -> &'static str {
        match self {
            Hardfork::Aspidochelone => "HF_Aspidochelone",
            Hardfork::Basilisk => "HF_Basilisk",
            Hardfork::Cockatrice => "HF_Cockatrice",
            Hardfork::Domovoi => "HF_Domovoi",
            Hardfork::Echidna => "HF_Echidna",
            Hardfork::Faun => "HF_Faun",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_follows_activation_history() {
        assert!(Hardfork::Aspidochelone < Hardfork::Basilisk);
        assert!(Hardfork::Echidna < Hardfork::Faun);
        assert_eq!(Hardfork::ALL.len(), 6);
    }
}
