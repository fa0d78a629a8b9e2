//! Execution triggers.

/// Why the engine was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TriggerType {
    /// Native bookkeeping before the block's transactions.
    OnPersist = 0x01,
    /// Native bookkeeping after the block's transactions.
    PostPersist = 0x02,
    /// Witness verification.
    Verification = 0x20,
    /// Ordinary transaction execution.
    Application = 0x40,
}

impl TriggerType {
    /// Wire byte of the trigger.
    pub fn as_byte(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for TriggerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TriggerType::OnPersist => "OnPersist",
            TriggerType::PostPersist => "PostPersist",
            TriggerType::Verification => "Verification",
            TriggerType::Application => "Application",
        };
        write!(f, "{name}")
    }
}
