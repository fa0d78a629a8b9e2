//! Engine state tag.

/// The lifecycle state of an execution engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VMState {
    /// Not started.
    NONE,
    /// Finished successfully; the result stack is valid.
    HALT,
    /// Failed; any effects must be rolled back by the host.
    FAULT,
    /// Paused between instructions (debugger / fresh engine).
    BREAK,
}

impl std::fmt::Display for VMState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VMState::NONE => "NONE",
            VMState::HALT => "HALT",
            VMState::FAULT => "FAULT",
            VMState::BREAK => "BREAK",
        };
        write!(f, "{name}")
    }
}
