//! Instruction dispatch table.
//!
//! Handlers are plain functions keyed by opcode byte, grouped into modules
//! by instruction family. SYSCALL and CALLT are absent here: the step loop
//! routes them to the execution host.

pub mod bitwise;
pub mod compound;
pub mod constants;
pub mod control;
pub mod numeric;
pub mod slot;
pub mod splice;
pub mod stack;
pub mod types;

use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;

/// A handler for one opcode.
pub type InstructionHandler = fn(&mut ExecutionEngine, &Instruction) -> VmResult<()>;

/// The dispatch table. One entry per opcode byte.
pub struct JumpTable {
    handlers: [Option<InstructionHandler>; 256],
}

impl JumpTable {
    /// Builds the standard table.
    pub fn new() -> JumpTable {
        let mut table = JumpTable {
            handlers: [None; 256],
        };
        constants::register(&mut table);
        control::register(&mut table);
        stack::register(&mut table);
        slot::register(&mut table);
        splice::register(&mut table);
        bitwise::register(&mut table);
        numeric::register(&mut table);
        compound::register(&mut table);
        types::register(&mut table);
        table
    }

    /// Installs a handler.
    pub fn set(&mut self, opcode: OpCode, handler: InstructionHandler) {
        self.handlers[opcode as usize] = Some(handler);
    }

    /// Looks up the handler for an opcode.
    pub fn handler(&self, opcode: OpCode) -> VmResult<InstructionHandler> {
        self.handlers[opcode as usize].ok_or(VmError::InvalidOpcode {
            opcode: opcode as u8,
            reason: "no handler registered".into(),
        })
    }
}

impl Default for JumpTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_covers_the_instruction_set() {
        let table = JumpTable::new();
        for byte in 0u16..=255 {
            if let Ok(opcode) = OpCode::from_byte(byte as u8) {
                // SYSCALL and CALLT are host-routed, everything else must
                // have a handler.
                if opcode != OpCode::SYSCALL && opcode != OpCode::CALLT {
                    assert!(
                        table.handler(opcode).is_ok(),
                        "missing handler for {:?}",
                        opcode
                    );
                }
            }
        }
    }
}
