//! Constant-pushing instructions (0x00–0x20).

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{integer, StackItem};

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::PUSHINT8, push_int);
    table.set(OpCode::PUSHINT16, push_int);
    table.set(OpCode::PUSHINT32, push_int);
    table.set(OpCode::PUSHINT64, push_int);
    table.set(OpCode::PUSHINT128, push_int);
    table.set(OpCode::PUSHINT256, push_int);
    table.set(OpCode::PUSHT, |engine, _| {
        engine.push(StackItem::from_bool(true))
    });
    table.set(OpCode::PUSHF, |engine, _| {
        engine.push(StackItem::from_bool(false))
    });
    table.set(OpCode::PUSHA, push_address);
    table.set(OpCode::PUSHNULL, |engine, _| engine.push(StackItem::Null));
    table.set(OpCode::PUSHDATA1, push_data);
    table.set(OpCode::PUSHDATA2, push_data);
    table.set(OpCode::PUSHDATA4, push_data);
    table.set(OpCode::PUSHM1, |engine, _| {
        engine.push(StackItem::from_int(-1))
    });
    // PUSH0..PUSH16 share a handler; the value is recovered from the
    // opcode byte relative to PUSH0.
    for opcode in [
        OpCode::PUSH0,
        OpCode::PUSH1,
        OpCode::PUSH2,
        OpCode::PUSH3,
        OpCode::PUSH4,
        OpCode::PUSH5,
        OpCode::PUSH6,
        OpCode::PUSH7,
        OpCode::PUSH8,
        OpCode::PUSH9,
        OpCode::PUSH10,
        OpCode::PUSH11,
        OpCode::PUSH12,
        OpCode::PUSH13,
        OpCode::PUSH14,
        OpCode::PUSH15,
        OpCode::PUSH16,
    ] {
        table.set(opcode, push_small);
    }
}

fn push_int(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let value = integer::from_bytes_le(instruction.operand());
    engine.push(StackItem::Integer(value))
}

fn push_small(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let value = instruction.opcode() as i64 - OpCode::PUSH0 as i64;
    engine.push(StackItem::from_int(value))
}

fn push_address(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let offset = instruction.token_i32();
    let context = engine
        .current_context()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    let base = context.instruction_pointer() as i64;
    let position = base + i64::from(offset);
    if position < 0 || position as usize >= context.script().len() {
        return Err(VmError::out_of_range(format!(
            "PUSHA target {position} outside script"
        )));
    }
    let script = context.script().clone();
    engine.push(StackItem::from_pointer(script, position as usize))
}

fn push_data(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    engine
        .limits()
        .assert_max_item_size(instruction.operand().len())?;
    engine.push(StackItem::from_byte_string(instruction.operand().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use crate::vm_state::VMState;
    use num_bigint::BigInt;

    fn run(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new();
        engine.load_script(Script::new(script), -1, 0).unwrap();
        engine.execute();
        engine
    }

    #[test]
    fn small_constants() {
        let engine = run(vec![OpCode::PUSHM1 as u8, OpCode::PUSH16 as u8]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_int().unwrap(),
            16.into()
        );
        assert_eq!(
            engine.result_stack().peek(1).unwrap().as_int().unwrap(),
            BigInt::from(-1)
        );
    }

    #[test]
    fn pushint_sign_extends() {
        let engine = run(vec![OpCode::PUSHINT8 as u8, 0xFF]);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_int().unwrap(),
            BigInt::from(-1)
        );
    }

    #[test]
    fn pushdata_skips_prefix_and_data() {
        let engine = run(vec![
            OpCode::PUSHDATA1 as u8,
            2,
            0xAB,
            0xCD,
            OpCode::PUSH1 as u8,
        ]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(engine.result_stack().len(), 2);
        assert_eq!(
            engine.result_stack().peek(1).unwrap().as_bytes().unwrap(),
            vec![0xAB, 0xCD]
        );
    }
}
