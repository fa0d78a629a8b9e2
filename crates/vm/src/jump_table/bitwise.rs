//! Bitwise and equality instructions (0x90–0x98).

use super::JumpTable;
use crate::error::VmResult;
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::INVERT, invert);
    table.set(OpCode::AND, and);
    table.set(OpCode::OR, or);
    table.set(OpCode::XOR, xor);
    table.set(OpCode::EQUAL, equal);
    table.set(OpCode::NOTEQUAL, not_equal);
}

fn invert(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    engine.push(StackItem::Integer(!x))
}

fn and(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    engine.push(StackItem::Integer(x1 & x2))
}

fn or(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    engine.push(StackItem::Integer(x1 | x2))
}

fn xor(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    engine.push(StackItem::Integer(x1 ^ x2))
}

fn equal(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop()?;
    let x1 = engine.pop()?;
    let result = x1.equals(&x2, engine.limits())?;
    engine.push(StackItem::from_bool(result))
}

fn not_equal(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop()?;
    let x1 = engine.pop()?;
    let result = x1.equals(&x2, engine.limits())?;
    engine.push(StackItem::from_bool(!result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use crate::script_builder::ScriptBuilder;

    fn run(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new();
        engine.load_script(Script::new(script), -1, 0).unwrap();
        engine.execute();
        engine
    }

    #[test]
    fn invert_is_twos_complement_not() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(5);
        builder.emit(OpCode::INVERT);
        let engine = run(builder.into_bytes());
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_int().unwrap(),
            num_bigint::BigInt::from(-6)
        );
    }

    #[test]
    fn and_on_negative_operands() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(-1);
        builder.emit_push_int(0xFF);
        builder.emit(OpCode::AND);
        let engine = run(builder.into_bytes());
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_int().unwrap(),
            0xFF.into()
        );
    }

    #[test]
    fn equal_compares_spans_across_variants() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(1);
        builder.emit_push_bytes(&[0x01]);
        builder.emit(OpCode::EQUAL);
        let engine = run(builder.into_bytes());
        assert!(engine.result_stack().peek(0).unwrap().as_bool().unwrap());
    }
}
