//! Type instructions (0xD8–0xE1).

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{StackItem, StackItemType};

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::ISNULL, is_null);
    table.set(OpCode::ISTYPE, is_type);
    table.set(OpCode::CONVERT, convert);
    table.set(OpCode::ABORTMSG, abort_msg);
    table.set(OpCode::ASSERTMSG, assert_msg);
}

fn is_null(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    engine.push(StackItem::from_bool(item.is_null()))
}

fn is_type(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let target = StackItemType::from_byte(instruction.token_u8())?;
    if target == StackItemType::Any {
        return Err(VmError::invalid_argument("ISTYPE cannot test for Any"));
    }
    let item = engine.pop()?;
    engine.push(StackItem::from_bool(item.item_type() == target))
}

fn convert(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let target = StackItemType::from_byte(instruction.token_u8())?;
    let item = engine.pop()?;
    let converted = item.convert_to(target, engine.limits())?;
    engine.push(converted)
}

fn message_of(item: &StackItem) -> String {
    item.as_string()
        .unwrap_or_else(|_| item.display_value())
}

fn abort_msg(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let message = engine.pop()?;
    Err(VmError::Abort(format!(
        "ABORTMSG is executed: {}",
        message_of(&message)
    )))
}

fn assert_msg(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let message = engine.pop()?;
    let condition = engine.pop_bool()?;
    if !condition {
        return Err(VmError::Abort(format!(
            "ASSERTMSG failed: {}",
            message_of(&message)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use crate::script_builder::ScriptBuilder;
    use crate::vm_state::VMState;

    fn run(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new();
        engine.load_script(Script::new(script), -1, 0).unwrap();
        engine.execute();
        engine
    }

    #[test]
    fn isnull_only_for_null() {
        let engine = run(vec![OpCode::PUSHNULL as u8, OpCode::ISNULL as u8]);
        assert!(engine.result_stack().peek(0).unwrap().as_bool().unwrap());
        let engine = run(vec![OpCode::PUSH0 as u8, OpCode::ISNULL as u8]);
        assert!(!engine.result_stack().peek(0).unwrap().as_bool().unwrap());
    }

    #[test]
    fn istype_checks_tag() {
        let engine = run(vec![
            OpCode::PUSH1 as u8,
            OpCode::ISTYPE as u8,
            StackItemType::Integer as u8,
        ]);
        assert!(engine.result_stack().peek(0).unwrap().as_bool().unwrap());
    }

    #[test]
    fn convert_array_to_struct() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(1);
        builder.emit_push_int(1);
        builder.emit(OpCode::PACK);
        builder.emit_with_operand(OpCode::CONVERT, &[StackItemType::Struct as u8]);
        let engine = run(builder.into_bytes());
        assert_eq!(
            engine.result_stack().peek(0).unwrap().item_type(),
            StackItemType::Struct
        );
    }

    #[test]
    fn assertmsg_carries_reason() {
        let mut builder = ScriptBuilder::new();
        builder.emit(OpCode::PUSHF);
        builder.emit_push_bytes(b"checks failed");
        builder.emit(OpCode::ASSERTMSG);
        let engine = run(builder.into_bytes());
        assert_eq!(engine.state(), VMState::FAULT);
        let reason = engine.fault_reason().unwrap().to_string();
        assert!(reason.contains("checks failed"));
    }
}
