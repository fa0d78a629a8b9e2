//! Control-flow instructions (0x21–0x41).

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::NOP, |_, _| Ok(()));
    table.set(OpCode::JMP, jmp);
    table.set(OpCode::JMP_L, jmp);
    table.set(OpCode::JMPIF, jmp_if);
    table.set(OpCode::JMPIF_L, jmp_if);
    table.set(OpCode::JMPIFNOT, jmp_if_not);
    table.set(OpCode::JMPIFNOT_L, jmp_if_not);
    table.set(OpCode::JMPEQ, jmp_eq);
    table.set(OpCode::JMPEQ_L, jmp_eq);
    table.set(OpCode::JMPNE, jmp_ne);
    table.set(OpCode::JMPNE_L, jmp_ne);
    table.set(OpCode::JMPGT, jmp_gt);
    table.set(OpCode::JMPGT_L, jmp_gt);
    table.set(OpCode::JMPGE, jmp_ge);
    table.set(OpCode::JMPGE_L, jmp_ge);
    table.set(OpCode::JMPLT, jmp_lt);
    table.set(OpCode::JMPLT_L, jmp_lt);
    table.set(OpCode::JMPLE, jmp_le);
    table.set(OpCode::JMPLE_L, jmp_le);
    table.set(OpCode::CALL, call);
    table.set(OpCode::CALL_L, call);
    table.set(OpCode::CALLA, call_a);
    table.set(OpCode::ABORT, abort);
    table.set(OpCode::ASSERT, assert_op);
    table.set(OpCode::THROW, throw);
    table.set(OpCode::TRY, try_op);
    table.set(OpCode::TRY_L, try_op);
    table.set(OpCode::ENDTRY, end_try);
    table.set(OpCode::ENDTRY_L, end_try);
    table.set(OpCode::ENDFINALLY, end_finally);
    table.set(OpCode::RET, ret);
}

/// The jump offset, one signed byte for short forms and four for `_L`.
fn jump_offset(instruction: &Instruction) -> i32 {
    if instruction.operand().len() == 1 {
        i32::from(instruction.token_i8())
    } else {
        instruction.token_i32()
    }
}

fn jmp(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    engine.execute_jump_offset(jump_offset(instruction))
}

fn jmp_if(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    if engine.pop_bool()? {
        engine.execute_jump_offset(jump_offset(instruction))?;
    }
    Ok(())
}

fn jmp_if_not(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    if !engine.pop_bool()? {
        engine.execute_jump_offset(jump_offset(instruction))?;
    }
    Ok(())
}

fn jmp_eq(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    if x1 == x2 {
        engine.execute_jump_offset(jump_offset(instruction))?;
    }
    Ok(())
}

fn jmp_ne(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    if x1 != x2 {
        engine.execute_jump_offset(jump_offset(instruction))?;
    }
    Ok(())
}

fn jmp_gt(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    if x1 > x2 {
        engine.execute_jump_offset(jump_offset(instruction))?;
    }
    Ok(())
}

fn jmp_ge(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    if x1 >= x2 {
        engine.execute_jump_offset(jump_offset(instruction))?;
    }
    Ok(())
}

fn jmp_lt(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    if x1 < x2 {
        engine.execute_jump_offset(jump_offset(instruction))?;
    }
    Ok(())
}

fn jmp_le(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    if x1 <= x2 {
        engine.execute_jump_offset(jump_offset(instruction))?;
    }
    Ok(())
}

fn call(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let offset = jump_offset(instruction);
    let base = engine
        .current_context()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?
        .instruction_pointer() as i64;
    let target = base + i64::from(offset);
    if target < 0 {
        return Err(VmError::out_of_range(format!("call target {target}")));
    }
    engine.execute_call(target as usize)
}

fn call_a(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine.pop()?;
    let StackItem::Pointer(pointer) = item else {
        return Err(item.type_mismatch("Pointer"));
    };
    let context = engine
        .current_context()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    if !pointer.script().same_identity(context.script()) {
        return Err(VmError::invalid_argument(
            "CALLA pointer targets a different script",
        ));
    }
    engine.execute_call(pointer.position())
}

fn abort(_: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    Err(VmError::Abort("ABORT is executed".into()))
}

fn assert_op(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    if !engine.pop_bool()? {
        return Err(VmError::Abort("ASSERT failed".into()));
    }
    Ok(())
}

fn throw(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let exception = engine.pop()?;
    engine.execute_throw(exception)
}

fn try_op(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let (catch_offset, finally_offset) = if instruction.operand().len() == 2 {
        (
            i32::from(instruction.token_i8()),
            i32::from(instruction.token_i8_1()),
        )
    } else {
        (instruction.token_i32(), instruction.token_i32_1())
    };
    engine.execute_try(catch_offset, finally_offset)
}

fn end_try(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    engine.execute_end_try(jump_offset(instruction))
}

fn end_finally(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    engine.execute_end_finally()
}

fn ret(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    engine.execute_ret()
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
    fn backward_jump_loops_until_condition() {
        // Count down from 3: the loop runs until the counter is zero.
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(3); // counter
        builder.emit(OpCode::DUP);
        builder.emit(OpCode::PUSH1);
        builder.emit(OpCode::SUB);
        builder.emit(OpCode::DUP);
        builder.emit_with_operand(OpCode::JMPIF, &[(-4i8) as u8]);
        let engine = run(builder.into_bytes());
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_int().unwrap(),
            0.into()
        );
    }

    #[test]
    fn call_returns_to_caller() {
        // CALL +4 over a PUSH2/RET body: callee pushes 2, caller adds 1.
        let script = vec![
            OpCode::CALL as u8,
            4,
            OpCode::PUSH1 as u8,
            OpCode::RET as u8,
            OpCode::PUSH2 as u8,
            OpCode::RET as u8,
        ];
        let engine = run(script);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(engine.result_stack().len(), 2);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_int().unwrap(),
            1.into()
        );
        assert_eq!(
            engine.result_stack().peek(1).unwrap().as_int().unwrap(),
            2.into()
        );
    }

    #[test]
    fn abort_faults_without_try() {
        let script = vec![
            OpCode::TRY as u8,
            3,
            0,
            OpCode::ABORT as u8,
            OpCode::PUSH1 as u8,
            OpCode::RET as u8,
        ];
        let engine = run(script);
        assert_eq!(engine.state(), VMState::FAULT);
        assert!(matches!(
            engine.fault_reason(),
            Some(VmError::Abort(_))
        ));
    }

    #[test]
    fn assert_false_faults() {
        let engine = run(vec![OpCode::PUSHF as u8, OpCode::ASSERT as u8]);
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn calla_requires_same_script_pointer() {
        let mut engine = ExecutionEngine::new();
        let script = Script::new(vec![OpCode::CALLA as u8]);
        let foreign = Script::new(vec![OpCode::RET as u8]);
        engine.load_script(script, -1, 0).unwrap();
        engine
            .current_context_mut()
            .unwrap()
            .evaluation_stack_mut()
            .push(StackItem::from_pointer(foreign, 0));
        assert_eq!(engine.execute(), VMState::FAULT);
    }
}
