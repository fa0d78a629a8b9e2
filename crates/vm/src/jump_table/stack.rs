//! Evaluation-stack manipulation instructions (0x43–0x55).

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::StackItem;
use num_traits::ToPrimitive;

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::DEPTH, depth);
    table.set(OpCode::DROP, drop_op);
    table.set(OpCode::NIP, nip);
    table.set(OpCode::XDROP, xdrop);
    table.set(OpCode::CLEAR, clear);
    table.set(OpCode::DUP, dup);
    table.set(OpCode::OVER, over);
    table.set(OpCode::PICK, pick);
    table.set(OpCode::TUCK, tuck);
    table.set(OpCode::SWAP, swap);
    table.set(OpCode::ROT, rot);
    table.set(OpCode::ROLL, roll);
    table.set(OpCode::REVERSE3, |engine, _| reverse(engine, 3));
    table.set(OpCode::REVERSE4, |engine, _| reverse(engine, 4));
    table.set(OpCode::REVERSEN, reverse_n);
}

fn pop_index(engine: &mut ExecutionEngine, what: &str) -> VmResult<usize> {
    let value = engine.pop_int()?;
    value
        .to_usize()
        .ok_or_else(|| VmError::invalid_argument(format!("negative {what}: {value}")))
}

fn depth(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let depth = engine
        .current_context()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?
        .evaluation_stack()
        .len();
    engine.push(StackItem::from_int(depth as i64))
}

fn drop_op(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    engine.pop().map(|_| ())
}

fn nip(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let context = engine
        .current_context_mut()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    context.evaluation_stack_mut().remove(1).map(|_| ())
}

fn xdrop(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let n = pop_index(engine, "XDROP index")?;
    let context = engine
        .current_context_mut()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    context.evaluation_stack_mut().remove(n).map(|_| ())
}

fn clear(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let context = engine
        .current_context_mut()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    context.evaluation_stack_mut().clear();
    Ok(())
}

fn dup(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let top = engine.peek(0)?.clone();
    engine.push(top)
}

fn over(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let item = engine.peek(1)?.clone();
    engine.push(item)
}

fn pick(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let n = pop_index(engine, "PICK index")?;
    let item = engine.peek(n)?.clone();
    engine.push(item)
}

fn tuck(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let top = engine.peek(0)?.clone();
    let context = engine
        .current_context_mut()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    context.evaluation_stack_mut().insert(2, top)
}

fn swap(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let context = engine
        .current_context_mut()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    context.evaluation_stack_mut().swap(0, 1)
}

fn rot(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let context = engine
        .current_context_mut()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    let stack = context.evaluation_stack_mut();
    stack.swap(1, 2)?;
    stack.swap(0, 1)
}

fn roll(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let n = pop_index(engine, "ROLL index")?;
    if n == 0 {
        return Ok(());
    }
    let context = engine
        .current_context_mut()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    let item = context.evaluation_stack_mut().remove(n)?;
    engine.push(item)
}

fn reverse(engine: &mut ExecutionEngine, count: usize) -> VmResult<()> {
    let context = engine
        .current_context_mut()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    context.evaluation_stack_mut().reverse(count)
}

fn reverse_n(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let n = pop_index(engine, "REVERSEN count")?;
    reverse(engine, n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use crate::vm_state::VMState;

    fn run(script: Vec<u8>) -> ExecutionEngine {
        let mut engine = ExecutionEngine::new();
        engine.load_script(Script::new(script), -1, 0).unwrap();
        engine.execute();
        engine
    }

    fn results(engine: &ExecutionEngine) -> Vec<i64> {
        engine
            .result_stack()
            .items()
            .iter()
            .map(|item| i64::try_from(item.as_int().unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn rot_left_rotates_top_three() {
        let engine = run(vec![
            OpCode::PUSH1 as u8,
            OpCode::PUSH2 as u8,
            OpCode::PUSH3 as u8,
            OpCode::ROT as u8,
        ]);
        assert_eq!(results(&engine), vec![2, 3, 1]);
    }

    #[test]
    fn roll_moves_deep_item_to_top() {
        let engine = run(vec![
            OpCode::PUSH1 as u8,
            OpCode::PUSH2 as u8,
            OpCode::PUSH3 as u8,
            OpCode::PUSH4 as u8,
            OpCode::PUSH2 as u8,
            OpCode::ROLL as u8,
        ]);
        assert_eq!(results(&engine), vec![1, 3, 4, 2]);
    }

    #[test]
    fn reverse3() {
        let engine = run(vec![
            OpCode::PUSH1 as u8,
            OpCode::PUSH2 as u8,
            OpCode::PUSH3 as u8,
            OpCode::REVERSE3 as u8,
        ]);
        assert_eq!(results(&engine), vec![3, 2, 1]);
    }

    #[test]
    fn xdrop_negative_faults() {
        let engine = run(vec![
            OpCode::PUSH1 as u8,
            OpCode::PUSHM1 as u8,
            OpCode::XDROP as u8,
        ]);
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn depth_counts() {
        let engine = run(vec![
            OpCode::PUSH1 as u8,
            OpCode::PUSH1 as u8,
            OpCode::DEPTH as u8,
        ]);
        assert_eq!(results(&engine), vec![1, 1, 2]);
    }
}
