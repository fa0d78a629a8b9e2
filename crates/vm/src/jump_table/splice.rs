//! Splice instructions (0x88–0x8E).

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{BufferItem, StackItem};
use num_traits::ToPrimitive;

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::NEWBUFFER, new_buffer);
    table.set(OpCode::MEMCPY, memcpy);
    table.set(OpCode::CAT, cat);
    table.set(OpCode::SUBSTR, substr);
    table.set(OpCode::LEFT, left);
    table.set(OpCode::RIGHT, right);
}

fn pop_length(engine: &mut ExecutionEngine, what: &str) -> VmResult<usize> {
    let value = engine.pop_int()?;
    value
        .to_usize()
        .ok_or_else(|| VmError::invalid_argument(format!("negative {what}: {value}")))
}

fn new_buffer(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let length = pop_length(engine, "buffer length")?;
    engine.limits().assert_max_item_size(length)?;
    engine.push(StackItem::Buffer(BufferItem::zeroed(length)))
}

fn memcpy(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let count = pop_length(engine, "MEMCPY count")?;
    let src_index = pop_length(engine, "source index")?;
    let src = engine.pop()?.as_bytes()?;
    if src_index + count > src.len() {
        return Err(VmError::out_of_range(format!(
            "source range {src_index}+{count} exceeds length {}",
            src.len()
        )));
    }
    let dst_index = pop_length(engine, "destination index")?;
    let dst = engine.pop()?;
    let StackItem::Buffer(buffer) = dst else {
        return Err(dst.type_mismatch("Buffer"));
    };
    if dst_index + count > buffer.len() {
        return Err(VmError::out_of_range(format!(
            "destination range {dst_index}+{count} exceeds length {}",
            buffer.len()
        )));
    }
    buffer.borrow_mut()[dst_index..dst_index + count]
        .copy_from_slice(&src[src_index..src_index + count]);
    Ok(())
}

fn cat(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop()?.as_bytes()?;
    let x1 = engine.pop()?.as_bytes()?;
    let length = x1.len() + x2.len();
    engine.limits().assert_max_item_size(length)?;
    let mut joined = Vec::with_capacity(length);
    joined.extend_from_slice(&x1);
    joined.extend_from_slice(&x2);
    engine.push(StackItem::Buffer(BufferItem::new(joined)))
}

fn substr(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let count = pop_length(engine, "SUBSTR count")?;
    let index = pop_length(engine, "SUBSTR index")?;
    let bytes = engine.pop()?.as_bytes()?;
    if index + count > bytes.len() {
        return Err(VmError::out_of_range(format!(
            "substring {index}+{count} exceeds length {}",
            bytes.len()
        )));
    }
    engine.push(StackItem::Buffer(BufferItem::new(
        bytes[index..index + count].to_vec(),
    )))
}

fn left(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let count = pop_length(engine, "LEFT count")?;
    let bytes = engine.pop()?.as_bytes()?;
    if count > bytes.len() {
        return Err(VmError::out_of_range(format!(
            "LEFT count {count} exceeds length {}",
            bytes.len()
        )));
    }
    engine.push(StackItem::Buffer(BufferItem::new(bytes[..count].to_vec())))
}

fn right(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let count = pop_length(engine, "RIGHT count")?;
    let bytes = engine.pop()?.as_bytes()?;
    if count > bytes.len() {
        return Err(VmError::out_of_range(format!(
            "RIGHT count {count} exceeds length {}",
            bytes.len()
        )));
    }
    engine.push(StackItem::Buffer(BufferItem::new(
        bytes[bytes.len() - count..].to_vec(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VmErrorKind;
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
    fn cat_joins_spans() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(b"ab");
        builder.emit_push_bytes(b"cd");
        builder.emit(OpCode::CAT);
        let engine = run(builder.into_bytes());
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_bytes().unwrap(),
            b"abcd".to_vec()
        );
    }

    #[test]
    fn memcpy_out_of_range_faults() {
        // Buffer(4), dstIdx=2, src="abc", srcIdx=0, count=3.
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(4);
        builder.emit(OpCode::NEWBUFFER);
        builder.emit_push_int(2);
        builder.emit_push_bytes(b"abc");
        builder.emit_push_int(0);
        builder.emit_push_int(3);
        builder.emit(OpCode::MEMCPY);
        let engine = run(builder.into_bytes());
        assert_eq!(engine.state(), VMState::FAULT);
        assert_eq!(
            engine.fault_reason().unwrap().kind(),
            VmErrorKind::OutOfRange
        );
    }

    #[test]
    fn memcpy_copies_into_buffer() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(4);
        builder.emit(OpCode::NEWBUFFER);
        builder.emit(OpCode::DUP);
        builder.emit_push_int(1);
        builder.emit_push_bytes(b"xyz");
        builder.emit_push_int(0);
        builder.emit_push_int(3);
        builder.emit(OpCode::MEMCPY);
        let engine = run(builder.into_bytes());
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_bytes().unwrap(),
            vec![0, b'x', b'y', b'z']
        );
    }

    #[test]
    fn substr_bounds() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(b"hello");
        builder.emit_push_int(1);
        builder.emit_push_int(3);
        builder.emit(OpCode::SUBSTR);
        let engine = run(builder.into_bytes());
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_bytes().unwrap(),
            b"ell".to_vec()
        );
    }

    #[test]
    fn right_takes_suffix() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(b"hello");
        builder.emit_push_int(2);
        builder.emit(OpCode::RIGHT);
        let engine = run(builder.into_bytes());
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_bytes().unwrap(),
            b"lo".to_vec()
        );
    }
}
