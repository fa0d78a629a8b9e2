//! Slot instructions (0x56–0x87).

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::slot::Slot;

/// Which of the three slot arrays an opcode touches.
#[derive(Clone, Copy)]
enum SlotKind {
    Static,
    Local,
    Argument,
}

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::INITSSLOT, init_static_slot);
    table.set(OpCode::INITSLOT, init_slot);

    table.set(OpCode::LDSFLD0, |e, _| load(e, SlotKind::Static, 0));
    table.set(OpCode::LDSFLD1, |e, _| load(e, SlotKind::Static, 1));
    table.set(OpCode::LDSFLD2, |e, _| load(e, SlotKind::Static, 2));
    table.set(OpCode::LDSFLD3, |e, _| load(e, SlotKind::Static, 3));
    table.set(OpCode::LDSFLD4, |e, _| load(e, SlotKind::Static, 4));
    table.set(OpCode::LDSFLD5, |e, _| load(e, SlotKind::Static, 5));
    table.set(OpCode::LDSFLD6, |e, _| load(e, SlotKind::Static, 6));
    table.set(OpCode::LDSFLD, |e, i| {
        load(e, SlotKind::Static, i.token_u8() as usize)
    });
    table.set(OpCode::STSFLD0, |e, _| store(e, SlotKind::Static, 0));
    table.set(OpCode::STSFLD1, |e, _| store(e, SlotKind::Static, 1));
    table.set(OpCode::STSFLD2, |e, _| store(e, SlotKind::Static, 2));
    table.set(OpCode::STSFLD3, |e, _| store(e, SlotKind::Static, 3));
    table.set(OpCode::STSFLD4, |e, _| store(e, SlotKind::Static, 4));
    table.set(OpCode::STSFLD5, |e, _| store(e, SlotKind::Static, 5));
    table.set(OpCode::STSFLD6, |e, _| store(e, SlotKind::Static, 6));
    table.set(OpCode::STSFLD, |e, i| {
        store(e, SlotKind::Static, i.token_u8() as usize)
    });

    table.set(OpCode::LDLOC0, |e, _| load(e, SlotKind::Local, 0));
    table.set(OpCode::LDLOC1, |e, _| load(e, SlotKind::Local, 1));
    table.set(OpCode::LDLOC2, |e, _| load(e, SlotKind::Local, 2));
    table.set(OpCode::LDLOC3, |e, _| load(e, SlotKind::Local, 3));
    table.set(OpCode::LDLOC4, |e, _| load(e, SlotKind::Local, 4));
    table.set(OpCode::LDLOC5, |e, _| load(e, SlotKind::Local, 5));
    table.set(OpCode::LDLOC6, |e, _| load(e, SlotKind::Local, 6));
    table.set(OpCode::LDLOC, |e, i| {
        load(e, SlotKind::Local, i.token_u8() as usize)
    });
    table.set(OpCode::STLOC0, |e, _| store(e, SlotKind::Local, 0));
    table.set(OpCode::STLOC1, |e, _| store(e, SlotKind::Local, 1));
    table.set(OpCode::STLOC2, |e, _| store(e, SlotKind::Local, 2));
    table.set(OpCode::STLOC3, |e, _| store(e, SlotKind::Local, 3));
    table.set(OpCode::STLOC4, |e, _| store(e, SlotKind::Local, 4));
    table.set(OpCode::STLOC5, |e, _| store(e, SlotKind::Local, 5));
    table.set(OpCode::STLOC6, |e, _| store(e, SlotKind::Local, 6));
    table.set(OpCode::STLOC, |e, i| {
        store(e, SlotKind::Local, i.token_u8() as usize)
    });

    table.set(OpCode::LDARG0, |e, _| load(e, SlotKind::Argument, 0));
    table.set(OpCode::LDARG1, |e, _| load(e, SlotKind::Argument, 1));
    table.set(OpCode::LDARG2, |e, _| load(e, SlotKind::Argument, 2));
    table.set(OpCode::LDARG3, |e, _| load(e, SlotKind::Argument, 3));
    table.set(OpCode::LDARG4, |e, _| load(e, SlotKind::Argument, 4));
    table.set(OpCode::LDARG5, |e, _| load(e, SlotKind::Argument, 5));
    table.set(OpCode::LDARG6, |e, _| load(e, SlotKind::Argument, 6));
    table.set(OpCode::LDARG, |e, i| {
        load(e, SlotKind::Argument, i.token_u8() as usize)
    });
    table.set(OpCode::STARG0, |e, _| store(e, SlotKind::Argument, 0));
    table.set(OpCode::STARG1, |e, _| store(e, SlotKind::Argument, 1));
    table.set(OpCode::STARG2, |e, _| store(e, SlotKind::Argument, 2));
    table.set(OpCode::STARG3, |e, _| store(e, SlotKind::Argument, 3));
    table.set(OpCode::STARG4, |e, _| store(e, SlotKind::Argument, 4));
    table.set(OpCode::STARG5, |e, _| store(e, SlotKind::Argument, 5));
    table.set(OpCode::STARG6, |e, _| store(e, SlotKind::Argument, 6));
    table.set(OpCode::STARG, |e, i| {
        store(e, SlotKind::Argument, i.token_u8() as usize)
    });
}

fn slot_of(engine: &ExecutionEngine, kind: SlotKind) -> VmResult<Slot> {
    let context = engine
        .current_context()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    let slot = match kind {
        SlotKind::Static => context.static_fields(),
        SlotKind::Local => context.local_variables(),
        SlotKind::Argument => context.arguments(),
    };
    slot.cloned()
        .ok_or_else(|| VmError::invalid_operation("slot has not been initialized"))
}

fn load(engine: &mut ExecutionEngine, kind: SlotKind, index: usize) -> VmResult<()> {
    let slot = slot_of(engine, kind)?;
    let item = slot.get(index)?;
    engine.push(item)
}

fn store(engine: &mut ExecutionEngine, kind: SlotKind, index: usize) -> VmResult<()> {
    let slot = slot_of(engine, kind)?;
    let item = engine.pop()?;
    slot.set(index, item)
}

fn init_static_slot(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let count = instruction.token_u8() as usize;
    if count == 0 {
        return Err(VmError::invalid_argument("INITSSLOT needs a nonzero count"));
    }
    let slot = Slot::new(count, engine.reference_counter().clone());
    let context = engine
        .current_context_mut()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    context.set_static_fields(slot)
}

fn init_slot(engine: &mut ExecutionEngine, instruction: &Instruction) -> VmResult<()> {
    let local_count = instruction.token_u8() as usize;
    let argument_count = instruction.token_u8_1() as usize;
    if local_count == 0 && argument_count == 0 {
        return Err(VmError::invalid_argument("INITSLOT needs a nonzero count"));
    }

    let locals = if local_count > 0 {
        Some(Slot::new(local_count, engine.reference_counter().clone()))
    } else {
        None
    };
    let arguments = if argument_count > 0 {
        let mut items = Vec::with_capacity(argument_count);
        for _ in 0..argument_count {
            items.push(engine.pop()?);
        }
        // First pushed becomes argument 0.
        items.reverse();
        Some(Slot::from_items(items, engine.reference_counter().clone()))
    } else {
        None
    };

    let context = engine
        .current_context_mut()
        .ok_or_else(|| VmError::invalid_operation("no current context"))?;
    context.init_slots(locals, arguments)
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

    #[test]
    fn locals_round_trip() {
        let engine = run(vec![
            OpCode::INITSLOT as u8,
            1,
            0,
            OpCode::PUSH7 as u8,
            OpCode::STLOC0 as u8,
            OpCode::LDLOC0 as u8,
        ]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_int().unwrap(),
            7.into()
        );
    }

    #[test]
    fn arguments_bind_in_push_order() {
        // Push 1 then 2; INITSLOT 0,2 binds arg0=1, arg1=2.
        let engine = run(vec![
            OpCode::PUSH1 as u8,
            OpCode::PUSH2 as u8,
            OpCode::INITSLOT as u8,
            0,
            2,
            OpCode::LDARG0 as u8,
        ]);
        assert_eq!(
            engine.result_stack().peek(0).unwrap().as_int().unwrap(),
            1.into()
        );
    }

    #[test]
    fn uninitialized_slot_faults() {
        let engine = run(vec![OpCode::LDLOC0 as u8]);
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn initsslot_twice_faults() {
        let engine = run(vec![
            OpCode::INITSSLOT as u8,
            1,
            OpCode::INITSSLOT as u8,
            1,
        ]);
        assert_eq!(engine.state(), VMState::FAULT);
    }
}
