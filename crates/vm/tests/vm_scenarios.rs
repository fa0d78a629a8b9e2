//! End-to-end interpreter scenarios.

use neo_vm::error::VmErrorKind;
use neo_vm::{ExecutionEngine, ExecutionEngineLimits, OpCode, Script, ScriptBuilder, StackItem, VMState};

fn run(script: Vec<u8>) -> ExecutionEngine {
    let mut engine = ExecutionEngine::new();
    engine.load_script(Script::new(script), -1, 0).unwrap();
    engine.execute();
    engine
}

#[test]
fn add_basic() {
    // PUSH3 PUSH5 ADD.
    let engine = run(vec![0x13, 0x15, 0x9E]);
    assert_eq!(engine.state(), VMState::HALT);
    assert_eq!(engine.result_stack().len(), 1);
    assert_eq!(
        engine.result_stack().peek(0).unwrap().as_int().unwrap(),
        8.into()
    );
}

#[test]
fn shl_shift_zero() {
    // PUSH2 PUSH0 SHL: the value must stay on the stack.
    let engine = run(vec![0x12, 0x10, 0xA8]);
    assert_eq!(engine.state(), VMState::HALT);
    assert_eq!(engine.result_stack().len(), 1);
    assert_eq!(
        engine.result_stack().peek(0).unwrap().as_int().unwrap(),
        2.into()
    );
}

#[test]
fn packmap_order() {
    // Push value 1, key "k", size 1, PACKMAP: keys pop before values.
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit_push_bytes(b"k");
    builder.emit_push_int(1);
    builder.emit(OpCode::PACKMAP);
    let engine = run(builder.into_bytes());
    assert_eq!(engine.state(), VMState::HALT);
    let StackItem::Map(map) = engine.result_stack().peek(0).unwrap() else {
        panic!("expected a map on the result stack");
    };
    assert_eq!(map.len(), 1);
    let value = map
        .borrow()
        .get(&StackItem::from_byte_string(b"k".to_vec()))
        .unwrap()
        .expect("key must exist");
    assert_eq!(value.as_int().unwrap(), 1.into());
}

#[test]
fn try_catches_throw_and_finally_runs() {
    let script = vec![
        OpCode::INITSSLOT as u8,
        1,
        OpCode::TRY as u8,
        5, // catch at TRY+5
        7, // finally at TRY+7
        OpCode::PUSH7 as u8,
        OpCode::THROW as u8,
        OpCode::ENDTRY as u8, // catch block: leave the caught value
        5,                    // continue at ENDTRY+5
        OpCode::PUSHT as u8,  // finally block: set the flag
        OpCode::STSFLD0 as u8,
        OpCode::ENDFINALLY as u8,
        OpCode::LDSFLD0 as u8,
        OpCode::RET as u8,
    ];
    let engine = run(script);
    assert_eq!(engine.state(), VMState::HALT);
    let items = engine.result_stack().items();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_int().unwrap(), 7.into());
    assert!(items[1].as_bool().unwrap(), "finally flag must be set");
}

#[test]
fn memcpy_out_of_range_faults() {
    // Buffer(4), dstIdx=2, count=3.
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
fn uncaught_throw_faults_with_item() {
    let engine = run(vec![OpCode::PUSH7 as u8, OpCode::THROW as u8]);
    assert_eq!(engine.state(), VMState::FAULT);
    assert_eq!(
        engine.fault_reason().unwrap().kind(),
        VmErrorKind::Uncaught
    );
    let exception = engine.uncaught_exception().expect("fault item attached");
    assert_eq!(exception.as_int().unwrap(), 7.into());
}

#[test]
fn nested_try_rethrow_reaches_outer_catch() {
    // Outer TRY catches what the inner finally re-propagates.
    let script = vec![
        OpCode::TRY as u8,
        9, // outer catch at TRY+9
        0,
        OpCode::TRY as u8, // inner try, finally only
        0,
        5, // finally at inner TRY+5
        OpCode::PUSH5 as u8,
        OpCode::THROW as u8,
        OpCode::ENDFINALLY as u8, // inner finally body is just ENDFINALLY
        OpCode::PUSH9 as u8,      // outer catch: replace exception with 9
        OpCode::NIP as u8,
        OpCode::RET as u8,
    ];
    let engine = run(script);
    assert_eq!(engine.state(), VMState::HALT);
    assert_eq!(
        engine.result_stack().peek(0).unwrap().as_int().unwrap(),
        9.into()
    );
}

#[test]
fn deep_recursion_hits_invocation_limit() {
    // CALL 0 recurses into itself forever.
    let engine = run(vec![OpCode::CALL as u8, 0]);
    assert_eq!(engine.state(), VMState::FAULT);
    assert_eq!(
        engine.fault_reason().unwrap().kind(),
        VmErrorKind::LimitExceeded
    );
}

#[test]
fn try_nesting_depth_is_bounded() {
    let mut script = Vec::new();
    for _ in 0..17 {
        script.extend_from_slice(&[OpCode::TRY as u8, 0, 60]);
    }
    script.push(OpCode::RET as u8);
    let engine = run(script);
    assert_eq!(engine.state(), VMState::FAULT);
    assert_eq!(
        engine.fault_reason().unwrap().kind(),
        VmErrorKind::LimitExceeded
    );
}

#[test]
fn oversized_item_faults() {
    // CAT two 1 MB spans: result exceeds MaxItemSize.
    let limits = ExecutionEngineLimits::default();
    let mut builder = ScriptBuilder::new();
    builder.emit_push_bytes(&vec![0u8; limits.max_item_size / 2 + 1]);
    builder.emit(OpCode::DUP);
    builder.emit(OpCode::CAT);
    let engine = run(builder.into_bytes());
    assert_eq!(engine.state(), VMState::FAULT);
    assert_eq!(
        engine.fault_reason().unwrap().kind(),
        VmErrorKind::LimitExceeded
    );
}
