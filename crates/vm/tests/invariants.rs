//! Universal execution invariants.

use neo_vm::{ExecutionEngine, OpCode, Script, ScriptBuilder, StackItem, VMState};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn run(script: Vec<u8>) -> ExecutionEngine {
    let mut engine = ExecutionEngine::new();
    engine.load_script(Script::new(script), -1, 0).unwrap();
    engine.execute();
    engine
}

#[test]
fn conservation_at_ret() {
    // The callee pushes two items; the caller keeps its one item and
    // receives both, in order.
    let script = vec![
        OpCode::PUSH9 as u8, // caller item
        OpCode::CALL as u8,
        4,
        OpCode::DEPTH as u8, // after return: 9, 1, 2 -> depth 3
        OpCode::RET as u8,
        OpCode::PUSH1 as u8, // callee
        OpCode::PUSH2 as u8,
        OpCode::RET as u8,
    ];
    let engine = run(script);
    assert_eq!(engine.state(), VMState::HALT);
    let items = engine.result_stack().items();
    assert_eq!(items.len(), 4);
    assert_eq!(items[0].as_int().unwrap(), 9.into());
    assert_eq!(items[1].as_int().unwrap(), 1.into());
    assert_eq!(items[2].as_int().unwrap(), 2.into());
    assert_eq!(items[3].as_int().unwrap(), 3.into());
}

#[test]
fn integer_cap_holds_for_all_results() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        let a: i64 = rng.gen();
        let b: i64 = rng.gen();
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(a);
        builder.emit_push_int(b);
        builder.emit(OpCode::ADD);
        let engine = run(builder.into_bytes());
        assert_eq!(engine.state(), VMState::HALT);
        let result = engine.result_stack().peek(0).unwrap().as_int().unwrap();
        assert_eq!(result, num_bigint::BigInt::from(a) + b);
        assert!(result.bits() <= 255);
    }
}

#[test]
fn addition_commutes() {
    let mut rng = StdRng::seed_from_u64(12);
    for _ in 0..50 {
        let a: i64 = rng.gen();
        let b: i64 = rng.gen();
        let run_add = |x: i64, y: i64| {
            let mut builder = ScriptBuilder::new();
            builder.emit_push_int(x);
            builder.emit_push_int(y);
            builder.emit(OpCode::ADD);
            run(builder.into_bytes())
                .result_stack()
                .peek(0)
                .unwrap()
                .as_int()
                .unwrap()
        };
        assert_eq!(run_add(a, b), run_add(b, a));
    }
}

#[test]
fn shift_identity_both_directions() {
    for value in [-5i64, 0, 1, 1 << 40] {
        for opcode in [OpCode::SHL, OpCode::SHR] {
            let mut builder = ScriptBuilder::new();
            builder.emit_push_int(value);
            builder.emit_push_int(0);
            builder.emit(opcode);
            let engine = run(builder.into_bytes());
            assert_eq!(engine.state(), VMState::HALT);
            assert_eq!(engine.result_stack().len(), 1);
            assert_eq!(
                engine.result_stack().peek(0).unwrap().as_int().unwrap(),
                value.into()
            );
        }
    }
}

#[test]
fn map_preserves_insertion_order_through_pack_unpack() {
    let mut rng = StdRng::seed_from_u64(13);
    for _ in 0..20 {
        let count = rng.gen_range(1..8usize);
        let keys: Vec<i64> = (0..count).map(|i| 1000 + i as i64).collect();

        let mut builder = ScriptBuilder::new();
        // Push (value, key) pairs, last pair popped first by PACKMAP.
        for key in keys.iter().rev() {
            builder.emit_push_int(key * 2);
            builder.emit_push_int(*key);
        }
        builder.emit_push_int(count as i64);
        builder.emit(OpCode::PACKMAP);
        builder.emit(OpCode::KEYS);
        let engine = run(builder.into_bytes());
        assert_eq!(engine.state(), VMState::HALT);
        let StackItem::Array(result_keys) = engine.result_stack().peek(0).unwrap() else {
            panic!("expected keys array");
        };
        let observed: Vec<i64> = result_keys
            .borrow()
            .iter()
            .map(|k| i64::try_from(k.as_int().unwrap()).unwrap())
            .collect();
        assert_eq!(observed, keys);
    }
}

#[test]
fn reference_counter_is_clean_on_halt() {
    // Build nested garbage, drop it, halt: everything must be reclaimed
    // except the single result item.
    let mut builder = ScriptBuilder::new();
    builder.emit(OpCode::NEWARRAY0);
    builder.emit(OpCode::DUP);
    builder.emit(OpCode::DUP);
    builder.emit(OpCode::APPEND); // self-referential array
    builder.emit(OpCode::DROP);
    builder.emit_push_int(1);
    let engine = run(builder.into_bytes());
    assert_eq!(engine.state(), VMState::HALT);
    assert_eq!(engine.result_stack().len(), 1);
    assert_eq!(engine.reference_counter().count(), 1);
    assert_eq!(engine.reference_counter().tracked_items(), 0);
}

#[test]
fn struct_vs_array_equality_distinction() {
    // Same elements: Array != Struct, but converted Array == Struct.
    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit_push_int(1);
    builder.emit(OpCode::PACK);
    builder.emit_push_int(1);
    builder.emit_push_int(1);
    builder.emit(OpCode::PACKSTRUCT);
    builder.emit(OpCode::EQUAL);
    let engine = run(builder.into_bytes());
    assert!(!engine.result_stack().peek(0).unwrap().as_bool().unwrap());

    let mut builder = ScriptBuilder::new();
    builder.emit_push_int(1);
    builder.emit_push_int(1);
    builder.emit(OpCode::PACK);
    builder.emit_with_operand(OpCode::CONVERT, &[0x41]); // to Struct
    builder.emit_push_int(1);
    builder.emit_push_int(1);
    builder.emit(OpCode::PACKSTRUCT);
    builder.emit(OpCode::EQUAL);
    let engine = run(builder.into_bytes());
    assert!(engine.result_stack().peek(0).unwrap().as_bool().unwrap());
}

#[test]
fn bytestring_boolean_semantics() {
    let mut rng = StdRng::seed_from_u64(14);
    for _ in 0..50 {
        let len = rng.gen_range(0..16usize);
        let mut bytes = vec![0u8; len];
        rng.fill(&mut bytes[..]);
        let expected = bytes.iter().any(|&b| b != 0);
        let item = StackItem::from_byte_string(bytes);
        assert_eq!(item.as_bool().unwrap(), expected);
    }
}
