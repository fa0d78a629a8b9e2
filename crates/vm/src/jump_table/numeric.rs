//! Numeric instructions (0x99–0xBB).
//!
//! Every arithmetic result is re-checked against the 32-byte integer cap;
//! division truncates toward zero and the remainder takes the dividend's
//! sign (both come with `BigInt`).

use super::JumpTable;
use crate::error::{VmError, VmResult};
use crate::execution_engine::ExecutionEngine;
use crate::instruction::Instruction;
use crate::op_code::OpCode;
use crate::stack_item::{integer, StackItem};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

pub(super) fn register(table: &mut JumpTable) {
    table.set(OpCode::SIGN, sign);
    table.set(OpCode::ABS, abs);
    table.set(OpCode::NEGATE, negate);
    table.set(OpCode::INC, inc);
    table.set(OpCode::DEC, dec);
    table.set(OpCode::ADD, add);
    table.set(OpCode::SUB, sub);
    table.set(OpCode::MUL, mul);
    table.set(OpCode::DIV, div);
    table.set(OpCode::MOD, modulo);
    table.set(OpCode::POW, pow);
    table.set(OpCode::SQRT, sqrt);
    table.set(OpCode::MODMUL, mod_mul);
    table.set(OpCode::MODPOW, mod_pow);
    table.set(OpCode::SHL, shl);
    table.set(OpCode::SHR, shr);
    table.set(OpCode::NOT, not);
    table.set(OpCode::BOOLAND, bool_and);
    table.set(OpCode::BOOLOR, bool_or);
    table.set(OpCode::NZ, nz);
    table.set(OpCode::NUMEQUAL, num_equal);
    table.set(OpCode::NUMNOTEQUAL, num_not_equal);
    table.set(OpCode::LT, lt);
    table.set(OpCode::LE, le);
    table.set(OpCode::GT, gt);
    table.set(OpCode::GE, ge);
    table.set(OpCode::MIN, min);
    table.set(OpCode::MAX, max);
    table.set(OpCode::WITHIN, within);
}

fn push_checked(
    engine: &mut ExecutionEngine,
    value: BigInt,
    operation: &'static str,
) -> VmResult<()> {
    integer::check(&value, operation)?;
    engine.push(StackItem::Integer(value))
}

fn sign(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    engine.push(StackItem::from_int(x.signum()))
}

fn abs(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    push_checked(engine, x.abs(), "ABS")
}

fn negate(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    push_checked(engine, -x, "NEGATE")
}

fn inc(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    push_checked(engine, x + 1, "INC")
}

fn dec(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    push_checked(engine, x - 1, "DEC")
}

fn add(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    push_checked(engine, x1 + x2, "ADD")
}

fn sub(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    push_checked(engine, x1 - x2, "SUB")
}

fn mul(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    push_checked(engine, x1 * x2, "MUL")
}

fn div(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    if x2.is_zero() {
        return Err(VmError::DivideByZero);
    }
    push_checked(engine, x1 / x2, "DIV")
}

fn modulo(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    if x2.is_zero() {
        return Err(VmError::DivideByZero);
    }
    push_checked(engine, x1 % x2, "MOD")
}

fn pow(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let exponent = engine.pop_int()?;
    let exponent_i64 = exponent
        .to_i64()
        .ok_or_else(|| VmError::invalid_argument(format!("POW exponent {exponent}")))?;
    engine.limits().assert_shift(exponent_i64)?;
    let value = engine.pop_int()?;
    let result = num_traits::Pow::pow(&value, exponent_i64 as u32);
    push_checked(engine, result, "POW")
}

fn sqrt(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    if x.is_negative() {
        return Err(VmError::invalid_argument(
            "SQRT of a negative number".to_string(),
        ));
    }
    push_checked(engine, isqrt(&x), "SQRT")
}

/// Floor integer square root by Newton's method.
fn isqrt(value: &BigInt) -> BigInt {
    if value.is_zero() {
        return BigInt::zero();
    }
    let mut x = BigInt::from(1) << ((value.bits() / 2) + 1) as u32;
    loop {
        let y = (&x + value / &x) >> 1u32;
        if y >= x {
            return x;
        }
        x = y;
    }
}

fn mod_mul(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let modulus = engine.pop_int()?;
    if modulus.is_zero() {
        return Err(VmError::DivideByZero);
    }
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    push_checked(engine, (x1 * x2) % modulus, "MODMUL")
}

fn mod_pow(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let modulus = engine.pop_int()?;
    let exponent = engine.pop_int()?;
    let value = engine.pop_int()?;
    if modulus.is_zero() {
        return Err(VmError::DivideByZero);
    }
    let result = if exponent == BigInt::from(-1) {
        // Exponent -1 requests the modular inverse.
        mod_inverse(&value, &modulus)
            .ok_or_else(|| VmError::invalid_argument("value has no modular inverse"))?
    } else {
        if exponent.is_negative() {
            return Err(VmError::invalid_argument(format!(
                "MODPOW exponent {exponent}"
            )));
        }
        value.modpow(&exponent, &modulus)
    };
    push_checked(engine, result, "MODPOW")
}

/// Extended Euclid; returns the inverse of `value` mod `modulus`.
fn mod_inverse(value: &BigInt, modulus: &BigInt) -> Option<BigInt> {
    let modulus = modulus.abs();
    if modulus.is_zero() {
        return None;
    }
    let mut r0 = modulus.clone();
    let mut r1 = mod_positive(value, &modulus);
    let mut t0 = BigInt::zero();
    let mut t1 = BigInt::from(1);
    while !r1.is_zero() {
        let quotient = &r0 / &r1;
        let r2 = &r0 - &quotient * &r1;
        r0 = std::mem::replace(&mut r1, r2);
        let t2 = &t0 - &quotient * &t1;
        t0 = std::mem::replace(&mut t1, t2);
    }
    if r0 != BigInt::from(1) {
        return None;
    }
    Some(mod_positive(&t0, &modulus))
}

/// The least nonnegative residue of `value` mod `modulus`.
fn mod_positive(value: &BigInt, modulus: &BigInt) -> BigInt {
    let remainder = value % modulus;
    if remainder.is_negative() {
        remainder + modulus.abs()
    } else {
        remainder
    }
}

fn shl(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let shift = engine.pop_int()?;
    let shift = shift
        .to_i64()
        .ok_or_else(|| VmError::invalid_argument(format!("shift count {shift}")))?;
    engine.limits().assert_shift(shift)?;
    if shift == 0 {
        // The value stays on the stack untouched.
        return Ok(());
    }
    let x = engine.pop_int()?;
    push_checked(engine, x << shift as u32, "SHL")
}

fn shr(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let shift = engine.pop_int()?;
    let shift = shift
        .to_i64()
        .ok_or_else(|| VmError::invalid_argument(format!("shift count {shift}")))?;
    engine.limits().assert_shift(shift)?;
    if shift == 0 {
        return Ok(());
    }
    let x = engine.pop_int()?;
    push_checked(engine, x >> shift as u32, "SHR")
}

fn not(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x = engine.pop_bool()?;
    engine.push(StackItem::from_bool(!x))
}

fn bool_and(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_bool()?;
    let x1 = engine.pop_bool()?;
    engine.push(StackItem::from_bool(x1 && x2))
}

fn bool_or(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_bool()?;
    let x1 = engine.pop_bool()?;
    engine.push(StackItem::from_bool(x1 || x2))
}

fn nz(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x = engine.pop_int()?;
    engine.push(StackItem::from_bool(!x.is_zero()))
}

fn num_equal(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    engine.push(StackItem::from_bool(x1 == x2))
}

fn num_not_equal(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    engine.push(StackItem::from_bool(x1 != x2))
}

/// Ordered comparisons treat a Null operand as incomparable (false).
fn ordered(
    engine: &mut ExecutionEngine,
    compare: fn(&BigInt, &BigInt) -> bool,
) -> VmResult<()> {
    let x2 = engine.pop()?;
    let x1 = engine.pop()?;
    if x1.is_null() || x2.is_null() {
        return engine.push(StackItem::from_bool(false));
    }
    let result = compare(&x1.as_int()?, &x2.as_int()?);
    engine.push(StackItem::from_bool(result))
}

fn lt(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    ordered(engine, |a, b| a < b)
}

fn le(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    ordered(engine, |a, b| a <= b)
}

fn gt(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    ordered(engine, |a, b| a > b)
}

fn ge(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    ordered(engine, |a, b| a >= b)
}

fn min(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    engine.push(StackItem::Integer(x1.min(x2)))
}

fn max(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let x2 = engine.pop_int()?;
    let x1 = engine.pop_int()?;
    engine.push(StackItem::Integer(x1.max(x2)))
}

fn within(engine: &mut ExecutionEngine, _: &Instruction) -> VmResult<()> {
    let b = engine.pop_int()?;
    let a = engine.pop_int()?;
    let x = engine.pop_int()?;
    engine.push(StackItem::from_bool(a <= x && x < b))
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

    fn top_int(engine: &ExecutionEngine) -> BigInt {
        engine.result_stack().peek(0).unwrap().as_int().unwrap()
    }

    #[test]
    fn add_basic() {
        // PUSH3 PUSH5 ADD == 8.
        let engine = run(vec![0x13, 0x15, 0x9E]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(top_int(&engine), 8.into());
    }

    #[test]
    fn shl_shift_zero_preserves_stack() {
        // PUSH2 PUSH0 SHL leaves 2 on the stack.
        let engine = run(vec![0x12, 0x10, 0xA8]);
        assert_eq!(engine.state(), VMState::HALT);
        assert_eq!(engine.result_stack().len(), 1);
        assert_eq!(top_int(&engine), 2.into());
    }

    #[test]
    fn shift_count_bounds() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(1);
        builder.emit_push_int(257);
        builder.emit(OpCode::SHL);
        let engine = run(builder.into_bytes());
        assert_eq!(engine.state(), VMState::FAULT);
    }

    #[test]
    fn division_truncates_toward_zero() {
        let cases = [
            (7i64, 2i64, 3i64, 1i64),
            (-7, 2, -3, -1),
            (7, -2, -3, 1),
            (-7, -2, 3, -1),
        ];
        for (a, b, quotient, remainder) in cases {
            let mut builder = ScriptBuilder::new();
            builder.emit_push_int(a);
            builder.emit_push_int(b);
            builder.emit(OpCode::DIV);
            assert_eq!(top_int(&run(builder.into_bytes())), quotient.into());

            let mut builder = ScriptBuilder::new();
            builder.emit_push_int(a);
            builder.emit_push_int(b);
            builder.emit(OpCode::MOD);
            assert_eq!(top_int(&run(builder.into_bytes())), remainder.into());
        }
    }

    #[test]
    fn divide_by_zero_faults() {
        let engine = run(vec![0x11, 0x10, 0xA1]);
        assert_eq!(engine.state(), VMState::FAULT);
        assert_eq!(
            engine.fault_reason().unwrap().kind(),
            VmErrorKind::DivideByZero
        );
    }

    #[test]
    fn overflow_faults_immediately() {
        // (2^255 - 1) + 1 exceeds the cap.
        let mut max_bytes = vec![0xFFu8; 31];
        max_bytes.push(0x7F);
        let mut script = vec![OpCode::PUSHINT256 as u8];
        script.extend_from_slice(&max_bytes);
        script.push(OpCode::INC as u8);
        let engine = run(script);
        assert_eq!(engine.state(), VMState::FAULT);
        assert_eq!(engine.fault_reason().unwrap().kind(), VmErrorKind::Overflow);
    }

    #[test]
    fn modpow_inverse() {
        // 3^-1 mod 7 == 5.
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(3);
        builder.emit_push_int(-1);
        builder.emit_push_int(7);
        builder.emit(OpCode::MODPOW);
        assert_eq!(top_int(&run(builder.into_bytes())), 5.into());
    }

    #[test]
    fn sqrt_floor() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(15);
        builder.emit(OpCode::SQRT);
        assert_eq!(top_int(&run(builder.into_bytes())), 3.into());
    }

    #[test]
    fn comparisons_with_null_are_false() {
        let engine = run(vec![
            OpCode::PUSH1 as u8,
            OpCode::PUSHNULL as u8,
            OpCode::LT as u8,
        ]);
        assert!(!engine.result_stack().peek(0).unwrap().as_bool().unwrap());
    }

    #[test]
    fn division_sign_law_sampled() {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let a_len = rng.gen_range(1..=32);
            let b_len = rng.gen_range(1..=16);
            let mut a_bytes = vec![0u8; a_len];
            let mut b_bytes = vec![0u8; b_len];
            rng.fill(&mut a_bytes[..]);
            rng.fill(&mut b_bytes[..]);
            let a = integer::from_bytes_le(&a_bytes);
            let b = integer::from_bytes_le(&b_bytes);
            if b.is_zero() {
                continue;
            }
            let quotient = &a / &b;
            let remainder = &a % &b;
            assert_eq!(&quotient * &b + &remainder, a.clone());
            assert!(remainder.is_zero() || remainder.sign() == a.sign());
        }
    }
}
