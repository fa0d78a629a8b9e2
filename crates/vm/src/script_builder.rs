//! Script assembly helper.

use crate::error::{VmError, VmResult};
use crate::op_code::OpCode;
use crate::script::Script;
use crate::stack_item::integer;
use num_bigint::BigInt;

/// Builds scripts opcode by opcode, picking the shortest push encodings.
#[derive(Debug, Default, Clone)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    /// Creates an empty builder.
    pub fn new() -> ScriptBuilder {
        ScriptBuilder::default()
    }

    /// Current length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether nothing was emitted yet.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Emits a bare opcode.
    pub fn emit(&mut self, opcode: OpCode) -> &mut Self {
        self.bytes.push(opcode as u8);
        self
    }

    /// Emits an opcode followed by raw operand bytes.
    pub fn emit_with_operand(&mut self, opcode: OpCode, operand: &[u8]) -> &mut Self {
        self.bytes.push(opcode as u8);
        self.bytes.extend_from_slice(operand);
        self
    }

    /// Emits the shortest push for an integer.
    pub fn emit_push_int<T: Into<BigInt>>(&mut self, value: T) -> &mut Self {
        let value = value.into();
        if value >= BigInt::from(-1) && value <= BigInt::from(16) {
            let small = i64::try_from(value).expect("value in small range");
            let opcode = (OpCode::PUSH0 as i64 + small) as u8;
            self.bytes.push(opcode);
            return self;
        }
        let bytes = integer::to_bytes_le(&value);
        let (opcode, width) = match bytes.len() {
            0..=1 => (OpCode::PUSHINT8, 1),
            2 => (OpCode::PUSHINT16, 2),
            3..=4 => (OpCode::PUSHINT32, 4),
            5..=8 => (OpCode::PUSHINT64, 8),
            9..=16 => (OpCode::PUSHINT128, 16),
            _ => (OpCode::PUSHINT256, 32),
        };
        self.bytes.push(opcode as u8);
        let mut operand = bytes;
        let sign_fill = if value.sign() == num_bigint::Sign::Minus {
            0xFF
        } else {
            0x00
        };
        operand.resize(width, sign_fill);
        self.bytes.extend_from_slice(&operand);
        self
    }

    /// Emits a boolean push.
    pub fn emit_push_bool(&mut self, value: bool) -> &mut Self {
        self.emit(if value { OpCode::PUSHT } else { OpCode::PUSHF })
    }

    /// Emits a data push with the shortest PUSHDATA form.
    pub fn emit_push_bytes(&mut self, data: &[u8]) -> &mut Self {
        if data.len() <= u8::MAX as usize {
            self.bytes.push(OpCode::PUSHDATA1 as u8);
            self.bytes.push(data.len() as u8);
        } else if data.len() <= u16::MAX as usize {
            self.bytes.push(OpCode::PUSHDATA2 as u8);
            self.bytes.extend_from_slice(&(data.len() as u16).to_le_bytes());
        } else {
            self.bytes.push(OpCode::PUSHDATA4 as u8);
            self.bytes.extend_from_slice(&(data.len() as u32).to_le_bytes());
        }
        self.bytes.extend_from_slice(data);
        self
    }

    /// Emits a UTF-8 string push.
    pub fn emit_push_string(&mut self, value: &str) -> &mut Self {
        self.emit_push_bytes(value.as_bytes())
    }

    /// Emits a SYSCALL with the given id.
    pub fn emit_syscall(&mut self, id: u32) -> &mut Self {
        self.bytes.push(OpCode::SYSCALL as u8);
        self.bytes.extend_from_slice(&id.to_le_bytes());
        self
    }

    /// Emits a long-form jump with a 32-bit offset.
    pub fn emit_jump(&mut self, opcode: OpCode, offset: i32) -> VmResult<&mut Self> {
        match opcode {
            OpCode::JMP_L
            | OpCode::JMPIF_L
            | OpCode::JMPIFNOT_L
            | OpCode::JMPEQ_L
            | OpCode::JMPNE_L
            | OpCode::JMPGT_L
            | OpCode::JMPGE_L
            | OpCode::JMPLT_L
            | OpCode::JMPLE_L
            | OpCode::CALL_L => {
                self.bytes.push(opcode as u8);
                self.bytes.extend_from_slice(&offset.to_le_bytes());
                Ok(self)
            }
            other => Err(VmError::invalid_argument(format!(
                "{} is not a long-form jump",
                other.name()
            ))),
        }
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes the builder into the script bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Consumes the builder into a `Script`.
    pub fn into_script(self) -> Script {
        Script::new(self.bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_ints_use_single_byte() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(-1);
        builder.emit_push_int(0);
        builder.emit_push_int(16);
        assert_eq!(
            builder.as_bytes(),
            &[
                OpCode::PUSHM1 as u8,
                OpCode::PUSH0 as u8,
                OpCode::PUSH16 as u8
            ]
        );
    }

    #[test]
    fn wider_ints_sign_extend() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(-200);
        assert_eq!(builder.as_bytes()[0], OpCode::PUSHINT16 as u8);
        assert_eq!(&builder.as_bytes()[1..], &[0x38, 0xFF]);
    }

    #[test]
    fn pushdata_form_follows_length() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_bytes(&[0u8; 300]);
        assert_eq!(builder.as_bytes()[0], OpCode::PUSHDATA2 as u8);
        assert_eq!(&builder.as_bytes()[1..3], &[0x2C, 0x01]);
    }

    #[test]
    fn built_scripts_decode() {
        let mut builder = ScriptBuilder::new();
        builder.emit_push_int(123456);
        builder.emit_push_string("neo");
        builder.emit_syscall(0xDEADBEEF);
        builder.emit(OpCode::RET);
        assert!(Script::new_strict(builder.into_bytes()).is_ok());
    }
}
