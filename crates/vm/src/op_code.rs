//! The NeoVM opcode set (v3.9.1) with operand layouts and base prices.

use crate::error::{VmError, VmResult};

/// How an opcode's operand is encoded after the opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandLayout {
    /// No operand.
    None,
    /// A fixed number of operand bytes.
    Fixed(usize),
    /// A little-endian length prefix of the given width, then that many
    /// data bytes.
    Prefixed(usize),
}

macro_rules! op_codes {
    ($( $name:ident = $value:literal, $operand:expr, $price:literal; )*) => {
        /// One-byte NeoVM instruction opcodes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        #[allow(non_camel_case_types)]
        pub enum OpCode {
            $( $name = $value, )*
        }

        impl OpCode {
            /// Decodes an opcode byte.
            pub fn from_byte(byte: u8) -> VmResult<OpCode> {
                match byte {
                    $( $value => Ok(OpCode::$name), )*
                    other => Err(VmError::InvalidOpcode {
                        opcode: other,
                        reason: "undefined opcode".into(),
                    }),
                }
            }

            /// The operand layout following the opcode byte.
            pub fn operand_layout(&self) -> OperandLayout {
                match self {
                    $( OpCode::$name => $operand, )*
                }
            }

            /// The base execution price in datoshi, before the execution
            /// fee factor. Zero-priced opcodes charge elsewhere (SYSCALL
            /// per descriptor, CALLT per token target) or terminate.
            pub fn price(&self) -> i64 {
                match self {
                    $( OpCode::$name => $price, )*
                }
            }

            /// The instruction name.
            pub fn name(&self) -> &'static str {
                match self {
                    $( OpCode::$name => stringify!($name), )*
                }
            }
        }
    };
}

use OperandLayout::{Fixed, None as NoOperand, Prefixed};

op_codes! {
    // Constants
    PUSHINT8 = 0x00, Fixed(1), 1;
    PUSHINT16 = 0x01, Fixed(2), 1;
    PUSHINT32 = 0x02, Fixed(4), 1;
    PUSHINT64 = 0x03, Fixed(8), 1;
    PUSHINT128 = 0x04, Fixed(16), 4;
    PUSHINT256 = 0x05, Fixed(32), 4;
    PUSHT = 0x08, NoOperand, 1;
    PUSHF = 0x09, NoOperand, 1;
    PUSHA = 0x0A, Fixed(4), 4;
    PUSHNULL = 0x0B, NoOperand, 1;
    PUSHDATA1 = 0x0C, Prefixed(1), 8;
    PUSHDATA2 = 0x0D, Prefixed(2), 512;
    PUSHDATA4 = 0x0E, Prefixed(4), 4096;
    PUSHM1 = 0x0F, NoOperand, 1;
    PUSH0 = 0x10, NoOperand, 1;
    PUSH1 = 0x11, NoOperand, 1;
    PUSH2 = 0x12, NoOperand, 1;
    PUSH3 = 0x13, NoOperand, 1;
    PUSH4 = 0x14, NoOperand, 1;
    PUSH5 = 0x15, NoOperand, 1;
    PUSH6 = 0x16, NoOperand, 1;
    PUSH7 = 0x17, NoOperand, 1;
    PUSH8 = 0x18, NoOperand, 1;
    PUSH9 = 0x19, NoOperand, 1;
    PUSH10 = 0x1A, NoOperand, 1;
    PUSH11 = 0x1B, NoOperand, 1;
    PUSH12 = 0x1C, NoOperand, 1;
    PUSH13 = 0x1D, NoOperand, 1;
    PUSH14 = 0x1E, NoOperand, 1;
    PUSH15 = 0x1F, NoOperand, 1;
    PUSH16 = 0x20, NoOperand, 1;

    // Flow control
    NOP = 0x21, NoOperand, 1;
    JMP = 0x22, Fixed(1), 2;
    JMP_L = 0x23, Fixed(4), 2;
    JMPIF = 0x24, Fixed(1), 2;
    JMPIF_L = 0x25, Fixed(4), 2;
    JMPIFNOT = 0x26, Fixed(1), 2;
    JMPIFNOT_L = 0x27, Fixed(4), 2;
    JMPEQ = 0x28, Fixed(1), 2;
    JMPEQ_L = 0x29, Fixed(4), 2;
    JMPNE = 0x2A, Fixed(1), 2;
    JMPNE_L = 0x2B, Fixed(4), 2;
    JMPGT = 0x2C, Fixed(1), 2;
    JMPGT_L = 0x2D, Fixed(4), 2;
    JMPGE = 0x2E, Fixed(1), 2;
    JMPGE_L = 0x2F, Fixed(4), 2;
    JMPLT = 0x30, Fixed(1), 2;
    JMPLT_L = 0x31, Fixed(4), 2;
    JMPLE = 0x32, Fixed(1), 2;
    JMPLE_L = 0x33, Fixed(4), 2;
    CALL = 0x34, Fixed(1), 512;
    CALL_L = 0x35, Fixed(4), 512;
    CALLA = 0x36, NoOperand, 512;
    CALLT = 0x37, Fixed(2), 32768;
    ABORT = 0x38, NoOperand, 0;
    ASSERT = 0x39, NoOperand, 1;
    THROW = 0x3A, NoOperand, 512;
    TRY = 0x3B, Fixed(2), 4;
    TRY_L = 0x3C, Fixed(8), 4;
    ENDTRY = 0x3D, Fixed(1), 4;
    ENDTRY_L = 0x3E, Fixed(4), 4;
    ENDFINALLY = 0x3F, NoOperand, 4;
    RET = 0x40, NoOperand, 0;
    SYSCALL = 0x41, Fixed(4), 0;

    // Stack
    DEPTH = 0x43, NoOperand, 2;
    DROP = 0x45, NoOperand, 2;
    NIP = 0x46, NoOperand, 2;
    XDROP = 0x48, NoOperand, 16;
    CLEAR = 0x49, NoOperand, 16;
    DUP = 0x4A, NoOperand, 2;
    OVER = 0x4B, NoOperand, 2;
    PICK = 0x4D, NoOperand, 2;
    TUCK = 0x4E, NoOperand, 2;
    SWAP = 0x50, NoOperand, 2;
    ROT = 0x51, NoOperand, 2;
    ROLL = 0x52, NoOperand, 16;
    REVERSE3 = 0x53, NoOperand, 2;
    REVERSE4 = 0x54, NoOperand, 2;
    REVERSEN = 0x55, NoOperand, 16;

    // Slot
    INITSSLOT = 0x56, Fixed(1), 16;
    INITSLOT = 0x57, Fixed(2), 64;
    LDSFLD0 = 0x58, NoOperand, 2;
    LDSFLD1 = 0x59, NoOperand, 2;
    LDSFLD2 = 0x5A, NoOperand, 2;
    LDSFLD3 = 0x5B, NoOperand, 2;
    LDSFLD4 = 0x5C, NoOperand, 2;
    LDSFLD5 = 0x5D, NoOperand, 2;
    LDSFLD6 = 0x5E, NoOperand, 2;
    LDSFLD = 0x5F, Fixed(1), 2;
    STSFLD0 = 0x60, NoOperand, 2;
    STSFLD1 = 0x61, NoOperand, 2;
    STSFLD2 = 0x62, NoOperand, 2;
    STSFLD3 = 0x63, NoOperand, 2;
    STSFLD4 = 0x64, NoOperand, 2;
    STSFLD5 = 0x65, NoOperand, 2;
    STSFLD6 = 0x66, NoOperand, 2;
    STSFLD = 0x67, Fixed(1), 2;
    LDLOC0 = 0x68, NoOperand, 2;
    LDLOC1 = 0x69, NoOperand, 2;
    LDLOC2 = 0x6A, NoOperand, 2;
    LDLOC3 = 0x6B, NoOperand, 2;
    LDLOC4 = 0x6C, NoOperand, 2;
    LDLOC5 = 0x6D, NoOperand, 2;
    LDLOC6 = 0x6E, NoOperand, 2;
    LDLOC = 0x6F, Fixed(1), 2;
    STLOC0 = 0x70, NoOperand, 2;
    STLOC1 = 0x71, NoOperand, 2;
    STLOC2 = 0x72, NoOperand, 2;
    STLOC3 = 0x73, NoOperand, 2;
    STLOC4 = 0x74, NoOperand, 2;
    STLOC5 = 0x75, NoOperand, 2;
    STLOC6 = 0x76, NoOperand, 2;
    STLOC = 0x77, Fixed(1), 2;
    LDARG0 = 0x78, NoOperand, 2;
    LDARG1 = 0x79, NoOperand, 2;
    LDARG2 = 0x7A, NoOperand, 2;
    LDARG3 = 0x7B, NoOperand, 2;
    LDARG4 = 0x7C, NoOperand, 2;
    LDARG5 = 0x7D, NoOperand, 2;
    LDARG6 = 0x7E, NoOperand, 2;
    LDARG = 0x7F, Fixed(1), 2;
    STARG0 = 0x80, NoOperand, 2;
    STARG1 = 0x81, NoOperand, 2;
    STARG2 = 0x82, NoOperand, 2;
    STARG3 = 0x83, NoOperand, 2;
    STARG4 = 0x84, NoOperand, 2;
    STARG5 = 0x85, NoOperand, 2;
    STARG6 = 0x86, NoOperand, 2;
    STARG = 0x87, Fixed(1), 2;

    // Splice
    NEWBUFFER = 0x88, NoOperand, 256;
    MEMCPY = 0x89, NoOperand, 2048;
    CAT = 0x8B, NoOperand, 2048;
    SUBSTR = 0x8C, NoOperand, 2048;
    LEFT = 0x8D, NoOperand, 2048;
    RIGHT = 0x8E, NoOperand, 2048;

    // Bitwise
    INVERT = 0x90, NoOperand, 4;
    AND = 0x91, NoOperand, 8;
    OR = 0x92, NoOperand, 8;
    XOR = 0x93, NoOperand, 8;
    EQUAL = 0x97, NoOperand, 32;
    NOTEQUAL = 0x98, NoOperand, 32;

    // Numeric
    SIGN = 0x99, NoOperand, 4;
    ABS = 0x9A, NoOperand, 4;
    NEGATE = 0x9B, NoOperand, 4;
    INC = 0x9C, NoOperand, 4;
    DEC = 0x9D, NoOperand, 4;
    ADD = 0x9E, NoOperand, 8;
    SUB = 0x9F, NoOperand, 8;
    MUL = 0xA0, NoOperand, 8;
    DIV = 0xA1, NoOperand, 8;
    MOD = 0xA2, NoOperand, 8;
    POW = 0xA3, NoOperand, 64;
    SQRT = 0xA4, NoOperand, 64;
    MODMUL = 0xA5, NoOperand, 32;
    MODPOW = 0xA6, NoOperand, 2048;
    SHL = 0xA8, NoOperand, 8;
    SHR = 0xA9, NoOperand, 8;
    NOT = 0xAA, NoOperand, 4;
    BOOLAND = 0xAB, NoOperand, 8;
    BOOLOR = 0xAC, NoOperand, 8;
    NZ = 0xB1, NoOperand, 4;
    NUMEQUAL = 0xB3, NoOperand, 8;
    NUMNOTEQUAL = 0xB4, NoOperand, 8;
    LT = 0xB5, NoOperand, 8;
    LE = 0xB6, NoOperand, 8;
    GT = 0xB7, NoOperand, 8;
    GE = 0xB8, NoOperand, 8;
    MIN = 0xB9, NoOperand, 8;
    MAX = 0xBA, NoOperand, 8;
    WITHIN = 0xBB, NoOperand, 8;

    // Compound
    PACKMAP = 0xBE, NoOperand, 2048;
    PACKSTRUCT = 0xBF, NoOperand, 2048;
    PACK = 0xC0, NoOperand, 2048;
    UNPACK = 0xC1, NoOperand, 2048;
    NEWARRAY0 = 0xC2, NoOperand, 16;
    NEWARRAY = 0xC3, NoOperand, 512;
    NEWARRAY_T = 0xC4, Fixed(1), 512;
    NEWSTRUCT0 = 0xC5, NoOperand, 16;
    NEWSTRUCT = 0xC6, NoOperand, 512;
    NEWMAP = 0xC8, NoOperand, 8;
    SIZE = 0xCA, NoOperand, 4;
    HASKEY = 0xCB, NoOperand, 64;
    KEYS = 0xCC, NoOperand, 16;
    VALUES = 0xCD, NoOperand, 8192;
    PICKITEM = 0xCE, NoOperand, 64;
    APPEND = 0xCF, NoOperand, 8192;
    SETITEM = 0xD0, NoOperand, 8192;
    REVERSEITEMS = 0xD1, NoOperand, 8192;
    REMOVE = 0xD2, NoOperand, 16;
    CLEARITEMS = 0xD3, NoOperand, 16;
    POPITEM = 0xD4, NoOperand, 16;

    // Types
    ISNULL = 0xD8, NoOperand, 2;
    ISTYPE = 0xD9, Fixed(1), 2;
    CONVERT = 0xDB, Fixed(1), 8192;
    ABORTMSG = 0xE0, NoOperand, 0;
    ASSERTMSG = 0xE1, NoOperand, 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_bytes() {
        assert_eq!(OpCode::from_byte(0x9E).unwrap(), OpCode::ADD);
        assert_eq!(OpCode::ADD as u8, 0x9E);
        assert_eq!(OpCode::from_byte(0x40).unwrap(), OpCode::RET);
        assert!(OpCode::from_byte(0xFF).is_err());
        assert!(OpCode::from_byte(0x42).is_err());
    }

    #[test]
    fn operand_layouts() {
        assert_eq!(OpCode::PUSHDATA1.operand_layout(), OperandLayout::Prefixed(1));
        assert_eq!(OpCode::PUSHINT256.operand_layout(), OperandLayout::Fixed(32));
        assert_eq!(OpCode::TRY_L.operand_layout(), OperandLayout::Fixed(8));
        assert_eq!(OpCode::ADD.operand_layout(), OperandLayout::None);
        assert_eq!(OpCode::SYSCALL.operand_layout(), OperandLayout::Fixed(4));
    }

    #[test]
    fn terminators_are_free() {
        assert_eq!(OpCode::ABORT.price(), 0);
        assert_eq!(OpCode::RET.price(), 0);
        assert_eq!(OpCode::SYSCALL.price(), 0);
        assert!(OpCode::CONVERT.price() > OpCode::ADD.price());
    }
}
