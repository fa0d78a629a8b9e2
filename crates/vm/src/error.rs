//! VM error taxonomy.
//!
//! Every failure the interpreter can produce maps onto one kind from a
//! closed set. Only `THROW`-raised items are catchable by TRY frames; all
//! other kinds fault the engine directly.

use thiserror::Error;

/// The closed set of failure kinds, used in receipts and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VmErrorKind {
    StackUnderflow,
    TypeMismatch,
    InvalidArgument,
    Overflow,
    DivideByZero,
    OutOfRange,
    OutOfGas,
    LimitExceeded,
    InvalidOpcode,
    BadScriptHash,
    PermissionDenied,
    ContractNotFound,
    MethodNotFound,
    InactiveMethod,
    Uncaught,
    Abort,
    InvalidOperation,
}

impl std::fmt::Display for VmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// VM execution errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VmError {
    /// Pop or peek past the bottom of a stack.
    #[error("stack underflow: requested {requested}, available {available}")]
    StackUnderflow { requested: usize, available: usize },

    /// An operand had an unexpected variant.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// An operand was in the right variant but out of domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An integer result exceeded the 32-byte cap.
    #[error("integer overflow in {operation}")]
    Overflow { operation: &'static str },

    /// DIV or MOD with a zero divisor.
    #[error("division by zero")]
    DivideByZero,

    /// An index or length ran past a sequence bound.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// Gas consumption would exceed the gas limit.
    #[error("out of gas")]
    OutOfGas,

    /// A hard execution limit was breached.
    #[error("limit exceeded: {what} {value} > {limit}")]
    LimitExceeded {
        what: &'static str,
        value: usize,
        limit: usize,
    },

    /// Undefined opcode byte or malformed operand encoding.
    #[error("invalid opcode {opcode:#04x}: {reason}")]
    InvalidOpcode { opcode: u8, reason: String },

    /// A hash operand had the wrong width.
    #[error("bad script hash: expected {expected} bytes, got {actual}")]
    BadScriptHash { expected: usize, actual: usize },

    /// Call-flag or manifest permission violation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The target contract does not exist.
    #[error("contract not found: {0}")]
    ContractNotFound(String),

    /// The target method does not exist on the contract.
    #[error("method not found: {0}")]
    MethodNotFound(String),

    /// The method exists but is not active at the current height.
    #[error("method not active: {0}")]
    InactiveMethod(String),

    /// A THROW escaped every try frame.
    #[error("unhandled exception: {0}")]
    Uncaught(String),

    /// ABORT or a failed ASSERT; never consults try frames.
    #[error("abort: {0}")]
    Abort(String),

    /// The engine was asked to do something its state forbids.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl VmError {
    /// The closed kind this error belongs to.
    pub fn kind(&self) -> VmErrorKind {
        match self {
            VmError::StackUnderflow { .. } => VmErrorKind::StackUnderflow,
            VmError::TypeMismatch { .. } => VmErrorKind::TypeMismatch,
            VmError::InvalidArgument(_) => VmErrorKind::InvalidArgument,
            VmError::Overflow { .. } => VmErrorKind::Overflow,
            VmError::DivideByZero => VmErrorKind::DivideByZero,
            VmError::OutOfRange(_) => VmErrorKind::OutOfRange,
            VmError::OutOfGas => VmErrorKind::OutOfGas,
            VmError::LimitExceeded { .. } => VmErrorKind::LimitExceeded,
            VmError::InvalidOpcode { .. } => VmErrorKind::InvalidOpcode,
            VmError::BadScriptHash { .. } => VmErrorKind::BadScriptHash,
            VmError::PermissionDenied(_) => VmErrorKind::PermissionDenied,
            VmError::ContractNotFound(_) => VmErrorKind::ContractNotFound,
            VmError::MethodNotFound(_) => VmErrorKind::MethodNotFound,
            VmError::InactiveMethod(_) => VmErrorKind::InactiveMethod,
            VmError::Uncaught(_) => VmErrorKind::Uncaught,
            VmError::Abort(_) => VmErrorKind::Abort,
            VmError::InvalidOperation(_) => VmErrorKind::InvalidOperation,
        }
    }

    /// Creates an [`VmError::InvalidOperation`].
    pub fn invalid_operation<S: Into<String>>(message: S) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Creates an [`VmError::InvalidArgument`].
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates an [`VmError::OutOfRange`].
    pub fn out_of_range<S: Into<String>>(message: S) -> Self {
        Self::OutOfRange(message.into())
    }
}

/// Result alias for VM operations.
pub type VmResult<T> = std::result::Result<T, VmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(VmError::DivideByZero.kind(), VmErrorKind::DivideByZero);
        assert_eq!(VmError::OutOfGas.kind(), VmErrorKind::OutOfGas);
        assert_eq!(
            VmError::Overflow { operation: "ADD" }.kind(),
            VmErrorKind::Overflow
        );
    }
}
