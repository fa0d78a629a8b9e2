//! Hard execution limits.

use crate::error::{VmError, VmResult};

/// Restrictions bounding every execution. Breaching any limit faults the
/// engine with `LimitExceeded` (or `InvalidArgument` for bad shift counts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionEngineLimits {
    /// Maximum live items across all stacks, slots and compounds.
    pub max_stack_size: usize,
    /// Maximum byte length of any ByteString or Buffer.
    pub max_item_size: usize,
    /// Maximum depth of the invocation stack.
    pub max_invocation_stack_size: usize,
    /// Maximum nesting of TRY frames per context.
    pub max_try_nesting_depth: usize,
    /// Maximum shift count for SHL/SHR (and exponent for POW).
    pub max_shift: u32,
    /// Maximum counted bytes for recursive structural equality.
    pub max_comparable_size: usize,
}

impl Default for ExecutionEngineLimits {
    fn default() -> Self {
        Self {
            max_stack_size: 2048,
            max_item_size: 1024 * 1024,
            max_invocation_stack_size: 1024,
            max_try_nesting_depth: 16,
            max_shift: 256,
            max_comparable_size: 65536,
        }
    }
}

impl ExecutionEngineLimits {
    /// Checks a ByteString/Buffer length.
    pub fn assert_max_item_size(&self, size: usize) -> VmResult<()> {
        if size > self.max_item_size {
            return Err(VmError::LimitExceeded {
                what: "item size",
                value: size,
                limit: self.max_item_size,
            });
        }
        Ok(())
    }

    /// Checks a shift count (also used as the POW exponent bound).
    pub fn assert_shift(&self, shift: i64) -> VmResult<()> {
        if shift < 0 || shift > i64::from(self.max_shift) {
            return Err(VmError::invalid_argument(format!(
                "shift count {shift} out of range 0..={}",
                self.max_shift
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_protocol_values() {
        let limits = ExecutionEngineLimits::default();
        assert_eq!(limits.max_stack_size, 2048);
        assert_eq!(limits.max_item_size, 1_048_576);
        assert_eq!(limits.max_invocation_stack_size, 1024);
        assert_eq!(limits.max_try_nesting_depth, 16);
        assert_eq!(limits.max_shift, 256);
        assert_eq!(limits.max_comparable_size, 65536);
    }

    #[test]
    fn shift_bounds() {
        let limits = ExecutionEngineLimits::default();
        assert!(limits.assert_shift(0).is_ok());
        assert!(limits.assert_shift(256).is_ok());
        assert!(limits.assert_shift(257).is_err());
        assert!(limits.assert_shift(-1).is_err());
    }
}
