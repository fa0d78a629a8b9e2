//! Call flags restricting a frame's side effects.

use bitflags::bitflags;

bitflags! {
    /// A bitmask restricting what syscalls and inter-contract calls a frame
    /// may perform. Flags only narrow on the way down a call chain.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CallFlags: u8 {
        const NONE = 0;
        const READ_STATES = 0b0000_0001;
        const WRITE_STATES = 0b0000_0010;
        const ALLOW_CALL = 0b0000_0100;
        const ALLOW_NOTIFY = 0b0000_1000;
        const STATES = Self::READ_STATES.bits() | Self::WRITE_STATES.bits();
        const READ_ONLY = Self::READ_STATES.bits() | Self::ALLOW_CALL.bits();
        const ALL = Self::STATES.bits() | Self::ALLOW_CALL.bits() | Self::ALLOW_NOTIFY.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_checks() {
        assert!(CallFlags::ALL.contains(CallFlags::READ_ONLY));
        assert!(CallFlags::READ_ONLY.contains(CallFlags::READ_STATES));
        assert!(!CallFlags::READ_ONLY.contains(CallFlags::WRITE_STATES));
        assert!(CallFlags::NONE.is_empty());
    }

    #[test]
    fn undefined_bits_rejected() {
        assert!(CallFlags::from_bits(0x10).is_none());
        assert_eq!(CallFlags::from_bits(0x0F), Some(CallFlags::ALL));
    }
}
