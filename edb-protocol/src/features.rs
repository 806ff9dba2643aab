//! Negotiated wire-protocol version.
//!
//! Two eras matter to the rest of the crate: *0.x*, where headers are
//! `uint16`-keyed bytes and scripts go through `ExecuteScript`, and
//! *1.x/2.x/3.x*, where headers are `string/string` pairs and Parse/Execute
//! is unified. `is_1()` is the split point the rest of the codebase branches
//! on.

use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProtocolVersion {
    pub(crate) major_ver: u16,
    pub(crate) minor_ver: u16,
}

/// Lowest version this core will negotiate down to.
pub const MIN_SUPPORTED: ProtocolVersion = ProtocolVersion {
    major_ver: 0,
    minor_ver: 13,
};

/// Version this core proposes in the `ClientHandshake`.
pub const HANDSHAKE_TARGET: ProtocolVersion = ProtocolVersion {
    major_ver: 3,
    minor_ver: 0,
};

impl ProtocolVersion {
    pub fn current() -> ProtocolVersion {
        HANDSHAKE_TARGET
    }

    pub fn new(major_ver: u16, minor_ver: u16) -> ProtocolVersion {
        ProtocolVersion {
            major_ver,
            minor_ver,
        }
    }

    pub fn version_tuple(&self) -> (u16, u16) {
        (self.major_ver, self.minor_ver)
    }

    /// True for the legacy 0.x era: uint16 headers, `ExecuteScript`.
    pub fn is_0(&self) -> bool {
        self.major_ver == 0
    }

    /// True for the unified Parse/Execute era (1.x and above).
    pub fn is_1(&self) -> bool {
        self.major_ver >= 1
    }

    pub fn is_3(&self) -> bool {
        self.major_ver >= 3
    }

    /// True once `input_language` (EdgeQL vs SQL) appears on the wire.
    pub fn is_multilingual(&self) -> bool {
        self.is_at_least(3, 0)
    }

    pub fn is_at_least(&self, major_ver: u16, minor_ver: u16) -> bool {
        *self >= ProtocolVersion::new(major_ver, minor_ver)
    }

    pub fn is_at_most(&self, major_ver: u16, minor_ver: u16) -> bool {
        *self <= ProtocolVersion::new(major_ver, minor_ver)
    }

    pub fn is_supported(&self) -> bool {
        *self >= MIN_SUPPORTED && *self <= HANDSHAKE_TARGET
    }
}

impl PartialOrd for ProtocolVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProtocolVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major_ver, self.minor_ver).cmp(&(other.major_ver, other.minor_ver))
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major_ver, self.minor_ver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering() {
        assert!(ProtocolVersion::new(0, 13) < ProtocolVersion::new(1, 0));
        assert!(ProtocolVersion::new(1, 0) < ProtocolVersion::new(3, 0));
        assert!(ProtocolVersion::new(2, 5) < ProtocolVersion::new(3, 0));
    }

    #[test]
    fn support_window() {
        assert!(ProtocolVersion::new(0, 13).is_supported());
        assert!(ProtocolVersion::new(3, 0).is_supported());
        assert!(!ProtocolVersion::new(0, 12).is_supported());
        assert!(!ProtocolVersion::new(3, 1).is_supported());
    }

    #[test]
    fn era_split() {
        assert!(ProtocolVersion::new(0, 13).is_0());
        assert!(!ProtocolVersion::new(0, 13).is_1());
        assert!(ProtocolVersion::new(1, 0).is_1());
        assert!(ProtocolVersion::new(3, 0).is_multilingual());
        assert!(!ProtocolVersion::new(2, 0).is_multilingual());
    }
}
