//! Function registration flags

use std::ffi::c_int;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use libsqlite3_sys as ffi;
use serde::Serialize;

/// Flags passed to the engine when a function is registered
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionFlags(c_int);

impl FunctionFlags {
    /// Text arguments and results are UTF-8
    pub const UTF8: FunctionFlags = FunctionFlags(ffi::SQLITE_UTF8);
    /// Same arguments always produce the same result
    pub const DETERMINISTIC: FunctionFlags = FunctionFlags(ffi::SQLITE_DETERMINISTIC);
    /// Only callable from top-level SQL, not from triggers or views
    pub const DIRECTONLY: FunctionFlags = FunctionFlags(ffi::SQLITE_DIRECTONLY);
    /// No side effects and no information leaks
    pub const INNOCUOUS: FunctionFlags = FunctionFlags(ffi::SQLITE_INNOCUOUS);

    /// No flags set
    pub const fn empty() -> Self {
        FunctionFlags(0)
    }

    /// Raw engine bits
    pub const fn bits(self) -> c_int {
        self.0
    }

    /// Check whether every flag in `other` is set
    pub const fn contains(self, other: FunctionFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for FunctionFlags {
    fn default() -> Self {
        FunctionFlags::UTF8 | FunctionFlags::DETERMINISTIC
    }
}

impl BitOr for FunctionFlags {
    type Output = FunctionFlags;

    fn bitor(self, rhs: FunctionFlags) -> FunctionFlags {
        FunctionFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for FunctionFlags {
    fn bitor_assign(&mut self, rhs: FunctionFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for FunctionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (FunctionFlags::UTF8, "UTF8"),
            (FunctionFlags::DETERMINISTIC, "DETERMINISTIC"),
            (FunctionFlags::DIRECTONLY, "DIRECTONLY"),
            (FunctionFlags::INNOCUOUS, "INNOCUOUS"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
        write!(f, "FunctionFlags({})", names.join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        let flags = FunctionFlags::default();
        assert!(flags.contains(FunctionFlags::UTF8));
        assert!(flags.contains(FunctionFlags::DETERMINISTIC));
        assert!(!flags.contains(FunctionFlags::DIRECTONLY));
        assert_eq!(
            format!("{:?}", flags),
            "FunctionFlags(UTF8 | DETERMINISTIC)"
        );
    }
}
