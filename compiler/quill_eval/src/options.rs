//! Option, missing-key and context-source flags.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Extended template features.
    ///
    /// Enabling an option registers its error-manager group and/or its
    /// functions on the template.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct Options: u8 {
        /// `$x.fn args` calls function `fn` with `$x` as its first argument.
        const FUNCTIONS_AS_METHODS = 1 << 0;
        /// Functions and methods may return nothing, several values, or only
        /// an error.
        const NON_STANDARD_RESULTS = 1 << 1;
        /// `Fn` resolves to function `fn` when no `Fn` exists.
        const PUBLIC_FUNCTIONS = 1 << 2;
        /// Adds `trap`, which turns failing calls into error values.
        const TRAP = 1 << 3;
        /// Adds `break`, `continue` and `return`.
        const FLOW_CONTROL = 1 << 4;

        const ALL = Self::FUNCTIONS_AS_METHODS.bits()
            | Self::NON_STANDARD_RESULTS.bits()
            | Self::PUBLIC_FUNCTIONS.bits()
            | Self::TRAP.bits()
            | Self::FLOW_CONTROL.bits();
    }
}

bitflags! {
    /// Behaviour on a map lookup that misses.
    ///
    /// Exactly one mode is active on a template; managers use the flags as
    /// a mask of the modes they apply to.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct MissingMode: u8 {
        /// Yield an invalid value, rendered `<no value>`.
        const INVALID = 1 << 0;
        /// Yield the zero value of the map's element type.
        const ZERO_VALUE = 1 << 1;
        /// Fail the render.
        const ERROR = 1 << 2;

        const DEFAULT = Self::INVALID.bits();
    }
}

impl Default for MissingMode {
    fn default() -> Self {
        MissingMode::DEFAULT
    }
}

impl fmt::Display for MissingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_names(
            f,
            self.bits(),
            &[
                (Self::INVALID.bits(), "Default"),
                (Self::ZERO_VALUE.bits(), "ZeroValue"),
                (Self::ERROR.bits(), "Error"),
            ],
        )
    }
}

bitflags! {
    /// Why an evaluation context was created.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct ContextSource: u8 {
        /// A field, key or method lookup failed.
        const FIELD = 1 << 0;
        /// A function or method call failed.
        const CALL = 1 << 1;
        /// The failing member received a piped value.
        const PIPELINE = 1 << 2;
        /// A value is about to be printed.
        const PRINT = 1 << 3;
    }
}

impl fmt::Display for ContextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_names(
            f,
            self.bits(),
            &[
                (Self::FIELD.bits(), "Field"),
                (Self::CALL.bits(), "Call"),
                (Self::PIPELINE.bits(), "Pipeline"),
                (Self::PRINT.bits(), "Print"),
            ],
        )
    }
}

fn write_names(f: &mut fmt::Formatter<'_>, bits: u8, names: &[(u8, &str)]) -> fmt::Result {
    if bits == 0 {
        return f.write_str("None");
    }
    let mut first = true;
    for (bit, name) in names {
        if bits & bit != 0 {
            if !first {
                f.write_str(",")?;
            }
            f.write_str(name)?;
            first = false;
        }
    }
    if first {
        f.write_str("Undefined")?;
    }
    Ok(())
}

/// Reserved group names. `^` sorts after upper-case but before lower-case
/// letters, so these run ahead of lower-case user groups.
pub mod group {
    pub const FUNCS_AS_METHODS: &str = "^0_FuncsAsMethods";
    pub const PUBLIC_FUNCS: &str = "^1_PublicFuncs";
    pub const NON_STANDARD_RESULTS: &str = "^2_NonStandardResults";
    pub const CALL_FAIL: &str = "^3_CallFail";
}
