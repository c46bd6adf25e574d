//! Structural self-checks for finalized numbering and graph objects.

use crate::assembly_error::AssemblyError;

/// Trait for validating data structure invariants.
pub trait DebugInvariants {
    /// Validate invariants and return the first violation encountered.
    fn validate_invariants(&self) -> Result<(), AssemblyError>;

    /// Panic on the first violation. Only compiled into debug builds or when
    /// invariant checking is enabled; a no-op otherwise.
    fn debug_assert_invariants(&self) {
        #[cfg(any(debug_assertions, feature = "check-invariants"))]
        if let Err(e) = self.validate_invariants() {
            panic!("[invariants] {e}");
        }
    }
}

/// Return an invariant violation as an error when `cond` does not hold.
#[inline]
pub(crate) fn ensure(cond: bool, what: impl FnOnce() -> String) -> Result<(), AssemblyError> {
    if cond {
        Ok(())
    } else {
        Err(AssemblyError::Initialization(format!(
            "invariant violated: {}",
            what()
        )))
    }
}

/// Run a fallible check and panic on error when strict invariant checking is
/// enabled.
#[macro_export]
macro_rules! strict_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(feature = "strict-invariants")]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}
