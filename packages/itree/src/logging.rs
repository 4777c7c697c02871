//! Compile-time gated trace logging for the equivalence engine.

/// Emit per-pair engine traces only when the `eqv_debug_logs` Cargo feature
/// is enabled.
///
/// With the feature disabled (default), this macro compiles to a no-op while
/// still type-checking format arguments. When enabled, records go through
/// `log::trace!` under the `itree::engine` target.
#[macro_export]
macro_rules! eqv_trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "eqv_debug_logs")]
        {
            $crate::__log::trace!(target: "itree::engine", $($arg)*);
        }
        #[cfg(not(feature = "eqv_debug_logs"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}
