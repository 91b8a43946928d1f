// ABOUTME: Configuration and constants for the SQALE interpreter

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source file extension for SQALE modules.
pub const SOURCE_EXT: &str = ".sq";

/// Base directories searched for `[import "a.b"]`-style modules, in order.
pub const MODULE_SEARCH_BASES: &[&str] =
    &["./", "packages/", "std/", "sqale/packages/", "sqale/std/"];

/// Colon-separated list of extra module directories.
pub const MODULE_PATH_VAR: &str = "SQALE_PATH";

/// Fixed capacity of channels created by the `chan` builtin.
pub const CHANNEL_CAPACITY: usize = 16;

/// Heap size that triggers the first collection; doubles after each one.
pub const GC_INITIAL_THRESHOLD: usize = 1024 * 1024;

/// Upper bound on macro rewriting recursion.
pub const MACRO_EXPANSION_LIMIT: usize = 64;

pub const REPL_PROMPT: &str = "sqale> ";
pub const REPL_BANNER: &str = "SQALE REPL. Ctrl-D to exit.";
