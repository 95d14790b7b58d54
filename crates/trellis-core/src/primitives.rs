//! # Engine Primitives
//!
//! Fixed limits compiled into the engine. They bound every loop that is
//! driven by definitions or submitted input.

/// Maximum number of variant resolutions in one recondition cascade.
///
/// A cascade that has not converged after this many resolutions keeps the
/// last resolved variant. Non-convergence is logged, never an error.
pub const MAX_CASCADE_ITERATIONS: usize = 5;

/// Maximum nesting of object, tuple, array and matrix levels in a submission.
///
/// Descriptor tables may be self-referential, so submitted values are the
/// only thing that bounds coercion depth.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Separator between a parent field name and a nested recon field name.
pub const RECON_PREFIX_SEPARATOR: &str = "_";
