//! Structural rewrites of control flow
//!
//! Every rewrite re-scans after each change, so offsets from an earlier scan
//! are never reused.

pub mod guard;
pub mod loops;
pub mod restructure;

pub use guard::{is_unsafe_condition, join_conditions, transform_guards};
pub use loops::{generate_while, transform_loops, ForIn};
pub use restructure::{parse_parameters, restructure_functions, Parameter, Signature};
