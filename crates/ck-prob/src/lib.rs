//! Probability building blocks for causalkit.
//!
//! This crate hosts reusable probability math used by the estimators:
//! - small numeric helpers (stable log/exp/sigmoid primitives)
//! - normal and Student-t tail probabilities and critical values

pub mod math;
pub mod normal;
pub mod student_t;
