//! Impulse resolution and positional correction.

pub mod solver;

pub use solver::ContactSolver;
