//! Global configuration constants for the verlet3d engine.

/// Default gravity acceleration applied to new worlds (Y-up, units/tick²
/// before substep scaling).
pub const DEFAULT_GRAVITY: [f32; 3] = [0.0, -9.81, 0.0];

/// Default number of substeps per `World::step`.
pub const DEFAULT_SUBSTEPS: u32 = 8;

/// Number of impulse solver iterations performed per substep.
pub const DEFAULT_SOLVER_ITERATIONS: u32 = 4;

/// Default per-axis damping applied to linear velocity changes.
pub const DEFAULT_LINEAR_DAMPING: f32 = 0.0;

/// Default damping applied to angular velocity changes.
pub const DEFAULT_ANGULAR_DAMPING: f32 = 0.0;

/// Default cell size for the broad-phase spatial hash.
pub const DEFAULT_BROADPHASE_CELL_SIZE: f32 = 5.0;

/// Constant margin added to world hitboxes before broad-phase insertion.
pub const HITBOX_MARGIN: f32 = 0.1;

/// Binary search depth for time-of-impact refinement against convex shapes.
pub const TOI_BINARY_SEARCH_DEPTH: u32 = 4;

/// Binary search depth against concave polyhedra (parity tests are costly).
pub const TOI_CONCAVE_SEARCH_DEPTH: u32 = 1;

/// Split bias for the time-of-impact binary search; below 0.5 favors
/// earlier impact times.
pub const TOI_SPLIT_BIAS: f32 = 0.333333;

/// Entry times below this count as already overlapping and force the exit
/// time to 1.
pub const TOI_ENTRY_EPSILON: f32 = 0.001;

/// Squared linear motion per substep below which a body counts as resting.
pub const LINEAR_SLEEP_THRESHOLD: f32 = 1e-8;

/// Quaternion similarity above which rotation counts as resting.
pub const ANGULAR_SLEEP_THRESHOLD: f32 = 0.999_999_9;

/// Consecutive resting substeps before a composite falls asleep.
pub const SLEEP_FRAME_THRESHOLD: u32 = 30;

/// Step duration (ms) past which a warning is logged.
pub const FRAME_BUDGET_MS: f32 = 16.0;
