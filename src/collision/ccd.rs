//! Continuous collision helpers: swept-AABB slab intervals over one substep
//! tick, refined by a biased binary search on a signed distance function.

use glam::Vec3;

use crate::config;
use crate::core::types::Aabb;

/// Normalized time window within one tick where two boxes may overlap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToiInterval {
    pub entry: f32,
    pub exit: f32,
}

/// Sweeps `moving` (its end-of-tick box, walked back by `velocity`) against
/// `target` over t in [0, 1]. Entry times under the epsilon mean the boxes
/// already overlap, which widens the exit to the full tick.
pub fn swept_interval(moving: &Aabb, velocity: Vec3, target: &Aabb) -> Option<ToiInterval> {
    let start = moving.translated(-velocity);

    let mut entry = f32::NEG_INFINITY;
    let mut exit = f32::INFINITY;
    for axis in 0..3 {
        let v = velocity[axis];
        let (s_min, s_max) = (start.min[axis], start.max[axis]);
        let (t_min, t_max) = (target.min[axis], target.max[axis]);
        if v == 0.0 {
            if s_max < t_min || s_min > t_max {
                return None;
            }
            continue;
        }
        let (axis_entry, axis_exit) = if v > 0.0 {
            ((t_min - s_max) / v, (t_max - s_min) / v)
        } else {
            ((t_max - s_min) / v, (t_min - s_max) / v)
        };
        entry = entry.max(axis_entry);
        exit = exit.min(axis_exit);
    }

    if entry > exit || entry > 1.0 || exit < 0.0 {
        return None;
    }
    if entry < config::TOI_ENTRY_EPSILON {
        exit = 1.0;
    }
    Some(ToiInterval {
        entry: entry.clamp(0.0, 1.0),
        exit: exit.clamp(0.0, 1.0),
    })
}

/// Walks the interval toward the impact time. `distance` is positive while
/// separated; positive samples advance the lower bound. The split is biased
/// below the midpoint so early impact times are found first. Returns the
/// settled time and the distance there; a positive final distance means no
/// contact.
pub fn refine_toi(
    interval: ToiInterval,
    depth: u32,
    mut distance: impl FnMut(f32) -> f32,
) -> (f32, f32) {
    let mut min_t = interval.entry;
    let mut max_t = interval.exit;
    for _ in 0..depth {
        let t = min_t + (max_t - min_t) * config::TOI_SPLIT_BIAS;
        if distance(t) > 0.0 {
            min_t = t;
        } else {
            max_t = t;
        }
    }
    let t = max_t;
    let d = distance(t);
    (t, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box_at(x: f32) -> Aabb {
        Aabb::new(
            Vec3::new(x - 0.5, -0.5, -0.5),
            Vec3::new(x + 0.5, 0.5, 0.5),
        )
    }

    #[test]
    fn head_on_sweep_finds_the_crossing_window() {
        // Ends the tick at x=4 after moving +4; target sits at x=2.
        let interval =
            swept_interval(&unit_box_at(4.0), Vec3::new(4.0, 0.0, 0.0), &unit_box_at(2.0))
                .unwrap();
        assert_relative_eq!(interval.entry, 0.25, epsilon = 1e-6);
        assert_relative_eq!(interval.exit, 0.75, epsilon = 1e-6);
    }

    #[test]
    fn separated_on_a_still_axis_misses() {
        let mut target = unit_box_at(2.0);
        target.min.y += 10.0;
        target.max.y += 10.0;
        assert!(swept_interval(&unit_box_at(4.0), Vec3::new(4.0, 0.0, 0.0), &target).is_none());
    }

    #[test]
    fn already_overlapping_spans_the_whole_tick() {
        let interval = swept_interval(
            &unit_box_at(2.2),
            Vec3::new(0.5, 0.0, 0.0),
            &unit_box_at(2.0),
        )
        .unwrap();
        assert_eq!(interval.exit, 1.0);
    }

    #[test]
    fn refinement_converges_on_a_sign_change() {
        // Separated before t=0.5, touching after.
        let interval = ToiInterval {
            entry: 0.0,
            exit: 1.0,
        };
        let (t, d) = refine_toi(interval, 8, |t| 0.5 - t);
        assert!(d <= 0.0);
        assert!((0.5..=0.7).contains(&t), "settled at {t}");
    }
}
