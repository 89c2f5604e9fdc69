//! Target Placement and Hit-Testing

use crate::core::geometry::{Point, Viewport};
use crate::core::rng::DeterministicRng;
use crate::game::rules::TargetConfig;
use crate::game::state::Target;

/// Place a target uniformly over the field with a random radius.
pub fn random_target(rng: &mut DeterministicRng, config: &TargetConfig) -> Target {
    let x = rng.next_unit();
    let y = rng.next_unit();
    let radius = rng.next_range(config.min_radius, config.max_radius);
    Target::new(x, y, radius)
}

/// Did a tap at `point` land on the target?
#[inline]
pub fn is_hit(target: &Target, point: Point, viewport: Viewport, config: &TargetConfig) -> bool {
    viewport.within(point, target.x, target.y, target.radius + config.hit_slop)
}
