//! Combo and Scoring
//!
//! Pure scoring rules: a target hit within the combo window extends the
//! streak, anything slower restarts it at one. Every fifth hit in a streak
//! adds one more point per hit; an active score multiplier doubles it.

use crate::game::state::{Combo, Millis};

/// Outcome of scoring a single target hit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HitScore {
    /// Combo after this hit
    pub combo: Combo,
    /// Points awarded for this hit
    pub points: u32,
}

/// Points for a hit that brings the streak to `combo`.
#[inline]
pub fn points_for(combo: u32, multiplier_active: bool) -> u32 {
    let multiplier = if multiplier_active { 2 } else { 1 };
    (1 + combo / 5) * multiplier
}

/// Score a target hit at `now`.
pub fn score_hit(combo: Combo, now: Millis, window_ms: Millis, multiplier_active: bool) -> HitScore {
    let count = if now.saturating_sub(combo.last_tap_at) <= window_ms {
        combo.count.saturating_add(1)
    } else {
        1
    };

    HitScore {
        combo: Combo {
            count,
            last_tap_at: now,
        },
        points: points_for(count, multiplier_active),
    }
}

/// Streak after a miss or a chicken tap.
#[inline]
pub fn broken(combo: Combo) -> Combo {
    Combo { count: 0, ..combo }
}

/// Combo timing after a power-up pickup; the count is left alone.
#[inline]
pub fn touched(combo: Combo, now: Millis) -> Combo {
    Combo { last_tap_at: now, ..combo }
}
