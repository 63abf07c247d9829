//! Replacement policy tuning
//!
//! The numbers here are tied to real search behaviour, not to correctness.
//! Any value inside the ranges checked by [`ReplacementParams::validate`]
//! keeps the table's invariants intact; the table's arithmetic never
//! overflows even for values outside them.

use crate::error::TtError;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Knobs of the overwrite/decay/victim rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplacementParams {
    /// A same-key write of a non-exact bound overwrites when
    /// `new_depth8 + 2 * is_pv > stored_depth8 - depth_slack`
    pub depth_slack: i32,
    /// Stored non-exact entries at least this deep lose one ply instead of
    /// being overwritten by a shallower write
    pub decay_threshold: i32,
    /// Victim value is `depth8 - age_weight * relative_age`
    pub age_weight: i32,
}

impl ReplacementParams {
    pub const DEFAULT: Self = Self {
        depth_slack: 4,
        decay_threshold: 5,
        age_weight: 2,
    };

    /// Accepted `depth_slack` (a full `depth8` span either way)
    pub const DEPTH_SLACK_RANGE: RangeInclusive<i32> = -255..=255;
    /// Accepted `decay_threshold`
    pub const DECAY_THRESHOLD_RANGE: RangeInclusive<i32> = -255..=255;
    /// Accepted `age_weight`
    pub const AGE_WEIGHT_RANGE: RangeInclusive<i32> = 0..=1024;

    /// Checked constructor
    pub fn new(depth_slack: i32, decay_threshold: i32, age_weight: i32) -> Result<Self, TtError> {
        let params = Self {
            depth_slack,
            decay_threshold,
            age_weight,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), TtError> {
        check("depth_slack", self.depth_slack, Self::DEPTH_SLACK_RANGE)?;
        check("decay_threshold", self.decay_threshold, Self::DECAY_THRESHOLD_RANGE)?;
        check("age_weight", self.age_weight, Self::AGE_WEIGHT_RANGE)
    }
}

fn check(name: &'static str, value: i32, range: RangeInclusive<i32>) -> Result<(), TtError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(TtError::InvalidParam {
            name,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

impl Default for ReplacementParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}
