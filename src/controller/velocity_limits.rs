// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the joint velocity limits and the check against them.

use serde::Deserialize;

// only used to derive MAX_JOINT_VELOCITY
static DELTA_T: f64 = 1e-3;
static LIMIT_EPS: f64 = 1e-3;
static TOL_NUMBER_PACKETS_LOST: f64 = 1e-3;
static MAX_JOINT_ACCELERATION: [f64; 7] = [
    15.0000 - LIMIT_EPS,
    7.500 - LIMIT_EPS,
    10.0000 - LIMIT_EPS,
    12.5000 - LIMIT_EPS,
    15.0000 - LIMIT_EPS,
    20.0000 - LIMIT_EPS,
    20.0000 - LIMIT_EPS,
];
/// Maximum joint velocity of a Panda, reduced by a tolerance for lost packets.
pub static MAX_JOINT_VELOCITY: [f64; 7] = [
    2.1750 - LIMIT_EPS - TOL_NUMBER_PACKETS_LOST * DELTA_T * MAX_JOINT_ACCELERATION[0],
    2.1750 - LIMIT_EPS - TOL_NUMBER_PACKETS_LOST * DELTA_T * MAX_JOINT_ACCELERATION[1],
    2.1750 - LIMIT_EPS - TOL_NUMBER_PACKETS_LOST * DELTA_T * MAX_JOINT_ACCELERATION[2],
    2.1750 - LIMIT_EPS - TOL_NUMBER_PACKETS_LOST * DELTA_T * MAX_JOINT_ACCELERATION[3],
    2.6100 - LIMIT_EPS - TOL_NUMBER_PACKETS_LOST * DELTA_T * MAX_JOINT_ACCELERATION[4],
    2.6100 - LIMIT_EPS - TOL_NUMBER_PACKETS_LOST * DELTA_T * MAX_JOINT_ACCELERATION[5],
    2.6100 - LIMIT_EPS - TOL_NUMBER_PACKETS_LOST * DELTA_T * MAX_JOINT_ACCELERATION[6],
];

/// Decides what the control loop does with a joint velocity target which exceeds the limits.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityLimitMode {
    /// The limits are not checked.
    Off,
    /// Violations are counted, the target is applied anyway.
    Warn,
    /// Violations are counted and the previous joint velocities are used as target instead.
    Reject,
}

impl Default for VelocityLimitMode {
    fn default() -> Self {
        VelocityLimitMode::Off
    }
}

/// Joint names and velocity limits in the order the joints were bound.
#[derive(Debug, Clone, PartialEq)]
pub struct JointLimits {
    pub joint_names: [String; 7],
    /// Maximum velocity magnitude per joint. Unit: \[rad/s\]
    pub velocity: [f64; 7],
}

impl JointLimits {
    /// Checks the velocities against the limits, see [`check_velocity_limits`].
    pub fn is_over_limit(&self, velocities: &[f64; 7]) -> bool {
        check_velocity_limits(velocities, &self.velocity)
    }
}

/// Checks whether any joint velocity exceeds its limit.
///
/// # Arguments
/// * `velocities` - Candidate joint velocities.
/// * `max_velocity` - Per-joint maximum allowed velocity magnitude.
/// # Return
/// true if the magnitude of at least one velocity is strictly larger than its limit or is NaN.
#[allow(clippy::neg_cmp_op_on_partial_ord)]
pub fn check_velocity_limits(velocities: &[f64; 7], max_velocity: &[f64; 7]) -> bool {
    velocities
        .iter()
        .zip(max_velocity.iter())
        .any(|(velocity, limit)| !(velocity.abs() <= *limit))
}
