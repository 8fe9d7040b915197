// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the exponential smoothing used for the joint velocity command and the blending
//! of the filter coefficient.

/// Applies one step of exponential smoothing
///
/// # Arguments
/// * `coefficient` - Smoothing weight in \[0, 1\]. 1 means no smoothing.
/// * `target` - Current value of the signal to be filtered
/// * `filtered` - Filtered value of the previous time step
/// # Return
/// Filtered value.
pub fn smooth(coefficient: f64, target: f64, filtered: f64) -> f64 {
    coefficient * target + (1. - coefficient) * filtered
}

/// Applies [`smooth`] to every joint and writes the result into `filtered`.
pub fn smooth_joint_velocities(coefficient: f64, target: &[f64; 7], filtered: &mut [f64; 7]) {
    for (y, &x) in filtered.iter_mut().zip(target.iter()) {
        *y = smooth(coefficient, x, *y);
    }
}

/// Moves an active filter coefficient one step towards its target.
///
/// # Arguments
/// * `blend_rate` - Fraction of the remaining distance covered per step, in \[0, 1\].
/// * `target` - Coefficient the active one creeps towards.
/// * `active` - Currently used coefficient.
/// # Return
/// New active coefficient.
pub fn blend_coefficient(blend_rate: f64, target: f64, active: f64) -> f64 {
    blend_rate * target + (1. - blend_rate) * active
}

/// Active filter coefficient and the target it is blended towards.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FilterState {
    active: f64,
    target: f64,
}

impl FilterState {
    /// creates a FilterState where active and target coefficient are equal
    pub fn new(coefficient: f64) -> Self {
        FilterState {
            active: coefficient,
            target: coefficient,
        }
    }
    pub fn active(&self) -> f64 {
        self.active
    }
    pub fn target(&self) -> f64 {
        self.target
    }
    /// Sets the target. The active coefficient does not change until the next [`step`](`Self::step`).
    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }
    /// Advances the active coefficient by one blending step.
    pub fn step(&mut self, blend_rate: f64) {
        self.active = blend_coefficient(blend_rate, self.target, self.active);
    }
}
