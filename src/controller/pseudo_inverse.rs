// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the damped Moore-Penrose pseudo-inverse used to map Cartesian velocities to joint
//! velocities.
//!
//! Singular values above [`singular_threshold`](`PseudoInverseConfig::singular_threshold`) are
//! inverted exactly. Below it a variable damping
//! ![\lambda^2 = (1 - (\sigma / \epsilon)^2) \lambda_{max}^2](https://latex.codecogs.com/png.latex?\lambda^2=(1-(\sigma/\epsilon)^2)\lambda_{max}^2)
//! is added, so the gain ![\sigma / (\sigma^2 + \lambda^2)](https://latex.codecogs.com/png.latex?\sigma/(\sigma^2+\lambda^2))
//! falls back to zero for vanishing singular values instead of blowing up.
use serde::Deserialize;

use crate::utils::{Matrix6x7, Matrix7x6};

/// Tunable constants of [`damped_pseudo_inverse`]
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PseudoInverseConfig {
    /// Maximum damping factor, applied to a singular value of zero.
    pub damping: f64,
    /// Singular values below this threshold are damped.
    pub singular_threshold: f64,
    /// Maximum number of SVD iterations. Bounds the time spent in one control cycle.
    pub max_iterations: usize,
}

impl Default for PseudoInverseConfig {
    fn default() -> Self {
        PseudoInverseConfig {
            damping: 0.2,
            singular_threshold: 0.1,
            max_iterations: 100,
        }
    }
}

impl PseudoInverseConfig {
    /// Upper bound of the gain applied to any singular value and therefore of the magnitude of
    /// every element of the pseudo-inverse.
    pub fn max_gain(&self) -> f64 {
        let eps = self.singular_threshold;
        f64::max(1. / eps, eps / (self.damping * self.damping))
    }

    /// gain which replaces 1/sigma for the given singular value
    pub fn singular_value_gain(&self, sigma: f64) -> f64 {
        if sigma.is_nan() || sigma <= 0. {
            return 0.;
        }
        let eps = self.singular_threshold;
        if sigma >= eps {
            return 1. / sigma;
        }
        let ratio = sigma / eps;
        let lambda_squared = (1. - ratio * ratio) * self.damping * self.damping;
        sigma / (sigma * sigma + lambda_squared)
    }
}

/// Computes the damped pseudo-inverse of a 6x7 Jacobian.
///
/// # Arguments
/// * `jacobian` - Jacobian of the end effector.
/// * `config` - Damping factor, threshold and iteration limit.
/// # Return
/// A 7x6 matrix which only contains finite values. If the Jacobian contains NaN or infinite
/// values, or the SVD does not converge, the zero matrix is returned. The joint target is zero
/// for that cycle and the filtered command decays smoothly towards it.
pub fn damped_pseudo_inverse(jacobian: &Matrix6x7, config: &PseudoInverseConfig) -> Matrix7x6 {
    if jacobian.iter().any(|x| !x.is_finite()) {
        return Matrix7x6::zeros();
    }
    let svd = match jacobian.try_svd(true, true, f64::EPSILON, config.max_iterations) {
        Some(svd) => svd,
        None => return Matrix7x6::zeros(),
    };
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => return Matrix7x6::zeros(),
    };
    let mut v = v_t.transpose();
    for (i, &sigma) in svd.singular_values.iter().enumerate() {
        let gain = config.singular_value_gain(sigma);
        v.column_mut(i).scale_mut(gain);
    }
    let pseudo_inverse = v * u.transpose();
    if pseudo_inverse.iter().all(|x| x.is_finite()) {
        pseudo_inverse
    } else {
        Matrix7x6::zeros()
    }
}
