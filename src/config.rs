// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the controller parameters and their validation.
//!
//! The parameters are usually loaded from a TOML file:
//! ```toml
//! arm_id = "panda"
//! joint_names = ["panda_joint1", "panda_joint2", "panda_joint3", "panda_joint4",
//!                "panda_joint5", "panda_joint6", "panda_joint7"]
//! controller_state_publish_rate = 30.0
//! compliances = [600.0, 600.0, 100.0, 600.0, 600.0, 600.0]
//!
//! [joint_velocity_limit]
//! panda_joint1 = 2.175
//! # ...
//!
//! [filter]
//! initial_coefficient = 0.3
//! ```
use std::collections::HashMap;
use std::fs::read_to_string;
use std::path::Path;

use serde::Deserialize;

use crate::controller::pseudo_inverse::PseudoInverseConfig;
use crate::controller::velocity_limits::{JointLimits, VelocityLimitMode, MAX_JOINT_VELOCITY};
use crate::exception::{create_configuration_exception, DampingException, DampingResult};

/// Default rate at which the controller state is published: 30 Hz
pub static DEFAULT_PUBLISH_RATE: f64 = 30.0;
/// Default per-axis compliances \[x, y, z, rx, ry, rz\]. The z-axis yields the most.
pub static DEFAULT_COMPLIANCES: [f64; 6] = [600.0, 600.0, 100.0, 600.0, 600.0, 600.0];

/// Parameters of the exponential smoothing of the joint velocity command.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Filter coefficient at activation, in \[0, 1\].
    pub initial_coefficient: f64,
    /// Scales the active coefficient. The smoothing weight of one cycle is
    /// `active_coefficient * filter_factor`.
    pub filter_factor: f64,
    /// Blend rate with which the active coefficient follows its target, in \[0, 1\].
    pub param_change_filter: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            initial_coefficient: 0.3,
            filter_factor: 0.01,
            param_change_filter: 0.005,
        }
    }
}

fn default_arm_id() -> String {
    "panda".to_string()
}

fn default_controller_name() -> String {
    "velocity_cartesian_damping_controller".to_string()
}

fn default_publish_rate() -> f64 {
    DEFAULT_PUBLISH_RATE
}

fn default_compliances() -> [f64; 6] {
    DEFAULT_COMPLIANCES
}

/// All parameters of a [`VelocityCartesianDampingController`](`crate::VelocityCartesianDampingController`).
///
/// `joint_names` and `joint_velocity_limit` have no defaults. Everything else falls back to
/// the values of [`panda_default`](`Self::panda_default`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_arm_id")]
    pub arm_id: String,
    /// Label attached to every published controller state.
    #[serde(default = "default_controller_name")]
    pub controller_name: String,
    /// Names of the 7 joints. Their order defines the order of all joint vectors.
    pub joint_names: Vec<String>,
    /// Maximum velocity magnitude per joint name. Unit: \[rad/s\]
    pub joint_velocity_limit: HashMap<String, f64>,
    /// Unit: \[Hz\]
    #[serde(default = "default_publish_rate")]
    pub controller_state_publish_rate: f64,
    /// Per-axis compliance coefficients. A larger value gives a smaller correction per Newton.
    #[serde(default = "default_compliances")]
    pub compliances: [f64; 6],
    #[serde(default)]
    pub pseudo_inverse: PseudoInverseConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub velocity_limit_mode: VelocityLimitMode,
}

impl ControllerConfig {
    /// Parameters for a Panda with the default joint names and velocity limits.
    pub fn panda_default() -> Self {
        let joint_names: Vec<String> = (1..=7).map(|i| format!("panda_joint{}", i)).collect();
        let joint_velocity_limit = joint_names
            .iter()
            .cloned()
            .zip(MAX_JOINT_VELOCITY.iter().cloned())
            .collect();
        ControllerConfig {
            arm_id: default_arm_id(),
            controller_name: default_controller_name(),
            joint_names,
            joint_velocity_limit,
            controller_state_publish_rate: DEFAULT_PUBLISH_RATE,
            compliances: DEFAULT_COMPLIANCES,
            pseudo_inverse: PseudoInverseConfig::default(),
            filter: FilterConfig::default(),
            velocity_limit_mode: VelocityLimitMode::default(),
        }
    }

    /// Parses the parameters from a TOML string.
    ///
    /// # Errors
    /// * ConfigLoadException if the string is not valid TOML or misses required fields.
    pub fn from_toml_str(toml_str: &str) -> DampingResult<Self> {
        toml::from_str(toml_str).map_err(|e| DampingException::ConfigLoadException {
            message: format!("Cannot read the parameter file: {}", e),
        })
    }

    /// Loads the parameters from a TOML file.
    ///
    /// # Errors
    /// * ConfigLoadException if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> DampingResult<Self> {
        let params_str =
            read_to_string(path.as_ref()).map_err(|e| DampingException::ConfigLoadException {
                message: format!(
                    "Cannot load the parameter file {}: {}",
                    path.as_ref().display(),
                    e
                ),
            })?;
        ControllerConfig::from_toml_str(&params_str)
    }

    /// Checks the tunable constants.
    ///
    /// # Errors
    /// * ConfigurationException if a constant is out of its valid range.
    pub fn validate(&self) -> DampingResult<()> {
        if !self.controller_state_publish_rate.is_finite() || self.controller_state_publish_rate < 0.
        {
            return Err(create_configuration_exception(format!(
                "controller_state_publish_rate must be finite and non-negative, got {}",
                self.controller_state_publish_rate
            )));
        }
        if let Some(compliance) = self
            .compliances
            .iter()
            .find(|x| !x.is_finite() || **x <= 0.)
        {
            return Err(create_configuration_exception(format!(
                "compliances must be finite and positive, got {}",
                compliance
            )));
        }
        let pseudo_inverse = &self.pseudo_inverse;
        if !(pseudo_inverse.damping.is_finite() && pseudo_inverse.damping > 0.)
            || !(pseudo_inverse.singular_threshold.is_finite()
                && pseudo_inverse.singular_threshold > 0.)
        {
            return Err(create_configuration_exception(
                "pseudo-inverse damping and singular_threshold must be finite and positive",
            ));
        }
        if pseudo_inverse.max_iterations == 0 {
            return Err(create_configuration_exception(
                "pseudo-inverse max_iterations must be at least 1",
            ));
        }
        let unit_interval = |x: f64| (0. ..=1.).contains(&x);
        if !unit_interval(self.filter.initial_coefficient)
            || !unit_interval(self.filter.filter_factor)
            || !unit_interval(self.filter.param_change_filter)
        {
            return Err(create_configuration_exception(
                "filter coefficients must be in [0, 1]",
            ));
        }
        Ok(())
    }

    /// Resolves the joint names and their velocity limits.
    ///
    /// # Errors
    /// * ConfigurationException if there are not exactly 7 joint names or a limit is missing
    /// or negative.
    pub fn joint_limits(&self) -> DampingResult<JointLimits> {
        if self.joint_names.len() != 7 {
            return Err(create_configuration_exception(format!(
                "Wrong number of joint names, got {} instead of 7 names!",
                self.joint_names.len()
            )));
        }
        let mut velocity = [0.; 7];
        for (limit, name) in velocity.iter_mut().zip(self.joint_names.iter()) {
            *limit = match self.joint_velocity_limit.get(name) {
                Some(&value) if value.is_finite() && value >= 0. => value,
                Some(&value) => {
                    return Err(create_configuration_exception(format!(
                        "Velocity limit of joint {} must be finite and non-negative, got {}",
                        name, value
                    )))
                }
                None => {
                    return Err(create_configuration_exception(format!(
                        "Unable to find velocity limit value for joint {}",
                        name
                    )))
                }
            };
        }
        let n = &self.joint_names;
        Ok(JointLimits {
            joint_names: [
                n[0].clone(),
                n[1].clone(),
                n[2].clone(),
                n[3].clone(),
                n[4].clone(),
                n[5].clone(),
                n[6].clone(),
            ],
            velocity,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{ControllerConfig, DEFAULT_COMPLIANCES};
    use crate::controller::velocity_limits::{VelocityLimitMode, MAX_JOINT_VELOCITY};
    use crate::exception::DampingException;

    const MINIMAL: &str = r#"
joint_names = ["j1", "j2", "j3", "j4", "j5", "j6", "j7"]

[joint_velocity_limit]
j1 = 2.0
j2 = 2.0
j3 = 2.0
j4 = 2.0
j5 = 2.5
j6 = 2.5
j7 = 2.5
"#;

    #[test]
    fn minimal_file_uses_defaults() {
        let config = ControllerConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.arm_id, "panda");
        assert_eq!(config.controller_state_publish_rate, 30.);
        assert_eq!(config.compliances, DEFAULT_COMPLIANCES);
        assert_eq!(config.velocity_limit_mode, VelocityLimitMode::Off);
        assert!(config.validate().is_ok());
        let limits = config.joint_limits().unwrap();
        assert_eq!(limits.joint_names[4], "j5");
        assert_eq!(limits.velocity, [2.0, 2.0, 2.0, 2.0, 2.5, 2.5, 2.5]);
    }

    #[test]
    fn nested_tables_override_defaults() {
        let toml_str = format!(
            "{}\n{}",
            "velocity_limit_mode = \"reject\"\ncompliances = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]",
            MINIMAL.to_string()
                + "\n[filter]\ninitial_coefficient = 0.5\n\n[pseudo_inverse]\ndamping = 0.05\n"
        );
        let config = ControllerConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(config.velocity_limit_mode, VelocityLimitMode::Reject);
        assert_eq!(config.compliances, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(config.filter.initial_coefficient, 0.5);
        assert_eq!(config.filter.param_change_filter, 0.005);
        assert_eq!(config.pseudo_inverse.damping, 0.05);
        assert_eq!(config.pseudo_inverse.singular_threshold, 0.1);
    }

    #[test]
    fn missing_joint_names_fail_to_parse() {
        let result = ControllerConfig::from_toml_str("arm_id = \"panda\"");
        assert!(matches!(
            result,
            Err(DampingException::ConfigLoadException { .. })
        ));
    }

    #[test]
    fn wrong_number_of_joint_names() {
        let mut config = ControllerConfig::panda_default();
        config.joint_names.pop();
        assert!(matches!(
            config.joint_limits(),
            Err(DampingException::ConfigurationException { .. })
        ));
    }

    #[test]
    fn missing_velocity_limit() {
        let mut config = ControllerConfig::panda_default();
        config.joint_velocity_limit.remove("panda_joint3");
        match config.joint_limits() {
            Err(DampingException::ConfigurationException { message }) => {
                assert!(message.contains("panda_joint3"))
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn negative_velocity_limit() {
        let mut config = ControllerConfig::panda_default();
        config
            .joint_velocity_limit
            .insert("panda_joint1".to_string(), -1.);
        assert!(config.joint_limits().is_err());
    }

    #[test]
    fn panda_default_is_valid() {
        let config = ControllerConfig::panda_default();
        assert!(config.validate().is_ok());
        assert_eq!(config.joint_limits().unwrap().velocity, MAX_JOINT_VELOCITY);
    }

    #[test]
    fn invalid_tunables() {
        let mut config = ControllerConfig::panda_default();
        config.compliances[2] = 0.;
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::panda_default();
        config.pseudo_inverse.damping = 0.;
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::panda_default();
        config.filter.param_change_filter = 1.5;
        assert!(config.validate().is_err());

        let mut config = ControllerConfig::panda_default();
        config.controller_state_publish_rate = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            ControllerConfig::load("/nonexistent/damping.toml"),
            Err(DampingException::ConfigLoadException { .. })
        ));
    }
}
