// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the message types which are received by the controller.

use serde::Deserialize;
use serde::Serialize;
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Interface a [`JointCommand`] is meant for. Serialized as its integer value.
#[derive(Serialize_repr, Deserialize_repr, Debug, Copy, Clone, PartialEq)]
#[repr(i32)]
pub enum CommandMode {
    Position = 1,
    Velocity = 2,
    Torque = 3,
    Impedance = 4,
}

/// Command published by the motion interface of the arm.
///
/// The damping controller only reads [`velocity`](`Self::velocity`) of commands in
/// [`CommandMode::Velocity`], where it holds the desired Cartesian velocity
/// \[vx, vy, vz, wx, wy, wz\] of the end effector.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JointCommand {
    pub mode: CommandMode,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub position: Vec<f64>,
    #[serde(default)]
    pub velocity: Vec<f64>,
    #[serde(default)]
    pub acceleration: Vec<f64>,
    #[serde(default)]
    pub effort: Vec<f64>,
}

impl JointCommand {
    /// creates a velocity mode command with the given payload
    pub fn velocity(velocity: Vec<f64>) -> Self {
        JointCommand {
            mode: CommandMode::Velocity,
            names: Vec::new(),
            position: Vec::new(),
            velocity,
            acceleration: Vec::new(),
            effort: Vec::new(),
        }
    }
}
