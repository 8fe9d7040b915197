// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the capability interface the controller uses to talk to the robot.
//!
//! The controller never touches drivers or the robot model directly. Everything it needs per
//! cycle goes through [`RobotHardware`], so the control loop can run against a real robot,
//! a simulation or a mock.
use std::fmt;

use crate::exception::DampingResult;
#[cfg(test)]
use mockall::automock;

/// Enumerates the seven joints, the flange, and the end effector of a robot.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Frame {
    Joint1,
    Joint2,
    Joint3,
    Joint4,
    Joint5,
    Joint6,
    Joint7,
    Flange,
    EndEffector,
    Stiffness,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Frame::Joint1 => "Joint 1",
            Frame::Joint2 => "Joint 2",
            Frame::Joint3 => "Joint 3",
            Frame::Joint4 => "Joint 4",
            Frame::Joint5 => "Joint 5",
            Frame::Joint6 => "Joint 6",
            Frame::Joint7 => "Joint 7",
            Frame::Flange => "Flange",
            Frame::EndEffector => "End-Effector",
            Frame::Stiffness => "Stiffness",
        };
        write!(f, "{}", name)
    }
}

/// The part of the robot state the damping controller reads every cycle.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
#[allow(non_snake_case)]
pub struct RobotState {
    /// ![^OF_{K,\text{ext}}](https://latex.codecogs.com/png.latex?^OF_{K,\text{ext}})
    ///
    /// Estimated external wrench (force, torque) acting on stiffness frame, expressed
    /// relative to the base frame. Unit: \[N,N,N,Nm,Nm,Nm\].
    pub O_F_ext_hat_K: [f64; 6],
    /// ![\dot{q}](https://latex.codecogs.com/png.latex?\dot{q})
    ///
    /// Measured joint velocity. Unit: \[rad/s\]
    pub dq: [f64; 7],
}

/// Injected access to the joint velocity interface, the state interface and the robot model.
///
/// All per-cycle methods are called from the real-time thread and must not block.
#[cfg_attr(test, automock)]
pub trait RobotHardware {
    /// Binds a velocity handle for each joint in the given order.
    ///
    /// # Errors
    /// * HardwareException if one of the handles cannot be bound.
    fn bind_joint_velocity_handles(&mut self, joint_names: &[String]) -> DampingResult<()>;
    /// Binds the state and model handles of the arm (`<arm_id>_robot` and `<arm_id>_model`).
    ///
    /// # Errors
    /// * HardwareException if one of the handles cannot be bound.
    fn bind_state_handles(&mut self, arm_id: &str) -> DampingResult<()>;
    /// Measured velocities of the bound joints, in binding order.
    fn joint_velocities(&self) -> [f64; 7];
    /// Current robot state.
    fn robot_state(&self) -> RobotState;
    /// Gets the 6x7 Jacobian for the given frame, relative to the base frame.
    ///
    /// The Jacobian is represented as a 6x7 matrix in column-major format.
    fn zero_jacobian(&self, frame: &Frame) -> [f64; 42];
    /// Sends a velocity command to the bound joints, in binding order.
    fn set_joint_velocity_command(&mut self, command: &[f64; 7]);
}
