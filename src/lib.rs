// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! # cartesian-damping-controller
//! A real-time Cartesian velocity controller for 7-DOF robots like the
//! [Franka Emika](https://franka.de) Panda which yields to external forces.
//!
//! **ALWAYS HAVE THE USER STOP BUTTON AT
//! HAND WHILE CONTROLLING THE ROBOT!**
//!
//! ## Design
//! Each control cycle the desired Cartesian velocity of the end effector is corrected by the
//! estimated external wrench, scaled with a per-axis compliance:
//!
//! ![\dot{x}_c = \dot{x}_d - C^{-1} F_{ext}](https://latex.codecogs.com/png.latex?\dot{x}_c=\dot{x}_d-C^{-1}F_{ext})
//!
//! The result is mapped to joint velocities with the damped pseudo-inverse of the zero Jacobian
//! and passed through an exponential smoothing filter before it is sent to the joints.
//!
//! The library is divided into the following modules:
//! * [controller](`crate::controller`) - the controller, its math and the real-time plumbing.
//! * [config](`crate::config`) - the parameters of the controller.
//! * [exception](`crate::exception`) - error types.
//!
//! The robot itself is accessed through the [`RobotHardware`] trait. Implement it for your
//! driver or simulation.
//!
//! # Example:
//!```no_run
//! use std::time::Duration;
//! use damping::{ControllerConfig, DampingResult, JointCommand, RobotHardware,
//!               VelocityCartesianDampingController};
//! fn run<H: RobotHardware>(hardware: H) -> DampingResult<()> {
//!     let config = ControllerConfig::load("config/panda.toml")?;
//!     let mut controller = VelocityCartesianDampingController::init(config, hardware)?;
//!     controller.command_callback(&JointCommand::velocity(vec![0.0, 0.0, 0.02, 0.0, 0.0, 0.0]));
//!     controller.starting(Duration::from_secs(0));
//!     for i in 1..=1000 {
//!         controller.update(Duration::from_millis(i), Duration::from_millis(1));
//!     }
//!     let _hardware = controller.stopping();
//!     Ok(())
//! }
//! ```
//! In a real setup the commands arrive on other threads. Use
//! [`shared_inputs`](`crate::controller::shared_inputs::shared_inputs`) to pass them to the
//! [`ControlLoop`] without blocking it.
pub mod config;
pub mod controller;
pub mod exception;
pub mod utils;

pub use config::ControllerConfig;
pub use controller::control_loop::{ControlLoop, LoopConfig, LoopSummary, RealtimeConfig};
pub use controller::control_types::{CommandMode, JointCommand};
pub use controller::damping_controller::VelocityCartesianDampingController;
pub use controller::diagnostics::{DiagnosticSink, JointControllerStates};
pub use controller::hardware::{Frame, RobotHardware, RobotState};
pub use controller::shared_inputs::{shared_inputs, CommandIngestor, ParameterAdjuster};
pub use controller::velocity_limits::VelocityLimitMode;
pub use exception::{DampingException, DampingResult};
pub use utils::*;
