// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the damping controller and everything it needs to run in a real-time loop.

pub mod command_ingestor;
pub mod control_loop;
mod control_tools;
pub mod control_types;
pub mod damping_controller;
pub mod diagnostics;
pub mod filter;
pub mod hardware;
pub mod pseudo_inverse;
pub mod shared_inputs;
pub mod velocity_limits;
