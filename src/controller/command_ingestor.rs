// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the validation of incoming Cartesian velocity commands.
use log::{error, info};

use crate::controller::control_types::{CommandMode, JointCommand};
use crate::exception::{DampingException, DampingResult};

/// Outcome of validating a [`JointCommand`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum StagedCommand {
    /// The command was not meant for the velocity interface.
    Ignored,
    /// A valid Cartesian velocity target.
    Target([f64; 6]),
    /// The command was malformed. The joint velocity filter falls back to the last
    /// measured joint velocities, the Cartesian target stays unchanged.
    Fallback,
}

/// Extracts the Cartesian velocity target of a command.
///
/// # Return
/// * `Ok(None)` if the command is not in velocity mode.
/// * `Ok(Some(target))` with the 6 values copied verbatim.
/// # Errors
/// * CommandException if the velocity payload does not have exactly 6 elements.
pub fn ingest(command: &JointCommand) -> DampingResult<Option<[f64; 6]>> {
    if command.mode != CommandMode::Velocity {
        return Ok(None);
    }
    if command.velocity.len() != 6 {
        return Err(DampingException::CommandException {
            message: format!(
                "Published Commands are not of size 6, got {} values",
                command.velocity.len()
            ),
        });
    }
    let mut target = [0.; 6];
    target.copy_from_slice(&command.velocity);
    Ok(Some(target))
}

/// Validates a command like [`ingest`] and logs the outcome.
pub fn stage_command(command: &JointCommand) -> StagedCommand {
    match ingest(command) {
        Ok(Some(target)) => {
            info!("desired cartesian velocity x: {}", target[0]);
            StagedCommand::Target(target)
        }
        Ok(None) => StagedCommand::Ignored,
        Err(e) => {
            error!("VelocityCartesianDampingController: {}", e);
            StagedCommand::Fallback
        }
    }
}
