// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the handles which pass velocity commands and filter parameters from asynchronous
//! callbacks to the real-time thread.
//!
//! Both inputs live in [`ArcSwap`] cells. Callbacks publish a new value with `store` or `rcu`,
//! the real-time side only ever does a lock-free `load`. The latest Cartesian target wins.
//! A rejected command is counted, so a fallback is never lost when a valid target follows it
//! before the next cycle.
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use log::warn;

use crate::controller::command_ingestor::{stage_command, StagedCommand};
use crate::controller::control_types::JointCommand;
use crate::controller::damping_controller::VelocityCartesianDampingController;
use crate::controller::hardware::RobotHardware;
use crate::exception::{create_configuration_exception, DampingResult};

#[derive(Debug, Default, Copy, Clone, PartialEq)]
struct StagedInputs {
    cartesian_target: [f64; 6],
    /// Incremented with every accepted target.
    target_count: u64,
    /// Incremented with every rejected command.
    fallback_count: u64,
}

/// Creates connected handles for the callback threads and the real-time thread.
pub fn shared_inputs() -> (CommandIngestor, ParameterAdjuster, InputReceiver) {
    let staged = Arc::new(ArcSwap::from_pointee(StagedInputs::default()));
    let filter_target = Arc::new(ArcSwapOption::empty());
    (
        CommandIngestor {
            staged: staged.clone(),
        },
        ParameterAdjuster {
            filter_target: filter_target.clone(),
        },
        InputReceiver {
            staged,
            filter_target,
            applied: StagedInputs::default(),
        },
    )
}

/// Receives velocity commands on a callback thread.
#[derive(Clone)]
pub struct CommandIngestor {
    staged: Arc<ArcSwap<StagedInputs>>,
}

impl CommandIngestor {
    /// Validates the command and stages it for the next control cycle.
    pub fn on_command(&self, command: &JointCommand) -> StagedCommand {
        let staged = stage_command(command);
        match staged {
            StagedCommand::Target(target) => {
                self.staged.rcu(|old| {
                    let mut new = **old;
                    new.cartesian_target = target;
                    new.target_count = old.target_count.wrapping_add(1);
                    Arc::new(new)
                });
            }
            StagedCommand::Fallback => {
                self.staged.rcu(|old| {
                    let mut new = **old;
                    new.fallback_count = old.fallback_count.wrapping_add(1);
                    Arc::new(new)
                });
            }
            StagedCommand::Ignored => {}
        }
        staged
    }
}

/// Receives filter coefficient updates on a callback thread.
#[derive(Clone)]
pub struct ParameterAdjuster {
    filter_target: Arc<ArcSwapOption<f64>>,
}

impl ParameterAdjuster {
    /// Stores a new target filter coefficient. The controller blends towards it gradually.
    ///
    /// # Errors
    /// * ConfigurationException if the coefficient is not in \[0, 1\].
    pub fn set_filter_target(&self, coefficient: f64) -> DampingResult<()> {
        if !(0. ..=1.).contains(&coefficient) {
            warn!(
                "VelocityCartesianDampingController: ignoring filter coefficient {}",
                coefficient
            );
            return Err(create_configuration_exception(format!(
                "filter coefficient must be in [0, 1], got {}",
                coefficient
            )));
        }
        self.filter_target.store(Some(Arc::new(coefficient)));
        Ok(())
    }
}

/// Real-time side of the shared inputs.
pub struct InputReceiver {
    staged: Arc<ArcSwap<StagedInputs>>,
    filter_target: Arc<ArcSwapOption<f64>>,
    applied: StagedInputs,
}

impl InputReceiver {
    /// Applies all inputs which arrived since the last call. Never blocks.
    pub fn apply_to<H: RobotHardware>(
        &mut self,
        controller: &mut VelocityCartesianDampingController<H>,
    ) {
        let staged = **self.staged.load();
        if staged.fallback_count != self.applied.fallback_count {
            controller.apply_staged(StagedCommand::Fallback);
        }
        if staged.target_count != self.applied.target_count {
            controller.apply_staged(StagedCommand::Target(staged.cartesian_target));
        }
        self.applied = staged;
        if let Some(filter_target) = self.filter_target.load().as_deref() {
            controller.set_filter_target(*filter_target);
        }
    }
}
