// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains a fixed-rate driver for the [`VelocityCartesianDampingController`].
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::controller::control_tools::{
    has_realtime_kernel, set_current_thread_to_highest_scheduler_priority,
};
use crate::controller::damping_controller::VelocityCartesianDampingController;
use crate::controller::hardware::RobotHardware;
use crate::controller::shared_inputs::InputReceiver;
use crate::exception::{DampingException, DampingResult};

/// Used to decide whether to enforce realtime mode for the control loop thread.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RealtimeConfig {
    Enforce,
    Ignore,
}

/// Settings of a [`ControlLoop`]
#[derive(Debug, Copy, Clone)]
pub struct LoopConfig {
    /// Control period. 1 ms for a Panda.
    pub period: Duration,
    pub realtime_config: RealtimeConfig,
    /// Stop after this many cycles. None runs until the stop flag is set.
    pub max_cycles: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        LoopConfig {
            period: Duration::from_millis(1),
            realtime_config: RealtimeConfig::Enforce,
            max_cycles: None,
        }
    }
}

/// What is left after a [`ControlLoop`] finished.
pub struct LoopSummary<H> {
    /// The hardware, released by [`stopping`](`VelocityCartesianDampingController::stopping`).
    pub hardware: H,
    pub cycles: u64,
    /// Number of cycles which took longer than the period.
    pub missed_deadlines: u64,
    /// Largest amount by which a cycle missed its deadline.
    pub worst_overrun: Duration,
}

/// Runs a controller with a fixed period on the calling thread.
///
/// At the start of every cycle the inputs of the [`InputReceiver`] are applied, then one
/// [`update`](`VelocityCartesianDampingController::update`) is executed. A cycle which overruns
/// its period is counted, the next one starts right away. Missed deadlines are reported once
/// the loop has finished.
pub struct ControlLoop<H: RobotHardware> {
    controller: VelocityCartesianDampingController<H>,
    receiver: InputReceiver,
    config: LoopConfig,
    stop: Arc<AtomicBool>,
}

impl<H: RobotHardware> ControlLoop<H> {
    /// Creates the loop. Scheduling is not touched until [`run`](`Self::run`), so the loop can
    /// be moved to the thread which is supposed to execute it.
    pub fn new(
        controller: VelocityCartesianDampingController<H>,
        receiver: InputReceiver,
        config: LoopConfig,
    ) -> Self {
        ControlLoop {
            controller,
            receiver,
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag which ends the loop after the current cycle once it is set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    fn should_continue(&self, cycles: u64) -> bool {
        !self.stop.load(Ordering::Acquire)
            && self.config.max_cycles.map_or(true, |max| cycles < max)
    }

    /// Starts the controller and runs it on the calling thread until the stop flag is set or
    /// `max_cycles` is reached. With [`RealtimeConfig::Enforce`] the calling thread is switched
    /// to realtime scheduling first.
    ///
    /// # Errors
    /// * RealTimeException if realtime scheduling is enforced but not available. The controller
    /// is not started in this case.
    pub fn run(mut self) -> DampingResult<LoopSummary<H>> {
        if self.config.realtime_config == RealtimeConfig::Enforce {
            if has_realtime_kernel() {
                set_current_thread_to_highest_scheduler_priority()?;
            } else {
                return Err(DampingException::RealTimeException {
                    message: "cartesian-damping: Running kernel does not have realtime capabilities."
                        .to_string(),
                });
            }
        }
        let period = self.config.period;
        let start = Instant::now();
        self.controller.starting(Duration::from_secs(0));
        let mut previous = start;
        let mut deadline = start + period;
        let mut cycles = 0;
        let mut missed_deadlines = 0;
        let mut worst_overrun = Duration::from_secs(0);
        while self.should_continue(cycles) {
            self.receiver.apply_to(&mut self.controller);
            let now = Instant::now();
            self.controller
                .update(now.duration_since(start), now.duration_since(previous));
            previous = now;
            cycles += 1;

            let finished = Instant::now();
            if finished > deadline {
                missed_deadlines += 1;
                worst_overrun = worst_overrun.max(finished.duration_since(deadline));
                deadline = finished + period;
            } else {
                std::thread::sleep(deadline.duration_since(finished));
                deadline += period;
            }
        }
        let hardware = self.controller.stopping();
        if missed_deadlines > 0 {
            warn!(
                "VelocityCartesianDampingController: {} of {} cycles missed their deadline, worst by {:?}",
                missed_deadlines, cycles, worst_overrun
            );
        }
        debug!(
            "VelocityCartesianDampingController: control loop finished after {} cycles",
            cycles
        );
        Ok(LoopSummary {
            hardware,
            cycles,
            missed_deadlines,
            worst_overrun,
        })
    }
}
