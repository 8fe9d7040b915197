// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use damping::controller::diagnostics::LogSink;
use damping::{
    shared_inputs, ControlLoop, ControllerConfig, DampingResult, Frame, JointCommand, LoopConfig,
    RealtimeConfig, RobotHardware, RobotState, VelocityCartesianDampingController,
};
use log::info;

/// Runs the damping controller against a simulated arm which follows every velocity command
/// perfectly. During the middle third of the run the end effector is pushed along z and the
/// arm yields.
#[derive(Parser, Debug)]
#[clap(name = "simulated_damping")]
struct CommandLineArguments {
    /// Controller configuration in TOML format. Uses the Panda defaults if omitted.
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Number of control cycles to run.
    #[clap(long, default_value_t = 3000)]
    pub cycles: u64,
    /// Force of the push along z. Unit: [N]
    #[clap(long, default_value_t = 10.)]
    pub force: f64,
    /// Desired velocity of the end effector along x. Unit: [m/s]
    #[clap(long, default_value_t = 0.02)]
    pub velocity: f64,
}

/// Arm with a fixed Jacobian whose measured joint velocities equal the last command.
struct SimulatedArm {
    dq: [f64; 7],
    force: f64,
    cycle: u64,
    push_start: u64,
    push_end: u64,
}

impl SimulatedArm {
    fn new(force: f64, cycles: u64) -> Self {
        SimulatedArm {
            dq: [0.; 7],
            force,
            cycle: 0,
            push_start: cycles / 3,
            push_end: 2 * cycles / 3,
        }
    }
}

impl RobotHardware for SimulatedArm {
    fn bind_joint_velocity_handles(&mut self, joint_names: &[String]) -> DampingResult<()> {
        info!("simulated arm: binding {:?}", joint_names);
        Ok(())
    }

    fn bind_state_handles(&mut self, arm_id: &str) -> DampingResult<()> {
        info!("simulated arm: binding {}_robot and {}_model", arm_id, arm_id);
        Ok(())
    }

    fn joint_velocities(&self) -> [f64; 7] {
        self.dq
    }

    fn robot_state(&self) -> RobotState {
        let mut state = RobotState {
            dq: self.dq,
            ..Default::default()
        };
        if (self.push_start..self.push_end).contains(&self.cycle) {
            state.O_F_ext_hat_K[2] = self.force;
        }
        state
    }

    fn zero_jacobian(&self, _frame: &Frame) -> [f64; 42] {
        // Panda close to its ready pose, column-major
        [
            0., 0.307, 0., 0., 0., 1., //
            -0.2, 0., -0.307, 0., 1., 0., //
            0., 0.3, 0., -0.7, 0., 0.7, //
            0.2, 0., 0.38, 0., -1., 0., //
            0., 0.088, 0., 0., 0., -1., //
            0.1, 0., -0.088, 0., -1., 0., //
            0., 0., 0., 0., 0., -1.,
        ]
    }

    fn set_joint_velocity_command(&mut self, command: &[f64; 7]) {
        self.dq = *command;
        self.cycle += 1;
    }
}

fn main() -> DampingResult<()> {
    let args = CommandLineArguments::parse();
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stdout())
        .apply()
        .expect("logger was already set");

    let config = match args.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::panda_default(),
    };
    let controller =
        VelocityCartesianDampingController::init(config, SimulatedArm::new(args.force, args.cycles))?;
    let publisher = controller.publisher().clone();
    let (ingestor, adjuster, receiver) = shared_inputs();

    let control_loop = ControlLoop::new(
        controller,
        receiver,
        LoopConfig {
            realtime_config: RealtimeConfig::Ignore,
            max_cycles: Some(args.cycles),
            ..Default::default()
        },
    );
    let publisher_stop = Arc::new(AtomicBool::new(false));
    let publisher_thread = publisher.spawn(LogSink, publisher_stop.clone());

    let velocity = args.velocity;
    let commander = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        ingestor.on_command(&JointCommand::velocity(vec![velocity, 0., 0., 0., 0., 0.]));
        thread::sleep(Duration::from_millis(500));
        if let Err(e) = adjuster.set_filter_target(0.6) {
            log::error!("{}", e);
        }
    });

    let summary = control_loop.run();
    publisher_stop.store(true, Ordering::Release);
    commander.join().expect("commander thread panicked");
    publisher_thread.join().expect("publisher thread panicked");
    let summary = summary?;
    info!(
        "finished {} cycles, {} missed deadlines, final joint velocities {:?}",
        summary.cycles, summary.missed_deadlines, summary.hardware.dq
    );
    Ok(())
}
