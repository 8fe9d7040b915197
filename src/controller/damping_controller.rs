// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the [`VelocityCartesianDampingController`].
use std::time::Duration;

use log::{debug, error, info};

use crate::config::ControllerConfig;
use crate::controller::command_ingestor::{stage_command, StagedCommand};
use crate::controller::control_types::JointCommand;
use crate::controller::diagnostics::{RealtimePublisher, TriggerRate};
use crate::controller::filter::{smooth_joint_velocities, FilterState};
use crate::controller::hardware::{Frame, RobotHardware};
use crate::controller::pseudo_inverse::damped_pseudo_inverse;
use crate::controller::velocity_limits::{JointLimits, VelocityLimitMode};
use crate::exception::{DampingException, DampingResult};
use crate::utils::{array_to_jacobian, vector7_to_array, Vector6};

/// Cartesian velocity controller which yields to external forces.
///
/// Every cycle the desired Cartesian velocity of the end effector is corrected by the
/// estimated external wrench divided by a per-axis compliance, mapped to joint velocities with
/// the damped pseudo-inverse of the zero Jacobian and smoothed before it is sent to the joints.
///
/// The command sent in a cycle is the filtered value of the *previous* cycle. A new target
/// therefore becomes visible at the joints one cycle after it was computed.
///
/// # Lifecycle
/// * [`init`](`Self::init`) - resolve the joints and bind the hardware.
/// * [`starting`](`Self::starting`) - seed the filter with the measured joint velocities.
/// * [`update`](`Self::update`) - one control cycle.
/// * [`stopping`](`Self::stopping`) - hand the hardware back without commanding anything.
pub struct VelocityCartesianDampingController<H: RobotHardware> {
    hardware: H,
    config: ControllerConfig,
    joint_limits: JointLimits,
    cartesian_target: [f64; 6],
    joint_velocity_target: [f64; 7],
    filtered_joint_velocity: [f64; 7],
    previous_joint_velocity: [f64; 7],
    filter: FilterState,
    trigger_publish: TriggerRate,
    publisher: RealtimePublisher,
    limit_violations: u64,
}

impl<H: RobotHardware> VelocityCartesianDampingController<H> {
    /// Creates the controller and binds all hardware handles it needs.
    ///
    /// # Errors
    /// * ConfigurationException if the joint names or velocity limits are incomplete or a
    /// tunable constant is invalid.
    /// * HardwareException if a handle cannot be bound.
    pub fn init(config: ControllerConfig, mut hardware: H) -> DampingResult<Self> {
        let log_error = |e: DampingException| {
            error!("VelocityCartesianDampingController: {}", e);
            e
        };
        config.validate().map_err(log_error)?;
        let joint_limits = config.joint_limits().map_err(log_error)?;
        hardware
            .bind_joint_velocity_handles(&joint_limits.joint_names)
            .map_err(log_error)?;
        hardware
            .bind_state_handles(&config.arm_id)
            .map_err(log_error)?;
        if config.velocity_limit_mode != VelocityLimitMode::Off {
            info!(
                "VelocityCartesianDampingController: velocity limit mode {:?}",
                config.velocity_limit_mode
            );
        }
        let publisher = RealtimePublisher::new(&config.controller_name, &joint_limits.joint_names);
        debug!(
            "VelocityCartesianDampingController: initialized joints {:?}",
            joint_limits.joint_names
        );
        Ok(VelocityCartesianDampingController {
            hardware,
            joint_limits,
            cartesian_target: [0.; 6],
            joint_velocity_target: [0.; 7],
            filtered_joint_velocity: [0.; 7],
            previous_joint_velocity: [0.; 7],
            filter: FilterState::new(config.filter.initial_coefficient),
            trigger_publish: TriggerRate::new(config.controller_state_publish_rate),
            publisher,
            limit_violations: 0,
            config,
        })
    }

    /// Seeds the filter with the measured joint velocities so the first command does not jump.
    pub fn starting(&mut self, time: Duration) {
        let measured = self.hardware.joint_velocities();
        self.filtered_joint_velocity = measured;
        self.previous_joint_velocity = measured;
        self.trigger_publish.reset(time);
    }

    /// Runs one control cycle. Does not allocate and does not block.
    ///
    /// # Arguments
    /// * `time` - Controller time of this cycle.
    /// * `period` - Time since the last cycle.
    pub fn update(&mut self, time: Duration, period: Duration) {
        let robot_state = self.hardware.robot_state();
        let jacobian = array_to_jacobian(&self.hardware.zero_jacobian(&Frame::EndEffector));

        let mut compliant_cartesian_target = Vector6::zeros();
        for i in 0..6 {
            let force = -robot_state.O_F_ext_hat_K[i];
            compliant_cartesian_target[i] =
                self.cartesian_target[i] + force / self.config.compliances[i];
        }
        let jacobian_pinv = damped_pseudo_inverse(&jacobian, &self.config.pseudo_inverse);
        let target = vector7_to_array(&(jacobian_pinv * compliant_cartesian_target));
        self.joint_velocity_target = self.checked_target(target);

        self.hardware
            .set_joint_velocity_command(&self.filtered_joint_velocity);
        self.previous_joint_velocity = self.hardware.joint_velocities();
        let coefficient = self.filter.active() * self.config.filter.filter_factor;
        smooth_joint_velocities(
            coefficient,
            &self.joint_velocity_target,
            &mut self.filtered_joint_velocity,
        );

        if self.trigger_publish.trigger(time) {
            if let Some(mut guard) = self.publisher.trylock() {
                let msg = guard.msg_mut();
                for (i, state) in msg.joint_controller_states.iter_mut().enumerate() {
                    state.set_point = self.joint_velocity_target[i];
                    state.process_value = self.filtered_joint_velocity[i];
                    state.time_step = period.as_secs_f64();
                    state.stamp = time;
                }
                guard.unlock_and_publish();
            }
        }

        self.filter.step(self.config.filter.param_change_filter);
    }

    /// Replaces non-finite targets and applies the velocity limit mode.
    fn checked_target(&mut self, target: [f64; 7]) -> [f64; 7] {
        if target.iter().any(|x| !x.is_finite()) {
            return self.previous_joint_velocity;
        }
        match self.config.velocity_limit_mode {
            VelocityLimitMode::Off => target,
            VelocityLimitMode::Warn => {
                if self.joint_limits.is_over_limit(&target) {
                    self.limit_violations += 1;
                }
                target
            }
            VelocityLimitMode::Reject => {
                if self.joint_limits.is_over_limit(&target) {
                    self.limit_violations += 1;
                    self.previous_joint_velocity
                } else {
                    target
                }
            }
        }
    }

    /// Validates and applies a velocity command, see [`stage_command`].
    pub fn command_callback(&mut self, command: &JointCommand) {
        let staged = stage_command(command);
        self.apply_staged(staged);
    }

    /// Applies an already validated command.
    pub fn apply_staged(&mut self, staged: StagedCommand) {
        match staged {
            StagedCommand::Target(target) => self.cartesian_target = target,
            StagedCommand::Fallback => {
                self.filtered_joint_velocity = self.previous_joint_velocity;
                self.joint_velocity_target = self.previous_joint_velocity;
            }
            StagedCommand::Ignored => {}
        }
    }

    /// Sets the filter coefficient the active one is blended towards. Values outside of \[0, 1\]
    /// are clamped, NaN is ignored.
    pub fn set_filter_target(&mut self, target: f64) {
        if !target.is_nan() {
            self.filter.set_target(target.clamp(0., 1.));
        }
    }

    /// Checks whether any of the velocities exceeds the configured joint velocity limits.
    pub fn check_velocity_limits(&self, velocities: &[f64; 7]) -> bool {
        self.joint_limits.is_over_limit(velocities)
    }

    /// Deactivates the controller and returns the hardware.
    ///
    /// No command is sent. Commanding zero velocities while the robot moves would put high loads
    /// on it, the built-in stopping behavior of the robot slows it down instead.
    pub fn stopping(self) -> H {
        debug!("VelocityCartesianDampingController: stopping");
        self.hardware
    }

    pub fn cartesian_target(&self) -> &[f64; 6] {
        &self.cartesian_target
    }
    /// Unfiltered joint velocity target of the last cycle.
    pub fn joint_velocity_target(&self) -> &[f64; 7] {
        &self.joint_velocity_target
    }
    /// Joint velocities which will be commanded in the next cycle.
    pub fn filtered_joint_velocity(&self) -> &[f64; 7] {
        &self.filtered_joint_velocity
    }
    /// Measured joint velocities of the last cycle, used as fallback for malformed commands.
    pub fn previous_joint_velocity(&self) -> &[f64; 7] {
        &self.previous_joint_velocity
    }
    pub fn filter_state(&self) -> &FilterState {
        &self.filter
    }
    pub fn joint_limits(&self) -> &JointLimits {
        &self.joint_limits
    }
    /// Number of cycles in which the joint velocity target exceeded the limits.
    pub fn limit_violations(&self) -> u64 {
        self.limit_violations
    }
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }
    /// Publisher of the controller states. Use [`RealtimePublisher::spawn`] to forward them.
    pub fn publisher(&self) -> &RealtimePublisher {
        &self.publisher
    }
    pub fn hardware(&self) -> &H {
        &self.hardware
    }
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::config::ControllerConfig;
    use crate::controller::control_types::{CommandMode, JointCommand};
    use crate::controller::damping_controller::VelocityCartesianDampingController;
    use crate::controller::diagnostics::tests::CollectingSink;
    use crate::controller::hardware::{MockRobotHardware, RobotState};
    use crate::controller::velocity_limits::VelocityLimitMode;
    use crate::exception::DampingException;
    use crate::utils::test_utils::{float_compare, slice_compare};

    pub type Commands = Arc<Mutex<Vec<[f64; 7]>>>;

    /// [I | 0]: the first six joints move the six Cartesian axes, the seventh does nothing
    fn identity_jacobian() -> [f64; 42] {
        let mut jacobian = [0.; 42];
        for i in 0..6 {
            jacobian[i * 6 + i] = 1.;
        }
        jacobian
    }

    fn mock_hardware(
        measured: [f64; 7],
        wrench: [f64; 6],
        jacobian: [f64; 42],
        commands: Commands,
    ) -> MockRobotHardware {
        let mut hardware = MockRobotHardware::new();
        hardware
            .expect_bind_joint_velocity_handles()
            .withf(|names| names.len() == 7)
            .times(1)
            .returning(|_| Ok(()));
        hardware
            .expect_bind_state_handles()
            .times(1)
            .returning(|_| Ok(()));
        hardware.expect_joint_velocities().return_const(measured);
        hardware.expect_robot_state().return_const(RobotState {
            O_F_ext_hat_K: wrench,
            dq: measured,
        });
        hardware.expect_zero_jacobian().return_const(jacobian);
        hardware
            .expect_set_joint_velocity_command()
            .returning(move |command| commands.lock().unwrap().push(*command));
        hardware
    }

    pub fn unit_filter_config() -> ControllerConfig {
        let mut config = ControllerConfig::panda_default();
        config.filter.initial_coefficient = 0.5;
        config.filter.filter_factor = 1.;
        config
    }

    pub fn started_controller(
        config: ControllerConfig,
        measured: [f64; 7],
        wrench: [f64; 6],
    ) -> (VelocityCartesianDampingController<MockRobotHardware>, Commands) {
        let commands = Commands::default();
        let hardware = mock_hardware(measured, wrench, identity_jacobian(), commands.clone());
        let mut controller = VelocityCartesianDampingController::init(config, hardware).unwrap();
        controller.starting(Duration::from_millis(0));
        (controller, commands)
    }

    pub fn cycle(controller: &mut VelocityCartesianDampingController<MockRobotHardware>, k: u64) {
        controller.update(Duration::from_millis(k), Duration::from_millis(1));
    }

    #[test]
    fn first_command_is_the_measured_velocity() {
        let (mut controller, commands) =
            started_controller(unit_filter_config(), [0.; 7], [0.; 6]);
        controller.command_callback(&JointCommand::velocity(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]));
        cycle(&mut controller, 1);
        assert_eq!(commands.lock().unwrap()[0], [0.; 7]);
        slice_compare(
            controller.joint_velocity_target(),
            &[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.],
            1e-9,
        );
    }

    #[test]
    fn starting_seeds_filter_with_measured_velocity() {
        let measured = [0.1, -0.1, 0.2, -0.2, 0.3, -0.3, 0.05];
        let (mut controller, commands) = started_controller(unit_filter_config(), measured, [0.; 6]);
        assert_eq!(controller.filtered_joint_velocity(), &measured);
        assert_eq!(controller.previous_joint_velocity(), &measured);
        cycle(&mut controller, 1);
        assert_eq!(commands.lock().unwrap()[0], measured);
    }

    #[test]
    fn command_is_delayed_by_one_cycle_and_smoothed() {
        let mut config = unit_filter_config();
        config.filter.param_change_filter = 0.;
        let (mut controller, commands) = started_controller(config, [0.; 7], [0.; 6]);
        controller.command_callback(&JointCommand::velocity(vec![1., 0., 0., 0., 0., 0.]));
        for k in 1..=4 {
            cycle(&mut controller, k);
        }
        let commands = commands.lock().unwrap();
        let first_joint: Vec<f64> = commands.iter().map(|c| c[0]).collect();
        slice_compare(&first_joint, &[0., 0.5, 0.75, 0.875], 1e-9);
        float_compare(controller.filtered_joint_velocity()[0], 0.9375, 1e-9);
    }

    #[test]
    fn external_force_is_yielded_to() {
        let mut wrench = [0.; 6];
        wrench[2] = 10.;
        wrench[0] = 60.;
        let (mut controller, _commands) =
            started_controller(unit_filter_config(), [0.; 7], wrench);
        cycle(&mut controller, 1);
        let target = controller.joint_velocity_target();
        // z compliance is 100, x compliance is 600
        float_compare(target[2], -0.1, 1e-9);
        float_compare(target[0], -0.1, 1e-9);
        float_compare(target[1], 0., 1e-9);
    }

    #[test]
    fn valid_command_is_staged_verbatim_and_idempotent() {
        let (mut controller, _commands) =
            started_controller(unit_filter_config(), [0.; 7], [0.; 6]);
        let velocity = vec![0.01, -0.02, 0.03, -0.04, 0.05, -0.06];
        controller.command_callback(&JointCommand::velocity(velocity.clone()));
        assert_eq!(controller.cartesian_target().to_vec(), velocity);
        controller.command_callback(&JointCommand::velocity(velocity.clone()));
        assert_eq!(controller.cartesian_target().to_vec(), velocity);
    }

    #[test]
    fn malformed_command_falls_back_to_last_known_good() {
        let measured = [0.2; 7];
        let (mut controller, _commands) = started_controller(unit_filter_config(), measured, [0.; 6]);
        controller.command_callback(&JointCommand::velocity(vec![1., 1., 1., 1., 1., 1.]));
        cycle(&mut controller, 1);
        cycle(&mut controller, 2);
        assert_ne!(controller.filtered_joint_velocity(), &measured);

        controller.command_callback(&JointCommand::velocity(vec![5., 5., 5.]));
        assert_eq!(controller.cartesian_target(), &[1.; 6]);
        assert_eq!(controller.filtered_joint_velocity(), &measured);
        assert_eq!(controller.joint_velocity_target(), &measured);
    }

    #[test]
    fn other_modes_do_not_change_the_target() {
        let (mut controller, _commands) =
            started_controller(unit_filter_config(), [0.; 7], [0.; 6]);
        let mut command = JointCommand::velocity(vec![1.; 6]);
        command.mode = CommandMode::Impedance;
        controller.command_callback(&command);
        assert_eq!(controller.cartesian_target(), &[0.; 6]);
    }

    #[test]
    fn filter_coefficient_is_blended_every_cycle() {
        let (mut controller, _commands) =
            started_controller(ControllerConfig::panda_default(), [0.; 7], [0.; 6]);
        assert_eq!(controller.filter_state().active(), 0.3);
        controller.set_filter_target(0.9);
        assert_eq!(controller.filter_state().active(), 0.3);
        cycle(&mut controller, 1);
        float_compare(
            controller.filter_state().active(),
            0.005 * 0.9 + 0.995 * 0.3,
            1e-12,
        );
        controller.set_filter_target(7.);
        assert_eq!(controller.filter_state().target(), 1.);
        controller.set_filter_target(f64::NAN);
        assert_eq!(controller.filter_state().target(), 1.);
    }

    #[test]
    fn reject_mode_holds_previous_velocity() {
        let mut config = unit_filter_config();
        config.velocity_limit_mode = VelocityLimitMode::Reject;
        let measured = [0.1; 7];
        let (mut controller, _commands) = started_controller(config, measured, [0.; 6]);
        controller.command_callback(&JointCommand::velocity(vec![10., 0., 0., 0., 0., 0.]));
        cycle(&mut controller, 1);
        assert_eq!(controller.joint_velocity_target(), &measured);
        assert_eq!(controller.limit_violations(), 1);
    }

    #[test]
    fn warn_mode_applies_target() {
        let mut config = unit_filter_config();
        config.velocity_limit_mode = VelocityLimitMode::Warn;
        let (mut controller, _commands) = started_controller(config, [0.; 7], [0.; 6]);
        controller.command_callback(&JointCommand::velocity(vec![10., 0., 0., 0., 0., 0.]));
        cycle(&mut controller, 1);
        float_compare(controller.joint_velocity_target()[0], 10., 1e-9);
        assert_eq!(controller.limit_violations(), 1);
        assert!(controller.check_velocity_limits(controller.joint_velocity_target()));
    }

    #[test]
    fn non_finite_wrench_keeps_commands_finite() {
        let mut wrench = [0.; 6];
        wrench[1] = f64::NAN;
        let (mut controller, commands) = started_controller(unit_filter_config(), [0.; 7], wrench);
        for k in 1..=3 {
            cycle(&mut controller, k);
        }
        assert!(commands
            .lock()
            .unwrap()
            .iter()
            .all(|c| c.iter().all(|x| x.is_finite())));
        assert!(controller
            .filtered_joint_velocity()
            .iter()
            .all(|x| x.is_finite()));
    }

    #[test]
    fn controller_state_is_published_at_its_rate() {
        let mut config = unit_filter_config();
        config.controller_state_publish_rate = 100.;
        let (mut controller, _commands) = started_controller(config, [0.; 7], [0.; 6]);
        controller.command_callback(&JointCommand::velocity(vec![0.5, 0., 0., 0., 0., 0.]));
        let mut sink = CollectingSink::default();
        for k in 1..=25 {
            cycle(&mut controller, k);
            controller.publisher().publish_pending(&mut sink);
        }
        let messages = sink.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        let state = &messages[0].joint_controller_states[0];
        assert_eq!(messages[0].controller_name, "velocity_cartesian_damping_controller");
        assert_eq!(messages[0].names[0], "panda_joint1");
        float_compare(state.set_point, 0.5, 1e-9);
        assert!(state.process_value > 0. && state.process_value < 0.5);
        float_compare(state.time_step, 0.001, 1e-12);
        assert_eq!(state.stamp, Duration::from_millis(11));
    }

    #[test]
    fn tiny_publish_rate_never_publishes() {
        let mut config = unit_filter_config();
        config.controller_state_publish_rate = 1e-300;
        assert!(config.validate().is_ok());
        let (mut controller, _commands) = started_controller(config, [0.; 7], [0.; 6]);
        let mut sink = CollectingSink::default();
        cycle(&mut controller, 1_000_000);
        assert!(!controller.publisher().publish_pending(&mut sink));
    }

    #[test]
    fn stopping_sends_no_command() {
        let (mut controller, commands) =
            started_controller(unit_filter_config(), [0.3; 7], [0.; 6]);
        cycle(&mut controller, 1);
        let _hardware = controller.stopping();
        assert_eq!(commands.lock().unwrap().len(), 1);
    }

    #[test]
    fn invalid_configuration_is_fatal() {
        let mut config = ControllerConfig::panda_default();
        config.joint_velocity_limit.remove("panda_joint7");
        let mut hardware = MockRobotHardware::new();
        hardware.expect_bind_joint_velocity_handles().times(0);
        hardware.expect_bind_state_handles().times(0);
        let result = VelocityCartesianDampingController::init(config, hardware);
        assert!(matches!(
            result,
            Err(DampingException::ConfigurationException { .. })
        ));
    }

    #[test]
    fn unbound_handle_is_fatal() {
        let mut hardware = MockRobotHardware::new();
        hardware
            .expect_bind_joint_velocity_handles()
            .returning(|_| {
                Err(DampingException::HardwareException {
                    message: "Exception getting joint handles".to_string(),
                })
            });
        hardware.expect_bind_state_handles().times(0);
        let result =
            VelocityCartesianDampingController::init(ControllerConfig::panda_default(), hardware);
        assert!(matches!(
            result,
            Err(DampingException::HardwareException { .. })
        ));
    }
}
