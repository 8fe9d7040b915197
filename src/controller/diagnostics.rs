// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the controller state messages and a publisher which can be filled from the
//! real-time thread without ever waiting for a reader.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::info;

/// State of one joint as seen by the controller.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct JointControllerState {
    /// Unfiltered joint velocity target.
    pub set_point: f64,
    /// Filtered joint velocity, the value which is commanded.
    pub process_value: f64,
    /// Duration of the control cycle. Unit: \[s\]
    pub time_step: f64,
    /// Controller time at which the state was recorded.
    pub stamp: Duration,
}

/// Controller state of all joints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointControllerStates {
    pub controller_name: String,
    pub names: Vec<String>,
    pub joint_controller_states: Vec<JointControllerState>,
}

/// Receives the published controller states. Called outside of the real-time thread.
pub trait DiagnosticSink {
    fn publish(&mut self, states: &JointControllerStates);
}

/// A [`DiagnosticSink`] which writes every message to the log at info level.
#[derive(Debug, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn publish(&mut self, states: &JointControllerStates) {
        let set_points: Vec<f64> = states
            .joint_controller_states
            .iter()
            .map(|x| x.set_point)
            .collect();
        let process_values: Vec<f64> = states
            .joint_controller_states
            .iter()
            .map(|x| x.process_value)
            .collect();
        info!(
            "{}: set points {:?}, applied {:?}",
            states.controller_name, set_points, process_values
        );
    }
}

/// Decides whether something should be done at a lower rate than the control loop.
#[derive(Debug, Copy, Clone)]
pub struct TriggerRate {
    period: Option<Duration>,
    time_stamp: Duration,
}

impl TriggerRate {
    /// creates a TriggerRate which fires with `rate` Hz. A rate which is not positive and finite,
    /// or whose period does not fit into a [`Duration`], never fires.
    pub fn new(rate: f64) -> Self {
        let period = if rate.is_finite() && rate > 0. {
            Duration::try_from_secs_f64(1. / rate).ok()
        } else {
            None
        };
        TriggerRate {
            period,
            time_stamp: Duration::from_secs(0),
        }
    }
    /// Restarts the period at the given time.
    pub fn reset(&mut self, time: Duration) {
        self.time_stamp = time;
    }
    /// returns true if more than one period passed since the last time it returned true.
    pub fn trigger(&mut self, time: Duration) -> bool {
        match self.period {
            Some(period) if time.saturating_sub(self.time_stamp) > period => {
                self.time_stamp = time;
                true
            }
            _ => false,
        }
    }
}

struct Slot {
    msg: JointControllerStates,
    ready: bool,
}

/// Publisher of [`JointControllerStates`] with a single message buffer.
///
/// The real-time side calls [`trylock`](`Self::trylock`) which never waits: if the buffer is
/// locked by the publishing side, or the last message was not published yet, the cycle is
/// skipped. The message is sized once at creation, so filling it does not allocate.
#[derive(Clone)]
pub struct RealtimePublisher {
    slot: Arc<Mutex<Slot>>,
}

/// Exclusive access to the message buffer of a [`RealtimePublisher`].
pub struct PublisherGuard<'a> {
    guard: MutexGuard<'a, Slot>,
}

impl<'a> PublisherGuard<'a> {
    pub fn msg_mut(&mut self) -> &mut JointControllerStates {
        &mut self.guard.msg
    }
    /// Releases the buffer and marks the message as ready to be published.
    pub fn unlock_and_publish(mut self) {
        self.guard.ready = true;
    }
}

impl RealtimePublisher {
    /// creates a publisher whose message has one entry per joint name.
    pub fn new(controller_name: &str, joint_names: &[String]) -> Self {
        let msg = JointControllerStates {
            controller_name: controller_name.to_string(),
            names: joint_names.to_vec(),
            joint_controller_states: vec![JointControllerState::default(); joint_names.len()],
        };
        RealtimePublisher {
            slot: Arc::new(Mutex::new(Slot { msg, ready: false })),
        }
    }

    /// Tries to get the message buffer without blocking.
    ///
    /// # Return
    /// None if the buffer is in use or still holds an unpublished message.
    pub fn trylock(&self) -> Option<PublisherGuard<'_>> {
        let guard = match self.slot.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return None,
        };
        if guard.ready {
            return None;
        }
        Some(PublisherGuard { guard })
    }

    /// Hands a pending message to the sink. Must not be called from the real-time thread.
    ///
    /// # Return
    /// true if a message was published.
    pub fn publish_pending<S: DiagnosticSink + ?Sized>(&self, sink: &mut S) -> bool {
        let msg = {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            if !slot.ready {
                return false;
            }
            slot.ready = false;
            slot.msg.clone()
        };
        sink.publish(&msg);
        true
    }

    /// Starts a thread which polls for pending messages and publishes them until `stop` is set.
    pub fn spawn<S: DiagnosticSink + Send + 'static>(
        &self,
        mut sink: S,
        stop: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        let publisher = self.clone();
        std::thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                if !publisher.publish_pending(&mut sink) {
                    std::thread::sleep(Duration::from_micros(500));
                }
            }
            publisher.publish_pending(&mut sink);
        })
    }
}
