// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

use crate::exception::{DampingException, DampingResult};
use std::path::Path;

/// Determines whether the current OS kernel is a realtime kernel.
///
/// On Linux, this checks for the existence of `/sys/kernel/realtime`.
pub fn has_realtime_kernel() -> bool {
    Path::new("/sys/kernel/realtime").exists()
}

fn realtime_exception(message: &str) -> DampingException {
    DampingException::RealTimeException {
        message: format!("cartesian-damping: {}", message),
    }
}

/// Moves the current thread to the FIFO scheduler one below the highest priority and locks
/// its memory so the control loop is not swapped out.
///
/// # Errors
/// * RealTimeException if realtime priority cannot be set for the current thread.
///
/// If the method returns an Error please check your /etc/security/limits.conf file
/// There should be a line like this:
/// ```text
///marco            -       rtprio          99
/// ```
pub fn set_current_thread_to_highest_scheduler_priority() -> DampingResult<()> {
    unsafe {
        let max_priority = libc::sched_get_priority_max(libc::SCHED_FIFO);
        if max_priority == -1 {
            return Err(realtime_exception(
                "unable to get maximum possible thread priority",
            ));
        }
        // https://rt.wiki.kernel.org/index.php/HOWTO:_Build_an_RT-application recommends to
        // stay below the maximum priority
        let thread_param = libc::sched_param {
            sched_priority: max_priority - 1,
        };
        if libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &thread_param) != 0 {
            return Err(realtime_exception("unable to set realtime scheduling"));
        }
        if libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) != 0 {
            return Err(realtime_exception("unable to lock memory"));
        }
    }
    Ok(())
}
