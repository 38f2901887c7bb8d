// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{debug, warn};

/// Priority for the consumer thread when TETROMIX_THREAD_PRIORITY is unset.
const DEFAULT_CONSUMER_THREAD_PRIORITY: u8 = 70;

/// Settings applied once by the consumer thread on its first callback.
/// Read from the environment before the stream starts so the callback never
/// touches the environment.
#[derive(Debug, Clone, Copy)]
pub struct ConsumerPriority {
    priority: Option<u8>,
    realtime: bool,
    applied: bool,
}

impl ConsumerPriority {
    /// A setting applied on the first call to `apply`.
    pub fn new(priority: Option<u8>, realtime: bool) -> ConsumerPriority {
        ConsumerPriority {
            priority,
            realtime,
            applied: false,
        }
    }

    /// Reads TETROMIX_THREAD_PRIORITY (0-99) and TETROMIX_DISABLE_RT_AUDIO.
    pub fn from_env() -> ConsumerPriority {
        ConsumerPriority::new(consumer_thread_priority(), rt_audio_enabled())
    }

    pub fn priority(&self) -> Option<u8> {
        self.priority
    }

    pub fn realtime(&self) -> bool {
        self.realtime
    }

    /// Raises the calling thread's priority the first time it is called and
    /// returns what happened. Later calls return `None`. Does not log, so it is
    /// safe to call from the device callback.
    pub fn apply(&mut self) -> Option<PriorityOutcome> {
        if self.applied {
            return None;
        }
        self.applied = true;

        let Some((value, priority)) = self
            .priority
            .and_then(|n| ThreadPriorityValue::try_from(n).ok().map(|p| (n, p)))
        else {
            return Some(PriorityOutcome::Unchanged);
        };
        let tp = ThreadPriority::Crossplatform(priority);
        if let Err(error) = set_current_thread_priority(tp) {
            return Some(PriorityOutcome::Failed {
                priority: value,
                realtime: false,
                error,
            });
        }

        #[cfg(unix)]
        if self.realtime {
            use thread_priority::unix::{
                set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
                ThreadSchedulePolicy,
            };
            if let Err(error) = set_thread_priority_and_policy(
                thread_native_id(),
                tp,
                ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
            ) {
                return Some(PriorityOutcome::Failed {
                    priority: value,
                    realtime: true,
                    error,
                });
            }
        }

        Some(PriorityOutcome::Raised {
            priority: value,
            realtime: cfg!(unix) && self.realtime,
        })
    }
}

/// The result of `ConsumerPriority::apply`, logged off the consumer thread.
#[derive(Debug)]
pub enum PriorityOutcome {
    /// No priority was configured.
    Unchanged,
    /// The thread now runs at `priority`, under SCHED_FIFO when `realtime`.
    Raised { priority: u8, realtime: bool },
    /// Raising the priority failed.
    Failed {
        priority: u8,
        realtime: bool,
        error: thread_priority::Error,
    },
}

impl PriorityOutcome {
    pub fn log(&self) {
        match self {
            PriorityOutcome::Unchanged => {}
            PriorityOutcome::Raised { priority, realtime } => {
                debug!(priority, realtime, "Raised consumer thread priority");
            }
            PriorityOutcome::Failed {
                priority,
                realtime: false,
                error,
            } => {
                debug!(priority, error = ?error, "Failed to raise consumer thread priority");
            }
            PriorityOutcome::Failed {
                priority,
                realtime: true,
                error,
            } => {
                warn!(priority, error = ?error, "Failed to set RT SCHED_FIFO for consumer thread");
            }
        }
    }
}

/// Parses TETROMIX_THREAD_PRIORITY, falling back to the default for values
/// that are missing or out of range.
fn consumer_thread_priority() -> Option<u8> {
    let priority = std::env::var("TETROMIX_THREAD_PRIORITY")
        .ok()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_CONSUMER_THREAD_PRIORITY);
    Some(priority)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// RT (SCHED_FIFO) scheduling is on unless TETROMIX_DISABLE_RT_AUDIO is set.
fn rt_audio_enabled() -> bool {
    !env_flag("TETROMIX_DISABLE_RT_AUDIO")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_priority_from_env() {
        std::env::set_var("TETROMIX_THREAD_PRIORITY", "42");
        std::env::set_var("TETROMIX_DISABLE_RT_AUDIO", "yes");
        let settings = ConsumerPriority::from_env();
        assert_eq!(settings.priority(), Some(42));
        assert!(!settings.realtime());

        std::env::set_var("TETROMIX_THREAD_PRIORITY", "250");
        std::env::remove_var("TETROMIX_DISABLE_RT_AUDIO");
        let settings = ConsumerPriority::from_env();
        assert_eq!(settings.priority(), Some(DEFAULT_CONSUMER_THREAD_PRIORITY));
        assert!(settings.realtime());

        std::env::remove_var("TETROMIX_THREAD_PRIORITY");
    }

    #[test]
    fn test_apply_reports_once() {
        let mut settings = ConsumerPriority::new(None, true);
        assert!(matches!(settings.apply(), Some(PriorityOutcome::Unchanged)));
        assert!(settings.apply().is_none());

        // Out of range values leave the thread alone.
        let mut settings = ConsumerPriority::new(Some(200), false);
        assert!(matches!(settings.apply(), Some(PriorityOutcome::Unchanged)));
        assert!(settings.apply().is_none());
    }
}
