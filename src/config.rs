use crate::driver::DEFAULT_PASSWORD;

/// How long a workflow waits for a finger before giving up.
///
/// A capture attempt that comes back `NoFinger` is retried after
/// `retry_delay_ms`; any other failure is never retried here. With
/// `max_attempts` of `None` the loop waits forever, which is only sensible
/// when something else (an operator, a supervising task) can interrupt it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquirePolicy {
    pub max_attempts: Option<u32>,
    pub retry_delay_ms: u16,
}

impl Default for AcquirePolicy {
    fn default() -> Self {
        // 400 polls of 50ms gives the operator 20 seconds
        Self {
            max_attempts: Some(400),
            retry_delay_ms: 50,
        }
    }
}

/// Timing of the gap between the two enrollment captures.
///
/// The module needs the finger lifted and replaced between captures or the
/// second one is too similar to fuse. By default the workflow just pauses
/// for `pause_ms`; with `wait_finger_removal` set it instead polls the
/// window until it reads empty, up to `removal_polls` times, and proceeds
/// regardless once the polls run out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollPolicy {
    pub pause_ms: u16,
    pub wait_finger_removal: bool,
    pub removal_polls: u32,
    pub removal_poll_delay_ms: u16,
}

impl Default for EnrollPolicy {
    fn default() -> Self {
        Self {
            pause_ms: 1000,
            wait_finger_removal: false,
            removal_polls: 20,
            removal_poll_delay_ms: 50,
        }
    }
}

/// How identification keeps trying.
///
/// Each attempt is a fresh capture, conversion and library search; misses
/// and unusable captures both consume an attempt. `fast` switches to the
/// module's accelerated search path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifyPolicy {
    pub attempts: u32,
    pub fast: bool,
}

impl Default for IdentifyPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            fast: false,
        }
    }
}

/// Shape of a batch enrollment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Consecutive slots to fill.
    pub slots: u8,
    /// Capture attempts per slot before the run is abandoned.
    pub attempts_per_slot: u32,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            slots: 5,
            attempts_per_slot: 5,
        }
    }
}

/// Everything a [`Session`](crate::Session) needs to know besides the
/// serial port: the device password and the per-workflow policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub password: u32,
    pub acquire: AcquirePolicy,
    pub enroll: EnrollPolicy,
    pub identify: IdentifyPolicy,
    pub batch: BatchPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            password: DEFAULT_PASSWORD,
            acquire: AcquirePolicy::default(),
            enroll: EnrollPolicy::default(),
            identify: IdentifyPolicy::default(),
            batch: BatchPolicy::default(),
        }
    }
}
