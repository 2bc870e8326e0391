use core::fmt;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::serial::{Read, Write};
use log::debug;

use crate::config::AcquirePolicy;
use crate::driver::Zfm20;
use crate::events::{EventSink, WorkflowEvent};
use crate::responses::StatusCode;
use crate::utils::Error;

/// Why an acquisition gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    /// No finger showed up within the policy's attempt budget.
    NoFingerTimeout { attempts: u32 },
    /// A capture attempt failed with something other than an empty window.
    Failed(StatusCode),
    /// The serial link or the framing broke.
    Link(Error),
}

impl fmt::Display for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquireError::NoFingerTimeout { attempts } => {
                write!(f, "no finger detected in {} attempts", attempts)
            }
            AcquireError::Failed(status) => write!(f, "capture failed: {}", status),
            AcquireError::Link(err) => write!(f, "{}", err),
        }
    }
}

impl From<Error> for AcquireError {
    fn from(err: Error) -> Self {
        AcquireError::Link(err)
    }
}

/// Captures a fingerprint image into the module's image buffer, waiting
/// for a finger to show up.
///
/// Only an empty window (`NoFinger`) is retried; the sensor saying so is
/// the normal state of the world until the operator acts, not a fault.
/// Every other non-`Ok` status aborts immediately, because repeating the
/// exact capture cannot fix a messy or failed read.
pub fn acquire_image<TX, RX, D, S>(
    driver: &mut Zfm20<TX, RX>,
    delay: &mut D,
    policy: &AcquirePolicy,
    events: &mut S,
) -> Result<(), AcquireError>
where
    TX: Write<u8>,
    RX: Read<u8>,
    D: DelayMs<u16>,
    S: EventSink,
{
    let mut attempt = 0u32;
    loop {
        match driver.capture_image()? {
            StatusCode::Ok => {
                debug!("image captured after {} empty polls", attempt);
                events.emit(&WorkflowEvent::ImageCaptured);
                return Ok(());
            }
            StatusCode::NoFinger => {
                attempt += 1;
                events.emit(&WorkflowEvent::NoFingerYet { attempt });
                if let Some(max) = policy.max_attempts {
                    if attempt >= max {
                        return Err(AcquireError::NoFingerTimeout { attempts: attempt });
                    }
                }
                delay.delay_ms(policy.retry_delay_ms);
            }
            status => return Err(AcquireError::Failed(status)),
        }
    }
}
