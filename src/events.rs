use crate::responses::StatusCode;
use crate::template::TemplateSlot;

/// Progress notifications emitted while a workflow runs.
///
/// Workflows block on the sensor for human-scale stretches of time, so the
/// caller gets told whenever there is something an operator could act on,
/// like placing or lifting a finger. Delivery order follows the workflow;
/// no event is ever emitted after the workflow call has returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// The workflow wants a finger on the window. Enrollment captures the
    /// same finger twice; `pass` is 1 or 2.
    PlaceFinger { pass: u8 },
    /// A capture attempt found the window empty. Attempt numbering starts
    /// at 1 and resets for every acquisition.
    NoFingerYet { attempt: u32 },
    /// A capture attempt got an image.
    ImageCaptured,
    /// The workflow wants the finger lifted before it continues.
    RemoveFinger,
    /// Identification is starting capture attempt `attempt`.
    IdentifyAttempt { attempt: u32 },
    /// Batch enrollment is starting attempt `attempt` on `slot`.
    EnrollAttempt { slot: TemplateSlot, attempt: u32 },
    /// An attempt failed with a sensor-reported condition and will be
    /// retried.
    AttemptFailed { status: StatusCode },
    /// A template was stored in `slot`.
    SlotEnrolled { slot: TemplateSlot },
}

/// Receiver for [`WorkflowEvent`]s.
///
/// Implemented by whatever drives the user interface; a unit sink is
/// provided for headless use.
pub trait EventSink {
    fn emit(&mut self, event: &WorkflowEvent);
}

/// Discards all events.
impl EventSink for () {
    fn emit(&mut self, _event: &WorkflowEvent) {}
}
