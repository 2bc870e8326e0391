use core::fmt;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::serial::{Read, Write};
use log::{debug, info, warn};

use crate::acquire::{acquire_image, AcquireError};
use crate::commands::{BufferKind, CharBuffer};
use crate::config::SessionConfig;
use crate::driver::Zfm20;
use crate::events::{EventSink, WorkflowEvent};
use crate::image::{DecodeError, ImageRaster, RawImageBuffer};
use crate::responses::{StatusCode, SystemParameters};
use crate::template::{TemplateDirectory, TemplateSlot};
use crate::utils::Error;

/// Why a workflow stopped short of its goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowError {
    /// The module refused the password or the parameter read, so no
    /// session could be established.
    Handshake(StatusCode),
    /// Waiting for a finger gave up or failed.
    Acquire(AcquireError),
    /// Converting a capture into a template failed, or fusing the two
    /// enrollment captures failed with something other than a mismatch.
    Template(StatusCode),
    /// The library search failed outright (a miss is not a failure).
    Search(StatusCode),
    /// The two enrollment captures were not the same finger.
    EnrollMismatch,
    /// Writing the fused model to flash failed.
    Store(StatusCode),
    /// Deleting a stored template failed.
    Delete(StatusCode),
    /// Reading the library occupancy bitmap failed.
    Directory(StatusCode),
    /// The module refused to upload a buffer.
    Fetch(StatusCode),
    /// No run of free consecutive slots large enough for the request.
    DirectoryFull,
    /// A batch slot was given up on after its attempt budget ran out.
    RetriesExhausted { slot: TemplateSlot, attempts: u32 },
    /// The serial link or the framing broke mid-workflow.
    Link(Error),
}

impl fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowError::Handshake(status) => write!(f, "handshake refused: {}", status),
            WorkflowError::Acquire(err) => write!(f, "{}", err),
            WorkflowError::Template(status) => {
                write!(f, "could not build template: {}", status)
            }
            WorkflowError::Search(status) => write!(f, "search failed: {}", status),
            WorkflowError::EnrollMismatch => write!(f, "prints did not match"),
            WorkflowError::Store(status) => write!(f, "store failed: {}", status),
            WorkflowError::Delete(status) => write!(f, "delete failed: {}", status),
            WorkflowError::Directory(status) => {
                write!(f, "directory read failed: {}", status)
            }
            WorkflowError::Fetch(status) => write!(f, "buffer upload refused: {}", status),
            WorkflowError::DirectoryFull => {
                write!(f, "template library has no room for the request")
            }
            WorkflowError::RetriesExhausted { slot, attempts } => {
                write!(f, "slot {} not enrolled after {} attempts", slot, attempts)
            }
            WorkflowError::Link(err) => write!(f, "{}", err),
        }
    }
}

impl From<Error> for WorkflowError {
    fn from(err: Error) -> Self {
        WorkflowError::Link(err)
    }
}

impl From<AcquireError> for WorkflowError {
    fn from(err: AcquireError) -> Self {
        match err {
            AcquireError::Link(link) => WorkflowError::Link(link),
            other => WorkflowError::Acquire(other),
        }
    }
}

/// Result of holding a finger against the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// The capture matched the template in `slot`. `confidence` is the
    /// module's match score; higher is better, the scale is not
    /// documented.
    Found {
        slot: TemplateSlot,
        confidence: u16,
    },
    /// The capture matched nothing in the library.
    NoMatch,
}

/// What [`Session::preview`] produced from a single capture.
///
/// The image half and the match half are independent: a transfer that
/// cannot be decoded still gets its capture searched against the library.
#[derive(Debug)]
pub struct PreviewOutcome {
    pub image: Result<ImageRaster, DecodeError>,
    pub search: MatchOutcome,
}

/// A finished batch enrollment: `count` consecutive slots starting at
/// `first`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrolledBatch {
    pub first: TemplateSlot,
    pub count: u8,
}

/// An authenticated connection to a module, plus the workflows built on
/// top of the raw commands.
///
/// A session owns the driver and the delay source. Opening one verifies
/// the password and reads the system parameters; the template directory
/// mirror starts empty and is only as fresh as the last
/// [`Session::refresh_directory`], since the sensor alone owns the real
/// thing.
#[derive(Debug)]
pub struct Session<TX, RX, D> {
    driver: Zfm20<TX, RX>,
    delay: D,
    config: SessionConfig,
    params: SystemParameters,
    directory: TemplateDirectory,
}

impl<TX, RX, D> Session<TX, RX, D>
where
    TX: Write<u8>,
    RX: Read<u8>,
    D: DelayMs<u16>,
{
    /// Performs the password handshake and parameter read, and wraps the
    /// driver in a session on success.
    pub fn open(
        mut driver: Zfm20<TX, RX>,
        delay: D,
        config: SessionConfig,
    ) -> Result<Self, WorkflowError> {
        let status = driver.verify_password(config.password)?;
        if !status.is_ok() {
            return Err(WorkflowError::Handshake(status));
        }
        let result = driver.read_system_parameters()?;
        let params = match result.parameters {
            Some(params) => params,
            None => return Err(WorkflowError::Handshake(result.confirmation)),
        };
        info!(
            "session open: library size {}, security level {}",
            params.finger_library_size, params.security_level
        );
        Ok(Self {
            driver,
            delay,
            config,
            params,
            directory: TemplateDirectory::empty(),
        })
    }

    /// The system parameters read when the session was opened.
    pub fn parameters(&self) -> &SystemParameters {
        &self.params
    }

    /// The directory mirror as of the last refresh.
    pub fn directory(&self) -> &TemplateDirectory {
        &self.directory
    }

    /// Re-reads the occupancy bitmap from the sensor. A failed read is
    /// fatal to the caller's view of the library, so it is an error, not a
    /// silently stale mirror.
    pub fn refresh_directory(&mut self) -> Result<&TemplateDirectory, WorkflowError> {
        let result = self.driver.read_index_page(0)?;
        match result.bitmap {
            Some(bitmap) => {
                self.directory = TemplateDirectory::from_bitmap(bitmap);
                debug!("directory refreshed: {} templates", self.directory.len());
                Ok(&self.directory)
            }
            None => Err(WorkflowError::Directory(result.confirmation)),
        }
    }

    /// One capture, one conversion, one whole-library search.
    ///
    /// A clean miss is `Ok(NoMatch)`; only faults are errors. The search
    /// covers every page the module advertises.
    pub fn identify_once(
        &mut self,
        events: &mut impl EventSink,
    ) -> Result<MatchOutcome, WorkflowError> {
        acquire_image(&mut self.driver, &mut self.delay, &self.config.acquire, events)?;
        let status = self.driver.image_to_template(CharBuffer::One)?;
        if !status.is_ok() {
            return Err(WorkflowError::Template(status));
        }
        self.search_current()
    }

    /// Keeps capturing and searching until a match, up to the identify
    /// policy's attempt budget.
    ///
    /// Unusable captures (too messy, too few features) count as attempts
    /// and do not abort; a finger that matches nothing counts too. Link
    /// faults and acquisition giving up abort immediately. Running out of
    /// attempts is a plain [`MatchOutcome::NoMatch`].
    pub fn identify(
        &mut self,
        events: &mut impl EventSink,
    ) -> Result<MatchOutcome, WorkflowError> {
        for attempt in 1..=self.config.identify.attempts {
            events.emit(&WorkflowEvent::IdentifyAttempt { attempt });
            match self.identify_once(events) {
                Ok(MatchOutcome::NoMatch) => continue,
                Ok(found) => return Ok(found),
                Err(WorkflowError::Template(status)) => {
                    warn!("attempt {} unusable: {}", attempt, status);
                    events.emit(&WorkflowEvent::AttemptFailed { status });
                }
                Err(other) => return Err(other),
            }
        }
        Ok(MatchOutcome::NoMatch)
    }

    /// Enrolls a finger into `slot`: two captures of the same finger,
    /// fused and written to flash.
    ///
    /// The directory mirror is not updated; refresh it when the new
    /// occupancy matters.
    pub fn enroll(
        &mut self,
        slot: TemplateSlot,
        events: &mut impl EventSink,
    ) -> Result<(), WorkflowError> {
        self.capture_template(CharBuffer::One, 1, events)?;
        self.pause_between_passes(events)?;
        self.capture_template(CharBuffer::Two, 2, events)?;

        let status = self.driver.create_model()?;
        if status == StatusCode::EnrollMismatch {
            return Err(WorkflowError::EnrollMismatch);
        }
        if !status.is_ok() {
            return Err(WorkflowError::Template(status));
        }

        let status = self.driver.store_model(slot)?;
        if !status.is_ok() {
            return Err(WorkflowError::Store(status));
        }
        info!("template stored in slot {}", slot);
        events.emit(&WorkflowEvent::SlotEnrolled { slot });
        Ok(())
    }

    /// Deletes the template in `slot`. The directory mirror is not
    /// updated.
    pub fn delete(&mut self, slot: TemplateSlot) -> Result<(), WorkflowError> {
        let status = self.driver.delete_model(slot)?;
        if !status.is_ok() {
            return Err(WorkflowError::Delete(status));
        }
        info!("deleted slot {}", slot);
        Ok(())
    }

    /// Waits for a finger, then uploads the raw capture into `out`.
    pub fn capture_raw_image(
        &mut self,
        out: &mut RawImageBuffer,
        events: &mut impl EventSink,
    ) -> Result<(), WorkflowError> {
        acquire_image(&mut self.driver, &mut self.delay, &self.config.acquire, events)?;
        let (status, len) = self
            .driver
            .fetch_buffer(BufferKind::Image, out.storage_mut())?;
        if !status.is_ok() {
            return Err(WorkflowError::Fetch(status));
        }
        out.set_len(len);
        debug!("raw image: {} bytes", len);
        Ok(())
    }

    /// One capture, shown *and* matched: uploads the raw image into `raw`
    /// and searches the same capture against the library.
    ///
    /// An image that cannot be decoded is reported in the outcome but does
    /// not stop the match half; seeing who touched the sensor matters more
    /// than the picture.
    pub fn preview(
        &mut self,
        raw: &mut RawImageBuffer,
        events: &mut impl EventSink,
    ) -> Result<PreviewOutcome, WorkflowError> {
        self.capture_raw_image(raw, events)?;
        let image = ImageRaster::decode(raw.as_bytes());
        if let Err(err) = &image {
            warn!("preview image unusable: {}", err);
        }

        let status = self.driver.image_to_template(CharBuffer::One)?;
        if !status.is_ok() {
            return Err(WorkflowError::Template(status));
        }
        let search = self.search_current()?;
        Ok(PreviewOutcome { image, search })
    }

    /// Enrolls a run of consecutive slots in one sitting.
    ///
    /// The directory is refreshed first; the run starts one past the
    /// highest occupied slot and is `batch.slots` long. Each slot gets up
    /// to `batch.attempts_per_slot` tries; mismatches and unusable
    /// captures are retried, while link faults, store failures and
    /// acquisition giving up abort the whole run.
    pub fn enroll_batch(
        &mut self,
        events: &mut impl EventSink,
    ) -> Result<EnrolledBatch, WorkflowError> {
        self.refresh_directory()?;
        let count = self.config.batch.slots;
        let first = self
            .directory
            .next_slot()
            .ok_or(WorkflowError::DirectoryFull)?;
        if first.page_id() + u16::from(count) > u16::from(TemplateSlot::MAX) + 1 {
            return Err(WorkflowError::DirectoryFull);
        }
        info!("batch enroll: {} slots starting at {}", count, first);

        for offset in 0..count {
            let slot = TemplateSlot::new(first.page_id() + u16::from(offset))
                .map_err(|_| WorkflowError::DirectoryFull)?;
            self.enroll_slot_with_retries(slot, events)?;
        }
        Ok(EnrolledBatch { first, count })
    }

    fn enroll_slot_with_retries(
        &mut self,
        slot: TemplateSlot,
        events: &mut impl EventSink,
    ) -> Result<(), WorkflowError> {
        let attempts = self.config.batch.attempts_per_slot;
        for attempt in 1..=attempts {
            events.emit(&WorkflowEvent::EnrollAttempt { slot, attempt });
            match self.enroll(slot, events) {
                Ok(()) => return Ok(()),
                Err(WorkflowError::EnrollMismatch) => {
                    warn!("slot {} attempt {}: prints did not match", slot, attempt);
                    events.emit(&WorkflowEvent::AttemptFailed {
                        status: StatusCode::EnrollMismatch,
                    });
                }
                Err(WorkflowError::Template(status)) => {
                    warn!("slot {} attempt {}: {}", slot, attempt, status);
                    events.emit(&WorkflowEvent::AttemptFailed { status });
                }
                Err(WorkflowError::Acquire(AcquireError::Failed(status))) => {
                    warn!("slot {} attempt {}: {}", slot, attempt, status);
                    events.emit(&WorkflowEvent::AttemptFailed { status });
                }
                Err(fatal) => return Err(fatal),
            }
        }
        Err(WorkflowError::RetriesExhausted { slot, attempts })
    }

    fn capture_template(
        &mut self,
        buffer: CharBuffer,
        pass: u8,
        events: &mut impl EventSink,
    ) -> Result<(), WorkflowError> {
        events.emit(&WorkflowEvent::PlaceFinger { pass });
        acquire_image(&mut self.driver, &mut self.delay, &self.config.acquire, events)?;
        let status = self.driver.image_to_template(buffer)?;
        if !status.is_ok() {
            return Err(WorkflowError::Template(status));
        }
        Ok(())
    }

    /// The gap between the two enrollment captures: either a fixed pause,
    /// or polling until the window reads empty. The poll budget running
    /// out is not fatal, the workflow just carries on.
    fn pause_between_passes(
        &mut self,
        events: &mut impl EventSink,
    ) -> Result<(), WorkflowError> {
        events.emit(&WorkflowEvent::RemoveFinger);
        if !self.config.enroll.wait_finger_removal {
            self.delay.delay_ms(self.config.enroll.pause_ms);
            return Ok(());
        }
        for _ in 0..self.config.enroll.removal_polls {
            if self.driver.capture_image()? == StatusCode::NoFinger {
                return Ok(());
            }
            self.delay.delay_ms(self.config.enroll.removal_poll_delay_ms);
        }
        warn!("finger never lifted, continuing anyway");
        Ok(())
    }

    fn search_current(&mut self) -> Result<MatchOutcome, WorkflowError> {
        let capacity = self.params.finger_library_size;
        let result = if self.config.identify.fast {
            self.driver.fast_search(CharBuffer::One, 0, capacity)?
        } else {
            self.driver.search(CharBuffer::One, 0, capacity)?
        };
        if result.confirmation == StatusCode::NotFound {
            debug!("no match in the library");
            return Ok(MatchOutcome::NoMatch);
        }
        if !result.confirmation.is_ok() {
            return Err(WorkflowError::Search(result.confirmation));
        }
        match result.hit {
            Some(hit) => {
                let slot = TemplateSlot::new(hit.page_id)
                    .map_err(|_| WorkflowError::Link(Error::UnexpectedReply))?;
                info!("match: slot {} with confidence {}", slot, hit.score);
                Ok(MatchOutcome::Found {
                    slot,
                    confidence: hit.score,
                })
            }
            None => Err(WorkflowError::Link(Error::UnexpectedReply)),
        }
    }
}
