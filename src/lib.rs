//! **zfm20** is an embedded-hal driver for the ZhianTec ZFM-20 family of
//! optical fingerprint modules, sold under names like R303, R305 and R307.
//!
//! The crate has two layers. [`Zfm20`] speaks the module's framed serial
//! protocol one command at a time and hands back typed replies; on top of
//! it, [`Session`] runs the multi-step workflows a fingerprint reader
//! actually needs: enrolling a finger, identifying one against the stored
//! library, deleting templates and pulling raw images off the sensor.
//!
//! ## Example
//!
//! To authenticate with the module:
//! ```
//! # use embedded_hal::serial::{Read, Write};
//! use zfm20::{Zfm20, DEFAULT_ADDRESS, DEFAULT_PASSWORD};
//! # struct TestTx;
//! # struct TestRx(usize);
//! #
//! # impl Write<u8> for TestTx {
//! #     type Error = ();
//! #     fn write(&mut self, _word: u8) -> nb::Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! #     fn flush(&mut self) -> nb::Result<(), Self::Error> {
//! #         Ok(())
//! #     }
//! # }
//! #
//! # const REPLY: &[u8] = &[0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x00, 0x03, 0x00, 0x00, 0x0A];
//! #
//! # impl Read<u8> for TestRx {
//! #     type Error = ();
//! #     fn read(&mut self) -> nb::Result<u8, Self::Error> {
//! #         let word = REPLY[self.0];
//! #         self.0 += 1;
//! #         Ok(word)
//! #     }
//! # }
//! # let tx = TestTx;
//! # let rx = TestRx(0);
//!
//! // Obtain tx, rx from some serial port implementation
//! let mut sensor = Zfm20::new(tx, rx, DEFAULT_ADDRESS);
//! match sensor.verify_password(DEFAULT_PASSWORD) {
//!     Ok(status) => println!("Handshake: {}", status),
//!     Err(error) => panic!("Error: {:#?}", error),
//! }
//! ```
//!
//! For complete host-side programs, see the `demos` directory.
#![warn(missing_debug_implementations, rust_2018_idioms)]
#![no_std]

#[cfg(test)]
extern crate std;

mod acquire;
mod commands;
mod config;
mod driver;
mod events;
mod image;
#[cfg(test)]
mod mock_link;
mod responses;
mod session;
mod template;
mod utils;

pub use crate::acquire::{acquire_image, AcquireError};
pub use crate::commands::{BufferKind, CharBuffer, Command};
pub use crate::config::{AcquirePolicy, BatchPolicy, EnrollPolicy, IdentifyPolicy, SessionConfig};
pub use crate::driver::{Zfm20, DEFAULT_ADDRESS, DEFAULT_PASSWORD};
pub use crate::events::{EventSink, WorkflowEvent};
pub use crate::image::{
    DecodeError, ImageRaster, RawImageBuffer, IMAGE_HEIGHT, IMAGE_WIDTH, PIXEL_COUNT,
    RAW_IMAGE_LEN,
};
pub use crate::responses::{
    IndexTableResult, ReadSysParaResult, Reply, SearchHit, SearchResult, StatusCode,
    SystemParameters,
};
pub use crate::session::{EnrolledBatch, MatchOutcome, PreviewOutcome, Session, WorkflowError};
pub use crate::template::{InvalidSlot, SlotIter, TemplateDirectory, TemplateSlot};
pub use crate::utils::Error;
