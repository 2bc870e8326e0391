//! In-memory serial endpoints and canned reply frames for tests.

use std::collections::VecDeque;
use std::vec;
use std::vec::Vec;

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::serial::{Read, Write};

use crate::driver::{Zfm20, DEFAULT_ADDRESS};
use crate::events::{EventSink, WorkflowEvent};

/// Records everything the driver writes.
pub struct MockTx {
    pub written: Vec<u8>,
}

impl MockTx {
    pub fn new() -> Self {
        Self {
            written: Vec::new(),
        }
    }
}

impl Write<u8> for MockTx {
    type Error = ();

    fn write(&mut self, word: u8) -> nb::Result<(), ()> {
        self.written.push(word);
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), ()> {
        Ok(())
    }
}

/// Plays back a scripted byte stream; reading past the end fails like a
/// dead link.
pub struct MockRx {
    bytes: VecDeque<u8>,
}

impl Read<u8> for MockRx {
    type Error = ();

    fn read(&mut self) -> nb::Result<u8, ()> {
        self.bytes.pop_front().ok_or(nb::Error::Other(()))
    }
}

/// Counts sleeps instead of sleeping.
pub struct MockDelay {
    pub sleeps: u32,
}

impl MockDelay {
    pub fn new() -> Self {
        Self { sleeps: 0 }
    }
}

impl DelayMs<u16> for MockDelay {
    fn delay_ms(&mut self, _ms: u16) {
        self.sleeps += 1;
    }
}

/// Keeps every emitted event for later assertions.
pub struct RecordingSink {
    pub events: Vec<WorkflowEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &WorkflowEvent) {
        self.events.push(*event);
    }
}

/// A driver wired to a recording writer and the given scripted replies.
pub fn driver(replies: &[Vec<u8>]) -> Zfm20<MockTx, MockRx> {
    let mut bytes = VecDeque::new();
    for reply in replies {
        bytes.extend(reply.iter().copied());
    }
    Zfm20::new(MockTx::new(), MockRx { bytes }, DEFAULT_ADDRESS)
}

/// Builds a well-formed frame with the default address.
pub fn frame(pid: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, pid];
    let length = (content.len() + 2) as u16;
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(content);
    let mut sum = u16::from(pid);
    sum = sum.wrapping_add(length >> 8).wrapping_add(length & 0xFF);
    for byte in content {
        sum = sum.wrapping_add(u16::from(*byte));
    }
    out.extend_from_slice(&sum.to_be_bytes());
    out
}

/// An acknowledge frame with the given content (confirmation + payload).
pub fn ack(content: &[u8]) -> Vec<u8> {
    frame(0x07, content)
}

/// A data packet; `end` marks the final packet of a stream.
pub fn data(end: bool, content: &[u8]) -> Vec<u8> {
    frame(if end { 0x08 } else { 0x02 }, content)
}

/// Acknowledge content of a successful `ReadSysPara` advertising the given
/// library capacity.
pub fn sys_para_content(capacity: u16) -> Vec<u8> {
    let mut content = vec![0x00];
    content.extend_from_slice(&[0x00, 0x00]); // status register
    content.extend_from_slice(&[0x00, 0x09]); // system identifier
    content.extend_from_slice(&capacity.to_be_bytes());
    content.extend_from_slice(&[0x00, 0x03]); // security level
    content.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]); // address
    content.extend_from_slice(&[0x00, 0x02]); // packet size code
    content.extend_from_slice(&[0x00, 0x06]); // baud setting
    content
}

/// Acknowledge content of a successful `ReadIndexTable` with the given
/// slots occupied.
pub fn index_content(slots: &[u16]) -> Vec<u8> {
    let mut bitmap = [0u8; 32];
    for &slot in slots {
        bitmap[(slot / 8) as usize] |= 1 << (slot % 8);
    }
    let mut content = vec![0x00];
    content.extend_from_slice(&bitmap);
    content
}

/// Acknowledge content of a search hit.
pub fn search_hit_content(page_id: u16, score: u16) -> Vec<u8> {
    let mut content = vec![0x00];
    content.extend_from_slice(&page_id.to_be_bytes());
    content.extend_from_slice(&score.to_be_bytes());
    content
}

/// Instruction codes of the command frames in a recorded write stream,
/// in the order they were sent.
pub fn sent_instructions(written: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut i = 0;
    while i + 9 < written.len() {
        let length = u16::from_be_bytes([written[i + 7], written[i + 8]]) as usize;
        out.push(written[i + 9]);
        i += 9 + length;
    }
    out
}
