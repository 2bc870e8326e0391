use arrayvec::ArrayVec;
use byteorder::{BigEndian, ByteOrder};
use embedded_hal::serial::{Read, Write};
use log::{debug, trace};
use nb::block;

use crate::commands::{BufferKind, CharBuffer, Command};
use crate::responses::{
    IndexTableResult, ReadSysParaResult, Reply, SearchHit, SearchResult, StatusCode,
    SystemParameters,
};
use crate::template::TemplateSlot;
use crate::utils::{CommandWriter, Error, FromPayload, ToPayload};

/// Address every module answers to as shipped from the factory.
pub const DEFAULT_ADDRESS: u32 = 0xFFFF_FFFF;

/// Password every module accepts as shipped from the factory.
pub const DEFAULT_PASSWORD: u32 = 0x0000_0000;

const PID_DATA: u8 = 0x02;
const PID_ACK: u8 = 0x07;
const PID_DATA_END: u8 = 0x08;

// The checksum covers everything after the 2-byte header and the 4-byte
// address, on both sides of the link.
const CHECKSUM_START: usize = 6;

/// Represents a ZFM-20 class device connected to a U(S)ART.
///
/// The driver owns the two halves of the serial port and the device
/// address, and speaks the module's framed protocol: every call sends one
/// command frame and blocks until the acknowledge frame (and, for the
/// upload commands, the data stream behind it) has been read and verified.
///
/// Calls only fail with [`Error`] when the link or the framing is broken.
/// Conditions the sensor itself reports, like no finger on the window, come
/// back as [`StatusCode`] values inside an `Ok`.
#[derive(Debug)]
pub struct Zfm20<TX, RX> {
    tx: TX,
    rx: RX,
    address: u32,
    cmd_buffer: ArrayVec<[u8; 128]>,
    received: ArrayVec<[u8; 256]>,
}

impl<TX, RX> Zfm20<TX, RX>
where
    TX: Write<u8>,
    RX: Read<u8>,
{
    /// Creates a driver for the module at `address`. Factory-fresh modules
    /// answer on [`DEFAULT_ADDRESS`].
    pub fn new(tx: TX, rx: RX, address: u32) -> Self {
        Self {
            tx,
            rx,
            address,
            cmd_buffer: ArrayVec::new(),
            received: ArrayVec::new(),
        }
    }

    /// The device address this driver sends to and expects replies from.
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Sends a command to the module and blocks waiting for the acknowledge.
    pub fn send_command(&mut self, cmd: Command) -> Result<Reply, Error> {
        self.cmd_buffer.clear();
        self.prepare_cmd(&cmd);
        trace!("sending {:02x?}", &self.cmd_buffer[..]);

        let frame = &self.cmd_buffer[..];
        for byte in frame {
            block!(self.tx.write(*byte)).map_err(|_| Error::Link)?;
        }
        block!(self.tx.flush()).map_err(|_| Error::Link)?;

        let pid = self.read_frame()?;
        if pid != PID_ACK {
            return Err(Error::UnexpectedReply);
        }
        self.parse_reply(cmd.instruction())
    }

    /// Checks the password with the module. Must succeed before a
    /// factory-configured module accepts any other command.
    pub fn verify_password(&mut self, password: u32) -> Result<StatusCode, Error> {
        match self.send_command(Command::VfyPwd { password })? {
            Reply::VfyPwd(status) => Ok(status),
            _ => Err(Error::UnexpectedReply),
        }
    }

    /// Reads the status register and basic configuration, including the
    /// template library capacity used to bound searches.
    pub fn read_system_parameters(&mut self) -> Result<ReadSysParaResult, Error> {
        match self.send_command(Command::ReadSysPara)? {
            Reply::ReadSysPara(result) => Ok(result),
            _ => Err(Error::UnexpectedReply),
        }
    }

    /// Takes one snapshot of the sensor window into the image buffer.
    /// `NoFinger` here just means nothing was on the window.
    pub fn capture_image(&mut self) -> Result<StatusCode, Error> {
        match self.send_command(Command::GenImg)? {
            Reply::GenImg(status) => Ok(status),
            _ => Err(Error::UnexpectedReply),
        }
    }

    /// Converts the image buffer into a template in `buffer`.
    pub fn image_to_template(&mut self, buffer: CharBuffer) -> Result<StatusCode, Error> {
        match self.send_command(Command::Img2Tz { buffer })? {
            Reply::Img2Tz(status) => Ok(status),
            _ => Err(Error::UnexpectedReply),
        }
    }

    /// Searches `num_pages` library pages from `start_index` for the
    /// template in `buffer`.
    pub fn search(
        &mut self,
        buffer: CharBuffer,
        start_index: u16,
        num_pages: u16,
    ) -> Result<SearchResult, Error> {
        match self.send_command(Command::Search {
            buffer,
            start_index,
            num_pages,
        })? {
            Reply::Search(result) => Ok(result),
            _ => Err(Error::UnexpectedReply),
        }
    }

    /// Same as [`Zfm20::search`] on the module's accelerated path.
    pub fn fast_search(
        &mut self,
        buffer: CharBuffer,
        start_index: u16,
        num_pages: u16,
    ) -> Result<SearchResult, Error> {
        match self.send_command(Command::HiSpeedSearch {
            buffer,
            start_index,
            num_pages,
        })? {
            Reply::HiSpeedSearch(result) => Ok(result),
            _ => Err(Error::UnexpectedReply),
        }
    }

    /// Fuses character buffers 1 and 2 into a model of the finger. The
    /// module answers `EnrollMismatch` when the two captures disagree.
    pub fn create_model(&mut self) -> Result<StatusCode, Error> {
        match self.send_command(Command::RegModel)? {
            Reply::RegModel(status) => Ok(status),
            _ => Err(Error::UnexpectedReply),
        }
    }

    /// Writes the model produced by [`Zfm20::create_model`] to `slot`.
    /// After fusion both character buffers hold the model; buffer 1 is used.
    pub fn store_model(&mut self, slot: TemplateSlot) -> Result<StatusCode, Error> {
        match self.send_command(Command::Store {
            buffer: CharBuffer::One,
            page_id: slot.page_id(),
        })? {
            Reply::Store(status) => Ok(status),
            _ => Err(Error::UnexpectedReply),
        }
    }

    /// Deletes the template stored in `slot`.
    pub fn delete_model(&mut self, slot: TemplateSlot) -> Result<StatusCode, Error> {
        match self.send_command(Command::DeletChar {
            start_page: slot.page_id(),
            num_pages: 1,
        })? {
            Reply::DeletChar(status) => Ok(status),
            _ => Err(Error::UnexpectedReply),
        }
    }

    /// Reads one 256-slot page of the library occupancy bitmap. Page 0
    /// covers the whole valid slot range.
    pub fn read_index_page(&mut self, page: u8) -> Result<IndexTableResult, Error> {
        match self.send_command(Command::ReadIndexTable { page })? {
            Reply::ReadIndexTable(result) => Ok(result),
            _ => Err(Error::UnexpectedReply),
        }
    }

    /// Uploads the image buffer or a character buffer into `out`.
    ///
    /// On a non-`Ok` status the module sends no data and this returns the
    /// status with a length of 0. On `Ok` the data packets that follow the
    /// acknowledge are reassembled into `out` and the filled length is
    /// returned; a stream larger than `out` fails with `BufferOverflow`.
    pub fn fetch_buffer(
        &mut self,
        kind: BufferKind,
        out: &mut [u8],
    ) -> Result<(StatusCode, usize), Error> {
        let reply = match kind {
            BufferKind::Image => self.send_command(Command::UpImage)?,
            BufferKind::Template(buffer) => self.send_command(Command::UpChar { buffer })?,
        };
        let status = match reply {
            Reply::UpImage(status) | Reply::UpChar(status) => status,
            _ => return Err(Error::UnexpectedReply),
        };
        if !status.is_ok() {
            debug!("module refused buffer upload: {:?}", status);
            return Ok((status, 0));
        }
        let len = self.read_data_stream(out)?;
        debug!("buffer upload complete, {} bytes", len);
        Ok((status, len))
    }

    fn prepare_cmd(&mut self, cmd: &Command) {
        let address = self.address;
        self.write_cmd_bytes(&[0xEF, 0x01]);
        self.write_cmd_bytes(&address.to_be_bytes()[..]);
        cmd.to_payload(self);
        let chk = self.compute_checksum();
        self.write_cmd_bytes(&chk.to_be_bytes()[..]);
    }

    fn compute_checksum(&self) -> u16 {
        let mut checksum = 0u16;
        for byte in &self.cmd_buffer[CHECKSUM_START..] {
            checksum = checksum.wrapping_add(u16::from(*byte));
        }
        checksum
    }

    /// Reads and verifies one frame, leaving its content (everything
    /// between the length field and the checksum) in `self.received`.
    /// Returns the packet id.
    fn read_frame(&mut self) -> Result<u8, Error> {
        let mut header = [0u8; 9];
        for slot in header.iter_mut() {
            *slot = block!(self.rx.read()).map_err(|_| Error::Link)?;
        }

        if header[0] != 0xEF || header[1] != 0x01 {
            return Err(Error::BadHeader);
        }
        if BigEndian::read_u32(&header[2..6]) != self.address {
            return Err(Error::AddressMismatch);
        }
        let pid = header[6];
        let length = BigEndian::read_u16(&header[7..9]) as usize;
        // length counts the content plus the 2-byte checksum
        if length < 2 || length - 2 > self.received.capacity() {
            return Err(Error::BadLength);
        }

        let mut checksum = u16::from(pid);
        checksum = checksum.wrapping_add(u16::from(header[7]));
        checksum = checksum.wrapping_add(u16::from(header[8]));

        self.received.clear();
        for _ in 0..length - 2 {
            let byte = block!(self.rx.read()).map_err(|_| Error::TruncatedReply)?;
            checksum = checksum.wrapping_add(u16::from(byte));
            self.received.push(byte);
        }

        let hi = block!(self.rx.read()).map_err(|_| Error::TruncatedReply)?;
        let lo = block!(self.rx.read()).map_err(|_| Error::TruncatedReply)?;
        if checksum != u16::from_be_bytes([hi, lo]) {
            return Err(Error::BadChecksum);
        }

        trace!("frame in: pid {:#04x}, {} content bytes", pid, self.received.len());
        Ok(pid)
    }

    /// Reassembles the data packets following an upload acknowledge.
    fn read_data_stream(&mut self, out: &mut [u8]) -> Result<usize, Error> {
        let mut total = 0usize;
        loop {
            let pid = self.read_frame()?;
            if pid != PID_DATA && pid != PID_DATA_END {
                return Err(Error::UnexpectedReply);
            }
            let chunk = &self.received[..];
            if total + chunk.len() > out.len() {
                return Err(Error::BufferOverflow);
            }
            out[total..total + chunk.len()].copy_from_slice(chunk);
            total += chunk.len();
            if pid == PID_DATA_END {
                return Ok(total);
            }
        }
    }

    /// Interprets the acknowledge content in `self.received` against the
    /// instruction that was just sent.
    fn parse_reply(&self, instr: u8) -> Result<Reply, Error> {
        if self.received.is_empty() {
            return Err(Error::UnexpectedReply);
        }
        let confirmation = StatusCode::from_raw(self.received[0]);
        let payload = &self.received[1..];

        let reply = match instr {
            0x13 => Reply::VfyPwd(confirmation),

            // Expected packet:
            // headr  | 0xEF 0x01 [2]
            // addr   | device address [4]
            // ident  | 0x07 [1]
            // length | 0x00 0x13 [2] == 19 (1 + 16 + 2)
            // confrm | confirmation [1]
            // params | (params) [16]
            // chksum | checksum [2]
            0x0F => Reply::ReadSysPara(ReadSysParaResult {
                confirmation,
                parameters: if confirmation.is_ok() {
                    if payload.len() < 16 {
                        return Err(Error::UnexpectedReply);
                    }
                    Some(SystemParameters::from_payload(&payload[..16]))
                } else {
                    None
                },
            }),

            0x01 => Reply::GenImg(confirmation),
            0x02 => Reply::Img2Tz(confirmation),

            // Expected packet on a hit:
            // confrm | 0x00 [1]
            // pageid | matched page [2]
            // score  | match score [2]
            0x04 | 0x1B => {
                let hit = if confirmation.is_ok() {
                    if payload.len() < 4 {
                        return Err(Error::UnexpectedReply);
                    }
                    Some(SearchHit {
                        page_id: BigEndian::read_u16(&payload[0..2]),
                        score: BigEndian::read_u16(&payload[2..4]),
                    })
                } else {
                    None
                };
                let result = SearchResult { confirmation, hit };
                if instr == 0x04 {
                    Reply::Search(result)
                } else {
                    Reply::HiSpeedSearch(result)
                }
            }

            0x05 => Reply::RegModel(confirmation),
            0x06 => Reply::Store(confirmation),
            0x0C => Reply::DeletChar(confirmation),

            0x1F => Reply::ReadIndexTable(IndexTableResult {
                confirmation,
                bitmap: if confirmation.is_ok() {
                    if payload.len() < 32 {
                        return Err(Error::UnexpectedReply);
                    }
                    let mut bitmap = [0u8; 32];
                    bitmap.copy_from_slice(&payload[..32]);
                    Some(bitmap)
                } else {
                    None
                },
            }),

            0x0A => Reply::UpImage(confirmation),
            0x08 => Reply::UpChar(confirmation),

            _ => return Err(Error::UnexpectedReply),
        };
        Ok(reply)
    }
}

impl<TX, RX> CommandWriter for Zfm20<TX, RX> {
    fn write_cmd_bytes(&mut self, bytes: &[u8]) {
        // command frames are at most 18 bytes, the buffer cannot overflow
        self.cmd_buffer.try_extend_from_slice(bytes).unwrap();
    }
}

#[cfg(test)]
impl<TX, RX> Zfm20<TX, RX> {
    pub(crate) fn tx_ref(&self) -> &TX {
        &self.tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_link::{ack, driver, frame};
    use std::vec;

    #[test]
    fn command_frame_layout_on_the_wire() {
        let mut dev = driver(&[ack(&[0x00])]);
        dev.capture_image().unwrap();
        assert_eq!(
            dev.tx.written,
            vec![0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x03, 0x01, 0x00, 0x05]
        );
    }

    #[test]
    fn status_codes_come_back_typed() {
        let mut dev = driver(&[ack(&[0x02])]);
        assert_eq!(dev.capture_image().unwrap(), StatusCode::NoFinger);
    }

    #[test]
    fn empty_link_is_a_link_error() {
        let mut dev = driver(&[]);
        assert_eq!(dev.capture_image(), Err(Error::Link));
    }

    #[test]
    fn bad_header_is_rejected() {
        let mut reply = ack(&[0x00]);
        reply[0] = 0xAA;
        let mut dev = driver(&[reply]);
        assert_eq!(dev.capture_image(), Err(Error::BadHeader));
    }

    #[test]
    fn foreign_address_is_rejected() {
        let mut reply = ack(&[0x00]);
        reply[5] = 0xFE;
        let mut dev = driver(&[reply]);
        assert_eq!(dev.capture_image(), Err(Error::AddressMismatch));
    }

    #[test]
    fn corrupt_checksum_is_rejected() {
        let mut reply = ack(&[0x00]);
        let last = reply.len() - 1;
        reply[last] ^= 0xFF;
        let mut dev = driver(&[reply]);
        assert_eq!(dev.capture_image(), Err(Error::BadChecksum));
    }

    #[test]
    fn short_frame_is_truncated() {
        let mut reply = ack(&[0x00, 0x11, 0x22]);
        reply.truncate(reply.len() - 3);
        let mut dev = driver(&[reply]);
        assert_eq!(dev.capture_image(), Err(Error::TruncatedReply));
    }

    #[test]
    fn oversized_length_field_is_rejected() {
        let mut reply = ack(&[0x00]);
        reply[7] = 0xFF;
        reply[8] = 0xFF;
        let mut dev = driver(&[reply]);
        assert_eq!(dev.capture_image(), Err(Error::BadLength));
    }

    #[test]
    fn search_hit_is_parsed() {
        let mut dev = driver(&[ack(&[0x00, 0x00, 0x05, 0x00, 0x64])]);
        let result = dev.search(CharBuffer::One, 0, 200).unwrap();
        assert!(result.confirmation.is_ok());
        let hit = result.hit.unwrap();
        assert_eq!(hit.page_id, 5);
        assert_eq!(hit.score, 100);
    }

    #[test]
    fn search_miss_has_no_hit() {
        let mut dev = driver(&[ack(&[0x09])]);
        let result = dev.search(CharBuffer::One, 0, 200).unwrap();
        assert_eq!(result.confirmation, StatusCode::NotFound);
        assert!(result.hit.is_none());
    }

    #[test]
    fn fast_search_uses_the_accelerated_instruction() {
        let mut dev = driver(&[ack(&[0x09])]);
        dev.fast_search(CharBuffer::One, 0, 200).unwrap();
        assert_eq!(dev.tx.written[9], 0x1B);
    }

    #[test]
    fn system_parameters_are_parsed_on_success() {
        let mut content = vec![0x00];
        content.extend_from_slice(&[
            0x00, 0x00, // status register
            0x00, 0x09, // system identifier
            0x00, 0xC8, // library size
            0x00, 0x03, // security level
            0xFF, 0xFF, 0xFF, 0xFF, // address
            0x00, 0x02, // packet size code
            0x00, 0x06, // baud setting
        ]);
        let mut dev = driver(&[ack(&content)]);
        let result = dev.read_system_parameters().unwrap();
        let params = result.parameters.unwrap();
        assert_eq!(params.finger_library_size, 200);
        assert_eq!(params.baud_setting, 6);
    }

    #[test]
    fn refused_handshake_has_no_parameters() {
        let mut dev = driver(&[ack(&[0x01])]);
        let result = dev.read_system_parameters().unwrap();
        assert_eq!(result.confirmation, StatusCode::PacketError);
        assert!(result.parameters.is_none());
    }

    #[test]
    fn index_page_bitmap_is_parsed() {
        let mut content = vec![0x00];
        let mut bitmap = [0u8; 32];
        bitmap[0] = 0b0000_0110; // slots 1 and 2
        content.extend_from_slice(&bitmap);
        let mut dev = driver(&[ack(&content)]);
        let result = dev.read_index_page(0).unwrap();
        assert_eq!(result.bitmap.unwrap()[0], 0b0000_0110);
    }

    #[test]
    fn store_addresses_the_requested_page() {
        let mut dev = driver(&[ack(&[0x00])]);
        let slot = TemplateSlot::new(6).unwrap();
        assert_eq!(dev.store_model(slot).unwrap(), StatusCode::Ok);
        // instr, buffer id, page id
        assert_eq!(&dev.tx.written[9..13], &[0x06, 0x01, 0x00, 0x06]);
    }

    #[test]
    fn upload_stream_is_reassembled() {
        let replies = [
            ack(&[0x00]),
            frame(PID_DATA, &[0x11; 64]),
            frame(PID_DATA, &[0x22; 64]),
            frame(PID_DATA_END, &[0x33; 32]),
        ];
        let mut dev = driver(&replies);
        let mut out = [0u8; 256];
        let (status, len) = dev.fetch_buffer(BufferKind::Image, &mut out).unwrap();
        assert_eq!(status, StatusCode::Ok);
        assert_eq!(len, 160);
        assert_eq!(out[0], 0x11);
        assert_eq!(out[64], 0x22);
        assert_eq!(out[159], 0x33);
    }

    #[test]
    fn refused_upload_reads_no_stream() {
        let mut dev = driver(&[ack(&[0x01])]);
        let mut out = [0u8; 16];
        let (status, len) = dev.fetch_buffer(BufferKind::Image, &mut out).unwrap();
        assert_eq!(status, StatusCode::PacketError);
        assert_eq!(len, 0);
    }

    #[test]
    fn upload_overflowing_the_buffer_fails() {
        let replies = [ack(&[0x00]), frame(PID_DATA, &[0x11; 64])];
        let mut dev = driver(&replies);
        let mut out = [0u8; 32];
        assert_eq!(
            dev.fetch_buffer(BufferKind::Image, &mut out),
            Err(Error::BufferOverflow)
        );
    }

    #[test]
    fn template_upload_uses_up_char() {
        let replies = [ack(&[0x00]), frame(PID_DATA_END, &[0x44; 16])];
        let mut dev = driver(&replies);
        let mut out = [0u8; 768];
        let (_, len) = dev
            .fetch_buffer(BufferKind::Template(CharBuffer::Two), &mut out)
            .unwrap();
        assert_eq!(len, 16);
        // instr, buffer id
        assert_eq!(&dev.tx.written[9..11], &[0x08, 0x02]);
    }
}
