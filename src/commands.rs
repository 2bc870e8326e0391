use crate::utils::{CommandWriter, ToPayload};

// Naming conventions follow the ZhianTec ZFM-20 user manual; the same
// instruction set is shared by the R303/R305/R307 modules.

/// One of the two sensor-side character buffers that hold a template
/// pending comparison or fusion. The datasheet calls them CharBuffer1 and
/// CharBuffer2; there is no third.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharBuffer {
    One,
    Two,
}

impl CharBuffer {
    pub fn code(self) -> u8 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// What `fetch_buffer` should upload: the last captured image, or the
/// contents of a character buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// The image buffer (instruction UpImage).
    Image,
    /// A character buffer (instruction UpChar).
    Template(CharBuffer),
}

/// Enum for commands one can send to the module. Names match the datasheet.
#[derive(Debug)]
pub enum Command {
    /// Performs a handshake with the device to verify the password.
    /// The factory default password is 0x00000000.
    VfyPwd {
        /// The device password.
        password: u32,
    },

    /// Reads system status and basic configuration
    ReadSysPara,

    /// Captures an image of the fingerprint into the image buffer
    GenImg,

    /// Processes the image buffer into a _character buffer_
    Img2Tz { buffer: CharBuffer },

    /// Matches a character buffer against a range of stored templates.
    Search {
        /// Which buffer holds the probe template.
        buffer: CharBuffer,

        /// First library page to consider.
        start_index: u16,

        /// Number of pages to consider from `start_index` on.
        num_pages: u16,
    },

    /// Same as `Search` but uses the module's accelerated path. The manual
    /// is vague on what exactly is traded away; scores come back the same.
    HiSpeedSearch {
        buffer: CharBuffer,
        start_index: u16,
        num_pages: u16,
    },

    /// Combines character buffers 1 and 2 into a model of the finger. Both
    /// buffers must hold templates of the same finger or the module answers
    /// with an enroll mismatch.
    RegModel,

    /// Writes the model in a character buffer to a flash page.
    Store {
        /// Which buffer holds the model (after `RegModel` both do).
        buffer: CharBuffer,

        /// Destination flash page.
        page_id: u16,
    },

    /// Deletes a run of stored templates starting at `start_page`.
    DeletChar { start_page: u16, num_pages: u16 },

    /// Reads one 256-slot page of the library occupancy bitmap.
    ReadIndexTable { page: u8 },

    /// Asks the module to stream the image buffer back to the host.
    /// The acknowledge is followed by data packets; see the driver.
    UpImage,

    /// Asks the module to stream a character buffer back to the host.
    UpChar { buffer: CharBuffer },
}

impl ToPayload for Command {
    fn to_payload(&self, writer: &mut dyn CommandWriter) {
        match self {
            // Required packet:
            // headr  | 0xEF 0x01 [2]
            // addr   | device address [4]
            // ident  | 0x01 [1]
            // length | 0x00 0x07 [2]
            // instr  | 0x13 [1]
            // passwd | cmd.password [4]
            // chksum | checksum [2]
            Self::VfyPwd { password } => {
                writer.write_cmd_bytes(&[0x01]);
                writer.write_cmd_bytes(&[0x00, 0x07]);
                writer.write_cmd_bytes(&[0x13]);
                writer.write_cmd_bytes(&password.to_be_bytes()[..]);
            }

            // Required packet:
            // headr  | 0xEF 0x01 [2]
            // addr   | device address [4]
            // ident  | 0x01 [1]
            // length | 0x00 0x03 [2]
            // instr  | 0x0F [1]
            // chksum | checksum [2]
            Self::ReadSysPara => {
                writer.write_cmd_bytes(&[0x01]);
                writer.write_cmd_bytes(&[0x00, 0x03]);
                writer.write_cmd_bytes(&[0x0F]);
            }

            // Required packet:
            // headr  | 0xEF 0x01 [2]
            // addr   | device address [4]
            // ident  | 0x01 [1]
            // length | 0x00 0x03 [2]
            // instr  | 0x01 [1]
            // chksum | checksum [2]
            Self::GenImg => {
                writer.write_cmd_bytes(&[0x01]);
                writer.write_cmd_bytes(&[0x00, 0x03]);
                writer.write_cmd_bytes(&[0x01]);
            }

            Self::Img2Tz { buffer } => {
                writer.write_cmd_bytes(&[0x01]);
                writer.write_cmd_bytes(&[0x00, 0x04]);
                writer.write_cmd_bytes(&[0x02]);
                writer.write_cmd_bytes(&[buffer.code()]);
            }

            // Required packet:
            // headr  | 0xEF 0x01 [2]
            // addr   | device address [4]
            // ident  | 0x01 [1]
            // length | 0x00 0x08 [2]
            // instr  | 0x04 [1]
            // bufid  | buffer [1]
            // sstart | start_index [2]
            // snum   | num_pages [2]
            // chksum | checksum [2]
            Self::Search {
                buffer,
                start_index,
                num_pages,
            } => {
                writer.write_cmd_bytes(&[0x01]);
                writer.write_cmd_bytes(&[0x00, 0x08]);
                writer.write_cmd_bytes(&[0x04]);
                writer.write_cmd_bytes(&[buffer.code()]);
                writer.write_cmd_bytes(&start_index.to_be_bytes()[..]);
                writer.write_cmd_bytes(&num_pages.to_be_bytes()[..]);
            }

            // Same layout as Search, instruction 0x1B.
            Self::HiSpeedSearch {
                buffer,
                start_index,
                num_pages,
            } => {
                writer.write_cmd_bytes(&[0x01]);
                writer.write_cmd_bytes(&[0x00, 0x08]);
                writer.write_cmd_bytes(&[0x1B]);
                writer.write_cmd_bytes(&[buffer.code()]);
                writer.write_cmd_bytes(&start_index.to_be_bytes()[..]);
                writer.write_cmd_bytes(&num_pages.to_be_bytes()[..]);
            }

            Self::RegModel => {
                writer.write_cmd_bytes(&[0x01]);
                writer.write_cmd_bytes(&[0x00, 0x03]);
                writer.write_cmd_bytes(&[0x05]);
            }

            // Required packet:
            // headr  | 0xEF 0x01 [2]
            // addr   | device address [4]
            // ident  | 0x01 [1]
            // length | 0x00 0x06 [2]
            // instr  | 0x06 [1]
            // bufid  | buffer [1]
            // pageid | page_id [2]
            // chksum | checksum [2]
            Self::Store { buffer, page_id } => {
                writer.write_cmd_bytes(&[0x01]);
                writer.write_cmd_bytes(&[0x00, 0x06]);
                writer.write_cmd_bytes(&[0x06]);
                writer.write_cmd_bytes(&[buffer.code()]);
                writer.write_cmd_bytes(&page_id.to_be_bytes()[..]);
            }

            // Required packet:
            // headr  | 0xEF 0x01 [2]
            // addr   | device address [4]
            // ident  | 0x01 [1]
            // length | 0x00 0x07 [2]
            // instr  | 0x0C [1]
            // pageid | start_page [2]
            // npages | num_pages [2]
            // chksum | checksum [2]
            Self::DeletChar {
                start_page,
                num_pages,
            } => {
                writer.write_cmd_bytes(&[0x01]);
                writer.write_cmd_bytes(&[0x00, 0x07]);
                writer.write_cmd_bytes(&[0x0C]);
                writer.write_cmd_bytes(&start_page.to_be_bytes()[..]);
                writer.write_cmd_bytes(&num_pages.to_be_bytes()[..]);
            }

            Self::ReadIndexTable { page } => {
                writer.write_cmd_bytes(&[0x01]);
                writer.write_cmd_bytes(&[0x00, 0x04]);
                writer.write_cmd_bytes(&[0x1F]);
                writer.write_cmd_bytes(&[*page]);
            }

            Self::UpImage => {
                writer.write_cmd_bytes(&[0x01]);
                writer.write_cmd_bytes(&[0x00, 0x03]);
                writer.write_cmd_bytes(&[0x0A]);
            }

            Self::UpChar { buffer } => {
                writer.write_cmd_bytes(&[0x01]);
                writer.write_cmd_bytes(&[0x00, 0x04]);
                writer.write_cmd_bytes(&[0x08]);
                writer.write_cmd_bytes(&[buffer.code()]);
            }
        }
    }
}

impl Command {
    /// Instruction code of this command, as it appears on the wire.
    pub(crate) fn instruction(&self) -> u8 {
        match self {
            Self::VfyPwd { .. } => 0x13,
            Self::ReadSysPara => 0x0F,
            Self::GenImg => 0x01,
            Self::Img2Tz { .. } => 0x02,
            Self::Search { .. } => 0x04,
            Self::HiSpeedSearch { .. } => 0x1B,
            Self::RegModel => 0x05,
            Self::Store { .. } => 0x06,
            Self::DeletChar { .. } => 0x0C,
            Self::ReadIndexTable { .. } => 0x1F,
            Self::UpImage => 0x0A,
            Self::UpChar { .. } => 0x08,
        }
    }
}
