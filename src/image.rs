use core::fmt;

/// Size in bytes of a full raw image transfer from the sensor.
///
/// The module packs two 4-bit pixels per byte, so a 256x288 capture comes
/// over the wire as 36864 bytes.
pub const RAW_IMAGE_LEN: usize = 36864;

/// Decoded image width in pixels.
pub const IMAGE_WIDTH: usize = 256;

/// Decoded image height in pixels.
pub const IMAGE_HEIGHT: usize = 288;

/// Number of pixels in a decoded raster.
pub const PIXEL_COUNT: usize = IMAGE_WIDTH * IMAGE_HEIGHT;

/// Owned storage for one raw image transfer.
///
/// The buffer is sized for a full frame up front; after a transfer,
/// [`RawImageBuffer::as_bytes`] covers only the bytes the sensor actually
/// sent. A transfer cut short by the link leaves a short buffer, which the
/// decoder then rejects rather than producing a partial raster.
pub struct RawImageBuffer {
    data: [u8; RAW_IMAGE_LEN],
    len: usize,
}

impl RawImageBuffer {
    pub fn new() -> Self {
        Self {
            data: [0; RAW_IMAGE_LEN],
            len: 0,
        }
    }

    /// The bytes received during the last transfer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn set_len(&mut self, len: usize) {
        debug_assert!(len <= RAW_IMAGE_LEN);
        self.len = len;
    }
}

impl Default for RawImageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RawImageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawImageBuffer")
            .field("len", &self.len)
            .finish()
    }
}

/// Raw image bytes that cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer is not exactly [`RAW_IMAGE_LEN`] bytes long.
    MalformedBuffer { len: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MalformedBuffer { len } => write!(
                f,
                "raw image is {} bytes, a full frame is exactly {} bytes",
                len, RAW_IMAGE_LEN
            ),
        }
    }
}

/// A decoded 8-bit grayscale fingerprint image, 256x288, row-major.
///
/// Every sample is one of the 16 gray levels the sensor can produce,
/// widened to the 0..=240 range in steps of 16.
pub struct ImageRaster {
    pixels: [u8; PIXEL_COUNT],
}

impl ImageRaster {
    /// Unpacks a raw transfer into an 8-bit raster.
    ///
    /// Each input byte carries two pixels, leftmost in the high nibble. The
    /// high nibble is kept in place (`b & 0xF0`); the low nibble is shifted
    /// up (`(b & 0x0F) * 16`). Anything other than a complete frame is
    /// rejected whole.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        if raw.len() != RAW_IMAGE_LEN {
            return Err(DecodeError::MalformedBuffer { len: raw.len() });
        }
        let mut pixels = [0u8; PIXEL_COUNT];
        for (i, &byte) in raw.iter().enumerate() {
            pixels[i * 2] = byte & 0xF0;
            pixels[i * 2 + 1] = (byte & 0x0F) * 16;
        }
        Ok(Self { pixels })
    }

    /// Sample at `(x, y)`. Panics if either coordinate is out of bounds.
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        assert!(x < IMAGE_WIDTH && y < IMAGE_HEIGHT);
        self.pixels[y * IMAGE_WIDTH + x]
    }

    /// One row of samples, top row first.
    pub fn row(&self, y: usize) -> &[u8] {
        assert!(y < IMAGE_HEIGHT);
        &self.pixels[y * IMAGE_WIDTH..(y + 1) * IMAGE_WIDTH]
    }

    /// The whole raster, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }
}

impl fmt::Debug for ImageRaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageRaster")
            .field("width", &IMAGE_WIDTH)
            .field("height", &IMAGE_HEIGHT)
            .finish()
    }
}
