use crate::{PixelBuffer, RawFramebufferReply};

const OPAQUE_BLACK: [u8; 4] = [0x00, 0x00, 0x00, 0xff];
const TRANSPARENT_WHITE: [u8; 4] = [0xff, 0xff, 0xff, 0x00];

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported framebuffer format: depth {depth}, {bits_per_pixel} bits per pixel")]
    UnsupportedFormat { depth: u8, bits_per_pixel: u8 },

    #[error("invalid bitmap scanline pad: {0} bits")]
    InvalidScanlinePad(u8),

    #[error("framebuffer reply is too short: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// The closed set of framebuffer layouts the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Depth 1, one bit per pixel, read as an alpha mask. Rows are padded to `scanline_pad` bits.
    AlphaMask { scanline_pad: u8 },
    /// Depth 24/32, three bytes per pixel in B,G,R order.
    Bgr24,
    /// Depth 24/32, four bytes per pixel in B,G,R,A order.
    Bgra32,
}

impl PixelFormat {
    pub fn detect(depth: u8, bits_per_pixel: u8, scanline_pad: u8) -> Result<Self, DecodeError> {
        match (depth, bits_per_pixel) {
            (1, 1) => {
                if scanline_pad < 8 || !scanline_pad.is_power_of_two() {
                    return Err(DecodeError::InvalidScanlinePad(scanline_pad));
                }
                Ok(Self::AlphaMask { scanline_pad })
            }
            (24 | 32, 24) => Ok(Self::Bgr24),
            (24 | 32, 32) => Ok(Self::Bgra32),
            _ => Err(DecodeError::UnsupportedFormat {
                depth,
                bits_per_pixel,
            }),
        }
    }

    /// Bytes between the starts of two consecutive rows.
    pub fn row_stride(&self, width: u32) -> usize {
        let width = width as usize;
        match self {
            Self::AlphaMask { scanline_pad } => {
                let pad = *scanline_pad as usize;
                width.div_ceil(pad) * pad / 8
            }
            Self::Bgr24 => width * 3,
            Self::Bgra32 => width * 4,
        }
    }

    pub fn bytes_required(&self, width: u32, height: u32) -> usize {
        self.row_stride(width) * height as usize
    }
}

/// Decode a raw framebuffer reply into a `width`x`height` BGRA buffer.
///
/// The format and the payload length are validated up front, so either a
/// fully populated buffer is returned or nothing is allocated at all.
pub fn decode(
    reply: &RawFramebufferReply,
    width: u32,
    height: u32,
) -> Result<PixelBuffer, DecodeError> {
    let format = PixelFormat::detect(reply.depth, reply.bits_per_pixel, reply.scanline_pad)?;

    let expected = format.bytes_required(width, height);
    if reply.data.len() < expected {
        return Err(DecodeError::Truncated {
            expected,
            actual: reply.data.len(),
        });
    }

    if width == 0 || height == 0 {
        return Ok(PixelBuffer::from_bgra(width, height, vec![]));
    }

    let stride = format.row_stride(width);
    let rows = reply.data[..expected].chunks_exact(stride);
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);

    match format {
        PixelFormat::AlphaMask { .. } => {
            for row in rows {
                for x in 0..width as usize {
                    if (row[x / 8] >> (x % 8)) & 1 == 1 {
                        pixels.extend_from_slice(&OPAQUE_BLACK);
                    } else {
                        pixels.extend_from_slice(&TRANSPARENT_WHITE);
                    }
                }
            }
        }
        PixelFormat::Bgr24 => {
            for row in rows {
                for px in row.chunks_exact(3) {
                    pixels.extend_from_slice(&[px[0], px[1], px[2], 0xff]);
                }
            }
        }
        PixelFormat::Bgra32 => pixels.extend_from_slice(&reply.data[..expected]),
    }

    Ok(PixelBuffer::from_bgra(width, height, pixels))
}
