/// Undecoded pixels for one captured rectangle, as the display server returned them.
///
/// The payload is only meaningful together with `depth` and `bits_per_pixel`.
/// `scanline_pad` is the bitmap scanline padding in bits and only matters for
/// depth 1 replies. Replies are consumed by [`crate::decode`] right away.
#[derive(Debug, Clone)]
pub struct RawFramebufferReply {
    pub depth: u8,
    pub bits_per_pixel: u8,
    pub scanline_pad: u8,
    pub data: Vec<u8>,
}

impl RawFramebufferReply {
    pub fn new(depth: u8, bits_per_pixel: u8, data: Vec<u8>) -> Self {
        Self {
            depth,
            bits_per_pixel,
            scanline_pad: 32,
            data,
        }
    }

    pub fn with_scanline_pad(mut self, scanline_pad: u8) -> Self {
        self.scanline_pad = scanline_pad;
        self
    }
}
