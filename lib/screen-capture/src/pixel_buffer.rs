use image::{ExtendedColorType, ImageEncoder, ImageError, codecs::bmp::BmpEncoder};
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bgra {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}

/// A decoded frame. Pixels are stored row-major, 4 bytes each, in B,G,R,A order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub(crate) fn from_bgra(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bgra(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Bgra> {
        if x >= self.width || y >= self.height {
            return None;
        }

        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some(Bgra {
            b: self.data[i],
            g: self.data[i + 1],
            r: self.data[i + 2],
            a: self.data[i + 3],
        })
    }

    /// Packed R,G,B bytes. Alpha is dropped.
    pub fn to_rgb(&self) -> Vec<u8> {
        self.data
            .chunks_exact(4)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect()
    }

    /// Write the frame as a 24-bit BMP image. Alpha does not survive the encoding.
    pub fn encode_bmp<W: Write>(&self, writer: &mut W) -> Result<(), ImageError> {
        BmpEncoder::new(writer).write_image(
            &self.to_rgb(),
            self.width,
            self.height,
            ExtendedColorType::Rgb8,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_by_one() -> PixelBuffer {
        PixelBuffer::from_bgra(2, 1, vec![10, 20, 30, 255, 40, 50, 60, 0])
    }

    #[test]
    fn test_pixel_bounds() {
        let buffer = two_by_one();
        assert_eq!(
            buffer.pixel(1, 0),
            Some(Bgra {
                b: 40,
                g: 50,
                r: 60,
                a: 0
            })
        );
        assert_eq!(buffer.pixel(2, 0), None);
        assert_eq!(buffer.pixel(0, 1), None);
    }

    #[test]
    fn test_to_rgb() {
        assert_eq!(two_by_one().to_rgb(), vec![30, 20, 10, 60, 50, 40]);
    }

    #[test]
    fn test_encode_bmp() {
        let mut buf = vec![];
        two_by_one().encode_bmp(&mut buf).unwrap();

        assert_eq!(&buf[..2], b"BM");
        let file_size = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]);
        assert_eq!(file_size as usize, buf.len());
    }
}
