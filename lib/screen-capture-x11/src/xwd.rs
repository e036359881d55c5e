use crate::Error;
use byteorder::{BigEndian, ReadBytesExt};
use screen_capture::{RawFramebufferReply, Rectangle};
use std::{io::Cursor, process::Command};

const HEADER_FIELDS: usize = 25;
const HEADER_MIN_SIZE: usize = HEADER_FIELDS * 4;
const COLOR_ENTRY_SIZE: usize = 12;
const XWD_FILE_VERSION: u32 = 7;
const Z_PIXMAP: u32 = 2;
const MSB_FIRST: u32 = 1;

/// The part of an xwd dump header needed to locate and read the pixels.
/// All header fields are stored big-endian regardless of the server byte order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XwdHeader {
    pub header_size: u32,
    pub pixmap_format: u32,
    pub pixmap_depth: u32,
    pub pixmap_width: u32,
    pub pixmap_height: u32,
    pub byte_order: u32,
    pub bits_per_pixel: u32,
    pub bytes_per_line: u32,
    pub ncolors: u32,
}

/// Dump the root window and cut `region` out of it.
pub fn capture_region(
    display: Option<&str>,
    region: &Rectangle,
) -> Result<RawFramebufferReply, Error> {
    let dump = dump_root_window(display)?;
    let (header, pixels) = parse_xwd(&dump)?;
    crop(&header, pixels, region)
}

fn dump_root_window(display: Option<&str>) -> Result<Vec<u8>, Error> {
    let exe = "xwd";
    if which::which(exe).is_err() {
        return Err(Error::CommandNotFound(exe.to_string()));
    }

    let mut cmd = Command::new(exe);
    cmd.args(["-root", "-silent"]);
    if let Some(display) = display {
        cmd.args(["-display", display]);
    }

    let output = cmd.output()?;
    if !output.status.success() {
        return Err(Error::Command {
            cmd: exe.to_string(),
            msg: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    log::trace!("xwd dumped {} bytes", output.stdout.len());
    Ok(output.stdout)
}

/// Split an xwd dump into its header and its pixel payload.
pub fn parse_xwd(dump: &[u8]) -> Result<(XwdHeader, &[u8]), Error> {
    if dump.len() < HEADER_MIN_SIZE {
        return Err(Error::Malformed(format!(
            "dump is {} bytes, header alone needs {HEADER_MIN_SIZE}",
            dump.len()
        )));
    }

    let mut fields = [0u32; HEADER_FIELDS];
    Cursor::new(dump).read_u32_into::<BigEndian>(&mut fields)?;

    if fields[1] != XWD_FILE_VERSION {
        return Err(Error::Malformed(format!(
            "unknown file version {}",
            fields[1]
        )));
    }

    let header = XwdHeader {
        header_size: fields[0],
        pixmap_format: fields[2],
        pixmap_depth: fields[3],
        pixmap_width: fields[4],
        pixmap_height: fields[5],
        byte_order: fields[7],
        bits_per_pixel: fields[11],
        bytes_per_line: fields[12],
        ncolors: fields[19],
    };

    check_row_stride(&header)?;

    let pixels_start = header.header_size as usize + header.ncolors as usize * COLOR_ENTRY_SIZE;
    let pixels_len = header.bytes_per_line as usize * header.pixmap_height as usize;

    if (header.header_size as usize) < HEADER_MIN_SIZE {
        return Err(Error::Malformed(format!(
            "header size {} is too small",
            header.header_size
        )));
    }

    match dump.get(pixels_start..pixels_start + pixels_len) {
        Some(pixels) => Ok((header, pixels)),
        None => Err(Error::Malformed(format!(
            "expected {pixels_len} pixel bytes at offset {pixels_start}, dump is {} bytes",
            dump.len()
        ))),
    }
}

/// A row must hold at least `pixmap_width` pixels.
fn check_row_stride(header: &XwdHeader) -> Result<(), Error> {
    let row_bits = header.pixmap_width as u64 * header.bits_per_pixel as u64;
    if (header.bytes_per_line as u64) < row_bits.div_ceil(8) {
        return Err(Error::Malformed(format!(
            "{} bytes per line cannot hold {} pixels of {} bits",
            header.bytes_per_line, header.pixmap_width, header.bits_per_pixel
        )));
    }

    Ok(())
}

/// Cut `region` out of the root pixmap into tightly packed rows in LSB-first byte order.
pub fn crop(
    header: &XwdHeader,
    pixels: &[u8],
    region: &Rectangle,
) -> Result<RawFramebufferReply, Error> {
    if header.pixmap_format != Z_PIXMAP {
        return Err(Error::Unsupported(format!(
            "pixmap format {}",
            header.pixmap_format
        )));
    }

    if header.bits_per_pixel == 0 || header.bits_per_pixel % 8 != 0 {
        return Err(Error::Unsupported(format!(
            "cropping {} bits per pixel",
            header.bits_per_pixel
        )));
    }

    check_row_stride(header)?;

    if !region.fits_within(header.pixmap_width, header.pixmap_height) {
        return Err(Error::OutOfBounds {
            region: *region,
            width: header.pixmap_width,
            height: header.pixmap_height,
        });
    }

    let (depth, bits_per_pixel) = match (
        u8::try_from(header.pixmap_depth),
        u8::try_from(header.bits_per_pixel),
    ) {
        (Ok(depth), Ok(bpp)) => (depth, bpp),
        _ => {
            return Err(Error::Malformed(format!(
                "depth {} with {} bits per pixel",
                header.pixmap_depth, header.bits_per_pixel
            )));
        }
    };

    let bytes_per_pixel = bits_per_pixel as usize / 8;
    let row_len = region.width as usize * bytes_per_pixel;
    let swap = header.byte_order == MSB_FIRST && bytes_per_pixel > 1;

    let mut data = Vec::with_capacity(row_len * region.height as usize);
    for y in region.y as usize..region.y as usize + region.height as usize {
        let start = y * header.bytes_per_line as usize + region.x as usize * bytes_per_pixel;
        let row = pixels.get(start..start + row_len).ok_or_else(|| {
            Error::Malformed(format!(
                "row {y} ends past the {} pixel bytes",
                pixels.len()
            ))
        })?;

        if swap {
            for px in row.chunks_exact(bytes_per_pixel) {
                data.extend(px.iter().rev());
            }
        } else {
            data.extend_from_slice(row);
        }
    }

    Ok(RawFramebufferReply::new(depth, bits_per_pixel, data))
}
