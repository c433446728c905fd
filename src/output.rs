// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - output.rs
 *
 * Copyright (C) 2024 rawdev contributors
 *
 * This library is free software: you can redistribute it and/or
 * modify it under the terms of the GNU Lesser General Public License
 * as published by the Free Software Foundation, either version 3 of
 * the License, or (at your option) any later version.
 *
 * This library is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
 * Lesser General Public License for more details.
 *
 * You should have received a copy of the GNU Lesser General Public
 * License along with this library.  If not, see
 * <http://www.gnu.org/licenses/>.
 */

//! Writers: portable maps (P5/P6/P7) and baseline TIFF. Pixels go
//! through the output gamma LUT; PNM 16-bit output is network order,
//! TIFF is written little-endian with proper tags.

use std::io::Write;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::pipeline::{colourspace, finish, FileContext};
use crate::Result;

/// Write the developed image as PGM/PPM/PAM depending on the number
/// of colours.
pub fn write_pnm(ctx: &mut FileContext, out: &mut dyn Write) -> Result<()> {
    let curve = colourspace::build_output_curve(ctx);
    let (width, height) = finish::flipped_size(&ctx.desc);
    let colors = (ctx.desc.colors as usize).min(4);
    let bps = ctx.params.output_bps;
    let maxval = if bps == 8 { 255 } else { 65535 };

    match colors {
        1 => write!(out, "P5\n{} {}\n{}\n", width, height, maxval)?,
        3 => write!(out, "P6\n{} {}\n{}\n", width, height, maxval)?,
        _ => write!(
            out,
            "P7\nWIDTH {}\nHEIGHT {}\nDEPTH {}\nMAXVAL {}\nTUPLTYPE RGB_ALPHA\nENDHDR\n",
            width, height, colors, maxval
        )?,
    }

    let mut row_buf = Vec::with_capacity(width as usize * colors * (bps as usize / 8));
    for row in 0..height {
        row_buf.clear();
        for col in 0..width {
            let idx = finish::flip_index(&ctx.desc, row, col) * 4;
            for c in 0..colors {
                let v = curve[ctx.image.data[idx + c] as usize];
                if bps == 8 {
                    row_buf.push((v >> 8) as u8);
                } else {
                    // Network order for 16-bit portable maps.
                    row_buf.extend_from_slice(&v.to_be_bytes());
                }
            }
        }
        out.write_all(&row_buf)?;
    }
    Ok(())
}

struct TiffTag {
    tag: u16,
    type_: u16,
    count: u32,
    value: u32,
}

/// Write a baseline TIFF with the standard tag set. Byte order is
/// the native little-endian.
pub fn write_tiff(ctx: &mut FileContext, out: &mut dyn Write) -> Result<()> {
    let curve = colourspace::build_output_curve(ctx);
    let (width, height) = finish::flipped_size(&ctx.desc);
    let colors = ctx.desc.colors.min(3) as u32;
    let bps = ctx.params.output_bps as u32;

    let desc_text = format!("{} {}", ctx.desc.make, ctx.desc.model);
    let software = b"rawdev\0";
    // Header + IFD + external data then pixels.
    let mut tags: Vec<TiffTag> = Vec::new();
    let ntags = 14_u32;
    let ifd_size = 2 + ntags * 12 + 4;
    let mut data_offset = 8 + ifd_size;

    let mut external: Vec<u8> = Vec::new();
    let mut push_ascii = |bytes: &[u8], external: &mut Vec<u8>| -> (u32, u32) {
        let offset = data_offset + external.len() as u32;
        external.extend_from_slice(bytes);
        (bytes.len() as u32, offset)
    };
    let (desc_len, desc_off) = push_ascii(desc_text.as_bytes(), &mut external);
    let (soft_len, soft_off) = push_ascii(software, &mut external);
    // Resolution rationals.
    let res_off = data_offset + external.len() as u32;
    external.extend_from_slice(&300_u32.to_le_bytes());
    external.extend_from_slice(&1_u32.to_le_bytes());

    data_offset += external.len() as u32;
    let strip_offset = data_offset;

    tags.push(TiffTag { tag: 0x100, type_: 4, count: 1, value: width });
    tags.push(TiffTag { tag: 0x101, type_: 4, count: 1, value: height });
    tags.push(TiffTag { tag: 0x102, type_: 3, count: 1, value: bps });
    tags.push(TiffTag { tag: 0x103, type_: 3, count: 1, value: 1 });
    tags.push(TiffTag {
        tag: 0x106,
        type_: 3,
        count: 1,
        value: if colors == 1 { 1 } else { 2 },
    });
    tags.push(TiffTag { tag: 0x10e, type_: 2, count: desc_len, value: desc_off });
    tags.push(TiffTag { tag: 0x111, type_: 4, count: 1, value: strip_offset });
    tags.push(TiffTag { tag: 0x115, type_: 3, count: 1, value: colors });
    tags.push(TiffTag { tag: 0x116, type_: 4, count: 1, value: height });
    tags.push(TiffTag {
        tag: 0x117,
        type_: 4,
        count: 1,
        value: width * height * colors * bps / 8,
    });
    tags.push(TiffTag { tag: 0x11a, type_: 5, count: 1, value: res_off });
    tags.push(TiffTag { tag: 0x11b, type_: 5, count: 1, value: res_off });
    tags.push(TiffTag { tag: 0x128, type_: 3, count: 1, value: 2 });
    tags.push(TiffTag { tag: 0x131, type_: 2, count: soft_len, value: soft_off });
    debug_assert_eq!(tags.len() as u32, ntags);

    let mut header = Vec::new();
    header.extend_from_slice(b"II\x2a\x00");
    header.extend_from_slice(&8_u32.to_le_bytes());
    header.extend_from_slice(&(ntags as u16).to_le_bytes());
    for t in &tags {
        header.extend_from_slice(&t.tag.to_le_bytes());
        header.extend_from_slice(&t.type_.to_le_bytes());
        header.extend_from_slice(&t.count.to_le_bytes());
        // Short inline values occupy the low bytes.
        if t.type_ == 3 && t.count == 1 {
            header.extend_from_slice(&(t.value as u16).to_le_bytes());
            header.extend_from_slice(&0_u16.to_le_bytes());
        } else {
            header.extend_from_slice(&t.value.to_le_bytes());
        }
    }
    header.extend_from_slice(&0_u32.to_le_bytes());
    out.write_all(&header)?;
    out.write_all(&external)?;

    let colors = colors as usize;
    let mut row_buf = Vec::with_capacity(width as usize * colors * (bps as usize / 8));
    for row in 0..height {
        row_buf.clear();
        for col in 0..width {
            let idx = finish::flip_index(&ctx.desc, row, col) * 4;
            for c in 0..colors {
                let v = curve[ctx.image.data[idx + c] as usize];
                if bps == 8 {
                    row_buf.push((v >> 8) as u8);
                } else {
                    row_buf.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
        out.write_all(&row_buf)?;
    }
    Ok(())
}

/// Peek at a 16-bit sample in either byte order; helper for tests.
#[cfg(test)]
fn read16(buf: &[u8], big: bool) -> u16 {
    if big {
        BigEndian::read_u16(buf)
    } else {
        LittleEndian::read_u16(buf)
    }
}

#[cfg(test)]
mod test {
    use crate::io::Stream;
    use crate::params::Params;
    use crate::pipeline::FileContext;

    fn developed_context() -> FileContext {
        let stream = Stream::new(Box::new(std::io::Cursor::new(Vec::new())));
        let mut ctx = FileContext::new(stream, Params::default(), "test");
        ctx.desc.width = 2;
        ctx.desc.height = 2;
        ctx.desc.maximum = 65535;
        ctx.params.no_auto_bright = true;
        ctx.params.gamma = [1.0, 1.0];
        ctx.alloc_image().unwrap();
        for (i, pix) in ctx.image.data.chunks_exact_mut(4).enumerate() {
            pix[0] = (i as u16 + 1) * 1000;
            pix[1] = (i as u16 + 1) * 2000;
            pix[2] = (i as u16 + 1) * 3000;
        }
        ctx
    }

    #[test]
    fn test_write_ppm_header() {
        let mut ctx = developed_context();
        ctx.params.output_bps = 16;
        let mut out = Vec::new();
        crate::output::write_pnm(&mut ctx, &mut out).unwrap();
        assert!(out.starts_with(b"P6\n2 2\n65535\n"));
        // 2x2x3 16-bit samples follow the header.
        assert_eq!(out.len(), 13 + 2 * 2 * 3 * 2);
        // Network byte order: the first sample is pixel 0 red, 1000
        // through the unity curve.
        assert_eq!(super::read16(&out[13..], true), 1000);
    }

    #[test]
    fn test_write_tiff_header() {
        let mut ctx = developed_context();
        ctx.params.output_bps = 8;
        let mut out = Vec::new();
        crate::output::write_tiff(&mut ctx, &mut out).unwrap();
        assert!(out.starts_with(b"II\x2a\x00"));
        // Walk back the IFD: 14 entries.
        let nentries = u16::from_le_bytes([out[8], out[9]]);
        assert_eq!(nentries, 14);
    }
}
