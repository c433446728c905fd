// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - standard.rs
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

//! The standard loaders: fixed-width 16-bit samples, bit-packed
//! rows, bytes through the LUT, and the plain lossless JPEG payload.

use std::io::SeekFrom;

use crate::container::Endian;
use crate::decompress::{ljpeg::LJpeg, BitPump};
use crate::pipeline::FileContext;
use crate::Result;

/// Fixed-width 16-bit samples, optionally right-shifted by the load
/// flags. Verifies that shifted samples fit `bits_per_sample`.
pub(crate) fn unpacked_load_raw(ctx: &mut FileContext, big_endian: bool) -> Result<()> {
    let raw_width = ctx.desc.raw_width;
    let raw_height = ctx.desc.raw_height;
    let shift = ctx.desc.load_flags;
    let mut bits = 0_u32;
    while 1_u64 << (bits + 1) < ctx.desc.maximum as u64 {
        bits += 1;
    }
    bits += 1;

    let endian = if big_endian {
        Endian::Big
    } else {
        Endian::Little
    };
    let mut corrupt = 0_u32;
    {
        let mut stream = ctx.stream.scoped_endian(endian);
        for row in 0..raw_height {
            for col in 0..raw_width {
                let mut v = match stream.read_u16() {
                    Ok(v) => v,
                    Err(_) => {
                        corrupt += 1;
                        0
                    }
                };
                v >>= shift;
                if (v as u32) >> bits != 0
                    && row.wrapping_sub(ctx.desc.top_margin) < ctx.desc.height
                    && col.wrapping_sub(ctx.desc.left_margin) < ctx.desc.width
                {
                    corrupt += 1;
                }
                let idx = row as usize * raw_width as usize + col as usize;
                ctx.raw.data[idx] = v;
            }
        }
    }
    ctx.derror_count(corrupt);
    Ok(())
}

/// Variable-width packed samples. The load flags carry the packing
/// parameters: bit 0 pad-to-15/16, bit 1 row interleave, bit 2
/// reseek for the second stripe, bits 3..5 the byte bite, bits 6..7
/// a column swap, bit 8 nibble-little-endian order, bit 9 row
/// padding.
pub(crate) fn packed_load_raw(ctx: &mut FileContext) -> Result<()> {
    if ctx.desc.load_flags & 0x100 != 0 {
        return packed_lsb_load_raw(ctx);
    }
    let raw_width = ctx.desc.raw_width as i64;
    let raw_height = ctx.desc.raw_height as i64;
    let bps = ctx.desc.bits_per_sample as i64;
    let load_flags = ctx.desc.load_flags as i64;
    let data_offset = ctx.desc.data_offset;
    let compressed = ctx.desc.compression > 1;

    let mut bwide = raw_width * bps / 8;
    bwide += bwide & (load_flags >> 9);
    let rbits = bwide * 8 - raw_width * bps;
    if load_flags & 1 != 0 {
        bwide = bwide * 16 / 15;
    }
    let bite = 8 + (load_flags & 56);
    let half = (raw_height + 1) >> 1;

    let mut bitbuf = 0_u64;
    let mut vbits = 0_i64;
    let mut corrupt = 0_u32;

    for irow in 0..raw_height {
        let mut row = irow;
        if load_flags & 2 != 0 {
            row = irow % half * 2 + irow / half;
            if row == 1 && load_flags & 4 != 0 {
                vbits = 0;
                if compressed {
                    ctx.stream.seek(SeekFrom::Start(
                        (data_offset as i64 - (-half * bwide & -2048)) as u64,
                    ))?;
                } else {
                    let end = ctx.stream.len()?;
                    ctx.stream.seek(SeekFrom::Start(end >> 3 << 2))?;
                }
            }
        }
        for col in 0..raw_width {
            vbits -= bps;
            while vbits < 0 {
                bitbuf <<= bite;
                let mut i = 0;
                while i < bite {
                    let c = ctx.stream.read_u8().unwrap_or_else(|_| {
                        corrupt += 1;
                        0
                    });
                    bitbuf |= (c as u64) << i;
                    i += 8;
                }
                vbits += bite;
            }
            let val = (bitbuf << (64 - bps - vbits) >> (64 - bps)) as u16;
            let out_col = (col ^ (load_flags >> 6 & 3)) as usize;
            let idx = row as usize * raw_width as usize + out_col;
            ctx.raw.data[idx] = val;
            if load_flags & 1 != 0 && col % 10 == 9 {
                if ctx.stream.read_u8().unwrap_or(0) != 0
                    && row < raw_height + ctx.desc.top_margin as i64
                    && col < raw_width + ctx.desc.left_margin as i64
                {
                    corrupt += 1;
                }
            }
        }
        vbits -= rbits;
    }
    ctx.derror_count(corrupt);
    Ok(())
}

/// Packed rows in little-endian bit order: the low bits of each
/// sample come from the earlier byte. Panasonic-style 12-bit.
fn packed_lsb_load_raw(ctx: &mut FileContext) -> Result<()> {
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let bps = ctx.desc.bits_per_sample as u32;
    let mask = (1_u64 << bps) - 1;

    let mut corrupt = 0_u32;
    let mut bitbuf = 0_u64;
    let mut vbits = 0_u32;
    for row in 0..raw_height {
        for col in 0..raw_width {
            while vbits < bps {
                let c = ctx.stream.read_u8().unwrap_or_else(|_| {
                    corrupt += 1;
                    0
                });
                bitbuf |= (c as u64) << vbits;
                vbits += 8;
            }
            ctx.raw.data[row * raw_width + col] = (bitbuf & mask) as u16;
            bitbuf >>= bps;
            vbits -= bps;
        }
    }
    ctx.derror_count(corrupt);
    Ok(())
}

/// Byte stream through the linearization LUT.
pub(crate) fn eight_bit_load_raw(ctx: &mut FileContext) -> Result<()> {
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let mut corrupt = 0_u32;
    let mut pixel = vec![0_u8; raw_width];
    for row in 0..raw_height {
        if ctx.stream.read_some(&mut pixel)? < raw_width {
            corrupt += 1;
        }
        for (col, p) in pixel.iter().enumerate() {
            ctx.raw.data[row * raw_width + col] = ctx.curve[*p as usize];
        }
    }
    ctx.desc.maximum = ctx.curve[0xff] as u32;
    ctx.derror_count(corrupt);
    Ok(())
}

/// The plain lossless JPEG payload: Canon CR2 (with slices) and the
/// single-tile Adobe form.
pub(crate) fn lossless_jpeg_load_raw(ctx: &mut FileContext) -> Result<()> {
    let FileContext {
        ref mut stream,
        ref mut raw,
        ref desc,
        ref curve,
        ..
    } = *ctx;

    let mut jh = LJpeg::start(stream, false, desc.dng_version)?;
    let jwide = jh.wide as usize * jh.clrs;
    let raw_width = desc.raw_width as usize;
    let raw_height = desc.raw_height as usize;
    let slices = desc.cr2_slices;

    let mut corrupt = 0_u32;
    let mut row = 0_i64;
    let mut col = 0_i64;
    let mut pump = BitPump::new(stream).zero_after_ff(true);
    for jrow in 0..jh.high {
        let rp = jh.decode_row(jrow, &mut pump)?;
        if desc.load_flags & 1 != 0 {
            row = if jrow & 1 != 0 {
                desc.height as i64 - 1 - (jrow as i64) / 2
            } else {
                (jrow as i64) / 2
            };
        }
        for (jcol, sample) in rp.iter().enumerate().take(jwide) {
            let val = curve[*sample as usize] as u16;
            if slices[0] != 0 {
                let jidx = jrow as i64 * jwide as i64 + jcol as i64;
                let mut i = jidx / (slices[1] as i64 * raw_height as i64);
                let j = i64::from(i >= slices[0] as i64);
                if j != 0 {
                    i = slices[0] as i64;
                }
                let jidx = jidx - i * (slices[1] as i64 * raw_height as i64);
                row = jidx / slices[1 + j as usize] as i64;
                col = jidx % slices[1 + j as usize] as i64 + i * slices[1] as i64;
            }
            if raw_width == 3984 {
                col -= 2;
                if col < 0 {
                    col += raw_width as i64;
                    row -= 1;
                }
            }
            if row >= 0 && (row as usize) < raw_height && (col as usize) < raw_width {
                raw.data[row as usize * raw_width + col as usize] = val;
            }
            col += 1;
            if col >= raw_width as i64 {
                col = 0;
                row += 1;
            }
        }
    }
    if pump.truncated {
        corrupt += 1;
    }
    ctx.derror_count(corrupt);
    Ok(())
}

#[cfg(test)]
mod test {
    use crate::camera::Decoder;
    use crate::io::Stream;
    use crate::params::Params;
    use crate::pipeline::FileContext;

    fn context_of(data: Vec<u8>) -> FileContext {
        let stream = Stream::new(Box::new(std::io::Cursor::new(data)));
        FileContext::new(stream, Params::default(), "test")
    }

    #[test]
    fn test_packed_12le() {
        // Two 12-bit samples packed across three bytes.
        let mut ctx = context_of(vec![0xff, 0x0f, 0x00]);
        ctx.desc.raw_width = 2;
        ctx.desc.raw_height = 1;
        ctx.desc.width = 2;
        ctx.desc.height = 1;
        ctx.desc.bits_per_sample = 12;
        ctx.desc.load_flags = 0x100;
        ctx.desc.decoder = Decoder::Packed;
        ctx.alloc_raw().unwrap();
        super::packed_load_raw(&mut ctx).unwrap();
        assert_eq!(ctx.raw.data, vec![0x0fff, 0x0000]);
    }

    #[test]
    fn test_packed_12le_round_trip() {
        // Pack a deterministic pseudo-random 12-bit matrix and feed
        // it back through the decoder.
        let mut state = 0x1234_5678_u32;
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xfff) as u16
        };
        let samples: Vec<u16> = (0..8 * 4).map(|_| next()).collect();
        let mut packed = Vec::new();
        let mut acc = 0_u32;
        let mut nbits = 0;
        for s in &samples {
            acc |= (*s as u32) << nbits;
            nbits += 12;
            while nbits >= 8 {
                packed.push((acc & 0xff) as u8);
                acc >>= 8;
                nbits -= 8;
            }
        }
        if nbits > 0 {
            packed.push(acc as u8);
        }

        let mut ctx = context_of(packed);
        ctx.desc.raw_width = 8;
        ctx.desc.raw_height = 4;
        ctx.desc.width = 8;
        ctx.desc.height = 4;
        ctx.desc.bits_per_sample = 12;
        ctx.desc.load_flags = 0x100;
        ctx.alloc_raw().unwrap();
        super::packed_load_raw(&mut ctx).unwrap();
        assert_eq!(ctx.raw.data, samples);
        assert_eq!(ctx.data_error, 0);
    }

    #[test]
    fn test_unpacked() {
        let mut ctx = context_of(vec![0x34, 0x12, 0x78, 0x56]);
        ctx.desc.raw_width = 2;
        ctx.desc.raw_height = 1;
        ctx.desc.width = 2;
        ctx.desc.height = 1;
        ctx.desc.bits_per_sample = 16;
        ctx.desc.maximum = 0xffff;
        ctx.alloc_raw().unwrap();
        super::unpacked_load_raw(&mut ctx, false).unwrap();
        assert_eq!(ctx.raw.data, vec![0x1234, 0x5678]);
    }

    #[test]
    fn test_eight_bit() {
        let mut ctx = context_of(vec![0, 128, 255]);
        ctx.desc.raw_width = 3;
        ctx.desc.raw_height = 1;
        ctx.desc.bits_per_sample = 8;
        ctx.alloc_raw().unwrap();
        super::eight_bit_load_raw(&mut ctx).unwrap();
        // Identity curve by default.
        assert_eq!(ctx.raw.data, vec![0, 128, 255]);
        assert_eq!(ctx.desc.maximum, 255);
    }
}
