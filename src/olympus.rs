// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - olympus.rs
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

//! Olympus ORF decompression: per-row adaptive Golomb-Rice with a
//! four-way predictor and running carry.

use crate::decompress::BitPump;
use crate::pipeline::FileContext;
use crate::tiff::Dir;
use crate::Result;

pub(crate) fn olympus_load_raw(ctx: &mut FileContext) -> Result<()> {
    // Slot 0 is the 12-zero-bits escape; the others map the leading
    // one position to a code length.
    let mut huff = vec![0_u16; 4096];
    huff[0] = 0xc0c;
    let mut n = 0_usize;
    for i in (0..12).rev() {
        for _ in 0..2048 >> i {
            n += 1;
            if n < 4096 {
                huff[n] = ((i as u16) + 1) << 8 | i as u16;
            }
        }
    }

    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let width = ctx.desc.width as usize;
    let mut corrupt = 0_u32;

    let FileContext {
        ref mut stream,
        ref mut raw,
        ..
    } = *ctx;
    stream.seek(std::io::SeekFrom::Current(7))?;
    let mut pump = BitPump::new(stream);

    for row in 0..raw_height {
        let mut acarry = [[0_i32; 3]; 2];
        for col in 0..raw_width {
            let carry = &mut acarry[col & 1];
            let i = 2 * i32::from(carry[2] < 3);
            let mut nbits = 2 + i;
            while nbits + i < 16 && (carry[0] as u16) >> (nbits + i) != 0 {
                nbits += 1;
            }

            let sign3 = pump.get_bits(3) as i32;
            let low = sign3 & 3;
            let sign = sign3 << 29 >> 31;
            let peek = pump.peek_bits(12) as usize;
            let entry = huff[peek];
            pump.consume((entry >> 8) as u8);
            let mut high = (entry & 0xff) as i32;
            if high == 12 {
                high = (pump.get_bits((16 - nbits) as u8) >> 1) as i32;
            }
            carry[0] = (high << nbits) | pump.get_bits(nbits as u8) as i32;
            let diff = (carry[0] ^ sign) + carry[1];
            carry[1] = (diff * 3 + carry[1]) >> 5;
            carry[2] = if carry[0] > 16 { 0 } else { carry[2] + 1 };

            if col >= width {
                continue;
            }
            let pred: i32 = if row < 2 && col < 2 {
                0
            } else if row < 2 {
                raw.data[row * raw_width + col - 2] as i32
            } else if col < 2 {
                raw.data[(row - 2) * raw_width + col] as i32
            } else {
                let w = raw.data[row * raw_width + col - 2] as i32;
                let n = raw.data[(row - 2) * raw_width + col] as i32;
                let nw = raw.data[(row - 2) * raw_width + col - 2] as i32;
                if (w < nw && nw < n) || (n < nw && nw < w) {
                    if (w - nw).abs() > 32 || (n - nw).abs() > 32 {
                        w + n - nw
                    } else {
                        (w + n) >> 1
                    }
                } else if (w - nw).abs() > (n - nw).abs() {
                    w
                } else {
                    n
                }
            };
            let value = pred + ((diff << 2) | low);
            if value >> 12 != 0 {
                corrupt += 1;
            }
            raw.data[row * raw_width + col] = value as u16;
        }
    }
    if pump.truncated {
        corrupt += 1;
    }
    ctx.derror_count(corrupt);
    Ok(())
}

/// Olympus maker note: the red/blue balance and black level live in
/// the ImageProcessing sub-directory on newer bodies, inline on the
/// old ones.
pub(crate) fn parse_makernote(ctx: &mut FileContext, dir: &Dir) {
    // RedBalance / BlueBalance, hundredths.
    if let Some(e) = dir.entry(0x1017) {
        if let Some(v) = e.uint() {
            ctx.desc.cam_mul[0] = v as f32 / 256.0;
        }
    }
    if let Some(e) = dir.entry(0x1018) {
        if let Some(v) = e.uint() {
            ctx.desc.cam_mul[2] = v as f32 / 256.0;
        }
    }
    if ctx.desc.cam_mul[0] != 0.0 && ctx.desc.cam_mul[1] == 0.0 {
        ctx.desc.cam_mul[1] = 1.0;
        ctx.desc.cam_mul[3] = 1.0;
    }
}
