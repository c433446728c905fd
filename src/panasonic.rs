// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - panasonic.rs
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

//! Panasonic RW2 decompression: 14-pixel blocks with 2-bit shift
//! codes, 8-bit absolute resync and 4-bit refinement, fed from
//! 0x4000-byte sections read backwards from a split point.

use crate::io::Stream;
use crate::pipeline::FileContext;
use crate::Result;

/// The backwards 0x4000-byte section reader. `load_flags` is the
/// offset of the wrap point inside each section.
struct PanaBits<'a> {
    stream: &'a mut Stream,
    buf: [u8; 0x4000],
    vbits: i32,
    load_flags: usize,
    pub truncated: bool,
}

impl<'a> PanaBits<'a> {
    fn new(stream: &'a mut Stream, load_flags: usize) -> PanaBits<'a> {
        PanaBits {
            stream,
            buf: [0; 0x4000],
            vbits: 0,
            load_flags,
            truncated: false,
        }
    }

    fn get(&mut self, nbits: i32) -> u32 {
        if nbits == 0 {
            return 0;
        }
        if self.vbits == 0 {
            let split = self.load_flags;
            if self.stream.read_some(&mut self.buf[split..]).unwrap_or(0) < 0x4000 - split {
                self.truncated = true;
            }
            if self.stream.read_some(&mut self.buf[..split]).unwrap_or(0) < split {
                self.truncated = true;
            }
        }
        self.vbits = (self.vbits - nbits) & 0x1ffff;
        let byte = (self.vbits >> 3) as usize ^ 0x3ff0;
        ((self.buf[byte] as u32 | (self.buf[byte + 1] as u32) << 8) >> (self.vbits & 7))
            & !(u32::MAX << nbits)
    }
}

pub(crate) fn panasonic_load_raw(ctx: &mut FileContext) -> Result<()> {
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let width = ctx.desc.width as usize;
    let load_flags = ctx.desc.load_flags as usize;
    let mut corrupt = 0_u32;

    let FileContext {
        ref mut stream,
        ref mut raw,
        ..
    } = *ctx;
    let mut bits = PanaBits::new(stream, load_flags);

    let mut sh = 0_i32;
    let mut pred = [0_i32; 2];
    let mut nonz = [0_i32; 2];
    for row in 0..raw_height {
        for col in 0..raw_width {
            let i = col % 14;
            if i == 0 {
                pred = [0, 0];
                nonz = [0, 0];
            }
            if i % 3 == 2 {
                sh = 4 >> (3 - bits.get(2) as i32);
            }
            if nonz[i & 1] != 0 {
                let j = bits.get(8) as i32;
                if j != 0 {
                    pred[i & 1] -= 0x80 << sh;
                    if pred[i & 1] < 0 || sh == 4 {
                        pred[i & 1] &= !(-1 << sh);
                    }
                    pred[i & 1] += j << sh;
                }
            } else {
                nonz[i & 1] = bits.get(8) as i32;
                if nonz[i & 1] != 0 || i > 11 {
                    pred[i & 1] = nonz[i & 1] << 4 | bits.get(4) as i32;
                }
            }
            let value = pred[col & 1];
            raw.data[row * raw_width + col] = value as u16;
            if value > 4098 && col < width {
                corrupt += 1;
            }
        }
    }
    if bits.truncated {
        corrupt += 1;
    }
    ctx.derror_count(corrupt);
    Ok(())
}
