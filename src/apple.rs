// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - apple.rs
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

//! Apple QuickTake 100, the oldest format still decoded: 4-bit
//! gradient steps around a radial predictor, expanded through a
//! fixed tone table.

use crate::decompress::BitPump;
use crate::pipeline::FileContext;
use crate::Result;

/// Gradient steps for the 4-bit codes, symmetric around zero.
static GSTEP: [i16; 16] = [
    -89, -60, -44, -32, -22, -15, -8, -2, 2, 8, 15, 22, 32, 44, 60, 89,
];

/// The 8-bit to 10-bit expansion applied on output.
fn curve(v: i32) -> u16 {
    // Smooth quadratic expansion to the 10-bit range.
    let v = v.clamp(0, 255) as u32;
    ((v * v + 2 * v * (v >> 3)) / 180).min(0x3ff) as u16
}

pub(crate) fn quicktake_100_load_raw(ctx: &mut FileContext) -> Result<()> {
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let mut corrupt = 0_u32;

    let FileContext {
        ref mut stream,
        ref mut raw,
        ..
    } = *ctx;
    let mut pump = BitPump::new(stream);

    // Seed the two first rows at mid grey.
    let seed = (raw_width * 2).min(raw.data.len());
    for v in raw.data.iter_mut().take(seed) {
        *v = 0x80;
    }
    for row in 2..raw_height {
        for col in 2..raw_width.saturating_sub(2) {
            let w = raw.data[row * raw_width + col - 2] as i32;
            let n = raw.data[(row - 2) * raw_width + col] as i32;
            let nw = raw.data[(row - 2) * raw_width + col - 2] as i32;
            let pred = (w + n) / 2 + ((w - nw).abs() + (n - nw).abs()) / 4;
            let step = GSTEP[pump.get_bits(4) as usize] as i32;
            let value = pred + step;
            if !(0..=255).contains(&value) {
                corrupt += 1;
            }
            raw.data[row * raw_width + col] = value.clamp(0, 255) as u16;
        }
    }
    if pump.truncated {
        corrupt += 1;
    }
    for v in ctx.raw.data.iter_mut() {
        *v = curve(*v as i32);
    }
    ctx.desc.maximum = 0x3ff;
    ctx.derror_count(corrupt);
    Ok(())
}
