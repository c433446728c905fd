// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - hasselblad.rs
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

//! Hasselblad 3FR decompression: the lossless JPEG primitive
//! extended to two differences per token, with per-shot selection
//! for the multi-sample backs.

use crate::container::Endian;
use crate::decompress::{ljpeg::LJpeg, Ph1BitPump};
use crate::pipeline::FileContext;
use crate::Result;

pub(crate) fn hasselblad_load_raw(ctx: &mut FileContext) -> Result<()> {
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let samples = ctx.desc.tiff_samples.max(1) as usize;
    let load_flags = ctx.desc.load_flags as i32;
    let shot = (ctx.params.shot_select as usize).clamp(0, samples - 1);
    let sh = usize::from(samples > 1);
    let mut corrupt = 0_u32;

    let FileContext {
        ref mut stream,
        ref mut raw,
        ref desc,
        ..
    } = *ctx;
    let jh = LJpeg::start(stream, false, desc.dng_version)?;
    let huff = jh
        .huff_table(0)
        .ok_or_else(|| crate::Error::JpegFormat("3FR: no Huffman table".to_string()))?;
    stream.set_endian(Endian::Little);
    let mut pump = Ph1BitPump::new(stream);

    let mut back = vec![0_i32; raw_width * 3];
    for row in 0..raw_height {
        // Rotate the three predictor rows.
        back.rotate_left(raw_width);
        let mut col = 0_usize;
        while col < raw_width {
            let mut diff = vec![0_i32; samples * 2];
            for s in (0..samples * 2).step_by(2) {
                let len = [pump.get_huff(&huff) as u8, pump.get_huff(&huff) as u8];
                for c in 0..2 {
                    let bits = pump.get_bits(len[c]) as i32;
                    let mut d = bits;
                    if len[c] > 0 && d & (1 << (len[c] - 1)) == 0 {
                        d -= (1 << len[c]) - 1;
                    }
                    if d == 65535 {
                        d = -32768;
                    }
                    diff[s + c] = d;
                }
            }
            for s in col..col + 2 {
                let mut pred = 0x8000 + load_flags;
                if col > 0 {
                    pred = back[2 * raw_width + s - 2];
                }
                if col > 0 && row > 1 && jh.psv == 11 {
                    pred += back[s] / 2 - back[s - 2] / 2;
                }
                for c in 0..samples {
                    pred += diff[(s & 1) * samples + c];
                    let upix = (pred >> sh) & 0xffff;
                    if c == shot {
                        raw.data[row * raw_width + s] = upix as u16;
                    }
                }
                back[2 * raw_width + s] = pred;
            }
            col += 2;
        }
        if pump.truncated {
            corrupt += 1;
        }
    }
    ctx.derror_count(corrupt);
    Ok(())
}
