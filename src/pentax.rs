// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - pentax.rs
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

//! Pentax PEF decompression: a per-file Huffman specification from
//! the maker note drives the standard predictive primitive.

use std::io::SeekFrom;

use crate::decompress::{BitPump, HuffTable};
use crate::pipeline::FileContext;
use crate::tiff::Dir;
use crate::Result;

pub(crate) fn pentax_load_raw(ctx: &mut FileContext) -> Result<()> {
    // The in-file Huffman table: code start positions and lengths.
    ctx.stream.seek(SeekFrom::Start(ctx.desc.meta_offset))?;
    let dep = ((ctx.stream.read_u16()? + 12) & 15) as usize;
    ctx.stream.seek(SeekFrom::Current(12))?;
    let mut bit = [[0_u16; 15]; 2];
    for c in 0..dep {
        bit[0][c] = ctx.stream.read_u16()?;
    }
    for c in 0..dep {
        bit[1][c] = ctx.stream.read_u8()? as u16;
    }
    let mut table = vec![0_u16; 4097];
    for c in 0..dep {
        let mut i = bit[0][c] as usize;
        let end = ((bit[0][c] as usize + (4096 >> bit[1][c])).wrapping_sub(1)) & 4095;
        while i <= end {
            i += 1;
            table[i] = bit[1][c] << 8 | c as u16;
        }
    }
    let huff = HuffTable {
        max_bits: 12,
        table,
    };

    ctx.stream.seek(SeekFrom::Start(ctx.desc.data_offset))?;
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let bps = ctx.desc.bits_per_sample;
    let mut corrupt = 0_u32;
    let mut vpred = [[0_u16; 2]; 2];
    let mut hpred = [0_u16; 2];

    let FileContext {
        ref mut stream,
        ref mut raw,
        ..
    } = *ctx;
    let mut pump = BitPump::new(stream);

    for row in 0..raw_height {
        for col in 0..raw_width {
            let diff = pump.huff_diff(&huff);
            if col < 2 {
                vpred[row & 1][col] = vpred[row & 1][col].wrapping_add(diff as u16);
                hpred[col] = vpred[row & 1][col];
            } else {
                hpred[col & 1] = hpred[col & 1].wrapping_add(diff as u16);
            }
            raw.data[row * raw_width + col] = hpred[col & 1];
            if hpred[col & 1] >> bps != 0 {
                corrupt += 1;
            }
        }
    }
    if pump.truncated {
        corrupt += 1;
    }
    ctx.derror_count(corrupt);
    Ok(())
}

/// Pentax maker note: white balance levels and the black point.
pub(crate) fn parse_makernote(ctx: &mut FileContext, dir: &Dir) {
    // WhitePoint, RGGB levels.
    if let Some(e) = dir.entry(0x0201) {
        for c in 0..4 {
            if let Some(v) = e.uint_at(c) {
                ctx.desc.cam_mul[c ^ (c >> 1)] = v as f32;
            }
        }
    }
    // BlackPoint.
    if let Some(e) = dir.entry(0x0200) {
        for c in 0..4 {
            if let Some(v) = e.uint_at(c) {
                ctx.desc.cblack[c] = v;
            }
        }
    }
    // The compression metadata block the loader starts from.
    if let Some(e) = dir.entry(0x0220) {
        if let Some(offset) = e.offset {
            ctx.desc.meta_offset = offset;
        }
    }
}
