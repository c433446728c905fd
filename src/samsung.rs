// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - samsung.rs
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

//! Samsung SRW decompression, three generations: per-row
//! variable-length with a checkerboard swap, differential Huffman,
//! and the block-adaptive opcode variant.

use std::io::SeekFrom;

use crate::container::Endian;
use crate::decompress::{BitPump, HuffTable, Ph1BitPump};
use crate::pipeline::FileContext;
use crate::tiff::Dir;
use crate::Result;

/// SRW v1. Row offsets come from a table; four running lengths are
/// adjusted by 2-bit opcodes; decoded values pair into a
/// checkerboard that is unswapped at the end.
pub(crate) fn samsung_load_raw(ctx: &mut FileContext) -> Result<()> {
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let strip_offset = ctx.desc.strip_offset;
    let data_offset = ctx.desc.data_offset;
    let mut corrupt = 0_u32;

    ctx.stream.set_endian(Endian::Little);
    for row in 0..raw_height {
        ctx.stream
            .seek(SeekFrom::Start(strip_offset + row as u64 * 4))?;
        let line = ctx.stream.read_u32()? as u64;
        ctx.stream.seek(SeekFrom::Start(data_offset + line))?;

        let FileContext {
            ref mut stream,
            ref mut raw,
            ..
        } = *ctx;
        let mut pump = Ph1BitPump::new(stream);
        let mut len = [if row < 2 { 7_i32 } else { 4 }; 4];
        let mut col = 0_usize;
        while col < raw_width {
            let dir = pump.get_bits(1) != 0;
            let mut op = [0_u32; 4];
            for o in op.iter_mut() {
                *o = pump.get_bits(2);
            }
            for (c, o) in op.iter().enumerate() {
                match o {
                    3 => len[c] = pump.get_bits(4) as i32,
                    2 => len[c] -= 1,
                    1 => len[c] += 1,
                    _ => (),
                }
            }
            // Even samples first, then odd, exactly as written.
            for cu in [0, 2, 4, 6, 8, 10, 12, 14, 1, 3, 5, 7, 9, 11, 13, 15] {
                let i = len[((cu & 1) << 1) | (cu >> 3)] as u8;
                let diff = if i == 0 {
                    0
                } else {
                    (pump.get_bits(i) as i32) << (32 - i) >> (32 - i)
                };
                let pred = if dir {
                    let prow = row as i64 + (!(cu as i64) | -2);
                    if prow < 0 {
                        corrupt += 1;
                        128
                    } else {
                        raw.data[prow as usize * raw_width + col + cu] as i32
                    }
                } else if col == 0 {
                    128
                } else {
                    let pcol = (col + cu) as i64 + ((cu as i64) | -2);
                    raw.data[row * raw_width + pcol as usize] as i32
                };
                if col + cu < raw_width {
                    raw.data[row * raw_width + col + cu] = (pred + diff) as u16;
                }
            }
            col += 16;
        }
        if pump.truncated {
            corrupt += 1;
        }
    }
    // Unswap the green checkerboard.
    for row in (0..raw_height.saturating_sub(1)).step_by(2) {
        for col in (0..raw_width.saturating_sub(1)).step_by(2) {
            let a = row * raw_width + col + 1;
            let b = (row + 1) * raw_width + col;
            ctx.raw.data.swap(a, b);
        }
    }
    ctx.derror_count(corrupt);
    Ok(())
}

/// SRW v2: plain differential Huffman over a fixed table.
pub(crate) fn samsung2_load_raw(ctx: &mut FileContext) -> Result<()> {
    static TAB: [u16; 14] = [
        0x304, 0x307, 0x206, 0x205, 0x403, 0x600, 0x709, 0x80a, 0x90b, 0xa0c, 0xa0d, 0x501, 0x408,
        0x402,
    ];
    let huff = HuffTable::from_entries(10, &TAB);

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

/// SRW v3: block-adaptive predictors selected by opcode bits, with a
/// magnitude scale.
pub(crate) fn samsung3_load_raw(ctx: &mut FileContext) -> Result<()> {
    ctx.stream.set_endian(Endian::Little);
    ctx.stream.seek(SeekFrom::Current(9))?;
    let opt = ctx.stream.read_u8()? as u32;
    ctx.stream.read_u16()?;
    let init = ctx.stream.read_u16()? as i32;

    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let data_offset = ctx.desc.data_offset;
    let mut corrupt = 0_u32;

    // Predictor column offsets by mode, from the reference layout.
    const P1: [i64; 7] = [-4, -2, -2, 0, 0, 2, 4];
    const P2: [i64; 7] = [-4, -2, 0, 0, 2, 2, 4];

    for row in 0..raw_height {
        let pos = ctx.stream.position()?;
        let pad = (data_offset.wrapping_sub(pos)) & 15;
        ctx.stream.seek(SeekFrom::Current(pad as i64))?;

        let FileContext {
            ref mut stream,
            ref mut raw,
            ..
        } = *ctx;
        let mut pump = Ph1BitPump::new(stream);
        let mut mag = 0_i32;
        let mut pmode = 7_usize;
        let mut lent = [[if row < 2 { 7_i32 } else { 4 }; 2]; 3];
        let mut len = [0_i32; 4];

        let mut tab = 0_usize;
        while tab + 15 < raw_width {
            if !(opt & 4 != 0) && tab & 63 == 0 {
                let i = pump.get_bits(2) as usize;
                mag = if i < 3 {
                    mag - 2 + [2, 0, 4][i] as i32
                } else {
                    pump.get_bits(12) as i32
                };
            }
            if opt & 2 != 0 {
                pmode = 7 - 4 * pump.get_bits(1) as usize;
            } else if pump.get_bits(1) == 0 {
                pmode = pump.get_bits(3) as usize;
            }
            if opt & 1 != 0 || pump.get_bits(1) == 0 {
                for l in len.iter_mut() {
                    *l = pump.get_bits(2) as i32;
                }
                for c in 0..4_usize {
                    let i = ((row & 1) << 1 | (c & 1)) % 3;
                    len[c] = if len[c] < 3 {
                        lent[i][0] - 1 + [1, 2, 0][len[c] as usize]
                    } else {
                        pump.get_bits(4) as i32
                    };
                    lent[i][0] = lent[i][1];
                    lent[i][1] = len[c];
                }
            }
            for c in 0..16_usize {
                let col = tab + (((c & 7) << 1) ^ (c >> 3) ^ (row & 1));
                let pred = if pmode == 7 || row < 2 {
                    if tab != 0 {
                        raw.data[row * raw_width + tab - 2 + (col & 1)] as i32
                    } else {
                        init
                    }
                } else {
                    // Greens predict from the previous green row, the
                    // other colours from two rows up.
                    let (prow, pcol_base) = if col & 1 == (row & 1) {
                        (row - 1, 1_i64 - ((row as i64 & 1) << 1))
                    } else {
                        (row - 2, 0_i64)
                    };
                    let a = (prow * raw_width) as i64 + pcol_base + col as i64 + P1[pmode];
                    let b = (prow * raw_width) as i64 + pcol_base + col as i64 + P2[pmode];
                    if a < 0 || b < 0 {
                        corrupt += 1;
                        init
                    } else {
                        (raw.data[a as usize] as i32 + raw.data[b as usize] as i32 + 1) >> 1
                    }
                };
                let i = len[c >> 2] as u8;
                let mut diff = pump.get_bits(i) as i32;
                if i > 0 && diff >> (i - 1) != 0 {
                    diff -= 1 << i;
                }
                diff = diff * (mag * 2 + 1) + mag;
                if col < raw_width {
                    raw.data[row * raw_width + col] = (pred + diff) as u16;
                }
            }
            tab += 16;
        }
        if pump.truncated {
            corrupt += 1;
        }
    }
    ctx.derror_count(corrupt);
    Ok(())
}

/// Samsung maker note: white balance and black level.
pub(crate) fn parse_makernote(ctx: &mut FileContext, dir: &Dir) {
    if let Some(e) = dir.entry(0xa021) {
        for c in 0..4 {
            if let Some(v) = e.uint_at(c) {
                ctx.desc.cam_mul[c ^ (c >> 1)] = v as f32;
            }
        }
    }
    if let Some(e) = dir.entry(0xa028) {
        for c in 0..4 {
            if let Some(v) = e.uint_at(c) {
                let mul = ctx.desc.cam_mul[c ^ (c >> 1)];
                if mul >= v as f32 {
                    ctx.desc.cam_mul[c ^ (c >> 1)] = mul - v as f32;
                }
            }
        }
    }
}
