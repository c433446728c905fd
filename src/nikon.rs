// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - nikon.rs
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

//! Nikon decoding: the 12/14-bit compressed NEF and the 3-plane YUV
//! variant, plus the maker note.

use std::io::SeekFrom;

use crate::decompress::{BitPump, HuffTable};
use crate::pipeline::FileContext;
use crate::tiff::Dir;
use crate::utils::lim;
use crate::Result;

/// The six Huffman specifications: 12/14 bit, lossy before and after
/// the split row, and lossless.
static NIKON_TREE: [[u8; 32]; 6] = [
    // 12-bit lossy
    [
        0, 1, 5, 1, 1, 1, 1, 1, 1, 2, 0, 0, 0, 0, 0, 0, 5, 4, 3, 6, 2, 7, 1, 0, 8, 9, 11, 10, 12,
        0, 0, 0,
    ],
    // 12-bit lossy after split
    [
        0, 1, 5, 1, 1, 1, 1, 1, 1, 2, 0, 0, 0, 0, 0, 0, 0x39, 0x5a, 0x38, 0x27, 0x16, 5, 4, 3, 2,
        1, 0, 11, 12, 12, 0, 0,
    ],
    // 12-bit lossless
    [
        0, 1, 4, 2, 3, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 5, 4, 6, 3, 7, 2, 8, 1, 9, 0, 10, 11, 12,
        0, 0, 0,
    ],
    // 14-bit lossy
    [
        0, 1, 4, 3, 1, 1, 1, 1, 1, 2, 0, 0, 0, 0, 0, 0, 5, 6, 4, 7, 8, 3, 9, 2, 1, 0, 10, 11, 12,
        13, 14, 0,
    ],
    // 14-bit lossy after split
    [
        0, 1, 5, 1, 1, 1, 1, 1, 1, 1, 2, 0, 0, 0, 0, 0, 8, 0x5c, 0x4b, 0x3a, 0x29, 7, 6, 5, 4, 3,
        2, 1, 0, 13, 14, 0,
    ],
    // 14-bit lossless
    [
        0, 1, 4, 2, 2, 3, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 7, 6, 8, 5, 9, 4, 10, 3, 11, 12, 2, 0, 1,
        13, 14, 0,
    ],
];

/// Nikon compressed NEF: a piecewise-linear tone table split across
/// an optional key offset, then predictive Huffman with two-column
/// left predictors and two-row vertical predictors.
pub(crate) fn nikon_load_raw(ctx: &mut FileContext) -> Result<()> {
    let bps = ctx.desc.bits_per_sample;
    let meta_offset = ctx.desc.meta_offset;
    let data_offset = ctx.desc.data_offset;

    ctx.stream.seek(SeekFrom::Start(meta_offset))?;
    let ver0 = ctx.stream.read_u8()?;
    let ver1 = ctx.stream.read_u8()?;
    if ver0 == 0x49 || ver1 == 0x58 {
        ctx.stream.seek(SeekFrom::Current(2110))?;
    }
    let mut tree = 0_usize;
    if ver0 == 0x46 {
        tree = 2;
    }
    if bps == 14 {
        tree += 3;
    }

    let mut vpred = [[0_u16; 2]; 2];
    for row in vpred.iter_mut() {
        for v in row.iter_mut() {
            *v = ctx.stream.read_u16()?;
        }
    }
    let mut max = (1_i32 << bps) & 0x7fff;
    let csize = ctx.stream.read_u16()? as i32;
    let mut step = 0_i32;
    if csize > 1 {
        step = max / (csize - 1);
    }
    let mut split = 0_u32;
    if ver0 == 0x44 && ver1 == 0x20 && step > 0 {
        for i in 0..csize as usize {
            let v = ctx.stream.read_u16()?;
            ctx.curve[i * step as usize] = v;
        }
        for i in 0..max as usize {
            let base = i - i % step as usize;
            ctx.curve[i] = ((ctx.curve[base] as u32 * (step as u32 - (i % step as usize) as u32)
                + ctx.curve[base + step as usize] as u32 * (i % step as usize) as u32)
                / step as u32) as u16;
        }
        ctx.stream.seek(SeekFrom::Start(meta_offset + 562))?;
        split = ctx.stream.read_u16()? as u32;
    } else if ver0 != 0x46 && csize <= 0x4001 {
        max = csize;
        for i in 0..csize as usize {
            ctx.curve[i] = ctx.stream.read_u16()?;
        }
    }
    while max > 2 && ctx.curve[max as usize - 2] == ctx.curve[max as usize - 1] {
        max -= 1;
    }

    let mut huff = HuffTable::new(&NIKON_TREE[tree]);
    ctx.stream.seek(SeekFrom::Start(data_offset))?;

    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let mut corrupt = 0_u32;
    let mut min = 0_i32;
    let mut hpred = [0_u16; 2];

    let FileContext {
        ref mut stream,
        ref mut raw,
        ref curve,
        ..
    } = *ctx;
    let mut pump = BitPump::new(stream);

    for row in 0..raw_height {
        if split != 0 && row as u32 == split {
            huff = HuffTable::new(&NIKON_TREE[tree + 1]);
            min = 16;
            max += 32;
        }
        for col in 0..raw_width {
            let i = pump.get_huff(&huff) as i32;
            let len = i & 15;
            let shl = i >> 4;
            let bits = pump.get_bits((len - shl) as u8) as i32;
            let mut diff = ((bits << 1) + 1) << shl >> 1;
            if len > 0 && (diff & (1 << (len - 1))) == 0 {
                diff -= (1 << len) - i32::from(shl == 0);
            }
            if col < 2 {
                vpred[row & 1][col] = vpred[row & 1][col].wrapping_add(diff as u16);
                hpred[col] = vpred[row & 1][col];
            } else {
                hpred[col & 1] = hpred[col & 1].wrapping_add(diff as u16);
            }
            if (hpred[col & 1] as i32 + min) as u16 as i32 >= max {
                corrupt += 1;
            }
            let v = lim(hpred[col & 1] as i16 as i32, 0, 0x3fff) as usize;
            raw.data[row * raw_width + col] = curve[v];
        }
    }
    if pump.truncated {
        corrupt += 1;
    }
    ctx.derror_count(corrupt);
    Ok(())
}

/// Nikon small NEF: 48-bit groups holding 4 x 12-bit YUV samples
/// decoded to three colours through a fixed matrix and the camera
/// multipliers.
pub(crate) fn nikon_yuv_load_raw(ctx: &mut FileContext) -> Result<()> {
    let width = ctx.desc.raw_width as usize;
    let height = ctx.desc.raw_height as usize;
    let mut yuv = [0_i32; 4];
    for row in 0..height {
        let mut bitbuf = 0_u64;
        for col in 0..width {
            let b = col & 1;
            if b == 0 {
                bitbuf = 0;
                for c in 0..6 {
                    bitbuf |= (ctx.stream.read_u8().unwrap_or(0) as u64) << (c * 8);
                }
                for (c, v) in yuv.iter_mut().enumerate() {
                    *v = ((bitbuf >> (c * 12) & 0xfff) as i32) - ((c as i32 >> 1) << 11);
                }
            }
            let rgb = [
                yuv[b] as f64 + 1.370705 * yuv[3] as f64,
                yuv[b] as f64 - 0.337633 * yuv[2] as f64 - 0.698001 * yuv[3] as f64,
                yuv[b] as f64 + 1.732446 * yuv[2] as f64,
            ];
            let idx = (row * width + col) * 4;
            for c in 0..3 {
                let v = ctx.curve[lim(rgb[c] as i32, 0, 0xfff) as usize] as f32;
                let mul = if ctx.desc.cam_mul[c] > 0.0 {
                    ctx.desc.cam_mul[c]
                } else {
                    1.0
                };
                ctx.image.data[idx + c] = (v / mul) as u16;
            }
        }
    }
    Ok(())
}

/// Nikon maker note tags.
pub(crate) fn parse_makernote(ctx: &mut FileContext, dir: &Dir) {
    // As-shot white balance, rational RGGB.
    if let Some(e) = dir.entry(0x000c) {
        for (c, v) in e.real_array().iter().take(4).enumerate() {
            ctx.desc.cam_mul[c ^ (c >> 1)] = *v as f32;
        }
    }
    if let Some(v) = dir.uint(0x0002) {
        if ctx.desc.iso_speed == 0.0 {
            ctx.desc.iso_speed = v as f32;
        }
    }
    // NEFCompression: 1 lossy, 3 lossless, 4 packed.
    if let Some(v) = dir.uint(0x0093) {
        ctx.desc.compression = v as u16;
    }
    // The linearization curve block. Its offset becomes the
    // meta offset the compressed loader starts from.
    if let Some(e) = dir.entry(0x0096) {
        if let Some(offset) = e.offset {
            ctx.desc.meta_offset = offset;
        }
    }
    // White balance levels, plain versions. The encrypted 2.xx
    // versions need the camera-specific substitution tables; the
    // daylight multipliers stand in when we meet one.
    if let Some(e) = dir.entry(0x0097) {
        let data = e.data();
        if data.len() >= 4 {
            let ver97: u32 = data[..4]
                .iter()
                .fold(0, |acc, c| acc * 10 + (*c as char).to_digit(10).unwrap_or(0));
            let wb_at = |off: usize, c: usize| -> f32 {
                if off + c * 2 + 1 < data.len() {
                    u16::from_be_bytes([data[off + c * 2], data[off + c * 2 + 1]]) as f32
                } else {
                    0.0
                }
            };
            match ver97 {
                100 => {
                    for c in 0..4 {
                        ctx.desc.cam_mul[(c >> 1) | ((c & 1) << 1)] = wb_at(72, c);
                    }
                }
                102 => {
                    for c in 0..4 {
                        ctx.desc.cam_mul[c ^ (c >> 1)] = wb_at(10, c);
                    }
                }
                103 => {
                    for c in 0..4 {
                        ctx.desc.cam_mul[c] = wb_at(20, c);
                    }
                }
                _ => {
                    log::debug!("NEF: encrypted white balance version {}", ver97);
                }
            }
        }
    }
    // Per-channel black from the newer bodies.
    if let Some(e) = dir.entry(0x003d) {
        let mut cblack = ctx.desc.cblack;
        for (c, v) in (0..4).map(|c| (c, e.uint_at(c).unwrap_or(0))) {
            cblack[c ^ (c >> 1)] = v;
        }
        ctx.desc.cblack = cblack;
    }
}

#[cfg(test)]
mod test {
    use crate::camera::Decoder;
    use crate::io::Stream;
    use crate::params::Params;
    use crate::pipeline::FileContext;

    /// The split-linearization scenario: a 16-entry curve, known
    /// diff codes, verify plane values before and after the LUT.
    #[test]
    fn test_nikon_compressed() {
        // Metadata block at 0: version bytes, vpred 4 shorts,
        // csize 16, a 16-entry curve 0,100..1500 read directly,
        // then the bitstream at 600.
        let mut meta = vec![0x45_u8, 0x20];
        for _ in 0..4 {
            meta.extend_from_slice(&0_u16.to_le_bytes());
        }
        meta.extend_from_slice(&16_u16.to_le_bytes());
        for i in 0..16_u16 {
            meta.extend_from_slice(&(i * 100).to_le_bytes());
        }
        while meta.len() < 600 {
            meta.push(0);
        }
        // 12-bit lossy tree: value 5 has the shortest code "00".
        // diff codes for +1, -1, +2:
        //   +1: ssss=1 -> code "1110" + bit 1
        //   -1: ssss=1 -> code "1110" + bit 0
        //   +2: ssss=2 -> code "101" + bits 10
        let bits: u32 = 0b11101_11100_10110_0;
        meta.extend_from_slice(&(bits << 16).to_be_bytes());

        let stream = Stream::new(Box::new(std::io::Cursor::new(meta)));
        let mut ctx = FileContext::new(stream, Params::default(), "test");
        ctx.desc.raw_width = 3;
        ctx.desc.raw_height = 1;
        ctx.desc.width = 3;
        ctx.desc.height = 1;
        ctx.desc.bits_per_sample = 12;
        ctx.desc.meta_offset = 0;
        ctx.desc.data_offset = 600;
        ctx.desc.decoder = Decoder::NikonCompressed;
        ctx.alloc_raw().unwrap();

        super::nikon_load_raw(&mut ctx).unwrap();
        // Raw diffs from vpred [0,0]: 1, -1 (clamped to 0), 2.
        // After the curve: 100, 0, 200. The wrapped -1 predictor is
        // counted as corrupt, exactly once.
        assert_eq!(ctx.raw.data, vec![100, 0, 200]);
        assert_eq!(ctx.data_error, 1);
    }
}
