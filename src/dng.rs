// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - dng.rs
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

//! DNG payloads: the tiled lossless JPEG form and the lossy JPEG
//! form through the external decoder. The tag handling itself lives
//! with the TIFF walker.

use std::io::SeekFrom;

use crate::decompress::{ljpeg::LJpeg, BitPump};
use crate::pipeline::FileContext;
use crate::{Error, Result};

/// Tiled (or striped) lossless JPEG DNG.
pub(crate) fn lossless_dng_load_raw(ctx: &mut FileContext) -> Result<()> {
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as u64;
    let tile_width = ctx.desc.tile_width.min(ctx.desc.raw_width) as u64;
    let tile_length = ctx.desc.tile_length.min(ctx.desc.raw_height) as u64;
    let tiles = ctx.tile_offsets.clone();
    let mosaic = ctx.desc.cfa.is_mosaic();
    let samples = ctx.desc.tiff_samples.max(1) as u64;
    let shots = ctx.desc.is_raw.max(1) as u64;
    let mut corrupt = 0_u32;

    let mut trow = 0_u64;
    let mut tcol = 0_u64;
    let mut tile_idx = 0_usize;
    while trow < raw_height {
        let offset = if !tiles.is_empty() {
            if tile_idx >= tiles.len() {
                break;
            }
            tiles[tile_idx]
        } else {
            ctx.desc.data_offset
        };
        tile_idx += 1;
        ctx.stream.seek(SeekFrom::Start(offset))?;

        let FileContext {
            ref mut stream,
            ref mut raw,
            ref mut image,
            ref desc,
            ref curve,
            ..
        } = *ctx;
        let mut jh = LJpeg::start(stream, false, desc.dng_version)?;
        let mut jwide = jh.wide as u64;
        if mosaic {
            // CFA planes interleave into the mosaic columns.
            jwide *= jh.clrs as u64;
        }
        jwide /= samples.min(shots);
        let mut pump = BitPump::new(stream).zero_after_ff(true);
        let mut row = 0_u64;
        let mut col = 0_u64;
        for jrow in 0..jh.high {
            let rp = jh.decode_row(jrow, &mut pump)?;
            for sample in rp.iter().take(jwide as usize) {
                let val = curve[*sample as usize];
                let r = trow + row;
                let c = tcol + col;
                if r < raw_height && (c as usize) < raw_width {
                    if mosaic {
                        raw.data[r as usize * raw_width + c as usize] = val;
                    } else {
                        let pix = (r as usize * raw_width + c as usize) * 4;
                        image.data[pix] = val;
                    }
                }
                col += 1;
                if col >= tile_width || col as usize >= raw_width {
                    col = 0;
                    row += 1;
                }
            }
        }
        if pump.truncated {
            corrupt += 1;
        }
        tcol += tile_width;
        if tcol >= raw_width as u64 {
            tcol = 0;
            trow += tile_length;
        }
    }
    ctx.derror_count(corrupt);
    Ok(())
}

/// Lossy JPEG DNG through the narrow external decode interface.
pub(crate) fn lossy_dng_load_raw(ctx: &mut FileContext) -> Result<()> {
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let tile_width = ctx.desc.tile_width.min(ctx.desc.raw_width) as usize;
    let tile_length = ctx.desc.tile_length.min(ctx.desc.raw_height) as usize;
    let tiles = if ctx.tile_offsets.is_empty() {
        vec![ctx.desc.data_offset]
    } else {
        ctx.tile_offsets.clone()
    };
    let sizes = ctx.tile_sizes.clone();

    let mut trow = 0_usize;
    let mut tcol = 0_usize;
    for (i, offset) in tiles.iter().enumerate() {
        if trow >= raw_height {
            break;
        }
        let len = sizes
            .get(i)
            .copied()
            .unwrap_or(ctx.stream.len()?.saturating_sub(*offset));
        let data = ctx.stream.read_vec_at(*offset, len as usize)?;
        let mut decoder = jpeg_decoder::Decoder::new(std::io::Cursor::new(&data));
        let pixels = decoder.decode()?;
        let info = decoder.info().ok_or(Error::InvalidFormat)?;
        let tw = info.width as usize;
        let th = info.height as usize;
        let comps = pixels.len() / (tw * th).max(1);
        for row in 0..th {
            let r = trow + row;
            if r >= raw_height {
                break;
            }
            for col in 0..tw {
                let c = tcol + col;
                if c >= raw_width {
                    break;
                }
                let pix = (r * raw_width + c) * 4;
                for ch in 0..comps.min(3) {
                    let v = pixels[(row * tw + col) * comps + ch] as usize;
                    ctx.image.data[pix + ch] = ctx.curve[v * 257];
                }
            }
        }
        tcol += tile_width;
        if tcol >= raw_width {
            tcol = 0;
            trow += tile_length;
        }
    }
    ctx.desc.maximum = 0xffff;
    Ok(())
}

/// Interleave one decoded DNG pixel into the plane(s), honouring
/// multi-sample files. Used by the packed loader.
pub(crate) fn packed_dng_load_raw(ctx: &mut FileContext) -> Result<()> {
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let samples = ctx.desc.tiff_samples.max(1) as usize;
    let bps = ctx.desc.bits_per_sample;
    let mosaic = ctx.desc.cfa.is_mosaic();
    let mut corrupt = 0_u32;

    for row in 0..raw_height {
        if bps == 16 {
            for col in 0..raw_width * samples {
                let v = ctx.stream.read_u16().unwrap_or_else(|_| {
                    corrupt += 1;
                    0
                });
                store_dng_sample(ctx, row, col / samples, col % samples, v, mosaic);
            }
        } else {
            let FileContext {
                ref mut stream, ..
            } = *ctx;
            let mut pump = BitPump::new(stream);
            let mut values = Vec::with_capacity(raw_width * samples);
            for _ in 0..raw_width * samples {
                values.push(pump.get_bits(bps as u8) as u16);
            }
            if pump.truncated {
                corrupt += 1;
            }
            for (col, v) in values.into_iter().enumerate() {
                store_dng_sample(ctx, row, col / samples, col % samples, v, mosaic);
            }
        }
    }
    ctx.derror_count(corrupt);
    Ok(())
}

fn store_dng_sample(
    ctx: &mut FileContext,
    row: usize,
    col: usize,
    sample: usize,
    v: u16,
    mosaic: bool,
) {
    let raw_width = ctx.desc.raw_width as usize;
    let val = ctx.curve[v as usize];
    if mosaic {
        if sample == 0 {
            ctx.raw.data[row * raw_width + col] = val;
        }
    } else {
        ctx.image.data[(row * raw_width + col) * 4 + sample.min(3)] = val;
    }
}
