// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - misc.rs
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

//! Assorted vendor loaders: Rollei, Nokia, the Sinar four-shot
//! backs, Leaf HDR and Imacon full frames.

use std::io::SeekFrom;

use crate::pipeline::FileContext;
use crate::Result;

/// Rollei: 10 bytes carry eight 10-bit samples split across two
/// sample streams.
pub(crate) fn rollei_load_raw(ctx: &mut FileContext) -> Result<()> {
    let npix = (ctx.desc.raw_width * ctx.desc.raw_height) as usize;
    let mut iten = 0_usize;
    let mut isix = npix * 5 / 8;
    let mut buffer = 0_u32;
    let mut pixel = [0_u8; 10];
    loop {
        if ctx.stream.read_some(&mut pixel)? < 10 {
            break;
        }
        let mut todo = [(0_usize, 0_u32); 8];
        for i in 0..5 {
            todo[i] = (iten, (pixel[i * 2] as u32) << 8 | pixel[i * 2 + 1] as u32);
            iten += 1;
            buffer = (pixel[i * 2] as u32) >> 2 | buffer << 6;
        }
        for (i, t) in todo.iter_mut().enumerate().skip(5) {
            *t = (isix, buffer >> ((7 - i) * 10));
            isix += 1;
        }
        for (pos, val) in todo {
            if pos < npix {
                ctx.raw.data[pos] = (val & 0x3ff) as u16;
            }
        }
        if iten >= npix * 5 / 8 {
            break;
        }
    }
    ctx.desc.maximum = 0x3ff;
    Ok(())
}

/// Nokia / OmniVision: five bytes carry four 10-bit samples; the
/// CFA phase is probed from the data itself.
pub(crate) fn nokia_load_raw(ctx: &mut FileContext) -> Result<()> {
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let rev = 3 * usize::from(ctx.stream.endian() == crate::container::Endian::Little);
    let dwide = (raw_width * 5 + 1) / 4;
    let mut corrupt = 0_u32;
    let mut data = vec![0_u8; dwide * 2];
    for row in 0..raw_height {
        let (src, dst) = data.split_at_mut(dwide);
        let _ = src;
        if ctx.stream.read_some(dst)? < dwide {
            corrupt += 1;
        }
        for c in 0..dwide {
            data[c] = data[dwide + (c ^ rev)];
        }
        let mut col = 0_usize;
        let mut dp = 0_usize;
        while col < raw_width {
            for c in 0..4 {
                if col + c < raw_width {
                    ctx.raw.data[row * raw_width + col + c] = ((data[dp + c] as u16) << 2)
                        | ((data[dp + 4] as u16) >> (c << 1) & 3);
                }
            }
            dp += 5;
            col += 4;
        }
    }
    ctx.desc.maximum = 0x3ff;
    ctx.derror_count(corrupt);

    // OmniVision: probe whether the pattern is offset by one row.
    if ctx.desc.make == "OmniVision" && raw_height > 2 {
        let row = raw_height / 2;
        let mut sum = [0.0_f64; 2];
        for c in 0..ctx.desc.width as usize - 1 {
            let a = ctx.raw.data[row * raw_width + c] as f64
                - ctx.raw.data[(row + 1) * raw_width + c + 1] as f64;
            let b = ctx.raw.data[(row + 1) * raw_width + c] as f64
                - ctx.raw.data[row * raw_width + c + 1] as f64;
            sum[c & 1] += a * a;
            sum[!c & 1] += b * b;
        }
        if sum[1] > sum[0] {
            ctx.desc.cfa = crate::mosaic::CfaPattern::Bayer(crate::mosaic::BAYER_GBRG);
        }
    }
    Ok(())
}

/// Sinar four-shot backs: one sub-exposure per shot offset, or the
/// selected shot alone when a mosaic plane is wanted.
pub(crate) fn sinar_4shot_load_raw(ctx: &mut FileContext) -> Result<()> {
    let data_offset = ctx.desc.data_offset;
    if ctx.desc.cfa.is_mosaic() {
        let shot = ctx.params.shot_select.clamp(0, 3) as u64;
        ctx.stream.seek(SeekFrom::Start(data_offset + shot * 4))?;
        let off = ctx.stream.read_u32()? as u64;
        ctx.stream.seek(SeekFrom::Start(off))?;
        return crate::standard::unpacked_load_raw(ctx, true);
    }
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let width = ctx.desc.width as usize;
    let height = ctx.desc.height as usize;
    let top = ctx.desc.top_margin as usize;
    let left = ctx.desc.left_margin as usize;
    let mut corrupt = 0_u32;
    for shot in 0..4_u64 {
        ctx.stream.seek(SeekFrom::Start(data_offset + shot * 4))?;
        let off = ctx.stream.read_u32()? as u64;
        ctx.stream.seek(SeekFrom::Start(off))?;
        for row in 0..raw_height {
            let pixel = match ctx.stream.read_u16_array(raw_width) {
                Ok(p) => p,
                Err(_) => {
                    corrupt += 1;
                    break;
                }
            };
            let r = match row.checked_sub(top + ((shot as usize >> 1) & 1)) {
                Some(r) if r < height => r,
                _ => continue,
            };
            for (col, v) in pixel.iter().enumerate() {
                let c = match col.checked_sub(left + (shot as usize & 1)) {
                    Some(c) if c < width => c,
                    _ => continue,
                };
                let ch = ((row & 1) * 3) ^ (!col & 1);
                ctx.image.data[(r * width + c) * 4 + ch] = *v;
            }
        }
    }
    ctx.derror_count(corrupt);
    Ok(())
}

/// Leaf HDR: per-sample tiled planes; mosaic backs keep only the
/// selected shot.
pub(crate) fn leaf_hdr_load_raw(ctx: &mut FileContext) -> Result<()> {
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let width = ctx.desc.width as usize;
    let height = ctx.desc.height as usize;
    let top = ctx.desc.top_margin as usize;
    let left = ctx.desc.left_margin as usize;
    let tile_length = ctx.desc.tile_length.max(1) as usize;
    let samples = ctx.desc.tiff_samples.max(1) as usize;
    let mosaic = ctx.desc.cfa.is_mosaic();
    let data_offset = ctx.desc.data_offset;
    let mut corrupt = 0_u32;
    let mut tile = 0_u64;
    for c in 0..samples {
        for r in 0..raw_height {
            if r % tile_length == 0 {
                ctx.stream
                    .seek(SeekFrom::Start(data_offset + 4 * tile))?;
                tile += 1;
                let off = ctx.stream.read_u32()? as u64;
                ctx.stream.seek(SeekFrom::Start(off))?;
            }
            if mosaic && c != ctx.params.shot_select as usize {
                continue;
            }
            let pixel = match ctx.stream.read_u16_array(raw_width) {
                Ok(p) => p,
                Err(_) => {
                    corrupt += 1;
                    break;
                }
            };
            if mosaic {
                for (col, v) in pixel.iter().enumerate() {
                    ctx.raw.data[r * raw_width + col] = *v;
                }
            } else if r >= top && r - top < height {
                let row = r - top;
                for col in 0..width {
                    ctx.image.data[(row * width + col) * 4 + c] = pixel[col + left];
                }
            }
        }
    }
    if !mosaic {
        ctx.desc.maximum = 0xffff;
    }
    ctx.derror_count(corrupt);
    Ok(())
}

/// Imacon Ixpress full frame, already three colours per pixel.
pub(crate) fn imacon_full_load_raw(ctx: &mut FileContext) -> Result<()> {
    let width = ctx.desc.width as usize;
    let height = ctx.desc.height as usize;
    let mut corrupt = 0_u32;
    for row in 0..height {
        for col in 0..width {
            for c in 0..3 {
                match ctx.stream.read_u16() {
                    Ok(v) => ctx.image.data[(row * width + col) * 4 + c] = v,
                    Err(_) => corrupt += 1,
                }
            }
        }
    }
    ctx.derror_count(corrupt);
    Ok(())
}
