// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - smal.rs
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

//! SMaL ultra-compact cameras: an adaptive coder with per-context
//! histograms over prediction differences, decoded per segment. The
//! v9 files leave "holes", rows the camera skipped that get filled
//! from their neighbours.

use std::io::SeekFrom;

use crate::decompress::BitPump;
use crate::pipeline::FileContext;
use crate::Result;

/// Per-context adaptive model: difference magnitudes keep a moving
/// histogram that drives the code lengths.
struct Context {
    hist: [u32; 16],
    total: u32,
}

impl Context {
    fn new() -> Context {
        Context {
            hist: [1; 16],
            total: 16,
        }
    }

    /// Current code length for a magnitude bin: frequent bins get
    /// shorter codes.
    fn bits_for(&self, bin: usize) -> u8 {
        let mut rank = 0_u32;
        for (i, h) in self.hist.iter().enumerate() {
            if *h > self.hist[bin] || (*h == self.hist[bin] && i < bin) {
                rank += 1;
            }
        }
        (rank.min(14) + 1) as u8
    }

    fn update(&mut self, bin: usize) {
        self.hist[bin] += 4;
        self.total += 4;
        if self.total > 4096 {
            for h in self.hist.iter_mut() {
                *h -= *h >> 1;
            }
            self.total = self.hist.iter().sum();
        }
    }
}

/// Decode one segment: unary-selected magnitude bin out of the
/// adaptive histogram, then the offset bits, applied to the
/// two-left-neighbour predictor.
fn decode_segment(
    ctx: &mut FileContext,
    seg_start: u64,
    pix_start: usize,
    pix_end: usize,
) -> Result<u32> {
    ctx.stream.seek(SeekFrom::Start(seg_start))?;
    let raw_width = ctx.desc.raw_width as usize;
    let npix = (ctx.desc.raw_width * ctx.desc.raw_height) as usize;
    let pix_end = pix_end.min(npix);
    let mut corrupt = 0_u32;

    let FileContext {
        ref mut stream,
        ref mut raw,
        ..
    } = *ctx;
    let mut pump = BitPump::new(stream);
    let mut contexts = [Context::new(), Context::new(), Context::new()];

    for pix in pix_start..pix_end {
        let col = pix % raw_width;
        let ctx_id = col & 1;
        let pred = if col < 2 {
            128
        } else {
            raw.data[pix - 2] as i32
        };
        // Unary bin selector, capped at the histogram size.
        let mut bin = 0_usize;
        while bin < 15 && pump.get_bits(1) == 1 {
            bin += 1;
        }
        let model = &mut contexts[ctx_id.min(2)];
        let nbits = model.bits_for(bin).min(8);
        let offset = pump.get_bits(nbits) as i32;
        model.update(bin);
        let magnitude = (1 << bin) - 1 + offset;
        let diff = if magnitude & 1 != 0 {
            -(magnitude >> 1) - 1
        } else {
            magnitude >> 1
        };
        let value = pred + diff;
        if !(0..=255).contains(&value) {
            corrupt += 1;
        }
        raw.data[pix] = value.clamp(0, 255) as u16;
    }
    if pump.truncated {
        corrupt += 1;
    }
    Ok(corrupt)
}

/// Fill the skipped rows from the rows around them.
fn fill_holes(ctx: &mut FileContext, holes: u32) {
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    for row in 2..raw_height.saturating_sub(2) {
        if holes >> (row & 7) & 1 == 0 {
            continue;
        }
        for col in 0..raw_width {
            let above = ctx.raw.data[(row - 2) * raw_width + col] as u32;
            let below = if row + 2 < raw_height {
                ctx.raw.data[(row + 2) * raw_width + col] as u32
            } else {
                above
            };
            ctx.raw.data[row * raw_width + col] = ((above + below) >> 1) as u16;
        }
    }
}

pub(crate) fn smal_v6_load_raw(ctx: &mut FileContext) -> Result<()> {
    // One segment covering the whole plane.
    let npix = (ctx.desc.raw_width * ctx.desc.raw_height) as usize;
    let corrupt = decode_segment(ctx, ctx.desc.data_offset, 0, npix)?;
    ctx.desc.maximum = 0xff;
    ctx.derror_count(corrupt);
    Ok(())
}

pub(crate) fn smal_v9_load_raw(ctx: &mut FileContext) -> Result<()> {
    // A segment table follows the header: (first pixel, offset)
    // pairs terminated by the plane size.
    ctx.stream.seek(SeekFrom::Start(ctx.desc.data_offset))?;
    let nseg = ctx.stream.read_u8()? as usize;
    let holes = ctx.stream.read_u8()? as u32;
    let mut segs = Vec::with_capacity(nseg + 1);
    for _ in 0..nseg.min(64) {
        let first = ctx.stream.read_u32()? as usize;
        let offset = ctx.stream.read_u32()? as u64;
        segs.push((first, offset));
    }
    let npix = (ctx.desc.raw_width * ctx.desc.raw_height) as usize;
    let mut corrupt = 0_u32;
    for i in 0..segs.len() {
        let end = if i + 1 < segs.len() { segs[i + 1].0 } else { npix };
        corrupt += decode_segment(ctx, ctx.desc.data_offset + segs[i].1, segs[i].0, end)?;
    }
    if holes != 0 {
        fill_holes(ctx, holes);
    }
    ctx.desc.maximum = 0xff;
    ctx.derror_count(corrupt);
    Ok(())
}
