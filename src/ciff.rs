// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - ciff.rs
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

//! Legacy Canon CIFF: self-describing blocks located from a trailing
//! offset, recursing into sub-tables. Recursion past 127 levels is a
//! structural failure that abandons the file.

use std::io::SeekFrom;

use crate::camera::Decoder;
use crate::pipeline::FileContext;
use crate::utils::from_maybe_nul_terminated;
use crate::{Error, Result};

pub(crate) fn parse_ciff(
    ctx: &mut FileContext,
    offset: u64,
    length: u64,
    depth: u32,
) -> Result<()> {
    ctx.stream
        .seek(SeekFrom::Start(offset + length - 4))?;
    let tboff = ctx.stream.read_u32()? as u64 + offset;
    ctx.stream.seek(SeekFrom::Start(tboff))?;
    let nrecs = ctx.stream.read_u16()? as u32;
    if (nrecs | depth) > 127 {
        return Err(Error::FormatError("CIFF: too deep".to_string()));
    }

    let mut wbi = 0_i32;
    for rec in 0..nrecs {
        ctx.stream.seek(SeekFrom::Start(tboff + 2 + rec as u64 * 10))?;
        let type_ = ctx.stream.read_u16()?;
        let len = ctx.stream.read_u32()? as u64;
        let value_offset = ctx.stream.read_u32()? as u64;
        // In-record values use the offset field directly.
        if type_ & 0x4000 == 0 {
            ctx.stream
                .seek(SeekFrom::Start(offset + value_offset))?;
        } else {
            ctx.stream
                .seek(SeekFrom::Start(tboff + 2 + rec as u64 * 10 + 4))?;
        }
        match type_ {
            t if (((t >> 8) + 8) | 8) == 0x38 => {
                // A sub-table.
                let sub = ctx.stream.position()?;
                parse_ciff(ctx, sub, len, depth + 1)?;
            }
            0x080a => {
                let mut buf = [0_u8; 64];
                ctx.stream.read_exact(&mut buf)?;
                ctx.desc.make = from_maybe_nul_terminated(&buf);
                ctx.stream.seek(SeekFrom::Current(
                    ctx.desc.make.len() as i64 - 63,
                ))?;
                let mut buf = [0_u8; 64];
                let _ = ctx.stream.read_some(&mut buf)?;
                ctx.desc.model = from_maybe_nul_terminated(&buf);
            }
            0x1810 => {
                ctx.desc.width = ctx.stream.read_u32()?;
                ctx.desc.height = ctx.stream.read_u32()?;
                let aspect = f32::from_bits(ctx.stream.read_u32()?);
                if aspect.is_finite() && aspect > 0.0 {
                    ctx.desc.pixel_aspect = aspect as f64;
                }
                ctx.desc.flip = ctx.stream.read_u32()? as u16;
            }
            // The decoder table selector.
            0x1835 => {
                ctx.desc.compression = ctx.stream.read_u32()? as u16;
            }
            0x102a => {
                ctx.stream.read_u32()?;
                let iso = ctx.stream.read_u16()? as f64;
                ctx.desc.iso_speed = (2.0_f64.powf(iso / 32.0 - 4.0) * 50.0) as f32;
                ctx.stream.read_u16()?;
                let ap = ctx.stream.read_u16()? as i16 as f64;
                ctx.desc.aperture = 2.0_f64.powf(ap / 64.0) as f32;
                let sh = ctx.stream.read_u16()? as i16 as f64;
                ctx.desc.shutter = 2.0_f64.powf(-sh / 32.0) as f32;
                ctx.stream.read_u16()?;
                wbi = ctx.stream.read_u16()? as i32;
                if wbi > 17 {
                    wbi = 0;
                }
            }
            0x102c => {
                if ctx.stream.read_u16()? > 512 {
                    // Pro90, G1.
                    ctx.stream.seek(SeekFrom::Current(118))?;
                    for c in 0..4_usize {
                        ctx.desc.cam_mul[c ^ 2] = ctx.stream.read_u16()? as f32;
                    }
                } else {
                    // G2, S30, S40.
                    ctx.stream.seek(SeekFrom::Current(98))?;
                    for c in 0..4_usize {
                        ctx.desc.cam_mul[c ^ (c >> 1) ^ 1] = ctx.stream.read_u16()? as f32;
                    }
                }
            }
            0x0032 if len == 768 => {
                // EOS D30.
                ctx.stream.seek(SeekFrom::Current(72))?;
                for c in 0..4_usize {
                    let v = ctx.stream.read_u16()?;
                    if v != 0 {
                        ctx.desc.cam_mul[c ^ (c >> 1)] = 1024.0 / v as f32;
                    }
                }
                if wbi == 0 {
                    ctx.desc.cam_mul[0] = -1.0;
                }
            }
            0x10a9 => {
                // D60, 10D, 300D and clones.
                let mut index = wbi;
                if len > 66 {
                    index = [0, 1, 3, 4, 5, 6, 7, 0, 2, 8][wbi.clamp(0, 9) as usize];
                }
                ctx.stream.seek(SeekFrom::Current(2 + index as i64 * 8))?;
                for c in 0..4_usize {
                    ctx.desc.cam_mul[c ^ (c >> 1)] = ctx.stream.read_u16()? as f32;
                }
            }
            0x180e => {
                ctx.desc.timestamp = ctx.stream.read_u32()? as i64;
            }
            0x580e => ctx.desc.timestamp = len as i64,
            0x5817 => ctx.desc.shot_order = len as u32,
            0x5834 => ctx.desc.unique_id = len as u32,
            _ => (),
        }
    }

    if depth == 0 {
        ctx.desc.decoder = Decoder::CanonCompressed;
        ctx.desc.bits_per_sample = 10;
        ctx.desc.maximum = 0x3ff;
        // The compressed plane spans the full sensor.
        ctx.desc.raw_width = ctx.desc.width;
        ctx.desc.raw_height = ctx.desc.height;
    }
    Ok(())
}
