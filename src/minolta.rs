// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - minolta.rs
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

//! Minolta MRW blocks and the RD175 legacy codec.

use std::io::SeekFrom;

use crate::container::Endian;
use crate::pipeline::FileContext;
use crate::Result;

/// Walk the MRM block list: PRD carries the geometry, WBG the white
/// balance, TTW wraps a TIFF with the rest of the metadata.
pub(crate) fn parse_minolta(ctx: &mut FileContext, base: u64) -> Result<()> {
    ctx.stream.seek(SeekFrom::Start(base))?;
    let mut magic = [0_u8; 4];
    ctx.stream.read_exact(&mut magic)?;
    if magic[0] != 0 || magic[1] != b'M' || magic[2] != b'R' {
        return Err(crate::Error::InvalidFormat);
    }
    let endian = if magic[3] == b'M' {
        Endian::Big
    } else {
        Endian::Little
    };
    let saved = ctx.stream.endian();
    ctx.stream.set_endian(endian);
    let offset = base + ctx.stream.read_u32()? as u64 + 8;

    loop {
        let save = ctx.stream.position()?;
        if save >= offset {
            break;
        }
        let mut tag = [0_u8; 4];
        if ctx.stream.read_exact(&mut tag).is_err() {
            break;
        }
        let len = ctx.stream.read_u32()? as u64;
        match &tag[1..4] {
            b"PRD" => {
                ctx.stream.seek(SeekFrom::Current(8))?;
                ctx.desc.raw_height = ctx.stream.read_u16()? as u32;
                ctx.desc.raw_width = ctx.stream.read_u16()? as u32;
            }
            b"WBG" => {
                ctx.stream.read_u32()?;
                let i = usize::from(ctx.desc.model == "DiMAGE A200") * 3;
                for c in 0..4_usize {
                    let v = ctx.stream.read_u16()? as f32;
                    ctx.desc.cam_mul[c ^ (c >> 1) ^ i] = v;
                }
            }
            b"TTW" => {
                let tiff_at = ctx.stream.position()?;
                crate::tiff::parse::parse_tiff(ctx, tiff_at)?;
                ctx.desc.data_offset = offset;
            }
            _ => (),
        }
        ctx.stream.seek(SeekFrom::Start(save + len + 8))?;
    }
    ctx.stream.set_endian(saved);
    Ok(())
}

/// RD175: 768-byte segments shuffled into rows, one-bit gain.
pub(crate) fn rd175_load_raw(ctx: &mut FileContext) -> Result<()> {
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let mut corrupt = 0_u32;
    let mut pixel = [0_u8; 768];
    for irow in 0..1481_usize {
        if ctx.stream.read_some(&mut pixel)? < 768 {
            corrupt += 1;
        }
        let box_ = irow / 82;
        let mut row = irow % 82 * 12
            + if box_ < 12 {
                box_ | 1
            } else {
                (box_ - 12) * 2
            };
        match irow {
            1477 | 1479 => continue,
            1476 => row = 984,
            1480 => row = 985,
            _ => (),
        }
        if row >= raw_height {
            continue;
        }
        for (col, p) in pixel.iter().enumerate().take(raw_width) {
            ctx.raw.data[row * raw_width + col] = (*p as u16) << 1;
        }
    }
    ctx.desc.maximum = 0xff << 1;
    ctx.derror_count(corrupt);
    Ok(())
}
