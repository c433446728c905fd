// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - fujifilm.rs
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

//! Fujifilm RAF: the dual-offset header, the vendor table with the
//! X-Trans pattern, and the diagonal-sensor loader.

use std::io::SeekFrom;

use crate::bitmap::ImageBuffer;
use crate::camera::Decoder;
use crate::container::Endian;
use crate::mosaic::CfaPattern;
use crate::pipeline::FileContext;
use crate::Result;

pub(crate) const RAF_MAGIC: &[u8] = b"FUJIFILMCCD-RAW ";

/// Parse the vendor table pointed at by the RAF header.
pub(crate) fn parse_fuji(ctx: &mut FileContext, offset: u32) -> Result<()> {
    ctx.stream.seek(SeekFrom::Start(offset as u64))?;
    ctx.stream.set_endian(Endian::Big);
    let entries = ctx.stream.read_u32()?;
    if entries > 255 {
        return Ok(());
    }
    let mut fuji_width_flag = false;
    for _ in 0..entries {
        let tag = ctx.stream.read_u16()?;
        let len = ctx.stream.read_u16()?;
        let save = ctx.stream.position()?;
        match tag {
            0x100 => {
                ctx.desc.raw_height = ctx.stream.read_u16()? as u32;
                ctx.desc.raw_width = ctx.stream.read_u16()? as u32;
            }
            0x121 => {
                ctx.desc.height = ctx.stream.read_u16()? as u32;
                let mut width = ctx.stream.read_u16()? as u32;
                if width == 4284 {
                    width += 3;
                }
                ctx.desc.width = width;
            }
            0x130 => {
                let b0 = ctx.stream.read_u8()?;
                let b1 = ctx.stream.read_u8()?;
                ctx.desc.fuji_layout = (b0 >> 7) as u32;
                fuji_width_flag = b1 & 8 == 0;
            }
            0x131 => {
                // The 6x6 X-Trans pattern, stored in reverse order.
                let mut xtrans = [[0_u8; 6]; 6];
                for i in (0..36).rev() {
                    let v = ctx.stream.read_u8()? & 3;
                    xtrans[i / 6][i % 6] = v;
                }
                ctx.desc.cfa = CfaPattern::XTrans(xtrans);
            }
            0x2ff0 => {
                for c in 0..4 {
                    ctx.desc.cam_mul[c ^ 1] = ctx.stream.read_u16()? as f32;
                }
            }
            0xc000 => {
                let mut scoped = ctx.stream.scoped_endian(Endian::Little);
                let mut tag = scoped.read_u32()?;
                while tag > ctx.desc.raw_width.max(1) {
                    tag = scoped.read_u32()?;
                }
                if tag > 0 {
                    ctx.desc.width = tag;
                    ctx.desc.height = scoped.read_u32()?;
                }
            }
            _ => (),
        }
        ctx.stream.seek(SeekFrom::Start(save + len as u64))?;
    }
    if fuji_width_flag {
        ctx.desc.fuji_width = 1;
    }
    ctx.desc.height <<= ctx.desc.fuji_layout;
    ctx.desc.width >>= ctx.desc.fuji_layout;
    Ok(())
}

/// Final geometry for the diagonal sensors: the diamond grid is
/// re-expressed as a Bayer plane.
pub(crate) fn fuji_finalize_geometry(ctx: &mut FileContext) {
    if ctx.desc.fuji_width == 0 {
        return;
    }
    let layout = ctx.desc.fuji_layout;
    ctx.desc.fuji_width = ctx.desc.width >> u32::from(layout == 0);
    let fuji_width = ctx.desc.fuji_width;
    ctx.desc.cfa = CfaPattern::Bayer(if fuji_width & 1 != 0 {
        crate::mosaic::BAYER_RGGB
    } else {
        crate::mosaic::BAYER_GBRG
    });
    ctx.desc.width = (ctx.desc.height >> layout) + fuji_width;
    ctx.desc.height = ctx.desc.width - 1;
    ctx.desc.pixel_aspect = 1.0;
    ctx.desc.decoder = Decoder::Fuji;
}

/// Unpack the diagonal sensor into the diamond grid.
pub(crate) fn fuji_load_raw(ctx: &mut FileContext) -> Result<()> {
    let raw_width = ctx.desc.raw_width as usize;
    let layout = ctx.desc.fuji_layout as usize;
    let fuji_width = ctx.desc.fuji_width as usize;
    let width = ctx.desc.width as usize;
    let height = ctx.desc.height as usize;
    let wide = fuji_width << usize::from(layout == 0);
    let mut corrupt = 0_u32;

    // The plane allocated from the physical geometry is replaced by
    // the diamond-sized one; margins are consumed here.
    let mut plane = ImageBuffer::<u16>::new(width as u32, height as u32, 16, 1)?;
    ctx.stream.seek(SeekFrom::Current(
        (ctx.desc.top_margin as i64 * raw_width as i64 + ctx.desc.left_margin as i64) * 2,
    ))?;
    for row in 0..ctx.desc.raw_height as usize {
        let pixel = match ctx.stream.read_u16_array(wide) {
            Ok(p) => p,
            Err(_) => {
                corrupt += 1;
                break;
            }
        };
        ctx.stream
            .seek(SeekFrom::Current((raw_width - wide) as i64 * 2))?;
        for (col, v) in pixel.iter().enumerate() {
            let (r, c) = if layout != 0 {
                (
                    fuji_width as i64 - 1 - col as i64 + (row as i64 >> 1),
                    col as i64 + ((row as i64 + 1) >> 1),
                )
            } else {
                (
                    fuji_width as i64 - 1 + row as i64 - (col as i64 >> 1),
                    row as i64 + ((col as i64 + 1) >> 1),
                )
            };
            if r >= 0 && (r as usize) < height && c >= 0 && (c as usize) < width {
                plane.data[r as usize * width + c as usize] = *v;
            }
        }
    }
    ctx.raw = plane;
    ctx.desc.raw_width = width as u32;
    ctx.desc.raw_height = height as u32;
    ctx.desc.top_margin = 0;
    ctx.desc.left_margin = 0;
    ctx.derror_count(corrupt);
    Ok(())
}
