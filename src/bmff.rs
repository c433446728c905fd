// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - bmff.rs
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

//! Minimal ISO base-media walking for CR3 and QuickTime wrapped
//! raws: `ftyp` -> `moov` -> `trak` -> `mdia` -> `stbl`, plus the
//! Canon `CMT1`/`CMT3` TIFF blobs inside `uuid` boxes.

use std::io::SeekFrom;

use crate::camera::{Decoder, ExternalCodec};
use crate::container::Endian;
use crate::pipeline::FileContext;
use crate::Result;

struct Boxed {
    kind: [u8; 4],
    start: u64,
    size: u64,
}

/// Iterate boxes in `start..end`; the closure decides descent.
fn walk_boxes(
    ctx: &mut FileContext,
    start: u64,
    end: u64,
    visit: &mut dyn FnMut(&mut FileContext, &Boxed) -> Result<()>,
) -> Result<()> {
    let mut pos = start;
    while pos + 8 <= end {
        ctx.stream.seek(SeekFrom::Start(pos))?;
        let mut size = ctx.stream.read_u32()? as u64;
        let mut kind = [0_u8; 4];
        ctx.stream.read_exact(&mut kind)?;
        let mut header = 8_u64;
        if size == 1 {
            // 64-bit size.
            let hi = ctx.stream.read_u32()? as u64;
            let lo = ctx.stream.read_u32()? as u64;
            size = hi << 32 | lo;
            header = 16;
        } else if size == 0 {
            size = end - pos;
        }
        if size < header || pos + size > end {
            break;
        }
        visit(
            ctx,
            &Boxed {
                kind,
                start: pos + header,
                size: size - header,
            },
        )?;
        pos += size;
    }
    Ok(())
}

/// Parse a CR3 or QuickTime wrapped raw. The sensor payload itself
/// needs the external CRX codec; geometry and metadata come from the
/// embedded TIFF directories.
pub(crate) fn parse_bmff(ctx: &mut FileContext) -> Result<()> {
    ctx.stream.set_endian(Endian::Big);
    let file_end = ctx.stream.len()?;

    fn descend(ctx: &mut FileContext, b: &Boxed) -> Result<()> {
        match &b.kind {
            b"moov" | b"trak" | b"mdia" | b"minf" | b"stbl" => {
                let (start, end) = (b.start, b.start + b.size);
                walk_boxes(ctx, start, end, &mut descend)?;
            }
            b"uuid" => {
                // Canon stores the CMT TIFF blobs behind a 16-byte
                // uuid.
                let (start, end) = (b.start + 16, b.start + b.size);
                if end > start {
                    walk_boxes(ctx, start, end, &mut descend)?;
                }
            }
            b"CMT1" | b"CMT2" => {
                let saved = ctx.stream.endian();
                crate::tiff::parse::parse_tiff(ctx, b.start)?;
                ctx.stream.set_endian(saved);
            }
            b"stsz" => {
                ctx.stream.seek(SeekFrom::Start(b.start + 4))?;
                let fixed = ctx.stream.read_u32()? as u64;
                let count = ctx.stream.read_u32()?;
                if fixed != 0 {
                    ctx.tile_sizes = vec![fixed; count.min(64) as usize];
                } else {
                    ctx.tile_sizes.clear();
                    for _ in 0..count.min(64) {
                        let s = ctx.stream.read_u32()? as u64;
                        ctx.tile_sizes.push(s);
                    }
                }
            }
            b"co64" | b"stco" => {
                ctx.stream.seek(SeekFrom::Start(b.start + 4))?;
                let count = ctx.stream.read_u32()?;
                ctx.tile_offsets.clear();
                for _ in 0..count.min(64) {
                    let off = if &b.kind == b"co64" {
                        let hi = ctx.stream.read_u32()? as u64;
                        let lo = ctx.stream.read_u32()? as u64;
                        hi << 32 | lo
                    } else {
                        ctx.stream.read_u32()? as u64
                    };
                    ctx.tile_offsets.push(off);
                }
                // The biggest chunk is the sensor payload.
                if let Some(off) = ctx.tile_offsets.last() {
                    if ctx.desc.data_offset == 0 {
                        ctx.desc.data_offset = *off;
                    }
                }
            }
            _ => (),
        }
        Ok(())
    }
    walk_boxes(ctx, 0, file_end, &mut descend)?;

    if ctx.desc.make.is_empty() {
        ctx.desc.make = "Canon".to_string();
    }
    ctx.desc.decoder = Decoder::External(ExternalCodec::Crx);
    ctx.desc.is_raw = 1;
    Ok(())
}
