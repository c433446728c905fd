// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - tiff/makernote.rs
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

//! Maker notes: the signature switch selecting the header layout,
//! then per-vendor tag extraction. Sub-directory offsets may be
//! relative to the note start and the byte order may differ from the
//! host file; both are restored on every exit path.

use std::io::SeekFrom;

use log::debug;

use crate::container::Endian;
use crate::pipeline::FileContext;
use crate::tiff::Dir;
use crate::Result;

/// Identify the maker note layout and dispatch. `offset` is the
/// absolute position of the note, `_len` its byte count.
pub(crate) fn parse_makernote(ctx: &mut FileContext, offset: u64, _len: u64) -> Result<()> {
    let mut sig = [0_u8; 16];
    ctx.stream.seek(SeekFrom::Start(offset))?;
    let got = ctx.stream.read_some(&mut sig)?;
    if got < 10 {
        return Ok(());
    }

    let saved_endian = ctx.stream.endian();
    // (ifd offset relative to base, base for value offsets, endian
    // override). A base of 0 means the note stores absolute offsets.
    let (ifd_offset, base, endian): (u64, u64, Option<Endian>) = if sig.starts_with(b"Nikon\0\x02")
    {
        // Own TIFF header after 10 bytes.
        ctx.stream.seek(SeekFrom::Start(offset + 10))?;
        let mut magic = [0_u8; 2];
        ctx.stream.read_exact(&mut magic)?;
        let endian = Endian::from_magic(&magic);
        ctx.stream.seek(SeekFrom::Start(offset + 12))?;
        if let Some(e) = endian {
            ctx.stream.set_endian(e);
        }
        let _fortytwo = ctx.stream.read_u16()?;
        let first = ctx.stream.read_u32()? as u64;
        (first, offset + 10, endian)
    } else if sig.starts_with(b"OLYMPUS\0") {
        // Table at +12, offsets relative to the note.
        (12, offset, None)
    } else if sig.starts_with(b"OLYMP\0") || sig.starts_with(b"EPSON\0") {
        // Table at +8, offsets file-relative.
        (offset + 8, 0, None)
    } else if sig.starts_with(b"AOC\0") || sig.starts_with(b"QVC\0") {
        (offset + 6, 0, None)
    } else if sig.starts_with(b"PENTAX \0") {
        (10, offset, None)
    } else if sig.starts_with(b"FUJIFILM") {
        (12, offset, Some(Endian::Little))
    } else if sig.starts_with(b"SONY") || sig.starts_with(b"Panasonic\0") {
        (offset + 12, 0, None)
    } else if sig.starts_with(b"LEICA") || sig.starts_with(b"Ricoh") {
        (offset + 8, 0, None)
    } else {
        // Bare IFD at the note start, absolute offsets.
        (offset, 0, None)
    };

    if let Some(e) = endian {
        ctx.stream.set_endian(e);
    }
    let result = dispatch(ctx, base, ifd_offset as u32);
    ctx.stream.set_endian(saved_endian);
    result
}

fn dispatch(ctx: &mut FileContext, base: u64, ifd_offset: u32) -> Result<()> {
    let dir = match Dir::read(&mut ctx.stream, base, ifd_offset) {
        Ok(dir) => dir,
        Err(err) => {
            debug!("{}: unreadable maker note: {}", ctx.input, err);
            return Ok(());
        }
    };
    if dir.num_entries() == 0 || dir.num_entries() > 1000 {
        return Ok(());
    }

    let make = ctx.desc.make.to_ascii_uppercase();
    if make.starts_with("NIKON") {
        crate::nikon::parse_makernote(ctx, &dir);
    } else if make.starts_with("CANON") {
        crate::canon::parse_makernote(ctx, &dir);
    } else if make.starts_with("OLYMPUS") || make.starts_with("EPSON") {
        crate::olympus::parse_makernote(ctx, &dir);
    } else if make.starts_with("PENTAX") || make.starts_with("ASAHI") || make.starts_with("RICOH")
    {
        crate::pentax::parse_makernote(ctx, &dir);
    } else if make.starts_with("SAMSUNG") {
        crate::samsung::parse_makernote(ctx, &dir);
    } else {
        generic_tags(ctx, &dir);
    }
    Ok(())
}

/// Tags several vendors share: as-shot multipliers and black level.
fn generic_tags(ctx: &mut FileContext, dir: &Dir) {
    if let Some(e) = dir.entry(0x000c) {
        for (c, v) in e.real_array().iter().take(4).enumerate() {
            if *v > 0.0 {
                ctx.desc.cam_mul[c ^ (c >> 1)] = *v as f32;
            }
        }
    }
}
