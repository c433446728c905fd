// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - identify.rs
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

//! Camera identification: magic dispatch to the container parsers,
//! the file-size fallback table for headerless formats, name
//! normalization, per-model fixups and colour matrix selection.

use std::io::SeekFrom;

use log::debug;

use crate::camera::Decoder;
use crate::colour::{self, matrix::builtin_matrix};
use crate::container::Endian;
use crate::mosaic::{CfaPattern, BAYER_BGGR, BAYER_GBRG, BAYER_GRBG, BAYER_RGGB};
use crate::pipeline::FileContext;
use crate::{ciff, fujifilm, minolta, phaseone, tiff, x3f};
use crate::{Error, Result};

/// Raw-only formats identified by exact payload length.
struct FileSizeEntry {
    fsize: u64,
    raw_width: u32,
    raw_height: u32,
    left: u32,
    top: u32,
    load_flags: u32,
    filters: u32,
    bps: u16,
    offset: u64,
    decoder: Decoder,
    make: &'static str,
    model: &'static str,
}

macro_rules! fs {
    ($fsize:expr, $w:expr, $h:expr, $lm:expr, $tm:expr, $lf:expr, $filters:expr,
     $bps:expr, $off:expr, $dec:expr, $make:expr, $model:expr) => {
        FileSizeEntry {
            fsize: $fsize,
            raw_width: $w,
            raw_height: $h,
            left: $lm,
            top: $tm,
            load_flags: $lf,
            filters: $filters,
            bps: $bps,
            offset: $off,
            decoder: $dec,
            make: $make,
            model: $model,
        }
    };
}

static FILE_SIZES: &[FileSizeEntry] = &[
    fs!(737280, 640, 480, 0, 0, 0, BAYER_GBRG, 8, 736, Decoder::Quicktake, "Apple", "QuickTake 100"),
    fs!(1228800, 640, 480, 0, 0, 0, BAYER_GBRG, 8, 736, Decoder::Quicktake, "Apple", "QuickTake 150"),
    fs!(686720, 896, 613, 0, 0, 0, 0xe1e4e1e4, 10, 0, Decoder::Canon600, "Canon", "PowerShot 600"),
    fs!(10134528, 2688, 1884, 0, 0, 0, BAYER_RGGB, 10, 0x54, Decoder::CanonRmf, "Canon", "EOS C500"),
    fs!(787456, 1024, 769, 0, 0, 0, 0x1e4e1e4e, 10, 0, Decoder::EightBit, "Canon", "PowerShot A5"),
    fs!(1138688, 1264, 902, 0, 0, 0, 0x1e4e1e4e, 10, 0, Decoder::EightBit, "Canon", "PowerShot A50"),
    fs!(1474560, 1552, 950, 0, 0, 0, 0x1e4b4e1b, 10, 0, Decoder::EightBit, "Canon", "PowerShot Pro70"),
    fs!(122880, 320, 240, 0, 0, 0, BAYER_RGGB, 8, 512, Decoder::EightBit, "Kodak", "DC20"),
    fs!(311696, 640, 480, 0, 0, 0, BAYER_RGGB, 8, 512, Decoder::EightBit, "Kodak", "DC25"),
    fs!(460800, 640, 480, 0, 0, 0, BAYER_RGGB, 8, 0, Decoder::KodakDc120, "Kodak", "DC40"),
    fs!(6166488, 2862, 2152, 0, 0, 0, BAYER_RGGB, 8, 0, Decoder::KodakDc120, "Kodak", "DC50"),
    fs!(1552896, 848, 610, 0, 0, 0, BAYER_GRBG, 8, 0, Decoder::KodakDc120, "Kodak", "DC120"),
    fs!(614400, 640, 480, 0, 0, 0, BAYER_GBRG, 8, 0, Decoder::EightBit, "Logitech", "Fotoman Pixtura"),
    fs!(1572864, 1024, 768, 0, 0, 0, BAYER_RGGB, 12, 0, Decoder::Unpacked { big_endian: true }, "Nikon", "E900"),
    fs!(2465792, 1638, 1204, 0, 0, 0, BAYER_RGGB, 12, 0, Decoder::Packed, "Nikon", "E950"),
    fs!(4771840, 2064, 1541, 0, 0, 0, BAYER_RGGB, 12, 0, Decoder::Packed, "Nikon", "E990"),
    fs!(9844736, 3034, 2433, 0, 0, 0, BAYER_RGGB, 10, 0, Decoder::Nokia, "Nokia", "N95"),
    fs!(2940928, 1616, 1213, 0, 0, 0, BAYER_BGGR, 10, 0, Decoder::Nokia, "Nokia", "N900"),
    fs!(1447680, 640, 480, 0, 0, 0, BAYER_RGGB, 8, 0, Decoder::SmalV6, "SMaL", "Ultra-Pocket"),
    fs!(1920000, 800, 600, 0, 0, 0, BAYER_RGGB, 8, 0, Decoder::SmalV9, "SMaL", "Ultra-Pocket v9"),
    fs!(1138736, 768, 986, 0, 0, 0, BAYER_GRBG, 9, 0, Decoder::MinoltaRd175, "Minolta", "RD175"),
    fs!(3840000, 1600, 1200, 0, 0, 0, BAYER_RGGB, 12, 0, Decoder::Unpacked { big_endian: true }, "Micron", "2010"),
    fs!(21645600, 4208, 3048, 30, 18, 0, BAYER_BGGR, 12, 0, Decoder::Packed, "Pentax", "Optio S4"),
    fs!(10702848, 3072, 2322, 0, 0, 0, BAYER_RGGB, 12, 0x1a00, Decoder::Packed, "Sony", "DSC-F828"),
];

lazy_static::lazy_static! {
    /// Exact-length lookup into `FILE_SIZES`.
    static ref SIZE_INDEX: std::collections::HashMap<u64, usize> = FILE_SIZES
        .iter()
        .enumerate()
        .map(|(i, e)| (e.fsize, i))
        .collect();
}

/// Identify the file and finalize the descriptor: A then B.
pub(crate) fn identify(ctx: &mut FileContext) -> Result<()> {
    let fsize = ctx.stream.len()?;
    let mut head = [0_u8; 32];
    ctx.stream.seek(SeekFrom::Start(0))?;
    let got = ctx.stream.read_some(&mut head)?;
    if got < 16 {
        return Err(Error::UnrecognizedFormat);
    }
    ctx.stream.seek(SeekFrom::Start(0))?;

    if &head[0..4] == b"\0MRM" {
        minolta::parse_minolta(ctx, 0)?;
        ctx.desc.cfa = CfaPattern::Bayer(BAYER_RGGB);
        crate::tiff::parse::apply_tiff(ctx)?;
    } else if &head[0..14] == b"II\x1a\0\0\0HEAPCCDR" {
        // The header length field counts past the block magic.
        ctx.stream.set_endian(Endian::Little);
        ciff::parse_ciff(ctx, 26, fsize - 26, 0)?;
    } else if got >= 12 && &head[4..12] == b"ftypcrx " {
        crate::bmff::parse_bmff(ctx)?;
    } else if got >= 12 && &head[4..8] == b"ftyp" {
        crate::bmff::parse_bmff(ctx)?;
    } else if &head[4..8] == b"RED1" || &head[4..8] == b"RED2" {
        parse_redcine(ctx)?;
    } else if &head[0..2] == b"CI" && head[3] == 0 {
        parse_cine(ctx)?;
    } else if &head[0..4] == b"RIFF" {
        parse_riff(ctx)?;
    } else if head.starts_with(fujifilm::RAF_MAGIC) {
        parse_raf(ctx)?;
    } else if &head[0..4] == b"IIII" || &head[0..4] == b"MMMM" {
        phaseone::parse_phase_one(ctx, 0)?;
        ctx.desc.cfa = CfaPattern::Bayer(BAYER_RGGB);
    } else if &head[0..4] == b"FOVb" {
        x3f::parse_x3f(ctx)?;
    } else if &head[0..9] == b"DSC-Image" {
        parse_rollei(ctx)?;
    } else if &head[0..8] == b"NOKIARAW" {
        parse_nokia(ctx)?;
    } else if &head[0..4] == b"ARRI" {
        parse_arri(ctx)?;
    } else if &head[0..4] == b"XPDS" {
        parse_xiaoyi(ctx)?;
    } else if &head[0..2] == b"II" || &head[0..2] == b"MM" {
        tiff::parse::parse_tiff(ctx, 0)?;
        tiff::parse::apply_tiff(ctx)?;
    } else if let Some(entry) = SIZE_INDEX.get(&fsize).map(|i| &FILE_SIZES[*i]) {
        apply_file_size_entry(ctx, entry);
    } else {
        return Err(Error::UnrecognizedFormat);
    }

    finalize(ctx)
}

fn apply_file_size_entry(ctx: &mut FileContext, entry: &FileSizeEntry) {
    ctx.desc.make = entry.make.to_string();
    ctx.desc.model = entry.model.to_string();
    ctx.desc.raw_width = entry.raw_width;
    ctx.desc.raw_height = entry.raw_height;
    ctx.desc.width = entry.raw_width - entry.left;
    ctx.desc.height = entry.raw_height - entry.top;
    ctx.desc.left_margin = entry.left;
    ctx.desc.top_margin = entry.top;
    ctx.desc.load_flags = entry.load_flags;
    ctx.desc.bits_per_sample = entry.bps;
    ctx.desc.maximum = (1 << entry.bps) - 1;
    ctx.desc.data_offset = entry.offset;
    ctx.desc.decoder = entry.decoder.clone();
    if entry.filters != 0 {
        ctx.desc.cfa = CfaPattern::Bayer(entry.filters);
        if entry.filters & 3 == 3 || entry.filters == 0xe1e4e1e4 || entry.filters == 0x1e4e1e4e {
            // CMYG class sensors carry four colours.
            ctx.desc.colors = 4;
        }
    }
    debug!("{}: matched by file size as {} {}", ctx.input, entry.make, entry.model);
}

/// RAF: fixed header offsets to an inner TIFF and the second shot.
fn parse_raf(ctx: &mut FileContext) -> Result<()> {
    ctx.stream.set_endian(Endian::Big);
    ctx.stream.seek(SeekFrom::Start(92))?;
    let table = ctx.stream.read_u32()?;
    fujifilm::parse_fuji(ctx, table)?;
    ctx.stream.seek(SeekFrom::Start(120))?;
    let second = ctx.stream.read_u32()?;
    if second != 0 {
        ctx.desc.is_raw += 1;
        if ctx.params.shot_select > 0 {
            fujifilm::parse_fuji(ctx, second)?;
        }
    }
    ctx.desc.decoder = Decoder::Unpacked { big_endian: false };
    ctx.stream
        .seek(SeekFrom::Start(100 + 28 * u64::from(ctx.params.shot_select > 0)))?;
    let data = ctx.stream.read_u32()? as u64;
    ctx.desc.data_offset = data;
    // The embedded TIFF carries Exif and the maker note.
    if tiff::parse::parse_tiff(ctx, data).is_err() {
        debug!("{}: RAF without inner TIFF", ctx.input);
    }
    ctx.tiff_ifds.clear();
    if ctx.desc.raw_width == 0 {
        return Err(Error::UnrecognizedFormat);
    }
    ctx.desc.bits_per_sample = if ctx.desc.maximum > 0xfff { 14 } else { 12 };
    if ctx.desc.maximum == 0 {
        ctx.desc.maximum = 0x3fff;
    }
    fujifilm::fuji_finalize_geometry(ctx);
    Ok(())
}

/// Red One REDCINE: geometry from the header, the payload itself is
/// wavelet-coded and needs the external JPEG 2000 codec.
fn parse_redcine(ctx: &mut FileContext) -> Result<()> {
    ctx.stream.set_endian(Endian::Big);
    ctx.stream.seek(SeekFrom::Start(52))?;
    ctx.desc.raw_width = ctx.stream.read_u32()?;
    ctx.desc.raw_height = ctx.stream.read_u32()?;
    ctx.desc.width = ctx.desc.raw_width;
    ctx.desc.height = ctx.desc.raw_height;
    ctx.desc.make = "Red".to_string();
    ctx.desc.model = "One".to_string();
    ctx.desc.bits_per_sample = 12;
    ctx.desc.cfa = CfaPattern::Bayer(BAYER_BGGR);
    ctx.desc.decoder = Decoder::External(crate::camera::ExternalCodec::Jpeg2000);
    Ok(())
}

/// Vision Research CINE: the bitmap header gives the geometry; the
/// sensor payload is plain packed rows per frame.
fn parse_cine(ctx: &mut FileContext) -> Result<()> {
    ctx.stream.set_endian(Endian::Little);
    ctx.stream.seek(SeekFrom::Start(4))?;
    let is_raw = ctx.stream.read_u16()? == 2;
    ctx.stream.seek(SeekFrom::Start(0x14))?;
    let image_count = ctx.stream.read_u32()?;
    ctx.stream.seek(SeekFrom::Start(0x20))?;
    let off_image_header = ctx.stream.read_u32()? as u64;
    let _off_setup = ctx.stream.read_u32()?;
    let off_image_offsets = ctx.stream.read_u32()? as u64;

    ctx.stream.seek(SeekFrom::Start(off_image_header + 4))?;
    ctx.desc.raw_width = ctx.stream.read_u32()?;
    ctx.desc.raw_height = ctx.stream.read_u32()?;
    ctx.stream.seek(SeekFrom::Start(off_image_header + 14))?;
    let bit_count = ctx.stream.read_u16()?;
    ctx.desc.width = ctx.desc.raw_width;
    ctx.desc.height = ctx.desc.raw_height;
    ctx.desc.bits_per_sample = if bit_count >= 8 { bit_count.min(16) } else { 10 };

    // The shot select picks the frame.
    let frame = ctx.params.shot_select.min(image_count.saturating_sub(1)) as u64;
    ctx.stream
        .seek(SeekFrom::Start(off_image_offsets + frame * 8))?;
    let lo = ctx.stream.read_u32()? as u64;
    let hi = ctx.stream.read_u32()? as u64;
    ctx.desc.data_offset = hi << 32 | lo;
    // Each frame starts with an annotation block.
    ctx.stream.seek(SeekFrom::Start(ctx.desc.data_offset))?;
    let annotation = ctx.stream.read_u32()? as u64;
    ctx.desc.data_offset += annotation;

    ctx.desc.make = "Vision Research".to_string();
    ctx.desc.model = "CINE".to_string();
    ctx.desc.is_raw = if is_raw { image_count.max(1) } else { 0 };
    ctx.desc.cfa = CfaPattern::Bayer(BAYER_GBRG);
    ctx.desc.decoder = Decoder::Packed;
    Ok(())
}

/// Legacy Nikon video RIFF. Only the clock is in there; there is no
/// raw payload to decode.
fn parse_riff(ctx: &mut FileContext) -> Result<()> {
    ctx.stream.set_endian(Endian::Little);
    ctx.desc.is_raw = 0;
    let end = ctx.stream.len()?.min(0x10000);
    let mut pos = 12_u64;
    while pos + 8 < end {
        ctx.stream.seek(SeekFrom::Start(pos))?;
        let mut tag = [0_u8; 4];
        ctx.stream.read_exact(&mut tag)?;
        let size = ctx.stream.read_u32()? as u64;
        if &tag == b"IDIT" && size < 64 {
            let data = ctx.stream.read_vec(size as usize)?;
            let text = crate::utils::from_maybe_nul_terminated(&data);
            debug!("{}: RIFF timestamp {}", ctx.input, text);
        }
        pos += 8 + size + (size & 1);
    }
    Ok(())
}

/// Rollei text header.
fn parse_rollei(ctx: &mut FileContext) -> Result<()> {
    ctx.stream.seek(SeekFrom::Start(0))?;
    let read_len = 1024.min(ctx.stream.len()? as usize);
    let header = ctx.stream.read_vec(read_len)?;
    let mut hdr = 0_u64;
    let mut tw = 0_u64;
    let mut th = 0_u64;
    for line in header.split(|b| *b == b'\n') {
        let line = String::from_utf8_lossy(line);
        let (key, val) = match line.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        match key.trim() {
            "HDR" => hdr = val.trim().parse().unwrap_or(0),
            "X" => ctx.desc.raw_width = val.trim().parse().unwrap_or(0),
            "Y" => ctx.desc.raw_height = val.trim().parse().unwrap_or(0),
            "TX" => tw = val.trim().parse().unwrap_or(0),
            "TY" => th = val.trim().parse().unwrap_or(0),
            _ => (),
        }
        if line.starts_with("EOHD") {
            break;
        }
    }
    ctx.desc.data_offset = hdr + tw * th * 2;
    ctx.desc.make = "Rollei".to_string();
    ctx.desc.model = "d530flex".to_string();
    ctx.desc.decoder = Decoder::Rollei;
    ctx.desc.cfa = CfaPattern::Bayer(BAYER_GRBG);
    ctx.desc.bits_per_sample = 10;
    Ok(())
}

fn parse_nokia(ctx: &mut FileContext) -> Result<()> {
    ctx.stream.set_endian(Endian::Little);
    ctx.desc.make = "NOKIA".to_string();
    ctx.stream.seek(SeekFrom::Start(300))?;
    ctx.desc.data_offset = ctx.stream.read_u32()? as u64;
    let bytes = ctx.stream.read_u32()? as u64;
    ctx.desc.width = ctx.stream.read_u16()? as u32;
    ctx.desc.height = ctx.stream.read_u16()? as u32;
    let bps = (bytes * 8 / (ctx.desc.width as u64 * ctx.desc.height as u64).max(1)) as u16;
    ctx.desc.bits_per_sample = bps;
    ctx.desc.decoder = match bps {
        8 => Decoder::EightBit,
        _ => Decoder::Nokia,
    };
    let rows = bytes / (ctx.desc.width as u64 * bps as u64 / 8).max(1);
    ctx.desc.top_margin = (rows.saturating_sub(ctx.desc.height as u64)) as u32;
    ctx.desc.raw_width = ctx.desc.width;
    ctx.desc.raw_height = ctx.desc.height + ctx.desc.top_margin;
    ctx.desc.cfa = CfaPattern::Bayer(BAYER_GRBG);
    ctx.desc.maximum = 0x3ff;
    Ok(())
}

fn parse_arri(ctx: &mut FileContext) -> Result<()> {
    ctx.stream.set_endian(Endian::Little);
    ctx.stream.seek(SeekFrom::Start(20))?;
    ctx.desc.width = ctx.stream.read_u32()?;
    ctx.desc.height = ctx.stream.read_u32()?;
    ctx.desc.raw_width = ctx.desc.width;
    ctx.desc.raw_height = ctx.desc.height;
    ctx.desc.make = "ARRI".to_string();
    ctx.stream.seek(SeekFrom::Start(668))?;
    let mut name = [0_u8; 64];
    let _ = ctx.stream.read_some(&mut name)?;
    ctx.desc.model = crate::utils::from_maybe_nul_terminated(&name);
    ctx.desc.data_offset = 4096;
    ctx.desc.decoder = Decoder::Packed;
    ctx.desc.load_flags = 88;
    ctx.desc.bits_per_sample = 12;
    ctx.desc.cfa = CfaPattern::Bayer(BAYER_GRBG);
    Ok(())
}

fn parse_xiaoyi(ctx: &mut FileContext) -> Result<()> {
    ctx.stream.set_endian(Endian::Little);
    ctx.stream.seek(SeekFrom::Start(0x20))?;
    ctx.desc.width = ctx.stream.read_u16()? as u32;
    ctx.desc.height = ctx.stream.read_u16()? as u32;
    ctx.desc.raw_width = ctx.desc.width;
    ctx.desc.raw_height = ctx.desc.height;
    ctx.desc.make = "Xiaoyi".to_string();
    ctx.desc.model = "YDXJ 2".to_string();
    ctx.desc.data_offset = 0x800;
    ctx.desc.decoder = Decoder::Packed;
    ctx.desc.bits_per_sample = 12;
    ctx.desc.cfa = CfaPattern::Bayer(BAYER_BGGR);
    Ok(())
}

/// Per-model margin fixups for the lossless JPEG Canons.
static CANON_MARGINS: &[(u32, u32, u32, u32)] = &[
    // (raw_width, raw_height, left, top)
    (2224, 1456, 48, 6),
    (2376, 1728, 12, 6),
    (2672, 1968, 12, 6),
    (3152, 2068, 64, 12),
    (3160, 2344, 44, 8),
    (3344, 2484, 4, 6),
    (3516, 2328, 42, 14),
    (3596, 2360, 74, 12),
    (3744, 2784, 52, 12),
    (3944, 2622, 30, 18),
    (3948, 2622, 42, 18),
    (3984, 2622, 76, 20),
    (4104, 3048, 48, 12),
    (4116, 2178, 4, 2),
    (4152, 2772, 192, 12),
    (4160, 3124, 104, 11),
    (4176, 3054, 96, 17),
    (4312, 2876, 22, 18),
    (4476, 2954, 90, 34),
    (4480, 3348, 12, 10),
    (4496, 3366, 80, 50),
    (4832, 3204, 62, 26),
    (4832, 3228, 62, 51),
    (5108, 3349, 98, 13),
    (5120, 3318, 142, 45),
    (5280, 3528, 72, 52),
    (5344, 3516, 142, 51),
    (5360, 3516, 158, 51),
    (5568, 3708, 72, 38),
    (5632, 3710, 96, 17),
    (5712, 3774, 62, 20),
    (5792, 3804, 158, 51),
    (5920, 3950, 122, 80),
];

/// Finalize the descriptor: normalize names, per-model fixups,
/// colour matrices.
fn finalize(ctx: &mut FileContext) -> Result<()> {
    ctx.desc.normalize_names();

    if ctx.desc.is_raw == 0 || ctx.desc.decoder == Decoder::None {
        ctx.desc.is_raw = 0;
        return Ok(());
    }

    // Canon margin bands around the lossless JPEG sensors.
    if ctx.desc.make == "Canon"
        && matches!(
            ctx.desc.decoder,
            Decoder::LosslessJpeg | Decoder::CanonSRaw | Decoder::CanonCompressed
        )
    {
        if let Some((_, _, left, top)) = CANON_MARGINS
            .iter()
            .find(|(w, h, _, _)| *w == ctx.desc.raw_width && *h == ctx.desc.raw_height)
        {
            ctx.desc.left_margin = *left;
            ctx.desc.top_margin = *top;
            ctx.desc.width = ctx.desc.raw_width - left * 2;
            ctx.desc.height = ctx.desc.raw_height - top * 2;
            // The masked border measures the black level.
            ctx.desc.mask[0] = [
                *top as i32,
                0,
                (ctx.desc.raw_height - top) as i32,
                (*left as i32) - 4,
            ];
        }
    }
    // Canon sRAW: the compressed stream carries YCbCr, not a CFA.
    if ctx.desc.make == "Canon"
        && ctx.desc.decoder == Decoder::LosslessJpeg
        && (ctx.desc.is_sraw || ctx.desc.tiff_samples == 4)
    {
        ctx.desc.decoder = Decoder::CanonSRaw;
        ctx.desc.cfa = CfaPattern::Linear;
    }
    // Samsung SRW generations, told apart by plane geometry.
    if ctx.desc.make == "Samsung" {
        if ctx.desc.raw_height == 3714 {
            ctx.desc.decoder = Decoder::SamsungSrw3;
            ctx.desc.top_margin = 18;
            ctx.desc.height = ctx.desc.raw_height - 18;
            if ctx.desc.raw_width == 5600 {
                ctx.desc.width = 5536;
                ctx.desc.left_margin = ctx.desc.raw_width - 5536;
            }
            ctx.desc.cfa = CfaPattern::Bayer(BAYER_GRBG);
        } else if ctx.desc.raw_width == 5632 && ctx.desc.decoder == Decoder::Packed {
            ctx.desc.decoder = Decoder::SamsungSrw2;
            ctx.stream.set_endian(Endian::Little);
        } else if ctx.desc.strip_offset != 0
            && matches!(ctx.desc.decoder, Decoder::Packed | Decoder::Unpacked { .. })
        {
            ctx.desc.decoder = Decoder::SamsungSrw;
        }
    }
    // Hasselblad 3FR rides on the lossless JPEG marker with an
    // oversize plane.
    if ctx.desc.make == "Hasselblad" && ctx.desc.decoder == Decoder::LosslessJpeg {
        ctx.desc.decoder = Decoder::Hasselblad;
        if ctx.desc.raw_width == ctx.desc.width * 2 {
            ctx.desc.raw_width /= 2;
            ctx.desc.width = ctx.desc.raw_width;
        }
        ctx.desc.maximum = 0xffff;
    }
    // Sinar multi-shot backs.
    if ctx.desc.make == "Sinar" && matches!(ctx.desc.decoder, Decoder::Unpacked { .. }) {
        ctx.desc.decoder = Decoder::Sinar4Shot;
        ctx.desc.is_raw = 4;
    }
    // Leaf tiled backs.
    if ctx.desc.make == "Leaf" && !ctx.tile_offsets.is_empty() {
        ctx.desc.decoder = Decoder::LeafHdr;
    }
    // Imacon full-colour frames.
    if ctx.desc.make == "Imacon" && ctx.desc.tiff_samples == 3 {
        ctx.desc.decoder = Decoder::ImaconFull;
        ctx.desc.cfa = CfaPattern::Linear;
    }
    // Kodak C330/C603 byte YCbCr.
    if ctx.desc.make == "Kodak" {
        if ctx.desc.model.starts_with("C330") {
            ctx.desc.decoder = Decoder::KodakC330;
            ctx.desc.cfa = CfaPattern::Linear;
        } else if ctx.desc.model.starts_with("C603") || ctx.desc.model.starts_with("C643") {
            ctx.desc.decoder = Decoder::KodakC603;
            ctx.desc.cfa = CfaPattern::Linear;
        }
        if matches!(
            ctx.desc.decoder,
            Decoder::KodakC330 | Decoder::KodakC603 | Decoder::EightBit
        ) {
            // Expand the 8-bit tone encoding to linear.
            ctx.curve = colour::gamma_curve(0.45, 4.5, 0, 255);
        }
    }
    if ctx.desc.make == "Phase One" || ctx.desc.make == "Mamiya" {
        if ctx.desc.decoder == Decoder::None {
            ctx.desc.decoder = Decoder::PhaseOne;
        }
    }

    if ctx.desc.raw_width == 0 || ctx.desc.raw_height == 0 {
        return Err(Error::UnrecognizedFormat);
    }
    if ctx.desc.width == 0 || ctx.desc.width > ctx.desc.raw_width {
        ctx.desc.width = ctx.desc.raw_width;
    }
    if ctx.desc.height == 0 || ctx.desc.height > ctx.desc.raw_height {
        ctx.desc.height = ctx.desc.raw_height;
    }
    if ctx.desc.width + ctx.desc.left_margin > ctx.desc.raw_width {
        ctx.desc.width = ctx.desc.raw_width - ctx.desc.left_margin;
    }
    if ctx.desc.height + ctx.desc.top_margin > ctx.desc.raw_height {
        ctx.desc.height = ctx.desc.raw_height - ctx.desc.top_margin;
    }
    if ctx.desc.bits_per_sample == 0 {
        ctx.desc.bits_per_sample = 12;
    }
    if ctx.desc.maximum == 0 {
        ctx.desc.maximum = (1_u64 << ctx.desc.bits_per_sample).wrapping_sub(1) as u32;
    }

    choose_matrix(ctx);

    // The user override forces the camera flip off or to a value.
    if let Some(flip) = ctx.params.user_flip {
        ctx.desc.flip = flip;
    }
    debug!(
        "{}: {} {}, {}x{} in {}x{}, {:?}",
        ctx.input,
        ctx.desc.make,
        ctx.desc.model,
        ctx.desc.width,
        ctx.desc.height,
        ctx.desc.raw_width,
        ctx.desc.raw_height,
        ctx.desc.decoder
    );
    Ok(())
}

/// Ordering rule: DNG embedded values, then the built-in table, then
/// the simple fallbacks, then identity.
fn choose_matrix(ctx: &mut FileContext) {
    // An embedded matrix (already composed by the parser) is
    // authoritative for DNG. Non-DNG files sometimes carry one too;
    // there it only wins when forced with the flag. Otherwise fall
    // through to the table, keeping the embedded composition as the
    // last resort before identity.
    if ctx.desc.cam_xyz.is_some()
        && (ctx.desc.dng_version != 0 || ctx.params.use_camera_matrix)
    {
        return;
    }

    let id = ctx.desc.id_string();
    if let Some(builtin) = builtin_matrix(&id) {
        if builtin.black != 0 {
            ctx.desc.black = builtin.black as u32;
        }
        if builtin.white != 0 {
            ctx.desc.maximum = builtin.white as u32;
        }
        let colors = builtin.colors();
        ctx.desc.colors = colors as u8;
        let cam_xyz = builtin.cam_xyz();
        let (rgb_cam, pre_mul) = colour::cam_xyz_coeff(colors, &cam_xyz);
        ctx.desc.cam_xyz = Some(cam_xyz);
        ctx.desc.rgb_cam = rgb_cam;
        ctx.desc.pre_mul = pre_mul;
        ctx.desc.raw_color = false;
        return;
    }

    // The four simple fallbacks.
    let simple = if ctx.desc.decoder == Decoder::Foveon {
        Some(0)
    } else if ctx.desc.model.starts_with("DC20") || ctx.desc.model.starts_with("DC25") {
        Some(1)
    } else if ctx.desc.model.contains("Pixtura") {
        Some(2)
    } else if ctx.desc.make == "Nikon"
        && (ctx.desc.model == "E880" || ctx.desc.model == "E900" || ctx.desc.model == "E990")
    {
        Some(3)
    } else {
        None
    };
    if let Some(index) = simple {
        let colors = if index == 1 || index == 3 { 4 } else { 3 };
        ctx.desc.colors = colors as u8;
        ctx.desc.rgb_cam = colour::simple_coeff(index, colors);
        ctx.desc.raw_color = false;
    }
}

#[cfg(test)]
mod test {
    use super::FILE_SIZES;
    use crate::io::Stream;
    use crate::params::Params;
    use crate::pipeline::FileContext;

    #[test]
    fn test_file_size_lookup() {
        // A headerless blob matching a table entry identifies fully.
        let entry = &FILE_SIZES[0];
        let data = vec![0_u8; entry.fsize as usize];
        let stream = Stream::new(Box::new(std::io::Cursor::new(data)));
        let mut ctx = FileContext::new(stream, Params::default(), "blob");
        super::identify(&mut ctx).unwrap();
        assert_eq!(ctx.desc.make, "Apple");
        assert_eq!(ctx.desc.model, "QuickTake 100");
        assert_eq!(ctx.desc.raw_width, 640);
        assert_eq!(ctx.desc.bits_per_sample, 8);
    }

    #[test]
    fn test_unrecognized() {
        let data = vec![0_u8; 100];
        let stream = Stream::new(Box::new(std::io::Cursor::new(data)));
        let mut ctx = FileContext::new(stream, Params::default(), "junk");
        assert_eq!(
            super::identify(&mut ctx),
            Err(crate::Error::UnrecognizedFormat)
        );
    }

    #[test]
    fn test_endianness_discipline() {
        // After a recognized container parse the stream order equals
        // the magic-indicated order.
        let mut data = b"II\x2a\x00\x08\x00\x00\x00".to_vec();
        data.extend_from_slice(&1_u16.to_le_bytes());
        // One entry: ImageWidth = 0 (invalid, stays unrecognized).
        data.extend_from_slice(&0x100_u16.to_le_bytes());
        data.extend_from_slice(&3_u16.to_le_bytes());
        data.extend_from_slice(&1_u32.to_le_bytes());
        data.extend_from_slice(&0_u32.to_le_bytes());
        data.extend_from_slice(&0_u32.to_le_bytes());
        let stream = Stream::new(Box::new(std::io::Cursor::new(data)));
        let mut ctx = FileContext::new(stream, Params::default(), "tiff");
        let _ = super::identify(&mut ctx);
        assert_eq!(ctx.stream.endian(), crate::container::Endian::Little);
    }
}
