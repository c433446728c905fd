// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - tiff/parse.rs
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

//! Walk the TIFF structure of a file and fill the descriptor: the
//! IFD chain, sub IFDs, Exif, maker notes, DNG tags. The payload
//! directory is then chosen and a decoder assigned in `apply_tiff`.

use std::io::SeekFrom;

use log::debug;

use crate::camera::Decoder;
use crate::mosaic::CfaPattern;
use crate::pipeline::FileContext;
use crate::tiff::{exif, makernote, Dir};
use crate::{colour, Error, Result};

/// Geometry gathered from one IFD, a candidate payload.
#[derive(Clone, Debug, Default)]
pub(crate) struct TiffIfd {
    pub width: u32,
    pub height: u32,
    pub bps: u16,
    pub compression: u16,
    pub photometric: u16,
    pub offset: u64,
    pub bytes: u64,
    pub samples: u16,
    pub flip: u16,
    pub tile_width: u32,
    pub tile_length: u32,
    pub tile_offsets: Vec<u64>,
    pub tile_sizes: Vec<u64>,
    pub new_subfile: u32,
}

/// Map TIFF orientation values onto the flip mask.
fn flip_from_orientation(orientation: u32) -> u16 {
    const MAP: [u16; 8] = [5, 0, 1, 3, 2, 4, 6, 7];
    MAP[(orientation & 7) as usize]
}

/// Parse a whole TIFF at `base`: header, IFD chain, sub-IFDs.
pub(crate) fn parse_tiff(ctx: &mut FileContext, base: u64) -> Result<()> {
    ctx.stream.seek(SeekFrom::Start(base))?;
    let first = crate::tiff::read_header(&mut ctx.stream)?;
    let mut offset = first;
    let mut guard = 0;
    while offset != 0 && guard < 64 {
        offset = parse_tiff_ifd(ctx, base, offset)?;
        guard += 1;
    }
    Ok(())
}

/// Parse one IFD and its descendants; returns the next IFD offset.
pub(crate) fn parse_tiff_ifd(ctx: &mut FileContext, base: u64, offset: u32) -> Result<u32> {
    let endian = ctx.stream.endian();
    let dir = Dir::read(&mut ctx.stream, base, offset)?;
    debug!("{}: IFD at {:#x}, {} entries", ctx.input, offset, dir.num_entries());

    let mut ifd = TiffIfd {
        tile_width: u32::MAX,
        tile_length: u32::MAX,
        ..TiffIfd::default()
    };
    let mut cm = [[0.0_f64; 3]; 4];
    let mut cc = [[0.0_f64; 4]; 4];
    for (i, row) in cc.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    let mut ab = [1.0_f64; 4];
    let mut asn = [0.0_f64; 4];
    let mut use_cm = false;

    for entry in dir.entries() {
        match entry.tag {
            exif::TAG_NEW_SUBFILE_TYPE => ifd.new_subfile = entry.uint().unwrap_or(0),
            2 | exif::TAG_IMAGE_WIDTH | 61441 => {
                ifd.width = entry.uint().unwrap_or(0);
            }
            3 | exif::TAG_IMAGE_LENGTH | 61442 => {
                ifd.height = entry.uint().unwrap_or(0);
            }
            exif::RW2_TAG_SENSOR_TOP_BORDER => {
                ctx.desc.top_margin = entry.uint().unwrap_or(0);
            }
            exif::RW2_TAG_SENSOR_LEFT_BORDER => {
                ctx.desc.left_margin = entry.uint().unwrap_or(0);
            }
            exif::RW2_TAG_SENSOR_BOTTOM_BORDER => {
                let bottom = entry.uint().unwrap_or(0);
                ctx.desc.height = bottom.saturating_sub(ctx.desc.top_margin);
            }
            exif::RW2_TAG_SENSOR_RIGHT_BORDER => {
                let right = entry.uint().unwrap_or(0);
                ctx.desc.width = right.saturating_sub(ctx.desc.left_margin);
            }
            exif::RW2_TAG_ISO => {
                ctx.desc.iso_speed = entry.uint().unwrap_or(0) as f32;
            }
            // Panasonic bits per sample.
            0x000a => {
                let v = entry.uint().unwrap_or(0);
                if (8..=16).contains(&v) {
                    ifd.bps = v as u16;
                }
            }
            // Panasonic raw data offset; MinSampleValue is a SHORT,
            // the offset is a LONG.
            0x0118 => {
                if entry.type_ == 4 {
                    if let Some(v) = entry.uint() {
                        ifd.offset = v as u64 + base;
                        if ifd.width == 0 {
                            ifd.width = ctx.desc.width + ctx.desc.left_margin;
                            ifd.height = ctx.desc.height + ctx.desc.top_margin;
                        }
                    }
                }
            }
            exif::RW2_TAG_BLACK_LEVEL_RED => {
                ctx.desc.cblack[0] = entry.uint().unwrap_or(0);
            }
            exif::RW2_TAG_BLACK_LEVEL_GREEN => {
                ctx.desc.cblack[1] = entry.uint().unwrap_or(0);
                ctx.desc.cblack[3] = ctx.desc.cblack[1];
            }
            exif::RW2_TAG_BLACK_LEVEL_BLUE => {
                ctx.desc.cblack[2] = entry.uint().unwrap_or(0);
            }
            exif::RW2_TAG_WB_RED => ctx.desc.cam_mul[0] = entry.uint().unwrap_or(0) as f32,
            exif::RW2_TAG_WB_GREEN => {
                ctx.desc.cam_mul[1] = entry.uint().unwrap_or(0) as f32;
                ctx.desc.cam_mul[3] = ctx.desc.cam_mul[1];
            }
            exif::RW2_TAG_WB_BLUE => ctx.desc.cam_mul[2] = entry.uint().unwrap_or(0) as f32,
            exif::TAG_BITS_PER_SAMPLE => ifd.bps = entry.uint().unwrap_or(0) as u16,
            exif::TAG_COMPRESSION => ifd.compression = entry.uint().unwrap_or(0) as u16,
            exif::TAG_PHOTOMETRIC => ifd.photometric = entry.uint().unwrap_or(0) as u16,
            exif::TAG_MAKE => {
                if let Some(s) = entry.string() {
                    ctx.desc.make = s;
                }
            }
            exif::TAG_MODEL => {
                if let Some(s) = entry.string() {
                    ctx.desc.model = s;
                }
            }
            exif::TAG_STRIP_OFFSETS | exif::TAG_TILE_OFFSETS => {
                ifd.tile_offsets = (0..entry.count as usize)
                    .filter_map(|i| entry.uint_at(i))
                    .map(|v| v as u64 + base)
                    .collect();
                if let Some(first) = ifd.tile_offsets.first() {
                    ifd.offset = *first;
                }
                if entry.tag == exif::TAG_STRIP_OFFSETS && entry.count > 1 {
                    if let Some(off) = entry.offset {
                        ctx.desc.strip_offset = off;
                    }
                }
            }
            exif::TAG_STRIP_BYTE_COUNTS => {
                ifd.tile_sizes = (0..entry.count as usize)
                    .filter_map(|i| entry.uint_at(i))
                    .map(|v| v as u64)
                    .collect();
                ifd.bytes = ifd.tile_sizes.iter().sum();
            }
            exif::TAG_ORIENTATION => {
                ifd.flip = flip_from_orientation(entry.uint().unwrap_or(1));
            }
            exif::TAG_SAMPLES_PER_PIXEL => {
                ifd.samples = entry.uint().unwrap_or(1) as u16;
            }
            exif::TAG_SOFTWARE => {
                if let Some(s) = entry.string() {
                    ctx.desc.software = s;
                }
            }
            exif::TAG_TILE_WIDTH => ifd.tile_width = entry.uint().unwrap_or(u32::MAX),
            exif::TAG_TILE_LENGTH => ifd.tile_length = entry.uint().unwrap_or(u32::MAX),
            exif::TAG_SUB_IFDS => {
                // Descend into every sub-IFD; the cursor is already
                // restored by Dir::read on the way back.
                for i in 0..entry.count as usize {
                    if let Some(sub) = entry.uint_at(i) {
                        parse_tiff_ifd(ctx, base, sub)?;
                        ctx.stream.set_endian(endian);
                    }
                }
            }
            exif::TAG_CFA_REPEAT_PATTERN_DIM | exif::TAG_CFA_PATTERN_8280
            | exif::TAG_CFA_PATTERN => {
                let data = entry.data();
                let pattern = if entry.tag == exif::TAG_CFA_REPEAT_PATTERN_DIM {
                    continue;
                } else if data.len() >= 8 && (data[0] as usize * data[2] as usize) != 0 {
                    // Some vendors prepend the repeat dims.
                    &data[4..]
                } else {
                    data
                };
                if let Some(cfa) = CfaPattern::from_tiff_cfa(&pattern[..4.min(pattern.len())]) {
                    ctx.desc.cfa = cfa;
                }
            }
            exif::TAG_EXIF_IFD => {
                if let Some(sub) = entry.uint() {
                    parse_exif(ctx, base, sub)?;
                    ctx.stream.set_endian(endian);
                }
            }
            exif::TAG_KODAK_IFD => {
                if let Some(sub) = entry.uint() {
                    let _ = parse_tiff_ifd(ctx, base, sub);
                    ctx.stream.set_endian(endian);
                }
            }
            exif::TAG_DATE_TIME | exif::TAG_DATE_TIME_ORIGINAL => {
                if let Some(s) = entry.string() {
                    set_timestamp(ctx, &s);
                }
            }
            exif::TAG_MAKER_NOTE => {
                if let Some(off) = entry.offset {
                    makernote::parse_makernote(ctx, off, entry.count as u64)?;
                    ctx.stream.set_endian(endian);
                }
            }
            // Sony SR2 private block.
            0x7200 => ctx.desc.meta_offset = entry.uint().unwrap_or(0) as u64,
            0x7201 => ctx.desc.meta_length = entry.uint().unwrap_or(0),
            0x7221 => {
                let key = entry.uint().unwrap_or(0);
                let (off, len) = (ctx.desc.meta_offset as u32, ctx.desc.meta_length);
                if off != 0 && len != 0 {
                    let _ = crate::sony::parse_sr2_private(ctx, off, len, key);
                    ctx.stream.set_endian(endian);
                }
            }
            exif::CR2_TAG_SRAW_TYPE => {
                if entry.uint().unwrap_or(0) != 0 {
                    ctx.desc.is_sraw = true;
                }
            }
            exif::CR2_TAG_SLICES => {
                for c in 0..3 {
                    ctx.desc.cr2_slices[c] = entry.uint_at(c).unwrap_or(0) as u16;
                }
            }
            // DNG.
            exif::DNG_TAG_VERSION => {
                let mut v = 0_u32;
                for i in 0..4 {
                    v = v << 8 | entry.uint_at(i).unwrap_or(0);
                }
                ctx.desc.dng_version = v;
            }
            exif::DNG_TAG_LINEARIZATION_TABLE => {
                let n = (entry.count as usize).min(0x10000);
                for i in 0..n {
                    if let Some(v) = entry.uint_at(i) {
                        ctx.curve[i] = v as u16;
                    }
                }
                // Extend the last value over the rest of the LUT.
                let last = ctx.curve[n.saturating_sub(1)];
                for v in ctx.curve.iter_mut().skip(n) {
                    *v = last;
                }
            }
            exif::DNG_TAG_BLACK_LEVEL_REPEAT_DIM => (),
            exif::DNG_TAG_BLACK_LEVEL => {
                let vals = entry.real_array();
                match vals.len() {
                    0 => (),
                    1 => ctx.desc.black = vals[0] as u32,
                    2 | 3 | 4 => {
                        for (c, v) in vals.iter().enumerate() {
                            ctx.cblack_pattern[c] = *v as u32;
                        }
                    }
                    _ => {
                        let avg = vals.iter().sum::<f64>() / vals.len() as f64;
                        ctx.desc.black = avg as u32;
                    }
                }
            }
            exif::DNG_TAG_BLACK_LEVEL_DELTA_H | exif::DNG_TAG_BLACK_LEVEL_DELTA_V => {
                let vals = entry.real_array();
                if !vals.is_empty() {
                    let avg = vals.iter().sum::<f64>() / vals.len() as f64;
                    ctx.desc.black = (ctx.desc.black as f64 + avg) as u32;
                }
            }
            exif::DNG_TAG_WHITE_LEVEL => {
                ctx.desc.maximum = entry.uint().unwrap_or(0);
            }
            exif::DNG_TAG_DEFAULT_CROP_ORIGIN => {
                let vals = entry.real_array();
                if vals.len() >= 2 {
                    ctx.desc.left_margin = vals[0] as u32;
                    ctx.desc.top_margin = vals[1] as u32;
                }
            }
            exif::DNG_TAG_DEFAULT_CROP_SIZE => {
                let vals = entry.real_array();
                if vals.len() >= 2 {
                    ctx.desc.width = vals[0] as u32;
                    ctx.desc.height = vals[1] as u32;
                }
            }
            exif::DNG_TAG_COLOR_MATRIX1 | exif::DNG_TAG_COLOR_MATRIX2 => {
                let vals = entry.real_array();
                for (i, v) in vals.iter().enumerate().take(12) {
                    cm[i / 3][i % 3] = *v;
                }
                use_cm = true;
            }
            exif::DNG_TAG_CAMERA_CALIBRATION1 | exif::DNG_TAG_CAMERA_CALIBRATION2 => {
                let vals = entry.real_array();
                let n = ctx.desc.colors as usize;
                for (i, v) in vals.iter().enumerate().take(n * n) {
                    cc[i / n][i % n] = *v;
                }
            }
            exif::DNG_TAG_ANALOG_BALANCE => {
                for (c, v) in entry.real_array().iter().enumerate().take(4) {
                    ab[c] = *v;
                }
            }
            exif::DNG_TAG_AS_SHOT_NEUTRAL => {
                for (c, v) in entry.real_array().iter().enumerate().take(4) {
                    asn[c] = *v;
                }
            }
            exif::DNG_TAG_ACTIVE_AREA => {
                let vals = entry.real_array();
                if vals.len() >= 4 {
                    ctx.desc.top_margin = vals[0] as u32;
                    ctx.desc.left_margin = vals[1] as u32;
                    ctx.desc.height = (vals[2] - vals[0]) as u32;
                    ctx.desc.width = (vals[3] - vals[1]) as u32;
                }
            }
            exif::DNG_TAG_MASKED_AREAS => {
                let vals = entry.real_array();
                for (i, rect) in vals.chunks_exact(4).enumerate().take(8) {
                    for (j, v) in rect.iter().enumerate() {
                        ctx.desc.mask[i][j] = *v as i32;
                    }
                }
            }
            _ => (),
        }
    }

    // Fold the DNG colour tags together once the IFD is read.
    if use_cm {
        let colors = ctx.desc.colors as usize;
        let mut cam_xyz = [[0.0_f64; 3]; 4];
        for (i, row) in cam_xyz.iter_mut().enumerate().take(colors) {
            for (j, v) in row.iter_mut().enumerate() {
                for (k, cm_row) in cm.iter().enumerate().take(colors) {
                    *v += cc[i][k] * cm_row[j] * ab[i];
                }
            }
        }
        ctx.desc.cam_xyz = Some(cam_xyz);
        let (rgb_cam, pre_mul) = colour::cam_xyz_coeff(colors, &cam_xyz);
        ctx.desc.rgb_cam = rgb_cam;
        ctx.desc.pre_mul = pre_mul;
        ctx.desc.raw_color = false;
    }
    if asn[0] > 0.0 {
        for (c, v) in asn.iter().enumerate() {
            if *v > 0.0 {
                ctx.desc.cam_mul[c] = (1.0 / v) as f32;
            }
        }
        ctx.desc.cam_mul[3] = if asn[3] > 0.0 {
            ctx.desc.cam_mul[3]
        } else {
            0.0
        };
    }

    if ifd.width != 0 && ifd.height != 0 {
        ctx.tiff_ifds.push(ifd);
    }
    Ok(dir.next)
}

/// The Exif sub-directory.
pub(crate) fn parse_exif(ctx: &mut FileContext, base: u64, offset: u32) -> Result<()> {
    let endian = ctx.stream.endian();
    let dir = Dir::read(&mut ctx.stream, base, offset)?;
    if let Some(v) = dir.real(exif::TAG_EXPOSURE_TIME) {
        ctx.desc.shutter = v as f32;
    }
    if let Some(v) = dir.real(exif::TAG_FNUMBER) {
        ctx.desc.aperture = v as f32;
    }
    if let Some(v) = dir.real(exif::TAG_ISO_SPEED) {
        ctx.desc.iso_speed = v as f32;
    }
    if let Some(v) = dir.real(exif::TAG_FOCAL_LENGTH) {
        ctx.desc.focal_len = v as f32;
    }
    if let Some(v) = dir.real(exif::TAG_SHUTTER_SPEED_VALUE) {
        if ctx.desc.shutter == 0.0 {
            ctx.desc.shutter = 2.0_f64.powf(-v) as f32;
        }
    }
    if let Some(v) = dir.real(exif::TAG_APERTURE_VALUE) {
        if ctx.desc.aperture == 0.0 {
            ctx.desc.aperture = 2.0_f64.powf(v / 2.0) as f32;
        }
    }
    if let Some(s) = dir.string(exif::TAG_DATE_TIME_ORIGINAL) {
        set_timestamp(ctx, &s);
    }
    if let Some(entry) = dir.entry(exif::TAG_MAKER_NOTE) {
        if let Some(off) = entry.offset {
            makernote::parse_makernote(ctx, off, entry.count as u64)?;
        }
    }
    ctx.stream.set_endian(endian);
    Ok(())
}

/// "YYYY:MM:DD HH:MM:SS" to seconds since the epoch.
fn set_timestamp(ctx: &mut FileContext, text: &str) {
    use chrono::{NaiveDate, NaiveDateTime};
    let parsed = NaiveDateTime::parse_from_str(text.trim(), "%Y:%m:%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text.trim(), "%Y:%m:%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        });
    if let Some(dt) = parsed {
        ctx.desc.timestamp = dt.and_utc().timestamp();
    }
}

/// Choose the payload IFD and assign a decoder.
pub(crate) fn apply_tiff(ctx: &mut FileContext) -> Result<()> {
    let ifds = std::mem::take(&mut ctx.tiff_ifds);
    if ifds.is_empty() {
        return Err(Error::UnrecognizedFormat);
    }

    let mut raw: Option<&TiffIfd> = None;
    let mut ties = 0_u32;
    for ifd in &ifds {
        let os = raw
            .map(|r| r.width as u64 * r.height as u64)
            .unwrap_or(0);
        let ns = ifd.width as u64 * ifd.height as u64;
        if (ifd.compression != 6 || ifd.samples != 3)
            && (ifd.width | ifd.height) < 0x10000
            && ns > 0
            && (ns > os || (ns == os && ctx.params.shot_select == ties))
        {
            if ns > os {
                ties = 1;
            } else {
                ties += 1;
            }
            raw = Some(ifd);
        }
    }
    let raw = raw.ok_or(Error::UnrecognizedFormat)?.clone();
    if ctx.desc.is_raw == 1 && ties > 1 {
        ctx.desc.is_raw = ties;
    }

    ctx.desc.raw_width = raw.width;
    ctx.desc.raw_height = raw.height;
    if ctx.desc.width == 0 || ctx.desc.width > raw.width {
        ctx.desc.width = raw.width;
    }
    if ctx.desc.height == 0 || ctx.desc.height > raw.height {
        ctx.desc.height = raw.height;
    }
    if raw.bps != 0 {
        ctx.desc.bits_per_sample = raw.bps;
    }
    ctx.desc.compression = raw.compression;
    ctx.desc.data_offset = raw.offset;
    ctx.desc.tiff_samples = raw.samples.max(1);
    ctx.desc.tile_width = raw.tile_width;
    ctx.desc.tile_length = raw.tile_length;
    if raw.flip != 0 {
        ctx.desc.flip = raw.flip;
    }
    if raw.tile_offsets.len() > 1 {
        ctx.tile_offsets = raw.tile_offsets.clone();
        ctx.tile_sizes = raw.tile_sizes.clone();
    }
    if raw.photometric == exif::PHOTOMETRIC_MINISBLACK {
        ctx.desc.colors = 1;
        ctx.desc.cfa = CfaPattern::Monochrome;
    } else if raw.photometric == exif::PHOTOMETRIC_RGB
        || raw.photometric == exif::PHOTOMETRIC_LINEAR_RAW && raw.samples >= 3
    {
        ctx.desc.cfa = CfaPattern::Linear;
    }
    if ctx.desc.maximum == 0 {
        ctx.desc.maximum = (1_u64 << ctx.desc.bits_per_sample.min(16)).wrapping_sub(1) as u32;
    }

    // The compression to decoder mapping.
    let mut decoder = Decoder::None;
    let width = raw.width as u64;
    let height = raw.height as u64;
    match raw.compression {
        exif::COMPRESSION_SONY_ARW2 => {
            if raw.bytes == width * height {
                ctx.desc.bits_per_sample = 14;
                decoder = Decoder::SonyArw2;
            } else if raw.bytes * 8 != width * height * raw.bps as u64 {
                ctx.desc.raw_height += 8;
                decoder = Decoder::SonyArw;
            } else {
                ctx.desc.load_flags = 80;
                decoder = Decoder::Packed;
            }
        }
        exif::COMPRESSION_NIKON_PACKED | 32770 | 32773 | 0 | exif::COMPRESSION_NONE => {
            if raw.compression == exif::COMPRESSION_NIKON_PACKED {
                ctx.desc.load_flags = 1;
            }
            decoder = match ctx.desc.bits_per_sample {
                8 => Decoder::EightBit,
                12 => {
                    if raw.photometric == exif::PHOTOMETRIC_RGB {
                        ctx.desc.load_flags = 6;
                    }
                    Decoder::Packed
                }
                _ => {
                    if ctx.desc.make.starts_with("OLYMPUS")
                        && raw.bytes * 7 > width * height
                    {
                        Decoder::OlympusCompressed
                    } else {
                        Decoder::Unpacked {
                            big_endian: ctx.stream.endian() == crate::Endian::Big,
                        }
                    }
                }
            };
        }
        6 | exif::COMPRESSION_LJPEG | 99 => decoder = Decoder::LosslessJpeg,
        262 => decoder = Decoder::Kodak262,
        exif::COMPRESSION_NIKON_COMPRESSED => {
            decoder = if (width + 9) / 10 * 16 * height == raw.bytes {
                ctx.desc.load_flags = 1;
                Decoder::Packed
            } else if width * height * 3 == raw.bytes * 2 {
                if ctx.desc.model.starts_with('N') {
                    ctx.desc.load_flags = 80;
                }
                Decoder::Packed
            } else if width * height * 3 == raw.bytes {
                ctx.desc.cfa = CfaPattern::Linear;
                ctx.desc.cblack = [0; 4];
                ctx.curve = colour::gamma_curve(1.0 / 2.4, 12.92, 0, 4095);
                Decoder::NikonYuv
            } else if width * height * 2 == raw.bytes {
                ctx.desc.load_flags = 4;
                ctx.stream.set_endian(crate::Endian::Big);
                Decoder::Unpacked { big_endian: true }
            } else {
                Decoder::NikonCompressed
            };
        }
        exif::COMPRESSION_PENTAX => decoder = Decoder::PentaxCompressed,
        65000 => {
            decoder = match raw.photometric {
                2 => {
                    ctx.desc.cfa = CfaPattern::Linear;
                    Decoder::KodakRgb
                }
                6 => {
                    ctx.desc.cfa = CfaPattern::Linear;
                    Decoder::KodakYcbcr
                }
                _ => Decoder::Kodak65000,
            };
        }
        32867 | exif::COMPRESSION_LOSSY_JPEG => {
            decoder = Decoder::LossyJpegDng;
            ctx.desc.cfa = CfaPattern::Linear;
        }
        // Panasonic RW2.
        34316 => {
            decoder = Decoder::PanasonicRw2;
            ctx.desc.load_flags = 0x2008;
        }
        _ => {
            ctx.desc.is_raw = 0;
        }
    }
    ctx.desc.decoder = decoder;
    Ok(())
}
