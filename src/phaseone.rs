// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - phaseone.rs
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

//! Phase One / Mamiya IIQ: the tag directory, the raw and the
//! compressed loaders, and the sensor corrections.

use std::io::SeekFrom;

use crate::camera::Decoder;
use crate::container::Endian;
use crate::decompress::Ph1BitPump;
use crate::pipeline::FileContext;
use crate::utils::lim;
use crate::{Error, Result};

/// ROMM (ProPhoto) to sRGB primaries, used to convert the in-file
/// colour matrix.
fn romm_coeff(ctx: &mut FileContext, romm_cam: &[[f32; 3]; 3]) {
    static RGB_ROMM: [[f32; 3]; 3] = [
        [2.834, -1.793, -0.041],
        [-0.343, 1.333, 0.010],
        [-0.010, -0.134, 1.144],
    ];
    for i in 0..3 {
        for j in 0..3 {
            let mut sum = 0.0;
            for (k, romm) in romm_cam.iter().enumerate() {
                sum += RGB_ROMM[i][k] * romm[j];
            }
            ctx.desc.rgb_cam[i][j] = sum;
        }
    }
    ctx.desc.raw_color = false;
}

/// Walk the IIQ directory at `base`.
pub(crate) fn parse_phase_one(ctx: &mut FileContext, base: u64) -> Result<()> {
    ctx.stream.seek(SeekFrom::Start(base))?;
    let mut order = [0_u8; 4];
    ctx.stream.read_exact(&mut order)?;
    match &order[0..2] {
        b"II" => ctx.stream.set_endian(Endian::Little),
        b"MM" => ctx.stream.set_endian(Endian::Big),
        _ => return Err(Error::InvalidFormat),
    }
    if ctx.stream.read_u32()? >> 8 != 0x526177 {
        // "Raw"
        return Err(Error::InvalidFormat);
    }
    let dir_offset = ctx.stream.read_u32()? as u64;
    ctx.stream.seek(SeekFrom::Start(base + dir_offset))?;
    let entries = ctx.stream.read_u32()?;
    ctx.stream.read_u32()?;

    let mut romm_cam = [[0.0_f32; 3]; 3];
    let mut have_romm = false;
    for _ in 0..entries.min(0x1000) {
        let tag = ctx.stream.read_u32()?;
        let _type = ctx.stream.read_u32()?;
        let len = ctx.stream.read_u32()?;
        let data = ctx.stream.read_u32()?;
        let save = ctx.stream.position()?;
        ctx.stream.seek(SeekFrom::Start(base + data as u64))?;
        match tag {
            0x100 => ctx.desc.flip = [0_u16, 6, 5, 3][data as usize & 3],
            0x106 => {
                for i in 0..9 {
                    romm_cam[i / 3][i % 3] = f32::from_bits(ctx.stream.read_u32()?);
                }
                have_romm = true;
            }
            0x107 => {
                for c in 0..3 {
                    ctx.desc.cam_mul[c] = f32::from_bits(ctx.stream.read_u32()?);
                }
            }
            0x108 => ctx.desc.raw_width = data,
            0x109 => ctx.desc.raw_height = data,
            0x10a => ctx.desc.left_margin = data,
            0x10b => ctx.desc.top_margin = data,
            0x10c => ctx.desc.width = data,
            0x10d => ctx.desc.height = data,
            0x10e => ctx.desc.ph1.format = data,
            0x10f => ctx.desc.data_offset = data as u64 + base,
            0x110 => {
                ctx.desc.meta_offset = data as u64 + base;
                ctx.desc.meta_length = len;
            }
            0x112 => ctx.desc.ph1.key_off = (save - 4) as u32,
            0x210 => ctx.desc.ph1.tag_210 = f32::from_bits(data),
            0x21a => ctx.desc.ph1.tag_21a = data,
            0x21c => ctx.desc.strip_offset = data as u64 + base,
            0x21d => ctx.desc.ph1.t_black = data as i32,
            0x222 => ctx.desc.ph1.split_col = data,
            0x223 => ctx.desc.ph1.black_col = data + base as u32,
            0x224 => ctx.desc.ph1.split_row = data,
            0x225 => ctx.desc.ph1.black_row = data + base as u32,
            0x301 => {
                let mut name = [0_u8; 63];
                let _ = ctx.stream.read_some(&mut name)?;
                let model = crate::utils::from_maybe_nul_terminated(&name);
                ctx.desc.model = match model.find(" camera") {
                    Some(pos) => model[..pos].to_string(),
                    None => model,
                };
            }
            _ => (),
        }
        ctx.stream.seek(SeekFrom::Start(save))?;
    }
    if have_romm {
        romm_coeff(ctx, &romm_cam);
    }

    ctx.desc.decoder = Decoder::PhaseOne;
    ctx.desc.maximum = 0xffff;
    ctx.desc.make = "Phase One".to_string();
    if ctx.desc.model.is_empty() {
        ctx.desc.model = match ctx.desc.raw_height {
            2060 => "LightPhase",
            2682 => "H 10",
            4128 => "H 20",
            5488 => "H 25",
            _ => "",
        }
        .to_string();
    }
    Ok(())
}

/// Dispatch to the raw or the compressed loader on the format tag.
pub(crate) fn phase_one_load_raw(ctx: &mut FileContext) -> Result<()> {
    if ctx.desc.ph1.format < 3 {
        phase_one_load_raw_uncompressed(ctx)?;
    } else {
        phase_one_load_raw_c(ctx)?;
    }
    phase_one_correct(ctx)
}

/// Format 1/2: plain shorts with a keyed XOR descramble.
fn phase_one_load_raw_uncompressed(ctx: &mut FileContext) -> Result<()> {
    ctx.stream
        .seek(SeekFrom::Start(ctx.desc.ph1.key_off as u64))?;
    let akey = ctx.stream.read_u16()?;
    let bkey = ctx.stream.read_u16()?;
    let mask = if ctx.desc.ph1.format == 1 {
        0x5555
    } else {
        0x1354
    };

    ctx.stream.seek(SeekFrom::Start(ctx.desc.data_offset))?;
    let count = ctx.desc.raw_width as usize * ctx.desc.raw_height as usize;
    for i in 0..count {
        ctx.raw.data[i] = ctx.stream.read_u16().unwrap_or(0);
    }
    if ctx.desc.ph1.format != 0 {
        for i in (0..count & !1).step_by(2) {
            let a = ctx.raw.data[i] ^ akey;
            let b = ctx.raw.data[i + 1] ^ bkey;
            ctx.raw.data[i] = (a & mask) | (b & !mask);
            ctx.raw.data[i + 1] = (b & mask) | (a & !mask);
        }
    }
    Ok(())
}

/// Format 4/5/6/8: per-row offsets, adaptive code lengths, per-row
/// and per-column black references.
fn phase_one_load_raw_c(ctx: &mut FileContext) -> Result<()> {
    static LENGTH: [i32; 10] = [8, 7, 6, 9, 11, 10, 5, 12, 14, 13];
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let ph1 = ctx.desc.ph1.clone();
    let mut corrupt = 0_u32;

    ctx.stream.seek(SeekFrom::Start(ctx.desc.strip_offset))?;
    let mut offsets = Vec::with_capacity(raw_height);
    for _ in 0..raw_height {
        offsets.push(ctx.stream.read_u32()? as u64);
    }

    let mut black_col = vec![[0_i16; 2]; raw_height];
    if ph1.black_col != 0 {
        ctx.stream.seek(SeekFrom::Start(ph1.black_col as u64))?;
        for b in black_col.iter_mut() {
            b[0] = ctx.stream.read_i16()?;
            b[1] = ctx.stream.read_i16()?;
        }
    }
    let mut black_row = vec![[0_i16; 2]; raw_width];
    if ph1.black_row != 0 {
        ctx.stream.seek(SeekFrom::Start(ph1.black_row as u64))?;
        for b in black_row.iter_mut() {
            b[0] = ctx.stream.read_i16()?;
            b[1] = ctx.stream.read_i16()?;
        }
    }

    // The format 5 shadow expansion for small values.
    for i in 0..256_usize {
        ctx.curve[i] = ((i * i) as f64 / 3.969 + 0.5) as u16;
    }

    let data_offset = ctx.desc.data_offset;
    let mut pixel = vec![0_u16; raw_width];
    for row in 0..raw_height {
        ctx.stream
            .seek(SeekFrom::Start(data_offset + offsets[row]))?;
        let FileContext {
            ref mut stream,
            ref curve,
            ..
        } = *ctx;
        let mut pump = Ph1BitPump::new(stream);
        let mut pred = [0_i32; 2];
        let mut len = [0_i32; 2];
        for col in 0..raw_width {
            if col >= raw_width & !7 {
                len = [14, 14];
            } else if col & 7 == 0 {
                for l in len.iter_mut() {
                    let mut j = 0;
                    while j < 5 && pump.get_bits(1) == 0 {
                        j += 1;
                    }
                    if j > 0 && j - 1 < 5 {
                        *l = LENGTH[(j - 1) * 2 + pump.get_bits(1) as usize];
                    }
                }
            }
            let i = len[col & 1];
            let value = if i == 14 {
                let v = pump.get_bits(16) as i32;
                pred[col & 1] = v;
                v
            } else {
                pred[col & 1] += (pump.get_bits(i as u8) as i32) + 1 - (1 << (i - 1));
                pred[col & 1]
            };
            if pred[col & 1] >> 16 != 0 {
                corrupt += 1;
            }
            pixel[col] = if ph1.format == 5 && value < 256 {
                curve[value as usize & 0xff]
            } else {
                value as u16
            };
        }
        for (col, p) in pixel.iter().enumerate() {
            let shift = 2 * i32::from(ph1.format != 8);
            let i = ((*p as i32) << shift) - ph1.t_black
                + black_col[row][usize::from(col as u32 >= ph1.split_col)] as i32
                + black_row[col][usize::from(row as u32 >= ph1.split_row)] as i32;
            if i > 0 {
                ctx.raw.data[row * raw_width + col] = i as u16;
            }
        }
        if pump.truncated {
            corrupt += 1;
        }
    }
    ctx.desc.maximum = 0xfffc - ph1.t_black as u32;
    ctx.derror_count(corrupt);
    Ok(())
}

/// Bilinear flat-field correction shared by several tags.
fn phase_one_flat_field(ctx: &mut FileContext, is_float: bool, nc: usize) -> Result<()> {
    let mut head = [0_u16; 8];
    for h in head.iter_mut() {
        *h = ctx.stream.read_u16()?;
    }
    if head[2] == 0 || head[3] == 0 || head[4] == 0 || head[5] == 0 {
        return Ok(());
    }
    let wide = (head[2] / head[4] + u16::from(head[2] % head[4] != 0)) as usize;
    let high = (head[3] / head[5] + u16::from(head[3] % head[5] != 0)) as usize;
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;

    let mut mrow = vec![0.0_f32; nc * wide];
    for y in 0..high {
        for x in 0..wide {
            for c in (0..nc).step_by(2) {
                let num = if is_float {
                    f32::from_bits(ctx.stream.read_u32()?)
                } else {
                    ctx.stream.read_u16()? as f32 / 32768.0
                };
                if y == 0 {
                    mrow[c * wide + x] = num;
                } else {
                    mrow[(c + 1) * wide + x] = (num - mrow[c * wide + x]) / head[5] as f32;
                }
            }
        }
        if y == 0 {
            continue;
        }
        let rend = head[1] as usize + y * head[5] as usize;
        let mut row = rend.saturating_sub(head[5] as usize);
        while row < raw_height
            && row < rend
            && row < head[1] as usize + head[3] as usize - head[5] as usize
        {
            for x in 1..wide {
                let mut mult = [0.0_f32; 4];
                for c in (0..nc).step_by(2) {
                    mult[c] = mrow[c * wide + x - 1];
                    mult[c + 1] = (mrow[c * wide + x] - mult[c]) / head[4] as f32;
                }
                let cend = head[0] as usize + x * head[4] as usize;
                let mut col = cend.saturating_sub(head[4] as usize);
                while col < raw_width
                    && col < cend
                    && col < head[0] as usize + head[2] as usize - head[4] as usize
                {
                    let c = if nc > 2 {
                        ctx.desc.cfa.fc(
                            (row as u32).wrapping_sub(ctx.desc.top_margin),
                            (col as u32).wrapping_sub(ctx.desc.left_margin),
                        )
                    } else {
                        0
                    };
                    if c & 1 == 0 {
                        let v = ctx.raw.data[row * raw_width + col] as f32 * mult[c];
                        ctx.raw.data[row * raw_width + col] = lim(v as i32, 0, 65535) as u16;
                    }
                    for c in (0..nc).step_by(2) {
                        mult[c] += mult[c + 1];
                    }
                    col += 1;
                }
            }
            for x in 0..wide {
                for c in (0..nc).step_by(2) {
                    mrow[c * wide + x] += mrow[(c + 1) * wide + x];
                }
            }
            row += 1;
        }
    }
    Ok(())
}

/// Walk the correction records: polynomials, sensor defects, flat
/// fields and quadrant multipliers.
pub(crate) fn phase_one_correct(ctx: &mut FileContext) -> Result<()> {
    static DIR: [[i32; 2]; 12] = [
        [-1, -1],
        [-1, 1],
        [1, -1],
        [1, 1],
        [-2, 0],
        [0, -2],
        [0, 2],
        [2, 0],
        [-2, -2],
        [-2, 2],
        [2, -2],
        [2, 2],
    ];
    if ctx.params.half_size || ctx.desc.meta_length == 0 {
        return Ok(());
    }
    log::debug!("{}: Phase One correction", ctx.input);

    let meta_offset = ctx.desc.meta_offset;
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let ph1 = ctx.desc.ph1.clone();

    ctx.stream.seek(SeekFrom::Start(meta_offset))?;
    let mut order = [0_u8; 2];
    ctx.stream.read_exact(&mut order)?;
    if let Some(endian) = Endian::from_magic(&order) {
        ctx.stream.set_endian(endian);
    }
    ctx.stream.seek(SeekFrom::Current(6))?;
    let dir = ctx.stream.read_u32()? as u64;
    ctx.stream.seek(SeekFrom::Start(meta_offset + dir))?;
    let entries = ctx.stream.read_u32()?;
    ctx.stream.read_u32()?;

    let mut qmult_applied = false;
    for _ in 0..entries.min(0x1000) {
        let tag = ctx.stream.read_u32()?;
        let mut len = ctx.stream.read_u32()? as i64;
        let data = ctx.stream.read_u32()?;
        let save = ctx.stream.position()?;
        ctx.stream
            .seek(SeekFrom::Start(meta_offset + data as u64))?;
        match tag {
            // Polynomial curve, right half only.
            0x419 => {
                ctx.stream.read_u32()?;
                let mut poly = [0.0_f32; 8];
                for p in poly.iter_mut() {
                    *p = f32::from_bits(ctx.stream.read_u32()?);
                }
                poly[3] += (ph1.tag_210 - poly[7]) * poly[6] + 1.0;
                for i in 0..0x10000_usize {
                    let num = (poly[5] * i as f32 + poly[3]) * i as f32 + poly[1];
                    ctx.curve[i] = lim(num as i32, 0, 65535) as u16;
                }
                for row in 0..raw_height {
                    for col in ph1.split_col as usize..raw_width {
                        let idx = row * raw_width + col;
                        ctx.raw.data[idx] = ctx.curve[ctx.raw.data[idx] as usize];
                    }
                }
            }
            // Polynomial curve over the whole plane.
            0x41a => {
                let mut poly = [0.0_f32; 4];
                for p in poly.iter_mut() {
                    *p = f32::from_bits(ctx.stream.read_u32()?);
                }
                for i in 0..0x10000_usize {
                    let mut num = 0.0_f32;
                    for p in poly.iter().rev() {
                        num = num * i as f32 + *p;
                    }
                    ctx.curve[i] = lim((num + i as f32) as i32, 0, 65535) as u16;
                }
                for v in ctx.raw.data.iter_mut() {
                    *v = ctx.curve[*v as usize];
                }
            }
            // Sensor defects.
            0x400 => {
                while len >= 8 {
                    len -= 8;
                    let col = ctx.stream.read_u16()? as usize;
                    let row = ctx.stream.read_u16()? as usize;
                    let type_ = ctx.stream.read_u16()?;
                    ctx.stream.read_u16()?;
                    if col >= raw_width {
                        continue;
                    }
                    match type_ {
                        131 | 137 => {
                            // Bad column.
                            for row in 0..raw_height {
                                let fc = ctx.desc.cfa.fc(
                                    (row as u32).wrapping_sub(ctx.desc.top_margin),
                                    (col as u32).wrapping_sub(ctx.desc.left_margin),
                                );
                                let raw_at = |r: i64, c: i64| -> i32 {
                                    if r < 0
                                        || r >= raw_height as i64
                                        || c < 0
                                        || c >= raw_width as i64
                                    {
                                        0
                                    } else {
                                        ctx.raw.data[r as usize * raw_width + c as usize] as i32
                                    }
                                };
                                let fixed = if fc == 1 {
                                    let mut val = [0_i32; 4];
                                    let mut sum = 0;
                                    for (i, v) in val.iter_mut().enumerate() {
                                        *v = raw_at(
                                            row as i64 + DIR[i][0] as i64,
                                            col as i64 + DIR[i][1] as i64,
                                        );
                                        sum += *v;
                                    }
                                    let mut max = 0;
                                    let mut dev = [0_i32; 4];
                                    for i in 0..4 {
                                        dev[i] = ((val[i] << 2) - sum).abs();
                                        if dev[max] < dev[i] {
                                            max = i;
                                        }
                                    }
                                    ((sum - val[max]) as f64 / 3.0 + 0.5) as i32
                                } else {
                                    let mut sum = 0;
                                    for d in DIR.iter().skip(8) {
                                        sum += raw_at(
                                            row as i64 + d[0] as i64,
                                            col as i64 + d[1] as i64,
                                        );
                                    }
                                    (0.5 + sum as f64 * 0.0732233
                                        + (raw_at(row as i64, col as i64 - 2)
                                            + raw_at(row as i64, col as i64 + 2))
                                            as f64
                                            * 0.3535534) as i32
                                };
                                ctx.raw.data[row * raw_width + col] = lim(fixed, 0, 65535) as u16;
                            }
                        }
                        129 => {
                            // Bad pixel.
                            if row >= raw_height {
                                continue;
                            }
                            let fc = ctx.desc.cfa.fc(
                                (row as u32).wrapping_sub(ctx.desc.top_margin),
                                (col as u32).wrapping_sub(ctx.desc.left_margin),
                            );
                            let j = if fc != 1 { 4 } else { 0 };
                            let mut sum = 0_i32;
                            for d in DIR.iter().skip(j).take(8) {
                                let r = row as i64 + d[0] as i64;
                                let c = col as i64 + d[1] as i64;
                                if r >= 0 && r < raw_height as i64 && c >= 0 && c < raw_width as i64
                                {
                                    sum += ctx.raw.data[r as usize * raw_width + c as usize] as i32;
                                }
                            }
                            ctx.raw.data[row * raw_width + col] = ((sum + 4) >> 3) as u16;
                        }
                        _ => (),
                    }
                }
            }
            // Flat fields.
            0x401 => phase_one_flat_field(ctx, true, 2)?,
            0x416 | 0x410 => phase_one_flat_field(ctx, false, 2)?,
            0x40b => phase_one_flat_field(ctx, false, 4)?,
            // Quadrant multipliers.
            0x41e if !qmult_applied => {
                let mut qmult = [[1.0_f32; 2]; 2];
                for _ in 0..4 {
                    ctx.stream.read_u32()?;
                }
                qmult[0][0] = 1.0 + f32::from_bits(ctx.stream.read_u32()?);
                for _ in 0..5 {
                    ctx.stream.read_u32()?;
                }
                qmult[0][1] = 1.0 + f32::from_bits(ctx.stream.read_u32()?);
                for _ in 0..4 {
                    ctx.stream.read_u32()?;
                }
                qmult[1][0] = 1.0 + f32::from_bits(ctx.stream.read_u32()?);
                for _ in 0..4 {
                    ctx.stream.read_u32()?;
                }
                qmult[1][1] = 1.0 + f32::from_bits(ctx.stream.read_u32()?);
                for row in 0..raw_height {
                    for col in 0..raw_width {
                        let idx = row * raw_width + col;
                        let q = qmult[usize::from(row as u32 >= ph1.split_row)]
                            [usize::from(col as u32 >= ph1.split_col)];
                        let i = (q * ctx.raw.data[idx] as f32) as i32;
                        ctx.raw.data[idx] = lim(i, 0, 65535) as u16;
                    }
                }
                qmult_applied = true;
            }
            _ => {
                log::debug!("IIQ correction tag {:#x} skipped", tag);
            }
        }
        ctx.stream.seek(SeekFrom::Start(save))?;
    }
    Ok(())
}
