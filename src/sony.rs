// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - sony.rs
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

//! Sony decoding: the SRF scrambled stream, ARW1 Huffman and the
//! ARW2 block format, plus the encrypted SR2 private directory.

use std::io::SeekFrom;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::container::Endian;
use crate::decompress::{BitPump, HuffTable};
use crate::io::Stream;
use crate::pipeline::FileContext;
use crate::tiff::Dir;
use crate::Result;

/// The Sony key stream generator. `start` reseeds from `key`;
/// afterwards the pad evolves as a lagged Fibonacci sequence.
pub(crate) struct SonyDecrypt {
    pad: [u32; 128],
    p: usize,
}

impl SonyDecrypt {
    pub fn new(mut key: u32) -> SonyDecrypt {
        let mut pad = [0_u32; 128];
        for p in pad.iter_mut().take(4) {
            key = key.wrapping_mul(48828125).wrapping_add(1);
            *p = key;
        }
        pad[3] = pad[3] << 1 | (pad[0] ^ pad[2]) >> 31;
        for p in 4..127 {
            pad[p] = (pad[p - 4] ^ pad[p - 2]) << 1 | (pad[p - 3] ^ pad[p - 1]) >> 31;
        }
        for p in pad.iter_mut() {
            *p = p.swap_bytes();
        }
        // The seeding loop leaves the cursor at the last slot.
        SonyDecrypt { pad, p: 127 }
    }

    /// XOR the next words of the key stream over `data` (32-bit
    /// big-endian words in place).
    pub fn decrypt(&mut self, data: &mut [u8]) {
        for chunk in data.chunks_exact_mut(4) {
            self.p += 1;
            let p = self.p;
            let next = self.pad[p & 127] ^ self.pad[(p + 64) & 127];
            self.pad[(p - 1) & 127] = next;
            let word = BigEndian::read_u32(chunk) ^ next.swap_bytes();
            BigEndian::write_u32(chunk, word);
        }
    }
}

/// SRF: 16-bit rows XORed with a keyed pad, key material buried at
/// fixed offsets.
pub(crate) fn sony_load_raw(ctx: &mut FileContext) -> Result<()> {
    ctx.stream.seek(SeekFrom::Start(200896))?;
    let skip = ctx.stream.read_u8()? as i64;
    ctx.stream.seek(SeekFrom::Current(skip * 4 - 1))?;
    ctx.stream.set_endian(Endian::Big);
    let mut key = ctx.stream.read_u32()?;

    let mut head = [0_u8; 40];
    ctx.stream.seek(SeekFrom::Start(164600))?;
    ctx.stream.read_exact(&mut head)?;
    SonyDecrypt::new(key).decrypt(&mut head);
    key = 0;
    for i in (22..26).rev() {
        key = key << 8 | head[i] as u32;
    }

    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    ctx.stream.seek(SeekFrom::Start(ctx.desc.data_offset))?;
    let mut corrupt = 0_u32;
    let mut decrypt = SonyDecrypt::new(key);
    let mut rowbuf = vec![0_u8; raw_width * 2];
    for row in 0..raw_height {
        if ctx.stream.read_some(&mut rowbuf)? < rowbuf.len() {
            corrupt += 1;
        }
        decrypt.decrypt(&mut rowbuf);
        for col in 0..raw_width {
            let v = BigEndian::read_u16(&rowbuf[col * 2..]);
            if v >> 14 != 0 {
                corrupt += 1;
            }
            ctx.raw.data[row * raw_width + col] = v;
        }
    }
    ctx.desc.maximum = 0x3ff0;
    ctx.derror_count(corrupt);
    Ok(())
}

/// ARW1: column-major Huffman differences with a wrap-around row
/// order.
pub(crate) fn sony_arw_load_raw(ctx: &mut FileContext) -> Result<()> {
    static TAB: [u16; 18] = [
        0xf11, 0xf10, 0xe0f, 0xd0e, 0xc0d, 0xb0c, 0xa0b, 0x90a, 0x809, 0x708, 0x607, 0x506, 0x405,
        0x304, 0x303, 0x300, 0x202, 0x201,
    ];
    let huff = HuffTable::from_entries(15, &TAB);

    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height;
    let mut corrupt = 0_u32;
    let mut sum = 0_i32;

    let FileContext {
        ref mut stream,
        ref mut raw,
        ..
    } = *ctx;
    let mut pump = BitPump::new(stream);
    for col in (0..raw_width).rev() {
        let mut row = 0_u32;
        while row <= raw_height {
            if row == raw_height {
                row = 1;
            }
            sum += pump.huff_diff(&huff);
            if sum >> 12 != 0 {
                corrupt += 1;
            }
            if row < raw_height {
                raw.data[row as usize * raw_width + col] = sum as u16;
            }
            row += 2;
        }
    }
    if pump.truncated {
        corrupt += 1;
    }
    ctx.derror_count(corrupt);
    Ok(())
}

/// ARW2: 16 samples in 16 bytes with min/max/imin/imax markers and a
/// variable shift; samples are expanded through the tone curve to
/// the 14-bit range at load time.
pub(crate) fn sony_arw2_load_raw(ctx: &mut FileContext) -> Result<()> {
    let raw_width = ctx.desc.raw_width as usize;
    let raw_height = ctx.desc.raw_height as usize;
    let mut corrupt = 0_u32;
    let mut data = vec![0_u8; raw_width + 1];
    for row in 0..raw_height {
        if ctx.stream.read_some(&mut data[..raw_width])? < raw_width {
            corrupt += 1;
        }
        let mut dp = 0_usize;
        let mut col = 0_usize;
        while col < raw_width - 30 {
            let val = LittleEndian::read_u32(&data[dp..]);
            let max = (0x7ff & val) as i32;
            let min = (0x7ff & val >> 11) as i32;
            let imax = (0x0f & val >> 22) as usize;
            let imin = (0x0f & val >> 26) as usize;
            let mut sh = 0;
            while sh < 4 && 0x80 << sh <= max - min {
                sh += 1;
            }
            let mut bit = 30_usize;
            let mut pix = [0_u16; 16];
            for (i, p) in pix.iter_mut().enumerate() {
                if i == imax {
                    *p = max as u16;
                } else if i == imin {
                    *p = min as u16;
                } else {
                    let w = LittleEndian::read_u16(&data[dp + (bit >> 3)..]);
                    let v = (((w >> (bit & 7) & 0x7f) as i32) << sh) + min;
                    *p = if v > 0x7ff { 0x7ff } else { v as u16 };
                    bit += 7;
                }
            }
            // Samples interleave over two passes of even then odd
            // columns.
            for p in pix.iter() {
                ctx.raw.data[row * raw_width + col] =
                    ctx.curve[(*p as usize) << 1] >> 2;
                col += 2;
            }
            col -= if col & 1 != 0 { 1 } else { 31 };
            dp += 16;
        }
    }
    ctx.derror_count(corrupt);
    Ok(())
}

/// Read the WB and curve out of the decrypted SR2 private block.
/// `base` pads the blob so that absolute value offsets resolve.
pub(crate) fn parse_sr2_private(
    ctx: &mut FileContext,
    offset: u32,
    length: u32,
    key: u32,
) -> Result<()> {
    if length == 0 || length > 0x100000 {
        return Ok(());
    }
    let mut blob = ctx.stream.read_vec_at(offset as u64, length as usize)?;
    SonyDecrypt::new(key).decrypt(&mut blob);

    let mut padded = vec![0_u8; offset as usize];
    padded.extend_from_slice(&blob);
    let mut stream = Stream::new(Box::new(std::io::Cursor::new(padded)));
    stream.set_endian(ctx.stream.endian());
    let dir = Dir::read(&mut stream, 0, offset)?;

    if let Some(e) = dir.entry(0x7313) {
        for c in 0..4 {
            if let Some(v) = e.uint_at(c) {
                ctx.desc.cam_mul[c ^ (c >> 1)] = v as i16 as f32;
            }
        }
    }
    if let Some(e) = dir.entry(0x7010) {
        let mut knots = [0_u32; 6];
        knots[5] = 4095;
        for (i, k) in knots.iter_mut().skip(1).take(4).enumerate() {
            *k = (e.uint_at(i).unwrap_or(0) >> 2) & 0xfff;
        }
        for i in 0..5_usize {
            for j in knots[i] + 1..=knots[i + 1] {
                ctx.curve[j as usize] = ctx.curve[j as usize - 1] + (1 << i);
            }
        }
    }
    Ok(())
}
