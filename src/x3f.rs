// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - x3f.rs
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

//! Foveon X3F: the directory walk and the two load variants, an
//! embedded Huffman tree over 24-bit difference triplets driven by a
//! 1024-entry table. Three planes are written directly.

use std::io::SeekFrom;

use bitreader::BitReader;

use crate::camera::Decoder;
use crate::container::Endian;
use crate::pipeline::FileContext;
use crate::{Error, Result};

/// The decoder tree caps at 2048 nodes; overflowing it means the
/// file is structurally broken and gets abandoned.
const TREE_CAP: usize = 2048;

#[derive(Clone, Copy, Default)]
struct Node {
    branch: [u16; 2],
    leaf: i8,
    is_leaf: bool,
}

struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn new() -> Tree {
        Tree {
            nodes: vec![Node::default()],
        }
    }

    /// Insert a code of `len` bits with value `code`.
    fn insert(&mut self, len: u32, code: u32, leaf: i8) -> Result<()> {
        let mut cur = 0_usize;
        for i in (0..len).rev() {
            let bit = (code >> i & 1) as usize;
            if self.nodes[cur].branch[bit] == 0 {
                if self.nodes.len() >= TREE_CAP {
                    return Err(Error::FormatError(
                        "X3F: decoder table overflow".to_string(),
                    ));
                }
                self.nodes.push(Node::default());
                let idx = (self.nodes.len() - 1) as u16;
                self.nodes[cur].branch[bit] = idx;
            }
            cur = self.nodes[cur].branch[bit] as usize;
        }
        self.nodes[cur].leaf = leaf;
        self.nodes[cur].is_leaf = true;
        Ok(())
    }

    fn decode(&self, bits: &mut BitReader<'_>) -> Result<i8> {
        let mut cur = 0_usize;
        loop {
            let node = &self.nodes[cur];
            if node.is_leaf {
                return Ok(node.leaf);
            }
            let bit = bits.read_u8(1)? as usize;
            let next = node.branch[bit] as usize;
            if next == 0 {
                return Err(Error::Decompression("X3F: invalid code".to_string()));
            }
            cur = next;
        }
    }
}

/// Locate the raw image entry from the trailing directory.
pub(crate) fn parse_x3f(ctx: &mut FileContext) -> Result<()> {
    ctx.stream.set_endian(Endian::Little);
    let len = ctx.stream.len()?;
    ctx.stream.seek(SeekFrom::Start(len - 4))?;
    let dir_offset = ctx.stream.read_u32()? as u64;
    ctx.stream.seek(SeekFrom::Start(dir_offset))?;
    let mut magic = [0_u8; 4];
    ctx.stream.read_exact(&mut magic)?;
    if &magic != b"SECd" {
        return Err(Error::InvalidFormat);
    }
    ctx.stream.read_u32()?;
    let entries = ctx.stream.read_u32()?;
    for _ in 0..entries.min(64) {
        let offset = ctx.stream.read_u32()? as u64;
        let _length = ctx.stream.read_u32()?;
        let mut kind = [0_u8; 4];
        ctx.stream.read_exact(&mut kind)?;
        if &kind == b"IMA2" || &kind == b"IMAG" {
            let save = ctx.stream.position()?;
            ctx.stream.seek(SeekFrom::Start(offset + 4))?;
            let format = ctx.stream.read_u32()?;
            ctx.stream.read_u32()?;
            let width = ctx.stream.read_u32()?;
            let height = ctx.stream.read_u32()?;
            ctx.stream.read_u32()?;
            // Pick the biggest section, it is the sensor payload.
            if width > ctx.desc.raw_width {
                ctx.desc.raw_width = width;
                ctx.desc.raw_height = height;
                ctx.desc.width = width;
                ctx.desc.height = height;
                ctx.desc.data_offset = offset + 28;
                ctx.desc.load_flags = format;
            }
            ctx.stream.seek(SeekFrom::Start(save))?;
        }
    }
    if ctx.desc.raw_width == 0 {
        return Err(Error::InvalidFormat);
    }
    ctx.desc.make = "Sigma".to_string();
    ctx.desc.cfa = crate::mosaic::CfaPattern::Linear;
    ctx.desc.colors = 3;
    ctx.desc.decoder = Decoder::Foveon;
    ctx.desc.bits_per_sample = 14;
    ctx.desc.maximum = 0x3fff;
    Ok(())
}

/// Decode the three planes. The dp "area" variant stores per-row
/// seeds; the sd variant runs one tree over difference triplets with
/// the 1024-entry start table.
pub(crate) fn foveon_load_raw(ctx: &mut FileContext) -> Result<()> {
    ctx.stream.seek(SeekFrom::Start(ctx.desc.data_offset))?;
    let width = ctx.desc.raw_width as usize;
    let height = ctx.desc.raw_height as usize;

    // The code table: 1024 entries of (size, code).
    let mut tree = Tree::new();
    {
        // Leading table of code lengths, 1 byte each for 30 leaves.
        // Codes are canonical: assigned in (length, leaf) order.
        let mut lengths = [0_u8; 30];
        ctx.stream.read_exact(&mut lengths)?;
        let mut leaves: Vec<(u32, usize)> = lengths
            .iter()
            .enumerate()
            .filter(|(_, len)| **len != 0)
            .map(|(leaf, len)| (*len as u32, leaf))
            .collect();
        leaves.sort_unstable();
        let mut code = 0_u32;
        let mut prev_len = 0_u32;
        for (len, leaf) in leaves {
            if prev_len != 0 {
                code = (code + 1) << (len - prev_len);
            }
            prev_len = len;
            tree.insert(len, code, leaf as i8 - 15)?;
        }
    }
    let mut dtable = [0_u16; 1024];
    for d in dtable.iter_mut() {
        *d = ctx.stream.read_u16()?;
    }

    // The entropy-coded payload runs to the end of the section.
    let pos = ctx.stream.position()?;
    let end = ctx.stream.len()?;
    let payload = ctx.stream.read_vec((end - pos) as usize)?;
    let mut bits = BitReader::new(&payload);

    let mut corrupt = 0_u32;
    let mut prev = [0_i32; 3];
    for row in 0..height {
        for c in prev.iter_mut() {
            *c = 0;
        }
        for col in 0..width {
            for c in 0..3 {
                let start = dtable[(prev[c] as usize) & 1023] as i32;
                let diff = match tree.decode(&mut bits) {
                    Ok(d) => d as i32,
                    Err(_) => {
                        // Invalid code or truncated payload.
                        ctx.derror_count(corrupt + 1);
                        return Ok(());
                    }
                };
                prev[c] = start + (diff << 2);
                if prev[c] < 0 {
                    prev[c] = 0;
                }
                if prev[c] >> 14 != 0 {
                    corrupt += 1;
                    prev[c] &= 0x3fff;
                }
                ctx.image.data[(row * width + col) * 4 + c] = prev[c] as u16;
            }
        }
    }
    ctx.derror_count(corrupt);
    Ok(())
}
