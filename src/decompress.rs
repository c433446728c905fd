// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - decompress.rs
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

//! Bit readers and Huffman primitives shared by the payload decoders.
//!
//! The readers are first-class objects over a [`Stream`], with an
//! explicit [`BitPump::reset`].

pub(crate) mod ljpeg;

use crate::io::Stream;
use crate::Result;

/// A canonical Huffman table in the flat lookup form: entry `i`,
/// indexed by `max_bits` peeked bits, holds `length << 8 | value`.
#[derive(Clone, Debug, Default)]
pub(crate) struct HuffTable {
    pub max_bits: u8,
    pub table: Vec<u16>,
}

impl HuffTable {
    /// Build the table from a specification: the first 16 bytes give
    /// how many codes are 1-bit, 2-bit, 3-bit long etc.; the bytes
    /// after that are the values in code order.
    pub fn new(source: &[u8]) -> HuffTable {
        let count = &source[..16];
        let mut max = 16_usize;
        while max > 0 && count[max - 1] == 0 {
            max -= 1;
        }
        let mut table = vec![0_u16; 1 + (1 << max)];
        let mut values = source[16..].iter();
        let mut h = 1_usize;
        for len in 1..=max {
            for _ in 0..count[len - 1] {
                let value = *values.next().unwrap_or(&0) as u16;
                for _ in 0..1 << (max - len) {
                    if h <= 1 << max {
                        table[h] = (len as u16) << 8 | value;
                        h += 1;
                    }
                }
            }
        }
        HuffTable {
            max_bits: max as u8,
            table,
        }
    }

    /// Build from pre-baked `length << 8 | value` entries replicated
    /// over a `1 << max_bits` lookup, the form some vendors store.
    pub fn from_entries(max_bits: u8, entries: &[u16]) -> HuffTable {
        let mut table = vec![0_u16; 1 + (1 << max_bits)];
        let mut n = 0_usize;
        for e in entries {
            for _ in 0..(1 << max_bits) >> (e >> 8) {
                n += 1;
                if n < table.len() {
                    table[n] = *e;
                }
            }
        }
        HuffTable {
            max_bits,
            table,
        }
    }
}

/// MSB-first bit reader over the stream, byte-fed.
///
/// Truncated input is padded with zero bits; the first short read is
/// recorded in `truncated` so the caller can count it as corrupt data
/// and keep going, which is what the decoders want.
pub(crate) struct BitPump<'a> {
    stream: &'a mut Stream,
    bitbuf: u64,
    vbits: i32,
    /// In JPEG-style streams a 0xff data byte is followed by a stuffed
    /// 0x00; a 0xff followed by anything else stops the feed.
    pub zero_after_ff: bool,
    marker_hit: bool,
    pub truncated: bool,
}

impl<'a> BitPump<'a> {
    pub fn new(stream: &'a mut Stream) -> BitPump<'a> {
        BitPump {
            stream,
            bitbuf: 0,
            vbits: 0,
            zero_after_ff: false,
            marker_hit: false,
            truncated: false,
        }
    }

    pub fn zero_after_ff(mut self, zero_after_ff: bool) -> BitPump<'a> {
        self.zero_after_ff = zero_after_ff;
        self
    }

    /// Discard buffered bits, e.g. after a seek or a restart marker.
    pub fn reset(&mut self) {
        self.bitbuf = 0;
        self.vbits = 0;
        self.marker_hit = false;
    }

    pub fn stream(&mut self) -> &mut Stream {
        self.stream
    }

    fn fill(&mut self, nbits: i32) {
        while !self.marker_hit && self.vbits < nbits {
            let c = match self.stream.read_u8() {
                Ok(c) => c,
                Err(_) => {
                    self.truncated = true;
                    0
                }
            };
            if self.zero_after_ff && c == 0xff {
                match self.stream.read_u8() {
                    Ok(0) => (),
                    _ => {
                        self.marker_hit = true;
                        break;
                    }
                }
            }
            self.bitbuf = (self.bitbuf << 8) + c as u64;
            self.vbits += 8;
        }
        // A marker or EOF pads with zero bits.
        if self.vbits < nbits {
            self.bitbuf <<= nbits - self.vbits;
            self.vbits = nbits;
        }
    }

    /// Read `nbits` (<= 25) MSB-first.
    pub fn get_bits(&mut self, nbits: u8) -> u32 {
        if nbits == 0 {
            return 0;
        }
        self.fill(nbits as i32);
        let c = (self.bitbuf << (64 - self.vbits) >> (64 - nbits as i32)) as u32;
        self.vbits -= nbits as i32;
        c
    }

    /// Peek `nbits` without consuming.
    pub fn peek_bits(&mut self, nbits: u8) -> u32 {
        self.fill(nbits as i32);
        (self.bitbuf << (64 - self.vbits) >> (64 - nbits as i32)) as u32
    }

    pub fn consume(&mut self, nbits: u8) {
        self.vbits -= nbits as i32;
    }

    /// Decode one Huffman value. The lookup is 1-based: the first
    /// filled slot corresponds to the all-zeros code.
    pub fn get_huff(&mut self, huff: &HuffTable) -> u8 {
        let c = self.peek_bits(huff.max_bits) as usize;
        let entry = huff.table[c + 1];
        self.consume((entry >> 8) as u8);
        entry as u8
    }

    /// The signed difference code used by the predictive decoders:
    /// a Huffman-coded length followed by that many bits, with the
    /// one's complement rule for negatives.
    pub fn huff_diff(&mut self, huff: &HuffTable) -> i32 {
        let len = self.get_huff(huff);
        if len == 16 {
            return -32768;
        }
        let mut diff = self.get_bits(len) as i32;
        if len > 0 && diff & (1 << (len - 1)) == 0 {
            diff -= (1 << len) - 1;
        }
        diff
    }
}

/// 32-bit word-fed bit reader, used by Phase One, Hasselblad and
/// Samsung payloads. Words are read in the stream's byte order.
pub(crate) struct Ph1BitPump<'a> {
    stream: &'a mut Stream,
    bitbuf: u64,
    vbits: i32,
    pub truncated: bool,
}

impl<'a> Ph1BitPump<'a> {
    pub fn new(stream: &'a mut Stream) -> Ph1BitPump<'a> {
        Ph1BitPump {
            stream,
            bitbuf: 0,
            vbits: 0,
            truncated: false,
        }
    }

    pub fn reset(&mut self) {
        self.bitbuf = 0;
        self.vbits = 0;
    }

    pub fn stream(&mut self) -> &mut Stream {
        self.stream
    }

    pub fn get_bits(&mut self, nbits: u8) -> u32 {
        if nbits == 0 {
            return 0;
        }
        if self.vbits < nbits as i32 {
            let word = match self.stream.read_u32() {
                Ok(w) => w,
                Err(_) => {
                    self.truncated = true;
                    0
                }
            };
            self.bitbuf = self.bitbuf << 32 | word as u64;
            self.vbits += 32;
        }
        let c = (self.bitbuf << (64 - self.vbits) >> (64 - nbits as i32)) as u32;
        self.vbits -= nbits as i32;
        c
    }

    pub fn get_huff(&mut self, huff: &HuffTable) -> u8 {
        if self.vbits < huff.max_bits as i32 {
            let word = match self.stream.read_u32() {
                Ok(w) => w,
                Err(_) => {
                    self.truncated = true;
                    0
                }
            };
            self.bitbuf = self.bitbuf << 32 | word as u64;
            self.vbits += 32;
        }
        let c = (self.bitbuf << (64 - self.vbits) >> (64 - huff.max_bits as i32)) as usize;
        let entry = huff.table[c + 1];
        self.vbits -= (entry >> 8) as i32;
        entry as u8
    }
}

#[cfg(test)]
mod test {
    use crate::io::Stream;

    use super::{BitPump, HuffTable, Ph1BitPump};

    fn stream_of(bytes: &[u8]) -> Stream {
        Stream::new(Box::new(std::io::Cursor::new(bytes.to_vec())))
    }

    #[test]
    fn test_get_bits() {
        let mut stream = stream_of(&[0b1010_1010, 0b1100_0011]);
        let mut pump = BitPump::new(&mut stream);
        assert_eq!(pump.get_bits(3), 0b101);
        assert_eq!(pump.get_bits(5), 0b01010);
        assert_eq!(pump.get_bits(8), 0b1100_0011);
        // Padded with zeros after EOF.
        assert_eq!(pump.get_bits(4), 0);
        assert!(pump.truncated);
    }

    #[test]
    fn test_reset() {
        let mut stream = stream_of(&[0xff, 0x00, 0x80]);
        let mut pump = BitPump::new(&mut stream).zero_after_ff(true);
        // The stuffed zero byte is skipped.
        assert_eq!(pump.get_bits(8), 0xff);
        assert_eq!(pump.get_bits(1), 1);
        pump.reset();
        assert_eq!(pump.get_bits(7), 0);
    }

    #[test]
    fn test_huffman() {
        // 00 -> 4, 01x -> 3/5, 10x -> 6/2, 110x -> 7/1 ...
        let source: [u8; 29] = [
            0, 1, 4, 2, 3, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x04, 0x03, 0x05, 0x06, 0x02, 0x07,
            0x01, 0x08, 0x09, 0x00, 0x0a, 0x0b, 0xff,
        ];
        let huff = HuffTable::new(&source);
        assert_eq!(huff.max_bits, 7);

        let mut stream = stream_of(&[0b0001_0011, 0b0110_1000]);
        let mut pump = BitPump::new(&mut stream);
        assert_eq!(pump.get_huff(&huff), 0x04);
        assert_eq!(pump.get_huff(&huff), 0x03);
        assert_eq!(pump.get_huff(&huff), 0x05);
        assert_eq!(pump.get_huff(&huff), 0x05);
    }

    #[test]
    fn test_huff_diff() {
        let source: [u8; 29] = [
            0, 1, 4, 2, 3, 1, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x04, 0x03, 0x05, 0x06, 0x02, 0x07,
            0x01, 0x08, 0x09, 0x00, 0x0a, 0x0b, 0xff,
        ];
        let huff = HuffTable::new(&source);
        // code 00 -> len 4, then 4 bits 0b1011 = 11 positive.
        let mut stream = stream_of(&[0b0010_1100, 0]);
        let mut pump = BitPump::new(&mut stream);
        assert_eq!(pump.huff_diff(&huff), 11);
        // len 4, bits 0b0100 with high bit clear -> 4 - 15 = -11.
        let mut stream = stream_of(&[0b0001_0000, 0]);
        let mut pump = BitPump::new(&mut stream);
        assert_eq!(pump.huff_diff(&huff), -11);
    }

    #[test]
    fn test_ph1_bits_little_endian() {
        let mut stream = stream_of(&[0x78, 0x56, 0x34, 0x12]);
        let mut pump = Ph1BitPump::new(&mut stream);
        assert_eq!(pump.get_bits(16), 0x1234);
        assert_eq!(pump.get_bits(16), 0x5678);
    }
}
