// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - tests/pipeline.rs
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

//! End-to-end scenarios over synthetic in-memory raws.

use rawdev::{develop, identify_file, write_pnm, DemosaicAlgorithm, Params, Stream};

struct IfdEntry {
    tag: u16,
    type_: u16,
    count: u32,
    value: u32,
}

/// Build a bare-bones CFA TIFF around 16-bit samples.
fn synthetic_tiff(width: u16, height: u16, samples: &[u16], cfa: [u8; 4]) -> Vec<u8> {
    let nentries = 9_u16;
    let ifd_start = 8_u32;
    let data_start = ifd_start + 2 + nentries as u32 * 12 + 4;

    let cfa_value = u32::from_le_bytes(cfa);
    let entries = [
        IfdEntry { tag: 0x100, type_: 3, count: 1, value: width as u32 },
        IfdEntry { tag: 0x101, type_: 3, count: 1, value: height as u32 },
        IfdEntry { tag: 0x102, type_: 3, count: 1, value: 16 },
        IfdEntry { tag: 0x103, type_: 3, count: 1, value: 1 },
        IfdEntry { tag: 0x106, type_: 3, count: 1, value: 32803 },
        IfdEntry { tag: 0x111, type_: 4, count: 1, value: data_start },
        IfdEntry { tag: 0x115, type_: 3, count: 1, value: 1 },
        IfdEntry {
            tag: 0x117,
            type_: 4,
            count: 1,
            value: samples.len() as u32 * 2,
        },
        IfdEntry { tag: 0x828e, type_: 1, count: 4, value: cfa_value },
    ];

    let mut data = b"II\x2a\x00".to_vec();
    data.extend_from_slice(&ifd_start.to_le_bytes());
    data.extend_from_slice(&nentries.to_le_bytes());
    for e in &entries {
        data.extend_from_slice(&e.tag.to_le_bytes());
        data.extend_from_slice(&e.type_.to_le_bytes());
        data.extend_from_slice(&e.count.to_le_bytes());
        if e.type_ == 3 && e.count == 1 {
            data.extend_from_slice(&(e.value as u16).to_le_bytes());
            data.extend_from_slice(&0_u16.to_le_bytes());
        } else {
            data.extend_from_slice(&e.value.to_le_bytes());
        }
    }
    data.extend_from_slice(&0_u32.to_le_bytes());
    for s in samples {
        data.extend_from_slice(&s.to_le_bytes());
    }
    data
}

fn neutral_params() -> Params {
    Params {
        user_mul: [1.0, 1.0, 1.0, 1.0],
        gamma: [1.0, 1.0],
        no_auto_bright: true,
        user_qual: Some(DemosaicAlgorithm::Bilinear),
        ..Params::default()
    }
}

fn stream_of(data: Vec<u8>) -> Stream {
    Stream::new(Box::new(std::io::Cursor::new(data)))
}

#[rustfmt::skip]
const RGGB_4X4: [u16; 16] = [
    10, 20, 10, 20,
    30, 40, 30, 40,
    10, 20, 10, 20,
    30, 40, 30, 40,
];

#[test]
fn test_identify_synthetic_tiff() {
    let data = synthetic_tiff(4, 4, &RGGB_4X4, [0, 1, 1, 2]);
    let desc = identify_file(stream_of(data), Params::default(), "synthetic").unwrap();
    assert_eq!(desc.raw_width, 4);
    assert_eq!(desc.raw_height, 4);
    assert_eq!(desc.bits_per_sample, 16);
    assert_eq!(desc.is_raw, 1);
}

#[test]
fn test_develop_bilinear_rggb() {
    let data = synthetic_tiff(4, 4, &RGGB_4X4, [0, 1, 1, 2]);
    let ctx = develop(stream_of(data), neutral_params(), "synthetic").unwrap();
    assert_eq!(ctx.image.width, 4);
    assert_eq!(ctx.image.height, 4);
    // The blue site at (1,1): own blue, diagonal reds, the green
    // average of the four cardinal neighbours.
    let pix = ctx.image.pixel_at(1, 1).unwrap();
    assert_eq!(pix[0], 10);
    assert_eq!(pix[1], 25);
    assert_eq!(pix[2], 40);
    // Demosaic coverage: all interior channels populated.
    for row in 1..3_u32 {
        for col in 1..3_u32 {
            let pix = ctx.image.pixel_at(row, col).unwrap();
            for c in 0..3 {
                assert_ne!(pix[c], 0, "empty channel {} at {},{}", c, row, col);
            }
        }
    }
}

#[test]
fn test_white_balance_idempotence() {
    // Multipliers of one leave the working image at the raw values
    // (no black to subtract, 16-bit range already).
    let data = synthetic_tiff(4, 4, &RGGB_4X4, [0, 1, 1, 2]);
    let ctx = develop(stream_of(data), neutral_params(), "synthetic").unwrap();
    // Site values survived scaling untouched.
    assert_eq!(ctx.image.pixel_at(1, 1).unwrap()[2], 40);
    assert_eq!(ctx.image.pixel_at(0, 0).unwrap()[0], 10);
}

#[test]
fn test_geometry_bounds() {
    let data = synthetic_tiff(6, 4, &[100; 24], [0, 1, 1, 2]);
    let desc = identify_file(stream_of(data), Params::default(), "synthetic").unwrap();
    assert!(desc.width <= desc.raw_width - desc.left_margin);
    assert!(desc.height <= desc.raw_height - desc.top_margin);
    assert!(desc.width * desc.height > 0);
}

#[test]
fn test_flip_via_user_flag() {
    let data = synthetic_tiff(4, 4, &RGGB_4X4, [0, 1, 1, 2]);
    let mut params = neutral_params();
    params.output_bps = 16;
    // 180 degree rotation.
    params.user_flip = Some(3);
    let mut ctx = develop(stream_of(data), params, "synthetic").unwrap();
    let mut out = Vec::new();
    write_pnm(&mut ctx, &mut out).unwrap();
    assert!(out.starts_with(b"P6\n4 4\n65535\n"));

    // The first written pixel is the old bottom-right corner; with
    // the unity curve its blue channel came from the (3,3) area.
    let hdr = b"P6\n4 4\n65535\n".len();
    let first_r = u16::from_be_bytes([out[hdr], out[hdr + 1]]);
    let unflipped = ctx.image.pixel_at(3, 3).unwrap()[0];
    assert_eq!(first_r, unflipped);
}

#[test]
fn test_highlight_clip_bound() {
    // In clip mode no output channel exceeds the white point.
    let bright: Vec<u16> = (0..16).map(|i| 60000 + i * 300).collect();
    let data = synthetic_tiff(4, 4, &bright, [0, 1, 1, 2]);
    let ctx = develop(stream_of(data), neutral_params(), "synthetic").unwrap();
    for v in &ctx.image.data {
        assert!(*v <= 65535);
    }
}

#[test]
fn test_develop_is_deterministic() {
    // Two developments of the same bytes produce bit-identical
    // output, parallel interpolation included.
    let mut params = neutral_params();
    params.user_qual = Some(DemosaicAlgorithm::Ahd);
    let crc = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
    let mut sums = Vec::new();
    for _ in 0..2 {
        let data = synthetic_tiff(4, 4, &RGGB_4X4, [0, 1, 1, 2]);
        let ctx = develop(stream_of(data), params.clone(), "synthetic").unwrap();
        let mut digest = crc.digest();
        for v in &ctx.image.data {
            digest.update(&v.to_le_bytes());
        }
        sums.push(digest.finalize());
    }
    assert_eq!(sums[0], sums[1]);
}

#[test]
fn test_unrecognized_input() {
    let junk = vec![0x42_u8; 4000];
    assert!(develop(stream_of(junk), Params::default(), "junk").is_err());
}

#[test]
fn test_monochrome_tiff() {
    // PhotometricInterpretation 1 develops as a single channel.
    let mut data = synthetic_tiff(4, 4, &[500; 16], [0, 1, 1, 2]);
    // Patch photometric to MinIsBlack; entry 5, value offset inside
    // the IFD.
    let entry_base = 8 + 2 + 4 * 12;
    data[entry_base + 8] = 1;
    data[entry_base + 9] = 0;
    let ctx = develop(stream_of(data), neutral_params(), "synthetic").unwrap();
    assert_eq!(ctx.desc.colors, 1);
    assert_eq!(ctx.image.pixel_at(2, 2).unwrap()[0], 500);
}
