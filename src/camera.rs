// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - camera.rs
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

//! The camera image descriptor. Populated by the container parsers
//! and the identification step, consumed by the decoders and the
//! pipeline stages.

use crate::mosaic::CfaPattern;

/// Which routine handles the sensor payload, decided by
/// identification. The decode stage matches on this.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Decoder {
    /// No raw payload was found.
    #[default]
    None,
    /// Fixed-width 16-bit samples.
    Unpacked { big_endian: bool },
    /// 10/12/14-bit packed rows, parameters in `load_flags`.
    Packed,
    /// Byte stream through the linearization LUT.
    EightBit,
    /// Predictive Huffman over 1-4 components. Canon CR2, lossless
    /// DNG, Adobe-style strips.
    LosslessJpeg,
    /// Lossy JPEG payloads in DNG, through the external decoder.
    LossyJpegDng,
    /// Canon CRW decompression.
    CanonCompressed,
    /// Canon sRAW YCbCr.
    CanonSRaw,
    /// PowerShot 600 interlaced 10-bit groups.
    Canon600,
    /// Canon RMF packed triplets.
    CanonRmf,
    NikonCompressed,
    NikonYuv,
    SonyArw,
    SonyArw2,
    PanasonicRw2,
    OlympusCompressed,
    PentaxCompressed,
    SamsungSrw,
    SamsungSrw2,
    SamsungSrw3,
    Hasselblad,
    PhaseOne,
    KodakDc120,
    Kodak262,
    Kodak65000,
    KodakYcbcr,
    KodakRgb,
    KodakC330,
    KodakC603,
    SmalV6,
    SmalV9,
    Foveon,
    MinoltaRd175,
    Quicktake,
    /// Fuji diagonal-sensor unpack with the layout remap.
    Fuji,
    Rollei,
    Nokia,
    Sinar4Shot,
    LeafHdr,
    ImaconFull,
    /// Payloads that need an external codec (Canon CRX tiles, REDCODE
    /// wavelet). Decoded through the narrow external interface when a
    /// collaborator provides one; reported unsupported otherwise.
    External(ExternalCodec),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ExternalCodec {
    Crx,
    Jpeg2000,
}

/// Phase One / Mamiya IIQ decode parameters, read from the IIQ
/// directory and consumed by the decoder and its corrections.
#[derive(Clone, Debug, Default)]
pub struct PhaseOneInfo {
    pub format: u32,
    pub key_off: u32,
    pub tag_21a: u32,
    pub t_black: i32,
    pub split_col: u32,
    pub black_col: u32,
    pub split_row: u32,
    pub black_row: u32,
    pub tag_210: f32,
}

/// Everything the pipeline needs to know about the image, derived
/// fresh from the file for each invocation.
#[derive(Clone, Debug)]
pub struct Descriptor {
    pub make: String,
    pub model: String,
    pub model2: String,
    pub software: String,

    /// Physical payload dimensions.
    pub raw_width: u32,
    pub raw_height: u32,
    /// Active rectangle inside the raw plane.
    pub width: u32,
    pub height: u32,
    pub top_margin: u32,
    pub left_margin: u32,

    pub bits_per_sample: u16,
    pub compression: u16,
    pub cfa: CfaPattern,
    pub colors: u8,

    pub black: u32,
    pub cblack: [u32; 4],
    pub maximum: u32,

    /// As-shot white balance.
    pub cam_mul: [f32; 4],
    /// Camera neutral, from the colour matrix row sums.
    pub pre_mul: [f32; 4],
    /// XYZ -> camera, 3 or 4 rows. Row-major.
    pub cam_xyz: Option<[[f64; 3]; 4]>,
    /// camera -> sRGB primaries, built by identification.
    pub rgb_cam: [[f32; 4]; 3],
    /// Identity camera colour, e.g. unmatched monochrome backs.
    pub raw_color: bool,

    pub flip: u16,
    pub pixel_aspect: f64,
    pub fuji_width: u32,
    pub fuji_layout: u32,

    pub decoder: Decoder,
    pub load_flags: u32,
    pub data_offset: u64,
    pub meta_offset: u64,
    pub meta_length: u32,
    /// Offset of the per-row / per-strip offset table.
    pub strip_offset: u64,
    /// Samples per pixel as stored, for the multi-sample backs.
    pub tiff_samples: u16,
    pub tile_width: u32,
    pub tile_length: u32,
    pub cr2_slices: [u16; 3],
    pub sraw_mul: [u16; 4],
    pub ph1: PhaseOneInfo,

    /// Vendor model ID when the maker note carries one.
    pub unique_id: u32,
    /// The payload is Canon sRAW YCbCr rather than a CFA.
    pub is_sraw: bool,
    /// Number of shots in the file; 0 means no raw payload.
    pub is_raw: u32,
    pub shot_select: u32,
    pub dng_version: u32,
    /// Replace zero-valued pixels from neighbours after loading.
    pub zero_is_bad: bool,
    /// Masked pixel rectangles, each (top, left, bottom, right).
    pub mask: [[i32; 4]; 8],

    pub iso_speed: f32,
    pub shutter: f32,
    pub aperture: f32,
    pub focal_len: f32,
    /// Seconds since the epoch, from the container.
    pub timestamp: i64,
    pub shot_order: u32,
}

impl Default for Descriptor {
    fn default() -> Descriptor {
        Descriptor {
            make: String::new(),
            model: String::new(),
            model2: String::new(),
            software: String::new(),
            raw_width: 0,
            raw_height: 0,
            width: 0,
            height: 0,
            top_margin: 0,
            left_margin: 0,
            bits_per_sample: 0,
            compression: 0,
            cfa: CfaPattern::default(),
            colors: 3,
            black: 0,
            cblack: [0; 4],
            maximum: 0,
            cam_mul: [0.0; 4],
            pre_mul: [1.0, 1.0, 1.0, 1.0],
            cam_xyz: None,
            rgb_cam: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
            ],
            raw_color: true,
            flip: 0,
            pixel_aspect: 1.0,
            fuji_width: 0,
            fuji_layout: 0,
            decoder: Decoder::None,
            load_flags: 0,
            data_offset: 0,
            meta_offset: 0,
            meta_length: 0,
            strip_offset: 0,
            tiff_samples: 1,
            tile_width: u32::MAX,
            tile_length: u32::MAX,
            cr2_slices: [0; 3],
            sraw_mul: [0; 4],
            ph1: PhaseOneInfo::default(),
            unique_id: 0,
            is_sraw: false,
            is_raw: 1,
            shot_select: 0,
            dng_version: 0,
            zero_is_bad: false,
            mask: [[0; 4]; 8],
            iso_speed: 0.0,
            shutter: 0.0,
            aperture: 0.0,
            focal_len: 0.0,
            timestamp: 0,
            shot_order: 0,
        }
    }
}

/// Canonical vendor names. `normalize_make` maps the free text the
/// camera wrote into one of these.
static CANONICAL_MAKES: &[&str] = &[
    "AgfaPhoto",
    "Canon",
    "Casio",
    "Epson",
    "Fujifilm",
    "Hasselblad",
    "Kodak",
    "Konica",
    "Leica",
    "Mamiya",
    "Minolta",
    "Motorola",
    "Nikon",
    "Nokia",
    "Olympus",
    "Panasonic",
    "Pentax",
    "Phase One",
    "Ricoh",
    "Samsung",
    "Sigma",
    "Sinar",
    "Sony",
];

impl Descriptor {
    /// Normalize make/model: canonical vendor name, trailing spaces
    /// stripped, vendor prefix removed from the model.
    pub fn normalize_names(&mut self) {
        // A few vendors hide behind OEM names.
        if self.make.starts_with("KONICA MINOLTA") {
            self.make = "Minolta".to_string();
        }
        for canonical in CANONICAL_MAKES {
            if self
                .make
                .to_ascii_uppercase()
                .starts_with(&canonical.to_ascii_uppercase())
            {
                self.make = canonical.to_string();
                break;
            }
        }
        self.make = self.make.trim_end().to_string();
        self.model = self.model.trim_end().to_string();
        // Strip "Canon " from "Canon EOS ...", etc.
        let prefix = format!("{} ", self.make);
        if let Some(stripped) = self
            .model
            .strip_prefix(&prefix)
            .or_else(|| self.model.strip_prefix(self.make.to_ascii_uppercase().as_str()))
        {
            self.model = stripped.trim_start().to_string();
        }
    }

    /// "Make Model" for table lookups and diagnostics.
    pub fn id_string(&self) -> String {
        format!("{} {}", self.make, self.model)
    }

    /// The colour of the raw plane site (`row`, `col`) relative to
    /// the active rectangle.
    #[inline]
    pub fn fc(&self, row: u32, col: u32) -> usize {
        self.cfa.fc(row, col)
    }
}

#[cfg(test)]
mod test {
    use super::Descriptor;

    #[test]
    fn test_normalize_names() {
        let mut desc = Descriptor {
            make: "NIKON CORPORATION".to_string(),
            model: "NIKON D700".to_string(),
            ..Descriptor::default()
        };
        desc.normalize_names();
        assert_eq!(desc.make, "Nikon");
        assert_eq!(desc.model, "D700");

        let mut desc = Descriptor {
            make: "Canon".to_string(),
            model: "Canon EOS 5D Mark II ".to_string(),
            ..Descriptor::default()
        };
        desc.normalize_names();
        assert_eq!(desc.make, "Canon");
        assert_eq!(desc.model, "EOS 5D Mark II");

        let mut desc = Descriptor {
            make: "KONICA MINOLTA ".to_string(),
            model: "MAXXUM 7D".to_string(),
            ..Descriptor::default()
        };
        desc.normalize_names();
        assert_eq!(desc.make, "Minolta");
        assert_eq!(desc.model, "MAXXUM 7D");

        let mut desc = Descriptor {
            make: "OLYMPUS IMAGING CORP.".to_string(),
            model: "E-M5".to_string(),
            ..Descriptor::default()
        };
        desc.normalize_names();
        assert_eq!(desc.make, "Olympus");
    }
}
