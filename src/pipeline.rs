// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - pipeline.rs
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

//! The per-file pipeline. A [`FileContext`] owns the stream, the
//! descriptor, the raw plane and the working image; it is created
//! for one file and dropped before the next one. Any error returned
//! from [`develop`] unwinds the context, so "fail this file,
//! continue with the next" is just a `?` in the driver.

pub(crate) mod colourspace;
pub(crate) mod demosaic;
pub(crate) mod finish;
pub(crate) mod highlight;
pub(crate) mod preprocess;
pub(crate) mod scale;
pub(crate) mod xtrans;

use std::io::SeekFrom;

use log::{debug, warn};

use crate::bitmap::ImageBuffer;
use crate::camera::{Decoder, Descriptor, ExternalCodec};
use crate::io::Stream;
use crate::params::{DemosaicAlgorithm, Params};
use crate::{apple, canon, dng, fujifilm, hasselblad, kodak, minolta, misc, nikon, olympus,
            panasonic, pentax, phaseone, samsung, smal, sony, standard, x3f};
use crate::{identify, Error, Result};

/// Everything owned for the duration of one file.
pub struct FileContext {
    pub stream: Stream,
    pub desc: Descriptor,
    pub params: Params,
    /// The raw plane, `raw_width x raw_height`, single component.
    /// Consumed by demosaic.
    pub raw: ImageBuffer<u16>,
    /// The working image, `width x height x 4`.
    pub image: ImageBuffer<u16>,
    /// Linearization / tone LUT, 0x10000 entries. Identity unless a
    /// parser or decoder replaces it.
    pub curve: Vec<u16>,
    /// Per-site black pattern from DNG BlackLevel, 2x2.
    pub cblack_pattern: [u32; 4],
    /// Corrupt-data counter. Sticky for diagnostics: only the first
    /// corruption is reported.
    pub data_error: u32,
    /// Input name for diagnostics.
    pub input: String,
    /// Offsets of tiles or strips when the payload is split.
    pub tile_offsets: Vec<u64>,
    /// Byte counts matching `tile_offsets`.
    pub tile_sizes: Vec<u64>,
    /// Candidate payload directories gathered by the TIFF walker.
    pub(crate) tiff_ifds: Vec<crate::tiff::parse::TiffIfd>,
    /// The histogram the auto-brightness stage feeds on.
    pub histogram: Box<[[u32; 0x2000]; 4]>,
}

impl FileContext {
    pub fn new(stream: Stream, params: Params, input: &str) -> FileContext {
        FileContext {
            stream,
            desc: Descriptor::default(),
            params,
            raw: ImageBuffer::default(),
            image: ImageBuffer::default(),
            curve: (0..0x10000).map(|i| i as u16).collect(),
            cblack_pattern: [0; 4],
            data_error: 0,
            input: input.to_string(),
            tile_offsets: Vec::new(),
            tile_sizes: Vec::new(),
            tiff_ifds: Vec::new(),
            histogram: Box::new([[0; 0x2000]; 4]),
        }
    }

    /// Report corrupt data once, keep counting.
    pub(crate) fn derror(&mut self) {
        if self.data_error == 0 {
            let pos = self.stream.position().unwrap_or(0);
            warn!("{}: corrupt data near {:#x}", self.input, pos);
        }
        self.data_error += 1;
    }

    pub(crate) fn derror_count(&mut self, count: u32) {
        if count > 0 {
            self.derror();
            self.data_error += count - 1;
        }
    }

    /// Allocate the raw plane from the descriptor geometry.
    pub(crate) fn alloc_raw(&mut self) -> Result<()> {
        self.raw = ImageBuffer::new(
            self.desc.raw_width,
            self.desc.raw_height,
            self.desc.bits_per_sample,
            1,
        )?;
        Ok(())
    }

    /// Allocate the working image from the active rectangle.
    pub(crate) fn alloc_image(&mut self) -> Result<()> {
        self.image = ImageBuffer::new(self.desc.width, self.desc.height, 16, 4)?;
        Ok(())
    }

    #[inline]
    pub(crate) fn raw_idx(&self, row: u32, col: u32) -> usize {
        row as usize * self.desc.raw_width as usize + col as usize
    }
}

/// Identify without decoding: parse the containers and finalize the
/// descriptor. This is the `-i` surface.
pub fn identify_file(stream: Stream, params: Params, input: &str) -> Result<Descriptor> {
    let mut ctx = FileContext::new(stream, params, input);
    identify::identify(&mut ctx)?;
    Ok(ctx.desc)
}

/// Decode and develop one file: the full A to H sequence. On success
/// the context holds the final image; `FileContext::image` has
/// `colors` meaningful channels.
pub fn develop(stream: Stream, params: Params, input: &str) -> Result<FileContext> {
    let mut ctx = FileContext::new(stream, params, input);

    identify::identify(&mut ctx)?;
    if ctx.desc.is_raw == 0 || ctx.desc.decoder == Decoder::None {
        return Err(Error::UnrecognizedFormat);
    }
    if ctx.params.shot_select >= ctx.desc.is_raw {
        warn!(
            "{}: \"-s {}\" requests a nonexistent image",
            ctx.input, ctx.params.shot_select
        );
    }

    load_raw(&mut ctx)?;
    preprocess::run(&mut ctx)?;
    scale::run(&mut ctx)?;
    demosaic_stage(&mut ctx)?;
    highlight::run(&mut ctx)?;
    colourspace::run(&mut ctx)?;
    finish::run(&mut ctx)?;

    Ok(ctx)
}

/// Dispatch on the decoder sum type, C in the pipeline.
pub(crate) fn load_raw(ctx: &mut FileContext) -> Result<()> {
    // Linear sensors decode straight into the working image.
    let mosaic = ctx.desc.cfa.is_mosaic() || ctx.desc.colors == 1;
    if mosaic && !matches!(ctx.desc.decoder, Decoder::Foveon) {
        ctx.alloc_raw()?;
    } else {
        ctx.alloc_image()?;
    }

    debug!("load_raw with {:?}", ctx.desc.decoder);
    ctx.stream
        .seek(SeekFrom::Start(ctx.desc.data_offset))?;

    match ctx.desc.decoder.clone() {
        Decoder::None => return Err(Error::UnrecognizedFormat),
        Decoder::Unpacked { big_endian } => standard::unpacked_load_raw(ctx, big_endian)?,
        Decoder::Packed => {
            if ctx.desc.dng_version != 0 {
                dng::packed_dng_load_raw(ctx)?
            } else {
                standard::packed_load_raw(ctx)?
            }
        }
        Decoder::EightBit => standard::eight_bit_load_raw(ctx)?,
        Decoder::LosslessJpeg => {
            if ctx.desc.dng_version != 0 {
                dng::lossless_dng_load_raw(ctx)?
            } else {
                standard::lossless_jpeg_load_raw(ctx)?
            }
        }
        Decoder::LossyJpegDng => dng::lossy_dng_load_raw(ctx)?,
        Decoder::CanonCompressed => canon::canon_compressed_load_raw(ctx)?,
        Decoder::CanonSRaw => canon::canon_sraw_load_raw(ctx)?,
        Decoder::Canon600 => canon::canon_600_load_raw(ctx)?,
        Decoder::CanonRmf => canon::canon_rmf_load_raw(ctx)?,
        Decoder::NikonCompressed => nikon::nikon_load_raw(ctx)?,
        Decoder::NikonYuv => nikon::nikon_yuv_load_raw(ctx)?,
        Decoder::SonyArw => sony::sony_arw_load_raw(ctx)?,
        Decoder::SonyArw2 => sony::sony_arw2_load_raw(ctx)?,
        Decoder::PanasonicRw2 => panasonic::panasonic_load_raw(ctx)?,
        Decoder::OlympusCompressed => olympus::olympus_load_raw(ctx)?,
        Decoder::PentaxCompressed => pentax::pentax_load_raw(ctx)?,
        Decoder::SamsungSrw => samsung::samsung_load_raw(ctx)?,
        Decoder::SamsungSrw2 => samsung::samsung2_load_raw(ctx)?,
        Decoder::SamsungSrw3 => samsung::samsung3_load_raw(ctx)?,
        Decoder::Hasselblad => hasselblad::hasselblad_load_raw(ctx)?,
        Decoder::PhaseOne => phaseone::phase_one_load_raw(ctx)?,
        Decoder::KodakDc120 => kodak::kodak_dc120_load_raw(ctx)?,
        Decoder::Kodak262 => kodak::kodak_262_load_raw(ctx)?,
        Decoder::Kodak65000 => kodak::kodak_65000_load_raw(ctx)?,
        Decoder::KodakYcbcr => kodak::kodak_ycbcr_load_raw(ctx)?,
        Decoder::KodakRgb => kodak::kodak_rgb_load_raw(ctx)?,
        Decoder::KodakC330 => kodak::kodak_c330_load_raw(ctx)?,
        Decoder::KodakC603 => kodak::kodak_c603_load_raw(ctx)?,
        Decoder::SmalV6 => smal::smal_v6_load_raw(ctx)?,
        Decoder::SmalV9 => smal::smal_v9_load_raw(ctx)?,
        Decoder::Foveon => x3f::foveon_load_raw(ctx)?,
        Decoder::MinoltaRd175 => minolta::rd175_load_raw(ctx)?,
        Decoder::Quicktake => apple::quicktake_100_load_raw(ctx)?,
        Decoder::Fuji => fujifilm::fuji_load_raw(ctx)?,
        Decoder::Rollei => misc::rollei_load_raw(ctx)?,
        Decoder::Nokia => misc::nokia_load_raw(ctx)?,
        Decoder::Sinar4Shot => misc::sinar_4shot_load_raw(ctx)?,
        Decoder::LeafHdr => misc::leaf_hdr_load_raw(ctx)?,
        Decoder::ImaconFull => misc::imacon_full_load_raw(ctx)?,
        Decoder::External(codec) => {
            warn!(
                "{}: payload needs an external codec ({:?})",
                ctx.input, codec
            );
            return Err(match codec {
                ExternalCodec::Crx | ExternalCodec::Jpeg2000 => Error::NotSupported,
            });
        }
    }

    // Replace zero-valued pixels marked bad by the vendor.
    if ctx.desc.zero_is_bad && !ctx.raw.data.is_empty() {
        preprocess::remove_zeroes(ctx);
    }
    Ok(())
}

/// F: demosaic, or collapse for monochrome / linear sensors.
fn demosaic_stage(ctx: &mut FileContext) -> Result<()> {
    scale::pre_interpolate(ctx)?;
    let algorithm = effective_algorithm(ctx);
    let is_xtrans = matches!(ctx.desc.cfa, crate::mosaic::CfaPattern::XTrans(_));
    let is_bayer = matches!(ctx.desc.cfa, crate::mosaic::CfaPattern::Bayer(_));
    if is_xtrans {
        if !ctx.raw.data.is_empty() {
            return Err(Error::FormatError("X-Trans plane not consumed".to_string()));
        }
        if ctx.desc.colors == 3 && ctx.params.document_mode == 0 {
            let passes = if algorithm == DemosaicAlgorithm::Bilinear { 1 } else { 3 };
            xtrans::interpolate(ctx, passes)?;
        }
    } else if is_bayer && ctx.desc.colors >= 3 && ctx.params.document_mode == 0 {
        if ctx.desc.colors == 4 {
            // Four-colour interpolation goes through the gradient
            // path, which handles the split greens.
            demosaic::vng(ctx)?;
        } else {
            match algorithm {
                DemosaicAlgorithm::Bilinear => demosaic::bilinear(ctx)?,
                DemosaicAlgorithm::Vng => demosaic::vng(ctx)?,
                DemosaicAlgorithm::Ppg => demosaic::ppg(ctx)?,
                DemosaicAlgorithm::Ahd => demosaic::ahd(ctx)?,
            }
        }
    }
    if ctx.params.med_passes > 0 && ctx.desc.cfa.is_mosaic() && ctx.desc.colors == 3 {
        demosaic::median_filter(ctx, ctx.params.med_passes);
    }
    Ok(())
}

fn effective_algorithm(ctx: &FileContext) -> DemosaicAlgorithm {
    if let Some(q) = ctx.params.user_qual {
        return q;
    }
    if ctx.params.half_size {
        DemosaicAlgorithm::Bilinear
    } else {
        DemosaicAlgorithm::Ahd
    }
}
