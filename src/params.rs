// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - params.rs
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

//! Development parameters. One record per invocation, owned by the
//! driver and shared read-only by the pipeline stages.

use std::path::PathBuf;

use num_enum::TryFromPrimitive;

/// Output colour space selector.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, TryFromPrimitive)]
pub enum OutputSpace {
    /// Raw camera colour, no conversion.
    Raw = 0,
    #[default]
    SRgb = 1,
    Adobe = 2,
    Wide = 3,
    ProPhoto = 4,
    Xyz = 5,
    Aces = 6,
}

/// Highlight handling mode.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum HighlightMode {
    /// Clip all channels at white.
    #[default]
    Clip,
    /// Leave values above saturation.
    Unclip,
    /// Blend clipped and unclipped through an orthonormal basis.
    Blend,
    /// Diffuse channel ratios at quarter scale. The level steers the
    /// growth of the diffusion, 3..=9 as on the command line.
    Rebuild(u8),
}

impl HighlightMode {
    pub fn from_level(level: u8) -> HighlightMode {
        match level {
            0 => HighlightMode::Clip,
            1 => HighlightMode::Unclip,
            2 => HighlightMode::Blend,
            n => HighlightMode::Rebuild(n.min(9)),
        }
    }
}

/// Demosaic algorithm selector, the `-q` option.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, TryFromPrimitive)]
pub enum DemosaicAlgorithm {
    Bilinear = 0,
    Vng = 1,
    Ppg = 2,
    #[default]
    Ahd = 3,
}

/// The configuration record set from the command surface.
#[derive(Clone, Debug)]
pub struct Params {
    pub verbose: bool,
    pub write_to_stdout: bool,
    pub identify_only: bool,
    pub read_from_stdin: bool,

    // White balance.
    pub use_auto_wb: bool,
    pub use_camera_wb: bool,
    /// Force the in-file colour matrix when present.
    pub use_camera_matrix: bool,
    pub user_mul: [f32; 4],
    pub grey_box: [u32; 4],

    // Geometry.
    /// `None` leaves the camera flip; `Some(0)` disables flipping.
    pub user_flip: Option<u16>,
    pub use_fuji_rotate: bool,
    pub half_size: bool,

    // Colour.
    pub output_space: OutputSpace,
    pub output_bps: u8,
    pub output_tiff: bool,
    pub four_color_rgb: bool,
    pub camera_profile: Option<PathBuf>,
    pub output_profile: Option<PathBuf>,

    // Tone.
    pub gamma: [f64; 2],
    pub brightness: f32,
    pub no_auto_bright: bool,
    pub auto_bright_thr: f64,
    pub highlight: HighlightMode,
    pub threshold: f32,
    pub med_passes: u16,

    // Preprocessing.
    pub user_black: Option<u16>,
    pub user_sat: Option<u16>,
    pub bad_pixels: Option<PathBuf>,
    pub dark_frame: Option<PathBuf>,
    pub aber: [f64; 2],
    pub shot_select: u32,
    pub multi_out: bool,
    pub document_mode: u8,
    pub user_qual: Option<DemosaicAlgorithm>,
}

impl Default for Params {
    fn default() -> Params {
        Params {
            verbose: false,
            write_to_stdout: false,
            identify_only: false,
            read_from_stdin: false,
            use_auto_wb: false,
            use_camera_wb: false,
            use_camera_matrix: false,
            user_mul: [0.0; 4],
            grey_box: [0, 0, u32::MAX, u32::MAX],
            user_flip: None,
            use_fuji_rotate: true,
            half_size: false,
            output_space: OutputSpace::SRgb,
            output_bps: 8,
            output_tiff: false,
            four_color_rgb: false,
            camera_profile: None,
            output_profile: None,
            // BT.709 style default development curve.
            gamma: [0.45, 4.5],
            brightness: 1.0,
            no_auto_bright: false,
            auto_bright_thr: 0.01,
            highlight: HighlightMode::Clip,
            threshold: 0.0,
            med_passes: 0,
            user_black: None,
            user_sat: None,
            bad_pixels: None,
            dark_frame: None,
            aber: [1.0, 1.0],
            shot_select: 0,
            multi_out: false,
            document_mode: 0,
            user_qual: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{HighlightMode, OutputSpace};
    use std::convert::TryFrom;

    #[test]
    fn test_highlight_from_level() {
        assert_eq!(HighlightMode::from_level(0), HighlightMode::Clip);
        assert_eq!(HighlightMode::from_level(2), HighlightMode::Blend);
        assert_eq!(HighlightMode::from_level(5), HighlightMode::Rebuild(5));
        assert_eq!(HighlightMode::from_level(12), HighlightMode::Rebuild(9));
    }

    #[test]
    fn test_output_space() {
        assert_eq!(OutputSpace::try_from(4), Ok(OutputSpace::ProPhoto));
        assert!(OutputSpace::try_from(7).is_err());
    }
}
