// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - pipeline/colourspace.rs
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

//! Colourspace conversion and tone: compose camera->XYZ with the
//! output matrix, collapse the second green, build the gamma LUT and
//! the histograms the auto-brightness stage feeds on.

use log::debug;

use crate::colour;
use crate::params::OutputSpace;
use crate::pipeline::FileContext;
use crate::utils::clip16;
use crate::Result;

pub(crate) fn run(ctx: &mut FileContext) -> Result<()> {
    convert_to_rgb(ctx)
}

/// Compose the output matrix and apply it, filling the histograms.
pub(crate) fn convert_to_rgb(ctx: &mut FileContext) -> Result<()> {
    let colors = ctx.desc.colors as usize;
    let space = ctx.params.output_space;
    let raw_colour = ctx.desc.raw_color || space == OutputSpace::Raw;

    // out_cam = out_rgb x rgb_cam
    let mut out_cam = [[0.0_f32; 4]; 3];
    let out_rgb = colour::output_matrix(space);
    for i in 0..3 {
        for j in 0..colors {
            for k in 0..3 {
                out_cam[i][j] += out_rgb[i][k] as f32 * ctx.desc.rgb_cam[k][j];
            }
        }
    }
    debug!("{}: converting to {:?} colorspace", ctx.input, space);
    debug!("{}: out_cam {:?}", ctx.input, out_cam);

    for h in ctx.histogram.iter_mut() {
        for v in h.iter_mut() {
            *v = 0;
        }
    }
    let mix_green = colors == 4;
    for pix in ctx.image.data.chunks_exact_mut(4) {
        if raw_colour {
            if mix_green {
                pix[1] = ((pix[1] as u32 + pix[3] as u32) >> 1) as u16;
            }
        } else {
            let mut out = [0.0_f32; 3];
            for c in 0..colors {
                for (i, o) in out.iter_mut().enumerate() {
                    *o += out_cam[i][c] * pix[c] as f32;
                }
            }
            for c in 0..3 {
                pix[c] = clip16(out[c] as i32);
            }
        }
        for c in 0..colors.min(3) {
            ctx.histogram[c][(pix[c] >> 3) as usize] += 1;
        }
    }
    // Both paths collapse the second green.
    if ctx.desc.colors == 4 && (!raw_colour || mix_green) {
        ctx.desc.colors = 3;
    }
    Ok(())
}

/// Build the output gamma LUT. `perc` white pixels saturate unless
/// auto-brightness is off.
pub(crate) fn build_output_curve(ctx: &mut FileContext) -> Vec<u16> {
    let width = ctx.image.width as u64;
    let height = ctx.image.height as u64;
    let perc = (width * height) as f64 * ctx.params.auto_bright_thr;

    // White point in histogram bins (1/8th of a 16-bit value).
    let mut white = 0_i32;
    if ctx.params.no_auto_bright {
        white = (ctx.desc.maximum.min(65535) >> 3) as i32;
    } else {
        for c in 0..ctx.desc.colors.min(3) as usize {
            let mut total = 0_u64;
            let mut val = 0x2000_i32;
            while val > 32 {
                val -= 1;
                total += ctx.histogram[c][val as usize] as u64;
                if total as f64 > perc {
                    break;
                }
            }
            if white < val {
                white = val;
            }
        }
    }
    let imax = ((white << 3) as f64 / ctx.params.brightness as f64) as u32;
    colour::gamma_curve(ctx.params.gamma[0], ctx.params.gamma[1], 2, imax.max(1))
}

#[cfg(test)]
mod test {
    use crate::io::Stream;
    use crate::params::{OutputSpace, Params};
    use crate::pipeline::FileContext;

    #[test]
    fn test_identity_matrix_srgb() {
        let stream = Stream::new(Box::new(std::io::Cursor::new(Vec::new())));
        let mut ctx = FileContext::new(stream, Params::default(), "test");
        ctx.desc.width = 2;
        ctx.desc.height = 1;
        ctx.desc.raw_color = false;
        ctx.params.output_space = OutputSpace::SRgb;
        ctx.alloc_image().unwrap();
        ctx.image.data[..4].copy_from_slice(&[1000, 2000, 3000, 0]);
        ctx.image.data[4..8].copy_from_slice(&[4000, 5000, 6000, 0]);
        super::convert_to_rgb(&mut ctx).unwrap();
        // Identity camera matrix: sRGB output equals input.
        assert_eq!(&ctx.image.data[..3], &[1000, 2000, 3000]);
        assert_eq!(&ctx.image.data[4..7], &[4000, 5000, 6000]);
        // Histograms counted one pixel per channel bin.
        assert_eq!(ctx.histogram[0][1000 >> 3], 1);
        assert_eq!(ctx.histogram[1][2000 >> 3], 1);
    }
}
