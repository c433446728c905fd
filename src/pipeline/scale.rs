// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - pipeline/scale.rs
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

//! Black subtraction, white balance selection, scaling to the full
//! 16-bit range, optional wavelet denoise and chromatic aberration
//! correction.

use log::{debug, warn};

use crate::bitmap::ImageBuffer;
use crate::mosaic::CfaPattern;
use crate::pipeline::FileContext;
use crate::utils::clip16;
use crate::Result;

pub(crate) fn run(ctx: &mut FileContext) -> Result<()> {
    crop_to_image(ctx)?;
    if ctx.params.threshold > 0.0 {
        wavelet_denoise(ctx);
    }
    scale_colors(ctx);
    chromatic_aberration(ctx);
    Ok(())
}

/// Move the active rectangle of the raw plane into the working
/// image, one channel per site. The raw plane is released here.
/// Half-size packs each 2x2 tile into one pixel.
pub(crate) fn crop_to_image(ctx: &mut FileContext) -> Result<()> {
    if ctx.raw.data.is_empty() {
        // Linear sensors decoded straight into the image.
        return Ok(());
    }
    let shrink = u32::from(ctx.params.half_size && ctx.desc.cfa.is_mosaic());
    let iheight = (ctx.desc.height + shrink) >> shrink;
    let iwidth = (ctx.desc.width + shrink) >> shrink;
    let mut image = ImageBuffer::<u16>::new(iwidth, iheight, 16, 4)?;

    let raw_width = ctx.desc.raw_width as usize;
    for row in 0..ctx.desc.height {
        for col in 0..ctx.desc.width {
            // The channel of the physical site; the pattern is
            // re-phased below so the active origin matches.
            let c = ctx
                .desc
                .fc(row + ctx.desc.top_margin, col + ctx.desc.left_margin);
            let v = ctx.raw.data
                [(row + ctx.desc.top_margin) as usize * raw_width
                    + (col + ctx.desc.left_margin) as usize];
            let idx = ((row >> shrink) * iwidth + (col >> shrink)) as usize * 4 + c;
            image.data[idx] = v;
        }
    }
    ctx.image = image;
    ctx.raw = ImageBuffer::default();
    // The CFA phase follows the crop.
    ctx.desc.cfa = ctx
        .desc
        .cfa
        .shifted(ctx.desc.top_margin, ctx.desc.left_margin);
    if shrink != 0 {
        ctx.desc.width = iwidth;
        ctx.desc.height = iheight;
        ctx.desc.cfa = CfaPattern::Linear;
        ctx.desc.colors = ctx.desc.colors.max(3);
    }
    Ok(())
}

/// Compute the four multipliers and scale every sample so that white
/// maps to 65535.
pub(crate) fn scale_colors(ctx: &mut FileContext) {
    let width = ctx.image.width;
    let height = ctx.image.height;
    let mosaic = ctx.desc.cfa.is_mosaic();
    let mut pre_mul = ctx.desc.pre_mul;

    if ctx.params.user_mul[0] != 0.0 {
        pre_mul = ctx.params.user_mul;
    } else if ctx.params.use_auto_wb
        || (ctx.params.use_camera_wb && ctx.desc.cam_mul[0] <= 0.0)
    {
        // Per-channel sums over the grey box, skipping any 8x8 block
        // containing a near-saturated sample.
        let mut dsum = [0.0_f64; 8];
        let grey = &ctx.params.grey_box;
        let bottom = (grey[1].saturating_add(grey[3])).min(height);
        let right = (grey[0].saturating_add(grey[2])).min(width);
        let mut row = grey[1];
        while row < bottom {
            let mut col = grey[0];
            while col < right {
                let mut sum = [0_u64; 8];
                let mut clipped = false;
                'block: for y in row..(row + 8).min(bottom) {
                    for x in col..(col + 8).min(right) {
                        for c in 0..4_usize {
                            let (ch, val) = if mosaic {
                                let ch = ctx.desc.fc(y, x);
                                (ch, ctx.image.data[(y * width + x) as usize * 4 + ch])
                            } else {
                                (c, ctx.image.data[(y * width + x) as usize * 4 + c])
                            };
                            if val as u32 > ctx.desc.maximum.saturating_sub(25) {
                                clipped = true;
                                break 'block;
                            }
                            let val =
                                (val as i64 - ctx.desc.cblack[ch] as i64).max(0) as u64;
                            sum[ch] += val;
                            sum[ch + 4] += 1;
                            if mosaic {
                                break;
                            }
                        }
                    }
                }
                if !clipped {
                    for c in 0..8 {
                        dsum[c] += sum[c] as f64;
                    }
                }
                col += 8;
            }
            row += 8;
        }
        for c in 0..4 {
            if dsum[c] != 0.0 {
                pre_mul[c] = (dsum[c + 4] / dsum[c]) as f32;
            }
        }
    } else if ctx.params.use_camera_wb {
        if ctx.desc.cam_mul[0] > 0.0 && ctx.desc.cam_mul[2] > 0.0 {
            pre_mul = ctx.desc.cam_mul;
        } else {
            warn!("{}: cannot use camera white balance", ctx.input);
        }
    }

    if pre_mul[1] == 0.0 {
        pre_mul[1] = 1.0;
    }
    if pre_mul[3] == 0.0 {
        pre_mul[3] = if ctx.desc.colors < 4 { pre_mul[1] } else { 1.0 };
    }

    // Fold the aggregate black into the channel blacks.
    let black = ctx.desc.black;
    let mut cblack = ctx.desc.cblack;
    for c in cblack.iter_mut() {
        *c += black;
    }
    let maximum = ctx.desc.maximum.saturating_sub(black).max(1);

    let mut dmin = f64::MAX;
    let mut dmax = 0.0_f64;
    for c in 0..4 {
        dmin = dmin.min(pre_mul[c] as f64);
        dmax = dmax.max(pre_mul[c] as f64);
    }
    if ctx.params.highlight == crate::params::HighlightMode::Clip {
        dmax = dmin;
    }
    let mut scale_mul = [0.0_f32; 4];
    for c in 0..4 {
        pre_mul[c] /= dmax as f32;
        scale_mul[c] = pre_mul[c] * 65535.0 / maximum as f32;
    }
    debug!(
        "{}: scaling with darkness {}, saturation {}, multipliers {:.6} {:.6} {:.6} {:.6}",
        ctx.input, black, ctx.desc.maximum, pre_mul[0], pre_mul[1], pre_mul[2], pre_mul[3]
    );
    debug!("{}: scale_mul {:?}", ctx.input, scale_mul);

    // Per-site black: the DNG repeat pattern when there is one.
    let pattern = ctx.cblack_pattern;
    scale_samples(
        &mut ctx.image.data,
        width as usize,
        &cblack,
        &pattern,
        &scale_mul,
    );

    ctx.desc.pre_mul = pre_mul;
    ctx.desc.maximum = 65535;
    ctx.desc.black = 0;
    ctx.desc.cblack = [0; 4];
}

/// The per-sample subtract-and-scale kernel, the hottest loop of the
/// stage.
#[multiversion::multiversion(targets(
    "x86_64+avx+avx2+fma",
    "x86_64+sse2",
    "aarch64+neon",
))]
fn scale_samples(
    data: &mut [u16],
    width: usize,
    cblack: &[u32; 4],
    pattern: &[u32; 4],
    scale_mul: &[f32; 4],
) {
    let has_pattern = pattern.iter().any(|v| *v != 0);
    for (i, v) in data.iter_mut().enumerate() {
        if *v == 0 {
            continue;
        }
        let mut val = *v as i64;
        if has_pattern {
            let pix = i / 4;
            let row = pix / width;
            let col = pix % width;
            val -= pattern[(row & 1) * 2 + (col & 1)] as i64;
        }
        val -= cblack[i & 3] as i64;
        let scaled = val as f32 * scale_mul[i & 3];
        *v = clip16(scaled as i32);
    }
}

/// Resample the red and blue planes radially for lateral chromatic
/// aberration.
fn chromatic_aberration(ctx: &mut FileContext) {
    if (ctx.params.aber[0] - 1.0).abs() < f64::EPSILON
        && (ctx.params.aber[1] - 1.0).abs() < f64::EPSILON
    {
        return;
    }
    if ctx.desc.colors != 3 {
        return;
    }
    let width = ctx.image.width as usize;
    let height = ctx.image.height as usize;
    for (ci, c) in [(0_usize, 0_usize), (1, 2)] {
        let aber = ctx.params.aber[ci];
        if (aber - 1.0).abs() < f64::EPSILON {
            continue;
        }
        let plane: Vec<u16> = ctx.image.data.iter().skip(c).step_by(4).copied().collect();
        for row in 0..height {
            let fr = (row as f64 - height as f64 * 0.5) * aber + height as f64 * 0.5;
            let ur = fr.floor();
            if ur < 0.0 || ur > height as f64 - 2.0 {
                continue;
            }
            let fr = fr - ur;
            let ur = ur as usize;
            for col in 0..width {
                let fc = (col as f64 - width as f64 * 0.5) * aber + width as f64 * 0.5;
                let uc = fc.floor();
                if uc < 0.0 || uc > width as f64 - 2.0 {
                    continue;
                }
                let fc = fc - uc;
                let uc = uc as usize;
                let p = ur * width + uc;
                let v = (plane[p] as f64 * (1.0 - fc) + plane[p + 1] as f64 * fc)
                    * (1.0 - fr)
                    + (plane[p + width] as f64 * (1.0 - fc) + plane[p + width + 1] as f64 * fc)
                        * fr;
                ctx.image.data[(row * width + col) * 4 + c] = v as u16;
            }
        }
    }
}

/// A trous hat transform along one axis.
fn hat_transform(temp: &mut [f32], base: &[f32], st: usize, size: usize, sc: usize) {
    for i in 0..sc.min(size) {
        temp[i] = 2.0 * base[st * i] + base[st * (sc - i)] + base[st * (i + sc).min(size - 1)];
    }
    let mut i = sc;
    while i + sc < size {
        temp[i] = 2.0 * base[st * i] + base[st * (i - sc)] + base[st * (i + sc)];
        i += 1;
    }
    while i < size {
        temp[i] =
            2.0 * base[st * i] + base[st * (i - sc)] + base[st * (2 * size - 2 - (i + sc))];
        i += 1;
    }
}

/// Soft-threshold wavelet denoise over the square-root domain, per
/// channel, five pyramid levels.
pub(crate) fn wavelet_denoise(ctx: &mut FileContext) {
    static NOISE: [f32; 8] = [
        0.8002, 0.2735, 0.1202, 0.0585, 0.0291, 0.0152, 0.0080, 0.0044,
    ];
    debug!("{}: wavelet denoising", ctx.input);

    let mut scale = 1_u32;
    while (ctx.desc.maximum << scale) < 0x10000 {
        scale += 1;
    }
    scale -= 1;
    ctx.desc.maximum <<= scale;
    ctx.desc.black <<= scale;
    for c in ctx.desc.cblack.iter_mut() {
        *c <<= scale;
    }

    let width = ctx.image.width as usize;
    let height = ctx.image.height as usize;
    let size = width * height;
    let threshold = ctx.params.threshold;
    let mosaic = ctx.desc.cfa.is_mosaic();
    let nc = if ctx.desc.colors == 3 && mosaic { 4 } else { ctx.desc.colors as usize };

    let mut fimg = vec![0.0_f32; size * 3];
    let mut temp = vec![0.0_f32; height.max(width)];
    for c in 0..nc {
        for i in 0..size {
            let v = ((ctx.image.data[i * 4 + c] as u32) << scale).min(65535) as f32;
            fimg[i] = 256.0 * v.sqrt();
        }
        let mut hpass = 0_usize;
        let mut lpass = 0_usize;
        for lev in 0..5_usize {
            lpass = size * ((lev & 1) + 1);
            for row in 0..height {
                hat_transform(&mut temp, &fimg[hpass + row * width..], 1, width, 1 << lev);
                for col in 0..width {
                    fimg[lpass + row * width + col] = temp[col] * 0.25;
                }
            }
            for col in 0..width {
                // Column pass works on a strided copy.
                let column: Vec<f32> = (0..height)
                    .map(|r| fimg[lpass + r * width + col])
                    .collect();
                hat_transform(&mut temp, &column, 1, height, 1 << lev);
                for row in 0..height {
                    fimg[lpass + row * width + col] = temp[row] * 0.25;
                }
            }
            let thold = threshold * NOISE[lev];
            for i in 0..size {
                fimg[hpass + i] -= fimg[lpass + i];
                if fimg[hpass + i] < -thold {
                    fimg[hpass + i] += thold;
                } else if fimg[hpass + i] > thold {
                    fimg[hpass + i] -= thold;
                } else {
                    fimg[hpass + i] = 0.0;
                }
                if hpass != 0 {
                    fimg[i] += fimg[hpass + i];
                }
            }
            hpass = lpass;
        }
        for i in 0..size {
            let v = fimg[i] + fimg[lpass + i];
            ctx.image.data[i * 4 + c] = clip16(((v * v) / 65536.0) as i32);
        }
    }
}

/// Prepare the mosaic for interpolation: four-colour mode splits the
/// greens into channels 1 and 3; otherwise both greens share
/// channel 1.
pub(crate) fn pre_interpolate(ctx: &mut FileContext) -> Result<()> {
    if let CfaPattern::Bayer(filters) = ctx.desc.cfa {
        if ctx.desc.colors == 3 && ctx.params.four_color_rgb {
            // Second-green rows move to channel 3, in the image and
            // in the pattern word.
            let width = ctx.image.width;
            let height = ctx.image.height;
            for row in 0..height {
                for col in 0..width {
                    if ctx.desc.fc(row, col) == 1 && row & 1 == 1 {
                        let idx = (row * width + col) as usize * 4;
                        ctx.image.data[idx + 3] = ctx.image.data[idx + 1];
                        ctx.image.data[idx + 1] = 0;
                    }
                }
            }
            let mut f = filters;
            for row in 0..8_u32 {
                if row & 1 == 0 {
                    continue;
                }
                for col in 0..2_u32 {
                    let shift = ((row << 1 & 14) + (col & 1)) << 1;
                    if (f >> shift) & 3 == 1 {
                        f |= 2 << shift;
                    }
                }
            }
            ctx.desc.cfa = CfaPattern::Bayer(f);
            ctx.desc.colors = 4;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use crate::io::Stream;
    use crate::params::Params;
    use crate::pipeline::FileContext;

    fn context(width: u32, height: u32) -> FileContext {
        let stream = Stream::new(Box::new(std::io::Cursor::new(Vec::new())));
        let mut ctx = FileContext::new(stream, Params::default(), "test");
        ctx.desc.raw_width = width;
        ctx.desc.raw_height = height;
        ctx.desc.width = width;
        ctx.desc.height = height;
        ctx.desc.maximum = 255;
        ctx.desc.bits_per_sample = 8;
        ctx.alloc_raw().unwrap();
        ctx
    }

    #[test]
    fn test_crop_to_image() {
        let mut ctx = context(4, 4);
        for (i, v) in ctx.raw.data.iter_mut().enumerate() {
            *v = i as u16;
        }
        super::crop_to_image(&mut ctx).unwrap();
        assert!(ctx.raw.data.is_empty());
        assert_eq!(ctx.image.width, 4);
        // Site (0, 0) is red on RGGB.
        assert_eq!(ctx.image.data[0], 0);
        // Site (0, 1) is green: value 1 in channel 1.
        assert_eq!(ctx.image.data[4 + 1], 1);
        // Site (1, 1) is blue: value 5 in channel 2.
        assert_eq!(ctx.image.data[(4 + 1) * 4 + 2], 5);
    }

    #[test]
    fn test_scale_unit_multipliers() {
        // With multipliers forced to one, scaling is only the black
        // subtraction and range expansion.
        let mut ctx = context(4, 4);
        for v in ctx.raw.data.iter_mut() {
            *v = 128;
        }
        super::crop_to_image(&mut ctx).unwrap();
        ctx.params.user_mul = [1.0, 1.0, 1.0, 1.0];
        ctx.desc.black = 0;
        super::scale_colors(&mut ctx);
        for (i, v) in ctx.image.data.iter().enumerate() {
            if *v != 0 {
                let expected = (128.0_f32 * 65535.0 / 255.0) as u16;
                assert_eq!(*v, expected, "at {}", i);
            }
        }
    }
}
