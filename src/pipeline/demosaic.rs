// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - pipeline/demosaic.rs
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

//! Bayer demosaicing: bilinear, variable-number-of-gradients,
//! patterned-pixel-grouping and adaptive-homogeneity-directed, plus
//! the post-demosaic median filter.

use log::debug;
use rayon::prelude::*;

use crate::colour::{D65_WHITE, XYZ_RGB};
use crate::pipeline::FileContext;
use crate::utils::clip16;
use crate::Result;

/// AHD tile side.
const TS: usize = 256;

#[inline]
fn ulim(x: i32, y: i32, z: i32) -> i32 {
    if y < z {
        x.clamp(y, z)
    } else {
        x.clamp(z, y)
    }
}

/// Average the present neighbours into the missing channels along
/// the image border.
pub(crate) fn border_interpolate(ctx: &mut FileContext, border: u32) {
    let width = ctx.image.width;
    let height = ctx.image.height;
    let colors = ctx.desc.colors as usize;
    let mut row = 0_u32;
    while row < height {
        let mut col = 0_u32;
        while col < width {
            if col == border && row >= border && row < height - border {
                col = width - border;
            }
            let mut sum = [0_u32; 8];
            for y in row.saturating_sub(1)..(row + 2).min(height) {
                for x in col.saturating_sub(1)..(col + 2).min(width) {
                    let f = ctx.desc.fc(y, x);
                    sum[f] += ctx.image.data[(y * width + x) as usize * 4 + f] as u32;
                    sum[f + 4] += 1;
                }
            }
            let f = ctx.desc.fc(row, col);
            for c in 0..colors {
                if c != f && sum[c + 4] != 0 {
                    ctx.image.data[(row * width + col) as usize * 4 + c] =
                        (sum[c] / sum[c + 4]) as u16;
                }
            }
            col += 1;
        }
        row += 1;
    }
}

/// Bilinear: a per-cell code table of (offset, shift, channel)
/// triplets applied over a one pixel border crop.
pub(crate) fn bilinear(ctx: &mut FileContext) -> Result<()> {
    debug!("{}: bilinear interpolation", ctx.input);
    let width = ctx.image.width as i32;
    let height = ctx.image.height as i32;
    let colors = ctx.desc.colors as usize;
    let size = 16_usize;
    border_interpolate(ctx, 1);

    // code[cell] = (count, [(offset, shift, colour)], [(colour, mul)])
    let mut code: Vec<(Vec<(i32, u32, usize)>, Vec<(usize, u32)>)> = Vec::new();
    for row in 0..size {
        for col in 0..size {
            let f = ctx.desc.fc(row as u32, col as u32);
            let mut sum = [0_u32; 4];
            let mut taps = Vec::new();
            for y in -1_i32..=1 {
                for x in -1_i32..=1 {
                    let shift = u32::from(y == 0) + u32::from(x == 0);
                    let color = ctx
                        .desc
                        .fc((row as i32 + y + 16) as u32, (col as i32 + x + 16) as u32);
                    if color == f {
                        continue;
                    }
                    taps.push(((width * y + x) * 4 + color as i32, shift, color));
                    sum[color] += 1 << shift;
                }
            }
            let mut norms = Vec::new();
            for (c, s) in sum.iter().enumerate().take(colors) {
                if c != f && *s != 0 {
                    norms.push((c, 256 / *s));
                }
            }
            code.push((taps, norms));
        }
    }

    for row in 1..height - 1 {
        for col in 1..width - 1 {
            let cell = &code[(row as usize % size) * size + col as usize % size];
            let base = (row * width + col) as usize * 4;
            let mut sum = [0_u32; 4];
            for (offset, shift, color) in &cell.0 {
                let idx = (base as i32 + offset) as usize;
                sum[*color] += (ctx.image.data[idx] as u32) << shift;
            }
            for (color, mul) in &cell.1 {
                ctx.image.data[base + color] = (sum[*color] * mul >> 8) as u16;
            }
        }
    }
    Ok(())
}

/// Variable number of gradients: eight directional gradients from
/// the 5x5 neighbourhood, thresholded at `min + (max-min)/2`;
/// admitted directions contribute channel averages.
pub(crate) fn vng(ctx: &mut FileContext) -> Result<()> {
    debug!("{}: VNG interpolation", ctx.input);
    bilinear(ctx)?;
    let width = ctx.image.width as i32;
    let height = ctx.image.height as i32;
    let colors = ctx.desc.colors as usize;

    // The eight chain directions.
    static CHOOD: [(i32, i32); 8] = [
        (-1, -1),
        (-1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
        (1, 0),
        (1, -1),
        (0, -1),
    ];
    let src = ctx.image.data.clone();
    let cfa = ctx.desc.cfa.clone();
    let fc = |r: i32, c: i32| -> usize { cfa.fc(r as u32, c as u32) };
    let at = |r: i32, c: i32, ch: usize| -> i32 { src[((r * width + c) * 4) as usize + ch] as i32 };
    // The mosaic value at a site, whatever its colour.
    let site = |r: i32, c: i32| -> i32 { at(r, c, fc(r, c)) };

    for row in 2..height - 2 {
        for col in 2..width - 2 {
            let f = fc(row, col);
            let mut grad = [0_i32; 8];
            for (i, (dr, dc)) in CHOOD.iter().enumerate() {
                // Value difference along the direction, plus the
                // flanking differences at half weight.
                let mut g = (site(row + dr, col + dc) - site(row - dr, col - dc)).abs();
                g += (site(row + 2 * dr, col + 2 * dc) - site(row, col)).abs();
                let (pr, pc) = (*dc, *dr); // perpendicular
                g += (site(row + dr + pr, col + dc + pc) - site(row - dr + pr, col - dc + pc))
                    .abs()
                    / 2;
                g += (site(row + dr - pr, col + dc - pc) - site(row - dr - pr, col - dc - pc))
                    .abs()
                    / 2;
                grad[i] = g;
            }
            let gmin = *grad.iter().min().unwrap();
            let gmax = *grad.iter().max().unwrap();
            if gmax == 0 {
                continue;
            }
            let thold = gmin + ((gmax - gmin) >> 1);
            // Average the channels over the admitted directions.
            let mut sum = [0_i64; 4];
            let mut count = [0_i64; 4];
            let mut num = 0;
            for (i, (dr, dc)) in CHOOD.iter().enumerate() {
                if grad[i] > thold {
                    continue;
                }
                num += 1;
                for step in 1..=2_i32 {
                    let r = row + dr * step;
                    let c = col + dc * step;
                    let ch = fc(r, c);
                    sum[ch] += at(r, c, ch) as i64;
                    count[ch] += 1;
                }
            }
            if num == 0 || count[f] == 0 {
                continue;
            }
            let base_mean = sum[f] / count[f];
            let center = site(row, col) as i64;
            let base = (row * width + col) as usize * 4;
            for c in 0..colors {
                if c == f || count[c] == 0 {
                    continue;
                }
                let v = center + sum[c] / count[c] - base_mean;
                ctx.image.data[base + c] = clip16(v as i32);
            }
        }
    }
    Ok(())
}

/// Patterned pixel grouping, Hamilton-Adams style green then
/// gradient-corrected red/blue.
pub(crate) fn ppg(ctx: &mut FileContext) -> Result<()> {
    debug!("{}: PPG interpolation", ctx.input);
    border_interpolate(ctx, 3);
    let width = ctx.image.width as i32;
    let height = ctx.image.height as i32;
    let dir = [1_i32, width, -1, -width];

    // Green from the four-direction pattern score.
    for row in 3..height - 3 {
        let mut col = 3 + (ctx.desc.fc(row as u32, 3) & 1) as i32;
        let c = ctx.desc.fc(row as u32, col as u32);
        while col < width - 3 {
            let base = (row * width + col) as usize * 4;
            let px = |d: i32, ch: usize| -> i32 {
                ctx.image.data[(base as i32 + d * 4) as usize + ch] as i32
            };
            let mut guess = [0_i32; 2];
            let mut diff = [0_i32; 2];
            for (i, d) in dir.iter().take(2).enumerate() {
                let d = *d;
                guess[i] =
                    (px(-d, 1) + px(0, c) + px(d, 1)) * 2 - px(-2 * d, c) - px(2 * d, c);
                diff[i] = ((px(-2 * d, c) - px(0, c)).abs()
                    + (px(2 * d, c) - px(0, c)).abs()
                    + (px(-d, 1) - px(d, 1)).abs())
                    * 3
                    + ((px(3 * d, 1) - px(d, 1)).abs() + (px(-3 * d, 1) - px(-d, 1)).abs()) * 2;
            }
            let i = usize::from(diff[0] > diff[1]);
            let d = dir[i];
            let g = ulim(guess[i] >> 2, px(d, 1), px(-d, 1));
            ctx.image.data[base + 1] = clip16(g);
            col += 2;
        }
    }
    // Red and blue at green sites.
    for row in 1..height - 1 {
        let mut col = 1 + (ctx.desc.fc(row as u32, 2) & 1) as i32;
        let mut c = ctx.desc.fc(row as u32, (col + 1) as u32);
        while col < width - 1 {
            let base = (row * width + col) as usize * 4;
            for d in dir.iter().take(2) {
                let px = |off: i32, ch: usize| -> i32 {
                    ctx.image.data[(base as i32 + off * 4) as usize + ch] as i32
                };
                let v = (px(-d, c) + px(*d, c) + 2 * px(0, 1) - px(-d, 1) - px(*d, 1)) >> 1;
                ctx.image.data[base + c] = clip16(v);
                c = 2 - c;
            }
            col += 2;
        }
    }
    // Blue at red sites and vice versa.
    for row in 1..height - 1 {
        let mut col = 1 + (ctx.desc.fc(row as u32, 1) & 1) as i32;
        let c = 2 - ctx.desc.fc(row as u32, col as u32);
        while col < width - 1 {
            let base = (row * width + col) as usize * 4;
            let px = |off: i32, ch: usize| -> i32 {
                ctx.image.data[(base as i32 + off * 4) as usize + ch] as i32
            };
            let mut guess = [0_i32; 2];
            let mut diff = [0_i32; 2];
            for i in 0..2 {
                let d = dir[i] + dir[i + 1];
                guess[i] = px(-d, c) + px(d, c) + 2 * px(0, 1) - px(-d, 1) - px(d, 1);
                diff[i] = (px(-d, c) - px(d, c)).abs()
                    + (px(-d, 1) - px(0, 1)).abs()
                    + (px(d, 1) - px(0, 1)).abs();
            }
            let v = if diff[0] != diff[1] {
                guess[usize::from(diff[0] > diff[1])] >> 1
            } else {
                (guess[0] + guess[1]) >> 2
            };
            ctx.image.data[base + c] = clip16(v);
            col += 2;
        }
    }
    Ok(())
}

/// Cube-root table for the perceptual conversion, built once.
static CBRT: once_cell::sync::Lazy<Vec<f32>> = once_cell::sync::Lazy::new(|| {
    (0..0x10000_usize)
        .map(|i| {
            let r = i as f32 / 65535.0;
            if r > 0.008856 {
                r.powf(1.0 / 3.0)
            } else {
                7.787 * r + 16.0 / 116.0
            }
        })
        .collect()
});

/// The perceptual conversion used by the homogeneity maps.
struct Cielab {
    xyz_cam: [[f32; 4]; 3],
    colors: usize,
}

impl Cielab {
    fn new(rgb_cam: &[[f32; 4]; 3], colors: usize) -> Cielab {
        let mut xyz_cam = [[0.0_f32; 4]; 3];
        for i in 0..3 {
            for j in 0..colors {
                for k in 0..3 {
                    xyz_cam[i][j] += (XYZ_RGB[i][k] / D65_WHITE[i]) as f32 * rgb_cam[k][j];
                }
            }
        }
        Cielab { xyz_cam, colors }
    }

    #[inline]
    fn convert(&self, rgb: &[u16]) -> [i16; 3] {
        let mut xyz = [0.5_f32; 3];
        for c in 0..self.colors {
            for i in 0..3 {
                xyz[i] += self.xyz_cam[i][c] * rgb[c] as f32;
            }
        }
        let x = CBRT[clip16(xyz[0] as i32) as usize];
        let y = CBRT[clip16(xyz[1] as i32) as usize];
        let z = CBRT[clip16(xyz[2] as i32) as usize];
        [
            (64.0 * (116.0 * y - 16.0)) as i16,
            (64.0 * 500.0 * (x - y)) as i16,
            (64.0 * 200.0 * (y - z)) as i16,
        ]
    }
}

/// One AHD tile: returns the interpolated interior patch.
struct AhdPatch {
    top: usize,
    left: usize,
    rows: Vec<(usize, Vec<[u16; 3]>)>,
}

/// Adaptive homogeneity-directed interpolation. Ties between the
/// horizontal and vertical estimates average the two.
pub(crate) fn ahd(ctx: &mut FileContext) -> Result<()> {
    debug!("{}: AHD interpolation", ctx.input);
    let cielab = Cielab::new(&ctx.desc.rgb_cam, 3);
    border_interpolate(ctx, 5);

    let width = ctx.image.width as usize;
    let height = ctx.image.height as usize;
    if height < 12 || width < 12 {
        return Ok(());
    }

    // Snapshot the mosaic: tiles read it concurrently.
    let src = ctx.image.data.clone();
    let cfa = ctx.desc.cfa.clone();

    let mut tiles = Vec::new();
    let mut top = 2_usize;
    while top < height - 5 {
        let mut left = 2_usize;
        while left < width - 5 {
            tiles.push((top, left));
            left += TS - 6;
        }
        top += TS - 6;
    }

    let patches: Vec<AhdPatch> = tiles
        .par_iter()
        .map(|&(top, left)| {
            ahd_tile(&src, width, height, &cfa, &cielab, top, left)
        })
        .collect();

    for patch in patches {
        for (row, cols) in patch.rows {
            for (i, rgb) in cols.iter().enumerate() {
                let idx = (row * width + patch.left + 3 + i) * 4;
                ctx.image.data[idx] = rgb[0];
                ctx.image.data[idx + 1] = rgb[1];
                ctx.image.data[idx + 2] = rgb[2];
            }
        }
    }
    Ok(())
}

fn ahd_tile(
    src: &[u16],
    width: usize,
    height: usize,
    cfa: &crate::mosaic::CfaPattern,
    cielab: &Cielab,
    top: usize,
    left: usize,
) -> AhdPatch {
    let fc = |r: usize, c: usize| cfa.fc(r as u32, c as u32);
    let px = |r: usize, c: usize, ch: usize| src[(r * width + c) * 4 + ch] as i32;

    let mut rgb = vec![[[0_u16; 3]; TS * TS]; 2];
    let mut lab = vec![[[0_i16; 3]; TS * TS]; 2];
    let mut homo = vec![[0_u8; TS * TS]; 2];
    let ti = |r: usize, c: usize| (r - top) * TS + (c - left);

    // Green horizontally and vertically.
    for row in top..(top + TS).min(height - 2) {
        let mut col = left + (fc(row, left) & 1);
        let c = fc(row, col);
        while col < (left + TS).min(width - 2) {
            let val =
                ((px(row, col - 1, 1) + px(row, col, c) + px(row, col + 1, 1)) * 2
                    - px(row, col - 2, c)
                    - px(row, col + 2, c))
                    >> 2;
            rgb[0][ti(row, col)][1] =
                ulim(val, px(row, col - 1, 1), px(row, col + 1, 1)) as u16;
            let val =
                ((px(row - 1, col, 1) + px(row, col, c) + px(row + 1, col, 1)) * 2
                    - px(row - 2, col, c)
                    - px(row + 2, col, c))
                    >> 2;
            rgb[1][ti(row, col)][1] =
                ulim(val, px(row - 1, col, 1), px(row + 1, col, 1)) as u16;
            col += 2;
        }
        // Copy the measured greens.
        for col in left..(left + TS).min(width - 2) {
            if fc(row, col) == 1 {
                let g = px(row, col, 1) as u16;
                rgb[0][ti(row, col)][1] = g;
                rgb[1][ti(row, col)][1] = g;
            }
        }
    }

    // Red and blue, then CIELab.
    for d in 0..2 {
        for row in (top + 1)..(top + TS - 1).min(height - 3) {
            for col in (left + 1)..(left + TS - 1).min(width - 3) {
                let f = fc(row, col);
                let i = ti(row, col);
                if f == 1 {
                    // At green sites both chroma come from the row and
                    // column neighbours.
                    let cdown = fc(row + 1, col);
                    let val = px(row, col, 1)
                        + ((px(row, col - 1, 2 - cdown) + px(row, col + 1, 2 - cdown)) as i32
                            - rgb[d][i - 1][1] as i32
                            - rgb[d][i + 1][1] as i32)
                            / 2;
                    rgb[d][i][2 - cdown] = clip16(val);
                    let val = px(row, col, 1)
                        + ((px(row - 1, col, cdown) + px(row + 1, col, cdown)) as i32
                            - rgb[d][i - TS][1] as i32
                            - rgb[d][i + TS][1] as i32)
                            / 2;
                    rgb[d][i][cdown] = clip16(val);
                } else {
                    let c = 2 - f;
                    let val = rgb[d][i][1] as i32
                        + ((px(row - 1, col - 1, c)
                            + px(row - 1, col + 1, c)
                            + px(row + 1, col - 1, c)
                            + px(row + 1, col + 1, c)
                            - rgb[d][i - TS - 1][1] as i32
                            - rgb[d][i - TS + 1][1] as i32
                            - rgb[d][i + TS - 1][1] as i32
                            - rgb[d][i + TS + 1][1] as i32
                            + 1)
                            >> 2);
                    rgb[d][i][c] = clip16(val);
                }
                let f = fc(row, col);
                rgb[d][i][f] = px(row, col, f) as u16;
                lab[d][i] = cielab.convert(&rgb[d][i]);
            }
        }
    }

    // Homogeneity maps from 4-neighbour differences.
    let dirs = [-1_i64, 1, -(TS as i64), TS as i64];
    for row in (top + 2)..(top + TS - 2).min(height - 4) {
        for col in (left + 2)..(left + TS - 2).min(width - 4) {
            let i = ti(row, col) as i64;
            let mut ldiff = [[0_i32; 4]; 2];
            let mut abdiff = [[0_i32; 4]; 2];
            for d in 0..2 {
                for (k, dir) in dirs.iter().enumerate() {
                    let l0 = lab[d][i as usize];
                    let l1 = lab[d][(i + dir) as usize];
                    ldiff[d][k] = (l0[0] as i32 - l1[0] as i32).abs();
                    abdiff[d][k] = (l0[1] as i32 - l1[1] as i32).pow(2)
                        + (l0[2] as i32 - l1[2] as i32).pow(2);
                }
            }
            let leps = std::cmp::min(
                std::cmp::max(ldiff[0][0], ldiff[0][1]),
                std::cmp::max(ldiff[1][2], ldiff[1][3]),
            );
            let abeps = std::cmp::min(
                std::cmp::max(abdiff[0][0], abdiff[0][1]),
                std::cmp::max(abdiff[1][2], abdiff[1][3]),
            );
            for d in 0..2 {
                let mut h = 0_u8;
                for k in 0..4 {
                    if ldiff[d][k] <= leps && abdiff[d][k] <= abeps {
                        h += 1;
                    }
                }
                homo[d][i as usize] = h;
            }
        }
    }

    // Pick the more homogeneous direction; ties average.
    let mut rows = Vec::new();
    for row in (top + 3)..(top + TS - 3).min(height - 5) {
        let mut cols = Vec::new();
        for col in (left + 3)..(left + TS - 3).min(width - 5) {
            let i = ti(row, col);
            let mut hm = [0_u32; 2];
            for d in 0..2 {
                for y in row - 1..=row + 1 {
                    for x in col - 1..=col + 1 {
                        hm[d] += homo[d][ti(y, x)] as u32;
                    }
                }
            }
            let out = if hm[0] != hm[1] {
                rgb[usize::from(hm[1] > hm[0])][i]
            } else {
                [
                    ((rgb[0][i][0] as u32 + rgb[1][i][0] as u32) >> 1) as u16,
                    ((rgb[0][i][1] as u32 + rgb[1][i][1] as u32) >> 1) as u16,
                    ((rgb[0][i][2] as u32 + rgb[1][i][2] as u32) >> 1) as u16,
                ]
            };
            cols.push(out);
        }
        rows.push((row, cols));
    }
    AhdPatch { top, left, rows }
}

/// Up to eight passes of a 9-median filter on the R-G and B-G
/// differences.
pub(crate) fn median_filter(ctx: &mut FileContext, passes: u16) {
    // Optimal 9-element median network.
    static OPT: [usize; 38] = [
        1, 2, 4, 5, 7, 8, 0, 1, 3, 4, 6, 7, 1, 2, 4, 5, 7, 8, 0, 3, 5, 8, 4, 7, 3, 6, 1, 4, 2, 5,
        4, 7, 4, 2, 6, 4, 4, 2,
    ];
    let width = ctx.image.width as usize;
    let height = ctx.image.height as usize;
    if width < 3 || height < 3 {
        return;
    }
    for pass in 1..=passes {
        debug!("{}: median filter pass {}", ctx.input, pass);
        for c in [0_usize, 2] {
            // Stash the channel difference in the spare channel.
            for pix in ctx.image.data.chunks_exact_mut(4) {
                pix[3] = pix[c];
            }
            for row in 1..height - 1 {
                for col in 1..width - 1 {
                    let mut med = [0_i32; 9];
                    let mut k = 0;
                    for y in row - 1..=row + 1 {
                        for x in col - 1..=col + 1 {
                            let idx = (y * width + x) * 4;
                            med[k] = ctx.image.data[idx + 3] as i32
                                - ctx.image.data[idx + 1] as i32;
                            k += 1;
                        }
                    }
                    for i in (0..OPT.len()).step_by(2) {
                        if med[OPT[i]] > med[OPT[i + 1]] {
                            med.swap(OPT[i], OPT[i + 1]);
                        }
                    }
                    let idx = (row * width + col) * 4;
                    ctx.image.data[idx + c] =
                        clip16(med[4] + ctx.image.data[idx + 1] as i32);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::io::Stream;
    use crate::params::Params;
    use crate::pipeline::FileContext;

    fn bayer_context(raw: &[u16], width: u32, height: u32) -> FileContext {
        let stream = Stream::new(Box::new(std::io::Cursor::new(Vec::new())));
        let mut ctx = FileContext::new(stream, Params::default(), "test");
        ctx.desc.raw_width = width;
        ctx.desc.raw_height = height;
        ctx.desc.width = width;
        ctx.desc.height = height;
        ctx.alloc_image().unwrap();
        for row in 0..height {
            for col in 0..width {
                let c = ctx.desc.fc(row, col);
                ctx.image.data[(row * width + col) as usize * 4 + c] =
                    raw[(row * width + col) as usize];
            }
        }
        ctx
    }

    #[test]
    fn test_bilinear_4x4() {
        #[rustfmt::skip]
        let raw = [
            10_u16, 20, 10, 20,
            30, 40, 30, 40,
            10, 20, 10, 20,
            30, 40, 30, 40,
        ];
        let mut ctx = bayer_context(&raw, 4, 4);
        super::bilinear(&mut ctx).unwrap();
        // (1,1) is a blue site on RGGB.
        let pix = ctx.image.pixel_at(1, 1).unwrap();
        assert_eq!(pix[2], 40);
        // Red from the four diagonal neighbours.
        assert_eq!(pix[0], 10);
        // Green from the four cardinal neighbours: (20+30+30+20)/4.
        assert_eq!(pix[1], 25);
    }

    #[test]
    fn test_demosaic_coverage() {
        // Uniform mosaic: every interior pixel must get all three
        // channels populated.
        let raw = [512_u16; 8 * 8];
        let mut ctx = bayer_context(&raw, 8, 8);
        super::bilinear(&mut ctx).unwrap();
        for row in 1..7_u32 {
            for col in 1..7_u32 {
                let pix = ctx.image.pixel_at(row, col).unwrap();
                for c in 0..3 {
                    assert_ne!(pix[c], 0, "channel {} empty at {},{}", c, row, col);
                }
            }
        }
    }

    #[test]
    fn test_median_filter_uniform() {
        let raw = [100_u16; 8 * 8];
        let mut ctx = bayer_context(&raw, 8, 8);
        super::bilinear(&mut ctx).unwrap();
        let before = ctx.image.data.clone();
        super::median_filter(&mut ctx, 1);
        // A flat field is a fixed point of the median filter.
        assert_eq!(before, ctx.image.data);
    }
}
