// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - mosaic.rs
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

//! CFA mosaic patterns.

/// Colour filter array layout of the sensor.
///
/// The `Bayer` payload is the packed pattern word: every pair of bits
/// gives the channel of one site of an 8x2 tile, in the classic
/// encoding where channel 3 is the second green.
#[derive(Clone, Debug, PartialEq)]
pub enum CfaPattern {
    /// 2x2 (8x2 packed) Bayer-style mosaic.
    Bayer(u32),
    /// Fuji 6x6 mosaic. Values are channels 0/1/2.
    XTrans([[u8; 6]; 6]),
    /// Already per-pixel colour, no mosaic.
    Linear,
    /// Single channel sensor.
    Monochrome,
}

/// RGGB, the most common Bayer layout.
pub const BAYER_RGGB: u32 = 0x9494_9494;
/// BGGR.
pub const BAYER_BGGR: u32 = 0x1616_1616;
/// GRBG.
pub const BAYER_GRBG: u32 = 0x6161_6161;
/// GBRG.
pub const BAYER_GBRG: u32 = 0x4949_4949;

impl Default for CfaPattern {
    fn default() -> CfaPattern {
        CfaPattern::Bayer(BAYER_RGGB)
    }
}

impl CfaPattern {
    /// Channel (0=R, 1=G, 2=B, 3=G2) at the sensor site (`row`, `col`).
    #[inline]
    pub fn fc(&self, row: u32, col: u32) -> usize {
        match *self {
            CfaPattern::Bayer(filters) => {
                (filters >> (((row << 1 & 14) + (col & 1)) << 1) & 3) as usize
            }
            CfaPattern::XTrans(ref xtrans) => {
                xtrans[(row % 6) as usize][(col % 6) as usize] as usize
            }
            CfaPattern::Linear => 0,
            CfaPattern::Monochrome => 0,
        }
    }

    /// Like `fc` but collapsing the second green.
    #[inline]
    pub fn fcol(&self, row: u32, col: u32) -> usize {
        let c = self.fc(row, col);
        if c == 3 {
            1
        } else {
            c
        }
    }

    pub fn is_mosaic(&self) -> bool {
        matches!(*self, CfaPattern::Bayer(_) | CfaPattern::XTrans(_))
    }

    /// Shift the pattern for a crop at (`top`, `left`). Cropping at an
    /// odd margin re-phases the 2x2 tile.
    pub fn shifted(&self, top: u32, left: u32) -> CfaPattern {
        match *self {
            CfaPattern::Bayer(mut filters) => {
                if top & 1 != 0 {
                    filters = (filters << 4 & 0xf0f0_f0f0) | (filters >> 4 & 0x0f0f_0f0f);
                }
                if left & 1 != 0 {
                    filters = (filters << 2 & 0xcccc_cccc) | (filters >> 2 & 0x3333_3333);
                }
                CfaPattern::Bayer(filters)
            }
            CfaPattern::XTrans(ref xtrans) => {
                let mut shifted = [[0_u8; 6]; 6];
                for (r, srow) in shifted.iter_mut().enumerate() {
                    for (c, v) in srow.iter_mut().enumerate() {
                        *v = xtrans[(r + top as usize) % 6][(c + left as usize) % 6];
                    }
                }
                CfaPattern::XTrans(shifted)
            }
            ref other => other.clone(),
        }
    }

    /// Parse a 2x2 CFA pattern as stored in TIFF CFAPattern tags,
    /// in reading order R=0 G=1 B=2.
    pub fn from_tiff_cfa(pattern: &[u8]) -> Option<CfaPattern> {
        if pattern.len() != 4 {
            return None;
        }
        match pattern {
            [0, 1, 1, 2] => Some(CfaPattern::Bayer(BAYER_RGGB)),
            [2, 1, 1, 0] => Some(CfaPattern::Bayer(BAYER_BGGR)),
            [1, 0, 2, 1] => Some(CfaPattern::Bayer(BAYER_GRBG)),
            [1, 2, 0, 1] => Some(CfaPattern::Bayer(BAYER_GBRG)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{CfaPattern, BAYER_BGGR, BAYER_RGGB};

    #[test]
    fn test_fc_rggb() {
        let cfa = CfaPattern::Bayer(BAYER_RGGB);
        assert_eq!(cfa.fc(0, 0), 0);
        assert_eq!(cfa.fc(0, 1), 1);
        assert_eq!(cfa.fc(1, 0), 1);
        assert_eq!(cfa.fc(1, 1), 2);
        // Periodicity
        assert_eq!(cfa.fc(2, 2), 0);
        assert_eq!(cfa.fc(3, 3), 2);
    }

    #[test]
    fn test_shifted() {
        let cfa = CfaPattern::Bayer(BAYER_RGGB);
        let shifted = cfa.shifted(1, 1);
        // RGGB shifted by (1,1) starts at the B site.
        assert_eq!(shifted.fcol(0, 0), 2);
        assert_eq!(shifted.fcol(0, 1), 1);
        assert_eq!(shifted.fcol(1, 1), 0);
        // Shifting back and forth is identity.
        assert_eq!(shifted.shifted(1, 1), cfa);
    }

    #[test]
    fn test_from_tiff_cfa() {
        assert_eq!(
            CfaPattern::from_tiff_cfa(&[0, 1, 1, 2]),
            Some(CfaPattern::Bayer(BAYER_RGGB))
        );
        assert_eq!(
            CfaPattern::from_tiff_cfa(&[2, 1, 1, 0]),
            Some(CfaPattern::Bayer(BAYER_BGGR))
        );
        assert_eq!(CfaPattern::from_tiff_cfa(&[0, 0, 0, 0]), None);
    }
}
