/*
 * rawdev - tiff/exif.rs
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

//! The tags we care about. Baseline TIFF, Exif and DNG.

#![allow(dead_code)]

pub const TAG_NEW_SUBFILE_TYPE: u16 = 0x00fe;
pub const TAG_IMAGE_WIDTH: u16 = 0x0100;
pub const TAG_IMAGE_LENGTH: u16 = 0x0101;
pub const TAG_BITS_PER_SAMPLE: u16 = 0x0102;
pub const TAG_COMPRESSION: u16 = 0x0103;
pub const TAG_PHOTOMETRIC: u16 = 0x0106;
pub const TAG_FILL_ORDER: u16 = 0x010a;
pub const TAG_MAKE: u16 = 0x010f;
pub const TAG_MODEL: u16 = 0x0110;
pub const TAG_STRIP_OFFSETS: u16 = 0x0111;
pub const TAG_ORIENTATION: u16 = 0x0112;
pub const TAG_SAMPLES_PER_PIXEL: u16 = 0x0115;
pub const TAG_ROWS_PER_STRIP: u16 = 0x0116;
pub const TAG_STRIP_BYTE_COUNTS: u16 = 0x0117;
pub const TAG_X_RESOLUTION: u16 = 0x011a;
pub const TAG_Y_RESOLUTION: u16 = 0x011b;
pub const TAG_PLANAR_CONFIG: u16 = 0x011c;
pub const TAG_SOFTWARE: u16 = 0x0131;
pub const TAG_DATE_TIME: u16 = 0x0132;
pub const TAG_ARTIST: u16 = 0x013b;
pub const TAG_PREDICTOR: u16 = 0x013d;
pub const TAG_TILE_WIDTH: u16 = 0x0142;
pub const TAG_TILE_LENGTH: u16 = 0x0143;
pub const TAG_TILE_OFFSETS: u16 = 0x0144;
pub const TAG_SUB_IFDS: u16 = 0x014a;
pub const TAG_JPEG_IF_OFFSET: u16 = 0x0201;
pub const TAG_JPEG_IF_LENGTH: u16 = 0x0202;
pub const TAG_CFA_REPEAT_PATTERN_DIM: u16 = 0x828d;
pub const TAG_CFA_PATTERN_8280: u16 = 0x828e;
pub const TAG_KODAK_IFD: u16 = 0x8290;
pub const TAG_EXPOSURE_TIME: u16 = 0x829a;
pub const TAG_FNUMBER: u16 = 0x829d;
pub const TAG_EXIF_IFD: u16 = 0x8769;
pub const TAG_ICC_PROFILE: u16 = 0x8773;
pub const TAG_GPS_IFD: u16 = 0x8825;
pub const TAG_ISO_SPEED: u16 = 0x8827;
pub const TAG_DATE_TIME_ORIGINAL: u16 = 0x9003;
pub const TAG_SHUTTER_SPEED_VALUE: u16 = 0x9201;
pub const TAG_APERTURE_VALUE: u16 = 0x9202;
pub const TAG_FOCAL_LENGTH: u16 = 0x920a;
pub const TAG_MAKER_NOTE: u16 = 0x927c;
pub const TAG_CFA_PATTERN: u16 = 0xa302;

// DNG 1.x
pub const DNG_TAG_VERSION: u16 = 0xc612;
pub const DNG_TAG_BACKWARD_VERSION: u16 = 0xc613;
pub const DNG_TAG_UNIQUE_CAMERA_MODEL: u16 = 0xc614;
pub const DNG_TAG_CFA_PLANE_COLOR: u16 = 0xc616;
pub const DNG_TAG_CFA_LAYOUT: u16 = 0xc617;
pub const DNG_TAG_LINEARIZATION_TABLE: u16 = 0xc618;
pub const DNG_TAG_BLACK_LEVEL_REPEAT_DIM: u16 = 0xc619;
pub const DNG_TAG_BLACK_LEVEL: u16 = 0xc61a;
pub const DNG_TAG_BLACK_LEVEL_DELTA_H: u16 = 0xc61b;
pub const DNG_TAG_BLACK_LEVEL_DELTA_V: u16 = 0xc61c;
pub const DNG_TAG_WHITE_LEVEL: u16 = 0xc61d;
pub const DNG_TAG_DEFAULT_SCALE: u16 = 0xc61e;
pub const DNG_TAG_DEFAULT_CROP_ORIGIN: u16 = 0xc61f;
pub const DNG_TAG_DEFAULT_CROP_SIZE: u16 = 0xc620;
pub const DNG_TAG_COLOR_MATRIX1: u16 = 0xc621;
pub const DNG_TAG_COLOR_MATRIX2: u16 = 0xc622;
pub const DNG_TAG_CAMERA_CALIBRATION1: u16 = 0xc623;
pub const DNG_TAG_CAMERA_CALIBRATION2: u16 = 0xc624;
pub const DNG_TAG_ANALOG_BALANCE: u16 = 0xc627;
pub const DNG_TAG_AS_SHOT_NEUTRAL: u16 = 0xc628;
pub const DNG_TAG_AS_SHOT_WHITE_XY: u16 = 0xc629;
pub const DNG_TAG_DNG_PRIVATE: u16 = 0xc634;
pub const DNG_TAG_CALIBRATION_ILLUMINANT1: u16 = 0xc65a;
pub const DNG_TAG_CALIBRATION_ILLUMINANT2: u16 = 0xc65b;
pub const DNG_TAG_ACTIVE_AREA: u16 = 0xc68d;
pub const DNG_TAG_MASKED_AREAS: u16 = 0xc68e;
pub const DNG_TAG_OPCODE_LIST2: u16 = 0xc741;

// Panasonic RW2, small-integer tags in the first IFD.
pub const RW2_TAG_SENSOR_WIDTH: u16 = 0x0002;
pub const RW2_TAG_SENSOR_HEIGHT: u16 = 0x0003;
pub const RW2_TAG_SENSOR_TOP_BORDER: u16 = 0x0004;
pub const RW2_TAG_SENSOR_LEFT_BORDER: u16 = 0x0005;
pub const RW2_TAG_SENSOR_BOTTOM_BORDER: u16 = 0x0006;
pub const RW2_TAG_SENSOR_RIGHT_BORDER: u16 = 0x0007;
pub const RW2_TAG_ISO: u16 = 0x0017;
pub const RW2_TAG_BLACK_LEVEL_RED: u16 = 0x001c;
pub const RW2_TAG_BLACK_LEVEL_GREEN: u16 = 0x001d;
pub const RW2_TAG_BLACK_LEVEL_BLUE: u16 = 0x001e;
pub const RW2_TAG_WB_RED: u16 = 0x0024;
pub const RW2_TAG_WB_GREEN: u16 = 0x0025;
pub const RW2_TAG_WB_BLUE: u16 = 0x0026;
pub const RW2_TAG_JPEG_FROM_RAW: u16 = 0x002e;

// Canon CR2.
pub const CR2_TAG_SLICES: u16 = 0xc640;
pub const CR2_TAG_SRAW_TYPE: u16 = 0xc6c5;

/// Compression values seen in the wild.
pub const COMPRESSION_NONE: u16 = 1;
pub const COMPRESSION_LJPEG: u16 = 7;
pub const COMPRESSION_DEFLATE: u16 = 8;
pub const COMPRESSION_LOSSY_JPEG: u16 = 34892;
pub const COMPRESSION_NIKON_PACKED: u16 = 32769;
pub const COMPRESSION_NIKON_COMPRESSED: u16 = 34713;
pub const COMPRESSION_SONY_ARW2: u16 = 32767;
pub const COMPRESSION_PENTAX: u16 = 65535;

/// PhotometricInterpretation values.
pub const PHOTOMETRIC_MINISBLACK: u16 = 1;
pub const PHOTOMETRIC_RGB: u16 = 2;
pub const PHOTOMETRIC_CFA: u16 = 32803;
pub const PHOTOMETRIC_LINEAR_RAW: u16 = 34892;
