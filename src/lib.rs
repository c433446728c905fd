// SPDX-License-Identifier: LGPL-3.0-or-later
/*
 * rawdev - lib.rs
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

//! Decode digital camera RAW files and develop them into RGB images.
//!
//! The crate is organized around a per-file [`FileContext`] that owns
//! the stream, the camera descriptor, the raw plane and the working
//! image. The driver loop creates one context per input file and
//! releases it before the next file starts.

mod apple;
mod bitmap;
mod bmff;
mod camera;
mod canon;
mod ciff;
mod colour;
mod container;
mod decompress;
mod dng;
mod fujifilm;
mod hasselblad;
mod identify;
mod io;
mod kodak;
mod minolta;
mod misc;
mod mosaic;
mod nikon;
mod olympus;
mod output;
mod panasonic;
mod params;
mod pentax;
mod phaseone;
mod pipeline;
mod samsung;
mod smal;
mod sony;
mod standard;
pub mod tiff;
mod utils;
mod x3f;

pub use bitmap::{ImageBuffer, Rect};
pub use camera::{Decoder, Descriptor};
pub use container::Endian;
pub use io::Stream;
pub use mosaic::CfaPattern;
pub use output::{write_pnm, write_tiff};
pub use params::{DemosaicAlgorithm, HighlightMode, OutputSpace, Params};
pub use pipeline::{develop, identify_file, FileContext};

/// Standard Result for rawdev
pub type Result<T> = std::result::Result<T, Error>;

/// Standard Error for rawdev
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// File format is unrecognized
    #[error("Unrecognized format")]
    UnrecognizedFormat,
    /// Not supported
    #[error("Operation not supported")]
    NotSupported,
    /// Not found in file
    #[error("Data not found")]
    NotFound,
    /// Unexpected end of file
    #[error("Unexpected end-of-file")]
    UnexpectedEof,
    /// IO Error
    #[error("IO error: {0}")]
    IoError(String),
    /// Error parsing format. The file is abandoned.
    #[error("Format error: {0}")]
    FormatError(String),
    /// Invalid parameter
    #[error("Invalid parameter")]
    InvalidParam,
    /// Invalid format: wrong kind of data found
    #[error("Invalid format")]
    InvalidFormat,
    /// Decompression error.
    #[error("Decompression error: {0}")]
    Decompression(String),
    /// Jpeg decompress
    #[error("JPEG error: {0}")]
    JpegFormat(String),
    /// Checked allocation failed.
    #[error("Allocation failure")]
    AllocationFailure,
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof
        } else {
            Error::IoError(err.to_string())
        }
    }
}

impl From<std::collections::TryReserveError> for Error {
    fn from(_: std::collections::TryReserveError) -> Error {
        Error::AllocationFailure
    }
}

impl From<bitreader::BitReaderError> for Error {
    fn from(err: bitreader::BitReaderError) -> Error {
        Error::Decompression(err.to_string())
    }
}

impl From<jpeg_decoder::Error> for Error {
    fn from(err: jpeg_decoder::Error) -> Error {
        Error::JpegFormat(err.to_string())
    }
}
