/*
 * rawdev - utils.rs
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

//! Various utilities

/// Will take the slice and create a string from the nul terminated
/// content. Falls back (slower path) if there is no nul terminator or
/// if there are many nuls after the string. We use lossy from utf8.
pub(crate) fn from_maybe_nul_terminated(buf: &[u8]) -> String {
    if let Ok(cstr) = std::ffi::CStr::from_bytes_with_nul(buf) {
        cstr.to_string_lossy().to_string()
    } else {
        String::from_utf8_lossy(buf)
            .trim_end_matches(char::from(0))
            .to_string()
    }
}

/// Clamp to u16 range.
#[inline]
pub(crate) fn clip16(v: i32) -> u16 {
    v.clamp(0, 0xffff) as u16
}

/// Clamp a signed value into `min..=max`.
#[inline]
pub(crate) fn lim(v: i32, min: i32, max: i32) -> i32 {
    v.clamp(min, max)
}

#[cfg(test)]
mod test {
    use super::{clip16, from_maybe_nul_terminated};

    #[test]
    fn test_from_maybe_nul_terminated() {
        assert_eq!(from_maybe_nul_terminated(b"abcdef\0"), "abcdef");
        assert_eq!(from_maybe_nul_terminated(b"abcdef"), "abcdef");
        assert_eq!(from_maybe_nul_terminated(b"abcdef\0\0"), "abcdef");
    }

    #[test]
    fn test_clip16() {
        assert_eq!(clip16(-1), 0);
        assert_eq!(clip16(0x10000), 0xffff);
        assert_eq!(clip16(42), 42);
    }
}
