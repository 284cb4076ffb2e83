// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Little-endian cursor shared by the payload decoders.

use glam::{Vec2, Vec3, Vec4};

use crate::PayloadError;

pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub(crate) fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], PayloadError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(PayloadError::Truncated { what })?;
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    pub(crate) fn magic(&mut self, expected: &'static str) -> Result<(), PayloadError> {
        let found = self.take(expected.len(), "magic")?;
        if found == expected.as_bytes() {
            Ok(())
        } else {
            Err(PayloadError::BadMagic { expected })
        }
    }

    pub(crate) fn u32(&mut self, what: &'static str) -> Result<u32, PayloadError> {
        let b = self.take(4, what)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn f32(&mut self, what: &'static str) -> Result<f32, PayloadError> {
        self.u32(what).map(f32::from_bits)
    }

    /// `count` u32 values; the byte length is checked before allocating.
    pub(crate) fn u32s(&mut self, count: usize, what: &'static str) -> Result<Vec<u32>, PayloadError> {
        let bytes = self.take(checked_len(count, 4, what)?, what)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    pub(crate) fn f32s(&mut self, count: usize, what: &'static str) -> Result<Vec<f32>, PayloadError> {
        Ok(self
            .u32s(count, what)?
            .into_iter()
            .map(f32::from_bits)
            .collect())
    }

    pub(crate) fn vec2s(&mut self, count: usize, what: &'static str) -> Result<Vec<Vec2>, PayloadError> {
        let flat = self.f32s(checked_len(count, 2, what)?, what)?;
        Ok(flat.chunks_exact(2).map(Vec2::from_slice).collect())
    }

    pub(crate) fn vec3s(&mut self, count: usize, what: &'static str) -> Result<Vec<Vec3>, PayloadError> {
        let flat = self.f32s(checked_len(count, 3, what)?, what)?;
        Ok(flat.chunks_exact(3).map(Vec3::from_slice).collect())
    }

    pub(crate) fn vec4s(&mut self, count: usize, what: &'static str) -> Result<Vec<Vec4>, PayloadError> {
        let flat = self.f32s(checked_len(count, 4, what)?, what)?;
        Ok(flat.chunks_exact(4).map(Vec4::from_slice).collect())
    }

    /// Fail unless every byte was consumed.
    pub(crate) fn finish(&self) -> Result<(), PayloadError> {
        let rest = self.bytes.len() - self.offset;
        if rest == 0 {
            Ok(())
        } else {
            Err(PayloadError::Invalid(format!("{rest} trailing bytes")))
        }
    }
}

fn checked_len(count: usize, width: usize, what: &'static str) -> Result<usize, PayloadError> {
    count.checked_mul(width).ok_or(PayloadError::Truncated { what })
}
