//! Storage pixel types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric type a raster stores its samples as.
///
/// Samples always travel through the access contract as `i32`; the pixel
/// type only bounds what a band can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    U8,
    U16,
    I16,
    U32,
    I32,
}

impl PixelType {
    /// Smallest representable sample
    pub fn min_sample(&self) -> i64 {
        match self {
            PixelType::U8 | PixelType::U16 | PixelType::U32 => 0,
            PixelType::I16 => i16::MIN as i64,
            PixelType::I32 => i32::MIN as i64,
        }
    }

    /// Largest representable sample
    pub fn max_sample(&self) -> i64 {
        match self {
            PixelType::U8 => u8::MAX as i64,
            PixelType::U16 => u16::MAX as i64,
            PixelType::I16 => i16::MAX as i64,
            PixelType::U32 => u32::MAX as i64,
            PixelType::I32 => i32::MAX as i64,
        }
    }

    /// Saturate a sample into this type's range.
    ///
    /// The result is widened back to `i32`, so `U32` saturates at `i32::MAX`.
    pub fn saturate(&self, value: i32) -> i32 {
        let v = (value as i64).clamp(self.min_sample(), self.max_sample());
        v.min(i32::MAX as i64) as i32
    }

    /// Size of one sample in bits
    pub fn bits(&self) -> u16 {
        match self {
            PixelType::U8 => 8,
            PixelType::U16 | PixelType::I16 => 16,
            PixelType::U32 | PixelType::I32 => 32,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PixelType::U8 => "u8",
            PixelType::U16 => "u16",
            PixelType::I16 => "i16",
            PixelType::U32 => "u32",
            PixelType::I32 => "i32",
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
