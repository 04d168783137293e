//! Color roles declared by raster bands

use serde::{Deserialize, Serialize};
use std::fmt;

/// Visual channel a band declares it carries.
///
/// Bands are looked up by role rather than by position, since
/// producers do not agree on band order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ColorRole {
    Red,
    Green,
    Blue,
    Alpha,
    /// Gray, palette, or no declared interpretation
    #[default]
    Undefined,
}

impl ColorRole {
    /// Roles of a conventional RGB raster, in band order
    pub const RGB: [ColorRole; 3] = [ColorRole::Red, ColorRole::Green, ColorRole::Blue];

    /// Roles of a conventional RGBA raster, in band order
    pub const RGBA: [ColorRole; 4] = [
        ColorRole::Red,
        ColorRole::Green,
        ColorRole::Blue,
        ColorRole::Alpha,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ColorRole::Red => "red",
            ColorRole::Green => "green",
            ColorRole::Blue => "blue",
            ColorRole::Alpha => "alpha",
            ColorRole::Undefined => "undefined",
        }
    }
}

impl fmt::Display for ColorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
