// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::fmt;
use std::str::FromStr;

use image::Rgba;

use crate::error::PoseError;

/// Color type for visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    /// Red color.
    pub const RED: Color = Color(255, 0, 0);
    /// Green color.
    pub const GREEN: Color = Color(0, 255, 0);
    /// Blue color.
    pub const BLUE: Color = Color(0, 0, 255);
    /// White color.
    pub const WHITE: Color = Color(255, 255, 255);
    /// Black color.
    pub const BLACK: Color = Color(0, 0, 0);
    /// Yellow color.
    pub const YELLOW: Color = Color(255, 255, 0);
    /// Cyan color.
    pub const CYAN: Color = Color(0, 255, 255);
    /// Magenta color.
    pub const MAGENTA: Color = Color(255, 0, 255);

    /// Colour names understood by the rendering service.
    pub const NAMED: [(&'static str, Color); 8] = [
        ("white", Self::WHITE),
        ("black", Self::BLACK),
        ("red", Self::RED),
        ("green", Self::GREEN),
        ("blue", Self::BLUE),
        ("yellow", Self::YELLOW),
        ("cyan", Self::CYAN),
        ("magenta", Self::MAGENTA),
    ];

    /// Create a new color from RGB values.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self(r, g, b)
    }

    /// Get a color from the pose palette by index.
    #[must_use]
    pub const fn from_pose_index(index: usize) -> Self {
        let color = POSE_COLORS[index % POSE_COLORS.len()];
        Self(color[0], color[1], color[2])
    }

    /// Opaque RGBA pixel.
    #[must_use]
    pub const fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.0, self.1, self.2, 255])
    }

    /// The service colour name closest to this colour, with the colour it names.
    ///
    /// Exact matches return themselves; ties go to the earlier entry of [`Color::NAMED`].
    #[must_use]
    pub fn nearest_named(self) -> (&'static str, Color) {
        let distance = |c: Color| {
            let d = |a: u8, b: u8| (i32::from(a) - i32::from(b)).pow(2);
            d(self.0, c.0) + d(self.1, c.1) + d(self.2, c.2)
        };
        Self::NAMED
            .into_iter()
            .min_by_key(|&(_, c)| distance(c))
            .unwrap_or(("white", Self::WHITE))
    }

    /// Whether the rendering service knows this colour by name.
    #[must_use]
    pub fn is_named(self) -> bool {
        Self::NAMED.iter().any(|&(_, c)| c == self)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

impl FromStr for Color {
    type Err = PoseError;

    /// Parse a colour name (`white`, `red`, ...) or `#rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            let channel = |i: usize| {
                hex.get(i..i + 2)
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
            };
            if hex.len() == 6
                && let (Some(r), Some(g), Some(b)) = (channel(0), channel(2), channel(4))
            {
                return Ok(Self(r, g, b));
            }
            return Err(PoseError::ConfigError(format!("invalid hex colour '{s}'")));
        }
        Self::NAMED
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(s))
            .map(|(_, c)| *c)
            .ok_or_else(|| PoseError::ConfigError(format!("unknown colour '{s}'")))
    }
}

/// Canvas fill behind the skeleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    /// Solid colour.
    Solid(Color),
    /// Fully transparent pixels.
    Transparent,
}

impl Background {
    /// Fill pixel.
    #[must_use]
    pub const fn to_rgba(self) -> Rgba<u8> {
        match self {
            Self::Solid(c) => c.to_rgba(),
            Self::Transparent => Rgba([0, 0, 0, 0]),
        }
    }
}

impl FromStr for Background {
    type Err = PoseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("transparent") {
            Ok(Self::Transparent)
        } else {
            s.parse().map(Self::Solid)
        }
    }
}

/// Ultralytics Pose Color Palette
pub const POSE_COLORS: [[u8; 3]; 20] = [
    [255, 128, 0],   // #ff8000
    [255, 153, 51],  // #ff9933
    [255, 178, 102], // #ffb266
    [230, 230, 0],   // #e6e600
    [255, 153, 255], // #ff99ff
    [153, 204, 255], // #99ccff
    [255, 102, 255], // #ff66ff
    [255, 51, 255],  // #ff33ff
    [102, 178, 255], // #66b2ff
    [51, 153, 255],  // #3399ff
    [255, 153, 153], // #ff9999
    [255, 102, 102], // #ff6666
    [255, 51, 51],   // #ff3333
    [153, 255, 153], // #99ff99
    [102, 255, 102], // #66ff66
    [51, 255, 51],   // #33ff33
    [0, 255, 0],     // #00ff00
    [0, 0, 255],     // #0000ff
    [255, 0, 0],     // #ff0000
    [255, 255, 255], // #ffffff
];
