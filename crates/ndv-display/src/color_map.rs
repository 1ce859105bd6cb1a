//! 256-entry color lookup tables.

use std::fmt;
use std::sync::OnceLock;

use crate::image::Rgba;

/// One RGB entry per 8-bit intensity level.
pub type ColorTable = [[u8; 3]; 256];

/// Built-in color maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorMapId {
    #[default]
    Grayscale,
    Hot,
    Ice,
    Thermal,
}

impl ColorMapId {
    pub const ALL: [Self; 4] = [Self::Grayscale, Self::Hot, Self::Ice, Self::Thermal];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Hot => "hot",
            Self::Ice => "ice",
            Self::Thermal => "thermal",
        }
    }

    /// Look up by id; unknown ids select nothing.
    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == id)
    }

    #[must_use]
    pub fn table(self) -> &'static ColorTable {
        static TABLES: OnceLock<[ColorTable; 4]> = OnceLock::new();
        let tables = TABLES.get_or_init(|| {
            [
                build(|i| [i, i, i]),
                build(|i| ramp3(i, [0, 1, 2])),
                build(|i| ramp3(i, [2, 1, 0])),
                gradient(&[
                    (0.0, [0, 0, 0]),
                    (0.25, [60, 0, 140]),
                    (0.5, [200, 30, 60]),
                    (0.75, [255, 160, 0]),
                    (1.0, [255, 255, 255]),
                ]),
            ]
        });
        &tables[self as usize]
    }
}

impl fmt::Display for ColorMapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn build(f: impl Fn(u8) -> [u8; 3]) -> ColorTable {
    let mut table = [[0u8; 3]; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        *entry = f(i as u8);
    }
    table
}

/// Black to white through three saturating channel ramps, in `order`.
fn ramp3(i: u8, order: [usize; 3]) -> [u8; 3] {
    let v = i as i32 * 3;
    let mut out = [0u8; 3];
    for (step, &channel) in order.iter().enumerate() {
        out[channel] = (v - 255 * step as i32).clamp(0, 255) as u8;
    }
    out
}

fn gradient(stops: &[(f64, [u8; 3])]) -> ColorTable {
    build(|i| {
        let t = f64::from(i) / 255.0;
        let upper = stops
            .iter()
            .position(|(p, _)| *p >= t)
            .unwrap_or(stops.len() - 1)
            .max(1);
        let (p0, c0) = stops[upper - 1];
        let (p1, c1) = stops[upper];
        let f = if p1 > p0 { (t - p0) / (p1 - p0) } else { 0.0 };
        let lerp = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * f).round() as u8;
        [lerp(c0[0], c1[0]), lerp(c0[1], c1[1]), lerp(c0[2], c1[2])]
    })
}

/// Map `value` through `table` over `range`. Values outside the range
/// saturate; NaN maps to the first entry.
#[must_use]
pub fn apply(table: &ColorTable, range: (f64, f64), value: f64) -> Rgba {
    let (lo, hi) = range;
    let index = if value.is_nan() {
        0
    } else if hi > lo {
        ((value - lo) / (hi - lo) * 255.0).clamp(0.0, 255.0) as usize
    } else if value > lo {
        255
    } else {
        0
    };
    Rgba::from_rgb_array(table[index])
}
