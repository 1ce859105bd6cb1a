//! Packed RGBA pixels and images.

/// A 32-bit RGBA pixel, `0xRRGGBBAA`, straight alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(transparent)]
pub struct Rgba(pub u32);

impl Rgba {
    pub const TRANSPARENT: Self = Self(0);
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(((r as u32) << 24) | ((g as u32) << 16) | ((b as u32) << 8) | (a as u32))
    }

    #[inline]
    pub const fn from_rgb_array(c: [u8; 3]) -> Self {
        Self::rgb(c[0], c[1], c[2])
    }

    #[inline]
    pub const fn r(self) -> u8 {
        (self.0 >> 24) as u8
    }

    #[inline]
    pub const fn g(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[inline]
    pub const fn b(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub const fn a(self) -> u8 {
        self.0 as u8
    }
}

/// Row-major RGBA raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImage {
    width: usize,
    height: usize,
    pixels: Vec<Rgba>,
}

impl RgbaImage {
    /// All-transparent image.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgba::TRANSPARENT; width * height],
        }
    }

    /// Wrap `pixels`; `None` if the length does not match.
    #[must_use]
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<Rgba>) -> Option<Self> {
        (pixels.len() == width * height).then_some(Self {
            width,
            height,
            pixels,
        })
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<Rgba> {
        (x < self.width && y < self.height).then(|| self.pixels[y * self.width + x])
    }

    pub fn set(&mut self, x: usize, y: usize, pixel: Rgba) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = pixel;
        }
    }

    /// Nearest-neighbour resample into a `width x height` frame, preserving
    /// aspect ratio and centring; the margin stays transparent.
    #[must_use]
    pub fn fit_into(&self, width: usize, height: usize) -> Self {
        let mut out = Self::new(width, height);
        if self.width == 0 || self.height == 0 || width == 0 || height == 0 {
            return out;
        }
        let scale = (width as f64 / self.width as f64).min(height as f64 / self.height as f64);
        let w = ((self.width as f64 * scale).round() as usize).clamp(1, width);
        let h = ((self.height as f64 * scale).round() as usize).clamp(1, height);
        let x0 = (width - w) / 2;
        let y0 = (height - h) / 2;
        for y in 0..h {
            let sy = (y * self.height / h).min(self.height - 1);
            for x in 0..w {
                let sx = (x * self.width / w).min(self.width - 1);
                out.pixels[(y0 + y) * width + x0 + x] = self.pixels[sy * self.width + sx];
            }
        }
        out
    }
}
