/// Axis-aligned rectangle in texel space (top-left origin, +Y down).
///
/// Used for glyph and sprite sub-rectangles inside a texture. Width or height
/// of zero is a valid, empty rectangle.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub const fn right(self) -> u32 {
        self.x + self.width
    }

    #[inline]
    pub const fn bottom(self) -> u32 {
        self.y + self.height
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Grows the rectangle by `pad` texels on its right and bottom edges.
    ///
    /// This is the footprint a packed glyph reserves in the atlas.
    #[inline]
    pub const fn padded(self, pad: u32) -> Self {
        Self::new(self.x, self.y, self.width + pad, self.height + pad)
    }

    /// Half-open overlap test: rectangles sharing only an edge do not intersect.
    #[inline]
    pub fn intersects(self, other: PixelRect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Returns `true` if `other` lies fully inside `self`.
    #[inline]
    pub fn contains_rect(self, other: PixelRect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}
