/// Logical screen size used for the pixel → NDC projection.
///
/// Supplied by the window layer each frame; the batch shader divides vertex
/// positions by it.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }

    /// Size clamped to at least one pixel, safe to divide by.
    #[inline]
    pub fn clamped(self) -> [f32; 2] {
        [self.width.max(1.0), self.height.max(1.0)]
    }
}
