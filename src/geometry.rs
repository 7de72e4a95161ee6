use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Width and height exchanged (a 90/270 rotation)
    pub fn transposed(self) -> Self {
        Self::new(self.height, self.width)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn set_size(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
    }

    pub fn has_offset(&self) -> bool {
        self.x != 0 || self.y != 0
    }

    /// Smallest rectangle containing both. Edges past the i32 range are
    /// clamped.
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left().min(other.left());
        let top = self.top().min(other.top());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right.saturating_sub(left), bottom.saturating_sub(top))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_spans_both() {
        let a = Rect::new(0, 0, 1920, 1200);
        let b = Rect::new(1920, 100, 1600, 1200);
        assert_eq!(a.union(&b), Rect::new(0, 0, 3520, 1300));
    }

    #[test]
    fn test_union_negative_origin() {
        let a = Rect::new(-1280, 0, 1280, 1024);
        let b = Rect::new(0, 0, 1920, 1080);
        assert_eq!(a.union(&b), Rect::new(-1280, 0, 3200, 1080));
    }

    #[test]
    fn test_union_clamps_at_i32_range() {
        let far = Rect::new(i32::MAX - 100, 0, 1920, 1200);
        assert_eq!(far.right(), i32::MAX);
        let near = Rect::new(-10, 0, 1600, 1200);
        let both = far.union(&near);
        assert_eq!(both.x, -10);
        assert_eq!(both.width, i32::MAX);
    }

    #[test]
    fn test_edges() {
        let r = Rect::new(10, 20, 30, 40);
        assert_eq!(r.left(), 10);
        assert_eq!(r.right(), 40);
        assert_eq!(r.top(), 20);
        assert_eq!(r.bottom(), 60);
        assert_eq!(r.size().transposed(), Size::new(40, 30));
    }
}
