use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

/// Integer rect, used for source regions in pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BorderRect {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BorderRadius {
    pub top_left: f32,
    pub top_right: f32,
    pub bottom_left: f32,
    pub bottom_right: f32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn intersect(&self, other: &Rect) -> Rect {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        Rect::new(x, y, x2 - x, y2 - y)
    }
}

impl RectF {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn intersect(&self, other: &RectF) -> RectF {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        RectF::new(x, y, x2 - x, y2 - y)
    }

    pub fn size(&self) -> Size {
        Size {
            width: self.width,
            height: self.height,
        }
    }
}

impl BorderRect {
    pub fn any(&self) -> bool {
        self.top > 0.0 || self.right > 0.0 || self.bottom > 0.0 || self.left > 0.0
    }
}

impl BorderRadius {
    pub fn any(&self) -> bool {
        self.top_left > 0.0 || self.top_right > 0.0 || self.bottom_left > 0.0 || self.bottom_right > 0.0
    }
}

pub fn snap_to_pixel_grid(value: f32) -> f32 {
    value.round()
}

/// Clips a fitted image rect to `bounds`.
///
/// Returns the visible destination rect and the region of the natural image
/// that maps onto it, snapped to whole pixels.
pub fn clip_image_rect(bounds: &RectF, image_rect: &RectF, natural_width: f32, natural_height: f32) -> (RectF, Rect) {
    let ax2 = bounds.x + bounds.width;
    let bx2 = image_rect.x + image_rect.width;
    let ay2 = bounds.y + bounds.height;
    let by2 = image_rect.y + image_rect.height;
    let scale_x = natural_width / image_rect.width;
    let scale_y = natural_height / image_rect.height;
    let mut dest = RectF::default();
    let mut src = Rect::default();

    if image_rect.x > bounds.x {
        dest.x = image_rect.x;
    } else {
        dest.x = bounds.x;
        src.x = snap_to_pixel_grid((bounds.x - image_rect.x).abs() * scale_x) as i32;
    }

    if image_rect.y > bounds.y {
        dest.y = image_rect.y;
    } else {
        dest.y = bounds.y;
        src.y = snap_to_pixel_grid((bounds.y - image_rect.y).abs() * scale_y) as i32;
    }

    dest.width = if bx2 < ax2 { bx2 - dest.x } else { ax2 - dest.x };
    dest.height = if by2 < ay2 { by2 - dest.y } else { ay2 - dest.y };

    src.width = snap_to_pixel_grid(dest.width * scale_x) as i32;
    src.height = snap_to_pixel_grid(dest.height * scale_y) as i32;

    (dest, src)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_inside_box_keeps_full_source() {
        let bounds = RectF::new(0.0, 0.0, 100.0, 100.0);
        let (dest, src) = clip_image_rect(&bounds, &RectF::new(25.0, 25.0, 50.0, 50.0), 50.0, 50.0);

        assert_eq!(dest, RectF::new(25.0, 25.0, 50.0, 50.0));
        assert_eq!(src, Rect::new(0, 0, 50, 50));
    }

    #[test]
    fn oversized_image_is_cropped_to_center() {
        // 200x100 image covering a 100x100 box, centered horizontally
        let bounds = RectF::new(0.0, 0.0, 100.0, 100.0);
        let (dest, src) = clip_image_rect(&bounds, &RectF::new(-50.0, 0.0, 200.0, 100.0), 400.0, 200.0);

        assert_eq!(dest, bounds);
        assert_eq!(src, Rect::new(100, 0, 200, 200));
    }

    #[test]
    fn intersect_disjoint_is_empty() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, 20, 5, 5);

        assert!(a.intersect(&b).is_empty());
        assert_eq!(a.intersect(&Rect::new(5, 5, 10, 10)), Rect::new(5, 5, 5, 5));
    }
}
