//! Points, rectangles and page boxes

/// A point in page coordinates (points, origin top-left, y down)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in page coordinates
///
/// `(x0, y0)` is the top-left corner and `(x1, y1)` the bottom-right one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// A rectangle with no area cannot hold any text
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }
}

/// The effective MediaBox of a page, in PDF user space
///
/// Used to convert between top-left page coordinates and PDF's
/// bottom-left coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PageBox {
    /// A4 portrait, used when a page has no readable MediaBox
    pub fn a4() -> Self {
        Self {
            llx: 0.0,
            lly: 0.0,
            urx: 595.28,
            ury: 841.89,
        }
    }

    /// Build from the four MediaBox numbers, normalizing swapped corners
    pub fn from_corners(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            llx: a.min(c),
            lly: b.min(d),
            urx: a.max(c),
            ury: b.max(d),
        }
    }

    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    /// Convert a top-left page point into PDF user space
    pub fn to_pdf(&self, point: Point) -> (f64, f64) {
        (self.llx + point.x, self.ury - point.y)
    }

    /// The whole page as a top-left rectangle
    pub fn as_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width(), self.height())
    }
}
