use crate::error::DecodeError;
use crate::models::Point;

/// Quadrilateral enclosing the codeword area of a symbol.
///
/// Upstream localization may only find one row indicator side; the missing
/// side is synthesized at the image border and refined later from the
/// detected codeword widths. Skew makes the quad non-rectangular, so min
/// and max bounds are tracked separately from the corner points.
#[derive(Debug, Clone)]
pub struct BoundingBox {
    image_width: usize,
    image_height: usize,
    top_left: Point,
    bottom_left: Point,
    top_right: Point,
    bottom_right: Point,
    min_x: i32,
    max_x: i32,
    min_y: i32,
    max_y: i32,
}

impl BoundingBox {
    /// Build a box from the corner points upstream detection produced.
    /// Either the left pair or the right pair must be complete.
    pub fn new(
        image_width: usize,
        image_height: usize,
        top_left: Option<Point>,
        bottom_left: Option<Point>,
        top_right: Option<Point>,
        bottom_right: Option<Point>,
    ) -> Result<Self, DecodeError> {
        let left_incomplete = top_left.is_none() || bottom_left.is_none();
        let right_incomplete = top_right.is_none() || bottom_right.is_none();
        if left_incomplete && right_incomplete {
            return Err(DecodeError::NotFound);
        }
        if top_left.is_some() != bottom_left.is_some()
            || top_right.is_some() != bottom_right.is_some()
        {
            return Err(DecodeError::NotFound);
        }

        // synthesize the missing side at the image border
        let (top_left, bottom_left, top_right, bottom_right) = match (
            top_left,
            bottom_left,
            top_right,
            bottom_right,
        ) {
            (Some(tl), Some(bl), Some(tr), Some(br)) => (tl, bl, tr, br),
            (Some(tl), Some(bl), None, None) => {
                let edge = image_width as f32 - 1.0;
                (tl, bl, Point::new(edge, tl.y), Point::new(edge, bl.y))
            }
            (None, None, Some(tr), Some(br)) => {
                (Point::new(0.0, tr.y), Point::new(0.0, br.y), tr, br)
            }
            _ => unreachable!(),
        };

        let mut this = Self {
            image_width,
            image_height,
            top_left,
            bottom_left,
            top_right,
            bottom_right,
            min_x: 0,
            max_x: 0,
            min_y: 0,
            max_y: 0,
        };
        this.calculate_min_max();
        Ok(this)
    }

    /// Join the left half of `left` with the right half of `right`
    pub fn merge(left: Option<&Self>, right: Option<&Self>) -> Result<Self, DecodeError> {
        match (left, right) {
            (Some(l), Some(r)) => Self::new(
                l.image_width,
                l.image_height,
                Some(l.top_left),
                Some(l.bottom_left),
                Some(r.top_right),
                Some(r.bottom_right),
            ),
            (Some(l), None) => Ok(l.clone()),
            (None, Some(r)) => Ok(r.clone()),
            (None, None) => Err(DecodeError::NotFound),
        }
    }

    /// Extend the box vertically on one side to cover rows the indicator
    /// column missed, clamped to the image.
    pub fn add_missing_rows(
        &self,
        missing_start_rows: i32,
        missing_end_rows: i32,
        is_left: bool,
    ) -> Result<Self, DecodeError> {
        let mut top_left = self.top_left;
        let mut bottom_left = self.bottom_left;
        let mut top_right = self.top_right;
        let mut bottom_right = self.bottom_right;

        if missing_start_rows > 0 {
            let top = if is_left { self.top_left } else { self.top_right };
            let new_min_y = (top.y as i32 - missing_start_rows).max(0);
            let new_top = Point::new(top.x, new_min_y as f32);
            if is_left {
                top_left = new_top;
            } else {
                top_right = new_top;
            }
        }

        if missing_end_rows > 0 {
            let bottom = if is_left {
                self.bottom_left
            } else {
                self.bottom_right
            };
            let new_max_y = (bottom.y as i32 + missing_end_rows).min(self.image_height as i32 - 1);
            let new_bottom = Point::new(bottom.x, new_max_y as f32);
            if is_left {
                bottom_left = new_bottom;
            } else {
                bottom_right = new_bottom;
            }
        }

        Self::new(
            self.image_width,
            self.image_height,
            Some(top_left),
            Some(bottom_left),
            Some(top_right),
            Some(bottom_right),
        )
    }

    fn calculate_min_max(&mut self) {
        self.min_x = self.top_left.x.min(self.bottom_left.x) as i32;
        self.max_x = self.top_right.x.max(self.bottom_right.x) as i32;
        self.min_y = self.top_left.y.min(self.top_right.y) as i32;
        self.max_y = self.bottom_left.y.max(self.bottom_right.y) as i32;
    }

    /// Leftmost column of the box
    pub fn min_x(&self) -> i32 {
        self.min_x
    }

    /// Rightmost column of the box
    pub fn max_x(&self) -> i32 {
        self.max_x
    }

    /// Topmost row of the box
    pub fn min_y(&self) -> i32 {
        self.min_y
    }

    /// Bottommost row of the box
    pub fn max_y(&self) -> i32 {
        self.max_y
    }

    /// Top-left corner (possibly synthesized)
    pub fn top_left(&self) -> Point {
        self.top_left
    }

    /// Top-right corner (possibly synthesized)
    pub fn top_right(&self) -> Point {
        self.top_right
    }

    /// Bottom-left corner (possibly synthesized)
    pub fn bottom_left(&self) -> Point {
        self.bottom_left
    }

    /// Bottom-right corner (possibly synthesized)
    pub fn bottom_right(&self) -> Point {
        self.bottom_right
    }
}
