use serde::{Deserialize, Serialize};

/// Original-over-compressed image dimensions. Multiplying a coordinate read
/// off the compressed image by this ratio yields device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactor {
    pub width_ratio: f64,
    pub height_ratio: f64,
}

impl ScaleFactor {
    pub const IDENTITY: ScaleFactor = ScaleFactor {
        width_ratio: 1.0,
        height_ratio: 1.0,
    };

    pub fn new(width_ratio: f64, height_ratio: f64) -> Self {
        Self {
            width_ratio: sanitize_ratio(width_ratio),
            height_ratio: sanitize_ratio(height_ratio),
        }
    }

    /// Ratio between two image sizes; identity on a zero-sized side.
    pub fn from_dimensions(original: (u32, u32), compressed: (u32, u32)) -> Self {
        let ratio = |o: u32, c: u32| if c > 0 { o as f64 / c as f64 } else { 1.0 };
        Self::new(ratio(original.0, compressed.0), ratio(original.1, compressed.1))
    }

    /// Truncates towards zero, like an integer cast.
    pub fn apply(&self, x: u32, y: u32) -> (i32, i32) {
        (
            (x as f64 * self.width_ratio) as i32,
            (y as f64 * self.height_ratio) as i32,
        )
    }
}

impl Default for ScaleFactor {
    fn default() -> Self {
        Self::IDENTITY
    }
}

fn sanitize_ratio(r: f64) -> f64 {
    if r.is_finite() && r > 0.0 {
        r
    } else {
        1.0
    }
}

/// One node of a UI hierarchy snapshot that can produce an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UIElement {
    pub center_x: i32,
    pub center_y: i32,
    pub width: i32,
    pub height: i32,
    pub text: String,
    pub description: String,
    pub resource_id: String,
    pub class_name: String,
    pub clickable: bool,
    pub scrollable: bool,
}

impl UIElement {
    /// Visible label: text, else content description.
    pub fn label(&self) -> &str {
        if self.text.is_empty() {
            &self.description
        } else {
            &self.text
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedElement {
    pub element: UIElement,
    pub relevance_score: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_truncates() {
        let s = ScaleFactor::new(2.0, 1.5);
        assert_eq!(s.apply(100, 200), (200, 300));
        let s = ScaleFactor::new(1.33, 1.33);
        assert_eq!(s.apply(3, 3), (3, 3));
    }

    #[test]
    fn degenerate_dimensions_give_identity() {
        assert_eq!(ScaleFactor::from_dimensions((1080, 2400), (0, 0)), ScaleFactor::IDENTITY);
        assert_eq!(ScaleFactor::new(f64::NAN, -1.0), ScaleFactor::IDENTITY);
        let s = ScaleFactor::from_dimensions((2048, 1024), (1024, 512));
        assert_eq!(s, ScaleFactor::new(2.0, 2.0));
    }
}
