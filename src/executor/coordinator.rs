// Screen-bounds check for tap coordinates.

/// True when `(x, y)` lies on a `max_x` × `max_y` screen (edges inclusive).
pub fn within_device_bounds(x: i32, y: i32, max_x: i32, max_y: i32) -> bool {
    (0..=max_x).contains(&x) && (0..=max_y).contains(&y)
}
