//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Dimensions that fit `source` inside a `bound`×`bound` box, preserving the
/// aspect ratio.
///
/// Images already inside the box are returned unchanged; nothing is upscaled.
/// Neither output edge is ever zero.
///
/// # Examples
/// ```
/// # use photo_gal::imaging::fit_within;
/// // 4000x3000 landscape into a 1200 box → 1200x900
/// assert_eq!(fit_within((4000, 3000), 1200), (1200, 900));
///
/// // Small images pass through
/// assert_eq!(fit_within((640, 480), 1200), (640, 480));
/// ```
pub fn fit_within(source: (u32, u32), bound: u32) -> (u32, u32) {
    let (src_w, src_h) = source;
    let longer_edge = src_w.max(src_h);

    if longer_edge <= bound || longer_edge == 0 {
        return source;
    }

    let ratio = bound as f64 / longer_edge as f64;
    if src_w >= src_h {
        let h = (src_h as f64 * ratio).round() as u32;
        (bound, h.max(1))
    } else {
        let w = (src_w as f64 * ratio).round() as u32;
        (w.max(1), bound)
    }
}
