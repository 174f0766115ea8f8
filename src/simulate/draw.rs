//! Minimal alpha-blended drawing on RGBA surfaces.

use super::font::{glyph, GLYPH_HEIGHT, GLYPH_WIDTH};
use image::{Rgb, Rgba, RgbaImage};

/// Axis-aligned rectangle in surface coordinates. May extend past the edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Rect {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl Rect {
    #[cfg(test)]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }
}

/// Source-over blend of a flat color; the pixel keeps its own alpha.
pub(crate) fn blend(px: &mut Rgba<u8>, color: Rgb<u8>, alpha: f32) {
    let a = alpha.clamp(0.0, 1.0);
    for i in 0..3 {
        let mixed = px[i] as f32 * (1.0 - a) + color[i] as f32 * a;
        px[i] = mixed.round().clamp(0.0, 255.0) as u8;
    }
}

fn blend_at(surface: &mut RgbaImage, x: i64, y: i64, color: Rgb<u8>, alpha: f32) {
    if x < 0 || y < 0 || x >= surface.width() as i64 || y >= surface.height() as i64 {
        return;
    }
    blend(surface.get_pixel_mut(x as u32, y as u32), color, alpha);
}

/// Tints every pixel.
pub(crate) fn fill(surface: &mut RgbaImage, color: Rgb<u8>, alpha: f32) {
    for px in surface.pixels_mut() {
        blend(px, color, alpha);
    }
}

/// Tints the part of `rect` that lies on the surface.
pub(crate) fn fill_rect(surface: &mut RgbaImage, rect: Rect, color: Rgb<u8>, alpha: f32) {
    let x0 = rect.x.max(0);
    let y0 = rect.y.max(0);
    let x1 = (rect.x + rect.w).min(surface.width() as i64);
    let y1 = (rect.y + rect.h).min(surface.height() as i64);

    for y in y0..y1 {
        for x in x0..x1 {
            blend(surface.get_pixel_mut(x as u32, y as u32), color, alpha);
        }
    }
}

/// Bresenham line; off-surface pixels are skipped.
pub(crate) fn draw_line(
    surface: &mut RgbaImage,
    from: (i64, i64),
    to: (i64, i64),
    color: Rgb<u8>,
    alpha: f32,
) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        blend_at(surface, x, y, color, alpha);
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Horizontal distance between successive glyph origins.
pub(crate) fn advance(scale: u32) -> i64 {
    ((GLYPH_WIDTH + 1) * scale) as i64
}

/// Height of one text line including spacing.
pub(crate) fn line_height(scale: u32) -> i64 {
    ((GLYPH_HEIGHT + 2) * scale) as i64
}

/// Draws `text` with its top-left corner at `(x, y)`.
pub(crate) fn draw_text(
    surface: &mut RgbaImage,
    x: i64,
    y: i64,
    text: &str,
    scale: u32,
    color: Rgb<u8>,
) {
    let scale = scale.max(1) as i64;
    let mut pen_x = x;

    for c in text.chars() {
        if let Some(rows) = glyph(c) {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH as i64 {
                    if bits & (1 << (GLYPH_WIDTH as i64 - 1 - col)) == 0 {
                        continue;
                    }
                    for sy in 0..scale {
                        for sx in 0..scale {
                            blend_at(
                                surface,
                                pen_x + col * scale + sx,
                                y + row as i64 * scale + sy,
                                color,
                                1.0,
                            );
                        }
                    }
                }
            }
        }
        pen_x += advance(scale as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_midpoint() {
        let mut px = Rgba([0, 100, 200, 255]);
        blend(&mut px, Rgb([200, 100, 0]), 0.5);
        assert_eq!(px, Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn test_blend_keeps_alpha() {
        let mut px = Rgba([10, 10, 10, 42]);
        blend(&mut px, Rgb([255, 255, 255]), 1.0);
        assert_eq!(px, Rgba([255, 255, 255, 42]));
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        fill_rect(
            &mut img,
            Rect { x: 2, y: -5, w: 10, h: 7 },
            Rgb([255, 255, 255]),
            1.0,
        );
        assert_eq!(img.get_pixel(3, 1), &Rgba([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(1, 1), &Rgba([0, 0, 0, 255]));
        assert_eq!(img.get_pixel(3, 2), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_diagonal_line_pixels() {
        let mut img = RgbaImage::from_pixel(5, 5, Rgba([0, 0, 0, 255]));
        draw_line(&mut img, (0, 0), (4, 4), Rgb([255, 0, 0]), 1.0);
        for i in 0..5 {
            assert_eq!(img.get_pixel(i, i), &Rgba([255, 0, 0, 255]));
        }
        assert_eq!(img.get_pixel(4, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_line_off_surface_is_clipped() {
        let mut img = RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 255]));
        draw_line(&mut img, (-5, -5), (10, 10), Rgb([255, 0, 0]), 1.0);
        assert_eq!(img.get_pixel(1, 1), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_text_draws_glyph_pixels() {
        let mut img = RgbaImage::from_pixel(12, 8, Rgba([0, 0, 0, 255]));
        draw_text(&mut img, 0, 0, "T", 1, Rgb([255, 255, 255]));
        // top bar of T
        for x in 0..5 {
            assert_eq!(img.get_pixel(x, 0), &Rgba([255, 255, 255, 255]));
        }
        // stem
        assert_eq!(img.get_pixel(2, 6), &Rgba([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(0, 6), &Rgba([0, 0, 0, 255]));
    }
}
