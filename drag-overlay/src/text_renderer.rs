// Single-line label text using fontdue

use anyhow::{anyhow, Result};
use fontdue::layout::{
    CoordinateSystem, HorizontalAlign, Layout, LayoutSettings, TextStyle, VerticalAlign,
};
use tiny_skia::{Color, Pixmap};
use tracing::{debug, warn};

const TEXT_FONT_SIZE: f32 = 18.0;

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/google-carlito-fonts/Carlito-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
];

pub struct TextRenderer {
    font: fontdue::Font,
}

impl TextRenderer {
    /// First readable font from the usual system locations.
    pub fn load_system() -> Option<Self> {
        for path in FONT_CANDIDATES {
            let Ok(data) = std::fs::read(path) else {
                continue;
            };
            match Self::from_bytes(&data) {
                Ok(renderer) => {
                    debug!("Using font {}", path);
                    return Some(renderer);
                }
                Err(e) => warn!("Skipping font {}: {}", path, e),
            }
        }
        warn!("No usable system font found, label text will not be drawn");
        None
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let font = fontdue::Font::from_bytes(data, fontdue::FontSettings::default())
            .map_err(|e| anyhow!("Failed to load font: {}", e))?;
        Ok(Self { font })
    }

    /// Draws `text` centered in the pixmap, with the font scaled for the
    /// output's buffer scale.
    pub fn render_centered(&self, pixmap: &mut Pixmap, text: &str, color: Color, scale: f32) {
        if text.is_empty() {
            return;
        }

        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x: 0.0,
            y: 0.0,
            max_width: Some(pixmap.width() as f32),
            max_height: Some(pixmap.height() as f32),
            horizontal_align: HorizontalAlign::Center,
            vertical_align: VerticalAlign::Middle,
            ..Default::default()
        });
        layout.append(&[&self.font], &TextStyle::new(text, TEXT_FONT_SIZE * scale.max(1.0), 0));

        for glyph in layout.glyphs() {
            let (metrics, bitmap) = self.font.rasterize_config(glyph.key);
            let glyph_x = glyph.x as i32;
            let glyph_y = glyph.y as i32;

            for dy in 0..metrics.height {
                for dx in 0..metrics.width {
                    let px = glyph_x + dx as i32;
                    let py = glyph_y + dy as i32;

                    if px >= 0 && px < pixmap.width() as i32 && py >= 0 && py < pixmap.height() as i32 {
                        let coverage = bitmap[dy * metrics.width + dx] as f32 / 255.0;
                        if coverage > 0.0 {
                            blend_pixel(pixmap, px as u32, py as u32, color, coverage);
                        }
                    }
                }
            }
        }
    }
}

/// Source-over onto tiny-skia's premultiplied RGBA storage.
fn blend_pixel(pixmap: &mut Pixmap, x: u32, y: u32, color: Color, coverage: f32) {
    let offset = ((y * pixmap.width() + x) * 4) as usize;
    let data = pixmap.data_mut();
    if offset + 3 >= data.len() {
        return;
    }

    let src_a = color.alpha() * coverage;
    let src = [color.red() * src_a, color.green() * src_a, color.blue() * src_a, src_a];

    for (i, s) in src.iter().enumerate() {
        let dst = data[offset + i] as f32 / 255.0;
        let out = s + dst * (1.0 - src_a);
        data[offset + i] = (out.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blend_full_coverage_replaces_pixel() {
        let mut pixmap = Pixmap::new(2, 2).unwrap();
        pixmap.fill(Color::from_rgba8(255, 0, 0, 255));

        blend_pixel(&mut pixmap, 1, 1, Color::WHITE, 1.0);

        let offset = (2 + 1) * 4;
        assert_eq!(&pixmap.data()[offset..offset + 4], &[255, 255, 255, 255]);
        assert_eq!(&pixmap.data()[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_blend_partial_coverage_over_transparent() {
        let mut pixmap = Pixmap::new(1, 1).unwrap();
        blend_pixel(&mut pixmap, 0, 0, Color::WHITE, 0.5);

        let px = pixmap.data();
        // Premultiplied: every channel equals alpha
        assert!((px[3] as i32 - 128).abs() <= 1);
        assert_eq!(px[0], px[3]);
    }

    #[test]
    fn test_invalid_font_bytes() {
        assert!(TextRenderer::from_bytes(b"not a font").is_err());
    }
}
