use anyhow::{Context, Result};
use tiny_skia::Pixmap;

use crate::style::Colors;
use crate::text_renderer::TextRenderer;

/// Paints the label panel: background fill plus centered text.
pub struct LabelRenderer {
    width: u32,
    height: u32,
    pixmap: Pixmap,
    colors: Colors,
    text: Option<TextRenderer>,
}

impl LabelRenderer {
    pub fn new(width: u32, height: u32, colors: Colors, text: Option<TextRenderer>) -> Result<Self> {
        let pixmap = Pixmap::new(width, height)
            .with_context(|| format!("Invalid label size {}x{}", width, height))?;

        Ok(Self {
            width,
            height,
            pixmap,
            colors,
            text,
        })
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) == self.size() {
            return Ok(());
        }
        self.pixmap = Pixmap::new(width, height)
            .with_context(|| format!("Invalid label size {}x{}", width, height))?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Premultiplied RGBA pixels of the rendered panel. `scale` is the
    /// buffer scale the pixmap was sized for.
    pub fn render(&mut self, label: &str, scale: f32) -> &[u8] {
        self.pixmap.fill(self.colors.background);

        if let Some(text) = &self.text {
            text.render_centered(&mut self.pixmap, label, self.colors.foreground, scale);
        }

        self.pixmap.data()
    }
}

/// Buffer size in pixels for a logical size at an integer output scale.
pub fn scaled_size(logical: (u32, u32), scale: u32) -> (u32, u32) {
    let scale = scale.max(1);
    (logical.0 * scale, logical.1 * scale)
}

/// Copies tiny-skia RGBA into a wl_shm ARGB8888 buffer (BGRA in memory).
pub fn copy_to_argb8888(rgba: &[u8], out: &mut [u8]) {
    for (src, dst) in rgba.chunks_exact(4).zip(out.chunks_exact_mut(4)) {
        dst[0] = src[2]; // B
        dst[1] = src[1]; // G
        dst[2] = src[0]; // R
        dst[3] = src[3]; // A
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{StyleRule, DEFAULT_RULE};

    fn renderer(width: u32, height: u32) -> LabelRenderer {
        let colors = StyleRule::parse(DEFAULT_RULE).unwrap().colors;
        LabelRenderer::new(width, height, colors, None).unwrap()
    }

    #[test]
    fn test_render_size() {
        let mut renderer = renderer(230, 51);
        let pixels = renderer.render("DRAG ME", 1.0);
        assert_eq!(pixels.len(), 230 * 51 * 4);
    }

    #[test]
    fn test_background_is_translucent_red() {
        let mut renderer = renderer(4, 4);
        let pixels = renderer.render("", 1.0);

        let (r, g, b, a) = (pixels[0], pixels[1], pixels[2], pixels[3]);
        assert!((a as i32 - 77).abs() <= 1);
        assert_eq!(r, a);
        assert_eq!(g, 0);
        assert_eq!(b, 0);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let colors = Colors::default();
        assert!(LabelRenderer::new(0, 51, colors, None).is_err());
        assert!(renderer(10, 10).resize(10, 0).is_err());
    }

    #[test]
    fn test_resize() {
        let mut renderer = renderer(10, 10);
        renderer.resize(20, 5).unwrap();
        assert_eq!(renderer.size(), (20, 5));
        assert_eq!(renderer.render("", 1.0).len(), 20 * 5 * 4);
    }

    #[test]
    fn test_scaled_size() {
        assert_eq!(scaled_size((230, 51), 1), (230, 51));
        assert_eq!(scaled_size((230, 51), 2), (460, 102));
        assert_eq!(scaled_size((230, 51), 0), (230, 51));
    }

    #[test]
    fn test_hidpi_buffer_keeps_background() {
        let mut renderer = renderer(230, 51);
        let (w, h) = scaled_size(renderer.size(), 2);
        renderer.resize(w, h).unwrap();

        let pixels = renderer.render("DRAG ME", 2.0);
        assert_eq!(pixels.len(), (460 * 102 * 4) as usize);
        let last = pixels.len() - 4;
        assert!((pixels[last + 3] as i32 - 77).abs() <= 1);
    }

    #[test]
    fn test_argb8888_swaps_red_and_blue() {
        let rgba = [10, 20, 30, 40, 1, 2, 3, 4];
        let mut out = [0u8; 8];
        copy_to_argb8888(&rgba, &mut out);
        assert_eq!(out, [30, 20, 10, 40, 3, 2, 1, 4]);
    }
}
