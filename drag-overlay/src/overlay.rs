// Layer-shell placement of the overlay window and its label

use smithay_client_toolkit::shell::wlr_layer::{Anchor, KeyboardInteractivity, Layer, LayerSurface};

use crate::style::WINDOW_CLASS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margins {
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
    pub left: i32,
}

pub struct OverlaySpec {
    pub layer: Layer,
    pub anchor: Anchor,
    pub margin: Margins,
    pub exclusive_zone: i32,
    pub namespace: &'static str,
    pub keyboard_interactivity: KeyboardInteractivity,
    /// Layer surfaces never get server-side decorations; only logged.
    pub decorated: bool,
    pub css_class: &'static str,
    pub label: LabelSpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSpec {
    pub width: u32,
    pub height: u32,
}

impl Default for OverlaySpec {
    fn default() -> Self {
        Self {
            // Above fullscreen windows and panels
            layer: Layer::Overlay,
            anchor: Anchor::TOP | Anchor::RIGHT,
            margin: Margins {
                top: 6,
                right: 280,
                bottom: 0,
                left: 0,
            },
            // Don't reserve screen space
            exclusive_zone: -1,
            namespace: "test-drag",
            keyboard_interactivity: KeyboardInteractivity::None,
            decorated: false,
            css_class: WINDOW_CLASS,
            label: LabelSpec {
                width: 230,
                height: 51,
            },
        }
    }
}

impl OverlaySpec {
    pub fn apply(&self, layer_surface: &LayerSurface) {
        let m = self.margin;
        layer_surface.set_anchor(self.anchor);
        layer_surface.set_keyboard_interactivity(self.keyboard_interactivity);
        layer_surface.set_margin(m.top, m.right, m.bottom, m.left);
        layer_surface.set_size(self.label.width, self.label.height);
        layer_surface.set_exclusive_zone(self.exclusive_zone);
    }
}
