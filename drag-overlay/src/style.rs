//! Single-rule stylesheet for the overlay window.

use anyhow::{bail, Context, Result};
use tiny_skia::Color;

/// Class applied to the overlay window.
pub const WINDOW_CLASS: &str = "test-drag";

pub const DEFAULT_RULE: &str =
    ".test-drag { background: rgba(255,0,0,0.3); color: white; }";

#[derive(Debug, Clone, Copy)]
pub struct Colors {
    pub background: Color,
    pub foreground: Color,
}

impl Default for Colors {
    fn default() -> Self {
        Self {
            background: Color::TRANSPARENT,
            foreground: Color::BLACK,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StyleRule {
    class: String,
    pub colors: Colors,
}

impl StyleRule {
    /// Parses `.class { prop: value; ... }`. Only `background`,
    /// `background-color` and `color` are used; other properties are skipped.
    pub fn parse(css: &str) -> Result<Self> {
        let (selector, rest) = css.split_once('{').context("Style rule has no '{'")?;
        let (body, _) = rest.split_once('}').context("Style rule has no '}'")?;

        let selector = selector.trim();
        let Some(class) = selector.strip_prefix('.') else {
            bail!("Expected a class selector, got '{}'", selector);
        };
        if class.is_empty() || class.contains(char::is_whitespace) {
            bail!("Unsupported selector '{}'", selector);
        }

        let mut colors = Colors::default();
        for declaration in body.split(';') {
            let declaration = declaration.trim();
            if declaration.is_empty() {
                continue;
            }
            let (property, value) = declaration
                .split_once(':')
                .with_context(|| format!("Malformed declaration '{}'", declaration))?;
            let value = value.trim();

            match property.trim() {
                "background" | "background-color" => {
                    colors.background = parse_color(value)
                        .with_context(|| format!("Invalid background '{}'", value))?;
                }
                "color" => {
                    colors.foreground =
                        parse_color(value).with_context(|| format!("Invalid color '{}'", value))?;
                }
                _ => {}
            }
        }

        Ok(Self {
            class: class.to_string(),
            colors,
        })
    }

    pub fn applies_to(&self, class: &str) -> bool {
        self.class == class
    }
}

fn parse_color(value: &str) -> Option<Color> {
    match value {
        "white" => return Some(Color::WHITE),
        "black" => return Some(Color::BLACK),
        "red" => return Some(Color::from_rgba8(255, 0, 0, 255)),
        "transparent" => return Some(Color::TRANSPARENT),
        _ => {}
    }

    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }

    let (func, args) = value.strip_suffix(')')?.split_once('(')?;
    let args: Vec<&str> = args.split(',').map(str::trim).collect();
    match (func.trim(), args.as_slice()) {
        ("rgb", [r, g, b]) => Some(Color::from_rgba8(
            r.parse().ok()?,
            g.parse().ok()?,
            b.parse().ok()?,
            255,
        )),
        ("rgba", [r, g, b, a]) => {
            let channel = |s: &str| s.parse::<u8>().ok().map(|v| v as f32 / 255.0);
            Color::from_rgba(channel(*r)?, channel(*g)?, channel(*b)?, a.parse().ok()?)
        }
        _ => None,
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        6 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, 255)),
        8 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}
