use anyhow::{Result, anyhow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn rgb(&self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }

    pub fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// Alpha from a 0..1 opacity, rounded to the nearest step.
    pub fn with_opacity(self, opacity: f32) -> Self {
        let opacity = if opacity.is_finite() {
            opacity.clamp(0.0, 1.0)
        } else {
            1.0
        };
        self.with_alpha((255.0 * opacity).round() as u8)
    }

    pub fn to_skia(self) -> tiny_skia::Color {
        tiny_skia::Color::from_rgba8(self.r, self.g, self.b, self.a)
    }
}

/// Accepts `#RRGGBB`, `#RRGGBBAA` and `#RGB`; the leading `#` is optional.
pub fn parse_hex_color(value: &str) -> Result<Rgba> {
    let trimmed = value.trim();
    let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return Err(anyhow!("invalid hex color '{}'", value));
    }
    match hex.len() {
        3 => {
            let mut channels = [0u8; 3];
            for (idx, ch) in hex.chars().enumerate() {
                let nibble = ch.to_digit(16).unwrap_or(0) as u8;
                channels[idx] = nibble * 17;
            }
            Ok(Rgba::opaque(channels[0], channels[1], channels[2]))
        }
        6 => Ok(Rgba::opaque(
            channel(hex, 0, value)?,
            channel(hex, 2, value)?,
            channel(hex, 4, value)?,
        )),
        8 => Ok(Rgba {
            r: channel(hex, 0, value)?,
            g: channel(hex, 2, value)?,
            b: channel(hex, 4, value)?,
            a: channel(hex, 6, value)?,
        }),
        _ => Err(anyhow!(
            "invalid hex color '{}': expected 3, 6 or 8 hex digits",
            value
        )),
    }
}

fn channel(hex: &str, start: usize, original: &str) -> Result<u8> {
    u8::from_str_radix(&hex[start..start + 2], 16)
        .map_err(|err| anyhow!("invalid hex color '{}': {}", original, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_brand_red() {
        let color = parse_hex_color("#DB3643").expect("color");
        assert_eq!(color.rgb(), (219, 54, 67));
        assert_eq!(color.a, 255);
    }

    #[test]
    fn parses_short_and_alpha_forms() {
        assert_eq!(
            parse_hex_color("fff").expect("short"),
            Rgba::opaque(255, 255, 255)
        );
        let color = parse_hex_color("#13131380").expect("alpha");
        assert_eq!(color, Rgba { r: 0x13, g: 0x13, b: 0x13, a: 0x80 });
        assert_eq!(
            parse_hex_color("#db3643").expect("lower"),
            Rgba::opaque(219, 54, 67)
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_hex_color("").is_err());
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#GGGGGG").is_err());
        assert!(parse_hex_color("#ÄÄÄ").is_err());
    }

    #[test]
    fn opacity_rounds_to_nearest_alpha() {
        let base = Rgba::opaque(0, 0, 0);
        assert_eq!(base.with_opacity(1.0).a, 255);
        assert_eq!(base.with_opacity(0.5).a, 128);
        assert_eq!(base.with_opacity(0.0).a, 0);
        assert_eq!(base.with_opacity(3.0).a, 255);
    }
}
