use anyhow::Result;

use crate::overlay::font::FontMetricsProvider;
use crate::overlay::{Canvas, SafeZones, TextStyle};

/// Breaks raw slot text into display lines.
///
/// Text containing a real or escaped (`\n` as two characters) newline is
/// split on those newlines as given. Anything else is word-wrapped to fit the
/// horizontal safe zone. Blank lines never survive either path.
pub fn split_lines(
    text: &str,
    style: &TextStyle,
    canvas: &Canvas,
    zones: &SafeZones,
    font: &dyn FontMetricsProvider,
) -> Result<Vec<String>> {
    if has_explicit_breaks(text) {
        return Ok(split_explicit(text));
    }
    let limit = max_text_width(style, canvas, zones);
    wrap_words(text, style.font_size, limit, font)
}

fn has_explicit_breaks(text: &str) -> bool {
    text.contains('\n') || text.contains("\\n")
}

fn split_explicit(text: &str) -> Vec<String> {
    text.replace("\\n", "\n")
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Widest bubble that stays inside the horizontal safe zone when centered.
pub fn max_bubble_width(canvas: &Canvas, zones: &SafeZones) -> f32 {
    let width = canvas.width_f();
    let center = width / 2.0;
    let right = width * zones.right;
    let left = width * zones.left;
    let half = (right - center).min(center - left);
    (half * 2.0).max(0.0)
}

pub fn max_text_width(style: &TextStyle, canvas: &Canvas, zones: &SafeZones) -> f32 {
    (max_bubble_width(canvas, zones) - 2.0 * style.horizontal_padding).max(0.0)
}

/// Collapses every whitespace run, line separators included, to one space.
fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn wrap_words(
    text: &str,
    font_size: f32,
    max_width: f32,
    font: &dyn FontMetricsProvider,
) -> Result<Vec<String>> {
    let normalized = normalize(text);
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in normalized.split(' ').filter(|word| !word.is_empty()) {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if font.measure_width(&candidate, font_size)? <= max_width {
            current = candidate;
            continue;
        }
        if current.is_empty() {
            // A lone word wider than the limit keeps its own line, unsplit.
            lines.push(word.to_string());
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::test_util::FixedAdvanceFont;

    fn fixture() -> (Settings, FixedAdvanceFont) {
        (Settings::default(), FixedAdvanceFont::new(0.5))
    }

    fn lines_for(text: &str, slot: usize) -> Vec<String> {
        let (settings, font) = fixture();
        split_lines(
            text,
            &settings.styles[slot],
            &settings.canvas,
            &settings.safe_zones,
            &font,
        )
        .expect("lines")
    }

    #[test]
    fn bubble_and_text_width_limits() {
        let settings = Settings::default();
        let bubble = max_bubble_width(&settings.canvas, &settings.safe_zones);
        assert!((bubble - 576.0).abs() < 1e-3);
        let text = max_text_width(&settings.styles[0], &settings.canvas, &settings.safe_zones);
        assert!((text - 524.0).abs() < 1e-3);
    }

    #[test]
    fn asymmetric_zones_use_the_narrower_side() {
        let settings = Settings::default();
        let zones = SafeZones {
            left: 0.2,
            right: 0.9,
            ..settings.safe_zones
        };
        let bubble = max_bubble_width(&settings.canvas, &zones);
        assert!((bubble - 432.0).abs() < 1e-3);
    }

    #[test]
    fn padding_wider_than_zone_clamps_to_zero() {
        let settings = Settings::default();
        let style = TextStyle {
            horizontal_padding: 400.0,
            ..settings.styles[0].clone()
        };
        assert_eq!(
            max_text_width(&style, &settings.canvas, &settings.safe_zones),
            0.0
        );
    }

    #[test]
    fn short_text_stays_on_one_normalized_line() {
        assert_eq!(
            lines_for("  Stop   scrolling\t now ", 0),
            vec!["Stop scrolling now"]
        );
    }

    #[test]
    fn explicit_newlines_keep_order_and_drop_blanks() {
        assert_eq!(
            lines_for("first\n\n   \nsecond\\nthird", 0),
            vec!["first", "second", "third"]
        );
        assert_eq!(lines_for("  keep  spacing \nx", 0), vec!["  keep  spacing ", "x"]);
    }

    #[test]
    fn whitespace_only_text_has_no_lines() {
        assert!(lines_for("   \t  ", 0).is_empty());
        assert!(lines_for("", 1).is_empty());
        assert!(lines_for("\n \\n ", 2).is_empty());
    }

    #[test]
    fn greedy_wrap_respects_text_width() {
        // 21px per character at 42px; text2 allows 532px, i.e. 25 characters.
        let lines = lines_for("this is the one trick nobody tells you about", 1);
        assert_eq!(lines, vec!["this is the one trick", "nobody tells you about"]);
        let (settings, font) = fixture();
        let limit = max_text_width(&settings.styles[1], &settings.canvas, &settings.safe_zones);
        for line in &lines {
            assert!(font.measure_width(line, 42.0).expect("width") <= limit);
        }
    }

    #[test]
    fn oversized_word_gets_its_own_line() {
        let long = "x".repeat(40);
        let text = format!("hi {} there", long);
        assert_eq!(lines_for(&text, 0), vec!["hi".to_string(), long, "there".to_string()]);
    }

    #[test]
    fn oversized_first_word_does_not_leave_empty_line() {
        let long = "y".repeat(30);
        let text = format!("{} ok", long);
        assert_eq!(lines_for(&text, 0), vec![long, "ok".to_string()]);
    }
}
