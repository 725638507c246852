//! SVG card templates.
//!
//! All dynamic text is passed through [`escape`] exactly once before it is
//! interpolated. Every element carries a single style binding: one `class`
//! or one `style` attribute.

pub mod theme;

pub use theme::{Palette, Theme};

use crate::source::{RepoSnapshot, UNKNOWN};

const FONT: &str = "'Segoe UI', 'Inter', Arial, sans-serif";

pub const PRIVATE_COLOR: &str = "#ff6b6b";
pub const PUBLIC_COLOR: &str = "#50fa7b";

const MAX_TOPICS: usize = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CardOptions {
    pub hide_border: bool,
}

/// Escape text for use in SVG text content and attribute values.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Abbreviate counts of 1000 and above to thousands with one decimal,
/// e.g. `1500` -> `1.5k`, `2000` -> `2k`.
pub fn pretty_number(n: u64) -> String {
    if n < 1_000 {
        return n.to_string();
    }

    // Round half up to tenths of a thousand.
    let tenths = n / 100 + u64::from(n % 100 >= 50);
    let (whole, fraction) = (tenths / 10, tenths % 10);

    if fraction == 0 {
        format!("{}k", whole)
    } else {
        format!("{}.{}k", whole, fraction)
    }
}

/// Format a date like `Mar 5, 2024`.
pub fn format_date(date: Option<time::Date>) -> String {
    let format =
        time::macros::format_description!("[month repr:short] [day padding:none], [year]");
    date.and_then(|x| x.format(&format).ok())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn topics_label(topics: &[String]) -> String {
    let mut label = topics
        .iter()
        .take(MAX_TOPICS)
        .map(|x| escape(x))
        .collect::<Vec<_>>()
        .join(", ");
    if topics.len() > MAX_TOPICS {
        label.push_str("...");
    }
    label
}

/// Small notice card shared by the error and rate limit layouts.
///
/// `aria_label` and `lines` must already be escaped.
fn notice_card(title: &str, aria_label: &str, lines: &[&str], theme: Theme) -> String {
    let Palette {
        background,
        foreground,
        accent,
    } = theme.palette();

    let mut body = String::new();
    for (index, line) in lines.iter().enumerate() {
        let y = 74 + index * 22;
        body.push_str(&format!(
            "\n  <text x=\"20\" y=\"{y}\" class=\"msg\">{line}</text>"
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="520" height="140" viewBox="0 0 520 140" role="img" aria-label="{aria_label}">
  <style>
    .bg {{ fill: {background}; }}
    .title {{ font: 700 16px {FONT}; fill: {accent}; }}
    .msg {{ font: 400 13px {FONT}; fill: {foreground}; }}
  </style>
  <rect width="100%" height="100%" rx="10" class="bg"/>
  <text x="20" y="44" class="title">{title}</text>{body}
</svg>
"#
    )
}

pub fn render_error(message: &str, theme: Theme) -> String {
    let text = escape(message);
    notice_card("⚠️ Error", &text, &[text.as_str()], theme)
}

pub fn render_rate_limited(theme: Theme) -> String {
    notice_card(
        "⏳ Rate limit reached",
        "GitHub API rate limit reached",
        &[
            "The GitHub API quota is exhausted, try again later.",
            "Configure a GITHUB_TOKEN to raise the limit.",
        ],
        theme,
    )
}

pub fn render_success(snapshot: &RepoSnapshot, theme: Theme, options: &CardOptions) -> String {
    let Palette {
        background,
        foreground,
        accent,
    } = theme.palette();

    let (border_color, border_width) = if options.hide_border {
        (background, 0)
    } else {
        (accent, 2)
    };

    let (status_color, status_label) = if snapshot.is_private {
        (PRIVATE_COLOR, "Private")
    } else {
        (PUBLIC_COLOR, "Public")
    };

    let name = escape(&snapshot.display_name);
    let status_x = std::cmp::max(snapshot.display_name.chars().count() * 8 + 40, 160);
    let description = escape(&snapshot.description);
    let language = escape(&snapshot.primary_language);
    let stars = pretty_number(snapshot.star_count);
    let forks = pretty_number(snapshot.fork_count);
    let topics = topics_label(&snapshot.topics);
    let updated = escape(&format_date(snapshot.last_updated));

    let license = match &snapshot.license_label {
        Some(label) => format!(
            r#"
  <g transform="translate(20, 150)">
    <text x="0" y="0" class="label">📜 License:</text>
    <text x="70" y="0" class="muted">{}</text>
  </g>"#,
            escape(label)
        ),
        None => String::new(),
    };

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="500" height="170" viewBox="0 0 500 170" role="img" aria-label="{name}">
  <style>
    .frame {{ fill: {background}; stroke: {border_color}; stroke-width: {border_width}; }}
    .title {{ font: 600 17px {FONT}; fill: {foreground}; }}
    .label {{ font: 600 12px {FONT}; fill: {foreground}; }}
    .value {{ font: 500 13px {FONT}; fill: {accent}; }}
    .muted {{ font: 400 11px {FONT}; fill: {foreground}; opacity: 0.7; }}
    .hint {{ font: 400 10px {FONT}; fill: {foreground}; opacity: 0.7; }}
    .status-dot {{ fill: {status_color}; }}
    .lang-dot {{ fill: {accent}; }}
  </style>
  <rect x="1" y="1" width="498" height="168" rx="12" class="frame"/>
  <g transform="translate(20, 30)">
    <circle cx="0" cy="-8" r="6" class="status-dot"/>
    <text x="14" y="-2" class="title">{name}</text>
    <text x="{status_x}" y="-2" class="muted">{status_label}</text>
  </g>
  <foreignObject x="20" y="45" width="460" height="50">
    <div xmlns="http://www.w3.org/1999/xhtml" style="font-family: {FONT}; font-size: 13px; color: {foreground}; opacity: 0.85; line-height: 1.4; word-wrap: break-word;">{description}</div>
  </foreignObject>
  <g transform="translate(20, 105)">
    <circle cx="8" cy="8" r="4" class="lang-dot"/>
    <text x="20" y="12" class="label">Language:</text>
    <text x="80" y="12" class="value">{language}</text>
    <text x="160" y="12" class="label">⭐ Stars:</text>
    <text x="215" y="12" class="value">{stars}</text>
    <text x="280" y="12" class="label">🍴 Forks:</text>
    <text x="330" y="12" class="value">{forks}</text>
  </g>
  <g transform="translate(20, 130)">
    <text x="0" y="0" class="label">🏷️ Topics:</text>
    <text x="70" y="0" class="muted">{topics}</text>
    <text x="250" y="0" class="label">📅 Updated:</text>
    <text x="310" y="0" class="muted">{updated}</text>
  </g>{license}
  <text x="400" y="165" class="hint">Click to visit →</text>
</svg>
"#
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn snapshot() -> RepoSnapshot {
        RepoSnapshot {
            display_name: "alice/repo1".to_string(),
            description: "A repo".to_string(),
            star_count: 1500,
            fork_count: 12,
            primary_language: "Rust".to_string(),
            last_updated: Some(time::macros::date!(2024 - 03 - 05)),
            topics: vec!["cli".to_string(), "svg".to_string()],
            license_label: Some("MIT".to_string()),
            is_private: false,
        }
    }

    /// All `#rrggbb` colors in a document.
    fn colors(doc: &str) -> Vec<String> {
        let mut out = Vec::new();
        for (index, _) in doc.match_indices('#') {
            let candidate = &doc[index + 1..];
            let hex: String = candidate
                .chars()
                .take_while(|c| c.is_ascii_hexdigit())
                .collect();
            if hex.len() == 6 {
                out.push(format!("#{}", hex));
            }
        }
        out
    }

    fn unescape(value: &str) -> String {
        value
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&amp;", "&")
    }

    /// Tags carrying more than one style binding.
    fn elements_with_conflicting_styles(doc: &str) -> Vec<String> {
        doc.split('<')
            .skip(1)
            .map(|x| x.split('>').next().unwrap_or_default())
            .filter(|tag| {
                let bindings = [" class=", " style=", " fill=", " font-size=", " stroke="]
                    .iter()
                    .filter(|attr| tag.contains(*attr))
                    .count();
                bindings > 1
            })
            .map(|x| x.to_string())
            .collect()
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape(""), "");
        assert_eq!(escape("plain"), "plain");
        assert_eq!(
            escape(r#"<a href="x">Tom & Jerry</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&lt;/a&gt;"
        );
        assert_eq!(escape("&amp;"), "&amp;amp;");
    }

    #[test]
    fn test_escape_removes_raw_markup_and_round_trips() {
        let inputs = [
            "&",
            "<script>alert(1)</script>",
            r#"" onload="evil()"#,
            "a && b > c < d",
            "&lt; already escaped &gt;",
        ];
        for input in inputs {
            let escaped = escape(input);
            assert!(!escaped.contains('<'));
            assert!(!escaped.contains('>'));
            assert!(!escaped.contains('"'));
            assert!(escaped
                .match_indices('&')
                .all(|(i, _)| ["&amp;", "&lt;", "&gt;", "&quot;"]
                    .iter()
                    .any(|e| escaped[i..].starts_with(e))));
            assert_eq!(unescape(&escaped), input);
        }
    }

    #[test]
    fn test_pretty_number() {
        assert_eq!(pretty_number(0), "0");
        assert_eq!(pretty_number(999), "999");
        assert_eq!(pretty_number(1000), "1k");
        assert_eq!(pretty_number(1049), "1k");
        assert_eq!(pretty_number(1050), "1.1k");
        assert_eq!(pretty_number(1250), "1.3k");
        assert_eq!(pretty_number(1500), "1.5k");
        assert_eq!(pretty_number(2000), "2k");
        assert_eq!(pretty_number(12_345), "12.3k");
        assert_eq!(pretty_number(999_999), "1000k");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(
            format_date(Some(time::macros::date!(2024 - 03 - 05))),
            "Mar 5, 2024"
        );
        assert_eq!(
            format_date(Some(time::macros::date!(2023 - 12 - 31))),
            "Dec 31, 2023"
        );
        assert_eq!(format_date(None), "Unknown");
    }

    #[test]
    fn test_topics_label() {
        let topics = |xs: &[&str]| xs.iter().map(|x| x.to_string()).collect::<Vec<_>>();

        assert_eq!(
            topics_label(&topics(&["a", "b", "c", "d", "e"])),
            "a, b, c..."
        );
        assert_eq!(topics_label(&topics(&["a", "b", "c"])), "a, b, c");
        assert_eq!(topics_label(&topics(&["a", "b"])), "a, b");
        assert_eq!(topics_label(&[]), "");
        assert_eq!(topics_label(&topics(&["<x>"])), "&lt;x&gt;");
    }

    #[test]
    fn test_render_success_content() {
        let doc = render_success(&snapshot(), Theme::Radical, &CardOptions::default());

        assert!(doc.starts_with("<?xml"));
        assert!(doc.trim_end().ends_with("</svg>"));
        assert!(doc.contains(r#"class="title">alice/repo1</text>"#));
        assert!(doc.contains(">A repo</div>"));
        assert!(doc.contains(r#"class="value">Rust</text>"#));
        assert!(doc.contains(r#"class="value">1.5k</text>"#));
        assert!(doc.contains(r#"class="value">12</text>"#));
        assert!(doc.contains(r#"class="muted">cli, svg</text>"#));
        assert!(doc.contains(r#"class="muted">Mar 5, 2024</text>"#));
        assert!(doc.contains(r#"class="muted">MIT</text>"#));
        assert!(doc.contains(">Public</text>"));
    }

    #[test]
    fn test_render_success_escapes_dynamic_values() {
        let snapshot = RepoSnapshot {
            display_name: "a&b/<repo>".to_string(),
            description: r#"<script>"x"</script>"#.to_string(),
            primary_language: "C<>".to_string(),
            topics: vec!["t&t".to_string()],
            license_label: Some("<MIT>".to_string()),
            ..snapshot()
        };

        let doc = render_success(&snapshot, Theme::Dark, &CardOptions::default());
        assert!(!doc.contains("<script>"));
        assert!(!doc.contains("<repo>"));
        assert!(doc.contains(r#"aria-label="a&amp;b/&lt;repo&gt;""#));
        assert!(doc.contains("&lt;script&gt;&quot;x&quot;&lt;/script&gt;"));
        assert!(doc.contains(">C&lt;&gt;</text>"));
        assert!(doc.contains(">t&amp;t</text>"));
        assert!(doc.contains(">&lt;MIT&gt;</text>"));
    }

    #[test]
    fn test_render_success_truncates_topics() {
        let snapshot = RepoSnapshot {
            topics: ["a", "b", "c", "d", "e"]
                .iter()
                .map(|x| x.to_string())
                .collect(),
            ..snapshot()
        };
        let doc = render_success(&snapshot, Theme::Radical, &CardOptions::default());
        assert!(doc.contains(r#"class="muted">a, b, c...</text>"#));

        let snapshot = RepoSnapshot {
            topics: Vec::new(),
            ..snapshot
        };
        let doc = render_success(&snapshot, Theme::Radical, &CardOptions::default());
        assert!(doc.contains(r#"<text x="70" y="0" class="muted"></text>"#));
        assert!(!doc.contains("..."));
    }

    #[test]
    fn test_render_success_omits_missing_license() {
        let with_license = render_success(&snapshot(), Theme::Radical, &CardOptions::default());
        assert_eq!(with_license.matches("License:").count(), 1);

        let snapshot = RepoSnapshot {
            license_label: None,
            ..snapshot()
        };
        let doc = render_success(&snapshot, Theme::Radical, &CardOptions::default());
        assert_eq!(doc.matches("License").count(), 0);
        assert_eq!(
            doc.matches("<g ").count() + 1,
            with_license.matches("<g ").count()
        );
    }

    #[test]
    fn test_render_success_status_marker() {
        let public = render_success(&snapshot(), Theme::Radical, &CardOptions::default());
        assert!(public.contains(&format!(".status-dot {{ fill: {}; }}", PUBLIC_COLOR)));
        assert!(!public.contains(PRIVATE_COLOR));

        let snapshot = RepoSnapshot {
            is_private: true,
            ..snapshot()
        };
        let private = render_success(&snapshot, Theme::Radical, &CardOptions::default());
        assert!(private.contains(&format!(".status-dot {{ fill: {}; }}", PRIVATE_COLOR)));
        assert!(!private.contains(PUBLIC_COLOR));
        assert!(private.contains(">Private</text>"));
    }

    #[test]
    fn test_render_success_border_toggle_keeps_layout() {
        let p = Theme::Dracula.palette();
        let shown = render_success(&snapshot(), Theme::Dracula, &CardOptions::default());
        let hidden = render_success(
            &snapshot(),
            Theme::Dracula,
            &CardOptions { hide_border: true },
        );

        assert!(shown.contains(&format!("stroke: {}; stroke-width: 2;", p.accent)));
        assert!(hidden.contains(&format!("stroke: {}; stroke-width: 0;", p.background)));

        let lines = |doc: &str| doc.lines().count();
        assert_eq!(lines(&shown), lines(&hidden));
        assert_eq!(shown.matches('<').count(), hidden.matches('<').count());
    }

    #[test]
    fn test_render_single_style_binding_per_element() {
        let docs = [
            render_success(&snapshot(), Theme::Light, &CardOptions::default()),
            render_success(&snapshot(), Theme::Light, &CardOptions { hide_border: true }),
            render_error("boom", Theme::Light),
            render_rate_limited(Theme::Light),
        ];
        for doc in docs {
            assert_eq!(elements_with_conflicting_styles(&doc), Vec::<String>::new());
        }
    }

    #[test]
    fn test_render_colors_come_from_theme() {
        for theme in Theme::ALL {
            let p = theme.palette();
            let allowed = [p.background, p.foreground, p.accent];

            for doc in [render_error("oops", theme), render_rate_limited(theme)] {
                for color in colors(&doc) {
                    assert!(allowed.contains(&color.as_str()), "{}: {}", theme, color);
                }
            }

            let doc = render_success(&snapshot(), theme, &CardOptions::default());
            for color in colors(&doc) {
                assert!(
                    allowed.contains(&color.as_str()) || color == PUBLIC_COLOR,
                    "{}: {}",
                    theme,
                    color
                );
            }
        }
    }

    #[test]
    fn test_render_error() {
        let doc = render_error("Repository not found: a/<b>", Theme::Radical);
        assert!(doc.contains(r#"width="520" height="140""#));
        assert!(doc.contains(">⚠️ Error</text>"));
        assert!(doc.contains(r#"class="msg">Repository not found: a/&lt;b&gt;</text>"#));
        assert!(doc.contains(r#"aria-label="Repository not found: a/&lt;b&gt;""#));
    }

    #[test]
    fn test_render_rate_limited_is_static() {
        let without_colors = |theme: Theme| {
            let p = theme.palette();
            render_rate_limited(theme)
                .replace(p.background, "BG")
                .replace(p.foreground, "FG")
                .replace(p.accent, "ACCENT")
        };
        assert_eq!(without_colors(Theme::Dark), without_colors(Theme::Radical));

        let doc = render_rate_limited(Theme::Dark);
        assert!(doc.contains("rate limit"));
        assert!(doc.contains("GITHUB_TOKEN"));
    }
}
