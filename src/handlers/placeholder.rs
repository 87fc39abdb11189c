use axum::{
    extract::Query,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

pub const DEFAULT_WIDTH: u32 = 300;
pub const DEFAULT_HEIGHT: u32 = 200;
pub const MAX_DIMENSION: u32 = 4000;
pub const MAX_TEXT_CHARS: usize = 64;

const DEFAULT_BG: &str = "cccccc";
const DEFAULT_FG: &str = "555555";

/// Raw query parameters; invalid values fall back to defaults
#[derive(Debug, Default, Deserialize)]
pub struct PlaceholderParams {
    pub width: Option<String>,
    pub height: Option<String>,
    pub text: Option<String>,
    pub bg: Option<String>,
    pub fg: Option<String>,
}

/// Normalized placeholder description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub width: u32,
    pub height: u32,
    pub text: String,
    pub bg: String,
    pub fg: String,
}

impl Placeholder {
    pub fn from_params(params: &PlaceholderParams) -> Self {
        let width = dimension(params.width.as_deref(), DEFAULT_WIDTH);
        let height = dimension(params.height.as_deref(), DEFAULT_HEIGHT);

        let text = params
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| t.chars().take(MAX_TEXT_CHARS).collect())
            .unwrap_or_else(|| format!("{}×{}", width, height));

        Self {
            width,
            height,
            text,
            bg: color(params.bg.as_deref(), DEFAULT_BG),
            fg: color(params.fg.as_deref(), DEFAULT_FG),
        }
    }

    pub fn font_size(&self) -> u32 {
        (self.width.min(self.height) / 5).max(1)
    }

    pub fn render(&self) -> String {
        format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
                r##"<rect width="100%" height="100%" fill="#{bg}"/>"##,
                r##"<text x="50%" y="50%" fill="#{fg}" font-family="system-ui, sans-serif" font-size="{size}" text-anchor="middle" dominant-baseline="middle">{text}</text>"##,
                "</svg>"
            ),
            w = self.width,
            h = self.height,
            bg = self.bg,
            fg = self.fg,
            size = self.font_size(),
            text = escape_xml(&self.text),
        )
    }
}

fn dimension(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok())
        .map(|v| v.clamp(1, MAX_DIMENSION))
        .unwrap_or(default)
}

fn color(raw: Option<&str>, default: &str) -> String {
    raw.map(|c| c.trim().trim_start_matches('#'))
        .filter(|c| (c.len() == 3 || c.len() == 6) && c.chars().all(|ch| ch.is_ascii_hexdigit()))
        .map(|c| c.to_ascii_lowercase())
        .unwrap_or_else(|| default.to_string())
}

fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c if c.is_control() => {}
            c => escaped.push(c),
        }
    }
    escaped
}

/// `GET /api/placeholder`
pub async fn placeholder_handler(Query(params): Query<PlaceholderParams>) -> Response {
    let placeholder = Placeholder::from_params(&params);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/svg+xml; charset=utf-8")],
        placeholder.render(),
    )
        .into_response()
}
