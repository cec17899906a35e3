//! The dashboard UI tree and its standalone HTML serialization
//!
//! A [`Component`] is a snapshot of a widget layout with its current values.
//! Serializing it produces a complete HTML document with the framework
//! stylesheet inlined, so the document renders without a live server. The
//! one exception mirrors what the framework does when saving a page: the
//! markdown stylesheet stays a relative static-asset link, which
//! [`crate::assets::rewrite_static_paths`] later resolves against the CDN.

use crate::assets::AssetConfig;
use crate::{Error, Result};
use base64::Engine as Base64Engine;
use std::io::Write;

/// Stylesheet inlined into every standalone document
const FRAMEWORK_CSS: &str = r#"
body { margin: 0; font-family: -apple-system, "Segoe UI", Roboto, Helvetica, Arial, sans-serif; color: #212529; background: #ffffff; }
.ds-root { padding: 16px; }
.ds-column { display: flex; flex-direction: column; gap: 8px; }
.ds-row { display: flex; flex-direction: row; align-items: center; gap: 12px; }
.ds-widget { display: flex; flex-direction: column; gap: 4px; width: 300px; }
.ds-widget label { font-size: 0.9em; }
.ds-widget input[type=text] { padding: 4px 8px; border: 1px solid #ced4da; border-radius: 4px; }
.ds-button { padding: 6px 12px; border: 1px solid transparent; border-radius: 4px; font-size: 1em; cursor: pointer; }
.ds-button-default { background: #f8f9fa; border-color: #ced4da; color: #212529; }
.ds-button-primary { background: #0072b5; color: #ffffff; }
.ds-button-success { background: #198754; color: #ffffff; }
.ds-button-warning { background: #ffc107; color: #212529; }
.ds-button-danger { background: #dc3545; color: #ffffff; }
.ds-divider { width: 100%; border: 0; border-top: 1px solid #dee2e6; margin: 12px 0; }
.ds-status { font-size: 0.9em; color: #495057; }
"#;

/// Visual style of a button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonKind {
    #[default]
    Default,
    Primary,
    Success,
    Warning,
    Danger,
}

impl ButtonKind {
    fn css_class(self) -> &'static str {
        match self {
            ButtonKind::Default => "ds-button-default",
            ButtonKind::Primary => "ds-button-primary",
            ButtonKind::Success => "ds-button-success",
            ButtonKind::Warning => "ds-button-warning",
            ButtonKind::Danger => "ds-button-danger",
        }
    }
}

/// A node of the dashboard layout, holding current widget values
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    /// Children stacked vertically
    Column(Vec<Component>),
    /// Children laid out horizontally
    Row(Vec<Component>),
    /// Markdown text (headings, paragraphs, `**bold**`, `*emphasis*`)
    Markdown(String),
    /// Numeric slider
    FloatSlider {
        name: String,
        start: f64,
        end: f64,
        value: f64,
    },
    /// Single-line text field
    TextInput {
        name: String,
        value: String,
        placeholder: String,
    },
    /// Clickable button; `width` in CSS pixels
    Button {
        name: String,
        kind: ButtonKind,
        width: Option<u32>,
    },
    /// Horizontal rule
    Divider,
    /// Short status line, e.g. the outcome of the last capture
    Status(String),
    /// Raster image, inlined as a `data:` URI
    Image { bytes: Vec<u8>, mime: String },
}

impl From<&str> for Component {
    fn from(text: &str) -> Self {
        Component::Markdown(text.to_string())
    }
}

impl From<String> for Component {
    fn from(text: String) -> Self {
        Component::Markdown(text)
    }
}

impl Component {
    pub fn column(children: Vec<Component>) -> Self {
        Component::Column(children)
    }

    pub fn row(children: Vec<Component>) -> Self {
        Component::Row(children)
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Component::Markdown(text.into())
    }

    pub fn slider(name: impl Into<String>, start: f64, end: f64, value: f64) -> Self {
        Component::FloatSlider {
            name: name.into(),
            start,
            end,
            value,
        }
    }

    pub fn text_input(name: impl Into<String>, value: impl Into<String>, placeholder: impl Into<String>) -> Self {
        Component::TextInput {
            name: name.into(),
            value: value.into(),
            placeholder: placeholder.into(),
        }
    }

    pub fn button(name: impl Into<String>, kind: ButtonKind, width: Option<u32>) -> Self {
        Component::Button {
            name: name.into(),
            kind,
            width,
        }
    }

    /// Whether this subtree contains a markdown pane
    fn uses_markdown(&self) -> bool {
        match self {
            Component::Markdown(_) => true,
            Component::Column(children) | Component::Row(children) => children.iter().any(|c| c.uses_markdown()),
            _ => false,
        }
    }

    fn write_body(&self, out: &mut dyn Write) -> Result<()> {
        match self {
            Component::Column(children) | Component::Row(children) => {
                let class = if matches!(self, Component::Column(_)) { "ds-column" } else { "ds-row" };
                write!(out, r#"<div class="{}">"#, class)?;
                for child in children {
                    child.write_body(out)?;
                }
                write!(out, "</div>")?;
            }
            Component::Markdown(text) => {
                write!(out, r#"<div class="ds-markdown markdown">{}</div>"#, render_markdown(text))?;
            }
            Component::FloatSlider { name, start, end, value } => {
                if !(start.is_finite() && end.is_finite() && value.is_finite()) {
                    return Err(Error::Serialization(format!("slider '{}' has a non-finite bound or value", name)));
                }
                if start > end || value < start || value > end {
                    return Err(Error::Serialization(format!(
                        "slider '{}' value {} lies outside [{}, {}]",
                        name, value, start, end
                    )));
                }
                write!(
                    out,
                    r#"<div class="ds-widget ds-slider"><label>{}: <b>{}</b></label><input type="range" min="{}" max="{}" step="0.1" value="{}"></div>"#,
                    escape_html(name),
                    format_value(*value),
                    start,
                    end,
                    value
                )?;
            }
            Component::TextInput { name, value, placeholder } => {
                write!(
                    out,
                    r#"<div class="ds-widget ds-text-input"><label>{}</label><input type="text" value="{}" placeholder="{}"></div>"#,
                    escape_html(name),
                    escape_html(value),
                    escape_html(placeholder)
                )?;
            }
            Component::Button { name, kind, width } => {
                let style = width.map(|w| format!(r#" style="width: {}px""#, w)).unwrap_or_default();
                write!(
                    out,
                    r#"<button class="ds-button {}"{}>{}</button>"#,
                    kind.css_class(),
                    style,
                    escape_html(name)
                )?;
            }
            Component::Divider => write!(out, r#"<hr class="ds-divider">"#)?,
            Component::Status(text) => write!(out, r#"<div class="ds-status">{}</div>"#, escape_html(text))?,
            Component::Image { bytes, mime } => {
                let b64 = Base64Engine::encode(&base64::engine::general_purpose::STANDARD, bytes);
                write!(out, r#"<img class="ds-image" src="data:{};base64,{}">"#, escape_html(mime), b64)?;
            }
        }
        Ok(())
    }
}

/// Serialization of a UI tree into a self-contained HTML document
pub trait StandaloneHtml {
    /// Write the complete document to `out`.
    fn write_standalone(&self, out: &mut dyn Write, assets: &AssetConfig) -> Result<()>;

    /// Render the complete document into a string.
    fn to_standalone_html(&self, assets: &AssetConfig) -> Result<String> {
        let mut buf = Vec::new();
        self.write_standalone(&mut buf, assets)?;
        String::from_utf8(buf).map_err(|e| Error::Serialization(format!("document is not UTF-8: {}", e)))
    }
}

impl StandaloneHtml for Component {
    fn write_standalone(&self, out: &mut dyn Write, assets: &AssetConfig) -> Result<()> {
        write!(
            out,
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>Dashboard</title>\n<style>{}</style>\n",
            FRAMEWORK_CSS
        )?;
        if self.uses_markdown() {
            writeln!(out, r#"<link rel="stylesheet" href="{}">"#, assets.relative_ref("css/markdown.css"))?;
        }
        write!(out, "</head>\n<body>\n<div class=\"ds-root\">")?;
        self.write_body(out)?;
        write!(out, "</div>\n</body>\n</html>\n")?;
        Ok(())
    }
}

/// Display form of a widget value: always carries a decimal point (`5.0`, `7.25`).
pub fn format_value(v: f64) -> String {
    format!("{:?}", v)
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_markdown(text: &str) -> String {
    let mut html = String::new();
    let mut paragraph: Vec<&str> = Vec::new();

    fn flush(paragraph: &mut Vec<&str>, html: &mut String) {
        if !paragraph.is_empty() {
            html.push_str("<p>");
            html.push_str(&render_inline(&paragraph.join(" ")));
            html.push_str("</p>");
            paragraph.clear();
        }
    }

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            flush(&mut paragraph, &mut html);
            continue;
        }
        let level = trimmed.chars().take_while(|c| *c == '#').count();
        if (1..=6).contains(&level) && trimmed[level..].starts_with(' ') {
            flush(&mut paragraph, &mut html);
            html.push_str(&format!("<h{0}>{1}</h{0}>", level, render_inline(trimmed[level..].trim())));
        } else {
            paragraph.push(trimmed);
        }
    }
    flush(&mut paragraph, &mut html);
    html
}

fn render_inline(text: &str) -> String {
    let escaped = escape_html(text);
    let mut out = String::with_capacity(escaped.len());
    let mut rest = escaped.as_str();

    while let Some(pos) = rest.find('*') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos..];
        let (marker, tag) = if after.starts_with("**") { ("**", "strong") } else { ("*", "em") };
        let inner = &after[marker.len()..];
        match inner.find(marker) {
            Some(end) if end > 0 => {
                out.push_str(&format!("<{0}>{1}</{0}>", tag, &inner[..end]));
                rest = &inner[end + marker.len()..];
            }
            // unpaired or empty: keep the marker literally
            _ => {
                out.push_str(marker);
                rest = inner;
            }
        }
    }
    out.push_str(rest);
    out
}
