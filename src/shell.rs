//! Page shell served at `/`.
//!
//! Fixes the document metadata (title, description, language) and the base
//! font for the client application. The client mounts into `#root`.

use crate::config::AppConfig;

/// Escapes text for use inside HTML element content or a quoted attribute.
fn escape_html(s: &str) -> String {
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

/// Renders the HTML shell for the configured application metadata.
pub fn render_shell(app: &AppConfig) -> String {
    let title = escape_html(&app.title);
    let description = escape_html(&app.description);
    let font = escape_html(&app.font_family);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<meta name="description" content="{description}">
<style>body {{ font-family: "{font}", system-ui, sans-serif; margin: 0; }}</style>
</head>
<body>
<div id="root"></div>
</body>
</html>
"#
    )
}
