//! Renders a code snippet into a standalone dark HTML page for slide previews.

use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

use crate::error::{PlaygroundError, Result};

pub const DEFAULT_PREVIEW_FILE: &str = "previewCode.html";

lazy_static! {
    static ref TOKEN: Regex = Regex::new(
        r#"(?x)
        (?P<c>//[^\n]*|/\*(?s:.*?)\*/)
        | (?P<s>"(?:\\.|[^"\\])*")
        | (?P<k>\b(?:as|break|class|const|continue|crate|else|enum|false|fn|for|func|if|impl|import|in|let|loop|match|mod|mut|nil|pub|ref|return|self|Self|static|struct|trait|true|type|use|var|where|while)\b)
        | (?P<n>\b\d+(?:\.\d+)?\b)
        "#
    )
    .expect("token pattern is valid");
}

const STYLE: &str = "html,body{ background-color: #000; font-size: 36px; } \
.outer{ display: table; height: 614px;} \
pre{ width: 1184px; overflow: hidden; } \
.highlight{ display: table-cell; vertical-align: middle; color: #f8f8f2; } \
.highlight .k{ color: #66d9ef; } \
.highlight .s{ color: #e6db74; } \
.highlight .c{ color: #75715e; } \
.highlight .n{ color: #ae81ff; }";

/// Escapes `code` and wraps comments, strings, keywords, and numbers in
/// `<span class="c|s|k|n">`.
pub fn highlight(code: &str) -> String {
    let mut html = String::with_capacity(code.len() * 2);
    let mut last = 0;

    for caps in TOKEN.captures_iter(code) {
        let Some((class, token)) = ["c", "s", "k", "n"]
            .iter()
            .find_map(|name| caps.name(name).map(|m| (*name, m)))
        else {
            continue;
        };

        html.push_str(&html_escape::encode_text(&code[last..token.start()]));
        html.push_str(&format!(
            r#"<span class="{}">{}</span>"#,
            class,
            html_escape::encode_text(token.as_str())
        ));
        last = token.end();
    }
    html.push_str(&html_escape::encode_text(&code[last..]));
    html
}

pub fn render_page(code: &str) -> String {
    format!(
        "<html><head><style>{}</style></head><body><div class='outer'><div class=\"highlight\"><pre>{}</pre></div></div></body></html>",
        STYLE,
        highlight(code)
    )
}

pub fn write_preview(code: &str, path: &Path) -> Result<()> {
    if code.trim().is_empty() {
        return Err(PlaygroundError::EmptySnippet);
    }
    fs::write(path, render_page(code))?;
    info!(path = %path.display(), bytes = code.len(), "wrote code preview");
    Ok(())
}
