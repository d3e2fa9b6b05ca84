//! Append-only document rendering.
//!
//! Turns an ordered batch of messages (with resolved media outcomes) into
//! an output document. HTML mode emits a one-time header per day bucket and
//! strictly appends message blocks afterwards; text mode is line-oriented.
//! Each batch is built into a buffer and written with a single append, so a
//! failed write leaves no partial message behind.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::domain::{BackupError, MediaClass, MediaOutcome, Message, Result};

/// Output document format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderFormat {
    /// Self-contained styled HTML document.
    #[default]
    Html,
    /// Plain line-oriented text.
    Text,
}

impl RenderFormat {
    /// File extension for documents in this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Text => "txt",
        }
    }
}

impl std::str::FromStr for RenderFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" => Ok(Self::Html),
            "text" | "txt" => Ok(Self::Text),
            _ => Err(format!("unknown format: {s}. Use: html, text")),
        }
    }
}

/// Renders ordered batches into an append-only document.
pub struct Renderer {
    format: RenderFormat,
}

impl Renderer {
    /// Create a renderer for the given format.
    #[must_use]
    pub const fn new(format: RenderFormat) -> Self {
        Self { format }
    }

    /// The format this renderer emits.
    #[must_use]
    pub const fn format(&self) -> RenderFormat {
        self.format
    }

    /// File extension for this renderer's documents.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        self.format.extension()
    }

    /// Append one batch to the document.
    ///
    /// `first_write` triggers the one-time header for the day bucket. The
    /// batch must already be oldest-first; the renderer writes it verbatim.
    ///
    /// # Errors
    /// Returns [`BackupError::RenderWriteFailed`] if the document cannot be
    /// opened or written; nothing is appended in that case.
    pub fn append_batch(
        &self,
        path: &Path,
        conversation: &str,
        messages: &[Message],
        media: &[MediaOutcome],
        first_write: bool,
    ) -> Result<()> {
        debug_assert_eq!(messages.len(), media.len());

        let mut buf = String::new();

        if first_write && self.format == RenderFormat::Html {
            buf.push_str(&html_header(conversation));
        }

        for (msg, outcome) in messages.iter().zip(media) {
            match self.format {
                RenderFormat::Html => buf.push_str(&html_message_block(msg, outcome)),
                RenderFormat::Text => buf.push_str(&text_message_lines(msg, outcome)),
            }
        }

        // Single scoped write; the handle is released on every exit path.
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| BackupError::render_write(path, e))?;
        file.write_all(buf.as_bytes())
            .map_err(|e| BackupError::render_write(path, e))?;

        Ok(())
    }

    /// Append closing structure so the document stands alone as valid
    /// markup. Invoked once per run, only for documents that received a
    /// batch. No-op for text documents.
    ///
    /// # Errors
    /// Returns [`BackupError::RenderWriteFailed`] if the write fails.
    pub fn finalize(&self, path: &Path) -> Result<()> {
        if self.format != RenderFormat::Html {
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| BackupError::render_write(path, e))?;
        file.write_all(HTML_FOOTER.as_bytes())
            .map_err(|e| BackupError::render_write(path, e))?;

        Ok(())
    }
}

const HTML_FOOTER: &str = "</div>\n</body>\n</html>\n";

const DOC_ICON_SVG: &str = r#"<svg class="doc-icon" fill="none" stroke="currentColor" stroke-width="2" viewBox="0 0 24 24" xmlns="http://www.w3.org/2000/svg" aria-hidden="true"><path stroke-linecap="round" stroke-linejoin="round" d="M7 7v10a2 2 0 002 2h6a2 2 0 002-2V7H7z"/><path stroke-linecap="round" stroke-linejoin="round" d="M7 7l5 5 5-5"/></svg>"#;

/// One-time document header with the embedded stylesheet.
fn html_header(conversation: &str) -> String {
    let title = escape_html(conversation);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8" />
<meta name="viewport" content="width=device-width, initial-scale=1" />
<title>Chat Backup - {title}</title>
<style>
  body {{
    font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
    background: #f5f8fa;
    padding: 20px;
  }}
  .chat-container {{
    max-width: 600px;
    margin: auto;
    background: white;
    border-radius: 8px;
    padding: 15px;
    box-shadow: 0 1px 3px rgba(0,0,0,0.1);
  }}
  .message {{
    margin: 10px 0;
    max-width: 70%;
    padding: 10px 15px;
    border-radius: 18px;
    clear: both;
    position: relative;
    font-size: 14px;
    line-height: 1.3;
  }}
  .from-me {{
    background-color: #dcf8c6;
    float: right;
    text-align: right;
  }}
  .from-others {{
    background-color: #fff;
    border: 1px solid #e2e2e2;
    float: left;
    text-align: left;
  }}
  .sender {{
    font-weight: bold;
    font-size: 13px;
    margin-bottom: 3px;
  }}
  .timestamp {{
    font-size: 11px;
    color: #888;
    margin-top: 5px;
  }}
  .media-missing {{
    font-style: italic;
    color: #888;
    margin-top: 5px;
  }}
  img.media, video.media {{
    max-width: 100%;
    border-radius: 10px;
    margin-top: 5px;
  }}
  .document-preview {{
    display: flex;
    align-items: center;
    margin-top: 5px;
  }}
  .doc-icon {{
    width: 24px;
    height: 24px;
    margin-right: 8px;
    opacity: 0.7;
  }}
  a {{
    color: #065fd4;
    text-decoration: none;
  }}
  a:hover {{
    text-decoration: underline;
  }}
</style>
</head>
<body>
<div class="chat-container">
"#
    )
}

/// One message bubble.
fn html_message_block(msg: &Message, outcome: &MediaOutcome) -> String {
    let side = if msg.outgoing { "from-me" } else { "from-others" };
    let sender = if msg.outgoing {
        "You".to_string()
    } else {
        escape_html(&msg.sender)
    };
    let timestamp = msg.date.format("%Y-%m-%d %H:%M");
    let text = msg
        .text
        .as_deref()
        .map(|t| escape_html(t).replace('\n', "<br>"))
        .unwrap_or_default();
    let media = html_media_markup(outcome);

    format!(
        "<div class=\"message {side}\">\n\
         <div class=\"sender\">{sender}</div>\n\
         <div class=\"text\">{text}</div>\n\
         {media}\
         <div class=\"timestamp\">{timestamp}</div>\n\
         </div>\n"
    )
}

/// Attachment markup by content class; failed fetches get a text fallback
/// rather than a broken reference.
fn html_media_markup(outcome: &MediaOutcome) -> String {
    match outcome {
        MediaOutcome::Absent => String::new(),
        MediaOutcome::Failed(_) => {
            "<div class=\"media-missing\">[media unavailable]</div>\n".to_string()
        }
        MediaOutcome::Fetched(asset) => {
            let name = escape_html(asset.file_name());
            match asset.class {
                MediaClass::Image => {
                    format!("<img class=\"media\" src=\"media/{name}\" alt=\"Image\"/>\n")
                }
                MediaClass::Video => format!(
                    "<video class=\"media\" controls><source src=\"media/{name}\">\
                     Your browser does not support the video tag.</video>\n"
                ),
                MediaClass::Document => format!(
                    "<div class=\"document-preview\">{DOC_ICON_SVG}\
                     <a href=\"media/{name}\" target=\"_blank\" download>{name}</a></div>\n"
                ),
                MediaClass::Other => format!(
                    "<a href=\"media/{name}\" target=\"_blank\" download>Download {name}</a>\n"
                ),
            }
        }
    }
}

/// Plain-text rendering: one line per message plus a media annotation.
fn text_message_lines(msg: &Message, outcome: &MediaOutcome) -> String {
    let sender = if msg.outgoing { "You" } else { msg.sender.as_str() };
    let mut out = format!(
        "{} - {}: {}\n",
        msg.date.format("%Y-%m-%d %H:%M"),
        sender,
        msg.text.as_deref().unwrap_or("")
    );

    match outcome {
        MediaOutcome::Absent => {}
        MediaOutcome::Fetched(asset) => {
            out.push_str(&format!("[{}: media/{}]\n", asset.class, asset.file_name()));
        }
        MediaOutcome::Failed(_) => out.push_str("[media unavailable]\n"),
    }

    out
}

/// Escape user-supplied text for insertion into HTML.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
