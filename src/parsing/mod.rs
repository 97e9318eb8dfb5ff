pub mod markdown_parser;
pub mod rich_text_renderer;

pub use markdown_parser::{MarkdownParser, parse_markdown};
pub use rich_text_renderer::{RichTextRenderer, render_markdown};
