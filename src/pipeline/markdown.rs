//! Markdown rendering of a classified page.
//!
//! The renderer walks the page's element stream in document order and
//! serialises each unit on its own, joining units with a blank line so
//! neighbouring paragraphs never merge. Consecutive list items are the only
//! exception: they are joined by a single newline so they stay one list.
//!
//! Rendering is a pure function of the element stream and [`RenderOptions`].

use super::classify::{ListMarker, PageItem};
use crate::output::{Image, Link, Table};
use std::fmt;

/// Flags that affect rendering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Emit images as inline base64 data URIs instead of hash references.
    pub keep_images_inline: bool,
}

/// Render a page's element stream into one Markdown string.
///
/// The result has no leading or trailing whitespace; an empty stream (or one
/// whose units all render to nothing) yields `""`.
pub fn render_page(items: &[PageItem], options: &RenderOptions) -> String {
    let mut out = String::new();
    let mut prev_was_list = false;

    for item in items {
        let Some(chunk) = render_item(item, options) else {
            continue;
        };
        let is_list = matches!(item, PageItem::ListItem { .. });
        if !out.is_empty() {
            out.push_str(if is_list && prev_was_list { "\n" } else { "\n\n" });
        }
        out.push_str(&chunk);
        prev_was_list = is_list;
    }

    out
}

fn render_item(item: &PageItem, options: &RenderOptions) -> Option<String> {
    match item {
        PageItem::Paragraph(text) => non_empty(text.clone()),
        PageItem::Heading { level, text } => {
            if text.is_empty() {
                return None;
            }
            let level = (*level).clamp(1, 6) as usize;
            Some(format!("{} {}", "#".repeat(level), text))
        }
        PageItem::ListItem {
            marker,
            depth,
            text,
        } => Some(list_line(marker, *depth, text)),
        PageItem::Link(link) => Some(render_link(link)),
        PageItem::Table(table) => render_table(table),
        PageItem::Image { image, payload_len } => {
            if *payload_len == 0 {
                return None;
            }
            Some(render_image(image, options))
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

impl fmt::Display for ListMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListMarker::Bullet => f.write_str("-"),
            ListMarker::Number(n) => write!(f, "{n}."),
        }
    }
}

/// One rendered list line: two spaces of indent per depth, marker, text.
///
/// Also used to fill the `lists` inventory, so inventory and page text agree.
pub fn list_line(marker: &ListMarker, depth: u8, text: &str) -> String {
    format!("{}{} {}", "  ".repeat(depth as usize), marker, text)
}

fn render_link(link: &Link) -> String {
    let text = if link.text.is_empty() {
        &link.url
    } else {
        &link.text
    };
    let needs_brackets = link
        .url
        .chars()
        .any(|c| c.is_whitespace() || c == '(' || c == ')');
    if needs_brackets {
        format!("[{}](<{}>)", escape_link_text(text), link.url)
    } else {
        format!("[{}]({})", escape_link_text(text), link.url)
    }
}

fn escape_link_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Render a GFM pipe table: header row, `---` separator, body rows.
///
/// Rows are expected to be padded to equal width already; a table without
/// columns renders nothing.
pub fn render_table(table: &Table) -> Option<String> {
    let col_count = table.column_count();
    if col_count == 0 {
        return None;
    }

    let mut lines = Vec::with_capacity(table.rows.len() + 1);
    for (i, row) in table.rows.iter().enumerate() {
        let mut line = String::from("|");
        for cell in row {
            line.push(' ');
            line.push_str(&table_cell(cell));
            line.push_str(" |");
        }
        lines.push(line);

        if i == 0 {
            let sep: String = std::iter::once("|")
                .chain(std::iter::repeat_n(" --- |", col_count))
                .collect();
            lines.push(sep);
        }
    }

    Some(lines.join("\n"))
}

fn table_cell(cell: &str) -> String {
    cell.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('|', "\\|")
}

fn render_image(image: &Image, options: &RenderOptions) -> String {
    match (&image.base64_data, options.keep_images_inline) {
        (Some(data), true) => format!("![image](data:{};base64,{})", image.mime_type, data),
        _ => format!("[IMAGE]({})", image.hash),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[&[&str]]) -> Table {
        Table {
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
            bbox: None,
        }
    }

    fn image(inline: bool) -> Image {
        Image {
            number: 1,
            hash: "abc123".into(),
            mime_type: "image/png".into(),
            base64_data: inline.then(|| "iVBORw==".to_string()),
            width: None,
            height: None,
            bbox: None,
        }
    }

    #[test]
    fn headings_use_level_hashes() {
        let items = vec![
            PageItem::Heading {
                level: 1,
                text: "Top".into(),
            },
            PageItem::Heading {
                level: 9,
                text: "Deep".into(),
            },
        ];
        assert_eq!(
            render_page(&items, &RenderOptions::default()),
            "# Top\n\n###### Deep"
        );
    }

    #[test]
    fn list_items_join_with_single_newline() {
        let items = vec![
            PageItem::Paragraph("Intro".into()),
            PageItem::ListItem {
                marker: ListMarker::Bullet,
                depth: 0,
                text: "one".into(),
            },
            PageItem::ListItem {
                marker: ListMarker::Bullet,
                depth: 1,
                text: "nested".into(),
            },
            PageItem::ListItem {
                marker: ListMarker::Number(3),
                depth: 0,
                text: "three".into(),
            },
            PageItem::Paragraph("Outro".into()),
        ];
        assert_eq!(
            render_page(&items, &RenderOptions::default()),
            "Intro\n\n- one\n  - nested\n3. three\n\nOutro"
        );
    }

    #[test]
    fn paragraphs_are_blank_line_separated() {
        let items = vec![
            PageItem::Paragraph("a".into()),
            PageItem::Paragraph(String::new()),
            PageItem::Paragraph("b".into()),
        ];
        assert_eq!(render_page(&items, &RenderOptions::default()), "a\n\nb");
    }

    #[test]
    fn table_renders_header_separator_and_body() {
        let t = table(&[&["Name", "Qty"], &["apple", "3"], &["pear", ""]]);
        assert_eq!(
            render_table(&t).unwrap(),
            "| Name | Qty |\n| --- | --- |\n| apple | 3 |\n| pear |  |"
        );
    }

    #[test]
    fn table_cells_are_escaped_and_flattened() {
        let t = table(&[&["a|b", "line\none"]]);
        assert_eq!(
            render_table(&t).unwrap(),
            "| a\\|b | line one |\n| --- | --- |"
        );
    }

    #[test]
    fn empty_table_renders_nothing() {
        assert_eq!(render_table(&table(&[])), None);
        assert_eq!(render_table(&table(&[&[]])), None);
    }

    #[test]
    fn links_render_inline() {
        let link = Link {
            text: "the [docs]".into(),
            url: "https://example.com/a b".into(),
        };
        assert_eq!(render_link(&link), "[the \\[docs\\]](<https://example.com/a b>)");
        let bare = Link {
            text: String::new(),
            url: "https://x.io".into(),
        };
        assert_eq!(render_link(&bare), "[https://x.io](https://x.io)");
    }

    #[test]
    fn image_policy_selects_tag() {
        let inline = RenderOptions {
            keep_images_inline: true,
        };
        let reference = RenderOptions::default();
        assert_eq!(
            render_image(&image(true), &inline),
            "![image](data:image/png;base64,iVBORw==)"
        );
        assert_eq!(render_image(&image(false), &reference), "[IMAGE](abc123)");
    }

    #[test]
    fn zero_length_image_is_omitted() {
        let items = vec![PageItem::Image {
            image: image(false),
            payload_len: 0,
        }];
        assert_eq!(render_page(&items, &RenderOptions::default()), "");
    }

    #[test]
    fn rendering_is_deterministic() {
        let items = vec![
            PageItem::Heading {
                level: 2,
                text: "Title".into(),
            },
            PageItem::Table(table(&[&["x"], &["y"]])),
            PageItem::Image {
                image: image(false),
                payload_len: 4,
            },
        ];
        let opts = RenderOptions::default();
        assert_eq!(render_page(&items, &opts), render_page(&items, &opts));
    }
}
