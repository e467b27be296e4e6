//! Element classification: raw page primitives → typed buckets + element stream.
//!
//! Classification produces two views of the same page:
//!
//! * [`FormattedElements`] — the typed inventory (tables, images, titles,
//!   lists, links), each bucket in first-seen order.
//! * the element stream — every unit in document order, which is what the
//!   Markdown renderer serialises.
//!
//! Every block lands in exactly one bucket (or in body text when it carries no
//! usable structural hint), tables and images map 1:1 onto their inventories. The
//! only primitives that can drop out are images: skipped entirely when image
//! processing is off, or individually when they fail to resolve.

use super::{identity, markdown, postprocess};
use crate::model::{BlockHint, PdfResult, RawBlock, RawTable};
use crate::output::{FormattedElements, Image, Link, Table};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Classification flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyOptions {
    pub process_images: bool,
    pub keep_images_inline: bool,
}

/// List marker decided at classification time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMarker {
    Bullet,
    Number(u32),
}

/// One unit of the page element stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PageItem {
    /// Unclassified body text.
    Paragraph(String),
    Heading {
        level: u8,
        text: String,
    },
    ListItem {
        marker: ListMarker,
        depth: u8,
        text: String,
    },
    Link(Link),
    Table(Table),
    Image {
        image: Image,
        /// Size of the raw payload; zero-length images are not rendered.
        payload_len: usize,
    },
}

/// A classified page: inventory plus ordered element stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifiedPage {
    pub elements: FormattedElements,
    pub items: Vec<PageItem>,
}

/// Classify one page record.
pub fn classify_page(page: &PdfResult, options: &ClassifyOptions) -> ClassifiedPage {
    let blocks = body_blocks(page);
    let mut out = ClassifiedPage::default();
    let mut numbering = ListNumbering::default();
    let mut seen_images = HashSet::new();

    let mut tables_at: Vec<Vec<usize>> = vec![Vec::new(); blocks.len() + 1];
    for (i, table) in page.raw_tables.iter().enumerate() {
        tables_at[slot(table.anchor, blocks.len())].push(i);
    }
    let mut images_at: Vec<Vec<usize>> = vec![Vec::new(); blocks.len() + 1];
    if options.process_images {
        for (i, image) in page.raw_images.iter().enumerate() {
            images_at[slot(image.anchor, blocks.len())].push(i);
        }
    }

    for s in 0..=blocks.len() {
        for &t in &tables_at[s] {
            let table = normalise_table(&page.raw_tables[t]);
            // A column-less table renders nothing, so it cannot split a list.
            if !table.is_empty() {
                numbering.reset();
            }
            out.elements.tables.push(table.clone());
            out.items.push(PageItem::Table(table));
        }
        for &i in &images_at[s] {
            let raw = &page.raw_images[i];
            match identity::resolve(raw, i + 1, options.keep_images_inline) {
                Ok(image) => {
                    if seen_images.insert(image.hash.clone()) {
                        out.elements.images.push(image.clone());
                    }
                    if !raw.data.is_empty() {
                        numbering.reset();
                    }
                    out.items.push(PageItem::Image {
                        image,
                        payload_len: raw.data.len(),
                    });
                }
                Err(e) => warn!(
                    "Page {}: skipping image {} of {}: {}",
                    page.page,
                    i + 1,
                    page.raw_images.len(),
                    e
                ),
            }
        }
        if let Some(block) = blocks.get(s) {
            classify_block(block, &mut out, &mut numbering);
        }
    }

    debug!(
        "Page {}: {} tables, {} images, {} titles, {} list items, {} links",
        page.page,
        out.elements.tables.len(),
        out.elements.images.len(),
        out.elements.titles.len(),
        out.elements.lists.len(),
        out.elements.links.len()
    );
    out
}

/// Blocks to classify: the parser's blocks, or `raw_text` split into plain
/// paragraphs when the parser supplied none.
fn body_blocks(page: &PdfResult) -> Vec<RawBlock> {
    if page.raw_blocks.is_empty() {
        postprocess::split_paragraphs(&page.raw_text)
            .into_iter()
            .map(RawBlock::plain)
            .collect()
    } else {
        page.raw_blocks.clone()
    }
}

/// Stream position for an anchored primitive; unanchored ones go last.
fn slot(anchor: Option<usize>, block_count: usize) -> usize {
    anchor.map_or(block_count, |a| a.min(block_count))
}

fn classify_block(block: &RawBlock, out: &mut ClassifiedPage, numbering: &mut ListNumbering) {
    match &block.hint {
        BlockHint::Heading { level } if *level > 0 => {
            let text = postprocess::single_line(&block.text);
            if text.is_empty() {
                return;
            }
            out.elements.titles.push(text.clone());
            out.items.push(PageItem::Heading {
                level: (*level).min(6),
                text,
            });
            numbering.reset();
        }
        BlockHint::ListItem {
            ordered,
            number,
            depth,
        } => {
            let text = postprocess::single_line(&block.text);
            if text.is_empty() {
                return;
            }
            let marker = numbering.next(*ordered, *number, *depth);
            out.elements
                .lists
                .push(markdown::list_line(&marker, *depth, &text));
            out.items.push(PageItem::ListItem {
                marker,
                depth: *depth,
                text,
            });
        }
        BlockHint::Link { url } if !url.trim().is_empty() => {
            let link = Link {
                text: postprocess::single_line(&block.text),
                url: url.trim().to_string(),
            };
            out.elements.links.push(link.clone());
            out.items.push(PageItem::Link(link));
            numbering.reset();
        }
        // A link without a target is body text.
        BlockHint::Plain | BlockHint::Heading { .. } | BlockHint::Link { .. } => {
            let text = postprocess::clean_text(&block.text);
            if !text.is_empty() {
                out.items.push(PageItem::Paragraph(text));
                numbering.reset();
            }
        }
    }
}

/// Pad every row to the widest row's column count.
pub fn normalise_table(raw: &RawTable) -> Table {
    let width = raw.rows.iter().map(Vec::len).max().unwrap_or(0);
    let rows = raw
        .rows
        .iter()
        .map(|row| {
            let mut padded = row.clone();
            padded.resize(width, String::new());
            padded
        })
        .collect();
    Table {
        rows,
        bbox: raw.bbox,
    }
}

/// Running ordinal per nesting depth for ordered items without an explicit
/// number. Any non-list unit restarts numbering.
#[derive(Debug, Default)]
struct ListNumbering {
    counters: Vec<u32>,
}

impl ListNumbering {
    fn next(&mut self, ordered: bool, explicit: Option<u32>, depth: u8) -> ListMarker {
        let depth = depth as usize;
        if self.counters.len() <= depth {
            self.counters.resize(depth + 1, 0);
        }
        // A shallower item closes any deeper sub-lists.
        self.counters.truncate(depth + 1);

        if !ordered {
            self.counters[depth] = 0;
            return ListMarker::Bullet;
        }
        let n = explicit.unwrap_or(self.counters[depth] + 1);
        self.counters[depth] = n;
        ListMarker::Number(n)
    }

    fn reset(&mut self) {
        self.counters.clear();
    }
}
