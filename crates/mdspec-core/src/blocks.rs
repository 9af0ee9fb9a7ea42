//! Flattens the markdown event stream into the block-level elements the
//! structural parser cares about.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

use crate::language::fence_language;

/// A block-level markdown element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// ATX or setext heading
    Heading {
        /// 1 through 6
        level: u8,
        /// Plain heading text
        text: String,
    },
    /// Fenced or indented code block
    Code {
        /// Normalized fence language, empty for indented blocks
        language: String,
        /// Raw content
        content: String,
    },
    /// Bullet or ordered list; nested items are flattened in order
    List {
        /// Plain text of each item
        items: Vec<String>,
    },
    /// GFM table
    Table {
        /// Header cells
        headers: Vec<String>,
        /// Body rows
        rows: Vec<Vec<String>>,
    },
}

#[derive(Default)]
struct Reader {
    blocks: Vec<Block>,
    heading: Option<(u8, String)>,
    code: Option<(String, String)>,
    list_depth: usize,
    items: Vec<String>,
    in_item: bool,
    table_headers: Vec<String>,
    table_rows: Vec<Vec<String>>,
    in_table_head: bool,
    cell: Option<String>,
}

impl Reader {
    fn push_text(&mut self, text: &str) {
        if let Some((_, content)) = &mut self.code {
            content.push_str(text);
        } else if let Some(cell) = &mut self.cell {
            cell.push_str(text);
        } else if let Some((_, heading)) = &mut self.heading {
            heading.push_str(text);
        } else if self.in_item {
            if let Some(item) = self.items.last_mut() {
                item.push_str(text);
            }
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => self.heading = Some((level as u8, String::new())),
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => fence_language(&info),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some((language, String::new()));
            }
            Tag::List(_) => self.list_depth += 1,
            Tag::Item => {
                self.items.push(String::new());
                self.in_item = true;
            }
            Tag::Table(_) => {
                self.table_headers.clear();
                self.table_rows.clear();
            }
            Tag::TableHead => self.in_table_head = true,
            Tag::TableRow => self.table_rows.push(Vec::new()),
            Tag::TableCell => self.cell = Some(String::new()),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                if let Some((level, text)) = self.heading.take() {
                    self.blocks.push(Block::Heading {
                        level,
                        text: text.trim().to_owned(),
                    });
                }
            }
            TagEnd::CodeBlock => {
                if let Some((language, content)) = self.code.take() {
                    self.blocks.push(Block::Code { language, content });
                }
            }
            TagEnd::Item => self.in_item = self.list_depth > 1,
            TagEnd::List(_) => {
                self.list_depth = self.list_depth.saturating_sub(1);
                if self.list_depth == 0 {
                    self.in_item = false;
                    let items = std::mem::take(&mut self.items)
                        .into_iter()
                        .map(|item| item.trim().to_owned())
                        .collect();
                    self.blocks.push(Block::List { items });
                }
            }
            TagEnd::TableHead => self.in_table_head = false,
            TagEnd::TableCell => {
                let cell = self.cell.take().unwrap_or_default().trim().to_owned();
                if self.in_table_head {
                    self.table_headers.push(cell);
                } else if let Some(row) = self.table_rows.last_mut() {
                    row.push(cell);
                }
            }
            TagEnd::Table => self.blocks.push(Block::Table {
                headers: std::mem::take(&mut self.table_headers),
                rows: std::mem::take(&mut self.table_rows),
            }),
            _ => {}
        }
    }
}

/// Read `markdown` into blocks in document order.
#[must_use]
pub fn read_blocks(markdown: &str) -> Vec<Block> {
    let mut reader = Reader::default();
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;

    for event in Parser::new_ext(markdown, options) {
        match event {
            Event::Start(tag) => reader.start(tag),
            Event::End(tag) => reader.end(tag),
            Event::Text(text) | Event::Code(text) => reader.push_text(&text),
            Event::SoftBreak | Event::HardBreak => {
                let separator = if reader.in_item && reader.cell.is_none() {
                    "\n"
                } else {
                    " "
                };
                reader.push_text(separator);
            }
            _ => {}
        }
    }

    reader.blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_and_code() {
        let blocks = read_blocks("## Setup `tool`\n\n```Bash title=x\necho hi\n```\n");
        assert_eq!(
            blocks,
            vec![
                Block::Heading {
                    level: 2,
                    text: "Setup tool".to_owned()
                },
                Block::Code {
                    language: "bash".to_owned(),
                    content: "echo hi\n".to_owned()
                },
            ]
        );
    }

    #[test]
    fn test_list_items() {
        let blocks = read_blocks("* cel: exitCode == 0\n* contains: \"OK\"\n");
        assert_eq!(
            blocks,
            vec![Block::List {
                items: vec!["cel: exitCode == 0".to_owned(), "contains: \"OK\"".to_owned()]
            }]
        );
    }

    #[test]
    fn test_nested_list_flattened() {
        let blocks = read_blocks("- outer\n  - inner\n- last\n");
        let [Block::List { items }] = blocks.as_slice() else {
            panic!("expected one list, got {blocks:?}");
        };
        assert_eq!(items, &vec!["outer".to_owned(), "inner".to_owned(), "last".to_owned()]);
    }

    #[test]
    fn test_table() {
        let blocks = read_blocks("| Name | CLI |\n|------|-----|\n| a | `echo a` |\n| b | echo b |\n");
        assert_eq!(
            blocks,
            vec![Block::Table {
                headers: vec!["Name".to_owned(), "CLI".to_owned()],
                rows: vec![
                    vec!["a".to_owned(), "echo a".to_owned()],
                    vec!["b".to_owned(), "echo b".to_owned()],
                ],
            }]
        );
    }
}
