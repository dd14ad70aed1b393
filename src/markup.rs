//! Line-oriented markup used in chat answers.
//!
//! Grouping rules:
//! - consecutive `"<n>. "` lines form one ordered list
//! - consecutive `"* "` lines form one unordered list
//! - a blank line ends the current list
//! - any other non-blank line is its own paragraph and ends the current list
//! - switching marker type starts a new list
//!
//! No nesting and no inline emphasis.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum Block {
    Paragraph(String),
    OrderedList(Vec<String>),
    UnorderedList(Vec<String>),
}

enum Line<'a> {
    Blank,
    Ordered(&'a str),
    Unordered(&'a str),
    Text(&'a str),
}

fn classify(line: &str) -> Line<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Line::Blank;
    }
    if let Some(rest) = line.strip_prefix("* ") {
        return Line::Unordered(rest.trim());
    }
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return Line::Ordered(rest.trim());
        }
    }
    Line::Text(line)
}

pub fn parse(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut open: Option<Block> = None;

    for raw in text.lines() {
        match classify(raw) {
            Line::Blank => {
                blocks.extend(open.take());
            }
            Line::Text(t) => {
                blocks.extend(open.take());
                blocks.push(Block::Paragraph(t.to_string()));
            }
            Line::Ordered(item) => match open.as_mut() {
                Some(Block::OrderedList(items)) => items.push(item.to_string()),
                _ => {
                    blocks.extend(open.take());
                    open = Some(Block::OrderedList(vec![item.to_string()]));
                }
            },
            Line::Unordered(item) => match open.as_mut() {
                Some(Block::UnorderedList(items)) => items.push(item.to_string()),
                _ => {
                    blocks.extend(open.take());
                    open = Some(Block::UnorderedList(vec![item.to_string()]));
                }
            },
        }
    }
    blocks.extend(open);
    blocks
}
