//! Listing parser
//!
//! Turns `div.listingblock` elements of an HTML-rendered chapter into steps.
//!
//! - A block with a `div.title` is a code listing: the title names the file,
//!   the `pre` holds its contents.
//! - Any other block is a console session. Text inside `strong` elements
//!   (or elements with the `command` class) is a command, everything else
//!   is output. Prompts directly before a command are dropped.

use scraper::{ElementRef, Html, Selector};

use super::step::{Step, StepId, StepKind};
use crate::common::{normalize_newlines, Error, Result};

const SECTION_SELECTOR: &str = "div.sect1";
const BLOCK_SELECTOR: &str = "div.listingblock";
const TITLE_SELECTOR: &str = "div.title";
const PRE_SELECTOR: &str = "pre";

/// Class marking command text inside a console session
const COMMAND_CLASS: &str = "command";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Internal(format!("Invalid selector '{}': {:?}", css, e)))
}

/// Parse every listing block of chapter section `section` (zero-based)
pub fn parse_chapter(html: &str, section: usize) -> Result<Vec<Step>> {
    let document = Html::parse_document(html);
    parse_document(&document, section)
}

/// Parse every listing block of `section` in an already parsed document
pub fn parse_document(document: &Html, section: usize) -> Result<Vec<Step>> {
    let section_selector = selector(SECTION_SELECTOR)?;
    let block_selector = selector(BLOCK_SELECTOR)?;

    let chapter = document
        .select(&section_selector)
        .nth(section)
        .ok_or(Error::SectionNotFound(section))?;

    let mut steps = Vec::new();
    for (i, block) in chapter.select(&block_selector).enumerate() {
        steps.extend(parse_listing(block, i + 1)?);
    }

    tracing::debug!(section, steps = steps.len(), "Parsed chapter");
    Ok(steps)
}

/// Parse one listing block into its steps, in document order
///
/// `ordinal` is the 1-based position of the block within its chapter and
/// only names blocks that carry neither an anchor nor a listing tag.
pub fn parse_listing(block: ElementRef<'_>, ordinal: usize) -> Result<Vec<Step>> {
    let title_selector = selector(TITLE_SELECTOR)?;
    let pre_selector = selector(PRE_SELECTOR)?;

    let anchor = block.value().attr("id").map(str::to_string);
    let title = block
        .select(&title_selector)
        .next()
        .map(|t| t.text().collect::<String>());
    let pre = block.select(&pre_selector).next();

    let tag = title.as_deref().and_then(|t| split_title(t).1);
    let block_id = anchor
        .or(tag)
        .unwrap_or_else(|| format!("listing-{}", ordinal));

    match (title, pre) {
        (Some(title), Some(pre)) => {
            let (filename, _) = split_title(&title);
            if filename.is_empty() {
                return Err(Error::parse(&block_id, "code listing has an empty title"));
            }
            let contents = normalize_newlines(&pre.text().collect::<String>());
            Ok(vec![Step::code_listing(StepId::new(block_id), filename, contents)])
        }
        (Some(_), None) => Err(Error::parse(&block_id, "titled block has no <pre> contents")),
        (None, Some(pre)) => {
            let kinds = split_session(pre, &block_id)?;
            if kinds.is_empty() {
                return Err(Error::parse(&block_id, "listing has no content"));
            }
            Ok(assign_ids(&block_id, kinds))
        }
        (None, None) => Err(Error::parse(
            &block_id,
            "block has neither a title nor a <pre> element",
        )),
    }
}

/// Split `functional_tests.py (ch01l001)` into filename and listing tag
fn split_title(title: &str) -> (String, Option<String>) {
    let title = title.trim();
    if let Some(open) = title.rfind(" (") {
        if let Some(tag) = title[open + 2..].strip_suffix(')') {
            if !tag.is_empty() && !tag.contains(char::is_whitespace) {
                return (title[..open].trim_end().to_string(), Some(tag.to_string()));
            }
        }
    }
    (title.to_string(), None)
}

fn assign_ids(block_id: &str, kinds: Vec<StepKind>) -> Vec<Step> {
    if kinds.len() == 1 {
        return kinds
            .into_iter()
            .map(|kind| Step {
                id: StepId::new(block_id),
                kind,
            })
            .collect();
    }
    kinds
        .into_iter()
        .enumerate()
        .map(|(part, kind)| Step {
            id: StepId::part(block_id, part),
            kind,
        })
        .collect()
}

/// Text of a console session, split by role
enum Fragment {
    Text(String),
    Command(String),
}

fn is_command_marker(element: ElementRef<'_>) -> bool {
    let value = element.value();
    value.name() == "strong" || value.classes().any(|c| c == COMMAND_CLASS)
}

fn collect_fragments(element: ElementRef<'_>, out: &mut Vec<Fragment>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            match out.last_mut() {
                Some(Fragment::Text(buf)) => buf.push_str(text),
                _ => out.push(Fragment::Text(String::from(&**text))),
            }
        } else if let Some(child) = ElementRef::wrap(child) {
            if is_command_marker(child) {
                out.push(Fragment::Command(child.text().collect()));
            } else {
                // highlighting wrappers: keep the text, drop the element
                collect_fragments(child, out);
            }
        }
    }
}

fn split_session(pre: ElementRef<'_>, block_id: &str) -> Result<Vec<StepKind>> {
    let mut fragments = Vec::new();
    collect_fragments(pre, &mut fragments);

    let mut kinds = Vec::new();
    let mut pending = String::new();
    for fragment in fragments {
        match fragment {
            Fragment::Text(text) => pending.push_str(&text),
            Fragment::Command(text) => {
                let before = strip_prompt(&normalize_newlines(&pending));
                if !before.is_empty() {
                    kinds.push(StepKind::Output { text: before });
                }
                pending.clear();

                let command = normalize_newlines(text.trim());
                if command.is_empty() {
                    return Err(Error::parse(block_id, "empty command marker"));
                }
                kinds.push(StepKind::Command { text: command });
            }
        }
    }

    let rest = normalize_newlines(&pending);
    let rest = rest.trim();
    if !rest.is_empty() {
        kinds.push(StepKind::Output {
            text: rest.to_string(),
        });
    }
    Ok(kinds)
}

/// Drop a trailing prompt line (`$`, `(venv) $`) and surrounding blank space
fn strip_prompt(text: &str) -> String {
    let text = text.trim_end();
    let (head, last) = match text.rfind('\n') {
        Some(pos) => (&text[..pos], &text[pos + 1..]),
        None => ("", text),
    };
    if is_prompt(last.trim()) {
        head.trim().to_string()
    } else {
        text.trim().to_string()
    }
}

/// A bare `$`, or `$` behind a parenthesised environment name like `(venv) $`
fn is_prompt(line: &str) -> bool {
    if line == "$" {
        return true;
    }
    line.strip_suffix(" $")
        .and_then(|env| env.strip_prefix('('))
        .and_then(|env| env.strip_suffix(')'))
        .is_some_and(|name| !name.is_empty() && !name.contains(char::is_whitespace))
}
