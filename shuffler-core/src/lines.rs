//! Line shapes recognised in the game's data files.
//!
//! Only the handful of fragments the shuffler needs are matched here; every
//! other line is opaque and is carried through untouched by the rewriter.

use regex::Regex;
use std::sync::LazyLock;

const BOM: char = '\u{feff}';

static REGION_DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:s:)?(STATE_[A-Za-z0-9_]+)\s*=").unwrap());

static AMOUNT_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z0-9_]+)\s*=\s*(\d+)").unwrap());

static DYNAMIC_OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bresource\s*=\s*\{").unwrap());

static DYNAMIC_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\btype\s*=\s*"([A-Za-z0-9_]+)""#).unwrap());

static DISCOVERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bdiscovered_amount\s*=\s*(\d+)").unwrap());

static UNDISCOVERED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bundiscovered_amount\s*=\s*(\d+)").unwrap());

static NAVAL_EXIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnaval_exit_id\s*=\s*(\d+)").unwrap());

static HISTORY_BUILDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bbuilding\s*=\s*"([A-Za-z0-9_]+)""#).unwrap());

static HISTORY_LEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\blevel\s*=\s*(\d+)").unwrap());

static POSSIBLE_OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpossible\s*=\s*\{").unwrap());

static COMPANY_REGION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bstate_region\s*=\s*s:([A-Za-z0-9_]+)").unwrap());

static COMPANY_BUILDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bis_building_type\s*=\s*([A-Za-z0-9_]+)").unwrap());

static COMPANY_LEVEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:level|count)[^=\n]*=\s*(\d+)").unwrap());

fn capture_u32(re: &Regex, line: &str) -> Option<u32> {
    re.captures(line)?.get(1)?.as_str().parse().ok()
}

fn capture_str<'a>(re: &Regex, line: &'a str) -> Option<&'a str> {
    Some(re.captures(line)?.get(1)?.as_str())
}

/// Name of the region declared on this line (`STATE_X = {` or `s:STATE_X = {`).
pub fn region_declaration(line: &str) -> Option<&str> {
    capture_str(&REGION_DECLARATION, line.trim_start_matches(BOM))
}

pub fn is_static_opener(line: &str) -> bool {
    line.contains("capped_resources")
}

pub fn is_dynamic_opener(line: &str) -> bool {
    DYNAMIC_OPENER.is_match(line)
}

/// Every `token = N` pair on the line, in order.
pub fn amount_pairs(line: &str) -> impl Iterator<Item = (&str, u32)> + '_ {
    AMOUNT_PAIR.captures_iter(line).filter_map(|caps| {
        let key = caps.get(1)?.as_str();
        let value = caps.get(2)?.as_str().parse().ok()?;
        Some((key, value))
    })
}

pub fn dynamic_type(line: &str) -> Option<&str> {
    capture_str(&DYNAMIC_TYPE, line)
}

pub fn discovered_amount(line: &str) -> Option<u32> {
    capture_u32(&DISCOVERED, line)
}

pub fn undiscovered_amount(line: &str) -> Option<u32> {
    capture_u32(&UNDISCOVERED, line)
}

pub fn naval_exit_id(line: &str) -> Option<u32> {
    capture_u32(&NAVAL_EXIT, line)
}

pub fn history_building(line: &str) -> Option<&str> {
    capture_str(&HISTORY_BUILDING, line)
}

pub fn history_level(line: &str) -> Option<u32> {
    capture_u32(&HISTORY_LEVEL, line)
}

pub fn is_possible_opener(line: &str) -> bool {
    POSSIBLE_OPENER.is_match(line)
}

pub fn company_region(line: &str) -> Option<&str> {
    capture_str(&COMPANY_REGION, line)
}

pub fn company_building(line: &str) -> Option<&str> {
    capture_str(&COMPANY_BUILDING, line)
}

/// `level... = N` or `count... = N`, which ends a company requirement.
pub fn company_level(line: &str) -> Option<u32> {
    capture_u32(&COMPANY_LEVEL, line)
}

fn without_terminator(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// A column-zero `}` closes a region.
pub fn is_region_closer(line: &str) -> bool {
    without_terminator(line) == "}"
}

/// A `}` at any indentation closes the innermost block.
pub fn is_block_closer(line: &str) -> bool {
    line.trim() == "}"
}

/// Net change in brace depth, ignoring anything after a `#` comment.
pub fn brace_delta(line: &str) -> i32 {
    let code = line.split('#').next().unwrap_or_default();
    code.chars().fold(0, |depth, c| match c {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}

/// The terminator used by the first line of `text`, defaulting to `\n`.
pub fn line_ending(text: &str) -> &'static str {
    match text.find('\n') {
        Some(i) if i > 0 && text.as_bytes()[i - 1] == b'\r' => "\r\n",
        _ => "\n",
    }
}

/// Forward-only cursor over the lines of one file.
///
/// Lines keep their terminators so callers that copy lines through produce
/// byte-identical output. Nested scans borrow the cursor mutably; when they
/// return, the outer loop resumes on the first line they did not consume.
#[derive(Debug, Clone)]
pub struct LineCursor<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> LineCursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.split_inclusive('\n').collect(),
            pos: 0,
        }
    }

    pub fn peek(&self) -> Option<&'a str> {
        self.lines.get(self.pos).copied()
    }

    /// 1-based number of the line most recently returned by `next`.
    pub fn line_number(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for LineCursor<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.peek()?;
        self.pos += 1;
        Some(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_declaration_matches_plain_prefixed_and_bom_lines() {
        assert_eq!(region_declaration("STATE_SVEALAND = {\n"), Some("STATE_SVEALAND"));
        assert_eq!(region_declaration("\u{feff}STATE_NORRLAND = {"), Some("STATE_NORRLAND"));
        assert_eq!(region_declaration("\ts:STATE_SVEALAND = {"), Some("STATE_SVEALAND"));
        assert_eq!(region_declaration("    id = 1"), None);
        assert_eq!(region_declaration("    state_region = s:STATE_SVEALAND"), None);
    }

    #[test]
    fn dynamic_opener_does_not_fire_on_capped_resources() {
        assert!(is_dynamic_opener("    resource = {"));
        assert!(is_dynamic_opener("resource={"));
        assert!(!is_dynamic_opener("    capped_resources = {"));
        assert!(is_static_opener("    capped_resources = {"));
    }

    #[test]
    fn discovered_and_undiscovered_are_distinguished() {
        let line = "        undiscovered_amount = 12";
        assert_eq!(discovered_amount(line), None);
        assert_eq!(undiscovered_amount(line), Some(12));
        assert_eq!(discovered_amount("        discovered_amount = 4"), Some(4));
    }

    #[test]
    fn amount_pairs_reads_inline_blocks() {
        let pairs: Vec<_> =
            amount_pairs("    capped_resources = { bg_iron_mining = 10 bg_coal_mining = 3 }").collect();
        assert_eq!(pairs, vec![("bg_iron_mining", 10), ("bg_coal_mining", 3)]);
    }

    #[test]
    fn company_level_accepts_comparisons_and_counts() {
        assert_eq!(company_level("            level >= 5"), Some(5));
        assert_eq!(company_level("        count = 2"), Some(2));
        assert_eq!(company_level("        is_building_type = building_iron_mine"), None);
    }

    #[test]
    fn closers() {
        assert!(is_region_closer("}\n"));
        assert!(is_region_closer("}\r\n"));
        assert!(!is_region_closer("    }\n"));
        assert!(is_block_closer("    }\n"));
        assert_eq!(brace_delta("a = { b = { } # }"), 1);
    }

    #[test]
    fn cursor_shared_between_outer_and_nested_scans() {
        let mut cursor = LineCursor::new("a\nb\nc\nd\n");
        assert_eq!(cursor.next(), Some("a\n"));
        {
            let nested = &mut cursor;
            assert_eq!(nested.next(), Some("b\n"));
            assert_eq!(nested.next(), Some("c\n"));
        }
        assert_eq!(cursor.line_number(), 3);
        assert_eq!(cursor.next(), Some("d\n"));
        assert_eq!(cursor.peek(), None);
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn detects_crlf() {
        assert_eq!(line_ending("a\r\nb"), "\r\n");
        assert_eq!(line_ending("a\nb"), "\n");
        assert_eq!(line_ending(""), "\n");
    }
}
