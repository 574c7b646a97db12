//! # Extractor - Text Field Recovery
//!
//! Recovers typed fields from free-form analysis narratives.
//!
//! ## Rules
//!
//! Narrative responses are inconsistently structured: some use headings,
//! some use prose. [`extract`] therefore tries two tiers, in order:
//!
//! 1. **Section-anchored** - `Keyword: value` (colon or dash separator), or a
//!    keyword opening its line (heading, bold label or plain `Keyword value`).
//!    When the keyword line carries no value, the value starts on the next
//!    non-blank line, minus any bullet marker. Capture runs up to the next
//!    heading, bullet, numbered item, labeled line, blank line or end of text.
//! 2. **Sentence-anchored** - the first `.`-terminated sentence containing
//!    the keyword.
//!
//! Each tier walks the keyword list in order; the first hit wins. If nothing
//! matches, the caller's default is returned verbatim.

use crate::skills::records::CompetitorEntry;
use regex::Regex;
use std::sync::OnceLock;

// ============================================================================
// Field Extraction
// ============================================================================

/// Extract a field value from narrative text.
///
/// ```rust,ignore
/// let tam = extract("TAM: $50B\nSAM: $5B", &["TAM", "total addressable market"], "No TAM data available");
/// assert_eq!(tam, "$50B");
/// ```
pub fn extract(text: &str, keywords: &[&str], default: &str) -> String {
    for keyword in keywords {
        if let Some(value) = section_match(text, keyword) {
            return value;
        }
    }

    for keyword in keywords {
        if let Some(sentence) = sentence_match(text, keyword) {
            return sentence;
        }
    }

    default.to_string()
}

/// Case-insensitive keyword pattern. Word boundaries are only added on sides
/// that start/end with a word character so keywords like "SAM" do not hit
/// "Samsung" while "growth rate" still hits "growth rates".
fn keyword_pattern(keyword: &str) -> Option<String> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return None;
    }
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let lead = if keyword.starts_with(is_word) { r"\b" } else { "" };
    let tail = if keyword.ends_with(is_word) {
        r"(?:s|es)?\b"
    } else {
        ""
    };
    Some(format!("{}{}{}", lead, regex::escape(keyword), tail))
}

fn section_match(text: &str, keyword: &str) -> Option<String> {
    let pattern = keyword_pattern(keyword)?;
    let labeled = Regex::new(&format!(r"(?im){}[)*]*[ \t]*(?::|[-–](?:[ \t]|$))", pattern)).ok()?;
    let leading = Regex::new(&format!(
        r"(?im)^[ \t]*(?:#+[ \t]*|[-*•+][ \t]+)?\**{}[)*]*(?:[ \t]*$|[ \t]+)",
        pattern
    ))
    .ok()?;

    for re in [&labeled, &leading] {
        for m in re.find_iter(text) {
            if let Some(value) = capture_value(&text[m.end()..]) {
                return Some(value);
            }
        }
    }

    None
}

/// Value following a matched label: rest of the label line, or the next
/// non-blank line when the label line is bare, plus continuation lines.
fn capture_value(rest: &str) -> Option<String> {
    let mut lines = rest.lines();
    let mut first = lines
        .next()
        .unwrap_or_default()
        .trim_start_matches(|c: char| matches!(c, '*' | ':' | '-' | '–') || c.is_whitespace());

    if first.trim().is_empty() {
        let next = lines.by_ref().map(str::trim).find(|l| !l.is_empty())?;
        if next.starts_with('#') || is_labeled(next) {
            return None;
        }
        first = strip_bullet(next);
    }

    let first = match first.find('#') {
        Some(idx) => &first[..idx],
        None => first,
    };

    let mut captured = vec![first.trim_end()];
    for line in lines {
        if ends_section(line) {
            break;
        }
        captured.push(line.trim_end());
    }

    let value = captured.join("\n").trim().to_string();
    (!value.is_empty()).then_some(value)
}

fn strip_bullet(line: &str) -> &str {
    static BULLET: OnceLock<Option<Regex>> = OnceLock::new();

    let bullet = BULLET.get_or_init(|| Regex::new(r"^(?:[-*•+]|\d+[.)])\s+").ok());
    match bullet.as_ref().and_then(|re| re.find(line)) {
        Some(m) => &line[m.end()..],
        None => line,
    }
}

fn sentence_match(text: &str, keyword: &str) -> Option<String> {
    let pattern = keyword_pattern(keyword)?;
    let re = Regex::new(&format!(r"(?i)[^.\n]*{}[^.\n]*\.", pattern)).ok()?;
    re.find(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Whether a continuation line starts a new section
fn ends_section(line: &str) -> bool {
    static NUMBERED: OnceLock<Option<Regex>> = OnceLock::new();

    let trimmed = line.trim_start();
    if trimmed.is_empty() {
        return true;
    }
    if trimmed.starts_with('#')
        || trimmed.starts_with("**")
        || trimmed.starts_with("- ")
        || trimmed.starts_with("* ")
        || trimmed.starts_with("• ")
        || trimmed.starts_with("+ ")
        || trimmed.starts_with('|')
    {
        return true;
    }

    let numbered = NUMBERED.get_or_init(|| Regex::new(r"^\d+[.)]\s").ok());
    if numbered.as_ref().is_some_and(|re| re.is_match(trimmed)) {
        return true;
    }

    is_labeled(trimmed)
}

/// `Label: ...` line
fn is_labeled(line: &str) -> bool {
    static LABELED: OnceLock<Option<Regex>> = OnceLock::new();

    let labeled = LABELED.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9 ()/&'-]{0,48}:(\s|$)").ok());
    labeled.as_ref().is_some_and(|re| re.is_match(line))
}

// ============================================================================
// Score Extraction
// ============================================================================

/// Extract the market viability score from a `viability score ... N/10` mention.
///
/// The first mention wins; documents usually state the score once, near the
/// conclusion.
pub fn extract_score(text: &str, default: u8) -> u8 {
    extract_labeled_score(text, &["viability score"], default)
}

/// Integer variant of [`extract_labeled_rating`]; decimals are truncated.
pub fn extract_labeled_score(text: &str, labels: &[&str], default: u8) -> u8 {
    match find_rating(text, labels) {
        Some(value) => value.trunc().min(u8::MAX as f64) as u8,
        None => default,
    }
}

/// Find `<label> ... N/10` (or `N out of 10`) for the first label that matches.
/// Labels match whole words only.
pub fn extract_labeled_rating(text: &str, labels: &[&str], default: f64) -> f64 {
    find_rating(text, labels).unwrap_or(default)
}

/// Like [`extract_labeled_rating`], but the label must open its line
/// (after markdown markers) and the rating must sit on that line. For
/// generic labels such as "score" that also end longer labels.
pub fn extract_leading_rating(text: &str, labels: &[&str], default: f64) -> f64 {
    labels
        .iter()
        .filter_map(|label| keyword_pattern(label))
        .find_map(|pattern| {
            rating_in(
                text,
                &format!(r"(?im)^[ \t#*>-]*{}[^\n]*?{}", pattern, RATING),
            )
        })
        .unwrap_or(default)
}

const RATING: &str = r"(\d{1,2}(?:\.\d+)?)\s*(?:/|out\s+of)\s*10\b";

fn find_rating(text: &str, labels: &[&str]) -> Option<f64> {
    labels
        .iter()
        .filter_map(|label| keyword_pattern(label))
        .find_map(|pattern| rating_in(text, &format!(r"(?is){}.*?{}", pattern, RATING)))
}

fn rating_in(text: &str, pattern: &str) -> Option<f64> {
    Regex::new(pattern)
        .ok()?
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

// ============================================================================
// Competitor Tables
// ============================================================================

/// Recover competitor rows from markdown tables.
///
/// Columns are mapped by header name when a header row is present
/// (name/company, description/offering, strengths, weaknesses); otherwise the
/// first four columns are taken positionally. Rows with fewer than four cells
/// are ignored.
pub fn extract_competitors(text: &str) -> Vec<CompetitorEntry> {
    let mut competitors = Vec::new();
    let mut columns: Option<ColumnMap> = None;
    let mut in_table = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if !trimmed.starts_with('|') {
            in_table = false;
            columns = None;
            continue;
        }

        let cells = split_row(trimmed);
        if cells.iter().all(|c| is_separator_cell(c)) {
            continue;
        }

        if !in_table {
            in_table = true;
            if let Some(map) = ColumnMap::from_header(&cells) {
                columns = Some(map);
                continue;
            }
        }

        if cells.len() < 4 {
            continue;
        }

        let map = columns.unwrap_or_default();
        let cell = |idx: usize| cells.get(idx).map(|c| clean_cell(c)).unwrap_or_default();
        let name = cell(map.name);
        if name.is_empty() {
            continue;
        }

        competitors.push(CompetitorEntry {
            name,
            description: cell(map.description),
            strengths: cell(map.strengths),
            weaknesses: cell(map.weaknesses),
        });
    }

    competitors
}

#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    name: usize,
    description: usize,
    strengths: usize,
    weaknesses: usize,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            name: 0,
            description: 1,
            strengths: 2,
            weaknesses: 3,
        }
    }
}

impl ColumnMap {
    fn from_header(cells: &[String]) -> Option<Self> {
        let find = |needles: &[&str]| {
            cells.iter().position(|c| {
                let lower = c.to_lowercase();
                needles.iter().any(|n| lower.contains(n))
            })
        };

        let name = find(&["name", "company", "competitor"])?;
        let strengths = find(&["strength"])?;
        let weaknesses = find(&["weakness"])?;
        let description = find(&["description", "offering", "overview"]).unwrap_or(1);

        Some(Self {
            name,
            description,
            strengths,
            weaknesses,
        })
    }
}

fn split_row(row: &str) -> Vec<String> {
    row.trim_matches('|')
        .split('|')
        .map(|c| c.trim().to_string())
        .collect()
}

fn is_separator_cell(cell: &str) -> bool {
    !cell.is_empty() && cell.chars().all(|c| matches!(c, '-' | ':' | ' '))
}

fn clean_cell(cell: &str) -> String {
    cell.trim().trim_matches('*').trim().to_string()
}
