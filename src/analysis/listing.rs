//! Structural checks over a generated listing.
//!
//! Confirms that every construct label is defined and referenced exactly
//! once, that memory offsets are in range and aligned, that no link or base
//! register is `zero`, and that gated mnemonics only appear when enabled.

use crate::config::Extensions;
use crate::consts::rv32::{ENTRY_LABEL, MAX_OFFSET};
use crate::error::{Result, Rv32GenError};
use crate::random_asm::catalog::{Opcode, Register};
use crate::random_asm::labels::LabelKind;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static LABEL_DEF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_.][\w.]*):\s*(.*)$").expect("valid regex"));
static LABEL_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(j[fbsa])(\d+)\b").expect("valid regex"));
static OFFSET_OPERANDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\w+),(-?\d+)\((\w+)\)$").expect("valid regex"));

/// Textual direction of a label reference relative to its definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// Reference precedes the definition
    Forward,
    /// Definition precedes the reference
    Backward,
}

/// Where a label is defined and referenced (1-based line numbers).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelUse {
    pub definitions: Vec<usize>,
    pub references: Vec<usize>,
}

impl LabelUse {
    pub fn direction(&self) -> Option<Direction> {
        match (self.definitions.as_slice(), self.references.as_slice()) {
            ([def], [reference]) if reference < def => Some(Direction::Forward),
            ([def], [reference]) if reference > def => Some(Direction::Backward),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingIssue {
    /// 1-based line, 0 when the issue concerns the whole listing
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingReport {
    pub instructions: usize,
    pub labels: BTreeMap<String, LabelUse>,
    pub issues: Vec<ListingIssue>,
}

impl ListingReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Distinct construct ids referenced by `jf/jb/js/ja` labels.
    pub fn label_ids(&self) -> usize {
        self.labels
            .keys()
            .filter_map(|name| split_construct_label(name).map(|(_, id)| id))
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn count_direction(&self, direction: Direction) -> usize {
        self.labels
            .values()
            .filter(|u| u.direction() == Some(direction))
            .count()
    }

    /// Turn the first issue into an error.
    pub fn into_result(self) -> Result<Self> {
        match self.issues.first() {
            Some(issue) => Err(Rv32GenError::listing(issue.line, issue.message.clone())),
            None => Ok(self),
        }
    }

    fn issue(&mut self, line: usize, message: String) {
        self.issues.push(ListingIssue { line, message });
    }
}

fn split_construct_label(name: &str) -> Option<(LabelKind, u32)> {
    let (prefix, id) = name.split_at_checked(2)?;
    let kind = LabelKind::from_prefix(prefix)?;
    Some((kind, id.parse().ok()?))
}

/// Textual direction every construct uses for a label role. `jb` labels are
/// referenced ahead of their definition by the JALR address setup, so they
/// have no fixed direction.
fn expected_direction(kind: LabelKind) -> Option<Direction> {
    match kind {
        LabelKind::Forward | LabelKind::Skip => Some(Direction::Forward),
        LabelKind::Address => Some(Direction::Backward),
        LabelKind::Backward => None,
    }
}

/// One listing line split into its parts; `None` for blank and comment lines.
struct ParsedLine<'a> {
    label: Option<&'a str>,
    mnemonic: &'a str,
    operands: &'a str,
}

fn parse_line(line: &str) -> Option<ParsedLine<'_>> {
    let code = line.split('#').next().unwrap_or("").trim_end();
    if code.trim().is_empty() {
        return None;
    }
    let (label, body) = match LABEL_DEF.captures(code) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str()),
            caps.get(2).map_or("", |m| m.as_str()),
        ),
        None => (None, code.trim()),
    };
    let body = body.trim();
    let (mnemonic, operands) = match body.split_once(char::is_whitespace) {
        Some((m, rest)) => (m, rest.trim()),
        None => (body, ""),
    };
    Some(ParsedLine {
        label,
        mnemonic,
        operands,
    })
}

fn scan_labels<'a, I>(lines: I, report: &mut ListingReport)
where
    I: IntoIterator<Item = (usize, ParsedLine<'a>)>,
{
    for (number, parsed) in lines {
        if let Some(label) = parsed.label {
            report
                .labels
                .entry(label.to_string())
                .or_default()
                .definitions
                .push(number);
        }
        for caps in LABEL_REF.captures_iter(parsed.operands) {
            report
                .labels
                .entry(caps[0].to_string())
                .or_default()
                .references
                .push(number);
        }
    }
}

fn check_label_balance(report: &mut ListingReport) {
    let mut found = Vec::new();
    for (name, usage) in &report.labels {
        if name == ENTRY_LABEL {
            continue;
        }
        let line = usage
            .definitions
            .first()
            .or(usage.references.first())
            .copied()
            .unwrap_or(0);
        if usage.definitions.len() != 1 {
            found.push((line, format!("label {} defined {} times", name, usage.definitions.len())));
        }
        if usage.references.len() != 1 {
            found.push((line, format!("label {} referenced {} times", name, usage.references.len())));
        }
        if let (Some((kind, _)), Some(direction)) = (split_construct_label(name), usage.direction()) {
            if let Some(expected) = expected_direction(kind) {
                if expected != direction {
                    found.push((line, format!("label {} used {:?}, expected {:?}", name, direction, expected)));
                }
            }
        }
    }
    for (line, message) in found {
        report.issue(line, message);
    }
}

fn check_operands(number: usize, parsed: &ParsedLine<'_>, extensions: &Extensions, report: &mut ListingReport) {
    let Some(op) = Opcode::from_mnemonic(parsed.mnemonic) else {
        return;
    };
    let is_zero = |name: &str| Register::from_name(name).is_some_and(Register::is_zero);

    if op.requires_mul_div() && !extensions.has_mul_div() {
        report.issue(number, format!("{} used without the M extension", op));
    }

    if let Some(width) = op.access_width() {
        let Some(caps) = OFFSET_OPERANDS.captures(parsed.operands) else {
            report.issue(number, format!("malformed {} operands '{}'", op, parsed.operands));
            return;
        };
        let offset: i32 = caps[2].parse().unwrap_or(i32::MAX);
        if !(-MAX_OFFSET..=MAX_OFFSET).contains(&offset) {
            report.issue(number, format!("{} offset {} out of range", op, offset));
        } else if offset % width.bytes() != 0 {
            report.issue(number, format!("{} offset {} not {}-byte aligned", op, offset, width.bytes()));
        }
        if is_zero(&caps[3]) {
            report.issue(number, format!("{} uses zero as base register", op));
        }
        return;
    }

    match op {
        Opcode::Jal => {
            let link = parsed.operands.split(',').next().unwrap_or("");
            if is_zero(link) {
                report.issue(number, "JAL with zero link register".to_string());
            }
        }
        Opcode::Jalr => {
            let registers: Vec<String> = match OFFSET_OPERANDS.captures(parsed.operands) {
                Some(caps) => vec![caps[1].to_string(), caps[3].to_string()],
                None => vec![parsed.operands.to_string()],
            };
            if registers.iter().any(|r| is_zero(r.as_str())) {
                report.issue(number, "JALR with zero link register".to_string());
            }
        }
        _ => {}
    }
}

/// Check a complete listing.
pub fn check_listing(text: &str, extensions: &Extensions) -> ListingReport {
    let mut report = ListingReport::default();
    let parsed: Vec<(usize, ParsedLine<'_>)> = text
        .lines()
        .enumerate()
        .filter_map(|(i, line)| parse_line(line).map(|p| (i + 1, p)))
        .collect();

    report.instructions = parsed.iter().filter(|(_, p)| !p.mnemonic.is_empty()).count();
    for (number, line) in &parsed {
        check_operands(*number, line, extensions, &mut report);
    }

    let has_entry = parsed.iter().any(|(_, p)| p.label == Some(ENTRY_LABEL));
    let halts = text
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .is_some_and(|l| l.trim_start().starts_with("ebreak") && l.contains("End of Test"));

    scan_labels(parsed, &mut report);
    check_label_balance(&mut report);

    if !has_entry {
        report.issue(0, format!("missing '{}' entry label", ENTRY_LABEL));
    }
    if !halts {
        report.issue(0, "listing does not end with the halt instruction".to_string());
    }
    report
}

/// Label-only check for a run of lines from one or more constructs.
pub fn check_fragment_labels(lines: &[String]) -> Result<()> {
    let mut report = ListingReport::default();
    scan_labels(
        lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| parse_line(line).map(|p| (i + 1, p))),
        &mut report,
    );
    check_label_balance(&mut report);
    report.into_result().map(|_| ())
}
