//! A comparator for expected output that mixes literal text with pattern blocks.
//!
//! A template such as
//!
//! ```text
//! abc.$re: \d{5}$
//! total: $re:\s*\d+\s*$
//! ```
//!
//! is scanned left to right. Literal spans are escaped so they match themselves; the body of
//! each delimited block is trimmed and spliced in verbatim as a non-capturing group. The whole
//! pattern is anchored at both ends and compiled once, so a template only ever accepts the
//! complete captured text, never a substring of it. `.` inside a block also matches newlines.

use regex::{Regex, RegexBuilder};
use util::execution_config::TemplateOptions;

use crate::traits::comparator::OutputComparator;
use crate::utilities::line_diff;

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Pattern(String),
}

/// Splits `template` into literal and pattern segments.
///
/// A block runs from an opening delimiter to the first closing delimiter after it. An opening
/// delimiter that is never closed is kept as literal text.
pub fn parse_segments(template: &str, options: &TemplateOptions) -> Vec<Segment> {
    let open = options.open_delimiter.as_str();
    let close = options.close_delimiter.as_str();
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(start) = rest.find(open) {
        let after_open = &rest[start + open.len()..];
        let Some(end) = after_open.find(close) else {
            break;
        };
        literal.push_str(&rest[..start]);
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Pattern(after_open[..end].trim().to_string()));
        rest = &after_open[end + close.len()..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}

/// A template compiled into a single whole-text matcher.
#[derive(Debug, Clone)]
pub struct PatternTemplate {
    segments: Vec<Segment>,
    matcher: Regex,
}

impl PatternTemplate {
    /// Compiles `template`; an invalid block body is reported with the regex engine's message.
    pub fn compile(template: &str, options: &TemplateOptions) -> Result<Self, String> {
        let segments = parse_segments(template, options);
        let mut pattern = String::from(r"\A");
        for segment in &segments {
            match segment {
                Segment::Literal(text) => pattern.push_str(&regex::escape(text)),
                Segment::Pattern(body) => {
                    pattern.push_str("(?:");
                    pattern.push_str(body);
                    pattern.push(')');
                }
            }
        }
        pattern.push_str(r"\z");

        let matcher = RegexBuilder::new(&pattern)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self { segments, matcher })
    }

    pub fn is_match(&self, actual: &str) -> bool {
        self.matcher.is_match(actual)
    }

    /// Template text with every block shown as `<RE:body>`.
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.clone(),
                Segment::Pattern(body) => format!("<RE:{body}>"),
            })
            .collect()
    }
}

pub struct TemplateComparator {
    template: PatternTemplate,
}

impl TemplateComparator {
    pub fn new(template: &str, options: &TemplateOptions) -> Result<Self, String> {
        Ok(Self {
            template: PatternTemplate::compile(template, options)?,
        })
    }
}

impl OutputComparator for TemplateComparator {
    fn matches(&self, actual: &str) -> bool {
        self.template.is_match(actual)
    }

    fn diff(&self, actual: &str) -> String {
        let diff = line_diff::unified(
            &self.template.render(),
            actual,
            "expected(template)",
            "actual",
        );
        if diff.is_empty() {
            "(no line-oriented diff available)".to_string()
        } else {
            diff
        }
    }
}
