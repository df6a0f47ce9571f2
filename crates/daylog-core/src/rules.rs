//! Rules-language compiler.
//!
//! Parses the line-oriented rules format into a [`Ruleset`]: section headers
//! `[name]` (suffix `/i` makes a section case-sensitive), `include`
//! directives, weighted categorization rules, counters with `$N` capture
//! templates, markers with recording policies, collapse chains and colors.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::category::{CategoryError, CategorySet, ERROR_CATEGORY, WeightedCategory};

/// Extension tried when locating rules files.
pub const RULES_EXTENSION: &str = ".grc";

/// Include chains deeper than this are assumed to be self-including.
const MAX_INCLUDE_DEPTH: usize = 16;

static SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\[([^\]/]+)(/i)?\]$").expect("section pattern"));
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*#").expect("comment pattern"));

/// Compilation errors, with the 1-based offending line number.
#[derive(Debug, Error)]
pub enum RulesError {
    #[error("unknown section at line {line}: [{name}]")]
    UnknownSection { line: usize, name: String },

    #[error("line {line} appears before any section header")]
    OutsideSection { line: usize },

    #[error("unrecognized {section} line {line}: {text}")]
    MalformedLine {
        section: &'static str,
        line: usize,
        text: String,
    },

    #[error("percentages at line {line} add up to {total}, not 100")]
    BadPercentTotal { line: usize, total: u32 },

    #[error("line {line} gives {got} percentages for {expected} pattern alternatives")]
    AlternativeCountMismatch {
        line: usize,
        expected: usize,
        got: usize,
    },

    #[error("invalid pattern at line {line}: {source}")]
    BadPattern {
        line: usize,
        #[source]
        source: Box<regex::Error>,
    },

    #[error("unknown marker policy at line {line}: {policy}")]
    UnknownPolicy { line: usize, policy: String },

    #[error("unknown render mode at line {line}: {mode}")]
    UnknownMode { line: usize, mode: String },

    #[error("include chain deeper than {MAX_INCLUDE_DEPTH} levels at line {line}")]
    IncludeTooDeep { line: usize },

    #[error("rules file not found: {name}")]
    NotFound { name: String },

    #[error("failed to read rules file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Category(#[from] CategoryError),
}

/// Rendering mode requested by the rules file. Opaque to this crate beyond
/// image/interactive classification; consumed downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Calendar,
    Occupations,
    Count,
    Stack,
    Interactive,
}

impl RenderMode {
    /// Whether this mode renders to a raster image.
    pub const fn is_image_mode(self) -> bool {
        !matches!(self, Self::Interactive)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Calendar => "calendar",
            Self::Occupations => "occupation",
            Self::Count => "count",
            Self::Stack => "stack",
            Self::Interactive => "interactive",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "calendar" => Ok(Self::Calendar),
            "occupation" => Ok(Self::Occupations),
            "stack" => Ok(Self::Stack),
            "count" => Ok(Self::Count),
            "interactive" => Ok(Self::Interactive),
            _ => Err(format!("unknown render mode: {s}")),
        }
    }
}

/// Run metadata from the `[general]` section.
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub name: String,
    pub mode: RenderMode,
}

impl Default for RunSpec {
    fn default() -> Self {
        Self {
            name: "unnamed".to_string(),
            mode: RenderMode::default(),
        }
    }
}

/// When a marker records its timestamp on a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPolicy {
    /// Record only the first match of the day.
    First,
    /// Keep only the last match of the day.
    Last,
    /// Record every match.
    Each,
}

impl FromStr for MarkerPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "First" => Ok(Self::First),
            "Last" => Ok(Self::Last),
            "Each" => Ok(Self::Each),
            _ => Err(format!("unknown marker policy: {s}")),
        }
    }
}

/// A compiled categorization rule.
#[derive(Debug)]
pub struct Rule {
    pattern: Regex,
    pattern_text: String,
    categories: Vec<WeightedCategory>,
}

impl Rule {
    pub fn pattern_text(&self) -> &str {
        &self.pattern_text
    }

    pub fn categories(&self) -> &[WeightedCategory] {
        &self.categories
    }

    fn matches(&self, activity: &str) -> bool {
        self.pattern.is_match(activity)
    }
}

/// A counter: unit contributions per matching line plus an open interval
/// measured until the next timestamped line.
#[derive(Debug)]
pub struct Counter {
    pattern: Regex,
    contribution: String,
    category: String,
}

impl Counter {
    /// Matches a whole log line; on success returns the substituted
    /// category name and integer contribution.
    pub fn match_line(&self, line: &str) -> Option<(String, i64)> {
        let caps = self.pattern.captures(line)?;
        let category = substitute_captures(&self.category, &caps);
        let contribution = leading_int(&substitute_captures(&self.contribution, &caps));
        Some((category, contribution))
    }
}

/// A marker: a named timestamp annotation with a recording policy.
#[derive(Debug)]
pub struct Marker {
    pattern: Regex,
    pub policy: MarkerPolicy,
    pub name: String,
}

impl Marker {
    /// Markers run against activity text, not whole lines.
    pub fn matches(&self, activity: &str) -> bool {
        self.pattern.is_match(activity)
    }
}

/// An ad-hoc counter supplied outside the rules file, matched against
/// activity text with the pattern itself as the category name.
#[derive(Debug)]
pub struct Check {
    pattern: Regex,
    pub name: String,
}

impl Check {
    pub fn matches(&self, activity: &str) -> bool {
        self.pattern.is_match(activity)
    }
}

/// The compiled classification pipeline.
#[derive(Debug)]
pub struct Ruleset {
    pub spec: RunSpec,
    rules: Vec<Rule>,
    counters: Vec<Counter>,
    markers: Vec<Marker>,
    checks: Vec<Check>,
}

impl Ruleset {
    /// First rule whose pattern matches the activity, in declaration order.
    pub fn categorize(&self, activity: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matches(activity))
    }

    /// All counter matches for a line, as (category, contribution) pairs.
    pub fn match_counters(&self, line: &str) -> Vec<(String, i64)> {
        self.counters
            .iter()
            .filter_map(|counter| counter.match_line(line))
            .collect()
    }

    /// Markers whose pattern matches the activity text.
    pub fn markers_for<'a>(&'a self, activity: &'a str) -> impl Iterator<Item = &'a Marker> {
        self.markers.iter().filter(move |m| m.matches(activity))
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    /// Registers an ad-hoc counter pattern (unanchored, case-sensitive).
    pub fn add_check(&mut self, pattern: &str) -> Result<(), RulesError> {
        let compiled = Regex::new(pattern).map_err(|source| RulesError::BadPattern {
            line: 0,
            source: Box::new(source),
        })?;
        self.checks.push(Check {
            pattern: compiled,
            name: pattern.to_string(),
        });
        Ok(())
    }
}

/// A category name with its weight, before resolution.
#[derive(Debug, Clone, PartialEq)]
struct WeightedName {
    name: String,
    weight: f64,
}

#[derive(Debug)]
struct RawRule {
    pattern: Regex,
    pattern_text: String,
    categories: Vec<WeightedName>,
}

/// Parse output before category resolution.
#[derive(Debug, Default)]
struct RawRules {
    spec: RunSpec,
    colors: HashMap<String, String>,
    collapse: HashMap<String, String>,
    counters: Vec<Counter>,
    markers: Vec<Marker>,
    rules: Vec<RawRule>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    General,
    Colors,
    Collapse,
    Counters,
    Markers,
    Rules,
}

impl Section {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "general" => Some(Self::General),
            "colors" => Some(Self::Colors),
            "collapse" => Some(Self::Collapse),
            "counters" => Some(Self::Counters),
            "markers" => Some(Self::Markers),
            "rules" => Some(Self::Rules),
            _ => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Colors => "colors",
            Self::Collapse => "collapse",
            Self::Counters => "counters",
            Self::Markers => "markers",
            Self::Rules => "rules",
        }
    }
}

/// Locates a rules file: the name as given, with the `.grc` extension, and
/// both again under a `rules/` directory.
pub fn find_rules_file(name: &str, base: &Path) -> Result<PathBuf, RulesError> {
    let candidates = [
        name.to_string(),
        format!("{name}{RULES_EXTENSION}"),
        format!("rules/{name}"),
        format!("rules/{name}{RULES_EXTENSION}"),
    ];
    for candidate in &candidates {
        let path = base.join(candidate);
        if path.exists() {
            return Ok(path);
        }
    }
    Err(RulesError::NotFound {
        name: name.to_string(),
    })
}

/// Reads and compiles a rules file, applying external collapse overrides.
pub fn load_rules(
    path: &Path,
    extra_collapses: &HashMap<String, String>,
) -> Result<(Ruleset, CategorySet), RulesError> {
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let text = std::fs::read_to_string(path).map_err(|source| RulesError::Io {
        path: path.display().to_string(),
        source,
    })?;
    compile_rules(&text, Some(base), extra_collapses)
}

/// Compiles rules text. `base_dir` anchors `include` resolution; with
/// `None`, includes fail as not found.
pub fn compile_rules(
    text: &str,
    base_dir: Option<&Path>,
    extra_collapses: &HashMap<String, String>,
) -> Result<(Ruleset, CategorySet), RulesError> {
    let mut raw = parse_rules_text(text, base_dir, 0)?;
    for (source, target) in extra_collapses {
        raw.collapse.insert(source.clone(), target.clone());
    }

    let mut categories = CategorySet::new(raw.collapse, raw.colors);
    categories.resolve(ERROR_CATEGORY)?;
    let mut rules = Vec::with_capacity(raw.rules.len());
    for rule in raw.rules {
        let mut weighted = Vec::with_capacity(rule.categories.len());
        for entry in rule.categories {
            weighted.push(WeightedCategory {
                category: categories.resolve(&entry.name)?,
                weight: entry.weight,
            });
        }
        rules.push(Rule {
            pattern: rule.pattern,
            pattern_text: rule.pattern_text,
            categories: weighted,
        });
    }

    let ruleset = Ruleset {
        spec: raw.spec,
        rules,
        counters: raw.counters,
        markers: raw.markers,
        checks: Vec::new(),
    };
    Ok((ruleset, categories))
}

fn parse_rules_text(
    text: &str,
    base_dir: Option<&Path>,
    depth: usize,
) -> Result<RawRules, RulesError> {
    let mut raw = RawRules::default();
    let mut section: Option<Section> = None;
    let mut case_sensitive = false;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = line.trim_end_matches(['\r']);

        // Comments keep their meaning inside [colors]: color names never
        // start with '#', values always do.
        let in_colors = section == Some(Section::Colors);
        if line.is_empty() || (!in_colors && COMMENT_RE.is_match(line)) {
            continue;
        }

        if let Some(caps) = SECTION_RE.captures(line) {
            let name = &caps[1];
            section = Some(Section::parse(name).ok_or_else(|| RulesError::UnknownSection {
                line: line_no,
                name: name.to_string(),
            })?);
            case_sensitive = caps.get(2).is_some();
            continue;
        }

        match section {
            None => return Err(RulesError::OutsideSection { line: line_no }),
            Some(Section::General) => {
                parse_general_line(line, line_no, base_dir, depth, &mut raw)?;
            }
            Some(Section::Colors) => {
                let (name, value) =
                    split_two(line).ok_or_else(|| malformed(Section::Colors, line_no, line))?;
                raw.colors.insert(name, value);
            }
            Some(Section::Collapse) => {
                parse_collapse_line(line, &mut raw.collapse)
                    .ok_or_else(|| malformed(Section::Collapse, line_no, line))?;
            }
            Some(Section::Counters) => {
                let (pattern, contribution, category) =
                    split_three(line).ok_or_else(|| malformed(Section::Counters, line_no, line))?;
                raw.counters.push(Counter {
                    pattern: compile_anchored(&pattern, case_sensitive, line_no)?,
                    contribution,
                    category,
                });
            }
            Some(Section::Markers) => {
                let (pattern, policy, name) =
                    split_three(line).ok_or_else(|| malformed(Section::Markers, line_no, line))?;
                let policy = policy
                    .parse::<MarkerPolicy>()
                    .map_err(|_| RulesError::UnknownPolicy {
                        line: line_no,
                        policy,
                    })?;
                raw.markers.push(Marker {
                    pattern: compile_anchored(&pattern, case_sensitive, line_no)?,
                    policy,
                    name,
                });
            }
            Some(Section::Rules) => {
                let (pattern_text, spec) = line
                    .rsplit_once(" = ")
                    .map(|(p, s)| (p.trim(), s.trim()))
                    .filter(|(p, s)| !p.is_empty() && !s.is_empty())
                    .ok_or_else(|| malformed(Section::Rules, line_no, line))?;
                let categories = parse_weighted_spec(pattern_text, spec, line_no)?;
                raw.rules.push(RawRule {
                    pattern: compile_anchored(pattern_text, case_sensitive, line_no)?,
                    pattern_text: pattern_text.to_string(),
                    categories,
                });
            }
        }
    }
    Ok(raw)
}

fn parse_general_line(
    line: &str,
    line_no: usize,
    base_dir: Option<&Path>,
    depth: usize,
    raw: &mut RawRules,
) -> Result<(), RulesError> {
    if let Some(name) = line.strip_prefix("include ") {
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(RulesError::IncludeTooDeep { line: line_no });
        }
        let base = base_dir.ok_or_else(|| RulesError::NotFound {
            name: name.to_string(),
        })?;
        let path = find_rules_file(name.trim(), base)?;
        let text = std::fs::read_to_string(&path).map_err(|source| RulesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let included = parse_rules_text(&text, path.parent(), depth + 1)?;
        // Included run metadata is discarded; everything else merges in.
        raw.colors.extend(included.colors);
        raw.collapse.extend(included.collapse);
        raw.counters.extend(included.counters);
        raw.markers.extend(included.markers);
        raw.rules.extend(included.rules);
        return Ok(());
    }
    if let Some((key, value)) = split_two(line) {
        match key.as_str() {
            "name" => {
                raw.spec.name = value;
                return Ok(());
            }
            "mode" => {
                raw.spec.mode = value.parse().map_err(|_| RulesError::UnknownMode {
                    line: line_no,
                    mode: value.clone(),
                })?;
                return Ok(());
            }
            _ => {}
        }
    }
    Err(malformed(Section::General, line_no, line))
}

/// `A = B = ... = Target`: maps every left element to the final one.
fn parse_collapse_line(line: &str, collapse: &mut HashMap<String, String>) -> Option<()> {
    let mut parts: Vec<&str> = line.split('=').map(str::trim).collect();
    let target = parts.pop()?;
    if parts.is_empty() || target.is_empty() || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    for source in parts {
        collapse.insert(source.to_string(), target.to_string());
    }
    Some(())
}

fn malformed(section: Section, line: usize, text: &str) -> RulesError {
    RulesError::MalformedLine {
        section: section.name(),
        line,
        text: text.to_string(),
    }
}

fn split_two(line: &str) -> Option<(String, String)> {
    let (a, b) = line.split_once('=')?;
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() || b.contains('=') {
        return None;
    }
    Some((a.to_string(), b.to_string()))
}

fn split_three(line: &str) -> Option<(String, String, String)> {
    let parts: Vec<&str> = line.split('=').map(str::trim).collect();
    match parts.as_slice() {
        [a, b, c] if !a.is_empty() && !b.is_empty() && !c.is_empty() => {
            Some(((*a).to_string(), (*b).to_string(), (*c).to_string()))
        }
        _ => None,
    }
}

/// Patterns are anchored to the whole text, with the enclosing section's
/// case sensitivity.
fn compile_anchored(pattern: &str, case_sensitive: bool, line: usize) -> Result<Regex, RulesError> {
    RegexBuilder::new(&format!("^{pattern}$"))
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|source| RulesError::BadPattern {
            line,
            source: Box::new(source),
        })
}

/// Parses the right-hand side of a rule: a bare category, `N% Cat` pairs
/// summing to 100, or the percent-only shorthand over a `\+`-joined pattern.
fn parse_weighted_spec(
    pattern: &str,
    spec: &str,
    line: usize,
) -> Result<Vec<WeightedName>, RulesError> {
    let tokens: Vec<&str> = spec.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(RulesError::MalformedLine {
            section: Section::Rules.name(),
            line,
            text: spec.to_string(),
        });
    }

    if tokens.iter().all(|t| percent_token(t).is_some()) {
        // Shorthand: categories come positionally from the pattern's
        // `\+`-joined alternatives.
        let percents: Vec<u32> = tokens.iter().filter_map(|t| percent_token(t)).collect();
        let alternatives: Vec<&str> = pattern.split(r"\+").collect();
        if alternatives.len() != percents.len() {
            return Err(RulesError::AlternativeCountMismatch {
                line,
                expected: alternatives.len(),
                got: percents.len(),
            });
        }
        check_percent_total(&percents, line)?;
        return Ok(alternatives
            .iter()
            .zip(&percents)
            .map(|(alt, &p)| WeightedName {
                name: (*alt).to_string(),
                weight: f64::from(p) / 100.0,
            })
            .collect());
    }

    if percent_token(tokens[0]).is_none() {
        return Ok(vec![WeightedName {
            name: spec.to_string(),
            weight: 1.0,
        }]);
    }

    let mut entries: Vec<(u32, Vec<&str>)> = Vec::new();
    for token in &tokens {
        if let Some(percent) = percent_token(token) {
            entries.push((percent, Vec::new()));
        } else if let Some((_, words)) = entries.last_mut() {
            words.push(token);
        }
    }
    if entries.iter().any(|(_, words)| words.is_empty()) {
        return Err(RulesError::MalformedLine {
            section: Section::Rules.name(),
            line,
            text: spec.to_string(),
        });
    }
    let percents: Vec<u32> = entries.iter().map(|(p, _)| *p).collect();
    check_percent_total(&percents, line)?;
    Ok(entries
        .into_iter()
        .map(|(percent, words)| WeightedName {
            name: words.join(" "),
            weight: f64::from(percent) / 100.0,
        })
        .collect())
}

fn percent_token(token: &str) -> Option<u32> {
    let digits = token.strip_suffix('%')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn check_percent_total(percents: &[u32], line: usize) -> Result<(), RulesError> {
    let total: u32 = percents.iter().sum();
    if total == 100 {
        Ok(())
    } else {
        Err(RulesError::BadPercentTotal { line, total })
    }
}

/// Substitutes `$N` tokens with the match's capture groups in one
/// left-to-right scan. Substituted text is never rescanned, so a capture
/// containing `$N` cannot loop.
fn substitute_captures(template: &str, caps: &regex::Captures<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let mut digits = String::new();
        while let Some(&d) = chars.peek() {
            if d.is_ascii_digit() {
                digits.push(d);
                chars.next();
            } else {
                break;
            }
        }
        if digits.is_empty() {
            out.push('$');
        } else {
            let group: usize = digits.parse().unwrap_or(0);
            out.push_str(caps.get(group).map_or("", |m| m.as_str()));
        }
    }
    out
}

/// Leading-integer parse: optional sign and digits, anything else is 0.
fn leading_int(text: &str) -> i64 {
    let trimmed = text.trim_start();
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse::<i64>().map_or(0, |n| sign * n)
}
