//! The ordered, round-trippable requirement document model.
//!
//! A document is an indexed sequence of tagged elements, each carrying its
//! own raw prefix/suffix text plus the exact source text it was parsed from.
//! Serializing an unmodified parse of text `T` reproduces `T` byte for byte,
//! including comments and line continuations. Mutation goes through the
//! element accessors (never ad hoc text splicing); a mutated element drops
//! its preserved source text and re-renders canonically.

use crate::error::{CairnError, Result};
use crate::requirement::{guess_name, Requirement};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static ENV_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\w+)=(\S.*)$").unwrap());
static HEADER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\w-]+): (\S.*)$").unwrap());

/// An environment assignment line: `NAME=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl fmt::Display for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// A header line: `Name-With-Hyphens: value`.
///
/// Names are canonicalized by hyphen-segment title-casing on construction,
/// so differently-cased spellings collide in lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: Self::canonicalize(name),
            value: value.into(),
        }
    }

    /// The canonicalized header name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Title-case every hyphen segment: `cairn-revision` → `Cairn-Revision`.
    pub fn canonicalize(name: &str) -> String {
        name.split('-')
            .map(|chunk| {
                let mut chars = chunk.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                    }
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.value)
    }
}

/// The classified content of one logical line.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Empty or comment-only line, preserved verbatim.
    Blank,
    Env(EnvVar),
    Header(Header),
    Requirement(Requirement),
}

/// One document element: raw prefix, payload, raw suffix, and (when
/// unmodified) the exact source text of the physical lines it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    prefix: String,
    payload: Payload,
    suffix: String,
    raw: Option<String>,
}

impl Element {
    /// A synthesized element with no prefix, suffix, or source text.
    pub fn new(payload: Payload) -> Self {
        Self {
            prefix: String::new(),
            payload,
            suffix: String::new(),
            raw: None,
        }
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Mutable payload access; drops the preserved source text, so the
    /// element re-renders canonically from then on.
    pub fn payload_mut(&mut self) -> &mut Payload {
        self.raw = None;
        &mut self.payload
    }

    /// Leading whitespace of the logical line.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Trailing whitespace and comment of the logical line.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    fn render_payload(&self) -> String {
        match &self.payload {
            Payload::Blank => String::new(),
            Payload::Env(var) => var.to_string(),
            Payload::Header(header) => header.to_string(),
            Payload::Requirement(req) => req.to_string(),
        }
    }
}

/// Ordered sequence of requirement-document elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequirementDocument {
    elements: Vec<Element>,
    trailing_newline: bool,
}

impl RequirementDocument {
    /// An empty document.
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            trailing_newline: true,
        }
    }

    /// Parse document text.
    ///
    /// Line-oriented: a physical line ending in `\` is spliced with the next
    /// before classification (repeatedly). Each logical line splits at the
    /// first unescaped `#` into content and trailing comment. Environment
    /// assignments update a running table that later requirements inherit
    /// from (explicit overrides win).
    pub fn parse(source: &str) -> Result<Self> {
        if source.is_empty() {
            return Ok(Self::new());
        }

        let mut physical: Vec<&str> = source.split('\n').collect();
        let trailing_newline = physical.last() == Some(&"");
        if trailing_newline {
            physical.pop();
        }

        let mut environ: BTreeMap<String, String> = BTreeMap::new();
        let mut elements = Vec::new();
        let mut i = 0;
        while i < physical.len() {
            let mut raw = physical[i].to_string();
            let mut logical = physical[i].trim_end().to_string();
            while logical.ends_with('\\') && i + 1 < physical.len() {
                i += 1;
                raw.push('\n');
                raw.push_str(physical[i]);
                logical.pop();
                logical.push_str(physical[i].trim_end());
            }
            i += 1;
            elements.push(Self::classify(&logical, raw, &mut environ)?);
        }

        Ok(Self {
            elements,
            trailing_newline,
        })
    }

    fn classify(
        logical: &str,
        raw: String,
        environ: &mut BTreeMap<String, String>,
    ) -> Result<Element> {
        let (body, comment) = split_comment(logical);
        let trimmed_start = body.trim_start();
        let prefix = body[..body.len() - trimmed_start.len()].to_string();
        let content = trimmed_start.trim_end();
        let suffix = format!("{}{}", &trimmed_start[content.len()..], comment);

        let payload = if content.is_empty() {
            Payload::Blank
        } else if let Some(caps) = ENV_LINE_RE.captures(content) {
            let var = EnvVar {
                name: caps[1].to_string(),
                value: caps[2].to_string(),
            };
            environ.insert(var.name.clone(), var.value.clone());
            Payload::Env(var)
        } else if let Some(caps) = HEADER_LINE_RE.captures(content) {
            Payload::Header(Header::new(&caps[1], &caps[2]))
        } else {
            let mut req = Requirement::parse(content)?;
            for (name, value) in environ.iter() {
                req.inherit_env(name, value);
            }
            Payload::Requirement(req)
        };

        Ok(Element {
            prefix,
            payload,
            suffix,
            raw: Some(raw),
        })
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Element> {
        self.elements.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Element> {
        self.elements.get_mut(index)
    }

    /// Append a synthesized element.
    pub fn push(&mut self, payload: Payload) {
        self.elements.push(Element::new(payload));
    }

    /// Insert a synthesized element at an index.
    pub fn insert(&mut self, index: usize, payload: Payload) {
        self.elements.insert(index, Element::new(payload));
    }

    /// Remove and return the element at an index.
    pub fn remove(&mut self, index: usize) -> Element {
        self.elements.remove(index)
    }

    /// Iterate requirements in document order.
    pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
        self.elements.iter().filter_map(|el| match &el.payload {
            Payload::Requirement(req) => Some(req),
            _ => None,
        })
    }

    /// Iterate requirements mutably; every yielded requirement's element is
    /// treated as modified and re-renders canonically.
    pub fn requirements_mut(&mut self) -> impl Iterator<Item = &mut Requirement> {
        self.elements.iter_mut().filter_map(|el| {
            if matches!(el.payload, Payload::Requirement(_)) {
                el.raw = None;
            }
            match &mut el.payload {
                Payload::Requirement(req) => Some(req),
                _ => None,
            }
        })
    }

    /// Look up a header by (canonicalized) name; first occurrence wins.
    pub fn header(&self, name: &str) -> Option<&Header> {
        let canonical = Header::canonicalize(name);
        self.elements.iter().find_map(|el| match &el.payload {
            Payload::Header(header) if header.name == canonical => Some(header),
            _ => None,
        })
    }

    /// Update the first header with this name, or append a new one.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        let canonical = Header::canonicalize(name);
        let value = value.into();
        for el in &mut self.elements {
            if let Payload::Header(header) = &el.payload {
                if header.name == canonical {
                    el.raw = None;
                    if let Payload::Header(header) = &mut el.payload {
                        header.value = value;
                    }
                    return;
                }
            }
        }
        self.push(Payload::Header(Header::new(name, value)));
    }

    /// Derive names for requirements that lack one.
    ///
    /// Pass 1 collects the explicitly named into a case-insensitive set,
    /// failing on duplicates. Pass 2 derives a candidate from each unnamed
    /// requirement's locator in document order; on collision, `strict`
    /// fails, otherwise that requirement stays unnamed without reserving
    /// the candidate.
    ///
    /// The operation is transactional: every candidate is validated before
    /// any assignment, so a failed call leaves the document untouched.
    pub fn infer_missing_names(&mut self, strict: bool) -> Result<()> {
        let mut used: HashSet<String> = HashSet::new();
        for req in self.requirements() {
            if req.name().is_empty() {
                continue;
            }
            if !used.insert(req.name().to_lowercase()) {
                return Err(CairnError::NameCollision {
                    name: req.name().to_string(),
                });
            }
        }

        let mut assignments: Vec<(usize, String)> = Vec::new();
        for (index, element) in self.elements.iter().enumerate() {
            let Payload::Requirement(req) = &element.payload else {
                continue;
            };
            if !req.name().is_empty() {
                continue;
            }
            let candidate = guess_name(req.locator());
            if candidate.is_empty() {
                if strict {
                    return Err(CairnError::parse(
                        req.locator(),
                        "cannot derive a name; set one explicitly",
                    ));
                }
                continue;
            }
            let key = candidate.to_lowercase();
            if used.contains(&key) {
                if strict {
                    return Err(CairnError::NameCollision { name: candidate });
                }
                continue;
            }
            used.insert(key);
            assignments.push((index, candidate));
        }

        for (index, name) in assignments {
            let element = &mut self.elements[index];
            element.raw = None;
            if let Payload::Requirement(req) = &mut element.payload {
                req.set_name(name);
            }
        }
        Ok(())
    }

    /// Serialize the document.
    ///
    /// Re-threads the running environment table: an explicit override that
    /// exactly duplicates the currently-inherited value is dropped from the
    /// emitted form, computed fresh against the elements being emitted.
    /// With `freeze`, each requirement that carries a pinned snapshot emits
    /// the concrete `locator==version` form instead of its constraint.
    /// Elements that are unmodified and need neither treatment emit their
    /// preserved source text, which is what makes the round-trip law hold.
    pub fn serialize(&self, freeze: bool) -> String {
        let mut environ: BTreeMap<String, String> = BTreeMap::new();
        let mut out = String::new();
        let count = self.elements.len();

        for (i, element) in self.elements.iter().enumerate() {
            if let Payload::Env(var) = &element.payload {
                environ.insert(var.name.clone(), var.value.clone());
            }

            let line = match &element.payload {
                Payload::Requirement(req) => {
                    let kept: Vec<(String, String)> = req
                        .explicit_env()
                        .iter()
                        .filter(|(name, value)| environ.get(name) != Some(value))
                        .cloned()
                        .collect();
                    let deduped = kept.len() != req.explicit_env().len();
                    let pin = if freeze { req.pinned() } else { None };
                    match (&element.raw, deduped, pin) {
                        (Some(raw), false, None) => raw.clone(),
                        _ => format!(
                            "{}{}{}",
                            element.prefix,
                            req.render(&kept, pin),
                            element.suffix
                        ),
                    }
                }
                _ => match &element.raw {
                    Some(raw) => raw.clone(),
                    None => format!(
                        "{}{}{}",
                        element.prefix,
                        element.render_payload(),
                        element.suffix
                    ),
                },
            };

            out.push_str(&line);
            if i + 1 < count || self.trailing_newline {
                out.push('\n');
            }
        }

        out
    }

    /// Read and parse a document file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Write the document to a file.
    ///
    /// Writes to a temporary sibling path and atomically renames over the
    /// original, so a crash never leaves a half-written document.
    pub fn dump(&self, path: &Path, freeze: bool) -> Result<()> {
        let mut tmp_name = path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        fs::write(&tmp, self.serialize(freeze))?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Split a logical line at the first unescaped `#`.
fn split_comment(line: &str) -> (&str, &str) {
    let bytes = line.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] == b'#' && (i == 0 || bytes[i - 1] != b'\\') {
            return (&line[..i], &line[i..]);
        }
    }
    (line, "")
}
