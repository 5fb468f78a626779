use crate::value::SqlValue;

/// One piece of a [`SqlBuffer`](super::SqlBuffer).
#[derive(Debug, Clone, PartialEq)]
pub enum SqlItem {
    /// Literal SQL text.
    Text(String),
    /// A bound value rendered as a placeholder (or as a literal in log output).
    Variable(Variable),
    /// A dialect-raw expression such as `CURRENT_TIMESTAMP`, rendered verbatim.
    Raw(String),
    /// A truncation boundary; never rendered to executable SQL.
    Omit(OmitMark),
}

/// A bound value and its placeholder identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// 1-based, unique within a buffer, increasing in item order.
    pub index: usize,
    pub name: Option<String>,
    pub value: SqlValue,
}

impl Variable {
    /// Placeholder key without the leading `:` (`$3$userName` or `$3`).
    pub fn key(&self) -> String {
        match &self.name {
            Some(name) => format!("${}${}", self.index, name),
            None => format!("${}", self.index),
        }
    }
}

/// Markers emitted by batch builders around repeated row fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OmitMark {
    /// Start of the `n`-th (0-based) row fragment.
    Row(usize),
    /// End of the current run of row fragments.
    End,
}

/// How adjoining characters behave when two fragments are concatenated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge {
    None,
    Space,
    Word,
    Open,
    Close,
    Symbol,
}

impl Edge {
    pub(crate) fn of(c: char) -> Self {
        if c.is_whitespace() {
            Edge::Space
        } else if c.is_alphanumeric() || matches!(c, '_' | '*' | '\'' | '"' | '`' | '$' | ':') {
            Edge::Word
        } else if c == '(' {
            Edge::Open
        } else if c == ')' {
            Edge::Close
        } else {
            Edge::Symbol
        }
    }

    /// `SELECT` + `ID` must not become `SELECTID`.
    pub(crate) fn needs_space(left: Edge, right: Edge) -> bool {
        matches!(left, Edge::Word | Edge::Close) && right == Edge::Word
    }
}

/// Keep only `[A-Za-z0-9_]` in a variable name so it survives placeholder parsing.
pub(crate) fn sanitize_name(name: &str) -> Option<String> {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if cleaned.is_empty() { None } else { Some(cleaned) }
}
