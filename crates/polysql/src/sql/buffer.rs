use super::parts::{Edge, OmitMark, SqlItem, Variable, sanitize_name};
use crate::value::SqlValue;

/// A structured, mutable SQL fragment: text, bound variables, raw dialect
/// expressions and truncation markers.
///
/// A buffer is single-owner: build it, render it, drop it. Splicing another buffer
/// in (append or prepend) renumbers variables so indices stay unique and ordered.
#[must_use]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlBuffer {
    items: Vec<SqlItem>,
    var_count: usize,
}

impl SqlBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer holding `text`.
    pub fn of(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut buffer = Self::new();
        if !text.is_empty() {
            buffer.items.push(SqlItem::Text(text));
        }
        buffer
    }

    pub fn items(&self) -> &[SqlItem] {
        &self.items
    }

    /// Number of bound variables.
    pub fn variable_count(&self) -> usize {
        self.var_count
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.items.iter().filter_map(|item| match item {
            SqlItem::Variable(v) => Some(v),
            _ => None,
        })
    }

    /// `true` when nothing renderable has been added.
    pub fn is_empty(&self) -> bool {
        self.items.iter().all(|item| match item {
            SqlItem::Text(s) => s.is_empty(),
            SqlItem::Omit(_) => true,
            SqlItem::Variable(_) | SqlItem::Raw(_) => false,
        })
    }

    /// `true` when the rendered text ends with `suffix` (ignoring trailing whitespace).
    pub fn ends_with(&self, suffix: &str) -> bool {
        for item in self.items.iter().rev() {
            match item {
                SqlItem::Text(s) if s.trim_end().is_empty() => continue,
                SqlItem::Text(s) => return s.trim_end().ends_with(suffix),
                SqlItem::Omit(_) => continue,
                _ => return false,
            }
        }
        false
    }

    // ==================== Text ====================

    /// Append text verbatim.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }
        match self.items.last_mut() {
            Some(SqlItem::Text(last)) => last.push_str(sql),
            _ => self.items.push(SqlItem::Text(sql.to_string())),
        }
        self
    }

    /// Append text, inserting one space when two word tokens would otherwise touch.
    pub fn append(&mut self, sql: &str) -> &mut Self {
        let Some(first) = sql.chars().next() else {
            return self;
        };
        if Edge::needs_space(self.last_edge(), Edge::of(first)) {
            self.push(" ");
        }
        self.push(sql)
    }

    /// Prepend text, inserting one space when two word tokens would otherwise touch.
    pub fn prepend(&mut self, sql: &str) -> &mut Self {
        let Some(last) = sql.chars().last() else {
            return self;
        };
        let mut text = sql.to_string();
        if Edge::needs_space(Edge::of(last), self.first_edge()) {
            text.push(' ');
        }
        match self.items.first_mut() {
            Some(SqlItem::Text(first)) => first.insert_str(0, &text),
            _ => self.items.insert(0, SqlItem::Text(text)),
        }
        self
    }

    // ==================== Variables and raw values ====================

    /// Bind a value and append its placeholder.
    pub fn add_variable(&mut self, value: impl Into<SqlValue>) -> &mut Self {
        self.push_variable(None, value.into())
    }

    /// Bind a named value and append its placeholder (`:$n$name`).
    pub fn add_named_variable(&mut self, name: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.push_variable(sanitize_name(name), value.into())
    }

    fn push_variable(&mut self, name: Option<String>, value: SqlValue) -> &mut Self {
        if Edge::needs_space(self.last_edge(), Edge::Word) {
            self.push(" ");
        }
        self.var_count += 1;
        self.items.push(SqlItem::Variable(Variable {
            index: self.var_count,
            name,
            value,
        }));
        self
    }

    /// Append a comma-separated list of placeholders.
    ///
    /// An empty list appends `NULL` so `IN (NULL)` stays valid SQL.
    pub fn add_variables<T: Into<SqlValue>>(
        &mut self,
        values: impl IntoIterator<Item = T>,
    ) -> &mut Self {
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else {
            return self.append("NULL");
        };
        self.add_variable(first);
        for v in iter {
            self.push(", ");
            self.add_variable(v);
        }
        self
    }

    /// Append a dialect-raw expression, rendered verbatim in every mode.
    pub fn add_raw(&mut self, expr: &str) -> &mut Self {
        if expr.is_empty() {
            return self;
        }
        if Edge::needs_space(self.last_edge(), Edge::Word) {
            self.push(" ");
        }
        self.items.push(SqlItem::Raw(expr.to_string()));
        self
    }

    // ==================== Truncation markers ====================

    /// Mark the start of the `row`-th repeated row fragment.
    pub fn mark_row(&mut self, row: usize) -> &mut Self {
        self.items.push(SqlItem::Omit(OmitMark::Row(row)));
        self
    }

    /// Close the current run of row fragments.
    pub fn mark_rows_end(&mut self) -> &mut Self {
        self.items.push(SqlItem::Omit(OmitMark::End));
        self
    }

    // ==================== Splicing ====================

    /// Append another buffer, consuming it; its variables are renumbered after ours.
    pub fn append_buffer(&mut self, mut other: SqlBuffer) -> &mut Self {
        if other.items.is_empty() {
            return self;
        }
        other.shift_variables(self.var_count);
        if Edge::needs_space(self.last_edge(), other.first_edge()) {
            self.push(" ");
        }
        self.var_count += other.var_count;
        for item in other.items {
            self.push_item(item);
        }
        self
    }

    /// Append a copy of another buffer.
    pub fn append_buffer_ref(&mut self, other: &SqlBuffer) -> &mut Self {
        self.append_buffer(other.clone())
    }

    /// Prepend another buffer, consuming it; our variables are renumbered after its.
    pub fn prepend_buffer(&mut self, mut other: SqlBuffer) -> &mut Self {
        if other.items.is_empty() {
            return self;
        }
        self.shift_variables(other.var_count);
        if Edge::needs_space(other.last_edge(), self.first_edge()) {
            other.push(" ");
        }
        other.var_count += self.var_count;
        for item in std::mem::take(&mut self.items) {
            other.push_item(item);
        }
        *self = other;
        self
    }

    /// Append `other` re-indented to this buffer's current indentation.
    pub fn append_indented(&mut self, mut other: SqlBuffer) -> &mut Self {
        let levels = self.current_indent();
        if levels > 0 {
            other.indent(levels, false);
        }
        self.append_buffer(other)
    }

    fn push_item(&mut self, item: SqlItem) {
        match item {
            SqlItem::Text(s) => {
                self.push(&s);
            }
            other => self.items.push(other),
        }
    }

    fn shift_variables(&mut self, offset: usize) {
        if offset == 0 {
            return;
        }
        for item in &mut self.items {
            if let SqlItem::Variable(v) = item {
                v.index += offset;
            }
        }
    }

    // ==================== Indentation ====================

    /// Insert `levels` tabs after every newline, and before the first line when
    /// `include_first_line` is set.
    pub fn indent(&mut self, levels: usize, include_first_line: bool) -> &mut Self {
        if levels == 0 {
            return self;
        }
        let tabs = "\t".repeat(levels);
        let replacement = format!("\n{tabs}");
        for item in &mut self.items {
            if let SqlItem::Text(s) = item {
                if s.contains('\n') {
                    *s = s.replace('\n', &replacement);
                }
            }
        }
        if include_first_line && !self.is_empty() {
            match self.items.first_mut() {
                Some(SqlItem::Text(first)) => first.insert_str(0, &tabs),
                _ => self.items.insert(0, SqlItem::Text(tabs)),
            }
        }
        self
    }

    /// Indentation (in tabs) of the last line.
    ///
    /// Scans backward to the nearest newline; items without text (variables,
    /// markers, empty strings) are skipped rather than treated as "no indentation".
    pub fn current_indent(&self) -> usize {
        for (i, item) in self.items.iter().enumerate().rev() {
            if let SqlItem::Text(s) = item {
                if let Some(pos) = s.rfind('\n') {
                    return self.count_tabs_from(i, pos + 1);
                }
            }
        }
        self.count_tabs_from(0, 0)
    }

    fn count_tabs_from(&self, item_index: usize, offset: usize) -> usize {
        let mut count = 0;
        let mut offset = offset;
        for item in &self.items[item_index..] {
            match item {
                SqlItem::Text(s) => {
                    let rest = &s[offset..];
                    let tabs = rest.chars().take_while(|c| *c == '\t').count();
                    count += tabs;
                    if tabs < rest.len() {
                        return count;
                    }
                }
                SqlItem::Omit(_) => {}
                _ => return count,
            }
            offset = 0;
        }
        count
    }

    // ==================== Edges ====================

    pub(crate) fn last_edge(&self) -> Edge {
        for item in self.items.iter().rev() {
            match item {
                SqlItem::Text(s) => {
                    if let Some(c) = s.chars().last() {
                        return Edge::of(c);
                    }
                }
                SqlItem::Variable(_) | SqlItem::Raw(_) => return Edge::Word,
                SqlItem::Omit(_) => {}
            }
        }
        Edge::None
    }

    pub(crate) fn first_edge(&self) -> Edge {
        for item in &self.items {
            match item {
                SqlItem::Text(s) => {
                    if let Some(c) = s.chars().next() {
                        return Edge::of(c);
                    }
                }
                SqlItem::Variable(_) | SqlItem::Raw(_) => return Edge::Word,
                SqlItem::Omit(_) => {}
            }
        }
        Edge::None
    }
}

impl From<&str> for SqlBuffer {
    fn from(text: &str) -> Self {
        SqlBuffer::of(text)
    }
}

impl From<String> for SqlBuffer {
    fn from(text: String) -> Self {
        SqlBuffer::of(text)
    }
}
