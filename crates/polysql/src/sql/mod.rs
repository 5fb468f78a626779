//! Structured SQL buffer.
//!
//! [`SqlBuffer`] stores SQL text, bound variables, raw dialect expressions and
//! truncation markers as separate items, so fragments can be built out of order,
//! spliced, re-indented and rendered either for execution or for logs.
//!
//! # Example
//!
//! ```ignore
//! use polysql::SqlBuffer;
//!
//! let mut q = SqlBuffer::of("SELECT ID, USER_NAME FROM SYS_USER WHERE");
//! q.append("DEPT_CODE=").add_named_variable("deptCode", "D01");
//! if let Some(state) = state {
//!     q.append("AND STATE=").add_variable(state);
//! }
//!
//! let named = q.render_named();      // ... WHERE DEPT_CODE=:$1$deptCode AND STATE=:$2
//! let logged = q.render_literal(&*dialect);   // ... WHERE DEPT_CODE='D01' AND STATE=1
//! ```

mod buffer;
mod parts;
mod render;


pub use buffer::SqlBuffer;
pub use parts::{OmitMark, SqlItem, Variable};
pub use render::{NamedSql, OmitStrategy, ParamStyle, PositionalSql};

/// First word of `sql`, skipping whitespace, comments and opening parentheses.
/// Empty when the text ends inside a comment or holds no word.
fn leading_keyword(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        let skipped = if rest.starts_with("--") {
            rest.find('\n').map(|end| end + 1)
        } else if rest.starts_with("/*") {
            rest.find("*/").map(|end| end + 2)
        } else {
            break;
        };
        match skipped {
            Some(n) => rest = &rest[n..],
            None => return "",
        }
    }
    let len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    &rest[..len]
}

/// Kind of statement, detected from the leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl StatementKind {
    pub fn from_sql(sql: &str) -> Self {
        let word = leading_keyword(sql).to_ascii_uppercase();
        match word.as_str() {
            "SELECT" | "WITH" => StatementKind::Select,
            "INSERT" => StatementKind::Insert,
            "UPDATE" => StatementKind::Update,
            "DELETE" => StatementKind::Delete,
            _ => StatementKind::Other,
        }
    }
}
