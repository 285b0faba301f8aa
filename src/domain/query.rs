//! Query text plus bound parameters.
//!
//! A [`Query`] doubles as the *request signature* used by the result
//! cache: two queries are equal only if their text is byte-for-byte equal
//! and their parameters are equal position by position. No normalization
//! (whitespace, case, parameter coercion) is applied.

use std::fmt;

use super::value::Value;

/// A statement ready to run against a store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    text: String,
    params: Vec<Value>,
}

impl Query {
    /// Creates a query with no parameters.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            params: Vec::new(),
        }
    }

    /// Appends a positional parameter.
    #[must_use]
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Statement text as written by the caller.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Bound parameters in placeholder order.
    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Returns a copy restricted to one window of the result set.
    ///
    /// Appends `LIMIT ? OFFSET ?` on its own line, after any trailing line
    /// comment in the caller's text, and binds `limit` and `offset` after
    /// the caller's own parameters.
    #[must_use]
    pub fn windowed(&self, limit: u64, offset: u64) -> Self {
        let text = format!("{}\nLIMIT ? OFFSET ?", self.text.trim_end().trim_end_matches(';'));
        let mut params = self.params.clone();
        params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        params.push(Value::Integer(i64::try_from(offset).unwrap_or(i64::MAX)));
        Self { text, params }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)?;
        if !self.params.is_empty() {
            f.write_str(" [")?;
            for (i, p) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{p}")?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_order_sensitive() {
        let a = Query::new("SELECT * FROM t WHERE a = ? AND b = ?").bind(1).bind(2);
        let b = Query::new("SELECT * FROM t WHERE a = ? AND b = ?").bind(2).bind(1);
        assert_ne!(a, b);
    }

    #[test]
    fn signature_text_is_not_normalized() {
        assert_ne!(Query::new("SELECT 1"), Query::new("select 1"));
        assert_ne!(Query::new("SELECT 1"), Query::new("SELECT  1"));
        assert_eq!(Query::new("SELECT 1"), Query::from("SELECT 1"));
    }

    #[test]
    fn windowed_appends_bound_limit_and_offset() {
        let q = Query::new("SELECT * FROM user_data WHERE age > ?;").bind(25);
        let w = q.windowed(10, 20);
        assert_eq!(w.text(), "SELECT * FROM user_data WHERE age > ?\nLIMIT ? OFFSET ?");
        assert_eq!(
            w.params(),
            &[Value::Integer(25), Value::Integer(10), Value::Integer(20)]
        );
        // The original query is untouched.
        assert_eq!(q.params().len(), 1);
    }

    #[test]
    fn windowed_survives_trailing_line_comment() {
        let w = Query::new("SELECT * FROM user_data -- all users").windowed(2, 0);
        assert_eq!(w.text(), "SELECT * FROM user_data -- all users\nLIMIT ? OFFSET ?");
    }

    #[test]
    fn display_lists_params() {
        let q = Query::new("SELECT * FROM users WHERE id = ?").bind(7).bind("x");
        assert_eq!(q.to_string(), "SELECT * FROM users WHERE id = ? [7, 'x']");
    }
}
