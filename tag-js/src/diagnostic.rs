//! Non-fatal findings produced while tagging.
//!
//! Codes (prefix `TG`) are stable:
//! - `TG0001`: an identifier sits in a position the classifier has no rule for.
//! - `TG0002`: the parser attached a recovered error to the tree (only
//!   reported in verbose mode).

use crate::ast::Loc;
use serde::Serialize;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

pub const UNCLASSIFIED_IDENTIFIER: &str = "TG0001";
pub const PARSE_ANNOTATION: &str = "TG0002";

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
  Warning,
}

impl Severity {
  pub const fn as_str(&self) -> &'static str {
    match self {
      Severity::Warning => "warning",
    }
  }
}

impl Display for Severity {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Diagnostic {
  pub code: &'static str,
  pub severity: Severity,
  pub message: String,
  pub path: String,
  /// Already shifted by the caller's line/column offset.
  pub loc: Loc,
  pub notes: Vec<String>,
}

impl Diagnostic {
  pub fn warning(code: &'static str, message: impl Into<String>, path: impl Into<String>, loc: Loc) -> Self {
    Self {
      code,
      severity: Severity::Warning,
      message: message.into(),
      path: path.into(),
      loc,
      notes: Vec::new(),
    }
  }

  pub fn with_note(mut self, note: impl Into<String>) -> Self {
    self.notes.push(note.into());
    self
  }
}

/// ```text
/// warning[TG0001]: no classification rule for `x`
///  --> app.js:3:8
///   = note: Program.body[0] > ExpressionStatement.expression > AwaitExpression.argument
/// ```
impl Display for Diagnostic {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{}[{}]: {}", self.severity, self.code, self.message)?;
    write!(f, "\n --> {}:{}:{}", self.path, self.loc.line, self.loc.column)?;
    for note in &self.notes {
      write!(f, "\n  = note: {note}")?;
    }
    Ok(())
  }
}
