use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A source file the external parser rejected under every grammar it was
/// tried with.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParseFailure {
  pub path: String,
  pub line: Option<u32>,
  pub description: String,
}

impl Display for ParseFailure {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self.line {
      Some(line) => write!(f, "{}:{}: {}", self.path, line, self.description),
      None => write!(f, "{}: {}", self.path, self.description),
    }
  }
}

#[derive(Debug, Error)]
pub enum TagError {
  #[error("source text is empty")]
  EmptySource,
  #[error("path is empty")]
  EmptyPath,
  #[error("parse failed: {0}")]
  Parse(ParseFailure),
  /// The parser could not be run at all (e.g. node is missing).
  #[error("parser unavailable: {0}")]
  Parser(String),
  #[error("malformed syntax tree: {0}")]
  MalformedTree(String),
  #[error("failed to read {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

pub type TagResult<T> = Result<T, TagError>;
