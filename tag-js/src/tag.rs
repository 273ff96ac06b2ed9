use serde::Serialize;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TagKind {
  Definition,
  Reference,
}

impl TagKind {
  pub const fn letter(self) -> char {
    match self {
      TagKind::Definition => 'D',
      TagKind::Reference => 'R',
    }
  }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Tag {
  pub kind: TagKind,
  pub name: String,
  pub path: String,
  /// 1-based.
  pub line: u32,
  /// 0-based, in UTF-16 code units.
  pub column: u32,
  pub source_line: String,
}

/// `KIND,NAME,PATH,LINE:COLUMN,SOURCE_LINE_TEXT`, e.g.
/// `D,foo,src/a.js,1:6,const foo = 1;`.
impl Display for Tag {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{},{},{},{}:{},{}",
      self.kind.letter(),
      self.name,
      self.path,
      self.line,
      self.column,
      self.source_line
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_text_form() {
    let tag = Tag {
      kind: TagKind::Reference,
      name: "querySelector".into(),
      path: "app.js".into(),
      line: 3,
      column: 9,
      source_line: "document.querySelector(\"#a, #b\");".into(),
    };
    assert_eq!(
      tag.to_string(),
      "R,querySelector,app.js,3:9,document.querySelector(\"#a, #b\");"
    );
  }
}
