#![allow(dead_code)]

use serde_json::json;
use serde_json::Map;
use serde_json::Value;
use std::cell::RefCell;
use tag_js::ast::SyntaxTree;
use tag_js::parser::EstreeParser;
use tag_js::parser::ParseError;
use tag_js::parser::SourceType;
use tag_js::TagKind;
use tag_js::TagOptions;
use tag_js::TagReport;
use tag_js::Tagger;

/// Builds ESTree documents for a fixed source text, locating nodes by the
/// text they cover so positions never have to be counted by hand.
pub struct Fixture {
  pub source: &'static str,
}

fn is_ident_char(c: char) -> bool {
  c.is_alphanumeric() || c == '_' || c == '$'
}

impl Fixture {
  pub fn new(source: &'static str) -> Fixture {
    Fixture { source }
  }

  /// Line and UTF-16 column of a byte offset, as acorn reports them.
  fn loc_of(&self, byte: usize) -> (u32, u32) {
    let before = &self.source[..byte];
    let line = before.matches('\n').count() as u32 + 1;
    let column = match before.rfind('\n') {
      Some(i) => before[i + 1..].encode_utf16().count(),
      None => before.encode_utf16().count(),
    } as u32;
    (line, column)
  }

  fn find(&self, needle: &str, nth: usize, whole_word: bool) -> usize {
    self
      .source
      .match_indices(needle)
      .map(|(i, _)| i)
      .filter(|&i| {
        if !whole_word {
          return true;
        }
        let before = self.source[..i].chars().next_back();
        let after = self.source[i + needle.len()..].chars().next();
        !before.map_or(false, is_ident_char) && !after.map_or(false, is_ident_char)
      })
      .nth(nth)
      .unwrap_or_else(|| panic!("occurrence {nth} of {needle:?} not found in {:?}", self.source))
  }

  fn loc_json(&self, start: usize, len: usize) -> Value {
    let (line, column) = self.loc_of(start);
    let (end_line, end_column) = self.loc_of(start + len);
    json!({
      "start": { "line": line, "column": column },
      "end": { "line": end_line, "column": end_column },
    })
  }

  /// Position of the `nth` whole-word occurrence of `needle`.
  pub fn pos(&self, needle: &str, nth: usize) -> (u32, u32) {
    self.loc_of(self.find(needle, nth, true))
  }

  /// A node of type `kind` covering the `nth` occurrence of `text`.
  pub fn node(&self, kind: &str, text: &str, nth: usize, fields: Value) -> Value {
    let start = self.find(text, nth, false);
    let mut object = Map::new();
    object.insert("type".into(), kind.into());
    object.insert("loc".into(), self.loc_json(start, text.len()));
    if let Value::Object(fields) = fields {
      object.extend(fields);
    }
    Value::Object(object)
  }

  pub fn ident(&self, name: &str, nth: usize) -> Value {
    let start = self.find(name, nth, true);
    json!({ "type": "Identifier", "name": name, "loc": self.loc_json(start, name.len()) })
  }

  /// A string literal given by its raw text, quotes included.
  pub fn string(&self, raw: &str, nth: usize) -> Value {
    let start = self.find(raw, nth, false);
    let value = &raw[1..raw.len() - 1];
    json!({ "type": "Literal", "value": value, "raw": raw, "loc": self.loc_json(start, raw.len()) })
  }

  pub fn number(&self, raw: &str, nth: usize) -> Value {
    let start = self.find(raw, nth, true);
    let value: f64 = raw.parse().expect("numeric literal");
    json!({ "type": "Literal", "value": value, "raw": raw, "loc": self.loc_json(start, raw.len()) })
  }

  pub fn stmt(&self, text: &str, nth: usize, expression: Value) -> Value {
    self.node("ExpressionStatement", text, nth, json!({ "expression": expression }))
  }

  pub fn program(&self, body: Vec<Value>) -> Value {
    json!({
      "type": "Program",
      "sourceType": "script",
      "loc": self.loc_json(0, self.source.len()),
      "body": body,
    })
  }

  pub fn tag(&self, body: Vec<Value>) -> TagReport {
    self.tag_with(body, TagOptions::default())
  }

  pub fn tag_with(&self, body: Vec<Value>, options: TagOptions) -> TagReport {
    let tree = SyntaxTree::from_estree(&self.program(body)).expect("well-formed fixture");
    Tagger::with_parser(FixtureParser::default(), options)
      .tag_tree(tree, self.source, "fixture.js")
      .expect("tagging succeeds")
  }
}

/// `(kind letter, name, line, column)` for each tag, in stream order.
pub fn summary(report: &TagReport) -> Vec<(char, String, u32, u32)> {
  report
    .tags
    .iter()
    .map(|t| (t.kind.letter(), t.name.clone(), t.line, t.column))
    .collect()
}

/// `(kind letter, name)` for each tag, in stream order.
pub fn names(report: &TagReport) -> Vec<(char, &str)> {
  report
    .tags
    .iter()
    .map(|t| (t.kind.letter(), t.name.as_str()))
    .collect()
}

pub fn kinds_of<'a>(report: &'a TagReport, name: &str) -> Vec<TagKind> {
  report
    .tags
    .iter()
    .filter(|t| t.name == name)
    .map(|t| t.kind)
    .collect()
}

/// `a+a+...+a` with `terms` operands.
pub fn operator_chain_source(terms: u32) -> String {
  vec!["a"; terms as usize].join("+")
}

/// The ESTree JSON acorn produces for [`operator_chain_source`], written out
/// as text: a left-nested `BinaryExpression` roughly `terms` levels deep.
pub fn operator_chain_estree(terms: u32) -> String {
  let loc = |start: u32, end: u32| {
    format!(r#"{{"start":{{"line":1,"column":{start}}},"end":{{"line":1,"column":{end}}}}}"#)
  };
  let ident = |column: u32| format!(r#"{{"type":"Identifier","name":"a","loc":{}}}"#, loc(column, column + 1));
  let end = 2 * terms - 1;
  let mut expression = ident(0);
  for i in 1..terms {
    expression = format!(
      r#"{{"type":"BinaryExpression","operator":"+","left":{expression},"right":{},"loc":{}}}"#,
      ident(2 * i),
      loc(0, 2 * i + 1),
    );
  }
  format!(
    r#"{{"type":"Program","sourceType":"script","loc":{},"body":[{{"type":"ExpressionStatement","expression":{expression},"loc":{}}}]}}"#,
    loc(0, end),
    loc(0, end),
  )
}

/// Replays canned parser answers and records which grammars were requested.
#[derive(Default)]
pub struct FixtureParser {
  pub script: Option<Result<Value, ParseError>>,
  pub module: Option<Result<Value, ParseError>>,
  pub calls: RefCell<Vec<SourceType>>,
}

impl EstreeParser for FixtureParser {
  fn parse(&self, _source: &str, source_type: SourceType) -> Result<Value, ParseError> {
    self.calls.borrow_mut().push(source_type);
    let answer = match source_type {
      SourceType::Script => &self.script,
      SourceType::Module => &self.module,
    };
    answer
      .clone()
      .unwrap_or_else(|| Err(ParseError::Runner("no canned answer".into())))
  }
}

pub fn syntax_error(line: u32, message: &str) -> ParseError {
  ParseError::Syntax {
    line: Some(line),
    column: Some(0),
    message: message.into(),
  }
}
