mod common;

use common::names;
use common::operator_chain_estree;
use common::operator_chain_source;
use common::syntax_error;
use common::Fixture;
use common::FixtureParser;
use serde_json::json;
use serde_json::Value;
use std::io;
use std::sync::Arc;
use std::sync::Mutex;
use tag_js::ast::Loc;
use tag_js::diagnostic::PARSE_ANNOTATION;
use tag_js::parser::decode_json;
use tag_js::parser::ParseError;
use tag_js::parser::SourceType;
use tag_js::TagError;
use tag_js::TagKind;
use tag_js::TagOptions;
use tag_js::Tagger;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;

const SOURCE: &str = "let x = y;";

fn program() -> Value {
  let f = Fixture::new(SOURCE);
  f.program(vec![f.node("VariableDeclaration", SOURCE, 0, json!({
    "kind": "let",
    "declarations": [f.node("VariableDeclarator", "x = y", 0, json!({
      "id": f.ident("x", 0),
      "init": f.ident("y", 0),
    }))],
  }))])
}

fn tagger(parser: &FixtureParser, options: TagOptions) -> Tagger<&FixtureParser> {
  Tagger::with_parser(parser, options)
}

#[test]
fn empty_source_is_rejected_before_parsing() {
  let parser = FixtureParser::default();
  let err = tagger(&parser, TagOptions::default()).tag("", "a.js").unwrap_err();
  assert!(matches!(err, TagError::EmptySource));
  assert!(parser.calls.borrow().is_empty());
}

#[test]
fn empty_path_is_rejected_before_parsing() {
  let parser = FixtureParser::default();
  let err = tagger(&parser, TagOptions::default()).tag(SOURCE, "").unwrap_err();
  assert!(matches!(err, TagError::EmptyPath));
  assert!(parser.calls.borrow().is_empty());
}

#[test]
fn script_parse_is_tried_first() {
  let parser = FixtureParser {
    script: Some(Ok(program())),
    ..FixtureParser::default()
  };
  let report = tagger(&parser, TagOptions::default()).tag(SOURCE, "a.js").unwrap();
  assert_eq!(names(&report), vec![('D', "x"), ('R', "y")]);
  assert_eq!(*parser.calls.borrow(), vec![SourceType::Script]);
}

#[test]
fn syntax_error_as_script_retries_as_module() {
  let parser = FixtureParser {
    script: Some(Err(syntax_error(1, "'import' and 'export' may appear only with 'sourceType: module'"))),
    module: Some(Ok(program())),
    ..FixtureParser::default()
  };
  let report = tagger(&parser, TagOptions::default()).tag(SOURCE, "a.js").unwrap();
  assert_eq!(report.tags.len(), 2);
  assert_eq!(*parser.calls.borrow(), vec![SourceType::Script, SourceType::Module]);
}

#[test]
fn failing_both_grammars_reports_the_module_error() {
  let parser = FixtureParser {
    script: Some(Err(syntax_error(1, "script says no"))),
    module: Some(Err(syntax_error(3, "Unexpected token (3:4)"))),
    ..FixtureParser::default()
  };
  let err = tagger(&parser, TagOptions::default()).tag(SOURCE, "src/bad.js").unwrap_err();
  let failure = match err {
    TagError::Parse(failure) => failure,
    other => panic!("expected a parse failure, got {other:?}"),
  };
  assert_eq!(failure.path, "src/bad.js");
  assert_eq!(failure.line, Some(3));
  assert_eq!(failure.description, "Unexpected token (3:4)");
  assert_eq!(failure.to_string(), "src/bad.js:3: Unexpected token (3:4)");
}

#[test]
fn runner_failure_is_not_retried() {
  let parser = FixtureParser {
    script: Some(Err(ParseError::Runner("node: not found".into()))),
    module: Some(Ok(program())),
    ..FixtureParser::default()
  };
  let err = tagger(&parser, TagOptions::default()).tag(SOURCE, "a.js").unwrap_err();
  assert!(matches!(err, TagError::Parser(ref message) if message == "node: not found"));
  assert_eq!(*parser.calls.borrow(), vec![SourceType::Script]);
}

#[test]
fn malformed_parser_output_is_an_error() {
  let parser = FixtureParser {
    script: Some(Ok(json!({ "type": "Program", "body": [] }))),
    ..FixtureParser::default()
  };
  let err = tagger(&parser, TagOptions::default()).tag(SOURCE, "a.js").unwrap_err();
  assert!(matches!(err, TagError::MalformedTree(_)));
}

#[test]
fn recovered_errors_are_reported_only_when_verbose() {
  let mut tolerant = program();
  tolerant["errors"] = json!([{ "lineNumber": 1, "column": 9, "description": "Missing semicolon" }]);
  let parser = FixtureParser {
    script: Some(Ok(tolerant)),
    ..FixtureParser::default()
  };

  let quiet = tagger(&parser, TagOptions::default()).tag(SOURCE, "a.js").unwrap();
  assert!(quiet.diagnostics.is_empty());

  let options = TagOptions::default().with_verbose(true).with_offsets(4, 0);
  let verbose = tagger(&parser, options).tag(SOURCE, "a.js").unwrap();
  assert_eq!(verbose.tags, quiet.tags.iter().cloned().map(|mut t| {
    t.line += 4;
    t
  }).collect::<Vec<_>>());
  assert_eq!(verbose.diagnostics.len(), 1);
  assert_eq!(verbose.diagnostics[0].code, PARSE_ANNOTATION);
  assert_eq!(verbose.diagnostics[0].loc, Loc::new(5, 9));
  assert_eq!(verbose.diagnostics[0].message, "Missing semicolon");
}

#[test]
fn deeply_nested_parser_output_is_tagged() {
  let estree = operator_chain_estree(500);
  assert!(serde_json::from_str::<Value>(&estree).is_err());
  let parser = FixtureParser {
    script: Some(Ok(decode_json(estree.as_bytes()).unwrap())),
    ..FixtureParser::default()
  };
  let source = operator_chain_source(500);
  let report = tagger(&parser, TagOptions::default()).tag(&source, "deep.js").unwrap();
  assert_eq!(report.tags.len(), 500);
  assert!(report
    .tags
    .iter()
    .all(|t| t.kind == TagKind::Reference && t.name == "a"));
  let columns: Vec<_> = report.tags.iter().map(|t| t.column).collect();
  assert_eq!(columns, (0..500).map(|i| 2 * i).collect::<Vec<_>>());
}

#[test]
fn missing_file_is_an_io_error() {
  let dir = std::env::temp_dir().join("tag-js-missing-file-test");
  let err = Tagger::with_parser(FixtureParser::default(), TagOptions::default())
    .tag_file(dir.join("nope.js"))
    .unwrap_err();
  let (path, source) = match err {
    TagError::Io { path, source } => (path, source),
    other => panic!("expected an io error, got {other:?}"),
  };
  assert!(path.ends_with("nope.js"));
  assert_eq!(source.kind(), io::ErrorKind::NotFound);
}

#[derive(Clone, Default)]
struct SharedWriter {
  buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedWriter {
  fn into_inner(self) -> Vec<u8> {
    match Arc::try_unwrap(self.buffer) {
      Ok(buffer) => buffer.into_inner().unwrap(),
      Err(arc) => arc.lock().unwrap().clone(),
    }
  }
}

struct SharedWriterGuard<'a> {
  buffer: &'a Arc<Mutex<Vec<u8>>>,
}

impl<'a> io::Write for SharedWriterGuard<'a> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.buffer.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

impl<'a> MakeWriter<'a> for SharedWriter {
  type Writer = SharedWriterGuard<'a>;

  fn make_writer(&'a self) -> Self::Writer {
    SharedWriterGuard {
      buffer: &self.buffer,
    }
  }
}

#[test]
fn tracing_emits_emit_span_and_gap_warnings() {
  let writer = SharedWriter::default();
  let subscriber = tracing_subscriber::fmt()
    .with_span_events(FmtSpan::CLOSE)
    .with_max_level(tracing::Level::DEBUG)
    .with_ansi(false)
    .with_writer(writer.clone())
    .finish();
  let _guard = tracing::subscriber::set_default(subscriber);

  let f = Fixture::new("await p;");
  f.tag(vec![f.stmt(f.source, 0, f.node("AwaitExpression", "await p", 0, json!({
    "argument": f.ident("p", 0),
  })))]);

  drop(_guard);
  let output = String::from_utf8(writer.into_inner()).unwrap();
  assert!(
    output.contains("tag_js.emit"),
    "expected emit span output, got: {output}"
  );
  assert!(
    output.contains("no classification rule for `p`"),
    "expected an unclassified warning, got: {output}"
  );
  assert!(output.contains("AwaitExpression.argument"));
}
