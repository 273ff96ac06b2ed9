//! ctags-style tagging for JavaScript.
//!
//! Every identifier occurrence in a script is classified as a definition, a
//! reference, or deliberately ignored, producing an ordered stream of
//! [`Tag`]s suitable for editor navigation or symbol indexing.
//!
//! Parsing is delegated to an external ESTree producer (see [`parser`]); the
//! tagger itself works on the resulting tree:
//!
//! ```
//! use serde_json::json;
//! use tag_js::{ast::SyntaxTree, TagKind, TagOptions, Tagger};
//!
//! // `let x;` as an ESTree parser with `locations: true` reports it.
//! let at = |line: u32, column: u32, len: u32| json!({
//!   "start": { "line": line, "column": column },
//!   "end": { "line": line, "column": column + len },
//! });
//! let program = json!({
//!   "type": "Program", "loc": at(1, 0, 6),
//!   "body": [{
//!     "type": "VariableDeclaration", "kind": "let", "loc": at(1, 0, 6),
//!     "declarations": [{
//!       "type": "VariableDeclarator", "loc": at(1, 4, 1), "init": null,
//!       "id": { "type": "Identifier", "name": "x", "loc": at(1, 4, 1) },
//!     }],
//!   }],
//! });
//!
//! let tree = SyntaxTree::from_estree(&program).unwrap();
//! let report = Tagger::new(TagOptions::default()).tag_tree(tree, "let x;", "a.js").unwrap();
//! assert_eq!(report.tags.len(), 1);
//! assert_eq!(report.tags[0].kind, TagKind::Definition);
//! assert_eq!(report.tags[0].to_string(), "D,x,a.js,1:4,let x;");
//! ```

use ast::SyntaxTree;
use decorate::DecoratedTree;
use parser::EstreeParser;
use parser::NodeParser;
use parser::ParseError;
use parser::SourceType;
use std::fs;
use std::path::Path;
use tracing::debug;

pub mod ast;
pub mod classify;
pub mod decorate;
pub mod diagnostic;
pub mod emit;
pub mod error;
pub mod literal;
pub mod parser;
pub mod source;
pub mod tag;

pub use diagnostic::Diagnostic;
pub use emit::TagReport;
pub use error::ParseFailure;
pub use error::TagError;
pub use error::TagResult;
pub use tag::Tag;
pub use tag::TagKind;

/// Options controlling a tagging call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagOptions {
  /// Added to every reported line, for sources cut out of a larger document
  /// (e.g. a `<script>` block).
  pub line_offset: u32,
  /// Added to every reported column.
  pub column_offset: u32,
  /// Report errors a tolerant parser recovered from.
  pub verbose: bool,
  /// Report `const foo = require("./foo")` bindings as references.
  pub require_policy: bool,
}

impl Default for TagOptions {
  fn default() -> Self {
    Self {
      line_offset: 0,
      column_offset: 0,
      verbose: false,
      require_policy: true,
    }
  }
}

impl TagOptions {
  pub fn with_offsets(mut self, line_offset: u32, column_offset: u32) -> Self {
    self.line_offset = line_offset;
    self.column_offset = column_offset;
    self
  }

  pub fn with_verbose(mut self, verbose: bool) -> Self {
    self.verbose = verbose;
    self
  }

  pub fn with_require_policy(mut self, require_policy: bool) -> Self {
    self.require_policy = require_policy;
    self
  }
}

pub struct Tagger<P = NodeParser> {
  parser: P,
  options: TagOptions,
}

impl Tagger<NodeParser> {
  pub fn new(options: TagOptions) -> Self {
    Tagger::with_parser(NodeParser::default(), options)
  }
}

impl<P: EstreeParser> Tagger<P> {
  pub fn with_parser(parser: P, options: TagOptions) -> Self {
    Tagger { parser, options }
  }

  /// Parses and tags one source text. Scripts are tried first; a syntax error
  /// triggers a retry as a module.
  pub fn tag(&self, source: &str, path: &str) -> TagResult<TagReport> {
    check_preconditions(source, path)?;
    let program = match self.parser.parse(source, SourceType::Script) {
      Ok(program) => program,
      Err(ParseError::Syntax { message, .. }) => {
        debug!(path, %message, "script parse failed, retrying as module");
        self
          .parser
          .parse(source, SourceType::Module)
          .map_err(|err| parse_failure(path, err))?
      }
      Err(err) => return Err(parse_failure(path, err)),
    };
    let tree = SyntaxTree::from_estree(&program)?;
    self.tag_tree(tree, source, path)
  }

  pub fn tag_file(&self, path: impl AsRef<Path>) -> TagResult<TagReport> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| TagError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    self.tag(&source, &path.to_string_lossy())
  }

  /// Tags an already parsed tree. `source` must be the text it was parsed
  /// from.
  pub fn tag_tree(&self, tree: SyntaxTree, source: &str, path: &str) -> TagResult<TagReport> {
    check_preconditions(source, path)?;
    let tree = DecoratedTree::new(tree);
    Ok(emit::emit_tags(&tree, source, path, &self.options))
  }
}

fn check_preconditions(source: &str, path: &str) -> TagResult<()> {
  if source.is_empty() {
    return Err(TagError::EmptySource);
  }
  if path.is_empty() {
    return Err(TagError::EmptyPath);
  }
  Ok(())
}

fn parse_failure(path: &str, err: ParseError) -> TagError {
  match err {
    ParseError::Syntax { line, message, .. } => TagError::Parse(ParseFailure {
      path: path.to_string(),
      line,
      description: message,
    }),
    ParseError::Runner(message) => TagError::Parser(message),
  }
}

/// Tags `source` with the default node-backed parser, shifting every location
/// by the given offsets.
pub fn tag(source: &str, path: &str, line_offset: u32, column_offset: u32) -> TagResult<Vec<Tag>> {
  let options = TagOptions::default().with_offsets(line_offset, column_offset);
  Ok(Tagger::new(options).tag(source, path)?.tags)
}

pub fn tag_file(path: impl AsRef<Path>) -> TagResult<Vec<Tag>> {
  Ok(Tagger::new(TagOptions::default()).tag_file(path)?.tags)
}
