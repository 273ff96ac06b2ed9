use crate::ast::Loc;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::classify::Classifier;
use crate::classify::RequireBinding;
use crate::classify::Verdict;
use crate::decorate::DecoratedTree;
use crate::diagnostic::Diagnostic;
use crate::diagnostic::PARSE_ANNOTATION;
use crate::diagnostic::UNCLASSIFIED_IDENTIFIER;
use crate::literal::scan_selector_argument;
use crate::source::SourceText;
use crate::tag::Tag;
use crate::tag::TagKind;
use crate::TagOptions;
use serde::Serialize;
use tracing::debug_span;
use tracing::warn;

/// Everything one tagging call produces.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TagReport {
  /// In document order.
  pub tags: Vec<Tag>,
  pub diagnostics: Vec<Diagnostic>,
}

struct Emitter<'a> {
  classifier: Classifier<'a>,
  source: SourceText<'a>,
  path: &'a str,
  options: &'a TagOptions,
  report: TagReport,
}

impl<'a> Emitter<'a> {
  fn shift(&self, loc: Loc) -> Loc {
    Loc::new(
      loc.line + self.options.line_offset,
      loc.column + self.options.column_offset,
    )
  }

  fn push_tag(&mut self, kind: TagKind, name: &str, loc: Loc) {
    let source_line = self.source.line(loc.line).unwrap_or_default().to_string();
    let Loc { line, column } = self.shift(loc);
    self.report.tags.push(Tag {
      kind,
      name: name.to_string(),
      path: self.path.to_string(),
      line,
      column,
      source_line,
    });
  }

  fn visit_identifier(&mut self, node: NodeId) {
    let ast = self.classifier.tree().tree();
    let data = ast.node(node);
    let name = data.name.as_deref().unwrap_or_default();
    let loc = data.span.start;

    let verdict = self.classifier.classify(node);
    match verdict {
      Verdict::Definition => self.push_tag(TagKind::Definition, name, loc),
      Verdict::Reference => self.push_tag(TagKind::Reference, name, loc),
      Verdict::Ignore | Verdict::Unknown => {}
    };

    for found in scan_selector_argument(&self.classifier, &self.source, node) {
      self.push_tag(TagKind::Reference, &found.name, found.loc);
    }

    if verdict == Verdict::Unknown {
      let path = self.classifier.tree().structural_path(node);
      let at = self.shift(loc);
      warn!(
        file = self.path,
        line = at.line,
        column = at.column,
        structure = %path,
        "no classification rule for `{name}`"
      );
      self.report.diagnostics.push(
        Diagnostic::warning(
          UNCLASSIFIED_IDENTIFIER,
          format!("no classification rule for `{name}`"),
          self.path,
          at,
        )
        .with_note(path.to_string()),
      );
    }
  }
}

/// Walks the tree in document order and tags every identifier occurrence.
/// Performs no I/O; `source` must be the text the tree was parsed from.
pub fn emit_tags(tree: &DecoratedTree, source: &str, path: &str, options: &TagOptions) -> TagReport {
  let span = debug_span!(
    "tag_js.emit",
    path,
    nodes = tree.tree().len(),
    tags = tracing::field::Empty,
    diagnostics = tracing::field::Empty,
  );
  let _guard = span.enter();

  let mut classifier = Classifier::new(tree);
  if options.require_policy {
    classifier = classifier.with_policy(RequireBinding);
  }
  let mut emitter = Emitter {
    classifier,
    source: SourceText::new(source),
    path,
    options,
    report: TagReport::default(),
  };

  if options.verbose {
    for annotation in tree.tree().annotations() {
      let at = emitter.shift(annotation.loc);
      emitter.report.diagnostics.push(Diagnostic::warning(
        PARSE_ANNOTATION,
        annotation.description.clone(),
        path,
        at,
      ));
    }
  }

  let ast = tree.tree();
  let mut stack = vec![ast.root()];
  while let Some(node) = stack.pop() {
    let data = ast.node(node);
    if data.is(&NodeKind::Identifier) {
      emitter.visit_identifier(node);
    }
    for field in data.fields.iter().rev() {
      stack.extend(field.child.ids().into_iter().rev().map(|(_, id)| id));
    }
  }

  let report = emitter.report;
  span.record("tags", report.tags.len());
  span.record("diagnostics", report.diagnostics.len());
  report
}
