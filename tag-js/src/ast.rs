//! Arena storage for ESTree-shaped syntax trees.
//!
//! Trees are produced outside this crate (see [`crate::parser`]) and arrive
//! either through [`SyntaxTree::from_estree`] or a [`TreeBuilder`]. Nodes are
//! addressed by [`NodeId`] and only ever point downwards; upward navigation is
//! provided by [`crate::decorate::DecoratedTree`].

use crate::error::TagError;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

macro_rules! vocabulary {
  (
    $(#[$meta:meta])*
    $vis:vis enum $name:ident ($fallback:ident) {
      $($variant:ident => $text:literal,)*
    }
  ) => {
    $(#[$meta])*
    #[derive(Clone, PartialEq, Eq, Hash, Debug)]
    $vis enum $name {
      $($variant,)*
      $fallback(Box<str>),
    }

    impl $name {
      pub fn from_name(name: &str) -> $name {
        match name {
          $($text => $name::$variant,)*
          other => $name::$fallback(other.into()),
        }
      }

      pub fn as_str(&self) -> &str {
        match self {
          $($name::$variant => $text,)*
          $name::$fallback(name) => name,
        }
      }
    }

    impl Display for $name {
      fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
      }
    }
  };
}

vocabulary! {
  /// ESTree node types up to ES2022.
  pub enum NodeKind (Unrecognized) {
    ArrayExpression => "ArrayExpression",
    ArrayPattern => "ArrayPattern",
    ArrowFunctionExpression => "ArrowFunctionExpression",
    AssignmentExpression => "AssignmentExpression",
    AssignmentPattern => "AssignmentPattern",
    AwaitExpression => "AwaitExpression",
    BinaryExpression => "BinaryExpression",
    BlockStatement => "BlockStatement",
    BreakStatement => "BreakStatement",
    CallExpression => "CallExpression",
    CatchClause => "CatchClause",
    ChainExpression => "ChainExpression",
    ClassBody => "ClassBody",
    ClassDeclaration => "ClassDeclaration",
    ClassExpression => "ClassExpression",
    ConditionalExpression => "ConditionalExpression",
    ContinueStatement => "ContinueStatement",
    DebuggerStatement => "DebuggerStatement",
    DoWhileStatement => "DoWhileStatement",
    EmptyStatement => "EmptyStatement",
    ExportAllDeclaration => "ExportAllDeclaration",
    ExportDefaultDeclaration => "ExportDefaultDeclaration",
    ExportNamedDeclaration => "ExportNamedDeclaration",
    ExportSpecifier => "ExportSpecifier",
    ExpressionStatement => "ExpressionStatement",
    ForInStatement => "ForInStatement",
    ForOfStatement => "ForOfStatement",
    ForStatement => "ForStatement",
    FunctionDeclaration => "FunctionDeclaration",
    FunctionExpression => "FunctionExpression",
    Identifier => "Identifier",
    IfStatement => "IfStatement",
    ImportAttribute => "ImportAttribute",
    ImportDeclaration => "ImportDeclaration",
    ImportDefaultSpecifier => "ImportDefaultSpecifier",
    ImportExpression => "ImportExpression",
    ImportNamespaceSpecifier => "ImportNamespaceSpecifier",
    ImportSpecifier => "ImportSpecifier",
    LabeledStatement => "LabeledStatement",
    Literal => "Literal",
    LogicalExpression => "LogicalExpression",
    MemberExpression => "MemberExpression",
    MetaProperty => "MetaProperty",
    MethodDefinition => "MethodDefinition",
    NewExpression => "NewExpression",
    ObjectExpression => "ObjectExpression",
    ObjectPattern => "ObjectPattern",
    ParenthesizedExpression => "ParenthesizedExpression",
    PrivateIdentifier => "PrivateIdentifier",
    Program => "Program",
    Property => "Property",
    PropertyDefinition => "PropertyDefinition",
    RestElement => "RestElement",
    ReturnStatement => "ReturnStatement",
    SequenceExpression => "SequenceExpression",
    SpreadElement => "SpreadElement",
    StaticBlock => "StaticBlock",
    Super => "Super",
    SwitchCase => "SwitchCase",
    SwitchStatement => "SwitchStatement",
    TaggedTemplateExpression => "TaggedTemplateExpression",
    TemplateElement => "TemplateElement",
    TemplateLiteral => "TemplateLiteral",
    ThisExpression => "ThisExpression",
    ThrowStatement => "ThrowStatement",
    TryStatement => "TryStatement",
    UnaryExpression => "UnaryExpression",
    UpdateExpression => "UpdateExpression",
    VariableDeclaration => "VariableDeclaration",
    VariableDeclarator => "VariableDeclarator",
    WhileStatement => "WhileStatement",
    WithStatement => "WithStatement",
    YieldExpression => "YieldExpression",
  }
}

vocabulary! {
  /// Name of the slot through which a child node hangs off its parent.
  pub enum Prop (Other) {
    Alternate => "alternate",
    Argument => "argument",
    Arguments => "arguments",
    Attributes => "attributes",
    Block => "block",
    Body => "body",
    Callee => "callee",
    Cases => "cases",
    Consequent => "consequent",
    Declaration => "declaration",
    Declarations => "declarations",
    Discriminant => "discriminant",
    Elements => "elements",
    Exported => "exported",
    Expression => "expression",
    Expressions => "expressions",
    Finalizer => "finalizer",
    Handler => "handler",
    Id => "id",
    Imported => "imported",
    Init => "init",
    Key => "key",
    Label => "label",
    Left => "left",
    Local => "local",
    Meta => "meta",
    Object => "object",
    Param => "param",
    Params => "params",
    Properties => "properties",
    Property => "property",
    Quasi => "quasi",
    Quasis => "quasis",
    Right => "right",
    Source => "source",
    Specifiers => "specifiers",
    SuperClass => "superClass",
    Tag => "tag",
    Test => "test",
    Update => "update",
    Value => "value",
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
  pub fn index(self) -> usize {
    self.0 as usize
  }
}

/// A source position: 1-based line, 0-based column in UTF-16 code units, as
/// acorn and other JavaScript-hosted parsers count them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord, Default, Serialize)]
pub struct Loc {
  pub line: u32,
  pub column: u32,
}

impl Loc {
  pub const fn new(line: u32, column: u32) -> Loc {
    Loc { line, column }
  }
}

impl Display for Loc {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.line, self.column)
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Span {
  pub start: Loc,
  pub end: Loc,
}

impl Span {
  pub const fn new(start: Loc, end: Loc) -> Span {
    Span { start, end }
  }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum LiteralValue {
  Str(String),
  /// Numbers, booleans, `null`, regexes and bigints.
  Other,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Child {
  Single(NodeId),
  /// Holes (e.g. elisions in `[a, , b]`) keep their index.
  Seq(Vec<Option<NodeId>>),
}

impl Child {
  /// Present nodes in order, with their sequence index if any.
  pub fn ids(&self) -> Vec<(Option<u32>, NodeId)> {
    match self {
      Child::Single(id) => vec![(None, *id)],
      Child::Seq(items) => items
        .iter()
        .enumerate()
        .filter_map(|(i, id)| id.map(|id| (Some(i as u32), id)))
        .collect(),
    }
  }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Field {
  pub prop: Prop,
  pub child: Child,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct NodeData {
  pub kind: NodeKind,
  pub span: Span,
  /// Set for `Identifier` and `PrivateIdentifier`.
  pub name: Option<String>,
  /// Set for `Literal`.
  pub literal: Option<LiteralValue>,
  pub shorthand: bool,
  pub fields: Vec<Field>,
}

impl NodeData {
  pub fn new(kind: NodeKind, span: Span) -> NodeData {
    NodeData {
      kind,
      span,
      name: None,
      literal: None,
      shorthand: false,
      fields: Vec::new(),
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> NodeData {
    self.name = Some(name.into());
    self
  }

  pub fn with_literal(mut self, literal: LiteralValue) -> NodeData {
    self.literal = Some(literal);
    self
  }

  pub fn with_shorthand(mut self, shorthand: bool) -> NodeData {
    self.shorthand = shorthand;
    self
  }

  pub fn with_single(mut self, prop: Prop, id: NodeId) -> NodeData {
    self.fields.push(Field {
      prop,
      child: Child::Single(id),
    });
    self
  }

  pub fn with_seq(mut self, prop: Prop, ids: Vec<Option<NodeId>>) -> NodeData {
    self.fields.push(Field {
      prop,
      child: Child::Seq(ids),
    });
    self
  }

  pub fn field(&self, prop: &Prop) -> Option<&Child> {
    self.fields.iter().find(|f| &f.prop == prop).map(|f| &f.child)
  }

  pub fn single(&self, prop: &Prop) -> Option<NodeId> {
    match self.field(prop) {
      Some(Child::Single(id)) => Some(*id),
      _ => None,
    }
  }

  pub fn seq(&self, prop: &Prop) -> &[Option<NodeId>] {
    match self.field(prop) {
      Some(Child::Seq(items)) => items,
      _ => &[],
    }
  }

  pub fn is(&self, kind: &NodeKind) -> bool {
    &self.kind == kind
  }
}

/// An error reported by a tolerant parser and attached to the tree instead of
/// aborting the parse.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParseAnnotation {
  pub loc: Loc,
  pub description: String,
}

#[derive(Clone, Debug)]
pub struct SyntaxTree {
  nodes: Vec<NodeData>,
  root: NodeId,
  annotations: Vec<ParseAnnotation>,
}

impl SyntaxTree {
  /// Lowers an ESTree document (as emitted by acorn, esprima or espree with
  /// locations enabled) into an arena tree.
  pub fn from_estree(program: &Value) -> Result<SyntaxTree, TagError> {
    let mut builder = TreeBuilder::new();
    let root = lower_estree(&mut builder, program)?;
    if let Some(errors) = program.get("errors").and_then(Value::as_array) {
      for error in errors.iter().filter_map(Value::as_object) {
        builder.annotate(read_annotation(error));
      }
    }
    builder.finish(root)
  }

  pub fn root(&self) -> NodeId {
    self.root
  }

  pub fn node(&self, id: NodeId) -> &NodeData {
    &self.nodes[id.index()]
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn annotations(&self) -> &[ParseAnnotation] {
    &self.annotations
  }

  /// The name of `id` if it is an `Identifier`.
  pub fn identifier_name(&self, id: NodeId) -> Option<&str> {
    let node = self.node(id);
    match node.kind {
      NodeKind::Identifier => node.name.as_deref(),
      _ => None,
    }
  }

  /// Copies a node's own data (not its subtree) into a fresh slot.
  pub(crate) fn shallow_clone(&mut self, id: NodeId) -> NodeId {
    let copy = self.nodes[id.index()].clone();
    self.nodes.push(copy);
    NodeId((self.nodes.len() - 1) as u32)
  }

  pub(crate) fn repoint(&mut self, parent: NodeId, field: usize, index: Option<u32>, to: NodeId) {
    let child = &mut self.nodes[parent.index()].fields[field].child;
    match (child, index) {
      (Child::Single(id), None) => *id = to,
      (Child::Seq(items), Some(i)) => items[i as usize] = Some(to),
      _ => unreachable!("slot shape changed during decoration"),
    }
  }
}

/// Incrementally assembles a [`SyntaxTree`]. Children must be pushed before
/// the nodes that reference them.
#[derive(Default)]
pub struct TreeBuilder {
  nodes: Vec<NodeData>,
  annotations: Vec<ParseAnnotation>,
}

impl TreeBuilder {
  pub fn new() -> TreeBuilder {
    TreeBuilder::default()
  }

  pub fn push(&mut self, data: NodeData) -> NodeId {
    self.nodes.push(data);
    NodeId((self.nodes.len() - 1) as u32)
  }

  pub fn annotate(&mut self, annotation: ParseAnnotation) {
    self.annotations.push(annotation);
  }

  /// Validates child references and orders every node's fields by source
  /// position, so that walking fields front to back is document order.
  pub fn finish(mut self, root: NodeId) -> Result<SyntaxTree, TagError> {
    let len = self.nodes.len();
    if root.index() >= len {
      return Err(TagError::MalformedTree(format!(
        "root {} is outside the arena of {len} nodes",
        root.0
      )));
    }
    for i in 0..len {
      let fields = std::mem::take(&mut self.nodes[i].fields);
      let mut keyed = Vec::with_capacity(fields.len());
      for field in fields {
        let ids = field.child.ids();
        // Children precede their parents in the arena, which also rules out
        // cycles.
        if let Some((_, bad)) = ids.iter().find(|(_, id)| id.index() >= i) {
          return Err(TagError::MalformedTree(format!(
            "{} node {i} references node {} through `{}` before it was pushed",
            self.nodes[i].kind, bad.0, field.prop
          )));
        }
        let start = ids.first().map(|(_, id)| self.nodes[id.index()].span.start);
        keyed.push(((start.is_none(), start), field));
      }
      keyed.sort_by_key(|(key, _)| *key);
      self.nodes[i].fields = keyed.into_iter().map(|(_, field)| field).collect();
    }
    Ok(SyntaxTree {
      nodes: self.nodes,
      root,
      annotations: self.annotations,
    })
  }
}

fn malformed(message: impl Into<String>) -> TagError {
  TagError::MalformedTree(message.into())
}

fn is_node(value: &Value) -> bool {
  value.get("type").map_or(false, Value::is_string)
}

fn read_loc(value: Option<&Value>) -> Option<Loc> {
  let value = value?;
  let line = value.get("line")?.as_u64()?;
  let column = value.get("column")?.as_u64()?;
  Some(Loc::new(line as u32, column as u32))
}

fn read_span(object: &Map<String, Value>) -> Option<Span> {
  let loc = object.get("loc")?;
  let start = read_loc(loc.get("start"))?;
  let end = read_loc(loc.get("end")).unwrap_or(start);
  Some(Span::new(start, end))
}

fn read_annotation(error: &Map<String, Value>) -> ParseAnnotation {
  let number = |keys: &[&str]| {
    keys
      .iter()
      .find_map(|k| error.get(*k).and_then(Value::as_u64))
      .unwrap_or(0) as u32
  };
  let description = ["description", "message"]
    .iter()
    .find_map(|k| error.get(*k).and_then(Value::as_str))
    .unwrap_or("parse error")
    .to_string();
  ParseAnnotation {
    loc: Loc::new(number(&["lineNumber", "line"]), number(&["column"])),
    description,
  }
}

/// Where a node-valued field hangs its children.
enum Slot<'a> {
  Single(&'a Value),
  /// Nodes and `null` holes.
  Seq(&'a [Value]),
}

impl<'a> Slot<'a> {
  fn nodes(&self) -> Vec<&'a Value> {
    match self {
      Slot::Single(value) => vec![*value],
      Slot::Seq(items) => items.iter().filter(|item| !item.is_null()).collect(),
    }
  }
}

fn slots(object: &Map<String, Value>) -> Vec<(&str, Slot<'_>)> {
  object
    .iter()
    .filter_map(|(key, field)| match field {
      Value::Object(_) if is_node(field) => Some((key.as_str(), Slot::Single(field))),
      Value::Array(items)
        if items.iter().any(is_node) && items.iter().all(|i| i.is_null() || is_node(i)) =>
      {
        Some((key.as_str(), Slot::Seq(items)))
      }
      _ => None,
    })
    .collect()
}

enum Lowering<'a> {
  Enter(&'a Value),
  Exit(&'a Map<String, Value>),
}

/// Post-order walk with an explicit stack: left-nested operator chains make
/// ESTree documents arbitrarily deep.
fn lower_estree(builder: &mut TreeBuilder, program: &Value) -> Result<NodeId, TagError> {
  let mut work = vec![Lowering::Enter(program)];
  // Ids of finished subtrees, in document order, not yet claimed by a parent.
  let mut lowered = Vec::new();
  while let Some(step) = work.pop() {
    match step {
      Lowering::Enter(value) => {
        let object = value
          .as_object()
          .ok_or_else(|| malformed("expected a node object"))?;
        work.push(Lowering::Exit(object));
        let children: Vec<_> = slots(object).iter().flat_map(|(_, slot)| slot.nodes()).collect();
        work.extend(children.into_iter().rev().map(Lowering::Enter));
      }
      Lowering::Exit(object) => {
        let id = lower_node(builder, object, &mut lowered)?;
        lowered.push(id);
      }
    }
  }
  lowered.pop().ok_or_else(|| malformed("empty document"))
}

fn lower_node(
  builder: &mut TreeBuilder,
  object: &Map<String, Value>,
  lowered: &mut Vec<NodeId>,
) -> Result<NodeId, TagError> {
  let typ = object
    .get("type")
    .and_then(Value::as_str)
    .ok_or_else(|| malformed("node without a `type`"))?;
  let span = read_span(object).ok_or_else(|| malformed(format!("{typ} node without a `loc`")))?;
  let kind = NodeKind::from_name(typ);

  let slots = slots(object);
  let count: usize = slots.iter().map(|(_, slot)| slot.nodes().len()).sum();
  let first = lowered
    .len()
    .checked_sub(count)
    .ok_or_else(|| malformed(format!("{typ} node lost its children")))?;
  let mut children = lowered.split_off(first).into_iter();
  let mut next_child = || {
    children
      .next()
      .ok_or_else(|| malformed(format!("{typ} node lost its children")))
  };

  let mut data = NodeData::new(kind.clone(), span);
  for (key, slot) in slots {
    let prop = Prop::from_name(key);
    data = match slot {
      Slot::Single(_) => data.with_single(prop, next_child()?),
      Slot::Seq(items) => {
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
          ids.push(match item {
            Value::Null => None,
            _ => Some(next_child()?),
          });
        }
        data.with_seq(prop, ids)
      }
    };
  }

  match kind {
    NodeKind::Identifier | NodeKind::PrivateIdentifier => {
      let name = object
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(format!("{typ} without a `name` at {}", span.start)))?;
      data = data.with_name(name);
    }
    NodeKind::Literal => {
      data = data.with_literal(match object.get("value") {
        Some(Value::String(s)) => LiteralValue::Str(s.clone()),
        _ => LiteralValue::Other,
      });
    }
    _ => {}
  };
  if let Some(Value::Bool(shorthand)) = object.get("shorthand") {
    data = data.with_shorthand(*shorthand);
  }
  Ok(builder.push(data))
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn loc(line: u32, column: u32) -> Value {
    json!({ "start": { "line": line, "column": column }, "end": { "line": line, "column": column + 1 } })
  }

  #[test]
  fn vocabulary_round_trips_known_and_unknown_names() {
    assert_eq!(NodeKind::from_name("ForInStatement"), NodeKind::ForInStatement);
    assert_eq!(NodeKind::from_name("JSXElement").as_str(), "JSXElement");
    assert_eq!(Prop::from_name("superClass"), Prop::SuperClass);
    assert_eq!(Prop::from_name("typeAnnotation").to_string(), "typeAnnotation");
  }

  #[test]
  fn fields_are_ordered_by_source_position() {
    // Keys arrive alphabetically from serde_json, which would put `body`
    // before `init` without reordering.
    let tree = SyntaxTree::from_estree(&json!({
      "type": "ForStatement",
      "loc": loc(1, 0),
      "body": { "type": "EmptyStatement", "loc": loc(1, 20) },
      "init": { "type": "Identifier", "name": "i", "loc": loc(1, 5) },
      "test": { "type": "Identifier", "name": "j", "loc": loc(1, 8) },
      "update": null,
    }))
    .unwrap();
    let root = tree.node(tree.root());
    let props: Vec<_> = root.fields.iter().map(|f| f.prop.clone()).collect();
    assert_eq!(props, vec![Prop::Init, Prop::Test, Prop::Body]);
  }

  #[test]
  fn holes_keep_their_index() {
    let tree = SyntaxTree::from_estree(&json!({
      "type": "ArrayPattern",
      "loc": loc(1, 0),
      "elements": [null, { "type": "Identifier", "name": "b", "loc": loc(1, 3) }],
    }))
    .unwrap();
    let elements = tree.node(tree.root()).seq(&Prop::Elements);
    assert_eq!(elements.len(), 2);
    assert!(elements[0].is_none());
    assert_eq!(tree.identifier_name(elements[1].unwrap()), Some("b"));
  }

  #[test]
  fn missing_loc_is_malformed() {
    let err = SyntaxTree::from_estree(&json!({ "type": "Program", "body": [] })).unwrap_err();
    assert!(matches!(err, TagError::MalformedTree(_)));
  }

  #[test]
  fn tolerant_parser_errors_become_annotations() {
    let tree = SyntaxTree::from_estree(&json!({
      "type": "Program",
      "loc": loc(1, 0),
      "body": [],
      "errors": [{ "lineNumber": 3, "column": 7, "description": "Unexpected token" }],
    }))
    .unwrap();
    assert_eq!(tree.annotations(), &[ParseAnnotation {
      loc: Loc::new(3, 7),
      description: "Unexpected token".into(),
    }]);
  }

  /// `a + a + ... + a` with `terms` operands, as acorn nests it.
  fn operator_chain(terms: u32) -> Value {
    let ident = |column: u32| json!({ "type": "Identifier", "name": "a", "loc": loc(1, column) });
    let mut expression = ident(0);
    for i in 1..terms {
      expression = json!({
        "type": "BinaryExpression",
        "operator": "+",
        "loc": { "start": { "line": 1, "column": 0 }, "end": { "line": 1, "column": 4 * i + 1 } },
        "left": expression,
        "right": ident(4 * i),
      });
    }
    expression
  }

  #[test]
  fn deep_chains_lower_without_recursion() {
    let tree = SyntaxTree::from_estree(&operator_chain(1000)).unwrap();
    assert_eq!(tree.len(), 2 * 1000 - 1);
    let root = tree.node(tree.root());
    let props: Vec<_> = root.fields.iter().map(|f| f.prop.clone()).collect();
    assert_eq!(props, vec![Prop::Left, Prop::Right]);
    let right = root.single(&Prop::Right).unwrap();
    assert_eq!(tree.node(right).span.start, Loc::new(1, 4 * 999));
  }

  #[test]
  fn sequence_children_keep_document_order() {
    let tree = SyntaxTree::from_estree(&json!({
      "type": "ArrayExpression",
      "loc": loc(1, 0),
      "elements": [
        { "type": "Identifier", "name": "x", "loc": loc(1, 1) },
        null,
        { "type": "Identifier", "name": "y", "loc": loc(1, 5) },
      ],
    }))
    .unwrap();
    let names: Vec<_> = tree
      .node(tree.root())
      .seq(&Prop::Elements)
      .iter()
      .map(|id| id.and_then(|id| tree.identifier_name(id)))
      .collect();
    assert_eq!(names, vec![Some("x"), None, Some("y")]);
  }
}
