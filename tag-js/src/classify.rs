//! Definition/reference classification of identifier occurrences.
//!
//! The verdict for an identifier is a function of the kind of its structural
//! parent and the property it hangs off. A handful of positions also look at a
//! sibling's name or at the bindings of an enclosing `for` header. Positions
//! the table does not list classify as [`Verdict::Unknown`].

use crate::ast::LiteralValue;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::ast::Prop;
use crate::decorate::DecoratedTree;
use ahash::HashSet;
use once_cell::unsync::OnceCell;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Verdict {
  Definition,
  Reference,
  Ignore,
  Unknown,
}

/// A refinement applied to the base table's verdict.
pub trait ClassifyPolicy {
  fn refine(&self, tree: &DecoratedTree, node: NodeId, verdict: Verdict) -> Verdict;
}

/// Treats `const foo = require("./foo")` as a plain reference to the module:
/// the binding only restates the module's own name. Any other initializer
/// (`require("fs")`, `require(name)`) leaves the definition in place.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequireBinding;

const MODULE_EXTENSIONS: &[&str] = &[".js", ".mjs", ".cjs", ".json", ".node"];

/// `./lib/foo.js` => `foo`.
pub fn module_stem(specifier: &str) -> &str {
  let base = specifier.rsplit('/').next().unwrap_or(specifier);
  MODULE_EXTENSIONS
    .iter()
    .find_map(|ext| base.strip_suffix(ext))
    .unwrap_or(base)
}

impl ClassifyPolicy for RequireBinding {
  fn refine(&self, tree: &DecoratedTree, node: NodeId, verdict: Verdict) -> Verdict {
    if verdict != Verdict::Definition {
      return verdict;
    }
    let Some(link) = tree.parent(node) else {
      return verdict;
    };
    let ast = tree.tree();
    let declarator = ast.node(link.parent);
    if !declarator.is(&NodeKind::VariableDeclarator) || link.prop != Prop::Id {
      return verdict;
    }
    let Some(init) = declarator.single(&Prop::Init).map(|id| ast.node(id)) else {
      return verdict;
    };
    if !init.is(&NodeKind::CallExpression) {
      return verdict;
    }
    let callee = init.single(&Prop::Callee).and_then(|id| ast.identifier_name(id));
    let arguments = init.seq(&Prop::Arguments);
    let specifier = match (callee, arguments) {
      (Some("require"), [Some(arg)]) => match &ast.node(*arg).literal {
        Some(LiteralValue::Str(specifier)) => specifier,
        _ => return verdict,
      },
      _ => return verdict,
    };
    match ast.identifier_name(node) {
      Some(name) if name == module_stem(specifier) => Verdict::Reference,
      _ => verdict,
    }
  }
}

pub struct Classifier<'a> {
  tree: &'a DecoratedTree,
  policies: Vec<Box<dyn ClassifyPolicy + 'a>>,
  memo: Vec<OnceCell<Verdict>>,
}

impl<'a> Classifier<'a> {
  pub fn new(tree: &'a DecoratedTree) -> Classifier<'a> {
    Classifier {
      tree,
      policies: Vec::new(),
      memo: (0..tree.tree().len()).map(|_| OnceCell::new()).collect(),
    }
  }

  pub fn with_policy(mut self, policy: impl ClassifyPolicy + 'a) -> Classifier<'a> {
    self.policies.push(Box::new(policy));
    self
  }

  pub fn tree(&self) -> &'a DecoratedTree {
    self.tree
  }

  /// Classifies an occurrence, computing it at most once per node. Nodes that
  /// are not identifiers are never tagged and classify as `Ignore`.
  pub fn classify(&self, node: NodeId) -> Verdict {
    *self.memo[node.index()].get_or_init(|| {
      let base = self.base_verdict(node);
      self
        .policies
        .iter()
        .fold(base, |verdict, policy| policy.refine(self.tree, node, verdict))
    })
  }

  fn name(&self, node: NodeId) -> Option<&'a str> {
    self.tree.tree().identifier_name(node)
  }

  fn base_verdict(&self, node: NodeId) -> Verdict {
    use NodeKind as K;
    use Prop as P;
    use Verdict::*;

    let ast = self.tree.tree();
    let Some(name) = self.name(node) else {
      return Ignore;
    };
    let Some(link) = self.tree.parent(node) else {
      return Unknown;
    };
    let parent = ast.node(link.parent);
    match (&parent.kind, &link.prop) {
      (K::ClassDeclaration, P::Id)
      | (K::ConditionalExpression, P::Consequent)
      | (K::ExportDefaultDeclaration, P::Declaration)
      | (K::FunctionDeclaration, P::Id)
      | (K::FunctionExpression, P::Id)
      | (K::ImportNamespaceSpecifier, P::Local)
      | (K::LabeledStatement, P::Label)
      | (K::ArrayPattern, P::Elements) => Definition,

      (K::ExportSpecifier, P::Exported) => {
        let local = parent.single(&P::Local).and_then(|id| self.name(id));
        if local == Some(name) {
          Ignore
        } else {
          Definition
        }
      }
      (K::MethodDefinition, P::Key) => {
        if name == "constructor" {
          Ignore
        } else {
          Definition
        }
      }
      (K::ImportSpecifier, P::Local) => {
        let imported = parent.single(&P::Imported).and_then(|id| self.name(id));
        if imported == Some(name) {
          Reference
        } else {
          Definition
        }
      }
      (K::Property, P::Key) => self.property_key(link.parent, name),
      (K::VariableDeclarator, P::Id) => {
        if self.declares_loop_header(link.parent) {
          Ignore
        } else {
          Definition
        }
      }

      (K::BinaryExpression, P::Left | P::Right)
      | (K::UpdateExpression, P::Argument)
      | (K::UnaryExpression, P::Argument)
      | (K::ForStatement, P::Update) => {
        if self.is_loop_induction_variable(node, name) {
          Ignore
        } else {
          Reference
        }
      }

      (K::ArrayExpression, P::Elements)
      | (K::ArrowFunctionExpression, P::Body)
      | (K::AssignmentExpression, P::Right)
      | (K::BreakStatement, P::Label)
      | (K::ContinueStatement, P::Label)
      | (K::CallExpression, P::Arguments | P::Callee)
      | (K::ClassDeclaration, P::SuperClass)
      | (K::ConditionalExpression, P::Alternate | P::Test)
      | (K::DoWhileStatement, P::Test)
      | (K::WhileStatement, P::Test)
      | (K::ForStatement, P::Test)
      | (K::ForInStatement, P::Right)
      | (K::ForOfStatement, P::Right)
      | (K::IfStatement, P::Test)
      | (K::ImportDefaultSpecifier, P::Local)
      | (K::ImportSpecifier, P::Imported)
      | (K::LogicalExpression, P::Left | P::Right)
      | (K::MemberExpression, P::Object | P::Property)
      | (K::NewExpression, P::Arguments | P::Callee)
      | (K::Property, P::Value)
      | (K::ReturnStatement, P::Argument)
      | (K::SequenceExpression, P::Expressions)
      | (K::SpreadElement, P::Argument)
      | (K::SwitchCase, P::Test)
      | (K::SwitchStatement, P::Discriminant)
      | (K::TaggedTemplateExpression, P::Tag)
      | (K::TemplateLiteral, P::Expressions)
      | (K::ThrowStatement, P::Argument)
      | (K::VariableDeclarator, P::Init)
      | (K::YieldExpression, P::Argument)
      | (K::ExpressionStatement, P::Expression) => Reference,

      (K::ArrowFunctionExpression | K::FunctionExpression | K::FunctionDeclaration, P::Params)
      | (K::AssignmentExpression, P::Left)
      | (K::AssignmentPattern, P::Left)
      | (K::CatchClause, P::Param)
      | (K::ClassExpression, P::Id)
      | (K::ExportSpecifier, P::Local)
      | (K::ForInStatement | K::ForOfStatement, P::Left)
      | (K::RestElement, P::Argument) => Ignore,

      _ => Unknown,
    }
  }

  fn property_key(&self, property: NodeId, key: &str) -> Verdict {
    let ast = self.tree.tree();
    let data = ast.node(property);
    if data.shorthand {
      // The value side reports the occurrence.
      return Verdict::Ignore;
    }
    let value = data.single(&Prop::Value).and_then(|id| self.name(id));
    match self
      .tree
      .nearest_ancestor_of_kind(property, &NodeKind::VariableDeclarator)
    {
      Some((_, Prop::Init)) if value != Some(key) => Verdict::Definition,
      Some((_, Prop::Id)) if value == Some(key) => Verdict::Definition,
      _ => Verdict::Reference,
    }
  }

  /// Whether a declarator's declaration fills a `for (...;;)` init or a
  /// `for (... in ...)` left slot.
  fn declares_loop_header(&self, declarator: NodeId) -> bool {
    let ast = self.tree.tree();
    let Some(declaration) = self.tree.parent(declarator) else {
      return false;
    };
    if !ast.node(declaration.parent).is(&NodeKind::VariableDeclaration) {
      return false;
    }
    let Some(slot) = self.tree.parent(declaration.parent) else {
      return false;
    };
    match (&ast.node(slot.parent).kind, &slot.prop) {
      (NodeKind::ForStatement, Prop::Init) | (NodeKind::ForInStatement, Prop::Left) => true,
      _ => false,
    }
  }

  /// Whether `name` is declared by the init clause of the nearest enclosing
  /// `for` statement, with `node` sitting in that statement's header.
  fn is_loop_induction_variable(&self, node: NodeId, name: &str) -> bool {
    let ast = self.tree.tree();
    let Some((for_stmt, slot)) = self
      .tree
      .nearest_ancestor_of_kind(node, &NodeKind::ForStatement)
    else {
      return false;
    };
    if !matches!(slot, Prop::Init | Prop::Test | Prop::Update) {
      return false;
    }
    let Some(init) = ast.node(for_stmt).single(&Prop::Init) else {
      return false;
    };
    let init = ast.node(init);
    if !init.is(&NodeKind::VariableDeclaration) {
      return false;
    }
    let mut declared = HashSet::default();
    for declarator in init.seq(&Prop::Declarations).iter().flatten() {
      if let Some(id) = ast.node(*declarator).single(&Prop::Id) {
        declared.extend(self.name(id));
      }
    }
    declared.contains(name)
  }
}
