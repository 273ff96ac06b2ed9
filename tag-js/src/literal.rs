//! References hidden in DOM lookup selectors.
//!
//! `document.getElementById("main")` and `el.querySelector("#login .field")`
//! name elements that other code (markup, styles) defines, so the ids and
//! class names inside the first argument are reported as references too.

use crate::ast::LiteralValue;
use crate::ast::Loc;
use crate::ast::NodeId;
use crate::ast::NodeKind;
use crate::ast::Prop;
use crate::classify::Classifier;
use crate::classify::Verdict;
use crate::source::SourceText;
use once_cell::sync::Lazy;
use regex::Regex;

static BARE_TOKEN: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"(?:^|[^\w$-])([A-Za-z_$][\w$-]*)").expect("valid bare token regex"));
static SELECTOR_TOKEN: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"[.#]([A-Za-z_-][\w-]*)").expect("valid selector token regex"));

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SelectorCall {
  QuerySelector,
  QuerySelectorAll,
  GetElementById,
  GetElementsByClassName,
  GetElementsByName,
}

impl SelectorCall {
  pub fn from_method(name: &str) -> Option<SelectorCall> {
    Some(match name {
      "querySelector" => SelectorCall::QuerySelector,
      "querySelectorAll" => SelectorCall::QuerySelectorAll,
      "getElementById" => SelectorCall::GetElementById,
      "getElementsByClassName" => SelectorCall::GetElementsByClassName,
      "getElementsByName" => SelectorCall::GetElementsByName,
      _ => return None,
    })
  }

  /// The querySelector family takes CSS selectors, whose `.class` and `#id`
  /// parts are the names; the others take bare names.
  fn token_pattern(self) -> &'static Regex {
    match self {
      SelectorCall::QuerySelector | SelectorCall::QuerySelectorAll => &*SELECTOR_TOKEN,
      _ => &*BARE_TOKEN,
    }
  }
}

/// A name found inside a literal, located at its first character (after any
/// `.`/`#` prefix).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LiteralMatch {
  pub name: String,
  pub loc: Loc,
}

/// Scans the selector argument of a DOM lookup whose method name is `node`.
/// Returns nothing unless `node` is a referenced `<object>.<method>` callee and
/// the first argument is a string or template literal.
pub fn scan_selector_argument(
  classifier: &Classifier<'_>,
  source: &SourceText<'_>,
  node: NodeId,
) -> Vec<LiteralMatch> {
  let tree = classifier.tree();
  let ast = tree.tree();
  let Some(call) = ast.identifier_name(node).and_then(SelectorCall::from_method) else {
    return Vec::new();
  };
  if classifier.classify(node) != Verdict::Reference {
    return Vec::new();
  }
  let Some(member) = tree.parent(node) else {
    return Vec::new();
  };
  if !ast.node(member.parent).is(&NodeKind::MemberExpression) || member.prop != Prop::Property {
    return Vec::new();
  }
  let Some(callee) = tree.parent(member.parent) else {
    return Vec::new();
  };
  if !ast.node(callee.parent).is(&NodeKind::CallExpression) || callee.prop != Prop::Callee {
    return Vec::new();
  }
  let Some(Some(argument)) = ast.node(callee.parent).seq(&Prop::Arguments).first() else {
    return Vec::new();
  };

  let argument = ast.node(*argument);
  let is_template = match (&argument.kind, &argument.literal) {
    (NodeKind::Literal, Some(LiteralValue::Str(_))) => false,
    (NodeKind::TemplateLiteral, _) => true,
    _ => return Vec::new(),
  };
  let Some(raw) = source.slice(argument.span.start, argument.span.end) else {
    return Vec::new();
  };
  scan_tokens(call, &mask_literal(raw, is_template), argument.span.start)
}

fn scan_tokens(call: SelectorCall, text: &str, start: Loc) -> Vec<LiteralMatch> {
  call
    .token_pattern()
    .captures_iter(text)
    .filter_map(|captures| captures.get(1))
    .map(|token| {
      let before = &text[..token.start()];
      let loc = match before.rfind('\n') {
        None => Loc::new(start.line, start.column + utf16_len(before)),
        Some(last_break) => Loc::new(
          start.line + before.matches('\n').count() as u32,
          utf16_len(&before[last_break + 1..]),
        ),
      };
      LiteralMatch {
        name: token.as_str().to_string(),
        loc,
      }
    })
    .collect()
}

/// Blanks out escape sequences and, in templates, `${...}` interpolations,
/// keeping line breaks and UTF-16 widths so positions in the result line up
/// with the original.
fn mask_literal(raw: &str, template: bool) -> String {
  let mut masked = String::with_capacity(raw.len());
  let mut depth = 0usize;
  let mut chars = raw.chars().peekable();
  while let Some(c) = chars.next() {
    if depth == 0 {
      if c == '\\' {
        blank(&mut masked, c);
        if let Some(escaped) = chars.next() {
          blank(&mut masked, escaped);
        }
        continue;
      }
      if template && c == '$' && chars.peek() == Some(&'{') {
        chars.next();
        masked.push_str("  ");
        depth = 1;
        continue;
      }
      masked.push(c);
      continue;
    }
    match c {
      '{' => depth += 1,
      '}' => depth -= 1,
      _ => {}
    };
    blank(&mut masked, c);
  }
  masked
}

fn blank(masked: &mut String, c: char) {
  if c == '\n' {
    masked.push('\n');
  } else {
    masked.extend(std::iter::repeat(' ').take(c.len_utf16()));
  }
}

fn utf16_len(text: &str) -> u32 {
  text.encode_utf16().count() as u32
}
