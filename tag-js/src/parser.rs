//! The seam to the external ECMAScript parser.
//!
//! Tagging consumes ESTree documents. [`NodeParser`] produces them by running
//! acorn under node through `scripts/estree.js`; any other producer only has to
//! implement [`EstreeParser`].

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Stdio;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SourceType {
  Script,
  Module,
}

impl SourceType {
  pub const fn as_str(self) -> &'static str {
    match self {
      SourceType::Script => "script",
      SourceType::Module => "module",
    }
  }
}

impl Display for SourceType {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ParseError {
  /// The source is invalid under the requested grammar.
  Syntax {
    line: Option<u32>,
    column: Option<u32>,
    message: String,
  },
  /// The parser itself could not be run or answered nonsense.
  Runner(String),
}

impl Display for ParseError {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    match self {
      ParseError::Syntax { message, .. } => f.write_str(message),
      ParseError::Runner(message) => write!(f, "parser runner failed: {message}"),
    }
  }
}

impl std::error::Error for ParseError {}

pub trait EstreeParser {
  /// Parses `source`, returning an ESTree `Program` with `loc` on every node.
  fn parse(&self, source: &str, source_type: SourceType) -> Result<Value, ParseError>;
}

impl<P: EstreeParser + ?Sized> EstreeParser for &P {
  fn parse(&self, source: &str, source_type: SourceType) -> Result<Value, ParseError> {
    (**self).parse(source, source_type)
  }
}

#[derive(Deserialize)]
struct RunnerResponse {
  #[serde(default)]
  ast: Option<Value>,
  #[serde(default)]
  error: Option<RunnerSyntaxError>,
}

#[derive(Deserialize)]
struct RunnerSyntaxError {
  message: String,
  #[serde(default)]
  line: Option<u32>,
  #[serde(default)]
  column: Option<u32>,
}

/// Runs acorn under node, one process per parse.
#[derive(Clone, Debug)]
pub struct NodeParser {
  node_path: PathBuf,
  script_path: PathBuf,
}

impl Default for NodeParser {
  fn default() -> Self {
    NodeParser::new(PathBuf::from("node"))
  }
}

impl NodeParser {
  pub fn new(node_path: PathBuf) -> NodeParser {
    NodeParser {
      node_path,
      script_path: Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("scripts")
        .join("estree.js"),
    }
  }

  pub fn with_script(mut self, script_path: PathBuf) -> NodeParser {
    self.script_path = script_path;
    self
  }

  /// Whether node runs and can load acorn from next to the runner script.
  #[cfg(feature = "with-node")]
  pub fn available(&self) -> bool {
    let Some(scripts) = self.script_path.parent() else {
      return false;
    };
    let output = Command::new(&self.node_path)
      .arg("-e")
      .arg("require.resolve('acorn')")
      .current_dir(scripts)
      .output();
    matches!(output, Ok(out) if out.status.success())
  }
}

/// Decodes JSON without serde_json's nesting limit, growing the stack as
/// needed. ESTree documents for long operator chains nest far deeper than 128
/// levels.
pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> serde_json::Result<T> {
  let mut de = serde_json::Deserializer::from_slice(bytes);
  de.disable_recursion_limit();
  let value = T::deserialize(serde_stacker::Deserializer::new(&mut de))?;
  de.end()?;
  Ok(value)
}

impl EstreeParser for NodeParser {
  fn parse(&self, source: &str, source_type: SourceType) -> Result<Value, ParseError> {
    if !self.script_path.exists() {
      return Err(ParseError::Runner(format!(
        "missing parser script at {}",
        self.script_path.display()
      )));
    }
    let mut child = Command::new(&self.node_path)
      .arg(&self.script_path)
      .arg(source_type.as_str())
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()
      .map_err(|err| {
        ParseError::Runner(format!("spawn node at {}: {err}", self.node_path.display()))
      })?;

    {
      let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| ParseError::Runner("failed to open stdin for parser".into()))?;
      stdin
        .write_all(source.as_bytes())
        .map_err(|err| ParseError::Runner(format!("write source to parser: {err}")))?;
    }

    let output = child
      .wait_with_output()
      .map_err(|err| ParseError::Runner(format!("wait for parser: {err}")))?;
    if !output.status.success() {
      return Err(ParseError::Runner(format!(
        "parser exited with {}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
      )));
    }

    let response: RunnerResponse = decode_json(&output.stdout)
      .map_err(|err| ParseError::Runner(format!("parse runner response: {err}")))?;
    match response {
      RunnerResponse { ast: Some(ast), .. } => Ok(ast),
      RunnerResponse {
        error: Some(error), ..
      } => Err(ParseError::Syntax {
        line: error.line,
        column: error.column,
        message: error.message,
      }),
      _ => Err(ParseError::Runner("runner returned neither an AST nor an error".into())),
    }
  }
}
