use clap::Parser;
use clap::ValueEnum;
use serde_json::Value;
use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use tag_js::ast::SyntaxTree;
use tag_js::parser::decode_json;
use tag_js::parser::NodeParser;
use tag_js::TagOptions;
use tag_js::TagReport;
use tag_js::Tagger;
use tracing::debug;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
  name = "tag-js",
  version,
  about = "ctags-style definition/reference tagger for JavaScript"
)]
struct Cli {
  /// Source files to tag. Each is processed independently.
  #[arg(required = true)]
  files: Vec<PathBuf>,

  /// Added to every reported line.
  #[arg(long, default_value_t = 0)]
  line_offset: u32,

  /// Added to every reported column.
  #[arg(long, default_value_t = 0)]
  column_offset: u32,

  #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
  format: OutputFormat,

  /// Also report errors the parser recovered from.
  #[arg(long)]
  verbose: bool,

  /// Report `const foo = require("./foo")` bindings as definitions.
  #[arg(long)]
  no_require_policy: bool,

  /// Node executable used to run the bundled ESTree parser.
  #[arg(long, value_name = "PATH")]
  node: Option<PathBuf>,

  /// Tag a single file against this pre-parsed ESTree document instead of
  /// running the parser.
  #[arg(long, value_name = "AST.json")]
  estree: Option<PathBuf>,

  /// Emit JSON tracing spans to stderr.
  #[arg(long)]
  trace: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
  /// `KIND,NAME,PATH,LINE:COLUMN,SOURCE_LINE` per tag; diagnostics on stderr.
  Text,
  /// One JSON report per file and line.
  Json,
}

fn init_tracing(trace: bool) {
  if trace {
    let _ = tracing_subscriber::fmt()
      .with_span_events(FmtSpan::CLOSE)
      .with_max_level(Level::DEBUG)
      .json()
      .with_ansi(false)
      .with_writer(io::stderr)
      .try_init();
    return;
  }
  if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
    let _ = tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::from_default_env())
      .with_ansi(false)
      .with_writer(io::stderr)
      .try_init();
  }
}

fn read_source(path: &Path) -> Result<String, String> {
  fs::read_to_string(path).map_err(|err| format!("failed to read {}: {err}", path.display()))
}

fn tag_with_estree(
  tagger: &Tagger<NodeParser>,
  path: &Path,
  estree: &Path,
) -> Result<TagReport, String> {
  let source = read_source(path)?;
  let document: Value = decode_json(read_source(estree)?.as_bytes())
    .map_err(|err| format!("{} is not valid JSON: {err}", estree.display()))?;
  let tree = SyntaxTree::from_estree(&document).map_err(|err| format!("{}: {err}", estree.display()))?;
  tagger
    .tag_tree(tree, &source, &path.to_string_lossy())
    .map_err(|err| format!("{}: {err}", path.display()))
}

fn tag_path(tagger: &Tagger<NodeParser>, path: &Path) -> Result<TagReport, String> {
  let source = read_source(path)?;
  tagger
    .tag(&source, &path.to_string_lossy())
    .map_err(|err| match err {
      // Parse failures already name the file.
      tag_js::TagError::Parse(failure) => failure.to_string(),
      err => format!("{}: {err}", path.display()),
    })
}

fn write_report(out: &mut impl Write, format: OutputFormat, report: &TagReport) -> io::Result<()> {
  match format {
    OutputFormat::Text => {
      for tag in &report.tags {
        writeln!(out, "{tag}")?;
      }
      for diagnostic in &report.diagnostics {
        eprintln!("{diagnostic}");
      }
    }
    OutputFormat::Json => {
      serde_json::to_writer(&mut *out, report)?;
      writeln!(out)?;
    }
  };
  Ok(())
}

fn main() -> ExitCode {
  let args = Cli::parse();
  init_tracing(args.trace);

  if args.estree.is_some() && args.files.len() != 1 {
    eprintln!("error: --estree describes exactly one file, got {}", args.files.len());
    return ExitCode::from(2);
  }

  let options = TagOptions::default()
    .with_offsets(args.line_offset, args.column_offset)
    .with_verbose(args.verbose)
    .with_require_policy(!args.no_require_policy);
  let parser = match &args.node {
    Some(node) => NodeParser::new(node.clone()),
    None => NodeParser::default(),
  };
  let tagger = Tagger::with_parser(parser, options);

  let stdout = io::stdout();
  let mut out = stdout.lock();
  let mut failed = 0usize;
  for path in &args.files {
    let result = match &args.estree {
      Some(estree) => tag_with_estree(&tagger, path, estree),
      None => tag_path(&tagger, path),
    };
    let report = match result {
      Ok(report) => report,
      Err(message) => {
        eprintln!("error: {message}");
        failed += 1;
        continue;
      }
    };
    debug!(file = %path.display(), tags = report.tags.len(), "tagged");
    if let Err(err) = write_report(&mut out, args.format, &report) {
      eprintln!("error: failed to write output: {err}");
      return ExitCode::FAILURE;
    }
  }

  if failed > 0 {
    ExitCode::FAILURE
  } else {
    ExitCode::SUCCESS
  }
}
