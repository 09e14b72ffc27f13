// longtable CLI - headless windowed CSV editing

mod exit_codes;
mod logging;
mod script;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use longtable_config::Settings;
use longtable_engine::clipboard::encode_tsv;
use longtable_engine::{
    Dialect, EditSession, EngineError, ExportOptions, FindReplaceSpec, InferredType, LineEnding,
    MacroOp, MacroSpec, TextEncoding,
};
use longtable_io::{parse_delimiter, sniff_file, CsvFileService, CsvStreamProvider};

use exit_codes::{engine_exit_code, EXIT_INVALID_EDIT, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "ltab")]
#[command(about = "Edit very large CSV/TSV files through a bounded row window (headless)")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, env = "LTAB_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DialectArgs {
    /// Field delimiter (`\t` for tab). Sniffed from the file when omitted.
    #[arg(long, short = 'd')]
    delimiter: Option<String>,
}

#[derive(Args)]
struct ExportArgs {
    /// Line ending for written rows (default from settings)
    #[arg(long, value_enum)]
    eol: Option<EolArg>,

    /// Write a byte order mark
    #[arg(long)]
    bom: bool,

    /// Output text encoding (default from settings)
    #[arg(long, value_enum)]
    encoding: Option<EncodingArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum EolArg {
    Crlf,
    Lf,
}

#[derive(Clone, Copy, ValueEnum)]
enum EncodingArg {
    Utf8,
    Utf16le,
}

#[derive(Clone, Copy, ValueEnum)]
enum MacroKind {
    Replace,
    Upper,
    Lower,
    Trim,
    Prefix,
    Suffix,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a range of rows
    #[command(after_help = "\
Examples:
  ltab peek data.csv
  ltab peek data.csv --start 1000000 --limit 50
  ltab peek data.tsv -d '\\t' --json")]
    Peek {
        file: PathBuf,

        /// First data row (0-based, header excluded)
        #[arg(long, default_value = "0")]
        start: usize,

        /// Number of rows to print
        #[arg(long, default_value = "20")]
        limit: usize,

        #[command(flatten)]
        dialect: DialectArgs,

        /// Emit JSON instead of tab-separated text
        #[arg(long)]
        json: bool,
    },

    /// Apply a JSON edit script and save
    #[command(after_help = "\
The script is a JSON array of actions:
  [{\"action\": \"set\", \"row\": 0, \"col\": 1, \"value\": \"x\"},
   {\"action\": \"insert_row\", \"index\": 3, \"values\": [\"a\", \"b\"]},
   {\"action\": \"delete_row\", \"index\": 10},
   {\"action\": \"insert_column\", \"index\": 0, \"name\": \"id\"},
   {\"action\": \"delete_column\", \"index\": 2},
   {\"action\": \"rename_column\", \"index\": 1, \"name\": \"total\"},
   {\"action\": \"paste\", \"row\": 5, \"col\": 0, \"text\": \"a\\tb\\nc\\td\"},
   {\"action\": \"undo\"}, {\"action\": \"redo\"}]

Without --output the file is replaced in place.")]
    Edit {
        file: PathBuf,

        #[arg(long, short = 's')]
        script: PathBuf,

        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        #[command(flatten)]
        dialect: DialectArgs,

        #[command(flatten)]
        export: ExportArgs,

        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Per-column statistics
    Stats {
        file: PathBuf,

        /// Stop counting distinct values past this many (default from settings)
        #[arg(long)]
        max_distinct: Option<usize>,

        #[command(flatten)]
        dialect: DialectArgs,

        #[arg(long)]
        json: bool,
    },

    /// Apply one macro to a column of every row
    #[command(after_help = "\
Examples:
  ltab macro data.csv --op upper --column 2 -o out.csv
  ltab macro data.csv --op prefix --text ID- --column 0 -o out.csv
  ltab macro data.csv --op replace --find N/A --replace '' --column 3 -o out.csv")]
    Macro {
        file: PathBuf,

        #[arg(long, value_enum)]
        op: MacroKind,

        #[arg(long)]
        column: usize,

        /// Text for prefix/suffix
        #[arg(long)]
        text: Option<String>,

        /// Search text for replace
        #[arg(long)]
        find: Option<String>,

        /// Replacement text for replace
        #[arg(long, default_value = "")]
        replace: String,

        #[arg(long, short = 'o')]
        output: PathBuf,

        #[command(flatten)]
        dialect: DialectArgs,

        #[command(flatten)]
        export: ExportArgs,

        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Find and replace across the file
    Replace {
        file: PathBuf,

        #[arg(long)]
        find: String,

        #[arg(long, default_value = "")]
        replace: String,

        /// Only this column (default: every column)
        #[arg(long)]
        column: Option<usize>,

        /// Treat --find as a regular expression
        #[arg(long)]
        regex: bool,

        #[arg(long)]
        match_case: bool,

        #[arg(long, short = 'o')]
        output: PathBuf,

        #[command(flatten)]
        dialect: DialectArgs,

        #[command(flatten)]
        export: ExportArgs,

        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Inspect settings
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the settings file location
    Path,
    /// Print the effective settings as JSON
    Show,
}

fn main() -> ExitCode {
    logging::init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Settings::config_path);
    let settings = Settings::load_or_default(&config_path);

    let result = match cli.command {
        Commands::Peek { file, start, limit, dialect, json } => {
            cmd_peek(&settings, &file, start, limit, &dialect, json)
        }
        Commands::Edit { file, script, output, dialect, export, quiet } => {
            cmd_edit(&settings, &file, &script, output.as_deref(), &dialect, &export, quiet)
        }
        Commands::Stats { file, max_distinct, dialect, json } => {
            cmd_stats(&settings, &file, max_distinct, &dialect, json)
        }
        Commands::Macro { file, op, column, text, find, replace, output, dialect, export, quiet } => {
            macro_op(op, text, find, replace).and_then(|op| {
                let spec = MacroSpec { op, column };
                cmd_macro(&settings, &file, &spec, &output, &dialect, &export, quiet)
            })
        }
        Commands::Replace {
            file,
            find,
            replace,
            column,
            regex,
            match_case,
            output,
            dialect,
            export,
            quiet,
        } => {
            let spec = FindReplaceSpec { find, replace, column, regex, match_case };
            cmd_replace(&settings, &file, &spec, &output, &dialect, &export, quiet)
        }
        Commands::Config(ConfigCommands::Path) => {
            println!("{}", config_path.display());
            Ok(())
        }
        Commands::Config(ConfigCommands::Show) => cmd_config_show(&settings),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn invalid_edit(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INVALID_EDIT, message: msg.into(), hint: None }
    }

    pub fn engine(err: EngineError) -> Self {
        let hint = match &err {
            EngineError::Open { .. } => Some("check the path and --delimiter".to_string()),
            EngineError::InvalidIndex { .. } => {
                Some("row and column indices are 0-based; the header is not a row".to_string())
            }
            _ => None,
        };
        Self { code: engine_exit_code(&err), message: err.to_string(), hint }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

fn resolve_dialect(file: &Path, args: &DialectArgs) -> Result<Dialect, CliError> {
    match &args.delimiter {
        Some(text) => Ok(Dialect::with_delimiter(parse_delimiter(text))),
        None => sniff_file(file).map_err(|e| CliError::io(e.to_string())),
    }
}

fn open_session(
    settings: &Settings,
    file: &Path,
    args: &DialectArgs,
) -> Result<EditSession<CsvStreamProvider>, CliError> {
    let dialect = resolve_dialect(file, args)?;
    let mut session = EditSession::new(CsvStreamProvider::new(), settings.session_config());
    session.open(file, dialect).map_err(CliError::engine)?;
    tracing::debug!(
        rows = session.row_count(),
        columns = session.column_count(),
        delimiter = %dialect.delimiter_display(),
        "opened {}",
        file.display()
    );
    Ok(session)
}

fn export_options(settings: &Settings, args: &ExportArgs) -> ExportOptions {
    let mut options = settings.export_options();
    if let Some(eol) = args.eol {
        options.eol = match eol {
            EolArg::Crlf => LineEnding::Crlf,
            EolArg::Lf => LineEnding::Lf,
        };
    }
    if let Some(encoding) = args.encoding {
        options.encoding = match encoding {
            EncodingArg::Utf8 => TextEncoding::Utf8,
            EncodingArg::Utf16le => TextEncoding::Utf16Le,
        };
    }
    options.bom |= args.bom;
    options
}

fn macro_op(
    kind: MacroKind,
    text: Option<String>,
    find: Option<String>,
    replace: String,
) -> Result<MacroOp, CliError> {
    let need_text = |name: &str| {
        text.clone()
            .ok_or_else(|| CliError::args(format!("--op {} requires --text", name)))
    };
    Ok(match kind {
        MacroKind::Replace => MacroOp::Replace {
            find: find.ok_or_else(|| CliError::args("--op replace requires --find"))?,
            replace,
        },
        MacroKind::Upper => MacroOp::Uppercase,
        MacroKind::Lower => MacroOp::Lowercase,
        MacroKind::Trim => MacroOp::Trim,
        MacroKind::Prefix => MacroOp::Prefix { text: need_text("prefix")? },
        MacroKind::Suffix => MacroOp::Suffix { text: need_text("suffix")? },
    })
}

fn write_stdout(text: &str) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(text.as_bytes())
        .and_then(|_| handle.flush())
        .map_err(|e| CliError::io(e.to_string()))
}

// ============================================================================
// peek
// ============================================================================

fn cmd_peek(
    settings: &Settings,
    file: &Path,
    start: usize,
    limit: usize,
    dialect: &DialectArgs,
    json: bool,
) -> Result<(), CliError> {
    let mut session = open_session(settings, file, dialect)?;
    let total = session.row_count();
    let end = start.saturating_add(limit).min(total);

    let mut rows = Vec::with_capacity(end.saturating_sub(start));
    for row in start..end {
        script::ensure_resident(&mut session, row).map_err(CliError::engine)?;
        rows.push(
            (0..session.column_count())
                .map(|col| session.cell(row, col).as_str().to_string())
                .collect::<Vec<_>>(),
        );
    }

    if json {
        let value = serde_json::json!({
            "headers": session.headers(),
            "start": start,
            "total_rows": total,
            "rows": rows,
        });
        let text = serde_json::to_string_pretty(&value).map_err(|e| CliError::io(e.to_string()))?;
        return write_stdout(&format!("{}\n", text));
    }

    let mut grid = Vec::with_capacity(rows.len() + 1);
    grid.push(session.headers().to_vec());
    grid.extend(rows);
    write_stdout(&format!("{}\n", encode_tsv(&grid)))
}

// ============================================================================
// edit
// ============================================================================

fn cmd_edit(
    settings: &Settings,
    file: &Path,
    script_path: &Path,
    output: Option<&Path>,
    dialect: &DialectArgs,
    export: &ExportArgs,
    quiet: bool,
) -> Result<(), CliError> {
    let json = fs::read_to_string(script_path)
        .map_err(|e| CliError::io(format!("cannot read {}: {}", script_path.display(), e)))?;
    let actions = script::parse(&json)
        .map_err(|e| CliError::invalid_edit(format!("{}: {}", script_path.display(), e)))?;

    let mut session = open_session(settings, file, dialect)?;
    let summary = script::run(&mut session, &actions).map_err(|e| CliError {
        code: engine_exit_code(&e.error),
        message: e.to_string(),
        hint: None,
    })?;

    let target = output.unwrap_or(file);
    session
        .save(&mut CsvFileService, target, &export_options(settings, export))
        .map_err(CliError::engine)?;

    if !quiet {
        println!(
            "{} actions ({} cells) applied, {} rows written to {}",
            summary.actions,
            summary.cells,
            session.row_count(),
            target.display()
        );
    }
    Ok(())
}

// ============================================================================
// stats
// ============================================================================

fn cmd_stats(
    settings: &Settings,
    file: &Path,
    max_distinct: Option<usize>,
    dialect: &DialectArgs,
    json: bool,
) -> Result<(), CliError> {
    let session = open_session(settings, file, dialect)?;
    let max_distinct = max_distinct.unwrap_or(settings.stats_max_distinct);
    let stats = session
        .column_stats(&mut CsvFileService, max_distinct)
        .map_err(CliError::engine)?;

    if json {
        let text = serde_json::to_string_pretty(&stats).map_err(|e| CliError::io(e.to_string()))?;
        return write_stdout(&format!("{}\n", text));
    }

    let mut out = String::from("column\tnon_empty\tdistinct\ttype\n");
    for stat in &stats {
        let distinct = if stat.distinct_truncated {
            format!("{}+", stat.distinct)
        } else {
            stat.distinct.to_string()
        };
        let kind = match stat.inferred {
            InferredType::Number => "number",
            InferredType::Text => "text",
        };
        out.push_str(&format!("{}\t{}\t{}\t{}\n", stat.name, stat.non_empty, distinct, kind));
    }
    write_stdout(&out)
}

// ============================================================================
// macro / replace
// ============================================================================

fn cmd_macro(
    settings: &Settings,
    file: &Path,
    spec: &MacroSpec,
    output: &Path,
    dialect: &DialectArgs,
    export: &ExportArgs,
    quiet: bool,
) -> Result<(), CliError> {
    let session = open_session(settings, file, dialect)?;
    if spec.column >= session.column_count() {
        return Err(CliError::args(format!(
            "column {} out of range ({} columns)",
            spec.column,
            session.column_count()
        ))
        .with_hint("columns are 0-based"));
    }
    let result = session
        .apply_macro(&mut CsvFileService, output, spec, &export_options(settings, export))
        .map_err(CliError::engine)?;
    if !quiet {
        println!("{} cells changed, written to {}", result.applied, result.output_path.display());
    }
    Ok(())
}

fn cmd_replace(
    settings: &Settings,
    file: &Path,
    spec: &FindReplaceSpec,
    output: &Path,
    dialect: &DialectArgs,
    export: &ExportArgs,
    quiet: bool,
) -> Result<(), CliError> {
    let session = open_session(settings, file, dialect)?;
    let result = session
        .apply_find_replace(&mut CsvFileService, output, spec, &export_options(settings, export))
        .map_err(CliError::engine)?;
    if !quiet {
        println!("{} cells changed, written to {}", result.applied, result.output_path.display());
    }
    Ok(())
}

// ============================================================================
// config
// ============================================================================

fn cmd_config_show(settings: &Settings) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(settings).map_err(|e| CliError::io(e.to_string()))?;
    write_stdout(&format!("{}\n", text))
}
