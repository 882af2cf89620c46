use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use ftp_listing::output::{render_text, safe_stdout};
use ftp_listing::server_type::DetectError;
use ftp_listing::{
    autodetect, parse_listing, Columns, FileRecord, InterpretationContext, RuleSet, ServerTypeSet,
};
use slog::{info, o, Drain, Level, Logger};

/// Parse FTP directory listings with rule sets, picking the server type automatically
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, args_conflicts_with_subcommands = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// listing file, `-` for stdin
    listing: Option<PathBuf>,

    /// rule file to use instead of a server type
    #[arg(long, requires = "columns", conflicts_with = "server_type")]
    rules: Option<PathBuf>,

    /// columns the rule file fills, e.g. `name:name,size:size,date:date,time:time`
    #[arg(long)]
    columns: Option<String>,

    /// use this server type instead of autodetecting
    #[arg(long)]
    server_type: Option<String>,

    /// welcome banner the server sent
    #[arg(long, default_value = "")]
    welcome: String,

    /// server's reply to SYST
    #[arg(long, default_value = "")]
    syst: String,

    /// server type that read this server's last listing
    #[arg(long)]
    last_used: Option<String>,

    /// TOML catalog replacing the built-in server types
    #[arg(long)]
    server_types: Option<PathBuf>,

    /// reference date for listings without years (YYYY-MM-DD, default today)
    #[arg(long)]
    today: Option<NaiveDate>,

    /// the listing transfer was cut short
    #[arg(long)]
    incomplete: bool,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// log debug details to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a rule file and report errors
    CheckRules {
        file: PathBuf,
        #[arg(long)]
        columns: String,
    },
    /// Compile an autodetect condition and report errors
    CheckCondition { text: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Json,
}

fn build_logger(verbose: bool) -> Logger {
    let decorator = slog_term::PlainSyncDecorator::new(std::io::stderr());
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let level = if verbose { Level::Debug } else { Level::Info };
    Logger::root(drain.filter_level(level).fuse(), o!())
}

/// Print a diagnostic with its source excerpt and exit with status 1.
fn fail_with(diagnostic: impl miette::Diagnostic + Send + Sync + 'static) -> ! {
    eprintln!("{:?}", miette::Report::new(diagnostic));
    std::process::exit(1)
}

fn read_text(path: &Path) -> Result<String> {
    let mut bytes = Vec::new();
    if path == Path::new("-") {
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("failed to read listing from stdin")?;
    } else {
        bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn load_columns(list: &str) -> Result<Columns> {
    Columns::from_list(list).with_context(|| format!("invalid column list '{}'", list))
}

fn load_server_types(path: Option<&Path>) -> ServerTypeSet {
    let set = match path {
        Some(path) => ServerTypeSet::load(path),
        None => ServerTypeSet::stock(),
    };
    set.unwrap_or_else(|e| fail_with(e))
}

fn print_records(
    format: Format,
    server_type: Option<&str>,
    columns: &Columns,
    records: &[FileRecord],
) -> Result<()> {
    let mut out = safe_stdout();
    match format {
        Format::Text => {
            for record in records {
                out.writeln(&render_text(record, columns))?;
            }
        }
        Format::Json => {
            let json = serde_json::json!({
                "server_type": server_type,
                "records": records,
            });
            out.writeln(&serde_json::to_string_pretty(&json)?)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let logger = build_logger(args.verbose);

    match &args.command {
        Some(Command::CheckRules { file, columns }) => {
            let columns = load_columns(columns)?;
            let source = read_text(file)?;
            let rules = RuleSet::compile(&source, &columns).unwrap_or_else(|e| fail_with(e));
            info!(logger, "rules compiled"; "rules" => rules.rules().len());
            return Ok(());
        }
        Some(Command::CheckCondition { text }) => {
            let condition = autodetect::compile(text).unwrap_or_else(|e| fail_with(e));
            safe_stdout().writeln(&condition.to_string())?;
            return Ok(());
        }
        None => {}
    }

    let listing_path = args
        .listing
        .as_deref()
        .ok_or_else(|| anyhow!("a listing file is required"))?;
    let listing = read_text(listing_path)?;
    let today = args
        .today
        .map_or_else(InterpretationContext::today, InterpretationContext::new);
    let ctx = today.incomplete(args.incomplete);
    let logger = logger.new(o!("listing" => listing_path.display().to_string()));

    if let Some(rules_path) = &args.rules {
        let columns = load_columns(args.columns.as_deref().unwrap_or_default())?;
        let source = read_text(rules_path)?;
        let rules = RuleSet::compile(&source, &columns).unwrap_or_else(|e| fail_with(e));
        let records = parse_listing(&logger, &rules, &listing, ctx)?;
        return print_records(args.format, None, rules.columns(), &records);
    }

    let server_types = load_server_types(args.server_types.as_deref());

    if let Some(name) = &args.server_type {
        let server_type = server_types
            .get(name)
            .ok_or_else(|| anyhow!("unknown server type '{}'", name))?;
        let records = parse_listing(&logger, &server_type.rules, &listing, ctx)?;
        return print_records(
            args.format,
            Some(&server_type.name),
            server_type.rules.columns(),
            &records,
        );
    }

    let detection = server_types
        .parse_with_autodetect(
            &logger,
            args.last_used.as_deref(),
            &args.welcome,
            &args.syst,
            &listing,
            ctx,
        )
        .map_err(|e| match e {
            DetectError::NoServerType => anyhow!("no server type can read {}", listing_path.display()),
            DetectError::OutOfMemory => anyhow!(e),
        })?;
    let columns = server_types
        .get(&detection.server_type)
        .map(|t| t.rules.columns())
        .ok_or_else(|| anyhow!("unknown server type '{}'", detection.server_type))?;
    print_records(
        args.format,
        Some(&detection.server_type),
        columns,
        &detection.records,
    )
}
