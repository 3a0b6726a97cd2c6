//! docflat: Flatten nested query filters into dot-notation
//!
//! Usage:
//!   # Read from file, output to stdout
//!   docflat filter.json
//!
//!   # Read from stdin
//!   echo '{"person": {"age": {"$gte": 5}}}' | docflat
//!
//!   # Process NDJSON, one filter per line, compact output
//!   docflat --ndjson filters.jsonl --compact
//!
//!   # Nest every filter under a field and refuse `$or` with siblings
//!   docflat --prefix metadata --reject-siblings filter.json

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use docflat::{FlatDocument, FlattenConfig, FlattenError, Flattener, SiblingPolicy};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docflat")]
#[command(about = "Flatten nested query filters into dot-notation", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Process newline-delimited JSON: each line is exactly one filter document.
    /// Unlike single-JSON input, a line holding an array is not expanded
    #[arg(long)]
    ndjson: bool,

    /// Flatten every document as if nested under this field
    #[arg(long)]
    prefix: Option<String>,

    /// JSON file with a flatten configuration; flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<String>,

    /// Maximum document nesting depth (default: 100)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Path separator, must not be empty (default: ".")
    #[arg(long)]
    separator: Option<String>,

    /// Fail when `$or` / `$and` share a document with other keys instead of dropping them
    #[arg(long)]
    reject_siblings: bool,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,

    /// Log and skip documents that fail to parse or flatten
    #[arg(long)]
    keep_going: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// One input document, numbered from 1, or the reason it could not be decoded
type Record = (usize, std::result::Result<Value, serde_json::Error>);

#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
    documents: usize,
    failed: usize,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = build_config(&args)?;
    debug!(?config, "using flatten configuration");
    let flattener = Flattener::try_new(config)?;

    let reader: Box<dyn Read> = if let Some(file_path) = &args.input {
        Box::new(File::open(file_path).with_context(|| format!("Failed to open {}", file_path))?)
    } else {
        Box::new(std::io::stdin())
    };

    let records: Box<dyn Iterator<Item = Result<Record>>> = if args.ndjson {
        Box::new(read_ndjson(BufReader::new(reader)))
    } else {
        let documents = read_json(reader)?;
        Box::new(
            documents
                .into_iter()
                .enumerate()
                .map(|(idx, document)| -> Result<Record> { Ok((idx + 1, Ok(document))) }),
        )
    };

    let mut stdout = std::io::stdout().lock();
    let summary = process_records(records, &flattener, &args, &mut stdout)?;

    if summary.documents == 0 {
        warn!("no JSON documents found in input");
    }
    info!(
        documents = summary.documents,
        failed = summary.failed,
        "flattening complete"
    );

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Start from the config file (or defaults) and apply flag overrides
fn build_config(args: &Args) -> Result<FlattenConfig> {
    let mut config = if let Some(path) = &args.config {
        let file = File::open(path).with_context(|| format!("Failed to open config {}", path))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse config {}", path))?
    } else {
        FlattenConfig::default()
    };

    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if let Some(sep) = &args.separator {
        config.separator = sep.clone();
    }
    if args.reject_siblings {
        config.sibling_policy = SiblingPolicy::Reject;
    }

    config.validate().context("Invalid flatten configuration")?;
    Ok(config)
}

/// Flatten and write each record as it arrives
///
/// Parse and flatten failures are fatal unless `--keep-going` is set, in which
/// case they are logged and skipped. Read errors are always fatal.
fn process_records<I, W>(
    records: I,
    flattener: &Flattener,
    args: &Args,
    out: &mut W,
) -> Result<Summary>
where
    I: IntoIterator<Item = Result<Record>>,
    W: Write,
{
    let mut summary = Summary::default();

    for record in records {
        let (record, parsed) = record?;
        summary.documents += 1;

        let outcome = parsed
            .with_context(|| format!("Failed to parse JSON in record {}", record))
            .and_then(|document| {
                flatten_document(flattener, args.prefix.as_deref(), &document)
                    .with_context(|| format!("Failed to flatten document {}", record))
            });

        match outcome {
            Ok(flat) => write_flat(out, &flat, args.compact)?,
            Err(err) if args.keep_going => {
                warn!(record, error = %format!("{:#}", err), "skipping filter document");
                summary.failed += 1;
            }
            Err(err) => return Err(err),
        }
    }

    out.flush().context("Failed to flush output")?;
    Ok(summary)
}

fn flatten_document(
    flattener: &Flattener,
    prefix: Option<&str>,
    document: &Value,
) -> std::result::Result<FlatDocument, FlattenError> {
    match (prefix, document) {
        (Some(prefix), Value::Object(document)) => flattener.flatten_with_prefix(prefix, document),
        _ => flattener.flatten_value(document),
    }
}

/// Parse a single JSON value with SIMD acceleration
///
/// A top-level array is treated as a stream of filter documents.
fn read_json<R: Read>(reader: R) -> Result<Vec<Value>> {
    let mut content = Vec::new();
    BufReader::new(reader)
        .read_to_end(&mut content)
        .context("Failed to read input")?;

    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let value: Value =
        simd_json::serde::from_slice(&mut content).context("Failed to parse JSON")?;

    match value {
        Value::Array(items) => Ok(items),
        other => Ok(vec![other]),
    }
}

/// Lazily decode newline-delimited JSON, skipping blank lines
///
/// Records are numbered by line.
fn read_ndjson<R: BufRead>(reader: R) -> impl Iterator<Item = Result<Record>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(Ok((idx + 1, serde_json::from_str::<Value>(line.trim())))),
            Err(err) => Some(Err(anyhow::Error::new(err).context("Failed to read line"))),
        })
}

fn write_flat<W: Write>(out: &mut W, flat: &FlatDocument, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(flat)
    } else {
        serde_json::to_string_pretty(flat)
    }
    .context("Failed to serialize flattened document")?;

    writeln!(out, "{}", json).context("Failed to write output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;
    use tempfile::NamedTempFile;

    fn args(flags: &[&str]) -> Args {
        let argv = std::iter::once("docflat").chain(flags.iter().copied());
        Args::try_parse_from(argv).unwrap()
    }

    fn run(input: &str, flags: &[&str]) -> (Result<Summary>, String) {
        let args = args(flags);
        let flattener = Flattener::try_new(build_config(&args).unwrap()).unwrap();
        let mut out = Vec::new();

        let summary = process_records(read_ndjson(Cursor::new(input)), &flattener, &args, &mut out);
        (summary, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_read_json_array_is_document_stream() {
        let documents = read_json(Cursor::new(r#"[{"a": {"b": 1}}, {"c": 2}]"#)).unwrap();
        assert_eq!(documents, vec![json!({"a": {"b": 1}}), json!({"c": 2})]);

        let documents = read_json(Cursor::new(r#"{"a": 1}"#)).unwrap();
        assert_eq!(documents, vec![json!({"a": 1})]);
    }

    #[test]
    fn test_read_json_whitespace_only() {
        assert!(read_json(Cursor::new(" \n\t\n")).unwrap().is_empty());
        assert!(read_json(Cursor::new("")).unwrap().is_empty());
    }

    #[test]
    fn test_read_json_malformed() {
        assert!(read_json(Cursor::new("{not json")).is_err());
    }

    #[test]
    fn test_read_ndjson_skips_blank_lines() {
        let records: Vec<Record> = read_ndjson(Cursor::new("{\"a\": 1}\n\n   \n{\"b\": 2}\n"))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0, 1);
        assert_eq!(records[0].1.as_ref().unwrap(), &json!({"a": 1}));
        assert_eq!(records[1].0, 4);
        assert_eq!(records[1].1.as_ref().unwrap(), &json!({"b": 2}));
    }

    #[test]
    fn test_read_ndjson_keeps_array_lines_whole() {
        let records: Vec<Record> = read_ndjson(Cursor::new("[{\"a\": 1}, {\"b\": 2}]\n"))
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].1.as_ref().unwrap(),
            &json!([{"a": 1}, {"b": 2}])
        );
    }

    #[test]
    fn test_keep_going_skips_bad_lines() {
        let input = "{\"a\":{\"b\":1}}\nnot json\n{\"c\":{\"$or\":\"x\"}}\n{\"d\":2}\n";
        let (summary, output) = run(input, &["--ndjson", "--keep-going", "--compact"]);

        assert_eq!(
            summary.unwrap(),
            Summary {
                documents: 4,
                failed: 2
            }
        );
        assert_eq!(output, "{\"a.b\":1}\n{\"d\":2}\n");
    }

    #[test]
    fn test_bad_line_is_fatal_without_keep_going() {
        let input = "{\"a\":{\"b\":1}}\nnot json\n{\"d\":2}\n";
        let (summary, output) = run(input, &["--ndjson", "--compact"]);

        let err = summary.unwrap_err();
        assert!(err.to_string().contains("record 2"));
        // Records before the failure were already written
        assert_eq!(output, "{\"a.b\":1}\n");
    }

    #[test]
    fn test_ndjson_array_line_is_not_a_document() {
        let (summary, output) = run("[{\"a\": 1}]\n", &["--ndjson", "--keep-going"]);

        assert_eq!(summary.unwrap().failed, 1);
        assert!(output.is_empty());
    }

    #[test]
    fn test_prefix_on_non_object() {
        let flattener = Flattener::default();

        assert_eq!(
            flatten_document(&flattener, Some("x"), &json!([1, 2])).unwrap_err(),
            FlattenError::NotADocument { found: "array" }
        );

        let flat = flatten_document(&flattener, Some("x"), &json!({"a": {"b": 1}})).unwrap();
        assert_eq!(Value::Object(flat), json!({"x.a.b": 1}));
    }

    #[test]
    fn test_prefix_applied_to_records() {
        let (summary, output) = run("{\"a\": 1}\n", &["--ndjson", "--compact", "--prefix", "meta"]);

        assert_eq!(summary.unwrap().documents, 1);
        assert_eq!(output, "{\"meta.a\":1}\n");
    }

    #[test]
    fn test_build_config_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_depth": 7, "separator": "/", "sibling_policy": "discard"}}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = build_config(&args(&["--config", &path])).unwrap();
        assert_eq!(config.max_depth, 7);
        assert_eq!(config.separator, "/");
        assert_eq!(config.sibling_policy, SiblingPolicy::Discard);

        let config = build_config(&args(&[
            "--config",
            &path,
            "--max-depth",
            "3",
            "--reject-siblings",
        ]))
        .unwrap();
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.separator, "/");
        assert_eq!(config.sibling_policy, SiblingPolicy::Reject);
    }

    #[test]
    fn test_build_config_defaults() {
        assert_eq!(build_config(&args(&[])).unwrap(), FlattenConfig::default());
    }

    #[test]
    fn test_build_config_rejects_empty_separator() {
        assert!(build_config(&args(&["--separator", ""])).is_err());

        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"separator": ""}}"#).unwrap();
        let path = file.path().to_str().unwrap().to_string();
        assert!(build_config(&args(&["--config", &path])).is_err());
    }
}
