//! Extract text from one document
//!
//! Runs the full strategy pipeline and prints the winning text, or a JSON
//! report with every attempt when `--json` is given.
//!
//! Usage:
//!   cargo run --release --bin extract_document -- contract.pdf
//!   cargo run --release --bin extract_document -- scan.pdf --pages 5 --json
//!   cargo run --release --bin extract_document -- notes.bin --type text --no-ocr
//!
//! Set `RUST_LOG=info` to follow strategy selection.

use docsift::text::RepairDictionary;
use docsift::{DocumentIngestor, MediaType, PageLimit, PipelineConfig, SourceDocument};
use std::path::PathBuf;
use std::process::ExitCode;

struct CliArgs {
    input: PathBuf,
    media_type: Option<MediaType>,
    pages: Option<usize>,
    json: bool,
    no_ocr: bool,
    config: Option<PathBuf>,
    dictionary: Option<PathBuf>,
}

impl CliArgs {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut input = None;
        let mut media_type = None;
        let mut pages = None;
        let mut json = false;
        let mut no_ocr = false;
        let mut config = None;
        let mut dictionary = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--type" | "-t" => {
                    i += 1;
                    let value = args.get(i).ok_or("--type needs a value")?;
                    media_type = Some(value.parse::<MediaType>().map_err(|e| e.to_string())?);
                },
                "--pages" | "-p" => {
                    i += 1;
                    let value = args.get(i).ok_or("--pages needs a value")?;
                    pages = Some(value.parse::<usize>().map_err(|_| format!("invalid page count: {}", value))?);
                },
                "--config" => {
                    i += 1;
                    config = Some(PathBuf::from(args.get(i).ok_or("--config needs a path")?));
                },
                "--dictionary" => {
                    i += 1;
                    dictionary = Some(PathBuf::from(args.get(i).ok_or("--dictionary needs a path")?));
                },
                "--json" => json = true,
                "--no-ocr" => no_ocr = true,
                "--help" | "-h" => return Err(String::new()),
                other if other.starts_with('-') => return Err(format!("unknown option: {}", other)),
                other => input = Some(PathBuf::from(other)),
            }
            i += 1;
        }

        Ok(Self {
            input: input.ok_or("missing input file")?,
            media_type,
            pages,
            json,
            no_ocr,
            config,
            dictionary,
        })
    }
}

fn usage() {
    eprintln!(
        "Usage: extract_document <file> [--type pdf|text|docx|json] [--pages N] [--json] [--no-ocr] \
         [--config settings.json] [--dictionary repairs.json]"
    );
}

fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_path(path)?,
        None => PipelineConfig::default(),
    };
    if args.no_ocr {
        config.ocr.enabled = false;
    }

    let mut dictionary = RepairDictionary::builtin();
    if let Some(path) = &args.dictionary {
        dictionary.extend(&RepairDictionary::from_path(path)?);
    }

    let document = match args.media_type {
        Some(media_type) => SourceDocument::new(std::fs::read(&args.input)?, media_type),
        None => SourceDocument::from_path(&args.input)?,
    };

    let ingestor = DocumentIngestor::with_dictionary(config, dictionary);
    if !ingestor.ocr_available() {
        log::info!("OCR engine not available; digital strategies only");
    }
    let outcome = ingestor.ingest(&document, PageLimit::from(args.pages))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        for warning in &outcome.warnings {
            eprintln!("warning: {}", warning);
        }
        eprintln!(
            "method: {}, quality: {}, score: {:.1}, {} chars",
            outcome.method, outcome.quality, outcome.score, outcome.statistics.total_characters
        );
        println!("{}", outcome.text());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let args = match CliArgs::from_args() {
        Ok(args) => args,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("Error: {}", msg);
            }
            usage();
            return ExitCode::from(2);
        },
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}
