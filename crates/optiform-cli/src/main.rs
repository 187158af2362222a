//! `optiform` command line: read a photographed sheet to JSON, list the
//! template registry, or grade a saved answer map against a key.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

use optiform::core::{init_with_level, GrayImage};
use optiform::scoring::{score, AnswerKey};
use optiform::template::{get_template, list_templates};
use optiform::{DebugSink, FormReader, FormReaderConfig, Mark, NullSink};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Pipeline(#[from] optiform::PipelineError),
    #[error(transparent)]
    Template(#[from] optiform::template::TemplateError),
    #[error(transparent)]
    Key(#[from] optiform::scoring::KeyError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Parser)]
#[command(name = "optiform", about = "Optical answer-sheet reader", version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read a sheet photograph and print the structured result as JSON.
    Read {
        image: PathBuf,
        /// Form template id from the registry.
        #[arg(long, default_value = "ygs")]
        template: String,
        /// Grade against this answer-key JSON file and include the report.
        #[arg(long)]
        key: Option<PathBuf>,
        /// Dump intermediate stage images (PGM) into this directory.
        #[arg(long)]
        debug_dir: Option<PathBuf>,
        /// Pretty-print the JSON output.
        #[arg(long)]
        pretty: bool,
    },
    /// List registered form templates.
    Templates,
    /// Grade a saved answer map (question -> letter/"blank") against a key.
    Score {
        #[arg(long)]
        answers: PathBuf,
        #[arg(long)]
        key: PathBuf,
        #[arg(long)]
        pretty: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let _ = init_with_level(level);

    if let Err(err) = run(cli.command) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Read {
            image,
            template,
            key,
            debug_dir,
            pretty,
        } => {
            let template = get_template(&template)?;
            let reader = FormReader::new(template.clone(), FormReaderConfig::for_template(template));

            let result = match debug_dir {
                Some(dir) => {
                    fs::create_dir_all(&dir).map_err(|source| CliError::Io {
                        path: dir.clone(),
                        source,
                    })?;
                    let decoded = load_rgb(&image)?;
                    let mut sink = PgmDumpSink { dir };
                    reader.read_image_with(&decoded, &mut sink)
                }
                None => {
                    let decoded = load_rgb(&image)?;
                    reader.read_image_with(&decoded, &mut NullSink)
                }
            };

            let mut output = serde_json::to_value(&result).expect("result serializes");
            if let Some(key_path) = key {
                let key = load_answer_key(&key_path)?;
                let report = result.score_against(&key);
                output["report"] = serde_json::to_value(&report).expect("report serializes");
            }
            print_json(&output, pretty);
        }
        Command::Templates => {
            let listing = list_templates();
            print_json(&serde_json::to_value(&listing).expect("listing serializes"), true);
        }
        Command::Score {
            answers,
            key,
            pretty,
        } => {
            let key = load_answer_key(&key)?;
            let answer_map: BTreeMap<u32, Mark> = load_json(&answers)?;
            let report = score(&key, &answer_map);
            print_json(&serde_json::to_value(&report).expect("report serializes"), pretty);
        }
    }
    Ok(())
}

fn load_rgb(path: &PathBuf) -> Result<optiform::core::RgbImage, CliError> {
    Ok(optiform::load_rgb_image(path)?)
}

/// Writes each `(stage, image)` pair as `<stage>.pgm`, slashes flattened
/// to dashes.
struct PgmDumpSink {
    dir: PathBuf,
}

impl DebugSink for PgmDumpSink {
    fn record(&mut self, stage: &str, image: &GrayImage) {
        let file = self.dir.join(format!("{}.pgm", stage.replace('/', "-")));
        let mut bytes = format!("P5\n{} {}\n255\n", image.width, image.height).into_bytes();
        bytes.extend_from_slice(&image.data);
        if let Err(err) = fs::write(&file, bytes) {
            log::warn!("could not write {}: {err}", file.display());
        }
    }
}

fn load_answer_key(path: &PathBuf) -> Result<AnswerKey, CliError> {
    let key: AnswerKey = load_json(path)?;
    key.validate()?;
    Ok(key)
}

fn load_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Json {
        path: path.clone(),
        source,
    })
}

fn print_json(value: &serde_json::Value, pretty: bool) {
    let text = if pretty {
        serde_json::to_string_pretty(value).expect("valid JSON value")
    } else {
        serde_json::to_string(value).expect("valid JSON value")
    };
    println!("{text}");
}
