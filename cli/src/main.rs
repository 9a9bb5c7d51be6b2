//! exreport CLI - executive search report generation
//!
//! Fills Word templates with JSON records and composes the results into
//! shortlist reports.

use clap::{Parser, Subcommand};
use colored::*;
use exreport::report::{
    assemble_shortlist, pair_assessments, process_template, FillOptions, ProcessOutcome,
    ShortlistTemplates,
};
use exreport::usage::{invoke_logged, JsonLinesSink, LogSink, UsageLogger, UsageSink};
use exreport::{CandidateEntry, Document, Record};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Executive search reports from Word templates
#[derive(Parser)]
#[command(
    name = "exreport",
    version,
    about = "Generate executive search reports from Word templates",
    long_about = "exreport - fills {placeholder} tokens in .docx templates with JSON records\n\n\
                  and composes candidate profiles into shortlist reports."
)]
struct Cli {
    /// Append usage events as JSON lines to this file (default: log output)
    #[arg(long, global = true, env = "EXREPORT_USAGE_LOG")]
    usage_log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill a template with one JSON record
    Fill {
        /// Template (.docx)
        template: PathBuf,

        /// Record (.json)
        record: PathBuf,

        /// Output directory
        #[arg(short, long, env = "EXREPORT_OUTPUT_DIR", default_value = "output")]
        output: PathBuf,

        /// Omit the timestamp from the output file name
        #[arg(long)]
        no_timestamp: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build a shortlist report: overview, one page per candidate, end page
    Shortlist {
        /// Overview template (.docx)
        #[arg(long)]
        overview: PathBuf,

        /// Per-candidate template (.docx)
        #[arg(long)]
        candidate_template: PathBuf,

        /// Closing page (.docx)
        #[arg(long)]
        end_page: PathBuf,

        /// Role metadata record (.json)
        #[arg(long)]
        metadata: PathBuf,

        /// Candidate profile records (.json)
        #[arg(long = "candidate", required = true, num_args = 1..)]
        candidates: Vec<PathBuf>,

        /// Assessment records (.json), matched to candidates by full_name
        #[arg(long = "assessment", num_args = 1..)]
        assessments: Vec<PathBuf>,

        /// Search name used in intermediate file names
        #[arg(long, default_value = "shortlist")]
        name: String,

        /// Output directory
        #[arg(short, long, env = "EXREPORT_OUTPUT_DIR", default_value = "output")]
        output: PathBuf,
    },

    /// Concatenate documents, each starting on a new page
    Compose {
        /// Input documents in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Extract plain text from a document
    Text {
        /// Input file path
        input: PathBuf,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List placeholders left in a document
    Placeholders {
        /// Input file path
        input: PathBuf,

        /// Fail if any placeholder remains
        #[arg(long)]
        strict: bool,
    },

    /// Show version information
    Version,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let sink: Box<dyn UsageSink> = match cli.usage_log {
        Some(ref path) => Box::new(JsonLinesSink::new(path)),
        None => Box::new(LogSink),
    };
    let mut logger = UsageLogger::new(sink);

    match cli.command {
        Commands::Fill {
            template,
            record,
            output,
            no_timestamp,
            json,
        } => {
            let options = FillOptions::new()
                .with_output_dir(&output)
                .with_timestamp(!no_timestamp);
            let pb = create_spinner("Filling template...");
            let result = fill_logged(&mut logger, &template, &record, &options);
            pb.finish_and_clear();

            let (Ok(outcome) | Err(outcome)) = &result;
            if json {
                println!("{}", serde_json::to_string_pretty(outcome)?);
            }
            match result {
                Ok(outcome) if !json => println!("{} {}", "✓".green().bold(), outcome),
                Ok(_) => {}
                Err(outcome) => return Err(outcome.message.into()),
            }
        }

        Commands::Shortlist {
            overview,
            candidate_template,
            end_page,
            metadata,
            candidates,
            assessments,
            name,
            output,
        } => {
            let params = json!({
                "metadata": metadata.display().to_string(),
                "candidates": candidates.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                "assessments": assessments.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                "name": &name,
            });
            let templates = ShortlistTemplates::new(overview, candidate_template, end_page);
            let options = FillOptions::new().with_output_dir(&output);

            let pb = create_spinner("Building shortlist...");
            let result = invoke_logged(&mut logger, "shortlist", params, || -> CliResult<String> {
                let metadata = Record::from_path(&metadata)?;
                let profiles = candidates
                    .iter()
                    .map(|path| -> exreport::Result<CandidateEntry> {
                        Ok(CandidateEntry::new(file_name(path), Record::from_path(path)?))
                    })
                    .collect::<exreport::Result<Vec<_>>>()?;
                let assessments = assessments
                    .iter()
                    .map(Record::from_path)
                    .collect::<exreport::Result<Vec<_>>>()?;

                let entries = pair_assessments(profiles, &assessments);
                let outcome = assemble_shortlist(&templates, &metadata, &entries, &name, &options);
                if outcome.success {
                    Ok(outcome.to_string())
                } else {
                    Err(outcome.message.into())
                }
            });
            pb.finish_and_clear();
            println!("{} {}", "✓".green().bold(), result?);
        }

        Commands::Compose { inputs, output } => {
            let params = json!({
                "inputs": inputs.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
                "output": output.display().to_string(),
            });

            let pb = create_spinner("Composing documents...");
            let result = invoke_logged(&mut logger, "compose", params, || -> CliResult<String> {
                let report = exreport::compose_to(&inputs, &output)?;
                Ok(format!(
                    "Composed {} documents ({} sections) into {}",
                    report.documents,
                    report.sections,
                    report.output_file.display()
                ))
            });
            pb.finish_and_clear();
            println!("{} {}", "✓".green().bold(), result?);
        }

        Commands::Text { input, output } => {
            let params = json!({ "input": input.display().to_string() });

            let pb = create_spinner("Reading document...");
            let text = invoke_logged(&mut logger, "text", params, || -> CliResult<String> {
                Ok(exreport::extract_text(&input)?)
            });
            pb.finish_and_clear();
            write_output(output.as_ref(), &text?)?;

            if let Some(path) = output {
                println!("{} Extracted text: {}", "✓".green().bold(), path.display());
            }
        }

        Commands::Placeholders { input, strict } => {
            let params = json!({ "input": input.display().to_string(), "strict": strict });

            let tokens = invoke_logged(&mut logger, "placeholders", params, || -> CliResult<Listing> {
                Ok(Listing(Document::open(&input)?.placeholders()))
            })?;

            if tokens.0.is_empty() {
                println!("{} No placeholders left", "✓".green().bold());
            } else {
                println!("{}", "Placeholders".cyan().bold());
                println!("{}", "─".repeat(40));
                for token in &tokens.0 {
                    println!("{}", token);
                }
                if strict {
                    return Err(format!("{} placeholders remain", tokens.0.len()).into());
                }
            }
        }

        Commands::Version => {
            print_version();
        }
    }

    Ok(())
}

/// Placeholder list as logged in usage previews.
struct Listing(Vec<String>);

impl std::fmt::Display for Listing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

/// Fill `template` from `record`, logging the fill as one usage event.
fn fill_logged<S: UsageSink>(
    logger: &mut UsageLogger<S>,
    template: &Path,
    record: &Path,
    options: &FillOptions,
) -> Result<ProcessOutcome, ProcessOutcome> {
    let params = json!({
        "template": template.display().to_string(),
        "record": record.display().to_string(),
        "output_dir": options.output_dir.display().to_string(),
    });
    invoke_logged(logger, "fill", params, || {
        let outcome = process_template(record, template, options);
        if outcome.success {
            Ok(outcome)
        } else {
            Err(outcome)
        }
    })
}

fn print_version() {
    println!("{} {}", "exreport".green().bold(), env!("CARGO_PKG_VERSION"));
    println!("Executive search report generation from Word templates");
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
        .template("{spinner:.blue} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn write_output(path: Option<&PathBuf>, content: &str) -> CliResult<()> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            writeln!(handle, "{}", content)?;
        }
    }
    Ok(())
}
