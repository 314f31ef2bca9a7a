use clap::{Parser, Subcommand};
use passport_photo::config::{self, PipelineConfig};
use passport_photo::imaging::{decode_bitmap, is_document_path, supported_input_extensions};
use passport_photo::output;
use passport_photo::tools::{Engine, Tool, ToolInput, ToolOutput, ToolRequest, parse_size, run_all};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type JobError = Box<dyn std::error::Error + Send + Sync>;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "passport-photo")]
#[command(about = "Passport photos, background removal, size-capped JPEGs, PDFs and QR codes")]
#[command(long_about = "\
Passport photos, background removal, size-capped JPEGs, PDFs and QR codes

Every command takes one or more files and writes one result per file into
the output directory, named <input-stem>-<result>:

  portrait.jpg  (passport)      out/portrait-passport_compressed.jpg
  portrait.jpg  (remove-bg)     out/portrait-no_bg.png
  scan.pdf      (pdf-to-image)  out/scan-page_1.jpg

Files are processed in parallel. Inputs ending in .pdf are read as PDF
documents; everything else is decoded as an image (JPEG, PNG, TIFF, WebP).

Run 'passport-photo gen-config' to generate a documented passport-photo.toml.
Set RUST_LOG=debug to see per-stage details and failure causes.")]
#[command(version = version_string())]
struct Cli {
    /// Config file (default: ./passport-photo.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output directory
    #[arg(long, default_value = ".", global = true)]
    output: PathBuf,

    /// Print one JSON object per result instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Passport photo: plain backdrop, face-centered 35:45 crop, 413×531, size-capped JPEG
    Passport {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Skip the size cap and encode at HD quality
        #[arg(long)]
        hd: bool,
    },
    /// Cut the subject out onto a transparent PNG
    RemoveBg {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Replace the backdrop with a solid color
    Background {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// blue, white, red, grey, or #rrggbb (default from config)
        #[arg(long)]
        color: Option<String>,
    },
    /// Keep the subject sharp and blur everything behind it
    Blur {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Re-encode as a JPEG no larger than --size
    Compress {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Target size, e.g. 50kb or 2mb
        #[arg(long, value_parser = size_arg)]
        size: f64,
    },
    /// Convert any supported image to JPEG
    Convert {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Wrap each image in a single-page PDF
    Pdf {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Render the first page of each PDF to JPEG
    PdfToImage {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Render TEXT as a QR code PNG
    Qr { text: String },
    /// Print a stock passport-photo.toml with all options documented
    GenConfig,
}

fn size_arg(value: &str) -> Result<f64, String> {
    parse_size(value).ok_or_else(|| format!("invalid size '{value}': expected e.g. 50kb or 2mb"))
}

/// Where a request's input comes from.
enum Source {
    File(PathBuf),
    Text(String),
}

/// One unit of CLI work.
struct Job {
    source: Source,
    tool: Tool,
}

impl Job {
    /// Display name: the input's file name, or `qr` for text.
    fn label(&self) -> String {
        match &self.source {
            Source::File(path) => path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Source::Text(_) => "qr".to_string(),
        }
    }

    /// `<input-stem>-<file_name>` for files, the bare `file_name` for text.
    fn output_name(&self, file_name: &str) -> String {
        match &self.source {
            Source::File(path) => match path.file_stem() {
                Some(stem) => format!("{}-{}", stem.to_string_lossy(), file_name),
                None => file_name.to_string(),
            },
            Source::Text(_) => file_name.to_string(),
        }
    }

    /// Read and classify the input: `.pdf` files stay raw document bytes,
    /// everything else is decoded into a bitmap.
    fn prepare(&self) -> Result<ToolRequest, JobError> {
        let input = match &self.source {
            Source::Text(text) => ToolInput::Text(text.clone()),
            Source::File(path) => read_input(path)?,
        };
        Ok(ToolRequest::new(input, self.tool.clone()))
    }
}

fn read_input(path: &Path) -> Result<ToolInput, JobError> {
    let bytes = std::fs::read(path)?;
    if is_document_path(path) {
        return Ok(ToolInput::Document(bytes));
    }
    Ok(ToolInput::Bitmap(decode_bitmap(&bytes)?))
}

/// Budget the size-constrained encoder was asked to meet, if the tool runs it.
fn budget_for(tool: &Tool, config: &PipelineConfig) -> Option<f64> {
    match tool {
        Tool::Passport { hd: false } => Some(config.passport.budget_kb),
        Tool::Compress { target_kb } => Some(*target_kb),
        _ => None,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(&std::env::current_dir()?)?,
    };
    init_thread_pool(&config.processing);

    let jobs = plan_jobs(cli.command, &config);
    let engine = Engine::from_config(&config)?;
    let (segmenter, has_detector, rasterizer) = engine.describe();
    debug!(
        segmenter,
        has_detector,
        rasterizer,
        formats = ?supported_input_extensions(),
        jobs = jobs.len(),
        "engine ready"
    );

    std::fs::create_dir_all(&cli.output)?;
    let outcomes = run_jobs(&engine, &jobs);

    let mut failed = 0;
    let mut taken = HashSet::new();
    for (index, (job, outcome)) in jobs.iter().zip(outcomes).enumerate() {
        let label = job.label();
        let written = outcome.and_then(|out| {
            let name = output::unique_file_name(&job.output_name(&out.file_name), &mut taken);
            let path = cli.output.join(name);
            std::fs::write(&path, &out.bytes)?;
            Ok((path, out))
        });
        match written {
            Ok((path, out)) if cli.json => output::print_json(&label, Some((&path, &out))),
            Ok((path, out)) => output::print_result(
                index + 1,
                &label,
                &path,
                &out,
                budget_for(&job.tool, &config),
            ),
            Err(e) => {
                failed += 1;
                debug!(input = %label, error = %e, "processing failed");
                if cli.json {
                    output::print_json(&label, None);
                } else {
                    output::print_failure(index + 1, &label);
                }
            }
        }
    }

    if !cli.json {
        output::print_summary(jobs.len(), failed);
    }
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn plan_jobs(command: Command, config: &PipelineConfig) -> Vec<Job> {
    let (files, tool) = match command {
        Command::Qr { text } => {
            return vec![Job {
                source: Source::Text(text),
                tool: Tool::Qr,
            }];
        }
        Command::GenConfig => return Vec::new(),
        Command::Passport { files, hd } => (files, Tool::Passport { hd }),
        Command::RemoveBg { files } => (files, Tool::RemoveBackground),
        Command::Background { files, color } => {
            let color = color.unwrap_or_else(|| config.background.default_color.clone());
            (files, Tool::Background { color })
        }
        Command::Blur { files } => (files, Tool::Blur),
        Command::Compress { files, size } => (files, Tool::Compress { target_kb: size }),
        Command::Convert { files } => (files, Tool::Convert),
        Command::Pdf { files } => (files, Tool::PdfCreate),
        Command::PdfToImage { files } => (files, Tool::PdfToImage),
    };
    files
        .into_iter()
        .map(|path| Job {
            source: Source::File(path),
            tool: tool.clone(),
        })
        .collect()
}

/// Read inputs in parallel, run every readable one through the engine, and
/// line the outcomes back up with `jobs`.
fn run_jobs(engine: &Engine, jobs: &[Job]) -> Vec<Result<ToolOutput, JobError>> {
    let prepared: Vec<Result<ToolRequest, JobError>> = jobs.par_iter().map(Job::prepare).collect();

    let mut requests = Vec::new();
    let read_errors: Vec<Option<JobError>> = prepared
        .into_iter()
        .map(|p| match p {
            Ok(request) => {
                requests.push(request);
                None
            }
            Err(e) => Some(e),
        })
        .collect();

    let mut ran = run_all(engine, requests).into_iter();
    read_errors
        .into_iter()
        .map(|read_error| match read_error {
            Some(e) => Err(e),
            None => match ran.next() {
                Some(result) => result.map_err(JobError::from),
                None => Err("missing result".into()),
            },
        })
        .collect()
}

/// Log to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the config can only lower it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
