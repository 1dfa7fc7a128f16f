use crate::{
    config::Config,
    document::FileBlob,
    engine::{EngineSet, python::PythonEngine},
    postprocess::Normalizer,
    report::JobReport,
    service::{ProcessRequest, Service},
    util::{ensure_dir, now_rfc3339, sha256_hex},
};
use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "inkbridge")]
#[command(about = "OCR engine cascade and translation orchestrator")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./inkbridge.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct InputArgs {
    /// Image or PDF to read.
    #[arg(long, conflicts_with = "text")]
    pub input: Option<PathBuf>,

    /// Inline text instead of a file.
    #[arg(long)]
    pub text: Option<String>,

    /// Declared mimetype; sniffed from content when omitted.
    #[arg(long)]
    pub mimetype: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Doctor {},
    Ocr {
        #[command(flatten)]
        input: InputArgs,
        /// Language hint for the OCR engines.
        #[arg(long, default_value = "en")]
        lang: String,
    },
    Translate {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long, default_value = "auto")]
        source: String,
        #[arg(long, default_value = "en")]
        target: String,
    },
    Classify {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        mimetype: Option<String>,
        #[arg(long, default_value = "en")]
        lang: String,
    },
    Normalize {
        #[arg(long)]
        input: PathBuf,
        /// Use the indentation-preserving code normalizer.
        #[arg(long)]
        code: bool,
    },
}

pub fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref()) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    match &args.cmd {
        Command::Doctor {} => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;
            doctor(&cfg)
        }
        Command::Ocr { input, lang } => {
            let req = ProcessRequest {
                option: "ocr".into(),
                target_lang: lang.clone(),
                ..ProcessRequest::default()
            };
            process(&args, &cfg, input, req)
        }
        Command::Translate {
            input,
            source,
            target,
        } => {
            let req = ProcessRequest {
                option: "translate".into(),
                source_lang: source.clone(),
                target_lang: target.clone(),
                ..ProcessRequest::default()
            };
            process(&args, &cfg, input, req)
        }
        Command::Classify {
            input,
            mimetype,
            lang,
        } => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;
            classify(&cfg, input, mimetype.clone(), lang)
        }
        Command::Normalize { input, code } => {
            let _guard = init_logging(&args, &cfg, resolve_log_path(&cfg).as_deref())?;
            normalize(&cfg, input, *code)
        }
    }
}

fn resolve_config_path(user: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = user {
        return Some(p.to_path_buf());
    }
    ["inkbridge.toml", "inkbridge.example.toml"]
        .into_iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries the JSON result, so logs go to stderr.
    let console_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn doctor(cfg: &Config) -> Result<()> {
    let engine = PythonEngine::new(cfg)?;
    let diag = engine.doctor()?;
    println!("{}", serde_json::to_string_pretty(&diag)?);
    Ok(())
}

fn process(args: &Args, cfg: &Config, input: &InputArgs, mut req: ProcessRequest) -> Result<()> {
    // Must precede validate_input, which logs.
    let _guard = init_logging(args, cfg, resolve_log_path(cfg).as_deref())?;

    let input_hash = match (&input.input, &input.text) {
        (Some(path), _) => {
            validate_input(cfg, path)?;
            let blob = FileBlob::from_path(path, input.mimetype.clone())?;
            let hash = sha256_hex(&blob.bytes);
            req.file = Some(blob);
            hash
        }
        (None, Some(text)) => {
            req.text = Some(text.clone());
            sha256_hex(text.as_bytes())
        }
        (None, None) => return Err(anyhow!("pass --input FILE or --text TEXT")),
    };

    let cfg_hash = sha256_hex(cfg.normalized_for_hash().as_bytes());
    let job_key = format!(
        "{cfg_hash}:{}:{}:{}:{input_hash}",
        req.option, req.source_lang, req.target_lang
    );
    let job_id = sha256_hex(job_key.as_bytes());
    let job_dir = PathBuf::from(&cfg.paths.out_dir).join(&job_id);
    let job_dir = (cfg.global.write_report || cfg.debug.dump_effective_config).then_some(job_dir);

    if let Some(dir) = &job_dir {
        ensure_dir(dir)?;
    }
    info!("job_id={job_id}");

    if let Some(dir) = job_dir.as_deref().filter(|_| cfg.debug.dump_effective_config) {
        let raw = toml::to_string(cfg).unwrap_or_default();
        std::fs::write(dir.join("effective-config.toml"), raw)?;
    }
    ensure_dir(Path::new(&cfg.paths.work_dir))?;

    let service = Service::new(cfg, EngineSet::python(cfg)?)?;
    let started = now_rfc3339();
    let response = match service.process(&req) {
        Ok(r) => r,
        Err(err) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "error": err.to_string(),
                    "code": err.error_code(),
                }))?
            );
            return Err(anyhow!(err).context(format!("job {job_id} failed")));
        }
    };

    let report_path = match job_dir.as_deref().filter(|_| cfg.global.write_report) {
        Some(dir) => {
            let report = JobReport {
                job_id: job_id.clone(),
                started,
                finished: now_rfc3339(),
                option: req.option.clone(),
                input: input.input.as_ref().map(|p| p.display().to_string()),
                language: response.language.clone(),
                pages: response.pages.clone(),
            };
            let path = dir.join("report.json");
            std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
            Some(path)
        }
        None => None,
    };

    if cfg.global.print_summary {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "job_id": job_id,
                "kind": response.kind,
                "result": response.result,
                "language": response.language,
                "report": report_path,
            }))?
        );
    } else {
        println!("{}", response.result);
    }

    Ok(())
}

fn classify(cfg: &Config, input: &Path, mimetype: Option<String>, lang: &str) -> Result<()> {
    validate_input(cfg, input)?;
    let service = Service::new(cfg, EngineSet::python(cfg)?)?;
    let blob = FileBlob::from_path(input, mimetype)?;
    let pages = service.pipeline().decode(&blob)?;

    let decisions: Vec<_> = pages
        .iter()
        .map(|page| {
            let c = service.pipeline().classify_page(page, lang);
            serde_json::json!({
                "page": page.index,
                "text_type": c.text_type,
                "probe_valid": c.probe.as_ref().map(|p| p.is_valid),
            })
        })
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "pages": decisions,
        }))?
    );
    Ok(())
}

fn normalize(cfg: &Config, input: &Path, code: bool) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("reading input: {}", input.display()))?;
    let normalizer = Normalizer::from_config(&cfg.normalize)?;
    let text = if code {
        normalizer.normalize_code(&raw)
    } else {
        normalizer.normalize(&raw)
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "text": text }))?
    );
    Ok(())
}

fn validate_input(cfg: &Config, input: &Path) -> Result<()> {
    let input_str = input.display().to_string();

    if cfg.security.reject_url_inputs && looks_like_url(&input_str) {
        return Err(anyhow!("URL inputs are disabled: {input_str}"));
    }

    let meta = std::fs::metadata(input)
        .with_context(|| format!("input does not exist: {}", input.display()))?;
    if !meta.is_file() {
        return Err(anyhow!("input is not a file: {}", input.display()));
    }
    if meta.len() > cfg.limits.max_input_file_bytes {
        return Err(anyhow!(
            "input is {} bytes, limit is {}: {}",
            meta.len(),
            cfg.limits.max_input_file_bytes,
            input.display()
        ));
    }
    if input.extension().is_none() {
        warn!("input has no extension; content will be sniffed: {}", input.display());
    }

    Ok(())
}

fn looks_like_url(s: &str) -> bool {
    let s = s.to_ascii_lowercase();
    s.starts_with("http://") || s.starts_with("https://") || s.starts_with("file://")
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }

    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }

    Some(PathBuf::from(&cfg.paths.out_dir).join("inkbridge.log"))
}
