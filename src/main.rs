use anyhow::{Context, Result};
use langforge::config::{RuntimeConfig, TranslationProvider};
use langforge::context::{DirectoryOverrides, RuntimeContext};
use langforge::google_translate::GoogleFallbackProvider;
use langforge::llm::LLMBatchClient;
use langforge::media::{AudioOptions, MediaEngine};
use langforge::ollama::OllamaClient;
use langforge::output_writer::HtmlBatchWriter;
use langforge::sentence_source::{LineSentenceSource, SentenceSource};
use langforge::transliterate::{PassthroughTransliterator, TransliterationMode, Transliterator};
use langforge::translation_engine::TranslationEngine;
use langforge::{print_summary, PipelineCoordinator};
use langforge::batch_exporter::BatchExporter;
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "langforge")]
#[command(version, about = "Concurrent bilingual study-material pipeline")]
#[command(
    long_about = "Translates and synthesizes study material (audio, video blocks, batched HTML) from a plain-text sentence source."
)]
struct Cli {
    /// Input file, one sentence per non-blank line
    input: std::path::PathBuf,

    /// Output directory for batched HTML (defaults to the resolved output dir)
    #[arg(short, long)]
    output: Option<std::path::PathBuf>,

    /// Source language code (e.g., en, ja, es)
    #[arg(short, long, default_value = "en")]
    language: String,

    /// Target language codes, comma-separated (e.g., fr,es)
    #[arg(short, long, default_value = "fr")]
    targets: String,

    /// Per-job model override (takes precedence over the configured ollama_model)
    #[arg(long)]
    model: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Suppress the run summary
    #[arg(short, long)]
    quiet: bool,

    /// Validate configuration and inputs without running the pipeline
    #[arg(long)]
    dry_run: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }

    let targets: Vec<String> = cli.targets.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    if targets.is_empty() {
        anyhow::bail!("At least one target language is required");
    }

    let config = RuntimeConfig::load().context("failed to load configuration")?;
    config.validate().context("configuration validation failed")?;

    let overrides = DirectoryOverrides {
        output_dir: cli.output.clone(),
        ..DirectoryOverrides::default()
    };
    let context = RuntimeContext::build(&config, &overrides).context("failed to resolve runtime directories")?;
    let context = context.with_job_model_override(cli.model.as_deref());

    if !cli.quiet {
        info!("Input:        {}", cli.input.display());
        info!("Output dir:   {}", context.output_dir.display());
        info!("Source lang:  {}", cli.language);
        info!("Targets:      {}", targets.join(", "));
        info!("Model:        {} ({:?})", context.ollama_model, context.ollama_model_source);
    }

    if cli.dry_run {
        println!();
        println!("Dry run validation successful:");
        println!("  input:       {} (exists)", cli.input.display());
        println!("  output dir:  {}", context.output_dir.display());
        println!("  source lang: {}", cli.language);
        println!("  targets:     {}", targets.join(", "));
        println!("  provider:    {:?}", config.translation_provider);
        println!();
        println!("Run without --dry-run to process the file.");
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    let stop_clone = stop.clone();
    ctrlc::set_handler(move || {
        if stop_clone.load(Ordering::Relaxed) {
            std::process::exit(1);
        }
        eprintln!("\nReceived Ctrl+C, cancelling... (press again to force quit)");
        stop_clone.store(true, Ordering::Relaxed);
    })
    .ok();

    let sentences = LineSentenceSource::new(&std::fs::read_to_string(&cli.input)?).sentences();
    let progress = langforge::progress::shared(sentences.len());

    let llm = match config.translation_provider {
        TranslationProvider::Llm => {
            let transport: Arc<dyn langforge::llm::LLMClient> = Arc::new(OllamaClient::new(context.ollama_url.clone()));
            Some(Arc::new(LLMBatchClient::new(transport, context.ollama_model.clone())))
        }
        TranslationProvider::Googletrans => None,
    };
    let google = matches!(config.translation_provider, TranslationProvider::Googletrans)
        .then(|| Arc::new(GoogleFallbackProvider::new(Some(progress.clone()))));

    let transliterator = config.include_transliteration.then(|| {
        Arc::new(Transliterator::new(
            TransliterationMode::RuleBasedThenLlm,
            Arc::new(PassthroughTransliterator),
            llm.clone(),
            progress.clone(),
        ))
    });

    let translation_engine = Arc::new(TranslationEngine::new(
        config.translation_provider,
        llm,
        google,
        transliterator,
        config.normalized_batch_size(),
        context.thread_count,
        progress.clone(),
        config.include_transliteration,
    ));

    let media_engine = Arc::new(MediaEngine::new(
        None,
        cli.language.clone(),
        config.generate_audio,
        AudioOptions::default(),
        progress.clone(),
    ));

    let writer = Arc::new(HtmlBatchWriter::new(context.output_dir.clone(), config.output_html, config.output_pdf));
    let exporter = Arc::new(BatchExporter::new(writer, config.sentences_per_output_file));

    let coordinator = PipelineCoordinator::new(
        translation_engine,
        media_engine,
        exporter,
        progress,
        context.thread_count,
        context.queue_size,
    );

    let stats = coordinator.run(sentences, cli.language, targets, stop).await;
    if !cli.quiet {
        print_summary(&stats);
    } else {
        info!(sentences = stats.total_sentences, "pipeline finished");
    }

    if stats.snapshot.completed_media < stats.total_sentences {
        error!("pipeline finished without completing every sentence (cancelled or exhausted retries)");
    }

    Ok(())
}
