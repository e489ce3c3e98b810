//! narrate - Turn documents and web articles into narrated audio

mod audio;
mod chat;
mod config;
mod error;
mod extract;
mod progress;
mod rewrite;
mod session;
mod stage;
mod text;
mod tts;
mod workflow;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use config::NarrateConfig;
use llm_client::LlmProvider;
use progress::{ConsoleProgress, LogProgress, ProgressSink};
use rewrite::{FailurePolicy, LlmRewriter};
use session::{SessionStore, Stage, WorkflowContext};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tts::{BackendSettings, SpeechBackend, SpeechSynthesizer};
use workflow::UploadOutcome;

/// Characters of fetched text shown after `fetch`
const PREVIEW_CHARS: usize = 1000;

#[derive(Parser, Debug)]
#[command(name = "narrate")]
#[command(about = "Turn documents and web articles into narrated audio", long_about = None)]
#[command(version)]
struct Args {
    /// Enable debug output
    #[arg(short, long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Step 1: load PDF, DOCX or text files as the source
    Upload {
        /// Files to read, joined in the given order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Re-read the files even if they are already loaded
        #[arg(long)]
        force: bool,
    },
    /// Step 1: load a web article as the source
    Fetch {
        /// Article URL
        url: String,
    },
    /// Step 2: rewrite the source for narration
    Rewrite {
        /// LLM preset (see llm.toml)
        #[arg(long)]
        model: Option<String>,

        /// Chunks rewritten at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// What to do with a chunk that fails
        #[arg(long, value_enum)]
        on_failure: Option<FailurePolicy>,
    },
    /// Step 3: synthesize the rewritten text
    Generate {
        #[command(flatten)]
        speech: SpeechArgs,
    },
    /// Upload or fetch, rewrite and generate in one go
    Run {
        /// File path or http(s) URL
        source: String,

        /// LLM preset for the rewrite
        #[arg(long)]
        model: Option<String>,

        #[command(flatten)]
        speech: SpeechArgs,
    },
    /// Ask the assistant a question
    Chat {
        /// Question or instruction
        prompt: String,

        /// LLM preset (see llm.toml)
        #[arg(long)]
        model: Option<String>,
    },
    /// Show where the workflow stands
    Status,
    /// Print stored text
    Show {
        #[arg(value_enum)]
        what: ShowTarget,
    },
    /// Discard the current workflow
    Reset,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct SpeechArgs {
    /// Output file (.mp3 or .wav); a temporary file otherwise
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Language code, e.g. "en"
    #[arg(long)]
    language: Option<String>,

    /// Voice name (OpenAI backend)
    #[arg(long)]
    voice: Option<String>,

    /// Speech backend
    #[arg(long, value_enum)]
    backend: Option<SpeechBackend>,

    /// Skip narration pauses within chunks
    #[arg(long)]
    no_storyteller: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ShowTarget {
    Original,
    Rewritten,
    Chat,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Set default speech language
    SetLanguage {
        /// Language code, e.g. "en" or "fr"
        language: String,
    },
    /// Set default voice
    SetVoice {
        /// Voice name, e.g. "alloy"
        voice: String,
    },
    /// Set pause inserted after each audio chunk
    SetPause {
        /// Milliseconds
        ms: u32,
    },
    /// Set default speech backend
    SetBackend {
        #[arg(value_enum)]
        backend: SpeechBackend,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    match args.command {
        Commands::Config { action } => handle_config_command(&action),
        command => run_workflow_command(command).await,
    }
}

async fn run_workflow_command(command: Commands) -> Result<()> {
    let config = NarrateConfig::load().context("Failed to load configuration")?;
    let store = SessionStore::open_default()?;
    let mut context = store.load_or_default()?;

    match command {
        Commands::Upload { files, force } => {
            upload(&mut context, &files, force)?;
            store.save(&context)?;
        }
        Commands::Fetch { url } => {
            fetch(&mut context, &url).await?;
            store.save(&context)?;
            eprintln!();
            println!("{}", preview(&context.original_text, PREVIEW_CHARS));
        }
        Commands::Rewrite {
            model,
            concurrency,
            on_failure,
        } => {
            let mut settings = config.rewrite.clone();
            if let Some(n) = concurrency {
                settings.concurrency = n;
            }
            if let Some(policy) = on_failure {
                settings.on_failure = policy;
            }
            rewrite(&mut context, &settings, model.as_deref()).await?;
            store.save(&context)?;
        }
        Commands::Generate { speech } => {
            generate(&mut context, &config, &speech).await?;
            store.save(&context)?;
        }
        Commands::Run {
            source,
            model,
            speech,
        } => {
            if is_url(&source) {
                fetch(&mut context, &source).await?;
            } else {
                upload(&mut context, &[PathBuf::from(&source)], true)?;
            }
            store.save(&context)?;

            rewrite(&mut context, &config.rewrite, model.as_deref()).await?;
            store.save(&context)?;

            generate(&mut context, &config, &speech).await?;
            store.save(&context)?;
        }
        Commands::Chat { prompt, model } => {
            let preset = model.or_else(|| config.chat.preset.clone());
            let provider = build_llm_provider(preset.as_deref(), "chat")?;
            let assistant = chat::ChatAssistant::new(provider)
                .with_system_prompt(&config.chat.system_prompt)
                .with_temperature(config.chat.temperature);

            let result = assistant.ask(&mut context, &prompt).await;
            // Keep the question even when the request failed
            store.save(&context)?;
            println!("{}", result?);
        }
        Commands::Status => print_status(&context, &store),
        Commands::Show { what } => match what {
            ShowTarget::Original => print_text(&context.original_text, "No source text loaded."),
            ShowTarget::Rewritten => print_text(&context.rewritten_text, "Nothing rewritten yet."),
            ShowTarget::Chat => {
                if context.messages.is_empty() {
                    eprintln!("No chat history.");
                }
                for message in &context.messages {
                    println!("[{:?}] {}", message.role, message.content);
                    println!();
                }
            }
        },
        Commands::Reset => {
            if store.clear()? {
                eprintln!("Workflow reset.");
            } else {
                eprintln!("Nothing to reset.");
            }
        }
        Commands::Config { action } => handle_config_command(&action)?,
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let mut builder = if debug {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(log::LevelFilter::Debug);
        builder
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
    };
    builder.format_timestamp(None).init();
}

fn upload(context: &mut WorkflowContext, files: &[PathBuf], force: bool) -> Result<()> {
    for file in files {
        if !file.exists() {
            anyhow::bail!("File not found: {}", file.display());
        }
    }

    eprintln!("Extracting text from {} file(s)...", files.len());
    match workflow::upload_files(context, files, force)? {
        UploadOutcome::Unchanged => {
            eprintln!("Those files are already loaded (use --force to re-read them).");
        }
        UploadOutcome::Loaded(extraction) => {
            for (path, reason) in &extraction.failures {
                eprintln!("  {}: FAILED - {}", path.display(), reason);
            }
            eprintln!(
                "Loaded {} characters. Session: {}",
                context.original_text.chars().count(),
                context.session_id
            );
        }
    }
    eprintln!("Next: {}", context.stage());
    Ok(())
}

async fn fetch(context: &mut WorkflowContext, url: &str) -> Result<()> {
    eprintln!("Fetching article: {}", url);
    workflow::fetch_url(context, url)
        .await
        .with_context(|| format!("Failed to fetch {}", url))?;
    eprintln!(
        "Loaded {} characters. Session: {}",
        context.original_text.chars().count(),
        context.session_id
    );
    Ok(())
}

async fn rewrite(
    context: &mut WorkflowContext,
    settings: &config::RewriteSettings,
    model: Option<&str>,
) -> Result<()> {
    let preset = model.or(settings.preset.as_deref());
    let provider = build_llm_provider(preset, "rewrite")?;
    let rewriter = LlmRewriter::new(provider)
        .with_system_prompt(&settings.system_prompt)
        .with_temperature(settings.temperature)
        .with_max_tokens(settings.max_tokens);

    eprintln!("Rewriting with {}...", rewriter.describe());
    let mut sink = progress_sink("Rewriting...");
    let report = workflow::rewrite_source(context, settings, &rewriter, sink.as_mut()).await?;

    eprintln!(
        "Rewrote {}/{} chunks ({} characters).",
        report.succeeded(),
        report.total_chunks,
        report.text.chars().count()
    );
    if !report.failed.is_empty() {
        let failed: Vec<String> = report.failed.iter().map(|i| (i + 1).to_string()).collect();
        eprintln!("Failed chunks: {}", failed.join(", "));
    }
    Ok(())
}

async fn generate(
    context: &mut WorkflowContext,
    config: &NarrateConfig,
    args: &SpeechArgs,
) -> Result<()> {
    let mut settings = config.speech.clone();
    if let Some(language) = &args.language {
        settings.language = language.clone();
    }
    if let Some(voice) = &args.voice {
        settings.voice = Some(voice.clone());
    }
    if let Some(backend) = args.backend {
        settings.backend = backend;
    }
    if args.no_storyteller {
        settings.storyteller = false;
    }

    let synthesizer = build_synthesizer(&settings)?;
    let ffmpeg = audio::Ffmpeg::new(config.ffmpeg_path.clone());

    eprintln!("Generating audio with {}...", synthesizer.name());
    let mut sink = progress_sink("Generating audio...");
    let assembled = workflow::generate_audio(
        context,
        &settings,
        synthesizer.as_ref(),
        &settings.tts_options(),
        args.output.as_deref(),
        &ffmpeg,
        sink.as_mut(),
    )
    .await?;

    eprintln!(
        "Output: {} ({}, {:.1}s)",
        assembled.path.display(),
        assembled.mime_type(),
        assembled.duration_ms as f64 / 1000.0
    );
    Ok(())
}

/// Build an LLM provider from a preset name or the task default.
fn build_llm_provider(preset: Option<&str>, task: &str) -> Result<Box<dyn LlmProvider>> {
    let llm_config = llm_client::Config::load().context("Failed to load LLM configuration")?;
    let name = preset.unwrap_or_else(|| llm_config.get_default_for_task(task));
    let preset = llm_config.get_preset(name)?;
    log::debug!("{} preset: {} ({})", task, name, preset.model);

    let provider = llm_client::get_provider(
        preset,
        llm_config.get_provider_config(&preset.provider),
    )?;
    Ok(provider)
}

fn build_synthesizer(settings: &config::SpeechSettings) -> Result<Box<dyn SpeechSynthesizer>> {
    let api_key = match settings.backend {
        SpeechBackend::OpenAi => llm_client::Config::load()
            .ok()
            .and_then(|c| c.get_provider_config("openai").and_then(|p| p.api_key.clone())),
        SpeechBackend::Google => None,
    };

    tts::create_backend(&BackendSettings {
        backend: settings.backend,
        openai_model: settings.openai_model.clone(),
        openai_base_url: settings.openai_base_url.clone(),
        api_key,
    })
}

fn progress_sink(label: &str) -> Box<dyn ProgressSink> {
    if std::io::stderr().is_terminal() {
        Box::new(ConsoleProgress::new(label))
    } else {
        Box::new(LogProgress)
    }
}

fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

fn print_text(text: &str, empty_message: &str) {
    if text.is_empty() {
        eprintln!("{}", empty_message);
    } else {
        println!("{}", text);
    }
}

fn print_status(context: &WorkflowContext, store: &SessionStore) {
    println!("Session file: {}", store.session_file().display());
    println!();
    println!("stage = {}", context.stage());
    println!("next = {}", next_step(context.stage()));
    if context.session_id.is_empty() {
        println!("session = (none)");
    } else {
        println!("session = {}", context.session_id);
    }
    if context.sources.is_empty() {
        println!("sources = (none)");
    } else {
        println!("sources = {}", context.sources.join(", "));
    }
    println!("original = {} chars", context.original_text.chars().count());
    println!("rewritten = {} chars", context.rewritten_text.chars().count());
    match &context.audio_path {
        Some(path) => println!("audio = \"{}\"", display_path(path)),
        None => println!("audio = (none)"),
    }
    println!("chat = {} messages", context.messages.len());
}

/// Command that moves the workflow forward from `stage`.
fn next_step(stage: Stage) -> &'static str {
    match stage {
        Stage::Upload => "narrate upload <FILES> or narrate fetch <URL>",
        Stage::Rewrite => "narrate rewrite",
        Stage::Generate => "narrate generate or narrate chat <PROMPT>",
    }
}

fn display_path(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (missing)", path.display())
    }
}

fn handle_config_command(action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = NarrateConfig::load()?;
            println!("Configuration file: {:?}", NarrateConfig::config_path()?);
            println!();
            println!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", NarrateConfig::config_path()?.display());
        }
        ConfigAction::SetLanguage { language } => {
            let mut config = NarrateConfig::load()?;
            config.speech.language = language.clone();
            config.save()?;
            println!("Default language set to: {}", language);
        }
        ConfigAction::SetVoice { voice } => {
            let mut config = NarrateConfig::load()?;
            config.speech.voice = Some(voice.clone());
            config.save()?;
            println!("Default voice set to: {}", voice);
        }
        ConfigAction::SetPause { ms } => {
            let mut config = NarrateConfig::load()?;
            config.speech.pause_ms = *ms;
            config.save()?;
            println!("Pause between chunks set to: {} ms", ms);
        }
        ConfigAction::SetBackend { backend } => {
            let mut config = NarrateConfig::load()?;
            config.speech.backend = *backend;
            config.save()?;
            println!("Default speech backend set to: {:?}", backend);
        }
    }
    Ok(())
}
