//! CLI for retouch - prompt-driven image editing.

use clap::{Args, Parser, Subcommand, ValueEnum};
use retouch::editor::{Editor, Progress};
use retouch::image::{EditProvider, EditRequest, ImageFormat, ReplicateProvider};
use retouch::server::{ServerConfig, DEFAULT_BIND};
use retouch::simulate::SimulationOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "retouch")]
#[command(about = "Edit images with a text instruction via Replicate or Hugging Face")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit an image according to an instruction
    Edit(EditArgs),

    /// Run the credential-holding relay
    Serve(ServeArgs),

    /// List available providers
    Providers {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct EditArgs {
    /// Image to edit
    input: PathBuf,

    /// What to change
    prompt: String,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Provider to use
    #[arg(short, long, value_enum, default_value = "replicate")]
    provider: ProviderArg,

    /// Provider API key (falls back to REPLICATE_API_TOKEN or HF_API_TOKEN)
    #[arg(long)]
    api_key: Option<String>,

    /// Go through a relay instead of calling Replicate directly
    #[arg(long, env = "RETOUCH_PROXY_URL")]
    proxy: Option<String>,

    /// Seed for the local simulation
    #[arg(long)]
    seed: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "RETOUCH_BIND", default_value = DEFAULT_BIND)]
    bind: SocketAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderArg {
    Replicate,
    Huggingface,
    Simulate,
}

impl ProviderArg {
    fn env_var(self) -> Option<&'static str> {
        match self {
            Self::Replicate => Some("REPLICATE_API_TOKEN"),
            Self::Huggingface => Some("HF_API_TOKEN"),
            Self::Simulate => None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("retouch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Edit(args) => {
            edit_image(args).await?;
        }
        Commands::Serve(args) => {
            serve(args).await?;
        }
        Commands::Providers { json } => {
            list_providers(json)?;
        }
    }

    Ok(())
}

fn build_provider(args: &EditArgs) -> anyhow::Result<Option<Arc<dyn EditProvider>>> {
    let provider: Arc<dyn EditProvider> = match args.provider {
        ProviderArg::Simulate => return Ok(None),
        ProviderArg::Replicate => {
            let builder = ReplicateProvider::builder();
            let builder = match &args.proxy {
                Some(url) => builder.proxy(url.clone()),
                None => builder,
            };
            Arc::new(builder.build())
        }
        ProviderArg::Huggingface => {
            #[cfg(feature = "huggingface")]
            {
                if args.proxy.is_some() {
                    anyhow::bail!("--proxy only applies to the replicate provider");
                }
                Arc::new(retouch::image::HuggingFaceProvider::builder().build())
            }
            #[cfg(not(feature = "huggingface"))]
            {
                anyhow::bail!("Hugging Face provider not enabled");
            }
        }
    };
    Ok(Some(provider))
}

async fn edit_image(args: EditArgs) -> anyhow::Result<()> {
    let source = std::fs::read(&args.input)?;

    let credential = args
        .api_key
        .clone()
        .or_else(|| args.provider.env_var().and_then(|v| std::env::var(v).ok()));

    let mut request = EditRequest::new(source, &args.prompt);
    if let Some(key) = credential {
        request = request.with_credential(key);
    }

    let mut options = SimulationOptions::default();
    if let Some(seed) = args.seed {
        options = options.with_seed(seed);
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut editor = Editor::new(options).with_progress(tx);
    if let Some(provider) = build_provider(&args)? {
        editor = editor.with_provider(provider);
    }

    let quiet = args.json;
    let printer = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            if quiet {
                continue;
            }
            match progress {
                Progress::Submitting { provider } => eprintln!("Submitting to {provider}..."),
                Progress::FallingBack { reason } => {
                    eprintln!("Remote edit failed ({}): {}", reason.kind, reason.detail);
                    eprintln!("Falling back to local simulation");
                }
                Progress::Simulating => eprintln!("Simulating edit locally..."),
                Progress::Done { .. } => {}
            }
        }
    });

    let result = editor.edit(&request).await;
    drop(editor);
    let _ = printer.await;
    let outcome = result?;
    let image = &outcome.image;

    if let Some(ext) = args.output.extension().and_then(|e| e.to_str()) {
        if ImageFormat::from_extension(ext) != Some(image.format) {
            tracing::warn!(
                requested = ext,
                actual = image.format.extension(),
                "output extension does not match image format"
            );
        }
    }

    image.save(&args.output)?;

    if args.json {
        let result = serde_json::json!({
            "success": true,
            "output": args.output.display().to_string(),
            "size_bytes": image.size(),
            "format": image.format.extension(),
            "source": image.source.to_string(),
            "model": image.metadata.model,
            "seed": image.metadata.seed,
            "job_id": image.metadata.job_id,
            "duration_ms": image.metadata.duration_ms,
            "fallback": outcome.fallback,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Edited image: {} ({} bytes) via {}",
            args.output.display(),
            image.size(),
            image.source
        );
        if let Some(duration) = image.metadata.duration_ms {
            println!("Duration: {}ms", duration);
        }
    }

    Ok(())
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = ServerConfig {
        bind: args.bind,
        ..Default::default()
    };
    retouch::server::serve(config).await?;
    Ok(())
}

fn list_providers(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ProviderInfo {
        name: &'static str,
        kind: &'static str,
        env_var: Option<&'static str>,
        enabled: bool,
    }

    let providers = vec![
        ProviderInfo {
            name: "Replicate (Flux Kontext)",
            kind: "replicate",
            env_var: ProviderArg::Replicate.env_var(),
            enabled: true,
        },
        ProviderInfo {
            name: "Hugging Face (Stable Diffusion inpainting)",
            kind: "huggingface",
            env_var: ProviderArg::Huggingface.env_var(),
            enabled: cfg!(feature = "huggingface"),
        },
        ProviderInfo {
            name: "Local simulation",
            kind: "simulate",
            env_var: ProviderArg::Simulate.env_var(),
            enabled: true,
        },
    ];

    if json_output {
        println!("{}", serde_json::to_string_pretty(&providers)?);
    } else {
        println!("Available providers:\n");
        for p in &providers {
            let status = if p.enabled { "✓" } else { "✗" };
            println!("  {} {} ({})", status, p.name, p.kind);
            if let Some(env_var) = p.env_var {
                println!("    API key: {}", env_var);
            }
        }
    }

    Ok(())
}
