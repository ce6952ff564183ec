use std::{
    io::Write as _,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use sha2::Digest as _;

#[derive(Parser, Debug)]
#[command(name = "mockup", version)]
struct Cli {
    /// JSON config file; unset fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate (or refresh) the derived maps for the configured template.
    Maps(MapsArgs),
    /// Composite every URL and print the JSON batch report.
    Batch(BatchArgs),
    /// Composite a single local swatch into a PNG.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct MapsArgs {
    /// Keep cached maps when the template and mask are unchanged.
    #[arg(long)]
    reuse: bool,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Swatch URL (http, https or file); repeat for several.
    #[arg(long = "url", required = true)]
    urls: Vec<String>,

    /// Directory receiving published mockups. Defaults to `<output_dir>/published`.
    #[arg(long)]
    publish_dir: Option<PathBuf>,

    /// URL prefix for published mockups. Defaults to a file:// URL of the publish dir.
    #[arg(long)]
    base_url: Option<String>,

    /// Worker count override.
    #[arg(long)]
    workers: Option<usize>,

    /// Pretty-print the JSON report.
    #[arg(long)]
    pretty: bool,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Local swatch image.
    #[arg(long)]
    swatch: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => mockup::MockupConfig::from_json_file(path)?,
        None => mockup::MockupConfig::default(),
    };
    match cli.cmd {
        Command::Maps(args) => cmd_maps(cfg, args),
        Command::Batch(args) => cmd_batch(cfg, args),
        Command::Render(args) => cmd_render(cfg, args),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_maps(mut cfg: mockup::MockupConfig, args: MapsArgs) -> anyhow::Result<()> {
    cfg.maps.reuse_cached = args.reuse;
    cfg.validate()?;
    let set = mockup::TemplateSet::load(&cfg.template_path, &cfg.mask_path)?;
    let store = mockup::MapStore::new(cfg.maps.clone());
    let maps = store.ensure(&set, mockup::MapParams::from_config(&cfg))?;

    eprintln!("maps ({}) in {}", maps.size(), store.paths().dir.display());
    for path in [
        store.paths().displacement_path(),
        store.paths().lighting_path(),
        store.paths().adjustment_path(),
    ] {
        eprintln!("  {}", path.display());
    }
    eprintln!("template fingerprint: {}", set.fingerprint());
    Ok(())
}

fn cmd_batch(mut cfg: mockup::MockupConfig, args: BatchArgs) -> anyhow::Result<()> {
    if args.workers.is_some() {
        cfg.workers = args.workers;
    }
    let publish_dir = args
        .publish_dir
        .unwrap_or_else(|| cfg.output_dir.join("published"));
    let base_url = match args.base_url {
        Some(url) => url,
        None => file_url(&publish_dir)?,
    };

    let publisher = Arc::new(mockup::DirPublisher::new(publish_dir, base_url));
    let runner = mockup::BatchRunner::with_http(cfg, publisher)?;

    let (report, fatal) = match runner.process_batch(&args.urls) {
        Ok(report) => (report, None),
        Err(err) => (mockup::BatchReport::aborted(&err), Some(err)),
    };

    let mut stdout = std::io::stdout().lock();
    if args.pretty {
        serde_json::to_writer_pretty(&mut stdout, &report)?;
    } else {
        serde_json::to_writer(&mut stdout, &report)?;
    }
    writeln!(stdout)?;

    match fatal {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn cmd_render(cfg: mockup::MockupConfig, args: RenderArgs) -> anyhow::Result<()> {
    cfg.validate()?;
    let set = mockup::TemplateSet::load(&cfg.template_path, &cfg.mask_path)?;
    let maps = mockup::MapStore::new(cfg.maps.clone())
        .ensure(&set, mockup::MapParams::from_config(&cfg))?;

    let url = file_url(&args.swatch)?;
    let bytes = mockup::batch::fetch::fetch_file(&url, &args.swatch)?;
    let normalized = mockup::normalize(
        set.size(),
        &bytes,
        mockup::NormalizeOptions::from_config(&cfg),
    )?;
    let out = mockup::Compositor::new(&set, &maps, mockup::CompositeOptions::from_config(&cfg))
        .composite(&normalized)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, &out.png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    let sha = sha2::Sha256::digest(&out.png);
    eprintln!("wrote {} ({})", args.out.display(), out.size());
    eprintln!("  sha256: {}", hex(&sha));
    Ok(())
}

fn file_url(path: &Path) -> anyhow::Result<String> {
    let abs = std::path::absolute(path)
        .with_context(|| format!("resolve '{}'", path.display()))?;
    Ok(format!("file://{}", abs.display()))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
