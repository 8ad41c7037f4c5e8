use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "imprint", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the variable names a template references, in order.
    Vars(VarsArgs),
    /// Render one PNG from a template and optional bindings.
    Render(RenderArgs),
    /// Render one PNG per row of a CSV table.
    Batch(BatchArgs),
    /// Reposition a template's layers with a layout tool.
    Arrange(ArrangeArgs),
}

#[derive(Parser, Debug)]
struct VarsArgs {
    /// Input template JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input template JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Bindings JSON ({"variable": "value", ...}). Unbound variables render
    /// as {{name}} placeholders.
    #[arg(long)]
    bindings: Option<PathBuf>,

    /// Output PNG path. Defaults to a name derived from the template.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Register a font family as NAME=PATH (repeatable). The first one is
    /// the fallback for unknown families.
    #[arg(long = "font", value_parser = parse_font_spec)]
    fonts: Vec<(String, PathBuf)>,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Input template JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// CSV data: header row of variable names, one row per output image.
    #[arg(long)]
    data: PathBuf,

    /// Output directory for row-N.png files.
    #[arg(long)]
    out_dir: PathBuf,

    /// Register a font family as NAME=PATH (repeatable).
    #[arg(long = "font", value_parser = parse_font_spec)]
    fonts: Vec<(String, PathBuf)>,
}

#[derive(Parser, Debug)]
struct ArrangeArgs {
    /// Input template JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Layout tool to apply.
    #[arg(long, value_enum)]
    mode: ArrangeMode,

    /// Output template JSON path (may equal the input).
    #[arg(long)]
    out: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ArrangeMode {
    Auto,
    Grid,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Vars(args) => cmd_vars(args),
        Command::Render(args) => cmd_render(args),
        Command::Batch(args) => cmd_batch(args),
        Command::Arrange(args) => cmd_arrange(args),
    }
}

fn parse_font_spec(spec: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = spec
        .split_once('=')
        .ok_or_else(|| format!("font spec '{spec}' must be NAME=PATH"))?;
    if name.trim().is_empty() {
        return Err("font family name must be non-empty".to_string());
    }
    Ok((name.trim().to_string(), PathBuf::from(path)))
}

fn read_template_json(path: &Path) -> anyhow::Result<imprint::Template> {
    let f = File::open(path).with_context(|| format!("open template '{}'", path.display()))?;
    let r = BufReader::new(f);
    let template: imprint::Template =
        serde_json::from_reader(r).with_context(|| "parse template JSON")?;
    Ok(template)
}

fn read_bindings_json(path: &Path) -> anyhow::Result<imprint::Bindings> {
    let f = File::open(path).with_context(|| format!("open bindings '{}'", path.display()))?;
    let r = BufReader::new(f);
    let bindings: imprint::Bindings =
        serde_json::from_reader(r).with_context(|| "parse bindings JSON")?;
    Ok(bindings)
}

fn make_compositor(
    template_path: &Path,
    fonts: &[(String, PathBuf)],
) -> anyhow::Result<imprint::Compositor> {
    let mut catalog = imprint::FontCatalog::new();
    for (name, path) in fonts {
        catalog.register_family_from_file(name, path)?;
    }
    let assets_root = template_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(imprint::Compositor::new(assets_root, catalog))
}

fn cmd_vars(args: VarsArgs) -> anyhow::Result<()> {
    let template = read_template_json(&args.in_path)?;
    for name in imprint::extract_variable_names(&template) {
        println!("{name}");
    }
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let template = read_template_json(&args.in_path)?;
    template.validate()?;

    let bindings = match &args.bindings {
        Some(path) => read_bindings_json(path)?,
        None => imprint::Bindings::new(),
    };

    let mut compositor = make_compositor(&args.in_path, &args.fonts)?;
    let (png, suggested) = compositor
        .render_png(&template, &bindings)
        .context("generation failed")?;

    let out = args
        .out
        .unwrap_or_else(|| PathBuf::from(suggested));
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&out, &png).with_context(|| format!("write png '{}'", out.display()))?;

    eprintln!("generated {}", out.display());
    Ok(())
}

fn cmd_batch(args: BatchArgs) -> anyhow::Result<()> {
    let template = read_template_json(&args.in_path)?;
    template.validate()?;

    let csv = std::fs::read_to_string(&args.data)
        .with_context(|| format!("read batch data '{}'", args.data.display()))?;

    let mut compositor = make_compositor(&args.in_path, &args.fonts)?;
    let outcome = imprint::run_batch(&mut compositor, &template, &csv)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("create output dir '{}'", args.out_dir.display()))?;
    for image in &outcome.images {
        let out = args.out_dir.join(format!("{}.png", image.id));
        std::fs::write(&out, &image.png)
            .with_context(|| format!("write png '{}'", out.display()))?;
    }

    if outcome.succeeded == outcome.attempted {
        eprintln!(
            "batch produced {} images in {}",
            outcome.succeeded,
            args.out_dir.display()
        );
    } else {
        eprintln!(
            "batch produced {} of {} images in {} (failed rows were skipped)",
            outcome.succeeded,
            outcome.attempted,
            args.out_dir.display()
        );
    }
    Ok(())
}

fn cmd_arrange(args: ArrangeArgs) -> anyhow::Result<()> {
    let template = read_template_json(&args.in_path)?;
    template.validate()?;

    let arranged = match args.mode {
        ArrangeMode::Auto => imprint::auto_arrange(&template),
        ArrangeMode::Grid => imprint::grid_arrange(&template),
    };

    let json = serde_json::to_string_pretty(&arranged).context("serialize template JSON")?;
    std::fs::write(&args.out, json)
        .with_context(|| format!("write template '{}'", args.out.display()))?;

    eprintln!("arranged {} layers", arranged.text_layers.len());
    Ok(())
}
