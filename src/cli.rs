use crate::config::{Config, load_config};
use crate::model::Diagram;
use crate::render::{render_svg, write_output_svg};
use crate::skin::SkinPack;
use crate::theme::Theme;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "mmdc-canvas",
    version,
    about = "Render positioned Mermaid diagram models to SVG or PNG"
)]
pub struct Args {
    /// Positioned model JSON, or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file (svg/png). Defaults to stdout for SVG if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format; inferred from the output extension when omitted
    #[arg(short = 'e', long = "outputFormat", value_enum)]
    pub output_format: Option<OutputFormat>,

    /// Config JSON file (theme, themeVariables, render/geometry sections)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Named theme, overriding the config file
    #[arg(short = 't', long = "theme")]
    pub theme: Option<String>,

    /// Skin pack JSON file
    #[arg(short = 's', long = "skin")]
    pub skin: Option<PathBuf>,

    /// Rasterize with the immediate sink instead of through SVG
    #[arg(long = "direct")]
    pub direct: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = build_config(&args)?;
    let skin = args.skin.as_deref().map(load_skin).transpose()?;
    let input = read_input(args.input.as_deref())?;
    let diagram = Diagram::from_json(&input)?;
    if diagram.is_empty() {
        tracing::warn!("model has nothing to draw");
    }

    match resolve_format(&args) {
        OutputFormat::Svg => {
            let svg = render_svg(&diagram, &config, skin.as_ref());
            write_output_svg(&svg, args.output.as_deref())
        }
        OutputFormat::Png => {
            let output = ensure_output(&args.output, "png")?;
            write_png(&diagram, &config, skin.as_ref(), &output, args.direct)
        }
    }
}

fn build_config(args: &Args) -> Result<Config> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(name) = args.theme.as_deref() {
        config.theme = Theme::named(name);
        config.render.background = config.theme.background.clone();
    }
    Ok(config)
}

fn load_skin(path: &Path) -> Result<SkinPack> {
    let contents = std::fs::read_to_string(path)?;
    Ok(SkinPack::from_json(&contents)?)
}

fn resolve_format(args: &Args) -> OutputFormat {
    if let Some(format) = args.output_format {
        return format;
    }
    let is_png = args
        .output
        .as_deref()
        .and_then(|path| path.extension())
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
    if is_png { OutputFormat::Png } else { OutputFormat::Svg }
}

#[cfg(feature = "png")]
fn write_png(
    diagram: &Diagram,
    config: &Config,
    skin: Option<&SkinPack>,
    output: &Path,
    direct: bool,
) -> Result<()> {
    if direct {
        let surface = crate::render::render_png_direct(diagram, config, skin)?;
        return surface.save_png(output);
    }
    let svg = render_svg(diagram, config, skin);
    crate::render::write_output_png(&svg, output, &config.render)
}

#[cfg(not(feature = "png"))]
fn write_png(
    _diagram: &Diagram,
    _config: &Config,
    _skin: Option<&SkinPack>,
    _output: &Path,
    _direct: bool,
) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    let mut buf = String::new();
    match path {
        Some(path) if path != Path::new("-") => {
            buf = std::fs::read_to_string(path)?;
        }
        _ => {
            io::stdin().read_to_string(&mut buf)?;
        }
    }
    Ok(buf)
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}
