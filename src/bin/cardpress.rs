use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use cardpress::Surface as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "cardpress", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a card to a PNG at its template size.
    Render(RenderArgs),
    /// Render a card and export it with bleed margins and crop marks.
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    card: CardArgs,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    #[command(flatten)]
    card: CardArgs,

    /// Uniform bleed margin in pixels.
    #[arg(long, default_value_t = 20)]
    bleed: u32,

    /// Output PNG path; defaults to a timestamped card-<millis>.png.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CardArgs {
    /// Template document JSON.
    #[arg(long)]
    template: PathBuf,

    /// User content JSON (text, image references, transforms).
    #[arg(long)]
    content: Option<PathBuf>,

    /// Root directory asset references resolve against; defaults to the
    /// template's directory.
    #[arg(long)]
    assets: Option<PathBuf>,

    /// Default font file (TTF/OTF).
    #[arg(long)]
    font: PathBuf,

    /// Extra fonts as family=path pairs, matched against template font
    /// family names.
    #[arg(long = "extra-font", value_parser = parse_font_pair)]
    extra_fonts: Vec<(String, PathBuf)>,
}

fn parse_font_pair(s: &str) -> Result<(String, PathBuf), String> {
    s.split_once('=')
        .map(|(family, path)| (family.to_string(), PathBuf::from(path)))
        .ok_or_else(|| format!("expected family=path, got '{s}'"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let f = File::open(path).with_context(|| format!("open {what} '{}'", path.display()))?;
    serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parse {what} JSON"))
}

struct RenderedCard {
    template: cardpress::Template,
    fetcher: cardpress::FsFetcher,
    frame: cardpress::FrameRgba,
    report: cardpress::RenderReport,
}

fn render_card(args: &CardArgs) -> anyhow::Result<RenderedCard> {
    let template: cardpress::Template = read_json(&args.template, "template")?;
    template.validate()?;

    let content_doc: cardpress::ContentDoc = match &args.content {
        Some(path) => read_json(path, "content")?,
        None => cardpress::ContentDoc::default(),
    };

    let assets_root = args
        .assets
        .clone()
        .or_else(|| args.template.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let fetcher = cardpress::FsFetcher::new(assets_root);

    let font_bytes = std::fs::read(&args.font)
        .with_context(|| format!("read font '{}'", args.font.display()))?;
    let mut surface = cardpress::RasterSurface::new(template.width, template.height, font_bytes)?;
    for (family, path) in &args.extra_fonts {
        let bytes =
            std::fs::read(path).with_context(|| format!("read font '{}'", path.display()))?;
        surface.register_font(family.clone(), bytes)?;
    }

    let layers = cardpress::assets::loader::load_base_layers(&fetcher, &template.layers);
    let title_backgrounds = cardpress::assets::loader::load_title_backgrounds(&fetcher, &template);
    let content = cardpress::assets::loader::resolve_content(&fetcher, &content_doc, &template);

    let settings = cardpress::RenderSettings::default();
    let report = cardpress::render_card(
        &mut surface,
        &cardpress::RenderContext {
            template: &template,
            layers: &layers,
            title_backgrounds: &title_backgrounds,
            content: &content,
            settings: &settings,
        },
    );

    if let Some(diag) = &report.diagnostic {
        eprintln!("render failed: {diag}");
    } else if report.elements_skipped > 0 {
        eprintln!("{} element(s) failed to draw and were skipped", report.elements_skipped);
    }

    let frame = surface.to_frame()?;
    Ok(RenderedCard {
        template,
        fetcher,
        frame,
        report,
    })
}

fn write_png(path: &Path, width: u32, height: u32, data: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        path,
        data,
        width,
        height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let rendered = render_card(&args.card)?;
    write_png(
        &args.out,
        rendered.frame.width,
        rendered.frame.height,
        &rendered.frame.data,
    )?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let rendered = render_card(&args.card)?;
    if rendered.report.diagnostic.is_some() {
        anyhow::bail!("refusing to export a diagnostic frame");
    }

    let background = cardpress::assets::loader::load_bleed_background(
        &rendered.fetcher,
        &rendered.template,
    );
    let mode = rendered
        .template
        .bleed_background
        .as_ref()
        .map(|b| b.fill_mode)
        .unwrap_or_default();

    let out_img = cardpress::compose_bleed(
        &rendered.frame,
        cardpress::BleedSpec::uniform(args.bleed),
        background.as_ref().map(|bg| (bg, mode)),
        &cardpress::ExportOptions::default(),
    )?;

    let out_path = args.out.unwrap_or_else(|| {
        PathBuf::from(cardpress::export_file_name(
            chrono::Utc::now().timestamp_millis(),
        ))
    });
    let (w, h) = out_img.dimensions();
    write_png(&out_path, w, h, out_img.as_raw())?;
    eprintln!("wrote {}", out_path.display());
    Ok(())
}
