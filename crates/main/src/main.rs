use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use report_paginator::{
    default_export_filename, BoxError, ContentBox, ContentRenderer, ExportOptions, Exporter,
    ImageEncoding, NeverCancel, PageGeometry, RasterImage, RenderedContent, ReportHeaderInfo,
};

/// Exports pre-rendered report rasters to a paginated PDF.
///
/// Banner fonts are looked up under `assets/fonts` next to the binary or the
/// `report_paginator` crate, or in `REPORT_PAGINATOR_FONTS_DIR`. Without them
/// continuation pages are written without a banner.
#[derive(Parser)]
#[command(author, version, about = "Paginate report rasters into a PDF")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the cover and the paginated detail raster to a PDF file.
    Export(ExportArgs),

    /// Print the slice plan for the detail raster as JSON.
    Plan(DetailArgs),
}

#[derive(Args)]
struct DetailArgs {
    /// PNG or JPEG capture of the detail stream.
    #[arg(long)]
    detail: PathBuf,

    /// JSON array of keep-together boxes (`top`, `bottom`, `kind`) in detail pixels.
    #[arg(long)]
    boxes: Option<PathBuf>,

    /// JSON page geometry in millimetres; omitted fields default to A4.
    #[arg(long)]
    geometry: Option<PathBuf>,

    /// The detail raster does not open with its own section header.
    #[arg(long)]
    no_inline_header: bool,
}

#[derive(Args)]
struct ExportArgs {
    #[command(flatten)]
    detail: DetailArgs,

    /// PNG or JPEG capture of the cover block.
    #[arg(long)]
    cover: PathBuf,

    /// Report title shown in the banner and the PDF metadata.
    #[arg(long)]
    title: String,

    /// Department or owner shown on the right of the banner.
    #[arg(long)]
    owner: String,

    /// Report date; defaults to today.
    #[arg(long)]
    date: Option<String>,

    /// Subtitle shown below the title.
    #[arg(long)]
    subtitle: Option<String>,

    /// Output file; defaults to `report_<date>.pdf`.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Embed uncompressed images instead of JPEG.
    #[arg(long)]
    raw_images: bool,

    /// Do not stamp a banner on continuation pages.
    #[arg(long)]
    no_banner: bool,
}

struct FileRenderer {
    cover: Option<PathBuf>,
    detail: PathBuf,
    boxes: Vec<ContentBox>,
    content_width: f64,
}

impl ContentRenderer for FileRenderer {
    fn render_cover(&self) -> Result<RenderedContent, BoxError> {
        let path = self.cover.as_ref().ok_or("no cover image given")?;
        let raster = RasterImage::from_path(path, self.content_width)?;
        Ok(RenderedContent::new(raster, Vec::new()))
    }

    fn render_detail(&self) -> Result<RenderedContent, BoxError> {
        let raster = RasterImage::from_path(&self.detail, self.content_width)?;
        Ok(RenderedContent::new(raster, self.boxes.clone()))
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Export(args) => run_export(args),
        Commands::Plan(args) => run_plan(args),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
    serde_json::from_str(&text)
        .map_err(|err| format!("failed to parse {}: {}", path.display(), err).into())
}

fn load_geometry(args: &DetailArgs) -> Result<PageGeometry, Box<dyn Error>> {
    let geometry = match &args.geometry {
        Some(path) => read_json(path)?,
        None => PageGeometry::default(),
    };
    geometry.validate()?;
    Ok(geometry)
}

fn load_boxes(args: &DetailArgs) -> Result<Vec<ContentBox>, Box<dyn Error>> {
    match &args.boxes {
        Some(path) => read_json(path),
        None => Ok(Vec::new()),
    }
}

fn options_for(args: &DetailArgs, geometry: PageGeometry) -> ExportOptions {
    ExportOptions::new()
        .with_geometry(geometry)
        .with_inline_section_header(!args.no_inline_header)
}

fn run_plan(args: DetailArgs) -> Result<(), Box<dyn Error>> {
    let geometry = load_geometry(&args)?;
    let boxes = load_boxes(&args)?;
    let detail = RasterImage::from_path(&args.detail, geometry.content_width())?;

    let zones = report_paginator::collect_avoid_zones(&boxes, detail.height_px());
    let plan = options_for(&args, geometry)
        .slicer()
        .plan_raster(&detail, &zones)?;

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<(), Box<dyn Error>> {
    let geometry = load_geometry(&args.detail)?;
    let boxes = load_boxes(&args.detail)?;

    let today = chrono::Local::now().date_naive();
    let date = args
        .date
        .clone()
        .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_export_filename(today)));

    let mut options = options_for(&args.detail, geometry);
    if args.raw_images {
        options = options.with_image_encoding(ImageEncoding::Raw);
    }
    if args.no_banner {
        options = options.without_banner();
    }

    let renderer = FileRenderer {
        cover: Some(args.cover.clone()),
        detail: args.detail.detail.clone(),
        boxes,
        content_width: geometry.content_width(),
    };
    let header = ReportHeaderInfo::new(args.title, args.owner, date).with_subtitle(args.subtitle);

    let report = Exporter::new(options).export_to_file(&renderer, &header, &NeverCancel, &output)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
