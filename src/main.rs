use clap::{Parser, ValueEnum};
use pdf_x_renderer::byte_source::FileSource;
use pdf_x_renderer::render::{RENDER_MODE_FOR_DISPLAY, RENDER_MODE_FOR_PRINT};
use pdf_x_renderer::renderer::{PdfRenderer, Transform};
use pdf_x_renderer::target::RenderTarget;
use std::path::PathBuf;
use std::process;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Display,
    Print,
}

impl Mode {
    fn render_mode(self) -> i32 {
        match self {
            Mode::Display => RENDER_MODE_FOR_DISPLAY,
            Mode::Print => RENDER_MODE_FOR_PRINT,
        }
    }
}

/// Renders a PDF page to PNG.
#[derive(Parser, Debug)]
#[command(name = "pdf-render", version, about)]
struct Args {
    /// PDF file to open
    file: PathBuf,

    /// Page to render, counting from 0
    #[arg(short, long, default_value_t = 0)]
    page: usize,

    #[arg(short, long, value_enum, default_value_t = Mode::Display)]
    mode: Mode,

    /// Pixels per point
    #[arg(short, long, default_value_t = 1.0)]
    scale: f32,

    /// Output PNG, defaults to the input name with the page number
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print page count, print scaling and page sizes instead of rendering
    #[arg(long, default_value_t = false)]
    info: bool,
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut renderer = PdfRenderer::new(FileSource::open(&args.file)?)?;
    if args.info {
        return print_info(&mut renderer);
    }
    if !(args.scale.is_finite() && args.scale > 0.0) {
        return Err(format!("invalid scale {}", args.scale).into());
    }

    let mut page = renderer.open_page(args.page)?;
    let width = (page.width() as f32 * args.scale).ceil() as u32;
    let height = (page.height() as f32 * args.scale).ceil() as u32;
    let mut target = RenderTarget::new(width, height);
    target.fill([255, 255, 255]);
    let transform = Transform::scale(args.scale, args.scale);
    page.render(&mut target, None, Some(&transform), args.mode.render_mode())?;
    page.close()?;

    let output = args.output.clone().unwrap_or_else(|| {
        let stem = args.file.file_stem().unwrap_or_default().to_string_lossy();
        PathBuf::from(format!("{}-{}.png", stem, args.page))
    });
    std::fs::write(&output, target.to_png()?)?;
    println!("{} ({}x{}) -> {}", args.file.display(), width, height, output.display());
    renderer.close()?;
    Ok(())
}

fn print_info(renderer: &mut PdfRenderer) -> Result<(), Box<dyn std::error::Error>> {
    let count = renderer.page_count()?;
    println!("Page Count: {}", count);
    println!("Print Scaling: {}", renderer.should_scale_for_printing()?);
    for index in 0..count {
        match renderer.open_page(index) {
            Ok(page) => println!("  Page {}: {} x {} pt", index, page.width(), page.height()),
            Err(e) => println!("  Page {}: {}", index, e),
        }
    }
    Ok(())
}
