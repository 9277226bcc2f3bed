use clap::{Parser, Subcommand, ValueEnum};
use pagecap_lib::{CaptureType, ViewportOverride};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pagecap")]
#[command(
    version,
    about = "pagecap - Render HTML or a URL in headless Chromium to PNG or compressed PDF",
    long_about = "pagecap\n\nRenders a url or inline markup in headless Chromium and captures it.\n\nModes:\n- screenshot: raster image of the viewport or full page.\n- pdf: paginated document, post-processed through Ghostscript.\n\nThe page must expose an element matching the readiness selector (default #pdf-ready) before capture.\nSet BROWSERLESS=1 and BROWSERLESS_URL to use a shared remote browser."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long,
        global = true,
        value_name = "PATH",
        help = "Optional config file (TOML) for engine mode, timeouts and compressor; CLI flags override config"
    )]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture a url or inline markup as a screenshot or PDF
    Capture {
        #[arg(long = "type", value_enum, help = "Capture mode")]
        kind: CaptureKind,

        #[arg(long, help = "Url to navigate to", conflicts_with = "html_file")]
        url: Option<String>,

        #[arg(
            long,
            value_name = "PATH",
            help = "File with inline HTML markup to render (wins over the request's url)"
        )]
        html_file: Option<PathBuf>,

        #[arg(
            long,
            value_name = "JSON",
            help = "Capture parameters as JSON ({url, html, timeout, waitUntil, viewport, pdfOptions, screenshotOptions}); other flags override its fields"
        )]
        request: Option<String>,

        #[arg(long, help = "Viewport dimensions (WIDTHxHEIGHT)")]
        viewport: Option<ViewportOverride>,

        #[arg(
            long,
            value_delimiter = ',',
            help = "Lifecycle events to wait for (load,domcontentloaded,networkidle0,networkidle2)"
        )]
        wait_until: Option<Vec<String>>,

        #[arg(long, value_name = "MS", help = "Page navigation timeout in milliseconds")]
        timeout: Option<u64>,

        #[arg(long, value_name = "JSON", help = "PDF options as a JSON object")]
        pdf_options: Option<String>,

        #[arg(long, value_name = "JSON", help = "Screenshot options as a JSON object")]
        screenshot_options: Option<String>,

        #[arg(long, short, help = "Output file path (stdout if omitted)")]
        output: Option<PathBuf>,

        #[arg(
            long,
            value_name = "WS_URL",
            help = "Connect to a remote browser instead of launching one"
        )]
        remote: Option<String>,

        #[arg(long, value_name = "PATH", help = "Chromium executable for local launches")]
        chrome: Option<PathBuf>,

        #[arg(
            long,
            default_value = "#pdf-ready",
            help = "Selector that must exist before capture"
        )]
        readiness_selector: String,

        #[arg(
            long,
            default_value = "300",
            help = "Readiness (fonts and marker) timeout in seconds"
        )]
        readiness_timeout: u64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum CaptureKind {
    Screenshot,
    Pdf,
}

impl From<CaptureKind> for CaptureType {
    fn from(kind: CaptureKind) -> Self {
        match kind {
            CaptureKind::Screenshot => CaptureType::Image,
            CaptureKind::Pdf => CaptureType::PaginatedDocument,
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
