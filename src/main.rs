mod cli;
mod formatting;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use cli::Commands;
use formatting::{describe_artifact, render_error, write_artifact};
use pagecap_lib::{init_tracing, CaptureError, CaptureRequest, CaptureService};
use settings::{
    build_parameters, format_effective_config, load_config, resolve_capture_config,
    CaptureFlagSources, EngineOverrides, RequestArgs,
};

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

async fn run() -> ExitCode {
    let raw_args: Vec<String> = std::env::args().collect();
    let args = cli::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Capture {
            kind,
            url,
            html_file,
            request,
            viewport,
            wait_until,
            timeout,
            pdf_options,
            screenshot_options,
            output,
            remote,
            chrome,
            readiness_selector,
            readiness_timeout,
        } => {
            let flags = CaptureFlagSources::from_args(&raw_args);
            let config = match load_config(args.config.as_deref()).and_then(|cfg| {
                resolve_capture_config(
                    cfg,
                    EngineOverrides {
                        remote,
                        chrome,
                        readiness_selector,
                        readiness_timeout,
                    },
                    &flags,
                )
            }) {
                Ok(cfg) => cfg,
                Err(err) => return render_error(err),
            };
            let service = CaptureService::new(config);
            if args.verbose {
                eprintln!(
                    "{}",
                    format_effective_config(service.config(), args.config.as_deref())
                );
            }

            let html = match read_markup(html_file).await {
                Ok(html) => html,
                Err(err) => return render_error(err),
            };
            let params = match build_parameters(RequestArgs {
                url,
                html,
                request,
                viewport,
                wait_until,
                timeout,
                pdf_options,
                screenshot_options,
            }) {
                Ok(params) => params,
                Err(err) => return render_error(err),
            };

            let request = CaptureRequest::new(kind.into(), params);
            let artifact = match service.execute(request).await {
                Ok(artifact) => artifact,
                Err(err) => return render_error(err),
            };

            let summary = describe_artifact(&artifact, output.as_deref());
            if let Err(err) = write_artifact(artifact, output.as_deref()) {
                return render_error(CaptureError::Io(err));
            }
            if args.verbose {
                eprintln!("{}", summary);
            }
            ExitCode::SUCCESS
        }
    }
}

async fn read_markup(path: Option<PathBuf>) -> Result<Option<String>, CaptureError> {
    let Some(path) = path else {
        return Ok(None);
    };
    tokio::fs::read_to_string(&path).await.map(Some).map_err(|e| {
        CaptureError::invalid_request(format!(
            "Failed to read markup file {}: {}",
            path.display(),
            e
        ))
    })
}
