use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use coastal_twl_pipeline::config::ConfigLoader;
use coastal_twl_pipeline::error::TwlError;
use coastal_twl_pipeline::iem::IemHttpClient;
use coastal_twl_pipeline::nwm::GcsHttpClient;
use coastal_twl_pipeline::pipeline::Pipeline;
use coastal_twl_pipeline::shef::SystemShefDecoder;

#[derive(Parser)]
#[command(name = "twl-pipeline")]
#[command(about = "Retrieve NWM coastal total-water-level bulletins and export station JSON artifacts")]
#[command(version, author)]
struct Cli {
    /// Path to a JSON config file (defaults to ./twl-pipeline.json when present).
    #[arg(long)]
    config: Option<String>,

    /// Override the output directory from the config.
    #[arg(long)]
    data_dir: Option<String>,

    /// Require shefParser on PATH instead of attempting the one-time
    /// pip remediation when it is missing.
    #[arg(long)]
    skip_provision: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(twl) = report.downcast_ref::<TwlError>() {
            return ExitCode::from(map_exit_code(twl));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &TwlError) -> u8 {
    match error {
        TwlError::NoData => 1,
        TwlError::ConfigRead(_) | TwlError::ConfigParse(_) => 2,
        TwlError::StoreHttp(_)
        | TwlError::StoreStatus { .. }
        | TwlError::FeedHttp(_)
        | TwlError::FeedStatus { .. }
        | TwlError::MissingTool(_)
        | TwlError::DecodeFailed(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // TwlError values are wrapped with Report::new, not into_diagnostic, so
    // main can still downcast them for the exit-code mapping.
    let mut config = ConfigLoader::resolve(cli.config.as_deref()).map_err(miette::Report::new)?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir.into();
    }

    // The transducer is an operational dependency: provision it once here so
    // the decoder stays a pure function of its input files.
    let decoder = if cli.skip_provision {
        SystemShefDecoder::from_path()
    } else {
        SystemShefDecoder::provision()
    }
    .map_err(miette::Report::new)?;
    let bulletins = GcsHttpClient::new(&config.bucket).map_err(miette::Report::new)?;
    let feed = IemHttpClient::new(&config.metadata_url).map_err(miette::Report::new)?;

    let pipeline = Pipeline::new(config, bulletins, decoder, feed);
    let summary = pipeline.run().map_err(miette::Report::new)?;

    let json = serde_json::to_string_pretty(&summary).into_diagnostic()?;
    println!("{json}");
    Ok(())
}
