use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Context};
use color_eyre::{Report, Result};

use orka_image_step::{ConsoleUi, CreateImageStep, ImageConfig, PipelineState, Step, StepAction};

/// Persist Orka VMs as reusable base images.
///
/// Runs the image step of a VM image build on its own: the VM must already
/// be deployed and customized, and a valid API token must be supplied.
#[derive(Parser)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options for committing or saving a VM image.
#[derive(Debug, Parser)]
struct PersistOpts {
    /// Identifier of the deployed VM
    #[clap(long)]
    vmid: String,

    /// Bearer token for the Orka API
    #[clap(long, env = "ORKA_TOKEN", hide_env_values = true)]
    token: String,

    /// JSON file with image settings (`orka_endpoint`, `image_name`, ...)
    ///
    /// Command-line flags override values from the file.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Base URL of the Orka API
    #[clap(long, env = "ORKA_ENDPOINT")]
    endpoint: Option<String>,

    /// Name of the new image (ignored with --precopy)
    #[clap(long)]
    image_name: Option<String>,

    /// Commit the VM's pre-copied image in place instead of saving a new one
    #[clap(long)]
    precopy: bool,

    /// Do not create an image; succeed immediately
    #[clap(long)]
    no_create_image: bool,

    /// Request timeout in seconds
    #[clap(long, default_value_t = 30 * 60)]
    timeout: u64,

    /// Print a JSON summary to stdout when done
    #[clap(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Commit or save the image of a deployed VM
    Persist(PersistOpts),
}

impl PersistOpts {
    fn image_config(&self) -> Result<ImageConfig> {
        let mut config = match self.config.as_deref() {
            Some(path) => ImageConfig::from_file(path)?,
            None => ImageConfig::default(),
        };
        if let Some(endpoint) = self.endpoint.as_deref() {
            config.endpoint = endpoint.to_owned();
        }
        if let Some(name) = self.image_name.as_deref() {
            config.image_name = name.to_owned();
        }
        config.use_precopy |= self.precopy;
        config.skip_image_creation |= self.no_create_image;
        config.validate().wrap_err("Invalid image configuration")?;
        Ok(config)
    }
}

fn persist(opts: PersistOpts) -> Result<()> {
    let config = opts.image_config()?;
    tracing::debug!("{config:?}");
    let mut state = PipelineState::new(config, Box::new(ConsoleUi), opts.vmid, opts.token);

    let step = CreateImageStep::new().with_timeout(std::time::Duration::from_secs(opts.timeout));
    let action = step.run(&mut state);
    if action == StepAction::Halt {
        state.halted = true;
    }
    step.cleanup(&state);

    if opts.json {
        let out = serde_json::to_string_pretty(&state.report())?;
        println!("{out}");
    }

    match state.error.take() {
        Some(e) => Err(Report::new(e)),
        None if action == StepAction::Halt => Err(eyre!("Image step halted")),
        None => Ok(()),
    }
}

/// Install and configure the tracing/logging system.
///
/// Logs are filtered by RUST_LOG environment variable, defaulting to 'info',
/// and written to stderr so stdout stays usable for `--json`.
fn install_tracing() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
}

fn main() -> Result<(), Report> {
    install_tracing();
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Persist(opts) => persist(opts).context("Creating image")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> PersistOpts {
        let mut argv = vec!["orka-image-step", "persist"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Persist(opts) => opts,
        }
    }

    #[test]
    fn test_flags_build_config() {
        let opts = parse(&[
            "--vmid",
            "vm-1",
            "--token",
            "t",
            "--endpoint",
            "http://orka.example/",
            "--image-name",
            "base.img",
        ]);
        let config = opts.image_config().unwrap();
        assert_eq!(config.endpoint, "http://orka.example");
        assert_eq!(config.image_name, "base.img");
        assert!(!config.use_precopy);
        assert_eq!(opts.timeout, 1800);
    }

    #[test]
    fn test_missing_image_name_rejected() {
        let opts = parse(&[
            "--vmid",
            "vm-1",
            "--token",
            "t",
            "--endpoint",
            "http://orka.example",
        ]);
        assert!(opts.image_config().is_err());
    }

    #[test]
    fn test_flags_override_file() {
        use std::io::Write as _;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(
            br#"{"orka_endpoint": "http://file.example", "image_name": "file.img", "image_precopy": false}"#,
        )
        .unwrap();
        let path = f.path().to_str().unwrap();
        let opts = parse(&[
            "--vmid",
            "vm-1",
            "--token",
            "t",
            "--config",
            path,
            "--image-name",
            "flag.img",
            "--precopy",
        ]);
        let config = opts.image_config().unwrap();
        assert_eq!(config.endpoint, "http://file.example");
        assert_eq!(config.image_name, "flag.img");
        assert!(config.use_precopy);
    }
}
