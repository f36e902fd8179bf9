//! Command-line surface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use regionrec_ipc::{CaptureRegion, OutputFormat, MIN_REGION_SIZE};

#[derive(Debug, Parser)]
#[command(name = "regionrec", version, about = "Record a screen region with system audio")]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record until the duration elapses, Enter is pressed or Ctrl+C.
    Record(RecordArgs),

    /// Check whether system audio can be captured.
    Probe,

    /// List loopback-capable audio devices.
    Devices,

    /// Inspect or change the config file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Region as LEFT,TOP,WIDTH,HEIGHT. Defaults to the configured region.
    #[arg(long, value_parser = parse_region)]
    pub region: Option<CaptureRegion>,

    #[arg(long)]
    pub fps: Option<u32>,

    /// mp4 or gif.
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// Directory the recording is written to.
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Stop automatically after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<f64>,

    /// Store --region in the config for next time.
    #[arg(long, requires = "region")]
    pub remember: bool,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration.
    Show,

    /// Store the capture region.
    SetRegion {
        #[arg(value_parser = parse_region)]
        region: CaptureRegion,
    },

    /// Set a dotted key. The value is parsed as JSON, or taken as a string.
    Set { key: String, value: String },
}

/// Parse `LEFT,TOP,WIDTH,HEIGHT`.
pub fn parse_region(text: &str) -> Result<CaptureRegion, String> {
    let parts: Vec<&str> = text.split(',').map(str::trim).collect();
    let [left, top, width, height] = parts.as_slice() else {
        return Err(format!("expected LEFT,TOP,WIDTH,HEIGHT, got `{text}`"));
    };

    let left = left.parse::<i32>().map_err(|e| format!("left: {e}"))?;
    let top = top.parse::<i32>().map_err(|e| format!("top: {e}"))?;
    let width = width.parse::<u32>().map_err(|e| format!("width: {e}"))?;
    let height = height.parse::<u32>().map_err(|e| format!("height: {e}"))?;

    let region = CaptureRegion::new(left, top, width, height).map_err(|e| e.to_string())?;
    if !region.meets_minimum() {
        return Err(format!(
            "region must be at least {MIN_REGION_SIZE}x{MIN_REGION_SIZE} pixels, got {width}x{height}"
        ));
    }
    Ok(region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_region() {
        let region = parse_region("-1920, 0, 800, 600").unwrap();
        assert_eq!(region, CaptureRegion::new(-1920, 0, 800, 600).unwrap());

        assert!(parse_region("0,0,800").is_err());
        assert!(parse_region("0,0,0,600").is_err());
        assert!(parse_region("0,0,1,1").is_err());
        assert!(parse_region("0,0,9,600").is_err());
        assert!(parse_region("0,0,10,10").is_ok());
        assert!(parse_region("a,0,10,10").is_err());
    }

    #[test]
    fn test_record_args() {
        let cli = Cli::try_parse_from([
            "regionrec", "record", "--region", "10,20,300,200", "--format", "gif", "--duration", "2.5",
        ])
        .unwrap();
        let Command::Record(args) = cli.command else {
            panic!("expected record");
        };
        assert_eq!(args.format, Some(OutputFormat::Gif));
        assert_eq!(args.duration, Some(2.5));
        assert_eq!(args.region.map(|r| r.width), Some(300));
    }

    #[test]
    fn test_remember_requires_region() {
        assert!(Cli::try_parse_from(["regionrec", "record", "--remember"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
