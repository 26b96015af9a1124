//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Failure-handling pipeline for log ingestion")]
pub struct CliArgs {
    /// Path to the YAML configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Identifier attached to failures produced by the stdin input
    #[arg(long, default_value = "stdin")]
    pub input_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = CliArgs::parse_from(["snowdrift", "--config", "snowdrift.yaml"]);
        assert_eq!(args.config, PathBuf::from("snowdrift.yaml"));
        assert_eq!(args.input_id, "stdin");
    }

    #[test]
    fn test_config_is_required() {
        assert!(CliArgs::try_parse_from(["snowdrift"]).is_err());
    }
}
