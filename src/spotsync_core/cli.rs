use clap::{Parser, Subcommand};
use simplelog::LevelFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tag aircraft photos and publish them to a shared drive gallery")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (JSON). Defaults are used when it does not exist.
    #[arg(long, default_value = "spotsync.json", global = true)]
    pub config: PathBuf,

    /// Enable file logging to spotsync.log
    #[arg(long = "log", global = true)]
    pub log: bool,

    /// Log level for file logging (debug, info, warn, error)
    #[arg(long, default_value_t = LevelFilter::Debug, global = true)]
    pub log_level: LevelFilter,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Tag every photo in a directory, uploading each one as it is saved.
    ///
    /// Tagged photos and their sidecars are moved into a sibling directory
    /// (tagged_photos by default). When the last photo has been handled the
    /// gallery is regenerated and the working directory is committed and
    /// pushed with git.
    Tag {
        /// Directory containing the photos to tag
        #[arg(required = true)]
        source_dir: PathBuf,
    },

    /// Upload a photo and its sidecar into the dated drive folder
    Upload {
        /// Photo file to upload
        #[arg(required = true)]
        photo: PathBuf,

        /// Sidecar JSON file to upload
        #[arg(required = true)]
        sidecar: PathBuf,

        /// Capture date (YYYY-MM-DD)
        #[arg(required = true)]
        date: String,

        /// Airport ICAO code
        #[arg(required = true)]
        icao: String,
    },

    /// Regenerate the gallery document from the drive folder tree
    Gallery {
        /// Output path (overrides the configured gallery path)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Acquire or refresh the drive access token
    Auth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_requires_four_arguments() {
        let parsed = Cli::try_parse_from(["spotsync", "upload", "a.jpg", "a.json", "2024-05-01"]);
        assert!(parsed.is_err());

        let parsed =
            Cli::try_parse_from(["spotsync", "upload", "a.jpg", "a.json", "2024-05-01", "KTPA"])
                .unwrap();
        match parsed.command {
            Commands::Upload { date, icao, .. } => {
                assert_eq!(date, "2024-05-01");
                assert_eq!(icao, "KTPA");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_config_flag_is_global() {
        let parsed =
            Cli::try_parse_from(["spotsync", "gallery", "--config", "other.json"]).unwrap();
        assert_eq!(parsed.config, PathBuf::from("other.json"));
    }
}
