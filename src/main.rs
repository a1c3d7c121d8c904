use anyhow::Result;
use clap::Parser;
use simplelog::{CombinedLogger, Config as LogConfig, LevelFilter, SharedLogger, TermLogger, WriteLogger};
use spotsync::spotsync_core::auth::{Authenticator, TokenState};
use spotsync::spotsync_core::exif::{ExifToolReader, MetadataReader, NoMetadata, exiftool_available};
use spotsync::spotsync_core::gallery::{build_gallery, write_gallery};
use spotsync::spotsync_core::publish::ProcessTasks;
use spotsync::spotsync_core::station::{RunOutcome, Station};
use spotsync::spotsync_core::tagging::{Session, destination_for};
use spotsync::spotsync_core::upload::{UploadRequest, upload};
use spotsync::spotsync_core::{Cli, Commands, Config, DriveClient};
use std::fs::File;
use std::io;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize loggers
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Warn,
        LogConfig::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )];

    if cli.log {
        loggers.push(WriteLogger::new(
            cli.log_level,
            LogConfig::default(),
            File::create("spotsync.log")?,
        ));
    }

    CombinedLogger::init(loggers)?;

    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Tag { source_dir } => {
            let destination = destination_for(&source_dir, &config.tagged_dir_name)?;
            let mut session = Session::open(&source_dir, &destination, config.viewport)?;
            if session.is_empty() {
                println!("No images found in folder.");
                return Ok(());
            }

            let mut reader: Box<dyn MetadataReader> = if exiftool_available() {
                match ExifToolReader::new() {
                    Ok(reader) => Box::new(reader),
                    Err(e) => {
                        log::warn!("{}; capture dates will not be pre-filled", e);
                        Box::new(NoMetadata)
                    }
                }
            } else {
                log::warn!("exiftool is not installed or not in PATH; capture dates will not be pre-filled");
                Box::new(NoMetadata)
            };
            let mut tasks = ProcessTasks::current(&cli.config, config.git.clone())?;

            println!(
                "Tagging {} photos; tagged photos go to {}",
                session.len(),
                session.destination().display()
            );

            let stdin = io::stdin();
            let stdout = io::stdout();
            let mut station = Station::new(stdin.lock(), stdout.lock(), reader.as_mut(), &mut tasks);
            match station.run(&mut session)? {
                RunOutcome::Completed => log::info!("Tagging run complete"),
                RunOutcome::Quit => log::info!("Tagging run quit by operator"),
            }
        }

        Commands::Upload {
            photo,
            sidecar,
            date,
            icao,
        } => {
            let token = Authenticator::from_config(&config).acquire()?;
            let api = DriveClient::new(token, config.shared_drive_id.clone());

            let request = UploadRequest {
                photo,
                sidecar,
                date,
                location: icao,
            };
            let report = upload(&api, &config, &request)?;
            log::info!(
                "Upload complete: folder {} ({}), photo {}, sidecar {}",
                report.folder_name,
                report.folder_id,
                report.photo_id,
                report.sidecar_id
            );
        }

        Commands::Gallery { output } => {
            let token = Authenticator::from_config(&config).acquire()?;
            let api = DriveClient::new(token, config.shared_drive_id.clone());

            let gallery = build_gallery(&api, &config)?;
            let output = output.unwrap_or_else(|| config.gallery_output.clone());
            write_gallery(&output, &gallery)?;
            println!("Generated {} with {} folders", output.display(), gallery.len());
        }

        Commands::Auth => {
            let auth = Authenticator::from_config(&config);
            match auth.state() {
                TokenState::Valid(token) => println!("Token is valid until {}", token.expires_at),
                TokenState::Expired(_) => println!("Token has expired; refreshing"),
                TokenState::Absent => println!("No usable token; starting authorization"),
            }
            auth.acquire()?;
            println!("Token saved to {}", config.token_file.display());
        }
    }

    Ok(())
}
