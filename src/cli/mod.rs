//! Command-line interface.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::api;
use crate::audio::list_input_devices;
use crate::config::AppConfig;
use crate::core::{CycleReport, Daemon, PromptPipeline};
use crate::domain::PipelineOutcome;
use crate::storage::PromptStorage;

#[derive(Parser)]
#[command(name = "briefcast", version, about = "Speak a brief, get a structured dev plan")]
pub struct Cli {
    /// Explicit config file (default: .briefcast/config.yaml found upward
    /// from the current directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one push-to-talk session: hold the hotkey, speak, release.
    Listen {
        #[arg(long)]
        story_id: Option<String>,
        #[arg(long)]
        story_title: Option<String>,
        /// Also copy the result into the project-management tree.
        #[arg(long)]
        promote: bool,
    },

    /// Structure a text brief without touching the microphone.
    EnhanceText {
        /// Brief text; mutually exclusive with --file.
        text: Option<String>,
        /// Read the brief from a file instead.
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        #[arg(long)]
        story_id: Option<String>,
        #[arg(long)]
        story_title: Option<String>,
        #[arg(long)]
        promote: bool,
    },

    /// Transcribe and structure an existing audio file.
    ProcessAudio {
        path: PathBuf,
        #[arg(long)]
        story_id: Option<String>,
        #[arg(long)]
        story_title: Option<String>,
        #[arg(long)]
        promote: bool,
    },

    /// Promote a previously saved prompt into the project-management tree.
    CreateFeature {
        /// Path to the saved prompt document.
        prompt_path: PathBuf,
        #[arg(long)]
        story_title: Option<String>,
    },

    /// Run push-to-talk sessions in a loop until interrupted.
    Daemon {
        /// Keep results in the staging directory (skip promotion).
        #[arg(long)]
        stay_local: bool,
        /// Print a line per completed or failed cycle.
        #[arg(long)]
        verbose_cycle: bool,
    },

    /// List input-capable audio devices.
    Devices,

    /// Print the resolved configuration (API key redacted).
    Config,

    /// Serve the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8787")]
        address: SocketAddr,
    },
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        // Device enumeration needs no configuration at all.
        if matches!(self.command, Commands::Devices) {
            for name in list_input_devices()? {
                println!("{name}");
            }
            return Ok(());
        }

        let config = AppConfig::load(self.config.as_deref())?;

        match self.command {
            Commands::Devices => unreachable!("handled above"),

            Commands::Listen {
                story_id,
                story_title,
                promote,
            } => {
                let mut pipeline = PromptPipeline::from_config(&config)?;
                println!("Hold the hotkey and speak; release to process. Esc cancels.");
                let outcome = pipeline
                    .listen_once(story_id.as_deref(), story_title.as_deref(), promote)
                    .await?;
                print_outcome(&outcome);
            }

            Commands::EnhanceText {
                text,
                file,
                story_id,
                story_title,
                promote,
            } => {
                let brief = match (text, file) {
                    (Some(text), None) => text,
                    (None, Some(path)) => std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read brief from {}", path.display()))?,
                    _ => anyhow::bail!("provide brief text or --file"),
                };
                let mut pipeline = PromptPipeline::from_config(&config)?;
                let outcome = pipeline
                    .enhance_text(&brief, story_id.as_deref(), story_title.as_deref(), promote)
                    .await?;
                print_outcome(&outcome);
            }

            Commands::ProcessAudio {
                path,
                story_id,
                story_title,
                promote,
            } => {
                let mut pipeline = PromptPipeline::from_config(&config)?;
                let outcome = pipeline
                    .process_audio_file(&path, story_id.as_deref(), story_title.as_deref(), promote)
                    .await?;
                print_outcome(&outcome);
            }

            Commands::CreateFeature {
                prompt_path,
                story_title,
            } => {
                let storage = PromptStorage::new(
                    &config.paths.prompt_output_root,
                    &config.prompt.filename_pattern,
                    &config.prompt.metadata_filename,
                );
                let saved = storage.load_saved_prompt(&prompt_path)?;
                let dest = storage.relocate_to_project_management(
                    &saved,
                    &config.paths.project_management_root,
                    story_title.as_deref(),
                )?;
                println!("Promoted {} -> {}", saved.story_id, dest.display());
            }

            Commands::Daemon {
                stay_local,
                verbose_cycle,
            } => {
                let pipeline = PromptPipeline::from_config(&config)?;
                let mut daemon = Daemon::new(pipeline, !stay_local);
                if verbose_cycle {
                    daemon = daemon.with_observer(|report, _stop| match report {
                        CycleReport::Completed(outcome) => {
                            println!(
                                "cycle ok: {} -> {}",
                                outcome.saved_prompt.story_id,
                                outcome.saved_prompt.prompt_path.display()
                            );
                        }
                        CycleReport::Failed(e) => {
                            println!("cycle failed: {e}");
                        }
                    });
                }
                info!("starting daemon; Ctrl+C to stop");
                daemon.run().await?;
            }

            Commands::Config => {
                println!("{}", config.to_json()?);
            }

            Commands::Serve { address } => {
                api::serve(address, config).await?;
            }
        }

        Ok(())
    }
}

fn print_outcome(outcome: &PipelineOutcome) {
    println!("Story ID:  {}", outcome.saved_prompt.story_id);
    println!("Work type: {}", outcome.plan.work_type.as_str());
    println!("Summary:   {}", outcome.plan.summary);
    println!("Prompt:    {}", outcome.saved_prompt.prompt_path.display());
}
