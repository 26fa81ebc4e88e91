use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cohost::chat::YouTubeLiveChat;
use cohost::voice::{
    AudioSink, CpalSink, PlaybackSequencer, SpeechRenderer, VoicevoxClient, list_output_devices,
};
use cohost::{Config, FileTranscript, OpenAiCompletions, Pipeline};

/// Cohost - a voiced co-host that answers YouTube live chat
#[derive(Parser)]
#[command(name = "cohost", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to ~/.config/cohost/config.toml)
    #[arg(short, long, env = "COHOST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List audio output devices
    ListDevices,
    /// Speak a line through VOICEVOX and the configured output device
    TestSpeaker {
        /// Text to speak
        #[arg(default_value = "テストなのだ。聞こえているのだ？")]
        text: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,cohost=info",
        1 => "info,cohost=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::ListDevices => list_devices(),
            Command::TestSpeaker { text } => test_speaker(cli.config.as_deref(), &text).await,
        };
    }

    let config = Config::load(cli.config.as_deref())?;
    tracing::debug!(?config, "loaded configuration");

    let voicevox = VoicevoxClient::new(&config.voice.endpoint)?;
    let renderer = SpeechRenderer::new(Arc::new(voicevox), config.voice.speaker_id);
    let sink = CpalSink::new(config.audio.output_device.clone())?;
    let sequencer = PlaybackSequencer::new(Arc::new(sink), config.audio.max_pending);

    let generator = OpenAiCompletions::new(
        config.generation.api_key,
        config.generation.model,
        config.generation.base_url,
    )?;
    let transcript = FileTranscript::new(config.transcript_dir);

    let pipeline = Pipeline::new(
        config.persona,
        Arc::new(generator),
        renderer,
        sequencer,
        Arc::new(transcript),
        config.pipeline,
    );

    tracing::info!(
        stream = ?config.chat.target,
        echo_question = config.pipeline.echo_question,
        "cohost ready"
    );

    let mut connector = YouTubeLiveChat::new(config.chat.target, config.chat.poll_interval);
    pipeline.run(&mut connector).await?;

    Ok(())
}

/// Print output device names
fn list_devices() -> anyhow::Result<()> {
    let devices = list_output_devices()?;

    if devices.is_empty() {
        println!("No output devices found");
    }
    for name in devices {
        println!("{name}");
    }

    Ok(())
}

/// Render `text` and play it once
async fn test_speaker(config_path: Option<&Path>, text: &str) -> anyhow::Result<()> {
    let (voice, audio) = Config::load_output(config_path)?;

    println!("Rendering with VOICEVOX at {} (speaker {})", voice.endpoint, voice.speaker_id);

    let voicevox = VoicevoxClient::new(&voice.endpoint)?;
    let renderer = SpeechRenderer::new(Arc::new(voicevox), voice.speaker_id);
    let clip = renderer.render(text).await?;

    println!(
        "Playing {} bytes on {}...",
        clip.data.len(),
        audio.output_device.as_deref().unwrap_or("the default device")
    );

    let sink = CpalSink::new(audio.output_device)?;
    sink.play(clip).await?;

    println!("If you heard the line, speech output is working!");

    Ok(())
}
