use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use avatar_pilot::voice::{
    Listener, OpenAiSpeech, SpeechOutput, SpeechSegmenter, Transcriber, WhisperTranscriber,
    devices,
};
use avatar_pilot::{
    Action, ActionExecutor, ActiveWindowOracle, Character, ChatClient, Config,
    ConversationService, Controller, EnigoBackend, input,
};

/// avatar-pilot - voice-driven character controller for VR chat avatars
#[derive(Parser)]
#[command(name = "avatar-pilot", version, about)]
struct Cli {
    /// Config file (defaults to ~/.config/avatar-pilot/config.toml)
    #[arg(short, long, env = "AVATAR_PILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List audio devices
    Devices,
    /// Speak text on the configured output device
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Perform one action once the game window is focused
    Perform {
        /// Action name, e.g. nod_head or turn_left_until_stopped
        action: String,
        /// Seconds to wait for the window to gain focus
        #[arg(short, long, default_value = "10")]
        wait: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,avatar_pilot=info",
        1 => "info,avatar_pilot=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if matches!(cli.command, Some(Command::Devices)) {
        return list_devices();
    }

    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;
    tracing::debug!(character = ?config.character, audio = ?config.audio, "loaded configuration");

    match cli.command {
        Some(Command::Say { text }) => say(&config, &text).await,
        Some(Command::Perform { action, wait }) => perform(&config, &action, wait).await,
        Some(Command::Devices) | None => run_character(config).await,
    }
}

/// Listen, converse and act until interrupted
async fn run_character(config: Config) -> anyhow::Result<()> {
    let speech: Arc<dyn SpeechOutput> = Arc::new(build_speech(&config)?);
    let transcriber: Arc<dyn Transcriber> = Arc::new(WhisperTranscriber::new(
        config.stt.local.clone(),
        config.stt.cloud.clone(),
    )?);
    let conversation: Arc<dyn ConversationService> =
        Arc::new(ChatClient::new(config.chat_settings())?);

    let character = Character::new(
        config.character.name.clone(),
        build_executor(&config)?,
        Arc::clone(&speech),
        config.character_settings(),
    );

    let (listener, transcripts) = Listener::spawn(
        config.audio.listen_device.clone(),
        Arc::clone(&transcriber),
        config.character.wake_words.clone(),
        SpeechSegmenter::new(config.audio.energy_threshold),
    )
    .await?;

    let mut controller = Controller::new(
        character,
        conversation,
        speech,
        transcriber,
        listener.state(),
        transcripts,
        config.controller_settings(),
    );

    tracing::info!(
        window = %config.character.window_title,
        "{} is ready - say \"{}\"",
        config.character.name,
        config.character.wake_words.first().map_or("", String::as_str)
    );

    controller
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
        })
        .await;

    listener.shutdown().await;
    Ok(())
}

fn build_speech(config: &Config) -> anyhow::Result<OpenAiSpeech> {
    Ok(OpenAiSpeech::new(
        config.tts.url.clone(),
        config.tts.api_key.clone().unwrap_or_default(),
        config.tts.model.clone(),
        config.tts.voice.clone(),
        config.tts.speed,
        config.audio.speak_device.clone(),
    )?)
}

fn build_executor(config: &Config) -> anyhow::Result<ActionExecutor> {
    let input = input::shared(EnigoBackend::new()?);
    Ok(ActionExecutor::new(
        config.character.window_title.clone(),
        Arc::new(ActiveWindowOracle),
        input,
        config.motion.clone(),
        config.timings,
    ))
}

fn list_devices() -> anyhow::Result<()> {
    let devices = devices::list_devices()?;
    if devices.is_empty() {
        println!("No audio devices found");
        return Ok(());
    }

    for device in devices {
        let kind = match (device.is_input, device.is_output) {
            (true, true) => "in/out",
            (true, false) => "in    ",
            (false, true) => "   out",
            (false, false) => "  -   ",
        };
        println!("[{kind}] {}", device.name);
    }
    Ok(())
}

async fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    let speech = build_speech(config)?;
    println!(
        "Speaking on {}...",
        config.audio.speak_device.as_deref().unwrap_or("the default output device")
    );
    speech.speak(text).await?;
    Ok(())
}

/// Run one action for calibrating key bindings and pointer distances
async fn perform(config: &Config, name: &str, wait: u64) -> anyhow::Result<()> {
    let action: Action = name.parse()?;
    let executor = build_executor(config)?;
    executor.start();

    println!("Focus the \"{}\" window...", executor.window_title());
    let deadline = Instant::now() + Duration::from_secs(wait);
    while !executor.is_window_focused() {
        if Instant::now() > deadline {
            anyhow::bail!("window \"{}\" never gained focus", executor.window_title());
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    executor.enqueue(action);
    if action.is_continuous() {
        println!("Performing {action}, press ctrl-c to stop");
        tokio::signal::ctrl_c().await?;
        executor.signal_stop();
    }

    while !executor.is_idle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    executor.shutdown();

    println!("Done");
    Ok(())
}
