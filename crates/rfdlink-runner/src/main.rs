//! `rfdlink`: ground-station command line for the RFD900 balloon link.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use crossbeam_channel::Receiver;
use rfdlink_engine::{
    CancelToken, CommandOutcome, FlipAxis, ImageSystem, RadioPort, ReceiveLoop,
};
use rfdlink_protocol::PictureSettings;
use rfdlink_runner::console::{ConsoleObserver, ConsoleSink};
use rfdlink_runner::{init_logging, GroundConfig, Result};
use tracing::{error, info};

/// Talk to a balloon payload over an RFD900 serial radio.
#[derive(Parser, Debug)]
#[command(name = "rfdlink", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port, overriding the configuration file
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate, overriding the configuration file
    #[arg(long)]
    baud: Option<u32>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print telemetry and text from the payload until Ctrl-C
    Listen,
    /// Send a command and retransmit until the payload echoes its identifier
    Send {
        /// Identifier the payload echoes back
        #[arg(long)]
        id: String,
        /// Command body
        command: String,
    },
    /// Download the most recently captured image
    FetchLatest {
        /// Save under this name instead of the camera's
        #[arg(long)]
        name: Option<String>,
    },
    /// List the images stored on the camera
    List,
    /// Download a stored image by name
    Fetch {
        /// Image name on the camera
        name: String,
    },
    /// Read or change the camera picture settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Flip the camera image
    Flip {
        #[arg(value_enum)]
        axis: Axis,
    },
    /// Compare payload and ground clocks, then measure the round trip
    TimeSync,
    /// Measure the round trip
    Ping {
        /// Number of pings
        #[arg(long)]
        count: Option<u32>,
    },
    /// Print the payload computer's runtime data
    RuntimeData,
    /// Ask the payload computer for its device status and listen for the answer
    Status,
}

#[derive(Subcommand, Debug)]
enum SettingsAction {
    /// Query the camera's current settings
    Get,
    /// Send `width,height,sharpness,brightness,contrast,saturation,iso`
    Set { values: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Axis {
    Vertical,
    Horizontal,
}

impl From<Axis> for FlipAxis {
    fn from(axis: Axis) -> Self {
        match axis {
            Axis::Vertical => FlipAxis::Vertical,
            Axis::Horizontal => FlipAxis::Horizontal,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("rfdlink: {e}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => GroundConfig::load(path)?,
        None => GroundConfig::default(),
    };
    if let Some(baud) = cli.baud {
        config.serial.baud_rate = baud;
    }
    if let Command::Ping { count: Some(count) } = &cli.command {
        config.image.ping_count = *count;
    }

    let settings = config.port_settings(cli.port.as_deref())?;
    let mut port = RadioPort::open(&settings)?;
    info!(port = %port.name(), baud = settings.baud_rate, "port open");

    let mut images = ImageSystem::new(config.image.clone());
    let mut observer = ConsoleObserver::stdout();

    match cli.command {
        Command::Listen => listen(port, &config)?,
        Command::Send { id, command } => send(port, &config, &id, &command)?,
        Command::FetchLatest { name } => {
            images.fetch_latest(&mut port, &mut observer, name.as_deref())?;
        }
        Command::List => {
            images.fetch_listing(&mut port, &mut observer)?;
        }
        Command::Fetch { name } => {
            images.fetch_named(&mut port, &mut observer, &name)?;
        }
        Command::Settings { action } => match action {
            SettingsAction::Get => {
                images.query_settings(&mut port, &mut observer)?;
            }
            SettingsAction::Set { values } => {
                let settings = PictureSettings::parse(&values)?;
                images.push_settings(&mut port, &mut observer, settings)?;
            }
        },
        Command::Flip { axis } => images.flip(&mut port, &mut observer, axis.into())?,
        Command::TimeSync => {
            images.time_sync(&mut port, &mut observer)?;
        }
        Command::Ping { .. } => {
            images.ping_test(&mut port, &mut observer)?;
        }
        Command::RuntimeData => {
            for line in images.runtime_data(&mut port, &mut observer)? {
                println!("{line}");
            }
        }
        Command::Status => {
            images.request_device_status(&mut port)?;
            listen(port, &config)?;
        }
    }
    Ok(())
}

/// Route Ctrl-C to a cancel token and a wake-up channel.
fn interrupt() -> Result<(CancelToken, Receiver<()>)> {
    let cancel = CancelToken::new();
    let (tx, rx) = crossbeam_channel::bounded(1);
    let token = cancel.clone();
    ctrlc::set_handler(move || {
        token.cancel();
        let _ = tx.try_send(());
    })?;
    Ok((cancel, rx))
}

fn listen(port: RadioPort, config: &GroundConfig) -> Result<()> {
    let (_, interrupted) = interrupt()?;
    let listener = ReceiveLoop::new(port, ConsoleSink::stdout())
        .with_command_config(config.command.clone())
        .start()?;
    info!("listening, Ctrl-C to stop");

    let _ = interrupted.recv();
    listener.stop()?;
    info!("stopped");
    Ok(())
}

fn send(port: RadioPort, config: &GroundConfig, id: &str, command: &str) -> Result<()> {
    let (cancel, _) = interrupt()?;
    let mut listener = ReceiveLoop::new(port, ConsoleSink::stdout())
        .with_command_config(config.command.clone())
        .start()?;

    let outcome = listener.send_command(id, command, &cancel);
    listener.stop()?;

    match outcome? {
        CommandOutcome::Acknowledged {
            elapsed,
            transmissions,
        } => println!(
            "{id} acknowledged after {transmissions} transmissions ({:.1}s)",
            elapsed.as_secs_f64()
        ),
        CommandOutcome::Canceled { transmissions } => {
            println!("{id} canceled after {transmissions} transmissions")
        }
    }
    Ok(())
}
