use clap::{Parser, Subcommand};
use powerbank_rs::protocol::{DEFAULT_CHUNK_TIMEOUT, DEFAULT_MAX_STATE_ATTEMPTS};
use powerbank_rs::serial::{DEFAULT_BAUD_RATE, DEFAULT_DEVICE};
use powerbank_rs::ups::DEFAULT_SHUTDOWN_COMMAND;
use powerbank_rs::{
    Command, Powerbank, ProtocolConfig, SerialTransport, ShutdownCommand, StateReport, UpsConfig,
    UpsMonitor,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "powerbank-ctl", version)]
#[command(about = "Control and monitor a serial-attached power bank")]
struct Args {
    /// (Virtual) serial device the power bank is connected to
    #[arg(short, long, default_value = DEFAULT_DEVICE)]
    device: String,

    /// Baud rate
    #[arg(short = 'r', long, default_value_t = DEFAULT_BAUD_RATE)]
    baud_rate: u32,

    /// Status requests to issue before giving up on a silent device
    #[arg(long, default_value_t = DEFAULT_MAX_STATE_ATTEMPTS)]
    attempts: u32,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Dump configuration and state of the power bank
    Dump {
        /// JSON output
        #[arg(short, long)]
        json: bool,
    },
    /// Shut the system down when external power is off for a while
    Ups {
        /// Seconds to wait after power loss before shutting down
        #[arg(short = 'D', long, default_value_t = 60)]
        power_off_after: u64,

        /// Command used to power down the system
        #[arg(short, long, default_value = DEFAULT_SHUTDOWN_COMMAND)]
        shutdown_command: String,

        /// Milliseconds between polls while powered
        #[arg(long, default_value_t = 250)]
        idle_ms: u64,
    },
    /// Configure the name of the bank (omit to clear it)
    SetName { name: Option<String> },
    /// Write a BQ24295 charger register slot
    #[command(name = "set-bq24295")]
    SetBq24295 {
        /// Register slot, 0-9
        #[arg(short, long, allow_negative_numbers = true)]
        index: i32,

        /// Register value
        value: Option<u32>,
    },
    /// Switch USB power (on/off)
    SetUsb { state: Option<String> },
    /// Switch HV power (on/off)
    SetHv { state: Option<String> },
    /// Increase HV voltage by one of 64 steps
    IncHv,
    /// Decrease HV voltage by one of 64 steps
    DecHv,
}

impl Mode {
    /// Validated actuator command for write-only modes.
    fn command(&self) -> powerbank_rs::Result<Option<Command>> {
        let command = match self {
            Mode::Dump { .. } | Mode::Ups { .. } => return Ok(None),
            Mode::SetName { name } => Command::set_name(name.as_deref().unwrap_or_default())?,
            Mode::SetBq24295 { index, value } => Command::set_charger_register(*index, *value)?,
            Mode::SetUsb { state } => Command::usb_output(state.as_deref())?,
            Mode::SetHv { state } => Command::hv_output(state.as_deref())?,
            Mode::IncHv => Command::IncrementHv,
            Mode::DecHv => Command::DecrementHv,
        };
        Ok(Some(command))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();

    // Reject bad parameters before touching the device.
    let command = args.mode.command()?;

    let transport = SerialTransport::open(&args.device, args.baud_rate)
        .map_err(|e| format!("Failed opening {}: {}", args.device, e))?;
    let config = ProtocolConfig {
        chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
        max_state_attempts: args.attempts,
    };
    let mut bank = Powerbank::new(transport, config);

    match args.mode {
        Mode::Dump { json } => {
            let state = bank.read_state().await?;
            let info = bank.fetch_info().await?;
            let report = StateReport::new(&info, &state);
            if json {
                println!("{}", report.to_json()?);
            } else {
                print!("{report}");
            }
        }
        Mode::Ups {
            power_off_after,
            shutdown_command,
            idle_ms,
        } => {
            let config = UpsConfig {
                grace: Duration::from_secs(power_off_after),
                idle: Duration::from_millis(idle_ms),
            };
            let mut monitor = UpsMonitor::new(ShutdownCommand::new(shutdown_command), config);
            monitor.run(&mut bank).await?;
        }
        _ => {
            if let Some(command) = command {
                bank.execute(&command).await?;
            }
        }
    }

    Ok(())
}
