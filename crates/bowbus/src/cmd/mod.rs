use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use bowbus_codec::Decoder;
use bowbus_session::{
    connect_tcp, open_serial, FieldMap, FieldRef, Procedure, Reporter, Session, SessionConfig,
    SessionOutcome,
};
use bowbus_transport::{BusStream, SerialConfig, DEFAULT_BAUD_RATE};
use clap::{ArgGroup, Args, Subcommand};
use tracing::warn;

use crate::exit::{session_error, transport_error, CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod clear;
pub mod decode;
pub mod monitor;
pub mod pair;
pub mod ports;
pub mod scan;
pub mod version;

/// Settings every subcommand sees.
pub struct Context {
    pub format: OutputFormat,
    pub decoder: Decoder,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode a captured byte stream (binary or hex text).
    Decode(DecodeArgs),
    /// Passively decode live bus traffic until interrupted.
    Monitor(MonitorArgs),
    /// Read every data id a device answers to.
    Scan(ScanArgs),
    /// Store the display's serial number in the motor.
    PairDisplay(PairDisplayArgs),
    /// Store the motor's serial number in the battery.
    PairBattery(PairBatteryArgs),
    /// Reset the battery's stored error state.
    ClearError(ClearErrorArgs),
    /// List serial ports on this host.
    Ports(PortsArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, ctx: &Context) -> CliResult<i32> {
    match command {
        Command::Decode(args) => decode::run(args, ctx),
        Command::Monitor(args) => monitor::run(args, ctx),
        Command::Scan(args) => scan::run(args, ctx),
        Command::PairDisplay(args) => pair::run_display(args, ctx),
        Command::PairBattery(args) => pair::run_battery(args, ctx),
        Command::ClearError(args) => clear::run(args, ctx),
        Command::Ports(args) => ports::run(args, ctx),
        Command::Version(args) => version::run(args),
    }
}

/// Where the bus is.
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("bus").required(true).args(["port", "tcp"])))]
pub struct BusArgs {
    /// Serial port (e.g. /dev/ttyUSB0, COM3).
    #[arg(long, short = 'p', env = "BOWBUS_PORT")]
    pub port: Option<PathBuf>,
    /// TCP serial bridge (host:port) instead of a local port.
    #[arg(long, value_name = "ADDR")]
    pub tcp: Option<String>,
    /// Serial baud rate.
    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Read timeout, also the poll interval (e.g. 225ms, 1s).
    #[arg(long, default_value = "225ms", value_parser = parse_duration)]
    pub read_timeout: Duration,
}

impl BusArgs {
    pub fn open_stream(&self) -> CliResult<BusStream> {
        match (&self.tcp, &self.port) {
            (Some(addr), _) => BusStream::connect_tcp(addr, self.read_timeout)
                .map_err(|err| transport_error("connect failed", err)),
            (None, Some(path)) => BusStream::open_serial(path, self.serial_config())
                .map_err(|err| transport_error("open failed", err)),
            (None, None) => Err(CliError::new(
                crate::exit::USAGE,
                "either --port or --tcp is required",
            )),
        }
    }

    pub fn open_session(&self, config: SessionConfig) -> CliResult<Session<BusStream, BusStream>> {
        let config = SessionConfig {
            read_timeout: self.read_timeout,
            ..config
        };
        match (&self.tcp, &self.port) {
            (Some(addr), _) => {
                connect_tcp(addr, config).map_err(|err| session_error("connect failed", err))
            }
            (None, Some(path)) => open_serial(path, self.serial_config(), config)
                .map_err(|err| session_error("open failed", err)),
            (None, None) => Err(CliError::new(
                crate::exit::USAGE,
                "either --port or --tcp is required",
            )),
        }
    }

    fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            baud_rate: self.baud,
            read_timeout: self.read_timeout,
        }
    }
}

/// Session tuning shared by the procedure commands.
#[derive(Args, Debug, Default)]
pub struct SessionArgs {
    /// Give up after this many silent reads while waking the battery.
    #[arg(long, value_name = "N")]
    pub wakeup_limit: Option<u32>,
}

/// Device field overrides, each DEVICE:DESC:ID with hex codes (e.g. 0x02:0x40:0x71).
#[derive(Args, Debug, Default)]
pub struct FieldArgs {
    /// Motor field holding the first paired display serial.
    #[arg(long, value_name = "FIELD")]
    pub display_slot1: Option<FieldRef>,
    /// Motor field holding the second paired display serial.
    #[arg(long, value_name = "FIELD")]
    pub display_slot2: Option<FieldRef>,
    /// Motor serial number field.
    #[arg(long, value_name = "FIELD")]
    pub motor_serial: Option<FieldRef>,
    /// Battery field holding the paired motor serial.
    #[arg(long, value_name = "FIELD")]
    pub battery_motor_serial: Option<FieldRef>,
    /// Battery error state field.
    #[arg(long, value_name = "FIELD")]
    pub battery_error: Option<FieldRef>,
}

impl FieldArgs {
    pub fn field_map(&self) -> FieldMap {
        let defaults = FieldMap::default();
        let [slot1, slot2] = defaults.display_serial_slots;
        FieldMap {
            display_serial_slots: [
                self.display_slot1.unwrap_or(slot1),
                self.display_slot2.unwrap_or(slot2),
            ],
            motor_serial: self.motor_serial.unwrap_or(defaults.motor_serial),
            battery_motor_serial: self
                .battery_motor_serial
                .unwrap_or(defaults.battery_motor_serial),
            battery_error: self.battery_error.unwrap_or(defaults.battery_error),
        }
    }
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Capture file to read.
    pub file: PathBuf,
    /// Treat the file as hex text (pairs of hex digits, anything else ignored).
    #[arg(long)]
    pub hex: bool,
}

#[derive(Args, Debug)]
pub struct MonitorArgs {
    #[command(flatten)]
    pub bus: BusArgs,
    /// Exit after N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ScanArgs {
    #[command(flatten)]
    pub bus: BusArgs,
    #[command(flatten)]
    pub session: SessionArgs,
    /// Device to scan (name or id, e.g. DISPLAY, 0x0c).
    #[arg(long, default_value = "DISPLAY", value_parser = parse_device)]
    pub target: u8,
    /// Descriptors to try, in order (comma-separated hex). Default: all.
    #[arg(long, value_delimiter = ',', value_parser = parse_hex_byte)]
    pub types: Option<Vec<u8>>,
}

#[derive(Args, Debug)]
pub struct PairDisplayArgs {
    #[command(flatten)]
    pub bus: BusArgs,
    #[command(flatten)]
    pub session: SessionArgs,
    #[command(flatten)]
    pub fields: FieldArgs,
    /// Motor slot to store the display serial in.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub slot: u8,
}

#[derive(Args, Debug)]
pub struct PairBatteryArgs {
    #[command(flatten)]
    pub bus: BusArgs,
    #[command(flatten)]
    pub session: SessionArgs,
    #[command(flatten)]
    pub fields: FieldArgs,
}

#[derive(Args, Debug)]
pub struct ClearErrorArgs {
    #[command(flatten)]
    pub bus: BusArgs,
    #[command(flatten)]
    pub session: SessionArgs,
    #[command(flatten)]
    pub fields: FieldArgs,
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Run `procedure` to completion, printing its progress lines on stderr.
///
/// Ctrl-C cancels the session.
/// Wait for the progress printer. Returns `false` if it panicked.
fn join_printer(printer: JoinHandle<()>) -> bool {
    match printer.join() {
        Ok(()) => true,
        Err(_) => {
            warn!("progress printer panicked, some progress lines may be missing");
            false
        }
    }
}

pub fn run_procedure<P: Procedure>(
    bus: &BusArgs,
    args: &SessionArgs,
    procedure: &mut P,
) -> CliResult<SessionOutcome> {
    let config = SessionConfig {
        wakeup_limit: args.wakeup_limit,
        ..SessionConfig::default().with_mode(procedure.startup_mode())
    };
    let (reporter, rx) = Reporter::channel(256);
    let printer = Reporter::spawn_printer(rx, std::io::stderr());

    let mut session = bus.open_session(config)?.with_reporter(reporter);
    install_ctrlc_handler(session.cancel_handle())?;
    let outcome = session.run(procedure);
    drop(session);
    join_printer(printer);

    outcome.map_err(|err| session_error(&format!("{} failed", procedure.name()), err))
}

pub fn install_ctrlc_handler(flag: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };
    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration value: {input}"))?;
    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

fn parse_hex_byte(input: &str) -> Result<u8, String> {
    let digits = input.trim();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(digits);
    u8::from_str_radix(digits, 16).map_err(|_| format!("invalid hex byte: {input}"))
}

fn parse_device(input: &str) -> Result<u8, String> {
    let named = [
        ("MOTOR", bowbus_frame::device::MOTOR),
        ("BATTERY", bowbus_frame::device::BATTERY),
        ("PC", bowbus_frame::device::PC),
        ("DISPLAY", bowbus_frame::device::DISPLAY),
    ];
    if let Some((_, id)) = named
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(input.trim()))
    {
        return Ok(*id);
    }
    let id = parse_hex_byte(input)?;
    if bowbus_frame::device::is_valid(id) {
        Ok(id)
    } else {
        Err(format!("device id {id:#04x} is out of range"))
    }
}
