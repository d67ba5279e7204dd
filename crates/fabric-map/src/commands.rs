use std::fs;
use std::path::Path;

use fabric_core::{
    AccessWidth, Clock, Fabric, FabricConfig, InitiatorId, NoTrace, Response, Transaction,
};
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::args::{ConfigSource, RunArgs};
use crate::CliError;

/// Offset of the `outval` register inside a delta-sigma window.
const OUTVAL_OFFSET: u32 = 0x0;
/// Offset of the `conf` register inside a delta-sigma window.
const CONF_OFFSET: u32 = 0x4;
/// `conf.en`.
const CONF_ENABLE: u32 = 0x01;

/// Installs a stderr subscriber filtered by `RUST_LOG`, defaulting to `warn`.
///
/// Repeated calls leave the first subscriber in place.
pub fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Reads the fabric description named by `source`.
///
/// # Errors
///
/// Returns [`CliError::Read`] or [`CliError::Parse`] for an unreadable or malformed file.
pub fn load_config(source: &ConfigSource) -> Result<FabricConfig, CliError> {
    match source {
        ConfigSource::Reference => Ok(FabricConfig::reference()),
        ConfigSource::File(path) => {
            let text = fs::read_to_string(path).map_err(|source| CliError::Read {
                path: path.clone(),
                source,
            })?;
            let config = parse_config(path, &text)?;
            debug!(
                path = %path.display(),
                initiators = config.initiators.len(),
                peripherals = config.peripherals.len(),
                "loaded fabric description"
            );
            Ok(config)
        }
    }
}

fn parse_config(path: &Path, text: &str) -> Result<FabricConfig, CliError> {
    toml::from_str(text).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Builds the fabric and renders its peripheral descriptors as pretty JSON.
///
/// # Errors
///
/// Returns [`CliError::Config`] when the description does not build.
pub fn describe(config: &FabricConfig) -> Result<String, CliError> {
    let fabric = config.build()?;
    Ok(serde_json::to_string_pretty(fabric.peripheral_descriptors())?)
}

/// Builds the fabric and summarises what it maps.
///
/// # Errors
///
/// Returns [`CliError::Config`] when the description does not build.
pub fn check(config: &FabricConfig) -> Result<String, CliError> {
    let fabric = config.build()?;
    let mut lines = vec![format!(
        "ok: {} initiators, {} targets, {} peripherals",
        fabric.initiator_names().count(),
        fabric.targets().count(),
        fabric.peripheral_descriptors().len()
    )];
    lines.extend(fabric.targets().map(|target| {
        format!(
            "  {:<12} {:#010x}..{:#011x}",
            target.name,
            target.range.base(),
            target.range.end()
        )
    }));
    Ok(lines.join("\n"))
}

/// Ones counted on one delta-sigma channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    /// Instance name.
    pub channel: String,
    /// Code that was written.
    pub code: u32,
    /// Cycles sampled.
    pub cycles: u64,
    /// Cycles on which the output was high.
    pub ones: u64,
}

impl std::fmt::Display for ChannelReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: code {:#x}, {} ones in {} cycles",
            self.channel, self.code, self.ones, self.cycles
        )
    }
}

/// Programs `args.channel` with `args.code` over the bus, enables it, and counts the
/// high output cycles over the next `args.cycles` cycles.
///
/// The first initiator issues both register writes.
///
/// # Errors
///
/// Returns [`CliError`] when the fabric does not build, the channel is missing or not
/// a delta-sigma block, or a register write faults.
pub fn run_channel(config: &FabricConfig, args: &RunArgs) -> Result<ChannelReport, CliError> {
    let mut fabric = config.build()?;
    let descriptor = fabric
        .peripheral_descriptors()
        .iter()
        .find(|descriptor| descriptor.name == args.channel)
        .ok_or_else(|| CliError::UnknownChannel(args.channel.clone()))?;
    if descriptor.class != "pdm" {
        return Err(CliError::NotAChannel {
            name: descriptor.name.clone(),
            class: descriptor.class.clone(),
        });
    }
    let base = descriptor.base_address;

    let mut clock = Clock::new();
    write_register(
        &mut fabric,
        &mut clock,
        Transaction::write(
            InitiatorId::new(0),
            base + OUTVAL_OFFSET,
            AccessWidth::Half,
            args.code,
        ),
    )?;
    write_register(
        &mut fabric,
        &mut clock,
        Transaction::write(
            InitiatorId::new(0),
            base + CONF_OFFSET,
            AccessWidth::Byte,
            CONF_ENABLE,
        ),
    )?;
    info!(channel = %args.channel, code = args.code, "channel enabled");

    let mut ones = 0;
    for _ in 0..args.cycles {
        fabric.step(clock.advance(), &mut NoTrace);
        let high = fabric
            .peripheral(&args.channel)
            .is_some_and(|channel| channel.pins().output & 1 == 1);
        ones += u64::from(high);
    }

    Ok(ChannelReport {
        channel: args.channel.clone(),
        code: args.code,
        cycles: args.cycles,
        ones,
    })
}

fn write_register(
    fabric: &mut Fabric,
    clock: &mut Clock,
    transaction: Transaction,
) -> Result<(), CliError> {
    let completion = fabric.execute(transaction.initiator, transaction, clock, &mut NoTrace)?;
    match completion.response {
        Response::Ack { .. } => Ok(()),
        Response::Error(fault) => Err(CliError::Transaction {
            address: transaction.address,
            fault,
        }),
    }
}
