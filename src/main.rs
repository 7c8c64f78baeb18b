//! CLI entry point for the HVPS controller.
//!
//! Exit code convention: 0 on success, 1 on any validation rejection or
//! protocol error. Validation rejections are expected outcomes and are
//! printed as plain operator messages, not backtraces.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use hvps_ctrl::bias::{self, AutoConfirm, BiasController, Confirm, ConfirmRequest};
use hvps_ctrl::config::Settings;
use hvps_ctrl::marshal;
use hvps_ctrl::session::SessionPool;
use hvps_ctrl::telemetry::Publisher;
use hvps_ctrl::topology;
use hvps_ctrl::vendor::{CaenTable, MockCrate, VendorTable};

#[derive(Parser)]
#[command(name = "hvps-ctrl")]
#[command(about = "Control a CAEN HVPS crate biasing detector channels", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, default_value = "hvps.toml")]
    config: PathBuf,

    /// HVPS device name from the configuration (optional when only one is configured)
    #[arg(long, global = true)]
    device: Option<String>,

    /// Slot to address (defaults to default_slot from the configuration)
    #[arg(long, global = true)]
    slot: Option<u16>,

    /// Skip the confirmation prompt
    #[arg(long, global = true)]
    force: bool,

    /// Run against the built-in crate simulator instead of real hardware
    #[arg(long, global = true)]
    mock: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show status of all channels, or one channel with --chan
    Status {
        #[arg(long)]
        chan: Option<u16>,

        /// Publish the snapshot to the configured MQTT broker
        #[arg(long)]
        publish: bool,
    },

    /// Bias a channel (to its configured maximum unless --voltage is given)
    Bias {
        #[arg(long)]
        chan: u16,

        /// Target voltage in volts
        #[arg(long)]
        voltage: Option<f32>,
    },

    /// Ramp a channel down to 0 V
    Unbias {
        #[arg(long)]
        chan: u16,
    },

    /// Write a named channel parameter
    SetParam {
        #[arg(long)]
        chan: u16,

        #[arg(long)]
        param: String,

        #[arg(long)]
        value: String,
    },

    /// Enable a channel (Pw = 1)
    Enable {
        #[arg(long)]
        chan: u16,
    },

    /// Disable a channel (Pw = 0)
    Disable {
        #[arg(long)]
        chan: u16,
    },

    /// Show the crate map: slots, boards, firmware
    CrateInfo,
}

/// Interactive confirmation gate shown before any voltage change.
struct PromptGate;

impl Confirm for PromptGate {
    fn confirm(&self, request: &ConfirmRequest) -> bool {
        println!("-------------------------------------");
        println!("CHANNEL NUMBER    : {}", request.channel);
        println!("DETECTOR NAME     : {}", request.detector);
        println!("MAX BIAS VOLTAGE  : {} V", request.channel_limit);
        println!("RAMP RATE         : {} V/s", request.ramp_rate);
        println!("CURRENT VOLTAGE   : {} V", request.current_voltage);
        println!("** NEW VOLTAGE    : {} V", request.requested_voltage);
        println!("-------------------------------------");
        inquire::Confirm::new(&format!(
            "Are you sure you want to {} this channel?",
            request.action
        ))
        .with_default(false)
        .prompt()
        .unwrap_or(false)
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn parse_param_value(param: &str, value: &str) -> anyhow::Result<f32> {
    if marshal::is_int_coded(param) {
        let v: i64 = value
            .parse()
            .with_context(|| format!("parameter {param} takes an integer value"))?;
        Ok(v as f32)
    } else {
        value
            .parse()
            .with_context(|| format!("parameter {param} takes a numeric value"))
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("could not load {}", cli.config.display()))?;
    init_tracing(&settings.log_level);

    let api: Arc<dyn VendorTable> = if cli.mock {
        Arc::new(MockCrate::new())
    } else {
        Arc::new(CaenTable::new())
    };

    let pool = SessionPool::open_all(api, &settings)?;
    {
        let session = pool.select(cli.device.as_deref())?;
        let device = settings
            .devices
            .get(session.name())
            .context("no settings for the selected device")?;
        let slot = cli.slot.unwrap_or(settings.default_slot);
        let gate: Box<dyn Confirm> = if cli.force {
            Box::new(AutoConfirm(true))
        } else {
            Box::new(PromptGate)
        };

        match &cli.command {
            Commands::Status { chan, publish } => {
                let reports = match chan {
                    Some(chan) => vec![bias::status_one(session, slot, *chan)?],
                    None => bias::status_all(session)?,
                };
                for report in &reports {
                    println!("{report}");
                }
                if *publish {
                    let mqtt = settings
                        .mqtt
                        .as_ref()
                        .context("status --publish requires an [mqtt] section in the configuration")?;
                    let publisher = Publisher::connect(mqtt)?;
                    publisher.publish_snapshot(session.name(), &reports)?;
                    publisher.disconnect();
                }
            }

            Commands::Bias { chan, voltage } => {
                let controller = BiasController::new(session, device, slot);
                let report = controller.bias(*chan, *voltage, gate.as_ref())?;
                println!(
                    "channel {} ramping from {} V to {} V at {} V/s",
                    report.channel, report.previous, report.target, report.ramp_rate
                );
            }

            Commands::Unbias { chan } => {
                let controller = BiasController::new(session, device, slot);
                let report = controller.unbias(*chan, gate.as_ref())?;
                println!(
                    "channel {} ramping down from {} V at {} V/s",
                    report.channel, report.previous, report.ramp_rate
                );
            }

            Commands::SetParam { chan, param, value } => {
                let value = parse_param_value(param, value)?;
                marshal::write_parameter(session, slot, *chan, param, value)?;
                println!("channel {chan}: {param} = {value}");
            }

            Commands::Enable { chan } => {
                marshal::write_parameter(session, slot, *chan, marshal::POWER, 1.0)?;
                println!("channel {chan} enabled");
            }

            Commands::Disable { chan } => {
                marshal::write_parameter(session, slot, *chan, marshal::POWER, 0.0)?;
                println!("channel {chan} disabled");
            }

            Commands::CrateInfo => {
                let topo = topology::crate_info(session)?;
                println!(
                    "{} @ {}: {} slot(s)",
                    session.name(),
                    session.hostname(),
                    topo.slots
                );
                for slot in 0..topo.slots as usize {
                    println!(
                        "  slot {}: {} ({}), {} channels, serial {}, firmware {}",
                        slot,
                        topo.models[slot],
                        topo.descriptions[slot],
                        topo.channels_per_slot[slot],
                        topo.serial_numbers[slot],
                        topo.firmware[slot]
                    );
                }
            }
        }
    }
    pool.close_all();
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}
