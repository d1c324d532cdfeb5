//! The `simcore` CLI driver.
//!
//! Runs named configurations from a YAML configuration file against the
//! built-in demo networks, lists configurations, and describes
//! registered types.

use clap::{Parser, Subcommand};
use simcore::prelude::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// The configuration file to operate on.
    #[arg(short, long, global = true, default_value = "sim.yml")]
    file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a named configuration.
    Run {
        /// The name of the configuration to execute.
        config: String,

        /// Write the event log to the given file.
        #[arg(long)]
        event_log: Option<PathBuf>,

        /// Override the seed of the default random number stream.
        #[arg(long)]
        seed: Option<u64>,

        /// Suppress the runtime banners.
        #[arg(long)]
        quiet: bool,
    },
    /// List the configurations of the configuration file.
    ListConfigs,
    /// Describe a registered network or module type.
    Describe {
        /// The type name to look up.
        ty: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let registry = demo_registry();

    match dispatch(cli, &registry) {
        Ok(code) => exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            exit(e.exit_code());
        }
    }
}

fn dispatch(cli: Cli, registry: &Registry) -> Result<i32, SimError> {
    match cli.command {
        Command::Run {
            config,
            event_log,
            seed,
            quiet,
        } => {
            let file = ConfigFile::load(&cli.file)?;
            let config = file.get(&config)?;

            let (sim, mut builder) = config.instantiate(registry)?;
            if let Some(seed) = seed {
                builder = builder.seeds(vec![seed]);
            }
            if let Some(path) = event_log {
                let out = File::create(&path).map_err(|e| {
                    SimError::Config(format!("cannot create '{}': {e}", path.display()))
                })?;
                builder = builder.event_log(BufWriter::new(out));
            }
            if quiet {
                builder = builder.quiet();
            }

            let interrupted = Arc::new(AtomicBool::new(false));
            {
                let interrupted = interrupted.clone();
                ctrlc::set_handler(move || interrupted.store(true, Ordering::Relaxed))
                    .expect("cannot install interrupt handler");
            }
            builder = builder.interrupt_flag(interrupted);

            let result = builder.build(sim).run();
            if let Some(error) = result.error() {
                eprintln!("error: {error}");
            }
            Ok(result.exit_code())
        }
        Command::ListConfigs => {
            let file = ConfigFile::load(&cli.file)?;
            for name in file.names() {
                let config = file.get(name)?;
                println!("{name}  (network: {})", config.network);
            }
            Ok(0)
        }
        Command::Describe { ty } => {
            let Some(description) = registry.describe(&ty) else {
                return Err(SimError::Config(format!("unknown type '{ty}'")));
            };
            println!("{ty}: {description}");
            Ok(0)
        }
    }
}

// # Demo networks

const PING: MessageKind = 1;
const PONG: MessageKind = 2;

/// A node that plays ping-pong over its `out`/`in` gate pair. The node
/// with the `initiator` parameter set serves first.
struct PingNode;

impl Module for PingNode {
    fn at_sim_start(&mut self, _stage: usize) {
        if par("initiator").as_deref() == Some("true") {
            schedule_at(Message::new().build(), SimTime::ZERO);
        }
    }

    fn handle_message(&mut self, msg: Message) {
        if msg.header().is_self_message() || msg.header().kind == PONG {
            send(Message::new().kind(PING).build(), "out");
        } else {
            send(Message::new().kind(PONG).build(), "out");
        }
    }
}

fn demo_registry() -> Registry {
    Registry::new()
        .network(
            "Ping",
            "two nodes exchanging ping/pong over a 1s delay line",
            |sim| {
                sim.node("a", PingNode);
                sim.node("b", PingNode);

                let link = Some(ChannelMetrics::delay(Duration::from_secs(1)));
                let a_out = sim.gate("a", "out", GateKind::Output);
                let b_in = sim.gate("b", "in", GateKind::Input);
                a_out.connect(b_in, link);

                let b_out = sim.gate("b", "out", GateKind::Output);
                let a_in = sim.gate("a", "in", GateKind::Input);
                b_out.connect(a_in, link);
            },
        )
        .module_type("PingNode", "ping-pong endpoint with an out/in gate pair")
}
