//! Run a ballot committee through setup, encryption and decryption in one process.

use ballot_dkg::{
    actor::{self, Actor},
    handler::{self, Handler, State},
    primitives::group::KeyPair,
    registry::Registry,
    shuffle::{MemoryBallots, ShuffleInstance},
    simulated::{self, Link, Network},
    Address, Error, PROTOCOL_CHANNEL, STREAM_CHANNEL,
};
use clap::{value_parser, Arg, Command};
use commonware_runtime::{deterministic, Metrics, Runner};
use commonware_utils::hex;
use std::{sync::Arc, time::Duration};
use tracing::{error, info, warn, Level};

/// Ballot every handler of the simulation serves.
const BALLOT: &str = "simulated-ballot";

/// Returns the version of the crate.
fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

struct Args {
    participants: u32,
    latency: Duration,
    message: String,
    guard: bool,
}

fn transport(err: simulated::Error) -> Error {
    Error::Transport(err.to_string())
}

async fn run(context: deterministic::Context, args: Args) -> Result<Vec<u8>, Error> {
    let network = Network::new(
        context.with_label("network"),
        simulated::Config {
            max_size: 1024 * 1024,
        },
    );
    let ballots = MemoryBallots::default();

    // Start a handler per node, each node routing the ballot to its handler through its own
    // registry
    let mut addresses = Vec::new();
    let mut registries = Vec::new();
    let mut actors = Vec::new();
    for i in 0..args.participants {
        let address = Address::from(format!("node-{i}"));
        let key = KeyPair::generate(&mut context.clone());
        let (protocol_sender, protocol_receiver) = network
            .register(address.clone(), PROTOCOL_CHANNEL)
            .map_err(transport)?;
        let (stream_sender, stream_receiver) = network
            .register(address.clone(), STREAM_CHANNEL)
            .map_err(transport)?;

        let mut cfg = handler::Config::new(address.clone(), key);
        if args.guard {
            cfg.guard = Some(Arc::new(ballots.clone()));
        }
        let (handler, state) = Handler::new(context.with_label(&format!("handler_{i}")), cfg);
        handler.start(
            (protocol_sender.clone(), protocol_receiver),
            stream_sender,
        );
        let registry: Registry<State> = Registry::new();
        registry.register(BALLOT.as_bytes(), state)?;

        let state = registry
            .get(BALLOT.as_bytes())
            .ok_or_else(|| Error::UnknownBallot(BALLOT.to_string()))?;
        actors.push(Actor::new(
            context.with_label(&format!("actor_{i}")),
            actor::Config::new(address.clone()),
            state,
            (protocol_sender, stream_receiver),
        ));
        addresses.push(address);
        registries.push(registry);
    }
    network
        .connect_all(&addresses, Link::new(args.latency))
        .map_err(transport)?;
    info!(participants = args.participants, "started handlers");

    // Generate the key
    let Some((initiator, others)) = actors.split_first_mut() else {
        return Err(Error::MalformedStart("no participants"));
    };
    let committee = initiator.discover(&addresses).await?;
    let group = initiator.setup(&committee).await?;
    info!(public = %hex(group.compress().as_bytes()), "committee certified");
    for (address, registry) in addresses.iter().zip(&registries) {
        if let Some(state) = registry.get(BALLOT.as_bytes()) {
            info!(?address, status = ?state.status(), "handler");
        }
    }

    // Encrypt on the initiator, decrypt on the last node
    let (ciphertext, remainder) = initiator.encrypt(args.message.as_bytes())?;
    if !remainder.is_empty() {
        warn!(dropped = remainder.len(), "message truncated");
    }
    if args.guard {
        ballots.push_instance(
            BALLOT,
            1,
            ShuffleInstance {
                shuffled_ballots: vec![ciphertext],
            },
        );
    }
    let decryptor = others.last_mut().unwrap_or(initiator);
    decryptor.decrypt(&ciphertext, BALLOT).await
}

fn main() {
    // Parse arguments
    let matches = Command::new("ballot-dkg-simulator")
        .about("Run a ballot committee through setup, encryption and decryption")
        .version(crate_version())
        .arg(
            Arg::new("participants")
                .long("participants")
                .default_value("5")
                .value_parser(value_parser!(u32))
                .help("Number of committee members"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .default_value("0")
                .value_parser(value_parser!(u64))
                .help("Seed of the deterministic runtime"),
        )
        .arg(
            Arg::new("message")
                .long("message")
                .default_value("Hello world")
                .value_parser(value_parser!(String))
                .help("Message to encrypt and decrypt"),
        )
        .arg(
            Arg::new("latency")
                .long("latency")
                .default_value("10")
                .value_parser(value_parser!(u64))
                .help("Latency of every link in milliseconds"),
        )
        .arg(
            Arg::new("shuffle-guard")
                .long("shuffle-guard")
                .num_args(0)
                .help("Only decrypt ciphertexts output by the ballot shuffle"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .default_value("info")
                .value_parser(value_parser!(Level))
                .help("The log level for traces. opts: (error, debug, info, warn, trace)"),
        )
        .get_matches();
    let level = matches
        .get_one::<Level>("log-level")
        .copied()
        .unwrap_or(Level::INFO);
    let seed = matches.get_one::<u64>("seed").copied().unwrap_or_default();
    let args = Args {
        participants: matches.get_one::<u32>("participants").copied().unwrap_or(5),
        latency: Duration::from_millis(matches.get_one::<u64>("latency").copied().unwrap_or(10)),
        message: matches
            .get_one::<String>("message")
            .cloned()
            .unwrap_or_default(),
        guard: matches.get_flag("shuffle-guard"),
    };

    // Create logger
    tracing_subscriber::fmt().with_max_level(level).init();

    // Run the committee
    let executor = deterministic::Runner::seeded(seed);
    match executor.start(|context| run(context, args)) {
        Ok(plaintext) => info!(plaintext = %String::from_utf8_lossy(&plaintext), "decrypted"),
        Err(err) => error!(?err, "simulation failed"),
    }
}
