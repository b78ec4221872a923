use clap::{ArgEnum, Parser, Subcommand};
use esblink::{
    arbiter::ReadinessSnapshot,
    constants::{DEFAULT_BAUD_RATE, RESTART_GRACE_MS},
    control,
    serial::{SerialLink, SerialReader, StdDelay},
    Arbiter, ArbiterConfig, Channel, Config, ConnectionState, ControlConsumer, ControlQueue,
    ControlReceiver, EsbTransport, LivenessChanged, LivenessPolicy, PreferenceState, ReportKind,
    Restart,
};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prints the frame a report would be sent as
    Encode {
        #[clap(short, long, arg_enum)]
        kind: Kind,
        /// Report payload as hex, e.g. `0200040000000000`
        payload: String,
    },

    /// Asks a bridge whether it is in ESB mode
    Query {
        #[clap(short, long)]
        port: String,
        #[clap(short, long, default_value_t = DEFAULT_BAUD_RATE)]
        baud: u32,
        #[clap(long, default_value_t = 1000)]
        timeout_ms: u64,
    },

    /// Sends a single report through a bridge
    Send {
        #[clap(short, long)]
        port: String,
        #[clap(short, long, default_value_t = DEFAULT_BAUD_RATE)]
        baud: u32,
        #[clap(short, long, arg_enum)]
        kind: Kind,
        payload: String,
        /// Treat the bridge as alive without waiting for its answer
        #[clap(long)]
        optimistic: bool,
        #[clap(long, default_value_t = RESTART_GRACE_MS)]
        grace_ms: u32,
        #[clap(long, default_value_t = 1000)]
        timeout_ms: u64,
    },

    /// Logs control traffic and liveness changes until interrupted
    Monitor {
        #[clap(short, long)]
        port: String,
        #[clap(short, long, default_value_t = DEFAULT_BAUD_RATE)]
        baud: u32,
    },

    /// Evaluates the channel selection for the given readiness
    Select {
        #[clap(long)]
        usb: bool,
        #[clap(long)]
        ble: bool,
        #[clap(long)]
        esb: bool,
        #[clap(long, arg_enum)]
        prefer: Option<Route>,
        #[clap(long, arg_enum, default_value = "esb")]
        default: Route,
        /// Toggle once after applying the preference
        #[clap(long)]
        toggle: bool,
    },
}

#[derive(ArgEnum, Clone, Copy)]
enum Kind {
    Keyboard,
    Consumer,
    Mouse,
}

impl From<Kind> for ReportKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Keyboard => ReportKind::Keyboard,
            Kind::Consumer => ReportKind::Consumer,
            Kind::Mouse => ReportKind::Mouse,
        }
    }
}

#[derive(ArgEnum, Clone, Copy)]
enum Route {
    Usb,
    Ble,
    Esb,
}

impl From<Route> for Channel {
    fn from(route: Route) -> Self {
        match route {
            Route::Usb => Channel::Usb,
            Route::Ble => Channel::Ble,
            Route::Esb => Channel::Esb,
        }
    }
}

/// A host has nothing to reboot, so a restart request ends the process
struct ProcessRestart;

impl Restart for ProcessRestart {
    fn restart(&mut self) -> ! {
        log::warn!("bridge requested a restart, exiting");
        std::process::exit(0)
    }
}

type HostTransport<'s> =
    EsbTransport<'s, SerialLink, fn(LivenessChanged), StdDelay, ProcessRestart>;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Encode { kind, payload } => {
            let payload = parse_hex(&payload)?;
            let frame = esblink::encode(kind.into(), &payload)?;
            println!("{}", to_hex(&frame));
        }
        Commands::Query {
            port,
            baud,
            timeout_ms,
        } => {
            let state = ConnectionState::new();
            let link = SerialLink::open(&port, baud)?;
            let reader = link.reader()?;
            let mut transport = host_transport(&state, link, Config::default());

            let ready = with_control(reader, |consumer| {
                transport.start()?;
                Ok(wait_until_ready(&mut transport, consumer, timeout_ms))
            })?;

            println!("{}", if ready { "ESB" } else { "unavailable" });
        }
        Commands::Send {
            port,
            baud,
            kind,
            payload,
            optimistic,
            grace_ms,
            timeout_ms,
        } => {
            let payload = parse_hex(&payload)?;
            let config = Config {
                liveness: if optimistic {
                    LivenessPolicy::OptimisticSend
                } else {
                    LivenessPolicy::ControlOnly
                },
                restart_grace_ms: grace_ms,
            };

            let state = ConnectionState::new();
            let link = SerialLink::open(&port, baud)?;
            let reader = link.reader()?;
            let mut transport = host_transport(&state, link, config);

            with_control(reader, |consumer| {
                transport.start()?;
                if !optimistic && !wait_until_ready(&mut transport, consumer, timeout_ms) {
                    log::warn!("bridge did not answer within {}ms", timeout_ms);
                }
                transport.send_report(kind.into(), &payload)?;
                Ok(())
            })?;
        }
        Commands::Monitor { port, baud } => {
            let state = ConnectionState::new();
            let link = SerialLink::open(&port, baud)?;
            let reader = link.reader()?;
            let mut transport = host_transport(&state, link, Config::default());

            with_control(reader, |consumer| -> Result<(), Box<dyn std::error::Error>> {
                transport.start()?;
                loop {
                    while let Some(message) = consumer.dequeue() {
                        log::info!("control: {}", message);
                        transport.handle_control(&message);
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            })?;
        }
        Commands::Select {
            usb,
            ble,
            esb,
            prefer,
            default,
            toggle,
        } => {
            let preference = PreferenceState::new();
            let arbiter = Arbiter::new(
                ReadinessSnapshot { usb, ble, esb },
                &preference,
                ArbiterConfig {
                    default_channel: default.into(),
                },
            );

            if let Some(channel) = prefer {
                arbiter.set_preferred(channel.into());
            }

            let selected = if toggle {
                arbiter.toggle()
            } else {
                arbiter.selected_channel()
            };

            println!("{}", selected);
        }
    }

    Ok(())
}

const POLL_INTERVAL: Duration = Duration::from_millis(5);

fn host_transport(state: &ConnectionState, link: SerialLink, config: Config) -> HostTransport<'_> {
    EsbTransport::new(
        state,
        link,
        publish_liveness as fn(LivenessChanged),
        StdDelay,
        ProcessRestart,
        config,
    )
}

fn publish_liveness(event: LivenessChanged) {
    log::info!(
        "liveness changed: {}",
        if event.connected { "connected" } else { "disconnected" }
    );
}

/// Runs `task` while a background thread feeds serial input into the control queue
fn with_control<T>(
    mut reader: SerialReader,
    task: impl FnOnce(&mut ControlConsumer<'_>) -> Result<T, Box<dyn std::error::Error>>,
) -> Result<T, Box<dyn std::error::Error>> {
    let mut queue = ControlQueue::new();
    let (receiver, mut consumer) = control::split(&mut queue);
    let stop = AtomicBool::new(false);

    thread::scope(|scope| {
        let stop = &stop;
        scope.spawn(move || pump(&mut reader, receiver, stop));

        let result = task(&mut consumer);
        stop.store(true, Ordering::Relaxed);
        result
    })
}

fn pump(reader: &mut SerialReader, mut receiver: ControlReceiver<'_>, stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        if let Err(e) = reader.pump(&mut receiver) {
            log::error!("serial read failed: {}", e);
            break;
        }
    }

    if receiver.dropped() > 0 || receiver.overlong() > 0 {
        log::warn!(
            "control path lost {} messages and {} overlong lines",
            receiver.dropped(),
            receiver.overlong()
        );
    }
}

fn wait_until_ready(
    transport: &mut HostTransport<'_>,
    consumer: &mut ControlConsumer<'_>,
    timeout_ms: u64,
) -> bool {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);

    while Instant::now() < deadline {
        transport.poll_control(consumer);
        if transport.is_ready() {
            return true;
        }
        thread::sleep(POLL_INTERVAL);
    }

    false
}

fn parse_hex(input: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let digits: Vec<char> = input.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err("payload has an odd number of hex digits".into());
    }

    digits
        .chunks(2)
        .map(|pair| {
            let pair: String = pair.iter().collect();
            u8::from_str_radix(&pair, 16).map_err(|e| e.into())
        })
        .collect()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
