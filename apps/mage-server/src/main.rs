use anyhow::Context;
use clap::Parser;
use glam::Vec2;
use mage_kernel::protocol::{ChatRequest, IdentifyRequest, MoveRequest};
use mage_kernel::{MemoryAccounts, ObjectKind, ServerEvent, World, WorldConfig};
use mage_net::{LoopbackClient, LoopbackTransport, Router, bind_world};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mage-server", about = "Run the world simulation with scripted loopback clients")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// JSON file with a world config; missing fields take defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the config's RNG seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of ticks to run
    #[arg(short, long, default_value = "200")]
    ticks: u64,

    /// Milliseconds between ticks
    #[arg(long, default_value = "50")]
    tick_ms: u64,

    /// Butterflies scattered on the starting map
    #[arg(long, default_value = "12")]
    butterflies: usize,

    /// Flowers scattered on the starting map
    #[arg(long, default_value = "6")]
    flowers: usize,

    /// Scripted clients wandering the map
    #[arg(long, default_value = "2")]
    bots: usize,
}

fn load_config(cli: &Cli) -> anyhow::Result<WorldConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => WorldConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    Ok(config)
}

/// Scatter decorations and critters on a ring around the spawn point.
fn populate(world: &mut World, butterflies: usize, flowers: usize) -> anyhow::Result<()> {
    let start = world.starting_map().clone();
    let spawn = world.config().spawn;
    let kinds = std::iter::repeat_n(ObjectKind::Butterfly, butterflies)
        .chain(std::iter::repeat_n(ObjectKind::Flower, flowers));
    let total = (butterflies + flowers).max(1) as f32;
    for (i, kind) in kinds.enumerate() {
        let angle = i as f32 / total * std::f32::consts::TAU;
        let radius = 4.0 + (i % 3) as f32 * 2.0;
        let pos = spawn + Vec2::from_angle(angle) * radius;
        let obj = world.create(kind);
        world.join(obj, &start, pos)?;
    }
    tracing::info!(butterflies, flowers, "populated starting map");
    Ok(())
}

/// A client that identifies, walks in a slow circle, says hello, and leaves.
fn run_bot(
    n: usize,
    router: Arc<Router>,
    transport: Arc<LoopbackTransport>,
    steps: u64,
    pause: Duration,
) -> usize {
    let client = LoopbackClient::connect(router, transport);
    let mut received = 0;
    if let Err(err) = client.send("identify", &IdentifyRequest::with_token(format!("bot-{n}"))) {
        tracing::warn!(bot = n, %err, "identify failed");
        return received;
    }
    for step in 0..steps {
        thread::sleep(pause);
        let angle = step as f32 * 0.1 + n as f32;
        let pos = Vec2::from_angle(angle) * 5.0;
        if let Err(err) = client.send("move", &MoveRequest { pos: pos.to_array() }) {
            tracing::debug!(bot = n, %err, "bot stopped");
            break;
        }
        if step == steps / 2 {
            let chat = ChatRequest {
                message: format!("hello from bot {n}"),
            };
            if let Err(err) = client.send("chat", &chat) {
                tracing::debug!(bot = n, %err, "bot stopped");
                break;
            }
        }
        for event in client.receive() {
            received += 1;
            if let ServerEvent::Chat { from, message } = event {
                tracing::debug!(bot = n, %from, %message, "bot heard chat");
            }
        }
    }
    client.hang_up();
    received
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = load_config(&cli)?;
    tracing::info!(seed = config.seed, ticks = cli.ticks, "mage-server starting");

    let transport = Arc::new(LoopbackTransport::new());
    let mut world = World::new(config, MemoryAccounts::new(), transport.clone());
    transport.attach(world.handle());

    let mut router = Router::new();
    bind_world(&mut router, world.handle());
    let router = Arc::new(router);

    populate(&mut world, cli.butterflies, cli.flowers)?;

    let tick = Duration::from_millis(cli.tick_ms);
    let bot_steps = cli.ticks.saturating_sub(cli.ticks / 4);
    let bots: Vec<_> = (0..cli.bots)
        .map(|n| {
            let router = Arc::clone(&router);
            let transport = Arc::clone(&transport);
            thread::spawn(move || run_bot(n, router, transport, bot_steps, tick))
        })
        .collect();

    for _ in 0..cli.ticks {
        let started = Instant::now();
        world.update();
        if world.tick() % 50 == 0 {
            tracing::info!("{}", world.summary());
        }
        if let Some(rest) = tick.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    for (n, bot) in bots.into_iter().enumerate() {
        match bot.join() {
            Ok(received) => tracing::info!(bot = n, received, "bot finished"),
            Err(_) => tracing::error!(bot = n, "bot thread panicked"),
        }
    }
    // Deliver disconnects queued by the bots on their way out.
    world.update();

    let butterflies = world
        .index()
        .iter()
        .filter(|o| o.kind() == ObjectKind::Butterfly)
        .count();
    println!("{}", world.summary());
    println!("butterflies left: {butterflies}/{}", cli.butterflies);

    Ok(())
}
