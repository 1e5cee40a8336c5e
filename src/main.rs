mod command;
mod connection;
mod hardware;
mod store;
mod transport;

use anyhow::{Context, Result};
use command::DeviceContext;
use connection::{DeviceConfig, DeviceServer};
use hardware::{Fs20Frame, Rc5Frame, Ws300Reading, IO_PORTS};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use store::{ConfigStore, FileStore, MemoryStore};
use tokio::sync::Mutex;
use transport::TcpAcceptor;

use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How often the simulated radios and pins produce input
const SIMULATION_PERIOD: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = DeviceConfig::from_env()?;
    info!("ecmd device {} starting", env!("CARGO_PKG_VERSION"));

    let store: Box<dyn ConfigStore> = match &config.store_path {
        Some(path) => {
            let store = FileStore::open(path)
                .with_context(|| format!("Failed to open store {}", path.display()))?;
            info!("  config store: {}", store.path().display());
            Box::new(store)
        }
        None => {
            info!("  config store: in memory");
            Box::new(MemoryStore::new())
        }
    };

    let network = store.network();
    info!("  mac {}, ip {}/{}", store.mac(), network.ip, network.netmask);

    let server = DeviceServer::new(config, DeviceContext::simulated(store))?;

    // Spawn hardware simulation task
    let context = server.context();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SIMULATION_PERIOD);
        loop {
            ticker.tick().await;
            simulate_inputs(&context).await;
        }
    });

    let acceptor = TcpAcceptor::bind(&server.config().listen)
        .await
        .with_context(|| format!("Failed to listen on {}", server.config().listen))?;
    info!("  listening on {}", acceptor.local_addr()?);

    match server.run(acceptor).await? {
        Some(request) => info!("Leaving for {}", request),
        None => info!("Shutting down"),
    }
    Ok(())
}

/// Feed received radio frames, weather data and pin levels into the device
async fn simulate_inputs(context: &Arc<Mutex<DeviceContext>>) {
    // thread_rng must not live across the lock below
    let (fs20, rc5, ws300, port, level) = {
        let mut rng = rand::thread_rng();
        let fs20 = Fs20Frame::new(0x1b1b, rng.gen_range(0..4), rng.gen_range(0x00..=0x12));
        let rc5 = Rc5Frame::new(rng.gen_range(0..32), rng.gen_range(0..64));
        let ws300 = Ws300Reading {
            temp: rng.gen_range(15..25),
            temp_frac: rng.gen_range(0..10),
            humidity: rng.gen_range(30..70),
            wind: rng.gen_range(0..20),
            wind_frac: rng.gen_range(0..10),
            raining: rng.gen_bool(0.2),
            rain_counter: rng.gen_range(0..500),
        };
        let port = rng.gen_range(0..IO_PORTS);
        let level: u8 = rng.gen();
        (fs20, rc5, ws300, port, level)
    };

    let mut ctx = context.lock().await;
    ctx.fs20_rx.push(fs20);
    ctx.rc5_rx.push(rc5);
    ctx.ws300 = ws300;
    ctx.ports.set_external(port, level);
    debug!("Simulated input: fs20 {}, rc5 {}, pins {}={:02x}", fs20, rc5, port, level);
}
