use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use clap::Parser;
use matter_bridge::icd::{
    AttributePath, AttributeType, AttributeValue, BridgeEvent, ListenerId,
};
use matter_bridge::{
    Bridge, BridgeConfig, CompletionToken, Listener, NetworkStatus,
    SimulatedStack, StackCallbacks,
};
use static_cell::StaticCell;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const ON_OFF: AttributePath = AttributePath::new(1, 0x0006, 0x0000);
const CURRENT_LEVEL: AttributePath = AttributePath::new(1, 0x0008, 0x0000);

#[derive(Parser)]
#[command(
    name = "bridge-sim",
    about = "Run a simulated device stack through a commissioning flow"
)]
struct Args {
    /// Network name the simulated commissioner provisions
    #[arg(long, default_value = "home-network")]
    ssid: String,

    /// Network secret the simulated commissioner provisions
    #[arg(long, default_value = "correct horse battery staple")]
    credentials: String,

    #[arg(long, default_value_t = 20202021)]
    pin: u32,

    #[arg(long, default_value_t = 3840)]
    discriminator: u32,

    /// Commissioning window length in seconds
    #[arg(long, default_value_t = 300)]
    window_secs: u32,

    /// Report a failed connection instead of a successful one
    #[arg(long)]
    fail_connect: bool,

    /// JSON file with bridge configuration overrides
    #[arg(long)]
    config: Option<PathBuf>,
}

static BRIDGE: StaticCell<Bridge<SimulatedStack>> = StaticCell::new();

/// Plays the stack's side: raises requests from its own thread and waits
/// for each to complete, up to the advisory timeout.
fn run_stack(bridge: &Bridge<SimulatedStack>, ssid: &[u8], credentials: &[u8]) {
    let (done_tx, done_rx) = mpsc::channel();

    bridge.on_attribute_changed(ON_OFF, AttributeType::BOOLEAN, &[1]);
    bridge.on_attribute_changed(CURRENT_LEVEL, AttributeType::INT8U, &[128]);
    bridge.on_network_added(ssid, credentials);

    let tx = done_tx.clone();
    let scan = CompletionToken::new(move |status| {
        let _ = tx.send(status);
    });
    let timeout = Duration::from_secs(bridge.scan_timeout_secs().into());
    match bridge.on_scan_requested(scan) {
        Ok(()) => match done_rx.recv_timeout(timeout) {
            Ok(status) => info!(?status, "scan completed"),
            Err(_) => warn!("scan timed out"),
        },
        Err((e, token)) => {
            warn!(error = %e, "scan rejected");
            token.complete(NetworkStatus::UnknownError);
        }
    }

    let connect = CompletionToken::new(move |status| {
        let _ = done_tx.send(status);
    });
    let timeout = Duration::from_secs(bridge.connect_timeout_secs().into());
    match bridge.on_connect_requested(connect, ssid) {
        Ok(()) => match done_rx.recv_timeout(timeout) {
            Ok(status) => info!(?status, "connect completed"),
            Err(_) => warn!("connect timed out"),
        },
        Err((e, token)) => {
            warn!(error = %e, "connect rejected");
            token.complete(NetworkStatus::NetworkNotFound);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => BridgeConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => BridgeConfig::default(),
    };
    let bridge: &'static Bridge<SimulatedStack> =
        BRIDGE.init(Bridge::new(SimulatedStack::new(), config));

    let handle = bridge.acquire()?;
    handle.set_commissioning_info(args.pin, args.discriminator)?;
    handle.set_device_info(0xFFF1, 0x8000, 1, "SIM-0001")?;
    handle.start()?;
    handle.open_commissioning_window(args.window_secs)?;
    handle.set_attribute(1, 0x0008, 0x0000, AttributeValue::U8(128))?;

    let payload = handle.setup_payload();
    println!("QR code:     {}", payload.qr_code);
    println!("Manual code: {}", payload.manual_code);

    let (listener, mut events) =
        Listener::channel(ListenerId(u64::from(std::process::id())));
    handle.register_listener(listener);

    let ssid = args.ssid.into_bytes();
    let credentials = args.credentials.into_bytes();
    let mut stack = tokio::task::spawn_blocking(move || {
        run_stack(bridge, &ssid, &credentials)
    });

    loop {
        tokio::select! {
            joined = &mut stack => {
                joined?;
                break;
            }
            Some(event) = events.recv() => match event {
                BridgeEvent::ScanNetworks { .. } => {
                    println!("scan requested");
                    handle.report_wifi_scan_result(0);
                }
                BridgeEvent::ConnectNetwork { ssid, .. } => {
                    println!(
                        "connect requested: {}",
                        String::from_utf8_lossy(&ssid)
                    );
                    handle.report_wifi_connect_result(args.fail_connect as i32);
                }
                BridgeEvent::AddNetwork { ssid, credentials } => println!(
                    "network added: {} ({} byte secret)",
                    String::from_utf8_lossy(&ssid),
                    credentials.len()
                ),
                BridgeEvent::AttributeChanged(report) => {
                    println!(
                        "attribute {:?} changed: {:?}",
                        report.path, report.value
                    );
                }
            },
        }
    }

    let level = handle.get_attribute(1, 0x0008, 0x0000);
    println!("level readback: {level:?}");
    handle.set_attribute(1, 0x0006, 0x0000, AttributeValue::Bool(false))?;

    let info = handle.info();
    println!("{}", serde_json::to_string_pretty(&info)?);

    handle.stop()?;
    handle.release();
    println!("stack initialized after release: {}", bridge.is_initialized());
    Ok(())
}
