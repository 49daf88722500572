//! Voltage Sample Demo
//!
//! Polls a simulated SunSpec inverter on an interval:
//! - Discovers the model chain and loads the common model once
//! - Refreshes the inverter block through a cached field group each tick
//! - Prints typed readings from lock-free snapshots
//!
//! Usage: cargo run --features demo --bin demo [ticks]
//! Log level: RUST_LOG=voltage_sample=debug

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use voltage_sample::codec::encode_ascii;
use voltage_sample::constants::SUNSPEC_MARKER;
use voltage_sample::{
    FieldGroup, ModelAccessor, ModelDiscovery, ModelKind, ReadFunction, RegisterImage,
    RegisterPoller, RegisterStore,
};

const INVERTER_HEADER: u16 = 40070;
const INVERTER_BODY: u16 = INVERTER_HEADER + 2;

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Common model (1) followed by a three phase inverter (103).
fn simulated_inverter() -> RegisterImage {
    let mut common = Vec::with_capacity(66);
    common.extend(encode_ascii("Voltage", 16));
    common.extend(encode_ascii("VS-10K-3P", 16));
    common.extend(encode_ascii("", 8));
    common.extend(encode_ascii("2.4.1", 8));
    common.extend(encode_ascii("VS2024000137", 16));
    common.extend([1, 0x8000]);

    let mut image = RegisterImage::new()
        .with_holding(40000, &SUNSPEC_MARKER)
        .with_holding(40002, &[1, 66])
        .with_holding(40004, &common)
        .with_holding(INVERTER_HEADER, &[103, 50])
        .with_holding(INVERTER_HEADER + 52, &[0xFFFF, 0]);
    image.insert(ReadFunction::Holding, INVERTER_BODY, &inverter_body(0));
    image
}

fn inverter_body(tick: u64) -> Vec<u16> {
    let mut body = vec![0u16; 50];
    let watts = 4_800 + (tick % 10) as u16 * 35;
    body[0] = watts / 23; // A, 0.1 A
    body[4] = (-1i16) as u16;
    body[8..11].copy_from_slice(&[2301, 2298, 2305]);
    body[11] = (-1i16) as u16;
    body[12] = watts;
    body[14] = 5001;
    body[15] = (-2i16) as u16;
    let energy = 1_250_000u32 + tick as u32 * 2;
    body[22] = (energy >> 16) as u16;
    body[23] = energy as u16;
    body[24] = 0;
    body[31] = 412;
    body[35] = (-1i16) as u16;
    body[36] = 4;
    body
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let ticks: u64 = std::env::args()
        .nth(1)
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or(5);

    println!("Voltage Sample v{} Demo", voltage_sample::VERSION);
    println!("==========================\n");

    let store = Arc::new(RegisterStore::new());
    let poller = Arc::new(RegisterPoller::new(simulated_inverter(), Arc::clone(&store)));
    let discovery = ModelDiscovery::new(1);

    // Part 1: discovery
    let models = {
        let poller = Arc::clone(&poller);
        let discovery = discovery.clone();
        tokio::task::spawn_blocking(move || poller.discover(&discovery)).await?
    };
    for model in &models {
        println!(
            "  model {:>3} ({}) at {}, {} registers",
            model.model_id, model.kind, model.base_address, model.model_length
        );
    }

    if let Some(common) = models.find_kind(ModelKind::Common).copied() {
        let poller = Arc::clone(&poller);
        let discovery = discovery.clone();
        tokio::task::spawn_blocking(move || poller.load_model(&discovery, &common)).await??;
        let snapshot = store.snapshot();
        if let ModelAccessor::Common(view) = common.accessor(&snapshot) {
            println!(
                "\n  {} {} (serial {}, firmware {})\n",
                view.manufacturer()?.unwrap_or_default(),
                view.model()?.unwrap_or_default(),
                view.serial_number()?.unwrap_or_default(),
                view.version()?.unwrap_or_default()
            );
        }
    }

    let Some(inverter) = models.find_kind(ModelKind::IntegerInverter).copied() else {
        warn!("No inverter model found");
        return Ok(());
    };
    poller.add_group(FieldGroup::new("inverter", 2_000, vec![inverter.body_range(1)]));

    // Part 2: interval polling
    let mut timer = interval(Duration::from_millis(1_000));
    for tick in 0..ticks {
        timer.tick().await;
        poller.with_device(|d| d.insert(ReadFunction::Holding, INVERTER_BODY, &inverter_body(tick)));

        let refreshed = {
            let poller = Arc::clone(&poller);
            tokio::task::spawn_blocking(move || poller.refresh_expired()).await?
        };
        match refreshed {
            Ok(groups) if groups.is_empty() => info!("tick {}: cache still fresh", tick),
            Ok(groups) => info!("tick {}: refreshed {:?}", tick, groups),
            Err(e) => warn!("tick {}: poll failed: {}", tick, e),
        }

        let snapshot = store.snapshot();
        if let ModelAccessor::Inverter(view) = inverter.accessor(&snapshot) {
            println!(
                "  [{}] {:>7.1} W  {:>6.1} V  {:>5.2} Hz  {:>10.0} Wh  {:?}",
                tick,
                view.active_power()?.unwrap_or(f64::NAN),
                view.voltage()?.unwrap_or(f64::NAN),
                view.frequency()?.unwrap_or(f64::NAN),
                view.lifetime_energy()?.unwrap_or(f64::NAN),
                view.state()?
            );
        }
    }

    println!("\n{}", store.debug_string().lines().take(6).collect::<Vec<_>>().join("\n"));
    Ok(())
}
