//! MeterGuard firmware entry point.
//!
//! Hexagonal architecture around a single cooperative main loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareIo     EspSirenTimer   NvsAdapter     Esp32Time       │
//! │  (DigitalIo)    (SirenTimer)    (Config+NVS)   (Clock)         │
//! │  BotTransport   LogEventSink                                   │
//! │  (Transport)    (EventSink)                                    │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Scanner · WireMonitor · Alarm · NotificationQueue     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  esp_timer callbacks (one per side) → ToggleHandle             │
//! └────────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Result;
use log::{info, warn};

use meterguard::adapters::hardware::{EspSirenTimer, HardwareIo};
use meterguard::adapters::log_sink::LogEventSink;
use meterguard::adapters::nvs::NvsAdapter;
use meterguard::adapters::telegram::BotTransport;
use meterguard::adapters::time::Esp32TimeAdapter;
use meterguard::app::ports::{Clock, ConfigPort};
use meterguard::app::service::AppService;
use meterguard::config::AlarmConfig;
use meterguard::topology::Side;
use meterguard::{diagnostics, drivers};

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  MeterGuard v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    diagnostics::install_panic_handler();

    // ── 1b. Initialise hardware peripherals ───────────────────
    if let Err(e) = drivers::hw_init::init_peripherals() {
        // Without configured pins there is nothing safe to drive.
        log::error!("HAL init failed: {}, halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            AlarmConfig::default()
        }
    };

    // ── 3. Construct app service + adapters ───────────────────
    let mut app = AppService::new(config.clone());

    let mut sirens = EspSirenTimer::new(app.toggle_handle(Side::A), app.toggle_handle(Side::B))
        .map_err(|e| anyhow::anyhow!("siren timers: {e}"))?;
    let mut io = HardwareIo::new();
    let clock = Esp32TimeAdapter::new();
    let mut transport = BotTransport::new();
    let mut log_sink = LogEventSink::new();

    // ── 4. Startup sweep + greeting ───────────────────────────
    app.start(clock.now_ms(), &mut io, &mut nvs, &mut log_sink);
    app.announce_online(clock.now_ms(), &mut log_sink);
    info!("Free heap: {} bytes", diagnostics::free_heap());

    info!("System ready. Entering main loop.");

    // ── 5. Main loop ──────────────────────────────────────────
    let loop_interval = std::time::Duration::from_millis(u64::from(config.loop_interval_ms));
    loop {
        let now = clock.now_ms();
        app.tick(now, &mut io, &mut sirens, &mut transport, &nvs, &mut log_sink);

        std::thread::sleep(loop_interval);
    }
}
