//! Mock adapters for integration tests.
//!
//! Every port gets an in-memory stand-in that records what the service
//! did, so tests can assert on the full history without touching GPIO,
//! esp_timer, NVS or the network.

use embedded_hal::digital::PinState;
use meterguard::app::commands::AppCommand;
use meterguard::app::events::AppEvent;
use meterguard::app::ports::{
    Clock, ConfigError, ConfigPort, DigitalIo, EventSink, Line, MessageTransport, SirenTimer,
    StorageError, StoragePort,
};
use meterguard::app::service::AppService;
use meterguard::config::AlarmConfig;
use meterguard::error::Error;
use meterguard::notify::recipients::{RECIPIENT_NAMESPACE, Recipient};
use meterguard::notify::templates::TemplateKind;
use meterguard::scanner::{ENABLE_KEY, ENABLE_NAMESPACE};
use meterguard::topology::Side;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

// ── MockIo ────────────────────────────────────────────────────

/// Inputs default to LOW: circuits intact, no vibration.
#[derive(Default)]
pub struct MockIo {
    inputs: HashMap<Line, PinState>,
    pub writes: Vec<(Line, PinState)>,
}

#[allow(dead_code)]
impl MockIo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, line: Line, level: PinState) {
        self.inputs.insert(line, level);
    }

    /// Last level written to `line`.
    pub fn last_write(&self, line: Line) -> Option<PinState> {
        self.writes
            .iter()
            .rev()
            .find(|(l, _)| *l == line)
            .map(|(_, level)| *level)
    }

    pub fn writes_to(&self, line: Line) -> usize {
        self.writes.iter().filter(|(l, _)| *l == line).count()
    }
}

impl DigitalIo for MockIo {
    fn read(&mut self, line: Line) -> PinState {
        self.inputs.get(&line).copied().unwrap_or(PinState::Low)
    }

    fn write(&mut self, line: Line, level: PinState) {
        self.writes.push((line, level));
    }
}

// ── MockTimer ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCall {
    Start(Side, u32),
    Stop(Side),
}

#[derive(Default)]
pub struct MockTimer {
    pub calls: Vec<TimerCall>,
    running: [Option<u32>; 2],
}

#[allow(dead_code)]
impl MockTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(&self, side: Side) -> Option<u32> {
        self.running[side.index()]
    }
}

impl SirenTimer for MockTimer {
    fn start(&mut self, side: Side, interval_ms: u32) {
        self.calls.push(TimerCall::Start(side, interval_ms));
        self.running[side.index()] = Some(interval_ms);
    }

    fn stop(&mut self, side: Side) {
        self.calls.push(TimerCall::Stop(side));
        self.running[side.index()] = None;
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    saved: RefCell<Vec<AlarmConfig>>,
    /// When set, every write fails with this error.
    pub fail_writes: Option<StorageError>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raw(&self, namespace: &str, key: &str) -> Option<&[u8]> {
        self.store
            .get(&format!("{}::{}", namespace, key))
            .map(Vec::as_slice)
    }

    pub fn saved_configs(&self) -> Vec<AlarmConfig> {
        self.saved.borrow().clone()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.get(&format!("{}::{}", namespace, key)) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if let Some(e) = self.fail_writes {
            return Err(e);
        }
        self.store
            .insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{}::{}", namespace, key))
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<AlarmConfig, ConfigError> {
        Ok(self
            .saved
            .borrow()
            .last()
            .cloned()
            .unwrap_or_default())
    }

    fn save(&self, config: &AlarmConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.saved.borrow_mut().push(config.clone());
        Ok(())
    }
}

// ── MockTransport ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub token: String,
    pub chat_id: i64,
    pub text: String,
}

/// Replays scripted results in order, then succeeds.
#[derive(Default)]
pub struct MockTransport {
    script: VecDeque<Result<i64, String>>,
    pub sent: Vec<SentMessage>,
    next_id: i64,
}

#[allow(dead_code)]
impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_failure(&mut self, raw: &str) {
        self.script.push_back(Err(raw.to_owned()));
    }
}

impl MessageTransport for MockTransport {
    fn send(&mut self, token: &str, chat_id: i64, text: &str) -> Result<i64, String> {
        self.sent.push(SentMessage {
            token: token.to_owned(),
            chat_id,
            text: text.to_owned(),
        });
        self.script.pop_front().unwrap_or_else(|| {
            self.next_id += 1;
            Ok(self.next_id)
        })
    }
}

// ── ManualClock ───────────────────────────────────────────────

#[derive(Default)]
pub struct ManualClock {
    now: std::cell::Cell<u64>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) -> u64 {
        self.now.set(self.now.get() + ms);
        self.now.get()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

// ── LogSink ───────────────────────────────────────────────────

/// Collects every emitted event.
#[derive(Default)]
pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Fixtures ──────────────────────────────────────────────────

/// A well-formed bot token unique to `apartment`.
#[allow(dead_code)]
pub fn token_for(apartment: u8) -> String {
    format!("{}:AAFakeTokenForTests", 700_000 + u32::from(apartment))
}

/// Chat ids never collide across apartments, so fan-out entries are
/// never folded by de-duplication.
#[allow(dead_code)]
pub fn chat_for(apartment: u8) -> i64 {
    1_000 + i64::from(apartment)
}

// ── Rig ───────────────────────────────────────────────────────

/// The service wired to every mock, plus helpers to drive it.
pub struct Rig {
    pub app: AppService,
    pub io: MockIo,
    pub timer: MockTimer,
    pub nvs: MockNvs,
    pub transport: MockTransport,
    pub sink: LogSink,
    pub clock: ManualClock,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        Self::with_config(AlarmConfig::default())
    }

    pub fn with_config(config: AlarmConfig) -> Self {
        Self {
            app: AppService::new(config),
            io: MockIo::new(),
            timer: MockTimer::new(),
            nvs: MockNvs::new(),
            transport: MockTransport::new(),
            sink: LogSink::new(),
            clock: ManualClock::new(),
        }
    }

    /// Store an already-enabled recipient for `apartment` directly in NVS,
    /// as if configured in an earlier boot.
    pub fn seed_recipient(&mut self, apartment: u8) {
        let mut token = heapless::String::new();
        token.push_str(&token_for(apartment)).unwrap();
        let rec = Recipient {
            token,
            chat_id: chat_for(apartment),
            enabled: true,
            configured: true,
        };
        let bytes = postcard::to_allocvec(&rec).unwrap();
        self.nvs
            .write(RECIPIENT_NAMESPACE, &format!("apt_{apartment}"), &bytes)
            .unwrap();
    }

    pub fn seed_all_recipients(&mut self) {
        for apartment in 1..=24 {
            self.seed_recipient(apartment);
        }
    }

    /// Store a sensor enable map (bit per table index), as an operator
    /// would have left it before this boot.
    pub fn seed_enable_map(&mut self, bits: u32) {
        self.nvs
            .write(ENABLE_NAMESPACE, ENABLE_KEY, &bits.to_le_bytes()[..3])
            .unwrap();
    }

    pub fn seed_all_sensors(&mut self) {
        self.seed_enable_map(0x00FF_FFFF);
    }

    pub fn start(&mut self) {
        let now = self.clock.now_ms();
        self.app.start(now, &mut self.io, &mut self.nvs, &mut self.sink);
    }

    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        self.app.tick(
            now,
            &mut self.io,
            &mut self.timer,
            &mut self.transport,
            &self.nvs,
            &mut self.sink,
        );
    }

    /// Advance the clock and tick once.
    pub fn tick_after(&mut self, ms: u64) {
        self.clock.advance(ms);
        self.tick();
    }

    /// Tick every `step` ms until the clock reaches `until`.
    pub fn run_until(&mut self, until: u64, step: u64) {
        while self.clock.now_ms() < until {
            self.tick_after(step);
        }
    }

    pub fn command(&mut self, cmd: AppCommand) -> Result<(), Error> {
        let now = self.clock.now_ms();
        self.app.handle_command(
            cmd,
            now,
            &mut self.io,
            &mut self.timer,
            &mut self.nvs,
            &mut self.sink,
        )
    }

    /// Apartments that got a `NotificationQueued` of `kind`, in order.
    pub fn queued(&self, kind: TemplateKind) -> Vec<u8> {
        self.sink
            .events
            .iter()
            .filter_map(|e| match e {
                AppEvent::NotificationQueued { apartment, kind: k } if *k == kind => {
                    Some(apartment.get())
                }
                _ => None,
            })
            .collect()
    }
}
