//! The InputProcessor owns the polling thread that moves state from the
//! physical controller, through the script pipeline, to the virtual gamepad.
use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use thiserror::Error;

use crate::{
    config::{ScriptSettings, WeaponPreset, DEFAULT_LED_COLOR, DEFAULT_POLL_RATE},
    drivers::dualsense::driver::{ConnectionType, Driver, UpdateStatus},
    input::{
        normalize::normalize_state,
        script::{info::ScriptConfig, Pipeline},
        state::StateSnapshot,
        target::{SinkError, VirtualGamepad},
    },
};

/// Highest poll rate accepted by [InputProcessor::set_poll_rate]
pub const MAX_POLL_RATE: f64 = 8000.0;
/// Minimum time between automatic reconnect attempts
const RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// Represents all possible errors starting the [InputProcessor]
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Virtual gamepad unavailable: {0}")]
    Sink(#[from] SinkError),
    #[error("Unable to spawn processor thread: {0}")]
    Spawn(#[from] io::Error),
}

/// State shared between the processor handle and its worker thread
struct Shared {
    device: Mutex<Driver>,
    pipeline: Mutex<Pipeline>,
    gamepad: Mutex<VirtualGamepad>,
    snapshot: Mutex<StateSnapshot>,
    preset: Mutex<Option<WeaponPreset>>,
    led_color: Mutex<[u8; 3]>,
    timing: Mutex<Timing>,
    stop: AtomicBool,
    /// Set by the caller, consumed by the next tick
    led_pending: AtomicBool,
    reconnect_requested: AtomicBool,
    device_connected: AtomicBool,
    /// Link of the connected controller, see [link_to_raw]
    device_link: AtomicU8,
    sink_connected: AtomicBool,
    /// Poll rate in Hz stored as f64 bits
    poll_rate: AtomicU64,
}

struct Timing {
    last_tick: Instant,
    last_device_attempt: Option<Instant>,
    last_sink_attempt: Option<Instant>,
}

/// Lock the given mutex, recovering the data if another thread panicked
/// while holding it
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

const LINK_NONE: u8 = 0;
const LINK_USB: u8 = 1;
const LINK_BLUETOOTH: u8 = 2;

fn link_to_raw(link: Option<ConnectionType>) -> u8 {
    match link {
        None => LINK_NONE,
        Some(ConnectionType::Usb) => LINK_USB,
        Some(ConnectionType::Bluetooth) => LINK_BLUETOOTH,
    }
}

fn link_from_raw(value: u8) -> Option<ConnectionType> {
    match value {
        LINK_USB => Some(ConnectionType::Usb),
        LINK_BLUETOOTH => Some(ConnectionType::Bluetooth),
        _ => None,
    }
}

/// Returns true if enough time passed since the last attempt and records the
/// new attempt
fn should_retry(last_attempt: &mut Option<Instant>, now: Instant) -> bool {
    if let Some(last) = last_attempt {
        if now.duration_since(*last) < RETRY_INTERVAL {
            return false;
        }
    }
    *last_attempt = Some(now);
    true
}

impl Shared {
    fn poll_period(&self) -> Duration {
        let rate = f64::from_bits(self.poll_rate.load(Ordering::Relaxed));
        Duration::from_secs_f64(1.0 / rate)
    }

    fn apply_led(&self, device: &mut Driver) {
        self.led_pending.store(false, Ordering::Relaxed);
        let [r, g, b] = *lock(&self.led_color);
        device.set_led_color(r, g, b);
    }

    /// Publish the connection status of the given driver to callers
    fn publish_device(&self, device: &Driver) {
        let connected = device.is_connected();
        let link = connected.then(|| device.connection_type());
        self.device_connected.store(connected, Ordering::Relaxed);
        self.device_link.store(link_to_raw(link), Ordering::Relaxed);
    }

    /// Run one pipeline tick. Returns true if a new snapshot was published.
    fn tick(&self) -> bool {
        let now = Instant::now();
        let delta_time = {
            let mut timing = lock(&self.timing);
            let delta_time = now.duration_since(timing.last_tick).as_secs_f32();
            timing.last_tick = now;
            delta_time
        };

        // Read the controller
        let raw = {
            let mut device = lock(&self.device);
            let reconnect = self.reconnect_requested.swap(false, Ordering::Relaxed);
            if reconnect {
                log::info!("Reconnecting DualSense");
                device.disconnect();
            }
            if !device.is_connected() {
                if !reconnect && !should_retry(&mut lock(&self.timing).last_device_attempt, now)
                {
                    return false;
                }
                match device.connect() {
                    Ok(()) => self.apply_led(&mut device),
                    Err(e) => {
                        if reconnect {
                            log::warn!("Unable to reconnect DualSense: {e}");
                        } else {
                            log::trace!("DualSense not available: {e}");
                        }
                        self.publish_device(&device);
                        return false;
                    }
                }
                self.publish_device(&device);
            } else if self.led_pending.load(Ordering::Relaxed) {
                self.apply_led(&mut device);
            }
            match device.update() {
                Ok(UpdateStatus::Changed) => *device.state(),
                Ok(UpdateStatus::NoChange) => return false,
                Err(e) => {
                    log::warn!("Lost connection to DualSense: {e}");
                    self.publish_device(&device);
                    return false;
                }
            }
        };

        let input = normalize_state(&raw, delta_time);
        let preset = lock(&self.preset).clone();
        let output = lock(&self.pipeline).process(&input, preset.as_ref());

        {
            let mut gamepad = lock(&self.gamepad);
            if !gamepad.is_connected()
                && should_retry(&mut lock(&self.timing).last_sink_attempt, now)
            {
                match gamepad.connect() {
                    Ok(()) => self.sink_connected.store(true, Ordering::Relaxed),
                    Err(e) => log::trace!("Virtual gamepad still unavailable: {e}"),
                }
            }
            if gamepad.is_connected() {
                if let Err(e) = gamepad.update(&output) {
                    log::warn!("Failed to update virtual gamepad: {e}");
                    gamepad.disconnect();
                    self.sink_connected.store(false, Ordering::Relaxed);
                }
            }
        }

        *lock(&self.snapshot) = StateSnapshot { input, output };
        true
    }

    fn run(&self) {
        log::debug!("Input processor thread started");
        while !self.stop.load(Ordering::Acquire) {
            let start = Instant::now();
            self.tick();

            // Sleep for the rest of the period. Overruns start the next tick
            // right away without catching up.
            let period = self.poll_period();
            let elapsed = start.elapsed();
            if elapsed < period {
                thread::sleep(period - elapsed);
            }
        }
        log::debug!("Input processor thread stopped");
    }
}

/// Handle to the polling loop and the components it drives
pub struct InputProcessor {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl InputProcessor {
    pub fn new(device: Driver, pipeline: Pipeline, gamepad: VirtualGamepad) -> Self {
        let device_connected = device.is_connected();
        let device_link = link_to_raw(device_connected.then(|| device.connection_type()));
        let sink_connected = gamepad.is_connected();
        let shared = Shared {
            device: Mutex::new(device),
            pipeline: Mutex::new(pipeline),
            gamepad: Mutex::new(gamepad),
            snapshot: Mutex::new(StateSnapshot::default()),
            preset: Mutex::new(None),
            led_color: Mutex::new(DEFAULT_LED_COLOR),
            timing: Mutex::new(Timing {
                last_tick: Instant::now(),
                last_device_attempt: None,
                last_sink_attempt: None,
            }),
            stop: AtomicBool::new(false),
            led_pending: AtomicBool::new(false),
            reconnect_requested: AtomicBool::new(false),
            device_connected: AtomicBool::new(device_connected),
            device_link: AtomicU8::new(device_link),
            sink_connected: AtomicBool::new(sink_connected),
            poll_rate: AtomicU64::new(DEFAULT_POLL_RATE.to_bits()),
        };
        Self {
            shared: Arc::new(shared),
            worker: None,
        }
    }

    /// Load the scripts, try to connect the controller and create the
    /// virtual gamepad. A missing controller is retried by the polling loop,
    /// but a missing virtual gamepad is an error.
    pub fn initialize(&self, saved: &[ScriptSettings]) -> Result<(), ProcessorError> {
        lock(&self.shared.pipeline).rescan(saved);

        {
            let mut device = lock(&self.shared.device);
            if !device.is_connected() {
                match device.connect() {
                    Ok(()) => log::info!("DualSense connected over {}", device.connection_type()),
                    Err(e) => log::warn!("DualSense controller not found: {e}"),
                }
            }
            if device.is_connected() {
                self.shared.apply_led(&mut device);
            }
            self.shared.publish_device(&device);
        }

        let mut gamepad = lock(&self.shared.gamepad);
        let result = gamepad.connect();
        self.shared
            .sink_connected
            .store(gamepad.is_connected(), Ordering::Relaxed);
        result?;
        Ok(())
    }

    /// Spawn the polling thread. Does nothing if it is already running.
    pub fn start(&mut self) -> Result<(), ProcessorError> {
        if self.is_running() {
            return Ok(());
        }
        {
            let mut gamepad = lock(&self.shared.gamepad);
            if !gamepad.is_connected() {
                gamepad.connect()?;
                self.shared.sink_connected.store(true, Ordering::Relaxed);
            }
        }

        self.shared.stop.store(false, Ordering::Release);
        lock(&self.shared.timing).last_tick = Instant::now();
        let shared = self.shared.clone();
        let worker = thread::Builder::new()
            .name("input-processor".to_string())
            .spawn(move || shared.run())?;
        self.worker = Some(worker);
        log::info!("Input processor started at {} Hz", self.poll_rate());
        Ok(())
    }

    /// Signal the polling thread to exit and wait for it
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.shared.stop.store(true, Ordering::Release);
        if worker.join().is_err() {
            log::error!("Input processor thread panicked");
        }
        log::info!("Input processor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Run a single tick on the calling thread. Returns true if a new
    /// snapshot was published.
    pub fn poll_once(&self) -> bool {
        self.shared.tick()
    }

    pub fn poll_rate(&self) -> f64 {
        f64::from_bits(self.shared.poll_rate.load(Ordering::Relaxed))
    }

    /// Change the poll rate. Takes effect at the next tick. Rates that are
    /// not positive are ignored.
    pub fn set_poll_rate(&self, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 {
            log::warn!("Ignoring invalid poll rate: {rate}");
            return;
        }
        let rate = rate.min(MAX_POLL_RATE);
        self.shared
            .poll_rate
            .store(rate.to_bits(), Ordering::Relaxed);
        log::debug!("Poll rate set to {rate} Hz");
    }

    /// Input and output state of the most recent tick
    pub fn snapshot(&self) -> StateSnapshot {
        *lock(&self.shared.snapshot)
    }

    pub fn is_device_connected(&self) -> bool {
        self.shared.device_connected.load(Ordering::Relaxed)
    }

    pub fn is_sink_connected(&self) -> bool {
        self.shared.sink_connected.load(Ordering::Relaxed)
    }

    pub fn device_connection_type(&self) -> Option<ConnectionType> {
        link_from_raw(self.shared.device_link.load(Ordering::Relaxed))
    }

    pub fn sink_last_error(&self) -> Option<String> {
        lock(&self.shared.gamepad).last_error().map(String::from)
    }

    /// Ask the polling loop to drop the controller connection and connect
    /// again on its next tick, bypassing the retry interval
    pub fn reconnect_device(&self) {
        self.shared.reconnect_requested.store(true, Ordering::Relaxed);
    }

    /// Recreate the virtual gamepad
    pub fn reconnect_sink(&self) -> Result<(), SinkError> {
        let mut gamepad = lock(&self.shared.gamepad);
        gamepad.disconnect();
        let result = gamepad.connect();
        self.shared
            .sink_connected
            .store(gamepad.is_connected(), Ordering::Relaxed);
        result
    }

    /// Set the lightbar color. The polling loop writes it on its next tick
    /// and again after every reconnect.
    pub fn set_led_color(&self, r: u8, g: u8, b: u8) {
        *lock(&self.shared.led_color) = [r, g, b];
        self.shared.led_pending.store(true, Ordering::Relaxed);
    }

    /// Weapon preset handed to anti-recoil scripts on every tick
    pub fn set_active_preset(&self, preset: Option<WeaponPreset>) {
        *lock(&self.shared.preset) = preset;
    }

    pub fn active_preset(&self) -> Option<WeaponPreset> {
        lock(&self.shared.preset).clone()
    }

    /// Run the given closure with exclusive access to the script pipeline
    pub fn with_pipeline<R>(&self, f: impl FnOnce(&mut Pipeline) -> R) -> R {
        let mut pipeline = lock(&self.shared.pipeline);
        f(&mut *pipeline)
    }

    pub fn script_configs(&self) -> Vec<ScriptConfig> {
        self.with_pipeline(|pipeline| pipeline.configs())
    }

    pub fn set_script_enabled(&self, name: &str, enabled: bool) -> bool {
        self.with_pipeline(|pipeline| pipeline.set_enabled(name, enabled))
    }

    pub fn set_script_parameter(&self, name: &str, key: &str, value: f32) -> bool {
        self.with_pipeline(|pipeline| pipeline.set_parameter(name, key, value))
    }

    pub fn rescan_scripts(&self, saved: &[ScriptSettings]) {
        self.with_pipeline(|pipeline| pipeline.rescan(saved));
    }
}

impl Drop for InputProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}
