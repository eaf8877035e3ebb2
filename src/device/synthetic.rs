//! Software sensors built from a device description.
//!
//! Frames are synthesized rather than captured: a depth ramp with a little
//! seeded noise, moving gradients for image streams and jittered motion
//! samples. Nothing about the data is meaningful; the point is that frame
//! numbers, timestamps, buffer recycling and threading behave the way a
//! real capture backend's do.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{BufferPool, Device, DeviceDescription, DeviceInfo, FrameCallback, Sensor, SensorDescription};
use crate::error::{Error, Result};
use crate::frame::{FrameBuilder, RawFrame};
use crate::stream::{Format, StreamKind, StreamProfile, TimestampDomain};

/// Longest a capture worker sleeps before rechecking its stop flag.
const IDLE_TICK: Duration = Duration::from_millis(5);

/// Base depth of the synthetic ramp, in raw units.
const DEPTH_BASE: u16 = 500;

/// How a synthetic device produces frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pacing {
    /// A worker thread per sensor emits frames at the profile framerate.
    #[default]
    Realtime,
    /// Frames are only emitted by [`SyntheticDevice::trigger`].
    Manual,
}

struct Generator {
    depth_scale: f32,
    domain: TimestampDomain,
    rng: ChaCha8Rng,
    numbers: HashMap<u32, u64>,
    buffers: Arc<BufferPool>,
}

impl Generator {
    /// Starts a new streaming epoch: frame numbers and hardware timestamps
    /// count from the first frame again.
    fn restart(&mut self) {
        self.numbers.clear();
    }

    fn next_frame(&mut self, profile: &StreamProfile) -> Result<RawFrame> {
        let counter = self.numbers.entry(profile.unique_id()).or_insert(0);
        *counter += 1;
        let number = *counter;

        let timestamp = match self.domain {
            TimestampDomain::SystemTime => Utc::now().timestamp_micros() as f64 / 1000.0,
            TimestampDomain::HardwareClock | TimestampDomain::GlobalTime => {
                number as f64 * profile.period_ms().unwrap_or(0.0)
            }
        };

        let builder = match profile.format().bytes_per_pixel() {
            _ if profile.kind() == StreamKind::Depth && profile.format() == Format::Z16 => {
                self.depth(profile, number)
            }
            Some(bytes_per_pixel) if profile.is_video() => self.image(profile, number, bytes_per_pixel),
            _ => self.sample(profile),
        };

        builder
            .number(number)
            .timestamp(timestamp, self.domain)
            .recycle_into(self.buffers.clone())
            .build()
    }

    fn depth(&mut self, profile: &StreamProfile, number: u64) -> FrameBuilder {
        let (width, height) = (profile.width(), profile.height());
        let stride = width * 2;
        let mut data = self.buffers.take(stride as usize * height as usize);
        for (i, pixel) in data.chunks_exact_mut(2).enumerate() {
            let x = i as u64 % width as u64;
            let y = i as u64 / width as u64;
            let ramp = ((x + y + number) % 3000) as u16;
            let noise = (self.rng.next_u32() % 8) as u16;
            pixel.copy_from_slice(&(DEPTH_BASE + ramp + noise).to_le_bytes());
        }
        FrameBuilder::depth(*profile, data, width, height, stride, self.depth_scale)
    }

    fn image(&mut self, profile: &StreamProfile, number: u64, bytes_per_pixel: u32) -> FrameBuilder {
        let (width, height) = (profile.width(), profile.height());
        let stride = width * bytes_per_pixel;
        let mut data = self.buffers.take(stride as usize * height as usize);
        for (y, row) in data.chunks_exact_mut(stride as usize).enumerate() {
            for (i, byte) in row.iter_mut().enumerate() {
                let x = i / bytes_per_pixel as usize;
                let shade = (x + y) as u64 + number;
                *byte = (shade as u8).wrapping_add((self.rng.next_u32() & 0x3) as u8);
            }
        }
        FrameBuilder::video(*profile, data, width, height, stride, bytes_per_pixel * 8)
    }

    fn sample(&mut self, profile: &StreamProfile) -> FrameBuilder {
        let mut jitter = || (self.rng.next_u32() as f32 / u32::MAX as f32 - 0.5) * 0.02;
        let values: Vec<f32> = match (profile.kind(), profile.format()) {
            (StreamKind::Accel, _) => vec![jitter(), -9.81 + jitter(), jitter()],
            (_, Format::SixDof) => vec![jitter(), jitter(), jitter(), 0.0, 0.0, 0.0, 1.0],
            _ => vec![jitter(), jitter(), jitter()],
        };
        let mut data = self.buffers.take(values.len() * 4);
        for (chunk, value) in data.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        FrameBuilder::motion(*profile, data)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds one frame for `profile` and hands it to `callback`.
///
/// The generator lock is released before the callback runs.
fn emit(generator: &Mutex<Generator>, profile: &StreamProfile, callback: &FrameCallback) -> bool {
    let built = lock(generator).next_frame(profile);
    match built {
        Ok(raw) => {
            callback(&raw);
            true
        }
        Err(e) => {
            tracing::error!(profile = %profile, error = %e, "Failed to synthesize frame");
            false
        }
    }
}

fn run_worker(
    profiles: Vec<StreamProfile>,
    generator: Arc<Mutex<Generator>>,
    callback: FrameCallback,
    stop: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
) {
    let start = Instant::now();
    let mut due: Vec<(StreamProfile, Instant)> = profiles.into_iter().map(|p| (p, start)).collect();

    while !stop.load(Ordering::Acquire) && connected.load(Ordering::Acquire) {
        let Some(next) = due
            .iter()
            .enumerate()
            .min_by_key(|(_, (_, at))| *at)
            .map(|(i, _)| i)
        else {
            break;
        };

        let (profile, at) = due[next];
        let now = Instant::now();
        if at > now {
            thread::sleep((at - now).min(IDLE_TICK));
            continue;
        }

        due[next].1 = at + Duration::from_secs_f64(1.0 / profile.framerate().max(1) as f64);
        emit(&generator, &profile, &callback);
    }
}

struct Streaming {
    callback: FrameCallback,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct SensorState {
    opened: Vec<StreamProfile>,
    streaming: Option<Streaming>,
}

/// A sensor of a [`SyntheticDevice`].
pub struct SyntheticSensor {
    name: String,
    profiles: Vec<StreamProfile>,
    depth_scale: Option<f32>,
    domain: TimestampDomain,
    pacing: Pacing,
    connected: Arc<AtomicBool>,
    generator: Arc<Mutex<Generator>>,
    state: Mutex<SensorState>,
}

impl SyntheticSensor {
    fn new(
        description: &SensorDescription,
        profiles: Vec<StreamProfile>,
        pacing: Pacing,
        connected: Arc<AtomicBool>,
        buffers: Arc<BufferPool>,
    ) -> Self {
        let rng = match description.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let generator = Generator {
            depth_scale: description.depth_scale.unwrap_or(0.001),
            domain: description.timestamp_domain,
            rng,
            numbers: HashMap::new(),
            buffers,
        };
        Self {
            name: description.name.clone(),
            profiles,
            depth_scale: description.depth_scale,
            domain: description.timestamp_domain,
            pacing,
            connected,
            generator: Arc::new(Mutex::new(generator)),
            state: Mutex::new(SensorState::default()),
        }
    }

    fn ensure_connected(&self, function: &'static str) -> Result<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(Error::native(function, self.name.clone(), "device disconnected"))
        }
    }

    /// Profiles currently opened.
    pub fn opened(&self) -> Vec<StreamProfile> {
        lock(&self.state).opened.clone()
    }

    /// Emits one frame per opened profile on the calling thread.
    ///
    /// Returns the number of frames delivered; zero when not streaming.
    pub fn trigger(&self) -> usize {
        if !self.connected.load(Ordering::Acquire) {
            return 0;
        }
        let (profiles, callback) = {
            let state = lock(&self.state);
            match &state.streaming {
                Some(streaming) => (state.opened.clone(), Arc::clone(&streaming.callback)),
                None => return 0,
            }
        };
        profiles
            .iter()
            .filter(|profile| emit(&self.generator, profile, &callback))
            .count()
    }
}

impl Sensor for SyntheticSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn stream_profiles(&self) -> Vec<StreamProfile> {
        self.profiles.clone()
    }

    fn open(&self, profiles: &[StreamProfile]) -> Result<()> {
        self.ensure_connected("open")?;
        let mut state = lock(&self.state);
        if !state.opened.is_empty() {
            return Err(Error::native("open", self.name.clone(), "sensor already open"));
        }
        if profiles.is_empty() {
            return Err(Error::native("open", self.name.clone(), "no profiles requested"));
        }
        if let Some(unknown) = profiles.iter().find(|p| !self.profiles.contains(p)) {
            return Err(Error::native(
                "open",
                unknown.to_string(),
                format!("profile not offered by sensor '{}'", self.name),
            ));
        }
        state.opened = profiles.to_vec();
        tracing::debug!(sensor = %self.name, streams = profiles.len(), "Sensor opened");
        Ok(())
    }

    fn start(&self, callback: FrameCallback) -> Result<()> {
        self.ensure_connected("start")?;
        let mut state = lock(&self.state);
        if state.opened.is_empty() {
            return Err(Error::native("start", self.name.clone(), "sensor not open"));
        }
        if state.streaming.is_some() {
            return Err(Error::native("start", self.name.clone(), "sensor already streaming"));
        }

        lock(&self.generator).restart();
        let stop = Arc::new(AtomicBool::new(false));
        let worker = match self.pacing {
            Pacing::Manual => None,
            Pacing::Realtime => {
                let profiles = state.opened.clone();
                let generator = Arc::clone(&self.generator);
                let callback = Arc::clone(&callback);
                let stop = Arc::clone(&stop);
                let connected = Arc::clone(&self.connected);
                let handle = thread::Builder::new()
                    .name(format!("{} capture", self.name))
                    .spawn(move || run_worker(profiles, generator, callback, stop, connected))
                    .map_err(|e| Error::native("start", self.name.clone(), e.to_string()))?;
                Some(handle)
            }
        };

        state.streaming = Some(Streaming { callback, stop, worker });
        tracing::info!(sensor = %self.name, pacing = ?self.pacing, "Sensor streaming");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let streaming = lock(&self.state).streaming.take();
        let Some(mut streaming) = streaming else {
            return Err(Error::native("stop", self.name.clone(), "sensor not streaming"));
        };

        streaming.stop.store(true, Ordering::Release);
        if let Some(worker) = streaming.worker.take() {
            if worker.thread().id() == thread::current().id() {
                tracing::debug!(sensor = %self.name, "Stop requested from capture thread");
            } else if worker.join().is_err() {
                tracing::warn!(sensor = %self.name, "Capture worker panicked");
            }
        }
        tracing::info!(sensor = %self.name, "Sensor stopped");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.streaming.is_some() {
            return Err(Error::native("close", self.name.clone(), "sensor still streaming"));
        }
        if state.opened.is_empty() {
            return Err(Error::native("close", self.name.clone(), "sensor not open"));
        }
        state.opened.clear();
        tracing::debug!(sensor = %self.name, "Sensor closed");
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        lock(&self.state).streaming.is_some()
    }

    fn depth_scale(&self) -> Option<f32> {
        self.depth_scale
    }

    fn timestamp_domain(&self) -> TimestampDomain {
        self.domain
    }
}

/// A device whose sensors synthesize frames.
pub struct SyntheticDevice {
    info: DeviceInfo,
    description: DeviceDescription,
    pacing: Pacing,
    sensors: Vec<Arc<SyntheticSensor>>,
    connected: Arc<AtomicBool>,
    buffers: Arc<BufferPool>,
}

impl SyntheticDevice {
    pub fn new(description: DeviceDescription, pacing: Pacing) -> Result<Self> {
        description.validate()?;
        let connected = Arc::new(AtomicBool::new(true));
        let buffers = Arc::new(BufferPool::default());
        let sensors = description
            .sensors
            .iter()
            .zip(description.sensor_profiles())
            .map(|(sensor, profiles)| {
                Arc::new(SyntheticSensor::new(
                    sensor,
                    profiles,
                    pacing,
                    Arc::clone(&connected),
                    Arc::clone(&buffers),
                ))
            })
            .collect();

        tracing::debug!(serial = %description.info.serial, ?pacing, "Synthetic device created");
        Ok(Self {
            info: description.info.clone(),
            description,
            pacing,
            sensors,
            connected,
            buffers,
        })
    }

    /// Builds a device from a TOML description file.
    pub fn from_file(path: impl AsRef<Path>, pacing: Pacing) -> Result<Self> {
        Self::new(DeviceDescription::from_file(path)?, pacing)
    }

    pub fn description(&self) -> &DeviceDescription {
        &self.description
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Byte buffers shared by all sensors of this device.
    pub fn buffers(&self) -> &Arc<BufferPool> {
        &self.buffers
    }

    pub fn synthetic_sensors(&self) -> &[Arc<SyntheticSensor>] {
        &self.sensors
    }

    /// Emits one frame per opened profile of every streaming sensor.
    pub fn trigger(&self) -> usize {
        self.sensors.iter().map(|sensor| sensor.trigger()).sum()
    }

    /// Simulates unplugging: streaming stops and sensors refuse to reopen.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        for sensor in &self.sensors {
            if sensor.is_streaming() {
                if let Err(e) = sensor.stop() {
                    tracing::warn!(sensor = %sensor.name(), error = %e, "Stop on disconnect failed");
                }
            }
        }
        tracing::warn!(serial = %self.info.serial, "Device disconnected");
    }
}

impl Device for SyntheticDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn sensors(&self) -> Vec<Arc<dyn Sensor>> {
        self.sensors
            .iter()
            .map(|sensor| Arc::clone(sensor) as Arc<dyn Sensor>)
            .collect()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
