//! The streaming pipeline.
//!
//! A [`Pipeline`] resolves a [`Config`], opens and starts the selected
//! sensors and turns what they deliver into [`FrameSet`]s. Frames are kept
//! on the sensor threads, grouped by the [`Syncer`] and either queued for
//! [`Pipeline::wait_for_frames`] / [`Pipeline::poll_for_frames`] or handed
//! to a user callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{FrameQueue, Recorder, Syncer};
use crate::config::{Config, PipelineProfile};
use crate::device::{Context, FrameCallback, Sensor};
use crate::error::{Error, Result};
use crate::frame::{Frame, FrameSet, FrameSetPool, RawFrame};
use crate::settings::PipelineSettings;
use crate::stream::StreamKind;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counters describing pipeline activity since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames kept from sensor callbacks.
    pub frames_received: u64,
    /// Frame sets handed to the application.
    pub sets_delivered: u64,
    /// Composites evicted from a full queue.
    pub frames_dropped: u64,
    /// Frames released by the syncer without a partner.
    pub stale_frames: u64,
    /// Waits that ended without a frame set.
    pub wait_timeouts: u64,
    /// Composites waiting in the queue.
    pub queue_depth: usize,
    pub started: bool,
}

#[derive(Default)]
struct Counters {
    frames_received: AtomicU64,
    sets_delivered: AtomicU64,
    frames_dropped: AtomicU64,
    stale_frames: AtomicU64,
    wait_timeouts: AtomicU64,
}

type SetCallback = Box<dyn FnMut(FrameSet) + Send>;

enum Delivery {
    Queue(Arc<FrameQueue>),
    Callback(Mutex<SetCallback>),
}

/// Receives frames on sensor threads.
struct FrameSink {
    syncer: Mutex<Syncer>,
    delivery: Delivery,
    recorder: Option<Recorder>,
    pool: Arc<FrameSetPool>,
    counters: Arc<Counters>,
}

impl FrameSink {
    fn on_frame(&self, raw: &RawFrame) {
        let frame = match Frame::acquire(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Sensor delivered an unusable frame");
                return;
            }
        };
        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);

        let composites = {
            let mut syncer = lock(&self.syncer);
            let before = syncer.stale();
            let composites = syncer.push(frame);
            let stale = syncer.stale() - before;
            if stale > 0 {
                self.counters.stale_frames.fetch_add(stale, Ordering::Relaxed);
            }
            composites
        };

        for composite in composites {
            if let Some(recorder) = &self.recorder {
                recorder.record(&composite);
            }
            self.deliver(composite);
        }
    }

    fn deliver(&self, composite: Frame) {
        match &self.delivery {
            Delivery::Queue(queue) => {
                if queue.enqueue(composite) {
                    self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            Delivery::Callback(callback) => match self.pool.get(composite) {
                Ok(set) => {
                    self.counters.sets_delivered.fetch_add(1, Ordering::Relaxed);
                    let mut callback = lock(callback);
                    (*callback)(set);
                }
                Err(e) => tracing::warn!(error = %e, "Failed to wrap composite"),
            },
        }
    }

    fn shutdown(&self) {
        lock(&self.syncer).clear();
        if let Delivery::Queue(queue) = &self.delivery {
            queue.close();
        }
    }
}

struct Session {
    profile: PipelineProfile,
    sensors: Vec<Arc<dyn Sensor>>,
    sink: Arc<FrameSink>,
}

/// Owns a capture session and vends frame sets.
///
/// `start*` fails with [`Error::AlreadyStarted`] while a session is active;
/// [`stop`](Self::stop) is always safe to call.
pub struct Pipeline {
    context: Arc<Context>,
    pool: Arc<FrameSetPool>,
    settings: PipelineSettings,
    counters: Arc<Counters>,
    session: Mutex<Option<Session>>,
}

impl Pipeline {
    pub fn new(context: Arc<Context>) -> Self {
        Self::build(context, PipelineSettings::default())
    }

    /// Creates a pipeline tuned by `settings`, rejecting settings that
    /// fail [`PipelineSettings::validate`].
    pub fn with_settings(context: Arc<Context>, settings: &PipelineSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self::build(context, settings.clone()))
    }

    fn build(context: Arc<Context>, settings: PipelineSettings) -> Self {
        Self {
            context,
            pool: FrameSetPool::new(settings.pool_capacity),
            settings,
            counters: Arc::new(Counters::default()),
            session: Mutex::new(None),
        }
    }

    /// Streams every stream of the first usable device at its best profile.
    pub fn start(&self) -> Result<PipelineProfile> {
        let mut config = Config::new();
        config.enable_all_streams();
        self.start_with(&config)
    }

    /// Starts streaming `config`, delivering through
    /// [`wait_for_frames`](Self::wait_for_frames) and
    /// [`poll_for_frames`](Self::poll_for_frames).
    pub fn start_with(&self, config: &Config) -> Result<PipelineProfile> {
        let queue = Arc::new(FrameQueue::new(self.settings.queue_capacity));
        self.start_session(config, Delivery::Queue(queue))
    }

    /// Starts streaming `config`, handing every frame set to `callback` on
    /// a sensor thread.
    ///
    /// The callback must not stop the pipeline.
    pub fn start_with_callback<F>(&self, config: &Config, callback: F) -> Result<PipelineProfile>
    where
        F: FnMut(FrameSet) + Send + 'static,
    {
        self.start_session(config, Delivery::Callback(Mutex::new(Box::new(callback))))
    }

    fn start_session(&self, config: &Config, delivery: Delivery) -> Result<PipelineProfile> {
        let mut session = lock(&self.session);
        if session.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let profile = config.resolve(self)?;
        let recorder = profile
            .record_path()
            .map(|path| Recorder::create(path, &profile))
            .transpose()?;

        let sink = Arc::new(FrameSink {
            syncer: Mutex::new(Syncer::new(&profile.streams(), &self.settings.sync_streams)),
            delivery,
            recorder,
            pool: Arc::clone(&self.pool),
            counters: Arc::clone(&self.counters),
        });
        let callback: FrameCallback = {
            let sink = Arc::clone(&sink);
            Arc::new(move |raw: &RawFrame| sink.on_frame(raw))
        };

        let sensors = open_and_start(&profile, callback)?;
        tracing::info!(
            serial = %profile.device().info().serial,
            sensors = sensors.len(),
            streams = profile.streams().len(),
            "Pipeline started"
        );

        *session = Some(Session {
            profile: profile.clone(),
            sensors,
            sink,
        });
        Ok(profile)
    }

    /// Stops streaming and releases pending frames.
    ///
    /// Sensor failures are logged, never returned. Does nothing when
    /// already stopped.
    pub fn stop(&self) {
        // Release the session lock before joining capture threads; their
        // callbacks may query the pipeline.
        let Some(active) = lock(&self.session).take() else {
            return;
        };
        shut_down(&active.sensors);
        active.sink.shutdown();
        tracing::info!(serial = %active.profile.device().info().serial, "Pipeline stopped");
    }

    /// Active queue of the session, checked before anything blocks.
    fn queue(&self) -> Result<Arc<FrameQueue>> {
        let session = lock(&self.session);
        let active = session.as_ref().ok_or(Error::NotStarted)?;
        match &active.sink.delivery {
            Delivery::Queue(queue) => Ok(Arc::clone(queue)),
            Delivery::Callback(_) => Err(Error::CallbackActive),
        }
    }

    fn wrap(&self, composite: Frame) -> Result<FrameSet> {
        let set = self.pool.get(composite)?;
        self.counters.sets_delivered.fetch_add(1, Ordering::Relaxed);
        Ok(set)
    }

    /// Blocks until a frame set arrives or `timeout` elapses.
    ///
    /// A timeout is [`Error::Timeout`], which callers are expected to
    /// retry on.
    pub fn wait_for_frames(&self, timeout: Duration) -> Result<FrameSet> {
        self.try_wait_for_frames(timeout)?.ok_or(Error::Timeout(timeout))
    }

    /// Like [`wait_for_frames`](Self::wait_for_frames) but reports a timeout
    /// as `Ok(None)`.
    pub fn try_wait_for_frames(&self, timeout: Duration) -> Result<Option<FrameSet>> {
        let queue = self.queue()?;
        match queue.dequeue(timeout) {
            Some(composite) => self.wrap(composite).map(Some),
            None if queue.is_closed() => Err(Error::NotStarted),
            None => {
                self.counters.wait_timeouts.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(?timeout, "Wait for frames timed out");
                Ok(None)
            }
        }
    }

    /// Returns a queued frame set without blocking, `None` if nothing is
    /// queued.
    pub fn poll_for_frames(&self) -> Result<Option<FrameSet>> {
        let queue = self.queue()?;
        queue.try_dequeue().map(|composite| self.wrap(composite)).transpose()
    }

    /// The timeout configured for this pipeline.
    pub fn default_timeout(&self) -> Duration {
        self.settings.wait_timeout()
    }

    pub fn active_profile(&self) -> Result<PipelineProfile> {
        lock(&self.session)
            .as_ref()
            .map(|active| active.profile.clone())
            .ok_or(Error::NotStarted)
    }

    pub fn is_started(&self) -> bool {
        lock(&self.session).is_some()
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn pool(&self) -> &Arc<FrameSetPool> {
        &self.pool
    }

    /// Stream kinds grouped into composites.
    pub fn sync_streams(&self) -> &[StreamKind] {
        &self.settings.sync_streams
    }

    /// Composites recorded by the active session, if it records.
    pub fn recorded_sets(&self) -> Option<u64> {
        lock(&self.session)
            .as_ref()
            .and_then(|active| active.sink.recorder.as_ref().map(Recorder::recorded))
    }

    pub fn stats(&self) -> PipelineStats {
        let (started, queue_depth) = match lock(&self.session).as_ref() {
            Some(active) => match &active.sink.delivery {
                Delivery::Queue(queue) => (true, queue.len()),
                Delivery::Callback(_) => (true, 0),
            },
            None => (false, 0),
        };
        PipelineStats {
            frames_received: self.counters.frames_received.load(Ordering::Relaxed),
            sets_delivered: self.counters.sets_delivered.load(Ordering::Relaxed),
            frames_dropped: self.counters.frames_dropped.load(Ordering::Relaxed),
            stale_frames: self.counters.stale_frames.load(Ordering::Relaxed),
            wait_timeouts: self.counters.wait_timeouts.load(Ordering::Relaxed),
            queue_depth,
            started,
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Opens then starts every sensor of `profile`, undoing partial progress
/// on failure.
fn open_and_start(profile: &PipelineProfile, callback: FrameCallback) -> Result<Vec<Arc<dyn Sensor>>> {
    let mut opened: Vec<Arc<dyn Sensor>> = Vec::new();
    for group in profile.sensor_streams() {
        if let Err(e) = group.sensor.open(&group.profiles) {
            tracing::error!(sensor = %group.sensor.name(), error = %e, "Failed to open sensor");
            close_all(&opened);
            return Err(e);
        }
        opened.push(Arc::clone(&group.sensor));
    }

    let mut started: Vec<Arc<dyn Sensor>> = Vec::new();
    for sensor in &opened {
        if let Err(e) = sensor.start(Arc::clone(&callback)) {
            tracing::error!(sensor = %sensor.name(), error = %e, "Failed to start sensor");
            stop_all(&started);
            close_all(&opened);
            return Err(e);
        }
        started.push(Arc::clone(sensor));
    }
    Ok(started)
}

fn shut_down(sensors: &[Arc<dyn Sensor>]) {
    stop_all(sensors);
    close_all(sensors);
}

fn stop_all(sensors: &[Arc<dyn Sensor>]) {
    for sensor in sensors {
        if let Err(e) = sensor.stop() {
            tracing::warn!(sensor = %sensor.name(), error = %e, "Failed to stop sensor");
        }
    }
}

fn close_all(sensors: &[Arc<dyn Sensor>]) {
    for sensor in sensors {
        if let Err(e) = sensor.close() {
            tracing::warn!(sensor = %sensor.name(), error = %e, "Failed to close sensor");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Device, DeviceDescription, Pacing, ProfileDescription, SensorDescription, SyntheticDevice};
    use crate::settings::SettingsError;
    use crate::stream::{Format, TimestampDomain};
    use std::thread;
    use std::time::Instant;

    fn manual_pipeline() -> (Pipeline, Arc<SyntheticDevice>) {
        let device = Arc::new(SyntheticDevice::new(DeviceDescription::synthetic_d400(), Pacing::Manual).unwrap());
        let context = Arc::new(Context::with_file_pacing(Pacing::Manual));
        context.add_device(device.clone());
        (Pipeline::new(context), device)
    }

    fn single_profile_device(profile: ProfileDescription) -> DeviceDescription {
        let mut description = DeviceDescription::synthetic_d400();
        description.info.serial = "single".into();
        description.sensors = vec![SensorDescription {
            name: "Module".into(),
            depth_scale: Some(0.001),
            timestamp_domain: TimestampDomain::HardwareClock,
            seed: Some(5),
            profiles: vec![profile],
        }];
        description
    }

    fn pipeline_for(description: DeviceDescription) -> Pipeline {
        let context = Arc::new(Context::new());
        context.add_device(Arc::new(SyntheticDevice::new(description, Pacing::Manual).unwrap()));
        Pipeline::new(context)
    }

    fn depth_and_color() -> Config {
        let mut config = Config::new();
        config
            .enable_stream(StreamKind::Depth, None, 640, 480, Format::Z16, 30)
            .enable_stream(StreamKind::Color, None, 640, 480, Format::Rgb8, 30);
        config
    }

    #[test]
    fn test_scenario_exact_profile_resolves() {
        let pipeline = pipeline_for(single_profile_device(ProfileDescription {
            stream: StreamKind::Depth,
            index: 0,
            format: Format::Z16,
            framerate: 30,
            width: 640,
            height: 480,
        }));
        let mut config = Config::new();
        config.enable_stream(StreamKind::Depth, None, 640, 480, Format::Z16, 30);

        let profile = config.resolve(&pipeline).unwrap();
        let depth = profile.stream(StreamKind::Depth, None).unwrap();
        assert_eq!((depth.width(), depth.height()), (640, 480));
        assert_eq!(depth.format(), Format::Z16);
        assert_eq!(depth.framerate(), 30);
        assert!(!pipeline.is_started());
    }

    #[test]
    fn test_scenario_framerate_mismatch_unresolvable() {
        let pipeline = pipeline_for(single_profile_device(ProfileDescription {
            stream: StreamKind::Color,
            index: 0,
            format: Format::Rgb8,
            framerate: 30,
            width: 1920,
            height: 1080,
        }));
        let mut config = Config::new();
        config.enable_stream(StreamKind::Color, None, 1920, 1080, Format::Rgb8, 60);

        assert!(!config.can_resolve(&pipeline));
        assert!(matches!(config.resolve(&pipeline), Err(Error::UnresolvableConfig(_))));
    }

    #[test]
    fn test_scenario_wait_on_stopped_pipeline() {
        let (pipeline, device) = manual_pipeline();
        assert!(matches!(
            pipeline.wait_for_frames(Duration::from_millis(100)),
            Err(Error::NotStarted)
        ));
        assert!(matches!(pipeline.poll_for_frames(), Err(Error::NotStarted)));
        assert!(device.synthetic_sensors().iter().all(|s| s.opened().is_empty()));
    }

    #[test]
    fn test_poll_returns_queued_set_without_blocking() {
        let (pipeline, device) = manual_pipeline();
        pipeline.start_with(&depth_and_color()).unwrap();
        assert!(pipeline.poll_for_frames().unwrap().is_none());

        assert_eq!(device.trigger(), 2);
        let started = Instant::now();
        let set = pipeline.poll_for_frames().unwrap().unwrap();
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(set.count().unwrap(), 2);
        assert!(set.depth_frame().unwrap().is_some());
        assert!(set.color_frame().unwrap().is_some());
    }

    #[test]
    fn test_wait_times_out_within_bound() {
        let (pipeline, _device) = manual_pipeline();
        pipeline.start_with(&depth_and_color()).unwrap();

        let started = Instant::now();
        let result = pipeline.wait_for_frames(Duration::from_millis(100));
        let elapsed = started.elapsed();
        assert!(matches!(result, Err(Error::Timeout(_))));
        assert!(result.unwrap_err().is_recoverable());
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(1000));

        assert!(pipeline.try_wait_for_frames(Duration::from_millis(10)).unwrap().is_none());
        assert_eq!(pipeline.stats().wait_timeouts, 2);
    }

    #[test]
    fn test_wait_receives_frames_from_capture_thread() {
        let (pipeline, device) = manual_pipeline();
        pipeline.start_with(&depth_and_color()).unwrap();

        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            device.trigger();
        });
        let set = pipeline.wait_for_frames(Duration::from_secs(5)).unwrap();
        producer.join().unwrap();
        assert_eq!(set.count().unwrap(), 2);
        assert_eq!(set.frame_number().unwrap(), 1);
    }

    #[test]
    fn test_double_start_fails_and_stop_is_idempotent() {
        let (pipeline, _device) = manual_pipeline();
        pipeline.start_with(&depth_and_color()).unwrap();
        assert!(matches!(pipeline.start_with(&depth_and_color()), Err(Error::AlreadyStarted)));
        assert!(pipeline.is_started());

        pipeline.stop();
        pipeline.stop();
        assert!(!pipeline.is_started());
        assert!(matches!(pipeline.active_profile(), Err(Error::NotStarted)));

        pipeline.start_with(&depth_and_color()).unwrap();
        assert!(pipeline.is_started());
    }

    #[test]
    fn test_restart_with_different_streams_delivers() {
        let (pipeline, device) = manual_pipeline();
        pipeline.start_with(&depth_and_color()).unwrap();
        for _ in 0..10 {
            device.trigger();
        }
        pipeline.stop();
        let stale_before = pipeline.stats().stale_frames;

        let mut config = Config::new();
        config
            .enable_stream(StreamKind::Depth, None, 1280, 720, Format::Z16, 30)
            .enable_stream(StreamKind::Color, None, 640, 480, Format::Rgb8, 30);
        pipeline.start_with(&config).unwrap();
        for _ in 0..5 {
            device.trigger();
        }

        let stats = pipeline.stats();
        assert_eq!(stats.stale_frames, stale_before);
        assert_eq!(stats.queue_depth, 5);
        let set = pipeline.poll_for_frames().unwrap().unwrap();
        assert_eq!(set.count().unwrap(), 2);
        assert_eq!(set.frame_number().unwrap(), 1);
        assert_eq!(set.depth_frame().unwrap().unwrap().width().unwrap(), 1280);
    }

    #[test]
    fn test_stop_not_blocked_by_callback_querying_pipeline() {
        let context = Arc::new(Context::new());
        let device = SyntheticDevice::new(DeviceDescription::synthetic_d400(), Pacing::Realtime).unwrap();
        context.add_device(Arc::new(device));
        let pipeline = Arc::new(Pipeline::new(context));

        let mut config = Config::new();
        config.enable_stream(StreamKind::Gyro, None, 0, 0, Format::Any, 400);
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let observer = Arc::downgrade(&pipeline);
        pipeline
            .start_with_callback(&config, move |_set: FrameSet| {
                entered_tx.send(()).ok();
                thread::sleep(Duration::from_millis(20));
                if let Some(pipeline) = observer.upgrade() {
                    pipeline.is_started();
                }
            })
            .unwrap();
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let stopper = {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || {
                pipeline.stop();
                done_tx.send(()).ok();
            })
        };
        assert!(done_rx.recv_timeout(Duration::from_secs(3)).is_ok());
        stopper.join().unwrap();
        assert!(!pipeline.is_started());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = PipelineSettings {
            pool_capacity: 0,
            ..Default::default()
        };
        let result = Pipeline::with_settings(Arc::new(Context::new()), &settings);
        assert!(matches!(
            result,
            Err(Error::InvalidSettings(SettingsError::InvalidPoolCapacity))
        ));
    }

    #[test]
    fn test_stop_releases_queued_frames_and_closes_sensors() {
        let (pipeline, device) = manual_pipeline();
        pipeline.start_with(&depth_and_color()).unwrap();
        device.trigger();
        device.trigger();
        assert_eq!(pipeline.stats().queue_depth, 2);

        pipeline.stop();
        assert_eq!(device.buffers().reclaimed(), 4);
        assert!(device.synthetic_sensors().iter().all(|s| !s.is_streaming() && s.opened().is_empty()));
    }

    #[test]
    fn test_stop_wakes_waiting_consumer() {
        let (pipeline, _device) = manual_pipeline();
        let pipeline = Arc::new(pipeline);
        pipeline.start_with(&depth_and_color()).unwrap();

        let waiter = {
            let pipeline = Arc::clone(&pipeline);
            thread::spawn(move || pipeline.wait_for_frames(Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(50));
        let started = Instant::now();
        pipeline.stop();
        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(Error::NotStarted)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_failed_start_rolls_back() {
        let (pipeline, device) = manual_pipeline();
        let rgb = &device.synthetic_sensors()[1];
        let taken = rgb.stream_profiles()[0];
        rgb.open(&[taken]).unwrap();

        assert!(matches!(
            pipeline.start_with(&depth_and_color()),
            Err(Error::NativeFailure { .. })
        ));
        assert!(!pipeline.is_started());
        assert!(device.synthetic_sensors()[0].opened().is_empty());
    }

    #[test]
    fn test_callback_mode_rejects_wait_and_poll() {
        let (pipeline, device) = manual_pipeline();
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&delivered);
        pipeline
            .start_with_callback(&depth_and_color(), move |set: FrameSet| {
                sink.lock().unwrap().push(set.count().unwrap());
            })
            .unwrap();

        assert!(matches!(
            pipeline.wait_for_frames(Duration::from_millis(10)),
            Err(Error::CallbackActive)
        ));
        assert!(matches!(pipeline.poll_for_frames(), Err(Error::CallbackActive)));

        device.trigger();
        device.trigger();
        assert_eq!(*delivered.lock().unwrap(), vec![2, 2]);
        assert_eq!(pipeline.stats().sets_delivered, 2);
    }

    #[test]
    fn test_motion_streams_arrive_alone() {
        let (pipeline, device) = manual_pipeline();
        let mut config = depth_and_color();
        config.enable_stream(StreamKind::Accel, None, 0, 0, Format::Any, 0);
        pipeline.start_with(&config).unwrap();

        device.trigger();
        let mut counts = Vec::new();
        while let Some(set) = pipeline.poll_for_frames().unwrap() {
            counts.push(set.count().unwrap());
        }
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2]);
        assert_eq!(pipeline.stats().frames_received, 3);
    }

    #[test]
    fn test_full_queue_counts_drops() {
        let context = Arc::new(Context::new());
        let device = Arc::new(SyntheticDevice::new(DeviceDescription::synthetic_d400(), Pacing::Manual).unwrap());
        context.add_device(device.clone());
        let settings = PipelineSettings {
            queue_capacity: 1,
            ..Default::default()
        };
        let pipeline = Pipeline::with_settings(context, &settings).unwrap();
        pipeline.start_with(&depth_and_color()).unwrap();

        device.trigger();
        device.trigger();
        device.trigger();
        let stats = pipeline.stats();
        assert_eq!(stats.frames_dropped, 2);
        assert_eq!(stats.queue_depth, 1);

        let set = pipeline.poll_for_frames().unwrap().unwrap();
        assert_eq!(set.frame_number().unwrap(), 3);
    }

    #[test]
    fn test_start_streams_everything() {
        let (pipeline, device) = manual_pipeline();
        let profile = pipeline.start().unwrap();
        assert_eq!(profile.streams().len(), 6);
        assert!(device.synthetic_sensors().iter().all(|s| s.is_streaming()));
        assert_eq!(pipeline.active_profile().unwrap().streams().len(), 6);
    }

    #[test]
    fn test_frame_sets_return_to_pipeline_pool() {
        let (pipeline, device) = manual_pipeline();
        pipeline.start_with(&depth_and_color()).unwrap();
        device.trigger();
        let set = pipeline.poll_for_frames().unwrap().unwrap();
        drop(set);
        assert_eq!(pipeline.pool().idle_count(), 1);

        device.trigger();
        let _again = pipeline.poll_for_frames().unwrap().unwrap();
        assert_eq!(pipeline.pool().stats().hits, 1);
    }

    #[test]
    fn test_record_then_replay() {
        let path = std::env::temp_dir().join(format!("depthstream-record-{}.toml", std::process::id()));
        let (pipeline, device) = manual_pipeline();
        let mut config = depth_and_color();
        config.enable_record_to_file(&path);
        pipeline.start_with(&config).unwrap();
        device.trigger();
        assert_eq!(pipeline.recorded_sets(), Some(1));
        pipeline.stop();

        let mut replay = Config::new();
        replay.enable_all_streams().enable_device_from_file(&path);
        let profile = pipeline.start_with(&replay).unwrap();
        std::fs::remove_file(&path).ok();

        let mut kinds: Vec<_> = profile.streams().iter().map(|p| p.kind()).collect();
        kinds.sort();
        assert_eq!(kinds, vec![StreamKind::Depth, StreamKind::Color]);
        assert_eq!(profile.device().info().serial, device.info().serial);
        assert!(profile.device().info().source_file.is_some());
    }
}
