//! User-facing stream configuration.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::{resolver, PipelineProfile, StreamRequest};
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::stream::{Format, StreamKind};

/// A set of stream requests plus device and recording selection.
///
/// Requests are keyed by (stream, index); enabling the same key again
/// replaces the earlier request. Nothing is checked against a device until
/// [`resolve`](Self::resolve).
#[derive(Debug, Clone, Default)]
pub struct Config {
    requests: BTreeMap<(StreamKind, Option<u32>), StreamRequest>,
    all_streams: bool,
    disabled: BTreeSet<StreamKind>,
    device_serial: Option<String>,
    device_file: Option<PathBuf>,
    record_path: Option<PathBuf>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stream. Zero, `None` and `Format::Any` leave a field open.
    pub fn enable_stream(
        &mut self,
        stream: StreamKind,
        index: Option<u32>,
        width: u32,
        height: u32,
        format: Format,
        framerate: u32,
    ) -> &mut Self {
        self.enable_stream_request(StreamRequest {
            stream,
            index,
            width,
            height,
            format,
            framerate,
        })
    }

    pub fn enable_stream_request(&mut self, request: StreamRequest) -> &mut Self {
        self.disabled.remove(&request.stream);
        self.requests.insert((request.stream, request.index), request);
        self
    }

    /// Streams every stream the device offers at its best-quality profile.
    /// Explicit requests still take precedence for their stream.
    pub fn enable_all_streams(&mut self) -> &mut Self {
        self.all_streams = true;
        self.disabled.clear();
        self
    }

    /// Drops every request for `stream`, whatever its index, and excludes
    /// it from [`enable_all_streams`](Self::enable_all_streams).
    pub fn disable_stream(&mut self, stream: StreamKind) -> &mut Self {
        self.requests.retain(|(kind, _), _| *kind != stream);
        self.disabled.insert(stream);
        self
    }

    pub fn disable_all_streams(&mut self) -> &mut Self {
        self.requests.clear();
        self.all_streams = false;
        self.disabled.clear();
        self
    }

    /// Restricts resolution to the device with `serial`.
    pub fn enable_device(&mut self, serial: impl Into<String>) -> &mut Self {
        self.device_serial = Some(serial.into());
        self
    }

    /// Streams from the device described by `path` instead of a connected
    /// one.
    pub fn enable_device_from_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.device_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Records the session to `path`.
    pub fn enable_record_to_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        self.record_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Whether [`resolve`](Self::resolve) would succeed right now.
    pub fn can_resolve(&self, pipeline: &Pipeline) -> bool {
        self.resolve(pipeline).is_ok()
    }

    /// Binds the requests to a device of the pipeline's context.
    pub fn resolve(&self, pipeline: &Pipeline) -> Result<PipelineProfile> {
        resolver::resolve(self, pipeline.context())
    }

    pub fn requests(&self) -> impl Iterator<Item = &StreamRequest> {
        self.requests.values()
    }

    pub fn all_streams(&self) -> bool {
        self.all_streams
    }

    pub(crate) fn is_disabled(&self, stream: StreamKind) -> bool {
        self.disabled.contains(&stream)
    }

    pub fn device_serial(&self) -> Option<&str> {
        self.device_serial.as_deref()
    }

    pub fn device_file(&self) -> Option<&Path> {
        self.device_file.as_deref()
    }

    pub fn record_path(&self) -> Option<&Path> {
        self.record_path.as_deref()
    }
}
