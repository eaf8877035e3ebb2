//! Binding stream requests to device profiles.
//!
//! Each candidate device is tried in turn. For every sensor, in device
//! order, the resolver claims the still-unassigned requests that some
//! profile of that sensor can satisfy, fills in their wildcards from the
//! best-quality profile that does not clash with the other streams on the
//! same sensor, and selects the concrete profiles. Requests no sensor
//! could claim make the device unusable.

use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::{Config, PipelineProfile, SensorStreams, StreamRequest};
use crate::device::{Context, Device};
use crate::error::{Error, Result};
use crate::stream::{StreamKind, StreamProfile};

#[derive(Debug, Clone, Copy)]
struct Target {
    request: StreamRequest,
    /// Explicit requests must resolve; all-streams picks are best effort.
    required: bool,
    dropped: bool,
}

pub(crate) fn resolve(config: &Config, context: &Context) -> Result<PipelineProfile> {
    let mut last_error = None;
    for device in candidate_devices(config, context)? {
        match resolve_device(config, device.as_ref()) {
            Ok(sensor_streams) => {
                tracing::info!(
                    serial = %device.info().serial,
                    streams = sensor_streams.iter().map(|s| s.profiles.len()).sum::<usize>(),
                    "Config resolved"
                );
                let record_path = config.record_path().map(|path| path.to_path_buf());
                return Ok(PipelineProfile::new(device, sensor_streams, record_path));
            }
            Err(e) => {
                tracing::debug!(serial = %device.info().serial, error = %e, "Device cannot satisfy config");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| Error::UnresolvableConfig("Couldn't resolve requests".into())))
}

fn candidate_devices(config: &Config, context: &Context) -> Result<Vec<Arc<dyn Device>>> {
    if let Some(path) = config.device_file() {
        let device = context.load_device_file(path)?;
        if let Some(serial) = config.device_serial() {
            if device.info().serial != serial {
                return Err(Error::UnresolvableConfig(format!(
                    "device file {} holds serial {}, not the requested {}",
                    path.display(),
                    device.info().serial,
                    serial
                )));
            }
        }
        return Ok(vec![device as Arc<dyn Device>]);
    }

    if let Some(serial) = config.device_serial() {
        return context
            .query_by_serial(serial)
            .map(|device| vec![device])
            .ok_or_else(|| Error::UnresolvableConfig(format!("no connected device with serial {serial}")));
    }

    let devices = context.devices();
    if devices.is_empty() {
        return Err(Error::UnresolvableConfig("no device connected".into()));
    }
    Ok(devices)
}

fn targets_for(config: &Config, device: &dyn Device) -> Result<Vec<Target>> {
    let mut targets: Vec<Target> = config
        .requests()
        .map(|request| Target {
            request: *request,
            required: true,
            dropped: false,
        })
        .collect();

    if config.all_streams() {
        let profiles = device.stream_profiles();
        if profiles.is_empty() {
            return Err(Error::UnresolvableConfig(format!(
                "device {} exposes no streams",
                device.info().serial
            )));
        }
        let slots: BTreeSet<(StreamKind, u32)> = profiles.iter().map(|p| (p.kind(), p.index())).collect();
        for (kind, index) in slots {
            if config.is_disabled(kind) || targets.iter().any(|t| t.required && t.request.covers(kind, index)) {
                continue;
            }
            targets.push(Target {
                request: StreamRequest::new(kind).index(index),
                required: false,
                dropped: false,
            });
        }
    }

    if targets.is_empty() {
        return Err(Error::UnresolvableConfig("no streams requested".into()));
    }
    Ok(targets)
}

fn resolve_device(config: &Config, device: &dyn Device) -> Result<Vec<SensorStreams>> {
    let targets = targets_for(config, device)?;
    let mut assigned = vec![false; targets.len()];
    let mut resolved = Vec::new();

    for sensor in device.sensors() {
        let mut candidates = sensor.stream_profiles();
        sort_best_quality(&mut candidates);

        let claimed: Vec<usize> = (0..targets.len())
            .filter(|&i| !assigned[i] && candidates.iter().any(|p| targets[i].request.matches(p)))
            .collect();
        if claimed.is_empty() {
            continue;
        }

        let mut sensor_targets: Vec<Target> = claimed.iter().map(|&i| targets[i]).collect();
        for i in claimed {
            assigned[i] = true;
        }
        auto_complete(&mut sensor_targets, &candidates, sensor.name())?;

        let mut profiles: Vec<StreamProfile> = Vec::new();
        for target in sensor_targets.iter().filter(|t| !t.dropped) {
            if let Some(profile) = candidates.iter().find(|p| target.request.matches(p)) {
                if !profiles.contains(profile) {
                    profiles.push(*profile);
                }
            }
        }
        if !profiles.is_empty() {
            tracing::debug!(sensor = %sensor.name(), streams = profiles.len(), "Sensor streams selected");
            resolved.push(SensorStreams { sensor, profiles });
        }
    }

    if let Some(missing) = targets
        .iter()
        .zip(&assigned)
        .find(|(target, assigned)| target.required && !**assigned)
        .map(|(target, _)| target)
    {
        return Err(Error::UnresolvableConfig(format!(
            "Couldn't resolve requests: device {} offers no {}",
            device.info().serial,
            missing.request
        )));
    }
    if resolved.is_empty() {
        return Err(Error::UnresolvableConfig(format!(
            "Couldn't resolve requests: device {} matched no streams",
            device.info().serial
        )));
    }
    Ok(resolved)
}

/// Fills in wildcard fields, explicit requests first.
fn auto_complete(targets: &mut [Target], candidates: &[StreamProfile], sensor: &str) -> Result<()> {
    let order: Vec<usize> = (0..targets.len())
        .filter(|&i| targets[i].required)
        .chain((0..targets.len()).filter(|&i| !targets[i].required))
        .collect();

    for i in order {
        let request = targets[i].request;
        if !request.has_wildcards() {
            continue;
        }
        let completed = candidates
            .iter()
            .find(|candidate| request.matches(candidate) && !contradicts(candidate, targets, i));
        match completed {
            Some(profile) => targets[i].request = StreamRequest::from_profile(profile),
            None if targets[i].required => {
                return Err(Error::UnresolvableConfig(format!(
                    "Couldn't autocomplete request {request} for sensor {sensor}"
                )));
            }
            None => {
                tracing::debug!(sensor, request = %request, "Skipping stream that conflicts with the selection");
                targets[i].dropped = true;
            }
        }
    }
    Ok(())
}

/// Image streams on one sensor share a framerate and resolution; motion
/// streams are independent.
fn contradicts(candidate: &StreamProfile, targets: &[Target], current: usize) -> bool {
    if !candidate.is_video() {
        return false;
    }
    targets
        .iter()
        .enumerate()
        .filter(|&(i, target)| i != current && !target.dropped && !target.request.stream.is_motion())
        .any(|(_, target)| {
            let other = &target.request;
            (other.framerate != 0 && other.framerate != candidate.framerate())
                || (other.width != 0 && other.width != candidate.width())
                || (other.height != 0 && other.height != candidate.height())
        })
}

/// Orders profiles best first: 640x480, then 30 fps, then the kind's
/// preferred format, then higher framerate. Ties keep device order.
fn sort_best_quality(profiles: &mut [StreamProfile]) {
    profiles.sort_by_key(|p| {
        Reverse((
            p.width() == 640 && p.height() == 480,
            p.framerate() == 30,
            p.kind().preferred_format() == Some(p.format()),
            p.framerate(),
        ))
    });
}
