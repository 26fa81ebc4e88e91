//! Audio playback to an output device

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::{AudioClip, AudioSink};
use crate::{Error, Result};

/// Extra time allowed past the clip length before giving up on completion
const DRAIN_MARGIN: Duration = Duration::from_millis(500);

/// Plays WAV clips on a named (or the default) output device
///
/// cpal streams are not `Send`, so each clip is played on the blocking pool
/// and the device is reopened per clip.
#[derive(Debug, Clone)]
pub struct CpalSink {
    device_name: Option<String>,
}

impl CpalSink {
    /// Create a sink for the output device called `device_name`, or the host
    /// default when `None`
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be found
    pub fn new(device_name: Option<String>) -> Result<Self> {
        let device = open_device(device_name.as_deref())?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio output initialized"
        );

        Ok(Self { device_name })
    }
}

#[async_trait]
impl AudioSink for CpalSink {
    async fn play(&self, clip: AudioClip) -> Result<()> {
        let device_name = self.device_name.clone();
        tokio::task::spawn_blocking(move || play_blocking(device_name.as_deref(), &clip.data))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }
}

/// List the names of available output devices
///
/// # Errors
///
/// Returns error if devices cannot be enumerated
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| Error::Audio(format!("cannot enumerate devices: {e}")))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

fn open_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    match name {
        Some(name) => host
            .output_devices()
            .map_err(|e| Error::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| d.name().is_ok_and(|n| n == name))
            .ok_or_else(|| Error::Audio(format!("output device '{name}' not found"))),
        None => host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string())),
    }
}

/// Pick a stream config running at `sample_rate`, or fall back to the
/// device default
fn select_config(device: &Device, sample_rate: u32) -> Result<StreamConfig> {
    let supports = |channels: u16| {
        device.supported_output_configs().ok()?.find(|c| {
            c.channels() == channels
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
    };

    if let Some(config) = supports(1).or_else(|| supports(2)) {
        return Ok(config.with_sample_rate(SampleRate(sample_rate)).config());
    }

    device
        .default_output_config()
        .map(|c| c.config())
        .map_err(|e| Error::Audio(format!("no suitable output config: {e}")))
}

fn play_blocking(device_name: Option<&str>, wav: &[u8]) -> Result<()> {
    let (samples, clip_rate) = decode_wav(wav)?;
    if samples.is_empty() {
        return Ok(());
    }

    let device = open_device(device_name)?;
    let config = select_config(&device, clip_rate)?;
    let device_rate = config.sample_rate.0;

    let samples = if device_rate == clip_rate {
        samples
    } else {
        tracing::debug!(from = clip_rate, to = device_rate, "resampling clip");
        resample(&samples, clip_rate, device_rate)?
    };

    let channels = usize::from(config.channels);
    let total = samples.len();
    let samples = Arc::new(samples);
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));
    let failed = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);
        let failed = Arc::clone(&failed);

        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(pos).copied().unwrap_or_else(|| {
                            finished.store(true, Ordering::Release);
                            0.0
                        });
                        frame.fill(sample);
                        if pos < samples.len() {
                            pos += 1;
                        }
                    }
                    position.store(pos, Ordering::Relaxed);
                },
                move |err| {
                    tracing::error!(error = %err, "audio playback error");
                    failed.store(true, Ordering::Release);
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let duration_ms = (total as u64 * 1000) / u64::from(device_rate);
    let timeout = Duration::from_millis(duration_ms) + DRAIN_MARGIN;
    let outcome = wait_for_end(&finished, &failed, timeout);

    // Let the device flush its last buffer
    std::thread::sleep(Duration::from_millis(100));
    drop(stream);
    outcome?;

    tracing::debug!(samples = total, "playback complete");
    Ok(())
}

/// Block until the stream reports the end of the clip, an error, or `timeout`
fn wait_for_end(finished: &AtomicBool, failed: &AtomicBool, timeout: Duration) -> Result<()> {
    let start = Instant::now();

    loop {
        if failed.load(Ordering::Acquire) {
            return Err(Error::Audio("output stream reported an error".to_string()));
        }
        if finished.load(Ordering::Acquire) {
            return Ok(());
        }
        if start.elapsed() > timeout {
            return Err(Error::Audio(format!(
                "playback did not finish within {}ms",
                timeout.as_millis()
            )));
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// Decode WAV bytes to mono f32 samples and their sample rate
#[allow(clippy::cast_precision_loss)]
fn decode_wav(wav: &[u8]) -> Result<(Vec<f32>, u32)> {
    let reader = hound::WavReader::new(Cursor::new(wav))
        .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?
        }
    };

    // Downmix to mono by averaging channels
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

/// Resample audio using rubato
#[allow(clippy::cast_possible_truncation)]
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    let chunk_size = 1024;
    let sub_chunks = 2;

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, sub_chunks, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    let mut output = Vec::new();

    for chunk in input.chunks(chunk_size) {
        // Pad the tail so the last partial chunk is not lost
        let mut block = chunk.to_vec();
        block.resize(chunk_size, 0.0);

        let result = resampler
            .process(&[block], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    Ok(output.iter().map(|&s| s as f32).collect())
}
