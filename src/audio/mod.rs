//! Audio capture using cpal for cross-platform microphone access.
//!
//! The capture pipeline depends on the [`AudioCapturer`] capability so
//! the fixed-duration recording policy is testable without a device.
//! [`MicCapturer`] records from the default input device for the
//! requested duration, downmixes to mono, and resamples to 16kHz for
//! the transcription endpoint.

mod types;

pub(crate) use types::{AudioClip, CaptureError};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

/// Target sample rate for the transcription endpoint (16kHz).
pub(crate) const TARGET_SAMPLE_RATE: u32 = 16000;

/// Records one bounded audio clip.
#[async_trait]
pub(crate) trait AudioCapturer: Send + Sync {
    /// Record from the input device for exactly `duration`, returning
    /// the completed clip once the time has elapsed.
    async fn record(&self, duration: Duration) -> Result<AudioClip, CaptureError>;
}

/// Production capturer backed by the default cpal input device.
pub(crate) struct MicCapturer;

#[async_trait]
impl AudioCapturer for MicCapturer {
    async fn record(&self, duration: Duration) -> Result<AudioClip, CaptureError> {
        let stop = Arc::new(AtomicBool::new(false));
        let buffer: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));
        let (ready_tx, ready_rx) = mpsc::channel();

        let stop_thread = stop.clone();
        let buffer_thread = buffer.clone();
        let handle = thread::spawn(move || {
            run_capture(stop_thread, buffer_thread, ready_tx);
        });

        // Device acquisition happens on the capture thread; wait for it
        // to report before starting the clock.
        let device_rate = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(|_| CaptureError::ThreadPanicked)?
            .map_err(|_| CaptureError::ThreadPanicked)??;

        info!(
            duration_ms = duration.as_millis() as u64,
            device_rate, "Recording audio clip"
        );
        tokio::time::sleep(duration).await;
        stop.store(true, Ordering::SeqCst);

        tokio::task::spawn_blocking(move || handle.join())
            .await
            .map_err(|_| CaptureError::ThreadPanicked)?
            .map_err(|_| CaptureError::ThreadPanicked)?;

        let samples = buffer.lock().map_err(|_| CaptureError::ThreadPanicked)?.clone();
        info!(samples = samples.len(), "Audio capture stopped");

        let samples = resample(samples, device_rate, TARGET_SAMPLE_RATE)?;
        Ok(AudioClip {
            samples,
            sample_rate: TARGET_SAMPLE_RATE,
        })
    }
}

/// Run the cpal input stream until `stop` is raised, accumulating mono
/// samples into `buffer`. Setup success or failure is reported once on
/// `ready` together with the device sample rate.
fn run_capture(
    stop: Arc<AtomicBool>,
    buffer: Arc<Mutex<Vec<i16>>>,
    ready: mpsc::Sender<Result<u32, CaptureError>>,
) {
    let result = (|| {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureError::DeviceUnavailable)?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio input device: {}", device_name);

        let supported = device.default_input_config()?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let sample_rate = config.sample_rate.0;
        let channels = config.channels as usize;
        if channels == 0 {
            return Err(CaptureError::NoSupportedConfig);
        }
        info!("Audio config: {} channels, {} Hz", channels, sample_rate);

        let err_callback = |err| {
            error!("Audio stream error: {}", err);
        };

        let stream = match sample_format {
            SampleFormat::I16 => {
                let stop = stop.clone();
                let buffer = buffer.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _| {
                        if stop.load(Ordering::SeqCst) {
                            return;
                        }
                        push_mono(&buffer, data, channels);
                    },
                    err_callback,
                    None,
                )?
            }
            SampleFormat::F32 => {
                let stop = stop.clone();
                let buffer = buffer.clone();
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _| {
                        if stop.load(Ordering::SeqCst) {
                            return;
                        }
                        let samples: Vec<i16> = data
                            .iter()
                            .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
                            .collect();
                        push_mono(&buffer, &samples, channels);
                    },
                    err_callback,
                    None,
                )?
            }
            other => {
                return Err(CaptureError::UnsupportedFormat(format!("{other:?}")));
            }
        };

        stream.play()?;
        Ok((stream, sample_rate))
    })();

    match result {
        Ok((stream, sample_rate)) => {
            let _ = ready.send(Ok(sample_rate));
            while !stop.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(50));
            }
            drop(stream);
        }
        Err(e) => {
            let _ = ready.send(Err(e));
        }
    }
}

/// Downmix interleaved frames to mono by averaging channels and append
/// them to the shared buffer.
fn push_mono(buffer: &Arc<Mutex<Vec<i16>>>, data: &[i16], channels: usize) {
    let Ok(mut buf) = buffer.lock() else {
        return;
    };
    if channels > 1 {
        buf.extend(data.chunks(channels).map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        }));
    } else {
        buf.extend_from_slice(data);
    }
}

/// Resampler chunk size in frames.
const RESAMPLE_CHUNK: usize = 1024;

/// Resample a completed mono clip from `from` Hz to `to` Hz.
///
/// The clip is processed in fixed chunks; the tail is zero-padded to
/// fill the final chunk, which is inaudible at the end of a recording.
fn resample(samples: Vec<i16>, from: u32, to: u32) -> Result<Vec<i16>, CaptureError> {
    if from == to || samples.is_empty() {
        return Ok(samples);
    }
    info!("Resampling clip: {} Hz -> {} Hz", from, to);

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(
        to as f64 / from as f64,
        2.0,
        params,
        RESAMPLE_CHUNK,
        1, // mono
    )
    .map_err(|e| CaptureError::Resample(e.to_string()))?;

    let mut input: Vec<f32> = samples.iter().map(|&s| s as f32 / 32768.0).collect();
    let padding = (RESAMPLE_CHUNK - input.len() % RESAMPLE_CHUNK) % RESAMPLE_CHUNK;
    input.extend(std::iter::repeat(0.0).take(padding));

    let mut output = Vec::with_capacity(input.len() * to as usize / from as usize + 1);
    for chunk in input.chunks(RESAMPLE_CHUNK) {
        let frames = resampler
            .process(&[chunk], None)
            .map_err(|e| CaptureError::Resample(e.to_string()))?;
        output.extend(
            frames[0]
                .iter()
                .map(|&s| (s.clamp(-1.0, 1.0) * 32767.0) as i16),
        );
    }

    if output.is_empty() {
        warn!("Resampler produced no output");
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![1i16, 2, 3, 4];
        let out = resample(samples.clone(), 16000, 16000).expect("resample failed");
        assert_eq!(out, samples);
    }

    #[test]
    fn test_resample_halves_sample_count() {
        // One second of a constant signal at 32kHz should come out near
        // one second at 16kHz (chunk padding adds a partial tail).
        let samples = vec![1000i16; 32000];
        let out = resample(samples, 32000, 16000).expect("resample failed");
        assert!(out.len() >= 16000);
        assert!(out.len() <= 16000 + RESAMPLE_CHUNK);
    }

    #[test]
    fn test_push_mono_averages_channels() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        push_mono(&buffer, &[100, 200, -50, 50], 2);
        assert_eq!(*buffer.lock().unwrap(), vec![150, 0]);
    }

    #[test]
    fn test_push_mono_single_channel_passthrough() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        push_mono(&buffer, &[1, 2, 3], 1);
        assert_eq!(*buffer.lock().unwrap(), vec![1, 2, 3]);
    }
}
