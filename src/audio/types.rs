//! Audio types and error definitions.

/// A completed capture: mono PCM 16-bit samples at a known rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AudioClip {
    /// PCM 16-bit signed samples (mono)
    pub(crate) samples: Vec<i16>,
    /// Sample rate in Hz (typically 16000)
    pub(crate) sample_rate: u32,
}

impl AudioClip {
    /// Encode the clip as a single-channel PCM WAV blob for upload.
    pub(crate) fn to_wav(&self) -> Vec<u8> {
        let data_len = (self.samples.len() * 2) as u32;
        let byte_rate = self.sample_rate * 2;

        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");

        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes()); // block align
        out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for sample in &self.samples {
            out.extend_from_slice(&sample.to_le_bytes());
        }
        out
    }
}

/// Errors that can occur during audio capture.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CaptureError {
    #[error("No audio input device found")]
    DeviceUnavailable,

    #[error("No supported audio configuration found")]
    NoSupportedConfig,

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio stream error: {0}")]
    Stream(#[from] cpal::BuildStreamError),

    #[error("Audio play error: {0}")]
    Play(#[from] cpal::PlayStreamError),

    #[error("Default config error: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("Resampling error: {0}")]
    Resample(String),

    #[error("Capture thread terminated unexpectedly")]
    ThreadPanicked,
}
