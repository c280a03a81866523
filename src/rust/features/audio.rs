//! Audio decoding and clip-level MFCC features.
//!
//! Produces the mean MFCC vector over a whole clip with librosa-compatible
//! defaults: centred frames, periodic Hann window, Slaney mel filterbank,
//! power-to-dB with an 80 dB floor and an orthonormal DCT-II.

use std::f32::consts::PI;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};
use ndarray::{Array1, Array2, Axis};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::FeatureTensor;
use crate::classifier::ClassifierError;
use crate::config::AudioConfig;

const AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

/// Mono waveform at its native sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decodes an in-memory audio clip and averages its channels to mono.
///
/// # Errors
/// - `Decode` if the container or codec is unsupported, or no samples decode
pub fn decode_audio(bytes: &[u8], extension: Option<&str>) -> Result<Waveform, ClassifierError> {
    decode_source(Box::new(Cursor::new(bytes.to_vec())), extension)
}

/// Decodes an audio file, reading packets from disk as they are needed.
pub fn decode_audio_file(path: &Path, extension: Option<&str>) -> Result<Waveform, ClassifierError> {
    decode_source(Box::new(File::open(path)?), extension)
}

fn decode_source(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<Waveform, ClassifierError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| ClassifierError::Decode(format!("Unsupported audio format: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ClassifierError::Decode("No audio track found".to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| ClassifierError::Decode("Unknown sample rate".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| ClassifierError::Decode(format!("Unsupported audio codec: {}", e)))?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                warn!("Error reading audio packet: {}", e);
                break;
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Error decoding audio packet: {}", e);
                continue;
            }
        };

        let spec = *decoded.spec();
        let capacity = decoded.capacity() as u64;
        let channels = spec.channels.count().max(1);
        let buf = sample_buf.get_or_insert_with(|| SampleBuffer::new(capacity, spec));
        buf.copy_interleaved_ref(decoded);
        samples.extend(
            buf.samples()
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32),
        );
    }

    if samples.is_empty() {
        return Err(ClassifierError::Decode("Audio stream contains no samples".to_string()));
    }
    debug!("Decoded {} samples at {} Hz", samples.len(), sample_rate);

    Ok(Waveform {
        samples,
        sample_rate,
    })
}

fn hz_to_mel(hz: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;
    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f32) -> f32 {
    const F_SP: f32 = 200.0 / 3.0;
    const MIN_LOG_HZ: f32 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f32.ln() / 27.0;
    if mel >= min_log_mel {
        MIN_LOG_HZ * (logstep * (mel - min_log_mel)).exp()
    } else {
        F_SP * mel
    }
}

/// Slaney-normalised triangular filters, shape `[n_mels, n_fft / 2 + 1]`.
fn mel_filterbank(sample_rate: f32, n_fft: usize, n_mels: usize) -> Array2<f32> {
    let n_bins = n_fft / 2 + 1;
    let fft_freqs: Vec<f32> = (0..n_bins)
        .map(|i| i as f32 * sample_rate / n_fft as f32)
        .collect();

    let mel_max = hz_to_mel(sample_rate / 2.0);
    let hz_points: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
        .collect();

    let mut weights = Array2::zeros((n_mels, n_bins));
    for m in 0..n_mels {
        let (left, center, right) = (hz_points[m], hz_points[m + 1], hz_points[m + 2]);
        let enorm = 2.0 / (right - left);
        for (bin, &freq) in fft_freqs.iter().enumerate() {
            let lower = (freq - left) / (center - left);
            let upper = (right - freq) / (right - center);
            weights[[m, bin]] = lower.min(upper).max(0.0) * enorm;
        }
    }
    weights
}

/// Computes the clip-level mean MFCC vector.
pub struct MfccExtractor {
    n_mfcc: usize,
    n_fft: usize,
    hop_length: usize,
    n_mels: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl MfccExtractor {
    pub fn new(config: &AudioConfig) -> Self {
        let n_fft = config.n_fft;
        // Periodic Hann window
        let window = (0..n_fft)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / n_fft as f32).cos())
            .collect();
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);

        Self {
            n_mfcc: config.n_mfcc,
            n_fft,
            hop_length: config.hop_length,
            n_mels: config.n_mels,
            window,
            fft,
        }
    }

    pub fn n_mfcc(&self) -> usize {
        self.n_mfcc
    }

    /// Decodes `bytes` and returns a `[1, n_mfcc]` feature tensor.
    pub fn extract(&self, bytes: &[u8], extension: Option<&str>) -> Result<FeatureTensor, ClassifierError> {
        self.features(&decode_audio(bytes, extension)?)
    }

    /// Same as [`extract`](Self::extract) for a clip on disk.
    pub fn extract_file(&self, path: &Path, extension: Option<&str>) -> Result<FeatureTensor, ClassifierError> {
        self.features(&decode_audio_file(path, extension)?)
    }

    fn features(&self, waveform: &Waveform) -> Result<FeatureTensor, ClassifierError> {
        let mean = self.mean_mfcc(waveform)?;
        let features = mean
            .into_shape_with_order((1, self.n_mfcc))
            .map_err(|e| ClassifierError::Decode(format!("Failed to shape MFCC features: {}", e)))?;
        Ok(FeatureTensor::Dense(features.into_dyn()))
    }

    /// Power spectrogram, shape `[frames, n_fft / 2 + 1]`.
    fn power_spectrogram(&self, samples: &[f32]) -> Array2<f32> {
        // Centre frames by zero padding n_fft / 2 on both sides
        let pad = self.n_fft / 2;
        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);

        let n_frames = 1 + (padded.len() - self.n_fft) / self.hop_length;
        let n_bins = self.n_fft / 2 + 1;
        let mut spectrogram = Array2::zeros((n_frames, n_bins));
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.n_fft];

        for frame in 0..n_frames {
            let start = frame * self.hop_length;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] * self.window[i], 0.0);
            }
            self.fft.process(&mut buffer);
            for (bin, value) in buffer.iter().take(n_bins).enumerate() {
                spectrogram[[frame, bin]] = value.norm_sqr();
            }
        }
        spectrogram
    }

    /// Mean over frames of the first `n_mfcc` cepstral coefficients.
    pub fn mean_mfcc(&self, waveform: &Waveform) -> Result<Array1<f32>, ClassifierError> {
        if waveform.samples.is_empty() {
            return Err(ClassifierError::Decode("Audio stream contains no samples".to_string()));
        }

        let power = self.power_spectrogram(&waveform.samples);
        let filters = mel_filterbank(waveform.sample_rate as f32, self.n_fft, self.n_mels);
        let mel = power.dot(&filters.t());

        let mut log_mel = mel.mapv(|v| 10.0 * v.max(AMIN).log10());
        let peak = log_mel.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
        log_mel.mapv_inplace(|v| v.max(peak - TOP_DB));

        let mfcc = log_mel.dot(&self.dct_basis().t());
        mfcc.mean_axis(Axis(0))
            .ok_or_else(|| ClassifierError::Decode("Audio produced no frames".to_string()))
    }

    /// Orthonormal DCT-II basis, shape `[n_mfcc, n_mels]`.
    fn dct_basis(&self) -> Array2<f32> {
        let n = self.n_mels as f32;
        Array2::from_shape_fn((self.n_mfcc, self.n_mels), |(k, i)| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            scale * (PI * k as f32 * (i as f32 + 0.5) / n).cos()
        })
    }
}
