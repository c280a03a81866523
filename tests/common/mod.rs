#![allow(dead_code)]

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use emolens::features::Vocabulary;
use emolens::{
    ClassifierError, EmotionEngine, EmotionModel, EngineBuilder, EngineConfig, FeatureTensor, Modality,
    ProbabilityDistribution, NUM_LABELS,
};
use env_logger::{Builder, Env};
use image::codecs::gif::GifEncoder;
use image::{Delay, Frame, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

pub const RED: [u8; 3] = [255, 0, 0];
pub const BLUE: [u8; 3] = [0, 0, 255];

pub const VOCAB_JSON: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [],
    "normalizer": null,
    "pre_tokenizer": {"type": "Whitespace"},
    "post_processor": null,
    "decoder": null,
    "model": {
        "type": "WordLevel",
        "vocab": {"<OOV>": 1, "i": 2, "am": 3, "so": 4, "happy": 5, "sad": 6, "today": 7},
        "unk_token": "<OOV>"
    }
}"#;

// Initialize test logger
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn")).try_init();
}

type Script = dyn Fn(&FeatureTensor) -> Result<[f32; NUM_LABELS], ClassifierError> + Send + Sync;

/// A model whose output is computed by a closure, recording every input shape.
pub struct ScriptedModel {
    name: String,
    script: Box<Script>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    shapes: Mutex<Vec<Vec<usize>>>,
}

impl ScriptedModel {
    pub fn new(
        name: &str,
        script: impl Fn(&FeatureTensor) -> Result<[f32; NUM_LABELS], ClassifierError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            script: Box::new(script),
            delay: None,
            calls: AtomicUsize::new(0),
            shapes: Mutex::new(Vec::new()),
        }
    }

    /// Always returns `scores`.
    pub fn fixed(name: &str, scores: [f32; NUM_LABELS]) -> Self {
        Self::new(name, move |_| Ok(scores))
    }

    /// Always fails with an inference error.
    pub fn failing(name: &str) -> Self {
        Self::new(name, |_| Err(ClassifierError::Inference("model crashed".into())))
    }

    /// Video model voting by frame colour: red frames are happy (0.8), others sad (0.9).
    pub fn color_voter() -> Self {
        Self::new("color_voter", |features| {
            let FeatureTensor::Dense(pixels) = features else {
                return Err(ClassifierError::Inference("expected pixels".into()));
            };
            // NHWC, so the first three values are the top-left pixel
            let rgb: Vec<f32> = pixels.iter().take(3).copied().collect();
            Ok(if rgb[0] > rgb[2] {
                [0.8, 0.05, 0.05, 0.02, 0.03, 0.02, 0.03]
            } else {
                [0.02, 0.9, 0.02, 0.02, 0.02, 0.01, 0.01]
            })
        })
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn shapes(&self) -> Vec<Vec<usize>> {
        self.shapes.lock().unwrap().clone()
    }
}

impl EmotionModel for ScriptedModel {
    fn infer(&self, features: &FeatureTensor) -> Result<ProbabilityDistribution, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.shapes.lock().unwrap().push(features.shape().to_vec());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        (self.script)(features).map(ProbabilityDistribution::from_array)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Models for each modality, kept so tests can inspect them after classifying.
pub struct Models {
    pub text: Arc<ScriptedModel>,
    pub audio: Arc<ScriptedModel>,
    pub image: Arc<ScriptedModel>,
    pub video: Arc<ScriptedModel>,
}

impl Default for Models {
    fn default() -> Self {
        Self {
            text: Arc::new(ScriptedModel::fixed("text", [0.5, 0.1, 0.1, 0.1, 0.1, 0.05, 0.05])),
            audio: Arc::new(ScriptedModel::fixed("audio", [0.1, 0.1, 0.6, 0.05, 0.05, 0.05, 0.05])),
            image: Arc::new(ScriptedModel::fixed("image", [0.0, 0.0, 0.0, 0.0, 0.9, 0.05, 0.05])),
            video: Arc::new(ScriptedModel::color_voter()),
        }
    }
}

impl Models {
    pub fn builder(&self) -> EngineBuilder {
        EngineBuilder::new()
            .with_model(Modality::Text, self.text.clone())
            .with_model(Modality::Audio, self.audio.clone())
            .with_model(Modality::Image, self.image.clone())
            .with_model(Modality::Video, self.video.clone())
    }

    pub fn engine(&self, config: EngineConfig) -> EmotionEngine {
        self.builder()
            .with_config(config)
            .with_vocabulary(vocabulary())
            .build()
            .unwrap()
    }
}

pub fn vocabulary() -> Vocabulary {
    Vocabulary::from_json(VOCAB_JSON, 100, Some("<OOV>")).unwrap()
}

pub fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    RgbImage::from_pixel(width, height, Rgb(color))
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

pub fn gif(colors: &[[u8; 3]]) -> Vec<u8> {
    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut bytes);
        let frames = colors.iter().map(|&[r, g, b]| {
            let buffer = RgbaImage::from_pixel(16, 16, Rgba([r, g, b, 255]));
            Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(40, 1))
        });
        encoder.encode_frames(frames).unwrap();
    }
    bytes
}

/// A mono 16-bit sine tone.
pub fn wav(sample_rate: u32, seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut bytes, spec).unwrap();
        let total = (sample_rate as f32 * seconds) as usize;
        for i in 0..total {
            let t = i as f32 / sample_rate as f32;
            let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5;
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    bytes.into_inner()
}
