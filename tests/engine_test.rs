mod common;

use std::sync::Arc;
use std::thread;

use common::{gif, png, wav, Models, ScriptedModel, BLUE, RED};
use emolens::{EmotionLabel, EngineConfig, Input, VideoInput};

#[test]
fn test_text_low_confidence_gets_neutral_floor() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let models = Models::default();
    let engine = models.engine(EngineConfig::default());

    let result = engine.classify(&Input::Text("I am so happy today".into()))?;
    assert_eq!(result.label, EmotionLabel::Happy);
    assert_eq!(result.unit_count, 1);
    assert_eq!(result.distribution.get(EmotionLabel::Happy), 0.5);
    assert_eq!(result.distribution.get(EmotionLabel::Neutral), 0.3);
    assert_eq!(models.text.shapes(), vec![vec![1, 100]]);
    Ok(())
}

#[test]
fn test_text_confident_result_passes_through() -> Result<(), Box<dyn std::error::Error>> {
    let scores = [0.0, 0.92, 0.02, 0.02, 0.02, 0.01, 0.01];
    let models = Models {
        text: Arc::new(ScriptedModel::fixed("text", scores)),
        ..Models::default()
    };
    let engine = models.engine(EngineConfig::default());

    let result = engine.classify(&Input::Text("so sad".into()))?;
    assert_eq!(result.label, EmotionLabel::Sad);
    assert_eq!(result.distribution.as_slice(), &scores);
    Ok(())
}

#[test]
fn test_image_result_is_raw_model_output() -> Result<(), Box<dyn std::error::Error>> {
    let models = Models::default();
    let engine = models.engine(EngineConfig::default());

    let result = engine.classify(&Input::Image(png(120, 80, RED)))?;
    assert_eq!(result.label, EmotionLabel::Surprise);
    assert_eq!(result.unit_count, 1);
    assert_eq!(result.distribution.get(EmotionLabel::Surprise), 0.9);
    // Completeness: every label is present, including zero scores
    assert_eq!(result.distribution.iter().count(), 7);
    assert_eq!(models.image.shapes(), vec![vec![1, 48, 48, 3]]);
    Ok(())
}

#[test]
fn test_image_channels_first() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = EngineConfig::default();
    config.image.width = 64;
    config.image.height = 32;
    config.image.channels_first = true;
    let models = Models::default();
    let engine = models.engine(config);

    engine.classify(&Input::Image(png(10, 10, BLUE)))?;
    assert_eq!(models.image.shapes(), vec![vec![1, 3, 32, 64]]);
    Ok(())
}

#[test]
fn test_audio_clip_uses_mean_mfcc() -> Result<(), Box<dyn std::error::Error>> {
    let models = Models::default();
    let engine = models.engine(EngineConfig::default());

    let input = Input::Audio {
        bytes: wav(22050, 0.5),
        extension: Some("wav".into()),
    };
    let result = engine.classify(&input)?;
    assert_eq!(result.label, EmotionLabel::Angry);
    assert_eq!(result.unit_count, 1);
    assert_eq!(models.audio.shapes(), vec![vec![1, 40]]);
    Ok(())
}

#[test]
fn test_twenty_five_frame_video() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let models = Models::default();
    let engine = models.engine(EngineConfig::default());

    // Frame 0 reads as sad (0.9), every other frame as happy (0.8)
    let mut colors = vec![BLUE];
    colors.extend(std::iter::repeat(RED).take(24));
    let result = engine.classify(&Input::Video(VideoInput::Encoded(gif(&colors))))?;

    assert_eq!(models.video.calls(), 13);
    assert_eq!(result.unit_count, 13);
    assert_eq!(result.label, EmotionLabel::Happy);
    assert!((result.distribution.get(EmotionLabel::Happy) - 9.6 / 13.0).abs() < 1e-5);
    assert!((result.distribution.get(EmotionLabel::Sad) - 0.9 / 13.0).abs() < 1e-5);
    assert_eq!(result.distribution.get(EmotionLabel::Neutral), 0.0);
    Ok(())
}

#[test]
fn test_video_sampling_follows_stride() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = EngineConfig::default();
    config.video.target_samples = 4;
    let models = Models::default();
    let engine = models.engine(config);

    // stride 40 / 4 = 10
    let colors: Vec<[u8; 3]> = (0..40).map(|i| if i % 10 == 0 { BLUE } else { RED }).collect();
    let result = engine.classify(&Input::Video(VideoInput::Encoded(gif(&colors))))?;

    assert_eq!(models.video.calls(), 4);
    assert_eq!(result.label, EmotionLabel::Sad);
    assert!((result.distribution.get(EmotionLabel::Sad) - 0.9).abs() < 1e-6);
    Ok(())
}

#[test]
fn test_video_frames_resized_like_images() -> Result<(), Box<dyn std::error::Error>> {
    let models = Models::default();
    let engine = models.engine(EngineConfig::default());

    let frames = vec![png(30, 20, RED), png(64, 64, RED)];
    let result = engine.classify(&Input::Video(VideoInput::Frames(frames)))?;
    assert_eq!(result.unit_count, 2);
    assert_eq!(models.video.shapes(), vec![vec![1, 48, 48, 3]; 2]);
    Ok(())
}

#[test]
fn test_undecodable_frames_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
    let models = Models::default();
    let engine = models.engine(EngineConfig::default());

    let frames = vec![b"garbage".to_vec(), png(8, 8, BLUE), png(8, 8, RED), Vec::new()];
    let result = engine.classify(&Input::Video(VideoInput::Frames(frames)))?;
    assert_eq!(result.unit_count, 2);
    // One happy vote at 0.8 loses to one sad vote at 0.9
    assert_eq!(result.label, EmotionLabel::Sad);
    Ok(())
}

#[test]
fn test_video_with_no_usable_frames_is_neutral() -> Result<(), Box<dyn std::error::Error>> {
    let models = Models::default();
    let engine = models.engine(EngineConfig::default());

    for frames in [Vec::new(), vec![b"junk".to_vec(), b"more junk".to_vec()]] {
        let result = engine.classify(&Input::Video(VideoInput::Frames(frames)))?;
        assert_eq!(result.label, EmotionLabel::Neutral);
        assert_eq!(result.unit_count, 0);
        assert_eq!(result.distribution.get(EmotionLabel::Neutral), 1.0);
        assert_eq!(result.distribution.sum(), 1.0);
    }
    assert_eq!(models.video.calls(), 0);
    Ok(())
}

#[test]
fn test_staged_upload_is_cleaned_up() -> Result<(), Box<dyn std::error::Error>> {
    let uploads = tempfile::tempdir()?;
    let config = EngineConfig {
        upload_dir: Some(uploads.path().to_path_buf()),
        ..EngineConfig::default()
    };
    let models = Models::default();
    let engine = models.engine(config);

    let bytes = png(16, 16, RED);
    let result = engine.classify_staged(emolens::Modality::Image, bytes.as_slice(), Some("png"))?;
    assert_eq!(result.label, EmotionLabel::Surprise);

    // Failed requests clean up too
    assert!(engine
        .classify_staged(emolens::Modality::Image, &b"not an image"[..], Some("png"))
        .is_err());
    assert_eq!(std::fs::read_dir(uploads.path())?.count(), 0);
    Ok(())
}

#[test]
fn test_staged_media_decoded_from_disk() -> Result<(), Box<dyn std::error::Error>> {
    let uploads = tempfile::tempdir()?;
    let config = EngineConfig {
        upload_dir: Some(uploads.path().to_path_buf()),
        ..EngineConfig::default()
    };
    let models = Models::default();
    let engine = models.engine(config);

    let clip = wav(16000, 0.5);
    let result = engine.classify_staged(emolens::Modality::Audio, clip.as_slice(), Some("wav"))?;
    assert_eq!(result.label, EmotionLabel::Angry);
    assert_eq!(models.audio.shapes(), vec![vec![1, 40]]);

    let video = gif(&[RED, RED, BLUE]);
    let result = engine.classify_staged(emolens::Modality::Video, video.as_slice(), Some("gif"))?;
    assert_eq!(result.label, EmotionLabel::Happy);
    assert_eq!(result.unit_count, 3);
    assert_eq!(models.video.calls(), 3);

    let result = engine.classify_staged(emolens::Modality::Text, &b"i am so happy"[..], None)?;
    assert_eq!(result.distribution.get(EmotionLabel::Neutral), 0.3);

    let err = engine
        .classify_staged(emolens::Modality::Text, &[0xffu8, 0xfe][..], None)
        .unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(std::fs::read_dir(uploads.path())?.count(), 0);
    Ok(())
}

#[test]
fn test_engine_shared_across_threads() -> Result<(), Box<dyn std::error::Error>> {
    let models = Models::default();
    let engine = Arc::new(models.engine(EngineConfig::default()));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let input = if i % 2 == 0 {
                    Input::Text("i am happy".into())
                } else {
                    Input::Video(VideoInput::Encoded(gif(&[RED, RED, BLUE])))
                };
                engine.classify(&input).unwrap().label
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), EmotionLabel::Happy, "thread {}", i);
    }
    assert_eq!(models.text.calls(), 2);
    assert_eq!(models.video.calls(), 6);
    Ok(())
}

#[test]
fn test_engine_info() {
    let models = Models::default();
    let engine = models.engine(EngineConfig::default());

    let info = engine.info();
    assert_eq!(info.models["text"], "text");
    assert_eq!(info.models["video"], "color_voter");
    assert_eq!(info.vocabulary_size, 7);
    assert_eq!(info.n_mfcc, 40);
    assert_eq!(info.image_size, (48, 48));

    let json = serde_json::to_value(&info).unwrap();
    assert_eq!(json["target_samples"], 10);
}
