//! The kiosk session: hardware gate, then picture or webcam recognition.

use crate::config::Config;
use crate::engine::{self, DatasetPaths, EngineError, EngineHandle};
use crate::panel::{self, Panel};
use anyhow::{Context, Result};
use clap::ValueEnum;
use facegate_core::{dataset, FaceAnalyzer, Recognition, Tolerance};
use facegate_hw::Camera;
use facegate_remote::{FlagSink, HttpFlagSink, MatchReporter, StatusClient};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InputMode {
    Picture,
    Webcam,
}

/// Operator choices for one session.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: InputMode,
    pub tolerance: Tolerance,
    pub skip_hardware_check: bool,
    pub ready_timeout: Option<Duration>,
    pub rebuild: bool,
    pub pictures: Vec<PathBuf>,
}

pub async fn run(config: &Config, opts: RunOptions) -> Result<()> {
    let mut panel = Panel::stdout(&config.paths.display_dir);

    if opts.skip_hardware_check {
        tracing::warn!("hardware status check skipped");
    } else {
        wait_for_hardware(config, &mut panel, opts.ready_timeout).await?;
    }

    panel.title("Settings");
    panel.info(&format!("Input type: {:?}", opts.input));
    panel.info(&format!(
        "Tolerance: {} (cosine similarity >= {:.2})",
        opts.tolerance,
        opts.tolerance.min_cosine_similarity()
    ));
    panel.info("Lower tolerance = stricter matching. Higher = more lenient.");
    panel.title("Student Information");
    panel.show_identity(&facegate_core::Identity::unknown());

    // Picture mode settles its input before the models are loaded.
    let pictures = match opts.input {
        InputMode::Picture => {
            panel.title("Face Recognition - Picture");
            panel.info(&config.prompts.picture);
            let accepted = select_pictures(&mut panel, &opts.pictures);
            if accepted.is_empty() {
                return Ok(());
            }
            accepted
        }
        InputMode::Webcam => Vec::new(),
    };

    let analyzer = FaceAnalyzer::load(&config.paths.model_dir)
        .with_context(|| format!("loading models from {}", config.paths.model_dir.display()))?;

    let camera = match opts.input {
        InputMode::Picture => None,
        InputMode::Webcam => match Camera::open(&config.camera.device, config.camera.width, config.camera.height) {
            Ok(camera) => {
                camera.warm_up(config.camera.warmup_frames);
                Some(camera)
            }
            Err(e) => {
                report_camera_failure(&mut panel, &e.to_string());
                return Err(e).context("opening camera");
            }
        },
    };

    let engine = engine::spawn_engine(analyzer, dataset_paths(config), camera)?;

    if opts.rebuild {
        rebuild(&engine, &mut panel).await?;
    }

    let sink = HttpFlagSink::new(&config.remote.flag_url, config.remote.request_timeout())?;
    let mut reporter = MatchReporter::new(sink);

    match opts.input {
        InputMode::Picture => run_pictures(&engine, &mut panel, &mut reporter, opts.tolerance, &pictures).await,
        InputMode::Webcam => {
            panel.title("Face Recognition - Webcam");
            panel.info(&config.prompts.webcam);
            run_webcam(&engine, &mut panel, &mut reporter, opts.tolerance).await
        }
    }
}

pub fn dataset_paths(config: &Config) -> DatasetPaths {
    DatasetPaths {
        dataset_dir: config.paths.dataset_dir.clone(),
        gallery_path: config.paths.gallery_path.clone(),
    }
}

/// Block until the hardware-status endpoint reports ready (or Ctrl-C).
async fn wait_for_hardware<W: Write>(config: &Config, panel: &mut Panel<W>, max_wait: Option<Duration>) -> Result<()> {
    panel.title("Checking Hardware Status");
    panel.info("Waiting for hardware response...");

    let status = StatusClient::new(&config.remote.status_url, config.remote.request_timeout())?;
    let wait = status.wait_until_ready(&config.remote.ready_value, config.remote.poll_interval(), max_wait);

    tokio::select! {
        ready = wait => {
            ready.with_context(|| format!("waiting for {}", status.url()))?;
        }
        _ = tokio::signal::ctrl_c() => {
            anyhow::bail!("interrupted while waiting for hardware");
        }
    }

    panel.success("Hardware Ready");
    Ok(())
}

async fn rebuild<W: Write>(engine: &EngineHandle, panel: &mut Panel<W>) -> Result<()> {
    panel.info("Rebuilding dataset...");
    let report = engine.rebuild().await?;
    panel.success(&format!(
        "Dataset has been rebuilt ({} encoded, {} unchanged, {} skipped)",
        report.encoded, report.reused, report.skipped
    ));
    Ok(())
}

/// Display one recognition and forward its match flag.
async fn present<W: Write, S: FlagSink>(
    panel: &mut Panel<W>,
    reporter: &mut MatchReporter<S>,
    recognition: &Recognition,
    display_name: &str,
) {
    panel.show_identity(&recognition.identity);
    if let Err(e) = panel.show_image(&recognition.annotated, display_name) {
        tracing::warn!(error = %e, file = display_name, "could not write display frame");
    }
    reporter.report(recognition.is_match()).await;
}

/// Report unsupported files and return the pictures left to recognize.
/// Prompts for an image when none are left.
fn select_pictures<W: Write>(panel: &mut Panel<W>, pictures: &[PathBuf]) -> Vec<PathBuf> {
    let (accepted, rejected): (Vec<&PathBuf>, Vec<&PathBuf>) =
        pictures.iter().partition(|p| dataset::is_image_file(p));

    for path in &rejected {
        panel.error(&format!("{} is not a jpg, jpeg or png picture", path.display()));
    }
    if accepted.is_empty() {
        panel.info("Please supply an image.");
    }
    accepted.into_iter().cloned().collect()
}

/// Recognize each picture in turn, forwarding the match flag after each one.
async fn run_pictures<W: Write, S: FlagSink>(
    engine: &EngineHandle,
    panel: &mut Panel<W>,
    reporter: &mut MatchReporter<S>,
    tolerance: Tolerance,
    pictures: &[PathBuf],
) -> Result<()> {
    for path in pictures {
        let image = match image::open(path) {
            Ok(image) => image.to_rgb8(),
            Err(e) => {
                panel.error(&format!("cannot open {}: {e}", path.display()));
                continue;
            }
        };

        let recognition = engine.recognize(image, tolerance).await?;
        tracing::info!(
            picture = %path.display(),
            faces = recognition.faces.len(),
            name = %recognition.identity.name,
            "picture recognized"
        );
        present(panel, reporter, &recognition, &panel::annotated_name(path)).await;
    }

    Ok(())
}

async fn run_webcam<W: Write, S: FlagSink>(
    engine: &EngineHandle,
    panel: &mut Panel<W>,
    reporter: &mut MatchReporter<S>,
    tolerance: Tolerance,
) -> Result<()> {
    let mut frames = 0u64;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let recognition = tokio::select! {
            result = engine.capture(tolerance) => result,
            _ = &mut ctrl_c => {
                tracing::info!(frames, "webcam session stopped");
                panel.info("Stopped.");
                return Ok(());
            }
        };

        match recognition {
            Ok(recognition) => {
                frames += 1;
                present(panel, reporter, &recognition, panel::LIVE_FRAME_FILE).await;
            }
            Err(EngineError::Camera(e)) => {
                report_camera_failure(panel, &e.to_string());
                return Err(e).context("webcam capture");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn report_camera_failure<W: Write>(panel: &mut Panel<W>, detail: &str) {
    tracing::error!(detail, "camera capture failed");
    panel.error("Failed to capture frame from camera");
    panel.info("Please close other camera apps and restart.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::PixelEncoder;
    use facegate_remote::{MatchFlag, RemoteError};
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    /// Accepts every flag and remembers it.
    #[derive(Clone, Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<MatchFlag>>>,
    }

    impl FlagSink for RecordingSink {
        async fn send(&self, flag: MatchFlag) -> Result<u16, RemoteError> {
            self.sent.lock().unwrap().push(flag);
            Ok(200)
        }
    }

    fn write_picture(dir: &Path, file: &str, rgb: [u8; 3]) -> PathBuf {
        let path = dir.join(file);
        image::RgbImage::from_pixel(8, 8, image::Rgb(rgb)).save(&path).unwrap();
        path
    }

    fn text(panel: Panel<Vec<u8>>) -> String {
        String::from_utf8(panel.into_inner()).unwrap()
    }

    #[test]
    fn test_select_pictures_reports_unsupported_files() {
        let mut panel = Panel::new(Vec::new(), "unused");
        let pictures = vec![
            PathBuf::from("notes.txt"),
            PathBuf::from("Ada.png"),
            PathBuf::from("clip.gif"),
            PathBuf::from("Grace.JPEG"),
        ];

        let accepted = select_pictures(&mut panel, &pictures);
        assert_eq!(accepted, vec![PathBuf::from("Ada.png"), PathBuf::from("Grace.JPEG")]);

        let out = text(panel);
        assert_eq!(out.matches("[error]").count(), 2);
        assert!(out.contains("[error] notes.txt is not a jpg, jpeg or png picture"));
        assert!(out.contains("[error] clip.gif is not a jpg, jpeg or png picture"));
        assert!(!out.contains("Please supply an image."));
    }

    #[test]
    fn test_select_pictures_prompts_when_nothing_left() {
        let mut panel = Panel::new(Vec::new(), "unused");
        assert!(select_pictures(&mut panel, &[]).is_empty());
        assert!(text(panel).contains("Please supply an image."));

        let mut panel = Panel::new(Vec::new(), "unused");
        assert!(select_pictures(&mut panel, &[PathBuf::from("a.bmp")]).is_empty());
        let out = text(panel);
        assert!(out.contains("[error] a.bmp"));
        assert!(out.contains("Please supply an image."));
    }

    #[tokio::test]
    async fn test_picture_mode_without_pictures_skips_models() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.paths.model_dir = dir.path().join("no-models-here");
        config.paths.display_dir = dir.path().join("display");

        let opts = RunOptions {
            input: InputMode::Picture,
            tolerance: Tolerance::default(),
            skip_hardware_check: true,
            ready_timeout: None,
            rebuild: false,
            pictures: vec![PathBuf::from("notes.txt")],
        };
        run(&config, opts).await.unwrap();
        assert!(!config.paths.display_dir.exists());
    }

    #[tokio::test]
    async fn test_pictures_forward_flag_on_change_only() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DatasetPaths {
            dataset_dir: dir.path().join("dataset"),
            gallery_path: dir.path().join("dataset/gallery.json"),
        };
        std::fs::create_dir_all(&paths.dataset_dir).unwrap();
        write_picture(&paths.dataset_dir, "Ada_17.png", [255, 0, 0]);

        let engine = engine::spawn_engine(PixelEncoder, paths, None).unwrap();
        engine.rebuild().await.unwrap();

        let inputs = dir.path().join("inputs");
        std::fs::create_dir_all(&inputs).unwrap();
        let pictures = vec![
            inputs.join("readme.txt"),
            write_picture(&inputs, "first.png", [255, 0, 0]),
            write_picture(&inputs, "second.png", [250, 4, 0]),
            write_picture(&inputs, "stranger.png", [0, 255, 0]),
        ];

        let display = dir.path().join("display");
        let mut panel = Panel::new(Vec::new(), &display);
        let sink = RecordingSink::default();
        let mut reporter = MatchReporter::new(sink.clone());

        let accepted = select_pictures(&mut panel, &pictures);
        assert_eq!(accepted.len(), 3);
        run_pictures(&engine, &mut panel, &mut reporter, Tolerance::default(), &accepted)
            .await
            .unwrap();

        assert_eq!(*sink.sent.lock().unwrap(), vec![MatchFlag::Matched, MatchFlag::NoMatch]);
        assert!(display.join("first.annotated.png").exists());
        assert!(display.join("stranger.annotated.png").exists());

        let out = text(panel);
        assert!(out.contains("[error]"));
        assert_eq!(out.matches("Name: Ada").count(), 1);
        assert!(out.contains("Name: Unknown\n  ID: Unknown\n"));
    }

    #[test]
    fn test_camera_failure_messages() {
        let mut panel = Panel::new(Vec::new(), "unused");
        report_camera_failure(&mut panel, "device busy");
        let out = text(panel);
        assert!(out.contains("[error] Failed to capture frame from camera"));
        assert!(out.contains("Please close other camera apps and restart."));
    }
}
