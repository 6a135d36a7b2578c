//! Encoder invocation.
//!
//! Runs ffmpeg on a compiled filtergraph, reports progress from
//! `-progress pipe:1`, and only moves the result into place once the
//! encoder exits cleanly.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use vidstack_common::error::{VidstackError, VidstackResult};
use vidstack_project_model::composition::OutputSettings;

use crate::compiler::OUTPUT_LABEL;

/// How often the encode loop checks the cancel flag while ffmpeg is quiet.
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Warn when ffmpeg reports no advancement for this long.
const STALL_WARNING: Duration = Duration::from_secs(10);

/// Encoder settings passed explicitly on every invocation.
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    /// ffmpeg executable, looked up on `PATH` when not absolute.
    pub ffmpeg_binary: PathBuf,

    /// Value for `-loglevel`.
    pub log_level: String,

    /// Video codec.
    pub codec: String,

    /// x264 preset.
    pub preset: String,

    /// Target video bitrate, e.g. `15000k`.
    pub bitrate: String,

    /// Encoder threads.
    pub threads: u32,

    /// Output pixel format.
    pub pixel_format: String,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            ffmpeg_binary: PathBuf::from("ffmpeg"),
            log_level: "error".to_string(),
            codec: "libx264".to_string(),
            preset: "ultrafast".to_string(),
            bitrate: "15000k".to_string(),
            threads: 4,
            pixel_format: "yuv420p".to_string(),
        }
    }
}

impl EncodeSettings {
    /// Settings for a composition's `[output]` table.
    pub fn from_output(output: &OutputSettings, ffmpeg_binary: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_binary: ffmpeg_binary.into(),
            preset: output.preset.clone(),
            bitrate: output.bitrate.clone(),
            threads: output.threads.max(1),
            ..Self::default()
        }
    }
}

/// One encoder input, in placement order.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeInput {
    pub path: PathBuf,

    /// Loop a still image for this many seconds.
    pub loop_secs: Option<f64>,
}

impl EncodeInput {
    pub fn video(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            loop_secs: None,
        }
    }

    pub fn still(path: impl Into<PathBuf>, seconds: f64) -> Self {
        Self {
            path: path.into(),
            loop_secs: Some(seconds),
        }
    }
}

/// Everything needed to run one encode.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    pub inputs: Vec<EncodeInput>,
    pub filter_graph: String,
    pub output_path: PathBuf,
    pub frame_rate: f64,
    pub duration_secs: f64,
    pub total_frames: u64,
    pub settings: EncodeSettings,
}

/// Progress callback for encoding.
pub type ProgressCallback = Box<dyn Fn(EncodeProgress) + Send>;

/// Encode progress report.
#[derive(Debug, Clone)]
pub struct EncodeProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: EncodeStage,
}

/// Stages of an encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStage {
    Preparing,
    Encoding,
    Finalizing,
    Complete,
    Failed,
    Cancelled,
}

/// Shared cancellation flag. Setting it kills a running encode.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Trait for encoder backends.
pub trait EncodeInvoker: Send {
    /// Run the encode and return the final output path.
    fn run(
        &mut self,
        request: &EncodeRequest,
        progress: Option<ProgressCallback>,
        cancel: &CancelFlag,
    ) -> VidstackResult<PathBuf>;

    /// Backend name.
    fn name(&self) -> &str;
}

/// ffmpeg command-line backend.
#[derive(Debug, Default)]
pub struct FfmpegEncoder;

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Full ffmpeg argument list writing to `target`.
    pub fn build_args(request: &EncodeRequest, target: &Path) -> Vec<String> {
        let settings = &request.settings;
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            settings.log_level.clone(),
            "-nostats".to_string(),
            "-progress".to_string(),
            "pipe:1".to_string(),
        ];

        for input in &request.inputs {
            if let Some(seconds) = input.loop_secs {
                args.push("-loop".to_string());
                args.push("1".to_string());
                args.push("-t".to_string());
                args.push(format!("{seconds:.6}"));
            }
            args.push("-i".to_string());
            args.push(input.path.display().to_string());
        }

        args.push("-filter_complex".to_string());
        args.push(request.filter_graph.clone());
        args.push("-map".to_string());
        args.push(format!("[{OUTPUT_LABEL}]"));
        args.push("-an".to_string());
        args.push("-r".to_string());
        args.push(request.frame_rate.to_string());
        args.push("-c:v".to_string());
        args.push(settings.codec.clone());
        args.push("-preset".to_string());
        args.push(settings.preset.clone());
        args.push("-b:v".to_string());
        args.push(settings.bitrate.clone());
        args.push("-threads".to_string());
        args.push(settings.threads.to_string());
        args.push("-pix_fmt".to_string());
        args.push(settings.pixel_format.clone());
        args.push("-movflags".to_string());
        args.push("+faststart".to_string());
        args.push("-t".to_string());
        args.push(format!("{:.6}", request.duration_secs));
        args.push(target.display().to_string());
        args
    }

    fn spawn(request: &EncodeRequest, target: &Path) -> VidstackResult<(Child, Vec<String>)> {
        let args = Self::build_args(request, target);
        tracing::debug!(args = ?args, "Running ffmpeg");

        let child = Command::new(&request.settings.ffmpeg_binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                VidstackError::encode_failure(
                    "not started",
                    format!(
                        "Failed to start {}: {e}",
                        request.settings.ffmpeg_binary.display()
                    ),
                )
            })?;
        Ok((child, args))
    }

    fn encode_to(
        &self,
        request: &EncodeRequest,
        target: &Path,
        progress: Option<&ProgressCallback>,
        cancel: &CancelFlag,
    ) -> VidstackResult<()> {
        let (mut child, args) = Self::spawn(request, target)?;
        let start = Instant::now();

        tracing::info!(
            pid = child.id(),
            args_len = args.len(),
            total_frames = request.total_frames,
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VidstackError::encode_failure("io", "Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| VidstackError::encode_failure("io", "Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently to avoid ffmpeg blocking on a full stderr pipe.
        let stderr_task = std::thread::spawn(move || -> String {
            let mut reader = BufReader::new(stderr);
            let mut output = String::new();
            match reader.read_to_string(&mut output) {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let (line_tx, line_rx) = mpsc::channel::<String>();
        let stdout_task = std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        let mut latest_progress = ProgressState::default();
        let mut last_progress_secs = 0.0f64;
        let mut last_progress_wall = Instant::now();
        let mut cancelled = false;

        loop {
            if cancel.is_cancelled() {
                tracing::warn!(pid = child.id(), "Cancelling ffmpeg");
                if let Err(err) = child.kill() {
                    tracing::warn!(error = %err, "Failed to kill ffmpeg");
                }
                cancelled = true;
                break;
            }

            let line = match line_rx.recv_timeout(CANCEL_POLL) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            latest_progress.update(key, value);
            if key != "progress" {
                continue;
            }

            if latest_progress.out_time_secs > last_progress_secs + 0.001 {
                last_progress_secs = latest_progress.out_time_secs;
                last_progress_wall = Instant::now();
            }
            if let Some(cb) = progress {
                cb(progress_report(
                    &latest_progress,
                    request.total_frames,
                    request.duration_secs,
                    start.elapsed().as_secs_f64(),
                ));
            }
            if last_progress_wall.elapsed() >= STALL_WARNING {
                tracing::warn!(
                    out_time_secs = latest_progress.out_time_secs,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for 10s"
                );
                last_progress_wall = Instant::now();
            }
        }

        let status = child.wait().map_err(|e| {
            VidstackError::encode_failure("unknown", format!("Failed to wait on ffmpeg: {e}"))
        })?;
        drop(line_rx);
        let _ = stdout_task.join();
        let stderr_output = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if cancelled {
            return Err(VidstackError::encode_failure("cancelled", stderr_output));
        }
        if !status.success() {
            return Err(VidstackError::encode_failure(status.to_string(), stderr_output));
        }

        tracing::info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            "ffmpeg finished"
        );
        Ok(())
    }
}

impl EncodeInvoker for FfmpegEncoder {
    fn run(
        &mut self,
        request: &EncodeRequest,
        progress: Option<ProgressCallback>,
        cancel: &CancelFlag,
    ) -> VidstackResult<PathBuf> {
        if request.inputs.is_empty() {
            return Err(VidstackError::invalid_input("Encode request has no inputs"));
        }
        if let Some(parent) = request.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        report(&progress, request, 0.0, EncodeStage::Preparing);

        let temp_path = partial_output_path(&request.output_path);
        let result = self.encode_to(request, &temp_path, progress.as_ref(), cancel);

        if let Err(err) = result {
            remove_partial(&temp_path);
            let stage = if cancel.is_cancelled() {
                EncodeStage::Cancelled
            } else {
                EncodeStage::Failed
            };
            report(&progress, request, 0.0, stage);
            return Err(err);
        }

        report(&progress, request, 1.0, EncodeStage::Finalizing);
        if let Err(err) = std::fs::rename(&temp_path, &request.output_path) {
            remove_partial(&temp_path);
            return Err(err.into());
        }
        report(&progress, request, 1.0, EncodeStage::Complete);

        tracing::info!(output = %request.output_path.display(), "Encode complete");
        Ok(request.output_path.clone())
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Sibling path ffmpeg writes to before the final rename.
///
/// The extension is kept so ffmpeg still picks the right muxer.
pub fn partial_output_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match output.extension() {
        Some(ext) => format!(".{stem}.partial.{}", ext.to_string_lossy()),
        None => format!(".{stem}.partial"),
    };
    output.with_file_name(name)
}

/// Whether `binary` resolves to an executable.
pub fn command_exists(binary: impl AsRef<Path>) -> bool {
    let binary = binary.as_ref();
    if binary.components().count() > 1 {
        return binary.is_file();
    }
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {} >/dev/null 2>&1", binary.display()))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn remove_partial(path: &Path) {
    if path.exists() {
        if let Err(err) = std::fs::remove_file(path) {
            tracing::warn!(error = %err, path = %path.display(), "Failed to remove partial output");
        }
    }
}

fn report(
    progress: &Option<ProgressCallback>,
    request: &EncodeRequest,
    value: f64,
    stage: EncodeStage,
) {
    if let Some(cb) = progress {
        cb(EncodeProgress {
            progress: value,
            frames_rendered: (value * request.total_frames as f64).round() as u64,
            total_frames: request.total_frames,
            eta_secs: 0.0,
            stage,
        });
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both keys.
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.trim().parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value.trim() == "end";
            }
            _ => {}
        }
    }
}

fn progress_report(
    state: &ProgressState,
    total_frames: u64,
    expected_duration_secs: f64,
    elapsed_secs: f64,
) -> EncodeProgress {
    let progress = if expected_duration_secs <= 0.0 {
        0.0
    } else {
        (state.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    };
    let progress = if state.complete { 1.0 } else { progress };

    let frames_rendered = (progress * total_frames as f64).round() as u64;
    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    EncodeProgress {
        progress,
        frames_rendered,
        total_frames,
        eta_secs,
        stage: if state.complete {
            EncodeStage::Finalizing
        } else {
            EncodeStage::Encoding
        },
    }
}
