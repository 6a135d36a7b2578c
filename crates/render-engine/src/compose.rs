//! End-to-end composition: probe, plan, compile, encode.

use std::path::PathBuf;
use std::time::Instant;

use vidstack_common::error::{VidstackError, VidstackResult};
use vidstack_layout_planner::plan;
use vidstack_project_model::composition::OutputSettings;
use vidstack_project_model::layout::LayoutPlan;
use vidstack_project_model::media::{MediaDescriptor, VideoSource};
use vidstack_project_model::style::TextStyle;

use crate::compiler::FilterGraphCompiler;
use crate::export::{
    CancelFlag, EncodeInput, EncodeInvoker, EncodeRequest, EncodeSettings, FfmpegEncoder,
    ProgressCallback,
};
use crate::filter_graph::FilterChain;
use crate::probe::{probe_all, FfprobeProber, MediaProber, FALLBACK_FRAME_RATE};

/// A composition ready to run.
#[derive(Debug, Clone)]
pub struct CompositionJob {
    /// Resolved local sources, left to right.
    pub sources: Vec<VideoSource>,

    /// Final output file.
    pub output_path: PathBuf,

    pub output: OutputSettings,
    pub style: TextStyle,

    pub ffmpeg_binary: PathBuf,
    pub ffprobe_binary: PathBuf,

    /// Stop after compilation without running the encoder.
    pub dry_run: bool,

    /// Write `<output>.ffmpeg-debug.txt` next to the output.
    pub debug_report: bool,
}

impl CompositionJob {
    pub fn new(sources: Vec<VideoSource>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            sources,
            output_path: output_path.into(),
            output: OutputSettings::default(),
            style: TextStyle::default(),
            ffmpeg_binary: PathBuf::from("ffmpeg"),
            ffprobe_binary: PathBuf::from("ffprobe"),
            dry_run: false,
            debug_report: false,
        }
    }
}

/// Everything derived from a job before encoding.
#[derive(Debug, Clone)]
pub struct CompiledComposition {
    pub plan: LayoutPlan,
    pub descriptors: Vec<MediaDescriptor>,
    pub chain: FilterChain,
    pub filter_graph: String,
    pub request: EncodeRequest,
}

impl CompiledComposition {
    /// Text dump of the plan and the exact ffmpeg invocation.
    pub fn debug_report(&self) -> String {
        let mut report = format!(
            "inputs={}\ncanvas_width={}\ncanvas_height={}\ncanvas_duration={:.3}\nframe_rate={}\nframes={}\n",
            self.plan.len(),
            self.plan.canvas_width,
            self.plan.canvas_height,
            self.plan.canvas_duration,
            self.plan.output_frame_rate,
            self.request.total_frames,
        );
        for (idx, ((input, descriptor), layout)) in self
            .request
            .inputs
            .iter()
            .zip(&self.descriptors)
            .zip(&self.plan.videos)
            .enumerate()
        {
            report.push_str(&format!(
                "input[{idx}]={} source={}x{} duration={:.3} fps={:.3} scaled={}x{} pad={:.3}\n",
                input.path.display(),
                descriptor.width,
                descriptor.height,
                descriptor.duration,
                descriptor.frame_rate,
                layout.scaled_width,
                layout.scaled_height,
                layout.duration_pad,
            ));
        }
        report.push_str(&format!("filter_len={}\n", self.filter_graph.len()));
        report.push_str(&format!("filter_complex={}\n", self.filter_graph));
        report.push_str(&format!(
            "ffmpeg_args={}\n",
            FfmpegEncoder::build_args(&self.request, &self.request.output_path).join(" ")
        ));
        report
    }

    fn write_debug_report(&self) {
        let debug_path = self.request.output_path.with_extension("ffmpeg-debug.txt");
        if let Err(err) = std::fs::write(&debug_path, self.debug_report()) {
            tracing::warn!(error = %err, path = %debug_path.display(), "Failed to write ffmpeg debug report");
        } else {
            tracing::info!(path = %debug_path.display(), "Wrote ffmpeg debug report");
        }
    }
}

/// Result of [`compose`].
#[derive(Debug, Clone)]
pub struct ComposeOutcome {
    pub compiled: CompiledComposition,

    /// Written file, `None` for dry runs.
    pub output_path: Option<PathBuf>,
}

/// Fill in duration and frame rate for still sources.
///
/// Stills last as long as the longest video, or `still_duration` when every
/// input is a still. Their rate is the explicit output rate, else the first
/// video's, else 30.
pub fn resolve_stills(
    sources: &[VideoSource],
    descriptors: &mut [MediaDescriptor],
    output: &OutputSettings,
) -> VidstackResult<()> {
    if sources.len() != descriptors.len() {
        return Err(VidstackError::plan_mismatch(format!(
            "{} sources but {} descriptors",
            sources.len(),
            descriptors.len()
        )));
    }

    for (source, descriptor) in sources.iter().zip(descriptors.iter()) {
        if !source.is_still() && descriptor.duration <= 0.0 {
            return Err(VidstackError::probe(
                &source.path,
                "video reports no duration",
            ));
        }
    }

    let videos: Vec<&MediaDescriptor> = sources
        .iter()
        .zip(descriptors.iter())
        .filter(|(source, _)| !source.is_still())
        .map(|(_, descriptor)| descriptor)
        .collect();

    let still_duration = if videos.is_empty() {
        if !output.still_duration.is_finite() || output.still_duration <= 0.0 {
            return Err(VidstackError::invalid_input(format!(
                "still_duration must be positive, got {}",
                output.still_duration
            )));
        }
        output.still_duration
    } else {
        videos.iter().map(|d| d.duration).fold(0.0f64, f64::max)
    };

    let still_rate = output
        .fps
        .filter(|fps| fps.is_finite() && *fps > 0.0)
        .or_else(|| videos.first().map(|d| d.frame_rate))
        .unwrap_or(FALLBACK_FRAME_RATE);

    for (source, descriptor) in sources.iter().zip(descriptors.iter_mut()) {
        if source.is_still() {
            descriptor.duration = still_duration;
            descriptor.frame_rate = still_rate;
            descriptor.frame_count = None;
        }
    }

    Ok(())
}

/// Probe, plan and compile `job` without encoding.
pub fn prepare(
    job: &CompositionJob,
    prober: &dyn MediaProber,
) -> VidstackResult<CompiledComposition> {
    if job.sources.is_empty() {
        return Err(VidstackError::invalid_input("Composition has no inputs"));
    }

    let started = Instant::now();
    let paths: Vec<PathBuf> = job.sources.iter().map(|s| s.path.clone()).collect();
    let mut descriptors = probe_all(prober, &paths)?;
    tracing::info!(
        inputs = descriptors.len(),
        probe_ms = started.elapsed().as_millis(),
        "Inputs probed"
    );

    resolve_stills(&job.sources, &mut descriptors, &job.output)?;

    let plan = plan(&descriptors, job.output.fps)?;
    let chain = FilterGraphCompiler::new(job.style.clone())
        .with_pad_mode(job.output.pad_mode)
        .compile(&job.sources, &descriptors, &plan)?;
    let filter_graph = chain.to_filter_graph()?;

    let inputs = job
        .sources
        .iter()
        .map(|source| {
            if source.is_still() {
                EncodeInput::still(&source.path, plan.canvas_duration)
            } else {
                EncodeInput::video(&source.path)
            }
        })
        .collect();

    let request = EncodeRequest {
        inputs,
        filter_graph: filter_graph.clone(),
        output_path: job.output_path.clone(),
        frame_rate: plan.output_frame_rate,
        duration_secs: plan.canvas_duration,
        total_frames: plan.total_frames(),
        settings: EncodeSettings::from_output(&job.output, &job.ffmpeg_binary),
    };

    tracing::info!(
        canvas_width = plan.canvas_width,
        canvas_height = plan.canvas_height,
        canvas_duration = plan.canvas_duration,
        output_frame_rate = plan.output_frame_rate,
        filter_len = filter_graph.len(),
        "Composition compiled"
    );

    Ok(CompiledComposition {
        plan,
        descriptors,
        chain,
        filter_graph,
        request,
    })
}

/// Run a composition.
///
/// Probing and encoding block, so they run on tokio's blocking pool.
pub async fn compose(
    job: CompositionJob,
    progress: Option<ProgressCallback>,
    cancel: CancelFlag,
) -> VidstackResult<ComposeOutcome> {
    tracing::info!(
        output = %job.output_path.display(),
        inputs = job.sources.len(),
        dry_run = job.dry_run,
        "Starting composition"
    );

    tokio::task::spawn_blocking(move || run_blocking(&job, progress, &cancel))
        .await
        .map_err(|e| VidstackError::Other(anyhow::anyhow!("Composition task failed: {e}")))?
}

fn run_blocking(
    job: &CompositionJob,
    progress: Option<ProgressCallback>,
    cancel: &CancelFlag,
) -> VidstackResult<ComposeOutcome> {
    let started = Instant::now();
    let prober = FfprobeProber::new(&job.ffprobe_binary);
    let compiled = prepare(job, &prober)?;

    if job.debug_report {
        compiled.write_debug_report();
    }

    if job.dry_run {
        return Ok(ComposeOutcome {
            compiled,
            output_path: None,
        });
    }

    let mut encoder = FfmpegEncoder::new();
    let output_path = encoder.run(&compiled.request, progress, cancel)?;

    tracing::info!(
        elapsed_secs = started.elapsed().as_secs_f64(),
        output = %output_path.display(),
        "Composition finished"
    );

    Ok(ComposeOutcome {
        compiled,
        output_path: Some(output_path),
    })
}
