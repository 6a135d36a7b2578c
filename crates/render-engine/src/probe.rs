//! Media probing via ffprobe.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;

use vidstack_common::error::{VidstackError, VidstackResult};
use vidstack_project_model::media::MediaDescriptor;

/// Frame rate assumed when a stream reports `0/0` or nothing usable.
pub const FALLBACK_FRAME_RATE: f64 = 30.0;

/// Reads dimensions, duration and frame rate of a media file.
pub trait MediaProber: Send + Sync {
    fn probe(&self, path: &Path) -> VidstackResult<MediaDescriptor>;
}

/// Prober backed by the `ffprobe` executable.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    binary: PathBuf,
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl FfprobeProber {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl MediaProber for FfprobeProber {
    fn probe(&self, path: &Path) -> VidstackResult<MediaDescriptor> {
        if !path.exists() {
            return Err(VidstackError::probe(path, "file does not exist"));
        }

        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .output()
            .map_err(|e| {
                VidstackError::probe(
                    path,
                    format!("failed to run {}: {e}", self.binary.display()),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(VidstackError::probe(path, stderr.trim().to_string()));
        }

        let descriptor = parse_probe_output(path, &output.stdout)?;
        tracing::debug!(
            path = %path.display(),
            width = descriptor.width,
            height = descriptor.height,
            duration = descriptor.duration,
            frame_rate = descriptor.frame_rate,
            "Probed media"
        );
        Ok(descriptor)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    #[serde(default)]
    codec_type: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    r_frame_rate: Option<String>,
    #[serde(default)]
    duration: Option<String>,
    #[serde(default)]
    nb_frames: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    #[serde(default)]
    duration: Option<String>,
}

/// Parse `ffprobe -print_format json` output for `path`.
///
/// Missing durations come back as `0.0`; stills usually have none.
pub fn parse_probe_output(path: &Path, json: &[u8]) -> VidstackResult<MediaDescriptor> {
    let probe: ProbeOutput = serde_json::from_slice(json)
        .map_err(|e| VidstackError::probe(path, format!("unreadable ffprobe output: {e}")))?;

    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| VidstackError::probe(path, "no video stream found"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(VidstackError::probe(path, "video stream has no dimensions")),
    };

    let frame_rate = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_rational)
        .unwrap_or(FALLBACK_FRAME_RATE);

    let duration = parse_seconds(stream.duration.as_deref())
        .or_else(|| parse_seconds(probe.format.as_ref().and_then(|f| f.duration.as_deref())))
        .unwrap_or(0.0);

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.trim().parse::<u64>().ok())
        .filter(|n| *n > 0);

    Ok(MediaDescriptor {
        width,
        height,
        duration,
        frame_rate,
        frame_count,
    })
}

/// Parse an ffprobe rate such as `30000/1001`. A zero denominator means
/// the rate is unknown.
pub fn parse_rational(value: &str) -> Option<f64> {
    let (num, den) = match value.trim().split_once('/') {
        Some((num, den)) => (num.trim().parse::<f64>().ok()?, den.trim().parse::<f64>().ok()?),
        None => (value.trim().parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 {
        return None;
    }
    let rate = num / den;
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

fn parse_seconds(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Probe every path concurrently; results keep the order of `paths`.
pub fn probe_all(
    prober: &dyn MediaProber,
    paths: &[PathBuf],
) -> VidstackResult<Vec<MediaDescriptor>> {
    let results: Vec<VidstackResult<MediaDescriptor>> = std::thread::scope(|scope| {
        let handles: Vec<_> = paths
            .iter()
            .map(|path| scope.spawn(move || prober.probe(path)))
            .collect();

        handles
            .into_iter()
            .zip(paths)
            .map(|(handle, path)| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(VidstackError::probe(path, "probe thread panicked")))
            })
            .collect()
    });

    results.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const LANDSCAPE: &str = r#"{
        "streams": [
            {"codec_type": "audio", "sample_rate": "48000"},
            {"codec_type": "video", "width": 1920, "height": 1080,
             "r_frame_rate": "30000/1001", "duration": "10.010000", "nb_frames": "300"}
        ],
        "format": {"duration": "10.050000"}
    }"#;

    #[test]
    fn test_parse_video_stream() {
        let d = parse_probe_output(Path::new("a.mp4"), LANDSCAPE.as_bytes()).unwrap();
        assert_eq!((d.width, d.height), (1920, 1080));
        assert!((d.frame_rate - 29.97002997).abs() < 1e-6);
        assert!((d.duration - 10.01).abs() < 1e-9);
        assert_eq!(d.frame_count, Some(300));
    }

    #[test]
    fn test_duration_falls_back_to_format() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 1280, "height": 720, "r_frame_rate": "0/0"}],
            "format": {"duration": "6.5"}
        }"#;
        let d = parse_probe_output(Path::new("b.mkv"), json.as_bytes()).unwrap();
        assert!((d.duration - 6.5).abs() < 1e-9);
        assert!((d.frame_rate - FALLBACK_FRAME_RATE).abs() < 1e-9);
        assert_eq!(d.frame_count, None);
    }

    #[test]
    fn test_still_without_duration() {
        let json = r#"{"streams": [{"codec_type": "video", "width": 800, "height": 600, "r_frame_rate": "25/1"}]}"#;
        let d = parse_probe_output(Path::new("c.png"), json.as_bytes()).unwrap();
        assert_eq!(d.duration, 0.0);
        assert!((d.frame_rate - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_video_stream_is_probe_error() {
        let json = r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#;
        let err = parse_probe_output(Path::new("song.mp3"), json.as_bytes()).unwrap_err();
        assert!(matches!(err, VidstackError::Probe { .. }));
        assert!(err.to_string().contains("song.mp3"));

        assert!(parse_probe_output(Path::new("x"), b"not json").is_err());
    }

    #[test]
    fn test_parse_rational() {
        assert_eq!(parse_rational("30/1"), Some(30.0));
        assert_eq!(parse_rational("25"), Some(25.0));
        assert_eq!(parse_rational("0/0"), None);
        assert_eq!(parse_rational("abc"), None);
    }

    struct TableProber(HashMap<PathBuf, MediaDescriptor>);

    impl MediaProber for TableProber {
        fn probe(&self, path: &Path) -> VidstackResult<MediaDescriptor> {
            self.0
                .get(path)
                .copied()
                .ok_or_else(|| VidstackError::probe(path, "unknown"))
        }
    }

    #[test]
    fn test_probe_all_keeps_order_and_fails_whole() {
        let mut table = HashMap::new();
        for (idx, name) in ["a", "b", "c", "d"].iter().enumerate() {
            table.insert(
                PathBuf::from(name),
                MediaDescriptor::new(100 * (idx as u32 + 1), 100, 1.0, 30.0),
            );
        }
        let prober = TableProber(table);

        let paths: Vec<PathBuf> = ["c", "a", "d", "b"].iter().map(PathBuf::from).collect();
        let widths: Vec<u32> = probe_all(&prober, &paths)
            .unwrap()
            .iter()
            .map(|d| d.width)
            .collect();
        assert_eq!(widths, vec![300, 100, 400, 200]);

        let with_missing = vec![PathBuf::from("a"), PathBuf::from("zzz")];
        assert!(matches!(
            probe_all(&prober, &with_missing),
            Err(VidstackError::Probe { .. })
        ));
    }

    #[test]
    fn test_ffprobe_missing_file() {
        let prober = FfprobeProber::default();
        assert!(matches!(
            prober.probe(Path::new("/definitely/not/here.mp4")),
            Err(VidstackError::Probe { .. })
        ));
    }
}
