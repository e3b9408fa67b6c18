//! Parsing of FFmpeg `-progress` output.

use serde::{Deserialize, Serialize};

/// Snapshot of an encode in progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Frames written so far
    pub frame: u64,
    /// Output position in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    /// Set once FFmpeg reports `progress=end`
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Percentage done against an expected output length.
    pub fn percentage(&self, total_ms: i64) -> f64 {
        if total_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_ms as f64) * 100.0).clamp(0.0, 100.0)
    }
}

/// Feed one `key=value` line into `current`.
///
/// FFmpeg ends every report block with a `progress=` line, which is when a
/// complete snapshot is returned.
pub fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;

    match key {
        // Despite the name, out_time_ms is reported in microseconds too
        "out_time_us" | "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            current.is_complete = value == "end";
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_block() {
        let mut progress = FfmpegProgress::default();

        assert!(parse_progress_line("frame=36", &mut progress).is_none());
        parse_progress_line("out_time_us=2400000", &mut progress);
        parse_progress_line("speed= 1.5x", &mut progress);
        parse_progress_line("speed=N/A", &mut progress);

        let snapshot = parse_progress_line("progress=continue", &mut progress).unwrap();
        assert_eq!(snapshot.frame, 36);
        assert_eq!(snapshot.out_time_ms, 2400);
        assert!((snapshot.speed - 1.5).abs() < 0.01);
        assert!(!snapshot.is_complete);

        let done = parse_progress_line("progress=end", &mut progress).unwrap();
        assert!(done.is_complete);
    }

    #[test]
    fn test_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 1200,
            ..Default::default()
        };
        assert!((progress.percentage(2400) - 50.0).abs() < 0.01);
        assert_eq!(progress.percentage(0), 0.0);
        assert_eq!(progress.percentage(600), 100.0);
    }
}
