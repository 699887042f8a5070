//! Encoder progress parsing.
//!
//! Understands both the key/value blocks written by `-progress pipe:1` and the classic
//! single-line stats the encoder prints to stderr
//! (`frame=  240 fps= 60 q=28.0 size=  1024kB time=00:00:08.00 bitrate=1048.6kbits/s speed=2.01x`).

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EncodeProgress {
    pub frame: u64,
    pub fps: f64,
    /// Media time processed so far, in seconds.
    pub out_time_secs: f64,
    /// Encode speed as a multiple of real time.
    pub speed: Option<f64>,
    /// Percentage of the expected duration, when known.
    pub percent: Option<f64>,
    pub done: bool,
}

#[derive(Debug, Default)]
pub struct ProgressParser {
    expected_duration: Option<f64>,
    current: EncodeProgress,
}

/// Parse `HH:MM:SS.frac` into seconds.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.trim().split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn parse_speed(value: &str) -> Option<f64> {
    value.trim().trim_end_matches('x').parse().ok()
}

impl ProgressParser {
    pub fn new(expected_duration: Option<f64>) -> Self {
        Self {
            expected_duration: expected_duration.filter(|d| *d > 0.0),
            current: EncodeProgress::default(),
        }
    }

    /// Feed one output line. Returns a snapshot whenever a complete report is available.
    pub fn feed(&mut self, line: &str) -> Option<EncodeProgress> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if line.contains(' ') && line.starts_with("frame=") {
            return self.feed_stats_line(line);
        }

        let (key, value) = line.split_once('=')?;
        self.apply(key.trim(), value.trim());
        if key.trim() == "progress" {
            self.current.done = value.trim() == "end";
            return Some(self.snapshot());
        }
        None
    }

    fn feed_stats_line(&mut self, line: &str) -> Option<EncodeProgress> {
        // "fps= 60" -> "fps=60" so every field is one whitespace-separated token
        let mut tokens: Vec<String> = Vec::new();
        for token in line.split_whitespace() {
            match tokens.last_mut() {
                Some(last) if last.ends_with('=') => last.push_str(token),
                _ => tokens.push(token.to_string()),
            }
        }

        let mut saw_time = false;
        for token in &tokens {
            if let Some((key, value)) = token.split_once('=') {
                if key == "time" {
                    saw_time = true;
                }
                self.apply(key, value);
            }
        }
        saw_time.then(|| self.snapshot())
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.current.frame = frame;
                }
            }
            "fps" => {
                if let Ok(fps) = value.parse() {
                    self.current.fps = fps;
                }
            }
            // Both are microseconds despite the name.
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<u64>() {
                    self.current.out_time_secs = us as f64 / 1_000_000.0;
                }
            }
            "out_time" | "time" => {
                if let Some(secs) = parse_timestamp(value) {
                    self.current.out_time_secs = secs;
                }
            }
            "speed" => self.current.speed = parse_speed(value),
            _ => {}
        }
    }

    fn snapshot(&self) -> EncodeProgress {
        let mut progress = self.current.clone();
        progress.percent = self
            .expected_duration
            .map(|total| (progress.out_time_secs / total * 100.0).clamp(0.0, 100.0));
        if progress.done {
            progress.percent = progress.percent.map(|_| 100.0);
        }
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_pipe_block() {
        let mut parser = ProgressParser::new(Some(10.0));
        let block = [
            "frame=120",
            "fps=59.94",
            "out_time_us=5000000",
            "out_time=00:00:05.000000",
            "speed=2.5x",
        ];
        for line in block {
            assert!(parser.feed(line).is_none());
        }
        let progress = parser.feed("progress=continue").unwrap();
        assert_eq!(progress.frame, 120);
        assert_eq!(progress.out_time_secs, 5.0);
        assert_eq!(progress.speed, Some(2.5));
        assert_eq!(progress.percent, Some(50.0));
        assert!(!progress.done);

        let done = parser.feed("progress=end").unwrap();
        assert!(done.done);
        assert_eq!(done.percent, Some(100.0));
    }

    #[test]
    fn test_stats_line() {
        let mut parser = ProgressParser::new(None);
        let progress = parser
            .feed("frame=  240 fps= 60 q=28.0 size=    1024kB time=00:00:08.00 bitrate=1048.6kbits/s speed=2.01x")
            .unwrap();
        assert_eq!(progress.frame, 240);
        assert_eq!(progress.fps, 60.0);
        assert_eq!(progress.out_time_secs, 8.0);
        assert_eq!(progress.speed, Some(2.01));
        assert_eq!(progress.percent, None);
    }

    #[test]
    fn test_unavailable_speed_and_noise() {
        let mut parser = ProgressParser::new(Some(4.0));
        assert!(parser.feed("Stream mapping:").is_none());
        parser.feed("speed=N/A");
        let progress = parser.feed("progress=continue").unwrap();
        assert_eq!(progress.speed, None);
        assert_eq!(progress.percent, Some(0.0));
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("01:02:03.5"), Some(3723.5));
        assert_eq!(parse_timestamp("garbage"), None);
    }
}
