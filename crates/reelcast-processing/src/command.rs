//! Encoder command builder.
//!
//! A command is the argument list for one encoder invocation plus the file it writes.
//! Global flags (overwrite, progress reporting) are added by the runner, not here.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegCommand {
    operation: &'static str,
    args: Vec<String>,
    inputs: Vec<PathBuf>,
    output: PathBuf,
    expected_duration: Option<f64>,
}

impl FfmpegCommand {
    pub fn new(operation: &'static str, output: impl Into<PathBuf>) -> Self {
        Self {
            operation,
            args: Vec::new(),
            inputs: Vec::new(),
            output: output.into(),
            expected_duration: None,
        }
    }

    /// Add a file input (`-i path`).
    pub fn input(mut self, path: &Path) -> Self {
        self.args.push("-i".to_string());
        self.args.push(path.to_string_lossy().into_owned());
        self.inputs.push(path.to_path_buf());
        self
    }

    /// Add a lavfi source such as `color=c=black:s=1280x720:d=3`.
    pub fn lavfi_input(mut self, source: impl Into<String>) -> Self {
        self.args.extend(["-f".to_string(), "lavfi".to_string(), "-i".to_string()]);
        self.args.push(source.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Expected output duration, used to report progress as a percentage.
    pub fn with_expected_duration(mut self, secs: f64) -> Self {
        self.expected_duration = Some(secs);
        self
    }

    pub fn expected_duration(&self) -> Option<f64> {
        self.expected_duration
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Arguments without the trailing output path.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }

    /// Value following `flag`, if present.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}
