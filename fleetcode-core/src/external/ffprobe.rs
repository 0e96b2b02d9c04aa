//! ffprobe adapter.

use std::path::Path;

use super::Prober;
use super::command::run_command;
use crate::error::{CoreError, CoreResult};
use crate::media::{StreamDescriptor, parse_streams};

/// Runs the `ffprobe` executable.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    program: String,
}

impl FfprobeProber {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn probe(&self, path: &Path, args: &[&str]) -> CoreResult<String> {
        let mut full: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        full.push(path.to_string_lossy().into_owned());
        run_command(&self.program, &full)
            .map(|out| out.stdout)
            .map_err(|e| probe_error(path, e))
    }
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_FFPROBE)
    }
}

fn probe_error(path: &Path, err: impl ToString) -> CoreError {
    CoreError::Probe {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

impl Prober for FfprobeProber {
    fn streams(&self, path: &Path) -> CoreResult<Vec<StreamDescriptor>> {
        let out = self.probe(path, &["-v", "quiet", "-print_format", "json", "-show_streams"])?;
        parse_streams(&out).map_err(|e| probe_error(path, e))
    }

    fn duration(&self, path: &Path) -> CoreResult<f64> {
        let out = self.probe(
            path,
            &[
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ],
        )?;
        parse_first_line(&out).ok_or_else(|| probe_error(path, format!("bad duration {out:?}")))
    }

    fn frame_count(&self, path: &Path) -> CoreResult<u64> {
        let out = self.probe(
            path,
            &[
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-count_packets",
                "-show_entries",
                "stream=nb_read_packets",
                "-of",
                "csv=p=0",
            ],
        )?;
        parse_first_line(&out).ok_or_else(|| probe_error(path, format!("bad frame count {out:?}")))
    }
}

fn parse_first_line<T: std::str::FromStr>(out: &str) -> Option<T> {
    out.lines()
        .map(|line| line.trim().trim_end_matches(','))
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse().ok())
}
