//! External-process conversion through ffmpeg and LibreOffice.
//!
//! Each conversion gets its own scratch directory holding the input file
//! and whatever the tool writes next to it. The directory is removed when
//! the conversion returns.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;
use tracing::{debug, error, info};

use convhub_core::config::ConvertersConfig;
use convhub_core::traits::{Converter, ConverterError};
use convhub_core::types::{ConversionOptions, Format};
use convhub_formats::{Category, FormatCatalog};

/// Maximum number of stderr characters kept in an error.
const STDERR_TAIL: usize = 2000;

/// Which external tool handles a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tool {
    Ffmpeg,
    Office,
}

/// Converter that shells out to ffmpeg (audio, video, video → gif) and
/// LibreOffice (office documents, document ↔ image via PDF export).
#[derive(Debug, Clone)]
pub struct ProcessConverter {
    ffmpeg_path: String,
    office_path: String,
    temp_dir: PathBuf,
    timeout: Duration,
    catalog: FormatCatalog,
}

impl ProcessConverter {
    /// Create a converter from configuration.
    pub fn new(config: &ConvertersConfig, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            office_path: config.office_path.clone(),
            temp_dir: config
                .temp_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            timeout,
            catalog: FormatCatalog,
        }
    }

    fn tool_for(&self, source: &Format, target: &Format) -> Option<Tool> {
        let src = self.catalog.category_of(source)?;
        let dst = self.catalog.category_of(target)?;
        let office = |c: Category| {
            matches!(
                c,
                Category::Document | Category::Spreadsheet | Category::Presentation
            )
        };
        match (src, dst) {
            (Category::Audio, Category::Audio)
            | (Category::Video, Category::Video)
            | (Category::Video, Category::Audio) => Some(Tool::Ffmpeg),
            (Category::Video, Category::Image) if target.as_str() == "gif" => Some(Tool::Ffmpeg),
            (s, d) if office(s) && (office(d) || d == Category::Image) => Some(Tool::Office),
            (Category::Image, Category::Document) if target.as_str() == "pdf" => Some(Tool::Office),
            _ => None,
        }
    }

    fn ffmpeg_args(
        &self,
        source: &Format,
        target: &Format,
        input: &Path,
        output: &Path,
    ) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error", "-i"]
            .into_iter()
            .map(String::from)
            .collect();
        args.push(input.to_string_lossy().into_owned());

        let target_category = self.catalog.category_of(target);
        if self.catalog.category_of(source) == Some(Category::Video)
            && target_category == Some(Category::Audio)
        {
            args.push("-vn".into());
        }
        if target.as_str() == "gif" {
            args.extend(["-vf", "fps=10,scale=480:-1:flags=lanczos"].map(String::from));
        }
        match target.as_str() {
            "mp3" => args.extend(["-q:a", "0"].map(String::from)),
            "flac" => args.extend(["-compression_level", "8"].map(String::from)),
            "ogg" => args.extend(["-q:a", "6"].map(String::from)),
            _ => {}
        }
        args.push(output.to_string_lossy().into_owned());
        args
    }

    fn office_args(&self, target: &Format, input: &Path, outdir: &Path) -> Vec<String> {
        vec![
            "--headless".into(),
            "--convert-to".into(),
            target.as_str().to_string(),
            "--outdir".into(),
            outdir.to_string_lossy().into_owned(),
            input.to_string_lossy().into_owned(),
        ]
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<(), ConverterError> {
        let start = Instant::now();
        debug!(program, ?args, "Running converter process");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConverterError::ToolUnavailable(program.to_string()));
            }
            Ok(Err(e)) => return Err(ConverterError::Io(e)),
            Err(_) => {
                error!(program, timeout_secs = self.timeout.as_secs(), "Converter process timed out");
                return Err(ConverterError::Timeout(self.timeout.as_secs()));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .chars()
                .rev()
                .take(STDERR_TAIL)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            return Err(ConverterError::ProcessFailed {
                tool: program.to_string(),
                status: output.status.code().unwrap_or(-1),
                stderr: tail,
            });
        }

        info!(
            program,
            duration_ms = start.elapsed().as_millis() as u64,
            "Converter process finished"
        );
        Ok(())
    }
}

#[async_trait]
impl Converter for ProcessConverter {
    fn name(&self) -> &str {
        "process"
    }

    fn supports(&self, source: &Format, target: &Format) -> bool {
        self.tool_for(source, target).is_some()
    }

    async fn convert(
        &self,
        source: &Format,
        target: &Format,
        input: Bytes,
        _options: &ConversionOptions,
    ) -> Result<Bytes, ConverterError> {
        let tool = self.tool_for(source, target).ok_or_else(|| {
            ConverterError::Unsupported(format!("no external tool converts {source} to {target}"))
        })?;

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("convhub-")
            .tempdir_in(&self.temp_dir)?;
        let input_path = scratch.path().join(format!("input.{source}"));
        tokio::fs::write(&input_path, &input).await?;

        let output_path = match tool {
            Tool::Ffmpeg => {
                let output_path = scratch.path().join(format!("output.{target}"));
                let args = self.ffmpeg_args(source, target, &input_path, &output_path);
                self.run(&self.ffmpeg_path, &args).await?;
                output_path
            }
            Tool::Office => {
                let outdir = scratch.path().join("out");
                tokio::fs::create_dir_all(&outdir).await?;
                let args = self.office_args(target, &input_path, &outdir);
                self.run(&self.office_path, &args).await?;
                outdir.join(format!("input.{target}"))
            }
        };

        match tokio::fs::read(&output_path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConverterError::ProcessFailed {
                    tool: match tool {
                        Tool::Ffmpeg => self.ffmpeg_path.clone(),
                        Tool::Office => self.office_path.clone(),
                    },
                    status: 0,
                    stderr: "no output file produced".to_string(),
                })
            }
            Err(e) => Err(ConverterError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(name: &str) -> Format {
        Format::parse(name).unwrap()
    }

    fn converter(config: ConvertersConfig) -> ProcessConverter {
        ProcessConverter::new(&config, Duration::from_secs(5))
    }

    #[test]
    fn test_tool_selection() {
        let c = converter(ConvertersConfig::default());
        assert_eq!(c.tool_for(&fmt("mp3"), &fmt("wav")), Some(Tool::Ffmpeg));
        assert_eq!(c.tool_for(&fmt("mp4"), &fmt("mp3")), Some(Tool::Ffmpeg));
        assert_eq!(c.tool_for(&fmt("mp4"), &fmt("gif")), Some(Tool::Ffmpeg));
        assert_eq!(c.tool_for(&fmt("mp4"), &fmt("png")), None);
        assert_eq!(c.tool_for(&fmt("docx"), &fmt("pdf")), Some(Tool::Office));
        assert_eq!(c.tool_for(&fmt("pdf"), &fmt("png")), Some(Tool::Office));
        assert_eq!(c.tool_for(&fmt("png"), &fmt("pdf")), Some(Tool::Office));
        assert_eq!(c.tool_for(&fmt("mp3"), &fmt("mp4")), None);
        assert_eq!(c.tool_for(&fmt("png"), &fmt("jpg")), None);
    }

    #[test]
    fn test_video_to_audio_drops_video_stream() {
        let c = converter(ConvertersConfig::default());
        let args = c.ffmpeg_args(
            &fmt("mp4"),
            &fmt("mp3"),
            Path::new("/tmp/in.mp4"),
            Path::new("/tmp/out.mp3"),
        );
        assert!(args.contains(&"-vn".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/tmp/out.mp3"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let c = converter(ConvertersConfig {
            ffmpeg_path: "/nonexistent/convhub-ffmpeg".to_string(),
            office_path: "soffice".to_string(),
            temp_dir: Some(dir.path().to_string_lossy().into_owned()),
        });
        let err = c
            .convert(
                &fmt("wav"),
                &fmt("mp3"),
                Bytes::from_static(b"RIFF"),
                &ConversionOptions::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::ToolUnavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_process_failed() {
        let dir = tempfile::tempdir().unwrap();
        let c = converter(ConvertersConfig {
            ffmpeg_path: "false".to_string(),
            office_path: "soffice".to_string(),
            temp_dir: Some(dir.path().to_string_lossy().into_owned()),
        });
        let err = c
            .convert(
                &fmt("wav"),
                &fmt("mp3"),
                Bytes::from_static(b"RIFF"),
                &ConversionOptions::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConverterError::ProcessFailed { status: 1, .. }));
    }
}
