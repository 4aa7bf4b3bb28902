use super::{ConversionError, ConverterAdapter, ensure_output_size, single_input};
use crate::config::ConverterConfig;
use crate::models::ConversionJob;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, SystemTime};
use tokio::process::Command;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Minimum plausible size of an office-produced document
const MIN_OUTPUT_BYTES: u64 = 50;

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// What a finished office invocation left behind
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub exit_code: Option<i32>,
    pub stderr: String,
    /// Converted file found in the output directory, if any
    pub located_output: Option<PathBuf>,
}

/// Headless office suite driven as a subprocess
pub struct OfficeConverter {
    binary: String,
    timeout: Duration,
    profile_root: PathBuf,
}

impl OfficeConverter {
    pub fn new(binary: impl Into<String>, timeout: Duration, profile_root: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            profile_root: profile_root.into(),
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(
            config.office_binary.clone(),
            config.office_timeout(),
            config.office_profile_dir.clone(),
        )
    }

    /// Run one `--convert-to` invocation with an isolated profile directory.
    ///
    /// The profile directory is removed whatever the outcome. A non-zero exit
    /// status or an elapsed timeout is an error; a clean exit yields the
    /// outcome even if no output file could be located.
    pub async fn run(
        &self,
        input: &Path,
        format: &str,
        outdir: &Path,
    ) -> Result<ProcessOutcome, ConversionError> {
        let profile = self.profile_root.join(format!("profile-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&profile).await?;

        let result = self.invoke(input, format, outdir, &profile).await;

        if let Err(e) = tokio::fs::remove_dir_all(&profile).await {
            warn!("Failed to remove office profile {}: {}", profile.display(), e);
        }
        result
    }

    async fn invoke(
        &self,
        input: &Path,
        format: &str,
        outdir: &Path,
        profile: &Path,
    ) -> Result<ProcessOutcome, ConversionError> {
        // The child runs inside `outdir`, so relative paths would no longer resolve
        let input = tokio::fs::canonicalize(input).await?;
        let outdir = tokio::fs::canonicalize(outdir).await?;

        let mut command = Command::new(&self.binary);
        command
            .arg("--headless")
            .arg("--convert-to")
            .arg(format)
            .arg("--outdir")
            .arg(&outdir)
            .arg(&input)
            .env("HOME", profile)
            .env("TMPDIR", profile)
            .current_dir(&outdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!("Running {} --headless --convert-to {} for {}", self.binary, format, input.display());

        let child = command.spawn().map_err(|source| ConversionError::Launch {
            binary: self.binary.clone(),
            source,
        })?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                error!(
                    "❌ {} did not finish within {}s, killed",
                    self.binary,
                    self.timeout.as_secs()
                );
                return Err(ConversionError::Timeout {
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!("Office return code: {:?}", output.status.code());
        if !stdout.is_empty() {
            debug!("Office stdout: {}", stdout);
        }
        if !stderr.is_empty() {
            debug!("Office stderr: {}", stderr);
        }

        if !output.status.success() {
            return Err(ConversionError::ProcessFailed {
                status: output.status.to_string(),
                stderr: if stderr.is_empty() {
                    "Unknown error".to_string()
                } else {
                    stderr
                },
            });
        }

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = format.split(':').next().unwrap_or(format);
        let located_output = locate_output(&outdir, &stem, extension).await?;

        Ok(ProcessOutcome {
            exit_code: output.status.code(),
            stderr,
            located_output,
        })
    }

    /// `--version` output, or `None` when the binary cannot be run
    pub async fn version(&self) -> Option<String> {
        let probe = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(VERSION_PROBE_TIMEOUT, probe).await {
            Ok(Ok(output)) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                Some(version)
            }
            Ok(Ok(output)) => {
                warn!("{} --version exited with {}", self.binary, output.status);
                None
            }
            Ok(Err(e)) => {
                debug!("{} is not available: {}", self.binary, e);
                None
            }
            Err(_) => {
                warn!("{} --version timed out", self.binary);
                None
            }
        }
    }
}

/// Find the converted file for `stem` in `outdir`.
///
/// The expected `<stem>.<extension>` wins. Otherwise this is a best-effort
/// scan for names starting with `stem` whose extension matches
/// case-insensitively, most recently modified first.
async fn locate_output(
    outdir: &Path,
    stem: &str,
    extension: &str,
) -> Result<Option<PathBuf>, ConversionError> {
    let expected = outdir.join(format!("{}.{}", stem, extension));
    if tokio::fs::try_exists(&expected).await? {
        return Ok(Some(expected));
    }

    warn!(
        "Expected output {} not found, scanning {}",
        expected.display(),
        outdir.display()
    );

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    let mut entries = tokio::fs::read_dir(outdir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        let matches_extension = path
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension));
        if !name.starts_with(stem) || !matches_extension {
            continue;
        }

        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().is_none_or(|(time, _)| modified > *time) {
            newest = Some((modified, path));
        }
    }

    if let Some((_, path)) = &newest {
        info!("Using fallback output: {}", path.display());
    }
    Ok(newest.map(|(_, path)| path))
}

#[async_trait::async_trait]
impl ConverterAdapter for OfficeConverter {
    fn name(&self) -> &'static str {
        "office"
    }

    async fn convert(&self, job: &ConversionJob) -> Result<PathBuf, ConversionError> {
        let input = single_input(job)?;
        let outdir = job
            .output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let outcome = self.run(input, job.target.extension(), outdir).await?;
        let produced = match outcome.located_output {
            Some(path) => path,
            None => {
                error!("Office exited with {:?} but left no output", outcome.exit_code);
                return Err(ConversionError::MissingOutput(job.output.clone()));
            }
        };

        if produced.file_name() != job.output.file_name() {
            tokio::fs::rename(&produced, &job.output).await?;
        }
        ensure_output_size(&job.output, MIN_OUTPUT_BYTES)?;

        info!("✅ Office conversion successful: {}", job.output.display());
        Ok(job.output.clone())
    }

    async fn health_check(&self) -> bool {
        self.version().await.is_some()
    }
}
