use std::fs::File;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use super::types::{OcrEngine, OcrPageResult};
use super::ExtractionError;

/// Page segmentation mode 4: a single column of text of variable sizes.
/// Suits till receipts, which are one narrow column of lines.
const TESSERACT_PSM: &str = "4";
/// OCR engine mode 3: default (LSTM when available).
const TESSERACT_OEM: &str = "3";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Tesseract invoked as an external process.
///
/// Input is written to a scratch directory. Recognised text is read back
/// from `<base>.txt` and diagnostics from a `stderr.log` file there, so no
/// pipe can fill up while the process runs.
pub struct TesseractCli {
    command: PathBuf,
    language: String,
    timeout: Duration,
}

impl TesseractCli {
    pub fn new(command: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            language: "spa".to_string(),
            timeout,
        }
    }

    /// Set language(s) for OCR (e.g., "spa", "spa+eng")
    pub fn with_languages(mut self, langs: &str) -> Self {
        self.language = langs.to_string();
        self
    }

    /// Confirm the executable can be launched at all.
    pub fn probe(&self) -> Result<String, ExtractionError> {
        let output = Command::new(&self.command)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;
        let banner = String::from_utf8_lossy(&output.stdout);
        let banner = if banner.trim().is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            banner.into_owned()
        };
        Ok(banner.lines().next().unwrap_or_default().trim().to_string())
    }

    fn spawn_error(&self, e: std::io::Error) -> ExtractionError {
        if e.kind() == ErrorKind::NotFound {
            ExtractionError::OcrInit(format!(
                "tesseract executable not found: {}",
                self.command.display()
            ))
        } else {
            ExtractionError::OcrInit(format!("failed to launch tesseract: {e}"))
        }
    }
}

impl OcrEngine for TesseractCli {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let scratch = tempfile::tempdir()?;
        let input = scratch.path().join("page.png");
        let out_base = scratch.path().join("page");
        let stderr_log = scratch.path().join("stderr.log");
        std::fs::write(&input, image_bytes)?;

        let mut child = Command::new(&self.command)
            .arg(&input)
            .arg(&out_base)
            .args(["-l", self.language.as_str(), "--oem", TESSERACT_OEM, "--psm", TESSERACT_PSM])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(File::create(&stderr_log)?)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Tesseract exceeded time limit, process killed"
                );
                return Err(ExtractionError::OcrTimeout(self.timeout.as_secs()));
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            let stderr = std::fs::read_to_string(&stderr_log).unwrap_or_default();
            return Err(ExtractionError::OcrProcessing(format!(
                "tesseract exited with {status}: {}",
                stderr.trim()
            )));
        }

        let text = std::fs::read_to_string(out_base.with_extension("txt"))?;
        Ok(OcrPageResult { text })
    }
}

/// Mock OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    pub text: String,
    pub fail_with: Option<String>,
    calls: AtomicUsize,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            text: String::new(),
            fail_with: Some(reason.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.fail_with {
            return Err(ExtractionError::OcrProcessing(reason.clone()));
        }
        Ok(OcrPageResult {
            text: self.text.clone(),
        })
    }
}
