//! Conversion collaborator: source document bytes to PDF bytes
//!
//! The core only records whether a conversion succeeded and where its output
//! went. What actually renders the document is pluggable.

use crate::error::{Error, Result};
use std::io::Write;
use std::process::{Command, Stdio};

pub trait Converter: Send + Sync {
    fn convert(&self, source: &[u8]) -> Result<Vec<u8>>;
}

impl<F> Converter for F
where
    F: Fn(&[u8]) -> Result<Vec<u8>> + Send + Sync,
{
    fn convert(&self, source: &[u8]) -> Result<Vec<u8>> {
        self(source)
    }
}

/// Accepts sources that are already PDF and returns them unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughConverter;

impl Converter for PassthroughConverter {
    fn convert(&self, source: &[u8]) -> Result<Vec<u8>> {
        if !infer::archive::is_pdf(source) {
            return Err(Error::Conversion(
                "source is not a PDF and no conversion command is configured".to_string(),
            ));
        }
        Ok(source.to_vec())
    }
}

/// Runs an external program that reads the source on stdin and writes PDF to stdout
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Build from an argv-style list such as `["rsvg-convert", "-f", "pdf"]`
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| Error::Config("conversion command must not be empty".to_string()))?;
        Ok(Self::new(program.clone(), args.to_vec()))
    }
}

impl Converter for CommandConverter {
    fn convert(&self, source: &[u8]) -> Result<Vec<u8>> {
        tracing::debug!("Running converter: {} {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Conversion(format!("failed to start {}: {e}", self.program)))?;

        // Feed stdin from a separate thread so a converter that streams its
        // output before reading all input cannot deadlock on a full pipe
        let stdin = child.stdin.take();
        let input = source.to_vec();
        let feeder = std::thread::spawn(move || -> std::io::Result<()> {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&input)?;
            }
            Ok(())
        });

        let output = child
            .wait_with_output()
            .map_err(|e| Error::Conversion(format!("{} did not finish: {e}", self.program)))?;
        let fed = feeder
            .join()
            .map_err(|_| Error::Conversion("stdin writer panicked".to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Conversion(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        if let Err(e) = fed {
            return Err(Error::Conversion(format!(
                "failed to write source to {}: {e}",
                self.program
            )));
        }
        if output.stdout.is_empty() {
            return Err(Error::Conversion(format!(
                "{} produced no output",
                self.program
            )));
        }
        Ok(output.stdout)
    }
}
