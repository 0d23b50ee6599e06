//! OCR engine seam
//!
//! Extraction only sees [`OcrEngine`]. The bundled [`TesseractEngine`] shells
//! out to the `tesseract` CLI and parses its TSV output; tests script their
//! own engine.

use image::GrayImage;

use crate::Result;

/// Tesseract page segmentation modes used by the extractors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageSegMode {
    /// Uniform block of text
    Block,
    SingleLine,
    SingleWord,
    SingleChar,
}

impl PageSegMode {
    /// Value passed to `--psm`
    pub fn as_arg(self) -> &'static str {
        match self {
            PageSegMode::Block => "6",
            PageSegMode::SingleLine => "7",
            PageSegMode::SingleWord => "8",
            PageSegMode::SingleChar => "10",
        }
    }
}

/// A recognised word and its confidence (0 - 100)
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
}

impl OcrWord {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Everything an engine recognised in one image
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrOutput {
    pub words: Vec<OcrWord>,
}

impl OcrOutput {
    pub fn new(words: Vec<OcrWord>) -> Self {
        Self { words }
    }

    /// Single-word output, handy for scripted engines
    pub fn word(text: impl Into<String>, confidence: f32) -> Self {
        Self::new(vec![OcrWord::new(text, confidence)])
    }

    /// Words joined by spaces
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Character-weighted mean confidence (0 - 100), 0 when nothing was read
    pub fn mean_confidence(&self) -> f32 {
        let (weighted, chars) = self.words.iter().fold((0.0f32, 0usize), |(sum, n), w| {
            let len = w.text.chars().count();
            (sum + w.confidence.max(0.0) * len as f32, n + len)
        });
        if chars == 0 {
            0.0
        } else {
            weighted / chars as f32
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| w.text.trim().is_empty())
    }
}

/// Text recognition over a preprocessed binary image
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &GrayImage, mode: PageSegMode) -> Result<OcrOutput>;
}

/// Parse Tesseract TSV output into words.
///
/// Only word rows (level 5) with a non-negative confidence and non-empty text
/// are kept.
pub fn parse_tsv(tsv: &str) -> OcrOutput {
    let mut words = Vec::new();
    for line in tsv.lines().skip(1) {
        // level, page, block, par, line, word, left, top, width, height, conf, text
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }
        let level: i32 = fields[0].parse().unwrap_or(-1);
        let conf: f32 = fields[10].trim().parse().unwrap_or(-1.0);
        let text = fields[11].trim();
        if level != 5 || conf < 0.0 || text.is_empty() {
            continue;
        }
        words.push(OcrWord::new(text, conf.min(100.0)));
    }
    OcrOutput::new(words)
}

#[cfg(feature = "tesseract")]
pub use self::tesseract::TesseractEngine;

#[cfg(feature = "tesseract")]
mod tesseract {
    use image::GrayImage;
    use std::process::Command;
    use tempfile::NamedTempFile;

    use super::{parse_tsv, OcrEngine, OcrOutput, PageSegMode};
    use crate::vision::config::OcrConfig;
    use crate::{Error, Result};

    /// Runs the `tesseract` executable once per request
    #[derive(Debug, Clone)]
    pub struct TesseractEngine {
        config: OcrConfig,
    }

    impl TesseractEngine {
        pub fn new(config: OcrConfig) -> Self {
            Self { config }
        }
    }

    impl OcrEngine for TesseractEngine {
        fn recognize(&self, image: &GrayImage, mode: PageSegMode) -> Result<OcrOutput> {
            let input = NamedTempFile::with_suffix(".png")?;
            image
                .save(input.path())
                .map_err(|e| Error::Ocr(format!("failed to write OCR input: {}", e)))?;

            // Tesseract appends .tsv to the output base
            let output_file = NamedTempFile::new()?;
            let output_base = output_file.path().to_string_lossy().to_string();

            let mut command = Command::new(&self.config.tesseract_path);
            command
                .arg(input.path())
                .arg(&output_base)
                .arg("--psm")
                .arg(mode.as_arg())
                .arg("-l")
                .arg(&self.config.language);
            if let Some(dir) = &self.config.tessdata_dir {
                command.arg("--tessdata-dir").arg(dir);
            }
            command.arg("tsv");

            let output = command
                .output()
                .map_err(|e| Error::Ocr(format!("failed to run tesseract: {}", e)))?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(Error::Ocr(format!("tesseract failed: {}", stderr.trim())));
            }

            let tsv_path = format!("{}.tsv", output_base);
            let tsv = std::fs::read_to_string(&tsv_path)
                .map_err(|e| Error::Ocr(format!("failed to read tesseract output: {}", e)))?;
            let _ = std::fs::remove_file(&tsv_path);

            Ok(parse_tsv(&tsv))
        }
    }
}
