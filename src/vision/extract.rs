//! Typed field extraction from preprocessed regions
//!
//! Every method returns a [`FieldReading`]. OCR faults and unreadable text
//! come back as zero-confidence readings, never as errors.

use image::{imageops, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use super::config::ExtractConfig;
use super::ocr::{OcrEngine, OcrOutput, PageSegMode};
use super::preprocess::Preprocessor;
use crate::core::{ActionLabel, ActionReading, Card, FieldReading, UNKNOWN_POSITION};
use crate::logging::{Logger, debug};

/// Rank then suit, optionally separated by whitespace. `10` reads as `T`.
static CARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(10|[2-9TJQKA])\s*([CDHS♣♦♥♠])").expect("valid card regex"));

/// First number in a string, thousands separators allowed
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("valid number regex"));

/// Page segmentation modes tried for numeric fields
const NUMBER_MODES: [PageSegMode; 3] = [
    PageSegMode::Block,
    PageSegMode::SingleLine,
    PageSegMode::SingleWord,
];

/// Seat labels and the texts that identify them, in priority order
const POSITION_ALIASES: [(&str, &[&str]); 6] = [
    ("BTN", &["BTN", "BUTTON", "D"]),
    ("SB", &["SB", "SMALL BLIND"]),
    ("BB", &["BB", "BIG BLIND"]),
    ("UTG", &["UTG", "UNDER THE GUN"]),
    ("MP", &["MP", "MIDDLE"]),
    ("CO", &["CO", "CUTOFF"]),
];

const EXACT_MATCH: f64 = 1.0;
const PARTIAL_MATCH: f64 = 0.8;

/// Runs OCR over preprocessed regions and types the result
#[derive(Clone)]
pub struct FieldExtractor {
    engine: Arc<dyn OcrEngine>,
    config: ExtractConfig,
    log: Logger,
}

impl FieldExtractor {
    pub fn new(engine: Arc<dyn OcrEngine>, config: ExtractConfig, log: Logger) -> Self {
        Self { engine, config, log }
    }

    /// Card codes found in the region.
    ///
    /// `gray` is the unbinarized crop. Bright card faces are located on it
    /// with a global threshold, then each face is binarized and OCR'd on its
    /// own as a single character block. A candidate counts only if a rank
    /// and a suit are both read. Without any face the whole binarized region
    /// is read as one word. Confidence is the mean OCR confidence of the
    /// accepted candidates.
    pub fn extract_cards(&self, gray: &GrayImage, preprocessor: &Preprocessor) -> FieldReading<Vec<Card>> {
        let boxes = self.card_candidates(gray);
        let candidates: Vec<(GrayImage, PageSegMode)> = if boxes.is_empty() {
            vec![(preprocessor.preprocess_gray(gray), PageSegMode::SingleWord)]
        } else {
            boxes
                .into_iter()
                .map(|(x, y, w, h)| {
                    let face = imageops::crop_imm(gray, x, y, w, h).to_image();
                    (preprocessor.preprocess_gray(&face), PageSegMode::SingleChar)
                })
                .collect()
        };

        let mut cards = Vec::new();
        let mut confidences = Vec::new();
        for (candidate, mode) in &candidates {
            let Some(output) = self.recognize(candidate, *mode) else {
                continue;
            };
            let parsed = parse_cards(&output.text());
            if parsed.is_empty() {
                continue;
            }
            confidences.push(output.mean_confidence() as f64);
            cards.extend(parsed);
        }

        if confidences.is_empty() {
            return FieldReading::new(Vec::new(), 0.0);
        }
        let mean = confidences.iter().sum::<f64>() / confidences.len() as f64;
        FieldReading::new(cards, mean / 100.0)
    }

    /// Numeric amount, combined over several segmentation modes.
    ///
    /// `value = Σ(n·c) / Σc`, `confidence = Σc / (100·count)`.
    pub fn extract_number(&self, image: &GrayImage) -> FieldReading<f64> {
        let mut readings = Vec::new();
        for mode in NUMBER_MODES {
            let Some(output) = self.recognize(image, mode) else {
                continue;
            };
            if let Some(number) = parse_number(&output.text()) {
                readings.push((number, output.mean_confidence() as f64));
            }
        }
        combine_weighted(&readings)
    }

    /// Free text on a single line
    pub fn extract_text(&self, image: &GrayImage) -> FieldReading<String> {
        match self.recognize(image, PageSegMode::SingleLine) {
            Some(output) => {
                let text = output.text().trim().to_string();
                let confidence = if text.is_empty() {
                    0.0
                } else {
                    output.mean_confidence() as f64 / 100.0
                };
                FieldReading::new(text, confidence)
            }
            None => FieldReading::new(String::new(), 0.0),
        }
    }

    /// Seat label, or `"Unknown"` at confidence 0
    pub fn extract_position(&self, image: &GrayImage) -> FieldReading<String> {
        let text = self.extract_text(image);
        match match_position(&text.value) {
            Some((label, score)) => FieldReading::new(label.to_string(), score * text.confidence),
            None => FieldReading::new(UNKNOWN_POSITION.to_string(), 0.0),
        }
    }

    /// Action buttons and their amounts
    pub fn extract_actions(&self, image: &GrayImage) -> ActionReading {
        match self.recognize(image, PageSegMode::Block) {
            Some(output) => parse_actions(&output.text(), output.mean_confidence() as f64 / 100.0),
            None => ActionReading::empty_with_confidence(0.0),
        }
    }

    fn recognize(&self, image: &GrayImage, mode: PageSegMode) -> Option<OcrOutput> {
        match self.engine.recognize(image, mode) {
            Ok(output) => Some(output),
            Err(e) => {
                debug!(self.log, "OCR failed ({:?}): {}", mode, e);
                None
            }
        }
    }

    /// Bounding boxes `(x, y, w, h)` of bright faces at least
    /// `min_card_area` large, left to right
    fn card_candidates(&self, gray: &GrayImage) -> Vec<(u32, u32, u32, u32)> {
        let (w, h) = gray.dimensions();
        if w == 0 || h == 0 {
            return Vec::new();
        }

        let cutoff = self.config.card_threshold;
        let faces = GrayImage::from_fn(w, h, |x, y| {
            if gray.get_pixel(x, y)[0] > cutoff {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });

        let mut boxes: Vec<(u32, u32, u32, u32)> = find_contours::<u32>(&faces)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .filter_map(|c| {
                let min_x = c.points.iter().map(|p| p.x).min()?;
                let max_x = c.points.iter().map(|p| p.x).max()?;
                let min_y = c.points.iter().map(|p| p.y).min()?;
                let max_y = c.points.iter().map(|p| p.y).max()?;
                Some((min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
            })
            .filter(|&(_, _, bw, bh)| (bw as f64) * (bh as f64) >= self.config.min_card_area)
            .collect();

        // Left to right, the order cards are dealt on screen
        boxes.sort_by_key(|&(x, y, _, _)| (x, y));
        boxes
    }
}

/// Every rank+suit pair in `text`; anything else is ignored
pub fn parse_cards(text: &str) -> Vec<Card> {
    CARD_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let rank_token = caps.get(1)?.as_str();
            let rank = if rank_token == "10" {
                'T'
            } else {
                rank_token.chars().next()?
            };
            let suit = caps.get(2)?.as_str().chars().next()?;
            Card::new(rank, suit)
        })
        .collect()
}

/// Keep digits and decimal points, then parse
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Confidence-weighted combination of `(value, confidence 0..100)` pairs
pub fn combine_weighted(readings: &[(f64, f64)]) -> FieldReading<f64> {
    if readings.is_empty() {
        return FieldReading::new(0.0, 0.0);
    }
    let total_conf: f64 = readings.iter().map(|(_, c)| c.max(0.0)).sum();
    if total_conf <= 0.0 {
        let mean = readings.iter().map(|(n, _)| n).sum::<f64>() / readings.len() as f64;
        return FieldReading::new(mean, 0.0);
    }
    let value = readings.iter().map(|(n, c)| n * c.max(0.0)).sum::<f64>() / total_conf;
    FieldReading::new(value, total_conf / (100.0 * readings.len() as f64))
}

/// Best seat label for `text` and its match score
pub fn match_position(text: &str) -> Option<(&'static str, f64)> {
    let text = text.trim().to_uppercase();
    if text.is_empty() {
        return None;
    }

    let mut best: Option<(&'static str, f64)> = None;
    for (label, aliases) in POSITION_ALIASES {
        for alias in aliases {
            let score = if text == *alias {
                EXACT_MATCH
            } else if text.contains(alias) {
                PARTIAL_MATCH
            } else {
                continue;
            };
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((label, score));
            }
        }
    }
    best
}

/// Action labels present in `text`, with amounts
pub fn parse_actions(text: &str, confidence: f64) -> ActionReading {
    let upper = text.to_uppercase();
    let first_number = NUMBER_RE.find(&upper).and_then(|m| parse_number(m.as_str()));

    let mut reading = ActionReading::new();
    for label in ActionLabel::ALL {
        let amount = match upper.find(label.as_str()) {
            Some(at) => {
                let after = &upper[at + label.as_str().len()..];
                let following = NUMBER_RE
                    .find(after)
                    .filter(|m| after[..m.start()].trim().is_empty())
                    .and_then(|m| parse_number(m.as_str()));
                following.or(first_number).unwrap_or(1.0)
            }
            None => 0.0,
        };
        reading.insert(label, amount, confidence);
    }
    reading
}
