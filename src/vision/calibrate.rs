//! Region calibration
//!
//! Regions are fixed fractions of the table template. With
//! [`CalibrationStrategy::TemplateMatch`] the template is first located in a
//! live frame and the same fractions are laid out from that anchor.

use image::{DynamicImage, GenericImageView};

use super::capture::decode_image;
use super::detector::TemplateLocator;
use crate::core::region::names;
use crate::core::{Region, RegionKind, RegionSet};
use crate::logging::{Logger, debug, info, warn};
use crate::{Error, Result};

/// Seats whose stacks get their own region, in layout order
pub const SEAT_LABELS: [&str; 4] = ["BTN", "SB", "BB", "UTG"];

/// How regions are derived from the template
#[derive(Debug, Clone, Copy)]
pub enum CalibrationStrategy<'a> {
    /// Regions are fractions of the template itself
    Proportional,
    /// Template is located in this live frame; regions are laid out from the match
    TemplateMatch(&'a DynamicImage),
}

/// Derives a [`RegionSet`] from a template image
#[derive(Debug, Clone)]
pub struct Calibrator {
    min_dimension: u32,
    locator: TemplateLocator,
    log: Logger,
}

impl Calibrator {
    pub fn new(min_dimension: u32, log: Logger) -> Self {
        Self {
            min_dimension: min_dimension.max(1),
            locator: TemplateLocator::new(),
            log,
        }
    }

    /// Minimum correlation a template-match anchor needs
    pub fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.locator = self.locator.with_threshold(threshold);
        self
    }

    /// Decode `bytes` and calibrate from the result
    pub fn calibrate_bytes(&self, bytes: &[u8], strategy: CalibrationStrategy<'_>) -> Result<RegionSet> {
        let template = decode_image(bytes).map_err(|e| {
            warn!(self.log, "Template could not be decoded: {}", e);
            e
        })?;
        self.calibrate(&template, strategy)
    }

    /// Build a region set for `template`.
    ///
    /// Fails on degenerate templates and on template-match misses; the caller
    /// keeps whatever region set it had before.
    pub fn calibrate(&self, template: &DynamicImage, strategy: CalibrationStrategy<'_>) -> Result<RegionSet> {
        let (width, height) = template.dimensions();
        if width < self.min_dimension || height < self.min_dimension {
            return Err(Error::Calibration(format!(
                "template {}x{} is below the {}px minimum",
                width, height, self.min_dimension
            )));
        }

        let layout = proportional_layout(width, height);
        let (bounds, anchor) = match strategy {
            CalibrationStrategy::Proportional => ((width, height), (0, 0)),
            CalibrationStrategy::TemplateMatch(live) => {
                let detection = self.locator.locate(live, template);
                let anchor = detection.location.ok_or_else(|| {
                    Error::Calibration("template not found in live frame".to_string())
                })?;
                debug!(
                    self.log,
                    "Template matched at {:?} (correlation {:.3})",
                    anchor, detection.confidence
                );
                (live.dimensions(), anchor)
            }
        };

        let mut regions = Vec::with_capacity(layout.len());
        for region in layout {
            let placed = region
                .offset(anchor.0, anchor.1)
                .clamped(bounds.0, bounds.1)
                .ok_or_else(|| {
                    Error::Calibration(format!("region '{}' falls outside the frame", region.name))
                })?;
            regions.push(placed);
        }

        let set = RegionSet::from_regions(regions)?;
        info!(
            self.log,
            "Calibrated {} regions from {}x{} template",
            set.len(),
            width,
            height
        );
        Ok(set)
    }
}

/// Proportional layout for a `width` x `height` table view
pub fn proportional_layout(width: u32, height: u32) -> Vec<Region> {
    let (w, h) = (width, height);
    let mut regions = vec![
        Region::new(names::HOLE_CARDS, 0, 0, w / 3, h / 2, RegionKind::Cards),
        Region::new(names::COMMUNITY_CARDS, 0, w / 3, w * 2 / 3, h / 2, RegionKind::Cards),
        Region::new(names::POT, h / 2, 0, w / 4, h / 4, RegionKind::Numeric),
        Region::new(names::STACK, h * 3 / 4, 0, w / 4, h / 4, RegionKind::Numeric),
        Region::new(names::POSITION, h / 2, w / 4, w / 4, h / 4, RegionKind::Position),
        Region::new(names::ACTIONS, h * 3 / 4, w / 4, w / 2, h / 4, RegionKind::Action),
    ];

    // Seat stacks: fixed strips in the right quarter, independent of seat count
    for (i, seat) in SEAT_LABELS.iter().enumerate() {
        regions.push(Region::new(
            format!("{}{}", names::SEAT_STACK_PREFIX, seat.to_lowercase()),
            h / 2 + i as u32 * (h / 8),
            w * 3 / 4,
            w / 4,
            h / 8,
            RegionKind::Numeric,
        ));
    }
    regions
}
