//! Table regions
//!
//! A [`Region`] is a rectangle of the captured frame tagged with the kind of
//! field it holds. A [`RegionSet`] is the complete layout produced by one
//! calibration; it is replaced wholesale, never edited in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Error, Result};

/// Well-known region names produced by calibration
pub mod names {
    pub const HOLE_CARDS: &str = "hole_cards";
    pub const COMMUNITY_CARDS: &str = "community_cards";
    pub const POT: &str = "pot";
    pub const STACK: &str = "stack";
    pub const POSITION: &str = "position";
    pub const ACTIONS: &str = "actions";
    /// Prefix of per-seat stack regions (`stack_btn`, `stack_sb`, ...)
    pub const SEAT_STACK_PREFIX: &str = "stack_";
}

/// Semantic type of the field a region contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Cards,
    Numeric,
    Position,
    Action,
}

/// A named rectangle of the frame, in pixels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
    pub kind: RegionKind,
}

impl Region {
    pub fn new(
        name: impl Into<String>,
        top: u32,
        left: u32,
        width: u32,
        height: u32,
        kind: RegionKind,
    ) -> Self {
        Self {
            name: name.into(),
            top,
            left,
            width,
            height,
            kind,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Shift the region by an anchor offset
    pub fn offset(&self, dx: u32, dy: u32) -> Self {
        Self {
            top: self.top.saturating_add(dy),
            left: self.left.saturating_add(dx),
            ..self.clone()
        }
    }

    /// Clamp the region into a `width` x `height` image.
    ///
    /// Returns `None` when nothing of the region remains inside the bounds.
    pub fn clamped(&self, width: u32, height: u32) -> Option<Self> {
        if self.left >= width || self.top >= height {
            return None;
        }
        let w = self.width.min(width - self.left);
        let h = self.height.min(height - self.top);
        if w == 0 || h == 0 {
            return None;
        }
        Some(Self {
            width: w,
            height: h,
            ..self.clone()
        })
    }
}

/// Mapping of region name to region, keys unique
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSet {
    regions: BTreeMap<String, Region>,
}

impl RegionSet {
    /// Build a set from regions, rejecting duplicate names
    pub fn from_regions(regions: impl IntoIterator<Item = Region>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for region in regions {
            if map.contains_key(&region.name) {
                return Err(Error::Calibration(format!(
                    "duplicate region name '{}'",
                    region.name
                )));
            }
            map.insert(region.name.clone(), region);
        }
        Ok(Self { regions: map })
    }

    pub fn get(&self, name: &str) -> Option<&Region> {
        self.regions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.regions.contains_key(name)
    }

    /// Regions in name order
    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.regions.keys().map(String::as_str)
    }

    /// Regions of one kind, in name order
    pub fn of_kind(&self, kind: RegionKind) -> impl Iterator<Item = &Region> {
        self.regions.values().filter(move |r| r.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_inside() {
        let r = Region::new("pot", 10, 10, 20, 20, RegionKind::Numeric);
        assert_eq!(r.clamped(100, 100), Some(r.clone()));
    }

    #[test]
    fn test_clamped_overhang() {
        let r = Region::new("pot", 90, 80, 50, 50, RegionKind::Numeric);
        let c = r.clamped(100, 100).unwrap();
        assert_eq!((c.left, c.top, c.width, c.height), (80, 90, 20, 10));
    }

    #[test]
    fn test_clamped_outside() {
        let r = Region::new("pot", 100, 0, 10, 10, RegionKind::Numeric);
        assert!(r.clamped(100, 100).is_none());
        let zero = Region::new("pot", 0, 0, 0, 10, RegionKind::Numeric);
        assert!(zero.clamped(100, 100).is_none());
    }

    #[test]
    fn test_offset() {
        let r = Region::new("pot", 5, 7, 10, 10, RegionKind::Numeric).offset(3, 4);
        assert_eq!((r.left, r.top), (10, 9));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = RegionSet::from_regions(vec![
            Region::new("pot", 0, 0, 10, 10, RegionKind::Numeric),
            Region::new("pot", 5, 5, 10, 10, RegionKind::Numeric),
        ]);
        assert!(matches!(result, Err(Error::Calibration(_))));
    }

    #[test]
    fn test_of_kind() {
        let set = RegionSet::from_regions(vec![
            Region::new("hole_cards", 0, 0, 10, 10, RegionKind::Cards),
            Region::new("pot", 0, 0, 10, 10, RegionKind::Numeric),
            Region::new("stack", 0, 0, 10, 10, RegionKind::Numeric),
        ])
        .unwrap();
        assert_eq!(set.of_kind(RegionKind::Numeric).count(), 2);
        assert_eq!(set.names().collect::<Vec<_>>(), vec!["hole_cards", "pot", "stack"]);
    }
}
