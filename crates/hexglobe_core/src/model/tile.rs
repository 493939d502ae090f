//! Tile domain model: immutable topology, mutable overlay and merged view.
//!
//! # Responsibility
//! - Define the records persisted in the static and dynamic trees.
//! - Define the merged `Tile` shape consumed by clients.
//! - Own visual-property defaults, normalization and validation.
//!
//! # Invariants
//! - `NeighborMap` always carries exactly six position keys.
//! - A visual override equal to its default is never persisted.
//! - `MutableContent::is_default()` is the single test for "no record".

use crate::model::cell::CellId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Serialized form of the vacant pentagon slot.
pub const PENTAGON_MARKER: &str = "pentagon";

pub const DEFAULT_BORDER_COLOR: &str = "#000000";
pub const DEFAULT_BORDER_THICKNESS: u32 = 1;
pub const DEFAULT_BORDER_STYLE: &str = "solid";
pub const DEFAULT_FILL_COLOR: &str = "#FFFFFF";
pub const DEFAULT_FILL_OPACITY: f64 = 0.5;

const MAX_BORDER_THICKNESS: u32 = 64;
const BORDER_STYLES: &[&str] = &["solid", "dashed", "dotted", "double", "none"];

static HEX_COLOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid hex color regex")
});

/// Canonical neighbor direction for the flat-bottom hexagon convention.
///
/// Declaration order is clockwise starting at north; `Ord` follows it, so
/// maps keyed by `PositionKey` iterate in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionKey {
    TopMiddle,
    TopRight,
    BottomRight,
    BottomMiddle,
    BottomLeft,
    TopLeft,
}

impl PositionKey {
    /// All keys in clockwise order from north.
    pub const ALL: [PositionKey; 6] = [
        PositionKey::TopMiddle,
        PositionKey::TopRight,
        PositionKey::BottomRight,
        PositionKey::BottomMiddle,
        PositionKey::BottomLeft,
        PositionKey::TopLeft,
    ];

    /// Position in the clockwise sequence, `0..6`.
    pub fn index(self) -> usize {
        match self {
            Self::TopMiddle => 0,
            Self::TopRight => 1,
            Self::BottomRight => 2,
            Self::BottomMiddle => 3,
            Self::BottomLeft => 4,
            Self::TopLeft => 5,
        }
    }

    /// Bearing at the middle of this key's sector, in degrees.
    pub fn sector_center_deg(self) -> f64 {
        60.0 * self.index() as f64
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopMiddle => "top_middle",
            Self::TopRight => "top_right",
            Self::BottomRight => "bottom_right",
            Self::BottomMiddle => "bottom_middle",
            Self::BottomLeft => "bottom_left",
            Self::TopLeft => "top_left",
        }
    }
}

impl Display for PositionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content of one neighbor position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NeighborSlot {
    Cell(CellId),
    /// The direction a pentagon is missing.
    Pentagon,
}

impl NeighborSlot {
    pub fn cell(&self) -> Option<&CellId> {
        match self {
            Self::Cell(id) => Some(id),
            Self::Pentagon => None,
        }
    }

    pub fn is_pentagon_marker(&self) -> bool {
        matches!(self, Self::Pentagon)
    }
}

impl From<String> for NeighborSlot {
    fn from(value: String) -> Self {
        if value == PENTAGON_MARKER {
            Self::Pentagon
        } else {
            Self::Cell(CellId::from_canonical(value))
        }
    }
}

impl From<NeighborSlot> for String {
    fn from(value: NeighborSlot) -> Self {
        match value {
            NeighborSlot::Cell(id) => id.to_string(),
            NeighborSlot::Pentagon => PENTAGON_MARKER.to_string(),
        }
    }
}

/// Position-keyed neighbor map with a fixed six-key contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NeighborMap(BTreeMap<PositionKey, NeighborSlot>);

impl NeighborMap {
    /// Builds a map from slots indexed by `PositionKey::index()`.
    pub fn from_slots(slots: [NeighborSlot; 6]) -> Self {
        Self(PositionKey::ALL.into_iter().zip(slots).collect())
    }

    pub fn get(&self, key: PositionKey) -> Option<&NeighborSlot> {
        self.0.get(&key)
    }

    /// Iterates `(key, slot)` in clockwise key order.
    pub fn iter(&self) -> impl Iterator<Item = (PositionKey, &NeighborSlot)> {
        self.0.iter().map(|(key, slot)| (*key, slot))
    }

    /// Iterates positioned neighbor cells, skipping the pentagon marker.
    pub fn cells(&self) -> impl Iterator<Item = (PositionKey, &CellId)> {
        self.iter()
            .filter_map(|(key, slot)| slot.cell().map(|id| (key, id)))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn marker_count(&self) -> usize {
        self.0.values().filter(|slot| slot.is_pentagon_marker()).count()
    }

    /// Returns the key holding `id`, if `id` is a positioned neighbor.
    pub fn key_of(&self, id: &CellId) -> Option<PositionKey> {
        self.cells().find(|(_, cell)| *cell == id).map(|(key, _)| key)
    }

    /// Whether every position key is present (guards deserialized records).
    pub fn is_complete(&self) -> bool {
        PositionKey::ALL.iter().all(|key| self.0.contains_key(key))
    }
}

/// Topology record shared by every namespace; a pure function of the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmutableTopology {
    pub id: CellId,
    pub resolution: u8,
    pub parent_id: Option<CellId>,
    pub children_ids: Vec<CellId>,
    pub neighbor_positions: NeighborMap,
    /// Same geographic location at every resolution, keyed `0..=15`.
    pub resolution_siblings: BTreeMap<u8, CellId>,
    pub is_pentagon: bool,
}

/// Visual overrides; `None` inherits the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_thickness: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_opacity: Option<f64>,
}

impl VisualProperties {
    /// Applies every `Some` field of `patch` over `self`.
    pub fn merge(&mut self, patch: &VisualProperties) {
        if let Some(value) = &patch.border_color {
            self.border_color = Some(value.clone());
        }
        if let Some(value) = patch.border_thickness {
            self.border_thickness = Some(value);
        }
        if let Some(value) = &patch.border_style {
            self.border_style = Some(value.clone());
        }
        if let Some(value) = &patch.fill_color {
            self.fill_color = Some(value.clone());
        }
        if let Some(value) = patch.fill_opacity {
            self.fill_opacity = Some(value);
        }
    }

    /// Drops overrides that equal their defaults.
    pub fn normalized(mut self) -> Self {
        if self
            .border_color
            .as_deref()
            .is_some_and(|value| same_color(value, DEFAULT_BORDER_COLOR))
        {
            self.border_color = None;
        }
        if self.border_thickness == Some(DEFAULT_BORDER_THICKNESS) {
            self.border_thickness = None;
        }
        if self.border_style.as_deref() == Some(DEFAULT_BORDER_STYLE) {
            self.border_style = None;
        }
        if self
            .fill_color
            .as_deref()
            .is_some_and(|value| same_color(value, DEFAULT_FILL_COLOR))
        {
            self.fill_color = None;
        }
        if self.fill_opacity == Some(DEFAULT_FILL_OPACITY) {
            self.fill_opacity = None;
        }
        self
    }

    pub fn is_default(&self) -> bool {
        self.border_color.is_none()
            && self.border_thickness.is_none()
            && self.border_style.is_none()
            && self.fill_color.is_none()
            && self.fill_opacity.is_none()
    }

    /// Fills inherited fields with defaults.
    pub fn resolve(&self) -> ResolvedVisual {
        let defaults = ResolvedVisual::default();
        ResolvedVisual {
            border_color: self.border_color.clone().unwrap_or(defaults.border_color),
            border_thickness: self.border_thickness.unwrap_or(defaults.border_thickness),
            border_style: self.border_style.clone().unwrap_or(defaults.border_style),
            fill_color: self.fill_color.clone().unwrap_or(defaults.fill_color),
            fill_opacity: self.fill_opacity.unwrap_or(defaults.fill_opacity),
        }
    }

    /// Validates every provided override.
    pub fn validate(&self) -> Result<(), VisualValidationError> {
        if let Some(value) = &self.border_color {
            validate_color("border_color", value)?;
        }
        if let Some(value) = &self.fill_color {
            validate_color("fill_color", value)?;
        }
        if let Some(value) = self.border_thickness {
            if value > MAX_BORDER_THICKNESS {
                return Err(VisualValidationError::BorderThicknessOutOfRange(value));
            }
        }
        if let Some(value) = &self.border_style {
            if !BORDER_STYLES.contains(&value.as_str()) {
                return Err(VisualValidationError::UnsupportedBorderStyle(value.clone()));
            }
        }
        if let Some(value) = self.fill_opacity {
            if !(0.0..=1.0).contains(&value) {
                return Err(VisualValidationError::OpacityOutOfRange(value));
            }
        }
        Ok(())
    }
}

/// `#RGB` and `#RRGGBB` spellings of one color compare equal, in any case.
fn same_color(left: &str, right: &str) -> bool {
    match (expand_color(left), expand_color(right)) {
        (Some(left), Some(right)) => left == right,
        _ => left.eq_ignore_ascii_case(right),
    }
}

fn expand_color(value: &str) -> Option<String> {
    let digits = value.strip_prefix('#')?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match digits.len() {
        3 => Some(
            digits
                .chars()
                .flat_map(|c| [c, c])
                .map(|c| c.to_ascii_uppercase())
                .collect(),
        ),
        6 => Some(digits.to_ascii_uppercase()),
        _ => None,
    }
}

fn validate_color(field: &'static str, value: &str) -> Result<(), VisualValidationError> {
    if HEX_COLOR_RE.is_match(value) {
        Ok(())
    } else {
        Err(VisualValidationError::InvalidColor {
            field,
            value: value.to_string(),
        })
    }
}

/// Visual properties with defaults applied, as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedVisual {
    pub border_color: String,
    pub border_thickness: u32,
    pub border_style: String,
    pub fill_color: String,
    pub fill_opacity: f64,
}

impl Default for ResolvedVisual {
    fn default() -> Self {
        Self {
            border_color: DEFAULT_BORDER_COLOR.to_string(),
            border_thickness: DEFAULT_BORDER_THICKNESS,
            border_style: DEFAULT_BORDER_STYLE.to_string(),
            fill_color: DEFAULT_FILL_COLOR.to_string(),
            fill_opacity: DEFAULT_FILL_OPACITY,
        }
    }
}

/// Validation failures for visual overrides.
#[derive(Debug, Clone, PartialEq)]
pub enum VisualValidationError {
    InvalidColor { field: &'static str, value: String },
    UnsupportedBorderStyle(String),
    BorderThicknessOutOfRange(u32),
    OpacityOutOfRange(f64),
}

impl Display for VisualValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidColor { field, value } => {
                write!(f, "{field} must be #RGB or #RRGGBB, got `{value}`")
            }
            Self::UnsupportedBorderStyle(value) => write!(
                f,
                "border_style `{value}` is unsupported; expected one of {}",
                BORDER_STYLES.join("|")
            ),
            Self::BorderThicknessOutOfRange(value) => write!(
                f,
                "border_thickness {value} exceeds maximum {MAX_BORDER_THICKNESS}"
            ),
            Self::OpacityOutOfRange(value) => {
                write!(f, "fill_opacity {value} is outside 0.0..=1.0")
            }
        }
    }
}

impl Error for VisualValidationError {}

/// Per-namespace overlay record for one cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutableContent {
    pub content: Option<String>,
    pub visual_properties: VisualProperties,
}

impl MutableContent {
    /// True when the record carries nothing worth persisting.
    pub fn is_default(&self) -> bool {
        self.content.is_none() && self.visual_properties.is_default()
    }
}

/// Merged tile view exposed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub id: CellId,
    pub resolution: u8,
    pub parent_id: Option<CellId>,
    pub children_ids: Vec<CellId>,
    pub neighbor_ids: NeighborMap,
    pub resolution_ids: BTreeMap<u8, CellId>,
    pub content: Option<String>,
    pub visual_properties: ResolvedVisual,
}

impl Tile {
    pub fn compose(topology: &ImmutableTopology, overlay: &MutableContent) -> Self {
        Self {
            id: topology.id.clone(),
            resolution: topology.resolution,
            parent_id: topology.parent_id.clone(),
            children_ids: topology.children_ids.clone(),
            neighbor_ids: topology.neighbor_positions.clone(),
            resolution_ids: topology.resolution_siblings.clone(),
            content: overlay.content.clone(),
            visual_properties: overlay.visual_properties.resolve(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        MutableContent, NeighborMap, NeighborSlot, PositionKey, VisualProperties,
        VisualValidationError,
    };
    use crate::model::cell::CellId;

    fn cell(value: &str) -> NeighborSlot {
        NeighborSlot::Cell(CellId::from_canonical(value))
    }

    #[test]
    fn neighbor_map_serializes_with_snake_case_keys_and_marker() {
        let map = NeighborMap::from_slots([
            cell("a"),
            cell("b"),
            NeighborSlot::Pentagon,
            cell("d"),
            cell("e"),
            cell("f"),
        ]);
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["top_middle"], "a");
        assert_eq!(json["bottom_right"], "pentagon");
        assert_eq!(json["top_left"], "f");

        let back: NeighborMap = serde_json::from_value(json).unwrap();
        assert_eq!(back, map);
        assert_eq!(back.marker_count(), 1);
        assert!(back.is_complete());
    }

    #[test]
    fn keys_are_clockwise_sixty_degrees_apart() {
        let centers: Vec<f64> = PositionKey::ALL
            .iter()
            .map(|key| key.sector_center_deg())
            .collect();
        assert_eq!(centers, vec![0.0, 60.0, 120.0, 180.0, 240.0, 300.0]);
    }

    #[test]
    fn overrides_equal_to_defaults_normalize_away() {
        let visual = VisualProperties {
            border_color: Some("#000000".to_string()),
            border_thickness: Some(1),
            border_style: Some("solid".to_string()),
            fill_color: Some("#ffffff".to_string()),
            fill_opacity: Some(0.5),
        };
        assert!(visual.normalized().is_default());
    }

    #[test]
    fn short_hex_defaults_normalize_away() {
        let visual = VisualProperties {
            border_color: Some("#000".to_string()),
            fill_color: Some("#fFf".to_string()),
            ..VisualProperties::default()
        };
        assert!(visual.normalized().is_default());

        let kept = VisualProperties {
            fill_color: Some("#ffe".to_string()),
            ..VisualProperties::default()
        }
        .normalized();
        assert_eq!(kept.fill_color.as_deref(), Some("#ffe"));
    }

    #[test]
    fn merge_only_touches_provided_fields() {
        let mut base = VisualProperties {
            fill_color: Some("#112233".to_string()),
            ..VisualProperties::default()
        };
        base.merge(&VisualProperties {
            border_thickness: Some(3),
            ..VisualProperties::default()
        });
        assert_eq!(base.fill_color.as_deref(), Some("#112233"));
        assert_eq!(base.border_thickness, Some(3));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let bad_color = VisualProperties {
            fill_color: Some("red".to_string()),
            ..VisualProperties::default()
        };
        assert!(matches!(
            bad_color.validate(),
            Err(VisualValidationError::InvalidColor { field: "fill_color", .. })
        ));

        let bad_opacity = VisualProperties {
            fill_opacity: Some(1.5),
            ..VisualProperties::default()
        };
        assert_eq!(
            bad_opacity.validate(),
            Err(VisualValidationError::OpacityOutOfRange(1.5))
        );

        let bad_style = VisualProperties {
            border_style: Some("wavy".to_string()),
            ..VisualProperties::default()
        };
        assert!(bad_style.validate().is_err());
    }

    #[test]
    fn empty_record_is_default_and_round_trips_compactly() {
        let record = MutableContent::default();
        assert!(record.is_default());
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"content":null,"visual_properties":{}}"#);
    }

    #[test]
    fn resolve_applies_defaults() {
        let resolved = VisualProperties::default().resolve();
        assert_eq!(resolved.border_color, "#000000");
        assert_eq!(resolved.border_thickness, 1);
        assert_eq!(resolved.fill_opacity, 0.5);
    }
}
