//! Shape model and kind conversion.
//!
//! On the wire a shape is a loosely-typed record (`type` + `props` bag). In
//! memory it is a tagged union: geometry shapes carry a `geo` kind, text
//! shapes carry their text, and every other type passes through untouched.
//! Conversion is an explicit function of (source kind, target type) rather
//! than ad-hoc field deletion on the props bag.
//!
//! Fields this model does not understand (`index`, `opacity`, `w`, `h`,
//! `dash`, ...) are kept verbatim, and modelled fields that were absent on the
//! wire stay absent until they change, so a load/snapshot cycle is lossless.

#[cfg(test)]
#[path = "shape_test.rs"]
mod tests;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Placeholder text for shapes converted to `text`.
pub const DEFAULT_TEXT: &str = "Double click to edit";
pub const DEFAULT_FILL: &str = "solid";
pub const DEFAULT_COLOR: &str = "black";
pub const DEFAULT_SIZE: &str = "m";
pub const DEFAULT_DASH: &str = "draw";

const GEO_TYPE: &str = "geo";
const TEXT_TYPE: &str = "text";

// =============================================================================
// IDS
// =============================================================================

/// Shape record id, `shape:<uuid>` for shapes created here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(String);

impl ShapeId {
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("shape:{}", Uuid::new_v4()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ShapeId {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Id of a shape's parent: a page, or a containing shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParentId(String);

impl ParentId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ParentId {
    fn default() -> Self {
        Self("page:page".to_owned())
    }
}

impl From<&str> for ParentId {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

// =============================================================================
// KINDS
// =============================================================================

/// Geometry of a `geo` shape. Unrecognised names survive as `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GeoKind {
    Rectangle,
    Ellipse,
    Triangle,
    Diamond,
    Pentagon,
    Hexagon,
    Octagon,
    Star,
    Custom(String),
}

impl GeoKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Ellipse => "ellipse",
            Self::Triangle => "triangle",
            Self::Diamond => "diamond",
            Self::Pentagon => "pentagon",
            Self::Hexagon => "hexagon",
            Self::Octagon => "octagon",
            Self::Star => "star",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for GeoKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "rectangle" => Self::Rectangle,
            "ellipse" => Self::Ellipse,
            "triangle" => Self::Triangle,
            "diamond" => Self::Diamond,
            "pentagon" => Self::Pentagon,
            "hexagon" => Self::Hexagon,
            "octagon" => Self::Octagon,
            "star" => Self::Star,
            _ => Self::Custom(raw),
        }
    }
}

impl From<GeoKind> for String {
    fn from(kind: GeoKind) -> Self {
        match kind {
            GeoKind::Custom(name) => name,
            other => other.as_str().to_owned(),
        }
    }
}

/// A conversion target offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Rectangle,
    Ellipse,
    Triangle,
    Diamond,
    Pentagon,
    Hexagon,
    Octagon,
    Star,
    Text,
    Image,
}

impl ShapeType {
    /// Geometry targets, in the order the shape picker lists them.
    pub const GEOMETRY: [ShapeType; 8] = [
        Self::Rectangle,
        Self::Ellipse,
        Self::Triangle,
        Self::Diamond,
        Self::Pentagon,
        Self::Hexagon,
        Self::Octagon,
        Self::Star,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Ellipse => "ellipse",
            Self::Triangle => "triangle",
            Self::Diamond => "diamond",
            Self::Pentagon => "pentagon",
            Self::Hexagon => "hexagon",
            Self::Octagon => "octagon",
            Self::Star => "star",
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    /// Human-readable label for pickers.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Rectangle => "Rectangle",
            Self::Ellipse => "Ellipse",
            Self::Triangle => "Triangle",
            Self::Diamond => "Diamond",
            Self::Pentagon => "Pentagon",
            Self::Hexagon => "Hexagon",
            Self::Octagon => "Octagon",
            Self::Star => "Star",
            Self::Text => "Text",
            Self::Image => "Image",
        }
    }

    #[must_use]
    pub fn geo_kind(self) -> Option<GeoKind> {
        match self {
            Self::Rectangle => Some(GeoKind::Rectangle),
            Self::Ellipse => Some(GeoKind::Ellipse),
            Self::Triangle => Some(GeoKind::Triangle),
            Self::Diamond => Some(GeoKind::Diamond),
            Self::Pentagon => Some(GeoKind::Pentagon),
            Self::Hexagon => Some(GeoKind::Hexagon),
            Self::Octagon => Some(GeoKind::Octagon),
            Self::Star => Some(GeoKind::Star),
            Self::Text | Self::Image => None,
        }
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShapeType {
    type Err = ConversionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "rectangle" => Ok(Self::Rectangle),
            "ellipse" => Ok(Self::Ellipse),
            "triangle" => Ok(Self::Triangle),
            "diamond" => Ok(Self::Diamond),
            "pentagon" => Ok(Self::Pentagon),
            "hexagon" => Ok(Self::Hexagon),
            "octagon" => Ok(Self::Octagon),
            "star" => Ok(Self::Star),
            "text" => Ok(Self::Text),
            "image" => Ok(Self::Image),
            other => Err(ConversionError::UnknownType(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("unknown shape type: {0}")]
    UnknownType(String),
    #[error("shapes cannot be converted to {0}")]
    UnsupportedTarget(ShapeType),
    #[error("{0} shapes cannot be converted")]
    NotConvertible(String),
}

// =============================================================================
// SHAPE
// =============================================================================

/// Style attributes shared by every convertible kind. `None` means the shape
/// never set the field; conversion fills in the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapeStyle {
    pub size: Option<String>,
    pub fill: Option<String>,
    pub color: Option<String>,
}

impl ShapeStyle {
    #[must_use]
    pub fn resolved(&self) -> Self {
        Self {
            size: Some(self.size.clone().unwrap_or_else(|| DEFAULT_SIZE.to_owned())),
            fill: Some(self.fill.clone().unwrap_or_else(|| DEFAULT_FILL.to_owned())),
            color: Some(self.color.clone().unwrap_or_else(|| DEFAULT_COLOR.to_owned())),
        }
    }

    fn take_from(props: &mut Map<String, Value>) -> Self {
        Self { size: take_str(props, "size"), fill: take_str(props, "fill"), color: take_str(props, "color") }
    }

    fn write_into(self, props: &mut Map<String, Value>) {
        put_str(props, "size", self.size);
        put_str(props, "fill", self.fill);
        put_str(props, "color", self.color);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoProps {
    pub geo: GeoKind,
    pub style: ShapeStyle,
    /// Remaining props (`w`, `h`, `dash`, ...), carried across conversions.
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextProps {
    pub text: Option<String>,
    pub style: ShapeStyle,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Geo(GeoProps),
    Text(TextProps),
    /// Any other shape type (image, arrow, draw, ...). Never convertible.
    Other { type_name: String, props: Map<String, Value> },
}

impl ShapeKind {
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::Geo(_) => GEO_TYPE,
            Self::Text(_) => TEXT_TYPE,
            Self::Other { type_name, .. } => type_name,
        }
    }

    #[must_use]
    pub fn is_convertible(&self) -> bool {
        matches!(self, Self::Geo(_) | Self::Text(_))
    }

    /// Rewrite this kind as `target`, keeping style and unrelated props.
    ///
    /// # Errors
    ///
    /// Fails for non-convertible kinds and for the `image` target.
    pub fn convert(self, target: ShapeType) -> Result<Self, ConversionError> {
        match (self, target.geo_kind()) {
            (Self::Other { type_name, .. }, _) => Err(ConversionError::NotConvertible(type_name)),
            (Self::Geo(props), Some(geo)) => Ok(Self::Geo(GeoProps { geo, style: props.style.resolved(), extra: props.extra })),
            (Self::Text(props), Some(geo)) => Ok(Self::Geo(GeoProps { geo, style: props.style.resolved(), extra: props.extra })),
            // Any shape converted to text starts over with the placeholder.
            (Self::Geo(GeoProps { style, extra, .. }) | Self::Text(TextProps { style, extra, .. }), None)
                if target == ShapeType::Text =>
            {
                Ok(Self::Text(TextProps { text: Some(DEFAULT_TEXT.to_owned()), style: style.resolved(), extra }))
            }
            (_, None) => Err(ConversionError::UnsupportedTarget(target)),
        }
    }
}

/// A shape record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ShapeRecord", into = "ShapeRecord")]
pub struct Shape {
    pub id: ShapeId,
    pub parent_id: ParentId,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub kind: ShapeKind,
    /// Record fields outside the model (`typeName`, `index`, `opacity`, ...).
    pub meta: Map<String, Value>,
    pub(crate) omitted: Omitted,
}

/// Modelled fields that were missing from the wire record and hold defaults.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Omitted {
    x: bool,
    y: bool,
    rotation: bool,
    parent_id: bool,
    props: bool,
    geo: bool,
}

impl Shape {
    #[must_use]
    pub fn geo(id: ShapeId, parent_id: ParentId, x: f64, y: f64, props: GeoProps) -> Self {
        Self {
            id,
            parent_id,
            x,
            y,
            rotation: 0.0,
            kind: ShapeKind::Geo(props),
            meta: Map::new(),
            omitted: Omitted::default(),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    /// Convert to `target`, preserving id, position, rotation, and parent.
    ///
    /// # Errors
    ///
    /// See [`ShapeKind::convert`].
    pub fn convert(self, target: ShapeType) -> Result<Self, ConversionError> {
        let kind = self.kind.convert(target)?;
        let omitted = Omitted { geo: false, ..self.omitted };
        Ok(Self { kind, omitted, ..self })
    }
}

/// True when the selection is non-empty and every shape is `geo` or `text`.
#[must_use]
pub fn are_shapes_convertible(shapes: &[Shape]) -> bool {
    !shapes.is_empty() && shapes.iter().all(|shape| shape.kind.is_convertible())
}

// =============================================================================
// WIRE FORM
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShapeRecord {
    id: ShapeId,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<ParentId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    props: Option<Map<String, Value>>,
    #[serde(flatten)]
    meta: Map<String, Value>,
}

impl From<ShapeRecord> for Shape {
    fn from(record: ShapeRecord) -> Self {
        let mut omitted = Omitted {
            x: record.x.is_none(),
            y: record.y.is_none(),
            rotation: record.rotation.is_none(),
            parent_id: record.parent_id.is_none(),
            props: record.props.is_none(),
            geo: false,
        };
        let mut props = record.props.unwrap_or_default();
        let kind = match record.type_name.as_str() {
            GEO_TYPE => {
                let geo = take_str(&mut props, "geo");
                omitted.geo = geo.is_none();
                let geo = geo.map_or(GeoKind::Rectangle, GeoKind::from);
                let style = ShapeStyle::take_from(&mut props);
                ShapeKind::Geo(GeoProps { geo, style, extra: props })
            }
            TEXT_TYPE => {
                let text = take_str(&mut props, "text");
                let style = ShapeStyle::take_from(&mut props);
                ShapeKind::Text(TextProps { text, style, extra: props })
            }
            _ => ShapeKind::Other { type_name: record.type_name, props },
        };
        Self {
            id: record.id,
            parent_id: record.parent_id.unwrap_or_default(),
            x: record.x.unwrap_or_default(),
            y: record.y.unwrap_or_default(),
            rotation: record.rotation.unwrap_or_default(),
            kind,
            meta: record.meta,
            omitted,
        }
    }
}

impl From<Shape> for ShapeRecord {
    fn from(shape: Shape) -> Self {
        let omitted = shape.omitted;
        let (type_name, props) = match shape.kind {
            ShapeKind::Geo(geo) => {
                let mut props = geo.extra;
                if !(omitted.geo && geo.geo == GeoKind::Rectangle) {
                    props.insert("geo".to_owned(), Value::String(geo.geo.into()));
                }
                geo.style.write_into(&mut props);
                (GEO_TYPE.to_owned(), props)
            }
            ShapeKind::Text(text) => {
                let mut props = text.extra;
                put_str(&mut props, "text", text.text);
                text.style.write_into(&mut props);
                (TEXT_TYPE.to_owned(), props)
            }
            ShapeKind::Other { type_name, props } => (type_name, props),
        };
        Self {
            id: shape.id,
            type_name,
            x: unless_default(shape.x, omitted.x),
            y: unless_default(shape.y, omitted.y),
            rotation: unless_default(shape.rotation, omitted.rotation),
            parent_id: unless_default(shape.parent_id, omitted.parent_id),
            props: if omitted.props && props.is_empty() { None } else { Some(props) },
            meta: shape.meta,
        }
    }
}

/// A field that was absent on load is written back only once it has moved
/// off its default.
fn unless_default<T: PartialEq + Default>(value: T, omitted: bool) -> Option<T> {
    if omitted && value == T::default() { None } else { Some(value) }
}

fn take_str(props: &mut Map<String, Value>, key: &str) -> Option<String> {
    if !props.get(key).is_some_and(Value::is_string) {
        return None;
    }
    match props.remove(key) {
        Some(Value::String(value)) => Some(value),
        _ => None,
    }
}

fn put_str(props: &mut Map<String, Value>, key: &str, value: Option<String>) {
    if let Some(value) = value {
        props.insert(key.to_owned(), Value::String(value));
    }
}
