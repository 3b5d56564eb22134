//! Record model for the point stream
//!
//! Records flow through the pipeline in delivery order. Only points carry
//! attribute semantics the calculator cares about; everything else is an
//! opaque payload it forwards verbatim.

use glam::DVec2;

/// A named string-valued property attached to a record.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Versioning and provenance metadata.
///
/// Opaque to the calculator; preserved verbatim on every record it touches.
/// Timestamps are carried as strings and never interpreted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Provenance {
    pub version: u32,
    pub timestamp: Option<String>,
    pub author: Option<String>,
    pub changeset: i64,
}

/// A geolocated record: identity, coordinate, provenance, attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: i64,
    /// Geographic coordinate, stored as (lon, lat) to match the (x, y)
    /// convention.
    pub coord: DVec2,
    pub provenance: Provenance,
    pub attributes: Vec<Attribute>,
}

impl Point {
    pub fn new(id: i64, lat: f64, lon: f64) -> Self {
        Self {
            id,
            coord: DVec2::new(lon, lat),
            provenance: Provenance::default(),
            attributes: Vec::new(),
        }
    }

    pub fn lat(&self) -> f64 {
        self.coord.y
    }

    pub fn lon(&self) -> f64 {
        self.coord.x
    }

    /// Builder-style attribute attachment, mostly for tests and examples.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(name, value));
        self
    }

    /// Look up an attribute value by exact name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

/// Stream bounds marker: the bounding box of everything that follows.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    /// (lon, lat) of the south-west corner
    pub min: DVec2,
    /// (lon, lat) of the north-east corner
    pub max: DVec2,
}

/// An ordered sequence of points, referenced by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub id: i64,
    pub provenance: Provenance,
    pub attributes: Vec<Attribute>,
    pub point_ids: Vec<i64>,
}

/// A typed reference from a relation to another record.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub kind: MemberKind,
    pub id: i64,
    pub role: String,
}

/// The kind of record a relation member points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Point,
    Path,
    Relation,
}

/// A grouping of other records with roles.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub id: i64,
    pub provenance: Provenance,
    pub attributes: Vec<Attribute>,
    pub members: Vec<Member>,
}

/// One record in the stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Bounds(Bounds),
    Point(Point),
    Path(Path),
    Relation(Relation),
}
