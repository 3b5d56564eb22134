//! Streaming attribute calculator for geospatial point records.
//!
//! One stage in a record pipeline: for each point, optionally evaluate a
//! user-supplied arithmetic formula over the point's named attributes (plus
//! the built-in `lat`/`lon` pseudo-attributes), store the result under a new
//! attribute name, and optionally remove a set of attributes. Bounds, paths
//! and relations pass through untouched, in their original order.
//!
//! ```
//! use tagcalc::{CalculatorConfig, Point};
//!
//! let config = CalculatorConfig::new("ele", "foot", "ele/0.3048", "ele")?;
//! let point = Point::new(1, 48.1465401, 11.5932276).with_attribute("ele", "514.138");
//! let point = config.transform(point);
//! assert!(point.attribute("ele").is_none());
//! assert!(point.attribute("foot").is_some());
//! # Ok::<(), tagcalc::ConfigError>(())
//! ```

use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "formula.pest"]
pub struct FormulaParser;

pub mod ast;
pub mod calculator;
pub mod errors;
pub mod eval;
pub mod formula;
pub mod log;
pub mod model;
pub mod parse;
pub mod pipeline;

pub use glam;
pub use miette;

pub use calculator::{Calculator, CalculatorConfig};
pub use errors::{ConfigError, FormulaError};
pub use formula::{CompiledFormula, ExprEngine, FormulaEngine};
pub use model::{
    Attribute, Bounds, Member, MemberKind, Path, Point, Provenance, Record, Relation,
};
pub use pipeline::{Sink, Source, StageArgs, builtin_stages};
