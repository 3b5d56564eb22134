//! End-to-end behavior of the calculator stage over an in-memory pipeline.

use std::cell::RefCell;
use std::rc::Rc;

use tagcalc::glam::DVec2;
use tagcalc::miette;
use tagcalc::{
    Attribute, Bounds, Calculator, CalculatorConfig, ConfigError, Member, MemberKind, Path, Point,
    Provenance, Record, Relation, Sink, Source, StageArgs, builtin_stages,
};

/// Two numeric attribute strings are "equal" when they differ by less
/// than this.
const TOLERANCE: f64 = 1e-5;

fn assert_close(value: &str, expected: f64) {
    let parsed: f64 = value.parse().expect("attribute should be numeric");
    assert!(
        (parsed - expected).abs() < TOLERANCE,
        "expected {expected}, got {parsed}"
    );
}

/// A handful of points around Munich, with elevations in meters.
fn sample_points() -> Vec<Point> {
    vec![
        Point::new(1, 48.1465401, 11.5932276).with_attribute("ele", "514.1383389311949"),
        Point::new(2, 48.1464602, 11.5957509).with_attribute("ele", "512.048113676798"),
        Point::new(3, 48.1453829, 11.5936378).with_attribute("ele", "516.1678756128005"),
    ]
}

fn transform_all(config: &CalculatorConfig, points: Vec<Point>) -> Vec<Point> {
    points.into_iter().map(|p| config.transform(p)).collect()
}

// ============================================================================
// Calculation
// ============================================================================

#[test]
fn constant_formula_applies_to_every_point() {
    let config = CalculatorConfig::new("", "constantTest", "13", "").unwrap();
    for point in transform_all(&config, sample_points()) {
        assert_eq!(point.attribute("constantTest"), Some("13"));
    }
}

#[test]
fn formula_lat_echoes_latitude_exactly() {
    let config = CalculatorConfig::new("lat", "simpleVarTest", "lat", "").unwrap();
    for point in transform_all(&config, sample_points()) {
        assert_eq!(
            point.attribute("simpleVarTest"),
            Some(point.lat().to_string().as_str())
        );
    }
}

#[test]
fn formula_lat_plus_constant() {
    let config = CalculatorConfig::new("lat", "varPlusSeven", "lat+7", "").unwrap();
    for point in transform_all(&config, sample_points()) {
        assert_close(point.attribute("varPlusSeven").unwrap(), point.lat() + 7.0);
    }
}

#[test]
fn formula_lat_minus_lon_respects_operand_order() {
    let config = CalculatorConfig::new("lat,lon", "latMinusLon", "lat-lon", "").unwrap();
    for point in transform_all(&config, sample_points()) {
        let value = point.attribute("latMinusLon").unwrap();
        assert_close(value, point.lat() - point.lon());
        // Subtraction must not be commuted
        let parsed: f64 = value.parse().unwrap();
        assert!((parsed - (point.lon() - point.lat())).abs() > TOLERANCE);
    }
}

#[test]
fn formula_average_of_lat_and_lon() {
    let config = CalculatorConfig::new("lat,lon", "nonsenseAverage", "(lat+lon)/2", "").unwrap();
    for point in transform_all(&config, sample_points()) {
        assert_close(
            point.attribute("nonsenseAverage").unwrap(),
            (point.lat() + point.lon()) / 2.0,
        );
    }
}

#[test]
fn whitespace_around_list_entries_is_ignored() {
    let config = CalculatorConfig::new(" lat , lon ", "out", "lat-lon", "").unwrap();
    let point = config.transform(Point::new(1, 48.0, 11.0));
    assert_close(point.attribute("out").unwrap(), 37.0);
}

// ============================================================================
// Deletion
// ============================================================================

#[test]
fn removal_only_removes_exactly_the_named_attributes() {
    let config = CalculatorConfig::new("", "", "", "ele").unwrap();
    for point in transform_all(&config, sample_points()) {
        assert_eq!(point.attribute("ele"), None);
        // Nothing new is ever added in deletion-only mode
        assert!(point.attributes.is_empty());
    }
}

#[test]
fn removing_an_absent_attribute_is_a_no_op() {
    let config = CalculatorConfig::new("", "", "", "doesNotExist").unwrap();
    let before = sample_points();
    let after = transform_all(&config, before.clone());
    assert_eq!(before, after);
}

#[test]
fn removals_match_case_sensitively_but_output_does_not() {
    // Documented quirk: explicit removals compare exactly, while the
    // output attribute is replaced case-insensitively. "Ele" therefore
    // survives a removal of "ele", but "FOOT" is replaced by "foot".
    let config = CalculatorConfig::new("", "foot", "1", "ele").unwrap();
    let point = Point::new(1, 0.0, 0.0)
        .with_attribute("Ele", "514")
        .with_attribute("FOOT", "old");
    let point = config.transform(point);

    assert_eq!(point.attribute("Ele"), Some("514"));
    assert_eq!(point.attribute("FOOT"), None);
    assert_eq!(point.attribute("foot"), Some("1"));
}

// ============================================================================
// Calculation and deletion combined
// ============================================================================

#[test]
fn meters_to_feet_with_source_removed() {
    let config = CalculatorConfig::new("ele", "foot", "ele/0.3048", "ele").unwrap();
    let expected_feet = [1686.805574, 1679.94788, 1693.464159];

    for (point, expected) in transform_all(&config, sample_points())
        .into_iter()
        .zip(expected_feet)
    {
        assert_close(point.attribute("foot").unwrap(), expected);
        // The input was read before being removed
        assert_eq!(point.attribute("ele"), None);
    }
}

#[test]
fn recomputation_is_idempotent() {
    // The old output attribute is removed before the new one is written,
    // so running the same configuration twice converges instead of
    // accumulating duplicates.
    let config = CalculatorConfig::new("lat", "varTest", "lat+7", "").unwrap();

    let once = transform_all(&config, sample_points());
    let twice = transform_all(&config, once.clone());
    assert_eq!(once, twice);
}

#[test]
fn missing_declared_input_degrades_to_nan() {
    let config = CalculatorConfig::new("ele", "out", "ele*2", "").unwrap();
    let point = config.transform(Point::new(1, 48.0, 11.0));
    assert_eq!(point.attribute("out"), Some("NaN"));
}

// ============================================================================
// Construction failures
// ============================================================================

#[test]
fn empty_formula_and_empty_removals_fail() {
    assert!(matches!(
        CalculatorConfig::new("", "", "", ""),
        Err(ConfigError::NothingToDo)
    ));
}

#[test]
fn formula_without_output_name_fails() {
    assert!(matches!(
        CalculatorConfig::new("ele", "", "ele*2", ""),
        Err(ConfigError::MissingOutput)
    ));
}

#[test]
fn malformed_formula_fails_at_construction() {
    assert!(matches!(
        CalculatorConfig::new("ele", "out", "ele )", ""),
        Err(ConfigError::Formula(_))
    ));
}

// ============================================================================
// The stage in a pipeline
// ============================================================================

/// A sink whose collected records stay reachable after the stage takes
/// ownership of it.
#[derive(Clone, Default)]
struct SharedSink(Rc<RefCell<Vec<Record>>>);

impl SharedSink {
    fn records(&self) -> Vec<Record> {
        self.0.borrow().clone()
    }
}

impl Sink for SharedSink {
    fn process(&mut self, record: Record) -> miette::Result<()> {
        self.0.borrow_mut().push(record);
        Ok(())
    }
}

fn mixed_stream() -> Vec<Record> {
    vec![
        Record::Bounds(Bounds {
            min: DVec2::new(11.59, 48.14),
            max: DVec2::new(11.60, 48.15),
        }),
        Record::Point(Point::new(1, 48.1465401, 11.5932276).with_attribute("ele", "514.138")),
        Record::Path(Path {
            id: 100,
            provenance: Provenance::default(),
            attributes: vec![Attribute::new("highway", "residential")],
            point_ids: vec![1, 2],
        }),
        Record::Point(Point::new(2, 48.1464602, 11.5957509).with_attribute("ele", "512.048")),
        Record::Relation(Relation {
            id: 200,
            provenance: Provenance::default(),
            attributes: vec![Attribute::new("type", "route")],
            members: vec![Member {
                kind: MemberKind::Path,
                id: 100,
                role: "outer".to_string(),
            }],
        }),
    ]
}

#[test]
fn non_point_records_pass_through_unchanged_in_order() {
    let stream = mixed_stream();
    let config = CalculatorConfig::new("ele", "foot", "ele/0.3048", "ele").unwrap();
    let mut stage = Calculator::new(config, Vec::<Record>::new());

    let mut source = stream.clone();
    source.run(&mut stage).unwrap();
    let output = stage.into_inner();

    assert_eq!(output.len(), stream.len());
    // Bounds, path and relation cross the stage untouched, in position
    assert_eq!(output[0], stream[0]);
    assert_eq!(output[2], stream[2]);
    assert_eq!(output[4], stream[4]);
    // Points were transformed
    for record in [&output[1], &output[3]] {
        let Record::Point(point) = record else {
            panic!("expected a point, got {record:?}");
        };
        assert_eq!(point.attribute("ele"), None);
        assert!(point.attribute("foot").is_some());
    }
}

#[test]
fn registry_builds_the_stage_with_default_arguments() {
    // Defaults: calculation "42" stored under "demoAttr"
    let factory = builtin_stages()["calculate-point-attribute"];
    let collected = SharedSink::default();
    let mut stage = factory(&StageArgs::new(), Box::new(collected.clone())).unwrap();

    stage
        .process(Record::Point(
            Point::new(1, 48.0, 11.0).with_attribute("name", "LMU"),
        ))
        .unwrap();
    stage.complete().unwrap();

    let records = collected.records();
    assert_eq!(records.len(), 1);
    let Record::Point(point) = &records[0] else {
        panic!("expected a point");
    };
    insta::assert_snapshot!(
        format!("{:?}", point.attributes),
        @r#"[Attribute { name: "name", value: "LMU" }, Attribute { name: "demoAttr", value: "42" }]"#
    );
}

#[test]
fn registry_builds_the_stage_with_explicit_arguments() {
    let factory = builtin_stages()["calculate-point-attribute"];
    let collected = SharedSink::default();
    let args = StageArgs::new()
        .set("inputAttributes", "ele")
        .set("outputAttribute", "foot")
        .set("calculation", "ele/0.3048")
        .set("removeAttributes", "ele");
    let mut stage = factory(&args, Box::new(collected.clone())).unwrap();

    let mut source = vec![Record::Point(
        Point::new(1, 48.1465401, 11.5932276).with_attribute("ele", "514.1383389311949"),
    )];
    source.run(stage.as_mut()).unwrap();

    let records = collected.records();
    let Record::Point(point) = &records[0] else {
        panic!("expected a point");
    };
    assert_close(point.attribute("foot").unwrap(), 1686.805574);
    assert_eq!(point.attribute("ele"), None);
}
