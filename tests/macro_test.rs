#![allow(missing_docs)]

use refcode::rt::{FromValue, ToValue};
use refcode::{
    shared, EnumMember, Record, Refcode, RefcodeError, RefcodeEnum, RefcodeObject, Shared,
    TypeRegistry, Value,
};

#[derive(Default, RefcodeObject)]
struct Plain {
    count: i32,
}

#[derive(Default, RefcodeObject)]
#[refcode(namespace = "geo", name = "Pt")]
struct Point {
    #[refcode(rename = "X")]
    x: f64,
    y: f64,
    #[refcode(skip)]
    cache: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, RefcodeEnum)]
#[refcode(namespace = "geo")]
enum Axis {
    #[refcode(rename = "horizontal")]
    X,
    Y = 5,
    Z,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, RefcodeEnum)]
#[refcode(namespace = "geo")]
#[repr(u64)]
enum Scale {
    Unit = 1,
    Huge = 4_500_000_000_000_000_000,
}

#[test]
fn test_default_namespace_is_module_path() {
    let canonical = Plain::canonical_type();
    assert_eq!(canonical.namespace(), module_path!());
    assert_eq!(canonical.name(), "Plain");
}

#[test]
fn test_container_attributes() {
    assert_eq!(Point::canonical_type().to_string(), "geo/Pt");
    assert_eq!(Axis::canonical_type().to_string(), "geo/Axis");
}

#[test]
fn test_fields_rename_and_skip() {
    let point = Point {
        x: 1.5,
        y: -2.0,
        cache: Some("stale".into()),
    };
    let names: Vec<&str> = point.fields().into_iter().map(|(name, _)| name).collect();
    assert_eq!(names, vec!["X", "y"]);
}

#[test]
fn test_set_field() -> refcode::Result<()> {
    let mut point = Point::default();
    assert!(point.set_field("X", Value::Float(3.0))?);
    assert!(point.set_field("y", Value::Int(4))?);
    assert!(!point.set_field("x", Value::Float(9.0))?);
    assert!(!point.set_field("cache", Value::from("ignored"))?);
    assert_eq!((point.x, point.y), (3.0, 4.0));
    assert_eq!(point.cache, None);

    let err = point.set_field("y", Value::from("four")).unwrap_err();
    assert!(matches!(err, RefcodeError::FieldMismatch { ref record, .. } if record == "geo/Pt"));
    Ok(())
}

#[test]
fn test_enum_members() {
    assert_eq!(Axis::X.member_name(), "horizontal");
    assert_eq!(Axis::Y.member_value(), 5);
    assert_eq!(Axis::Z.member_value(), 6);
    assert_eq!(Axis::Z.declaration_index(), 2);
    assert_eq!(Axis::from_member_name("horizontal"), Some(Axis::X));
    assert_eq!(Axis::from_member_name("X"), None);

    let value = Axis::Y.to_value();
    assert_eq!(Axis::from_value(value).ok(), Some(Axis::Y));
    assert!(matches!(
        Axis::from_value(Value::Int(5)),
        Err(RefcodeError::ValueMismatch { .. })
    ));
}

/// Wide discriminants that still fit the wire integer keep their value.
#[test]
fn test_u64_enum_in_range() -> refcode::Result<()> {
    assert_eq!(Scale::Unit.member_value(), 1);
    assert_eq!(Scale::Huge.member_value(), 4_500_000_000_000_000_000);

    let mut registry = TypeRegistry::new();
    registry.register_enum::<Scale>();
    let text = Refcode::builder().compact().encode(&Scale::Huge.into())?;
    assert!(text.contains("4500000000000000000"));
    let decoded: Scale = Refcode::decode_as(&text, &registry)?;
    assert_eq!(decoded, Scale::Huge);
    Ok(())
}

#[test]
fn test_enum_attributes_on_the_wire() -> refcode::Result<()> {
    let text = Refcode::builder().compact().encode(&Axis::X.into())?;
    assert_eq!(
        text,
        r#"{"__ci":"E","__cci":"geo/Axis","ks":["_value_","_name_"],"vs":[0,"horizontal"],"__id":0}"#
    );

    let mut registry = TypeRegistry::new();
    registry.register_enum::<Axis>();
    let decoded: Axis = Refcode::decode_as(&text, &registry)?;
    assert_eq!(decoded, Axis::X);
    Ok(())
}

#[test]
fn test_skipped_field_roundtrip() -> refcode::Result<()> {
    let point = shared(Point {
        x: 1.0,
        y: 2.0,
        cache: Some("not written".into()),
    });
    let text = Refcode::encode(&point.into())?;
    assert!(!text.contains("not written"));

    let mut registry = TypeRegistry::new();
    registry.register_record::<Point>();
    let decoded: Shared<Point> = Refcode::decode_as(&text, &registry)?;
    assert_eq!(decoded.borrow().x, 1.0);
    assert_eq!(decoded.borrow().cache, None);
    Ok(())
}

#[test]
fn test_downcast_wrong_record() {
    let value: Value = shared(Plain { count: 1 }).into();
    assert!(value.to_record::<Point>().is_none());
    assert!(matches!(
        Shared::<Point>::from_value(value),
        Err(RefcodeError::ValueMismatch { .. })
    ));
}
