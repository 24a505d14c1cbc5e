#![allow(missing_docs)]

use refcode::{shared, Date, List, Map, Refcode, RefcodeInspector, RefcodeObject, Shared, Value};

#[derive(Default, RefcodeObject)]
#[refcode(namespace = "inspect")]
struct Folder {
    title: String,
    children: List,
    parent: Option<Shared<Folder>>,
}

fn build_tree() -> Shared<Folder> {
    let root = shared(Folder {
        title: "root".into(),
        ..Folder::default()
    });
    for title in ["a", "b"] {
        let child = shared(Folder {
            title: title.into(),
            children: List::new(),
            parent: Some(root.clone()),
        });
        root.borrow().children.push(child);
    }
    root
}

#[test]
fn test_inspect_encoded_tree() -> refcode::Result<()> {
    let root = build_tree();
    let text = Refcode::encode(&root.clone().into())?;
    let report = RefcodeInspector::inspect(&text)?;

    assert_eq!(report.records, 3);
    assert_eq!(report.record_types.get("inspect/Folder"), Some(&3));
    // Each child points back at the root.
    assert_eq!(report.references, 2);
    assert_eq!(report.declared_ids, 3);
    // root.children plus one empty list per child.
    assert_eq!(report.bare_arrays, 3);
    assert!(report.is_consistent());
    // record > children array > child record > parent ref
    assert_eq!(report.max_depth, 4);

    root.borrow().children.borrow_mut().clear();
    Ok(())
}

#[test]
fn test_inspect_wrappers() -> refcode::Result<()> {
    let day = Date::from_ymd(2020, 2, 29).expect("valid date");
    let map = Map::new();
    map.insert(day.clone(), day);
    let list = List::from_vec(vec![map.clone().into(), map.into()]);

    let report = RefcodeInspector::inspect(&Refcode::encode(&list.into())?)?;
    assert_eq!(report.bare_arrays, 1);
    assert_eq!(report.mappings, 1);
    assert_eq!(report.dates, 1);
    assert_eq!(report.references, 2);
    assert_eq!(report.declared_ids, 2);
    assert_eq!(report.records, 0);
    Ok(())
}

#[test]
fn test_inspect_problems() -> refcode::Result<()> {
    let doc = r#"[{"__r": 1}, {"__ci": "LW", "__id": 1, "ls": [{"__r": 7}]}, {"__ci": "??"}]"#;
    let report = RefcodeInspector::inspect(doc)?;

    assert_eq!(report.forward_references, vec![1]);
    assert_eq!(report.undeclared_references, vec![7]);
    assert_eq!(report.unknown_tags, vec!["??".to_owned()]);
    assert!(!report.is_consistent());

    let rendered = report.to_string();
    assert!(rendered.contains("REFCODE INSPECTOR REPORT"));
    assert!(rendered.contains("forward reference to #1"));
    assert!(rendered.contains("unknown tag '??'"));
    Ok(())
}

#[test]
fn test_inspect_file_and_serialize() -> refcode::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scalar.json");
    Refcode::encode_to_file(&path, &Value::from("just text"))?;

    let report = RefcodeInspector::inspect_file(&path)?;
    assert_eq!(report.scalars, 1);
    assert_eq!(report.max_depth, 1);

    let json = serde_json::to_value(&report)?;
    assert_eq!(json["scalars"], 1);
    Ok(())
}
