#![allow(missing_docs)]

use refcode::{
    shared, Date, EnumMember, List, Map, Refcode, RefcodeEnum, RefcodeObject, Set, Shared, Tuple,
    TypeRegistry, Value,
};
use std::rc::Rc;

#[derive(Default, RefcodeObject)]
#[refcode(namespace = "tests")]
struct Dummy {
    name: String,
    related: Option<Shared<Dummy>>,
    related_ls: List,
    any_list_1: Option<List>,
    any_list_2: Option<List>,
}

#[derive(Default, RefcodeObject)]
#[refcode(namespace = "tests")]
struct DummyDate {
    d: Option<Date>,
    dict: Map,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, RefcodeEnum)]
#[refcode(namespace = "tests")]
enum Kind {
    Meeting = 1,
    Call = 2,
}

#[derive(Default, RefcodeObject)]
#[refcode(namespace = "tests")]
struct Event {
    title: String,
    kind: Option<Kind>,
    backup: Option<Kind>,
    tags: Option<Set>,
    slot: Option<Tuple>,
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .register_record::<Dummy>()
        .register_record::<DummyDate>()
        .register_record::<Event>()
        .register_enum::<Kind>();
    registry
}

fn dummy(name: &str) -> Shared<Dummy> {
    shared(Dummy {
        name: name.to_owned(),
        ..Dummy::default()
    })
}

fn roundtrip<T: refcode::rt::FromValue>(root: Value) -> refcode::Result<T> {
    let text = Refcode::encode(&root)?;
    Refcode::decode_as(&text, &registry())
}

fn related(d: &Shared<Dummy>) -> Shared<Dummy> {
    d.borrow().related.clone().expect("related is set")
}

fn item_record(list: &List, index: usize) -> Shared<Dummy> {
    list.get(index)
        .and_then(|v| v.to_record::<Dummy>())
        .expect("list element is a Dummy")
}

// --- TESTS ---

/// Mutual Cycle
/// `a.related = b`, `b.related = a` must come back as the same two instances.
#[test]
fn test_mutual_cycle() -> refcode::Result<()> {
    let a = dummy("AAA");
    let b = dummy("BBB");
    a.borrow_mut().related = Some(b.clone());
    b.borrow_mut().related = Some(a.clone());

    let decoded_a: Shared<Dummy> = roundtrip(a.clone().into())?;
    let decoded_b = related(&decoded_a);

    assert_eq!(decoded_a.borrow().name, "AAA");
    assert_eq!(decoded_b.borrow().name, "BBB");
    assert!(Rc::ptr_eq(&related(&decoded_b), &decoded_a));
    assert!(!Rc::ptr_eq(&decoded_a, &a));

    a.borrow_mut().related = None;
    decoded_a.borrow_mut().related = None;
    Ok(())
}

/// Direct Self Cycle
#[test]
fn test_self_reference() -> refcode::Result<()> {
    let a = dummy("self");
    a.borrow_mut().related = Some(a.clone());

    let decoded: Shared<Dummy> = roundtrip(a.clone().into())?;
    assert!(Rc::ptr_eq(&related(&decoded), &decoded));

    a.borrow_mut().related = None;
    decoded.borrow_mut().related = None;
    Ok(())
}

/// Self-Sharing Inside Collections
/// Both records list themselves and each other.
#[test]
fn test_ref_ls() -> refcode::Result<()> {
    let a = dummy("AAA");
    let b = dummy("BBB");
    for owner in [&a, &b] {
        let ls = owner.borrow().related_ls.clone();
        ls.push(a.clone());
        ls.push(b.clone());
    }

    let decoded_a: Shared<Dummy> = roundtrip(a.clone().into())?;
    let a_ls = decoded_a.borrow().related_ls.clone();
    let decoded_b = item_record(&a_ls, 1);
    let b_ls = decoded_b.borrow().related_ls.clone();

    assert!(Rc::ptr_eq(&item_record(&a_ls, 0), &decoded_a));
    assert!(Rc::ptr_eq(&item_record(&b_ls, 0), &decoded_a));
    assert!(Rc::ptr_eq(&item_record(&b_ls, 1), &decoded_b));
    assert!(!a_ls.ptr_eq(&b_ls));

    a.borrow().related_ls.borrow_mut().clear();
    b.borrow().related_ls.borrow_mut().clear();
    decoded_a.borrow().related_ls.borrow_mut().clear();
    decoded_b.borrow().related_ls.borrow_mut().clear();
    Ok(())
}

/// Shared Substructure Identity
/// The same list in two fields decodes to one list.
#[test]
fn test_ref_ls2() -> refcode::Result<()> {
    let a = dummy("AAA");
    let numbers = List::from_vec(vec![1.into(), 2.into(), 3.into()]);
    a.borrow_mut().any_list_1 = Some(numbers.clone());
    a.borrow_mut().any_list_2 = Some(numbers.clone());

    let decoded: Shared<Dummy> = roundtrip(a.into())?;
    let d = decoded.borrow();
    let (Some(first), Some(second)) = (&d.any_list_1, &d.any_list_2) else {
        panic!("both lists must decode");
    };

    assert!(first.ptr_eq(second));
    assert_eq!(first.to_vec(), numbers.to_vec());
    Ok(())
}

/// A list that contains itself.
#[test]
fn test_list_containing_itself() -> refcode::Result<()> {
    let list = List::new();
    list.push(7);
    list.push(list.clone());

    let text = Refcode::encode(&list.clone().into())?;
    let decoded = Refcode::decode(&text, &registry())?;
    let decoded = decoded.as_list().expect("root is a list").clone();

    assert_eq!(decoded.get(0), Some(Value::Int(7)));
    let inner = decoded.get(1).expect("second element");
    assert!(inner.as_list().is_some_and(|l| l.ptr_eq(&decoded)));

    list.borrow_mut().clear();
    decoded.borrow_mut().clear();
    Ok(())
}

fn is_list(value: Option<Value>, list: &List) -> bool {
    value.is_some_and(|v| v.as_list().is_some_and(|l| l.ptr_eq(list)))
}

fn is_set(value: Option<Value>, set: &Set) -> bool {
    value.is_some_and(|v| v.as_set().is_some_and(|s| s.ptr_eq(set)))
}

fn is_map(value: Option<Value>, map: &Map) -> bool {
    value.is_some_and(|v| v.as_map().is_some_and(|m| m.ptr_eq(map)))
}

/// Cycles through every container kind: a map holding itself, a list and a set holding
/// each other (the list is also a map key), a key list pointing back at the map, and a
/// shared tuple caught in a cycle through a list.
#[test]
fn test_container_cycles() -> refcode::Result<()> {
    let map = Map::new();
    let key_list = List::new();
    let set = Set::new();
    let back_key = List::new();
    let tuple_items = List::new();

    key_list.push(set.clone());
    set.insert(key_list.clone());
    back_key.push(map.clone());
    let tuple = Tuple::new(vec![tuple_items.clone().into(), "t".into()]);
    tuple_items.push(tuple.clone());

    map.insert("self", map.clone());
    map.insert(key_list.clone(), set.clone());
    map.insert(back_key, 1);
    map.insert("tuple", tuple.clone());
    map.insert("tuple_again", tuple);

    let text = Refcode::builder().compact().encode(&map.clone().into())?;
    assert!(text.starts_with(r#"{"__ci":"DW","__id":0,"ks":["self",{"__ci":"LW","__id":1"#));

    let decoded = Refcode::decode(&text, &registry())?;
    let decoded = decoded.as_map().expect("root is a map").clone();
    let entries = decoded.entries();
    assert_eq!(entries.len(), 5);

    // "self" -> the map itself
    assert_eq!(entries[0].0, Value::from("self"));
    assert!(is_map(Some(entries[0].1.clone()), &decoded));

    // key list <-> set
    let decoded_key = entries[1].0.as_list().expect("list key").clone();
    let decoded_set = entries[1].1.as_set().expect("set value").clone();
    assert!(is_set(decoded_key.get(0), &decoded_set));
    let members = decoded_set.to_vec();
    assert_eq!(members.len(), 1);
    assert!(is_list(members.first().cloned(), &decoded_key));

    // a key that refers back to the map
    let decoded_back = entries[2].0.as_list().expect("back key").clone();
    assert!(is_map(decoded_back.get(0), &decoded));
    assert_eq!(entries[2].1, Value::Int(1));

    // the shared tuple comes back as one list
    let decoded_tuple = entries[3].1.as_list().expect("tuple decodes as a list").clone();
    let decoded_items = decoded_tuple.get(0).and_then(|v| v.as_list().cloned()).expect("items");
    assert!(is_list(decoded_items.get(0), &decoded_tuple));
    assert_eq!(decoded_tuple.get(1), Some(Value::from("t")));
    assert!(is_list(Some(entries[4].1.clone()), &decoded_tuple));

    drop(entries);
    let lists = [
        &key_list,
        &tuple_items,
        &decoded_key,
        &decoded_items,
        &decoded_back,
        &decoded_tuple,
    ];
    for list in lists {
        list.borrow_mut().clear();
    }
    set.borrow_mut().clear();
    decoded_set.borrow_mut().clear();
    map.borrow_mut().clear();
    decoded.borrow_mut().clear();
    Ok(())
}

/// Date Round-Trip
#[test]
fn test_decode_date() -> refcode::Result<()> {
    let original = shared(DummyDate {
        d: Date::from_ymd(2024, 8, 3),
        dict: Map::new(),
    });

    let decoded: Shared<DummyDate> = roundtrip(original.into())?;
    let d = decoded.borrow().d.as_ref().map(Date::get);
    assert_eq!(d, chrono::NaiveDate::from_ymd_opt(2024, 8, 3));
    Ok(())
}

/// Mapping Keyed By Dates And Records
#[test]
fn test_date_and_record_keys() -> refcode::Result<()> {
    let day = Date::from_ymd(2024, 8, 3).expect("valid date");
    let key_record = dummy("key");
    let holder = shared(DummyDate {
        d: Some(day.clone()),
        dict: Map::new(),
    });
    {
        let h = holder.borrow();
        h.dict.insert(day.clone(), 4);
        h.dict.insert(key_record.clone(), "record value");
    }

    let decoded: Shared<DummyDate> = roundtrip(holder.into())?;
    let h = decoded.borrow();
    let entries = h.dict.entries();
    assert_eq!(entries.len(), 2);

    // The date is shared between `d` and the key, so both decode to one handle.
    let decoded_day = h.d.clone().expect("date is set");
    assert!(entries[0].0.as_date() == Some(day.get()));
    assert!(matches!(&entries[0].0, Value::Date(k) if k.ptr_eq(&decoded_day)));
    assert_eq!(entries[0].1, Value::Int(4));

    let decoded_key = entries[1].0.to_record::<Dummy>().expect("record key");
    assert_eq!(decoded_key.borrow().name, "key");
    assert_eq!(h.dict.get(&entries[1].0), Some(Value::from("record value")));
    Ok(())
}

/// Enumeration Identity
/// Members decode to the registered member of the same name.
#[test]
fn test_enum_members() -> refcode::Result<()> {
    let tags = Set::new();
    tags.insert("urgent");
    tags.insert(Kind::Meeting);
    let event = shared(Event {
        title: "standup".into(),
        kind: Some(Kind::Call),
        backup: Some(Kind::Call),
        tags: Some(tags),
        slot: Some(Tuple::new(vec![9.into(), 30.into()])),
    });

    let text = Refcode::encode(&event.into())?;
    assert_eq!(text.matches("\"__ci\": \"E\"").count(), 2);

    let decoded: Shared<Event> = Refcode::decode_as(&text, &registry())?;
    let e = decoded.borrow();
    assert_eq!(e.kind, Some(Kind::Call));
    assert_eq!(e.backup, Some(Kind::Call));

    let tags = e.tags.clone().expect("tags are set");
    assert!(tags.contains(&Value::from("urgent")));
    assert!(tags.contains(&Value::Enum(Kind::Meeting.to_enum_value())));

    let slot = e.slot.clone().expect("slot is set");
    assert_eq!(slot.items(), &[Value::Int(9), Value::Int(30)]);
    Ok(())
}

/// Acyclic Round-Trip
/// Deeply nested structures compare equal as graphs.
#[test]
fn test_acyclic_graph_eq() -> refcode::Result<()> {
    let inner = Map::new();
    inner.insert("pi", 3.5);
    inner.insert(1, Value::None);
    inner.insert(true, List::from_vec(vec!["x".into(), false.into()]));
    let root = List::from_vec(vec![
        inner.into(),
        dummy("leaf").into(),
        Value::from(-12),
        Value::from("text"),
    ]);
    let root = Value::from(root);

    let text = Refcode::encode(&root)?;
    let decoded = Refcode::decode(&text, &registry())?;
    assert!(root.graph_eq(&decoded));
    Ok(())
}

/// Scalar Roots
#[test]
fn test_scalar_roots() -> refcode::Result<()> {
    for value in [
        Value::None,
        Value::Bool(true),
        Value::Int(i64::MIN),
        Value::Float(0.25),
        Value::from("plain"),
    ] {
        let text = Refcode::encode(&value)?;
        assert_eq!(Refcode::decode(&text, &registry())?, value);
    }
    Ok(())
}
