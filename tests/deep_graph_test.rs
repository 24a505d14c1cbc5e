#![allow(missing_docs)]

//! Deep graphs on the default test thread. Each test takes its own graphs apart before
//! dropping them, since dropping a long `Rc` chain recurses in user code.

use refcode::rt::FromValue;
use refcode::{shared, List, Refcode, RefcodeInspector, RefcodeObject, Shared, TypeRegistry, Value};
use std::rc::Rc;

const DEPTH: usize = 5_000;

#[derive(Default, RefcodeObject)]
#[refcode(namespace = "deep")]
struct Link {
    index: i64,
    next: Option<Shared<Link>>,
}

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.register_record::<Link>();
    registry
}

fn chain(len: usize) -> Shared<Link> {
    let head = shared(Link::default());
    let mut tail = head.clone();
    for index in 1..len {
        let next = shared(Link {
            index: index as i64,
            next: None,
        });
        tail.borrow_mut().next = Some(next.clone());
        tail = next;
    }
    head
}

fn walk(head: &Shared<Link>, steps: usize) -> Shared<Link> {
    let mut current = head.clone();
    for _ in 0..steps {
        let next = current.borrow().next.clone().expect("chain continues");
        current = next;
    }
    current
}

/// Detaches every link, so the chain (or ring) is freed one record at a time.
fn unlink(head: Shared<Link>) {
    let mut current = Some(head);
    while let Some(link) = current {
        current = link.borrow_mut().next.take();
    }
}

/// Empties every nested list, so the nesting is freed one level at a time.
fn empty_lists(root: List) {
    let mut pending = vec![root];
    while let Some(list) = pending.pop() {
        let items = std::mem::take(&mut *list.borrow_mut());
        pending.extend(items.iter().filter_map(|item| item.as_list().cloned()));
    }
}

/// A document nested `depth` records deep, written by hand.
fn nested_document(depth: usize) -> String {
    let mut text = String::new();
    for index in 0..depth {
        text.push_str(&format!(
            r#"{{"__id":{index},"__ci":"deep/Link","index":{index},"next":"#
        ));
    }
    text.push_str("null");
    text.push_str(&"}".repeat(depth));
    text
}

// --- TESTS ---

#[test]
fn test_long_record_chain() -> refcode::Result<()> {
    let head = chain(DEPTH);
    let text = Refcode::builder().compact().encode(&head.clone().into())?;

    let decoded: Shared<Link> = Refcode::decode_as(&text, &registry())?;
    let last = walk(&decoded, DEPTH - 1);
    assert_eq!(last.borrow().index, (DEPTH - 1) as i64);
    assert!(last.borrow().next.is_none());

    let report = RefcodeInspector::inspect(&text)?;
    assert_eq!(report.records, DEPTH);
    assert_eq!(report.max_depth, DEPTH + 1);

    unlink(head);
    unlink(decoded);
    Ok(())
}

#[test]
fn test_hand_written_deep_document() -> refcode::Result<()> {
    let text = nested_document(DEPTH);

    let decoded: Shared<Link> = Refcode::decode_as(&text, &registry())?;
    assert_eq!(walk(&decoded, DEPTH - 1).borrow().index, (DEPTH - 1) as i64);

    let mut buffer = Vec::new();
    Refcode::builder().compact().write(&mut buffer, &decoded.clone().into())?;
    let reread = Refcode::read(buffer.as_slice(), &registry())?;
    let reread: Shared<Link> = FromValue::from_value(reread)?;
    assert_eq!(walk(&reread, DEPTH - 1).borrow().index, (DEPTH - 1) as i64);

    unlink(decoded);
    unlink(reread);
    Ok(())
}

#[test]
fn test_long_ring() -> refcode::Result<()> {
    let head = chain(DEPTH);
    walk(&head, DEPTH - 1).borrow_mut().next = Some(head.clone());

    let text = Refcode::builder().compact().encode(&head.clone().into())?;
    assert_eq!(text.matches("__r").count(), 1);

    let decoded: Shared<Link> = Refcode::decode_as(&text, &registry())?;
    let around = walk(&decoded, DEPTH);
    assert!(Rc::ptr_eq(&around, &decoded));

    let original: Value = head.clone().into();
    let copy: Value = decoded.clone().into();
    assert!(original.graph_eq(&copy));

    drop((around, original, copy));
    unlink(head);
    unlink(decoded);
    Ok(())
}

#[test]
fn test_deeply_nested_lists() -> refcode::Result<()> {
    let root = List::new();
    let mut current = root.clone();
    for _ in 0..DEPTH {
        let inner = List::new();
        current.push(inner.clone());
        current = inner;
    }
    current.push("bottom");
    drop(current);

    let text = Refcode::builder().compact().encode(&root.clone().into())?;
    assert!(text.starts_with("[[[["));

    let decoded = Refcode::decode(&text, &registry())?;
    let decoded = decoded.as_list().expect("root is a list").clone();
    let mut level = decoded.clone();
    for _ in 0..DEPTH {
        let next = level.get(0).and_then(|v| v.as_list().cloned()).expect("nested list");
        level = next;
    }
    assert_eq!(level.get(0), Some(Value::from("bottom")));
    drop(level);

    empty_lists(root);
    empty_lists(decoded);
    Ok(())
}
