//! The fast-key protocol across containers, histories, and promotions.

use marten_props::{PropertyKey, Shape, SlotMapContainer, Value, attrs};
use std::sync::Arc;

fn filled(root: &Arc<Shape>, names: &[&str]) -> SlotMapContainer {
    let mut c = SlotMapContainer::new(Arc::clone(root));
    for (i, name) in names.iter().enumerate() {
        c.modify(&PropertyKey::name(name), attrs::EMPTY)
            .set_value(Value::from(i as i32), true)
            .unwrap();
    }
    c
}

#[test]
fn token_minted_on_one_object_reads_another_with_the_same_history() {
    let root = Shape::root();
    let a = filled(&root, &["one", "two", "three"]);
    let b = filled(&root, &["one", "two", "three"]);

    let token = a.fast_query_key(&PropertyKey::name("two")).unwrap();
    for c in [&a, &b] {
        assert!(token.is_compatible(c));
        assert_eq!(*c.query_fast(token.position()).unwrap().value(), Value::from(1));
    }
}

#[test]
fn divergence_invalidates_on_one_side_only() {
    let root = Shape::root();
    let a = filled(&root, &["one", "two", "three"]);
    let mut b = filled(&root, &["one", "two", "three"]);

    let token = a.fast_query_key(&PropertyKey::name("one")).unwrap();
    b.modify(&PropertyKey::name("four"), attrs::EMPTY);

    assert!(token.is_compatible(&a));
    assert!(!token.is_compatible(&b));

    // The fallback path re-mints against the new layout.
    let fresh = b.fast_query_key(&PropertyKey::name("one")).unwrap();
    assert!(fresh.is_compatible(&b));
    assert!(!fresh.is_compatible(&a));
    assert_eq!(fresh.position(), token.position());
}

#[test]
fn modify_fast_writes_through_a_valid_token() {
    let root = Shape::root();
    let mut c = filled(&root, &["x", "y"]);
    let token = c.fast_query_key(&PropertyKey::name("y")).unwrap();

    assert!(token.is_compatible(&c));
    c.modify_fast(token.position())
        .unwrap()
        .set_value_unchecked(Value::from(99));
    assert_eq!(
        *c.query(&PropertyKey::name("y")).unwrap().value(),
        Value::from(99)
    );
}

#[test]
fn embedded_tokens_track_the_fingerprint() {
    let root = Shape::root();
    // An index key pushes both containers onto the embedded representation.
    let mut a = filled(&root, &["first"]);
    let mut b = filled(&root, &["first"]);
    a.modify(&PropertyKey::index(5), attrs::EMPTY);
    b.modify(&PropertyKey::index(5), attrs::EMPTY);

    let token = a.fast_query_key(&PropertyKey::name("first")).unwrap();
    assert!(token.is_compatible(&a));
    assert!(token.is_compatible(&b));
    assert_eq!(
        *b.query_fast(token.position()).unwrap().value(),
        Value::from(0)
    );

    // Any insert inside the fingerprinted prefix changes the layout hash.
    b.modify(&PropertyKey::name("second"), attrs::EMPTY);
    assert!(token.is_compatible(&a));
    assert!(!token.is_compatible(&b));
}

#[test]
fn inserts_past_the_prefix_leave_tokens_valid() {
    let root = Shape::root();
    let mut a = filled(&root, &["lead"]);
    let mut b = filled(&root, &["lead"]);
    a.modify(&PropertyKey::index(0), attrs::EMPTY);
    b.modify(&PropertyKey::index(0), attrs::EMPTY);
    // Fill both out to the fingerprinted prefix.
    for i in 0..14 {
        let key = PropertyKey::name(&format!("pad{i}"));
        a.modify(&key, attrs::EMPTY);
        b.modify(&key, attrs::EMPTY);
    }

    let token = a.fast_query_key(&PropertyKey::name("lead")).unwrap();
    assert!(token.is_compatible(&b));

    // Later inserts land past the prefix and do not disturb the hash.
    for i in 0..20 {
        b.modify(&PropertyKey::name(&format!("extra{i}")), attrs::EMPTY);
    }
    assert!(token.is_compatible(&b));
    assert_eq!(
        *b.query_fast(token.position()).unwrap().value(),
        Value::from(0)
    );
}

#[test]
fn no_token_past_the_fingerprint_prefix() {
    let root = Shape::root();
    let mut c = filled(&root, &["head"]);
    c.modify(&PropertyKey::index(0), attrs::EMPTY);
    for i in 0..20 {
        c.modify(&PropertyKey::name(&format!("tail{i}")), attrs::EMPTY);
    }

    // Early positions still get tokens; late ones do not.
    assert!(c.fast_query_key(&PropertyKey::name("head")).is_some());
    assert!(c.fast_query_key(&PropertyKey::name("tail19")).is_none());
}

#[test]
fn any_delete_kills_embedded_tokens_for_good() {
    let root = Shape::root();
    let mut c = filled(&root, &["a", "b"]);
    c.modify(&PropertyKey::index(0), attrs::EMPTY);

    let token = c.fast_query_key(&PropertyKey::name("a")).unwrap();
    c.remove(&PropertyKey::name("b"));
    assert!(!token.is_compatible(&c));
    // And no new tokens are minted either.
    assert!(c.fast_query_key(&PropertyKey::name("a")).is_none());
}

#[test]
fn promotion_to_hash_ends_the_protocol() {
    let root = Shape::root();
    let mut c = SlotMapContainer::with_capacity(Arc::clone(&root), 100);
    for i in 0..SlotMapContainer::LARGE_THRESHOLD + 1 {
        c.modify(&PropertyKey::name(&format!("p{i}")), attrs::EMPTY);
    }
    assert!(c.fast_query_key(&PropertyKey::name("p0")).is_none());
}
