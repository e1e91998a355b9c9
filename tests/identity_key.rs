use crd_graph::identity_key::IdentityKey;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

#[test]
fn keys_from_the_same_handle_are_equal() {
    let handle = Arc::new(17_i32);
    let first = IdentityKey::from_arc(&handle);
    let second = IdentityKey::from_arc(&handle);
    assert_eq!(first, second);
    assert!(!first.is_null());
    assert_eq!(first.address(), Arc::as_ptr(&handle) as usize);
}

#[test]
fn keys_from_different_handles_differ() {
    let one = Arc::new(1_i32);
    let two = Arc::new(1_i32);
    assert_ne!(IdentityKey::from_arc(&one), IdentityKey::from_arc(&two));
}

#[test]
fn weak_source_captures_the_live_address() {
    let handle = Arc::new("value".to_owned());
    let weak = Arc::downgrade(&handle);
    let from_weak = IdentityKey::from_weak(&weak);
    assert_eq!(from_weak, IdentityKey::from_arc(&handle));
}

#[test]
fn expired_weak_source_yields_the_null_key() {
    let weak: Weak<String> = {
        let handle = Arc::new("gone".to_owned());
        Arc::downgrade(&handle)
    };
    let key = IdentityKey::from_weak(&weak);
    assert!(key.is_null());
    assert_eq!(key, IdentityKey::null());
}

#[test]
fn key_outlives_its_referent() {
    let handle = Arc::new(5_u64);
    let key = IdentityKey::from_arc(&handle);
    drop(handle);
    // Still a perfectly usable value; only lookups against live objects
    // are meaningful.
    assert!(!key.is_null());
    assert_eq!(key, key);
}

#[test]
fn ordering_follows_addresses() {
    let one = Arc::new(0_i32);
    let two = Arc::new(0_i32);
    let key_one = IdentityKey::from_arc(&one);
    let key_two = IdentityKey::from_arc(&two);
    assert_eq!(key_one < key_two, key_one.address() < key_two.address());
    assert_eq!(key_one.cmp(&key_two), key_one.address().cmp(&key_two.address()));
}

#[test]
fn keys_work_as_hash_map_keys() {
    let a = Arc::new(1_i32);
    let b = Arc::new(2_i32);
    let mut map = HashMap::new();
    map.insert(IdentityKey::from_arc(&a), "a");
    map.insert(IdentityKey::from_arc(&b), "b");
    assert_eq!(map.get(&IdentityKey::from_arc(&a)), Some(&"a"));
    assert_eq!(map.get(&IdentityKey::from_arc(&b)), Some(&"b"));
    assert_eq!(map.len(), 2);
}

#[test]
fn keys_work_for_unsized_referents() {
    trait Marker: Send + Sync {}
    struct Impl;
    impl Marker for Impl {}

    let handle: Arc<dyn Marker> = Arc::new(Impl);
    let first = IdentityKey::from_arc(&handle);
    let second = IdentityKey::from_arc(&handle);
    assert_eq!(first, second);
    assert!(!first.is_null());
}
