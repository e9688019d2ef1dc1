use satchel_crypto::{MasterKey, KEY_SIZE};

#[test]
fn generate_produces_distinct_keys() {
    let a = MasterKey::generate();
    let b = MasterKey::generate();
    assert_ne!(a.as_bytes(), b.as_bytes());
}

#[test]
fn from_bytes_round_trip() {
    let bytes = [42u8; KEY_SIZE];
    let key = MasterKey::from_bytes(bytes);
    assert_eq!(key.as_bytes(), &bytes);
}

#[test]
fn base64_round_trip() {
    let key = MasterKey::generate();
    let restored = MasterKey::from_base64(&key.to_base64()).unwrap();
    assert_eq!(restored.as_bytes(), key.as_bytes());
}

#[test]
fn base64_rejects_wrong_length() {
    assert!(MasterKey::from_base64("c2hvcnQ").is_err());
}

#[test]
fn base64_rejects_garbage() {
    assert!(MasterKey::from_base64("!!! not base64 !!!").is_err());
}

#[test]
fn debug_redacts_key_material() {
    let key = MasterKey::from_bytes([9u8; KEY_SIZE]);
    let debug = format!("{key:?}");
    assert!(debug.contains("REDACTED"));
    assert!(!debug.contains('9'));
}
