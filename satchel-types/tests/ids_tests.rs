use satchel_types::{Cursor, FileId};
use std::str::FromStr;

#[test]
fn file_id_display_parse_round_trip() {
    let id = FileId::new();
    let parsed = FileId::from_str(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn file_id_serde_is_transparent() {
    let id = FileId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
    let back: FileId = serde_json::from_str(&json).unwrap();
    assert_eq!(id, back);
}

#[test]
fn file_ids_are_time_ordered() {
    // UUID v7 embeds a timestamp, so ids created in sequence sort in sequence.
    let a = FileId::new();
    let b = FileId::new();
    assert!(a <= b);
}

#[test]
fn cursor_zero_is_default() {
    assert_eq!(Cursor::default(), Cursor::ZERO);
    assert_eq!(Cursor::ZERO.value(), 0);
}

#[test]
fn cursor_max_never_regresses() {
    let at_five = Cursor::new(5);
    assert_eq!(at_five.max(Cursor::new(3)), at_five);
    assert_eq!(at_five.max(Cursor::new(8)), Cursor::new(8));
    assert_eq!(at_five.max(at_five), at_five);
}

#[test]
fn cursor_serde_is_transparent() {
    let json = serde_json::to_string(&Cursor::new(42)).unwrap();
    assert_eq!(json, "42");
}
