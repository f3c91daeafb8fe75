#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;
use std::collections::HashSet;

#[test]
fn ids_match_expected_shape() {
    let id = new_session_id();
    assert!(id.starts_with("ses_"));
    let suffix = &id["ses_".len()..];
    assert_eq!(suffix.len(), 12);
    assert!(suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
}

#[test]
fn ids_are_not_obviously_colliding() {
    let ids: HashSet<String> = (0..200).map(|_| new_session_id()).collect();
    assert_eq!(ids.len(), 200);
}
