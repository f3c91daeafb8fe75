#![allow(clippy::unwrap_used, clippy::expect_used)]
use super::*;
use forge_protocol::MessageRole;

fn messages(n: usize) -> Vec<Message> {
    (0..n)
        .map(|i| {
            let role = if i % 2 == 0 {
                MessageRole::User
            } else {
                MessageRole::Assistant
            };
            Message::new(format!("msg_{i}"), "ses_1", role, i as i64)
        })
        .collect()
}

#[test]
fn available_turns_counts_complete_pairs() {
    assert_eq!(available_turns(&messages(0)), 0);
    assert_eq!(available_turns(&messages(1)), 0);
    assert_eq!(available_turns(&messages(2)), 1);
    assert_eq!(available_turns(&messages(4)), 2);
}

#[test]
fn turns_to_undo_is_zero_with_fewer_than_two_turns() {
    assert_eq!(turns_to_undo(&messages(0), 1), 0);
    assert_eq!(turns_to_undo(&messages(2), 1), 0);
}

#[test]
fn turns_to_undo_never_removes_the_only_remaining_turn() {
    let msgs = messages(4);
    assert_eq!(turns_to_undo(&msgs, 5), 1);
    assert_eq!(turns_to_undo(&msgs, 1), 1);
}

#[test]
fn target_message_count_truncates_by_two_per_turn() {
    let msgs = messages(4);
    assert_eq!(target_message_count(&msgs, 1), 2);
    assert_eq!(target_message_count(&msgs, 0), 4);
}
