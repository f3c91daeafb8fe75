//! Session id generation: `^ses_[a-z0-9]{12}$`.

const ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

pub fn new_session_id() -> String {
    format!("ses_{}", nanoid::nanoid!(12, &ALPHABET))
}

#[cfg(test)]
#[path = "ids.test.rs"]
mod tests;
