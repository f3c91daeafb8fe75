//! Id generation for the entities the loop creates during a run: messages
//! and parts. Unlike session ids (`forge_session::new_session_id`, which
//! must match the spec's literal `ses_[a-z0-9]{12}` regex), the spec leaves
//! message/part id shape unconstrained, so these just need to be unique.

pub fn new_message_id() -> String {
    format!("msg_{}", nanoid::nanoid!(12))
}

pub fn new_part_id() -> String {
    format!("part_{}", nanoid::nanoid!(12))
}
