/// Max length of a requester name.
pub const MAX_NAME_LEN: usize = 200;

/// Max length of a requester email.
pub const MAX_EMAIL_LEN: usize = 254;

/// Max length of the purpose text.
pub const MAX_PURPOSE_LEN: usize = 2_000;

/// Room size.
pub const MAX_ATTENDEES: u32 = 20;

/// Identifier sequence numbers are rendered with three digits.
pub const MAX_SEQUENCE_PER_DAY: u32 = 999;
