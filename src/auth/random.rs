use rand::{Rng, distributions::Alphanumeric, thread_rng};

/// 43 alphanumeric characters carry a little over 256 bits.
pub const OPAQUE_TOKEN_LEN: usize = 43;

/// Opaque token for refresh sessions and OAuth state.
pub fn opaque_token() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(OPAQUE_TOKEN_LEN)
        .map(char::from)
        .collect()
}
