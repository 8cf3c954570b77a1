use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

pub const TOKEN_LEN: usize = 32;

/// Opaque random token from the OS CSPRNG. Used for both bearer tokens and
/// password-reset tokens.
pub fn generate() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}
