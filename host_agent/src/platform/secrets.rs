use rand::{Rng as _, distr::Alphanumeric};

/// Length of generated service passwords.
const PASSWORD_LEN: usize = 32;

/// Generates a random alphanumeric password for a local service account.
#[must_use]
pub(super) fn generate_password() -> String {
    let mut rng = rand::rng();
    (0..PASSWORD_LEN)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}
