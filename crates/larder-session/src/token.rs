//! Session token generation.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Number of characters in a session token (about 190 bits of entropy).
pub const TOKEN_LEN: usize = 32;

/// Mint a fresh random session token.
///
/// Drawn from the thread-local CSPRNG over the 62-symbol alphanumeric
/// alphabet, so tokens are safe to use in cookies and URLs as-is.
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_token_shape() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_tokens_are_distinct() {
        let tokens: HashSet<String> = (0..1000).map(|_| generate_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }
}
