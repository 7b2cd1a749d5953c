use rand::RngExt;

/// Room codes are always 6 characters.
pub const ROOM_CODE_LENGTH: usize = 6;

/// Code alphabet avoiding visually ambiguous characters (0, O, I, 1).
const ROOM_CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a random 6-character room code from the reduced alphabet.
///
/// Uniqueness is the registry's responsibility (rejection sampling against
/// the live table).
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LENGTH)
        .map(|_| {
            let idx = rng.random_range(0..ROOM_CODE_CHARS.len());
            // SAFETY: `idx` is produced by `random_range(0..len)`, so it is
            // always within [0, len).
            #[allow(clippy::indexing_slicing)]
            let ch = ROOM_CODE_CHARS[idx] as char;
            ch
        })
        .collect()
}

/// Check that a candidate code has the right length and alphabet.
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LENGTH
        && code.bytes().all(|b| ROOM_CODE_CHARS.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_code_length_and_alphabet() {
        for _ in 0..200 {
            let code = generate_room_code();
            assert_eq!(code.len(), ROOM_CODE_LENGTH);
            assert!(
                code.bytes().all(|b| ROOM_CODE_CHARS.contains(&b)),
                "unexpected character in {code}"
            );
        }
    }

    #[test]
    fn test_room_code_avoids_ambiguous_characters() {
        for _ in 0..200 {
            let code = generate_room_code();
            for forbidden in ['0', 'O', 'I', '1'] {
                assert!(!code.contains(forbidden), "{code} contains {forbidden}");
            }
        }
    }

    #[test]
    fn test_is_valid_room_code() {
        assert!(is_valid_room_code("ABC234"));
        assert!(!is_valid_room_code("ABC23")); // too short
        assert!(!is_valid_room_code("ABC2340")); // too long
        assert!(!is_valid_room_code("ABC10O")); // ambiguous characters
        assert!(!is_valid_room_code("abc234")); // lowercase
    }
}
