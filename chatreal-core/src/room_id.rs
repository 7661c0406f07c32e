//! Room identifier generation and validation
//!
//! A room id has the shape `<millis>-<suffix>`: the wall-clock time in
//! milliseconds followed by seven lowercase base-36 characters. Ids are
//! generated locally and never checked by any server, so validation here is
//! purely a format check for the landing form.

use rand::Rng;

/// Number of random characters after the dash
pub const ROOM_SUFFIX_LEN: usize = 7;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a fresh room id from the current time and the thread RNG
pub fn generate_room_id() -> String {
    generate_room_id_with(
        chrono::Utc::now().timestamp_millis(),
        &mut rand::thread_rng(),
    )
}

/// Generate a room id from an explicit timestamp and RNG
pub fn generate_room_id_with<R: Rng + ?Sized>(timestamp_millis: i64, rng: &mut R) -> String {
    let suffix: String = (0..ROOM_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    // Pre-epoch clocks would put a '-' in the numeric part.
    format!("{}-{}", timestamp_millis.max(0), suffix)
}

/// Check a room id against `^\d+-[a-z0-9]{7}$`
pub fn is_valid_room_id(room_id: &str) -> bool {
    let Some((timestamp, suffix)) = room_id.split_once('-') else {
        return false;
    };

    !timestamp.is_empty()
        && timestamp.bytes().all(|b| b.is_ascii_digit())
        && suffix.len() == ROOM_SUFFIX_LEN
        && suffix
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}

/// Build the link that opens a room: `<origin><pathname>?room=<id>`
pub fn share_room_url(origin: &str, pathname: &str, room_id: &str) -> String {
    format!("{}{}?room={}", origin, pathname, room_id)
}

/// Local storage key marking a room as active in this instance
pub fn room_activity_key(room_id: &str) -> String {
    format!("room_{}_active", room_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_accepts_generated_format() {
        assert!(is_valid_room_id("1699999999999-ab12cd3"));
        assert!(is_valid_room_id("0-0000000"));
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert!(!is_valid_room_id("abc-123"));
        assert!(!is_valid_room_id(""));
        assert!(!is_valid_room_id("-ab12cd3"));
        assert!(!is_valid_room_id("1699999999999-ab12cd"));
        assert!(!is_valid_room_id("1699999999999-ab12cd34"));
        assert!(!is_valid_room_id("1699999999999-AB12CD3"));
        assert!(!is_valid_room_id("1699999999999ab12cd3"));
        assert!(!is_valid_room_id("1699999999999-ab1-cd3"));
        assert!(!is_valid_room_id(" 1699999999999-ab12cd3"));
        assert!(!is_valid_room_id("1699999999999-ab12cd3\n"));
        assert!(!is_valid_room_id("１２-ab12cd3"));
    }

    #[test]
    fn test_generated_ids_are_valid() {
        for _ in 0..500 {
            let id = generate_room_id();
            assert!(is_valid_room_id(&id), "generated invalid id {id}");
        }
    }

    #[test]
    fn test_generated_id_uses_timestamp() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = generate_room_id_with(1_700_000_000_123, &mut rng);
        assert!(id.starts_with("1700000000123-"));
        assert!(is_valid_room_id(&id));

        let clamped = generate_room_id_with(-5, &mut rng);
        assert!(clamped.starts_with("0-"));
        assert!(is_valid_room_id(&clamped));
    }

    #[test]
    fn test_share_room_url() {
        assert_eq!(
            share_room_url("https://chat.example", "/app/", "1699999999999-ab12cd3"),
            "https://chat.example/app/?room=1699999999999-ab12cd3"
        );
    }

    #[test]
    fn test_room_activity_key() {
        assert_eq!(room_activity_key("42-abcdefg"), "room_42-abcdefg_active");
    }
}
