use rand::{distributions::Alphanumeric, Rng};

pub const ROOM_ID_LEN: usize = 12;

/// Random `[A-Za-z0-9]` token naming an appointment's video room.
pub fn generate_room_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ROOM_ID_LEN)
        .map(char::from)
        .collect()
}

pub fn video_room_url(base_url: &str, room_id: &str) -> String {
    format!("{}/?roomID={}", base_url.trim_end_matches('/'), room_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_room_ids_are_distinct_and_url_safe() {
        let ids: HashSet<String> = (0..10_000).map(|_| generate_room_id()).collect();
        assert_eq!(ids.len(), 10_000);
        assert!(ids
            .iter()
            .all(|id| id.len() == ROOM_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric())));
    }

    #[test]
    fn test_video_room_url() {
        assert_eq!(
            video_room_url("https://video.test/", "abc123"),
            "https://video.test/?roomID=abc123"
        );
    }
}
