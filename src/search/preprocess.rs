//! Text a hotel is embedded from.
//!
//! The description followed by the amenity tags, separated by single spaces.
//! The content hash keys the embedding cache so edits to either field re-embed.

use sha2::{Digest, Sha256};

/// Embedding input for a hotel: `"{description} {amenity amenity ...}"`.
pub fn hotel_text(description: &str, amenities: &[String]) -> String {
    format!("{} {}", description, amenities.join(" "))
}

/// SHA256 of the embedding input.
pub fn content_hash(text: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hotel_text_joins_amenities() {
        let amenities = vec!["wifi".to_string(), "spa".to_string()];
        assert_eq!(
            hotel_text("luxury spa retreat", &amenities),
            "luxury spa retreat wifi spa"
        );
    }

    #[test]
    fn test_hotel_text_without_amenities() {
        assert_eq!(hotel_text("budget stay", &[]), "budget stay ");
    }

    #[test]
    fn test_content_hash_consistency() {
        assert_eq!(content_hash("budget stay wifi"), content_hash("budget stay wifi"));
        assert_ne!(content_hash("budget stay wifi"), content_hash("budget stay pool"));
    }
}
