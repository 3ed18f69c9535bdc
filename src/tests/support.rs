//! Shared fixtures: deterministic embedding providers and corpus builders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::app::App;
use crate::bookings::{self, Customer, CustomerCreate};
use crate::config::Config;
use crate::hotels::{self, Hotel, HotelCreate, RoomCreate};
use crate::search::{
    EmbeddingCache, EmbeddingError, EmbeddingProvider, HotelSnapshot, HybridRanker,
};

/// Creates an isolated App in a unique temp directory, ranking with `provider`.
pub fn create_app(provider: Arc<dyn EmbeddingProvider>) -> (App, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let base_path = tmp.path().to_str().unwrap();

    let config = Config::load_with(base_path).expect("failed to load config");
    let hotel_mgr = Arc::new(hotels::BackendCsv::load(base_path).expect("failed to load hotels"));
    let booking_mgr =
        Arc::new(bookings::BackendCsv::load(base_path).expect("failed to load bookings"));
    let ranker = HybridRanker::new(provider)
        .with_threshold(config.search.threshold)
        .with_cache(Arc::new(EmbeddingCache::new()));

    (App::new(hotel_mgr, booking_mgr, ranker, config), tmp)
}

/// Adds a hotel with one room per price.
pub fn add_hotel(
    app: &App,
    name: &str,
    location: &str,
    rating: f64,
    description: &str,
    amenities: &[&str],
    prices: &[f64],
) -> Hotel {
    let hotel = app
        .create_hotel(HotelCreate {
            name: name.to_string(),
            location: location.to_string(),
            description: description.to_string(),
            rating: Some(rating),
            amenities: amenities.iter().map(|a| a.to_string()).collect(),
            image: None,
        })
        .unwrap();

    for price in prices {
        app.create_room(RoomCreate {
            hotel_id: hotel.id,
            room_type: "Double".to_string(),
            price: *price,
            available: true,
        })
        .unwrap();
    }

    hotel
}

pub fn add_customer(app: &App, name: &str) -> Customer {
    app.register(CustomerCreate {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        phone: String::new(),
    })
    .unwrap()
}

pub fn snapshot(id: u64, description: &str, amenities: &[&str]) -> HotelSnapshot {
    HotelSnapshot {
        hotel: Hotel {
            id,
            name: format!("Hotel {id}"),
            description: description.to_string(),
            amenities: amenities.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        },
        room_prices: vec![],
    }
}

/// Maps exact texts to fixed vectors; anything else gets the fallback.
pub struct StaticEmbedding {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
    calls: AtomicUsize,
}

impl StaticEmbedding {
    pub fn new(fallback: Vec<f32>) -> Self {
        Self {
            vectors: HashMap::new(),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EmbeddingProvider for StaticEmbedding {
    fn name(&self) -> &str {
        "static"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Bag of words over a fixed vocabulary: one dimension per word.
pub struct VocabEmbedding {
    vocab: Vec<&'static str>,
}

impl VocabEmbedding {
    pub fn hotels() -> Self {
        Self {
            vocab: vec![
                "spa", "luxury", "retreat", "wifi", "budget", "stay", "pool", "gym", "beach",
                "sea", "view", "resort", "city", "breakfast", "parking", "family", "mountain",
                "business", "quiet", "plaza",
            ],
        }
    }
}

impl EmbeddingProvider for VocabEmbedding {
    fn name(&self) -> &str {
        "vocab"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let text = text.to_lowercase();
        let mut vector = vec![0.0; self.vocab.len()];
        for token in text.split(|c: char| !c.is_alphanumeric()) {
            if let Some(idx) = self.vocab.iter().position(|w| *w == token) {
                vector[idx] += 1.0;
            }
        }
        Ok(vector)
    }
}
