use crate::{
    app::App,
    hotels::{HotelCreate, RoomCreate},
};
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;

struct DemoHotel {
    name: &'static str,
    location: &'static str,
    rating: f64,
    description: &'static str,
    amenities: &'static [&'static str],
    image: &'static str,
    rooms: &'static [(&'static str, f64)],
}

const DEMO_HOTELS: [DemoHotel; 2] = [
    DemoHotel {
        name: "Grand Plaza",
        location: "New York",
        rating: 4.5,
        description: "A luxurious hotel in the heart of New York.",
        amenities: &["wifi", "pool", "gym"],
        image: "grand_plaza.jpg",
        rooms: &[("Single", 120.0), ("Double", 180.0)],
    },
    DemoHotel {
        name: "Sea View Resort",
        location: "Miami",
        rating: 4.0,
        description: "Enjoy the beautiful sea view and sandy beaches.",
        amenities: &["wifi", "beach", "spa"],
        image: "sea_view_resort.jpg",
        rooms: &[("Suite", 250.0), ("Double", 200.0)],
    },
];

/// Room type given to every hotel imported from a scraper CSV.
const IMPORTED_ROOM_TYPE: &str = "Standard";

#[derive(Debug, Default, PartialEq)]
pub struct SeedSummary {
    pub hotels: usize,
    pub rooms: usize,
    pub skipped: usize,
}

/// Insert the demonstration hotels. Hotels whose name already exists are
/// left alone, so seeding twice changes nothing.
pub fn seed_demo(app: &App) -> anyhow::Result<SeedSummary> {
    let existing = app
        .hotels()?
        .into_iter()
        .map(|h| h.name)
        .collect::<Vec<_>>();

    let mut summary = SeedSummary::default();
    for demo in &DEMO_HOTELS {
        if existing.iter().any(|name| name == demo.name) {
            log::info!("'{}' already present, skipping", demo.name);
            summary.skipped += 1;
            continue;
        }

        let hotel = app.create_hotel(HotelCreate {
            name: demo.name.to_string(),
            location: demo.location.to_string(),
            description: demo.description.to_string(),
            rating: Some(demo.rating),
            amenities: demo.amenities.iter().map(|a| a.to_string()).collect(),
            image: Some(demo.image.to_string()),
        })?;
        summary.hotels += 1;

        for (room_type, price) in demo.rooms {
            app.create_room(RoomCreate {
                hotel_id: hotel.id,
                room_type: room_type.to_string(),
                price: *price,
                available: true,
            })?;
            summary.rooms += 1;
        }
    }

    Ok(summary)
}

/// One row of the hotel scraper output.
#[derive(Debug, Deserialize)]
struct ScrapedHotel {
    name: String,
    description: String,
    location: String,
    price_per_night: f64,
    #[serde(default)]
    image: String,
}

/// Import hotels from a scraper CSV with the header
/// `id,name,description,location,price_per_night,image`.
///
/// The scraper's ids are not kept. Each hotel gets one room priced at
/// `price_per_night`. Rows that cannot be parsed are skipped with a warning.
pub fn import_csv(app: &App, path: &Path) -> anyhow::Result<SeedSummary> {
    let mut csv_reader = csv::Reader::from_path(path)
        .with_context(|| format!("couldnt open {}", path.display()))?;

    let mut summary = SeedSummary::default();
    for (line, row) in csv_reader.deserialize::<ScrapedHotel>().enumerate() {
        let row = match row {
            Ok(row) if !row.price_per_night.is_finite() || row.price_per_night < 0.0 => {
                log::warn!(
                    "{}: row {} has invalid price {}, skipping",
                    path.display(),
                    line + 1,
                    row.price_per_night
                );
                summary.skipped += 1;
                continue;
            }
            Ok(row) if !row.name.trim().is_empty() => row,
            Ok(_) => {
                log::warn!("{}: row {} has no name, skipping", path.display(), line + 1);
                summary.skipped += 1;
                continue;
            }
            Err(err) => {
                log::warn!("{}: row {} skipped: {err}", path.display(), line + 1);
                summary.skipped += 1;
                continue;
            }
        };

        let hotel = app.create_hotel(HotelCreate {
            name: row.name.trim().to_string(),
            location: row.location.trim().to_string(),
            description: row.description,
            rating: None,
            amenities: vec![],
            image: Some(row.image).filter(|image| !image.is_empty()),
        })?;
        summary.hotels += 1;

        app.create_room(RoomCreate {
            hotel_id: hotel.id,
            room_type: IMPORTED_ROOM_TYPE.to_string(),
            price: row.price_per_night,
            available: true,
        })?;
        summary.rooms += 1;
    }

    log::info!(
        "imported {} hotels from {} ({} skipped)",
        summary.hotels,
        path.display(),
        summary.skipped
    );

    Ok(summary)
}
