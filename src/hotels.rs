use crate::{parse_amenities, search::HotelSnapshot, table::Table};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hotel {
    pub id: u64,

    pub name: String,
    pub location: String,
    pub description: String,
    /// Average of all recorded ratings, 0 when there are none.
    pub rating: f64,
    pub amenities: Vec<String>,

    pub image: Option<String>,
}

impl PartialEq for Hotel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Hotel {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: u64,
    pub hotel_id: u64,
    pub room_type: String,
    pub price: f64,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub hotel_id: u64,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HotelCreate {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HotelUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amenities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RoomCreate {
    pub hotel_id: u64,
    pub room_type: String,
    pub price: f64,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

pub trait HotelManager: Send + Sync {
    fn list(&self) -> anyhow::Result<Vec<Hotel>>;
    fn get(&self, id: u64) -> anyhow::Result<Option<Hotel>>;
    fn create(&self, hotel: HotelCreate) -> anyhow::Result<Hotel>;
    fn update(&self, id: u64, update: HotelUpdate) -> anyhow::Result<Option<Hotel>>;
    /// Removes the hotel with its rooms and ratings; returns the removed room ids.
    fn delete(&self, id: u64) -> anyhow::Result<Option<Vec<u64>>>;

    fn rooms(&self) -> anyhow::Result<Vec<Room>>;
    fn rooms_of(&self, hotel_id: u64) -> anyhow::Result<Vec<Room>>;
    fn get_room(&self, id: u64) -> anyhow::Result<Option<Room>>;
    fn create_room(&self, room: RoomCreate) -> anyhow::Result<Room>;
    fn set_room_availability(&self, id: u64, available: bool) -> anyhow::Result<Option<Room>>;

    /// Records a rating and returns the hotel with its recomputed average.
    fn add_rating(&self, hotel_id: u64, score: f64) -> anyhow::Result<Option<Hotel>>;

    /// Every hotel with its room prices, in id order.
    fn snapshot(&self) -> anyhow::Result<Vec<HotelSnapshot>>;
}

const HOTEL_HEADERS: [&str; 7] = [
    "id",
    "name",
    "location",
    "description",
    "rating",
    "amenities",
    "image",
];

const ROOM_HEADERS: [&str; 5] = ["id", "hotel_id", "room_type", "price", "available"];

const RATING_HEADERS: [&str; 2] = ["hotel_id", "score"];

fn hotel_from_record(record: &csv::StringRecord) -> anyhow::Result<Hotel> {
    let field = |idx: usize, name: &str| {
        record
            .get(idx)
            .ok_or(anyhow!("couldnt get hotel {name}"))
            .map(String::from)
    };

    let image = field(6, "image")?;

    Ok(Hotel {
        id: field(0, "id")?.parse::<u64>()?,
        name: field(1, "name")?,
        location: field(2, "location")?,
        description: field(3, "description")?,
        rating: field(4, "rating")?.parse::<f64>()?,
        amenities: parse_amenities(&field(5, "amenities")?),
        image: if image.is_empty() { None } else { Some(image) },
    })
}

fn hotel_to_record(hotel: &Hotel) -> Vec<String> {
    vec![
        hotel.id.to_string(),
        hotel.name.clone(),
        hotel.location.clone(),
        hotel.description.clone(),
        hotel.rating.to_string(),
        hotel.amenities.join(","),
        hotel.image.clone().unwrap_or_default(),
    ]
}

fn room_from_record(record: &csv::StringRecord) -> anyhow::Result<Room> {
    let field = |idx: usize, name: &str| record.get(idx).ok_or(anyhow!("couldnt get room {name}"));

    Ok(Room {
        id: field(0, "id")?.parse::<u64>()?,
        hotel_id: field(1, "hotel_id")?.parse::<u64>()?,
        room_type: field(2, "room_type")?.to_string(),
        price: field(3, "price")?.parse::<f64>()?,
        available: field(4, "available")?.parse::<bool>()?,
    })
}

fn room_to_record(room: &Room) -> Vec<String> {
    vec![
        room.id.to_string(),
        room.hotel_id.to_string(),
        room.room_type.clone(),
        room.price.to_string(),
        room.available.to_string(),
    ]
}

fn rating_from_record(record: &csv::StringRecord) -> anyhow::Result<Rating> {
    let field =
        |idx: usize, name: &str| record.get(idx).ok_or(anyhow!("couldnt get rating {name}"));

    Ok(Rating {
        hotel_id: field(0, "hotel_id")?.parse::<u64>()?,
        score: field(1, "score")?.parse::<f64>()?,
    })
}

fn rating_to_record(rating: &Rating) -> Vec<String> {
    vec![rating.hotel_id.to_string(), rating.score.to_string()]
}

/// Amenities are stored comma-joined, so "sauna, steam room" becomes two tags
/// here rather than after the next reload.
fn dedup_amenities(amenities: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut amenities = amenities
        .iter()
        .flat_map(|a| parse_amenities(a))
        .collect::<Vec<_>>();
    amenities.retain(|item| seen.insert(item.clone()));
    amenities
}

/// Hotels, rooms and ratings kept in three CSV tables.
#[derive(Clone)]
pub struct BackendCsv {
    hotels: Table<Hotel>,
    rooms: Table<Room>,
    ratings: Table<Rating>,
}

impl BackendCsv {
    pub fn load(base_path: &str) -> anyhow::Result<Self> {
        Ok(BackendCsv {
            hotels: Table::load(
                &format!("{base_path}/hotels.csv"),
                &HOTEL_HEADERS,
                hotel_from_record,
                hotel_to_record,
            )?
            .with_ids(|h| h.id)?,
            rooms: Table::load(
                &format!("{base_path}/rooms.csv"),
                &ROOM_HEADERS,
                room_from_record,
                room_to_record,
            )?
            .with_ids(|r| r.id)?,
            ratings: Table::load(
                &format!("{base_path}/ratings.csv"),
                &RATING_HEADERS,
                rating_from_record,
                rating_to_record,
            )?,
        })
    }

    fn recompute_rating(&self, hotel_id: u64) -> anyhow::Result<Option<Hotel>> {
        let scores = self
            .ratings
            .read()
            .iter()
            .filter(|r| r.hotel_id == hotel_id)
            .map(|r| r.score)
            .collect::<Vec<_>>();

        let average = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        let mut hotels = self.hotels.write();
        let Some(hotel) = hotels.iter_mut().find(|h| h.id == hotel_id) else {
            return Ok(None);
        };
        // two decimal places, like the rating column it replaces
        hotel.rating = (average * 100.0).round() / 100.0;
        let result = hotel.clone();
        drop(hotels);

        self.hotels.save()?;

        Ok(Some(result))
    }
}

impl HotelManager for BackendCsv {
    fn list(&self) -> anyhow::Result<Vec<Hotel>> {
        Ok(self.hotels.read().clone())
    }

    fn get(&self, id: u64) -> anyhow::Result<Option<Hotel>> {
        Ok(self.hotels.read().iter().find(|h| h.id == id).cloned())
    }

    fn create(&self, hotel_create: HotelCreate) -> anyhow::Result<Hotel> {
        let mut hotels = self.hotels.write();
        let id = self.hotels.next_id()?;

        let hotel = Hotel {
            id,
            name: hotel_create.name,
            location: hotel_create.location,
            description: hotel_create.description,
            rating: hotel_create.rating.unwrap_or_default(),
            amenities: dedup_amenities(hotel_create.amenities),
            image: hotel_create.image,
        };

        hotels.push(hotel.clone());
        drop(hotels);

        self.hotels.save()?;

        Ok(hotel)
    }

    fn update(&self, id: u64, hotel_update: HotelUpdate) -> anyhow::Result<Option<Hotel>> {
        let mut hotels = self.hotels.write();

        let Some(hotel) = hotels.iter_mut().find(|h| h.id == id) else {
            return Ok(None);
        };

        if let Some(name) = hotel_update.name {
            hotel.name = name;
        }
        if let Some(location) = hotel_update.location {
            hotel.location = location;
        }
        if let Some(description) = hotel_update.description {
            hotel.description = description;
        }
        if let Some(amenities) = hotel_update.amenities {
            hotel.amenities = dedup_amenities(amenities);
        }
        if let Some(image) = hotel_update.image {
            hotel.image = Some(image);
        }

        let result = hotel.clone();
        drop(hotels);

        self.hotels.save()?;

        Ok(Some(result))
    }

    fn delete(&self, id: u64) -> anyhow::Result<Option<Vec<u64>>> {
        let mut hotels = self.hotels.write();
        let Some(idx) = hotels.iter().position(|h| h.id == id) else {
            return Ok(None);
        };
        hotels.remove(idx);
        drop(hotels);

        let mut rooms = self.rooms.write();
        let removed_rooms = rooms
            .iter()
            .filter(|r| r.hotel_id == id)
            .map(|r| r.id)
            .collect::<Vec<_>>();
        rooms.retain(|r| r.hotel_id != id);
        drop(rooms);

        self.ratings.write().retain(|r| r.hotel_id != id);

        self.hotels.save()?;
        self.rooms.save()?;
        self.ratings.save()?;

        Ok(Some(removed_rooms))
    }

    fn rooms(&self) -> anyhow::Result<Vec<Room>> {
        Ok(self.rooms.read().clone())
    }

    fn rooms_of(&self, hotel_id: u64) -> anyhow::Result<Vec<Room>> {
        Ok(self
            .rooms
            .read()
            .iter()
            .filter(|r| r.hotel_id == hotel_id)
            .cloned()
            .collect())
    }

    fn get_room(&self, id: u64) -> anyhow::Result<Option<Room>> {
        Ok(self.rooms.read().iter().find(|r| r.id == id).cloned())
    }

    fn create_room(&self, room_create: RoomCreate) -> anyhow::Result<Room> {
        if self.get(room_create.hotel_id)?.is_none() {
            return Err(anyhow!("hotel {} does not exist", room_create.hotel_id));
        }

        let mut rooms = self.rooms.write();
        let id = self.rooms.next_id()?;

        let room = Room {
            id,
            hotel_id: room_create.hotel_id,
            room_type: room_create.room_type,
            price: room_create.price,
            available: room_create.available,
        };

        rooms.push(room.clone());
        drop(rooms);

        self.rooms.save()?;

        Ok(room)
    }

    fn set_room_availability(&self, id: u64, available: bool) -> anyhow::Result<Option<Room>> {
        let mut rooms = self.rooms.write();
        let Some(room) = rooms.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        let previous = std::mem::replace(&mut room.available, available);
        let result = room.clone();
        drop(rooms);

        if let Err(err) = self.rooms.save() {
            // keep memory in line with the file
            if let Some(room) = self.rooms.write().iter_mut().find(|r| r.id == id) {
                room.available = previous;
            }
            return Err(err);
        }

        Ok(Some(result))
    }

    fn add_rating(&self, hotel_id: u64, score: f64) -> anyhow::Result<Option<Hotel>> {
        if self.get(hotel_id)?.is_none() {
            return Ok(None);
        }

        self.ratings.write().push(Rating { hotel_id, score });
        self.ratings.save()?;

        self.recompute_rating(hotel_id)
    }

    fn snapshot(&self) -> anyhow::Result<Vec<HotelSnapshot>> {
        let hotels = self.hotels.read();
        let rooms = self.rooms.read();

        Ok(hotels
            .iter()
            .map(|hotel| HotelSnapshot {
                hotel: hotel.clone(),
                room_prices: rooms
                    .iter()
                    .filter(|r| r.hotel_id == hotel.id)
                    .map(|r| r.price)
                    .collect(),
            })
            .collect())
    }
}
