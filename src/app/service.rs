use crate::{
    bookings::{
        Booking, BookingCreate, BookingManager, BookingStatus, ContactMessage, Customer,
        CustomerCreate, SearchActivity,
    },
    config::Config,
    hotels::{Hotel, HotelCreate, HotelManager, HotelUpdate, Room, RoomCreate},
    search::{Degradation, FilterParams, HybridRanker, SearchFilters},
};
use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
};

use super::errors::AppError;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

const MAX_SCORE: f64 = 5.0;

#[derive(Debug, Clone, Serialize)]
pub struct HotelHit {
    #[serde(flatten)]
    pub hotel: Hotel,
    pub score: f32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchResults {
    pub hotels: Vec<HotelHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<Degradation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HotelDetail {
    #[serde(flatten)]
    pub hotel: Hotel,
    /// Only rooms that can currently be booked.
    pub rooms: Vec<Room>,
}

/// A booking with the records it points to. References removed since the
/// booking was made are `None`.
#[derive(Debug, Clone, Serialize)]
pub struct BookingDetail {
    #[serde(flatten)]
    pub booking: Booking,
    pub customer: Option<Customer>,
    pub room: Option<Room>,
    pub hotel: Option<Hotel>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BookRequest {
    pub customer_id: u64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

pub struct App {
    hotel_mgr: Arc<dyn HotelManager>,
    booking_mgr: Arc<dyn BookingManager>,
    ranker: HybridRanker,
    config: Config,

    // availability check and booking insert must not interleave
    booking_lock: Mutex<()>,
}

impl App {
    pub fn new(
        hotel_mgr: Arc<dyn HotelManager>,
        booking_mgr: Arc<dyn BookingManager>,
        ranker: HybridRanker,
        config: Config,
    ) -> Self {
        Self {
            hotel_mgr,
            booking_mgr,
            ranker,
            config,
            booking_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ranked hotel search. When `customer_id` names a known customer, the
    /// structured part of the query is recorded for recommendations; a
    /// failure to record it is logged and the search goes on.
    pub fn search(
        &self,
        params: &FilterParams,
        customer_id: Option<u64>,
    ) -> Result<SearchResults, AppError> {
        let filters = SearchFilters::parse(params);

        if let Some(customer_id) = customer_id {
            if let Err(err) = self.record_activity(customer_id, &filters) {
                log::warn!("search activity for customer {customer_id} not recorded: {err}");
            }
        }

        let corpus = self.hotel_mgr.snapshot()?;
        let ranked = self.ranker.rank(&corpus, &filters);
        log::debug!("{} of {} hotels matched", ranked.len(), corpus.len());

        let mut by_id = corpus
            .into_iter()
            .map(|s| (s.hotel.id, s.hotel))
            .collect::<HashMap<_, _>>();

        let hotels = ranked
            .hotels
            .iter()
            .filter_map(|r| {
                by_id.remove(&r.id).map(|hotel| HotelHit {
                    hotel,
                    score: r.score,
                })
            })
            .collect();

        Ok(SearchResults {
            hotels,
            degraded: ranked.degraded,
        })
    }

    fn record_activity(&self, customer_id: u64, filters: &SearchFilters) -> Result<(), AppError> {
        if filters.location.is_none() && filters.min_rating.is_none() && filters.max_price.is_none()
        {
            return Ok(());
        }

        if self.booking_mgr.get_customer(customer_id)?.is_none() {
            log::warn!("search activity for unknown customer {customer_id} not recorded");
            return Ok(());
        }

        self.booking_mgr.record_activity(SearchActivity {
            customer_id,
            location: filters.location.clone(),
            min_rating: filters.min_rating,
            max_price: filters.max_price,
            timestamp: Utc::now(),
        })?;

        Ok(())
    }

    pub fn hotels(&self) -> Result<Vec<Hotel>, AppError> {
        Ok(self.hotel_mgr.list()?)
    }

    pub fn hotel_detail(&self, id: u64) -> Result<HotelDetail, AppError> {
        let hotel = self.hotel_mgr.get(id)?.ok_or(AppError::NotFound("hotel"))?;
        let rooms = self
            .hotel_mgr
            .rooms_of(id)?
            .into_iter()
            .filter(|r| r.available)
            .collect();

        Ok(HotelDetail { hotel, rooms })
    }

    pub fn create_hotel(&self, hotel_create: HotelCreate) -> Result<Hotel, AppError> {
        if hotel_create.name.trim().is_empty() {
            return Err(AppError::Validation("hotel name is required".to_string()));
        }
        if let Some(rating) = hotel_create.rating {
            validate_score(rating)?;
        }

        let hotel = self.hotel_mgr.create(hotel_create)?;
        log::info!("created hotel {} '{}'", hotel.id, hotel.name);

        Ok(hotel)
    }

    pub fn update_hotel(&self, id: u64, hotel_update: HotelUpdate) -> Result<Hotel, AppError> {
        // the embedding cache notices changed text by its content hash
        self.hotel_mgr
            .update(id, hotel_update)?
            .ok_or(AppError::NotFound("hotel"))
    }

    /// Removes the hotel with its rooms, ratings and the bookings of its rooms.
    pub fn delete_hotel(&self, id: u64) -> Result<(), AppError> {
        let room_ids = self.hotel_mgr.delete(id)?.ok_or(AppError::NotFound("hotel"))?;
        let bookings = self.booking_mgr.delete_bookings_for_rooms(&room_ids)?;

        if let Some(cache) = self.ranker.cache() {
            cache.remove(id);
        }

        log::info!(
            "deleted hotel {id} with {} rooms and {bookings} bookings",
            room_ids.len()
        );

        Ok(())
    }

    pub fn rooms(&self) -> Result<Vec<Room>, AppError> {
        Ok(self.hotel_mgr.rooms()?)
    }

    pub fn create_room(&self, room_create: RoomCreate) -> Result<Room, AppError> {
        if !room_create.price.is_finite() || room_create.price < 0.0 {
            return Err(AppError::Validation(format!(
                "invalid room price {}",
                room_create.price
            )));
        }
        if self.hotel_mgr.get(room_create.hotel_id)?.is_none() {
            return Err(AppError::NotFound("hotel"));
        }

        Ok(self.hotel_mgr.create_room(room_create)?)
    }

    pub fn rate(&self, hotel_id: u64, score: f64) -> Result<Hotel, AppError> {
        validate_score(score)?;

        self.hotel_mgr
            .add_rating(hotel_id, score)?
            .ok_or(AppError::NotFound("hotel"))
    }

    pub fn book_room(&self, room_id: u64, request: BookRequest) -> Result<Booking, AppError> {
        if request.check_out <= request.check_in {
            return Err(AppError::Validation(
                "check-out must be after check-in".to_string(),
            ));
        }

        let _guard = self
            .booking_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let room = self
            .hotel_mgr
            .get_room(room_id)?
            .ok_or(AppError::NotFound("room"))?;
        if !room.available {
            return Err(AppError::RoomUnavailable(room_id));
        }

        if self.booking_mgr.get_customer(request.customer_id)?.is_none() {
            return Err(AppError::NotFound("customer"));
        }

        // take the room first; a failed insert hands it back
        self.hotel_mgr.set_room_availability(room_id, false)?;

        let created = self.booking_mgr.create_booking(BookingCreate {
            customer_id: request.customer_id,
            room_id,
            check_in: request.check_in,
            check_out: request.check_out,
            status: BookingStatus::Confirmed,
        });
        let booking = match created {
            Ok(booking) => booking,
            Err(err) => {
                if let Err(release_err) = self.hotel_mgr.set_room_availability(room_id, true) {
                    log::error!("room {room_id} not released: {release_err}");
                }
                return Err(err.into());
            }
        };

        log::info!(
            "booking {} confirmed: customer {} room {room_id} {} to {}",
            booking.id,
            booking.customer_id,
            booking.check_in,
            booking.check_out
        );

        Ok(booking)
    }

    pub fn booking(&self, id: u64) -> Result<BookingDetail, AppError> {
        let booking = self
            .booking_mgr
            .get_booking(id)?
            .ok_or(AppError::NotFound("booking"))?;

        self.booking_detail(booking)
    }

    pub fn customer_bookings(&self, customer_id: u64) -> Result<Vec<BookingDetail>, AppError> {
        if self.booking_mgr.get_customer(customer_id)?.is_none() {
            return Err(AppError::NotFound("customer"));
        }

        self.booking_mgr
            .bookings_of(customer_id)?
            .into_iter()
            .map(|b| self.booking_detail(b))
            .collect()
    }

    /// Every booking joined with its customer, room and hotel.
    pub fn all_bookings(&self) -> Result<Vec<BookingDetail>, AppError> {
        self.booking_mgr
            .list_bookings()?
            .into_iter()
            .map(|b| self.booking_detail(b))
            .collect()
    }

    /// Deletes the booking and releases its room.
    pub fn delete_booking(&self, id: u64) -> Result<Booking, AppError> {
        let _guard = self
            .booking_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let booking = self
            .booking_mgr
            .delete_booking(id)?
            .ok_or(AppError::NotFound("booking"))?;

        if self
            .hotel_mgr
            .set_room_availability(booking.room_id, true)?
            .is_none()
        {
            log::warn!("booking {id} referenced missing room {}", booking.room_id);
        }

        log::info!("deleted booking {id}");

        Ok(booking)
    }

    fn booking_detail(&self, booking: Booking) -> Result<BookingDetail, AppError> {
        let customer = self.booking_mgr.get_customer(booking.customer_id)?;
        let room = self.hotel_mgr.get_room(booking.room_id)?;
        let hotel = match &room {
            Some(room) => self.hotel_mgr.get(room.hotel_id)?,
            None => None,
        };

        Ok(BookingDetail {
            booking,
            customer,
            room,
            hotel,
        })
    }

    pub fn register(&self, customer_create: CustomerCreate) -> Result<Customer, AppError> {
        let customer_create = CustomerCreate {
            name: customer_create.name.trim().to_string(),
            email: customer_create.email.trim().to_string(),
            phone: customer_create.phone.trim().to_string(),
        };

        if customer_create.name.is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        validate_email(&customer_create.email)?;

        if self
            .booking_mgr
            .customer_by_email(&customer_create.email)?
            .is_some()
        {
            return Err(AppError::AlreadyExists(customer_create.email));
        }

        let customer = self.booking_mgr.register(customer_create)?;
        log::info!("registered customer {}", customer.id);

        Ok(customer)
    }

    pub fn contact(&self, request: ContactRequest) -> Result<(), AppError> {
        let name = request.name.trim();
        let email = request.email.trim();
        let message = request.message.trim();

        if name.is_empty() || email.is_empty() || message.is_empty() {
            return Err(AppError::Validation("all fields are required".to_string()));
        }

        self.booking_mgr.save_message(ContactMessage {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        })?;

        log::info!("contact message from {name} <{email}>");

        Ok(())
    }

    /// Hotels matching the customer's latest search, without the ones they
    /// already booked. Falls back to the best rated hotels.
    pub fn recommend(&self, customer_id: u64) -> Result<Vec<Hotel>, AppError> {
        if self.booking_mgr.get_customer(customer_id)?.is_none() {
            return Err(AppError::NotFound("customer"));
        }

        let limit = self.config.recommendation_limit;
        let corpus = self.hotel_mgr.snapshot()?;

        let booked_rooms = self
            .booking_mgr
            .bookings_of(customer_id)?
            .into_iter()
            .map(|b| b.room_id)
            .collect::<HashSet<_>>();
        let booked = self
            .hotel_mgr
            .rooms()?
            .into_iter()
            .filter(|r| booked_rooms.contains(&r.id))
            .map(|r| r.hotel_id)
            .collect::<HashSet<_>>();

        if let Some(activity) = self.booking_mgr.recent_activity(customer_id, 1)?.pop() {
            let filters = SearchFilters {
                location: activity.location,
                min_rating: activity.min_rating,
                max_price: activity.max_price,
                ..Default::default()
            };

            let ranked = self.ranker.rank(&corpus, &filters);
            let mut by_id = corpus
                .iter()
                .map(|s| (s.hotel.id, &s.hotel))
                .collect::<HashMap<_, _>>();

            let hotels = ranked
                .ids()
                .into_iter()
                .filter(|id| !booked.contains(id))
                .filter_map(|id| by_id.remove(&id).cloned())
                .take(limit)
                .collect::<Vec<_>>();

            if !hotels.is_empty() {
                return Ok(hotels);
            }
            log::debug!("latest search of customer {customer_id} matches nothing new");
        }

        let mut hotels = corpus
            .into_iter()
            .map(|s| s.hotel)
            .filter(|h| !booked.contains(&h.id))
            .collect::<Vec<_>>();
        hotels.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        hotels.truncate(limit);

        Ok(hotels)
    }
}

fn validate_score(score: f64) -> Result<(), AppError> {
    if !(0.0..=MAX_SCORE).contains(&score) {
        return Err(AppError::Validation(format!(
            "rating must be between 0 and {MAX_SCORE}, got {score}"
        )));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let re = Regex::new(EMAIL_PATTERN).map_err(|e| anyhow!(e))?;
    if !re.is_match(email) {
        return Err(AppError::Validation(format!("invalid email {email:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_score_bounds() {
        assert!(validate_score(0.0).is_ok());
        assert!(validate_score(5.0).is_ok());
        assert!(validate_score(5.01).is_err());
        assert!(validate_score(-1.0).is_err());
        assert!(validate_score(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("guest@example.com").is_ok());
        assert!(validate_email("guest.name+tag@mail.example.org").is_ok());
        assert!(validate_email("guest@example").is_err());
        assert!(validate_email("guest example@mail.com").is_err());
        assert!(validate_email("").is_err());
    }
}
