use crate::table::Table;
use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CustomerCreate {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        };
        write!(f, "{status}")
    }
}

impl FromStr for BookingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            _ => Err(anyhow!("unknown booking status {s:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: u64,
    pub customer_id: u64,
    pub room_id: u64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub status: BookingStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BookingCreate {
    pub customer_id: u64,
    pub room_id: u64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default)]
    pub status: BookingStatus,
}

/// Filters a customer searched with; drives recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchActivity {
    pub customer_id: u64,
    pub location: Option<String>,
    pub min_rating: Option<f64>,
    pub max_price: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

pub trait BookingManager: Send + Sync {
    fn register(&self, customer: CustomerCreate) -> anyhow::Result<Customer>;
    fn get_customer(&self, id: u64) -> anyhow::Result<Option<Customer>>;
    fn customer_by_email(&self, email: &str) -> anyhow::Result<Option<Customer>>;

    fn create_booking(&self, booking: BookingCreate) -> anyhow::Result<Booking>;
    fn get_booking(&self, id: u64) -> anyhow::Result<Option<Booking>>;
    fn list_bookings(&self) -> anyhow::Result<Vec<Booking>>;
    fn bookings_of(&self, customer_id: u64) -> anyhow::Result<Vec<Booking>>;
    fn delete_booking(&self, id: u64) -> anyhow::Result<Option<Booking>>;
    /// Removes every booking of the given rooms and returns how many were removed.
    fn delete_bookings_for_rooms(&self, room_ids: &[u64]) -> anyhow::Result<usize>;

    fn record_activity(&self, activity: SearchActivity) -> anyhow::Result<()>;
    /// Most recent first.
    fn recent_activity(&self, customer_id: u64, limit: usize)
        -> anyhow::Result<Vec<SearchActivity>>;

    fn save_message(&self, message: ContactMessage) -> anyhow::Result<()>;
}

const CUSTOMER_HEADERS: [&str; 4] = ["id", "name", "email", "phone"];

const BOOKING_HEADERS: [&str; 6] = [
    "id",
    "customer_id",
    "room_id",
    "check_in",
    "check_out",
    "status",
];

const ACTIVITY_HEADERS: [&str; 5] = [
    "customer_id",
    "location",
    "min_rating",
    "max_price",
    "timestamp",
];

const MESSAGE_HEADERS: [&str; 4] = ["name", "email", "message", "timestamp"];

/// Search activity kept per customer; older entries are dropped.
const ACTIVITY_PER_CUSTOMER: usize = 20;

fn get<'r>(record: &'r csv::StringRecord, idx: usize, name: &str) -> anyhow::Result<&'r str> {
    record.get(idx).ok_or(anyhow!("couldnt get record {name}"))
}

fn optional<T: FromStr>(value: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if value.is_empty() {
        Ok(None)
    } else {
        Ok(Some(value.parse::<T>()?))
    }
}

fn optional_to_string<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

fn timestamp(value: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

fn customer_from_record(record: &csv::StringRecord) -> anyhow::Result<Customer> {
    Ok(Customer {
        id: get(record, 0, "id")?.parse()?,
        name: get(record, 1, "name")?.to_string(),
        email: get(record, 2, "email")?.to_string(),
        phone: get(record, 3, "phone")?.to_string(),
    })
}

fn customer_to_record(customer: &Customer) -> Vec<String> {
    vec![
        customer.id.to_string(),
        customer.name.clone(),
        customer.email.clone(),
        customer.phone.clone(),
    ]
}

fn booking_from_record(record: &csv::StringRecord) -> anyhow::Result<Booking> {
    Ok(Booking {
        id: get(record, 0, "id")?.parse()?,
        customer_id: get(record, 1, "customer_id")?.parse()?,
        room_id: get(record, 2, "room_id")?.parse()?,
        check_in: get(record, 3, "check_in")?.parse()?,
        check_out: get(record, 4, "check_out")?.parse()?,
        status: get(record, 5, "status")?.parse()?,
    })
}

fn booking_to_record(booking: &Booking) -> Vec<String> {
    vec![
        booking.id.to_string(),
        booking.customer_id.to_string(),
        booking.room_id.to_string(),
        booking.check_in.to_string(),
        booking.check_out.to_string(),
        booking.status.to_string(),
    ]
}

fn activity_from_record(record: &csv::StringRecord) -> anyhow::Result<SearchActivity> {
    let location = get(record, 1, "location")?;
    Ok(SearchActivity {
        customer_id: get(record, 0, "customer_id")?.parse()?,
        location: if location.is_empty() {
            None
        } else {
            Some(location.to_string())
        },
        min_rating: optional(get(record, 2, "min_rating")?)?,
        max_price: optional(get(record, 3, "max_price")?)?,
        timestamp: timestamp(get(record, 4, "timestamp")?)?,
    })
}

fn activity_to_record(activity: &SearchActivity) -> Vec<String> {
    vec![
        activity.customer_id.to_string(),
        activity.location.clone().unwrap_or_default(),
        optional_to_string(&activity.min_rating),
        optional_to_string(&activity.max_price),
        activity.timestamp.to_rfc3339(),
    ]
}

fn message_from_record(record: &csv::StringRecord) -> anyhow::Result<ContactMessage> {
    Ok(ContactMessage {
        name: get(record, 0, "name")?.to_string(),
        email: get(record, 1, "email")?.to_string(),
        message: get(record, 2, "message")?.to_string(),
        timestamp: timestamp(get(record, 3, "timestamp")?)?,
    })
}

fn message_to_record(message: &ContactMessage) -> Vec<String> {
    vec![
        message.name.clone(),
        message.email.clone(),
        message.message.clone(),
        message.timestamp.to_rfc3339(),
    ]
}

/// Customers, bookings, search activity and contact messages as CSV tables.
#[derive(Clone)]
pub struct BackendCsv {
    customers: Table<Customer>,
    bookings: Table<Booking>,
    activity: Table<SearchActivity>,
    messages: Table<ContactMessage>,
}

impl BackendCsv {
    pub fn load(base_path: &str) -> anyhow::Result<Self> {
        Ok(BackendCsv {
            customers: Table::load(
                &format!("{base_path}/customers.csv"),
                &CUSTOMER_HEADERS,
                customer_from_record,
                customer_to_record,
            )?
            .with_ids(|c| c.id)?,
            bookings: Table::load(
                &format!("{base_path}/bookings.csv"),
                &BOOKING_HEADERS,
                booking_from_record,
                booking_to_record,
            )?
            .with_ids(|b| b.id)?,
            activity: Table::load(
                &format!("{base_path}/activity.csv"),
                &ACTIVITY_HEADERS,
                activity_from_record,
                activity_to_record,
            )?,
            messages: Table::load(
                &format!("{base_path}/messages.csv"),
                &MESSAGE_HEADERS,
                message_from_record,
                message_to_record,
            )?,
        })
    }
}

impl BookingManager for BackendCsv {
    fn register(&self, customer_create: CustomerCreate) -> anyhow::Result<Customer> {
        let mut customers = self.customers.write();
        if customers
            .iter()
            .any(|c| c.email.eq_ignore_ascii_case(&customer_create.email))
        {
            return Err(anyhow!(
                "customer with email {} already exists",
                customer_create.email
            ));
        }

        let customer = Customer {
            id: self.customers.next_id()?,
            name: customer_create.name,
            email: customer_create.email,
            phone: customer_create.phone,
        };
        customers.push(customer.clone());
        drop(customers);

        self.customers.save()?;

        Ok(customer)
    }

    fn get_customer(&self, id: u64) -> anyhow::Result<Option<Customer>> {
        Ok(self.customers.read().iter().find(|c| c.id == id).cloned())
    }

    fn customer_by_email(&self, email: &str) -> anyhow::Result<Option<Customer>> {
        Ok(self
            .customers
            .read()
            .iter()
            .find(|c| c.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    fn create_booking(&self, booking_create: BookingCreate) -> anyhow::Result<Booking> {
        let mut bookings = self.bookings.write();

        let booking = Booking {
            id: self.bookings.next_id()?,
            customer_id: booking_create.customer_id,
            room_id: booking_create.room_id,
            check_in: booking_create.check_in,
            check_out: booking_create.check_out,
            status: booking_create.status,
        };
        bookings.push(booking.clone());
        drop(bookings);

        if let Err(err) = self.bookings.save() {
            self.bookings.write().retain(|b| b.id != booking.id);
            return Err(err);
        }

        Ok(booking)
    }

    fn get_booking(&self, id: u64) -> anyhow::Result<Option<Booking>> {
        Ok(self.bookings.read().iter().find(|b| b.id == id).cloned())
    }

    fn list_bookings(&self) -> anyhow::Result<Vec<Booking>> {
        Ok(self.bookings.read().clone())
    }

    fn bookings_of(&self, customer_id: u64) -> anyhow::Result<Vec<Booking>> {
        Ok(self
            .bookings
            .read()
            .iter()
            .filter(|b| b.customer_id == customer_id)
            .cloned()
            .collect())
    }

    fn delete_booking(&self, id: u64) -> anyhow::Result<Option<Booking>> {
        let mut bookings = self.bookings.write();
        let removed = bookings
            .iter()
            .position(|b| b.id == id)
            .map(|idx| bookings.remove(idx));
        drop(bookings);

        if removed.is_some() {
            self.bookings.save()?;
        }

        Ok(removed)
    }

    fn delete_bookings_for_rooms(&self, room_ids: &[u64]) -> anyhow::Result<usize> {
        let mut bookings = self.bookings.write();
        let before = bookings.len();
        bookings.retain(|b| !room_ids.contains(&b.room_id));
        let count = before - bookings.len();
        drop(bookings);

        if count > 0 {
            self.bookings.save()?;
        }

        Ok(count)
    }

    fn record_activity(&self, activity: SearchActivity) -> anyhow::Result<()> {
        let mut rows = self.activity.write();
        let customer_id = activity.customer_id;
        rows.push(activity);

        // rows are appended in time order, so the first ones are the oldest
        let count = rows.iter().filter(|a| a.customer_id == customer_id).count();
        let mut excess = count.saturating_sub(ACTIVITY_PER_CUSTOMER);
        rows.retain(|a| {
            if excess > 0 && a.customer_id == customer_id {
                excess -= 1;
                false
            } else {
                true
            }
        });
        drop(rows);

        self.activity.save()
    }

    fn recent_activity(
        &self,
        customer_id: u64,
        limit: usize,
    ) -> anyhow::Result<Vec<SearchActivity>> {
        let mut activity = self
            .activity
            .read()
            .iter()
            .filter(|a| a.customer_id == customer_id)
            .cloned()
            .collect::<Vec<_>>();

        // appended in time order; stable on equal timestamps
        activity.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        activity.truncate(limit);

        Ok(activity)
    }

    fn save_message(&self, message: ContactMessage) -> anyhow::Result<()> {
        self.messages.write().push(message);
        self.messages.save()
    }
}
