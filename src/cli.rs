use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Generate markdown docs
    #[cfg(feature = "markdown-docs")]
    #[clap(hide = true)]
    MarkdownDocs {},

    /// Serve the HTTP API.
    Daemon {},

    /// Search hotels and print them ranked, as JSON
    Search {
        /// Substring of the hotel location, case-insensitive
        #[clap(short, long)]
        location: Option<String>,

        /// Minimum hotel rating
        #[clap(short = 'r', long)]
        min_rating: Option<String>,

        /// Keep hotels with at least one room at or below this price
        #[clap(short = 'p', long)]
        max_price: Option<String>,

        /// Comma separated amenities, e.g. "pool,wifi"
        #[clap(short, long)]
        amenities: Option<String>,

        /// Free text ranked by literal and semantic match
        #[clap(short, long)]
        keyword: Option<String>,

        /// Print only the number of hotels found
        #[clap(short, long, default_value = "false")]
        count: bool,
    },

    /// Populate the catalogue
    Seed {
        /// Insert the two demonstration hotels with their rooms
        #[clap(long, conflicts_with = "csv")]
        demo: bool,

        /// Import hotels from a scraper CSV
        /// (id,name,description,location,price_per_night,image)
        #[clap(long)]
        csv: Option<PathBuf>,
    },

    /// Manage hotels
    Hotel {
        #[command(subcommand)]
        action: HotelAction,
    },

    /// Manage rooms
    Room {
        #[command(subcommand)]
        action: RoomAction,
    },

    /// Rate a hotel
    Rate {
        hotel_id: u64,

        /// Score between 0 and 5
        score: f64,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum HotelAction {
    /// Add a hotel
    Add {
        #[clap(short, long)]
        name: String,

        #[clap(short, long)]
        location: String,

        #[clap(short, long, default_value = "")]
        description: String,

        /// Initial rating, replaced once guests rate the hotel
        #[clap(short, long)]
        rating: Option<f64>,

        /// Comma separated amenities
        #[clap(short, long)]
        amenities: Option<String>,

        /// Image file name
        #[clap(long)]
        image: Option<String>,
    },

    /// Update a hotel
    Update {
        id: u64,

        #[clap(short, long)]
        name: Option<String>,

        #[clap(short, long)]
        location: Option<String>,

        #[clap(short, long)]
        description: Option<String>,

        /// Replace amenities
        #[clap(short, long)]
        amenities: Option<String>,
    },

    /// Delete a hotel with its rooms, ratings and bookings
    Delete { id: u64 },
}

#[derive(Subcommand, Debug, Clone)]
pub enum RoomAction {
    /// Add a room to a hotel
    Add {
        hotel_id: u64,

        /// e.g. Single, Double, Suite
        #[clap(short = 't', long)]
        room_type: String,

        /// Price per night
        #[clap(short, long)]
        price: f64,

        /// Create the room as not bookable
        #[clap(long, default_value = "false")]
        unavailable: bool,
    },
}
