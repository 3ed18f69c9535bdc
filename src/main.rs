use anyhow::bail;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod bookings;
mod cli;
mod config;
mod hotels;
mod search;
mod seed;
mod table;
#[cfg(test)]
mod tests;
mod web;

use app::AppFactory;
use cli::{HotelAction, RoomAction};
use hotels::{HotelCreate, HotelUpdate, RoomCreate};
use search::FilterParams;

/// Split a comma separated amenity list, lowercased and trimmed.
pub fn parse_amenities(amenities: &str) -> Vec<String> {
    amenities
        .split(',')
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let args = cli::Args::parse();

    #[cfg(feature = "markdown-docs")]
    if let cli::Command::MarkdownDocs {} = args.command {
        clap_markdown::print_help_markdown::<cli::Args>();
        return Ok(());
    }

    let base_path = AppFactory::get_base_path()?;
    let app = AppFactory::create_app(&base_path)?;

    match args.command {
        #[cfg(feature = "markdown-docs")]
        cli::Command::MarkdownDocs {} => Ok(()),

        cli::Command::Daemon {} => web::start_daemon(app),

        cli::Command::Search {
            location,
            min_rating,
            max_price,
            amenities,
            keyword,
            count,
        } => {
            let params = FilterParams {
                location,
                min_rating,
                max_price,
                amenities: amenities.as_deref().map(parse_amenities).unwrap_or_default(),
                keyword,
            };
            let results = app.search(&params, None)?;

            if let Some(reason) = results.degraded {
                log::warn!("keyword ignored ({reason:?}), showing structured matches only");
            }

            if count {
                println!("{} hotels found", results.hotels.len());
                return Ok(());
            }

            println!("{}", serde_json::to_string_pretty(&results.hotels)?);
            Ok(())
        }

        cli::Command::Seed { demo, csv } => {
            let summary = match (demo, csv) {
                (true, _) => seed::seed_demo(&app)?,
                (false, Some(path)) => seed::import_csv(&app, &path)?,
                (false, None) => bail!("nothing to seed, pass --demo or --csv <file>"),
            };

            println!(
                "{} hotels and {} rooms added, {} skipped",
                summary.hotels, summary.rooms, summary.skipped
            );
            Ok(())
        }

        cli::Command::Hotel { action } => match action {
            HotelAction::Add {
                name,
                location,
                description,
                rating,
                amenities,
                image,
            } => {
                let hotel = app.create_hotel(HotelCreate {
                    name,
                    location,
                    description,
                    rating,
                    amenities: amenities.as_deref().map(parse_amenities).unwrap_or_default(),
                    image,
                })?;

                println!("{}", serde_json::to_string_pretty(&hotel)?);
                Ok(())
            }

            HotelAction::Update {
                id,
                name,
                location,
                description,
                amenities,
            } => {
                let hotel_update = HotelUpdate {
                    name,
                    location,
                    description,
                    amenities: amenities.as_deref().map(parse_amenities),
                    ..Default::default()
                };

                if hotel_update.name.is_none()
                    && hotel_update.location.is_none()
                    && hotel_update.description.is_none()
                    && hotel_update.amenities.is_none()
                {
                    println!("This update request does nothing");
                    return Ok(());
                }

                let hotel = app.update_hotel(id, hotel_update)?;
                println!("{}", serde_json::to_string_pretty(&hotel)?);
                Ok(())
            }

            HotelAction::Delete { id } => {
                app.delete_hotel(id)?;
                println!("hotel {id} deleted");
                Ok(())
            }
        },

        cli::Command::Room { action } => match action {
            RoomAction::Add {
                hotel_id,
                room_type,
                price,
                unavailable,
            } => {
                let room = app.create_room(RoomCreate {
                    hotel_id,
                    room_type,
                    price,
                    available: !unavailable,
                })?;

                println!("{}", serde_json::to_string_pretty(&room)?);
                Ok(())
            }
        },

        cli::Command::Rate { hotel_id, score } => {
            let hotel = app.rate(hotel_id, score)?;
            println!("{} is now rated {:.2}", hotel.name, hotel.rating);
            Ok(())
        }
    }
}
