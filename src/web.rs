use crate::{
    app::{
        service::{BookingDetail, HotelDetail, SearchResults},
        App, AppError, BookRequest, ContactRequest,
    },
    bookings::{Booking, Customer, CustomerCreate},
    hotels::{Hotel, Room},
    search::FilterParams,
};
use axum::{
    extract::{Path, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

#[derive(Clone)]
struct SharedState {
    app: Arc<App>,
}

pub fn router(app: Arc<App>) -> Router {
    let shared_state = Arc::new(SharedState { app });

    Router::new()
        .route("/api/hotels", get(list_hotels))
        .route("/api/hotels/:id", get(hotel_detail))
        .route("/api/hotels/:id/ratings", post(rate_hotel))
        .route("/api/rooms", get(list_rooms))
        .route("/api/rooms/:id/book", post(book_room))
        .route("/api/bookings/:id", get(booking_confirmation))
        .route("/api/customers", post(register))
        .route("/api/customers/:id/bookings", get(my_bookings))
        .route("/api/customers/:id/recommendations", get(recommendations))
        .route("/api/management/bookings", get(management_bookings))
        .route("/api/management/bookings/:id/delete", post(delete_booking))
        .route("/api/contact", post(contact))
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn start_app(app: App) -> anyhow::Result<()> {
    let listen = app.config().listen.clone();
    let router = router(Arc::new(app));

    async fn shutdown_signal() {
        let ctrl_c = async {
            if let Err(err) = signal::ctrl_c().await {
                log::error!("failed to install Ctrl+C handler: {err}");
            }
        };

        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                }
                Err(err) => {
                    log::error!("failed to install signal handler: {err}");
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        log::warn!("shutting down");
    }

    let listener = tokio::net::TcpListener::bind(&listen).await?;
    log::info!("listening on {listen}");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(app: App) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { start_app(app).await })
}

// Make our own error that wraps `AppError`.
#[derive(Debug)]
struct HttpError(AppError);

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RoomUnavailable(_) | AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Other(_) => {
                log::error!("{self:?}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

// This enables using `?` on functions that return `Result<_, AppError>`.
impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

async fn list_hotels(
    State(state): State<Arc<SharedState>>,
    RawQuery(query): RawQuery,
) -> Result<Json<SearchResults>, HttpError> {
    let query = query.unwrap_or_default();
    let pairs = url::form_urlencoded::parse(query.as_bytes()).collect::<Vec<_>>();

    // customer_id only attributes the search, it never filters
    let customer_id = match pairs.iter().find(|(key, _)| key == "customer_id") {
        Some((_, value)) => Some(value.parse::<u64>().map_err(|_| {
            AppError::Validation(format!("invalid customer_id {value:?}"))
        })?),
        None => None,
    };
    let params = FilterParams::from_pairs(pairs);

    log::debug!("search params: {params:?}");

    let app = state.app.clone();
    tokio::task::block_in_place(move || {
        app.search(&params, customer_id)
            .map(Json)
            .map_err(Into::into)
    })
}

async fn hotel_detail(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<u64>,
) -> Result<Json<HotelDetail>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || app.hotel_detail(id).map(Json).map_err(Into::into))
}

#[derive(Debug, Deserialize)]
struct RatingRequest {
    score: f64,
}

async fn rate_hotel(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<u64>,
    Json(payload): Json<RatingRequest>,
) -> Result<Json<Hotel>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || app.rate(id, payload.score).map(Json).map_err(Into::into))
}

async fn list_rooms(State(state): State<Arc<SharedState>>) -> Result<Json<Vec<Room>>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || app.rooms().map(Json).map_err(Into::into))
}

async fn book_room(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<u64>,
    Json(payload): Json<BookRequest>,
) -> Result<(StatusCode, Json<Booking>), HttpError> {
    log::debug!("payload: {payload:?}");

    let app = state.app.clone();
    tokio::task::block_in_place(move || {
        let booking = app.book_room(id, payload)?;
        Ok((StatusCode::CREATED, Json(booking)))
    })
}

async fn booking_confirmation(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<u64>,
) -> Result<Json<BookingDetail>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || app.booking(id).map(Json).map_err(Into::into))
}

async fn register(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<CustomerCreate>,
) -> Result<(StatusCode, Json<Customer>), HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || {
        let customer = app.register(payload)?;
        Ok((StatusCode::CREATED, Json(customer)))
    })
}

async fn my_bookings(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<BookingDetail>>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || app.customer_bookings(id).map(Json).map_err(Into::into))
}

async fn recommendations(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<Hotel>>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || app.recommend(id).map(Json).map_err(Into::into))
}

async fn management_bookings(
    State(state): State<Arc<SharedState>>,
) -> Result<Json<Vec<BookingDetail>>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || app.all_bookings().map(Json).map_err(Into::into))
}

async fn delete_booking(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<u64>,
) -> Result<Json<Booking>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || app.delete_booking(id).map(Json).map_err(Into::into))
}

async fn contact(
    State(state): State<Arc<SharedState>>,
    Json(payload): Json<ContactRequest>,
) -> Result<Json<serde_json::Value>, HttpError> {
    let app = state.app.clone();
    tokio::task::block_in_place(move || {
        app.contact(payload)?;
        Ok(Json(json!({"success": true})))
    })
}
