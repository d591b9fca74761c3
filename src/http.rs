use std::{collections::HashMap, convert::Infallible, net::SocketAddr, time::Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, Path, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    catalog::{Facet, TopOrder},
    logging::logger,
    paging::{paged, PagingError, PagingParams},
    stations::{downgrade_https, is_vtuner_host, Directory, Station},
    vtuner::{Item, Page, StationItem, INIT_TOKEN},
};

const XML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const MIN_SEARCH_LENGTH: usize = 3;
const RADIO_BROWSER_ENTRIES: usize = 5;
const LANDING_ENTRIES: usize = 2;

type ApiResponse = Result<Response, ApiError>;

fn extract_request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

async fn log_requests(request: Request<Body>, next: Next) -> Response {
    let request_id = extract_request_id(request.headers());
    let method = request.method().clone();
    let raw_url = request.uri().to_string();
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());
    let started_at = Instant::now();

    logger().info(
        "request.received",
        json!({
            "requestId": request_id,
            "method": method.as_str(),
            "rawUrl": raw_url,
            "clientIp": client_ip,
            "userAgent": user_agent,
        }),
    );

    let mut response = next.run(request).await;
    let status = response.status().as_u16();
    let duration_ms = started_at.elapsed().as_secs_f64() * 1000.0;

    logger().info(
        "request.completed",
        json!({
            "requestId": request_id,
            "method": method.as_str(),
            "rawUrl": raw_url,
            "statusCode": status,
            "durationMs": duration_ms,
            "clientIp": client_ip,
        }),
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(header::HeaderName::from_static("x-request-id"), value);
    }

    response
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    NotFound(&'static str),
    Internal(anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse { error: message }),
            )
                .into_response(),
            ApiError::NotFound(message) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse { error: message }),
            )
                .into_response(),
            ApiError::Internal(error) => {
                logger().error(
                    "internal.error",
                    json!({
                        "error": {
                            "message": error.to_string(),
                            "debug": format!("{:?}", error),
                        }
                    }),
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: "Internal Server Error",
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        xml_response(self.to_xml())
    }
}

fn xml_response(body: String) -> Response {
    ([(header::CONTENT_TYPE, XML_CONTENT_TYPE)], body).into_response()
}

/// What every receiver-facing handler needs from the request: the host the
/// receiver used (links are built against it) and the first value of each
/// query parameter.
pub struct VtunerRequest {
    host: Option<String>,
    public_host: String,
    params: HashMap<String, String>,
    raw_query: String,
}

impl FromRequestParts<AppState> for VtunerRequest {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let raw_query = parts.uri.query().unwrap_or_default().to_string();

        let mut params = HashMap::new();
        for (key, value) in url::form_urlencoded::parse(raw_query.as_bytes()) {
            params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }

        Ok(Self {
            public_host: host
                .clone()
                .unwrap_or_else(|| state.config.default_public_host()),
            host,
            params,
            raw_query,
        })
    }
}

impl VtunerRequest {
    fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    fn link(&self, path: &str) -> String {
        format!("http://{}{}", self.public_host, path)
    }

    fn station_link(&self, path: &str, station_id: &str) -> String {
        format!("{}?id={}", self.link(path), urlencoding::encode(station_id))
    }

    fn paging(&self) -> PagingParams {
        PagingParams::from_query(&self.params)
    }

    fn paging_failed(&self, error: PagingError) -> ApiError {
        logger().error(
            "paging.invalid",
            json!({
                "error": error.to_string(),
                "query": self.raw_query,
            }),
        );
        ApiError::BadRequest("Invalid paging parameters")
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(landing).post(landing))
        .route("/ycast/", get(landing).post(landing))
        .route("/setupapp/{*path}", get(upstream).post(upstream))
        .route(
            "/ycast/my_stations/",
            get(my_stations_landing).post(my_stations_landing),
        )
        .route(
            "/ycast/my_stations/{category}",
            get(my_stations_category).post(my_stations_category),
        )
        .route(
            "/ycast/radiobrowser/",
            get(radiobrowser_landing).post(radiobrowser_landing),
        )
        .route(
            "/ycast/radiobrowser/popular/",
            get(radiobrowser_popular).post(radiobrowser_popular),
        )
        .route(
            "/ycast/radiobrowser/rated/",
            get(radiobrowser_rated).post(radiobrowser_rated),
        )
        .route(
            "/ycast/radiobrowser/{facet}/",
            get(radiobrowser_directories).post(radiobrowser_directories),
        )
        .route(
            "/ycast/radiobrowser/{facet}/{directory}",
            get(radiobrowser_stations).post(radiobrowser_stations),
        )
        .route("/ycast/search/", get(station_search).post(station_search))
        .route("/ycast/play", get(play).post(play))
        .route("/ycast/station", get(station_info).post(station_info))
        .route("/ycast/icon", get(station_icon).post(station_icon))
        .with_state(state)
        .layer(middleware::from_fn(log_requests))
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::new(state.config.bind_address, state.config.port);
    let router = build_router(state);

    let listener = TcpListener::bind(addr).await?;
    logger().info(
        "server.listening",
        json!({
            "address": addr.to_string()
        }),
    );

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse<'a> {
    status: &'a str,
}

async fn healthz() -> Response {
    (StatusCode::OK, Json(HealthResponse { status: "ok" })).into_response()
}

async fn upstream(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: VtunerRequest,
) -> ApiResponse {
    let path = path.to_lowercase();
    if request.params.get("token").map(String::as_str) == Some("0") {
        return Ok(xml_response(INIT_TOKEN.to_string()));
    }
    if request.param("search").is_some() {
        return station_search_page(&state, &request)
            .await
            .map(IntoResponse::into_response);
    }
    if path.contains("statxml.asp") && request.param("id").is_some() {
        return station_info_page(&state, &request)
            .await
            .map(IntoResponse::into_response);
    }
    if path.contains("navxml.asp") {
        return Ok(radiobrowser_landing_page(&state, &request)
            .await
            .into_response());
    }
    if path.contains("favxml.asp") {
        return my_stations_page(&state, &request)
            .await
            .map(IntoResponse::into_response);
    }
    if path.contains("loginxml.asp") {
        return Ok(landing_page(&state, &request).await.into_response());
    }

    logger().error("vtuner.unhandled_path", json!({ "path": format!("/setupapp/{path}") }));
    Err(ApiError::NotFound("Not Found"))
}

async fn landing(State(state): State<AppState>, request: VtunerRequest) -> Page {
    landing_page(&state, &request).await
}

async fn landing_page(state: &AppState, request: &VtunerRequest) -> Page {
    let mut page = Page::new();
    page.add(Item::directory(
        "Radio Browser",
        request.link("/ycast/radiobrowser/"),
        RADIO_BROWSER_ENTRIES as u64,
    ));
    match state.catalog.my_stations() {
        Some(my_stations) => {
            let categories = my_stations.categories().await;
            page.add(Item::directory(
                "My Stations",
                request.link("/ycast/my_stations/"),
                categories.len() as u64,
            ));
        }
        None => page.add(Item::display("'My Stations' feature not configured")),
    }
    page.set_count(LANDING_ENTRIES);
    page
}

async fn my_stations_landing(
    State(state): State<AppState>,
    request: VtunerRequest,
) -> Result<Page, ApiError> {
    my_stations_page(&state, &request).await
}

async fn my_stations_page(state: &AppState, request: &VtunerRequest) -> Result<Page, ApiError> {
    let categories = match state.catalog.my_stations() {
        Some(my_stations) => my_stations.categories().await,
        None => Vec::new(),
    };
    directories_page(request, &categories, "/ycast/my_stations/")
}

async fn my_stations_category(
    State(state): State<AppState>,
    Path(category): Path<String>,
    request: VtunerRequest,
) -> Result<Page, ApiError> {
    let stations = match state.catalog.my_stations() {
        Some(my_stations) => my_stations.stations_in(&category).await,
        None => Vec::new(),
    };
    stations_page(&state, &request, &stations)
}

async fn radiobrowser_landing(State(state): State<AppState>, request: VtunerRequest) -> Page {
    radiobrowser_landing_page(&state, &request).await
}

async fn radiobrowser_landing_page(state: &AppState, request: &VtunerRequest) -> Page {
    let remote = state.remote();
    let (countries, languages, genres) = tokio::join!(
        remote.directories(Facet::Country),
        remote.directories(Facet::Language),
        remote.directories(Facet::Genre),
    );
    let limit = remote.station_limit() as u64;

    let mut page = Page::new();
    for (facet, directories) in Facet::ALL.into_iter().zip([countries, languages, genres]) {
        page.add(Item::directory(
            facet.title(),
            request.link(&format!("/ycast/radiobrowser/{}/", facet.path())),
            directories.len() as u64,
        ));
    }
    page.add(Item::directory(
        "Most Popular",
        request.link("/ycast/radiobrowser/popular/"),
        limit,
    ));
    page.add(Item::directory(
        "Top Rated",
        request.link("/ycast/radiobrowser/rated/"),
        limit,
    ));
    page.set_count(RADIO_BROWSER_ENTRIES);
    page
}

fn parse_facet(raw: &str) -> Result<Facet, ApiError> {
    Facet::ALL
        .into_iter()
        .find(|facet| facet.path() == raw)
        .ok_or(ApiError::NotFound("Not Found"))
}

async fn radiobrowser_directories(
    State(state): State<AppState>,
    Path(facet): Path<String>,
    request: VtunerRequest,
) -> Result<Page, ApiError> {
    let facet = parse_facet(&facet)?;
    let directories = state.remote().directories(facet).await;
    directories_page(
        &request,
        &directories,
        &format!("/ycast/radiobrowser/{}/", facet.path()),
    )
}

async fn radiobrowser_stations(
    State(state): State<AppState>,
    Path((facet, directory)): Path<(String, String)>,
    request: VtunerRequest,
) -> Result<Page, ApiError> {
    let facet = parse_facet(&facet)?;
    let stations = state.remote().stations_by(facet, &directory).await;
    stations_page(&state, &request, &stations)
}

async fn radiobrowser_popular(
    State(state): State<AppState>,
    request: VtunerRequest,
) -> Result<Page, ApiError> {
    let stations = state.remote().top_stations(TopOrder::Clicks).await;
    stations_page(&state, &request, &stations)
}

async fn radiobrowser_rated(
    State(state): State<AppState>,
    request: VtunerRequest,
) -> Result<Page, ApiError> {
    let stations = state.remote().top_stations(TopOrder::Votes).await;
    stations_page(&state, &request, &stations)
}

async fn station_search(
    State(state): State<AppState>,
    request: VtunerRequest,
) -> Result<Page, ApiError> {
    station_search_page(&state, &request).await
}

async fn station_search_page(state: &AppState, request: &VtunerRequest) -> Result<Page, ApiError> {
    let query = request.param("search").unwrap_or_default();
    if query.chars().count() < MIN_SEARCH_LENGTH {
        return Ok(Page::message("Search query too short"));
    }
    let stations = state.catalog.search(query).await;
    stations_page(state, request, &stations)
}

async fn play(State(state): State<AppState>, request: VtunerRequest) -> ApiResponse {
    let Some(station_id) = request.param("id") else {
        logger().error("play.missing_id", json!({ "query": request.raw_query }));
        return Err(ApiError::BadRequest("Station id required"));
    };
    let Some(station) = state.catalog.station(station_id, true).await else {
        logger().error("play.station_not_found", json!({ "stationId": station_id }));
        return Err(ApiError::NotFound("Station not found"));
    };

    if let Some(host) = request.host.as_deref().filter(|host| !is_vtuner_host(host)) {
        logger().warn(
            "play.host_not_whitelisted",
            json!({
                "host": host,
                "message": "receivers may reject redirects from hosts outside *.vtuner.com",
            }),
        );
    }

    let target = downgrade_https(&station.url);
    logger().debug(
        "play.redirect",
        json!({ "stationId": station_id, "target": target }),
    );
    let location = HeaderValue::from_str(&target)
        .map_err(|error| ApiError::Internal(anyhow::anyhow!("invalid stream url: {error}")))?;
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

async fn station_info(
    State(state): State<AppState>,
    request: VtunerRequest,
) -> Result<Page, ApiError> {
    station_info_page(&state, &request).await
}

async fn station_info_page(state: &AppState, request: &VtunerRequest) -> Result<Page, ApiError> {
    let Some(station_id) = request.param("id") else {
        logger().error("station.missing_id", json!({ "query": request.raw_query }));
        return Err(ApiError::BadRequest("Station id required"));
    };
    let resolve_stream = !state.config.station_tracking;
    let Some(station) = state.catalog.station(station_id, resolve_stream).await else {
        logger().error("station.not_found", json!({ "stationId": station_id }));
        return Ok(Page::message("Station not found"));
    };

    let mut page = Page::new();
    page.add(station_item(state, request, &station));
    page.set_count(1);
    Ok(page)
}

async fn station_icon(State(state): State<AppState>, request: VtunerRequest) -> ApiResponse {
    let Some(station_id) = request.param("id") else {
        logger().error("icon.missing_id", json!({ "query": request.raw_query }));
        return Err(ApiError::BadRequest("Station id required"));
    };
    let Some(station) = state.catalog.station(station_id, false).await else {
        logger().error("icon.station_not_found", json!({ "stationId": station_id }));
        return Err(ApiError::NotFound("Station not found"));
    };
    if station.icon.is_none() {
        logger().warn("icon.not_configured", json!({ "stationId": station_id }));
        return Err(ApiError::NotFound("Station has no icon"));
    }
    let Some(icon) = state.icons.icon_for(&station).await else {
        return Err(ApiError::NotFound("Station icon unavailable"));
    };

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], icon).into_response())
}

fn directories_page(
    request: &VtunerRequest,
    directories: &[Directory],
    link_base: &str,
) -> Result<Page, ApiError> {
    paged(directories, &request.paging(), "No entries found", |directory| {
        Item::directory(
            directory.display_name(),
            request.link(&format!("{link_base}{}", urlencoding::encode(&directory.name))),
            directory.item_count,
        )
    })
    .map_err(|error| request.paging_failed(error))
}

fn stations_page(
    state: &AppState,
    request: &VtunerRequest,
    stations: &[Station],
) -> Result<Page, ApiError> {
    paged(stations, &request.paging(), "No stations found", |station| {
        station_item(state, request, station).into()
    })
    .map_err(|error| request.paging_failed(error))
}

fn station_item(state: &AppState, request: &VtunerRequest, station: &Station) -> StationItem {
    let id = station.id.to_string();
    let url = if state.config.station_tracking {
        request.station_link("/ycast/play", &id)
    } else {
        downgrade_https(&station.url)
    };
    StationItem {
        icon: Some(request.station_link("/ycast/icon", &id)),
        url,
        name: station.name.clone(),
        description: station.description.clone(),
        genre: station.genre.clone(),
        location: station.location.clone(),
        mime: station.codec.clone(),
        bitrate: station.bitrate,
        bookmark: None,
        id,
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            logger().error("server.signal_failed", json!({ "error": error.to_string() }));
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(error) => {
                logger().error("server.signal_failed", json!({ "error": error.to_string() }));
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    logger().info("server.shutting_down", json!({}));
}
