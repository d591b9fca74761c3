pub mod app_state;
pub mod catalog;
pub mod config;
pub mod countries;
pub mod http;
pub mod icons;
pub mod logging;
pub mod my_stations;
pub mod paging;
pub mod radio_browser;
pub mod stations;
pub mod vtuner;

pub use app_state::AppState;
pub use http::build_router;
