//! HTTP API clients

pub mod price_feed;
pub mod route_api;

pub use price_feed::SettlementPriceChain;
pub use route_api::{RouteApiClient, RouteApiSwapper, RouteApiVenue, VenueRoute};
