pub mod api;
pub mod comparison;
pub mod csv_import;
pub mod dbscan;
pub mod fake_feed;
pub mod feed;
pub mod http_client;
pub mod query_cache;
pub mod settings;
pub mod stat_normalizer;
pub mod state;
