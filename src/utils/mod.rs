pub mod geo;
pub mod logging;
pub mod tile_url;
