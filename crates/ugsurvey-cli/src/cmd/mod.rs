pub mod export;
pub mod history;
pub mod load;
pub mod normalize;
pub mod reference;
pub mod run;
pub mod status;
pub mod validate;

use anyhow::Result;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};
use ugsurvey_store::Store;

use crate::config::Config;

/// Open the configured database, creating its directory if needed.
pub fn open_store(config: &Config) -> Result<Store> {
    Store::open(&config.database.path)
}

/// Empty table with the standard style and a cyan header.
pub fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}
