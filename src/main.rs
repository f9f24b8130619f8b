mod app;
mod board;
mod dispatch;
mod error;
mod logging;
mod model;
mod render;
mod schema;
mod services;
mod theme;
mod ui;
mod validate;
mod widgets;

use anyhow::Result;

fn main() -> Result<()> {
    ui::run()
}
