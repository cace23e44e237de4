mod app;
mod domain;
mod feed;
mod logging;
mod poller;
mod state;
mod timefmt;

use app::{APP_NAME, DashApp};
use eframe::NativeOptions;

fn main() -> eframe::Result<()> {
    logging::init();

    let options = NativeOptions::default();
    eframe::run_native(
        APP_NAME,
        options,
        Box::new(|cc| Ok(Box::new(DashApp::new(cc)))),
    )
}
