use eframe::egui::ViewportBuilder;
use tracing_subscriber::EnvFilter;

mod app;

use crate::app::ReaderApp;

fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let options = eframe::NativeOptions {
        viewport: ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("Hacker News Reader"),
        ..Default::default()
    };

    eframe::run_native(
        "Hacker News Reader",
        options,
        Box::new(|cc| {
            let app = ReaderApp::new(cc)?;
            Ok(Box::new(app))
        }),
    )
}
