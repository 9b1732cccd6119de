// GUI-subsystem binary on Windows: no console window is allocated.
#![windows_subsystem = "windows"]

use eframe::egui;
use picview::app::PicViewApp;
use picview::logger;

fn main() -> Result<(), eframe::Error> {
    // Session log first, so startup problems are captured too
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 660.0])
            .with_title("PicView"),
        ..Default::default()
    };

    eframe::run_native(
        "PicView",
        options,
        Box::new(|cc| Box::new(PicViewApp::new(cc))),
    )
}
