use clap::Parser;
use digitpad::app::DigitPadApp;
use digitpad::{cli, logger};
use eframe::egui;
use log::LevelFilter;

fn main() -> Result<(), eframe::Error> {
    let args = cli::CliArgs::parse();

    // Initialize session log (overwrites previous session log)
    logger::init(if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });

    // -- CLI / headless mode ---------------------------------------------
    if args.is_cli_mode() {
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            cli::FAILURE_STATUS
        });
    }

    // -- GUI mode -----------------------------------------------------
    let settings = match args.resolve_settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            log::error!("invalid settings: {}", e);
            std::process::exit(cli::FAILURE_STATUS);
        }
    };

    // Window sized around the pad plus the controls below it
    let edge = settings.canvas_size as f32;
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([(edge + 140.0).max(420.0), edge + 280.0])
            .with_min_inner_size([320.0, 400.0])
            .with_title("DigitPad"),
        ..Default::default()
    };

    eframe::run_native(
        "DigitPad",
        options,
        Box::new(move |cc| Box::new(DigitPadApp::new(cc, settings))),
    )
}
