use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::Parser;
use eframe::egui;
use rusty_earth::app::RustyEarthApp;
use rusty_earth::cli::{Cli, Command, DatasetArgs, ImageArgs, MapArgs};
use rusty_earth::inspect::{self, ImageInspection, MapInspection};
use rusty_earth::map::export::{render_mosaic, write_geotiff, write_leaflet_html};
use rusty_earth::map::{FetchConfig, TileFetcher};
use rusty_earth::raster;
use rusty_earth::state::{ActiveView, AppState, DatasetState, ImageState};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let fetch = FetchConfig {
        insecure: cli.insecure,
        ..FetchConfig::default()
    };

    let result = match cli.command {
        Command::Map(args) => run_map(args, fetch, cli.headless),
        Command::Image(args) => run_image(args, fetch, cli.headless),
        Command::Dataset(args) => run_dataset(args, fetch, cli.headless),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_map(args: MapArgs, fetch: FetchConfig, headless: bool) -> Result<()> {
    let view = args.view();

    if let Some(path) = &args.html {
        write_leaflet_html(&view, path)?;
    }
    if let Some(path) = &args.export {
        let mut fetcher = TileFetcher::new(view.basemap.clone(), &fetch)?;
        let mosaic = render_mosaic(&view, args.width, args.height, &mut fetcher);
        write_geotiff(&mosaic, path)?;
    }

    if headless {
        print!("{}", MapInspection::new(view, args.width, args.height));
        return Ok(());
    }
    show_window("Rusty Earth – Map", move |ctx| {
        let mut state = AppState::new(None, fetch);
        state.open_map(ctx, view);
        state
    })
}

fn run_image(args: ImageArgs, fetch: FetchConfig, headless: bool) -> Result<()> {
    let inspection = ImageInspection::open(&args.path)?;

    if let Some(path) = &args.jpeg {
        raster::save_jpeg(&inspection.rgb, path, args.quality)?;
    }

    if headless {
        print!("{inspection}");
        return Ok(());
    }
    let mut image = ImageState::new(inspection);
    image.jpeg_quality = args.quality;
    show_window("Rusty Earth – Image", move |_| {
        AppState::new(Some(ActiveView::Image(image)), fetch)
    })
}

fn run_dataset(args: DatasetArgs, fetch: FetchConfig, headless: bool) -> Result<()> {
    let dataset = inspect::open_dataset(&args.root, args.options())?;
    let ds = DatasetState::from_dataset(dataset, args.loader_config(), args.index)?;

    if headless {
        print!("{}", ds.inspection);
        return Ok(());
    }
    show_window("Rusty Earth – BigEarthNet", move |_| {
        AppState::new(Some(ActiveView::Dataset(ds)), fetch)
    })
}

/// Run the window until it is closed; `state` builds the initial view.
fn show_window<F>(title: &str, state: F) -> Result<()>
where
    F: FnOnce(&egui::Context) -> AppState + 'static,
{
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        title,
        options,
        Box::new(move |cc| {
            // Install image loaders so egui can render png/jpg/etc.
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(RustyEarthApp::new(state(&cc.egui_ctx))))
        }),
    )
    .map_err(|e| anyhow!("running window: {e}"))
}
