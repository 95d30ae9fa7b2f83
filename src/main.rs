use std::process;

use posecam::app::{App, AppConfig};
use posecam::config::Settings;
use posecam::gui::{self, Frontend};
use posecam::holistic::Holistic;
use posecam::record::FfmpegFactory;
use posecam::timer::FpsCounter;
use posecam::ui::{self, Layout};
use posecam::video::Source;

fn main() {
    posecam::init_logger!();

    // clap reports malformed arguments and exits by itself; this only sees invalid values.
    let settings = match Settings::from_args() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("{e:#}");
            process::exit(2);
        }
    };
    log::debug!("{:?}", settings);

    gui::run(move |frontend| run(settings, frontend));
}

fn run(settings: Settings, frontend: Frontend) -> anyhow::Result<()> {
    let holistic = Holistic::new(&settings)?;
    let mut source = Source::open(&settings.source, settings.fps)?;
    if source.fps() == 0 {
        log::warn!("video source reports no frame rate, recording at the fallback rate");
    }

    let mut app = App::new(
        holistic,
        FfmpegFactory::new(&settings.ffmpeg),
        AppConfig {
            output_dir: settings.output_dir.clone(),
            jpeg_quality: settings.jpeg_quality,
            source_fps: source.fps(),
        },
    );

    log::info!("Starting landmark detection GUI. Close window to quit.");
    let result = frame_loop(&mut app, &mut source, &frontend);
    app.shutdown();
    result
}

fn frame_loop(
    app: &mut App<Holistic, FfmpegFactory>,
    source: &mut Source,
    frontend: &Frontend,
) -> anyhow::Result<()> {
    let layout = Layout::new();
    let mut fps = FpsCounter::new("frame loop");
    loop {
        for command in frontend.commands() {
            if !app.handle(command) {
                return Ok(());
            }
        }

        let frame = source.read()?;
        app.update(frame);

        if !frontend.show(&ui::render(&layout, &app.view())) {
            return Ok(());
        }
        fps.tick_with(source.timers().into_iter().chain(app.processor().timers()));
    }
}
