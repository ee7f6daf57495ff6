use bring_up::main::BringUp;
use clap::Parser;
use cli::{Args, Command, DisplayKind};
use config::Config;
use device_display::{
    impl_console::DeviceDisplayConsole, impl_fake::DeviceDisplayFake, impl_gui::DeviceDisplayGui,
    interface::DeviceDisplay,
};
use device_frame_grabber::{
    impl_fake::FrameGrabberFake, impl_ffmpeg::FrameGrabberFfmpeg, interface::FrameGrabber,
};
use device_shell::{
    impl_fake::{FakeAttempt, RemoteShellFake},
    impl_ssh::RemoteShellSsh,
    interface::RemoteShell,
};
use library::logger::{impl_console::LoggerConsole, interface::Logger};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

mod bring_up;
mod burst;
mod cli;
mod config;
mod device_display;
mod device_frame_grabber;
mod device_shell;
mod error;
mod library;

fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = Config::default();
    config.board.password = cli::password_from_env();
    if let Err(e) = args.apply(&mut config).and_then(|_| config.validate()) {
        eprintln!("Invalid configuration: {}", e);
        return ExitCode::from(2);
    }

    let logger: Arc<dyn Logger + Send + Sync> = Arc::new(LoggerConsole::new(config.logger_timezone));

    let frame_grabber: Arc<dyn FrameGrabber + Send + Sync> = if args.simulate {
        Arc::new(FrameGrabberFake::new(logger.clone()).with_failure_rate(0.1))
    } else {
        Arc::new(FrameGrabberFfmpeg::new(config.image_quality, logger.clone()))
    };

    match args.command() {
        Command::Run(_) => {
            let device_display = match display(args.display, &logger) {
                Ok(device_display) => device_display,
                Err(e) => {
                    let _ = logger.error(&format!("Display failed to start: {}", e));
                    return ExitCode::FAILURE;
                }
            };

            let shell: Arc<dyn RemoteShell + Send + Sync> = if args.simulate {
                Arc::new(simulated_board(&config, logger.clone()))
            } else {
                Arc::new(RemoteShellSsh::new(config.board.clone(), logger.clone()))
            };

            let bring_up = BringUp::new(config, logger, shell, frame_grabber, device_display);

            if bring_up.run().is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Command::Burst(_) => {
            let report = burst::run(&config, logger, frame_grabber);

            if report.succeeded > 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn display(
    kind: DisplayKind,
    logger: &Arc<dyn Logger + Send + Sync>,
) -> Result<Arc<Mutex<dyn DeviceDisplay + Send + Sync>>, Box<dyn std::error::Error + Send + Sync>> {
    let device_display: Arc<Mutex<dyn DeviceDisplay + Send + Sync>> = match kind {
        DisplayKind::Console => Arc::new(Mutex::new(DeviceDisplayConsole::new())),
        DisplayKind::Gui => Arc::new(Mutex::new(DeviceDisplayGui::new())),
        DisplayKind::Off => Arc::new(Mutex::new(DeviceDisplayFake::new())),
    };

    device_display.lock().map_err(|e| e.to_string())?.init()?;
    let _ = logger.info(&format!("Display ready ({:?})", kind));

    Ok(device_display)
}

/// A board that fails a random number of attempts before the stream comes up.
fn simulated_board(config: &Config, logger: Arc<dyn Logger + Send + Sync>) -> RemoteShellFake {
    let failures = rand::random_range(0..config.max_attempts.min(3));
    let mut attempts: Vec<FakeAttempt> = (0..failures)
        .map(|i| {
            if i % 2 == 0 {
                FakeAttempt::failed()
            } else {
                FakeAttempt::crashed()
            }
        })
        .collect();
    attempts.push(FakeAttempt::ready());

    let _ = logger.info(&format!(
        "Simulating a board that needs {} attempts",
        attempts.len()
    ));

    RemoteShellFake::new(&config.process_name, logger)
        .with_attempts(attempts)
        .with_stale_process(&config.process_name)
}
