use anyhow::Result;
use fern::colors::{Color, ColoredLevelConfig};

/// Setup logging.
///
/// Logs go to a file and stderr. stdout carries the commands for the Minecraft server.
pub fn init() -> Result<()> {
    let log_path =
        std::env::var("BLOCKBOT_LOGS").unwrap_or_else(|_| "blockbot-discord.log".to_string());

    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Cyan)
        .debug(Color::Green)
        .trace(Color::BrightBlack);

    let base = fern::Dispatch::new().level_for("notify", log::LevelFilter::Warn);

    let file_cfg = fern::Dispatch::new()
        .level(log::LevelFilter::Info)
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}:{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                record.target(),
                record
                    .line()
                    .map(|x| x.to_string())
                    .unwrap_or_else(|| "X".to_string()),
                record.level(),
                message
            ))
        })
        .chain(fern::log_file(log_path)?);

    let stderr_cfg = fern::Dispatch::new()
        .level(log::LevelFilter::Info)
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{}:{}][{}] {}",
                record.target(),
                record
                    .line()
                    .map(|x| x.to_string())
                    .unwrap_or_else(|| "X".to_string()),
                colors.color(record.level()),
                message
            ))
        })
        .chain(std::io::stderr());

    base.chain(file_cfg).chain(stderr_cfg).apply()?;

    Ok(())
}
