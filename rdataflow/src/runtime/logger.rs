use std::path::Path;
use std::str::FromStr;

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::Append;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::api::error::{Error, Result};
use crate::runtime::ClusterMode;

const LOG_FILE_NAME: &str = "rdataflow.log";

/// level value: ["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"], ignore ascii case
pub fn parse_level(level: &str) -> Result<LevelFilter> {
    LevelFilter::from_str(level).map_err(|_| Error::Config(format!("illegal log level `{}`", level)))
}

/// init log4rs
/// cluster_mode: local logs to the console, standalone to a rolling file under `work_dir`
pub fn init_log(cluster_mode: &ClusterMode, work_dir: &Path, level: &str) -> Result<()> {
    let default_level = parse_level(level)?;

    let encoder =
        PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} {level} [{thread}] {target} - {m}{n}");

    let (name, appender) = match cluster_mode {
        ClusterMode::Local => ("console", create_console_appender(encoder)),
        ClusterMode::Standalone => (
            "rolling_file",
            create_rolling_file_appender(encoder, work_dir)?,
        ),
    };

    let config = Config::builder()
        .appender(Appender::builder().build(name, appender))
        .build(Root::builder().appender(name).build(default_level))
        .map_err(|e| Error::Config(e.to_string()))?;

    log4rs::init_config(config).map_err(|e| Error::Config(e.to_string()))?;
    Ok(())
}

fn create_console_appender(encoder: PatternEncoder) -> Box<dyn Append> {
    let stdout = ConsoleAppender::builder()
        .target(Target::Stdout)
        .encoder(Box::new(encoder))
        .build();
    Box::new(stdout)
}

fn create_rolling_file_appender(encoder: PatternEncoder, work_dir: &Path) -> Result<Box<dyn Append>> {
    let path = work_dir.join(LOG_FILE_NAME);
    let roll_path = format!("{}.{{}}", path.to_string_lossy());

    let trigger = SizeTrigger::new(50 * 1024 * 1024);

    let roll = FixedWindowRoller::builder()
        .base(1)
        .build(roll_path.as_str(), 20)
        .map_err(|e| Error::Config(format!("log roll error. {}", e)))?;

    let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roll));

    let rolling_file = RollingFileAppender::builder()
        .encoder(Box::new(encoder))
        .append(true)
        .build(path, Box::new(policy))?;
    Ok(Box::new(rolling_file))
}

#[cfg(test)]
mod tests {
    use log::LevelFilter;

    use crate::runtime::logger::{init_log, parse_level};
    use crate::runtime::ClusterMode;

    #[test]
    pub fn parse_level_test() {
        assert_eq!(parse_level("debug").unwrap(), LevelFilter::Debug);
        assert_eq!(parse_level("OFF").unwrap(), LevelFilter::Off);
        assert!(parse_level("verbose").is_err());

        let dir = tempfile::tempdir().unwrap();
        assert!(init_log(&ClusterMode::Local, dir.path(), "loud").is_err());
    }
}
