//! Logger installation shared by the workspace binaries.

use log::LevelFilter;

/// Maps the `-v` count and `--quiet` flag to a default log level.
///
/// `RUST_LOG` still takes precedence once [`init`] runs.
///
/// ```
/// use automation_common::logging::level_for;
/// use log::LevelFilter;
///
/// assert_eq!(level_for(0, false), LevelFilter::Warn);
/// assert_eq!(level_for(2, false), LevelFilter::Debug);
/// assert_eq!(level_for(3, true), LevelFilter::Error);
/// ```
#[must_use]
pub fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs `env_logger` writing to stderr with `level` as the default
/// filter.
///
/// Repeated calls are ignored so tests and embedding binaries can call this
/// freely.
pub fn init(level: LevelFilter) {
    let env = env_logger::Env::default().filter_or("RUST_LOG", level.to_string());
    if env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init()
        .is_err()
    {
        log::trace!("logger already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, LevelFilter::Warn)]
    #[case(1, LevelFilter::Info)]
    #[case(2, LevelFilter::Debug)]
    #[case(3, LevelFilter::Trace)]
    #[case(9, LevelFilter::Trace)]
    fn verbosity_raises_the_level(#[case] verbosity: u8, #[case] expected: LevelFilter) {
        assert_eq!(level_for(verbosity, false), expected);
    }

    #[test]
    fn quiet_wins_over_verbosity() {
        assert_eq!(level_for(2, true), LevelFilter::Error);
    }

    #[test]
    fn init_twice_is_harmless() {
        init(LevelFilter::Warn);
        init(LevelFilter::Debug);
    }
}
