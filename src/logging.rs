//! Logging setup for embedders that want this crate's `debug!`/`warn!`
//! call sites to go somewhere. The crate itself only ever calls into
//! the `log` facade; wiring an actual sink is optional and left to
//! whoever embeds it, mirroring the CLI/HTTP shell's role as an
//! external collaborator.

/// Wires a `fern::Dispatch` to stdout at `level`, formatted as
/// `[time][target][level] message`. Safe to call more than once only
/// if `log`'s global logger hasn't already been set; a second call
/// will return an error from `fern`'s `apply()` rather than panic.
pub fn init_logging(level: log::LevelFilter) -> Result<(), fern::InitError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                millis_since_epoch(),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

/// A dependency-free timestamp good enough for a log prefix. The crate
/// doesn't otherwise need a calendar-time dependency, so this avoids
/// pulling one in just for formatting log lines.
fn millis_since_epoch() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
