use std::io;

/// Network hostname of this machine, used as the page title when `SHOWHOST`
/// is enabled.
pub fn hostname() -> io::Result<String> {
    hostname::get()?
        .into_string()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "hostname is not valid UTF-8"))
}

/// Attribute key used for per-option log events, e.g. `"Cats Vote"`.
pub fn vote_event_name(label: &str) -> String {
    format!("{} Vote", label)
}
