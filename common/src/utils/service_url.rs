use url::Url;

/// Joins URL fragments with a single `/`, trimming one leading and one
/// trailing slash from every part.
pub fn join_url_parts(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| {
            let part = part.strip_prefix('/').unwrap_or(part);
            part.strip_suffix('/').unwrap_or(part)
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Batch service URL living next to the hub: same scheme and host, fixed port.
pub fn derive_service_url(hub_url: &str, port: u16, prefix: &str) -> Result<Url, url::ParseError> {
    let hub = Url::parse(hub_url)?;
    let host = hub.host_str().unwrap_or_default();
    let base = format!("{}://{}:{}", hub.scheme(), host, port);
    Url::parse(&join_url_parts(&[&base, prefix]))
}

/// First segment of a UUID, used to keep output directory names short.
pub fn shorten_id(job_id: &str) -> &str {
    job_id.split('-').next().unwrap_or(job_id)
}
