//! Forwarding of etcd's structured log output

use serde::Deserialize;
use tracing::{debug, error, info, warn};

#[derive(Deserialize)]
struct LogLine<'a> {
    #[serde(borrow)]
    level: &'a str,

    #[serde(borrow, default)]
    msg: std::borrow::Cow<'a, str>,
}

/// Re-emits one line of etcd output under the `etcd` target.
#[allow(clippy::cognitive_complexity)]
pub fn forward_line(line: &str) {
    let Ok(parsed) = serde_json::from_str::<LogLine<'_>>(line) else {
        info!(target: "etcd", "{}", line);
        return;
    };

    let message = parsed.msg.as_ref();

    match parsed.level {
        "debug" => debug!(target: "etcd", "{}", message),
        "info" => info!(target: "etcd", "{}", message),
        "warn" => warn!(target: "etcd", "{}", message),
        "error" | "dpanic" | "panic" | "fatal" => error!(target: "etcd", "{}", message),
        _ => info!(target: "etcd", "{}", line),
    }
}
