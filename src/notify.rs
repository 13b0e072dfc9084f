use std::io::Write;

/// Delivers announcement lines to a channel.
pub trait Notifier: Send + Sync {
    fn say(&self, channel: &str, message: &str);
}

/// Writes `<channel> <message>` lines to stdout, for piping into a chat relay.
pub struct StdoutNotifier;

impl Notifier for StdoutNotifier {
    fn say(&self, channel: &str, message: &str) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{} {}", channel, message) {
            tracing::error!("Failed to write announcement for {}: {}", channel, e);
        }
    }
}
