use tracing::info;

/// Command usage events. Implementations must never fail the command; they
/// log or queue and move on.
pub trait Analytics: Send {
    fn track_command(&mut self, command: &str);
    fn session_timed_out(&mut self, context: &str);
}

/// Default sink: structured log lines, picked up by whatever subscriber the
/// binary installed.
#[derive(Default)]
pub struct LogAnalytics;

impl Analytics for LogAnalytics {
    fn track_command(&mut self, command: &str) {
        info!(target: "braid::analytics", command, "command run");
    }

    fn session_timed_out(&mut self, context: &str) {
        info!(target: "braid::analytics", context, "session timed out");
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct RecordingAnalytics {
    pub commands: Vec<String>,
    pub timed_out_contexts: Vec<String>,
}

#[cfg(test)]
impl Analytics for RecordingAnalytics {
    fn track_command(&mut self, command: &str) {
        self.commands.push(command.to_string());
    }

    fn session_timed_out(&mut self, context: &str) {
        self.timed_out_contexts.push(context.to_string());
    }
}
