//! Operator-facing message sinks.

use std::fmt::Debug;

/// Where the step reports progress and failures.
pub trait Ui: Debug {
    /// Progress or informational message.
    fn say(&self, message: &str);

    /// Failure message.
    fn error(&self, message: &str);
}

/// Writes progress to stdout and errors to stderr.
#[derive(Debug, Default)]
pub struct ConsoleUi;

impl Ui for ConsoleUi {
    fn say(&self, message: &str) {
        tracing::debug!("ui: {message}");
        println!("==> {message}");
    }

    fn error(&self, message: &str) {
        tracing::debug!("ui error: {message}");
        eprintln!("==> {message}");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::{Arc, Mutex};

    use super::Ui;

    /// A recorded UI message.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Message {
        Say(String),
        Error(String),
    }

    /// Keeps every message; clones share the same log.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingUi {
        messages: Arc<Mutex<Vec<Message>>>,
    }

    impl RecordingUi {
        pub(crate) fn messages(&self) -> Vec<Message> {
            self.messages.lock().unwrap().clone()
        }

        pub(crate) fn said(&self) -> Vec<String> {
            self.messages()
                .into_iter()
                .filter_map(|m| match m {
                    Message::Say(s) => Some(s),
                    Message::Error(_) => None,
                })
                .collect()
        }

        pub(crate) fn errors(&self) -> Vec<String> {
            self.messages()
                .into_iter()
                .filter_map(|m| match m {
                    Message::Error(s) => Some(s),
                    Message::Say(_) => None,
                })
                .collect()
        }
    }

    impl Ui for RecordingUi {
        fn say(&self, message: &str) {
            self.messages
                .lock()
                .unwrap()
                .push(Message::Say(message.to_owned()));
        }

        fn error(&self, message: &str) {
            self.messages
                .lock()
                .unwrap()
                .push(Message::Error(message.to_owned()));
        }
    }
}
