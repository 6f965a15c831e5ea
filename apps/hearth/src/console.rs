//! Terminal front end for dispatched actions and prompts.
//!
//! Actions are printed to stdout as JSON lines. Modals are printed to
//! stderr with numbered choices, and the answer is read from stdin.

use std::future::Future;
use std::pin::Pin;

use hearth_protocol::Cave;
use hearth_tasks::{Action, Dispatch, Modal, ModalResponse};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::{Mutex, mpsc};

type Input = Box<dyn AsyncBufRead + Send + Unpin>;

/// Prints actions and asks the user on the terminal.
///
/// Launch requests are also forwarded on a channel so the caller can run
/// them.
pub struct ConsoleDispatch {
    input: Mutex<Lines<Input>>,
    launches: mpsc::UnboundedSender<Cave>,
}

impl ConsoleDispatch {
    pub fn stdin(launches: mpsc::UnboundedSender<Cave>) -> Self {
        Self::with_input(BufReader::new(tokio::io::stdin()), launches)
    }

    pub fn with_input<R>(input: R, launches: mpsc::UnboundedSender<Cave>) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        let input: Input = Box::new(input);
        Self {
            input: Mutex::new(input.lines()),
            launches,
        }
    }
}

impl Dispatch for ConsoleDispatch {
    fn dispatch(&self, action: Action) {
        match serde_json::to_string(&action) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!("unprintable action: {e}"),
        }
        if let Action::QueueLaunch { cave } = action {
            if self.launches.send(cave).is_err() {
                tracing::debug!("launch receiver gone");
            }
        }
    }

    fn prompt(&self, modal: Modal) -> Pin<Box<dyn Future<Output = ModalResponse> + Send + '_>> {
        Box::pin(async move {
            for line in render_choices(&modal) {
                eprintln!("{line}");
            }
            eprint!("> ");

            let answer = match self.input.lock().await.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => String::new(),
                Err(e) => {
                    tracing::warn!("reading answer: {e}");
                    String::new()
                }
            };
            parse_answer(&modal, &answer)
        })
    }
}

/// Title, message and numbered buttons, big buttons first.
pub fn render_choices(modal: &Modal) -> Vec<String> {
    let mut lines = vec![modal.title.to_string(), modal.message.to_string()];
    if let Some(detail) = &modal.detail {
        lines.push(detail.to_string());
    }
    let labels = modal
        .big_buttons
        .iter()
        .chain(&modal.buttons)
        .map(|button| {
            let tags: Vec<String> = button.tags.iter().map(|t| t.label.to_string()).collect();
            if tags.is_empty() {
                button.label.to_string()
            } else {
                format!("{} ({})", button.label, tags.join(", "))
            }
        });
    for (i, label) in labels.enumerate() {
        lines.push(format!("  {}. {label}", i + 1));
    }
    lines
}

/// Maps a 1-based choice onto the modal's buttons. Anything else dismisses.
pub fn parse_answer(modal: &Modal, answer: &str) -> ModalResponse {
    let Ok(choice) = answer.trim().parse::<usize>() else {
        return ModalResponse::Dismissed;
    };
    let big = modal.big_buttons.len();
    match choice {
        0 => ModalResponse::Dismissed,
        n if n <= big => ModalResponse::BigButton(n - 1),
        n if n - big <= modal.buttons.len() => ModalResponse::Button(n - big - 1),
        _ => ModalResponse::Dismissed,
    }
}
