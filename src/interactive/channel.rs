//! Background key listener.
//!
//! Runs on its own detached thread because terminal reads block. Failures
//! are logged and swallowed here. Only terminal input that stays unreadable
//! ends the channel, and that also ends the run.

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{debug, error, info, warn};

use crate::control::ControlHandle;
use crate::domain::ControlSignal;
use crate::interactive::keys::{HELP_TEXT, KeyAction, Prompt, map_key};

/// How long one poll for terminal input waits
const INPUT_POLL: Duration = Duration::from_millis(250);

/// Consecutive terminal read failures tolerated before the channel gives up
const MAX_INPUT_FAILURES: u32 = 5;

/// Line-oriented conversation with the user while output is held
pub trait Console: Send {
    /// Print `question` and read one line of input
    fn ask(&mut self, question: &str) -> io::Result<String>;

    /// Print a block of text
    fn show(&mut self, text: &str) -> io::Result<()>;
}

/// Console on the controlling terminal; leaves raw mode for the duration
/// of each exchange so the user gets normal line editing
#[derive(Debug, Default)]
pub struct TerminalConsole;

impl TerminalConsole {
    pub fn new() -> Self {
        Self
    }

    fn cooked<T>(f: impl FnOnce() -> io::Result<T>) -> io::Result<T> {
        disable_raw_mode()?;
        let result = f();
        enable_raw_mode()?;
        result
    }
}

impl Console for TerminalConsole {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        Self::cooked(|| {
            let mut stdout = io::stdout();
            write!(stdout, "\n{}", question)?;
            stdout.flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        })
    }

    fn show(&mut self, text: &str) -> io::Result<()> {
        Self::cooked(|| {
            let mut stdout = io::stdout();
            writeln!(stdout, "\n{}", text)?;
            stdout.flush()
        })
    }
}

/// Translates key presses into control signals for the controller
pub struct InteractiveChannel<C: Console> {
    handle: ControlHandle,
    console: C,
}

impl<C: Console> InteractiveChannel<C> {
    pub fn new(handle: ControlHandle, console: C) -> Self {
        Self { handle, console }
    }

    /// Handle one key press. Returns `false` once exit has been requested.
    ///
    /// A prompt that cannot be read is logged and dropped; the channel keeps
    /// listening.
    pub fn on_key(&mut self, key: KeyEvent) -> bool {
        match map_key(&key) {
            KeyAction::Send(signals) => {
                let exit = signals.contains(&ControlSignal::RequestExit);
                for signal in signals {
                    self.handle.dispatch(signal);
                }
                !exit
            }
            KeyAction::Prompt(prompt) => {
                if let Err(e) = self.prompt(prompt) {
                    warn!("Dropping {:?} prompt: {}", prompt, e);
                }
                true
            }
            KeyAction::Help => {
                if let Err(e) = self.help() {
                    warn!("Dropping help screen: {}", e);
                }
                true
            }
            KeyAction::Ignore => {
                debug!("Ignoring key {:?}", key.code);
                true
            }
        }
    }

    fn prompt(&mut self, prompt: Prompt) -> io::Result<()> {
        self.handle.dispatch(ControlSignal::RequestSuppressOutput);
        let answer = self.console.ask(prompt.question());
        self.handle.dispatch(ControlSignal::RequestResumeOutput);

        let result = answer.map(|answer| match prompt.parse(&answer) {
            Some(command) => {
                info!("View change: {:?}", command);
                self.handle.dispatch(ControlSignal::View(command));
            }
            None => debug!("Ignoring unusable answer for {:?}", prompt),
        });
        // redraw either way; the prompt has scrolled the last frame
        self.handle.dispatch(ControlSignal::RequestInterruptSleep);
        result
    }

    fn help(&mut self) -> io::Result<()> {
        self.handle.dispatch(ControlSignal::RequestSuppressOutput);
        let text = format!(
            "{}\n\n Next refresh in {}s",
            HELP_TEXT,
            self.handle.seconds_until_next_refresh()
        );
        let result = self
            .console
            .show(&text)
            .and_then(|_| self.console.ask(" Press Enter to continue"));
        self.handle.dispatch(ControlSignal::RequestResumeOutput);
        self.handle.dispatch(ControlSignal::RequestInterruptSleep);
        result.map(|_| ())
    }

    fn listen(&mut self) -> io::Result<()> {
        self.listen_with(|| read_key().inspect_err(|_| thread::sleep(INPUT_POLL)))
    }

    /// Feed keys from `next_key` until exit is requested.
    ///
    /// Read failures are retried. Only `MAX_INPUT_FAILURES` in a row end the
    /// loop with the last error.
    fn listen_with(&mut self, mut next_key: impl FnMut() -> io::Result<Option<KeyEvent>>) -> io::Result<()> {
        let mut failures = 0;
        loop {
            match next_key() {
                Ok(Some(key)) => {
                    failures = 0;
                    if !self.on_key(key) {
                        return Ok(());
                    }
                }
                Ok(None) => failures = 0,
                Err(e) => {
                    failures += 1;
                    warn!("Reading terminal input failed ({}/{}): {}", failures, MAX_INPUT_FAILURES, e);
                    if failures >= MAX_INPUT_FAILURES {
                        return Err(e);
                    }
                }
            }
        }
    }
}

/// Wait up to one poll interval for a key press
fn read_key() -> io::Result<Option<KeyEvent>> {
    if !event::poll(INPUT_POLL)? {
        return Ok(None);
    }
    match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key)),
        _ => Ok(None),
    }
}

impl<C: Console + 'static> InteractiveChannel<C> {
    /// Start listening on a detached thread. The thread is never joined and
    /// does not keep the process alive.
    pub fn spawn(mut self) -> io::Result<()> {
        thread::Builder::new()
            .name("interactive".to_string())
            .spawn(move || match self.listen() {
                Ok(()) => debug!("Interactive channel finished"),
                Err(e) => {
                    // raw mode swallows Ctrl-C, so nothing else could end the run
                    error!("Terminal input unreadable, stopping: {}", e);
                    self.handle.request_exit();
                }
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlBlock;
    use crate::domain::ViewCommand;
    use crossterm::event::{KeyCode, KeyModifiers};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Console with canned answers that records whether output was held
    struct ScriptedConsole {
        block: Arc<ControlBlock>,
        answers: VecDeque<io::Result<String>>,
        held_during: Arc<Mutex<Vec<bool>>>,
        shown: Arc<Mutex<Vec<String>>>,
    }

    impl Console for ScriptedConsole {
        fn ask(&mut self, _question: &str) -> io::Result<String> {
            self.held_during.lock().unwrap().push(self.block.flush().is_held());
            self.answers.pop_front().unwrap_or_else(|| Ok(String::new()))
        }

        fn show(&mut self, text: &str) -> io::Result<()> {
            self.shown.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    struct Fixture {
        block: Arc<ControlBlock>,
        views: tokio::sync::mpsc::UnboundedReceiver<ViewCommand>,
        channel: InteractiveChannel<ScriptedConsole>,
        held_during: Arc<Mutex<Vec<bool>>>,
        shown: Arc<Mutex<Vec<String>>>,
    }

    fn fixture(answers: Vec<io::Result<String>>) -> Fixture {
        let (block, views) = ControlBlock::new(5);
        let held_during = Arc::new(Mutex::new(Vec::new()));
        let shown = Arc::new(Mutex::new(Vec::new()));
        let console = ScriptedConsole {
            block: block.clone(),
            answers: answers.into(),
            held_during: held_during.clone(),
            shown: shown.clone(),
        };
        let channel = InteractiveChannel::new(ControlHandle::new(block.clone()), console);
        Fixture {
            block,
            views,
            channel,
            held_during,
            shown,
        }
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn test_quit_stops_listening() {
        let mut f = fixture(vec![]);
        assert!(!f.channel.on_key(key('q')));
        assert!(f.block.exit_requested());
    }

    #[test]
    fn test_refresh_does_not_exit() {
        let mut f = fixture(vec![]);
        assert!(f.channel.on_key(key('r')));
        assert!(!f.block.exit_requested());
    }

    #[test]
    fn test_unknown_key_is_ignored() {
        let mut f = fixture(vec![]);
        assert!(f.channel.on_key(key('x')));
        assert!(!f.block.exit_requested());
        assert!(f.views.try_recv().is_err());
    }

    #[test]
    fn test_filter_prompt_holds_output() {
        let mut f = fixture(vec![Ok("pool".to_string())]);
        assert!(f.channel.on_key(key('f')));

        assert_eq!(*f.held_during.lock().unwrap(), vec![true]);
        assert!(!f.block.flush().is_held());
        assert_eq!(
            f.views.try_recv().unwrap(),
            ViewCommand::SetFilter(Some("pool".to_string()))
        );
    }

    #[test]
    fn test_bad_answer_is_ignored() {
        let mut f = fixture(vec![Ok("many".to_string())]);
        assert!(f.channel.on_key(key('l')));
        assert!(f.views.try_recv().is_err());
        assert!(!f.block.flush().is_held());
    }

    #[test]
    fn test_failed_read_keeps_channel_alive() {
        let mut f = fixture(vec![
            Err(io::Error::new(io::ErrorKind::InvalidData, "stream did not contain valid UTF-8")),
            Ok("pool".to_string()),
        ]);
        assert!(f.channel.on_key(key('f')));
        assert!(!f.block.flush().is_held());
        assert!(f.views.try_recv().is_err());

        // the next prompt and the quit key still work
        assert!(f.channel.on_key(key('f')));
        assert_eq!(
            f.views.try_recv().unwrap(),
            ViewCommand::SetFilter(Some("pool".to_string()))
        );
        assert!(!f.channel.on_key(key('q')));
        assert!(f.block.exit_requested());
    }

    #[test]
    fn test_listen_survives_transient_read_errors() {
        let mut f = fixture(vec![]);
        let mut events: VecDeque<io::Result<Option<KeyEvent>>> = VecDeque::from(vec![
            Err(io::Error::new(io::ErrorKind::Interrupted, "signal")),
            Ok(None),
            Err(io::Error::new(io::ErrorKind::Interrupted, "signal")),
            Ok(Some(key('r'))),
            Ok(Some(key('q'))),
        ]);
        let result = f.channel.listen_with(|| events.pop_front().unwrap_or(Ok(None)));
        assert!(result.is_ok());
        assert!(f.block.exit_requested());
        assert!(events.is_empty());
    }

    #[test]
    fn test_listen_gives_up_on_persistent_errors() {
        let mut f = fixture(vec![]);
        let mut reads = 0;
        let result = f.channel.listen_with(|| {
            reads += 1;
            Err(io::Error::other("terminal gone"))
        });
        assert!(result.is_err());
        assert_eq!(reads, MAX_INPUT_FAILURES);
    }

    #[test]
    fn test_help_shows_bindings() {
        let mut f = fixture(vec![]);
        assert!(f.channel.on_key(key('h')));
        let shown = f.shown.lock().unwrap()[0].clone();
        assert!(shown.contains("refresh now"));
        assert!(shown.contains("Next refresh in 5s"));
        assert_eq!(*f.held_during.lock().unwrap(), vec![true]);
        assert!(!f.block.flush().is_held());
    }

    #[test]
    fn test_interval_prompt() {
        let mut f = fixture(vec![Ok("2".to_string())]);
        assert!(f.channel.on_key(key('i')));
        assert_eq!(f.views.try_recv().unwrap(), ViewCommand::SetInterval(2));
    }
}
