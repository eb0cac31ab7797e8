//! The interactive console: an input thread that tokenizes lines and a
//! dispatch thread that runs each one as a [`Process`].
//!
//! Lines are executed one at a time on the dispatch thread; a foreground
//! command blocks further lines until it returns. The input thread is
//! started once and lives until end of input, because a read blocked in the
//! underlying reader (a terminal, typically) cannot be interrupted. `stop()`
//! and `start()` only end and replace the dispatch thread, so lines typed
//! while the console is stopped wait in the queue for the next `start()`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use jetty_types::error::Result;

use crate::placeholder::PlaceholderResolver;
use crate::process::Process;
use crate::registry::CommandRegistry;
use crate::stream::{Input, Streams};
use crate::tokenizer::{Tokenizer, tokenize_line};

/// Name of the dispatch thread.
pub const READER_THREAD: &str = "jetty-console";

/// Name of the thread blocked on console input.
pub const INPUT_THREAD: &str = "jetty-console-input";

enum Event {
    Line(Vec<String>),
    /// Sent by `stop()` to the dispatch thread that was running.
    Stop,
    EndOfInput,
}

/// Queue between the input thread and whichever dispatch thread is current.
struct Feed {
    tx: Sender<Event>,
    rx: Arc<Mutex<Receiver<Event>>>,
    ended: Arc<AtomicBool>,
}

pub struct Console {
    registry: Arc<CommandRegistry>,
    resolver: Arc<dyn PlaceholderResolver>,
    streams: Streams,
    feed: Mutex<Option<Feed>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Console {
    pub fn new(
        registry: Arc<CommandRegistry>,
        resolver: Arc<dyn PlaceholderResolver>,
        streams: Streams,
    ) -> Self {
        Self {
            registry,
            resolver,
            streams,
            feed: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Start dispatching input lines. Does nothing if the console is
    /// already running or its input has ended.
    pub fn start(&self) -> Result<()> {
        let mut slot = lock(&self.reader);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            log::debug!("Console already running");
            return Ok(());
        }

        let (rx, ended) = self.feed()?;
        if ended.load(Ordering::SeqCst) {
            log::debug!("Console input has ended; not starting");
            return Ok(());
        }
        let dispatcher = Dispatcher {
            registry: Arc::clone(&self.registry),
            resolver: Arc::clone(&self.resolver),
            streams: self.streams.clone(),
        };
        let handle = thread::Builder::new()
            .name(READER_THREAD.to_string())
            .spawn(move || dispatcher.dispatch_loop(&rx, &ended))?;

        log::info!("Console started with {} commands", self.registry.len());
        *slot = Some(handle);
        Ok(())
    }

    /// Stop dispatching. The line being run, and any queued before this
    /// call, run to completion first.
    ///
    /// The dispatch thread is forgotten, so `start()` may be called again.
    pub fn stop(&self) {
        let Some(handle) = lock(&self.reader).take() else {
            return;
        };
        if !handle.is_finished()
            && let Some(feed) = lock(&self.feed).as_ref()
        {
            let _ = feed.tx.send(Event::Stop);
        }
        log::info!("Console stopped");
    }

    pub fn is_running(&self) -> bool {
        lock(&self.reader).as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait until the dispatch thread ends, e.g. at end of input.
    pub fn join(&self) {
        let handle = lock(&self.reader).take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            log::error!("Console dispatch thread panicked");
        }
    }

    /// Tokenize and run one line on the calling thread.
    pub fn execute_line(&self, line: &str) -> i32 {
        self.execute(tokenize_line(line))
    }

    /// Run one tokenized line on the calling thread. An empty line does
    /// nothing and succeeds.
    pub fn execute(&self, tokens: Vec<String>) -> i32 {
        Dispatcher {
            registry: Arc::clone(&self.registry),
            resolver: Arc::clone(&self.resolver),
            streams: self.streams.clone(),
        }
        .dispatch(tokens)
    }

    /// The line queue, spawning the input thread on first use.
    #[allow(clippy::type_complexity)]
    fn feed(&self) -> Result<(Arc<Mutex<Receiver<Event>>>, Arc<AtomicBool>)> {
        let mut slot = lock(&self.feed);
        if let Some(feed) = slot.as_ref() {
            return Ok((Arc::clone(&feed.rx), Arc::clone(&feed.ended)));
        }
        let (tx, rx) = mpsc::channel();
        let tokenizer = Tokenizer::new(self.streams.input.clone());
        let pump_tx = tx.clone();
        // Detached: it may stay blocked on input until the process exits.
        thread::Builder::new()
            .name(INPUT_THREAD.to_string())
            .spawn(move || read_lines(tokenizer, &pump_tx))?;

        let feed = Feed {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            ended: Arc::new(AtomicBool::new(false)),
        };
        let handles = (Arc::clone(&feed.rx), Arc::clone(&feed.ended));
        *slot = Some(feed);
        Ok(handles)
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Queue every line of `tokenizer` until end of input or until nobody
/// listens any more.
fn read_lines(mut tokenizer: Tokenizer<Input>, tx: &Sender<Event>) {
    loop {
        let event = match tokenizer.read() {
            Ok(Some(tokens)) => Event::Line(tokens),
            Ok(None) => {
                log::debug!("End of console input");
                Event::EndOfInput
            },
            Err(e) => {
                log::warn!("Console input failed: {e}");
                Event::EndOfInput
            },
        };
        let last = matches!(event, Event::EndOfInput);
        if tx.send(event).is_err() || last {
            break;
        }
    }
    log::debug!("Console input thread exiting");
}

struct Dispatcher {
    registry: Arc<CommandRegistry>,
    resolver: Arc<dyn PlaceholderResolver>,
    streams: Streams,
}

impl Dispatcher {
    fn dispatch(&self, tokens: Vec<String>) -> i32 {
        if tokens.is_empty() {
            return 0;
        }
        log::debug!("Dispatching {tokens:?}");
        let process = Process::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.resolver),
            tokens,
            self.streams.clone(),
        );
        process.execute()
    }

    /// Run queued lines until stopped or input ends.
    ///
    /// The queue stays locked for the whole loop: a dispatcher started after
    /// `stop()` waits here until the previous one has taken its `Stop`.
    fn dispatch_loop(self, events: &Mutex<Receiver<Event>>, ended: &AtomicBool) {
        let events = lock(events);
        loop {
            match events.recv() {
                Ok(Event::Line(tokens)) => {
                    let code = self.dispatch(tokens);
                    log::trace!("Line finished with {code}");
                },
                Ok(Event::Stop) => break,
                Ok(Event::EndOfInput) | Err(_) => {
                    ended.store(true, Ordering::SeqCst);
                    break;
                },
            }
        }
        log::debug!("Console dispatch thread exiting");
    }
}
