//! The terminal collaborator.
//!
//! Rendering is out of scope; the host supplies an implementation of
//! [`Terminal`] and the shell only drives this narrow surface. A program
//! may take the terminal over through [`TerminalSlot::try_bind`] — while
//! bound, the host routes raw key events to the program's handler instead
//! of the line editor.

use std::cell::{Cell, RefCell};
use std::ops::Deref;
use std::rc::Rc;

use futures_lite::future::BoxedLocal;

/// A single key press forwarded to a bound program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
}

pub type KeyHandler = Box<dyn FnMut(&KeyEvent)>;

pub trait Terminal {
    /// Append text to the display.
    fn write(&self, text: &str);

    /// Text accumulated since the last [`Terminal::clear`].
    fn buffer(&self) -> String;

    /// Install the key handler for the current binding, replacing any
    /// previous one.
    fn on_key(&self, handler: KeyHandler);

    /// Reset the session buffer. Called when a program binds the
    /// terminal.
    fn clear(&self);

    /// End the current session, waking every [`Terminal::closed`] waiter.
    fn close(&self);

    /// Resolves when the current session is closed.
    fn closed(&self) -> BoxedLocal<()>;
}

/// The singleton exclusive terminal resource. At most one process holds
/// the bound handle at a time; the handle releases the slot on drop.
pub struct TerminalSlot {
    terminal: Rc<dyn Terminal>,
    held: Rc<Cell<bool>>,
}

impl TerminalSlot {
    pub fn new(terminal: Rc<dyn Terminal>) -> Self {
        Self {
            terminal,
            held: Rc::new(Cell::new(false)),
        }
    }

    /// The underlying terminal, for console output while unbound.
    pub fn terminal(&self) -> Rc<dyn Terminal> {
        Rc::clone(&self.terminal)
    }

    /// Bind the terminal exclusively. Returns `None` while another
    /// process holds it.
    pub fn try_bind(&self) -> Option<BoundTerminal> {
        if self.held.get() {
            return None;
        }
        self.terminal.clear();
        self.held.set(true);
        Some(BoundTerminal {
            terminal: Rc::clone(&self.terminal),
            held: Rc::clone(&self.held),
        })
    }

    /// End the current terminal session, if any.
    pub fn close(&self) {
        self.terminal.close();
    }
}

/// Exclusive handle to the bound terminal. Dropping it frees the slot
/// for the next binder.
pub struct BoundTerminal {
    terminal: Rc<dyn Terminal>,
    held: Rc<Cell<bool>>,
}

impl BoundTerminal {
    /// A shared handle, for key handlers that outlive the borrow.
    pub fn handle(&self) -> Rc<dyn Terminal> {
        Rc::clone(&self.terminal)
    }
}

impl Deref for BoundTerminal {
    type Target = dyn Terminal;

    fn deref(&self) -> &Self::Target {
        self.terminal.as_ref()
    }
}

impl Drop for BoundTerminal {
    fn drop(&mut self) {
        self.held.set(false);
    }
}

/// In-memory [`Terminal`] used by tests and headless embedding.
pub struct CaptureTerminal {
    /// Everything ever written, never cleared.
    output: RefCell<String>,
    /// Session buffer, reset by [`Terminal::clear`].
    buffer: RefCell<String>,
    handler: RefCell<Option<KeyHandler>>,
    session: RefCell<(async_channel::Sender<()>, async_channel::Receiver<()>)>,
}

impl CaptureTerminal {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            output: RefCell::new(String::new()),
            buffer: RefCell::new(String::new()),
            handler: RefCell::new(None),
            session: RefCell::new(async_channel::unbounded()),
        })
    }

    /// Full output history.
    pub fn output(&self) -> String {
        self.output.borrow().clone()
    }

    /// Feed one key event to the installed handler, if any.
    pub fn push_key(&self, key: &str) {
        let taken = self.handler.borrow_mut().take();
        if let Some(mut handler) = taken {
            handler(&KeyEvent {
                key: key.to_string(),
            });
            let mut slot = self.handler.borrow_mut();
            if slot.is_none() {
                *slot = Some(handler);
            }
        }
    }
}

impl Terminal for CaptureTerminal {
    fn write(&self, text: &str) {
        self.output.borrow_mut().push_str(text);
        self.buffer.borrow_mut().push_str(text);
    }

    fn buffer(&self) -> String {
        self.buffer.borrow().clone()
    }

    fn on_key(&self, handler: KeyHandler) {
        *self.handler.borrow_mut() = Some(handler);
    }

    fn clear(&self) {
        self.buffer.borrow_mut().clear();
        // Fresh session: waiters of the previous one are already done.
        *self.session.borrow_mut() = async_channel::unbounded();
    }

    fn close(&self) {
        self.session.borrow().0.close();
    }

    fn closed(&self) -> BoxedLocal<()> {
        let rx = self.session.borrow().1.clone();
        Box::pin(async move {
            let _ = rx.recv().await;
        })
    }
}
