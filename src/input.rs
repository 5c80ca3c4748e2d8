use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use chip8_vip::Key;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use log::{debug, error};
use rdev::{EventType, Key as PhysicalKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Pressed(Key),
    Released(Key),
    Quit,
}

/// Static QWERTY layout onto the hex keypad.
pub fn map_key(key: PhysicalKey) -> Option<Key> {
    let mapped = match key {
        PhysicalKey::Num1 => Key::Key1,
        PhysicalKey::Num2 => Key::Key2,
        PhysicalKey::Num3 => Key::Key3,
        PhysicalKey::Num4 => Key::KeyC,
        PhysicalKey::KeyQ => Key::Key4,
        PhysicalKey::KeyW => Key::Key5,
        PhysicalKey::KeyE => Key::Key6,
        PhysicalKey::KeyR => Key::KeyD,
        PhysicalKey::KeyA => Key::Key7,
        PhysicalKey::KeyS => Key::Key8,
        PhysicalKey::KeyD => Key::Key9,
        PhysicalKey::KeyF => Key::KeyE,
        PhysicalKey::KeyZ => Key::KeyA,
        PhysicalKey::KeyX => Key::Key0,
        PhysicalKey::KeyC => Key::KeyB,
        PhysicalKey::KeyV => Key::KeyF,
        _ => return None,
    };
    Some(mapped)
}

pub fn translate(event_type: EventType) -> Option<InputEvent> {
    match event_type {
        EventType::KeyPress(PhysicalKey::Escape) => Some(InputEvent::Quit),
        EventType::KeyPress(key) => map_key(key).map(InputEvent::Pressed),
        EventType::KeyRelease(key) => map_key(key).map(InputEvent::Released),
        _ => None,
    }
}

/// Global keyboard hook running on its own thread.
///
/// Terminals only report key presses, so key state comes from rdev instead.
/// The hook thread is the only writer of the channel and the driver loop the
/// only reader, so the keypad latch itself is never shared across threads.
pub struct KeyListener {
    events: Receiver<InputEvent>,
}

impl KeyListener {
    pub fn spawn() -> Self {
        let (sender, events) = mpsc::channel();
        thread::spawn(move || listen(sender));
        KeyListener { events }
    }

    /// Events received since the last call, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = InputEvent> + '_ {
        self.events.try_iter()
    }
}

fn listen(sender: Sender<InputEvent>) {
    let result = rdev::listen(move |event| {
        if let Some(input) = translate(event.event_type) {
            // The receiver is gone once the run ends.
            let _ = sender.send(input);
        }
    });
    if let Err(err) = result {
        error!("keyboard hook unavailable, only Esc will work: {err:?}");
    }
}

/// Drains the terminal's own event queue so keystrokes are not echoed.
/// Returns true when Esc or Ctrl-C was seen.
pub fn drain_terminal_events() -> std::io::Result<bool> {
    let mut quit = false;
    while event::poll(Duration::ZERO)? {
        if let Event::Key(key) = event::read()? {
            debug!("terminal key {:?}", key.code);
            let ctrl_c =
                key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
            quit |= key.code == KeyCode::Esc || ctrl_c;
        }
    }
    Ok(quit)
}
