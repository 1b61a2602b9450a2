//! Simulated terminal hardware
//!
//! `SimulatedDevice` stands in for real keyboard and display registers.
//! It records every byte written to each screen and, once attached to an
//! `InterruptPump`, answers each register write with exactly one transmit
//! interrupt from a background thread.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::device::{Device, DeviceError};
use crate::driver::TerminalDriver;
use crate::error::Result;

/// Registers of one simulated terminal
#[derive(Debug, Default)]
struct SimTerminal {
    present: AtomicBool,
    keyboard: Mutex<VecDeque<u8>>,
    screen: Mutex<Vec<u8>>,
    screen_changed: Condvar,
}

/// In-memory device for `terminals` terminals
#[derive(Debug)]
pub struct SimulatedDevice {
    terminals: Box<[SimTerminal]>,
    /// Where register writes are reported while a pump is attached
    transmit_events: Mutex<Option<Sender<usize>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimulatedDevice {
    /// Create a device with every terminal present
    pub fn new(terminals: usize) -> Self {
        let terminals = (0..terminals)
            .map(|_| SimTerminal {
                present: AtomicBool::new(true),
                ..SimTerminal::default()
            })
            .collect();
        Self {
            terminals,
            transmit_events: Mutex::new(None),
        }
    }

    /// Make `init` fail (or succeed again) for one terminal
    pub fn set_present(&self, term: usize, present: bool) {
        if let Some(t) = self.terminals.get(term) {
            t.present.store(present, Ordering::SeqCst);
        }
    }

    /// Start reporting register writes on a channel
    pub fn attach(&self) -> Receiver<usize> {
        let (tx, rx) = mpsc::channel();
        *lock(&self.transmit_events) = Some(tx);
        rx
    }

    /// Stop reporting register writes, closing the channel
    pub fn detach(&self) {
        lock(&self.transmit_events).take();
    }

    /// Type `bytes` on `term`, one receive interrupt per byte
    pub fn type_bytes<D: Device>(
        &self,
        driver: &TerminalDriver<D>,
        term: usize,
        bytes: &[u8],
    ) -> Result<()> {
        for &byte in bytes {
            if let Some(t) = self.terminals.get(term) {
                lock(&t.keyboard).push_back(byte);
            }
            driver.on_character_received(term)?;
        }
        Ok(())
    }

    /// Everything displayed on `term` so far
    pub fn transcript(&self, term: usize) -> Vec<u8> {
        self.terminals
            .get(term)
            .map(|t| lock(&t.screen).clone())
            .unwrap_or_default()
    }

    /// Wait until `term` has displayed at least `len` bytes or `timeout` passes
    pub fn wait_for_transcript(&self, term: usize, len: usize, timeout: Duration) -> Vec<u8> {
        let Some(t) = self.terminals.get(term) else {
            return Vec::new();
        };
        let deadline = Instant::now() + timeout;
        let mut screen = lock(&t.screen);
        while screen.len() < len {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            screen = t
                .screen_changed
                .wait_timeout(screen, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        screen.clone()
    }
}

impl Device for SimulatedDevice {
    fn init(&self, term: usize) -> std::result::Result<(), DeviceError> {
        match self.terminals.get(term) {
            Some(t) if t.present.load(Ordering::SeqCst) => {
                lock(&t.keyboard).clear();
                Ok(())
            },
            _ => Err(DeviceError::NotPresent(term)),
        }
    }

    fn read_register(&self, term: usize) -> u8 {
        let key = self
            .terminals
            .get(term)
            .and_then(|t| lock(&t.keyboard).pop_front());
        key.unwrap_or_else(|| {
            tracing::warn!(term, "keyboard register read with no key pending");
            0
        })
    }

    fn write_register(&self, term: usize, byte: u8) {
        if let Some(t) = self.terminals.get(term) {
            lock(&t.screen).push(byte);
            t.screen_changed.notify_all();
        }
        if let Some(tx) = lock(&self.transmit_events).as_ref() {
            // A closed receiver only means the pump is shutting down
            let _ = tx.send(term);
        }
    }
}

/// Background thread delivering transmit interrupts for a `SimulatedDevice`
#[derive(Debug)]
pub struct InterruptPump {
    device: Arc<SimulatedDevice>,
    handle: Option<JoinHandle<()>>,
}

impl InterruptPump {
    /// Attach to `device` and forward every register write to `driver`
    pub fn start<D>(driver: Arc<TerminalDriver<D>>, device: Arc<SimulatedDevice>) -> io::Result<Self>
    where
        D: Device + 'static,
    {
        let events = device.attach();
        let handle = thread::Builder::new()
            .name("tty-interrupts".to_string())
            .spawn(move || {
                for term in events {
                    if let Err(e) = driver.on_character_transmitted(term) {
                        tracing::warn!(term, "transmit interrupt rejected: {}", e);
                    }
                }
                tracing::debug!("interrupt pump stopped");
            })?;
        Ok(Self {
            device,
            handle: Some(handle),
        })
    }

    /// Detach from the device and join the thread
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.device.detach();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("interrupt pump panicked");
            }
        }
    }
}

impl Drop for InterruptPump {
    fn drop(&mut self) {
        self.shutdown();
    }
}
