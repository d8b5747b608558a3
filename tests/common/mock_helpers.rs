//! Test doubles: recording effectors and small counting elements

use blink_input::pipeline::nodes::Effector;
use blink_input::pipeline::{Element, ElementContext, ElementError, ElementResult};
use blink_input::types::{Effect, InputEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Effector that remembers everything it was asked to do.
#[derive(Clone, Default)]
pub struct RecordingEffector {
    pub played: Arc<Mutex<Vec<Effect>>>,
    pub announced: Arc<Mutex<Vec<InputEvent>>>,
}

impl RecordingEffector {
    pub fn played(&self) -> Vec<Effect> {
        self.played.lock().unwrap().clone()
    }

    pub fn announced(&self) -> Vec<InputEvent> {
        self.announced.lock().unwrap().clone()
    }
}

impl Effector for RecordingEffector {
    fn play(&mut self, effect: Effect) -> ElementResult<()> {
        self.played.lock().unwrap().push(effect);
        Ok(())
    }

    fn announce(&mut self, event: InputEvent) -> ElementResult<()> {
        self.announced.lock().unwrap().push(event);
        Ok(())
    }
}

/// Emits `0..limit`, then ends the stream. `limit = None` never ends.
pub struct Counter {
    next: u64,
    limit: Option<u64>,
}

impl Counter {
    pub fn finite(limit: u64) -> Self {
        Self {
            next: 0,
            limit: Some(limit),
        }
    }

    pub fn endless() -> Self {
        Self {
            next: 0,
            limit: None,
        }
    }
}

impl Element for Counter {
    type Input = ();
    type Output = u64;

    fn consume(&mut self, _: (), ctx: &mut ElementContext<'_, u64>) -> ElementResult<()> {
        if self.limit.is_some_and(|limit| self.next >= limit) {
            return Err(ElementError::Exhausted);
        }
        ctx.emit(self.next);
        self.next += 1;
        Ok(())
    }
}

/// Pass-through that optionally sleeps per item.
pub struct Relay {
    pub delay: Option<Duration>,
    pub cleanups: Arc<AtomicUsize>,
}

impl Element for Relay {
    type Input = u64;
    type Output = u64;

    fn consume(&mut self, n: u64, ctx: &mut ElementContext<'_, u64>) -> ElementResult<()> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        ctx.emit(n);
        Ok(())
    }

    fn cleanup(&mut self) -> ElementResult<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink collecting everything it sees.
pub struct Collect {
    pub seen: Arc<Mutex<Vec<u64>>>,
    pub cleanups: Arc<AtomicUsize>,
}

impl Element for Collect {
    type Input = u64;
    type Output = ();

    fn consume(&mut self, n: u64, _ctx: &mut ElementContext<'_, ()>) -> ElementResult<()> {
        self.seen.lock().unwrap().push(n);
        Ok(())
    }

    fn cleanup(&mut self) -> ElementResult<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink whose `prepare` always fails.
pub struct Unavailable;

impl Element for Unavailable {
    type Input = u64;
    type Output = ();

    fn prepare(&mut self) -> ElementResult<()> {
        Err(ElementError::resource("device busy"))
    }

    fn consume(&mut self, _: u64, _ctx: &mut ElementContext<'_, ()>) -> ElementResult<()> {
        Ok(())
    }
}

/// Sink whose `prepare` blocks for a while, like a device being opened.
pub struct SlowOpen {
    pub delay: Duration,
    pub cleanups: Arc<AtomicUsize>,
}

impl Element for SlowOpen {
    type Input = u64;
    type Output = ();

    fn prepare(&mut self) -> ElementResult<()> {
        std::thread::sleep(self.delay);
        Ok(())
    }

    fn consume(&mut self, _: u64, _ctx: &mut ElementContext<'_, ()>) -> ElementResult<()> {
        Ok(())
    }

    fn cleanup(&mut self) -> ElementResult<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
