//! Per-instance run loop.
//!
//! Every element instance gets one OS thread running [`Runner::run`]:
//!
//! 1. `prepare`, then report the outcome to the scheduler.
//! 2. Wait for the scheduler's verdict (all prepared, or abort).
//! 3. Receive (or synthesize) → `consume` → forward to every outbound link,
//!    until the inbound channel closes or the stop signal fires.
//! 4. Close outbound links, `cleanup`, mark `Stopped`.

use crate::pipeline::channel::{RecvError, SendError, SignalReceiver, SignalSender, StopSignal};
use crate::pipeline::element::{Element, ElementContext, ElementState, InstanceStatus};
use crate::pipeline::error::{ElementError, ElementResult};
use crate::pipeline::id::InstanceId;
use crossbeam_channel::{select, Receiver, Sender};

/// Where an instance's inputs come from.
pub(crate) enum Inbound<I> {
    /// Sources call `consume` with a synthesized unit input.
    Synthesized(fn() -> I),
    Channel(SignalReceiver<I>),
}

impl<I> Clone for Inbound<I> {
    fn clone(&self) -> Self {
        match self {
            Inbound::Synthesized(make) => Inbound::Synthesized(*make),
            Inbound::Channel(rx) => Inbound::Channel(rx.clone()),
        }
    }
}

/// Outcome of `prepare`, sent to the scheduler.
pub(crate) struct StartupReport {
    pub name: String,
    pub result: ElementResult<()>,
}

/// Notifies the scheduler when the runner thread exits, including by panic.
pub(crate) struct DoneGuard {
    pub id: InstanceId,
    pub tx: Sender<InstanceId>,
}

impl Drop for DoneGuard {
    fn drop(&mut self) {
        let _ = self.tx.send(self.id);
    }
}

/// Shared plumbing handed to every runner at launch.
#[derive(Clone)]
pub(crate) struct RunnerLinks {
    pub stop: StopSignal,
    pub startup: Sender<StartupReport>,
    /// Disconnected by the scheduler once every instance has reported.
    pub release: Receiver<()>,
    pub done: Sender<InstanceId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    EndOfStream,
    Stopped,
}

pub(crate) struct Runner<E: Element> {
    pub element: E,
    pub name: String,
    pub id: InstanceId,
    pub inbound: Inbound<E::Input>,
    pub outbound: Vec<SignalSender<E::Output>>,
    pub status: InstanceStatus,
}

impl<E> Runner<E>
where
    E: Element,
    E::Output: Clone,
{
    pub fn run(mut self, links: RunnerLinks) {
        let RunnerLinks {
            stop,
            startup,
            release,
            done,
        } = links;
        let _done = DoneGuard { id: self.id, tx: done };

        tracing::debug!("{} preparing", self.name);
        let prepared = self.element.prepare();
        let ok = prepared.is_ok();
        if ok {
            self.status.set_state(ElementState::Prepared);
        }
        let _ = startup.send(StartupReport {
            name: self.name.clone(),
            result: prepared,
        });
        // Let the scheduler see disconnection if every runner is gone.
        drop(startup);

        select! {
            recv(release) -> _ => {}
            recv(stop.receiver()) -> _ => {}
        }

        if ok && !stop.is_triggered() {
            self.status.set_state(ElementState::Running);
            tracing::debug!("{} running", self.name);
            let exit = self.run_loop(&stop);
            tracing::debug!("{} leaving run loop: {:?}", self.name, exit);
        }

        self.shutdown();
    }

    fn run_loop(&mut self, stop: &StopSignal) -> Exit {
        let mut out: Vec<E::Output> = Vec::new();

        let exit = loop {
            let input = match &self.inbound {
                Inbound::Synthesized(make) => {
                    if stop.is_triggered() {
                        break Exit::Stopped;
                    }
                    make()
                }
                Inbound::Channel(rx) => match rx.recv(stop) {
                    Ok(item) => item,
                    Err(RecvError::Closed) => break Exit::EndOfStream,
                    Err(RecvError::Stopped) => break Exit::Stopped,
                },
            };

            let (result, marked) = {
                let mut ctx =
                    ElementContext::new(&self.name, self.id.replica, &mut out).with_stop(stop);
                let result = self.element.consume(input, &mut ctx);
                (result, ctx.is_filtered())
            };

            match result {
                Ok(()) => self.status.record_consumed(out.len(), marked),
                Err(ElementError::Exhausted) => {
                    tracing::info!("{} exhausted", self.name);
                    break Exit::EndOfStream;
                }
                Err(e) => {
                    tracing::warn!("{}: dropping item: {}", self.name, e);
                    self.status.record_failure();
                    out.clear();
                    continue;
                }
            }

            if self.forward(&mut out, stop) == Some(Exit::Stopped) {
                break Exit::Stopped;
            }
        };

        if exit == Exit::EndOfStream {
            let result = {
                let mut ctx =
                    ElementContext::new(&self.name, self.id.replica, &mut out).with_stop(stop);
                self.element.finish(&mut ctx)
            };
            match result {
                Ok(()) => {
                    if self.forward(&mut out, stop) == Some(Exit::Stopped) {
                        return Exit::Stopped;
                    }
                }
                Err(e) => tracing::warn!("{}: finish failed: {}", self.name, e),
            }
        }

        exit
    }

    /// Broadcast every queued item to every open outbound link.
    ///
    /// Links whose consumer has gone away are closed and skipped from then on.
    fn forward(&mut self, out: &mut Vec<E::Output>, stop: &StopSignal) -> Option<Exit> {
        let n = self.outbound.len();
        for item in out.drain(..) {
            let mut item = Some(item);
            for i in 0..n {
                // The final link takes the original item without a clone.
                let payload = if i + 1 == n {
                    item.take()
                } else {
                    item.clone()
                };
                let Some(payload) = payload else {
                    break;
                };
                let tx = &mut self.outbound[i];
                if tx.is_closed() {
                    continue;
                }
                match tx.send(payload, stop) {
                    Ok(()) => self.status.record_emitted(),
                    Err(SendError::Stopped) => return Some(Exit::Stopped),
                    Err(SendError::Disconnected) => {
                        tracing::warn!("{}: downstream link {} went away", self.name, i);
                        tx.close();
                    }
                }
            }
        }
        None
    }

    fn shutdown(&mut self) {
        self.status.set_state(ElementState::Stopping);
        for tx in &mut self.outbound {
            tx.close();
        }
        if let Err(e) = self.element.cleanup() {
            tracing::error!("{}: cleanup failed: {}", self.name, e);
        }
        self.status.record_cleanup();
        self.status.set_state(ElementState::Stopped);
        tracing::debug!("{} stopped", self.name);
    }
}
