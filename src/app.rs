//! Application orchestration for the deck daemon
//!
//! Owns the transport, codec, session table, protocol machine, and input
//! dispatcher, and drives them all from one cooperative loop. Each tick
//! drains the transport into the codec, routes at most one decoded frame,
//! services input events, and lets the time-driven machines advance. No
//! tick blocks, so a stalled peer never wedges input handling.

use crate::config::AppConfig;
use crate::dispatch::{CommandDispatcher, InputEvent, UiRefresh};
use crate::error::{Error, Result};
use crate::link::{LinkState, Responder};
use crate::store::SessionTable;
use crate::transport::Transport;
use crate::wire::{Decoded, FrameCodec, Message};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Consecutive transport failures tolerated before the loop gives up
const TRANSPORT_ERROR_LIMIT: u32 = 10;

/// Device-side deck application
pub struct DeckApp<T: Transport> {
    transport: T,
    codec: FrameCodec,
    table: SessionTable,
    responder: Responder,
    dispatcher: CommandDispatcher,
    input_rx: Receiver<InputEvent>,
    /// Redraw notifications for the display layer
    ui_tx: Option<Sender<UiRefresh>>,
    tick: Duration,
    consecutive_errors: u32,
    read_buf: [u8; 512],
}

impl<T: Transport> DeckApp<T> {
    pub fn new(config: &AppConfig, transport: T, input_rx: Receiver<InputEvent>) -> Self {
        let timings = config.protocol.timings();
        Self {
            transport,
            codec: FrameCodec::new(),
            table: SessionTable::new(),
            responder: Responder::new(timings),
            dispatcher: CommandDispatcher::new(timings.debounce),
            input_rx,
            ui_tx: None,
            tick: timings.tick,
            consecutive_errors: 0,
            read_buf: [0u8; 512],
        }
    }

    /// Send [`UiRefresh`] notifications to `tx` whenever an inbound push
    /// changes the session table
    pub fn with_ui_notifications(mut self, tx: Sender<UiRefresh>) -> Self {
        self.ui_tx = Some(tx);
        self
    }

    pub fn link_state(&self) -> LinkState {
        self.responder.state()
    }

    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    /// Run until `running` clears or the transport fails repeatedly
    pub fn run(&mut self, running: Arc<AtomicBool>) -> Result<()> {
        info!("Deck loop starting (tick {:?})", self.tick);
        while running.load(Ordering::Relaxed) {
            self.tick(Instant::now())?;
            std::thread::sleep(self.tick);
        }
        info!("Deck loop stopped");
        Ok(())
    }

    /// One cooperative iteration
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        let mut outbound = Vec::new();

        self.drain_transport(now)?;

        // At most one frame per tick keeps each iteration bounded; the rest
        // of the buffered input is picked up on subsequent ticks.
        if let Some(decoded) = self.codec.poll() {
            outbound.extend(self.route(decoded, now));
        }

        while let Ok(event) = self.input_rx.try_recv() {
            if self.responder.is_steady() {
                outbound.extend(self.dispatcher.handle_event(event, now));
            } else {
                debug!("Dropping input event before steady state: {:?}", event);
            }
        }

        outbound.extend(self.responder.poll(&mut self.table, now));
        if self.responder.is_steady() {
            outbound.extend(self.dispatcher.poll(now));
        }

        for msg in outbound {
            self.send(&msg, now)?;
        }
        Ok(())
    }

    fn drain_transport(&mut self, now: Instant) -> Result<()> {
        loop {
            match self.transport.read(&mut self.read_buf) {
                Ok(0) => break,
                Ok(n) => {
                    self.consecutive_errors = 0;
                    self.codec.feed(&self.read_buf[..n]);
                }
                Err(e) => {
                    self.on_transport_error(now, &e)?;
                    break;
                }
            }
        }
        Ok(())
    }

    fn route(&mut self, decoded: Decoded, now: Instant) -> Vec<Message> {
        match decoded {
            Decoded::Message(msg) => {
                let is_push = matches!(
                    msg,
                    Message::VolumeUpdate { .. }
                        | Message::MuteUpdate { .. }
                        | Message::AppChanges { .. }
                );
                if is_push && self.responder.is_steady() {
                    if let Some(refresh) = self.dispatcher.apply_update(&mut self.table, &msg) {
                        self.notify_ui(refresh);
                    }
                    Vec::new()
                } else {
                    self.responder.handle_message(&mut self.table, &msg, now)
                }
            }
            Decoded::IconPayload { app, data } => {
                self.responder
                    .handle_icon_payload(&mut self.table, &app, data, now)
            }
        }
    }

    fn send(&mut self, msg: &Message, now: Instant) -> Result<()> {
        let line = msg.to_line()?;
        match self.transport.write_all(&line).and_then(|_| self.transport.flush()) {
            Ok(()) => {
                self.consecutive_errors = 0;
                Ok(())
            }
            Err(e) => self.on_transport_error(now, &e),
        }
    }

    fn on_transport_error(&mut self, now: Instant, e: &Error) -> Result<()> {
        self.consecutive_errors += 1;
        warn!(
            "Transport error ({}/{}): {}",
            self.consecutive_errors, TRANSPORT_ERROR_LIMIT, e
        );
        self.codec.reset();
        if self.consecutive_errors >= TRANSPORT_ERROR_LIMIT {
            self.responder.escalate_error(&mut self.table);
            return Err(Error::Disconnected);
        }
        self.responder.on_disconnect(&mut self.table, now);
        Ok(())
    }

    fn notify_ui(&self, refresh: UiRefresh) {
        if let Some(tx) = &self.ui_tx {
            if tx.send(refresh).is_err() {
                debug!("UI refresh receiver gone");
            }
        }
    }
}
