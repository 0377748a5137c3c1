//! Eventos emitidos para o colaborador de apresentação.
//!
//! O núcleo nunca escreve em widgets: mudanças de estado e mensagens de log
//! saem por um [`EventSink`]. A implementação padrão encaminha tudo por um
//! channel bounded para a thread que renderiza os eventos; com o channel
//! cheio, logs são descartados e mudanças de estado aguardam espaço.

use crate::types::{HeaterState, Severity};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use tracing::debug;

/// Mensagem enviada do núcleo para a apresentação.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    StateChanged(HeaterState),
    Log(Severity, String),
}

/// Destino dos eventos do controlador.
pub trait EventSink {
    fn on_state_change(&self, state: HeaterState);
    fn on_log_event(&self, severity: Severity, message: String);

    fn info(&self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.on_log_event(Severity::Info, message.into());
    }

    fn warn(&self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.on_log_event(Severity::Warning, message.into());
    }

    fn error(&self, message: impl Into<String>)
    where
        Self: Sized,
    {
        self.on_log_event(Severity::Error, message.into());
    }
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn on_state_change(&self, state: HeaterState) {
        (**self).on_state_change(state);
    }

    fn on_log_event(&self, severity: Severity, message: String) {
        (**self).on_log_event(severity, message);
    }
}

/// Sink que encaminha eventos por um channel crossbeam.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<ControllerEvent>,
}

/// Cria o par sink/receiver com buffer de `capacity` eventos.
pub fn event_channel(capacity: usize) -> (ChannelSink, Receiver<ControllerEvent>) {
    let (tx, rx) = bounded(capacity);
    (ChannelSink { tx }, rx)
}

impl ChannelSink {
    fn send(&self, event: ControllerEvent) {
        // Logs não bloqueiam: se a apresentação está lenta, descarta
        if self.tx.try_send(event).is_err() {
            debug!("Channel de eventos cheio ou fechado, descartando evento");
        }
    }
}

impl EventSink for ChannelSink {
    /// Bloqueia até haver espaço: transições nunca são descartadas.
    fn on_state_change(&self, state: HeaterState) {
        if self.tx.send(ControllerEvent::StateChanged(state)).is_err() {
            debug!("Channel de eventos fechado, transição {state} não exibida");
        }
    }

    fn on_log_event(&self, severity: Severity, message: String) {
        self.send(ControllerEvent::Log(severity, message));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink que apenas grava os eventos, para asserções.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<ControllerEvent>>,
    }

    impl RecordingSink {
        pub fn states(&self) -> Vec<HeaterState> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    ControllerEvent::StateChanged(s) => Some(*s),
                    ControllerEvent::Log(..) => None,
                })
                .collect()
        }

        pub fn logs(&self, severity: Severity) -> Vec<String> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    ControllerEvent::Log(s, m) if *s == severity => Some(m.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl EventSink for RecordingSink {
        fn on_state_change(&self, state: HeaterState) {
            self.events
                .lock()
                .unwrap()
                .push(ControllerEvent::StateChanged(state));
        }

        fn on_log_event(&self, severity: Severity, message: String) {
            self.events
                .lock()
                .unwrap()
                .push(ControllerEvent::Log(severity, message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_forwards_events() {
        let (sink, rx) = event_channel(4);
        sink.on_state_change(HeaterState::On);
        sink.warn("porta fechada");
        assert_eq!(rx.try_recv(), Ok(ControllerEvent::StateChanged(HeaterState::On)));
        assert_eq!(
            rx.try_recv(),
            Ok(ControllerEvent::Log(Severity::Warning, "porta fechada".into()))
        );
    }

    #[test]
    fn full_channel_drops_instead_of_blocking() {
        let (sink, rx) = event_channel(1);
        sink.info("primeiro");
        sink.info("segundo");
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn state_change_waits_for_room_in_full_channel() {
        let (sink, rx) = event_channel(1);
        sink.info("enche o buffer");
        let sender = std::thread::spawn({
            let sink = sink.clone();
            move || sink.on_state_change(HeaterState::On)
        });
        assert_eq!(
            rx.recv(),
            Ok(ControllerEvent::Log(Severity::Info, "enche o buffer".into()))
        );
        assert_eq!(rx.recv(), Ok(ControllerEvent::StateChanged(HeaterState::On)));
        sender.join().unwrap();
    }

    #[test]
    fn state_change_after_receiver_dropped_does_not_block() {
        let (sink, rx) = event_channel(1);
        drop(rx);
        sink.on_state_change(HeaterState::Off);
    }
}
