//! Threads periódicas: amostragem, controle e renderização de eventos.
//!
//! Amostragem e controle rodam em threads independentes, de modo que uma
//! requisição lenta nunca atrasa o tick. Ambas observam o [`CancelToken`]
//! e são finalizadas com `join` antes de a porta serial ser fechada.

use chrono::Utc;
use crossbeam_channel::{Receiver, select, tick};
use dew_core::control::{ControlLoop, Transport};
use dew_core::events::{ControllerEvent, EventSink};
use dew_core::sampler::{ReadingSlot, WeatherSource, poll_once};
use dew_core::threshold::ThresholdStore;
use dew_core::{CancelToken, HeaterState, Severity};
use std::io;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Comando encaminhado para a thread de controle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    SetManual(bool),
    ToggleManual,
}

/// Inicia a coleta periódica. A primeira coleta é imediata.
pub fn spawn_sampler<W, S>(
    source: W,
    slot: ReadingSlot,
    sink: S,
    interval: Duration,
    cancel: CancelToken,
) -> io::Result<JoinHandle<()>>
where
    W: WeatherSource + Send + 'static,
    S: EventSink + Send + 'static,
{
    std::thread::Builder::new()
        .name("weather-sampler".into())
        .spawn(move || {
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                poll_once(&source, &slot, &sink);
                if cancel.wait(interval) {
                    break;
                }
            }
            debug!("Thread de amostragem finalizada");
        })
}

/// Inicia o loop de controle. Ticks e comandos manuais passam pela mesma
/// thread, então o transporte nunca recebe frames intercalados.
pub fn spawn_control<T, S>(
    mut control: ControlLoop<T, S>,
    store: ThresholdStore,
    slot: ReadingSlot,
    commands: Receiver<ControlCommand>,
    interval: Duration,
    cancel: CancelToken,
) -> io::Result<JoinHandle<()>>
where
    T: Transport + Send + 'static,
    S: EventSink + Send + 'static,
{
    std::thread::Builder::new()
        .name("control-loop".into())
        .spawn(move || {
            let ticker = tick(interval);
            loop {
                select! {
                    recv(cancel.receiver()) -> _ => break,
                    recv(commands) -> cmd => match cmd {
                        Ok(ControlCommand::SetManual(on)) => {
                            control.set_manual(&store, on, &cancel);
                        }
                        Ok(ControlCommand::ToggleManual) => {
                            let on = !control.state().is_on();
                            control.set_manual(&store, on, &cancel);
                        }
                        Err(_) => break,
                    },
                    recv(ticker) -> _ => {
                        let reading = slot.latest();
                        let outcome = control.tick(&store, reading.as_ref(), Utc::now(), &cancel);
                        debug!("Tick: {outcome:?}");
                    }
                }
            }
            debug!("Thread de controle finalizada (aquecedor {})", control.state());
        })
}

/// Renderiza os eventos do núcleo no log e mantém a cópia de exibição do
/// estado do aquecedor. Termina quando todos os sinks são descartados.
pub fn spawn_event_logger(
    events: Receiver<ControllerEvent>,
    heater_display: Arc<RwLock<HeaterState>>,
) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("event-logger".into())
        .spawn(move || {
            for event in events.iter() {
                match event {
                    ControllerEvent::StateChanged(state) => {
                        *heater_display
                            .write()
                            .unwrap_or_else(PoisonError::into_inner) = state;
                    }
                    ControllerEvent::Log(Severity::Info, msg) => info!("{msg}"),
                    ControllerEvent::Log(Severity::Warning, msg) => warn!("{msg}"),
                    ControllerEvent::Log(Severity::Error, msg) => error!("{msg}"),
                }
            }
        })
}

/// Aguarda uma thread e registra se ela terminou em pânico.
pub fn join(name: &str, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!("Thread {name} terminou em pânico");
    }
}
