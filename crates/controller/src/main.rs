//! # Dew Controller
//!
//! Liga e desliga um aquecedor anti-orvalho através de um relé USB, a
//! partir de leituras periódicas de uma API de clima (dew spread ou umidade
//! relativa).
//!
//! ## Uso
//! ```bash
//! dew_controller            # settings.toml e config.json ao lado do executável
//! RUST_LOG=debug dew_controller
//! ```
//! Digite `help` no console para a lista de comandos.

mod console;
mod serial;
mod tasks;
mod weather;

use console::{Console, parse_command, spawn_stdin_reader};
use crossbeam_channel::{bounded, select};
use dew_core::config::{Config, ConfigLoadError};
use dew_core::control::ControlLoop;
use dew_core::events::event_channel;
use dew_core::sampler::ReadingSlot;
use dew_core::settings::Settings;
use dew_core::threshold::ThresholdStore;
use dew_core::{CancelToken, HeaterState};
use serial::{PortControl, SerialTransport};
use std::process::ExitCode;
use std::sync::{Arc, RwLock};
use tracing::{error, info, warn};
use weather::{HttpWeatherSource, redacted_url};

fn main() -> ExitCode {
    // ── Logging ──
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Falha na inicialização: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> std::io::Result<()> {
    // ── Settings ──
    let settings_path = Settings::default_path();
    let settings = Settings::load(&settings_path);

    // Salva settings padrão se não existir
    if !settings_path.exists() {
        if let Err(e) = settings.save(&settings_path) {
            warn!("Não foi possível salvar settings padrão: {e}");
        }
    }
    for problem in settings.validate() {
        warn!("settings.toml: {problem}");
    }

    // ── Config do usuário ──
    let config_path = settings.config_path();
    let (config, issue) = Config::load(&config_path);
    match issue {
        None => info!("Config carregada de {}", config_path.display()),
        Some(ConfigLoadError::Missing(_)) => info!("Sem config salva, usando padrões"),
        Some(e) => warn!("{e} – usando padrões"),
    }

    let store = ThresholdStore::new(config);
    let slot = ReadingSlot::new();
    let cancel = CancelToken::new();
    let heater_display = Arc::new(RwLock::new(HeaterState::Off));
    let (sink, event_rx) = event_channel(256);

    // ── Ctrl-C ──
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || cancel.cancel())
            .map_err(|e| std::io::Error::other(e.to_string()))?;
    }

    // ── Transporte serial ──
    let transport = Arc::new(SerialTransport::new(
        settings.serial.baud_rate,
        settings.write_timeout(),
    ));

    let (control_tx, control_rx) = bounded(16);
    let console = Console {
        store: store.clone(),
        port: transport.clone(),
        control_tx,
        heater_display: heater_display.clone(),
        config_path: config_path.clone(),
    };

    if settings.serial.auto_connect {
        if let Some(port) = store.transport_identifier() {
            info!("Tentando auto-conectar em {port}...");
            if let Err(e) = transport.open(&port) {
                warn!("Auto-conexão falhou: {e}");
            }
        }
    }

    // ── Banner ──
    let config = store.snapshot();
    println!();
    println!("══════════════════════════════════════════════");
    println!("   DEW HEATER CONTROLLER v{}", env!("CARGO_PKG_VERSION"));
    println!("══════════════════════════════════════════════");
    println!("  Modo:      {}", config.operating_mode);
    println!(
        "  Gatilho:   {} {}{} (histerese {}°C)",
        config.threshold.mode,
        config.threshold.trigger_value,
        config.threshold.mode.unit(),
        config.threshold.hysteresis_margin
    );
    println!(
        "  Porta:     {}",
        transport.port_name().unwrap_or_else(|| "desconectada".into())
    );
    println!("  Clima:     {}", redacted_url(&settings.weather.url));
    println!(
        "  Ciclos:    controle {:.1}s | clima {:.0}s",
        settings.control.tick_interval_secs, settings.weather.poll_interval_secs
    );
    println!("══════════════════════════════════════════════");
    println!("  Digite 'help' para os comandos.");
    println!();

    // ── Threads ──
    let logger = tasks::spawn_event_logger(event_rx, heater_display)?;

    let spawned = tasks::spawn_sampler(
        HttpWeatherSource::new(settings.weather.url.clone(), settings.fetch_timeout()),
        slot.clone(),
        sink.clone(),
        settings.poll_interval(),
        cancel.clone(),
    )
    .and_then(|sampler| {
        let control = ControlLoop::new(transport.clone(), sink.clone())
            .with_max_reading_age(settings.max_reading_age());
        match tasks::spawn_control(
            control,
            store.clone(),
            slot.clone(),
            control_rx,
            settings.tick_interval(),
            cancel.clone(),
        ) {
            Ok(control) => Ok((sampler, control)),
            Err(e) => {
                cancel.cancel();
                tasks::join("weather-sampler", sampler);
                Err(e)
            }
        }
    });
    let (sampler, control) = match spawned {
        Ok(handles) => handles,
        Err(e) => {
            drop(sink);
            drop(console);
            tasks::join("event-logger", logger);
            return Err(e);
        }
    };

    // ── Loop do console ──
    let lines = spawn_stdin_reader()?;
    loop {
        select! {
            recv(cancel.receiver()) -> _ => break,
            recv(lines) -> line => {
                let Ok(line) = line else {
                    info!("stdin fechado, encerrando");
                    break;
                };
                match parse_command(&line) {
                    Ok(Some(cmd)) => {
                        if !console.handle(cmd) {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("{e}"),
                }
            }
        }
    }

    // ── Shutdown: cancela, aguarda threads, fecha porta, persiste ──
    info!("Encerrando...");
    cancel.cancel();
    tasks::join("weather-sampler", sampler);
    tasks::join("control-loop", control);

    transport.close();
    console.persist();

    drop(console);
    drop(sink);
    tasks::join("event-logger", logger);
    Ok(())
}
