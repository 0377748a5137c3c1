//! Cancelamento cooperativo das tarefas periódicas.
//!
//! Cada tarefa consulta [`CancelToken::is_cancelled`] antes de qualquer I/O e
//! dorme com [`CancelToken::wait`], que acorda na hora quando o token é
//! disparado (o `Sender` interno é descartado e o channel desconecta).

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    wake_tx: Arc<Mutex<Option<Sender<()>>>>,
    wake_rx: Receiver<()>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            wake_tx: Arc::new(Mutex::new(Some(tx))),
            wake_rx: rx,
        }
    }

    /// Dispara o cancelamento. Idempotente.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.wake_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Receiver que desconecta no cancelamento, para uso em `select!`.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.wake_rx
    }

    /// Dorme até `timeout` ou até o cancelamento. Retorna `true` se cancelado.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.wake_rx.recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) => true,
            Ok(()) | Err(RecvTimeoutError::Timeout) => self.is_cancelled(),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
