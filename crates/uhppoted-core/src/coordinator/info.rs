// ── Controller info poller ──
//
// Per tick, for every controller context: network settings, firmware and
// the controller's clock. A failed clock read degrades the entry rather
// than marking the controller unavailable.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};
use uhppoted_api::ControllerApi;

use super::{CoordinatorKind, StatusCell, call, fan_out, within_budget};
use crate::config::CoreConfig;
use crate::error::CoreError;
use crate::model::{ContextKey, ControllerInfo};
use crate::store::{Contexts, Entry, SlotStore};

pub(crate) type InfoStore = SlotStore<u32, Entry<ControllerInfo>>;

pub struct InfoPoller<A: ControllerApi> {
    api: Arc<A>,
    config: Arc<CoreConfig>,
    contexts: Arc<Contexts>,
    store: InfoStore,
    status: StatusCell,
    initialised: AtomicBool,
}

impl<A: ControllerApi> InfoPoller<A> {
    pub(crate) fn new(api: Arc<A>, config: Arc<CoreConfig>, contexts: Arc<Contexts>) -> Self {
        Self {
            api,
            config,
            contexts,
            store: InfoStore::new(),
            status: StatusCell::new(CoordinatorKind::Info),
            initialised: AtomicBool::new(false),
        }
    }

    pub(crate) fn store(&self) -> &InfoStore {
        &self.store
    }

    pub(crate) fn status(&self) -> &StatusCell {
        &self.status
    }

    pub async fn refresh(&self) -> Result<(), CoreError> {
        let result = self.tick().await;
        self.status.record(&result);
        result
    }

    async fn tick(&self) -> Result<(), CoreError> {
        if !self.initialised.swap(true, Ordering::SeqCst) {
            self.contexts.extend(
                self.config
                    .controllers
                    .iter()
                    .map(|c| ContextKey::Controller(c.serial)),
            );
        }

        let controllers = self.contexts.controllers();
        self.store.seed(controllers.iter().copied());
        if controllers.is_empty() {
            return Ok(());
        }

        let results = within_budget(
            CoordinatorKind::Info,
            self.config.tick_timeout,
            fan_out(controllers, self.config.concurrency, |serial| async move {
                let previous = self.store.read(&serial, |e| e.updated).flatten();
                match self.fetch(serial).await {
                    Ok(info) => (serial, Entry::available(info)),
                    Err(e) => {
                        warn!(controller = serial, error = %e, "controller info unavailable");
                        (serial, Entry::unavailable(previous))
                    }
                }
            }),
        )
        .await?;

        let keys: Vec<u32> = results
            .into_iter()
            .filter(|(serial, _)| self.contexts.contains(&ContextKey::Controller(*serial)))
            .filter_map(|(serial, entry)| {
                self.store
                    .update(serial, |slot| *slot = entry)
                    .map(|()| serial)
            })
            .collect();
        self.store.publish(keys);
        Ok(())
    }

    /// One-off read of a controller's info and clock.
    pub async fn fetch(&self, serial: u32) -> Result<ControllerInfo, CoreError> {
        let target = self.config.target(serial);
        let timeout = self.config.transport.timeout;

        let reply = call(serial, timeout, self.api.get_controller(target)).await?;
        let datetime = match call(serial, timeout, self.api.get_time(target)).await {
            Ok(time) => Some(time.datetime),
            Err(e) => {
                warn!(controller = serial, error = %e, "controller time unavailable");
                None
            }
        };

        debug!(controller = serial, firmware = %reply.version, "controller info updated");
        Ok(ControllerInfo::new(reply, datetime))
    }
}
