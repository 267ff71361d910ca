use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::error;

use crate::config::DEFAULT_WMS_LEGEND_FORMAT;
use crate::i18n::Translator;
use crate::legend::symbology::{DataUriSymbology, SymbologyRenderer};

/// Fire-and-forget enrichment tasks, remembered only so callers can wait for quiescence.
#[derive(Clone, Default)]
pub struct TaskSet {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl TaskSet {
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        let mut handles = self.handles.lock();
        handles.retain(|handle| !handle.is_finished());
        handles.push(handle);
    }

    pub fn in_flight(&self) -> usize {
        self.handles
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Waits until every spawned task, including ones spawned while waiting, has finished.
    pub async fn idle(&self) {
        loop {
            let pending = std::mem::take(&mut *self.handles.lock());
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if let Err(e) = handle.await
                    && e.is_panic()
                {
                    error!(error = %e, "legend enrichment task panicked");
                }
            }
        }
    }
}

/// Collaborators shared by the engine, the generators and their background tasks.
#[derive(Clone)]
pub struct LegendServices {
    pub http: reqwest::Client,
    pub symbology: Arc<dyn SymbologyRenderer>,
    pub translator: Arc<dyn Translator>,
    pub wms_legend_format: String,
    pub tasks: TaskSet,
}

impl LegendServices {
    pub fn new(http: reqwest::Client, translator: Arc<dyn Translator>) -> Self {
        Self {
            http,
            symbology: Arc::new(DataUriSymbology),
            translator,
            wms_legend_format: DEFAULT_WMS_LEGEND_FORMAT.to_string(),
            tasks: TaskSet::default(),
        }
    }

    pub fn with_symbology(mut self, symbology: Arc<dyn SymbologyRenderer>) -> Self {
        self.symbology = symbology;
        self
    }

    pub fn with_wms_legend_format(mut self, format: impl Into<String>) -> Self {
        self.wms_legend_format = format.into();
        self
    }
}
