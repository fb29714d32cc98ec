use crate::debounce::Debouncer;
use crate::dom::element::NodeId;
use crate::dom::locate::locate_all;
use crate::dom::page::{MutationBatch, Page};
use crate::error::{DomesticatedError, Result};
use crate::ids::{IdGenerator, global_ids};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// Quiet period between the last added element and a re-scan
pub const RESCAN_QUIET_PERIOD: Duration = Duration::from_millis(150);

/// Callback receiving the watch id and one matching element
pub type WatchHandler = Arc<dyn Fn(u64, NodeId) + Send + Sync>;

struct Watch {
    selector: String,
    handler: WatchHandler,
}

type Watches = Arc<Mutex<IndexMap<u64, Watch>>>;

/// Registry of selector watches re-run whenever elements are added to the page
///
/// Every scan reports all current matches, so a handler sees the same element
/// again on later scans.
pub struct ElementRancher<P: Page + 'static> {
    page: Arc<P>,
    ids: &'static IdGenerator,
    id: u64,
    watches: Watches,
    scans: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl<P: Page + 'static> ElementRancher<P> {
    /// Start observing `page`. Must be called from within a tokio runtime.
    pub fn start(page: Arc<P>) -> Result<Self> {
        Self::start_with_ids(page, global_ids())
    }

    pub fn start_with_ids(page: Arc<P>, ids: &'static IdGenerator) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| DomesticatedError::Runtime(e.to_string()))?;
        let id = ids.next_id()?;
        let watches: Watches = Arc::new(Mutex::new(IndexMap::new()));
        let scans = Arc::new(AtomicU64::new(0));

        let task = runtime.spawn(observe(
            page.clone(),
            page.subscribe_mutations(),
            watches.clone(),
            scans.clone(),
        ));
        log::info!("Element rancher {} started", id);

        Ok(Self {
            page,
            ids,
            id,
            watches,
            scans,
            task,
        })
    }

    /// Register `handler` for elements matching `selector` and scan right away
    pub fn add_handler<F>(&self, selector: impl Into<String>, handler: F) -> Result<u64>
    where
        F: Fn(u64, NodeId) + Send + Sync + 'static,
    {
        let selector = selector.into();
        let watch_id = self.ids.next_id()?;
        log::debug!("Rancher {} watching '{}' as {}", self.id, selector, watch_id);
        self.watches.lock().insert(
            watch_id,
            Watch {
                selector,
                handler: Arc::new(handler),
            },
        );
        run_handlers(&*self.page, &self.watches);
        Ok(watch_id)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn watch_count(&self) -> usize {
        self.watches.lock().len()
    }

    /// Number of debounced scans completed so far
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::SeqCst)
    }

    pub fn page(&self) -> &Arc<P> {
        &self.page
    }
}

impl<P: Page + 'static> Drop for ElementRancher<P> {
    fn drop(&mut self) {
        self.task.abort();
        log::debug!("Element rancher {} stopped", self.id);
    }
}

fn run_handlers<P: Page + ?Sized>(page: &P, watches: &Mutex<IndexMap<u64, Watch>>) {
    // Handlers run without the lock held so they may register further watches
    let snapshot: Vec<(u64, String, WatchHandler)> = watches
        .lock()
        .iter()
        .map(|(id, watch)| (*id, watch.selector.clone(), watch.handler.clone()))
        .collect();

    for (watch_id, selector, handler) in snapshot {
        match locate_all(page, &selector, None) {
            Ok(elements) => {
                for element in elements {
                    handler(watch_id, element);
                }
            }
            Err(e) => log::warn!("Watch {} on '{}' failed: {}", watch_id, selector, e),
        }
    }
}

async fn observe<P: Page + ?Sized>(
    page: Arc<P>,
    mut mutations: broadcast::Receiver<MutationBatch>,
    watches: Watches,
    scans: Arc<AtomicU64>,
) {
    let mut debouncer = Debouncer::new(RESCAN_QUIET_PERIOD);
    loop {
        tokio::select! {
            received = mutations.recv() => match received {
                Ok(batch) => {
                    if batch.has_additions() {
                        debouncer.trigger();
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::debug!("Rancher skipped {} mutation batches", skipped);
                    debouncer.trigger();
                }
                Err(RecvError::Closed) => break,
            },
            _ = Debouncer::wait(debouncer.deadline()) => {
                debouncer.fire();
                run_handlers(&*page, &watches);
                scans.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

/// Per-page state holding the lazily started rancher
pub struct PageContext<P: Page + 'static> {
    page: Arc<P>,
    rancher: Mutex<Option<Arc<ElementRancher<P>>>>,
}

impl<P: Page + 'static> PageContext<P> {
    pub fn new(page: Arc<P>) -> Self {
        Self {
            page,
            rancher: Mutex::new(None),
        }
    }

    pub fn page(&self) -> &Arc<P> {
        &self.page
    }

    /// The page's rancher, started on first use
    pub fn rancher(&self) -> Result<Arc<ElementRancher<P>>> {
        let mut slot = self.rancher.lock();
        if let Some(rancher) = slot.as_ref() {
            return Ok(rancher.clone());
        }
        let rancher = Arc::new(ElementRancher::start(self.page.clone())?);
        *slot = Some(rancher.clone());
        Ok(rancher)
    }
}
