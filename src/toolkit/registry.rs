//! Toolkit registry.
//!
//! All handles in a process share one [`EngineContext`]. It is built the
//! first time a handle is created and dropped with the last handle, so the
//! process never holds engine state nobody can reach. Each toolkit's
//! [`PowerGrid`] sits behind its own mutex: calls on different toolkits do
//! not contend.
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::id::DeviceClass;
use crate::basic::ecs::elements::GroupKind;
use crate::basic::ecs::network::{DataOps, PowerGrid};
use crate::logging::{LogSink, SinkTarget};

/// Index of the shared default toolkit.
pub const DEFAULT_TOOLKIT_INDEX: usize = usize::MAX;

static CONTEXT: Lazy<Mutex<Weak<EngineContext>>> = Lazy::new(|| Mutex::new(Weak::new()));

type SharedGrid = Arc<Mutex<PowerGrid>>;

#[derive(Default)]
struct Slots {
    grids: HashMap<usize, SharedGrid>,
    next_index: usize,
}

/// The process-wide engine binding: index → toolkit database.
pub struct EngineContext {
    slots: Mutex<Slots>,
}

impl EngineContext {
    /// The live context, or a fresh one when no handle exists.
    pub fn shared() -> Arc<Self> {
        let mut slot = CONTEXT.lock();
        if let Some(context) = slot.upgrade() {
            return context;
        }
        let context = Arc::new(EngineContext {
            slots: Mutex::new(Slots::default()),
        });
        *slot = Arc::downgrade(&context);
        info!("engine context initialized");
        context
    }

    fn allocate(&self, sink: LogSink) -> (usize, SharedGrid) {
        let mut slots = self.slots.lock();
        let index = slots.next_index;
        slots.next_index += 1;
        let grid = Arc::new(Mutex::new(PowerGrid::new(sink)));
        slots.grids.insert(index, grid.clone());
        debug!(index, "toolkit allocated");
        (index, grid)
    }

    fn default_grid(&self) -> SharedGrid {
        self.slots
            .lock()
            .grids
            .entry(DEFAULT_TOOLKIT_INDEX)
            .or_insert_with(|| Arc::new(Mutex::new(PowerGrid::default())))
            .clone()
    }

    fn release(&self, index: usize) {
        if self.slots.lock().grids.remove(&index).is_some() {
            debug!(index, "toolkit released");
        }
    }

    /// Number of toolkits currently allocated, the default one included.
    pub fn toolkit_count(&self) -> usize {
        self.slots.lock().grids.len()
    }

    pub fn is_allocated(&self, index: usize) -> bool {
        self.slots.lock().grids.contains_key(&index)
    }
}

impl Drop for EngineContext {
    fn drop(&mut self) {
        info!("engine context torn down");
    }
}

/// Handle to one toolkit. Dropping a non-default handle releases its
/// database; default handles share one database and never release it.
pub struct Toolkit {
    index: usize,
    context: Arc<EngineContext>,
    grid: SharedGrid,
}

impl std::fmt::Debug for Toolkit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolkit").field("index", &self.index).finish()
    }
}

impl Toolkit {
    /// Allocates a fresh toolkit. An empty `log_target` logs to stdout.
    pub fn new(log_target: &str) -> Self {
        let context = EngineContext::shared();
        let (index, grid) = context.allocate(LogSink::open(&SinkTarget::parse(log_target)));
        Self { index, context, grid }
    }

    pub fn default_toolkit() -> Self {
        let context = EngineContext::shared();
        let grid = context.default_grid();
        Self {
            index: DEFAULT_TOOLKIT_INDEX,
            context,
            grid,
        }
    }

    pub fn create(use_default: bool, log_target: &str) -> Self {
        if use_default {
            Self::default_toolkit()
        } else {
            Self::new(log_target)
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_default(&self) -> bool {
        self.index == DEFAULT_TOOLKIT_INDEX
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    /// Releases the toolkit. Same as dropping the handle.
    pub fn release(self) {}

    /// Runs `f` with exclusive access to this toolkit's database. The lock
    /// is not reentrant: `f` must not call back into the same handle.
    pub(crate) fn with_grid<R>(&self, f: impl FnOnce(&mut PowerGrid) -> R) -> R {
        f(&mut *self.grid.lock())
    }

    /// Redirects the engine log. An empty path selects stdout.
    pub fn set_toolkit_log_file(&self, path: &str, append: bool) {
        let sink = match SinkTarget::parse(path) {
            SinkTarget::Stdout => LogSink::stdout(),
            SinkTarget::File(file) => match LogSink::to_file(Path::new(&file), append) {
                Ok(sink) => sink,
                Err(err) => {
                    warn!(%err, "log file cannot be opened, keeping the current sink");
                    return;
                }
            },
        };
        self.with_grid(|grid| grid.set_sink(sink));
    }

    pub fn get_toolkit_log_file(&self) -> String {
        self.with_grid(|grid| match grid.world().resource::<LogSink>().target() {
            SinkTarget::Stdout => String::new(),
            SinkTarget::File(path) => path.display().to_string(),
        })
    }

    /// Drops the whole network database; settings and capacities stay.
    pub fn clear_toolkit(&self) {
        self.with_grid(|grid| {
            grid.clear();
            grid.report("Toolkit is cleared.");
        });
    }

    pub fn get_parallel_thread_number(&self) -> usize {
        self.with_grid(|grid| grid.toolkit_data().parallel_threads)
    }

    /// Numerical parallelism of the engine; values below one are raised to one.
    pub fn set_parallel_thread_number(&self, n: usize) {
        self.with_grid(|grid| grid.toolkit_data_mut().parallel_threads = n.max(1));
    }

    pub fn get_allowed_max_bus_number(&self) -> u32 {
        self.with_grid(|grid| grid.capacity().max_bus_number)
    }

    pub fn set_allowed_max_bus_number(&self, max: u32) {
        self.with_grid(|grid| grid.capacity_mut().max_bus_number = max);
    }

    pub fn get_bus_capacity(&self) -> usize {
        self.with_grid(|grid| grid.capacity().buses)
    }

    pub fn set_bus_capacity(&self, n: usize) {
        self.with_grid(|grid| grid.capacity_mut().buses = n);
    }

    pub fn get_device_capacity(&self, class: DeviceClass) -> usize {
        self.with_grid(|grid| grid.capacity().device(class))
    }

    pub fn set_device_capacity(&self, class: DeviceClass, n: usize) {
        self.with_grid(|grid| {
            grid.capacity_mut().devices.insert(class, n);
        });
    }

    fn group_capacity(&self, kind: GroupKind) -> usize {
        self.with_grid(|grid| grid.capacity().group(kind))
    }

    fn set_group_capacity(&self, kind: GroupKind, n: usize) {
        self.with_grid(|grid| {
            grid.capacity_mut().groups.insert(kind, n);
        });
    }

    pub fn get_area_capacity(&self) -> usize {
        self.group_capacity(GroupKind::Area)
    }

    pub fn set_area_capacity(&self, n: usize) {
        self.set_group_capacity(GroupKind::Area, n)
    }

    pub fn get_zone_capacity(&self) -> usize {
        self.group_capacity(GroupKind::Zone)
    }

    pub fn set_zone_capacity(&self, n: usize) {
        self.set_group_capacity(GroupKind::Zone, n)
    }

    pub fn get_owner_capacity(&self) -> usize {
        self.group_capacity(GroupKind::Owner)
    }

    pub fn set_owner_capacity(&self, n: usize) {
        self.set_group_capacity(GroupKind::Owner, n)
    }

    pub fn get_dynamic_model_database_capacity(&self) -> usize {
        self.with_grid(|grid| grid.capacity().dynamic_models)
    }

    pub fn set_dynamic_model_database_capacity(&self, n: usize) {
        self.with_grid(|grid| grid.capacity_mut().dynamic_models = n);
    }
}

impl Drop for Toolkit {
    fn drop(&mut self) {
        if !self.is_default() {
            self.context.release(self.index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toolkits_are_isolated() {
        let a = Toolkit::new("");
        let b = Toolkit::new("");
        assert_ne!(a.index(), b.index());
        assert!(Arc::ptr_eq(a.context(), b.context()));
        a.add_bus(1, "A", 110.0);
        assert!(a.is_bus_exist(1));
        assert!(!b.is_bus_exist(1));
    }

    #[test]
    fn default_handles_share_one_database() {
        let first = Toolkit::create(true, "ignored.log");
        let second = Toolkit::default_toolkit();
        assert!(first.is_default());
        first.set_toolkit_data("S", "TOOLKIT NAME", "shared");
        assert_eq!(second.get_toolkit_data("S", "TOOLKIT NAME").as_str(), "shared");
        first.release();
        assert_eq!(second.get_toolkit_data("S", "TOOLKIT NAME").as_str(), "shared");
    }

    #[test]
    fn release_frees_the_slot() {
        let keep = Toolkit::new("");
        let tk = Toolkit::new("");
        let index = tk.index();
        assert!(keep.context().is_allocated(index));
        tk.release();
        assert!(!keep.context().is_allocated(index));
        assert!(keep.context().toolkit_count() >= 1);
    }

    #[test]
    fn capacities_and_threads() {
        let tk = Toolkit::new("");
        tk.set_parallel_thread_number(0);
        assert_eq!(tk.get_parallel_thread_number(), 1);
        tk.set_device_capacity(DeviceClass::Load, 1);
        tk.add_bus(1, "A", 10.0);
        assert!(tk.add_load((1, "1")));
        assert!(!tk.add_load((1, "2")));
        tk.set_allowed_max_bus_number(10);
        assert!(!tk.add_bus(11, "B", 10.0));
        tk.set_area_capacity(3);
        assert_eq!(tk.get_area_capacity(), 3);
        assert_eq!(tk.get_zone_capacity(), crate::basic::ecs::network::DEFAULT_CAPACITY);
    }

    #[test]
    fn log_file_switch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.log");
        let tk = Toolkit::new("");
        tk.set_toolkit_log_file(path.to_str().unwrap(), false);
        assert_eq!(tk.get_toolkit_log_file(), path.display().to_string());
        tk.add_bus(1, "A", 10.0);
        tk.add_bus(1, "A", 10.0);
        tk.clear_toolkit();
        tk.set_toolkit_log_file("", false);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Bus 1 already exists"));
        assert!(text.contains("Toolkit is cleared."));
    }
}
