// ── Coordinate light grid ──
//
// Maps (x, y) cells to (bridge serial, light id) and fans commands out to
// the owning bridges. Pending changes accumulate in a buffer that every
// commit drains in one step; partial failures come back as a per-cell map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use playhouse_api::{Bridge, LightState, Settled, settle};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::GridConfig;
use crate::error::CoreError;

/// `(x, y)`; `y` selects the row, `x` the cell within it.
pub type Coord = (usize, usize);

/// Rows of cells, top row first.
pub type Layout = Vec<Vec<Option<Cell>>>;

/// A light on a specific bridge. Serialized as `[serial, light]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, u32)", into = "(String, u32)")]
pub struct Cell {
    pub serial: String,
    pub light: u32,
}

impl Cell {
    pub fn new(serial: impl Into<String>, light: u32) -> Self {
        Self {
            serial: serial.into(),
            light,
        }
    }
}

impl From<(String, u32)> for Cell {
    fn from((serial, light): (String, u32)) -> Self {
        Self { serial, light }
    }
}

impl From<Cell> for (String, u32) {
    fn from(cell: Cell) -> Self {
        (cell.serial, cell.light)
    }
}

/// What a persistence layer needs to restore the grid later.
#[derive(Debug, Clone)]
pub struct GridSnapshot {
    pub grid: Layout,
    /// Addresses of every registered bridge.
    pub ips: Vec<String>,
    /// Credentials of bridges that are currently authorized, by serial.
    pub usernames: HashMap<String, SecretString>,
}

// ── LightGrid ────────────────────────────────────────────────────

/// Shared handle to the grid.
///
/// Cheaply cloneable via `Arc<GridInner>`. Each piece of state has its own
/// lock and no lock is held across an `.await`.
#[derive(Clone)]
pub struct LightGrid {
    inner: Arc<GridInner>,
}

struct GridInner {
    config: GridConfig,
    bridges: RwLock<HashMap<String, Arc<Bridge>>>,
    layout: RwLock<Layout>,
    buffer: Mutex<HashMap<Coord, LightState>>,
    /// Serial → username, applied when a bridge without one is added.
    credentials: RwLock<HashMap<String, SecretString>>,
    /// Bumped when a bridge is added or removed and when the layout is
    /// replaced. Credential registry updates do not bump it.
    revision: watch::Sender<u64>,
}

impl std::fmt::Debug for LightGrid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightGrid")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("bridges", &self.bridge_serials())
            .finish_non_exhaustive()
    }
}

impl LightGrid {
    pub fn new(config: GridConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(GridInner {
                config,
                bridges: RwLock::new(HashMap::new()),
                layout: RwLock::new(Vec::new()),
                buffer: Mutex::new(HashMap::new()),
                credentials: RwLock::new(HashMap::new()),
                revision,
            }),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.inner.config
    }

    /// Observe mutations. The value is a revision counter; only changes matter.
    pub fn subscribe_changes(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    fn notify_changed(&self) {
        self.inner.revision.send_modify(|rev| *rev += 1);
    }

    // ── Layout ───────────────────────────────────────────────────

    /// Replace the whole layout. Cells may name bridges that are not
    /// registered; that surfaces at commit time.
    pub fn set_grid(&self, grid: Layout) {
        let (width, height) = (layout_width(&grid), grid.len());
        *self.inner.layout.write().expect("layout lock poisoned") = grid;
        debug!(width, height, "grid layout replaced");
        self.notify_changed();
    }

    pub fn grid(&self) -> Layout {
        self.inner.layout.read().expect("layout lock poisoned").clone()
    }

    /// Length of the longest row.
    pub fn width(&self) -> usize {
        layout_width(&self.inner.layout.read().expect("layout lock poisoned"))
    }

    pub fn height(&self) -> usize {
        self.inner.layout.read().expect("layout lock poisoned").len()
    }

    // ── Credentials ──────────────────────────────────────────────

    /// Replace the credential registry.
    pub fn set_credentials(&self, credentials: HashMap<String, SecretString>) {
        *self
            .inner
            .credentials
            .write()
            .expect("credential registry lock poisoned") = credentials;
    }

    pub fn credentials(&self) -> HashMap<String, SecretString> {
        self.inner
            .credentials
            .read()
            .expect("credential registry lock poisoned")
            .clone()
    }

    fn registered_credential(&self, serial: &str) -> Option<SecretString> {
        self.inner
            .credentials
            .read()
            .expect("credential registry lock poisoned")
            .get(serial)
            .cloned()
    }

    // ── Bridge registry ──────────────────────────────────────────

    /// Verify `address` and register the bridge found there.
    pub async fn add_bridge(
        &self,
        address: &str,
        credential: Option<SecretString>,
    ) -> Result<Arc<Bridge>, CoreError> {
        let bridge = Bridge::connect(address, credential, self.inner.config.bridge.clone()).await?;
        self.insert_bridge(bridge).await
    }

    /// Register an already verified bridge.
    ///
    /// A bridge without a credential gets the one in the registry, if any.
    /// A registered credential the bridge rejects is logged, not an error.
    pub async fn insert_bridge(&self, bridge: Bridge) -> Result<Arc<Bridge>, CoreError> {
        let serial = bridge.serial().to_owned();
        if self.has_bridge(&serial) {
            return Err(CoreError::BridgeAlreadyAdded { serial });
        }

        if bridge.credential().is_none() {
            if let Some(credential) = self.registered_credential(&serial) {
                if let Err(e) = bridge.set_credential(Some(credential)).await {
                    warn!(serial = %serial, error = %e, "registered username not accepted");
                }
            }
        }

        let bridge = Arc::new(bridge);
        {
            let mut bridges = self.inner.bridges.write().expect("bridge registry lock poisoned");
            if bridges.contains_key(&serial) {
                return Err(CoreError::BridgeAlreadyAdded { serial });
            }
            bridges.insert(serial.clone(), Arc::clone(&bridge));
        }
        info!(
            serial = %serial,
            address = bridge.address(),
            authorized = bridge.is_authorized(),
            "bridge added"
        );
        self.notify_changed();
        Ok(bridge)
    }

    /// Add many addresses concurrently. Used at startup.
    pub async fn load_bridges<I, S>(&self, addresses: I) -> Settled<String, Arc<Bridge>, CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let settled = settle(addresses.into_iter().map(|address| {
            let address: String = address.into();
            let grid = self.clone();
            (address.clone(), async move { grid.add_bridge(&address, None).await })
        }))
        .await;
        for (address, err) in &settled.errors {
            warn!(address, error = %err, "could not add bridge");
        }
        settled
    }

    pub fn has_bridge(&self, serial: &str) -> bool {
        self.inner
            .bridges
            .read()
            .expect("bridge registry lock poisoned")
            .contains_key(serial)
    }

    pub fn bridge(&self, serial: &str) -> Option<Arc<Bridge>> {
        self.inner
            .bridges
            .read()
            .expect("bridge registry lock poisoned")
            .get(serial)
            .cloned()
    }

    /// Unregister a bridge. Cells keep pointing at it.
    pub fn remove_bridge(&self, serial: &str) -> Option<Arc<Bridge>> {
        let removed = self
            .inner
            .bridges
            .write()
            .expect("bridge registry lock poisoned")
            .remove(serial);
        if removed.is_some() {
            info!(serial, "bridge removed");
            self.notify_changed();
        }
        removed
    }

    /// Registered bridges, ordered by serial.
    pub fn bridges(&self) -> Vec<Arc<Bridge>> {
        let mut bridges: Vec<Arc<Bridge>> = self
            .inner
            .bridges
            .read()
            .expect("bridge registry lock poisoned")
            .values()
            .cloned()
            .collect();
        bridges.sort_by(|a, b| a.serial().cmp(b.serial()));
        bridges
    }

    fn bridge_serials(&self) -> Vec<String> {
        self.bridges()
            .iter()
            .map(|b| b.serial().to_owned())
            .collect()
    }

    /// Layout, addresses and authorized credentials, for persistence.
    pub fn snapshot(&self) -> GridSnapshot {
        let bridges = self.bridges();
        GridSnapshot {
            grid: self.grid(),
            ips: bridges.iter().map(|b| b.address().to_owned()).collect(),
            usernames: bridges
                .iter()
                .filter(|b| b.is_authorized())
                .filter_map(|b| b.credential().map(|c| (b.serial().to_owned(), c)))
                .collect(),
        }
    }

    // ── Light commands ───────────────────────────────────────────

    /// Queue `changes` for one cell.
    ///
    /// Unbuffered grids commit right away and return the error for this
    /// cell. Only one cell is ever pending in that mode, so collapsing the
    /// error map to a single error loses nothing.
    pub async fn set_state(&self, x: usize, y: usize, changes: &LightState) -> Result<(), CoreError> {
        self.inner
            .buffer
            .lock()
            .expect("buffer lock poisoned")
            .entry((x, y))
            .or_default()
            .merge(changes);

        if self.inner.config.buffered {
            return Ok(());
        }
        let mut errors = self.commit().await;
        match errors.remove(&(x, y)) {
            Some(err) => Err(err),
            None => errors.into_values().next().map_or(Ok(()), Err),
        }
    }

    /// Send every pending change and return the failures by cell.
    ///
    /// The buffer is emptied before anything is sent, whether or not the
    /// commands succeed.
    pub async fn commit(&self) -> HashMap<Coord, CoreError> {
        let pending = std::mem::take(&mut *self.inner.buffer.lock().expect("buffer lock poisoned"));
        if pending.is_empty() {
            return HashMap::new();
        }

        let mut errors = HashMap::new();
        let mut ops = Vec::with_capacity(pending.len());
        {
            let layout = self.inner.layout.read().expect("layout lock poisoned");
            let bridges = self.inner.bridges.read().expect("bridge registry lock poisoned");
            for (coord, changes) in pending {
                match resolve(&layout, &bridges, coord) {
                    Ok((bridge, light)) => ops.push((coord, async move {
                        bridge.set_state(light, &changes).await
                    })),
                    Err(e) => {
                        errors.insert(coord, e);
                    }
                }
            }
        }

        let sent = ops.len();
        let settled = settle(ops).await;
        errors.extend(
            settled
                .errors
                .into_iter()
                .map(|(coord, e)| (coord, CoreError::from(e))),
        );
        debug!(sent, failed = errors.len(), "commit finished");
        errors
    }

    /// Send `changes` to every light on every bridge (group 0).
    pub async fn set_all(&self, changes: &LightState) -> HashMap<String, CoreError> {
        let settled = settle(self.bridges().into_iter().map(|bridge| {
            let changes = changes.clone();
            (bridge.serial().to_owned(), async move {
                bridge.set_group(0, &changes).await
            })
        }))
        .await;
        settled
            .errors
            .into_iter()
            .map(|(serial, e)| (serial, CoreError::from(e)))
            .collect()
    }

    /// Send per-light changes to one bridge, bypassing the layout.
    pub async fn set_bridge_lights(
        &self,
        serial: &str,
        changes: HashMap<u32, LightState>,
    ) -> Result<HashMap<u32, CoreError>, CoreError> {
        let bridge = self.bridge(serial).ok_or_else(|| CoreError::UnknownBridge {
            serial: serial.to_owned(),
        })?;
        let settled = settle(changes.into_iter().map(|(light, state)| {
            let bridge = Arc::clone(&bridge);
            (light, async move { bridge.set_state(light, &state).await })
        }))
        .await;
        Ok(settled
            .errors
            .into_iter()
            .map(|(light, e)| (light, CoreError::from(e)))
            .collect())
    }
}

fn layout_width(layout: &Layout) -> usize {
    layout.iter().map(Vec::len).max().unwrap_or(0)
}

/// Cell lookup plus bridge lookup, checked independently.
fn resolve(
    layout: &Layout,
    bridges: &HashMap<String, Arc<Bridge>>,
    (x, y): Coord,
) -> Result<(Arc<Bridge>, u32), CoreError> {
    let cell = layout
        .get(y)
        .and_then(|row| row.get(x))
        .and_then(Option::as_ref)
        .ok_or(CoreError::OutsideGrid { x, y })?;
    let bridge = bridges
        .get(&cell.serial)
        .ok_or_else(|| CoreError::NoBridgeAtCoordinate {
            x,
            y,
            serial: cell.serial.clone(),
        })?;
    Ok((Arc::clone(bridge), cell.light))
}
