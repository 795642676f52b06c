//! Auto-advancing carousel over the featured vehicles.
//!
//! The timer is a spawned tokio task owned through a guard that aborts it on
//! drop. Replacing the slides always disarms the old timer before a new one is
//! armed, and each timer carries the epoch it was armed in so a tick that
//! races with a replacement can never advance the new slide set.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

use crate::models::Vehicle;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

/// The slide on screen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slide {
    pub index: usize,
    pub total: usize,
    pub vehicle: Vehicle,
}

struct Inner {
    epoch: u64,
    slides: Arc<[Vehicle]>,
    current: usize,
}

struct Timer(JoinHandle<()>);

impl Drop for Timer {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct Carousel {
    inner: Arc<Mutex<Inner>>,
    changes: Arc<watch::Sender<usize>>,
    timer: Option<Timer>,
    interval: Duration,
}

impl Carousel {
    pub fn new(interval: Duration) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                epoch: 0,
                slides: Arc::from(Vec::new()),
                current: 0,
            })),
            changes: Arc::new(changes),
            timer: None,
            interval,
        }
    }

    /// Swaps in a new slide set and restarts from the first slide.
    /// With no slides the timer stays disarmed. Must run inside a tokio
    /// runtime when `slides` is non-empty.
    pub fn set_slides(&mut self, slides: Vec<Vehicle>) {
        self.timer = None;

        let epoch = {
            let mut state = lock(&self.inner);
            state.epoch += 1;
            state.slides = Arc::from(slides);
            state.current = 0;
            self.changes.send_replace(0);
            if state.slides.is_empty() {
                return;
            }
            state.epoch
        };

        self.arm(epoch);
    }

    pub fn is_armed(&self) -> bool {
        self.timer.is_some()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn current_index(&self) -> usize {
        lock(&self.inner).current
    }

    pub fn current(&self) -> Option<Slide> {
        let state = lock(&self.inner);
        state.slides.get(state.current).map(|vehicle| Slide {
            index: state.current,
            total: state.slides.len(),
            vehicle: vehicle.clone(),
        })
    }

    /// Notified with the new index on every advance or slide swap
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.changes.subscribe()
    }

    fn arm(&mut self, epoch: u64) {
        let inner = Arc::clone(&self.inner);
        let changes = Arc::clone(&self.changes);
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;

                let mut state = lock(&inner);
                if state.epoch != epoch || state.slides.is_empty() {
                    break;
                }
                state.current = if state.current + 1 >= state.slides.len() {
                    0
                } else {
                    state.current + 1
                };
                changes.send_replace(state.current);
            }
        });

        debug!("Carousel timer armed (epoch {epoch}, every {:?})", period);
        self.timer = Some(Timer(handle));
    }
}

impl Default for Carousel {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}
