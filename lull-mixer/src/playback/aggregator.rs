//! Observable playback state
//!
//! Derives `playing_sounds` and `is_playing` from the registry's per-unit
//! rendering flags. The registry republishes after every command and event;
//! watchers are only woken when the derived set actually changes.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use lull_common::{MixerEvent, Sound};
use tokio::sync::watch;
use tracing::debug;

use crate::state::SharedState;

pub type PlayingSounds = BTreeMap<String, Sound>;

pub struct PlaybackStateAggregator {
    playing_tx: watch::Sender<PlayingSounds>,
    is_playing_tx: watch::Sender<bool>,
    state: Arc<SharedState>,
}

impl PlaybackStateAggregator {
    pub fn new(state: Arc<SharedState>) -> Self {
        let (playing_tx, _) = watch::channel(PlayingSounds::new());
        let (is_playing_tx, _) = watch::channel(false);
        Self {
            playing_tx,
            is_playing_tx,
            state,
        }
    }

    /// Sounds whose unit is currently rendering
    pub fn playing_sounds(&self) -> watch::Receiver<PlayingSounds> {
        self.playing_tx.subscribe()
    }

    /// True while at least one unit is rendering
    pub fn is_playing(&self) -> watch::Receiver<bool> {
        self.is_playing_tx.subscribe()
    }

    /// Recompute from the sounds of every rendering unit.
    ///
    /// Returns whether the published set changed.
    pub fn publish<'a>(&self, rendering: impl IntoIterator<Item = &'a Sound>) -> bool {
        let next: PlayingSounds = rendering
            .into_iter()
            .map(|sound| (sound.id.clone(), sound.clone()))
            .collect();
        let playing = !next.is_empty();

        let changed = self.playing_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
        self.is_playing_tx.send_if_modified(|current| {
            if *current == playing {
                return false;
            }
            *current = playing;
            true
        });

        if changed {
            let sound_ids: Vec<String> = self.playing_tx.borrow().keys().cloned().collect();
            debug!("Rendering set now {:?}", sound_ids);
            self.state.broadcast_event(MixerEvent::PlaybackStateChanged {
                playing,
                sound_ids,
                timestamp: Utc::now(),
            });
        }
        changed
    }
}
