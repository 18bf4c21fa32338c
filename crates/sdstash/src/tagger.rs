//! Tag extraction seam.
//!
//! The tagging model lives outside this crate. It is reached through
//! [`TagExtractor`], which returns four groups: rating, general, character and an
//! opaque embedding. Score groups are ordered lists so the extractor's own key order
//! survives. That order breaks rating ties and fixes the order of a record's tags.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::warn;

use crate::error::{Result, StashError};
use crate::model::{token_name, GeneratedImage};
use crate::tags::TagType;

pub type ScoreList = Vec<(String, f32)>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagGroups {
    pub rating: ScoreList,
    pub general: ScoreList,
    pub character: ScoreList,
    pub embedding: Vec<f32>,
}

impl TagGroups {
    /// The rating label with the highest score. Ties go to the first one listed.
    pub fn top_rating(&self) -> Option<&str> {
        let mut best: Option<&(String, f32)> = None;
        for entry in &self.rating {
            match best {
                Some(current) if entry.1 <= current.1 => {}
                _ => best = Some(entry),
            }
        }
        best.map(|(name, _)| name.as_str())
    }

    /// General then character tags as whitespace-free tokens, each listed once.
    /// A tag present in both groups keeps its general type.
    pub fn typed_tags(&self) -> Vec<(String, TagType)> {
        let mut seen = HashSet::new();
        let general = self.general.iter().map(|(t, _)| (t, TagType::General));
        let character = self.character.iter().map(|(t, _)| (t, TagType::Character));

        general
            .chain(character)
            .map(|(raw, tag_type)| (token_name(raw), tag_type))
            .filter(|(name, _)| !name.is_empty() && seen.insert(name.clone()))
            .collect()
    }
}

pub trait TagExtractor: Send + Sync {
    fn extract(&self, image: &GeneratedImage) -> Result<TagGroups>;
}

impl<F> TagExtractor for F
where
    F: Fn(&GeneratedImage) -> Result<TagGroups> + Send + Sync,
{
    fn extract(&self, image: &GeneratedImage) -> Result<TagGroups> {
        self(image)
    }
}

/// Returns the extraction slot when dropped.
struct SlotToken(Sender<()>);

impl Drop for SlotToken {
    fn drop(&mut self) {
        let _ = self.0.send(());
    }
}

/// Runs an extractor one call at a time, optionally with a deadline.
///
/// There is a single extraction slot. A call takes it before extracting and gives
/// it back when the extractor returns. With a timeout set, the extractor runs on a
/// worker thread that owns the slot. If the deadline passes, the call fails with
/// [`StashError::ExtractionTimeout`] and the worker keeps the slot until the model
/// answers, so later calls wait for it (up to their own deadline) instead of
/// starting a second extraction. At most one worker is ever outstanding.
pub(crate) struct ExtractionSlot {
    extractor: Arc<dyn TagExtractor>,
    timeout: Option<Duration>,
    slot_tx: Sender<()>,
    slot_rx: Receiver<()>,
}

impl ExtractionSlot {
    pub(crate) fn new(extractor: Arc<dyn TagExtractor>, timeout: Option<Duration>) -> Self {
        let (slot_tx, slot_rx) = crossbeam_channel::bounded(1);
        // the one free slot; the channel has room for it
        let _ = slot_tx.send(());
        Self {
            extractor,
            timeout,
            slot_tx,
            slot_rx,
        }
    }

    pub(crate) fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    pub(crate) fn extract(&self, image: &GeneratedImage) -> Result<TagGroups> {
        let Some(timeout) = self.timeout else {
            let _slot = self.acquire(None)?;
            return self.extractor.extract(image);
        };

        let deadline = Instant::now() + timeout;
        let slot = self.acquire(Some((deadline, timeout)))?;

        let (tx, rx) = crossbeam_channel::bounded(1);
        let worker = Arc::clone(&self.extractor);
        let image = image.clone();
        thread::Builder::new()
            .name("sdstash-tagger".to_string())
            .spawn(move || {
                let result = worker.extract(&image);
                drop(slot);
                let _ = tx.send(result);
            })?;

        match rx.recv_deadline(deadline) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(StashError::ExtractionTimeout(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(StashError::Extraction(
                "extractor thread exited without a result".to_string(),
            )),
        }
    }

    fn acquire(&self, deadline: Option<(Instant, Duration)>) -> Result<SlotToken> {
        let taken = match deadline {
            None => self.slot_rx.recv().is_ok(),
            Some((deadline, timeout)) => match self.slot_rx.recv_deadline(deadline) {
                Ok(()) => true,
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "previous extraction still running, giving up after {:?}",
                        timeout
                    );
                    return Err(StashError::ExtractionTimeout(timeout));
                }
                Err(RecvTimeoutError::Disconnected) => false,
            },
        };
        if !taken {
            return Err(StashError::Extraction("extraction slot closed".to_string()));
        }
        Ok(SlotToken(self.slot_tx.clone()))
    }
}
