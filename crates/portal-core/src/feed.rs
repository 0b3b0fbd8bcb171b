//! Merged, time-ordered session transcript.
//!
//! Locally sent messages, incoming chat and transcription segments all land
//! in one buffer kept sorted by `(timestamp, arrival)`. Reading the feed is a
//! plain borrow iterator, so it is lazy and can be restarted at will.

use std::collections::HashMap;

use crate::state::{ChatMessage, MessageOrigin, TranscriptionSegment};

#[derive(Debug, Clone)]
struct Entry {
    arrival: u64,
    message: ChatMessage,
}

#[derive(Debug, Default)]
pub struct ChatFeed {
    entries: Vec<Entry>,
    next_arrival: u64,
    // segment id -> arrival slot of its feed entry
    segments: HashMap<String, u64>,
}

impl ChatFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.segments.clear();
        self.next_arrival = 0;
    }

    /// Add a finished chat message (local or remote).
    pub fn push(&mut self, message: ChatMessage) {
        let arrival = self.take_arrival();
        self.insert(Entry { arrival, message });
    }

    /// Apply a transcription segment.
    ///
    /// The first segment for an id creates an entry stamped with
    /// `first_received`; later ones replace its text in place.
    pub fn apply_segment(&mut self, segment: TranscriptionSegment) {
        if let Some(&arrival) = self.segments.get(&segment.id) {
            if let Some(entry) = self.entries.iter_mut().find(|e| e.arrival == arrival) {
                entry.message = ChatMessage {
                    text: segment.text,
                    ..entry.message.clone()
                };
                return;
            }
        }

        let arrival = self.take_arrival();
        self.segments.insert(segment.id.clone(), arrival);
        self.insert(Entry {
            arrival,
            message: ChatMessage {
                id: segment.id,
                author: segment.author,
                text: segment.text,
                timestamp: segment.first_received,
                origin: MessageOrigin::Transcription,
            },
        });
    }

    /// Iterate the merged feed in timestamp order, ties by arrival.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> + '_ {
        self.entries.iter().map(|e| &e.message)
    }

    fn take_arrival(&mut self) -> u64 {
        let arrival = self.next_arrival;
        self.next_arrival += 1;
        arrival
    }

    fn insert(&mut self, entry: Entry) {
        let key = (entry.message.timestamp, entry.arrival);
        let idx = self
            .entries
            .partition_point(|e| (e.message.timestamp, e.arrival) <= key);
        self.entries.insert(idx, entry);
    }
}
