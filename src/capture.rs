use std::collections::HashMap;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;

use crate::rhythm::types::{RawPassage, RawPassageNote};
use crate::tuning::freq_to_deci_hz;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteInputEvent {
    Started { pitch_deci_hz: u32, timestamp_ms: u64 },
    Ended { pitch_deci_hz: u32, timestamp_ms: u64 },
    /// Discard the attempt and measure offsets from `origin_ms`.
    Reset { origin_ms: u64 },
}

/// Producer handle. Sends fail silently once the recorder is gone; the
/// return value reports whether the event was queued.
#[derive(Clone, Debug)]
pub struct NoteInput {
    tx: Sender<NoteInputEvent>,
}

impl NoteInput {
    pub fn note_started(&self, pitch_deci_hz: u32, timestamp_ms: u64) -> bool {
        self.send(NoteInputEvent::Started {
            pitch_deci_hz,
            timestamp_ms,
        })
    }

    pub fn note_ended(&self, pitch_deci_hz: u32, timestamp_ms: u64) -> bool {
        self.send(NoteInputEvent::Ended {
            pitch_deci_hz,
            timestamp_ms,
        })
    }

    /// Start from a detected frequency, kept to the nearest tenth of a Hertz.
    pub fn pitch_started(&self, freq_hz: f64, timestamp_ms: u64) -> bool {
        self.note_started(freq_to_deci_hz(freq_hz), timestamp_ms)
    }

    pub fn pitch_ended(&self, freq_hz: f64, timestamp_ms: u64) -> bool {
        self.note_ended(freq_to_deci_hz(freq_hz), timestamp_ms)
    }

    pub fn reset(&self, origin_ms: u64) -> bool {
        self.send(NoteInputEvent::Reset { origin_ms })
    }

    fn send(&self, event: NoteInputEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

pub struct NoteRecorder {
    rx: Receiver<NoteInputEvent>,
    origin_ms: u64,
    /// Start timestamp of every pitch currently held down.
    sounding: HashMap<u32, u64>,
    passage: RawPassage,
    observers: Vec<Sender<RawPassage>>,
}

/// Create a connected input/recorder pair. Offsets are measured from `origin_ms`.
pub fn channel(origin_ms: u64) -> (NoteInput, NoteRecorder) {
    let (tx, rx) = unbounded();
    let recorder = NoteRecorder {
        rx,
        origin_ms,
        sounding: HashMap::new(),
        passage: RawPassage::new(),
        observers: Vec::new(),
    };
    (NoteInput { tx }, recorder)
}

impl NoteRecorder {
    /// Receive a snapshot of the passage after every change.
    pub fn subscribe(&mut self) -> Receiver<RawPassage> {
        let (tx, rx) = unbounded();
        self.observers.push(tx);
        rx
    }

    pub fn passage(&self) -> &RawPassage {
        &self.passage
    }

    /// Handle every queued event without blocking. Returns how many were handled.
    pub fn drain(&mut self) -> usize {
        let mut handled = 0;
        let mut changed = false;
        while let Ok(event) = self.rx.try_recv() {
            changed |= self.handle(event);
            handled += 1;
        }
        if changed {
            self.publish();
        }
        handled
    }

    /// Block until every [`NoteInput`] is dropped, then return the passage.
    pub fn run(mut self) -> RawPassage {
        while let Ok(event) = self.rx.recv() {
            if self.handle(event) {
                self.publish();
            }
        }
        self.passage
    }

    pub fn reset(&mut self, origin_ms: u64) {
        self.origin_ms = origin_ms;
        self.sounding.clear();
        self.passage.clear();
        self.publish();
    }

    fn handle(&mut self, event: NoteInputEvent) -> bool {
        match event {
            NoteInputEvent::Started {
                pitch_deci_hz,
                timestamp_ms,
            } => {
                // a repeated start closes the note still sounding on that pitch
                match self.sounding.insert(pitch_deci_hz, timestamp_ms) {
                    Some(start_ms) => {
                        self.complete(pitch_deci_hz, start_ms, timestamp_ms);
                        true
                    }
                    None => false,
                }
            }
            NoteInputEvent::Ended {
                pitch_deci_hz,
                timestamp_ms,
            } => match self.sounding.remove(&pitch_deci_hz) {
                Some(start_ms) => {
                    self.complete(pitch_deci_hz, start_ms, timestamp_ms);
                    true
                }
                None => {
                    debug!("ignoring end of {} dHz: no note sounding", pitch_deci_hz);
                    false
                }
            },
            NoteInputEvent::Reset { origin_ms } => {
                self.origin_ms = origin_ms;
                self.sounding.clear();
                self.passage.clear();
                true
            }
        }
    }

    fn complete(&mut self, pitch_deci_hz: u32, start_ms: u64, end_ms: u64) {
        let offset = start_ms.saturating_sub(self.origin_ms);
        let duration = end_ms.saturating_sub(start_ms);
        self.passage.insert(RawPassageNote::new(
            pitch_deci_hz,
            u32::try_from(offset).unwrap_or(u32::MAX),
            u32::try_from(duration).unwrap_or(u32::MAX),
        ));
    }

    fn publish(&mut self) {
        let snapshot = &self.passage;
        self.observers.retain(|tx| tx.send(snapshot.clone()).is_ok());
    }
}
