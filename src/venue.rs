//! Venue: the playback queue behind the audio callback
//!
//! A venue owns an ordered program of maestros and a per-song clock,
//! and hands out one sample per call. It is built to sit inside an
//! audio callback: the control thread talks to it only through a
//! [`VenueHandle`], which feeds prepared maestros over a lock-free
//! SPSC ring and flips atomic flags. The sample path takes no locks
//! and, apart from draining the ring into its preallocated program
//! queue, does not allocate.
//!
//! Stop is cooperative: `clear_queue` raises a flag that the venue
//! honors on its next sample, so silence is not guaranteed within
//! the same sample.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::score::Maestro;

/// Sentinel clock value: no song has started.
const NOT_STARTED: f64 = -1.0;

const DEFAULT_CAPACITY: usize = 16;

/// Flags written by the control thread, read by the audio thread.
/// Release/acquire pairs order the writes that precede a flag flip
/// before the audio thread's reaction to it.
struct Flags {
    stop: AtomicBool,
    looping: AtomicBool,
}

/// The audio-thread half: queue of maestros plus the playback clock.
pub struct Venue {
    program: VecDeque<Maestro>,
    incoming: HeapCons<Maestro>,
    flags: Arc<Flags>,
    internal_time: f64,
    on_idle: Option<Box<dyn FnMut() + Send>>,
}

/// The control-thread half: enqueue music, request stop, toggle
/// looping. Cheap handle over the shared flags and the intake ring.
pub struct VenueHandle {
    incoming: HeapProd<Maestro>,
    flags: Arc<Flags>,
}

impl Venue {
    pub fn new() -> (Venue, VenueHandle) {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a venue able to hold `capacity` queued maestros before
    /// `queue_music` starts reporting a full ring.
    pub fn with_capacity(capacity: usize) -> (Venue, VenueHandle) {
        let (producer, consumer) = HeapRb::new(capacity).split();
        let flags = Arc::new(Flags {
            stop: AtomicBool::new(false),
            looping: AtomicBool::new(false),
        });
        let venue = Venue {
            program: VecDeque::with_capacity(capacity + 1),
            incoming: consumer,
            flags: flags.clone(),
            internal_time: NOT_STARTED,
            on_idle: None,
        };
        let handle = VenueHandle {
            incoming: producer,
            flags,
        };
        (venue, handle)
    }

    /// Install the callback invoked when the program runs dry: once
    /// after the last maestro finishes, and once on a stop request.
    /// The callback may enqueue more music through a handle for
    /// gapless continuation; it runs on the audio thread and must
    /// stay within the sample budget.
    pub fn set_idle_callback(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_idle = Some(Box::new(callback));
    }

    /// The sample-provider entry point, called once per output
    /// sample. Channel 0 is the only live channel; `dt` is the
    /// reciprocal of the sample rate. The global time is accepted
    /// for signature compatibility with audio drivers but playback
    /// runs on the venue's own per-song clock.
    pub fn get_sample(&mut self, channel: i32, _global_time: f64, dt: f64) -> f64 {
        if channel != 0 {
            return 0.0;
        }
        self.drain_incoming();
        if self.flags.stop.swap(false, Ordering::AcqRel) {
            self.program.clear();
            self.internal_time = NOT_STARTED;
            self.fire_idle();
        }
        if self.program.is_empty() {
            return 0.0;
        }
        if self.program.front().is_some_and(|m| m.finished()) {
            if self.flags.looping.load(Ordering::Acquire) {
                if let Some(head) = self.program.front_mut() {
                    head.reset();
                }
            } else {
                self.program.pop_front();
            }
            self.internal_time = NOT_STARTED;
            if self.program.is_empty() {
                self.fire_idle();
            }
        }
        let Some(head) = self.program.front_mut() else {
            return 0.0;
        };
        if self.internal_time == NOT_STARTED {
            self.internal_time = 0.0;
        } else {
            self.internal_time += dt;
        }
        head.sample(self.internal_time)
    }

    fn drain_incoming(&mut self) {
        while let Some(maestro) = self.incoming.try_pop() {
            self.program.push_back(maestro);
        }
    }

    fn fire_idle(&mut self) {
        if let Some(on_idle) = &mut self.on_idle {
            on_idle();
        }
        // Anything the callback queued becomes playable this sample.
        self.drain_incoming();
    }
}

impl VenueHandle {
    /// Queue a prepared maestro. Returns it back if the intake ring
    /// is full; the caller can retry after the venue has drained.
    pub fn queue_music(&mut self, maestro: Maestro) -> Result<(), Maestro> {
        debug!("queueing maestro with {} voices", maestro.voices().len());
        self.incoming.try_push(maestro)
    }

    /// Ask the venue to drop everything it is playing and has
    /// queued. Takes effect on the next sample.
    pub fn clear_queue(&self) {
        self.flags.stop.store(true, Ordering::Release);
    }

    pub fn toggle_loop(&self) {
        self.flags.looping.fetch_xor(true, Ordering::AcqRel);
    }

    pub fn looping(&self) -> bool {
        self.flags.looping.load(Ordering::Acquire)
    }
}
