/*
    MZ-Pico
    Sharp MZ-80K peripheral emulation

    Copyright 2024-2026 The MZ-Pico Authors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    sound.rs

    Tone generation for the MZ-80K speaker.

    The machine has a single square wave voice. Counter 0 of the PIT sets the
    pitch and the sound enable register at E008 gates it. The emulator does
    not synthesize samples itself; it emits start and stop events over a
    channel to whatever audio sink the frontend provides.

    A tone that is never stopped is cut off by the sink loop after a timeout.
    Stopping can therefore come from two threads, the emulation thread writing
    E008 and the sink loop timing out, so the playing flag is an atomic and
    stopping an idle generator does nothing.
*/

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

/// The PIT is clocked at 1MHz.
pub const PIT_CLOCK_HZ: f64 = 1_000_000.0;
/// Frequencies below this are treated as silence.
pub const MIN_AUDIBLE_HZ: f32 = 1.0;
/// Longest note the monitor can play is 7 seconds.
pub const DEFAULT_TONE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ToneEvent {
    Start { frequency: f32 },
    Stop,
}

struct ToneShared {
    playing: AtomicBool,
    sender: Option<Sender<ToneEvent>>,
}

impl ToneShared {
    fn send(&self, event: ToneEvent) {
        if let Some(sender) = &self.sender {
            if sender.send(event).is_err() {
                log::trace!("Tone sink has gone away, dropping {:?}", event);
            }
        }
    }
}

/// Shared control over the speaker.
#[derive(Clone)]
pub struct ToneHandle {
    inner: Arc<ToneShared>,
}

impl ToneHandle {
    fn new(sender: Option<Sender<ToneEvent>>) -> Self {
        Self {
            inner: Arc::new(ToneShared {
                playing: AtomicBool::new(false),
                sender,
            }),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.inner.playing.load(Ordering::Acquire)
    }

    /// Silence the speaker. Returns false if it was already silent, in which
    /// case no event is sent.
    pub fn stop(&self) -> bool {
        let was_playing = self.inner.playing.swap(false, Ordering::AcqRel);
        if was_playing {
            self.inner.send(ToneEvent::Stop);
        }
        was_playing
    }

    fn start(&self, frequency: f32) {
        self.inner.playing.store(true, Ordering::Release);
        self.inner.send(ToneEvent::Start { frequency });
    }

    pub fn downgrade(&self) -> WeakToneHandle {
        WeakToneHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

/// A handle that does not keep the tone channel open.
#[derive(Clone)]
pub struct WeakToneHandle {
    inner: Weak<ToneShared>,
}

impl WeakToneHandle {
    pub fn upgrade(&self) -> Option<ToneHandle> {
        self.inner.upgrade().map(|inner| ToneHandle { inner })
    }

    pub fn stop(&self) -> bool {
        self.upgrade().map(|h| h.stop()).unwrap_or(false)
    }
}

pub struct ToneGenerator {
    handle: ToneHandle,
    frequency: f32,
}

impl ToneGenerator {
    /// Create a generator. Without a sender the generator only tracks state.
    pub fn new(sender: Option<Sender<ToneEvent>>) -> Self {
        Self {
            handle: ToneHandle::new(sender),
            frequency: 0.0,
        }
    }

    pub fn silent() -> Self {
        Self::new(None)
    }

    pub fn handle(&self) -> ToneHandle {
        self.handle.clone()
    }

    /// Set the pitch from a counter 0 divider. A count of 0 is 65536.
    pub fn set_divider(&mut self, count: u16) {
        let divisor = if count == 0 { 65536.0 } else { count as f64 };
        self.frequency = (PIT_CLOCK_HZ / divisor) as f32;
        log::trace!("Tone frequency set to {:.2}Hz", self.frequency);
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// Start (or retune) the tone at the current frequency.
    pub fn start(&mut self) {
        if self.frequency < MIN_AUDIBLE_HZ {
            log::trace!("Tone frequency {:.2}Hz is silent, not starting", self.frequency);
            return;
        }
        self.handle.start(self.frequency);
    }

    pub fn stop(&mut self) {
        self.handle.stop();
    }

    pub fn is_playing(&self) -> bool {
        self.handle.is_playing()
    }
}

/// Drive an audio sink from tone events until the generator is dropped.
///
/// A tone still playing `timeout` after it started is stopped through the
/// shared handle, so the emulation side sees the speaker as silent too.
pub fn tone_event_loop<F>(receiver: Receiver<ToneEvent>, handle: WeakToneHandle, timeout: Duration, mut sink: F)
where
    F: FnMut(ToneEvent),
{
    let mut deadline: Option<Instant> = None;

    loop {
        let received = match deadline {
            Some(deadline) => receiver.recv_deadline(deadline),
            None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(event) => {
                deadline = match event {
                    ToneEvent::Start { .. } => Some(Instant::now() + timeout),
                    ToneEvent::Stop => None,
                };
                sink(event);
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("Tone still playing after {}ms, stopping it", timeout.as_millis());
                deadline = None;
                // The handle's Stop event arrives on the next receive.
                if !handle.stop() {
                    sink(ToneEvent::Stop);
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                log::debug!("Tone channel closed, exiting tone loop");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::thread;

    #[test]
    fn divider_sets_frequency() {
        let mut tone = ToneGenerator::silent();
        tone.set_divider(1000);
        assert_eq!(tone.frequency(), 1000.0);
        tone.set_divider(0);
        assert!((tone.frequency() - 15.258789).abs() < 0.001);
    }

    #[test]
    fn start_below_one_hz_is_silent() {
        let (tx, rx) = unbounded();
        let mut tone = ToneGenerator::new(Some(tx));
        tone.start();
        assert!(!tone.is_playing());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn stop_is_idempotent() {
        let (tx, rx) = unbounded();
        let mut tone = ToneGenerator::new(Some(tx));
        tone.set_divider(2000);
        tone.start();
        assert_eq!(rx.try_recv(), Ok(ToneEvent::Start { frequency: 500.0 }));

        let handle = tone.handle();
        assert!(handle.stop());
        assert!(!handle.stop());
        tone.stop();
        assert_eq!(rx.try_recv(), Ok(ToneEvent::Stop));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn event_loop_times_out_runaway_tone() {
        let (tx, rx) = unbounded();
        let mut tone = ToneGenerator::new(Some(tx));
        let weak = tone.handle().downgrade();

        let sink = thread::spawn(move || {
            let mut events = Vec::new();
            tone_event_loop(rx, weak, Duration::from_millis(20), |e| events.push(e));
            events
        });

        tone.set_divider(1000);
        tone.start();
        thread::sleep(Duration::from_millis(200));
        assert!(!tone.is_playing());

        drop(tone);
        let events = sink.join().unwrap();
        assert_eq!(events, vec![ToneEvent::Start { frequency: 1000.0 }, ToneEvent::Stop]);
    }
}
