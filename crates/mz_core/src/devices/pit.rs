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

    devices::pit.rs

    Implements the Intel 8253 Programmable Interval Timer as used by the MZ-80K.

    The monitor only ever uses the timer in fixed modes, so control words are
    ignored and each counter is modelled for the one job it does:

    Counter 0 (E004) is a square wave generator (mode 3) driving the speaker.
    It is clocked at 1MHz, so the tone frequency is 1MHz / count.

    Counter 1 (E005) divides the clock down to 1 second pulses for counter 2.
    We don't need it; counter 2 is driven by host time instead.

    Counter 2 (E006) counts down whole seconds (mode 0). At terminal count it
    interrupts the Z80, which the monitor uses to flip its AM/PM flag. BASIC
    uses it for TI$.

    E008 is not part of the 8253 but sits next to it. Writing 1 gates the
    speaker on, writing 0 gates it off. The monitor times note durations by
    polling it, so each read stalls for a fixed period.
*/

use std::time::Duration;

use crate::{
    bus::{IoDevice, NO_IO_BYTE},
    clock::HostClock,
    coreconfig::CoreConfig,
    interrupt::{InterruptLine, PIT_INTERRUPT_DATA},
    sound::{ToneGenerator, ToneHandle},
};

pub const PIT_CHANNEL_0_DATA_PORT: u16 = 0xE004;
pub const PIT_CHANNEL_1_DATA_PORT: u16 = 0xE005;
pub const PIT_CHANNEL_2_DATA_PORT: u16 = 0xE006;
pub const PIT_COMMAND_REGISTER: u16 = 0xE007;
pub const SOUND_ENABLE_PORT: u16 = 0xE008;

pub const SOUND_OFF: u8 = 0x00;
pub const SOUND_ON: u8 = 0x01;

/// A counter loaded and read as two bytes, low byte first.
#[derive(Copy, Clone, Debug, Default)]
struct Counter {
    value: u16,
    write_msb: bool,
    read_msb: bool,
}

impl Counter {
    /// Accept the next byte of a count. Returns the full count once the
    /// high byte has been written.
    fn load_byte(&mut self, byte: u8) -> Option<u16> {
        if self.write_msb {
            self.value |= (byte as u16) << 8;
            self.write_msb = false;
            Some(self.value)
        }
        else {
            self.value = byte as u16;
            self.write_msb = true;
            None
        }
    }

    fn read_byte(&mut self) -> u8 {
        let byte = if self.read_msb {
            (self.value >> 8) as u8
        }
        else {
            self.value as u8
        };
        self.read_msb = !self.read_msb;
        byte
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct Countdown {
    counter: Counter,
    start: u16,
    reference: Duration,
    armed: bool,
}

pub struct ProgrammableIntervalTimer {
    tone_counter: Counter,
    countdown: Countdown,
    tone: ToneGenerator,
    clock: Box<dyn HostClock>,
    sound_delay: Duration,
    sound_reads: u8,
}

pub type Pit = ProgrammableIntervalTimer;

impl IoDevice for ProgrammableIntervalTimer {
    fn read_u8(&mut self, port: u16, irq: &mut InterruptLine) -> u8 {
        match port {
            PIT_CHANNEL_0_DATA_PORT => self.tone_counter.read_byte(),
            PIT_CHANNEL_2_DATA_PORT => self.countdown_read(irq),
            SOUND_ENABLE_PORT => self.sound_enable_read(),
            _ => {
                log::trace!("Read from unused PIT port {:04X}", port);
                NO_IO_BYTE
            }
        }
    }

    fn write_u8(&mut self, port: u16, data: u8) {
        match port {
            PIT_CHANNEL_0_DATA_PORT => {
                if let Some(count) = self.tone_counter.load_byte(data) {
                    self.tone.set_divider(count);
                }
            }
            PIT_CHANNEL_2_DATA_PORT => self.countdown_write(data),
            SOUND_ENABLE_PORT => self.sound_enable_write(data),
            _ => {
                log::trace!("Write to unused PIT port {:04X} ignored: {:02X}", port, data);
            }
        }
    }

    fn port_list(&self) -> Vec<(String, u16)> {
        vec![
            (String::from("PIT Counter 0 (Tone)"), PIT_CHANNEL_0_DATA_PORT),
            (String::from("PIT Counter 1"), PIT_CHANNEL_1_DATA_PORT),
            (String::from("PIT Counter 2 (Clock)"), PIT_CHANNEL_2_DATA_PORT),
            (String::from("PIT Control Word"), PIT_COMMAND_REGISTER),
            (String::from("Sound Enable"), SOUND_ENABLE_PORT),
        ]
    }
}

impl ProgrammableIntervalTimer {
    pub fn new(config: &CoreConfig, clock: Box<dyn HostClock>, tone: ToneGenerator) -> Self {
        Self {
            tone_counter: Counter::default(),
            countdown: Countdown::default(),
            tone,
            clock,
            sound_delay: config.sound_register_delay(),
            sound_reads: 0,
        }
    }

    fn countdown_write(&mut self, data: u8) {
        let countdown = &mut self.countdown;
        if !countdown.counter.write_msb {
            // Loading a new count restarts the clock.
            countdown.reference = self.clock.now();
            countdown.armed = true;
        }
        if let Some(start) = countdown.counter.load_byte(data) {
            countdown.start = start;
            log::debug!("PIT countdown loaded with {} seconds", start);
        }
    }

    /// Read the remaining seconds. The remaining count is recomputed only on
    /// the low byte read so the two halves always belong to the same value.
    /// Once the count is down to 1 every read returns 0, and the first such
    /// read interrupts the CPU.
    fn countdown_read(&mut self, irq: &mut InterruptLine) -> u8 {
        let countdown = &mut self.countdown;

        if countdown.counter.value <= 1 {
            if countdown.armed {
                countdown.armed = false;
                log::debug!("PIT countdown expired");
                irq.raise(PIT_INTERRUPT_DATA);
            }
            countdown.counter.read_msb = !countdown.counter.read_msb;
            return 0x00;
        }

        if !countdown.counter.read_msb {
            let elapsed = self.clock.now().saturating_sub(countdown.reference).as_secs();
            countdown.counter.value = (countdown.start as u64).saturating_sub(elapsed) as u16;
        }
        countdown.counter.read_byte()
    }

    fn sound_enable_write(&mut self, data: u8) {
        match data {
            SOUND_OFF => self.tone.stop(),
            SOUND_ON => self.tone.start(),
            _ => {
                log::warn!("Invalid sound enable value: {:02X}", data);
            }
        }
    }

    fn sound_enable_read(&mut self) -> u8 {
        self.clock.sleep(self.sound_delay);
        self.sound_reads = self.sound_reads.wrapping_add(1);
        self.sound_reads
    }

    #[inline]
    pub fn tone(&self) -> &ToneGenerator {
        &self.tone
    }

    pub fn tone_handle(&self) -> ToneHandle {
        self.tone.handle()
    }

    #[inline]
    pub fn countdown_armed(&self) -> bool {
        self.countdown.armed
    }

    pub fn set_sound_delay(&mut self, delay: Duration) {
        self.sound_delay = delay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crossbeam_channel::unbounded;

    fn pit(clock: &ManualClock) -> Pit {
        Pit::new(&CoreConfig::default(), Box::new(clock.clone()), ToneGenerator::silent())
    }

    fn write_word(pit: &mut Pit, port: u16, value: u16) {
        pit.write_u8(port, value as u8);
        pit.write_u8(port, (value >> 8) as u8);
    }

    fn read_word(pit: &mut Pit, port: u16, irq: &mut InterruptLine) -> u16 {
        let lo = pit.read_u8(port, irq) as u16;
        let hi = pit.read_u8(port, irq) as u16;
        hi << 8 | lo
    }

    #[test]
    fn tone_counter_round_trip() {
        let clock = ManualClock::new();
        let mut pit = pit(&clock);
        let mut irq = InterruptLine::new();
        for value in [0x0000, 0x0001, 0x00FF, 0x1234, 0xFFFF] {
            write_word(&mut pit, PIT_CHANNEL_0_DATA_PORT, value);
            assert_eq!(read_word(&mut pit, PIT_CHANNEL_0_DATA_PORT, &mut irq), value);
        }
    }

    #[test]
    fn tone_frequency_from_divider() {
        let clock = ManualClock::new();
        let mut pit = pit(&clock);
        write_word(&mut pit, PIT_CHANNEL_0_DATA_PORT, 1000);
        assert_eq!(pit.tone().frequency(), 1000.0);
        write_word(&mut pit, PIT_CHANNEL_0_DATA_PORT, 4000);
        assert_eq!(pit.tone().frequency(), 250.0);
    }

    #[test]
    fn countdown_round_trip_before_time_passes() {
        let clock = ManualClock::new();
        let mut pit = pit(&clock);
        let mut irq = InterruptLine::new();
        for value in [2, 0x1234, 43200, 0xFFFF] {
            write_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, value);
            assert_eq!(read_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, &mut irq), value);
        }
        assert!(!irq.is_pending());
    }

    #[test]
    fn countdown_counts_whole_seconds() {
        let clock = ManualClock::new();
        let mut pit = pit(&clock);
        let mut irq = InterruptLine::new();
        write_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, 300);
        clock.advance(Duration::from_millis(2999));
        assert_eq!(read_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, &mut irq), 298);
        clock.advance_secs(1);
        assert_eq!(read_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, &mut irq), 297);
    }

    #[test]
    fn high_byte_is_not_recomputed() {
        let clock = ManualClock::new();
        let mut pit = pit(&clock);
        let mut irq = InterruptLine::new();
        write_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, 0x0100);

        assert_eq!(pit.read_u8(PIT_CHANNEL_2_DATA_PORT, &mut irq), 0x00);
        clock.advance_secs(1);
        // Still the high byte of 0x0100 even though 0x00FF is now current.
        assert_eq!(pit.read_u8(PIT_CHANNEL_2_DATA_PORT, &mut irq), 0x01);
        assert_eq!(read_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, &mut irq), 0x00FF);
    }

    #[test]
    fn countdown_interrupts_exactly_once() {
        let clock = ManualClock::new();
        let mut pit = pit(&clock);
        let mut irq = InterruptLine::new();
        write_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, 5);

        clock.advance_secs(3);
        assert_eq!(read_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, &mut irq), 2);
        assert!(!irq.is_pending());

        // The low byte read sees 1 second left, the high byte read fires.
        clock.advance_secs(1);
        assert_eq!(pit.read_u8(PIT_CHANNEL_2_DATA_PORT, &mut irq), 1);
        assert!(!irq.is_pending());
        assert_eq!(pit.read_u8(PIT_CHANNEL_2_DATA_PORT, &mut irq), 0);
        assert!(irq.is_pending());

        for _ in 0..10 {
            assert_eq!(read_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, &mut irq), 0);
            clock.advance_secs(7);
        }
        assert_eq!(irq.take(), Some(PIT_INTERRUPT_DATA));
        assert_eq!(irq.raised_count(), 1);
        assert!(!pit.countdown_armed());
    }

    #[test]
    fn overdue_countdown_still_interrupts() {
        let clock = ManualClock::new();
        let mut pit = pit(&clock);
        let mut irq = InterruptLine::new();
        write_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, 10);
        clock.advance_secs(60);

        assert_eq!(read_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, &mut irq), 0);
        assert_eq!(read_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, &mut irq), 0);
        assert_eq!(irq.raised_count(), 1);
    }

    #[test]
    fn reloading_rearms_countdown() {
        let clock = ManualClock::new();
        let mut pit = pit(&clock);
        let mut irq = InterruptLine::new();
        write_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, 2);
        clock.advance_secs(5);
        read_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, &mut irq);
        read_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, &mut irq);
        assert_eq!(irq.take(), Some(PIT_INTERRUPT_DATA));

        write_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, 3);
        assert!(pit.countdown_armed());
        assert_eq!(read_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, &mut irq), 3);
        clock.advance_secs(3);
        read_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, &mut irq);
        read_word(&mut pit, PIT_CHANNEL_2_DATA_PORT, &mut irq);
        assert_eq!(irq.raised_count(), 2);
    }

    #[test]
    fn sound_register_stalls_and_counts() {
        let clock = ManualClock::new();
        let mut pit = pit(&clock);
        let mut irq = InterruptLine::new();
        assert_eq!(pit.read_u8(SOUND_ENABLE_PORT, &mut irq), 1);
        assert_eq!(pit.read_u8(SOUND_ENABLE_PORT, &mut irq), 2);
        assert_eq!(clock.now(), Duration::from_millis(32));

        for _ in 0..254 {
            pit.read_u8(SOUND_ENABLE_PORT, &mut irq);
        }
        assert_eq!(pit.read_u8(SOUND_ENABLE_PORT, &mut irq), 1);
    }

    #[test]
    fn sound_enable_gates_tone() {
        let clock = ManualClock::new();
        let (tx, rx) = unbounded();
        let mut pit = Pit::new(&CoreConfig::default(), Box::new(clock.clone()), ToneGenerator::new(Some(tx)));

        write_word(&mut pit, PIT_CHANNEL_0_DATA_PORT, 2000);
        pit.write_u8(SOUND_ENABLE_PORT, SOUND_ON);
        assert!(pit.tone().is_playing());
        pit.write_u8(SOUND_ENABLE_PORT, 0x02);
        assert!(pit.tone().is_playing());
        pit.write_u8(SOUND_ENABLE_PORT, SOUND_OFF);
        pit.write_u8(SOUND_ENABLE_PORT, SOUND_OFF);
        assert!(!pit.tone().is_playing());

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn unused_ports_read_sentinel() {
        let clock = ManualClock::new();
        let mut pit = pit(&clock);
        let mut irq = InterruptLine::new();
        pit.write_u8(PIT_COMMAND_REGISTER, 0x36);
        pit.write_u8(PIT_CHANNEL_1_DATA_PORT, 0x10);
        assert_eq!(pit.read_u8(PIT_COMMAND_REGISTER, &mut irq), NO_IO_BYTE);
        assert_eq!(pit.read_u8(PIT_CHANNEL_1_DATA_PORT, &mut irq), NO_IO_BYTE);
    }
}
