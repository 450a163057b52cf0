// crates/isobus-rs/tests/simulator/mod.rs
//
// Shared test harness: an in-memory CAN driver plus helpers for fabricating
// bus traffic and driving a manager's address claim to completion.
#![allow(dead_code)]

use isobus_rs::{CanDriver, CanFrame, CanNetworkManager, IsobusError, Name};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A simulated CAN driver that records every transmitted frame in memory.
///
/// Cloning shares the underlying buffers, so tests keep a clone for
/// inspection while the manager owns the original.
#[derive(Clone, Default)]
pub struct MockCanDriver {
    frames: Arc<Mutex<Vec<CanFrame>>>,
    refuse_sends: Arc<AtomicBool>,
}

impl MockCanDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracts all frames transmitted so far.
    pub fn sent_frames(&self) -> Vec<CanFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn clear(&self) {
        self.frames.lock().unwrap().clear();
    }

    /// Makes every subsequent send fail, simulating a saturated controller.
    #[allow(dead_code)]
    pub fn refuse_sends(&self, refuse: bool) {
        self.refuse_sends.store(refuse, Ordering::SeqCst);
    }
}

impl CanDriver for MockCanDriver {
    fn send_frame(&mut self, frame: &CanFrame) -> Result<(), IsobusError> {
        if self.refuse_sends.load(Ordering::SeqCst) {
            return Err(IsobusError::HardwareSendFailed);
        }
        self.frames.lock().unwrap().push(*frame);
        Ok(())
    }
}

/// Builds an address-claim frame from `source` on `channel` for a raw NAME.
pub fn claim_frame(channel: u8, source: u8, name: u64) -> CanFrame {
    named_claim_frame(channel, source, Name::from_raw(name))
}

/// Builds an address-claim frame for a structured NAME.
pub fn named_claim_frame(channel: u8, source: u8, name: Name) -> CanFrame {
    CanFrame::new(channel, 0x18EE_FF00 | u32::from(source), &name.to_le_bytes())
}

/// Builds a broadcast request-for-address-claim, sent from the null address
/// the way an address-less device asks who is out there.
pub fn request_for_claim_frame(channel: u8) -> CanFrame {
    CanFrame::new(channel, 0x18EA_FFFE, &[0x00, 0xEE, 0x00])
}

/// Ticks the manager every 10 ms until the injected clock passes `duration`,
/// returning the timestamp after the last tick. Long enough (with the
/// default 1.2 s) for any internal control function to finish claiming.
pub fn run_updates(
    manager: &CanNetworkManager<MockCanDriver>,
    start: u64,
    duration: u64,
) -> u64 {
    let mut now = start;
    while now < start + duration {
        manager.update(now);
        now += 10;
    }
    manager.update(now);
    now
}

pub fn init_logger() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Debug)
        .is_test(true)
        .try_init();
}
