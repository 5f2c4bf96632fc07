// Recording I2C bus and delay for tests
//
// Clones share state, so a test keeps one handle while the driver owns the other.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Transfer {
    pub address: u8,
    pub written: Vec<u8>,
    pub read: usize,
}

#[derive(Debug)]
struct BusState {
    memory: [u8; 256],
    scripted: HashMap<u8, VecDeque<u8>>,
    transfers: Vec<Transfer>,
    fail: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeI2c {
    state: Rc<RefCell<BusState>>,
}

impl FakeI2c {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(BusState {
                memory: [0; 256],
                scripted: HashMap::new(),
                transfers: Vec::new(),
                fail: false,
            })),
        }
    }

    pub fn set_memory(&self, register: u8, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        for (i, &b) in bytes.iter().enumerate() {
            state.memory[register.wrapping_add(i as u8) as usize] = b;
        }
    }

    /// Successive reads of `register` return these bytes, then fall back to memory
    pub fn script(&self, register: u8, bytes: &[u8]) {
        self.state
            .borrow_mut()
            .scripted
            .entry(register)
            .or_default()
            .extend(bytes.iter().copied());
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.state.borrow_mut().fail = fail;
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.state.borrow().transfers.clone()
    }

    /// Payloads of write-only transfers
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.transfers()
            .into_iter()
            .filter(|t| t.read == 0)
            .map(|t| t.written)
            .collect()
    }

    /// Register addresses of read transfers
    pub fn reads(&self) -> Vec<u8> {
        self.transfers()
            .into_iter()
            .filter(|t| t.read > 0)
            .map(|t| t.written[0])
            .collect()
    }
}

impl ErrorType for FakeI2c {
    type Error = ErrorKind;
}

impl I2c for FakeI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if state.fail {
            return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }

        let mut transfer = Transfer {
            address,
            written: Vec::new(),
            read: 0,
        };
        let mut pointer = 0u8;

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    transfer.written.extend_from_slice(bytes);
                    if let Some((&reg, data)) = bytes.split_first() {
                        pointer = reg;
                        for (i, &b) in data.iter().enumerate() {
                            state.memory[reg.wrapping_add(i as u8) as usize] = b;
                        }
                    }
                }
                Operation::Read(buf) => {
                    transfer.read += buf.len();
                    for (i, b) in buf.iter_mut().enumerate() {
                        let addr = pointer.wrapping_add(i as u8);
                        let scripted = state
                            .scripted
                            .get_mut(&addr)
                            .and_then(VecDeque::pop_front);
                        *b = scripted.unwrap_or(state.memory[addr as usize]);
                    }
                }
            }
        }

        state.transfers.push(transfer);
        Ok(())
    }
}

/// Delay that records instead of sleeping
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeDelay {
    pauses: Rc<RefCell<Vec<Duration>>>,
}

impl FakeDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.borrow().clone()
    }
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.pauses.borrow_mut().push(Duration::from_nanos(ns.into()));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.pauses.borrow_mut().push(Duration::from_millis(ms.into()));
    }
}
