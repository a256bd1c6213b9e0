//! Memory living on its own thread, reached through a request/response channel.
//!
//! Both directions use zero-capacity channels, so a request is handed over only
//! when the controller is ready to take it, and the processor then blocks
//! until the answer comes back. Writes are acknowledged too, which means there
//! is never more than one request in flight.

use std::thread::JoinHandle;

use crossbeam_channel as cbc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::{Address, Word};

use super::bus::{Bus, BusError};
use super::memory::{Memory, MemoryError};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("could not start the memory controller")]
    Spawn(#[source] std::io::Error),

    #[error("the memory controller is not answering")]
    Disconnected,

    #[error("the memory controller panicked")]
    Panicked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Request {
    Read(Address),
    Write(Address, Word),
    Halt,
}

/// Reads answer with the word read, writes with the word written
type Response = Result<Word, MemoryError>;

/// Processor end of the channel
#[derive(Debug)]
pub struct ChannelBus {
    requests: cbc::Sender<Request>,
    responses: cbc::Receiver<Response>,
    halted: bool,
}

/// Handle on the thread owning the memory
#[derive(Debug)]
pub struct MemoryController {
    handle: JoinHandle<Memory>,
}

impl MemoryController {
    /// Move the memory to its own thread and connect a bus to it
    ///
    /// # Errors
    ///
    /// Fails if the thread could not be spawned
    pub fn spawn(memory: Memory) -> Result<(ChannelBus, MemoryController), ChannelError> {
        let (request_tx, request_rx) = cbc::bounded(0);
        let (response_tx, response_rx) = cbc::bounded(0);

        let handle = std::thread::Builder::new()
            .name("memory".to_string())
            .spawn(move || serve(memory, &request_rx, &response_tx))
            .map_err(ChannelError::Spawn)?;

        let bus = ChannelBus {
            requests: request_tx,
            responses: response_rx,
            halted: false,
        };

        Ok((bus, MemoryController { handle }))
    }

    /// Wait for the controller to stop and get the memory back
    ///
    /// The controller stops when the bus sends a halt or is dropped.
    ///
    /// # Errors
    ///
    /// Fails if the controller thread panicked
    pub fn join(self) -> Result<Memory, ChannelError> {
        self.handle.join().map_err(|_| ChannelError::Panicked)
    }
}

#[tracing::instrument(skip_all)]
fn serve(
    mut memory: Memory,
    requests: &cbc::Receiver<Request>,
    responses: &cbc::Sender<Response>,
) -> Memory {
    debug!("Memory controller started");

    // Stops on a halt request, or when the processor end hangs up
    for request in requests {
        let response = match request {
            Request::Read(address) => memory.get(address),
            Request::Write(address, value) => memory.set(address, value).map(|()| value),
            Request::Halt => {
                debug!("Halt requested");
                break;
            }
        };

        if let Err(e) = &response {
            warn!(error = %e, "Rejected memory request");
        }

        if responses.send(response).is_err() {
            break;
        }
    }

    debug!("Memory controller stopped");
    memory
}

impl ChannelBus {
    fn request(&mut self, request: Request) -> Result<Word, BusError> {
        self.requests
            .send(request)
            .map_err(|_| ChannelError::Disconnected)?;
        let response = self
            .responses
            .recv()
            .map_err(|_| ChannelError::Disconnected)?;
        Ok(response?)
    }
}

impl Bus for ChannelBus {
    fn read(&mut self, address: Address) -> Result<Word, BusError> {
        self.request(Request::Read(address))
    }

    fn write(&mut self, address: Address, value: Word) -> Result<(), BusError> {
        self.request(Request::Write(address, value)).map(|_| ())
    }

    fn halt(&mut self) -> Result<(), BusError> {
        if self.halted {
            return Ok(());
        }

        self.requests
            .send(Request::Halt)
            .map_err(|_| ChannelError::Disconnected)?;
        self.halted = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_test() {
        let (mut bus, controller) = MemoryController::spawn(Memory::default()).unwrap();

        bus.write(10, 42).unwrap();
        bus.write(1999, -3).unwrap();
        assert_eq!(bus.read(10).unwrap(), 42);
        assert!(matches!(
            bus.read(2000),
            Err(BusError::Memory(MemoryError::OutOfBounds { address: 2000 }))
        ));
        // The controller keeps serving after a rejected request
        assert_eq!(bus.read(1999).unwrap(), -3);

        bus.halt().unwrap();
        bus.halt().unwrap();

        let memory = controller.join().unwrap();
        assert_eq!(memory.get(10), Ok(42));
        assert_eq!(memory.get(1999), Ok(-3));
    }

    #[test]
    fn requests_after_halt_test() {
        let (mut bus, controller) = MemoryController::spawn(Memory::default()).unwrap();
        bus.halt().unwrap();
        let memory = controller.join().unwrap();
        assert_eq!(memory, Memory::default());

        assert!(matches!(
            bus.read(0),
            Err(BusError::Channel(ChannelError::Disconnected))
        ));
    }

    #[test]
    fn dropped_bus_stops_controller_test() {
        let (mut bus, controller) = MemoryController::spawn(Memory::default()).unwrap();
        bus.write(5, 5).unwrap();
        drop(bus);
        let memory = controller.join().unwrap();
        assert_eq!(memory.get(5), Ok(5));
    }
}
