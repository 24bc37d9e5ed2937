/*!
    in-memory implementation of [Backend], standing for a whole segment.

    Slaves are only simulated by their object dictionaries and states, the process images are stored as they are exchanged: the test code plays the role of the slaves by setting the inputs and looking at the outputs.
*/

use super::Backend;
use crate::{
    registers::AlState,
    error::{EthercatError, EthercatResult},
    };
use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Mutex, MutexGuard},
    };
use core::{fmt, time::Duration};


/// errors raised by the simulated slaves
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SimulatedError {
    /// the requested object does not exist in the slave's dictionary
    NoObject {slave: u16, index: u16, sub: u8},
    /// the object is bigger than the buffer given to receive it
    BufferTooSmall {size: usize, needed: usize},
    /// the requested slave is not on the segment
    NoSlave(u16),
}
impl fmt::Display for SimulatedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoObject {slave, index, sub} => write!(f, "slave {} has no object {:#06x}:{}", slave, index, sub),
            Self::BufferTooSmall {size, needed} => write!(f, "buffer of {} bytes cannot receive {} bytes", size, needed),
            Self::NoSlave(slave) => write!(f, "no slave at address {}", slave),
        }
    }
}
impl std::error::Error for SimulatedError {}

/// record of one SDO download received by the simulated slaves
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SdoTransfer {
    pub slave: u16,
    pub index: u16,
    pub sub: u8,
    pub data: Vec<u8>,
    pub complete: bool,
}

#[derive(Default)]
struct Bus {
    /// input image the slaves will send on next read
    inputs: Vec<u8>,
    /// last output image received
    outputs: Vec<u8>,
    /// slaves on the segment with their current state
    slaves: BTreeMap<u16, AlState>,
    objects: BTreeMap<(u16, u16, u8), Vec<u8>>,
    downloads: Vec<SdoTransfer>,
    read_faults: VecDeque<EthercatError>,
    write_faults: VecDeque<EthercatError>,
    reads: usize,
    writes: usize,
}

/**
    simulated segment of slaves

    ```
    use std::time::Duration;
    use ecmap::{backend::{Backend, SimulatedBackend}, registers::AlState};

    let backend = SimulatedBackend::new([1001, 1002]);
    backend.set_inputs(&[0x12, 0x34]);
    let mut inputs = [0; 2];
    backend.read_bus(&mut inputs, Duration::from_millis(1)).unwrap();
    assert_eq!(inputs, [0x12, 0x34]);

    backend.set_state(AlState::PreOperational, Duration::from_millis(1)).unwrap();
    assert_eq!(backend.get_slave_state(1002, Duration::from_millis(1)).unwrap(), AlState::PreOperational);
    ```
*/
pub struct SimulatedBackend {
    bus: Mutex<Bus>,
}
impl SimulatedBackend {
    /// segment with slaves at the given fixed addresses, all in [AlState::Init]
    pub fn new(slaves: impl IntoIterator<Item=u16>) -> Self {
        Self {bus: Mutex::new(Bus {
            slaves: slaves.into_iter().map(|address|  (address, AlState::Init)).collect(),
            .. Default::default()
            })}
    }
    fn bus(&self) -> MutexGuard<'_, Bus> {
        self.bus.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// set the input image the slaves will send on the next reads
    pub fn set_inputs(&self, inputs: &[u8]) {
        let mut bus = self.bus();
        bus.inputs.clear();
        bus.inputs.extend_from_slice(inputs);
    }
    /// last output image received by the slaves
    pub fn outputs(&self) -> Vec<u8> {
        self.bus().outputs.clone()
    }
    /// set an object in a slave's dictionary
    pub fn insert_object(&self, slave: u16, index: u16, sub: u8, data: &[u8]) {
        self.bus().objects.insert((slave, index, sub), data.to_vec());
    }
    /// content of an object in a slave's dictionary
    pub fn object(&self, slave: u16, index: u16, sub: u8) -> Option<Vec<u8>> {
        self.bus().objects.get(&(slave, index, sub)).cloned()
    }
    /// SDO downloads received so far, in order
    pub fn downloads(&self) -> Vec<SdoTransfer> {
        self.bus().downloads.clone()
    }
    /// make a future read fail with the given error, faults are consumed in the order they are given
    pub fn fail_next_read(&self, error: EthercatError) {
        self.bus().read_faults.push_back(error);
    }
    /// make a future write fail with the given error, faults are consumed in the order they are given
    pub fn fail_next_write(&self, error: EthercatError) {
        self.bus().write_faults.push_back(error);
    }
    /// number of successful reads
    pub fn reads(&self) -> usize  {self.bus().reads}
    /// number of successful writes
    pub fn writes(&self) -> usize  {self.bus().writes}
}
impl Default for SimulatedBackend {
    fn default() -> Self  {Self::new([])}
}

impl Backend for SimulatedBackend {
    fn read_bus(&self, inputs: &mut [u8], _timeout: Duration) -> EthercatResult {
        let mut bus = self.bus();
        if let Some(error) = bus.read_faults.pop_front()
            {return Err(error)}
        if bus.inputs.len() != inputs.len() {
            if !bus.inputs.is_empty() {
                log::warn!("simulated input image has {} bytes, but {} are read", bus.inputs.len(), inputs.len());
            }
            bus.inputs.resize(inputs.len(), 0);
        }
        inputs.copy_from_slice(&bus.inputs);
        bus.reads += 1;
        Ok(())
    }
    fn write_bus(&self, outputs: &[u8], _timeout: Duration) -> EthercatResult {
        let mut bus = self.bus();
        if let Some(error) = bus.write_faults.pop_front()
            {return Err(error)}
        bus.outputs.clear();
        bus.outputs.extend_from_slice(outputs);
        bus.writes += 1;
        Ok(())
    }

    fn get_state(&self, _timeout: Duration) -> EthercatResult<AlState> {
        // the segment is as far as its latest slave
        let bus = self.bus();
        Ok(bus.slaves.values()
            .copied()
            .min_by_key(|state|  match state {
                AlState::Bootstrap => 0,
                state => state.code(),
                })
            .unwrap_or(AlState::Init))
    }
    fn set_state(&self, state: AlState, _timeout: Duration) -> EthercatResult {
        for slave in self.bus().slaves.values_mut() {
            *slave = state;
        }
        Ok(())
    }
    fn get_slave_state(&self, slave: u16, _timeout: Duration) -> EthercatResult<AlState> {
        self.bus().slaves.get(&slave)
            .copied()
            .ok_or_else(|| EthercatError::backend(SimulatedError::NoSlave(slave)))
    }
    fn set_slave_state(&self, slave: u16, state: AlState, _timeout: Duration) -> EthercatResult {
        let mut bus = self.bus();
        let current = bus.slaves.get_mut(&slave)
            .ok_or_else(|| EthercatError::backend(SimulatedError::NoSlave(slave)))?;
        *current = state;
        Ok(())
    }

    fn download_sdo(&self, slave: u16, index: u16, sub: u8, data: &[u8], _timeout: Duration, complete: bool) -> EthercatResult {
        let mut bus = self.bus();
        if !bus.slaves.contains_key(&slave)
            {return Err(EthercatError::backend(SimulatedError::NoSlave(slave)))}
        log::trace!("simulated download {:#06x}:{} on slave {}: {:02x?}", index, sub, slave, data);
        bus.objects.insert((slave, index, sub), data.to_vec());
        bus.downloads.push(SdoTransfer {slave, index, sub, data: data.to_vec(), complete});
        Ok(())
    }
    fn upload_sdo(&self, slave: u16, index: u16, sub: u8, data: &mut [u8], _timeout: Duration, _complete: bool) -> EthercatResult<usize> {
        let bus = self.bus();
        if !bus.slaves.contains_key(&slave)
            {return Err(EthercatError::backend(SimulatedError::NoSlave(slave)))}
        let object = bus.objects.get(&(slave, index, sub))
            .ok_or_else(|| EthercatError::backend(SimulatedError::NoObject {slave, index, sub}))?;
        if object.len() > data.len()
            {return Err(EthercatError::backend(SimulatedError::BufferTooSmall {size: data.len(), needed: object.len()}))}
        data[.. object.len()].copy_from_slice(object);
        Ok(object.len())
    }
}



#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(1);

    #[test]
    fn images() {
        let backend = SimulatedBackend::new([1]);
        let mut inputs = [0xff; 3];
        // inputs never set are null
        backend.read_bus(&mut inputs, TIMEOUT).unwrap();
        assert_eq!(inputs, [0; 3]);
        backend.set_inputs(&[1, 2, 3]);
        backend.read_bus(&mut inputs, TIMEOUT).unwrap();
        assert_eq!(inputs, [1, 2, 3]);
        backend.write_bus(&[4, 5], TIMEOUT).unwrap();
        assert_eq!(backend.outputs(), [4, 5]);
        assert_eq!((backend.reads(), backend.writes()), (2, 1));
    }

    #[test]
    fn faults() {
        let backend = SimulatedBackend::new([1]);
        backend.fail_next_read(EthercatError::Timeout("simulated"));
        assert!(matches!(backend.read_bus(&mut [0; 1], TIMEOUT), Err(EthercatError::Timeout(_))));
        assert!(backend.read_bus(&mut [0; 1], TIMEOUT).is_ok());
        backend.fail_next_write(EthercatError::Master("simulated"));
        assert!(backend.write_bus(&[0], TIMEOUT).is_err());
        assert_eq!(backend.writes(), 0);
    }

    #[test]
    fn states() {
        let backend = SimulatedBackend::new([1, 2]);
        assert_eq!(backend.get_state(TIMEOUT).unwrap(), AlState::Init);
        backend.set_state(AlState::SafeOperational, TIMEOUT).unwrap();
        backend.set_slave_state(2, AlState::PreOperational, TIMEOUT).unwrap();
        assert_eq!(backend.get_state(TIMEOUT).unwrap(), AlState::PreOperational);
        assert_eq!(backend.get_slave_state(1, TIMEOUT).unwrap(), AlState::SafeOperational);
        backend.set_slave_state(1, AlState::Bootstrap, TIMEOUT).unwrap();
        assert_eq!(backend.get_state(TIMEOUT).unwrap(), AlState::Bootstrap);
        assert!(backend.get_slave_state(3, TIMEOUT).is_err());
    }

    #[test]
    fn objects() {
        let backend = SimulatedBackend::new([1]);
        backend.insert_object(1, 0x1008, 0, b"drive");
        let mut buffer = [0; 8];
        assert_eq!(backend.upload_sdo(1, 0x1008, 0, &mut buffer, TIMEOUT, false).unwrap(), 5);
        assert_eq!(&buffer[.. 5], b"drive");
        assert!(backend.upload_sdo(1, 0x1008, 0, &mut [0; 2], TIMEOUT, false).is_err());
        assert!(backend.upload_sdo(1, 0x1009, 0, &mut buffer, TIMEOUT, false).is_err());

        backend.download_sdo(1, 0x6060, 0, &[8], TIMEOUT, false).unwrap();
        assert_eq!(backend.object(1, 0x6060, 0), Some(vec![8]));
        assert_eq!(backend.downloads().len(), 1);
        assert!(backend.download_sdo(7, 0x6060, 0, &[8], TIMEOUT, false).is_err());
    }
}
