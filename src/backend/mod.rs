/*!
    This module provide the trait [Backend], which is the hardware collaborator of the master: everything actually reaching the bus goes through it.

    The library does not build frames nor address datagrams, a backend is expected to do it with the means it has (a network card driver, an other EtherCAT stack, a fieldbus card ...). It receives and sends whole process images and performs SDO transfers.

    | backend | purpose |
    |---------|---------|
    | [SimulatedBackend] | in-memory bus and object dictionaries, for tests and demos |
*/

mod simulated;

pub use simulated::{SimulatedBackend, SimulatedError, SdoTransfer};

use crate::{
    registers::AlState,
    error::EthercatResult,
    };
use core::time::Duration;


/**
    trait implementing the exchanges with an ethercat segment

    Errors returned by implementors are propagated to the user as is, the master does not retry nor reinterpret them. Implementors are typically reporting them as [crate::EthercatError::Backend], [crate::EthercatError::Io] or [crate::EthercatError::Timeout].

    All methods may be called concurrently from the bus thread and from user threads (for SDOs), so the implementor is responsible for its own synchronization.
*/
pub trait Backend: Send + Sync {
    /**
        receive the input process image into the given buffer

        The buffer has the size of the input image, the whole buffer is expected to be overwritten.
    */
    fn read_bus(&self, inputs: &mut [u8], timeout: Duration) -> EthercatResult;
    /// send the given output process image to the slaves
    fn write_bus(&self, outputs: &[u8], timeout: Duration) -> EthercatResult;

    /// current state of the segment, as the lowest state of its slaves
    fn get_state(&self, timeout: Duration) -> EthercatResult<AlState>;
    /// request every slave to switch to the given state, and return once they did
    fn set_state(&self, state: AlState, timeout: Duration) -> EthercatResult;
    /// current state of the slave at the given fixed address
    fn get_slave_state(&self, slave: u16, timeout: Duration) -> EthercatResult<AlState>;
    /// request one slave to switch to the given state, and return once it did
    fn set_slave_state(&self, slave: u16, state: AlState, timeout: Duration) -> EthercatResult;

    /**
        write an object in a slave's dictionary

        When `complete` is set, the whole object is written starting at subindex `sub` (complete access), else only the given subitem.
    */
    fn download_sdo(&self, slave: u16, index: u16, sub: u8, data: &[u8], timeout: Duration, complete: bool) -> EthercatResult;
    /**
        read an object from a slave's dictionary into the given buffer, returning the number of bytes received

        When `complete` is set, the whole object is read starting at subindex `sub` (complete access), else only the given subitem.
    */
    fn upload_sdo(&self, slave: u16, index: u16, sub: u8, data: &mut [u8], timeout: Duration, complete: bool) -> EthercatResult<usize>;
}
