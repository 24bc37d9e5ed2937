/*!
    Process data mapping for EtherCAT masters speaking CoE (CANopen over EtherCAT).

    This crate sits between an EtherCAT backend exchanging raw process images with the slaves, and an application wanting named, typed values. It provides

    - the CoE type model ([types]) and dynamic values ([value])
    - bit-precise translation between values and their binary forms ([translate])
    - double-buffered PDO entries synchronized with the process images ([mapping])
    - an orchestrated bus cycle firing events at well defined points ([master], [event])
    - SDO access to the slaves dictionaries and PDO mapping configuration ([sdo], [slave])

    The hardware side is abstracted by the [backend::Backend] trait, an in-memory [backend::SimulatedBackend] is provided for tests and dry runs.

    ## Example

    ```ignore
    let master = Master::new(&description, backend, MasterConfig::default())?;
    let position = master.slave("drive")?
        .get_pdo(PdoDirection::Input, "inputs")?
        .reference::<i32>("position")?;
    master.cycle(timeout)?;
    println!("position {}", position.get()?);
    ```
*/

pub mod data;
pub mod types;
pub mod value;
pub mod translate;
pub mod mapping;
pub mod event;
pub mod registers;
pub mod config;
pub mod backend;
pub mod sdo;
pub mod slave;
pub mod master;
pub mod error;

pub use crate::data::{PduData, BitField, PackingError, PackingResult};
pub use crate::types::{Type, TypeLibrary};
pub use crate::value::Value;
pub use crate::translate::{CodecRegistry, Translator, TranslationConfig};
pub use crate::mapping::{Pdo, Entry, Reference, ValueReference, PdoDirection};
pub use crate::event::{MasterEvent, SlaveEvent};
pub use crate::config::{BusDescription, MasterConfig};
pub use crate::registers::{AlState, MasterState};
pub use crate::sdo::{Sdo, ValueSdo, SdoPart};
pub use crate::slave::Slave;
pub use crate::master::{Master, BusThread};
pub use crate::error::{EthercatError, EthercatResult};
