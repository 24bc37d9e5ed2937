use crate::{
    data::PduData,
    types::{Type, TypeLibrary},
    mapping::{Pdo, PdoDirection},
    event::{EventHandlers, SlaveEvent, Handler},
    sdo::{Sdo, ValueSdo, SdoPart, Access, WriteOnly, PdoEntry, ConfigurablePdo, SyncChannel},
    translate::CodecRegistry,
    config::{SlaveDescription, ProcessImageDescription},
    backend::Backend,
    registers::{self, AlState},
    error::{EthercatError, EthercatResult},
    };
use std::{
    collections::BTreeMap,
    sync::Arc,
    };
use core::{fmt, time::Duration};


/**
    This struct exposes the process data and objects of one slave of a [crate::Master].

    Slaves are built by the master from the bus description, they live as long as it does. Only the PDOs assigned to a sync manager are exchanged, thus are present here.

    ## Example

    The following is a typical use of a slave

    ```ignore
    let slave = master.slave("drive")?;
    // acyclic configuration
    slave.set_state(AlState::PreOperational, timeout)?;
    slave.sdo::<u8, ReadWrite>(0x6060, SdoPart::Sub(0)).download(8, timeout)?;
    slave.configure_mapping(timeout)?;
    // cyclic exchanges
    let status = slave.get_pdo(PdoDirection::Input, "status")?.reference::<u16>("word")?;
    slave.register_event_handler(SlaveEvent::InputsUpdate, move || {
        log::info!("status {:#x}", status.get().unwrap());
    });
    ```
*/
pub struct Slave {
    name: String,
    address: u16,
    inputs: Vec<Pdo>,
    outputs: Vec<Pdo>,
    handlers: EventHandlers<SlaveEvent>,
    backend: Arc<dyn Backend>,
    registry: Arc<CodecRegistry>,
}
impl Slave {
    /// resolve the PDOs of a slave description, PDOs not assigned to a sync manager are ignored
    pub(crate) fn new(
            description: &SlaveDescription,
            image: &ProcessImageDescription,
            library: &TypeLibrary,
            backend: Arc<dyn Backend>,
            registry: Arc<CodecRegistry>,
            ) -> EthercatResult<Self> {
        let mut inputs = Vec::<Pdo>::new();
        let mut outputs = Vec::<Pdo>::new();
        for pdo in &description.pdos {
            if pdo.sync_manager.is_none() {
                log::debug!("PDO {} of slave {} is not assigned, it will not be exchanged", pdo.name, description.name);
                continue
            }
            let pdos = match pdo.direction {
                PdoDirection::Input => &mut inputs,
                PdoDirection::Output => &mut outputs,
            };
            if pdos.iter().any(|other|  other.name() == pdo.name)
                {return Err(EthercatError::configuration(format!(
                    "PDO {} is duplicated in slave {}", pdo.name, description.name)))}
            pdos.push(Pdo::new(&description.name, pdo, image, library, &registry)?);
        }
        log::debug!("slave {} at {} has {} input and {} output PDOs",
            description.name, description.address, inputs.len(), outputs.len());
        Ok(Self {
            name: description.name.clone(),
            address: description.address,
            inputs,
            outputs,
            handlers: EventHandlers::new(),
            backend,
            registry,
        })
    }

    pub fn name(&self) -> &str  {&self.name}
    /// fixed address of the slave on the bus
    pub fn address(&self) -> u16  {self.address}

    /// PDOs exchanged in the given direction
    pub fn pdos(&self, direction: PdoDirection) -> &[Pdo] {
        match direction {
            PdoDirection::Input => &self.inputs,
            PdoDirection::Output => &self.outputs,
        }
    }
    /// find a PDO by name
    pub fn get_pdo(&self, direction: PdoDirection, name: &str) -> EthercatResult<&Pdo> {
        self.pdos(direction).iter()
            .find(|pdo|  pdo.name() == name)
            .ok_or_else(|| EthercatError::range("PDO", format!("{}.{}", self.name, name)))
    }

    /// handlers of this slave's events
    pub fn handlers(&self) -> &EventHandlers<SlaveEvent>  {&self.handlers}
    /// set the handler of an event, returning the former one
    pub fn register_event_handler<F>(&self, event: SlaveEvent, handler: F) -> Option<Handler>
    where F: FnMut() + Send + 'static
    {
        self.handlers.register(event, handler)
    }
    /// remove the handler of an event, returning it
    pub fn unregister_event_handler(&self, event: SlaveEvent) -> Option<Handler> {
        self.handlers.unregister(event)
    }

    /// current state of the slave
    pub fn get_state(&self, timeout: Duration) -> EthercatResult<AlState> {
        self.backend.get_slave_state(self.address, timeout)
    }
    /// request a state change of the slave, [AlState::Bootstrap] is allowed for slaves
    pub fn set_state(&self, state: AlState, timeout: Duration) -> EthercatResult {
        log::debug!("slave {} switching to {}", self.name, state);
        self.backend.set_slave_state(self.address, state, timeout)
    }

    /// statically typed access to an object of the slave's dictionary
    pub fn sdo<T: PduData, A: Access>(&self, index: u16, part: SdoPart) -> Sdo<T, A> {
        Sdo::new(self.backend.clone(), self.registry.clone(), self.address, index, part)
    }
    /**
        dynamically typed access to an object of the slave's dictionary

        `capacity` is the buffer size used to upload dynamically sized types, it is ignored for statically sized types.
    */
    pub fn value_sdo<A: Access>(&self, index: u16, part: SdoPart, ty: Type, capacity: usize) -> ValueSdo<A> {
        ValueSdo::new(self.backend.clone(), self.registry.translator(ty), self.address, index, part, capacity)
    }

    /**
        write the PDO mapping and sync manager assignment of this slave's PDOs to its dictionary

        For each PDO, its mapping object is cleared, its entries (including paddings) are written, then its entries count. Then for each sync manager, its assignment object is cleared, the PDOs indices are written, then the PDOs count.

        The slave is expected to be in [AlState::PreOperational], the mapping cannot be changed in later states.
    */
    pub fn configure_mapping(&self, timeout: Duration) -> EthercatResult {
        let mut channels = BTreeMap::<u8, Vec<u16>>::new();
        for pdo in self.outputs.iter().chain(self.inputs.iter()) {
            let config = ConfigurablePdo {index: pdo.index(), num: u8::MAX - 1};
            let count = self.sdo::<u8, WriteOnly>(config.index, config.len());
            let entries = &pdo.description().entries;
            let len = u8::try_from(entries.len())
                .map_err(|_| EthercatError::configuration(format!("too many entries in PDO {}", pdo.name())))?;

            count.download(0, timeout)?;
            for (i, entry) in entries.iter().enumerate() {
                let length = u8::try_from(entry.bitlen)
                    .map_err(|_| EthercatError::configuration(format!("entry {} is too big to be mapped", entry.name)))?;
                self.sdo::<PdoEntry, WriteOnly>(config.index, config.slot(i as u8)?)
                    .download(PdoEntry::new(length, entry.subindex, entry.index), timeout)?;
            }
            count.download(len, timeout)?;

            if let Some(sync_manager) = pdo.sync_manager() {
                channels.entry(sync_manager).or_default().push(pdo.index());
            }
        }
        for (sync_manager, pdos) in channels {
            let channel = SyncChannel {
                index: registers::coe::sync_assignment + u16::from(sync_manager),
                num: u8::MAX - 1,
                };
            let count = self.sdo::<u8, WriteOnly>(channel.index, channel.len());
            let len = u8::try_from(pdos.len())
                .map_err(|_| EthercatError::configuration(format!("too many PDOs in sync manager {}", sync_manager)))?;

            count.download(0, timeout)?;
            for (i, &pdo) in pdos.iter().enumerate() {
                self.sdo::<u16, WriteOnly>(channel.index, channel.slot(i as u8)?)
                    .download(pdo, timeout)?;
            }
            count.download(len, timeout)?;
        }
        log::debug!("slave {} mapping configured", self.name);
        Ok(())
    }

    /// update input entries from the input PDI
    pub(crate) fn pull(&self, pdi: &[u8]) -> EthercatResult {
        self.inputs.iter().try_for_each(|pdo|  pdo.pull(pdi))
    }
    /// write output entries to the output PDI
    pub(crate) fn push(&self, pdi: &mut [u8]) -> EthercatResult {
        self.outputs.iter().try_for_each(|pdo|  pdo.push(pdi))
    }
}
impl fmt::Debug for Slave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slave")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish()
    }
}
