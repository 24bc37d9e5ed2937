use crate::{
    types::TypeLibrary,
    slave::Slave,
    event::{EventHandlers, MasterEvent, Handler},
    translate::CodecRegistry,
    config::{BusDescription, MasterConfig},
    backend::Backend,
    registers::{AlState, MasterState},
    error::{EthercatError, EthercatResult},
    };
use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
        },
    thread::{self, JoinHandle},
    time::Instant,
    };
use core::{fmt, time::Duration};


/// lock a mutex whose content stays valid if a panic happened while holding it
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/**
    the process data images exchanged with the bus, one per direction

    Each image is locked as a whole during the exchange with the backend and the update of the entries. The user does not need to access it, it is exposed for diagnostics.
*/
pub struct ProcessImage {
    inputs: Mutex<Vec<u8>>,
    outputs: Mutex<Vec<u8>>,
}
impl ProcessImage {
    fn new(input_size: usize, output_size: usize) -> Self {
        Self {
            inputs: Mutex::new(vec![0; input_size]),
            outputs: Mutex::new(vec![0; output_size]),
        }
    }
    /// copy of the input image
    pub fn inputs(&self) -> Vec<u8>  {lock(&self.inputs).clone()}
    /// copy of the output image
    pub fn outputs(&self) -> Vec<u8>  {lock(&self.outputs).clone()}
}


/**
    This struct exposes the ethercat master functions addressing the whole ethercat segment: cyclic exchange of process data, state of the segment, and access to the slaves.

    ## Cycle

    A bus cycle is made of two phases, each phase can be run by a different call but phases never overlap.

    [Self::read_bus]
    1. fire [MasterEvent::ReadBusStart]
    2. lock the input image, read it from the backend, pull every input entry, unlock
    3. fire [MasterEvent::ReadBusComplete]
    4. fire every slave's [SlaveEvent::InputsUpdate](crate::SlaveEvent::InputsUpdate)
    5. fire [MasterEvent::ReadBusSlavesUpdateComplete]

    [Self::write_bus]
    1. fire [MasterEvent::WriteBusStart]
    2. fire every slave's [SlaveEvent::OutputsUpdate](crate::SlaveEvent::OutputsUpdate)
    3. fire [MasterEvent::WriteBusSlavesUpdateComplete]
    4. lock the output image, push every output entry, write it to the backend, unlock
    5. fire [MasterEvent::WriteBusComplete]

    Handlers are called from the thread running the cycle, they must not run a cycle themselves.

    ## Example

    ```ignore
    let master = Master::new(&description, Arc::new(backend), MasterConfig::default())?;
    master.set_state(MasterState::Operational, timeout)?;
    loop {
        master.cycle(timeout)?;
        std::thread::sleep(master.cycle_time());
    }
    ```
*/
pub struct Master {
    backend: Arc<dyn Backend>,
    slaves: Vec<Slave>,
    image: ProcessImage,
    handlers: EventHandlers<MasterEvent>,
    registry: Arc<CodecRegistry>,
    config: MasterConfig,
    cycle_time: Duration,
    /// held by the running phase
    phase: Mutex<()>,
}
impl Master {
    /// build a master for the given bus, the description can only use builtin types
    pub fn new(description: &BusDescription, backend: Arc<dyn Backend>, config: MasterConfig) -> EthercatResult<Self> {
        Self::with_library(description, backend, config, TypeLibrary::new())
    }
    /**
        build a master for the given bus, resolving type names with the given library

        The description is checked as a whole: slaves names and addresses must be unique, and every entry of every assigned PDO must match its process image variable. Any inconsistency is reported as a [EthercatError::Configuration].
    */
    pub fn with_library(description: &BusDescription, backend: Arc<dyn Backend>, config: MasterConfig, library: TypeLibrary) -> EthercatResult<Self> {
        let library = library.with_placeholders(config.allow_placeholder_types);
        let registry = Arc::new(CodecRegistry::new(config.translation));

        let mut names = HashSet::new();
        let mut addresses = HashSet::new();
        let mut slaves = Vec::with_capacity(description.slaves.len());
        for slave in &description.slaves {
            if !names.insert(slave.name.as_str())
                {return Err(EthercatError::configuration(format!("slave name {:?} is duplicated", slave.name)))}
            if !addresses.insert(slave.address)
                {return Err(EthercatError::configuration(format!("slave address {} is duplicated", slave.address)))}
            slaves.push(Slave::new(slave, &description.process_image, &library, backend.clone(), registry.clone())?);
        }
        log::debug!("master with {} slaves, {} input bytes, {} output bytes",
            slaves.len(), description.process_image.input_size, description.process_image.output_size);

        Ok(Self {
            backend,
            slaves,
            image: ProcessImage::new(description.process_image.input_size, description.process_image.output_size),
            handlers: EventHandlers::new(),
            registry,
            config,
            cycle_time: description.cycle_time,
            phase: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &MasterConfig  {&self.config}
    /// codecs used by the entries and SDOs of this master
    pub fn registry(&self) -> &Arc<CodecRegistry>  {&self.registry}
    /// period the bus is meant to be exchanged at
    pub fn cycle_time(&self) -> Duration  {self.cycle_time}
    pub fn image(&self) -> &ProcessImage  {&self.image}

    /// slaves in description order
    pub fn slaves(&self) -> &[Slave]  {&self.slaves}
    /// find a slave by name
    pub fn slave(&self, name: &str) -> EthercatResult<&Slave> {
        self.slaves.iter()
            .find(|slave|  slave.name() == name)
            .ok_or_else(|| EthercatError::range("slave", name))
    }
    /// find a slave by fixed address
    pub fn slave_at(&self, address: u16) -> EthercatResult<&Slave> {
        self.slaves.iter()
            .find(|slave|  slave.address() == address)
            .ok_or_else(|| EthercatError::range("slave", address))
    }

    /// set the handler of an event, returning the former one
    pub fn register_event_handler<F>(&self, event: MasterEvent, handler: F) -> Option<Handler>
    where F: FnMut() + Send + 'static
    {
        self.handlers.register(event, handler)
    }
    /// remove the handler of an event, returning it
    pub fn unregister_event_handler(&self, event: MasterEvent) -> Option<Handler> {
        self.handlers.unregister(event)
    }

    /// current state of the segment
    pub fn get_state(&self, timeout: Duration) -> EthercatResult<MasterState> {
        MasterState::try_from(self.backend.get_state(timeout)?)
    }
    /// request every slave to switch to the given state
    pub fn set_state(&self, state: MasterState, timeout: Duration) -> EthercatResult {
        log::debug!("switching segment to {}", state);
        self.backend.set_state(AlState::from(state), timeout)
    }

    /// read the input image from the bus and update the input entries, see [Self] for the sequence
    pub fn read_bus(&self, timeout: Duration) -> EthercatResult {
        let _phase = lock(&self.phase);
        log::debug!("read bus");
        self.handlers.invoke(MasterEvent::ReadBusStart);
        {
            let mut inputs = lock(&self.image.inputs);
            self.backend.read_bus(&mut inputs, timeout)?;
            for slave in &self.slaves {
                slave.pull(&inputs)?;
            }
        }
        self.handlers.invoke(MasterEvent::ReadBusComplete);
        for slave in &self.slaves {
            slave.handlers().invoke(crate::event::SlaveEvent::InputsUpdate);
        }
        self.handlers.invoke(MasterEvent::ReadBusSlavesUpdateComplete);
        Ok(())
    }
    /// collect the output entries and write the output image to the bus, see [Self] for the sequence
    pub fn write_bus(&self, timeout: Duration) -> EthercatResult {
        let _phase = lock(&self.phase);
        log::debug!("write bus");
        self.handlers.invoke(MasterEvent::WriteBusStart);
        for slave in &self.slaves {
            slave.handlers().invoke(crate::event::SlaveEvent::OutputsUpdate);
        }
        self.handlers.invoke(MasterEvent::WriteBusSlavesUpdateComplete);
        {
            let mut outputs = lock(&self.image.outputs);
            for slave in &self.slaves {
                slave.push(&mut outputs)?;
            }
            self.backend.write_bus(&outputs, timeout)?;
        }
        self.handlers.invoke(MasterEvent::WriteBusComplete);
        Ok(())
    }
    /// a whole bus cycle: read then write
    pub fn cycle(&self, timeout: Duration) -> EthercatResult {
        self.read_bus(timeout)?;
        self.write_bus(timeout)
    }
}
impl fmt::Debug for Master {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Master")
            .field("slaves", &self.slaves)
            .field("config", &self.config)
            .field("cycle_time", &self.cycle_time)
            .finish()
    }
}


/**
    dedicated thread running the bus cycles of a master at its cycle time

    The thread stops on the first cycle error, which is returned by [Self::stop].
*/
pub struct BusThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<EthercatResult>>,
}
impl BusThread {
    /// start cycling, optionally with the highest thread priority allowed to the process
    pub fn spawn(master: Arc<Master>, priority: bool) -> EthercatResult<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let running = stop.clone();
        let task = move || Self::run(&master, &running);
        let handle = if priority
            {Self::spawn_priority(task)?}
        else
            {thread::Builder::new().name("ethercat-bus".into()).spawn(task)?};
        Ok(Self {stop, handle: Some(handle)})
    }

    #[cfg(target_os = "linux")]
    fn spawn_priority<F>(task: F) -> EthercatResult<JoinHandle<EthercatResult>>
    where F: FnOnce() -> EthercatResult + Send + 'static
    {
        use thread_priority::{ThreadBuilder, ThreadPriority};
        Ok(ThreadBuilder::default()
            .name("ethercat-bus")
            .priority(ThreadPriority::Max)
            .spawn(move |result| {
                if let Err(error) = result {
                    log::warn!("cannot raise bus thread priority: {:?}", error);
                }
                task()
            })?)
    }
    #[cfg(not(target_os = "linux"))]
    fn spawn_priority<F>(task: F) -> EthercatResult<JoinHandle<EthercatResult>>
    where F: FnOnce() -> EthercatResult + Send + 'static
    {
        log::warn!("bus thread priority is not supported on this platform");
        Ok(thread::Builder::new().name("ethercat-bus".into()).spawn(task)?)
    }

    fn run(master: &Master, stop: &AtomicBool) -> EthercatResult {
        let timeout = master.config().default_timeout;
        let period = master.cycle_time();
        let mut next = Instant::now();
        while !stop.load(Ordering::Relaxed) {
            if let Err(error) = master.cycle(timeout) {
                log::error!("bus cycle failed: {}", error);
                return Err(error)
            }
            next += period;
            let now = Instant::now();
            if next > now
                {thread::sleep(next - now)}
            else
                // late cycles are not caught up
                {next = now}
        }
        Ok(())
    }

    /// true until the thread has stopped, by request or error
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |handle|  !handle.is_finished())
    }
    /// stop cycling and wait for the current cycle to end, returning the error that stopped the thread if any
    pub fn stop(mut self) -> EthercatResult {
        self.stop.store(true, Ordering::Relaxed);
        match self.handle.take() {
            Some(handle) => handle.join()
                .unwrap_or(Err(EthercatError::Master("bus thread panicked"))),
            None => Ok(()),
        }
    }
}
impl Drop for BusThread {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if let Ok(Err(error)) = handle.join() {
                log::warn!("bus thread stopped with {}", error);
            }
        }
    }
}
