/*!
    registry of user callbacks fired at the different steps of a bus cycle.

    Each event has one handler slot, guarded by its own lock: registering or unregistering a handler while it runs waits for the call to end, so a handler is never replaced in the middle of a call.
*/

use std::sync::{Mutex, MutexGuard};
use core::fmt;


/// callback fired on an event
pub type Handler = Box<dyn FnMut() + Send>;

/// trait for enums of events, allowing to index handler slots
pub trait Event: Copy + fmt::Debug {
    /// number of events in the enum
    const COUNT: usize;
    /// position of the event in the slots
    fn slot(self) -> usize;
}

/// steps of a master's bus cycle, see [crate::Master::read_bus] and [crate::Master::write_bus] for their order
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MasterEvent {
    /// before the input image is read from the bus
    ReadBusStart,
    /// input entries have been updated from the bus
    ReadBusComplete,
    /// every slave's [SlaveEvent::InputsUpdate] has been fired
    ReadBusSlavesUpdateComplete,
    /// before any slave's [SlaveEvent::OutputsUpdate] is fired
    WriteBusStart,
    /// every slave's [SlaveEvent::OutputsUpdate] has been fired, output entries are about to be pushed
    WriteBusSlavesUpdateComplete,
    /// the output image has been written to the bus
    WriteBusComplete,
}
impl Event for MasterEvent {
    const COUNT: usize = 6;
    fn slot(self) -> usize  {self as usize}
}

/// per slave events of a bus cycle
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlaveEvent {
    /// the slave's input entries hold the values received in the current cycle
    InputsUpdate,
    /// the slave's output entries are about to be pushed, this is the moment to set them
    OutputsUpdate,
}
impl Event for SlaveEvent {
    const COUNT: usize = 2;
    fn slot(self) -> usize  {self as usize}
}

/// one replaceable handler per event
pub struct EventHandlers<E: Event> {
    slots: Vec<Mutex<Option<Handler>>>,
    event: core::marker::PhantomData<E>,
}
impl<E: Event> EventHandlers<E> {
    pub fn new() -> Self {
        Self {
            slots: (0 .. E::COUNT).map(|_| Mutex::new(None)).collect(),
            event: core::marker::PhantomData,
        }
    }
    fn lock(&self, event: E) -> MutexGuard<'_, Option<Handler>> {
        // a panicking handler leaves its slot usable
        self.slots[event.slot()].lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
    /// set the handler of an event, returning the former one
    pub fn register<F>(&self, event: E, handler: F) -> Option<Handler>
    where F: FnMut() + Send + 'static
    {
        log::debug!("register handler for {:?}", event);
        self.lock(event).replace(Box::new(handler))
    }
    /// remove the handler of an event, returning it
    pub fn unregister(&self, event: E) -> Option<Handler> {
        log::debug!("unregister handler for {:?}", event);
        self.lock(event).take()
    }
    /// true if a handler is set for this event
    pub fn is_registered(&self, event: E) -> bool {
        self.lock(event).is_some()
    }
    /// call the handler of an event if any
    pub fn invoke(&self, event: E) {
        if let Some(handler) = self.lock(event).as_mut() {
            log::trace!("invoke handler for {:?}", event);
            handler();
        }
    }
}
impl<E: Event> Default for EventHandlers<E> {
    fn default() -> Self  {Self::new()}
}
impl<E: Event> fmt::Debug for EventHandlers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventHandlers{{{} slots}}", self.slots.len())
    }
}
