/*!
Convenient structures to read/write the slave's dictionnary objects (SDO) and configure mappings.

At contrary to PDO entries, SDOs are not exchanged cyclically: each [Sdo::upload] or [Sdo::download] is a request to the backend, with its own buffer and timeout.

- [Sdo] is statically typed with a [PduData], its buffer size is known at compile time
- [ValueSdo] is dynamically typed with a [Type], its buffer is sized from the type or from the value to send

# Example

```ignore
	let mode = slave.sdo::<u8, ReadWrite>(0x6060, SdoPart::Sub(0));
	mode.download(8, timeout)?;
	let name = slave.value_sdo::<ReadOnly>(0x1008, SdoPart::Sub(0), Type::string(0), 64);
	println!("{}", name.upload(timeout)?);
```
*/

use crate::{
	data::{PduData, PackingError, Storage},
	types::Type,
	value::Value,
	backend::Backend,
	translate::{Translator, CodecRegistry, TranslateDirection},
	error::{EthercatError, EthercatResult},
	};
use bilge::prelude::*;
use std::sync::Arc;
use core::{fmt, marker::PhantomData, time::Duration};


/// access rights of an SDO, given by marker types
pub trait Access {}
/// access rights allowing [Sdo::upload]
pub trait Readable: Access {}
/// access rights allowing [Sdo::download]
pub trait Writable: Access {}

/// the SDO can only be read
pub struct ReadOnly;
/// the SDO can only be written
pub struct WriteOnly;
/// the SDO can be read and written
pub struct ReadWrite;
impl Access for ReadOnly {}
impl Access for WriteOnly {}
impl Access for ReadWrite {}
impl Readable for ReadOnly {}
impl Readable for ReadWrite {}
impl Writable for WriteOnly {}
impl Writable for ReadWrite {}


/// specifies which par of an SDO is addressed
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SdoPart {
    /// the whole SDO (the complete struct with its eventual paddings), using complete access from subindex 0
    Complete,
    /// one subitem value in the SDO
    Sub(u8),
}
impl SdoPart {
    /// return the subindex or 0 for a complete item
    pub fn sub(self) -> u8 { match self {
            Self::Complete => 0,
            Self::Sub(i) => i,
    }}
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// location of an SDO on the bus
#[derive(Clone)]
struct Location {
	backend: Arc<dyn Backend>,
	slave: u16,
	index: u16,
	part: SdoPart,
}
impl Location {
	fn upload(&self, data: &mut [u8], timeout: Duration) -> EthercatResult<usize> {
		log::debug!("upload sdo {:#06x}:{:?} from slave {}", self.index, self.part, self.slave);
		self.backend.upload_sdo(self.slave, self.index, self.part.sub(), data, timeout, self.part.is_complete())
	}
	fn download(&self, data: &[u8], timeout: Duration) -> EthercatResult {
		log::debug!("download sdo {:#06x}:{:?} to slave {}: {:02x?}", self.index, self.part, self.slave, data);
		self.backend.download_sdo(self.slave, self.index, self.part.sub(), data, timeout, self.part.is_complete())
	}
}
impl fmt::Debug for Location {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{{slave: {}, index: {:#x}, sub: {:?}}}", self.slave, self.index, self.part)
	}
}


/**
	statically typed SDO of a slave

	Built by [crate::Slave::sdo], the access rights `A` restrict the transfers allowed.
*/
pub struct Sdo<T: PduData, A: Access = ReadWrite> {
	location: Location,
	registry: Arc<CodecRegistry>,
	data: PhantomData<(T, A)>,
}
impl<T: PduData, A: Access> Sdo<T, A> {
	pub(crate) fn new(backend: Arc<dyn Backend>, registry: Arc<CodecRegistry>, slave: u16, index: u16, part: SdoPart) -> Self {
		Self {
			location: Location {backend, slave, index, part},
			registry,
			data: PhantomData,
		}
	}
	/// index of the item in the slave's dictionnary of objects
	pub fn index(&self) -> u16  {self.location.index}
	pub fn part(&self) -> SdoPart  {self.location.part}
	/// fixed address of the slave
	pub fn slave(&self) -> u16  {self.location.slave}
}
impl<T: PduData, A: Readable> Sdo<T, A> {
	/// read the current value from the slave
	pub fn upload(&self, timeout: Duration) -> EthercatResult<T> {
		let mut buffer = T::Packed::zeroed();
		let size = self.location.upload(buffer.as_mut(), timeout)?;
		let result = match buffer.as_ref().get(.. size) {
			Some(received) => T::unpack(received),
			None => Err(PackingError::BadSize(size, "backend reported more bytes than the buffer holds")),
		};
		self.registry.wrap(TranslateDirection::Decode, || core::any::type_name::<T>().to_string(), "pdu-data", result)
	}
}
impl<T: PduData, A: Writable> Sdo<T, A> {
	/// set a new value on the slave
	pub fn download(&self, value: T, timeout: Duration) -> EthercatResult {
		let mut buffer = T::Packed::zeroed();
		let result = value.pack(buffer.as_mut());
		self.registry.wrap(TranslateDirection::Encode, || core::any::type_name::<T>().to_string(), "pdu-data", result)?;
		self.location.download(&buffer.as_ref()[.. T::packed_size()], timeout)
	}
}
impl<T: PduData, A: Access> fmt::Debug for Sdo<T, A> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "Sdo<{}> {:?}", core::any::type_name::<T>(), self.location)
	}
}

/**
	dynamically typed SDO of a slave

	Built by [crate::Slave::value_sdo]. Statically sized types always transfer their exact size, dynamically sized types (like variable length strings) are uploaded in a buffer of the given capacity and downloaded with the size of the value.
*/
pub struct ValueSdo<A: Access = ReadWrite> {
	location: Location,
	translator: Translator,
	capacity: usize,
	access: PhantomData<A>,
}
impl<A: Access> ValueSdo<A> {
	pub(crate) fn new(backend: Arc<dyn Backend>, translator: Translator, slave: u16, index: u16, part: SdoPart, capacity: usize) -> Self {
		Self {
			location: Location {backend, slave, index, part},
			translator,
			capacity,
			access: PhantomData,
		}
	}
	pub fn index(&self) -> u16  {self.location.index}
	pub fn part(&self) -> SdoPart  {self.location.part}
	pub fn slave(&self) -> u16  {self.location.slave}
	pub fn ty(&self) -> &Type  {self.translator.ty()}
}
impl<A: Readable> ValueSdo<A> {
	pub fn upload(&self, timeout: Duration) -> EthercatResult<Value> {
		let mut buffer = vec![0; self.translator.static_size().unwrap_or(self.capacity)];
		let size = self.location.upload(&mut buffer, timeout)?;
		if size > buffer.len() {
			let result = Err(PackingError::BadSize(size, "backend reported more bytes than the buffer holds"));
			return self.translator.registry().wrap(TranslateDirection::Decode, || self.ty().name(), self.translator.codec().name(), result)
		}
		match self.translator.static_size() {
			Some(expected) if size < expected => {
				let result = Err(PackingError::BadSize(size, "uploaded object is smaller than its type"));
				self.translator.registry().wrap(TranslateDirection::Decode, || self.ty().name(), self.translator.codec().name(), result)
			},
			Some(_) => self.translator.decode(&buffer),
			None => self.translator.decode(&buffer[.. size]),
		}
	}
}
impl<A: Writable> ValueSdo<A> {
	pub fn download(&self, value: &Value, timeout: Duration) -> EthercatResult {
		let mut buffer = self.translator.make_buffer(Some(value))?;
		self.translator.encode(value, &mut buffer)?;
		self.location.download(&buffer, timeout)
	}
}
impl<A: Access> fmt::Debug for ValueSdo<A> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "ValueSdo<{}> {:?}", self.translator.ty(), self.location)
	}
}


/**
	content of a PDO mapping subitem, ETG.1000.6 table 74

	```
	use ecmap::sdo::PdoEntry;

	let entry = PdoEntry::new(16, 0, 0x6040);
	assert_eq!(u32::from(entry), 0x6040_00_10);
	```
*/
#[bitsize(32)]
#[derive(FromBits, DebugBits, Copy, Clone, Eq, PartialEq)]
pub struct PdoEntry {
	/// bit size of the mapped object
	pub length: u8,
	/// subindex of the mapped object
	pub sub: u8,
	/// index of the mapped object
	pub index: u16,
}
crate::data::bilge_pdudata!(PdoEntry, u32);

/// description of SDO configuring a PDO
/// the SDO is assumed to follow the cia402 specifications for PDO SDOs
#[derive(Clone)]
pub struct ConfigurablePdo {
	/// index of the SDO that configures the PDO
	pub index: u16,
	/// max number of entries in the PDO
	pub num: u8,
}
impl ConfigurablePdo {
	/// subitem holding the `i`th entry of the PDO
	pub fn slot(&self, i: u8) -> EthercatResult<SdoPart> {
		if i >= self.num
			{return Err(EthercatError::Master("too many entries for the PDO"))}
		Ok(SdoPart::Sub(i + 1))
	}
	/// subitem holding the number of entries
	pub fn len(&self) -> SdoPart  {SdoPart::Sub(0)}
}
impl fmt::Debug for ConfigurablePdo {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "ConfigurablePdo {{index: {:x}, num: {}}}", self.index, self.num)
	}
}

/// description of SDO configuring a SyncManager
/// the SDO is assumed to follow the cia402 specifications for syncmanager SDOs
#[derive(Clone)]
pub struct SyncChannel {
	/// index of the SDO that configures the SyncManager
	pub index: u16,
	/// max number of PDO that can be assigned to the SyncManager
	pub num: u8,
}
impl SyncChannel {
	/// subitem holding the index of the `i`th PDO assigned
	pub fn slot(&self, i: u8) -> EthercatResult<SdoPart> {
		if i >= self.num
			{return Err(EthercatError::Master("too many PDOs for the sync manager"))}
		Ok(SdoPart::Sub(i + 1))
	}
	/// subitem holding the number of PDOs assigned
	pub fn len(&self) -> SdoPart  {SdoPart::Sub(0)}
}
impl fmt::Debug for SyncChannel {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "SyncChannel {{index: {:x}, num: {}}}", self.index, self.num)
	}
}



#[cfg(test)]
mod tests {
	use super::*;
	use crate::{backend::SimulatedBackend, types::NumericKind, registers::AlState};

	const TIMEOUT: Duration = Duration::from_millis(1);

	fn setup() -> (Arc<SimulatedBackend>, Arc<CodecRegistry>) {
		(Arc::new(SimulatedBackend::new([7])), Arc::new(CodecRegistry::default()))
	}

	#[test]
	fn typed_transfers() {
		let (backend, registry) = setup();
		let sdo = Sdo::<u16, ReadWrite>::new(backend.clone(), registry.clone(), 7, 0x6040, SdoPart::Sub(0));
		sdo.download(0x000f, TIMEOUT).unwrap();
		assert_eq!(backend.object(7, 0x6040, 0), Some(vec![0x0f, 0x00]));
		assert_eq!(sdo.upload(TIMEOUT).unwrap(), 0x000f);

		// each transfer has its own buffer
		backend.insert_object(7, 0x6041, 0, &[0x37]);
		let short = Sdo::<u16, ReadOnly>::new(backend.clone(), registry.clone(), 7, 0x6041, SdoPart::Sub(0));
		assert!(matches!(short.upload(TIMEOUT), Err(EthercatError::Translation(_))));
		let missing = Sdo::<u32, ReadOnly>::new(backend.clone(), registry, 7, 0x6042, SdoPart::Sub(0));
		assert!(matches!(missing.upload(TIMEOUT), Err(EthercatError::Backend(_))));
	}

	#[test]
	fn mapping_words() {
		let (backend, registry) = setup();
		let sdo = Sdo::<PdoEntry, WriteOnly>::new(backend.clone(), registry, 7, 0x1600, SdoPart::Sub(1));
		sdo.download(PdoEntry::new(32, 0, 0x607a), TIMEOUT).unwrap();
		assert_eq!(backend.object(7, 0x1600, 1), Some(0x607a_00_20u32.to_le_bytes().to_vec()));

		let pdo = ConfigurablePdo {index: 0x1600, num: 2};
		assert_eq!(pdo.slot(1).unwrap(), SdoPart::Sub(2));
		assert!(pdo.slot(2).is_err());
		assert_eq!(pdo.len(), SdoPart::Sub(0));
	}

	#[test]
	fn dynamic_transfers() {
		let (backend, registry) = setup();
		let name = ValueSdo::<ReadWrite>::new(backend.clone(), registry.translator(Type::string(0)), 7, 0x1008, SdoPart::Sub(0), 32);
		name.download(&Value::from("servo drive"), TIMEOUT).unwrap();
		assert_eq!(backend.object(7, 0x1008, 0), Some(b"servo drive".to_vec()));
		assert_eq!(name.upload(TIMEOUT).unwrap(), Value::from("servo drive"));

		let small = ValueSdo::<ReadOnly>::new(backend.clone(), registry.translator(Type::string(0)), 7, 0x1008, SdoPart::Sub(0), 4);
		assert!(small.upload(TIMEOUT).is_err());

		let gains = ValueSdo::<ReadWrite>::new(backend.clone(), registry.translator(Type::array(NumericKind::Int, 2)), 7, 0x2000, SdoPart::Complete, 0);
		let value = Value::Array(vec![Value::Signed(-2), Value::Signed(300)]);
		gains.download(&value, TIMEOUT).unwrap();
		assert_eq!(backend.downloads().last().map(|transfer| transfer.complete), Some(true));
		assert_eq!(gains.upload(TIMEOUT).unwrap(), value);

		backend.insert_object(7, 0x2001, 0, &[1]);
		let truncated = ValueSdo::<ReadOnly>::new(backend, registry.translator(Type::numeric(NumericKind::Uint)), 7, 0x2001, SdoPart::Sub(0), 0);
		assert!(matches!(truncated.upload(TIMEOUT), Err(EthercatError::Translation(_))));
	}

	/// backend claiming to receive more bytes than it was given room for
	struct Overflowing;
	impl Backend for Overflowing {
		fn read_bus(&self, _: &mut [u8], _: Duration) -> EthercatResult  {Ok(())}
		fn write_bus(&self, _: &[u8], _: Duration) -> EthercatResult  {Ok(())}
		fn get_state(&self, _: Duration) -> EthercatResult<AlState>  {Ok(AlState::Init)}
		fn set_state(&self, _: AlState, _: Duration) -> EthercatResult  {Ok(())}
		fn get_slave_state(&self, _: u16, _: Duration) -> EthercatResult<AlState>  {Ok(AlState::Init)}
		fn set_slave_state(&self, _: u16, _: AlState, _: Duration) -> EthercatResult  {Ok(())}
		fn download_sdo(&self, _: u16, _: u16, _: u8, _: &[u8], _: Duration, _: bool) -> EthercatResult  {Ok(())}
		fn upload_sdo(&self, _: u16, _: u16, _: u8, data: &mut [u8], _: Duration, _: bool) -> EthercatResult<usize> {
			data.fill(0x11);
			Ok(data.len() + 4)
		}
	}

	#[test]
	fn oversized_uploads() {
		let backend = Arc::new(Overflowing);
		let registry = Arc::new(CodecRegistry::default());
		let typed = Sdo::<u16, ReadOnly>::new(backend.clone(), registry.clone(), 7, 0x6041, SdoPart::Sub(0));
		assert!(matches!(typed.upload(TIMEOUT), Err(EthercatError::Translation(_))));
		let fixed = ValueSdo::<ReadOnly>::new(backend.clone(), registry.translator(Type::numeric(NumericKind::Uint)), 7, 0x6041, SdoPart::Sub(0), 0);
		assert!(matches!(fixed.upload(TIMEOUT), Err(EthercatError::Translation(_))));
		let name = ValueSdo::<ReadOnly>::new(backend, registry.translator(Type::string(0)), 7, 0x1008, SdoPart::Sub(0), 8);
		assert!(matches!(name.upload(TIMEOUT), Err(EthercatError::Translation(_))));
	}
}
