/*!
    This module provide the process data entries of slaves, and the references allowing to access their values.

    Each [Entry] is an object mapped in a PDO, placed somewhere in the process data image (PDI) exchanged with the bus. An entry owns a [Buffer] mirroring its bits in the PDI:

    - the master copies the entry's bits from the input PDI to its buffer ([Entry::pull]) or from its buffer to the output PDI ([Entry::push]) once per cycle
    - the user reads or writes the buffer through a [Reference] (statically typed) or a [ValueReference] (dynamically typed), from any thread

    Buffers are locked independently from each other and from the PDI, so accessing an entry never blocks the whole bus exchange, and the user never sees a partially updated PDI.

    ```ignore
    let position = slave.get_pdo(PdoDirection::Input, "position")?.reference::<i32>("actual")?;
    let target = slave.get_pdo(PdoDirection::Output, "target")?.reference::<i32>("position")?;
    slave.register_event_handler(SlaveEvent::OutputsUpdate, move || {
        target.set(position.get().unwrap() + 10).unwrap();
    });
    ```
*/

use crate::{
    data::{self, PduData, BitField, TypeId},
    types::{Type, TypeLibrary, Category},
    value::Value,
    translate::{CodecRegistry, Translator, TranslateDirection},
    config::{PdoDescription, EntryDescription, ProcessImageDescription},
    registers::coe,
    error::{EthercatError, EthercatResult},
    };
use std::sync::{Arc, Mutex, MutexGuard};
use core::fmt;

pub use crate::config::PdoDirection;


/// binary mirror of an entry, guarded by its own lock
pub struct Buffer {
    data: Mutex<Vec<u8>>,
}
impl Buffer {
    /// zeroed buffer of the given byte size
    pub fn new(size: usize) -> Self {
        Self {data: Mutex::new(vec![0; size])}
    }
    /// lock the buffer content
    pub fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        // bytes stay valid whatever panicked while holding them
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
    pub fn len(&self) -> usize  {self.lock().len()}
    pub fn is_empty(&self) -> bool  {self.len() == 0}
}
impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Buffer{:02x?}", self.lock().as_slice())
    }
}


/**
    object mapped in a PDO, with its buffer

    Entries are built by the [crate::Master] when resolving the bus description: the PDO entry and its process image variable must agree on type and size.
*/
pub struct Entry {
    name: String,
    path: String,
    index: u16,
    sub: u8,
    ty: Type,
    direction: PdoDirection,
    /// position in the PDI of the entry's direction
    bitoffset: usize,
    buffer: Buffer,
    registry: Arc<CodecRegistry>,
}
impl Entry {
    /**
        resolve an entry of a PDO against the process image

        The variable named `slave.pdo.entry` in the image gives the entry's position. This fails if

        - there is no such variable
        - the entry and the variable types do not resolve to compatible types of the same size
        - the data is not byte aligned while bit alignment is disabled
        - the data exceeds the process image
    */
    pub fn new(
            slave: &str,
            pdo: &PdoDescription,
            description: &EntryDescription,
            image: &ProcessImageDescription,
            library: &TypeLibrary,
            registry: Arc<CodecRegistry>,
            ) -> EthercatResult<Self> {
        let path = format!("{}.{}.{}", slave, pdo.name, description.name);
        let data_type = description.data_type.as_ref()
            .ok_or_else(|| EthercatError::configuration(format!("entry {} has no type", path)))?;
        let variable = image.variable(pdo.direction, &path)
            .ok_or_else(|| EthercatError::configuration(format!("no {:?} variable in the process image for entry {}", pdo.direction, path)))?;

        if variable.bitsize != description.bitlen
            {return Err(EthercatError::configuration(format!(
                "entry {} is {} bits in its PDO but {} bits in the process image",
                path, description.bitlen, variable.bitsize)))}
        if description.bitlen == 0
            {return Err(EthercatError::configuration(format!("entry {} is empty", path)))}
        let ty = library.parse(data_type, Some(description.bitlen))?;
        let declared = library.parse(&variable.data_type, Some(variable.bitsize))?;
        if !ty.compatible(&declared)
            {return Err(EthercatError::configuration(format!(
                "entry {} is {} in its PDO but {} in the process image",
                path, ty, declared)))}

        if !registry.config().bit_alignment
        && (variable.bitoffset % 8 != 0 || variable.bitsize % 8 != 0)
            {return Err(EthercatError::configuration(format!(
                "entry {} is not byte aligned (bit {}, {} bits) but bit alignment is disabled",
                path, variable.bitoffset, variable.bitsize)))}
        let size = image.size(pdo.direction);
        if variable.bitoffset + variable.bitsize > size * 8
            {return Err(EthercatError::configuration(format!(
                "entry {} exceeds the {:?} image of {} bytes", path, pdo.direction, size)))}

        log::debug!("entry {} is {} at bit {}", path, ty, variable.bitoffset);
        Ok(Self {
            name: description.name.clone(),
            path,
            index: description.index,
            sub: description.subindex,
            buffer: Buffer::new(ty.buffer_size()),
            ty,
            direction: pdo.direction,
            bitoffset: variable.bitoffset,
            registry,
        })
    }

    /// name in its PDO
    pub fn name(&self) -> &str  {&self.name}
    /// full name in the process image, `slave.pdo.entry`
    pub fn path(&self) -> &str  {&self.path}
    /// index of the mapped object
    pub fn index(&self) -> u16  {self.index}
    /// subindex of the mapped object
    pub fn sub(&self) -> u8  {self.sub}
    pub fn ty(&self) -> &Type  {&self.ty}
    pub fn direction(&self) -> PdoDirection  {self.direction}
    /// bit position in the PDI
    pub fn bitoffset(&self) -> usize  {self.bitoffset}
    pub fn bitsize(&self) -> usize  {self.ty.bitsize()}
    pub fn buffer(&self) -> &Buffer  {&self.buffer}

    /// copy the entry's bits from the input PDI to the buffer
    pub fn pull(&self, pdi: &[u8]) -> EthercatResult {
        if self.direction != PdoDirection::Input
            {return Err(EthercatError::Master("only input entries can be pulled"))}
        data::check_bits(pdi.len(), self.bitoffset, self.bitsize())?;
        let mut buffer = self.buffer.lock();
        data::copy_bits(pdi, self.bitoffset, &mut buffer, 0, self.bitsize());
        log::trace!("pull {}: {:02x?}", self.path, buffer.as_slice());
        Ok(())
    }
    /// copy the buffer to the entry's bits in the output PDI, other bits of the PDI are untouched
    pub fn push(&self, pdi: &mut [u8]) -> EthercatResult {
        if self.direction != PdoDirection::Output
            {return Err(EthercatError::Master("only output entries can be pushed"))}
        data::check_bits(pdi.len(), self.bitoffset, self.bitsize())?;
        let buffer = self.buffer.lock();
        data::copy_bits(&buffer, 0, pdi, self.bitoffset, self.bitsize());
        log::trace!("push {}: {:02x?}", self.path, buffer.as_slice());
        Ok(())
    }

    /// copy of the buffer
    pub fn snapshot(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }
    /// replace the buffer content, the given bytes must have the buffer's size
    pub fn fill(&self, bytes: &[u8]) -> EthercatResult {
        let mut buffer = self.buffer.lock();
        if bytes.len() != buffer.len()
            {return Err(EthercatError::Packing(data::PackingError::BadSize(bytes.len(), "bytes have not the entry's size")))}
        buffer.copy_from_slice(bytes);
        Ok(())
    }

    /// identifier the entry type matches, if it is a plain numeric
    fn type_id(&self) -> Option<TypeId> {
        Some(match self.ty.category() {
            Category::Bool => TypeId::BOOL,
            Category::FixedInt {bits, signed: false} if bits < 8 => TypeId::BIT(bits),
            Category::FixedInt {bits, signed} => match (bits, signed) {
                (8, false) => TypeId::U8,
                (16, false) => TypeId::U16,
                (32, false) => TypeId::U32,
                (64, false) => TypeId::U64,
                (8, true) => TypeId::I8,
                (16, true) => TypeId::I16,
                (32, true) => TypeId::I32,
                (64, true) => TypeId::I64,
                _ => return None,
            },
            Category::Float32 => TypeId::F32,
            Category::Float64 => TypeId::F64,
            _ => return None,
        })
    }
    /**
        statically typed access to the entry

        `T` must match the entry type: a numeric `T` must have the entry's exact type (see [TypeId]), a custom `T` (like a bitfield struct or a byte array) must occupy as many bytes as the entry, whatever the entry's type.
    */
    pub fn reference<T: PduData>(self: &Arc<Self>) -> EthercatResult<Reference<T>> {
        let matches = match T::ID {
            TypeId::CUSTOM => T::packed_size() == self.ty.buffer_size() && T::packed_bitsize() >= self.bitsize(),
            id => self.type_id() == Some(id),
        };
        if !matches
            {return Err(EthercatError::configuration(format!(
                "entry {} of type {} cannot be accessed as {}",
                self.path, self.ty, core::any::type_name::<T>())))}
        Ok(Reference {
            entry: self.clone(),
            field: BitField::new(0, self.bitsize().min(T::packed_bitsize())),
        })
    }
    /// dynamically typed access to the entry, using the codec of its type
    pub fn value_reference(self: &Arc<Self>) -> ValueReference {
        ValueReference {
            entry: self.clone(),
            translator: self.registry.translator(self.ty.clone()),
        }
    }
}
impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entry{{{}, {:#06x}:{}, {}, {:?} bit {}}}", self.path, self.index, self.sub, self.ty, self.direction, self.bitoffset)
    }
}


/**
    statically typed access to an entry's buffer

    References can be cloned and sent to other threads, each access locks the entry's buffer.
*/
pub struct Reference<T: PduData> {
    entry: Arc<Entry>,
    field: BitField<T>,
}
impl<T: PduData> Reference<T> {
    pub fn entry(&self) -> &Arc<Entry>  {&self.entry}
    /// decode the current value of the entry
    pub fn get(&self) -> EthercatResult<T> {
        let buffer = self.entry.buffer.lock();
        let result = self.field.get(&buffer);
        self.entry.registry.wrap(TranslateDirection::Decode, || self.entry.ty.name(), "pdu-data", result)
    }
    /// encode a new value in the entry
    pub fn set(&self, value: T) -> EthercatResult {
        let mut buffer = self.entry.buffer.lock();
        let result = self.field.set(&mut buffer, value);
        self.entry.registry.wrap(TranslateDirection::Encode, || self.entry.ty.name(), "pdu-data", result)
    }
}
impl<T: PduData> Clone for Reference<T> {
    fn clone(&self) -> Self {
        Self {entry: self.entry.clone(), field: self.field}
    }
}
impl<T: PduData> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reference<{}>{{{}}}", core::any::type_name::<T>(), self.entry.path)
    }
}

/// dynamically typed access to an entry's buffer
#[derive(Clone)]
pub struct ValueReference {
    entry: Arc<Entry>,
    translator: Translator,
}
impl ValueReference {
    pub fn entry(&self) -> &Arc<Entry>  {&self.entry}
    pub fn get(&self) -> EthercatResult<Value> {
        let buffer = self.entry.buffer.lock();
        self.translator.decode(&buffer)
    }
    pub fn set(&self, value: &Value) -> EthercatResult {
        let mut buffer = self.entry.buffer.lock();
        self.translator.encode(value, &mut buffer)
    }
}
impl fmt::Debug for ValueReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValueReference{{{}, {:?}}}", self.entry.path, self.translator)
    }
}


/// PDO of a slave, with its resolved entries
pub struct Pdo {
    description: PdoDescription,
    entries: Vec<Arc<Entry>>,
}
impl Pdo {
    /// resolve every entry of the PDO, padding entries (null index) are only kept in the description
    pub fn new(
            slave: &str,
            description: &PdoDescription,
            image: &ProcessImageDescription,
            library: &TypeLibrary,
            registry: &Arc<CodecRegistry>,
            ) -> EthercatResult<Self> {
        let first = match description.direction {
            PdoDirection::Input => coe::tx_mapping,
            PdoDirection::Output => coe::rx_mapping,
        };
        if !(first .. first + coe::mapping_count).contains(&description.index)
            {return Err(EthercatError::configuration(format!(
                "PDO {}.{} has index {:#06x}, but {:?} PDOs are mapped in {:#06x}..{:#06x}",
                slave, description.name, description.index, description.direction, first, first + coe::mapping_count)))}

        let mut entries: Vec<Arc<Entry>> = Vec::with_capacity(description.entries.len());
        for entry in &description.entries {
            if entry.index == 0 {
                log::trace!("skip padding of {} bits in {}.{}", entry.bitlen, slave, description.name);
                continue
            }
            if entries.iter().any(|other|  other.name() == entry.name)
                {return Err(EthercatError::configuration(format!(
                    "entry {} is duplicated in {}.{}", entry.name, slave, description.name)))}
            entries.push(Arc::new(Entry::new(slave, description, entry, image, library, registry.clone())?));
        }
        Ok(Self {description: description.clone(), entries})
    }

    /// index of the PDO mapping object
    pub fn index(&self) -> u16  {self.description.index}
    pub fn name(&self) -> &str  {&self.description.name}
    pub fn direction(&self) -> PdoDirection  {self.description.direction}
    pub fn sync_manager(&self) -> Option<u8>  {self.description.sync_manager}
    /// the description the PDO was built from, including its padding entries
    pub fn description(&self) -> &PdoDescription  {&self.description}
    pub fn entries(&self) -> &[Arc<Entry>]  {&self.entries}

    /// find an entry by name
    pub fn get_pdo_entry(&self, name: &str) -> EthercatResult<&Arc<Entry>> {
        self.entries.iter()
            .find(|entry|  entry.name() == name)
            .ok_or_else(|| EthercatError::range("PDO entry", format!("{}.{}", self.description.name, name)))
    }
    /// shorthand for [Entry::reference] of a named entry
    pub fn reference<T: PduData>(&self, name: &str) -> EthercatResult<Reference<T>> {
        self.get_pdo_entry(name)?.reference()
    }
    /// shorthand for [Entry::value_reference] of a named entry
    pub fn value_reference(&self, name: &str) -> EthercatResult<ValueReference> {
        Ok(self.get_pdo_entry(name)?.value_reference())
    }

    pub(crate) fn pull(&self, pdi: &[u8]) -> EthercatResult {
        self.entries.iter().try_for_each(|entry|  entry.pull(pdi))
    }
    pub(crate) fn push(&self, pdi: &mut [u8]) -> EthercatResult {
        self.entries.iter().try_for_each(|entry|  entry.push(pdi))
    }
}
impl fmt::Debug for Pdo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pdo")
            .field("index", &format_args!("{:#06x}", self.description.index))
            .field("name", &self.description.name)
            .field("entries", &self.entries)
            .finish()
    }
}



#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Variable,
        translate::TranslationConfig,
        };
    use bilge::prelude::*;

    fn image(variables: &[(&str, &str, usize, usize)], size: usize) -> ProcessImageDescription {
        let variables: Vec<Variable> = variables.iter()
            .map(|&(name, data_type, bitsize, bitoffset)|  Variable {
                name: name.into(),
                data_type: data_type.into(),
                bitsize,
                bitoffset,
                })
            .collect();
        ProcessImageDescription {
            input_size: size,
            output_size: size,
            inputs: variables.clone(),
            outputs: variables,
        }
    }
    fn pdo(direction: PdoDirection, entries: &[(&str, &str, usize)]) -> PdoDescription {
        PdoDescription {
            index: match direction {
                PdoDirection::Input => coe::tx_mapping,
                PdoDirection::Output => coe::rx_mapping,
                },
            name: "pdo".into(),
            direction,
            sync_manager: Some(3),
            entries: entries.iter().enumerate()
                .map(|(i, &(name, data_type, bitlen))|  EntryDescription {
                    index: if data_type.is_empty() {0} else {0x6000 + i as u16},
                    subindex: 0,
                    bitlen,
                    name: name.into(),
                    data_type: if data_type.is_empty() {None} else {Some(data_type.into())},
                    })
                .collect(),
        }
    }
    fn registry() -> Arc<CodecRegistry> {
        Arc::new(CodecRegistry::default())
    }

    #[test]
    fn pull_unaligned() {
        let image = image(&[("s.pdo.low", "BIT4", 4, 4), ("s.pdo.high", "USINT", 8, 8)], 2);
        let pdo = Pdo::new("s", &pdo(PdoDirection::Input, &[("low", "BIT4", 4), ("high", "USINT", 8)]), &image, &TypeLibrary::new(), &registry()).unwrap();
        let pdi = [0xff, 0x00];
        pdo.pull(&pdi).unwrap();
        assert_eq!(pdo.value_reference("low").unwrap().get().unwrap(), Value::Unsigned(0xf));
        assert_eq!(pdo.value_reference("high").unwrap().get().unwrap(), Value::Unsigned(0));
        assert_eq!(pdo.reference::<u8>("high").unwrap().get().unwrap(), 0);
    }

    #[test]
    fn isolation() {
        let image = image(&[("s.pdo.value", "UINT", 16, 4)], 3);
        let input = Pdo::new("s", &pdo(PdoDirection::Input, &[("value", "UINT", 16)]), &image, &TypeLibrary::new(), &registry()).unwrap();
        let mut pdi = [0x50, 0x34, 0x01];
        input.pull(&pdi).unwrap();
        pdi.fill(0);
        assert_eq!(input.reference::<u16>("value").unwrap().get().unwrap(), 0x1345);

        let output = Pdo::new("s", &pdo(PdoDirection::Output, &[("value", "UINT", 16)]), &image, &TypeLibrary::new(), &registry()).unwrap();
        let reference = output.reference::<u16>("value").unwrap();
        reference.set(0xabcd).unwrap();
        let mut pdi = [0xff; 3];
        output.push(&mut pdi).unwrap();
        assert_eq!(pdi, [0xdf, 0xbc, 0xfa]);
        reference.set(0).unwrap();
        assert_eq!(pdi, [0xdf, 0xbc, 0xfa]);
        output.push(&mut pdi).unwrap();
        assert_eq!(pdi, [0x0f, 0x00, 0xf0]);

        // directions are enforced
        assert!(output.get_pdo_entry("value").unwrap().pull(&pdi).is_err());
        assert!(input.get_pdo_entry("value").unwrap().push(&mut pdi).is_err());
    }

    #[test]
    fn mapping_indices() {
        let image = image(&[("s.pdo.a", "UINT", 16, 0)], 2);
        let library = TypeLibrary::new();
        let mut input = pdo(PdoDirection::Input, &[("a", "UINT", 16)]);
        let mut output = pdo(PdoDirection::Output, &[("a", "UINT", 16)]);
        assert_eq!((input.index, output.index), (0x1a00, 0x1600));

        input.index = 0x1bff;
        output.index = 0x17ff;
        assert!(Pdo::new("s", &input, &image, &library, &registry()).is_ok());
        assert!(Pdo::new("s", &output, &image, &library, &registry()).is_ok());
        // an output mapped as an input and the reverse
        input.index = 0x1600;
        output.index = 0x1a00;
        assert!(matches!(Pdo::new("s", &input, &image, &library, &registry()), Err(EthercatError::Configuration(_))));
        assert!(matches!(Pdo::new("s", &output, &image, &library, &registry()), Err(EthercatError::Configuration(_))));
        input.index = 0x1c00;
        assert!(Pdo::new("s", &input, &image, &library, &registry()).is_err());
    }

    #[test]
    fn padding_and_lookup() {
        let image = image(&[("s.pdo.flag", "BOOL", 1, 0)], 1);
        let pdo = Pdo::new("s", &pdo(PdoDirection::Input, &[("flag", "BOOL", 1), ("", "", 7)]), &image, &TypeLibrary::new(), &registry()).unwrap();
        assert_eq!(pdo.entries().len(), 1);
        assert_eq!(pdo.description().entries.len(), 2);
        assert_eq!(pdo.get_pdo_entry("flag").unwrap().path(), "s.pdo.flag");
        assert!(matches!(pdo.get_pdo_entry("nothing"), Err(EthercatError::Range {..})));
    }

    #[test]
    fn construction_checks() {
        let library = TypeLibrary::new();
        // size mismatch
        let image1 = image(&[("s.pdo.a", "UINT", 16, 0)], 4);
        assert!(matches!(
            Pdo::new("s", &pdo(PdoDirection::Input, &[("a", "UDINT", 32)]), &image1, &library, &registry()),
            Err(EthercatError::Configuration(_))));
        // type mismatch of same size
        let image2 = image(&[("s.pdo.a", "INT", 16, 0)], 4);
        assert!(Pdo::new("s", &pdo(PdoDirection::Input, &[("a", "UINT", 16)]), &image2, &library, &registry()).is_err());
        // aliases are compatible
        let image3 = image(&[("s.pdo.a", "UNSIGNED16", 16, 0)], 4);
        assert!(Pdo::new("s", &pdo(PdoDirection::Input, &[("a", "UINT", 16)]), &image3, &library, &registry()).is_ok());
        // missing variable
        assert!(Pdo::new("s", &pdo(PdoDirection::Input, &[("b", "UINT", 16)]), &image3, &library, &registry()).is_err());
        // out of the image
        let image4 = image(&[("s.pdo.a", "UINT", 16, 24)], 4);
        assert!(Pdo::new("s", &pdo(PdoDirection::Input, &[("a", "UINT", 16)]), &image4, &library, &registry()).is_err());
        // unknown type
        let image5 = image(&[("s.pdo.a", "Mystery", 16, 0)], 4);
        assert!(Pdo::new("s", &pdo(PdoDirection::Input, &[("a", "Mystery", 16)]), &image5, &library, &registry()).is_err());
        assert!(Pdo::new("s", &pdo(PdoDirection::Input, &[("a", "Mystery", 16)]), &image5, &library.clone().with_placeholders(true), &registry()).is_ok());

        // bit alignment
        let unaligned = image(&[("s.pdo.a", "BIT4", 4, 4)], 4);
        let strict = Arc::new(CodecRegistry::new(TranslationConfig {bit_alignment: false, .. Default::default()}));
        assert!(Pdo::new("s", &pdo(PdoDirection::Input, &[("a", "BIT4", 4)]), &unaligned, &library, &strict).is_err());
        assert!(Pdo::new("s", &pdo(PdoDirection::Input, &[("a", "BIT4", 4)]), &unaligned, &library, &registry()).is_ok());
    }

    #[test]
    fn typed_reference_checks() {
        let image = image(&[("s.pdo.a", "DINT", 32, 0), ("s.pdo.b", "BIT3", 3, 32), ("s.pdo.c", "STRING(2)", 16, 40)], 8);
        let pdo = Pdo::new("s", &pdo(PdoDirection::Output, &[("a", "DINT", 32), ("b", "BIT3", 3), ("c", "STRING(2)", 16)]), &image, &TypeLibrary::new(), &registry()).unwrap();
        assert!(pdo.reference::<i32>("a").is_ok());
        assert!(pdo.reference::<u32>("a").is_err());
        assert!(pdo.reference::<i16>("a").is_err());
        let b = pdo.reference::<bilge::prelude::u3>("b").unwrap();
        b.set(bilge::prelude::u3::new(5)).unwrap();
        assert_eq!(b.get().unwrap().value(), 5);
        assert!(pdo.reference::<u8>("b").is_err());
        let c = pdo.reference::<[u8; 2]>("c").unwrap();
        c.set(*b"ok").unwrap();
        assert_eq!(pdo.value_reference("c").unwrap().get().unwrap(), Value::from("ok"));
        assert!(pdo.reference::<[u8; 1]>("c").is_err());
    }

    #[bitsize(16)]
    #[derive(FromBits, DebugBits, Copy, Clone, PartialEq)]
    struct StatusWord {
        ready: bool,
        fault: bool,
        reserved: u14,
    }
    crate::data::bilge_pdudata!(StatusWord, u16);

    #[test]
    fn custom_references() {
        let image = image(&[("s.pdo.word", "UINT", 16, 0), ("s.pdo.flags", "BIT3", 3, 16)], 3);
        let pdo = Pdo::new("s", &pdo(PdoDirection::Input, &[("word", "UINT", 16), ("flags", "BIT3", 3)]), &image, &TypeLibrary::new(), &registry()).unwrap();
        pdo.pull(&[0x02, 0x00, 0x05]).unwrap();

        let status = pdo.reference::<StatusWord>("word").unwrap();
        assert!(status.get().unwrap().fault());
        assert!(!status.get().unwrap().ready());
        assert_eq!(pdo.reference::<[u8; 2]>("word").unwrap().get().unwrap(), [0x02, 0x00]);
        assert_eq!(pdo.reference::<[u8; 1]>("flags").unwrap().get().unwrap(), [0x05]);
        assert!(pdo.reference::<[u8; 4]>("word").is_err());
        assert!(pdo.reference::<StatusWord>("flags").is_err());
    }

    #[test]
    fn snapshot_and_fill() {
        let image = image(&[("s.pdo.a", "UINT", 16, 0)], 2);
        let pdo = Pdo::new("s", &pdo(PdoDirection::Output, &[("a", "UINT", 16)]), &image, &TypeLibrary::new(), &registry()).unwrap();
        let entry = pdo.get_pdo_entry("a").unwrap();
        entry.fill(&[0x34, 0x12]).unwrap();
        assert_eq!(entry.snapshot(), [0x34, 0x12]);
        assert_eq!(pdo.reference::<u16>("a").unwrap().get().unwrap(), 0x1234);
        assert!(entry.fill(&[0]).is_err());
    }
}
