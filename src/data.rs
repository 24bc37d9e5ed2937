//! Traits and impls used to read/write data to/from bit-addressed byte buffers.

use core::{
	marker::PhantomData,
	fmt,
	};
use bilge::prelude::*;

/**
	trait for data types than can be packed/unpacked to/from a process data buffer

	This is the specialized (statically typed, statically sized) side of the translation engine: the value type is fixed at compile time and the buffer size is known from the type alone.
*/
pub trait PduData: Sized {
    const ID: TypeId;
    type Packed: Storage;

    fn pack(&self, dst: &mut [u8]) -> PackingResult<()>;
    fn unpack(src: &[u8]) -> PackingResult<Self>;

    fn packed_size() -> usize  {Self::Packed::LEN}
    fn packed_bitsize() -> usize {Self::Packed::LEN*8}
}

/** Enum to identify and raise adapted error raised by this package
*/
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PackingError {
    BadSize(usize, &'static str),
    BadAlignment(usize, &'static str),
    InvalidValue(&'static str),
}

pub type PackingResult<T> = Result<T, PackingError>;

impl fmt::Display for PackingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadSize(size, text) => write!(f, "bad size ({}): {}", size, text),
            Self::BadAlignment(offset, text) => write!(f, "bad alignment ({}): {}", offset, text),
            Self::InvalidValue(text) => write!(f, "invalid value: {}", text),
        }
    }
}
impl std::error::Error for PackingError {}


/// fixed size byte storage of a packed [PduData], generic consts cannot be used in const expressions so the array is carried as an associated type
pub trait Storage: AsRef<[u8]> + AsMut<[u8]> {
    const LEN: usize;
    fn zeroed() -> Self;
}
impl<const N: usize> Storage for [u8; N] {
    const LEN: usize = N;
    fn zeroed() -> Self {[0; N]}
}

/** dtype identifiers associated to dtypes allowing to dynamically check the type of a [PduData] implementor

	It is only convering the common useful types and not all the possible implementors of [PduData]
*/
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TypeId {
	/// default value of the enum, used in case the matching [PduData] does not fit in any of these integers
	CUSTOM,
	VOID, BOOL,
	/// unsigned integer narrower than a byte, with its bit size
	BIT(u8),
	I8, I16, I32, I64,
	U8, U16, U32, U64,
	F32, F64,
}

impl<const N: usize> PduData for [u8; N] {
	const ID: TypeId = TypeId::CUSTOM;
	type Packed = Self;

	fn pack(&self, dst: &mut [u8]) -> PackingResult<()> {
        if dst.len() < N
            {return Err(PackingError::BadSize(dst.len(), "not enough bytes for desired slice"))}
        dst[.. N].copy_from_slice(self);
        Ok(())
    }
	fn unpack(src: &[u8]) -> PackingResult<Self>  {
        let mut dst = [0; N];
        if src.len() < N
            {return Err(PackingError::BadSize(src.len(), "not enough bytes for desired slice"))}
        dst.copy_from_slice(&src[.. N]);
		Ok(dst)
	}
}

impl PduData for () {
	const ID: TypeId = TypeId::VOID;
	type Packed = [u8; 0];

	fn pack(&self, _dst: &mut [u8]) -> PackingResult<()>  {Ok(())}
	fn unpack(_src: &[u8]) -> PackingResult<Self>  {Ok(())}
}

/// a boolean is one bit, stored in bit 0 of its byte
impl PduData for bool {
	const ID: TypeId = TypeId::BOOL;
	type Packed = [u8; 1];

	fn pack(&self, dst: &mut [u8]) -> PackingResult<()>  {
        if dst.len() < Self::Packed::LEN
            {return Err(PackingError::BadSize(dst.len(), "no byte for a bool"))}
        dst[0] = (dst[0] & !0b1) | u8::from(*self);
        Ok(())
	}
	fn unpack(src: &[u8]) -> PackingResult<Self>  {
        if src.len() < Self::Packed::LEN
            {return Err(PackingError::BadSize(src.len(), "no byte for a bool"))}
		Ok(src[0] & 0b1 == 0b1)
	}
	fn packed_bitsize() -> usize {1}
}

/// macro implementing [PduData] for numeric types
macro_rules! num_pdudata {
	($t: ty, $id: ident) => { impl crate::data::PduData for $t {
			const ID: crate::data::TypeId = crate::data::TypeId::$id;
            type Packed = [u8; core::mem::size_of::<$t>()];

            fn pack(&self, dst: &mut [u8]) -> crate::data::PackingResult<()> {
                let size = core::mem::size_of::<$t>();
                if dst.len() < size
                    {return Err(crate::data::PackingError::BadSize(dst.len(), "not enough bytes for numeric value"))}
				dst[.. size].copy_from_slice(&self.to_le_bytes());
				Ok(())
			}
			fn unpack(src: &[u8]) -> crate::data::PackingResult<Self> {
                let size = core::mem::size_of::<$t>();
				Ok(Self::from_le_bytes(src.get(.. size)
					.and_then(|src| src.try_into().ok())
					.ok_or(crate::data::PackingError::BadSize(src.len(), "not enough bytes for numeric value"))?
					))
			}
		}};
}

num_pdudata!(u8, U8);
num_pdudata!(u16, U16);
num_pdudata!(u32, U32);
num_pdudata!(u64, U64);
num_pdudata!(i8, I8);
num_pdudata!(i16, I16);
num_pdudata!(i32, I32);
num_pdudata!(i64, I64);
num_pdudata!(f32, F32);
num_pdudata!(f64, F64);

/// macro implementing [PduData] for the `bilge` integers narrower than a byte, they are stored in the low bits of their byte
macro_rules! subbyte_pdudata {
    ($t: ty, $bits: literal) => { impl crate::data::PduData for $t {
        const ID: crate::data::TypeId = crate::data::TypeId::BIT($bits);
        type Packed = [u8; 1];

        fn pack(&self, dst: &mut [u8]) -> crate::data::PackingResult<()> {
            if dst.is_empty()
                {return Err(crate::data::PackingError::BadSize(0, "no byte for a sub-byte integer"))}
            let mask = u8::MAX >> (8 - $bits);
            dst[0] = (dst[0] & !mask) | self.value();
            Ok(())
        }
        fn unpack(src: &[u8]) -> crate::data::PackingResult<Self> {
            let byte = src.first()
                .ok_or(crate::data::PackingError::BadSize(0, "no byte for a sub-byte integer"))?;
            Ok(<$t>::new(byte & (u8::MAX >> (8 - $bits))))
        }
        fn packed_bitsize() -> usize {$bits}
    }};
}

subbyte_pdudata!(u1, 1);
subbyte_pdudata!(u2, 2);
subbyte_pdudata!(u3, 3);
subbyte_pdudata!(u4, 4);
subbyte_pdudata!(u5, 5);
subbyte_pdudata!(u6, 6);
subbyte_pdudata!(u7, 7);

/// macro implementing [PduData] for `bilge` structs, through the integer they are stored in
macro_rules! bilge_pdudata {
    ($t: ty, $id: ty) => { impl crate::data::PduData for $t {
        const ID: crate::data::TypeId = crate::data::TypeId::CUSTOM;
        type Packed = <$id as crate::data::PduData>::Packed;

        fn pack(&self, dst: &mut [u8]) -> crate::data::PackingResult<()> {
            crate::data::PduData::pack(&<$id>::from(*self), dst)
        }
        fn unpack(src: &[u8]) -> crate::data::PackingResult<Self> {
            <$id as crate::data::PduData>::unpack(src).map(<$t>::from)
        }
    }};
}
pub(crate) use bilge_pdudata;



/// mask of the `len` low bits of a byte
const fn low_mask(len: usize) -> u8 {
    if len >= 8 {0xff} else {(1u8 << len) - 1}
}

/// read at most 8 bits starting at the given bit position, bits are numbered from the least significant bit of the first byte
fn read_bits(data: &[u8], bit: usize, len: usize) -> u8 {
    let (byte, shift) = (bit / 8, bit % 8);
    let mut word = u16::from(data[byte]);
    if shift + len > 8 {
        word |= u16::from(data[byte+1]) << 8;
    }
    (word >> shift) as u8 & low_mask(len)
}

/// write at most 8 bits starting at the given bit position, other bits are left untouched
fn write_bits(data: &mut [u8], bit: usize, len: usize, value: u8) {
    let (byte, shift) = (bit / 8, bit % 8);
    let mask = u16::from(low_mask(len)) << shift;
    let value = (u16::from(value) << shift) & mask;
    data[byte] = (data[byte] & !(mask as u8)) | value as u8;
    if shift + len > 8 {
        data[byte+1] = (data[byte+1] & !((mask >> 8) as u8)) | (value >> 8) as u8;
    }
}

/**
    copy `len` bits from `src` starting at bit `src_bit` to `dst` starting at bit `dst_bit`.

    Bits are numbered from the least significant bit of the first byte, like in the ethercat logical memory. Destination bits outside the copied range are preserved.

    This function panics if a range exceeds its slice, see [check_bits] to test it beforehand.
*/
pub fn copy_bits(src: &[u8], src_bit: usize, dst: &mut [u8], dst_bit: usize, len: usize) {
    if src_bit % 8 == 0 && dst_bit % 8 == 0 {
        let (src, dst) = (&src[src_bit/8 ..], &mut dst[dst_bit/8 ..]);
        let bytes = len / 8;
        dst[.. bytes].copy_from_slice(&src[.. bytes]);
        let rest = len % 8;
        if rest != 0 {
            let mask = low_mask(rest);
            dst[bytes] = (dst[bytes] & !mask) | (src[bytes] & mask);
        }
        return
    }
    let mut done = 0;
    while done < len {
        let chunk = (len - done).min(8);
        let byte = read_bits(src, src_bit + done, chunk);
        write_bits(dst, dst_bit + done, chunk, byte);
        done += chunk;
    }
}

/// check that `len` bits starting at bit `bit` fit in a slice of `size` bytes
pub fn check_bits(size: usize, bit: usize, len: usize) -> PackingResult<()> {
    if bit + len > size * 8
        {Err(PackingError::BadSize(size, "bit range exceeds the buffer"))}
    else
        {Ok(())}
}

/// read one bit in a bit-addressed buffer
pub fn get_bit(data: &[u8], bit: usize) -> bool {
    data[bit / 8] >> (bit % 8) & 1 == 1
}
/// write one bit in a bit-addressed buffer
pub fn set_bit(data: &mut [u8], bit: usize, value: bool) {
    let mask = 1 << (bit % 8);
    if value   {data[bit / 8] |= mask}
    else       {data[bit / 8] &= !mask}
}



/**
	locate some data in a buffer by its bit position and length, which must be extracted to type `T` to be processed in rust

	It acts like a getter/setter of a value in a byte sequence. One can think of it as an offset to a data location because it does not actually point the data but only its offset in the byte sequence, it also contains its length to dynamically check memory bounds.

	When `len` is smaller than the packed size of `T`, only the `len` low bits of the packed value are used (no sign extension is done).
*/
#[derive(Default, Eq, PartialEq, Hash)]
pub struct BitField<T: PduData> {
    /// this is only here to mark that T is actually used
	extracted: PhantomData<T>,
	/// start bit index of the object
	pub bit: usize,
	/// bit length of the object
	pub len: usize,
}
impl<T: PduData> BitField<T> {
	/// build a Field from its content
	pub const fn new(bit: usize, len: usize) -> Self {
		Self{extracted: PhantomData, bit, len}
	}
	/// build a field at the given bit, with the nominal bit size of `T`
	pub fn simple(bit: usize) -> Self {
		Self::new(bit, T::packed_bitsize())
	}
	/// extract the value pointed by the field in the given byte array
	pub fn get(&self, data: &[u8]) -> PackingResult<T> {
        if self.len > T::packed_size() * 8
            {return Err(PackingError::BadSize(self.len, "field is bigger than its data type"))}
        check_bits(data.len(), self.bit, self.len)?;
        let mut packed = T::Packed::zeroed();
        copy_bits(data, self.bit, packed.as_mut(), 0, self.len);
        T::unpack(packed.as_ref())
	}
	/// dump the given value to the place pointed by the field in the byte array
	pub fn set(&self, data: &mut [u8], value: T) -> PackingResult<()> {
        if self.len > T::packed_size() * 8
            {return Err(PackingError::BadSize(self.len, "field is bigger than its data type"))}
        check_bits(data.len(), self.bit, self.len)?;
        let mut packed = T::Packed::zeroed();
        value.pack(packed.as_mut())?;
        copy_bits(packed.as_ref(), 0, data, self.bit, self.len);
        Ok(())
	}
}
impl<T: PduData> fmt::Debug for BitField<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "BitField{{{}, {}}}", self.bit, self.len)
	}
}
// [Clone] and [Copy] must be implemented manually to allow copying a field pointing to a type which does not implement this operation
impl<T: PduData> Clone for BitField<T> {
    fn clone(&self) -> Self   {Self::new(self.bit, self.len)}
}
impl<T: PduData> Copy for BitField<T> {}
