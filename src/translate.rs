/*!
    translation engine converting between bit-addressed byte buffers and application [Value]s, according to a CoE [Type]

    The engine is made of

    - one [Codec] per type [Category], translating values at any bit offset of a buffer
    - a [Sizer] telling how big a buffer must be for a type, either from the type alone (static sizing) or from a sample value (dynamic sizing)
    - a [CodecRegistry] holding the codecs and the [TranslationConfig], and dispatching every call through the same checks
    - [Translator], a codec bound to one type, which is what the rest of the crate uses

    ```
    use std::sync::Arc;
    use ecmap::{types::Type, translate::CodecRegistry, Value};

    let registry = Arc::new(CodecRegistry::default());
    let translator = registry.translator(Type::parse("ARRAY [0..2] OF BIT2", None).unwrap());
    let mut buffer = translator.make_buffer(None).unwrap();
    let value = Value::Array(vec![Value::Unsigned(1), Value::Unsigned(2), Value::Unsigned(3)]);
    translator.encode(&value, &mut buffer).unwrap();
    assert_eq!(buffer, [0b11_10_01]);
    assert_eq!(translator.decode(&buffer).unwrap(), value);
    ```

    Statically typed access to buffers is provided by [PduData](crate::data::PduData) instead.
*/

use crate::{
    data::{self, PackingError, PackingResult},
    types::{Type, Category, Builtin, BuiltinKind},
    value::Value,
    error::{EthercatError, EthercatResult},
    };
use std::sync::Arc;
use core::fmt;


/// direction of a translation
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TranslateDirection {
    /// from bytes to value
    Decode,
    /// from value to bytes
    Encode,
}

/// failure of a codec, with the context it happened in
#[derive(Clone, Debug, PartialEq)]
pub struct TranslationError {
    pub direction: TranslateDirection,
    /// name of the type translated
    pub type_name: String,
    /// name of the codec that failed
    pub codec: &'static str,
    pub cause: PackingError,
}
impl fmt::Display for TranslationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.direction {
            TranslateDirection::Decode => "decode",
            TranslateDirection::Encode => "encode",
        };
        write!(f, "cannot {} {} with codec {}: {}", direction, self.type_name, self.codec, self.cause)
    }
}
impl std::error::Error for TranslationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// what to do when a codec only able to work on whole bytes is asked for a sub-byte offset
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OffsetPolicy {
    /// drop the sub-byte part of the offset, with a warning
    Ignore,
    /// report a [PackingError::BadAlignment]
    Fail,
}

/// behavior switches of the translation engine
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TranslationConfig {
    /**
        allow data to start or end in the middle of a byte

        When disabled, every codec is considered byte aligned: bits and bit fields are packed at the start of their byte, and bus descriptions placing data at sub-byte offsets are rejected.
    */
    pub bit_alignment: bool,
    /// report codec failures as [EthercatError::Translation] with their context, instead of the bare [EthercatError::Packing]
    pub wrap_errors: bool,
    pub offset_policy: OffsetPolicy,
}
impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            bit_alignment: true,
            wrap_errors: true,
            offset_policy: OffsetPolicy::Fail,
        }
    }
}


/**
    buffer sizing of a codec

    Both methods are required so a codec cannot be registered without a way to size its buffers.
*/
pub trait Sizer {
    /// byte size of a buffer for the given type, `None` if it depends on the value
    fn static_size(&self, ty: &Type) -> Option<usize>;
    /// byte size of a buffer able to hold the given value
    fn dynamic_size(&self, ty: &Type, sample: &Value) -> usize;
}

/**
    translation of the values of one type category

    Codecs are stateless strategies: the type to translate is given on each call. Offsets given to codecs have already been checked by the [CodecRegistry] according to [Self::bit_aligned] and the [TranslationConfig].
*/
pub trait Codec: Sizer + Send + Sync {
    /// identity reported in errors
    fn name(&self) -> &'static str;
    /// true if the codec can work at any bit offset, false if only at whole bytes
    fn bit_aligned(&self) -> bool;
    /// read a value of type `ty` starting at bit `bitoffset` of `src`
    fn decode(&self, registry: &CodecRegistry, ty: &Type, src: &[u8], bitoffset: usize) -> PackingResult<Value>;
    /// write a value of type `ty` starting at bit `bitoffset` of `dst`, bits outside the type's range are left untouched
    fn encode(&self, registry: &CodecRegistry, ty: &Type, value: &Value, dst: &mut [u8], bitoffset: usize) -> PackingResult<()>;
}

fn builtin(ty: &Type) -> PackingResult<&Builtin> {
    match ty {
        Type::Builtin(builtin) => Ok(builtin),
        Type::Structural(_) => Err(PackingError::InvalidValue("codec needs a builtin type")),
    }
}

/// decode every element of a builtin, as one value for scalars or an array value
fn decode_elements<F>(builtin: &Builtin, bitoffset: usize, mut decode: F) -> PackingResult<Value>
where F: FnMut(usize) -> PackingResult<Value>
{
    if builtin.arity == 0 {
        decode(bitoffset)
    } else {
        let stride = builtin.base_bitsize();
        (0 .. builtin.arity)
            .map(|i|  decode(bitoffset + i*stride))
            .collect::<PackingResult<Vec<_>>>()
            .map(Value::Array)
    }
}

/// encode every element of a builtin from one value for scalars or an array value
fn encode_elements<F>(builtin: &Builtin, value: &Value, bitoffset: usize, mut encode: F) -> PackingResult<()>
where F: FnMut(&Value, usize) -> PackingResult<()>
{
    if builtin.arity == 0 {
        return encode(value, bitoffset)
    }
    let items = match value {
        Value::Array(items) => items,
        _ => return Err(PackingError::InvalidValue("expected an array")),
    };
    if items.len() != builtin.arity
        {return Err(PackingError::InvalidValue("array value has not the type's length"))}
    let stride = builtin.base_bitsize();
    for (i, item) in items.iter().enumerate() {
        encode(item, bitoffset + i*stride)?;
    }
    Ok(())
}

/// sizing shared by codecs whose size is always given by the type
macro_rules! static_sizer {
    ($t: ty) => { impl Sizer for $t {
        fn static_size(&self, ty: &Type) -> Option<usize>  {Some(ty.buffer_size())}
        fn dynamic_size(&self, ty: &Type, _sample: &Value) -> usize  {ty.buffer_size()}
    }};
}


/// single bit
pub struct BoolCodec;
static_sizer!(BoolCodec);
impl Codec for BoolCodec {
    fn name(&self) -> &'static str  {"bool"}
    fn bit_aligned(&self) -> bool  {true}
    fn decode(&self, _: &CodecRegistry, ty: &Type, src: &[u8], bitoffset: usize) -> PackingResult<Value> {
        data::check_bits(src.len(), bitoffset, ty.bitsize())?;
        Ok(Value::Bool(data::get_bit(src, bitoffset)))
    }
    fn encode(&self, _: &CodecRegistry, ty: &Type, value: &Value, dst: &mut [u8], bitoffset: usize) -> PackingResult<()> {
        let value = value.as_bool().ok_or(PackingError::InvalidValue("expected a boolean"))?;
        data::check_bits(dst.len(), bitoffset, ty.bitsize())?;
        data::set_bit(dst, bitoffset, value);
        Ok(())
    }
}

/// integers of any width up to 64 bits, signed or not, and their arrays
pub struct FixedIntCodec;
static_sizer!(FixedIntCodec);
impl FixedIntCodec {
    fn layout(ty: &Type) -> PackingResult<(usize, bool)> {
        match ty.category() {
            Category::FixedInt {bits, signed} => Ok((usize::from(bits), signed)),
            _ => Err(PackingError::InvalidValue("type is not an integer")),
        }
    }
}
impl Codec for FixedIntCodec {
    fn name(&self) -> &'static str  {"fixed-int"}
    fn bit_aligned(&self) -> bool  {true}
    fn decode(&self, _: &CodecRegistry, ty: &Type, src: &[u8], bitoffset: usize) -> PackingResult<Value> {
        let (bits, signed) = Self::layout(ty)?;
        data::check_bits(src.len(), bitoffset, ty.bitsize())?;
        decode_elements(builtin(ty)?, bitoffset, |position| {
            let mut raw = [0; 8];
            data::copy_bits(src, position, &mut raw, 0, bits);
            let raw = u64::from_le_bytes(raw);
            Ok(if signed {
                let shift = 64 - bits;
                Value::Signed(((raw << shift) as i64) >> shift)
            } else {
                Value::Unsigned(raw)
            })
        })
    }
    fn encode(&self, _: &CodecRegistry, ty: &Type, value: &Value, dst: &mut [u8], bitoffset: usize) -> PackingResult<()> {
        let (bits, signed) = Self::layout(ty)?;
        data::check_bits(dst.len(), bitoffset, ty.bitsize())?;
        let (min, max) = if signed
            {(-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)}
        else
            {(0, (1i128 << bits) - 1)};
        encode_elements(builtin(ty)?, value, bitoffset, |value, position| {
            let value = value.as_i128().ok_or(PackingError::InvalidValue("expected an integer"))?;
            if value < min || value > max
                {return Err(PackingError::InvalidValue("integer out of the type's range"))}
            data::copy_bits(&(value as u64).to_le_bytes(), 0, dst, position, bits);
            Ok(())
        })
    }
}

/// IEEE 754 floats and their arrays, on whole bytes only
pub struct FloatCodec {
    double: bool,
}
impl FloatCodec {
    pub const SINGLE: Self = Self {double: false};
    pub const DOUBLE: Self = Self {double: true};
}
static_sizer!(FloatCodec);
impl Codec for FloatCodec {
    fn name(&self) -> &'static str {
        if self.double {"float64"} else {"float32"}
    }
    fn bit_aligned(&self) -> bool  {false}
    fn decode(&self, _: &CodecRegistry, ty: &Type, src: &[u8], bitoffset: usize) -> PackingResult<Value> {
        data::check_bits(src.len(), bitoffset, ty.bitsize())?;
        decode_elements(builtin(ty)?, bitoffset, |position| {
            let mut raw = [0; 8];
            if self.double {
                data::copy_bits(src, position, &mut raw, 0, 64);
                Ok(Value::Float64(f64::from_le_bytes(raw)))
            } else {
                data::copy_bits(src, position, &mut raw, 0, 32);
                Ok(Value::Float32(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])))
            }
        })
    }
    fn encode(&self, _: &CodecRegistry, ty: &Type, value: &Value, dst: &mut [u8], bitoffset: usize) -> PackingResult<()> {
        data::check_bits(dst.len(), bitoffset, ty.bitsize())?;
        encode_elements(builtin(ty)?, value, bitoffset, |value, position| {
            let value = value.as_f64().ok_or(PackingError::InvalidValue("expected a number"))?;
            if self.double {
                data::copy_bits(&value.to_le_bytes(), 0, dst, position, 64);
            } else {
                data::copy_bits(&(value as f32).to_le_bytes(), 0, dst, position, 32);
            }
            Ok(())
        })
    }
}

/// arrays of bits, as bit vectors
pub struct BitArrayCodec;
static_sizer!(BitArrayCodec);
impl Codec for BitArrayCodec {
    fn name(&self) -> &'static str  {"bit-array"}
    fn bit_aligned(&self) -> bool  {true}
    fn decode(&self, _: &CodecRegistry, ty: &Type, src: &[u8], bitoffset: usize) -> PackingResult<Value> {
        let count = builtin(ty)?.elements();
        data::check_bits(src.len(), bitoffset, count)?;
        Ok(Value::Bits((0 .. count)
            .map(|i|  data::get_bit(src, bitoffset + i))
            .collect()))
    }
    fn encode(&self, _: &CodecRegistry, ty: &Type, value: &Value, dst: &mut [u8], bitoffset: usize) -> PackingResult<()> {
        let count = builtin(ty)?.elements();
        data::check_bits(dst.len(), bitoffset, count)?;
        let bits = match value {
            Value::Bits(bits) => bits.clone(),
            Value::Array(items) => items.iter()
                .map(|item|  item.as_bool().ok_or(PackingError::InvalidValue("expected booleans")))
                .collect::<PackingResult<Vec<_>>>()?,
            Value::Unsigned(word) if count <= 64 => {
                if count < 64 && *word >> count != 0
                    {return Err(PackingError::InvalidValue("integer has more bits than the bit array"))}
                (0 .. count).map(|i|  word >> i & 1 == 1).collect()
            },
            _ => return Err(PackingError::InvalidValue("expected a bit vector")),
        };
        if bits.len() != count
            {return Err(PackingError::InvalidValue("bit vector has not the type's length"))}
        for (i, bit) in bits.into_iter().enumerate() {
            data::set_bit(dst, bitoffset + i, bit);
        }
        Ok(())
    }
}

/**
    strings of fixed character count and their arrays

    Strings shorter than their type are padded with null bytes, which are trimmed when decoding. A type with a null character count is a variable length string taking all the buffer, it is sized dynamically.
*/
pub struct FixedStringCodec;
impl FixedStringCodec {
    fn chars(ty: &Type) -> PackingResult<usize> {
        match builtin(ty)?.kind {
            BuiltinKind::String(chars) => Ok(chars),
            BuiltinKind::Numeric(_) => Err(PackingError::InvalidValue("type is not a string")),
        }
    }
    fn text(bytes: &[u8]) -> PackingResult<Value> {
        let end = bytes.iter().position(|&byte|  byte == 0).unwrap_or(bytes.len());
        core::str::from_utf8(&bytes[.. end])
            .map(|text|  Value::String(text.to_string()))
            .map_err(|_| PackingError::InvalidValue("string is not valid utf-8"))
    }
}
impl Sizer for FixedStringCodec {
    fn static_size(&self, ty: &Type) -> Option<usize> {
        match Self::chars(ty) {
            Ok(0) => None,
            _ => Some(ty.buffer_size()),
        }
    }
    fn dynamic_size(&self, ty: &Type, sample: &Value) -> usize {
        match (Self::chars(ty), sample) {
            (Ok(0), Value::String(text)) => text.len(),
            _ => ty.buffer_size(),
        }
    }
}
impl Codec for FixedStringCodec {
    fn name(&self) -> &'static str  {"fixed-string"}
    fn bit_aligned(&self) -> bool  {true}
    fn decode(&self, _: &CodecRegistry, ty: &Type, src: &[u8], bitoffset: usize) -> PackingResult<Value> {
        let builtin = builtin(ty)?;
        let chars = match Self::chars(ty)? {
            0 if builtin.arity != 0 => return Err(PackingError::InvalidValue("variable length strings cannot be in arrays")),
            0 => (src.len() * 8).saturating_sub(bitoffset) / 8,
            chars => chars,
        };
        data::check_bits(src.len(), bitoffset, chars * 8 * builtin.elements())?;
        decode_elements(builtin, bitoffset, |position| {
            let mut bytes = vec![0; chars];
            data::copy_bits(src, position, &mut bytes, 0, chars * 8);
            Self::text(&bytes)
        })
    }
    fn encode(&self, _: &CodecRegistry, ty: &Type, value: &Value, dst: &mut [u8], bitoffset: usize) -> PackingResult<()> {
        let builtin = builtin(ty)?;
        let fixed = Self::chars(ty)?;
        encode_elements(builtin, value, bitoffset, |value, position| {
            let text = value.as_str().ok_or(PackingError::InvalidValue("expected a string"))?;
            let chars = if fixed == 0  {text.len()}  else {fixed};
            if text.len() > chars
                {return Err(PackingError::BadSize(text.len(), "string is longer than its type"))}
            data::check_bits(dst.len(), position, chars * 8)?;
            let mut bytes = vec![0; chars];
            bytes[.. text.len()].copy_from_slice(text.as_bytes());
            data::copy_bits(&bytes, 0, dst, position, chars * 8);
            Ok(())
        })
    }
}

/**
    structures, translated subitem by subitem with the codec of each subitem's type

    Gaps between subitems are left untouched when encoding. Opaque structures (without subitems) are translated as raw bytes, and are sized dynamically if their size is unknown.
*/
pub struct StructuralCodec;
impl Sizer for StructuralCodec {
    fn static_size(&self, ty: &Type) -> Option<usize> {
        match ty.bitsize() {
            0 => None,
            _ => Some(ty.buffer_size()),
        }
    }
    fn dynamic_size(&self, ty: &Type, sample: &Value) -> usize {
        match sample {
            Value::Raw(bytes) if ty.bitsize() == 0 => bytes.len(),
            _ => ty.buffer_size(),
        }
    }
}
impl Codec for StructuralCodec {
    fn name(&self) -> &'static str  {"structural"}
    fn bit_aligned(&self) -> bool  {true}
    fn decode(&self, registry: &CodecRegistry, ty: &Type, src: &[u8], bitoffset: usize) -> PackingResult<Value> {
        let structural = match ty {
            Type::Structural(structural) => structural,
            Type::Builtin(_) => return Err(PackingError::InvalidValue("type is not a structure")),
        };
        if structural.is_opaque() {
            let bits = match structural.bitsize() {
                0 => (src.len() * 8).saturating_sub(bitoffset) / 8 * 8,
                bits => bits,
            };
            data::check_bits(src.len(), bitoffset, bits)?;
            let mut bytes = vec![0; (bits + 7) / 8];
            data::copy_bits(src, bitoffset, &mut bytes, 0, bits);
            return Ok(Value::Raw(bytes))
        }
        data::check_bits(src.len(), bitoffset, structural.bitsize())?;
        structural.subitems().iter()
            .map(|item|  registry.decode_raw(&item.ty, src, bitoffset + item.bitoffset)
                            .map(|value|  (item.name.clone(), value)))
            .collect::<PackingResult<Vec<_>>>()
            .map(Value::Struct)
    }
    fn encode(&self, registry: &CodecRegistry, ty: &Type, value: &Value, dst: &mut [u8], bitoffset: usize) -> PackingResult<()> {
        let structural = match ty {
            Type::Structural(structural) => structural,
            Type::Builtin(_) => return Err(PackingError::InvalidValue("type is not a structure")),
        };
        if structural.is_opaque() {
            let bytes = match value {
                Value::Raw(bytes) => bytes,
                _ => return Err(PackingError::InvalidValue("expected raw bytes for an opaque structure")),
            };
            let bits = match structural.bitsize() {
                0 => bytes.len() * 8,
                bits if bytes.len() == (bits + 7) / 8 => bits,
                _ => return Err(PackingError::BadSize(bytes.len(), "raw bytes have not the structure's size")),
            };
            data::check_bits(dst.len(), bitoffset, bits)?;
            data::copy_bits(bytes, 0, dst, bitoffset, bits);
            return Ok(())
        }
        if !matches!(value, Value::Struct(_))
            {return Err(PackingError::InvalidValue("expected a structure"))}
        data::check_bits(dst.len(), bitoffset, structural.bitsize())?;
        for item in structural.subitems() {
            let field = value.field(&item.name)
                .ok_or(PackingError::InvalidValue("structure value misses a subitem"))?;
            registry.encode_raw(&item.ty, field, dst, bitoffset + item.bitoffset)?;
        }
        Ok(())
    }
}


/**
    set of codecs, one per type category, with the configuration they are used with

    Every translation goes through [Self::decode_raw] or [Self::encode_raw], which check the requested offset against the codec's alignment capability before calling it. [Translator] adds error wrapping on top.
*/
pub struct CodecRegistry {
    config: TranslationConfig,
    codecs: [Arc<dyn Codec>; Category::COUNT],
}
impl CodecRegistry {
    /// registry with the default codecs
    pub fn new(config: TranslationConfig) -> Self {
        // the order follows Category::key
        Self {
            config,
            codecs: [
                Arc::new(BoolCodec),
                Arc::new(FixedIntCodec),
                Arc::new(FloatCodec::SINGLE),
                Arc::new(FloatCodec::DOUBLE),
                Arc::new(BitArrayCodec),
                Arc::new(FixedStringCodec),
                Arc::new(StructuralCodec),
                ],
        }
    }
    pub fn config(&self) -> &TranslationConfig  {&self.config}

    /// replace the codec used for a category, returning the former one
    pub fn register(&mut self, category: Category, codec: Arc<dyn Codec>) -> Arc<dyn Codec> {
        core::mem::replace(&mut self.codecs[category.key()], codec)
    }
    /// codec used for a category
    pub fn codec(&self, category: Category) -> &Arc<dyn Codec> {
        &self.codecs[category.key()]
    }
    /// bind a type to this registry
    pub fn translator(self: &Arc<Self>, ty: Type) -> Translator {
        Translator {registry: self.clone(), ty}
    }

    /// check a bit offset against a codec's capabilities and the configured policy
    fn offset(&self, codec: &dyn Codec, bitoffset: usize) -> PackingResult<usize> {
        if bitoffset % 8 == 0 || (codec.bit_aligned() && self.config.bit_alignment)
            {return Ok(bitoffset)}
        match self.config.offset_policy {
            OffsetPolicy::Ignore => {
                log::warn!("codec {} ignores bit offset {}", codec.name(), bitoffset);
                Ok(bitoffset - bitoffset % 8)
            },
            OffsetPolicy::Fail => Err(PackingError::BadAlignment(bitoffset, "codec only supports byte aligned data")),
        }
    }
    /// decode with the codec of the type's category, without error wrapping
    pub fn decode_raw(&self, ty: &Type, src: &[u8], bitoffset: usize) -> PackingResult<Value> {
        let codec = self.codec(ty.category()).as_ref();
        let bitoffset = self.offset(codec, bitoffset)?;
        codec.decode(self, ty, src, bitoffset)
    }
    /// encode with the codec of the type's category, without error wrapping
    pub fn encode_raw(&self, ty: &Type, value: &Value, dst: &mut [u8], bitoffset: usize) -> PackingResult<()> {
        let codec = self.codec(ty.category()).as_ref();
        let bitoffset = self.offset(codec, bitoffset)?;
        codec.encode(self, ty, value, dst, bitoffset)
    }

    /// convert a codec result to the crate's error type, according to [TranslationConfig::wrap_errors]
    pub fn wrap<T, F>(&self, direction: TranslateDirection, type_name: F, codec: &'static str, result: PackingResult<T>) -> EthercatResult<T>
    where F: FnOnce() -> String
    {
        result.map_err(|cause| {
            if self.config.wrap_errors {
                EthercatError::Translation(TranslationError {
                    direction,
                    type_name: type_name(),
                    codec,
                    cause,
                })
            }
            else {
                EthercatError::Packing(cause)
            }
        })
    }
}
impl Default for CodecRegistry {
    fn default() -> Self  {Self::new(TranslationConfig::default())}
}
impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("config", &self.config)
            .field("codecs", &self.codecs.iter().map(|codec|  codec.name()).collect::<Vec<_>>())
            .finish()
    }
}


/// a type bound to the codec translating it
#[derive(Clone)]
pub struct Translator {
    registry: Arc<CodecRegistry>,
    ty: Type,
}
impl Translator {
    pub fn ty(&self) -> &Type  {&self.ty}
    pub fn registry(&self) -> &Arc<CodecRegistry>  {&self.registry}
    pub fn codec(&self) -> &dyn Codec {
        self.registry.codec(self.ty.category()).as_ref()
    }

    /// decode a value at the start of the buffer
    pub fn decode(&self, src: &[u8]) -> EthercatResult<Value> {
        self.decode_at(src, 0)
    }
    /// decode a value starting at the given bit of the buffer
    pub fn decode_at(&self, src: &[u8], bitoffset: usize) -> EthercatResult<Value> {
        let result = self.registry.decode_raw(&self.ty, src, bitoffset);
        self.registry.wrap(TranslateDirection::Decode, || self.ty.name(), self.codec().name(), result)
    }
    /// encode a value at the start of the buffer
    pub fn encode(&self, value: &Value, dst: &mut [u8]) -> EthercatResult {
        self.encode_at(value, dst, 0)
    }
    /// encode a value starting at the given bit of the buffer
    pub fn encode_at(&self, value: &Value, dst: &mut [u8], bitoffset: usize) -> EthercatResult {
        let result = self.registry.encode_raw(&self.ty, value, dst, bitoffset);
        self.registry.wrap(TranslateDirection::Encode, || self.ty.name(), self.codec().name(), result)
    }

    /// buffer size if it is known from the type alone
    pub fn static_size(&self) -> Option<usize> {
        self.codec().static_size(&self.ty)
    }
    /**
        allocate a zeroed buffer for the type

        Statically sized types ignore the sample, dynamically sized types need one.
    */
    pub fn make_buffer(&self, sample: Option<&Value>) -> EthercatResult<Vec<u8>> {
        let size = match (self.static_size(), sample) {
            (Some(size), _) => size,
            (None, Some(sample)) => self.codec().dynamic_size(&self.ty, sample),
            (None, None) => return Err(EthercatError::Master("dynamically sized type needs a sample value to size its buffer")),
        };
        Ok(vec![0; size])
    }
}
impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Translator{{{}, {}}}", self.ty, self.codec().name())
    }
}



#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NumericKind, Structural, Subitem};

    fn registry(config: TranslationConfig) -> Arc<CodecRegistry> {
        Arc::new(CodecRegistry::new(config))
    }

    #[test]
    fn bool_roundtrip_every_offset() {
        let translator = registry(TranslationConfig::default()).translator(Type::numeric(NumericKind::Bool));
        for offset in 0 .. 16 {
            for value in [false, true] {
                let mut buffer = [0u8; 2];
                translator.encode_at(&Value::Bool(value), &mut buffer, offset).unwrap();
                let expected = if value {1u16 << offset} else {0};
                assert_eq!(u16::from_le_bytes(buffer), expected);
                assert_eq!(translator.decode_at(&buffer, offset).unwrap(), Value::Bool(value));
            }
        }
    }

    #[test]
    fn integer_boundaries() {
        let registry = registry(TranslationConfig::default());
        for kind in NumericKind::ALL {
            let ty = Type::numeric(kind);
            let (bits, signed) = match ty.category() {
                Category::FixedInt {bits, signed} => (i128::from(bits), signed),
                _ => continue,
            };
            let (min, max) = if signed
                {(-(1i128 << (bits-1)), (1i128 << (bits-1)) - 1)}
            else
                {(0, (1i128 << bits) - 1)};
            let translator = registry.translator(ty.clone());
            for offset in [0, 3, 8, 13] {
                for sample in [min, max, 0, max / 3, min / 5] {
                    let value = if signed {Value::Signed(sample as i64)} else {Value::Unsigned(sample as u64)};
                    let mut buffer = vec![0xa5; (offset + bits as usize + 7) / 8];
                    let before = buffer.clone();
                    translator.encode_at(&value, &mut buffer, offset).unwrap();
                    assert_eq!(translator.decode_at(&buffer, offset).unwrap(), value, "{} at {}", ty, offset);
                    // bits before the value are untouched
                    assert_eq!(buffer[0] & ((1u16 << (offset % 8)) - 1) as u8, before[0] & ((1u16 << (offset % 8)) - 1) as u8);
                }
                let mut buffer = vec![0; (offset + bits as usize + 7) / 8];
                let over = Value::Signed((max + 1).min(i64::MAX.into()) as i64);
                if max < i64::MAX.into() {
                    assert!(translator.encode_at(&over, &mut buffer, offset).is_err());
                }
            }
        }
    }

    #[test]
    fn integer_arrays() {
        let translator = registry(TranslationConfig::default()).translator(Type::array(NumericKind::Int, 3));
        let value = Value::Array(vec![Value::Signed(-1), Value::Signed(300), Value::Signed(i16::MIN.into())]);
        let mut buffer = translator.make_buffer(None).unwrap();
        assert_eq!(buffer.len(), 6);
        translator.encode(&value, &mut buffer).unwrap();
        assert_eq!(buffer, [0xff, 0xff, 0x2c, 0x01, 0x00, 0x80]);
        assert_eq!(translator.decode(&buffer).unwrap(), value);
        assert!(translator.encode(&Value::Array(vec![Value::Signed(1)]), &mut buffer).is_err());
    }

    #[test]
    fn bit_array_touches_exact_range() {
        let registry = registry(TranslationConfig::default());
        for count in [1, 5, 8, 11] {
            let translator = registry.translator(Type::array(NumericKind::Bool, count));
            for offset in 0 .. 9 {
                let mut buffer = [0u8; 3];
                translator.encode_at(&Value::Bits(vec![true; count]), &mut buffer, offset).unwrap();
                for bit in 0 .. 24 {
                    assert_eq!(data::get_bit(&buffer, bit), (offset .. offset + count).contains(&bit));
                }
                let mut buffer = [0xffu8; 3];
                translator.encode_at(&Value::Bits(vec![false; count]), &mut buffer, offset).unwrap();
                for bit in 0 .. 24 {
                    assert_eq!(data::get_bit(&buffer, bit), !(offset .. offset + count).contains(&bit));
                }
                let pattern: Vec<bool> = (0 .. count).map(|i|  i % 3 == 0).collect();
                translator.encode_at(&Value::Bits(pattern.clone()), &mut buffer, offset).unwrap();
                assert_eq!(translator.decode_at(&buffer, offset).unwrap(), Value::Bits(pattern));
            }
        }
        let translator = registry.translator(Type::array(NumericKind::Bool, 4));
        let mut buffer = [0u8];
        translator.encode(&Value::Unsigned(0b1010), &mut buffer).unwrap();
        assert_eq!(buffer, [0b1010]);
        assert!(translator.encode(&Value::Unsigned(0b10000), &mut buffer).is_err());
    }

    #[test]
    fn strings() {
        let registry = registry(TranslationConfig::default());
        let translator = registry.translator(Type::string(6));
        for offset in [0, 5, 8] {
            let mut buffer = vec![0; (offset + 48 + 7) / 8];
            translator.encode_at(&Value::from("abc"), &mut buffer, offset).unwrap();
            assert_eq!(translator.decode_at(&buffer, offset).unwrap(), Value::from("abc"));
            translator.encode_at(&Value::from("abcdef"), &mut buffer, offset).unwrap();
            assert_eq!(translator.decode_at(&buffer, offset).unwrap(), Value::from("abcdef"));
        }
        let mut buffer = [0; 6];
        assert!(matches!(
            translator.encode(&Value::from("abcdefg"), &mut buffer),
            Err(EthercatError::Translation(TranslationError {cause: PackingError::BadSize(7, _), ..})),
            ));

        let translator = registry.translator(Type::strings(2, 3));
        let value = Value::Array(vec![Value::from("ab"), Value::from("c"), Value::from("")]);
        let mut buffer = translator.make_buffer(None).unwrap();
        translator.encode(&value, &mut buffer).unwrap();
        assert_eq!(buffer, *b"abc\0\0\0");
        assert_eq!(translator.decode(&buffer).unwrap(), value);
    }

    #[test]
    fn floats_and_alignment() {
        let strict = registry(TranslationConfig::default());
        let translator = strict.translator(Type::numeric(NumericKind::Real));
        let mut buffer = [0u8; 5];
        translator.encode_at(&Value::Float32(1.5), &mut buffer, 8).unwrap();
        assert_eq!(translator.decode_at(&buffer, 8).unwrap(), Value::Float32(1.5));
        match translator.decode_at(&buffer, 4) {
            Err(EthercatError::Translation(error)) => {
                assert_eq!(error.direction, TranslateDirection::Decode);
                assert_eq!(error.type_name, "REAL");
                assert_eq!(error.codec, "float32");
                assert!(matches!(error.cause, PackingError::BadAlignment(4, _)));
            },
            other => panic!("unexpected {:?}", other),
        }

        let lenient = registry(TranslationConfig {offset_policy: OffsetPolicy::Ignore, .. Default::default()});
        let translator = lenient.translator(Type::numeric(NumericKind::Lreal));
        let mut buffer = [0u8; 8];
        translator.encode_at(&Value::Float64(-2.25), &mut buffer, 3).unwrap();
        assert_eq!(f64::from_le_bytes(buffer), -2.25);
    }

    #[test]
    fn byte_aligned_mode() {
        let config = TranslationConfig {bit_alignment: false, .. Default::default()};
        let translator = registry(config).translator(Type::numeric(NumericKind::Bool));
        let mut buffer = [0u8];
        translator.encode(&Value::Bool(true), &mut buffer).unwrap();
        assert_eq!(buffer, [1]);
        assert!(translator.encode_at(&Value::Bool(true), &mut buffer, 3).is_err());

        let config = TranslationConfig {bit_alignment: false, offset_policy: OffsetPolicy::Ignore, .. Default::default()};
        let translator = registry(config).translator(Type::numeric(NumericKind::Bool));
        let mut buffer = [0u8];
        translator.encode_at(&Value::Bool(true), &mut buffer, 3).unwrap();
        assert_eq!(buffer, [1]);
    }

    #[test]
    fn unwrapped_errors() {
        let config = TranslationConfig {wrap_errors: false, .. Default::default()};
        let translator = registry(config).translator(Type::numeric(NumericKind::Udint));
        assert!(matches!(translator.decode(&[0, 0]), Err(EthercatError::Packing(PackingError::BadSize(2, _)))));
        assert!(matches!(translator.encode(&Value::from("x"), &mut [0; 4]), Err(EthercatError::Packing(PackingError::InvalidValue(_)))));
    }

    #[test]
    fn structures() {
        let ty = Type::Structural(Structural::new("Status", vec![
            Subitem {name: "code".into(), ty: Type::numeric(NumericKind::Usint), bitoffset: 0},
            Subitem {name: "mode".into(), ty: Type::numeric(NumericKind::Bit4), bitoffset: 8},
            Subitem {name: "ready".into(), ty: Type::numeric(NumericKind::Bool), bitoffset: 20},
            ]));
        let translator = registry(TranslationConfig::default()).translator(ty);
        let mut buffer = translator.make_buffer(None).unwrap();
        assert_eq!(buffer.len(), 3);
        buffer.fill(0xff);
        let value = Value::Struct(vec![
            ("code".into(), Value::Unsigned(0x12)),
            ("mode".into(), Value::Unsigned(0x3)),
            ("ready".into(), Value::Bool(false)),
            ]);
        translator.encode(&value, &mut buffer).unwrap();
        // gaps keep their former content
        assert_eq!(buffer, [0x12, 0xf3, 0xef]);
        assert_eq!(translator.decode(&buffer).unwrap(), value);
        assert!(translator.encode(&Value::Struct(vec![]), &mut buffer).is_err());
    }

    #[test]
    fn opaque_structures() {
        let registry = registry(TranslationConfig::default());
        let translator = registry.translator(Type::Structural(Structural::opaque("Blob", 12)));
        let mut buffer = [0u8; 3];
        translator.encode_at(&Value::Raw(vec![0xab, 0x0c]), &mut buffer, 4).unwrap();
        assert_eq!(buffer, [0xb0, 0xca, 0x00]);
        assert_eq!(translator.decode_at(&buffer, 4).unwrap(), Value::Raw(vec![0xab, 0x0c]));

        let dynamic = registry.translator(Type::Structural(Structural::opaque("Blob", 0)));
        assert_eq!(dynamic.static_size(), None);
        assert_eq!(dynamic.make_buffer(Some(&Value::Raw(vec![1, 2, 3]))).unwrap().len(), 3);
    }

    #[test]
    fn sizing() {
        let registry = registry(TranslationConfig::default());
        for ty in [
                Type::numeric(NumericKind::Bool),
                Type::numeric(NumericKind::Bit3),
                Type::numeric(NumericKind::Lint),
                Type::array(NumericKind::Bool, 9),
                Type::array(NumericKind::Real, 3),
                Type::strings(3, 3),
                ] {
            let translator = registry.translator(ty.clone());
            assert_eq!(translator.make_buffer(None).unwrap().len(), (ty.bitsize() + 7) / 8);
        }
        let variable = registry.translator(Type::string(0));
        assert!(variable.make_buffer(None).is_err());
        let buffer = variable.make_buffer(Some(&Value::from("device name"))).unwrap();
        assert_eq!(buffer.len(), 11);
        let mut buffer = buffer;
        variable.encode(&Value::from("device name"), &mut buffer).unwrap();
        assert_eq!(variable.decode(&buffer).unwrap(), Value::from("device name"));
    }

    #[test]
    fn custom_codec() {
        struct Inverted;
        static_sizer!(Inverted);
        impl Codec for Inverted {
            fn name(&self) -> &'static str  {"inverted"}
            fn bit_aligned(&self) -> bool  {true}
            fn decode(&self, registry: &CodecRegistry, ty: &Type, src: &[u8], bitoffset: usize) -> PackingResult<Value> {
                BoolCodec.decode(registry, ty, src, bitoffset).map(|value|  Value::Bool(value != Value::Bool(true)))
            }
            fn encode(&self, registry: &CodecRegistry, ty: &Type, value: &Value, dst: &mut [u8], bitoffset: usize) -> PackingResult<()> {
                BoolCodec.encode(registry, ty, &Value::Bool(value != &Value::Bool(true)), dst, bitoffset)
            }
        }
        let mut registry = CodecRegistry::default();
        let former = registry.register(Category::Bool, Arc::new(Inverted));
        assert_eq!(former.name(), "bool");
        let translator = Arc::new(registry).translator(Type::numeric(NumericKind::Bool));
        assert_eq!(translator.decode(&[0]).unwrap(), Value::Bool(true));
        assert_eq!(translator.codec().name(), "inverted");
    }
}
