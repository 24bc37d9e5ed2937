/*!
    CoE object types: numeric scalars and arrays, fixed-width strings, and structural aggregates, with their bit footprint.

    Types are plain immutable values, they can be freely cloned and compared. They are usually obtained by parsing the type names found in an ENI description with [TypeLibrary::parse].

    ```
    use ecmap::types::{Type, NumericKind};

    let ty = Type::parse("ARRAY [0..3] OF UINT", None).unwrap();
    assert_eq!(ty.bitsize(), 64);
    assert_eq!(ty.name(), "ARRAY [0..3] OF UINT");
    assert_eq!(Type::parse("DINT", Some(32)).unwrap(), Type::numeric(NumericKind::Dint));
    ```
*/

use crate::error::{EthercatError, EthercatResult};
use std::collections::HashMap;
use core::fmt;


/// fixed-width numeric kinds of CoE and IEC 61131-3 types
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum NumericKind {
    /// single bit, `BOOL`, `BIT`, `BIT1`
    Bool = 0x01,
    /// unsigned bit fields narrower than a byte, `BIT2` to `BIT7`
    Bit2 = 0x02,
    Bit3 = 0x03,
    Bit4 = 0x04,
    Bit5 = 0x05,
    Bit6 = 0x06,
    Bit7 = 0x07,
    Byte = 0x10,
    Word = 0x11,
    Dword = 0x12,
    Lword = 0x13,
    Sint = 0x20,
    Int = 0x21,
    Dint = 0x22,
    Lint = 0x23,
    Usint = 0x30,
    Uint = 0x31,
    Udint = 0x32,
    Ulint = 0x33,
    Real = 0x40,
    Lreal = 0x41,
}
use NumericKind::*;

impl NumericKind {
    /// all known kinds, in identifier order
    pub const ALL: [NumericKind; 21] = [
        Bool, Bit2, Bit3, Bit4, Bit5, Bit6, Bit7,
        Byte, Word, Dword, Lword,
        Sint, Int, Dint, Lint,
        Usint, Uint, Udint, Ulint,
        Real, Lreal,
        ];

    /// enumerated identifier of the kind
    pub fn id(self) -> u8  {self as u8}

    /// size of one element of this kind
    pub fn base_bitsize(self) -> usize {
        match self {
            Bool => 1,
            Bit2 => 2, Bit3 => 3, Bit4 => 4, Bit5 => 5, Bit6 => 6, Bit7 => 7,
            Byte | Sint | Usint => 8,
            Word | Int | Uint => 16,
            Dword | Dint | Udint | Real => 32,
            Lword | Lint | Ulint | Lreal => 64,
        }
    }
    /// true for two's complement integers
    pub fn signed(self) -> bool {
        matches!(self, Sint | Int | Dint | Lint)
    }
    /// canonical IEC name
    pub fn name(self) -> &'static str {
        match self {
            Bool => "BOOL",
            Bit2 => "BIT2", Bit3 => "BIT3", Bit4 => "BIT4", Bit5 => "BIT5", Bit6 => "BIT6", Bit7 => "BIT7",
            Byte => "BYTE", Word => "WORD", Dword => "DWORD", Lword => "LWORD",
            Sint => "SINT", Int => "INT", Dint => "DINT", Lint => "LINT",
            Usint => "USINT", Uint => "UINT", Udint => "UDINT", Ulint => "ULINT",
            Real => "REAL", Lreal => "LREAL",
        }
    }
    /// resolve a kind from its IEC name or one of its CoE aliases, the name must be uppercase
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "BOOL" | "BOOLEAN" | "BIT" | "BIT1" => Bool,
            "BIT2" => Bit2, "BIT3" => Bit3, "BIT4" => Bit4,
            "BIT5" => Bit5, "BIT6" => Bit6, "BIT7" => Bit7,
            "BYTE" | "BIT8" => Byte,
            "WORD" => Word,
            "DWORD" => Dword,
            "LWORD" => Lword,
            "SINT" | "INTEGER8" => Sint,
            "INT" | "INTEGER16" => Int,
            "DINT" | "INTEGER32" => Dint,
            "LINT" | "INTEGER64" => Lint,
            "USINT" | "UNSIGNED8" => Usint,
            "UINT" | "UNSIGNED16" => Uint,
            "UDINT" | "UNSIGNED32" => Udint,
            "ULINT" | "UNSIGNED64" => Ulint,
            "REAL" | "REAL32" | "FLOAT" => Real,
            "LREAL" | "REAL64" | "DOUBLE" => Lreal,
            _ => return None,
        })
    }
}

/// the element kind of a builtin type
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinKind {
    Numeric(NumericKind),
    /// fixed-width string of the given character count, a zero count means a variable length string (only usable with dynamic sizing)
    String(usize),
}

/// builtin CoE type: a scalar or a fixed-length array of numerics or strings
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Builtin {
    pub kind: BuiltinKind,
    /// 0 for scalars, element count for arrays
    pub arity: usize,
    /// name to report instead of the canonical name, typically the alias used in the description
    pub name: Option<String>,
}
impl Builtin {
    /// size of one element
    pub fn base_bitsize(&self) -> usize {
        match self.kind {
            BuiltinKind::Numeric(kind) => kind.base_bitsize(),
            BuiltinKind::String(chars) => chars * 8,
        }
    }
    /// number of elements, 1 for scalars
    pub fn elements(&self) -> usize  {self.arity.max(1)}
    pub fn bitsize(&self) -> usize  {self.base_bitsize() * self.elements()}

    /// canonical name, ignoring the display override
    pub fn canonical_name(&self) -> String {
        let element = match self.kind {
            BuiltinKind::Numeric(kind) => kind.name().to_string(),
            BuiltinKind::String(0) => "STRING".to_string(),
            BuiltinKind::String(chars) => format!("STRING({})", chars),
        };
        if self.arity == 0   {element}
        else                 {format!("ARRAY [0..{}] OF {}", self.arity - 1, element)}
    }
}

/// member of a structural type, placed at a bit offset from the start of the structure
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subitem {
    pub name: String,
    pub ty: Type,
    pub bitoffset: usize,
}

/**
    structure of subitems, as CoE records are.

    Subitems may overlap or leave gaps (reserved padding), so the structure's size is the end of its farthest subitem, not the sum of their sizes.
    A structure without subitems is opaque: its content is only known as raw bytes.
*/
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Structural {
    name: String,
    subitems: Vec<Subitem>,
    bitsize: usize,
}
impl Structural {
    pub fn new(name: impl Into<String>, subitems: Vec<Subitem>) -> Self {
        let bitsize = subitems.iter()
            .map(|item|  item.bitoffset + item.ty.bitsize())
            .max()
            .unwrap_or(0);
        Self {name: name.into(), subitems, bitsize}
    }
    /// structure with unknown content, only its size is known
    pub fn opaque(name: impl Into<String>, bitsize: usize) -> Self {
        Self {name: name.into(), subitems: Vec::new(), bitsize}
    }
    pub fn name(&self) -> &str  {&self.name}
    pub fn subitems(&self) -> &[Subitem]  {&self.subitems}
    pub fn bitsize(&self) -> usize  {self.bitsize}
    pub fn is_opaque(&self) -> bool  {self.subitems.is_empty()}
    /// find a subitem by name
    pub fn subitem(&self, name: &str) -> Option<&Subitem> {
        self.subitems.iter().find(|item|  item.name == name)
    }
}

/**
    category of a type, selecting the codec used to translate it

    Arrays keep the category of their elements, except arrays of bits which have their own codec.
*/
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    Bool,
    FixedInt {bits: u8, signed: bool},
    Float32,
    Float64,
    BitArray,
    FixedString,
    Structural,
}
impl Category {
    /// number of categories
    pub const COUNT: usize = 7;
    /// position of the category in registries indexed by category
    pub fn key(self) -> usize {
        match self {
            Category::Bool => 0,
            Category::FixedInt {..} => 1,
            Category::Float32 => 2,
            Category::Float64 => 3,
            Category::BitArray => 4,
            Category::FixedString => 5,
            Category::Structural => 6,
        }
    }
}

/// a CoE type
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Builtin(Builtin),
    Structural(Structural),
}
impl Type {
    /// scalar numeric type
    pub fn numeric(kind: NumericKind) -> Self {
        Self::Builtin(Builtin {kind: BuiltinKind::Numeric(kind), arity: 0, name: None})
    }
    /// array of numerics
    pub fn array(kind: NumericKind, arity: usize) -> Self {
        Self::Builtin(Builtin {kind: BuiltinKind::Numeric(kind), arity, name: None})
    }
    /// scalar string of the given character count
    pub fn string(chars: usize) -> Self {
        Self::Builtin(Builtin {kind: BuiltinKind::String(chars), arity: 0, name: None})
    }
    /// array of strings
    pub fn strings(chars: usize, arity: usize) -> Self {
        Self::Builtin(Builtin {kind: BuiltinKind::String(chars), arity, name: None})
    }
    /// same type reporting an other name
    pub fn renamed(self, name: impl Into<String>) -> Self {
        match self {
            Self::Builtin(builtin) => Self::Builtin(Builtin {name: Some(name.into()), .. builtin}),
            Self::Structural(structural) => Self::Structural(Structural {name: name.into(), .. structural}),
        }
    }

    pub fn bitsize(&self) -> usize {
        match self {
            Self::Builtin(builtin) => builtin.bitsize(),
            Self::Structural(structural) => structural.bitsize(),
        }
    }
    /// number of whole bytes, rounded down
    pub fn bytesize(&self) -> usize  {self.bitsize() / 8}
    /// number of bytes needed to hold the type, rounded up
    pub fn buffer_size(&self) -> usize  {(self.bitsize() + 7) / 8}

    pub fn name(&self) -> String {
        match self {
            Self::Builtin(builtin) => builtin.name.clone()
                .unwrap_or_else(|| builtin.canonical_name()),
            Self::Structural(structural) => structural.name.clone(),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Self::Builtin(builtin) => match builtin.kind {
                BuiltinKind::Numeric(Bool) if builtin.arity == 0 => Category::Bool,
                BuiltinKind::Numeric(Bool) => Category::BitArray,
                BuiltinKind::Numeric(Real) => Category::Float32,
                BuiltinKind::Numeric(Lreal) => Category::Float64,
                BuiltinKind::Numeric(kind) => Category::FixedInt {
                    bits: kind.base_bitsize() as u8,
                    signed: kind.signed(),
                    },
                BuiltinKind::String(_) => Category::FixedString,
            },
            Self::Structural(_) => Category::Structural,
        }
    }

    /**
        true if both types have the same memory layout and interpretation, regardless of the name they are displayed with

        This is the check used to match types declared in different places of a description, which may use different aliases for the same type.
    */
    pub fn compatible(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Builtin(a), Self::Builtin(b)) => a.kind == b.kind && a.arity == b.arity,
            (Self::Structural(a), Self::Structural(b)) =>
                a.bitsize == b.bitsize
                && (a.is_opaque() || b.is_opaque() || a.subitems == b.subitems),
            _ => false,
        }
    }

    /// parse a builtin type name, see [TypeLibrary::parse] for details
    pub fn parse(name: &str, bitsize: Option<usize>) -> EthercatResult<Type> {
        TypeLibrary::new().parse(name, bitsize)
    }
}
impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}


/**
    set of application structural types, used to resolve the type names found in a bus description

    Builtin names are always resolved, case insensitively and with their CoE aliases. Names that are neither builtin nor registered are an error, unless placeholders are allowed and a size is given: an opaque [Structural] type of that size is then produced.
*/
#[derive(Clone, Debug, Default)]
pub struct TypeLibrary {
    structs: HashMap<String, Structural>,
    placeholders: bool,
}
impl TypeLibrary {
    pub fn new() -> Self  {Self::default()}
    /// enable or disable opaque placeholders for unknown names
    pub fn with_placeholders(mut self, enable: bool) -> Self {
        self.placeholders = enable;
        self
    }
    /// register an application structural type under its name
    pub fn insert(&mut self, structural: Structural) -> Option<Structural> {
        self.structs.insert(structural.name().to_string(), structural)
    }
    pub fn get(&self, name: &str) -> Option<&Structural> {
        self.structs.get(name)
    }

    /**
        map a textual type name to a type

        Accepted names are

        - builtin numerics like `DINT`, `UNSIGNED16`, `BIT4`
        - strings like `STRING(12)`, or `STRING` when a bit size is given
        - arrays like `ARRAY [0..3] OF UINT`, of builtin elements only
        - names of registered structural types

        When `bitsize` is given, it must match the resolved type's size.
    */
    pub fn parse(&self, name: &str, bitsize: Option<usize>) -> EthercatResult<Type> {
        let name = name.trim();
        let ty = match self.resolve(name, bitsize)? {
            Some(ty) => ty,
            None => match bitsize {
                Some(size) if self.placeholders && size != 0 => {
                    log::warn!("unknown type {:?}, using an opaque placeholder of {} bits", name, size);
                    Type::Structural(Structural::opaque(name, size))
                },
                _ => return Err(EthercatError::configuration(format!("unknown type {:?}", name))),
            },
        };
        if let Some(size) = bitsize {
            if ty.bitsize() != size
                {return Err(EthercatError::configuration(format!(
                    "type {:?} is {} bits but {} bits are declared", name, ty.bitsize(), size)))}
        }
        Ok(ty)
    }

    /// resolve a name, `None` if unknown
    fn resolve(&self, name: &str, bitsize: Option<usize>) -> EthercatResult<Option<Type>> {
        if let Some(structural) = self.structs.get(name)
            {return Ok(Some(Type::Structural(structural.clone())))}

        let upper = name.to_ascii_uppercase();
        if let Some(rest) = upper.strip_prefix("ARRAY") {
            return self.parse_array(name, rest, bitsize).map(Some)
        }
        if let Some(kind) = NumericKind::from_name(&upper) {
            let ty = Type::numeric(kind);
            // keep the alias used in the description
            return Ok(Some(if upper == kind.name()  {ty}  else {ty.renamed(name)}))
        }
        for prefix in ["STRING", "VISIBLE_STRING"] {
            if let Some(rest) = upper.strip_prefix(prefix) {
                let rest = rest.trim();
                if !rest.is_empty() && !rest.starts_with('(')
                    {continue}
                let chars = if rest.is_empty() {
                    bitsize.map(|size|  size / 8).unwrap_or(0)
                } else {
                    rest.strip_prefix('(')
                        .and_then(|rest|  rest.strip_suffix(')'))
                        .and_then(|count|  count.trim().parse::<usize>().ok())
                        .filter(|chars|  chars.checked_mul(8).is_some())
                        .ok_or_else(|| EthercatError::configuration(format!("malformed string type {:?}", name)))?
                };
                return Ok(Some(Type::string(chars)))
            }
        }
        Ok(None)
    }

    /// parse the part of an array type name following `ARRAY`
    fn parse_array(&self, name: &str, rest: &str, bitsize: Option<usize>) -> EthercatResult<Type> {
        let malformed = || EthercatError::configuration(format!("malformed array type {:?}", name));

        let rest = rest.trim_start().strip_prefix('[').ok_or_else(malformed)?;
        let (bounds, rest) = rest.split_once(']').ok_or_else(malformed)?;
        let (low, high) = bounds.split_once("..").ok_or_else(malformed)?;
        let low = low.trim().parse::<i64>().map_err(|_| malformed())?;
        let high = high.trim().parse::<i64>().map_err(|_| malformed())?;
        let arity = high.checked_sub(low)
            .and_then(|span|  span.checked_add(1))
            .filter(|&count|  count > 0)
            .and_then(|count|  usize::try_from(count).ok())
            .ok_or_else(malformed)?;

        let element = rest.trim_start().strip_prefix("OF").ok_or_else(malformed)?;
        // recover the original case of the element name for error messages and structural lookups
        let element = name[name.len() - element.len() ..].trim();
        let element = self.parse(element, bitsize.map(|size|  size / arity))?;
        match element {
            Type::Builtin(Builtin {kind, arity: 0, ..}) => {
                let array = Builtin {kind, arity, name: None};
                if array.base_bitsize().checked_mul(arity).is_none()
                    {return Err(EthercatError::configuration(format!("array {:?} is too big", name)))}
                Ok(Type::Builtin(array))
            },
            _ => Err(EthercatError::configuration(format!(
                    "array {:?} must have scalar builtin elements", name))),
        }
    }
}



#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_sizes() {
        assert_eq!(Type::numeric(Bool).bitsize(), 1);
        assert_eq!(Type::numeric(Bool).bytesize(), 0);
        assert_eq!(Type::numeric(Bool).buffer_size(), 1);
        assert_eq!(Type::numeric(Lreal).bytesize(), 8);
        assert_eq!(Type::array(Uint, 4).bitsize(), 64);
        assert_eq!(Type::array(Bool, 12).buffer_size(), 2);
        assert_eq!(Type::strings(5, 3).bitsize(), 120);
        for kind in NumericKind::ALL {
            assert_eq!(Type::array(kind, 3).bitsize(), 3 * kind.base_bitsize());
        }
    }

    #[test]
    fn structural_bitsize_is_farthest_end() {
        let structural = Structural::new("Record", vec![
            Subitem {name: "a".into(), ty: Type::numeric(Usint), bitoffset: 0},
            Subitem {name: "b".into(), ty: Type::numeric(Bit4), bitoffset: 8},
            Subitem {name: "c".into(), ty: Type::numeric(Bool), bitoffset: 20},
            ]);
        assert_eq!(structural.bitsize(), 21);
        assert_eq!(Type::Structural(structural).category(), Category::Structural);
    }

    #[test]
    fn parse_builtins() {
        assert_eq!(Type::parse("DINT", None).unwrap(), Type::numeric(Dint));
        assert_eq!(Type::parse(" udint ", Some(32)).unwrap().category(), Category::FixedInt {bits: 32, signed: false});
        let alias = Type::parse("UNSIGNED16", Some(16)).unwrap();
        assert_eq!(alias.name(), "UNSIGNED16");
        assert!(alias.compatible(&Type::numeric(Uint)));
        assert_ne!(alias, Type::numeric(Uint));
        assert_eq!(Type::parse("BIT4", None).unwrap().bitsize(), 4);
        assert_eq!(Type::parse("BIT8", None).unwrap().category(), Category::FixedInt {bits: 8, signed: false});
        assert_eq!(Type::parse("STRING(10)", None).unwrap(), Type::string(10));
        assert_eq!(Type::parse("STRING", Some(64)).unwrap(), Type::string(8));
    }

    #[test]
    fn parse_arrays() {
        let ty = Type::parse("ARRAY [0..3] of UINT", Some(64)).unwrap();
        assert_eq!(ty, Type::array(Uint, 4));
        assert_eq!(ty.name(), "ARRAY [0..3] OF UINT");
        assert_eq!(Type::parse("ARRAY [1..16] OF BOOL", None).unwrap().category(), Category::BitArray);
        assert_eq!(Type::parse("ARRAY [0..1] OF STRING(4)", None).unwrap(), Type::strings(4, 2));
        assert!(Type::parse("ARRAY [3..0] OF UINT", None).is_err());
    }

    #[test]
    fn parse_oversized() {
        // bounds and sizes come from the description, they must not overflow
        for name in [
                "ARRAY [-9223372036854775808..9223372036854775807] OF UINT",
                "ARRAY [0..9223372036854775807] OF BOOL",
                "ARRAY [0..4611686018427387903] OF UDINT",
                "ARRAY [0..99999999999999999999] OF UINT",
                "STRING(4611686018427387904)",
                "ARRAY [0..1152921504606846975] OF STRING(16)",
                ] {
            assert!(matches!(Type::parse(name, None), Err(EthercatError::Configuration(_))), "{}", name);
        }
        assert_eq!(Type::parse("ARRAY [-2..1] OF SINT", None).unwrap(), Type::array(Sint, 4));
        assert!(Type::parse("ARRAY 0..3 OF UINT", None).is_err());
        assert!(Type::parse("ARRAY [0..3] OF ARRAY [0..1] OF UINT", None).is_err());
    }

    #[test]
    fn parse_unknown() {
        assert!(matches!(Type::parse("DINTT", Some(32)), Err(EthercatError::Configuration(_))));
        assert!(matches!(Type::parse("DINT", Some(16)), Err(EthercatError::Configuration(_))));

        let lenient = TypeLibrary::new().with_placeholders(true);
        let placeholder = lenient.parse("VendorRecord", Some(48)).unwrap();
        assert_eq!(placeholder.bitsize(), 48);
        assert_eq!(placeholder.name(), "VendorRecord");
        // a placeholder needs a size
        assert!(lenient.parse("VendorRecord", None).is_err());
        assert!(lenient.parse("VendorRecord", Some(0)).is_err());
    }

    #[test]
    fn parse_registered_structural() {
        let mut library = TypeLibrary::new();
        library.insert(Structural::new("Position", vec![
            Subitem {name: "x".into(), ty: Type::numeric(Dint), bitoffset: 0},
            Subitem {name: "y".into(), ty: Type::numeric(Dint), bitoffset: 32},
            ]));
        let ty = library.parse("Position", Some(64)).unwrap();
        assert_eq!(ty.category(), Category::Structural);
        assert!(library.parse("Position", Some(32)).is_err());
        assert!(library.parse("ARRAY [0..1] OF Position", None).is_err());
    }
}
