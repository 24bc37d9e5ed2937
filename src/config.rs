/*!
    descriptions of a bus, as provided by a configuration tool (typically extracted from an ENI file), and the settings of the master using it.

    These are plain data structures, a [crate::Master] is built from them. With the `serde` feature, they can be deserialized from any format:

    ```toml
    cycle_time = { secs = 0, nanos = 1000000 }

    [process_image]
    input_size = 2
    output_size = 2
    inputs = [ { name = "drive.status.word", data_type = "UINT", bitsize = 16, bitoffset = 0 } ]
    outputs = [ { name = "drive.control.word", data_type = "UINT", bitsize = 16, bitoffset = 0 } ]

    [[slaves]]
    name = "drive"
    address = 1001

    [[slaves.pdos]]
    index = 0x1a00
    name = "status"
    direction = "Input"
    sync_manager = 3
    entries = [ { index = 0x6041, subindex = 0, bitlen = 16, name = "word", data_type = "UINT" } ]
    ```
*/

use crate::translate::TranslationConfig;
use core::time::Duration;


/// direction of process data, from the master's point of view
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PdoDirection {
    /// data sent by slaves to the master (TxPDO)
    Input,
    /// data sent by the master to slaves (RxPDO)
    Output,
}

/// the whole bus
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusDescription {
    pub slaves: Vec<SlaveDescription>,
    pub process_image: ProcessImageDescription,
    /// period the bus is meant to be exchanged at
    #[cfg_attr(feature = "serde", serde(default))]
    pub cycle_time: Duration,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlaveDescription {
    /// unique name of the slave, prefix of its variables names in the process image
    pub name: String,
    /// fixed station address, unique on the bus
    pub address: u16,
    #[cfg_attr(feature = "serde", serde(default))]
    pub pdos: Vec<PdoDescription>,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PdoDescription {
    /// index of the PDO mapping object, like `0x1a00`
    pub index: u16,
    pub name: String,
    pub direction: PdoDirection,
    /// sync manager the PDO is assigned to, unassigned PDOs are not exchanged
    #[cfg_attr(feature = "serde", serde(default))]
    pub sync_manager: Option<u8>,
    pub entries: Vec<EntryDescription>,
}

/// object mapped in a PDO
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntryDescription {
    /// object index, `0` for padding entries
    pub index: u16,
    pub subindex: u8,
    pub bitlen: usize,
    pub name: String,
    /// CoE type name, absent for padding entries
    #[cfg_attr(feature = "serde", serde(default))]
    pub data_type: Option<String>,
}

/// placement of an entry in the process image, named `slave.pdo.entry`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Variable {
    pub name: String,
    pub data_type: String,
    pub bitsize: usize,
    /// bit position in the input or output image
    pub bitoffset: usize,
}

/// layout of the process data images
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessImageDescription {
    /// byte size of the input image
    pub input_size: usize,
    /// byte size of the output image
    pub output_size: usize,
    #[cfg_attr(feature = "serde", serde(default))]
    pub inputs: Vec<Variable>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub outputs: Vec<Variable>,
}
impl ProcessImageDescription {
    /// find a variable by name
    pub fn variable(&self, direction: PdoDirection, name: &str) -> Option<&Variable> {
        let variables = match direction {
            PdoDirection::Input => &self.inputs,
            PdoDirection::Output => &self.outputs,
        };
        variables.iter().find(|variable|  variable.name == name)
    }
    /// byte size of the image in the given direction
    pub fn size(&self, direction: PdoDirection) -> usize {
        match direction {
            PdoDirection::Input => self.input_size,
            PdoDirection::Output => self.output_size,
        }
    }
}

/// settings of a [crate::Master]
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MasterConfig {
    pub translation: TranslationConfig,
    /// accept unknown type names in the description, as opaque types of the declared size
    pub allow_placeholder_types: bool,
    /// timeout used by [crate::master::BusThread] and when no other timeout is given
    pub default_timeout: Duration,
}
impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            translation: TranslationConfig::default(),
            allow_placeholder_types: false,
            default_timeout: Duration::from_millis(100),
        }
    }
}
