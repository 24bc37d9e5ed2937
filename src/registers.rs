/*!
    communication states and well-known CoE objects, shared by the master, the slaves and the backends. This should be used instead of any hardcoded value.
*/
#![allow(non_upper_case_globals)]

use core::fmt;
use bilge::prelude::*;
use crate::error::EthercatError;


/**
    the current operation state on one device.

    Except [Self::Bootstrap], changing to any mode can be requested from any upper mode or from the preceding one.

    ETG.1000.6 table 9
*/
#[bitsize(4)]
#[derive(TryFromBits, Debug, Copy, Clone, Eq, PartialEq)]
pub enum AlState {
    /**
        Transitional state meaning the slave is booting up (typically for a firmware update) and ready for nothing else.

        It only exists for slaves, a whole segment cannot be requested into it.
    */
    Bootstrap = 3,
    /// registers only, used at the beginning of a communication
    Init = 1,
    /// mailbox communication allowed, so SDOs and mapping configuration, but no process data
    PreOperational = 2,
    /**
        process data is exchanged, but the outputs sent to the slaves are not executed.

        This is a kind of read-only temporary mode before [Self::Operational], that can be useful for initializing control loops on the master side while their outputs are ignored.
    */
    SafeOperational = 4,
    /// realtime operations running, slaves might expect the master to regularly refresh its commands.
    Operational = 8,
}
impl AlState {
    /// numeric code of the state on the bus
    pub fn code(self) -> u8  {self as u8}
    /// state from its numeric code, `None` if the code is not a valid state
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => Self::Init,
            2 => Self::PreOperational,
            3 => Self::Bootstrap,
            4 => Self::SafeOperational,
            8 => Self::Operational,
            _ => return None,
        })
    }
}
impl fmt::Display for AlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bootstrap => "boot",
            Self::Init => "init",
            Self::PreOperational => "pre-op",
            Self::SafeOperational => "safe-op",
            Self::Operational => "op",
        })
    }
}

/// the states a whole segment can be requested to, this is [AlState] without [AlState::Bootstrap]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MasterState {
    Init,
    PreOperational,
    SafeOperational,
    Operational,
}
impl From<MasterState> for AlState {
    fn from(state: MasterState) -> Self {
        match state {
            MasterState::Init => Self::Init,
            MasterState::PreOperational => Self::PreOperational,
            MasterState::SafeOperational => Self::SafeOperational,
            MasterState::Operational => Self::Operational,
        }
    }
}
impl TryFrom<AlState> for MasterState {
    type Error = EthercatError;
    fn try_from(state: AlState) -> Result<Self, Self::Error> {
        Ok(match state {
            AlState::Init => Self::Init,
            AlState::PreOperational => Self::PreOperational,
            AlState::SafeOperational => Self::SafeOperational,
            AlState::Operational => Self::Operational,
            AlState::Bootstrap => return Err(EthercatError::Master("bootstrap is only a slave state")),
        })
    }
}
impl fmt::Display for MasterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        AlState::from(*self).fmt(f)
    }
}

/**
    indices of the CoE objects configuring the process data, ETG.1000.6 table 67

    Each mapping or assignment object holds its number of entries in subindex 0, then its entries starting from subindex 1.
*/
pub mod coe {
    /// first RxPDO mapping object, for outputs
    pub const rx_mapping: u16 = 0x1600;
    /// first TxPDO mapping object, for inputs
    pub const tx_mapping: u16 = 0x1a00;
    /// number of mapping objects available in each direction
    pub const mapping_count: u16 = 0x200;
    /// first sync manager PDO assignment object, the object of sync manager `n` is `sync_assignment + n`
    pub const sync_assignment: u16 = 0x1c10;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_codes() {
        for state in [AlState::Bootstrap, AlState::Init, AlState::PreOperational, AlState::SafeOperational, AlState::Operational] {
            assert_eq!(AlState::from_code(state.code()), Some(state));
        }
        assert_eq!(AlState::from_code(5), None);
        assert_eq!(AlState::Operational.code(), 8);
    }

    #[test]
    fn master_states() {
        assert_eq!(AlState::from(MasterState::SafeOperational), AlState::SafeOperational);
        assert_eq!(MasterState::try_from(AlState::Init).unwrap(), MasterState::Init);
        assert!(MasterState::try_from(AlState::Bootstrap).is_err());
    }
}
