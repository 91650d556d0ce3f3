use crate::error::{Error, Result};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Millivolts(pub u32);

impl Millivolts {
    pub fn get(self) -> u32 {
        self.0
    }

    pub fn whole(self) -> u32 {
        self.0 / 1000
    }

    /// Millivolts past the whole volt, `0..1000`.
    pub fn frac(self) -> u32 {
        self.0 % 1000
    }
}

/// `floor(code * reference_mv / max_code)`, integer math only.
pub fn raw_to_millivolts(code: u16, max_code: u16, reference_mv: u32) -> Result<Millivolts> {
    if max_code == 0 || code > max_code {
        return Err(Error::InvalidParameter);
    }
    let millivolts = code as u64 * reference_mv as u64 / max_code as u64;
    // code <= max_code keeps the result at or below reference_mv
    Ok(Millivolts(millivolts as u32))
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UnitConverter {
    max_code: u16,
    reference_mv: u32,
}

impl UnitConverter {
    pub fn new(max_code: u16, reference_mv: u32) -> Result<Self> {
        if max_code == 0 {
            return Err(Error::InvalidParameter);
        }
        Ok(UnitConverter {
            max_code,
            reference_mv,
        })
    }

    pub fn convert(&self, code: u16) -> Result<Millivolts> {
        raw_to_millivolts(code, self.max_code, self.reference_mv)
    }

    pub fn max_code(&self) -> u16 {
        self.max_code
    }
}
