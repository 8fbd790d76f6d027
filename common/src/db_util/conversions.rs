//! Checked conversions between rust and sql integer types.

use anyhow::{Result, anyhow};

pub fn i64_to_u64(i: i64) -> Result<u64> {
    u64::try_from(i).map_err(|_| anyhow!("i64 value {i} is negative and cannot be converted to u64"))
}
pub fn u64_to_i64(i: u64) -> Result<i64> {
    i64::try_from(i).map_err(|_| anyhow!("u64 value {i} exceeds i64::MAX and cannot be converted to i64"))
}

pub fn i32_to_u32(i: i32) -> Result<u32> {
    u32::try_from(i).map_err(|_| anyhow!("i32 value {i} is negative and cannot be converted to u32"))
}

pub fn u16_to_i32(i: u16) -> i32 {
    i32::from(i)
}

pub fn opti64_to_optu64(i: Option<i64>) -> Result<Option<u64>> {
    i.map(i64_to_u64).transpose()
}
