#[cfg(test)]
pub(crate) use fakes::*;
