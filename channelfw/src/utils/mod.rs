//! Common utils

pub(crate) mod id;
