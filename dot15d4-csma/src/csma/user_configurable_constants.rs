//! Defaults of the CSMA-CA policy, overridable at build time through
//! `DOT15D4_CSMA_<NAME>` environment variables.

include!(concat!(env!("OUT_DIR"), "/config.rs"));
